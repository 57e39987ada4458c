//! Restart cadence
//!
//! Restarts follow either the Luby sequence scaled by a base interval, or
//! a geometric schedule. A restart backtracks to level 0 and keeps the
//! learned clauses.

use crate::config::RestartPolicy;

/// Compute the i-th element of the Luby sequence:
/// 1, 1, 2, 1, 1, 2, 4, 1, 1, 2, 1, 1, 2, 4, 8, ...
///
/// - `luby(i) = 2^(k-1)` if `i = 2^k - 1`
/// - `luby(i) = luby(i - 2^(k-1) + 1)` for `2^(k-1) <= i < 2^k - 1`
pub fn luby(i: u32) -> u64 {
    if i == 0 {
        return 1;
    }
    let mut k = 1u32;
    let mut p = 1u64;
    while p < u64::from(i) {
        k += 1;
        p = (1 << k) - 1;
    }
    if p == u64::from(i) {
        1 << (k - 1)
    } else {
        let prev_p = (1u64 << (k - 1)) - 1;
        luby(i - prev_p as u32)
    }
}

/// Conflict counter driving the restart schedule.
#[derive(Debug)]
pub struct RestartState {
    policy: RestartPolicy,
    conflicts_since_restart: u64,
    round: u32,
}

impl RestartState {
    /// Create the state for a policy.
    pub fn new(policy: RestartPolicy) -> Self {
        RestartState {
            policy,
            conflicts_since_restart: 0,
            round: 0,
        }
    }

    /// Conflicts allowed before the next restart fires.
    pub fn interval(&self) -> u64 {
        match self.policy {
            RestartPolicy::Luby { base } => luby(self.round + 1) * base,
            RestartPolicy::Geometric { base, factor } => {
                (base as f64 * factor.powi(self.round as i32)) as u64
            }
        }
    }

    /// Record one conflict.
    #[inline]
    pub fn on_conflict(&mut self) {
        self.conflicts_since_restart += 1;
    }

    /// Whether a restart is due.
    #[inline]
    pub fn due(&self) -> bool {
        self.conflicts_since_restart >= self.interval()
    }

    /// Advance to the next interval after restarting.
    pub fn on_restart(&mut self) {
        self.conflicts_since_restart = 0;
        self.round += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luby_prefix() {
        let expected = [1u64, 1, 2, 1, 1, 2, 4, 1, 1, 2, 1, 1, 2, 4, 8];
        for (i, &want) in expected.iter().enumerate() {
            assert_eq!(luby(i as u32 + 1), want, "luby({})", i + 1);
        }
    }

    #[test]
    fn test_luby_schedule() {
        let mut state = RestartState::new(RestartPolicy::Luby { base: 10 });
        assert_eq!(state.interval(), 10);
        for _ in 0..9 {
            state.on_conflict();
        }
        assert!(!state.due());
        state.on_conflict();
        assert!(state.due());
        state.on_restart();
        assert_eq!(state.interval(), 10); // luby(2) == 1
        state.on_restart();
        assert_eq!(state.interval(), 20); // luby(3) == 2
    }

    #[test]
    fn test_geometric_schedule() {
        let mut state = RestartState::new(RestartPolicy::Geometric {
            base: 100,
            factor: 2.0,
        });
        assert_eq!(state.interval(), 100);
        state.on_restart();
        assert_eq!(state.interval(), 200);
        state.on_restart();
        assert_eq!(state.interval(), 400);
    }
}
