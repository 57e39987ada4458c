//! The assignment trail
//!
//! A totally ordered log of assigned terms with decision-level
//! boundaries. The trail doubles as the propagation queue: `qhead` marks
//! the first assignment whose consequences have not been drawn yet.
//! Backtracking truncates at a level boundary and hands the popped terms
//! and the backtrack hooks registered above the target level back to the
//! driver, hooks in LIFO order.

use y3_core::plugin::BacktrackHook;
use y3_core::term::{PluginId, TermId};

/// The trail.
#[derive(Default)]
pub struct Trail {
    queue: Vec<TermId>,
    /// `level_starts[l - 1]` is the queue index where level `l` begins.
    level_starts: Vec<usize>,
    hooks: Vec<(u32, PluginId, BacktrackHook)>,
    qhead: usize,
}

impl Trail {
    /// Create an empty trail at level 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current decision level.
    #[inline]
    pub fn level(&self) -> u32 {
        self.level_starts.len() as u32
    }

    /// Number of assignments on the trail.
    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the trail is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// The assignments in trail order.
    #[inline]
    pub fn assignments(&self) -> &[TermId] {
        &self.queue
    }

    /// Queue index where `level` begins.
    #[inline]
    pub fn level_start(&self, level: u32) -> usize {
        if level == 0 {
            0
        } else {
            self.level_starts[level as usize - 1]
        }
    }

    /// Open a new decision level.
    pub fn new_level(&mut self) {
        self.level_starts.push(self.queue.len());
    }

    /// Append an assigned term at the current level.
    pub fn push(&mut self, t: TermId) {
        self.queue.push(t);
    }

    /// Next queued term whose consequences are still to be drawn.
    pub fn next_queued(&mut self) -> Option<TermId> {
        if self.qhead < self.queue.len() {
            let t = self.queue[self.qhead];
            self.qhead += 1;
            Some(t)
        } else {
            None
        }
    }

    /// Whether the propagation queue has been drained.
    #[inline]
    pub fn fully_propagated(&self) -> bool {
        self.qhead == self.queue.len()
    }

    /// Register a backtrack hook at `level` for `plugin`.
    pub fn add_hook(&mut self, level: u32, plugin: PluginId, hook: BacktrackHook) {
        self.hooks.push((level, plugin, hook));
    }

    /// Truncate to `level`, returning the popped terms in trail order and
    /// the hooks registered above `level` in LIFO order. The caller clears
    /// the popped assignments and runs the hooks.
    pub fn pop_to(&mut self, level: u32) -> (Vec<TermId>, Vec<(PluginId, BacktrackHook)>) {
        debug_assert!(level <= self.level());
        if level == self.level() {
            return (Vec::new(), Vec::new());
        }
        let keep = self.level_start(level + 1);
        let popped = self.queue.split_off(keep);
        self.level_starts.truncate(level as usize);
        self.qhead = self.queue.len();

        let mut fired = Vec::new();
        while let Some((l, _, _)) = self.hooks.last() {
            if *l > level {
                let (_, pid, hook) = self.hooks.pop().expect("non-empty hook stack");
                fired.push((pid, hook));
            } else {
                break;
            }
        }
        (popped, fired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(i: u32) -> TermId {
        TermId(i)
    }

    #[test]
    fn test_levels_and_truncation() {
        let mut trail = Trail::new();
        trail.push(t(0));
        trail.new_level();
        trail.push(t(1));
        trail.push(t(2));
        trail.new_level();
        trail.push(t(3));
        assert_eq!(trail.level(), 2);
        assert_eq!(trail.level_start(1), 1);
        assert_eq!(trail.level_start(2), 3);

        let (popped, hooks) = trail.pop_to(1);
        assert_eq!(popped, vec![t(3)]);
        assert!(hooks.is_empty());
        assert_eq!(trail.level(), 1);
        assert_eq!(trail.assignments(), &[t(0), t(1), t(2)]);
    }

    #[test]
    fn test_queue_head_tracks_propagation() {
        let mut trail = Trail::new();
        trail.push(t(0));
        trail.push(t(1));
        assert_eq!(trail.next_queued(), Some(t(0)));
        assert!(!trail.fully_propagated());
        assert_eq!(trail.next_queued(), Some(t(1)));
        assert_eq!(trail.next_queued(), None);
        assert!(trail.fully_propagated());
    }

    #[test]
    fn test_hooks_fire_lifo_above_target() {
        let mut trail = Trail::new();
        trail.new_level();
        trail.add_hook(1, PluginId(0), Box::new(|_| {}));
        trail.new_level();
        trail.add_hook(2, PluginId(1), Box::new(|_| {}));
        trail.add_hook(2, PluginId(2), Box::new(|_| {}));

        let (_, fired) = trail.pop_to(1);
        let pids: Vec<_> = fired.iter().map(|(p, _)| *p).collect();
        assert_eq!(pids, vec![PluginId(2), PluginId(1)]);
        assert_eq!(trail.level(), 1);

        let (_, fired) = trail.pop_to(0);
        let pids: Vec<_> = fired.iter().map(|(p, _)| *p).collect();
        assert_eq!(pids, vec![PluginId(0)]);
    }

    #[test]
    fn test_pop_to_current_level_is_noop() {
        let mut trail = Trail::new();
        trail.push(t(0));
        trail.new_level();
        trail.push(t(1));
        let (popped, _) = trail.pop_to(1);
        assert!(popped.is_empty());
        assert_eq!(trail.len(), 2);
    }
}
