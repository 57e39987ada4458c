//! Activity-ordered decision heap
//!
//! A binary max-heap over terms keyed by their activity weight, with the
//! heap position stored on the term itself so that bumping a term's
//! activity is an O(log n) increase-key. The heap holds candidates only:
//! assigned terms are filtered lazily at pop time and re-inserted on
//! backtrack.

use y3_core::term::{TermId, TermStore, NO_HEAP_IDX};

/// The decision heap.
#[derive(Debug, Default)]
pub struct TermHeap {
    heap: Vec<TermId>,
}

impl TermHeap {
    /// Create an empty heap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued terms (assigned stragglers included).
    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether the heap holds no terms at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Whether `t` is currently queued.
    #[inline]
    pub fn contains(&self, store: &TermStore, t: TermId) -> bool {
        store.term(t).heap_idx != NO_HEAP_IDX
    }

    /// Queue a term. Idempotent.
    pub fn insert(&mut self, store: &mut TermStore, t: TermId) {
        if self.contains(store, t) {
            return;
        }
        let pos = self.heap.len();
        self.heap.push(t);
        store.term_mut(t).heap_idx = pos as u32;
        self.sift_up(store, pos);
    }

    /// Pop the highest-weight term, or `None` if the heap is empty.
    pub fn pop_max(&mut self, store: &mut TermStore) -> Option<TermId> {
        let top = *self.heap.first()?;
        let last = self.heap.pop().expect("non-empty heap");
        store.term_mut(top).heap_idx = NO_HEAP_IDX;
        if top != last {
            self.heap[0] = last;
            store.term_mut(last).heap_idx = 0;
            self.sift_down(store, 0);
        }
        Some(top)
    }

    /// Restore the heap ordering for `t` after its weight increased.
    pub fn update(&mut self, store: &mut TermStore, t: TermId) {
        let pos = store.term(t).heap_idx;
        if pos != NO_HEAP_IDX {
            self.sift_up(store, pos as usize);
        }
    }

    fn weight(store: &TermStore, t: TermId) -> f64 {
        store.term(t).weight
    }

    fn sift_up(&mut self, store: &mut TermStore, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if Self::weight(store, self.heap[pos]) <= Self::weight(store, self.heap[parent]) {
                break;
            }
            self.swap(store, pos, parent);
            pos = parent;
        }
    }

    fn sift_down(&mut self, store: &mut TermStore, mut pos: usize) {
        loop {
            let left = 2 * pos + 1;
            let right = 2 * pos + 2;
            let mut largest = pos;
            if left < self.heap.len()
                && Self::weight(store, self.heap[left]) > Self::weight(store, self.heap[largest])
            {
                largest = left;
            }
            if right < self.heap.len()
                && Self::weight(store, self.heap[right]) > Self::weight(store, self.heap[largest])
            {
                largest = right;
            }
            if largest == pos {
                break;
            }
            self.swap(store, pos, largest);
            pos = largest;
        }
    }

    fn swap(&mut self, store: &mut TermStore, i: usize, j: usize) {
        self.heap.swap(i, j);
        store.term_mut(self.heap[i]).heap_idx = i as u32;
        store.term_mut(self.heap[j]).heap_idx = j as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use y3_core::term::Type;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct V(u32);

    fn setup(n: u32) -> (TermStore, Vec<TermId>) {
        let mut store = TermStore::new();
        let pid = store.register_plugin("t");
        let terms = (0..n)
            .map(|i| store.intern(pid, V(i), Type::Bool))
            .collect();
        (store, terms)
    }

    #[test]
    fn test_pop_order_follows_weight() {
        let (mut store, terms) = setup(5);
        let mut heap = TermHeap::new();
        for (i, &t) in terms.iter().enumerate() {
            store.term_mut(t).weight = i as f64;
            heap.insert(&mut store, t);
        }
        let mut popped = Vec::new();
        while let Some(t) = heap.pop_max(&mut store) {
            popped.push(t);
        }
        let mut expected = terms.clone();
        expected.reverse();
        assert_eq!(popped, expected);
    }

    #[test]
    fn test_insert_is_idempotent() {
        let (mut store, terms) = setup(1);
        let mut heap = TermHeap::new();
        heap.insert(&mut store, terms[0]);
        heap.insert(&mut store, terms[0]);
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn test_update_after_bump() {
        let (mut store, terms) = setup(3);
        let mut heap = TermHeap::new();
        for &t in &terms {
            heap.insert(&mut store, t);
        }
        store.term_mut(terms[2]).weight = 10.0;
        heap.update(&mut store, terms[2]);
        assert_eq!(heap.pop_max(&mut store), Some(terms[2]));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Popping drains the heap in non-increasing weight order.
            #[test]
            fn prop_pop_order_is_sorted(weights in proptest::collection::vec(0u32..1000, 1..40)) {
                let (mut store, terms) = setup(weights.len() as u32);
                let mut heap = TermHeap::new();
                for (&t, &w) in terms.iter().zip(&weights) {
                    store.term_mut(t).weight = f64::from(w);
                    heap.insert(&mut store, t);
                }
                let mut last = f64::INFINITY;
                while let Some(t) = heap.pop_max(&mut store) {
                    let w = store.term(t).weight;
                    prop_assert!(w <= last, "heap order violated: {w} after {last}");
                    last = w;
                }
            }

            /// Bumping an arbitrary entry keeps the heap consistent.
            #[test]
            fn prop_update_preserves_order(
                weights in proptest::collection::vec(0u32..100, 2..20),
                bump_idx in 0usize..20,
                bump in 1u32..1000,
            ) {
                let (mut store, terms) = setup(weights.len() as u32);
                let mut heap = TermHeap::new();
                for (&t, &w) in terms.iter().zip(&weights) {
                    store.term_mut(t).weight = f64::from(w);
                    heap.insert(&mut store, t);
                }
                let bumped = terms[bump_idx % terms.len()];
                store.term_mut(bumped).weight += f64::from(bump);
                heap.update(&mut store, bumped);

                let mut last = f64::INFINITY;
                while let Some(t) = heap.pop_max(&mut store) {
                    let w = store.term(t).weight;
                    prop_assert!(w <= last);
                    last = w;
                }
            }
        }
    }

    #[test]
    fn test_pop_clears_position(){
        let (mut store, terms) = setup(2);
        let mut heap = TermHeap::new();
        for &t in &terms {
            heap.insert(&mut store, t);
        }
        let t = heap.pop_max(&mut store).unwrap();
        assert!(!heap.contains(&store, t));
        heap.insert(&mut store, t);
        assert!(heap.contains(&store, t));
    }
}
