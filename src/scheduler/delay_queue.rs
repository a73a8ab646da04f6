use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
};

use tokio::time::Instant;

// ---

struct Entry<T> {
    due: Instant,
    seq: u64,
    item: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

/// Min-heap of items keyed by due instant. Items due at the same instant come
/// out in push order.
pub struct DelayQueue<T> {
    heap: BinaryHeap<Reverse<Entry<T>>>,
    next_seq: u64,
}

impl<T> Default for DelayQueue<T> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }
}

impl<T> DelayQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: T, due: Instant) {
        // ---
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Entry { due, seq, item }));
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(e)| e.due)
    }

    /// Remove and return every item due at or before `now`, earliest first.
    pub fn pop_due(&mut self, now: Instant) -> Vec<T> {
        // ---
        let mut due = Vec::new();
        while self.next_due().is_some_and(|d| d <= now) {
            if let Some(Reverse(entry)) = self.heap.pop() {
                due.push(entry.item);
            }
        }
        due
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_pops_in_due_order() {
        // ---
        let base = Instant::now();
        let mut queue = DelayQueue::new();
        queue.push("late", base + Duration::from_secs(60));
        queue.push("first", base);
        queue.push("middle", base + Duration::from_secs(30));

        assert_eq!(queue.next_due(), Some(base));
        assert_eq!(queue.pop_due(base), vec!["first"]);
        assert_eq!(queue.pop_due(base + Duration::from_secs(59)), vec!["middle"]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop_due(base + Duration::from_secs(600)), vec!["late"]);
        assert!(queue.is_empty());
        assert_eq!(queue.next_due(), None);
    }

    #[test]
    fn test_ties_keep_push_order() {
        // ---
        let due = Instant::now();
        let mut queue = DelayQueue::new();
        for n in 0..5 {
            queue.push(n, due);
        }
        assert_eq!(queue.pop_due(due), vec![0, 1, 2, 3, 4]);
    }
}
