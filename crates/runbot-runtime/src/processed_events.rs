use std::collections::{HashSet, VecDeque};

#[derive(Debug, Clone)]
/// Bounded record of handled event ids. The oldest id is forgotten first.
pub struct ProcessedEventCache {
    cap: usize,
    order: VecDeque<String>,
    index: HashSet<String>,
}

impl ProcessedEventCache {
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            order: VecDeque::new(),
            index: HashSet::new(),
        }
    }

    pub fn contains(&self, event_id: &str) -> bool {
        self.index.contains(event_id)
    }

    /// Records `event_id`; returns `false` when it was already recorded.
    pub fn mark_processed(&mut self, event_id: &str) -> bool {
        if self.index.contains(event_id) {
            return false;
        }
        self.order.push_back(event_id.to_string());
        self.index.insert(event_id.to_string());
        while self.order.len() > self.cap {
            if let Some(evicted) = self.order.pop_front() {
                self.index.remove(&evicted);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
