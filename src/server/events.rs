//! Per-session event coalescer (C9, §4.6, §8 property 5).

use std::collections::VecDeque;

use crate::accessory::Value;

/// Default ring-buffer depth, matching the original firmware's fixed event
/// queue size.
pub const DEFAULT_CAPACITY: usize = 4;

#[derive(Debug, Clone)]
pub struct CharacteristicEvent {
    pub aid: u64,
    pub iid: u64,
    pub value: Value,
}

/// Bounded, overwrite-oldest queue of pending characteristic changes for
/// one client. A stale value is never useful once fresher data exists, so
/// under backpressure the oldest pending event is simply dropped (§4.6
/// rationale).
pub struct EventQueue {
    capacity: usize,
    buf: VecDeque<CharacteristicEvent>,
}

impl EventQueue {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            buf: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, event: CharacteristicEvent) {
        if self.buf.len() >= self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(event);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Drain the queue, collapsing to at most one event per distinct
    /// `(aid,iid)` — later values win (§4.6 step 2).
    pub fn drain_collapsed(&mut self) -> Vec<CharacteristicEvent> {
        let mut order: Vec<(u64, u64)> = Vec::new();
        let mut latest: std::collections::HashMap<(u64, u64), CharacteristicEvent> = std::collections::HashMap::new();

        for event in self.buf.drain(..) {
            let key = (event.aid, event.iid);
            if !latest.contains_key(&key) {
                order.push(key);
            }
            latest.insert(key, event);
        }

        order.into_iter().filter_map(|key| latest.remove(&key)).collect()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overwrites_oldest_when_over_capacity() {
        let mut q = EventQueue::new(2);
        q.push(CharacteristicEvent { aid: 1, iid: 1, value: Value::Bool(true) });
        q.push(CharacteristicEvent { aid: 1, iid: 2, value: Value::Bool(true) });
        q.push(CharacteristicEvent { aid: 1, iid: 3, value: Value::Bool(true) });

        let drained = q.drain_collapsed();
        assert_eq!(drained.len(), 2);
        assert_eq!((drained[0].aid, drained[0].iid), (1, 2));
        assert_eq!((drained[1].aid, drained[1].iid), (1, 3));
    }

    #[test]
    fn collapses_duplicate_characteristics_to_latest_value() {
        let mut q = EventQueue::new(4);
        q.push(CharacteristicEvent { aid: 1, iid: 5, value: Value::Uint8(1) });
        q.push(CharacteristicEvent { aid: 1, iid: 5, value: Value::Uint8(2) });
        q.push(CharacteristicEvent { aid: 1, iid: 6, value: Value::Bool(true) });

        let drained = q.drain_collapsed();
        assert_eq!(drained.len(), 2);
        let five = drained.iter().find(|e| e.iid == 5).unwrap();
        assert_eq!(five.value, Value::Uint8(2));
    }

    #[test]
    fn drain_empties_the_queue() {
        let mut q = EventQueue::new(4);
        q.push(CharacteristicEvent { aid: 1, iid: 1, value: Value::Bool(true) });
        let _ = q.drain_collapsed();
        assert!(q.is_empty());
    }
}
