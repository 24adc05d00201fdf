use super::Position;
use std::collections::VecDeque;

/// Fixes in arrival order. With a capacity, the oldest entry is evicted
/// once the log is full; capacity 0 keeps everything.
#[derive(Debug, Clone, Default)]
pub struct FixLog {
    entries: VecDeque<Position>,
    capacity: usize,
    evicted: u64,
}

impl FixLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
            evicted: 0,
        }
    }

    pub fn push(&mut self, position: Position) {
        if self.capacity > 0 {
            while self.entries.len() >= self.capacity {
                self.entries.pop_front();
                self.evicted += 1;
            }
        }
        self.entries.push_back(position);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&Position> {
        self.entries.back()
    }

    /// Number of entries dropped to stay within capacity.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.entries.iter()
    }
}
