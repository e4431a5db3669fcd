use std::collections::VecDeque;

/// Fixed-capacity FIFO history of vertical (`z`) acceleration values
#[derive(Debug, Clone)]
pub struct SlidingWindowBuffer {
    window: VecDeque<f64>,
    capacity: usize,
}

impl SlidingWindowBuffer {
    pub fn new(capacity: usize) -> Self {
        SlidingWindowBuffer {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a value, evicting the oldest once at capacity
    pub fn push(&mut self, value: f64) {
        self.window.push_back(value);
        while self.window.len() > self.capacity {
            self.window.pop_front();
        }
    }

    /// Oldest-first, read-only view of the buffered values
    pub fn snapshot(&self) -> &VecDeque<f64> {
        &self.window
    }

    pub fn clear(&mut self) {
        self.window.clear();
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<f64> {
        self.window.back().copied()
    }

    /// The newest `n` values (fewer if the buffer is shorter), oldest first
    pub fn tail(&self, n: usize) -> Vec<f64> {
        let start = self.window.len().saturating_sub(n);
        self.window.iter().skip(start).copied().collect()
    }
}
