/// Fixed-size sliding window over the most recent samples.
///
/// Every write lands twice, once in each half of the backing vector, so the
/// current window is always one contiguous slice and reads never copy.
#[derive(Debug, Clone)]
pub struct HistoryBuffer<T: Clone> {
    buffer: Vec<T>,
    write_position: usize,
    capacity: usize,
}

impl<T: Clone> HistoryBuffer<T> {
    /// Creates a window of `capacity` slots, all holding `baseline`.
    ///
    /// # Panics
    /// If `capacity` is zero.
    pub fn new(capacity: usize, baseline: T) -> Self {
        assert!(capacity > 0, "history capacity must be non-zero");
        HistoryBuffer {
            buffer: vec![baseline; capacity * 2],
            write_position: 0,
            capacity,
        }
    }

    /// Drops the oldest sample and appends `value` at the tail.
    pub fn push(&mut self, value: T) {
        let position = self.write_position;
        self.buffer[position] = value.clone();
        self.buffer[position + self.capacity] = value;

        self.write_position = (position + 1) % self.capacity;
    }

    /// The whole window, oldest first.
    pub fn read(&self) -> &[T] {
        self.tail(self.capacity)
    }

    /// The newest `len` samples, oldest first. `len` is clamped to the capacity.
    pub fn tail(&self, len: usize) -> &[T] {
        let len = len.min(self.capacity);
        let start = self.write_position + (self.capacity - len);
        &self.buffer[start..start + len]
    }

    pub fn latest(&self) -> &T {
        let newest = (self.write_position + self.capacity - 1) % self.capacity;
        &self.buffer[newest]
    }

    pub fn len(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
