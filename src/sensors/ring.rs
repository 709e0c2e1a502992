//! Fixed-capacity FIFO of integer samples.
//!
//! One buffer per (machine, metric). Capacity is set once from the
//! machine configuration and storage is allocated up front; nothing
//! grows afterwards.
//!
//! Overflow policy is **drop newest**: an enqueue on a full buffer is
//! rejected with [`BufferError::Full`] and the oldest samples stay put.
//! The result is `#[must_use]` so the alerting path has to decide what a
//! drop means for it.

use crate::error::BufferError;

pub struct SampleRingBuffer {
    data: Box<[i32]>,
    /// Index of the oldest sample.
    head: usize,
    /// Index where the next sample is written.
    tail: usize,
    count: usize,
}

impl SampleRingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity].into_boxed_slice(),
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Current occupancy (not capacity).
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == self.data.len()
    }

    /// Append at the tail. Fails with `Full` when `len() == capacity()`.
    #[must_use = "a rejected sample is dropped; handle BufferError::Full"]
    pub fn enqueue(&mut self, value: i32) -> Result<(), BufferError> {
        if self.is_full() {
            return Err(BufferError::Full);
        }
        self.data[self.tail] = value;
        self.tail = (self.tail + 1) % self.data.len();
        self.count += 1;
        Ok(())
    }

    /// Remove and return the oldest sample.
    pub fn dequeue(&mut self) -> Result<i32, BufferError> {
        if self.count == 0 {
            return Err(BufferError::Empty);
        }
        let value = self.data[self.head];
        self.head = (self.head + 1) % self.data.len();
        self.count -= 1;
        Ok(value)
    }

    /// Remove exactly `n` oldest samples, FIFO order.
    ///
    /// All-or-nothing: with fewer than `n` buffered the call fails with
    /// `Insufficient` and the buffer is unchanged.
    pub fn drain_n(&mut self, n: usize) -> Result<Vec<i32>, BufferError> {
        if self.count < n {
            return Err(BufferError::Insufficient {
                requested: n,
                available: self.count,
            });
        }
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.data[self.head]);
            self.head = (self.head + 1) % self.data.len();
        }
        self.count -= n;
        Ok(out)
    }

    /// Discard every buffered sample.
    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.count = 0;
    }
}
