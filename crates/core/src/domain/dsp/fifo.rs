//! Mirrored sample ring used by the pitch shifter
//!
//! The ring stores every sample twice, in two halves offset by `capacity`,
//! so the most recent `capacity` samples are always readable as one
//! contiguous slice. Index 0 of [`SampleFifo::window`] is the newest sample,
//! index `k` the sample pushed `k` pushes earlier.

/// Fixed-capacity FIFO with a wraparound-free history window
#[derive(Debug, Clone)]
pub struct SampleFifo {
    buffer: Vec<f32>,
    head: usize,
    capacity: usize,
}

impl SampleFifo {
    /// Create a ring holding `capacity` samples, initially all zero
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "fifo capacity must be non-zero");
        Self {
            buffer: vec![0.0; 2 * capacity - 1],
            head: 0,
            capacity,
        }
    }

    /// Push a sample and return the one it evicts (the sample of age `capacity - 1`)
    #[inline]
    pub fn push(&mut self, sample: f32) -> f32 {
        self.head = if self.head == 0 {
            self.capacity - 1
        } else {
            self.head - 1
        };

        let evicted = self.buffer[self.head];
        self.buffer[self.head] = sample;
        if let Some(mirror) = self.mirror_of(self.head) {
            self.buffer[mirror] = sample;
        }
        evicted
    }

    /// The full history, newest first
    #[inline]
    pub fn window(&self) -> &[f32] {
        &self.buffer[self.head..self.head + self.capacity]
    }

    /// Add `value` into the sample of the given age, keeping both halves in step
    ///
    /// Ages outside the ring are ignored.
    #[inline]
    pub fn accumulate(&mut self, age: usize, value: f32) {
        if age >= self.capacity {
            return;
        }
        let index = self.head + age;
        let sum = self.buffer[index] + value;
        self.buffer[index] = sum;
        if let Some(mirror) = self.mirror_of(index) {
            self.buffer[mirror] = sum;
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Zero the history
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.head = 0;
    }

    /// Physical index holding the same logical sample as `index`, if any
    ///
    /// Cells `0..capacity-1` are mirrored at `+capacity`; cell `capacity-1` is unique.
    #[inline]
    fn mirror_of(&self, index: usize) -> Option<usize> {
        if index + self.capacity < self.buffer.len() {
            Some(index + self.capacity)
        } else if index >= self.capacity {
            Some(index - self.capacity)
        } else {
            None
        }
    }
}
