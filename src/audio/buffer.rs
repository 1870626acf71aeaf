use ringbuf::{traits::*, HeapRb};

/// Rolling sub-buffer for realtime capture windows.
///
/// Owned exclusively by the capture worker thread. Holds the most recent
/// samples up to its capacity, overwriting the oldest when full; a snapshot
/// drains the window so the next one starts fresh.
pub struct RollingBuffer {
    inner: HeapRb<i16>,
}

impl RollingBuffer {
    /// Create a rolling buffer holding `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: HeapRb::new(capacity),
        }
    }

    /// Append samples, discarding the oldest when the window is full.
    pub fn push(&mut self, samples: &[i16]) {
        for &sample in samples {
            if self.inner.try_push(sample).is_err() {
                let _ = self.inner.try_pop();
                let _ = self.inner.try_push(sample);
            }
        }
    }

    /// Take the window contents as f32 samples normalized to [-1, 1],
    /// clearing the buffer.
    pub fn drain_normalized(&mut self) -> Vec<f32> {
        let mut samples = Vec::with_capacity(self.inner.occupied_len());
        while let Some(sample) = self.inner.try_pop() {
            samples.push(sample as f32 / 32768.0);
        }
        samples
    }

    /// Number of samples currently in the window.
    pub fn len(&self) -> usize {
        self.inner.occupied_len()
    }

    /// Check if the window is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Capacity of the window in samples.
    pub fn capacity(&self) -> usize {
        self.inner.capacity().get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_drain() {
        let mut buffer = RollingBuffer::new(1024);
        let data: Vec<i16> = (0..100).collect();

        buffer.push(&data);
        assert_eq!(buffer.len(), 100);

        let drained = buffer.drain_normalized();
        assert_eq!(drained.len(), 100);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_overwrites_oldest_when_full() {
        let mut buffer = RollingBuffer::new(10);
        let data: Vec<i16> = (0..20).collect();

        buffer.push(&data);
        assert_eq!(buffer.len(), 10);

        let drained = buffer.drain_normalized();
        // Only the most recent 10 samples survive.
        assert_eq!(drained[0], 10.0 / 32768.0);
        assert_eq!(drained[9], 19.0 / 32768.0);
    }

    #[test]
    fn test_normalization_range() {
        let mut buffer = RollingBuffer::new(4);
        buffer.push(&[i16::MIN, 0, i16::MAX]);

        let drained = buffer.drain_normalized();
        assert_eq!(drained[0], -1.0);
        assert_eq!(drained[1], 0.0);
        assert!(drained[2] < 1.0 && drained[2] > 0.999);
    }
}
