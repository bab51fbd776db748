//! The bounded, drop-oldest sample queue filled by each sensor task and drained by the
//! dispatcher.

use std::collections::VecDeque;

use crate::protocol::{MAX_PAYLOAD, QUEUE_DEPTH};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// A single timestamped reading from a driver.
pub struct Sample {
    /// Monotonic millisecond tick at which the driver finished the read.
    pub tick: u32,
    /// Number of valid bytes in `bytes`. Always `<= MAX_PAYLOAD`.
    pub len: u8,
    /// Raw payload bytes, driver-defined. Only `bytes[..len]` is meaningful.
    pub bytes: [u8; MAX_PAYLOAD],
}

impl Sample {
    /// Construct a sample from a tick and a slice, which must fit in `MAX_PAYLOAD` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `data.len() > MAX_PAYLOAD`. Callers are expected to have already rejected
    /// oversized reads before ever constructing a `Sample`.
    #[must_use]
    pub fn new(tick: u32, data: &[u8]) -> Sample {
        assert!(data.len() <= MAX_PAYLOAD);
        let mut bytes = [0u8; MAX_PAYLOAD];
        bytes[..data.len()].copy_from_slice(data);
        Sample {
            tick,
            len: data.len() as u8,
            bytes,
        }
    }

    /// The meaningful slice of this sample's payload.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.bytes[..usize::from(self.len)]
    }
}

/// A bounded FIFO of samples. When full, `push` evicts the oldest element first.
pub struct SampleQueue {
    items: VecDeque<Sample>,
}

impl SampleQueue {
    /// Construct an empty queue with capacity `QUEUE_DEPTH`.
    #[must_use]
    pub fn new() -> SampleQueue {
        SampleQueue {
            items: VecDeque::with_capacity(QUEUE_DEPTH),
        }
    }

    /// Push a sample, dropping the oldest one first if the queue is already full.
    ///
    /// Never blocks and never fails.
    pub fn push(&mut self, sample: Sample) {
        if self.items.len() == QUEUE_DEPTH {
            self.items.pop_front();
        }
        self.items.push_back(sample);
    }

    /// Drain up to `max` samples in FIFO order, returning how many were drained.
    pub fn drain_into(&mut self, out: &mut Vec<Sample>, max: usize) -> usize {
        let n = max.min(self.items.len());
        out.extend(self.items.drain(..n));
        n
    }

    /// Drop every queued sample.
    pub fn flush(&mut self) {
        self.items.clear();
    }

    /// Number of queued samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for SampleQueue {
    fn default() -> Self {
        SampleQueue::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(tick: u32) -> Sample {
        Sample::new(tick, &[tick as u8])
    }

    #[test]
    /// Pushing within capacity keeps everything, in order.
    fn push_within_capacity() {
        let mut q = SampleQueue::new();
        for t in 0..QUEUE_DEPTH as u32 {
            q.push(sample(t));
        }
        assert_eq!(q.len(), QUEUE_DEPTH);
        let mut out = Vec::new();
        q.drain_into(&mut out, QUEUE_DEPTH);
        let ticks: Vec<u32> = out.iter().map(|s| s.tick).collect();
        assert_eq!(ticks, (0..QUEUE_DEPTH as u32).collect::<Vec<_>>());
    }

    #[test]
    /// Overflowing the queue keeps only the most recent `QUEUE_DEPTH` samples.
    fn drop_oldest_on_overflow() {
        let mut q = SampleQueue::new();
        for t in 0..(QUEUE_DEPTH as u32 + 5) {
            q.push(sample(t));
        }
        assert_eq!(q.len(), QUEUE_DEPTH);
        let mut out = Vec::new();
        q.drain_into(&mut out, QUEUE_DEPTH);
        let ticks: Vec<u32> = out.iter().map(|s| s.tick).collect();
        assert_eq!(ticks, (5..(QUEUE_DEPTH as u32 + 5)).collect::<Vec<_>>());
    }

    #[test]
    /// Partial drains return only the requested count and preserve the remainder in order.
    fn partial_drain_preserves_order() {
        let mut q = SampleQueue::new();
        for t in 0..4 {
            q.push(sample(t));
        }
        let mut out = Vec::new();
        let n = q.drain_into(&mut out, 2);
        assert_eq!(n, 2);
        assert_eq!(out.iter().map(|s| s.tick).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(q.len(), 2);

        let mut rest = Vec::new();
        q.drain_into(&mut rest, 10);
        assert_eq!(rest.iter().map(|s| s.tick).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn flush_empties_queue() {
        let mut q = SampleQueue::new();
        q.push(sample(0));
        q.push(sample(1));
        q.flush();
        assert!(q.is_empty());
    }
}
