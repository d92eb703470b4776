//! Lock-free single-producer/single-consumer event ring.
//!
//! A fixed array of slots plus two monotonically increasing cursors:
//! - The producer writes slot `write & mask`, then publishes `write + 1`
//! - The consumer copies slots from `read` up to its cached `write`
//!
//! The producer never looks at the consumer's cursor. When it laps the
//! consumer it silently overwrites the oldest unread slot; the consumer
//! notices on its next drain and skips forward, so a drain only ever sees the
//! newest `capacity` events, in push order.
//!
//! Each slot carries a stamp derived from the cursor value that last wrote
//! it. The consumer validates the stamp before and after copying, which
//! rejects a slot the producer is rewriting concurrently instead of handing
//! out a torn event.
//!
//! The overflow count is mirrored into a shared atomic so housekeeping code
//! can read it through a [`RingStats`] handle while the consumer lives on the
//! audio thread.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{fence, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

struct Slot<T> {
    /// `2 * index + 1` while being written, `2 * index + 2` once complete
    stamp: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

struct RingShared<T> {
    slots: Box<[Slot<T>]>,
    mask: usize,
    /// Next cursor the producer will write (published with Release)
    write: AtomicUsize,
    /// Next cursor the consumer will read (informational, for `len`)
    read: AtomicUsize,
    /// Consumer's overflow count, stored Relaxed after each update
    dropped: Arc<AtomicU64>,
}

// Safety: slot contents are only written by the single producer and only
// copied out (never referenced) by the single consumer, guarded by stamps.
unsafe impl<T: Send> Send for RingShared<T> {}
unsafe impl<T: Send> Sync for RingShared<T> {}

fn writing_stamp(index: usize) -> usize {
    index.wrapping_mul(2).wrapping_add(1)
}

fn ready_stamp(index: usize) -> usize {
    index.wrapping_mul(2).wrapping_add(2)
}

impl<T: Copy> RingShared<T> {
    fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(2).next_power_of_two();
        let slots = (0..capacity)
            .map(|_| Slot {
                stamp: AtomicUsize::new(0),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            slots,
            mask: capacity - 1,
            write: AtomicUsize::new(0),
            read: AtomicUsize::new(0),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Copy the event stored for cursor `index`, or `None` if that slot has
    /// since been claimed by a newer write.
    fn try_read(&self, index: usize) -> Option<T> {
        let slot = &self.slots[index & self.mask];
        let expected = ready_stamp(index);
        if slot.stamp.load(Ordering::Acquire) != expected {
            return None;
        }
        // Safety: the stamp says this slot held a complete value for `index`.
        // A racing overwrite is detected by the re-check below and the copy
        // is discarded without being interpreted.
        let value = unsafe { ptr::read_volatile(slot.value.get()) };
        fence(Ordering::Acquire);
        if slot.stamp.load(Ordering::Relaxed) != expected {
            return None;
        }
        // Safety: validated above
        Some(unsafe { value.assume_init() })
    }
}

/// Create a ring with room for `capacity` events (rounded up to a power of
/// two, minimum 2) and split it into its two endpoints.
pub fn event_ring<T: Copy + Send>(capacity: usize) -> (EventProducer<T>, EventConsumer<T>) {
    let shared = Arc::new(RingShared::with_capacity(capacity));
    (
        EventProducer {
            shared: Arc::clone(&shared),
            write: 0,
        },
        EventConsumer {
            shared,
            read: 0,
            dropped: 0,
        },
    )
}

/// Write endpoint. Owned by exactly one thread (e.g. the MIDI driver callback).
pub struct EventProducer<T> {
    shared: Arc<RingShared<T>>,
    write: usize,
}

impl<T: Copy + Send> EventProducer<T> {
    /// Append an event. Never blocks, never allocates, never fails; on
    /// overflow the oldest unread event is overwritten.
    #[inline]
    pub fn push(&mut self, event: T) {
        let index = self.write;
        let slot = &self.shared.slots[index & self.shared.mask];

        slot.stamp.store(writing_stamp(index), Ordering::Relaxed);
        fence(Ordering::Release);
        // Safety: only this producer writes slots; readers validate stamps
        unsafe {
            ptr::write_volatile(slot.value.get(), MaybeUninit::new(event));
        }
        slot.stamp.store(ready_stamp(index), Ordering::Release);

        self.write = index.wrapping_add(1);
        self.shared.write.store(self.write, Ordering::Release);
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }
}

/// Read endpoint. Owned by exactly one thread (the audio callback).
pub struct EventConsumer<T> {
    shared: Arc<RingShared<T>>,
    read: usize,
    dropped: u64,
}

impl<T: Copy + Send> EventConsumer<T> {
    /// Apply every pending event in push order, up to the write cursor
    /// observed on entry. Returns the number of events applied.
    ///
    /// If the producer laps the consumer mid-drain the cursor is re-read
    /// once; a producer that keeps lapping cannot extend the drain further.
    pub fn drain<F: FnMut(T)>(&mut self, mut apply: F) -> usize {
        let mut write = self.shared.write.load(Ordering::Acquire);
        let mut resynced = false;
        let mut applied = 0;

        loop {
            self.skip_overwritten(write);
            if self.read == write {
                break;
            }
            match self.shared.try_read(self.read) {
                Some(event) => {
                    apply(event);
                    applied += 1;
                }
                None => {
                    // Lapped mid-drain: this slot now belongs to a newer event
                    self.dropped += 1;
                    if !resynced {
                        write = self.shared.write.load(Ordering::Acquire);
                        resynced = true;
                    }
                }
            }
            self.read = self.read.wrapping_add(1);
        }

        self.shared.read.store(self.read, Ordering::Release);
        self.publish_dropped();
        applied
    }

    /// Pop a single event, if any.
    pub fn pop(&mut self) -> Option<T> {
        loop {
            let write = self.shared.write.load(Ordering::Acquire);
            self.skip_overwritten(write);
            if self.read == write {
                return None;
            }
            let index = self.read;
            self.read = self.read.wrapping_add(1);
            self.shared.read.store(self.read, Ordering::Release);
            let event = self.shared.try_read(index);
            if event.is_none() {
                self.dropped += 1;
            }
            self.publish_dropped();
            if event.is_some() {
                return event;
            }
        }
    }

    fn publish_dropped(&self) {
        self.shared.dropped.store(self.dropped, Ordering::Relaxed);
    }

    fn skip_overwritten(&mut self, write: usize) {
        let behind = write.wrapping_sub(self.read);
        let capacity = self.shared.capacity();
        if behind > capacity {
            self.dropped += (behind - capacity) as u64;
            self.read = write.wrapping_sub(capacity);
        }
    }

    /// Number of unread events (capped at capacity).
    pub fn len(&self) -> usize {
        let write = self.shared.write.load(Ordering::Acquire);
        write.wrapping_sub(self.read).min(self.shared.capacity())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events lost to overflow since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// A handle for reading the overflow count from other threads.
    pub fn stats(&self) -> RingStats {
        RingStats {
            dropped: Arc::clone(&self.shared.dropped),
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }
}

/// Read-only view of a ring's overflow count, usable off the audio thread.
/// Lags the consumer by at most one drain.
#[derive(Clone)]
pub struct RingStats {
    dropped: Arc<AtomicU64>,
}

impl RingStats {
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::thread;

    #[test]
    fn test_capacity_rounds_to_power_of_two() {
        let (producer, consumer) = event_ring::<u32>(100);
        assert_eq!(producer.capacity(), 128);
        assert_eq!(consumer.capacity(), 128);
        let (producer, _) = event_ring::<u32>(0);
        assert_eq!(producer.capacity(), 2);
    }

    #[test]
    fn test_drain_preserves_order() {
        let (mut producer, mut consumer) = event_ring::<u32>(8);
        for i in 0..5 {
            producer.push(i);
        }
        let mut seen = Vec::new();
        assert_eq!(consumer.drain(|e| seen.push(e)), 5);
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert!(consumer.is_empty());
        assert_eq!(consumer.drain(|_| panic!("nothing pending")), 0);
    }

    #[test]
    fn test_overflow_keeps_newest_capacity_events() {
        let (mut producer, mut consumer) = event_ring::<u32>(8);
        for i in 0..21 {
            producer.push(i);
        }
        assert_eq!(consumer.len(), 8);
        let mut seen = Vec::new();
        consumer.drain(|e| seen.push(e));
        assert_eq!(seen, (13..21).collect::<Vec<_>>());
        assert_eq!(consumer.dropped(), 13);
    }

    #[test]
    fn test_exactly_full_is_not_overflow() {
        let (mut producer, mut consumer) = event_ring::<u32>(4);
        for i in 0..4 {
            producer.push(i);
        }
        let mut seen = Vec::new();
        consumer.drain(|e| seen.push(e));
        assert_eq!(seen, vec![0, 1, 2, 3]);
        assert_eq!(consumer.dropped(), 0);
    }

    #[test]
    fn test_interleaved_push_and_drain() {
        let (mut producer, mut consumer) = event_ring::<u32>(4);
        let mut seen = Vec::new();
        for round in 0..10u32 {
            producer.push(round * 2);
            producer.push(round * 2 + 1);
            consumer.drain(|e| seen.push(e));
        }
        assert_eq!(seen, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_pop() {
        let (mut producer, mut consumer) = event_ring::<u32>(4);
        assert_eq!(consumer.pop(), None);
        producer.push(7);
        producer.push(8);
        assert_eq!(consumer.pop(), Some(7));
        assert_eq!(consumer.pop(), Some(8));
        assert_eq!(consumer.pop(), None);
    }

    #[test]
    fn test_stats_visible_from_another_thread() {
        let (mut producer, mut consumer) = event_ring::<u32>(4);
        let stats = consumer.stats();
        assert_eq!(stats.dropped(), 0);

        let audio = thread::spawn(move || {
            for i in 0..10 {
                producer.push(i);
            }
            consumer.drain(|_| {});
            consumer.dropped()
        });
        let dropped = audio.join().unwrap();
        assert_eq!(dropped, 6);

        let reader = stats.clone();
        let seen = thread::spawn(move || reader.dropped()).join().unwrap();
        assert_eq!(seen, 6);
        assert_eq!(stats.dropped(), 6);
    }

    #[test]
    fn test_drain_is_bounded_when_producer_keeps_lapping() {
        let (mut producer, mut consumer) = event_ring::<u32>(4);
        for i in 0..4 {
            producer.push(i);
        }
        // Every applied event pushes more than a full ring, lapping the
        // consumer again before its next read.
        let mut next = 4;
        let applied = consumer.drain(|_| {
            for _ in 0..5 {
                producer.push(next);
                next += 1;
            }
        });
        assert!(applied >= 1);
        assert!(applied <= 2 * consumer.capacity());
        assert!(consumer.dropped() > 0);
        assert_eq!(consumer.stats().dropped(), consumer.dropped());
    }

    #[derive(Clone, Copy)]
    struct Pair {
        seq: u64,
        check: u64,
    }

    #[test]
    fn test_concurrent_events_are_never_torn() {
        const COUNT: u64 = 200_000;
        let (mut producer, mut consumer) = event_ring::<Pair>(64);
        let done = Arc::new(AtomicBool::new(false));
        let done_writer = Arc::clone(&done);

        let writer = thread::spawn(move || {
            for seq in 0..COUNT {
                producer.push(Pair { seq, check: !seq });
            }
            done_writer.store(true, Ordering::Release);
        });

        let mut last: Option<u64> = None;
        loop {
            let finished = done.load(Ordering::Acquire);
            consumer.drain(|pair| {
                assert_eq!(pair.check, !pair.seq, "torn event");
                if let Some(prev) = last {
                    assert!(pair.seq > prev, "out of order: {} after {}", pair.seq, prev);
                }
                last = Some(pair.seq);
            });
            if finished {
                consumer.drain(|_| {});
                break;
            }
        }
        writer.join().unwrap();
        assert_eq!(last, Some(COUNT - 1));
    }

    #[test]
    fn test_concurrent_no_loss_within_capacity() {
        const BATCHES: usize = 500;
        const BATCH: usize = 16;
        let (mut producer, mut consumer) = event_ring::<usize>(BATCH);
        // Test-only handshake so the writer never outruns the ring
        let consumed = Arc::new(AtomicUsize::new(0));
        let consumed_writer = Arc::clone(&consumed);

        let writer = thread::spawn(move || {
            for batch in 0..BATCHES {
                while consumed_writer.load(Ordering::Acquire) < batch * BATCH {
                    thread::yield_now();
                }
                for i in 0..BATCH {
                    producer.push(batch * BATCH + i);
                }
            }
        });

        let mut seen = Vec::with_capacity(BATCHES * BATCH);
        while seen.len() < BATCHES * BATCH {
            consumer.drain(|e| seen.push(e));
            consumed.store(seen.len(), Ordering::Release);
        }
        writer.join().unwrap();
        assert_eq!(consumer.dropped(), 0);
        assert_eq!(seen, (0..BATCHES * BATCH).collect::<Vec<_>>());
    }
}
