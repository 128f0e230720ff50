//! A fixed-capacity SPSC FIFO of 16-bit output levels.
//!
//! The producer half lives with the decoder and the consumer half lives in the tick callback.  Neither half ever
//! blocks: [FifoProducer::try_push] fails when the FIFO is full and [FifoConsumer::next_level] holds the previous level
//! when it is empty.  Callers decide how to wait.
//!
//! Slots are initialized to [SILENCE], so a freshly created FIFO is already primed for a new playback session.
use std::num::NonZeroUsize;

use crossbeam::utils::CachePadded;

use crate::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, Ordering};
use crate::sync::Arc;

/// Mid-scale output level.
pub const SILENCE: u16 = 32768;

// Implementation:
//
// A ring with a cursor per side is ambiguous: equal cursors mean either empty or full.  Like the synchronization
// rings this grew out of, we don't wrap the stored positions.  They are u64 counters of everything ever written and
// read, so `write - read` is the fill count and is never ambiguous.  The cursors into the slot array are the positions
// wrapped by the capacity.
struct Fifo {
    slots: Box<[AtomicU16]>,

    /// Fast `position / capacity`.  `None` only if the divisor isn't representable, in which case we divide.
    divider: Option<reciprocal::Reciprocal>,

    read_position: CachePadded<AtomicU64>,
    write_position: CachePadded<AtomicU64>,

    /// Whether the output clock is currently attached and consuming.
    active: AtomicBool,

    /// Ticks which found nothing to read.
    underruns: AtomicU64,
}

impl Fifo {
    fn new(capacity: NonZeroUsize) -> Self {
        let slots = (0..capacity.get())
            .map(|_| AtomicU16::new(SILENCE))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Fifo {
            slots,
            divider: reciprocal::Reciprocal::new(capacity.get() as u64),
            read_position: CachePadded::new(AtomicU64::new(0)),
            write_position: CachePadded::new(AtomicU64::new(0)),
            active: AtomicBool::new(false),
            underruns: AtomicU64::new(0),
        }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Perform `position % capacity`, but efficiently.
    fn wrap(&self, position: u64) -> usize {
        let capacity = self.capacity() as u64;
        let whole_count = match &self.divider {
            Some(d) => d.apply(position),
            None => position / capacity,
        };
        let remainder = position - whole_count * capacity;
        debug_assert!(remainder < capacity);
        remainder as usize
    }

    /// Fill count as seen by a third party.
    ///
    /// The read position is loaded first.  Loading the write position second can only observe a larger value, so the
    /// difference never underflows; it may briefly overshoot the capacity if the consumer moved between the loads, so
    /// it is clamped.
    fn observed_fill(&self) -> usize {
        let read = self.read_position.load(Ordering::Acquire);
        let write = self.write_position.load(Ordering::Acquire);
        (write.saturating_sub(read) as usize).min(self.capacity())
    }
}

/// The writing half of a sample FIFO.  Owned by the decode loop.
pub struct FifoProducer {
    fifo: Arc<Fifo>,
}

/// The reading half of a sample FIFO.  Owned by the tick callback.
pub struct FifoConsumer {
    fifo: Arc<Fifo>,

    /// What the output currently holds.  Re-emitted on underrun.
    last_level: u16,
}

/// Read-mostly view of a FIFO for code that is neither the producer nor the consumer.
///
/// Everything here is a snapshot of state the other halves are concurrently changing.
#[derive(Clone)]
pub struct FifoMonitor {
    fifo: Arc<Fifo>,
}

/// Allocate a FIFO of the given capacity with every slot holding [SILENCE].
pub fn create_fifo(capacity: NonZeroUsize) -> (FifoProducer, FifoConsumer) {
    let fifo = Arc::new(Fifo::new(capacity));
    (
        FifoProducer { fifo: fifo.clone() },
        FifoConsumer {
            fifo,
            last_level: SILENCE,
        },
    )
}

impl FifoProducer {
    /// Append a level if there is room.  On a full FIFO the level is handed back.
    ///
    /// The write cursor never advances onto the read cursor: a full FIFO stays full until the consumer reads.
    pub fn try_push(&mut self, level: u16) -> Result<(), u16> {
        let fifo = &*self.fifo;
        // We are the only writer of the write position.  The read position must be acquired so that we do not
        // overwrite a slot the consumer has not finished loading.
        let write = fifo.write_position.load(Ordering::Relaxed);
        let read = fifo.read_position.load(Ordering::Acquire);

        if write - read >= fifo.capacity() as u64 {
            return Err(level);
        }

        fifo.slots[fifo.wrap(write)].store(level, Ordering::Relaxed);
        fifo.write_position.store(write + 1, Ordering::Release);
        Ok(())
    }

    /// Free slots.  The consumer may free more at any time, so the real value is `>=` this.
    pub fn available(&self) -> usize {
        let fifo = &*self.fifo;
        let write = fifo.write_position.load(Ordering::Relaxed);
        let read = fifo.read_position.load(Ordering::Acquire);
        fifo.capacity() - (write - read) as usize
    }

    pub fn monitor(&self) -> FifoMonitor {
        FifoMonitor {
            fifo: self.fifo.clone(),
        }
    }
}

impl FifoConsumer {
    /// Take the level at the read cursor, if any.
    pub fn pop(&mut self) -> Option<u16> {
        let fifo = &*self.fifo;
        let read = fifo.read_position.load(Ordering::Relaxed);
        let write = fifo.write_position.load(Ordering::Acquire);

        if read == write {
            return None;
        }

        let level = fifo.slots[fifo.wrap(read)].load(Ordering::Relaxed);
        fifo.read_position.store(read + 1, Ordering::Release);
        self.last_level = level;
        Some(level)
    }

    /// The level to put on the output for this tick.
    ///
    /// On underrun the read cursor does not move and the previous level is returned again, so the output holds
    /// instead of jumping.  Before anything has been read that is [SILENCE].
    pub fn next_level(&mut self) -> u16 {
        match self.pop() {
            Some(level) => level,
            None => {
                self.fifo.underruns.fetch_add(1, Ordering::Relaxed);
                self.last_level
            }
        }
    }

    pub fn last_level(&self) -> u16 {
        self.last_level
    }

    pub fn monitor(&self) -> FifoMonitor {
        FifoMonitor {
            fifo: self.fifo.clone(),
        }
    }
}

impl FifoMonitor {
    pub fn capacity(&self) -> usize {
        self.fifo.capacity()
    }

    /// Levels written but not yet read, `0..=capacity`.
    pub fn fill(&self) -> usize {
        self.fifo.observed_fill()
    }

    pub fn is_empty(&self) -> bool {
        self.fill() == 0
    }

    pub fn is_full(&self) -> bool {
        self.fill() == self.capacity()
    }

    /// Index of the next slot the consumer will read.
    pub fn read_cursor(&self) -> usize {
        self.fifo
            .wrap(self.fifo.read_position.load(Ordering::Acquire))
    }

    /// Index of the next slot the producer will write.
    pub fn write_cursor(&self) -> usize {
        self.fifo
            .wrap(self.fifo.write_position.load(Ordering::Acquire))
    }

    pub fn is_active(&self) -> bool {
        self.fifo.active.load(Ordering::Acquire)
    }

    /// Mark whether the output clock is consuming.  Set by whoever attaches and detaches the clock.
    pub fn set_active(&self, active: bool) {
        self.fifo.active.store(active, Ordering::Release);
    }

    /// Total ticks which found the FIFO empty.
    pub fn underruns(&self) -> u64 {
        self.fifo.underruns.load(Ordering::Relaxed)
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    use std::collections::VecDeque;

    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use crate::sync::spawn;

    fn capacity(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn test_push_pop_simple() {
        let (mut producer, mut consumer) = create_fifo(capacity(5));

        for i in 0..10u16 {
            producer.try_push(i).unwrap();
            assert_eq!(consumer.pop(), Some(i));
        }
    }

    #[test]
    fn test_new_fifo_is_silent_and_inactive() {
        let (producer, mut consumer) = create_fifo(capacity(8));
        let monitor = producer.monitor();

        assert!(monitor.is_empty());
        assert!(!monitor.is_active());
        assert_eq!(consumer.next_level(), SILENCE);
        assert_eq!(monitor.underruns(), 1);
    }

    #[test]
    fn test_full_and_empty_are_distinguished() {
        let (mut producer, mut consumer) = create_fifo(capacity(4));
        let monitor = producer.monitor();

        for i in 0..4u16 {
            producer.try_push(i).unwrap();
        }

        // Both cursors are back at slot 0, but the fill count says full.
        assert_eq!(monitor.read_cursor(), monitor.write_cursor());
        assert_eq!(monitor.fill(), 4);
        assert!(monitor.is_full());
        assert_eq!(producer.try_push(99), Err(99));
        assert_eq!(producer.available(), 0);

        let drained = std::iter::from_fn(|| consumer.pop()).collect::<Vec<_>>();
        assert_eq!(drained, vec![0, 1, 2, 3]);

        assert_eq!(monitor.read_cursor(), monitor.write_cursor());
        assert_eq!(monitor.fill(), 0);
        assert!(monitor.is_empty());
    }

    #[test]
    fn test_underrun_holds_last_level() {
        let (mut producer, mut consumer) = create_fifo(capacity(4));
        let monitor = consumer.monitor();

        producer.try_push(1000).unwrap();
        assert_eq!(consumer.next_level(), 1000);

        let cursor = monitor.read_cursor();
        assert_eq!(consumer.next_level(), 1000);
        assert_eq!(consumer.next_level(), 1000);
        assert_eq!(monitor.read_cursor(), cursor);
        assert_eq!(monitor.underruns(), 2);

        producer.try_push(2000).unwrap();
        assert_eq!(consumer.next_level(), 2000);
        assert_eq!(consumer.last_level(), 2000);
    }

    #[test]
    fn test_active_flag() {
        let (producer, _consumer) = create_fifo(capacity(2));
        let monitor = producer.monitor();
        monitor.set_active(true);
        assert!(monitor.clone().is_active());
        monitor.set_active(false);
        assert!(!monitor.is_active());
    }

    #[test]
    fn test_multithreaded_order() {
        let (mut producer, mut consumer) = create_fifo(capacity(7));

        let bg_thread = spawn(move || {
            for i in 0..50000u32 {
                let level = (i % 65536) as u16;
                while producer.try_push(level).is_err() {
                    std::hint::spin_loop();
                }
            }
        });

        for i in 0..50000u32 {
            loop {
                if let Some(x) = consumer.pop() {
                    assert_eq!(x, (i % 65536) as u16);
                    break;
                }
            }
        }

        bg_thread.join().unwrap();
    }

    #[derive(Debug, Clone)]
    enum Op {
        Push(u16),
        Pop,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![any::<u16>().prop_map(Op::Push), Just(Op::Pop)]
    }

    proptest! {
        #![proptest_config(ProptestConfig{cases:500, ..Default::default()})]

        #[test]
        fn test_fill_matches_model(cap in 1usize..16, ops in proptest::collection::vec(op(), 0..200)) {
            let (mut producer, mut consumer) = create_fifo(capacity(cap));
            let monitor = producer.monitor();
            let mut model = VecDeque::new();

            for op in ops {
                match op {
                    Op::Push(v) => {
                        let pushed = producer.try_push(v).is_ok();
                        prop_assert_eq!(pushed, model.len() < cap);
                        if pushed {
                            model.push_back(v);
                        }
                    }
                    Op::Pop => prop_assert_eq!(consumer.pop(), model.pop_front()),
                }

                let fill = monitor.fill();
                prop_assert_eq!(fill, model.len());
                prop_assert!(fill <= cap);
                prop_assert_eq!((monitor.write_cursor() + cap - monitor.read_cursor()) % cap, fill % cap);
                prop_assert_eq!(producer.available(), cap - fill);
            }
        }
    }
}
