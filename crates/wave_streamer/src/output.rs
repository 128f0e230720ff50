//! Output devices: the other end of the FIFO.
use std::sync::Arc;

/// A single-channel output, e.g. a DAC.
///
/// Called from the tick callback at most once per tick.  Implementations for real hardware should be a register
/// write and nothing more.
pub trait OutputDevice: Send + Sync + 'static {
    /// Set the output to `level`, where 0 is the lowest level, 65535 the highest and 32768 silence.
    fn set_level(&self, level: u16);
}

impl<T: OutputDevice + ?Sized> OutputDevice for Arc<T> {
    fn set_level(&self, level: u16) {
        (**self).set_level(level)
    }
}

impl<T: OutputDevice + ?Sized> OutputDevice for Box<T> {
    fn set_level(&self, level: u16) {
        (**self).set_level(level)
    }
}

/// Discards everything.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullOutput;

impl OutputDevice for NullOutput {
    fn set_level(&self, _level: u16) {}
}

/// Records every level in memory.
///
/// This allocates from the tick callback, so it is for tests and host-side tools only.  Clones share one recording.
#[derive(Clone, Debug, Default)]
pub struct MemoryOutput {
    levels: Arc<spin::Mutex<Vec<u16>>>,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Default::default()
    }

    /// Everything recorded so far.
    pub fn levels(&self) -> Vec<u16> {
        self.levels.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.levels.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.levels.lock().clear();
    }
}

impl OutputDevice for MemoryOutput {
    fn set_level(&self, level: u16) {
        self.levels.lock().push(level);
    }
}

/// Drops the low bits of every level before passing it on, for DACs narrower than 16 bits.
///
/// A 10-bit DAC which takes its sample left-aligned in a 16-bit register wants `level & 0xFFC0`, which is
/// `QuantizedOutput::new(dac, 10)`.
#[derive(Clone, Debug)]
pub struct QuantizedOutput<D> {
    inner: D,
    mask: u16,
}

impl<D: OutputDevice> QuantizedOutput<D> {
    /// `bits` is clamped to `1..=16`.
    pub fn new(inner: D, bits: u8) -> Self {
        let bits = bits.clamp(1, 16);
        QuantizedOutput {
            inner,
            mask: u16::MAX << (16 - bits as u32),
        }
    }

    pub fn mask(&self) -> u16 {
        self.mask
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }
}

impl<D: OutputDevice> OutputDevice for QuantizedOutput<D> {
    fn set_level(&self, level: u16) {
        self.inner.set_level(level & self.mask);
    }
}
