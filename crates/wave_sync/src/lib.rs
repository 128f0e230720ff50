//! Synchronization between a sample producer and a periodic output interrupt.
//!
//! The output side of a DAC player runs from a timer interrupt (or, on a host, a timer thread) which may preempt the
//! decoder at any instruction.  It cannot take locks and it cannot wait.  The one structure the two sides share is a
//! fixed-capacity sample FIFO where each cursor has exactly one writer, so atomics with acquire/release ordering are
//! enough.  See [sample_fifo].
pub mod sample_fifo;
mod sync;

pub use sample_fifo::{create_fifo, FifoConsumer, FifoMonitor, FifoProducer, SILENCE};
