//! Streams PCM WAV files to a single-channel output at the file's sample rate.
//!
//! The engine has two halves which share only a fixed-capacity FIFO:
//!
//! - The foreground: [Player::play] reads RIFF chunks from any `Read + Seek` stream, downmixes each frame to one
//!   16-bit unsigned level, and pushes it into the FIFO, spinning when the FIFO is full.
//! - The background: a [PeriodicClock] calls back once per sample period and moves one level from the FIFO to an
//!   [OutputDevice].  On a microcontroller that is a timer interrupt writing a DAC register.
//!
//! Pause, resume and stop come from [PlayerHandle]s, which may be used from any thread while a session is playing.
//!
//! ```
//! use std::io::Cursor;
//! use wave_streamer::*;
//!
//! // A header and no samples.
//! let mut wav = vec![];
//! wav.extend_from_slice(b"RIFF\x24\0\0\0WAVEfmt \x10\0\0\0");
//! wav.extend_from_slice(&FormatDescriptor::pcm(1, 8000, 16).to_le_bytes());
//! wav.extend_from_slice(b"data\0\0\0\0");
//!
//! let mut player = Player::new(NullOutput, ManualClock::new(), PlayerConfig::default());
//! let report = player.play(Cursor::new(wav)).unwrap();
//! assert_eq!(report.frames_queued, 0);
//! ```
mod clock;
mod config;
mod error;
mod format;
mod frame;
mod output;
mod player;
mod probe;
mod riff;
mod transport;

pub use clock::{ClockError, ManualClock, PeriodicClock, ThreadClock, TickCallback, TickInterval};
pub use config::{
    EndOfData, PlayerConfig, PlayerConfigBuilder, PlayerConfigBuilderError, DEFAULT_FIFO_CAPACITY,
};
pub use error::{ContainerError, Error, ResourceError, Result, StallError};
pub use format::{
    FormatDescriptor, SampleEncoding, FORMAT_CHUNK_LEN, WAVE_FORMAT_EXTENSIBLE, WAVE_FORMAT_PCM,
};
pub use frame::{downmix, rescale, FrameDecoder};
pub use output::{MemoryOutput, NullOutput, OutputDevice, QuantizedOutput};
pub use player::{PlaybackOutcome, PlaybackReport, Player, PlayerHandle};
pub use probe::{probe, Probe};
pub use riff::{ChunkHeader, FourCc};
pub use transport::PlaybackState;
pub use wave_sync::SILENCE;
