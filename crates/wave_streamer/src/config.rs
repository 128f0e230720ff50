use std::num::NonZeroUsize;
use std::time::Duration;

/// Default FIFO capacity in samples.
///
/// At 44.1 kHz this is almost 6ms of audio, which is plenty of slack for a decode loop reading from an SD card.  The
/// capacity doesn't depend on the sample rate of the file and never changes during playback.
pub const DEFAULT_FIFO_CAPACITY: NonZeroUsize = match NonZeroUsize::new(256) {
    Some(n) => n,
    None => panic!("The default capacity is not zero"),
};

/// What to do with samples still in the FIFO when a data chunk has been fully decoded.
#[derive(Copy, Clone, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Hash, derive_more::IsVariant)]
pub enum EndOfData {
    /// Keep the clock running until the FIFO is empty, then stop it.
    #[default]
    Drain,

    /// Stop the clock immediately and leave whatever is buffered unplayed.
    Abandon,
}

/// Configuration for a [crate::Player].
///
/// ```
/// use std::time::Duration;
/// use wave_streamer::{EndOfData, PlayerConfigBuilder};
///
/// let config = PlayerConfigBuilder::default()
///     .end_of_data(EndOfData::Abandon)
///     .backpressure_timeout(Duration::from_millis(500))
///     .build()
///     .unwrap();
/// assert_eq!(config.fifo_capacity.get(), 256);
/// ```
#[derive(Clone, Debug, Eq, PartialEq, derive_builder::Builder)]
#[builder(pattern = "owned")]
pub struct PlayerConfig {
    #[builder(default = "DEFAULT_FIFO_CAPACITY")]
    pub fifo_capacity: NonZeroUsize,

    #[builder(default)]
    pub end_of_data: EndOfData,

    /// If set, fail the session when the clock is running but the FIFO stays full (or, while draining, non-empty)
    /// for this long.
    ///
    /// Unset means wait forever, which is right when the clock is an interrupt that is guaranteed to fire.  Time
    /// spent paused never counts.
    #[builder(default, setter(strip_option))]
    pub backpressure_timeout: Option<Duration>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            fifo_capacity: DEFAULT_FIFO_CAPACITY,
            end_of_data: EndOfData::Drain,
            backpressure_timeout: None,
        }
    }
}
