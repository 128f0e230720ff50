//! Turning one block-aligned frame into one output level.
use crate::error::ContainerError;
use crate::format::{FormatDescriptor, SampleEncoding};

/// Sum every channel of `frame` and divide by the channel count, truncating toward zero.
///
/// `frame` must hold at least `channels` samples; padding past them is ignored.
pub fn downmix(encoding: SampleEncoding, channels: usize, frame: &[u8]) -> i64 {
    let width = encoding.bytes_per_sample();
    debug_assert!(frame.len() >= width * channels);

    let sum: i64 = frame
        .chunks_exact(width)
        .take(channels)
        .map(|raw| match encoding {
            SampleEncoding::Unsigned8 => i64::from(raw[0]),
            SampleEncoding::Signed16 => i64::from(i16::from_le_bytes([raw[0], raw[1]])),
            SampleEncoding::Signed32 => {
                i64::from(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
            }
        })
        .sum();

    sum / channels as i64
}

/// Move an averaged sample onto the unsigned output scale, where silence is [wave_sync::SILENCE].
///
/// 8-bit samples are already unsigned and only move into the high byte.  The signed widths are reduced to 16 bits and
/// biased by half the range.
pub fn rescale(encoding: SampleEncoding, average: i64) -> u16 {
    let scaled = match encoding {
        SampleEncoding::Unsigned8 => average << 8,
        SampleEncoding::Signed16 => average + 32768,
        SampleEncoding::Signed32 => (average >> 16) + 32768,
    };
    debug_assert!((0..=u16::MAX as i64).contains(&scaled));
    scaled.clamp(0, u16::MAX as i64) as u16
}

/// Decodes frames of one validated format.
#[derive(Copy, Clone, Debug)]
pub struct FrameDecoder {
    encoding: SampleEncoding,
    channels: usize,
    block_align: usize,
}

impl FrameDecoder {
    pub fn new(format: &FormatDescriptor) -> Result<Self, ContainerError> {
        let encoding = format.encoding()?;
        Ok(FrameDecoder {
            encoding,
            channels: format.channels as usize,
            block_align: format.block_align as usize,
        })
    }

    /// Bytes per frame.  Never zero.
    pub fn block_align(&self) -> usize {
        self.block_align
    }

    pub fn encoding(&self) -> SampleEncoding {
        self.encoding
    }

    /// # Panics
    ///
    /// Panics if `frame` is shorter than the block alignment.
    pub fn decode(&self, frame: &[u8]) -> u16 {
        assert!(frame.len() >= self.block_align);
        rescale(
            self.encoding,
            downmix(self.encoding, self.channels, &frame[..self.block_align]),
        )
    }
}
