//! The `fmt ` chunk.
use crate::clock::TickInterval;
use crate::error::ContainerError;

/// Size of the canonical PCM format layout.  Anything past this in a `fmt ` chunk is skipped.
pub const FORMAT_CHUNK_LEN: usize = 16;

pub const WAVE_FORMAT_PCM: u16 = 0x0001;
pub const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// The contents of a `fmt ` chunk, exactly as the file declares them.
///
/// Nothing is checked when the descriptor is read, so that tools like [crate::probe] can report whatever a file says.
/// [FormatDescriptor::encoding] is where a descriptor is checked for playability.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct FormatDescriptor {
    pub compression_code: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub avg_bytes_per_sec: u32,
    /// Bytes per frame, all channels included.
    pub block_align: u16,
    pub bits_per_sample: u16,
}

/// How one channel's sample is stored in a frame.
#[derive(Copy, Clone, Debug, Eq, Ord, PartialEq, PartialOrd, Hash, derive_more::IsVariant)]
pub enum SampleEncoding {
    Unsigned8,
    Signed16,
    Signed32,
}

impl SampleEncoding {
    pub fn from_bits_per_sample(bits: u16) -> Option<Self> {
        match bits {
            8 => Some(SampleEncoding::Unsigned8),
            16 => Some(SampleEncoding::Signed16),
            32 => Some(SampleEncoding::Signed32),
            _ => None,
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleEncoding::Unsigned8 => 1,
            SampleEncoding::Signed16 => 2,
            SampleEncoding::Signed32 => 4,
        }
    }
}

impl FormatDescriptor {
    pub fn from_le_bytes(bytes: &[u8; FORMAT_CHUNK_LEN]) -> Self {
        let u16_at = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        let u32_at =
            |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);

        FormatDescriptor {
            compression_code: u16_at(0),
            channels: u16_at(2),
            sample_rate: u32_at(4),
            avg_bytes_per_sec: u32_at(8),
            block_align: u16_at(12),
            bits_per_sample: u16_at(14),
        }
    }

    pub fn to_le_bytes(&self) -> [u8; FORMAT_CHUNK_LEN] {
        let mut out = [0u8; FORMAT_CHUNK_LEN];
        out[0..2].copy_from_slice(&self.compression_code.to_le_bytes());
        out[2..4].copy_from_slice(&self.channels.to_le_bytes());
        out[4..8].copy_from_slice(&self.sample_rate.to_le_bytes());
        out[8..12].copy_from_slice(&self.avg_bytes_per_sec.to_le_bytes());
        out[12..14].copy_from_slice(&self.block_align.to_le_bytes());
        out[14..16].copy_from_slice(&self.bits_per_sample.to_le_bytes());
        out
    }

    /// Build the descriptor of a canonical PCM stream.
    pub fn pcm(channels: u16, sample_rate: u32, bits_per_sample: u16) -> Self {
        let block_align = channels * bits_per_sample.div_ceil(8);
        FormatDescriptor {
            compression_code: WAVE_FORMAT_PCM,
            channels,
            sample_rate,
            avg_bytes_per_sec: sample_rate * block_align as u32,
            block_align,
            bits_per_sample,
        }
    }

    /// Check that this descriptor can be played, returning the per-channel encoding if so.
    pub fn encoding(&self) -> Result<SampleEncoding, ContainerError> {
        if self.compression_code != WAVE_FORMAT_PCM
            && self.compression_code != WAVE_FORMAT_EXTENSIBLE
        {
            return Err(ContainerError::UnsupportedCompression(
                self.compression_code,
            ));
        }

        if self.channels == 0 {
            return Err(ContainerError::ZeroChannels);
        }

        let encoding = SampleEncoding::from_bits_per_sample(self.bits_per_sample).ok_or(
            ContainerError::UnsupportedBitsPerSample(self.bits_per_sample),
        )?;

        self.tick_interval()?;

        if self.block_align == 0 {
            return Err(ContainerError::ZeroBlockAlign);
        }

        if (self.block_align as usize) < self.channels as usize * encoding.bytes_per_sample() {
            return Err(ContainerError::BlockAlignTooSmall {
                block_align: self.block_align,
                channels: self.channels,
                bits_per_sample: self.bits_per_sample,
            });
        }

        Ok(encoding)
    }

    /// The output clock period for this sample rate.
    pub fn tick_interval(&self) -> Result<TickInterval, ContainerError> {
        TickInterval::from_sample_rate(self.sample_rate)
            .ok_or(ContainerError::InvalidSampleRate(self.sample_rate))
    }
}

impl std::fmt::Display for FormatDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "compression {:#06x}, {} channels, {} Hz, {} bytes/sec, block align {}, {} bits per sample",
            self.compression_code,
            self.channels,
            self.sample_rate,
            self.avg_bytes_per_sec,
            self.block_align,
            self.bits_per_sample
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical_layout() {
        // 2 channels, 44100 Hz, 176400 bytes/sec, block align 4, 16 bits.
        let bytes = [
            0x01, 0x00, 0x02, 0x00, 0x44, 0xAC, 0x00, 0x00, 0x10, 0xB1, 0x02, 0x00, 0x04, 0x00,
            0x10, 0x00,
        ];
        let format = FormatDescriptor::from_le_bytes(&bytes);
        assert_eq!(format, FormatDescriptor::pcm(2, 44100, 16));
        assert_eq!(format.to_le_bytes(), bytes);
        assert_eq!(format.encoding().unwrap(), SampleEncoding::Signed16);
    }

    #[test]
    fn test_rejections() {
        let base = FormatDescriptor::pcm(1, 8000, 16);

        let float = FormatDescriptor {
            compression_code: 3,
            ..base
        };
        assert!(matches!(
            float.encoding(),
            Err(ContainerError::UnsupportedCompression(3))
        ));

        let no_channels = FormatDescriptor {
            channels: 0,
            ..base
        };
        assert!(matches!(
            no_channels.encoding(),
            Err(ContainerError::ZeroChannels)
        ));

        let packed_24 = FormatDescriptor {
            bits_per_sample: 24,
            ..base
        };
        assert!(matches!(
            packed_24.encoding(),
            Err(ContainerError::UnsupportedBitsPerSample(24))
        ));

        let zero_align = FormatDescriptor {
            block_align: 0,
            ..base
        };
        assert!(matches!(
            zero_align.encoding(),
            Err(ContainerError::ZeroBlockAlign)
        ));

        let short_align = FormatDescriptor {
            channels: 2,
            block_align: 2,
            ..base
        };
        assert!(matches!(
            short_align.encoding(),
            Err(ContainerError::BlockAlignTooSmall { .. })
        ));

        for rate in [0, 1_000_001] {
            let bad_rate = FormatDescriptor {
                sample_rate: rate,
                ..base
            };
            assert!(matches!(
                bad_rate.encoding(),
                Err(ContainerError::InvalidSampleRate(r)) if r == rate
            ));
        }
    }

    #[test]
    fn test_extensible_and_padded_alignment_are_accepted() {
        let format = FormatDescriptor {
            compression_code: WAVE_FORMAT_EXTENSIBLE,
            block_align: 8,
            ..FormatDescriptor::pcm(2, 48000, 16)
        };
        assert_eq!(format.encoding().unwrap(), SampleEncoding::Signed16);
    }

    #[test]
    fn test_tick_interval() {
        let format = FormatDescriptor::pcm(1, 8000, 16);
        assert_eq!(format.tick_interval().unwrap().as_micros(), 125);

        // 1_000_000 / 44100 truncates.
        let format = FormatDescriptor::pcm(2, 44100, 16);
        assert_eq!(format.tick_interval().unwrap().as_micros(), 22);
    }
}
