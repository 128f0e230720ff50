//! Looking at a stream without playing it.
use std::io::{Read, Seek};
use std::time::Duration;

use crate::error::{ContainerError, Result};
use crate::format::FormatDescriptor;
use crate::riff::{ChunkHeader, ChunkReader, FourCc};

/// The chunk layout and format of a stream.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Probe {
    pub form_type: Option<FourCc>,

    /// Every chunk header in file order, the `RIFF` header included.
    pub chunks: Vec<ChunkHeader>,

    pub format: Option<FormatDescriptor>,
}

impl Probe {
    /// Frames across all data chunks, if the format makes that computable.
    pub fn data_frames(&self) -> Option<u64> {
        let block_align = u64::from(self.format?.block_align);
        if block_align == 0 {
            return None;
        }
        Some(
            self.chunks
                .iter()
                .filter(|c| c.id == FourCc::DATA)
                .map(|c| u64::from(c.size) / block_align)
                .sum(),
        )
    }

    /// Playing time at the declared sample rate.
    pub fn duration(&self) -> Option<Duration> {
        let rate = self.format?.sample_rate;
        if rate == 0 {
            return None;
        }
        let frames = self.data_frames()?;
        Some(Duration::from_secs_f64(frames as f64 / f64::from(rate)))
    }
}

/// Walk the chunks of a RIFF stream, reading the format but skipping sample data.
///
/// Nothing about the format is validated beyond it being present at most once and complete; playability is checked
/// when playing.  The stream is left at its end.
pub fn probe<R: Read + Seek>(reader: R) -> Result<Probe> {
    let mut chunks = ChunkReader::new(reader);
    let mut probe = Probe::default();

    while let Some(header) = chunks.next_header()? {
        probe.chunks.push(header);

        match header.id {
            FourCc::RIFF => {
                probe.form_type = chunks.read_form_type()?;
            }
            FourCc::FMT => {
                if probe.format.is_some() {
                    return Err(ContainerError::DuplicateFormat.into());
                }
                probe.format = Some(chunks.read_format(header.size)?);
            }
            _ => chunks.skip(header.padded_size())?,
        }
    }

    Ok(probe)
}
