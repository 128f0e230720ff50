//! An output device which records to a WAV file.
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use wave_streamer::{OutputDevice, SILENCE};

type Writer = hound::WavWriter<BufWriter<File>>;

/// Writes every level as a signed 16-bit mono sample, so that silence comes out as 0.
pub struct CaptureOutput {
    path: PathBuf,
    writer: spin::Mutex<Option<Writer>>,
    failed: AtomicBool,
}

impl CaptureOutput {
    pub fn create(path: impl AsRef<Path>, sample_rate: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(&path, spec)
            .with_context(|| format!("While creating capture file {}", path.display()))?;
        Ok(CaptureOutput {
            path,
            writer: spin::Mutex::new(Some(writer)),
            failed: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Finish the file.  Must only be called once playback into this device is over.
    pub fn finalize(&self) -> Result<()> {
        let writer = self.writer.lock().take();

        anyhow::ensure!(
            !self.failed.load(Ordering::Acquire),
            "Writing to {} failed during playback",
            self.path.display()
        );

        if let Some(w) = writer {
            w.finalize()
                .with_context(|| format!("While finalizing {}", self.path.display()))?;
        }
        Ok(())
    }
}

pub fn level_to_sample(level: u16) -> i16 {
    (i32::from(level) - i32::from(SILENCE)) as i16
}

impl OutputDevice for CaptureOutput {
    fn set_level(&self, level: u16) {
        let mut guard = self.writer.lock();
        let Some(writer) = guard.as_mut() else {
            return;
        };

        // No logging from a tick; finalize reports it.
        if writer.write_sample(level_to_sample(level)).is_err() {
            *guard = None;
            self.failed.store(true, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn test_level_to_sample() {
        assert_eq!(level_to_sample(SILENCE), 0);
        assert_eq!(level_to_sample(0), i16::MIN);
        assert_eq!(level_to_sample(u16::MAX), i16::MAX);
    }

    #[test]
    fn test_capture_round_trip() {
        let path = std::env::temp_dir().join(format!("wave_player-{}-capture.wav", std::process::id()));
        let capture = CaptureOutput::create(&path, 8000).unwrap();
        for level in [32768, 49152, 16384, 65535] {
            capture.set_level(level);
        }
        capture.finalize().unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 8000);
        let samples = reader
            .samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(samples, vec![0, 16384, -16384, 32767]);
        let _ = std::fs::remove_file(&path);
    }
}
