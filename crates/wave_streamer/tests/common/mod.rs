#![allow(dead_code)]
use std::io::Cursor;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use wave_streamer::*;

/// Build a RIFF/WAVE byte stream chunk by chunk, including malformed ones.
#[derive(Default)]
pub struct WavBuilder {
    chunks: Vec<u8>,
}

impl WavBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn chunk(mut self, id: &[u8; 4], payload: &[u8]) -> Self {
        self.chunks.extend_from_slice(id);
        self.chunks
            .extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.chunks.extend_from_slice(payload);
        if payload.len() % 2 == 1 {
            self.chunks.push(0);
        }
        self
    }

    pub fn format(self, format: FormatDescriptor) -> Self {
        self.chunk(b"fmt ", &format.to_le_bytes())
    }

    pub fn data(self, payload: &[u8]) -> Self {
        self.chunk(b"data", payload)
    }

    /// A data header claiming `declared` bytes, followed by only `payload`.
    pub fn truncated_data(mut self, declared: u32, payload: &[u8]) -> Self {
        self.chunks.extend_from_slice(b"data");
        self.chunks.extend_from_slice(&declared.to_le_bytes());
        self.chunks.extend_from_slice(payload);
        self
    }

    pub fn build(self) -> Cursor<Vec<u8>> {
        let mut out = vec![];
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(4 + self.chunks.len() as u32).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(&self.chunks);
        Cursor::new(out)
    }
}

pub fn i16_frames(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Write a WAV with hound, the way an ordinary tool would.
pub fn hound_wav<S: hound::Sample + Copy>(spec: hound::WavSpec, samples: &[S]) -> Cursor<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for s in samples {
            writer.write_sample(*s).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.set_position(0);
    cursor
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let start = Instant::now();
    while !cond() {
        assert!(
            start.elapsed() < Duration::from_secs(10),
            "Timed out waiting for {what}"
        );
        std::thread::yield_now();
    }
}

pub struct Rig {
    pub clock: ManualClock,
    pub output: MemoryOutput,
    pub handle: PlayerHandle,
    pub worker: JoinHandle<(Player, Result<PlaybackReport>)>,
}

/// Start playing `stream` on a background thread against a manual clock.
pub fn spawn_player(config: PlayerConfig, stream: Cursor<Vec<u8>>) -> Rig {
    let output = MemoryOutput::new();
    spawn_player_on(output.clone(), output, config, stream)
}

/// Like [spawn_player], but levels go through `device`, which should end up writing to `output`.
pub fn spawn_player_on(
    device: impl OutputDevice,
    output: MemoryOutput,
    config: PlayerConfig,
    stream: Cursor<Vec<u8>>,
) -> Rig {
    init_logging();
    let clock = ManualClock::new();
    let mut player = Player::new(device, clock.clone(), config);
    let handle = player.handle();
    let worker = std::thread::spawn(move || {
        let result = player.play(stream);
        (player, result)
    });
    Rig {
        clock,
        output,
        handle,
        worker,
    }
}

impl Rig {
    /// Tick whenever there is something buffered, until the session ends.
    ///
    /// Only ticking on a non-empty FIFO keeps underruns out of the recording.
    pub fn run_to_end(self) -> (Player, Result<PlaybackReport>, Vec<u16>) {
        while !self.worker.is_finished() {
            if self.handle.buffered() > 0 {
                self.clock.tick();
            } else {
                std::thread::yield_now();
            }
        }
        let (player, result) = self.worker.join().unwrap();
        (player, result, self.output.levels())
    }

    pub fn join(self) -> (Player, Result<PlaybackReport>) {
        self.worker.join().unwrap()
    }
}
