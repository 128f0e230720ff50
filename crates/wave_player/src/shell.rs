//! The interactive loop: a playlist, some buttons, and at most one playback session at a time.
//!
//! Each track gets its own [Player] on a worker thread.  The loop waits on two channels: control events from stdin,
//! and the result of whichever session is in flight.  Because only one session exists at a time, the next result to
//! arrive always belongs to it.
use std::fs::File;
use std::io::{BufReader, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam::channel::{Receiver, Sender};
use log::{error, info, warn};
use wave_streamer::{
    probe, NullOutput, OutputDevice, PlaybackReport, Player, PlayerConfig, PlayerHandle,
    QuantizedOutput, ThreadClock,
};

use crate::capture::CaptureOutput;
use crate::control::ControlEvent;
use crate::playlist::{Playlist, TrackIndexStore};

#[derive(Debug, Default)]
pub struct ShellOptions {
    pub capture_dir: Option<PathBuf>,
    pub dac_bits: Option<u8>,
    pub config: PlayerConfig,
    pub repeat: bool,
}

type SessionResult = wave_streamer::Result<PlaybackReport>;

struct Session {
    path: PathBuf,
    handle: PlayerHandle,
    capture: Option<Arc<CaptureOutput>>,
    worker: std::thread::JoinHandle<()>,
}

pub struct Shell {
    playlist: Playlist,
    store: TrackIndexStore,
    options: ShellOptions,
    session: Option<Session>,
    done_sender: Sender<SessionResult>,
    done: Receiver<SessionResult>,
}

impl Shell {
    pub fn new(mut playlist: Playlist, store: TrackIndexStore, options: ShellOptions) -> Self {
        let saved = store.load(playlist.len());
        playlist.select(saved);
        let (done_sender, done) = crossbeam::channel::unbounded();
        Shell {
            playlist,
            store,
            options,
            session: None,
            done_sender,
            done,
        }
    }

    /// Play the saved track, then follow events until told to quit.
    ///
    /// If `events` disconnects, the shell keeps going until nothing is playing and then returns.
    pub fn run(mut self, events: Receiver<ControlEvent>) -> Result<()> {
        let mut input_open = true;
        let done = self.done.clone();

        self.start_current();

        loop {
            if !input_open && self.session.is_none() {
                info!("Nothing is playing and no more commands are coming; exiting");
                break;
            }

            let commands = if input_open {
                events.clone()
            } else {
                crossbeam::channel::never()
            };

            crossbeam::channel::select! {
                recv(commands) -> event => match event {
                    Ok(ControlEvent::Quit) => {
                        info!("Quitting");
                        break;
                    }
                    Ok(event) => self.on_event(event),
                    Err(_) => input_open = false,
                },
                recv(done) -> result => {
                    // We hold a sender ourselves, so this never disconnects.
                    if let Ok(result) = result {
                        self.on_session_done(result);
                    }
                }
            }
        }

        self.stop_session();
        Ok(())
    }

    fn on_event(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::Play => match self.session.as_ref() {
                Some(session) => match session.handle.resume() {
                    Ok(true) => info!("Playing {}", session.path.display()),
                    Ok(false) if session.handle.is_between_data_chunks() => info!(
                        "Between data chunks; press play again once the next one starts"
                    ),
                    Ok(false) if session.handle.state().is_paused() => {
                        info!("Still paused: nothing is buffered yet")
                    }
                    Ok(false) => info!("Not paused"),
                    Err(e) => error!("Unable to resume: {e}"),
                },
                None => self.start_current(),
            },
            ControlEvent::Pause => {
                if let Some(session) = self.session.as_ref() {
                    if session.handle.pause() {
                        info!("Paused {}", session.path.display());
                    }
                }
            }
            ControlEvent::Next => {
                self.playlist.next();
                self.restart_at_current();
            }
            ControlEvent::Prev => {
                self.playlist.prev();
                self.restart_at_current();
            }
            ControlEvent::Quit => {}
        }
    }

    fn save_index(&self) {
        if let Err(e) = self.store.save(self.playlist.index()) {
            warn!("{e:#}");
        }
    }

    fn restart_at_current(&mut self) {
        self.save_index();
        self.stop_session();
        self.start_current();
    }

    fn on_session_done(&mut self, result: SessionResult) {
        let Some(session) = self.session.take() else {
            return;
        };

        // A failed track leaves us idle until someone presses a button.
        if !finish(session, result) {
            return;
        }

        if self.playlist.is_last() && !self.options.repeat {
            info!("End of playlist");
            return;
        }

        self.playlist.next();
        self.save_index();
        self.start_current();
    }

    fn start_current(&mut self) {
        let path = self.playlist.current().to_path_buf();
        match self.spawn_session(&path) {
            Ok(session) => {
                info!(
                    "Playing track {} of {}: {}",
                    self.playlist.index() + 1,
                    self.playlist.len(),
                    path.display()
                );
                self.session = Some(session);
            }
            Err(e) => error!("Unable to play {}: {e:#}", path.display()),
        }
    }

    fn stop_session(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        session.handle.stop();
        if let Ok(result) = self.done.recv() {
            finish(session, result);
        }
    }

    fn spawn_session(&self, path: &Path) -> Result<Session> {
        let mut file =
            File::open(path).with_context(|| format!("While opening {}", path.display()))?;
        let probed = probe(&mut file).with_context(|| format!("While probing {}", path.display()))?;
        match probed.format.as_ref() {
            Some(format) => info!("{}: {format}", path.display()),
            None => warn!("{} has no fmt chunk", path.display()),
        }
        file.rewind()?;

        let capture = match self.options.capture_dir.as_ref() {
            Some(dir) => {
                let sample_rate = probed
                    .format
                    .map(|f| f.sample_rate)
                    .context("Capturing needs a sample rate, but there is no fmt chunk")?;
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let name = format!("{:03}-{stem}.wav", self.playlist.index());
                Some(Arc::new(CaptureOutput::create(dir.join(name), sample_rate)?))
            }
            None => None,
        };

        let device: Box<dyn OutputDevice> = match capture.as_ref() {
            Some(c) => Box::new(c.clone()),
            None => Box::new(NullOutput),
        };
        let device: Box<dyn OutputDevice> = match self.options.dac_bits {
            Some(bits) => Box::new(QuantizedOutput::new(device, bits)),
            None => device,
        };

        let mut player = Player::new(device, ThreadClock::new(), self.options.config.clone());
        let handle = player.handle();
        let sender = self.done_sender.clone();
        let reader = BufReader::new(file);
        let worker = std::thread::Builder::new()
            .name("playback".to_string())
            .spawn(move || {
                let result = player.play(reader);
                // Only fails if the shell is gone, in which case nobody cares.
                let _ = sender.send(result);
            })
            .context("While starting the playback thread")?;

        Ok(Session {
            path: path.to_path_buf(),
            handle,
            capture,
            worker,
        })
    }
}

/// Tear down a session whose result has arrived.  Returns whether the track played to its end.
fn finish(session: Session, result: SessionResult) -> bool {
    if session.worker.join().is_err() {
        error!("The playback thread for {} panicked", session.path.display());
    }

    if let Some(capture) = session.capture {
        match capture.finalize() {
            Ok(()) => info!("Captured output to {}", capture.path().display()),
            Err(e) => error!("{e:#}"),
        }
    }

    match result {
        Ok(report) => {
            info!(
                "{} {:?} after {} frames, {} underruns",
                session.path.display(),
                report.outcome,
                report.frames_queued,
                report.underruns
            );
            report.outcome.is_finished()
        }
        Err(e) => {
            error!("Playback of {} failed: {e}", session.path.display());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::{Duration, Instant};

    use pretty_assertions::assert_eq;
    use wave_streamer::FormatDescriptor;

    struct Scratch(PathBuf);

    impl Scratch {
        fn new(name: &str) -> Self {
            let dir = std::env::temp_dir().join(format!("wave_player-{}-{name}", std::process::id()));
            let _ = std::fs::remove_dir_all(&dir);
            std::fs::create_dir_all(&dir).unwrap();
            Scratch(dir)
        }

        fn write_track(&self, name: &str, sample: i16, frames: usize) -> PathBuf {
            let path = self.0.join(name);
            let spec = hound::WavSpec {
                channels: 1,
                sample_rate: 8000,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            };
            let mut writer = hound::WavWriter::create(&path, spec).unwrap();
            for _ in 0..frames {
                writer.write_sample(sample).unwrap();
            }
            writer.finalize().unwrap();
            path
        }

        /// A track whose data chunk promises far more frames than the file holds.
        fn write_truncated_track(&self, name: &str) -> PathBuf {
            let path = self.0.join(name);
            let mut bytes = vec![];
            bytes.extend_from_slice(b"RIFF");
            bytes.extend_from_slice(&40u32.to_le_bytes());
            bytes.extend_from_slice(b"WAVEfmt ");
            bytes.extend_from_slice(&16u32.to_le_bytes());
            bytes.extend_from_slice(&FormatDescriptor::pcm(1, 8000, 16).to_le_bytes());
            bytes.extend_from_slice(b"data");
            bytes.extend_from_slice(&800u32.to_le_bytes());
            bytes.extend_from_slice(&[0x10, 0, 0x20, 0]);
            std::fs::write(&path, bytes).unwrap();
            path
        }

        fn has_capture(&self, name: &str) -> bool {
            self.0.join("capture").join(name).exists()
        }

        fn captured(&self, name: &str) -> Vec<i16> {
            hound::WavReader::open(self.0.join("capture").join(name))
                .unwrap()
                .samples::<i16>()
                .collect::<Result<Vec<_>, _>>()
                .unwrap()
        }
    }

    impl Drop for Scratch {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    fn shell(scratch: &Scratch, tracks: Vec<PathBuf>) -> Shell {
        let capture = scratch.0.join("capture");
        std::fs::create_dir_all(&capture).unwrap();
        Shell::new(
            Playlist::new(tracks).unwrap(),
            TrackIndexStore::new(scratch.0.join("index.txt")),
            ShellOptions {
                capture_dir: Some(capture),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_plays_through_playlist_without_input() {
        let _ = env_logger::builder().is_test(true).try_init();
        let scratch = Scratch::new("playthrough");
        let tracks = vec![
            scratch.write_track("a.wav", 1000, 80),
            scratch.write_track("b.wav", -1000, 80),
        ];

        let (sender, events) = crossbeam::channel::unbounded();
        drop(sender);
        shell(&scratch, tracks).run(events).unwrap();

        let a = scratch.captured("000-a.wav");
        let b = scratch.captured("001-b.wav");
        assert!(a.iter().filter(|s| **s == 1000).count() >= 80);
        assert!(b.iter().filter(|s| **s == -1000).count() >= 80);
        assert_eq!(
            std::fs::read_to_string(scratch.0.join("index.txt")).unwrap(),
            "1\n"
        );
    }

    #[test]
    fn test_next_queued_at_startup_stops_first_track() {
        let _ = env_logger::builder().is_test(true).try_init();
        let scratch = Scratch::new("next-at-startup");
        // Five seconds at 8 kHz.
        let tracks = vec![
            scratch.write_track("long.wav", 1000, 40000),
            scratch.write_track("short.wav", -1000, 80),
        ];

        let (sender, events) = crossbeam::channel::unbounded();
        sender.send(ControlEvent::Next).unwrap();
        sender.send(ControlEvent::Quit).unwrap();

        let start = Instant::now();
        shell(&scratch, tracks).run(events).unwrap();
        assert!(
            start.elapsed() < Duration::from_secs(2),
            "next waited for the first track to finish"
        );

        let long = scratch.captured("000-long.wav");
        assert!(long.iter().filter(|s| **s == 1000).count() < 40000);
        assert!(scratch.has_capture("001-short.wav"));
        assert_eq!(
            std::fs::read_to_string(scratch.0.join("index.txt")).unwrap(),
            "1\n"
        );
    }

    #[test]
    fn test_failed_session_leaves_shell_idle() {
        let _ = env_logger::builder().is_test(true).try_init();
        let scratch = Scratch::new("failed-session");
        let tracks = || {
            vec![
                scratch.write_truncated_track("truncated.wav"),
                scratch.write_track("good.wav", 500, 40),
            ]
        };

        // With no commands coming, the failure ends everything: no advance, no saved index.
        let (sender, events) = crossbeam::channel::unbounded();
        drop(sender);
        shell(&scratch, tracks()).run(events).unwrap();

        assert!(scratch.has_capture("000-truncated.wav"));
        assert!(!scratch.has_capture("001-good.wav"));
        assert!(!scratch.0.join("index.txt").exists());

        // `next` is what moves on.
        let (sender, events) = crossbeam::channel::unbounded();
        sender.send(ControlEvent::Next).unwrap();
        drop(sender);
        shell(&scratch, tracks()).run(events).unwrap();

        let captured = scratch.captured("001-good.wav");
        assert!(captured.iter().filter(|s| **s == 500).count() >= 40);
    }

    #[test]
    fn test_track_without_format_is_not_started() {
        let _ = env_logger::builder().is_test(true).try_init();
        let scratch = Scratch::new("broken");
        let broken = scratch.0.join("broken.wav");
        std::fs::write(&broken, b"RIFF\x04\0\0\0WAVEdata\x02\0\0\0\0\0").unwrap();
        let good = scratch.write_track("good.wav", 500, 40);

        // Nothing advances past the failure on its own; `next` does.
        let (sender, events) = crossbeam::channel::unbounded();
        sender.send(ControlEvent::Next).unwrap();
        drop(sender);
        shell(&scratch, vec![broken, good]).run(events).unwrap();

        let captured = scratch.captured("001-good.wav");
        assert!(captured.iter().filter(|s| **s == 500).count() >= 40);
    }
}
