//! Playback sessions.
//!
//! [Player::play] is the foreground half of the engine: it walks the chunks of one stream, decodes frames into the
//! FIFO, and waits on the FIFO when it is full.  The background half is the tick callback installed by the transport.
//! [PlayerHandle]s let other threads (button handlers, a UI) pause, resume and stop whatever is playing.
use std::io::{Read, Seek};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use wave_sync::{create_fifo, FifoMonitor, FifoProducer};

use crate::clock::PeriodicClock;
use crate::config::PlayerConfig;
use crate::error::{ContainerError, ResourceError, Result, StallError};
use crate::format::FormatDescriptor;
use crate::frame::FrameDecoder;
use crate::output::OutputDevice;
use crate::riff::{ChunkReader, FourCc};
use crate::transport::{Emitter, PlaybackState, Transport};

/// How a session ended, when it ended without an error.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, derive_more::IsVariant)]
pub enum PlaybackOutcome {
    /// The stream was played to its end.
    #[default]
    Finished,

    /// [PlayerHandle::stop] was called.
    Stopped,
}

/// What happened during one session.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PlaybackReport {
    pub format: Option<FormatDescriptor>,

    /// Frames decoded and handed to the FIFO.
    pub frames_queued: u64,

    pub data_chunks: u32,

    /// Chunks of types we don't understand.
    pub skipped_chunks: u32,

    /// Ticks which found the FIFO empty and held the previous level.
    pub underruns: u64,

    pub outcome: PlaybackOutcome,
}

struct Shared {
    transport: spin::Mutex<Transport>,
    output: Arc<dyn OutputDevice>,
    stop_requested: AtomicBool,
}

/// Streams WAV files to an output device, one session at a time.
pub struct Player {
    shared: Arc<Shared>,
    config: PlayerConfig,
}

/// Controls the sessions of a [Player] from other threads.
#[derive(Clone)]
pub struct PlayerHandle {
    shared: Arc<Shared>,
}

impl Player {
    pub fn new(
        output: impl OutputDevice,
        clock: impl PeriodicClock,
        config: PlayerConfig,
    ) -> Self {
        Player {
            shared: Arc::new(Shared {
                transport: spin::Mutex::new(Transport::new(Box::new(clock))),
                output: Arc::new(output),
                stop_requested: AtomicBool::new(false),
            }),
            config,
        }
    }

    pub fn handle(&self) -> PlayerHandle {
        PlayerHandle {
            shared: self.shared.clone(),
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Play one stream from start to end, blocking until it is done.
    ///
    /// The stream must be positioned at the start of a RIFF container.  A stop request made while no session is
    /// playing applies to the next one, which then ends before its first frame; the request is cleared when this
    /// returns.
    ///
    /// On error the session is torn down and the clock detached before returning; the player can be reused.
    pub fn play<R: Read + Seek>(&mut self, reader: R) -> Result<PlaybackReport> {
        let (producer, consumer) = create_fifo(self.config.fifo_capacity);
        let monitor = producer.monitor();
        let emitter = Arc::new(Emitter::new(consumer, self.shared.output.clone()));

        self.shared.transport.lock().begin(emitter);
        if self.shared.stop_requested.load(Ordering::Acquire) {
            info!("Playback session started with a stop already pending");
        } else {
            info!("Playback session started");
        }

        let session = Session {
            chunks: ChunkReader::new(reader),
            producer,
            monitor: monitor.clone(),
            shared: &self.shared,
            config: &self.config,
            report: Default::default(),
        };
        let result = session.run();

        {
            let mut transport = self.shared.transport.lock();
            transport.end();
            self.shared.stop_requested.store(false, Ordering::Release);
        }

        let underruns = monitor.underruns();
        if underruns > 0 {
            warn!("The output ran dry {underruns} times");
        }

        match result {
            Ok(mut report) => {
                report.underruns = underruns;
                info!(
                    "Playback session {:?} after {} frames",
                    report.outcome, report.frames_queued
                );
                Ok(report)
            }
            Err(e) => {
                error!("Playback session aborted: {e}");
                Err(e)
            }
        }
    }
}

impl PlayerHandle {
    /// Freeze output.  Returns false if nothing was playing.
    pub fn pause(&self) -> bool {
        self.shared.transport.lock().pause()
    }

    /// Continue after a pause.  Returns false, staying paused, if nothing is buffered yet.
    pub fn resume(&self) -> Result<bool> {
        Ok(self.shared.transport.lock().resume()?)
    }

    /// End the current session, or the next one if [Player::play] has not been called yet.
    ///
    /// Output stops immediately.  The decoder notices at the next frame boundary and [Player::play] returns with
    /// [PlaybackOutcome::Stopped].
    pub fn stop(&self) {
        self.shared.stop_requested.store(true, Ordering::Release);
        let mut transport = self.shared.transport.lock();
        if !transport.state().is_stopped() {
            info!("Stopping playback");
        }
        transport.end();
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.transport.lock().state()
    }

    /// Levels decoded but not yet output.
    pub fn buffered(&self) -> usize {
        self.shared.transport.lock().buffered()
    }

    pub fn is_clock_attached(&self) -> bool {
        self.shared.transport.lock().clock_attached()
    }

    /// Is a session playing, but between data chunks?
    ///
    /// [PlayerHandle::resume] does nothing then: the clock is restarted by the next data chunk, which stays paused
    /// until resumed again.
    pub fn is_between_data_chunks(&self) -> bool {
        self.shared.transport.lock().between_data_chunks()
    }
}

enum Flow {
    Continue,
    Stopped,
}

/// Tracks how long the clock has been attached without making progress.  Paused time doesn't count.
struct StallWatch {
    timeout: Option<Duration>,
    since: Option<Instant>,
}

impl StallWatch {
    fn new(timeout: Option<Duration>) -> Self {
        StallWatch {
            timeout,
            since: None,
        }
    }

    fn check(&mut self, clock_active: bool) -> Result<(), StallError> {
        let Some(timeout) = self.timeout else {
            return Ok(());
        };

        if !clock_active {
            self.since = None;
            return Ok(());
        }

        let since = *self.since.get_or_insert_with(Instant::now);
        if since.elapsed() >= timeout {
            return Err(StallError { timeout });
        }
        Ok(())
    }
}

fn frame_buffer(size: usize) -> Result<Vec<u8>, ResourceError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(size)
        .map_err(|source| ResourceError { size, source })?;
    buf.resize(size, 0);
    Ok(buf)
}

struct Session<'a, R> {
    chunks: ChunkReader<R>,
    producer: FifoProducer,
    monitor: FifoMonitor,
    shared: &'a Shared,
    config: &'a PlayerConfig,
    report: PlaybackReport,
}

impl<R: Read + Seek> Session<'_, R> {
    fn stop_requested(&self) -> bool {
        self.shared.stop_requested.load(Ordering::Acquire)
    }

    fn run(mut self) -> Result<PlaybackReport> {
        while let Some(header) = self.chunks.next_header()? {
            if self.stop_requested() {
                self.report.outcome = PlaybackOutcome::Stopped;
                break;
            }

            debug!("Read chunk {} of {} bytes", header.id, header.size);

            match header.id {
                FourCc::RIFF => match self.chunks.read_form_type()? {
                    Some(FourCc::WAVE) => debug!("RIFF form type WAVE"),
                    Some(other) => warn!("RIFF form type is {other}, not WAVE; continuing anyway"),
                    None => warn!("Stream ends inside the RIFF header"),
                },
                FourCc::FMT => {
                    if self.report.format.is_some() {
                        return Err(ContainerError::DuplicateFormat.into());
                    }
                    let format = self.chunks.read_format(header.size)?;
                    debug!("Format: {format}");
                    self.report.format = Some(format);
                }
                FourCc::DATA => {
                    let format = self.report.format.ok_or(ContainerError::MissingFormat)?;
                    self.report.data_chunks += 1;
                    if let Flow::Stopped = self.play_data(&format, header.size)? {
                        self.report.outcome = PlaybackOutcome::Stopped;
                        break;
                    }
                }
                other => {
                    info!("Skipping unknown chunk {other} of {} bytes", header.size);
                    self.report.skipped_chunks += 1;
                    self.chunks.skip(header.padded_size())?;
                }
            }
        }

        if self.report.data_chunks == 0 && self.report.outcome.is_finished() {
            warn!("The stream has no data chunk");
        }

        Ok(self.report)
    }

    fn play_data(&mut self, format: &FormatDescriptor, size: u32) -> Result<Flow> {
        let decoder = FrameDecoder::new(format)?;
        let interval = format.tick_interval()?;
        let block_align = decoder.block_align() as u64;
        let frames = u64::from(size) / block_align;
        let mut frame = frame_buffer(decoder.block_align())?;

        debug!("Data chunk: {frames} frames, tick interval {interval}");

        if !self.shared.transport.lock().start_clock(interval)? {
            debug!("Output clock not started yet");
        }

        for index in 0..frames {
            if self.stop_requested() {
                return Ok(Flow::Stopped);
            }

            if !self.chunks.read_frame(&mut frame)? {
                return Err(ContainerError::Truncated {
                    declared_frames: frames,
                    read_frames: index,
                }
                .into());
            }

            if let Flow::Stopped = self.queue(decoder.decode(&frame))? {
                return Ok(Flow::Stopped);
            }
            self.report.frames_queued += 1;
        }

        // A partial frame at the end, and the pad byte of an odd-sized chunk.
        let trailing = u64::from(size) % block_align + u64::from(size & 1);
        self.chunks.skip(trailing)?;

        if self.config.end_of_data.is_drain() {
            if let Flow::Stopped = self.drain()? {
                return Ok(Flow::Stopped);
            }
        }

        self.shared.transport.lock().stop_clock();
        Ok(Flow::Continue)
    }

    /// Put a level in the FIFO, spinning while it is full.
    fn queue(&mut self, level: u16) -> Result<Flow> {
        let mut level = level;
        let mut watch = StallWatch::new(self.config.backpressure_timeout);

        loop {
            match self.producer.try_push(level) {
                Ok(()) => return Ok(Flow::Continue),
                Err(rejected) => level = rejected,
            }

            if self.stop_requested() {
                return Ok(Flow::Stopped);
            }
            watch.check(self.monitor.is_active())?;
            std::hint::spin_loop();
        }
    }

    /// Spin until the tick callback has output everything buffered.
    fn drain(&mut self) -> Result<Flow> {
        let mut watch = StallWatch::new(self.config.backpressure_timeout);

        while !self.monitor.is_empty() {
            if self.stop_requested() {
                return Ok(Flow::Stopped);
            }
            watch.check(self.monitor.is_active())?;
            std::hint::spin_loop();
        }

        Ok(Flow::Continue)
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("config", &self.config)
            .field("state", &self.shared.transport.lock().state())
            .finish()
    }
}
