//! The pause/resume state machine, and the tick callback it attaches.
//!
//! Transitions:
//!
//! - `Stopped -> Running`: a session begins.  The FIFO is fresh, so it is primed with silence.  The clock is attached
//!   once the first data chunk tells us the interval.
//! - `Running -> Paused`: the clock is detached and the read cursor freezes.  The decoder keeps filling the FIFO until
//!   it is full, then waits.
//! - `Paused -> Running`: only if there is something buffered and a data chunk is in progress.  Otherwise resume does
//!   nothing and we stay paused.
//! - `Running | Paused -> Stopped`: the session ended, by draining, by error, or by request.
//!
//! There is no way from `Stopped` to `Paused`.
//!
//! Everything here happens under the player's transport lock, which is also the only place the clock is attached or
//! detached.  The tick callback never takes that lock.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use wave_sync::{FifoConsumer, FifoMonitor};

use crate::clock::{ClockError, PeriodicClock, TickCallback, TickInterval};
use crate::output::OutputDevice;

#[derive(Copy, Clone, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Hash, derive_more::IsVariant)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Running,
    Paused,
}

/// Everything one tick touches.
pub(crate) struct Emitter {
    /// Only the tick callback locks this.
    consumer: spin::Mutex<FifoConsumer>,
    monitor: FifoMonitor,
    output: Arc<dyn OutputDevice>,
    paused: AtomicBool,
}

impl Emitter {
    pub(crate) fn new(consumer: FifoConsumer, output: Arc<dyn OutputDevice>) -> Self {
        let monitor = consumer.monitor();
        Emitter {
            consumer: spin::Mutex::new(consumer),
            monitor,
            output,
            paused: AtomicBool::new(false),
        }
    }

    /// Move one level from the FIFO to the output.
    ///
    /// A no-op unless the clock is marked active and we are not paused.  An empty FIFO re-emits the previous level.
    pub(crate) fn tick(&self) {
        if !self.monitor.is_active() || self.paused.load(Ordering::Acquire) {
            return;
        }

        // Ticks never overlap, so this never fails.  Never spin here.
        let Some(mut consumer) = self.consumer.try_lock() else {
            return;
        };
        let level = consumer.next_level();
        drop(consumer);

        self.output.set_level(level);
    }

    pub(crate) fn monitor(&self) -> &FifoMonitor {
        &self.monitor
    }
}

struct Session {
    emitter: Arc<Emitter>,
    callback: TickCallback,

    /// Set while a data chunk is being played.
    interval: Option<TickInterval>,
}

pub(crate) struct Transport {
    state: PlaybackState,
    clock: Box<dyn PeriodicClock>,
    session: Option<Session>,
}

impl Transport {
    pub(crate) fn new(clock: Box<dyn PeriodicClock>) -> Self {
        Transport {
            state: PlaybackState::Stopped,
            clock,
            session: None,
        }
    }

    pub(crate) fn state(&self) -> PlaybackState {
        self.state
    }

    /// Levels waiting in the current session's FIFO.
    pub(crate) fn buffered(&self) -> usize {
        self.session
            .as_ref()
            .map(|s| s.emitter.monitor().fill())
            .unwrap_or(0)
    }

    /// A session exists but no data chunk is in progress.
    pub(crate) fn between_data_chunks(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.interval.is_none())
    }

    pub(crate) fn clock_attached(&self) -> bool {
        self.clock.is_attached()
    }

    /// `Stopped -> Running` with a new FIFO.
    pub(crate) fn begin(&mut self, emitter: Arc<Emitter>) {
        if !self.state.is_stopped() {
            log::warn!("Starting a session while another is {:?}; ending it", self.state);
            self.end();
        }

        let tick_emitter = emitter.clone();
        let callback: TickCallback = Arc::new(move || tick_emitter.tick());
        self.session = Some(Session {
            emitter,
            callback,
            interval: None,
        });
        self.state = PlaybackState::Running;
    }

    /// A data chunk is starting.  Attach the clock unless paused.
    ///
    /// Returns whether the clock was attached; when paused, it will be attached on resume instead.
    pub(crate) fn start_clock(&mut self, interval: TickInterval) -> Result<bool, ClockError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(false);
        };
        session.interval = Some(interval);

        match self.state {
            PlaybackState::Running => {
                self.attach()?;
                Ok(true)
            }
            PlaybackState::Paused => {
                log::debug!("Paused at the start of a data chunk; deferring the clock");
                Ok(false)
            }
            PlaybackState::Stopped => Ok(false),
        }
    }

    /// A data chunk is over.  Detach the clock, leaving the state alone.
    pub(crate) fn stop_clock(&mut self) {
        self.detach();
        if let Some(session) = self.session.as_mut() {
            session.interval = None;
        }
    }

    /// `Running -> Paused`.  Returns whether anything changed.
    pub(crate) fn pause(&mut self) -> bool {
        if !self.state.is_running() {
            log::debug!("Ignoring pause while {:?}", self.state);
            return false;
        }

        if let Some(session) = self.session.as_ref() {
            session.emitter.paused.store(true, Ordering::Release);
        }
        self.detach();
        self.state = PlaybackState::Paused;
        true
    }

    /// `Paused -> Running`, if there is anything to play.  Returns whether anything changed.
    pub(crate) fn resume(&mut self) -> Result<bool, ClockError> {
        if !self.state.is_paused() {
            log::debug!("Ignoring resume while {:?}", self.state);
            return Ok(false);
        }

        let Some(session) = self.session.as_ref() else {
            return Ok(false);
        };

        if session.interval.is_none() {
            log::debug!("Between data chunks; staying paused until the next one is resumed");
            return Ok(false);
        }
        if session.emitter.monitor().is_empty() {
            log::debug!("Nothing buffered to resume; staying paused");
            return Ok(false);
        }

        session.emitter.paused.store(false, Ordering::Release);
        self.attach()?;
        self.state = PlaybackState::Running;
        Ok(true)
    }

    /// Any state `-> Stopped`, discarding the session.
    pub(crate) fn end(&mut self) {
        self.detach();
        self.session = None;
        self.state = PlaybackState::Stopped;
    }

    fn attach(&mut self) -> Result<(), ClockError> {
        let Some(session) = self.session.as_ref() else {
            return Ok(());
        };
        let Some(interval) = session.interval else {
            return Ok(());
        };

        let monitor = session.emitter.monitor().clone();
        monitor.set_active(true);
        if let Err(e) = self.clock.attach(session.callback.clone(), interval) {
            monitor.set_active(false);
            return Err(e);
        }
        Ok(())
    }

    fn detach(&mut self) {
        if let Some(session) = self.session.as_ref() {
            session.emitter.monitor().set_active(false);
        }
        self.clock.detach();
    }
}
