//! The periodic clock which drives output.
//!
//! On a microcontroller this is a hardware timer interrupt.  The engine only needs to attach a callback at an
//! interval and detach it again, so that is all [PeriodicClock] asks for.  Two implementations live here:
//! [ThreadClock], a host-side stand-in for a timer, and [ManualClock], which only ticks when told to.
use std::borrow::Cow;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// The work done on every tick.  Must not block, allocate on real hardware, or take locks the foreground holds.
pub type TickCallback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Time between ticks, in whole microseconds.
#[derive(Copy, Clone, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct TickInterval {
    micros: NonZeroU32,
}

impl TickInterval {
    pub const fn from_micros(micros: NonZeroU32) -> Self {
        TickInterval { micros }
    }

    /// `1_000_000 / sample_rate` microseconds.
    ///
    /// The division truncates, so clocks built from this run slightly fast for rates which don't divide a second
    /// evenly.  Returns `None` for rates with no representable interval: zero, or above 1 MHz.
    pub fn from_sample_rate(sample_rate: u32) -> Option<Self> {
        if sample_rate == 0 {
            return None;
        }
        NonZeroU32::new(1_000_000 / sample_rate).map(Self::from_micros)
    }

    pub fn as_micros(&self) -> u32 {
        self.micros.get()
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_micros(u64::from(self.micros.get()))
    }
}

impl std::fmt::Display for TickInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}us", self.micros)
    }
}

#[derive(thiserror::Error, Debug)]
#[error("{}", message)]
pub struct ClockError {
    message: Cow<'static, str>,
}

impl ClockError {
    pub fn new<T>(msg: T) -> ClockError
    where
        Cow<'static, str>: From<T>,
    {
        ClockError {
            message: msg.into(),
        }
    }
}

/// A source of periodic callbacks.
///
/// Attaching while attached replaces the old registration: implementations detach first, so there is never more than
/// one callback registered.
pub trait PeriodicClock: Send + 'static {
    fn attach(&mut self, callback: TickCallback, interval: TickInterval) -> Result<(), ClockError>;

    /// Stop calling the callback.  Once this returns, no tick is running and none will start.
    ///
    /// Detaching a detached clock does nothing.
    fn detach(&mut self);

    fn is_attached(&self) -> bool;
}

struct Ticker {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// A clock backed by a dedicated thread.
///
/// Deadlines are computed from the attach instant rather than from the previous wakeup, so oversleeping delays
/// individual ticks but never accumulates into drift; late ticks are delivered back to back until the thread catches
/// up.
#[derive(Default)]
pub struct ThreadClock {
    ticker: Option<Ticker>,
}

impl ThreadClock {
    pub fn new() -> Self {
        Default::default()
    }
}

fn tick_loop(callback: TickCallback, interval: Duration, stop: Arc<AtomicBool>) {
    let mut deadline = Instant::now();

    loop {
        deadline += interval;

        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }

        if stop.load(Ordering::Acquire) {
            return;
        }

        callback();
    }
}

impl PeriodicClock for ThreadClock {
    fn attach(&mut self, callback: TickCallback, interval: TickInterval) -> Result<(), ClockError> {
        self.detach();

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let period = interval.as_duration();
        let thread = std::thread::Builder::new()
            .name("wave-clock".to_string())
            .spawn(move || tick_loop(callback, period, thread_stop))
            .map_err(|e| ClockError::new(format!("Unable to start the clock thread: {e}")))?;

        self.ticker = Some(Ticker { stop, thread });
        Ok(())
    }

    fn detach(&mut self) {
        let Some(ticker) = self.ticker.take() else {
            return;
        };

        ticker.stop.store(true, Ordering::Release);

        // A callback detaching its own clock cannot wait for itself; the flag is enough since the loop checks it
        // before the next tick.
        if ticker.thread.thread().id() == std::thread::current().id() {
            return;
        }

        if ticker.thread.join().is_err() {
            log::error!("The clock thread panicked inside a tick callback");
        }
    }

    fn is_attached(&self) -> bool {
        self.ticker.is_some()
    }
}

impl Drop for ThreadClock {
    fn drop(&mut self) {
        self.detach();
    }
}

#[derive(Default)]
struct ManualClockState {
    callback: Option<TickCallback>,
    interval: Option<TickInterval>,
    attaches: u64,
    detaches: u64,
}

/// A clock which ticks only when [ManualClock::tick] is called.
///
/// Clones share one clock, so a test can hand one clone to a [crate::Player] and drive it with another.
#[derive(Clone, Default)]
pub struct ManualClock {
    state: Arc<spin::Mutex<ManualClockState>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Default::default()
    }

    /// Run one tick if a callback is attached.  Returns whether one was.
    pub fn tick(&self) -> bool {
        // Clone out of the lock: the callback may well attach or detach us.
        let callback = self.state.lock().callback.clone();
        match callback {
            Some(cb) => {
                cb();
                true
            }
            None => false,
        }
    }

    /// Tick up to `count` times, stopping early if the callback is detached.  Returns ticks run.
    pub fn tick_n(&self, count: usize) -> usize {
        (0..count).take_while(|_| self.tick()).count()
    }

    /// Interval of the current registration, if any.
    pub fn interval(&self) -> Option<TickInterval> {
        self.state.lock().interval
    }

    pub fn attach_count(&self) -> u64 {
        self.state.lock().attaches
    }

    pub fn detach_count(&self) -> u64 {
        self.state.lock().detaches
    }
}

impl PeriodicClock for ManualClock {
    fn attach(&mut self, callback: TickCallback, interval: TickInterval) -> Result<(), ClockError> {
        self.detach();
        let mut state = self.state.lock();
        state.callback = Some(callback);
        state.interval = Some(interval);
        state.attaches += 1;
        Ok(())
    }

    fn detach(&mut self) {
        let mut state = self.state.lock();
        if state.callback.take().is_some() {
            state.interval = None;
            state.detaches += 1;
        }
    }

    fn is_attached(&self) -> bool {
        self.state.lock().callback.is_some()
    }
}
