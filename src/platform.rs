//! Platform seam: clock, turn requests and timers.
//!
//! The scheduler never spins its own loop. It asks the [`Platform`] for a
//! turn on one of three channels and the embedder answers by calling
//! [`Runtime::flush`](crate::Runtime::flush). [`ManualPlatform`] is a
//! deterministic implementation with a virtual clock.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[cfg(feature = "async")]
use futures_util::future::BoxFuture;

/// How soon a scheduler turn should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Next microtask boundary
    Microtask,
    /// Next event-loop task (message channel)
    Macrotask,
    /// Zero-delay timer
    Timer,
}

impl Channel {
    /// Best channel `platform` supports, trying `preferred` first.
    pub fn pick(platform: &dyn Platform, preferred: Channel) -> Channel {
        let order: &[Channel] = match preferred {
            Channel::Microtask => &[Channel::Microtask, Channel::Macrotask],
            Channel::Macrotask => &[Channel::Macrotask],
            Channel::Timer => &[],
        };
        order
            .iter()
            .copied()
            .find(|&c| platform.supports(c))
            .unwrap_or(Channel::Timer)
    }
}

/// Environment the runtime is embedded in.
pub trait Platform: Send + Sync {
    /// Monotonic clock used for time slices and task timestamps.
    fn now(&self) -> Instant;

    /// Whether `channel` is available. [`Channel::Timer`] always is.
    fn supports(&self, channel: Channel) -> bool {
        let _ = channel;
        true
    }

    /// Ask for a scheduler turn.
    fn request_turn(&self, channel: Channel);

    /// Future completing after `duration`.
    #[cfg(feature = "async")]
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

// =============================================================================
// ManualPlatform
// =============================================================================

struct Timer {
    at: Instant,
    waker: std::task::Waker,
}

struct ManualState {
    now: Instant,
    auto_tick: Duration,
    turns: Vec<Channel>,
    unsupported: Vec<Channel>,
    timers: Vec<Timer>,
}

/// Deterministic platform for tests and headless embedding.
///
/// Time only moves through [`advance`](Self::advance), plus `auto_tick` on
/// every clock read when configured. Requested turns are recorded, not run.
#[derive(Clone)]
pub struct ManualPlatform {
    state: Arc<Mutex<ManualState>>,
}

impl Default for ManualPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualPlatform {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                now: Instant::now(),
                auto_tick: Duration::ZERO,
                turns: Vec::new(),
                unsupported: Vec::new(),
                timers: Vec::new(),
            })),
        }
    }

    /// Advance the clock by `tick` on every [`Platform::now`] call.
    pub fn with_auto_tick(self, tick: Duration) -> Self {
        self.state.lock().auto_tick = tick;
        self
    }

    /// Report `channel` as unavailable.
    pub fn without(self, channel: Channel) -> Self {
        self.state.lock().unsupported.push(channel);
        self
    }

    /// Move the clock forward and wake every timer that came due.
    pub fn advance(&self, duration: Duration) {
        let due = {
            let mut state = self.state.lock();
            state.now += duration;
            let now = state.now;
            let (due, pending): (Vec<_>, Vec<_>) =
                state.timers.drain(..).partition(|t| t.at <= now);
            state.timers = pending;
            due
        };
        for timer in due {
            timer.waker.wake();
        }
    }

    /// Turns requested since the last call.
    pub fn take_turns(&self) -> Vec<Channel> {
        std::mem::take(&mut self.state.lock().turns)
    }

    /// Timers waiting for the clock
    pub fn pending_timers(&self) -> usize {
        self.state.lock().timers.len()
    }
}

impl Platform for ManualPlatform {
    fn now(&self) -> Instant {
        let mut state = self.state.lock();
        let now = state.now;
        let tick = state.auto_tick;
        state.now += tick;
        now
    }

    fn supports(&self, channel: Channel) -> bool {
        channel == Channel::Timer || !self.state.lock().unsupported.contains(&channel)
    }

    fn request_turn(&self, channel: Channel) {
        self.state.lock().turns.push(channel);
    }

    #[cfg(feature = "async")]
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        let at = self.state.lock().now + duration;
        Box::pin(Sleep {
            state: Arc::clone(&self.state),
            at,
        })
    }
}

impl std::fmt::Debug for ManualPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ManualPlatform")
            .field("auto_tick", &state.auto_tick)
            .field("turns", &state.turns)
            .field("timers", &state.timers.len())
            .finish()
    }
}

#[cfg(feature = "async")]
struct Sleep {
    state: Arc<Mutex<ManualState>>,
    at: Instant,
}

#[cfg(feature = "async")]
impl std::future::Future for Sleep {
    type Output = ();

    fn poll(self: std::pin::Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> std::task::Poll<()> {
        let mut state = self.state.lock();
        if state.now >= self.at {
            return std::task::Poll::Ready(());
        }
        state.timers.push(Timer {
            at: self.at,
            waker: cx.waker().clone(),
        });
        std::task::Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_impl_all!(ManualPlatform: Send, Sync, Platform);

    #[test]
    fn test_channel_fallback() {
        let all = ManualPlatform::new();
        assert_eq!(Channel::pick(&all, Channel::Microtask), Channel::Microtask);

        let no_micro = ManualPlatform::new().without(Channel::Microtask);
        assert_eq!(Channel::pick(&no_micro, Channel::Microtask), Channel::Macrotask);

        let bare = ManualPlatform::new()
            .without(Channel::Microtask)
            .without(Channel::Macrotask);
        assert_eq!(Channel::pick(&bare, Channel::Microtask), Channel::Timer);
        assert_eq!(Channel::pick(&bare, Channel::Macrotask), Channel::Timer);
        assert!(bare.supports(Channel::Timer));
    }

    #[test]
    fn test_clock_and_auto_tick() {
        let platform = ManualPlatform::new();
        let t0 = platform.now();
        assert_eq!(platform.now(), t0);
        platform.advance(Duration::from_millis(3));
        assert_eq!(platform.now() - t0, Duration::from_millis(3));

        let ticking = ManualPlatform::new().with_auto_tick(Duration::from_millis(1));
        let a = ticking.now();
        let b = ticking.now();
        assert_eq!(b - a, Duration::from_millis(1));
    }

    #[test]
    fn test_turn_log() {
        let platform = ManualPlatform::new();
        platform.request_turn(Channel::Microtask);
        platform.request_turn(Channel::Timer);
        assert_eq!(platform.take_turns(), vec![Channel::Microtask, Channel::Timer]);
        assert!(platform.take_turns().is_empty());
    }

    #[cfg(feature = "async")]
    #[test]
    fn test_sleep_wakes_on_advance() {
        use futures_util::FutureExt;
        use futures_util::task::noop_waker_ref;
        use std::task::Context;

        let platform = ManualPlatform::new();
        let mut sleep = platform.sleep(Duration::from_millis(10));
        let mut cx = Context::from_waker(noop_waker_ref());
        assert!(sleep.poll_unpin(&mut cx).is_pending());
        assert_eq!(platform.pending_timers(), 1);

        platform.advance(Duration::from_millis(10));
        assert_eq!(platform.pending_timers(), 0);
        assert!(sleep.poll_unpin(&mut cx).is_ready());
    }
}
