//! Timer slots for per-room timers
//!
//! A slot holds at most one pending task. Arming always cancels what was there
//! before, so two timers for the same purpose can never be alive for one room.
//! Timer tasks only *enqueue* work on their room (they take the room lock like
//! any command), which keeps them inside the per-room serialization.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, Default)]
pub struct TimerSlot {
    handle: Option<JoinHandle<()>>,
}

impl TimerSlot {
    pub fn arm<F>(&mut self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.handle = Some(tokio::spawn(fut));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Forget the handle without aborting it.
    ///
    /// Called from inside the firing task so that re-arming later doesn't
    /// abort the task that is currently doing the work.
    pub fn release(&mut self) {
        self.handle = None;
    }

    pub fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Time left in a turn: `max(0, duration - elapsed)`
pub fn remaining(start: DateTime<Utc>, duration_secs: u32, now: DateTime<Utc>) -> Duration {
    let elapsed_ms = (now - start).num_milliseconds().max(0) as u64;
    let total_ms = u64::from(duration_secs) * 1000;
    Duration::from_millis(total_ms.saturating_sub(elapsed_ms))
}

/// Wall-clock timestamps that advance with the tokio clock.
///
/// Turn start times are stored as `DateTime<Utc>` but measured against
/// deadlines on the tokio timer, so both must move together (including under
/// a paused test clock).
#[derive(Debug, Clone, Copy)]
pub struct TurnClock {
    wall: DateTime<Utc>,
    mono: Instant,
}

impl TurnClock {
    pub fn start() -> Self {
        Self {
            wall: Utc::now(),
            mono: Instant::now(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.mono.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.wall + elapsed
    }
}

/// The per-turn countdown.
///
/// A turn is identified by its `turn_start_time`. The timer remembers which
/// turn (and duration) it is armed for and which turn already fired, so the
/// end-of-turn transition happens at most once per turn no matter how often
/// the timer is re-armed.
#[derive(Debug, Default)]
pub struct TurnTimer {
    slot: TimerSlot,
    armed_for: Option<(DateTime<Utc>, u32)>,
    fired_for: Option<DateTime<Utc>>,
}

impl TurnTimer {
    pub fn is_armed_for(&self, start: DateTime<Utc>, duration_secs: u32) -> bool {
        self.armed_for == Some((start, duration_secs))
    }

    pub fn arm<F>(&mut self, start: DateTime<Utc>, duration_secs: u32, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.slot.arm(fut);
        self.armed_for = Some((start, duration_secs));
    }

    pub fn cancel(&mut self) {
        self.slot.cancel();
        self.armed_for = None;
    }

    /// Let go of the task for `start` if it is the one currently armed
    pub fn release(&mut self, start: DateTime<Utc>) {
        if self.armed_for.is_some_and(|(s, _)| s == start) {
            self.slot.release();
        }
    }

    /// Record that the turn starting at `start` timed out.
    /// Returns false if it already did.
    pub fn mark_fired(&mut self, start: DateTime<Utc>) -> bool {
        if self.fired_for == Some(start) {
            return false;
        }
        self.fired_for = Some(start);
        true
    }

    pub fn is_pending(&self) -> bool {
        self.slot.is_armed()
    }
}

/// The abandonment grace timer.
///
/// Every arm or cancel bumps an epoch; a firing task only acts if its epoch is
/// still current, which turns a grace expiry that lost a race against a
/// reattach into a no-op.
#[derive(Debug, Default)]
pub struct CleanupTimer {
    slot: TimerSlot,
    epoch: u64,
}

impl CleanupTimer {
    pub fn arm<F, Fut>(&mut self, make: F) -> u64
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.epoch += 1;
        self.slot.arm(make(self.epoch));
        self.epoch
    }

    pub fn cancel(&mut self) {
        self.slot.cancel();
        self.epoch += 1;
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch
    }

    pub fn release(&mut self) {
        self.slot.release();
    }

    pub fn is_armed(&self) -> bool {
        self.slot.is_armed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_remaining_clamps_at_zero() {
        let start = Utc::now();
        assert_eq!(remaining(start, 60, start), Duration::from_secs(60));
        assert_eq!(
            remaining(start, 60, start + chrono::Duration::seconds(45)),
            Duration::from_secs(15)
        );
        assert_eq!(
            remaining(start, 60, start + chrono::Duration::seconds(90)),
            Duration::ZERO
        );
        // Clock skew: a start in the future counts as no time elapsed
        assert_eq!(
            remaining(start, 60, start - chrono::Duration::seconds(5)),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_mark_fired_once_per_turn() {
        let mut timer = TurnTimer::default();
        let turn = Utc::now();

        assert!(timer.mark_fired(turn));
        assert!(!timer.mark_fired(turn));
        assert!(timer.mark_fired(turn + chrono::Duration::seconds(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearming_cancels_previous_task() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut slot = TimerSlot::default();

        for _ in 0..3 {
            let fired = fired.clone();
            slot.arm(async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                fired.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!slot.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_turn_clock_follows_tokio_time() {
        let clock = TurnClock::start();
        let before = clock.now();

        tokio::time::advance(Duration::from_secs(42)).await;
        let after = clock.now();

        assert_eq!((after - before).num_seconds(), 42);
        assert_eq!(remaining(before, 60, after), Duration::from_secs(18));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_epochs() {
        let mut timer = CleanupTimer::default();
        let first = timer.arm(|_| async {});
        assert!(timer.is_current(first));

        let second = timer.arm(|_| async {});
        assert!(!timer.is_current(first));
        assert!(timer.is_current(second));

        timer.cancel();
        assert!(!timer.is_current(second));
    }
}
