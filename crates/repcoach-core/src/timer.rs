//! Countdown timer primitive.
//!
//! The countdown is a wall-clock-based state machine. It does not use
//! internal threads or an interval scheduler -- the caller invokes
//! `tick()` periodically and remaining time is derived from elapsed wall
//! time, so decrements stay anchored to real seconds even when ticks
//! arrive late.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> Completed
//!           ^            |
//!           '-- start ---'
//! ```
//!
//! `start()` on a running countdown cancels the previous run first; there
//! is never more than one live schedule per instance. Completion is
//! reported exactly once, after which the countdown is inert until
//! restarted.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountdownState {
    Idle,
    Running,
    Completed,
}

/// Emitted by `tick()` when the observable remaining time changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEvent {
    /// Remaining time dropped to a new whole-second value.
    Tick { remaining_secs: u32 },
    /// Remaining time reached zero. Fires exactly once per run.
    Completed,
}

/// Wall-clock-anchored countdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Countdown {
    duration_secs: u32,
    state: CountdownState,
    /// Epoch milliseconds when the current run started.
    started_epoch_ms: Option<u64>,
    /// Last whole-second remaining value reported via `Tick`.
    last_reported_secs: Option<u32>,
}

impl Countdown {
    pub fn new() -> Self {
        Self {
            duration_secs: 0,
            state: CountdownState::Idle,
            started_epoch_ms: None,
            last_reported_secs: None,
        }
    }

    /// Start (or restart) the countdown for `duration_secs`.
    ///
    /// Any previous run is cancelled: the anchor and reporting state are
    /// reset, so a resized rest period restarts cleanly instead of
    /// inheriting the old schedule.
    pub fn start(&mut self, duration_secs: u32) {
        self.duration_secs = duration_secs;
        self.state = CountdownState::Running;
        self.started_epoch_ms = Some(now_ms());
        self.last_reported_secs = Some(duration_secs);
    }

    /// Cancel the current run without completing it.
    pub fn stop(&mut self) {
        self.state = CountdownState::Idle;
        self.started_epoch_ms = None;
        self.last_reported_secs = None;
    }

    pub fn state(&self) -> CountdownState {
        self.state
    }

    /// Whole seconds remaining in the current run.
    pub fn remaining_secs(&self) -> u32 {
        match self.state {
            CountdownState::Running => self.remaining_at(now_ms()),
            _ => 0,
        }
    }

    /// Call periodically. Returns an event when the whole-second value
    /// changes, and `Completed` exactly once when the run finishes.
    pub fn tick(&mut self) -> Option<CountdownEvent> {
        self.tick_at(now_ms())
    }

    fn remaining_at(&self, now: u64) -> u32 {
        let started = match self.started_epoch_ms {
            Some(ms) => ms,
            None => return 0,
        };
        let elapsed_secs = now.saturating_sub(started) / 1000;
        u64::from(self.duration_secs).saturating_sub(elapsed_secs) as u32
    }

    fn tick_at(&mut self, now: u64) -> Option<CountdownEvent> {
        if self.state != CountdownState::Running {
            return None;
        }
        let remaining = self.remaining_at(now);
        if remaining == 0 {
            self.state = CountdownState::Completed;
            self.started_epoch_ms = None;
            self.last_reported_secs = None;
            return Some(CountdownEvent::Completed);
        }
        if self.last_reported_secs != Some(remaining) {
            self.last_reported_secs = Some(remaining);
            return Some(CountdownEvent::Tick {
                remaining_secs: remaining,
            });
        }
        None
    }
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new()
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_down_on_second_boundaries() {
        let mut cd = Countdown::new();
        cd.start(3);
        let t0 = cd.started_epoch_ms.unwrap();

        // Mid-second: nothing to report.
        assert_eq!(cd.tick_at(t0 + 400), None);
        // One second elapsed.
        assert_eq!(
            cd.tick_at(t0 + 1100),
            Some(CountdownEvent::Tick { remaining_secs: 2 })
        );
        // Same second again: no duplicate tick.
        assert_eq!(cd.tick_at(t0 + 1900), None);
    }

    #[test]
    fn late_ticks_do_not_drift() {
        let mut cd = Countdown::new();
        cd.start(10);
        let t0 = cd.started_epoch_ms.unwrap();

        // A single late tick after 4.2s reflects real elapsed time.
        assert_eq!(
            cd.tick_at(t0 + 4200),
            Some(CountdownEvent::Tick { remaining_secs: 6 })
        );
    }

    #[test]
    fn completes_exactly_once() {
        let mut cd = Countdown::new();
        cd.start(2);
        let t0 = cd.started_epoch_ms.unwrap();

        assert_eq!(cd.tick_at(t0 + 2500), Some(CountdownEvent::Completed));
        assert_eq!(cd.state(), CountdownState::Completed);
        // Inert afterwards.
        assert_eq!(cd.tick_at(t0 + 5000), None);
        assert_eq!(cd.tick_at(t0 + 9000), None);
    }

    #[test]
    fn restart_cancels_previous_run() {
        let mut cd = Countdown::new();
        cd.start(5);
        let t0 = cd.started_epoch_ms.unwrap();
        assert!(cd.tick_at(t0 + 1100).is_some());

        // Restart with a different duration mid-run.
        cd.start(90);
        assert_eq!(cd.state(), CountdownState::Running);
        let t1 = cd.started_epoch_ms.unwrap();
        assert_eq!(
            cd.tick_at(t1 + 1100),
            Some(CountdownEvent::Tick { remaining_secs: 89 })
        );
    }

    #[test]
    fn stop_makes_countdown_inert() {
        let mut cd = Countdown::new();
        cd.start(5);
        let t0 = cd.started_epoch_ms.unwrap();
        cd.stop();
        assert_eq!(cd.state(), CountdownState::Idle);
        assert_eq!(cd.tick_at(t0 + 10_000), None);
        assert_eq!(cd.remaining_secs(), 0);
    }

    #[test]
    fn zero_duration_completes_on_first_tick() {
        let mut cd = Countdown::new();
        cd.start(0);
        let t0 = cd.started_epoch_ms.unwrap();
        assert_eq!(cd.tick_at(t0), Some(CountdownEvent::Completed));
    }
}
