//! Clock source.
//!
//! A tokio task that sends one [`TickStamp`] per period until halted.
//! Halting aborts the task; ticks already sitting in the channel carry the
//! old stamp and are rejected by the engine.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::engine::{TickStamp, TICK_RESOLUTION_MS};

#[derive(Debug, Clone, Copy)]
pub struct ClockSource {
    period: Duration,
}

impl ClockSource {
    pub fn new() -> Self {
        Self {
            period: Duration::from_millis(TICK_RESOLUTION_MS),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start a tick schedule for `stamp`. Must be called inside a tokio runtime.
    pub fn spawn(&self, stamp: TickStamp, tx: mpsc::UnboundedSender<TickStamp>) -> ClockHandle {
        let period = self.period;
        let task = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            // Catch up after a stall so elapsed time keeps pace with the wall clock.
            interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
            loop {
                interval.tick().await;
                if tx.send(stamp).is_err() {
                    break;
                }
            }
        });
        ClockHandle { stamp, task }
    }
}

impl Default for ClockSource {
    fn default() -> Self {
        Self::new()
    }
}

/// A running tick schedule. Dropping the handle halts it.
#[derive(Debug)]
pub struct ClockHandle {
    stamp: TickStamp,
    task: JoinHandle<()>,
}

impl ClockHandle {
    pub fn stamp(&self) -> TickStamp {
        self.stamp
    }

    pub fn halt(self) {
        drop(self);
    }
}

impl Drop for ClockHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
