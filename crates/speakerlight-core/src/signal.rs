//! Signal broadcaster.
//!
//! Renders the current [`Signal`] onto any number of display targets. Every
//! target is checked for liveness before each update; a target that is gone
//! is dropped and reported back to the caller, never turned into a tick
//! failure. One target may be marked primary: losing it is what the session
//! treats as "the speaker can no longer see the light".
//!
//! The broadcaster also owns manual flashes: a timekeeper can hold up a
//! green/yellow/red card for a few seconds regardless of the elapsed time.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::PresentationError;
use crate::timer::{ColorState, Signal};

/// What a display target is asked to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalFrame {
    pub signal: Signal,
    pub elapsed_ms: u64,
    /// Set while a manual flash overrides the evaluated signal.
    pub flashing: bool,
}

impl SignalFrame {
    pub fn background_hex(&self) -> &'static str {
        self.signal.color.background_hex()
    }

    pub fn foreground_hex(&self) -> &'static str {
        self.signal.color.foreground_hex()
    }
}

/// A surface that can show the signal: a popup window, a terminal line,
/// a remote display.
pub trait SignalTarget {
    fn name(&self) -> &str;

    /// Whether the target can still be reached. Checked before every render.
    fn is_live(&self) -> bool {
        true
    }

    fn render(&mut self, frame: &SignalFrame) -> Result<(), PresentationError>;
}

/// A target that went away during a broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LostTarget {
    pub name: String,
    pub primary: bool,
    pub error: PresentationError,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastOutcome {
    pub delivered: usize,
    /// Targets that failed this render but stay registered.
    pub failed: Vec<PresentationError>,
    /// Targets that are unavailable and have been removed.
    pub lost: Vec<LostTarget>,
}

impl BroadcastOutcome {
    pub fn primary_lost(&self) -> bool {
        self.lost.iter().any(|t| t.primary)
    }

    /// Fold the result of a later broadcast into this one.
    pub fn merge(&mut self, other: BroadcastOutcome) {
        self.delivered += other.delivered;
        self.failed.extend(other.failed);
        self.lost.extend(other.lost);
    }
}

struct Slot {
    target: Box<dyn SignalTarget>,
    primary: bool,
}

#[derive(Debug, Clone, Copy)]
struct Flash {
    signal: Signal,
    until: Instant,
}

pub struct SignalBroadcaster {
    slots: Vec<Slot>,
    flash_hold: Duration,
    flash: Option<Flash>,
    last: Option<(Signal, u64)>,
}

impl SignalBroadcaster {
    pub fn new(flash_hold: Duration) -> Self {
        Self {
            slots: Vec::new(),
            flash_hold,
            flash: None,
            last: None,
        }
    }

    pub fn add_target(&mut self, target: Box<dyn SignalTarget>) {
        self.slots.push(Slot {
            target,
            primary: false,
        });
    }

    /// Register the primary target. Any previous primary is demoted.
    pub fn add_primary(&mut self, target: Box<dyn SignalTarget>) {
        for slot in &mut self.slots {
            slot.primary = false;
        }
        self.slots.push(Slot {
            target,
            primary: true,
        });
    }

    pub fn target_count(&self) -> usize {
        self.slots.len()
    }

    pub fn has_primary(&self) -> bool {
        self.slots.iter().any(|s| s.primary)
    }

    pub fn is_flashing_at(&self, now: Instant) -> bool {
        self.flash.is_some_and(|f| now < f.until)
    }

    pub fn publish(&mut self, signal: Signal, elapsed_ms: u64) -> BroadcastOutcome {
        self.publish_at(signal, elapsed_ms, Instant::now())
    }

    /// Show `signal` on every live target, unless a flash is still holding.
    pub fn publish_at(&mut self, signal: Signal, elapsed_ms: u64, now: Instant) -> BroadcastOutcome {
        self.last = Some((signal, elapsed_ms));
        let frame = match self.flash {
            Some(flash) if now < flash.until => SignalFrame {
                signal: flash.signal,
                elapsed_ms,
                flashing: true,
            },
            _ => {
                self.flash = None;
                SignalFrame {
                    signal,
                    elapsed_ms,
                    flashing: false,
                }
            }
        };
        self.render_all(&frame)
    }

    pub fn flash(&mut self, color: ColorState) -> BroadcastOutcome {
        self.flash_at(color, Instant::now())
    }

    /// Override the displayed color for the configured hold time.
    pub fn flash_at(&mut self, color: ColorState, now: Instant) -> BroadcastOutcome {
        let signal = Signal::flash(color);
        self.flash = Some(Flash {
            signal,
            until: now + self.flash_hold,
        });
        let elapsed_ms = self.last.map_or(0, |(_, e)| e);
        self.render_all(&SignalFrame {
            signal,
            elapsed_ms,
            flashing: true,
        })
    }

    /// Re-render the last published signal once a flash has expired.
    ///
    /// Returns `None` when there is nothing to do.
    pub fn refresh_at(&mut self, now: Instant) -> Option<BroadcastOutcome> {
        let flash = self.flash?;
        if now < flash.until {
            return None;
        }
        let (signal, elapsed_ms) = self.last.unwrap_or((Signal::NEUTRAL, 0));
        Some(self.publish_at(signal, elapsed_ms, now))
    }

    fn render_all(&mut self, frame: &SignalFrame) -> BroadcastOutcome {
        let mut outcome = BroadcastOutcome::default();

        self.slots.retain_mut(|slot| {
            let name = slot.target.name().to_string();
            let result = if slot.target.is_live() {
                slot.target.render(frame)
            } else {
                Err(PresentationError::Unavailable {
                    target: name.clone(),
                })
            };

            match result {
                Ok(()) => {
                    outcome.delivered += 1;
                    true
                }
                Err(error @ PresentationError::Unavailable { .. }) => {
                    warn!(target_name = %name, primary = slot.primary, "signal target lost");
                    outcome.lost.push(LostTarget {
                        name,
                        primary: slot.primary,
                        error,
                    });
                    false
                }
                Err(error) => {
                    debug!(target_name = %name, %error, "signal target skipped");
                    outcome.failed.push(error);
                    true
                }
            }
        });

        outcome
    }
}

/// Forwards frames over a channel, e.g. to a secondary display task.
///
/// The target is live as long as the receiving side exists. A full channel
/// skips the frame rather than blocking the tick.
pub struct ChannelTarget {
    name: String,
    tx: mpsc::Sender<SignalFrame>,
}

impl ChannelTarget {
    pub fn new(name: impl Into<String>, tx: mpsc::Sender<SignalFrame>) -> Self {
        Self {
            name: name.into(),
            tx,
        }
    }
}

impl SignalTarget for ChannelTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_live(&self) -> bool {
        !self.tx.is_closed()
    }

    fn render(&mut self, frame: &SignalFrame) -> Result<(), PresentationError> {
        self.tx.try_send(*frame).map_err(|e| match e {
            mpsc::error::TrySendError::Closed(_) => PresentationError::Unavailable {
                target: self.name.clone(),
            },
            mpsc::error::TrySendError::Full(_) => PresentationError::RenderFailed {
                target: self.name.clone(),
                message: "display is not keeping up".into(),
            },
        })
    }
}
