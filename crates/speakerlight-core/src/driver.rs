//! Async driver for a [`TimerSession`].
//!
//! Runs the session on a single task: user commands and clock ticks are
//! handled one at a time, so the session never sees concurrent mutation.
//! After every command or tick the driver reconciles the clock with the
//! engine, aborting the old schedule before a new one is spawned.
//!
//! ```ignore
//! let (driver, handle) = TimerDriver::new(session);
//! let session = tokio::join!(driver.run(), async {
//!     handle.execute(Command::LoadPreset(PresetId::MultiSpeaker(4))).await?;
//!     // ...
//!     handle.shutdown().await;
//! });
//! ```

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::error::{CoreError, Result};
use crate::session::TimerSession;
use crate::timer::{
    ClockHandle, ClockSource, ColorState, MarkerInput, MarkerSet, PresetId, RunState, TickStamp,
    TimerSnapshot,
};

/// How often expired flashes are checked for while the clock is idle.
const REFRESH_PERIOD: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Pause,
    Resume,
    /// Pause when running, resume when paused, start when stopped.
    Toggle,
    Stop,
    Reset,
    LoadPreset(PresetId),
    LoadMarkers {
        markers: MarkerSet,
        label: String,
    },
    SetCustomMarkers {
        green: MarkerInput,
        yellow: MarkerInput,
        red: MarkerInput,
    },
    SetSpeaker(Option<String>),
    Flash(ColorState),
}

enum Request {
    Execute(Command, oneshot::Sender<Result<()>>),
    Snapshot(oneshot::Sender<TimerSnapshot>),
    Shutdown,
}

/// Cloneable handle used to talk to a running driver.
#[derive(Clone)]
pub struct DriverHandle {
    tx: mpsc::Sender<Request>,
}

impl DriverHandle {
    /// Run `command` and wait for its result.
    pub async fn execute(&self, command: Command) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::Execute(command, reply))
            .await
            .map_err(|_| CoreError::DriverClosed)?;
        rx.await.map_err(|_| CoreError::DriverClosed)?
    }

    pub async fn snapshot(&self) -> Result<TimerSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::Snapshot(reply))
            .await
            .map_err(|_| CoreError::DriverClosed)?;
        rx.await.map_err(|_| CoreError::DriverClosed)
    }

    /// Ask the driver to halt its clock and return the session.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(Request::Shutdown).await;
    }
}

pub struct TimerDriver {
    session: TimerSession,
    clock: ClockSource,
    running: Option<ClockHandle>,
    requests: mpsc::Receiver<Request>,
    ticks_tx: mpsc::UnboundedSender<TickStamp>,
    ticks_rx: mpsc::UnboundedReceiver<TickStamp>,
}

impl TimerDriver {
    pub fn new(session: TimerSession) -> (Self, DriverHandle) {
        let (tx, requests) = mpsc::channel(32);
        let (ticks_tx, ticks_rx) = mpsc::unbounded_channel();
        let driver = Self {
            session,
            clock: ClockSource::new(),
            running: None,
            requests,
            ticks_tx,
            ticks_rx,
        };
        (driver, DriverHandle { tx })
    }

    /// Process requests and ticks until shutdown or every handle is dropped.
    pub async fn run(mut self) -> TimerSession {
        let mut refresh = tokio::time::interval(REFRESH_PERIOD);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                request = self.requests.recv() => match request {
                    Some(Request::Execute(command, reply)) => {
                        let result = self.execute(command);
                        if let Err(e) = &result {
                            warn!(error = %e, "command failed");
                        }
                        let _ = reply.send(result);
                    }
                    Some(Request::Snapshot(reply)) => {
                        let _ = reply.send(self.session.engine().snapshot());
                    }
                    Some(Request::Shutdown) | None => break,
                },
                Some(stamp) = self.ticks_rx.recv() => {
                    self.session.tick(stamp);
                }
                _ = refresh.tick() => {
                    self.session.refresh_displays();
                }
            }
            self.sync_clock();
        }

        self.running = None;
        debug!("timer driver stopped");
        self.session
    }

    fn execute(&mut self, command: Command) -> Result<()> {
        let s = &mut self.session;
        match command {
            Command::Start => {
                s.start();
            }
            Command::Pause => {
                s.pause();
            }
            Command::Resume => {
                s.resume();
            }
            Command::Toggle => {
                match s.engine().run_state() {
                    RunState::Running => s.pause(),
                    _ => s.start(),
                };
            }
            Command::Stop => {
                s.stop();
            }
            Command::Reset => {
                s.reset();
            }
            Command::LoadPreset(id) => {
                s.load_preset(&id)?;
            }
            Command::LoadMarkers { markers, label } => {
                s.load_markers(markers, &label)?;
            }
            Command::SetCustomMarkers { green, yellow, red } => {
                s.set_custom_markers(green, yellow, red)?;
            }
            Command::SetSpeaker(speaker) => s.set_speaker(speaker),
            Command::Flash(color) => {
                s.flash(color);
            }
        }
        Ok(())
    }

    /// Make the clock match the engine: one schedule per running generation,
    /// none otherwise.
    fn sync_clock(&mut self) {
        let wanted = self.session.engine().tick_stamp();
        let current = self.running.as_ref().map(ClockHandle::stamp);
        if wanted == current {
            return;
        }
        if let Some(old) = self.running.take() {
            old.halt();
        }
        self.running = wanted.map(|stamp| self.clock.spawn(stamp, self.ticks_tx.clone()));
    }
}
