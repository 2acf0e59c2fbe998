//! # speakerlight Core Library
//!
//! This library provides the core logic for the speakerlight speech timer:
//! a green/yellow/red timing light for clubs and conferences. The CLI binary
//! is a thin terminal skin over the same library.
//!
//! ## Architecture
//!
//! - **Timer Engine**: a tick-counting state machine (stopped/running/paused)
//!   fed by a 10ms clock source
//! - **Threshold Evaluator**: pure mapping from elapsed time and markers to a
//!   color state
//! - **Presets**: named marker sets plus the computed multi-speaker
//!   evaluation preset
//! - **Signal Broadcaster**: renders the color state onto display targets
//! - **Storage**: SQLite session records and TOML configuration
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`TimerSession`]: Engine wired to displays, records and listeners
//! - [`TimerDriver`]: Async loop running a session against the clock
//! - [`Database`]: Session record persistence
//! - [`Config`]: Application configuration management

pub mod ambient;
pub mod driver;
pub mod error;
pub mod events;
pub mod records;
pub mod session;
pub mod signal;
pub mod storage;
pub mod timer;

pub use driver::{Command, DriverHandle, TimerDriver};
pub use error::{ConfigError, CoreError, DatabaseError, PresentationError, ValidationError};
pub use events::{Event, EventListener};
pub use records::{format_time, MemoryRecordSink, RecordSink, SessionRecord};
pub use session::TimerSession;
pub use signal::{ChannelTarget, SignalBroadcaster, SignalFrame, SignalTarget};
pub use storage::{Config, Database};
pub use timer::{
    ColorState, MarkerInput, MarkerSet, PresetCatalog, PresetId, RunState, Signal, SignalLabel,
    TimerEngine,
};
