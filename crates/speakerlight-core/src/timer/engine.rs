//! Timer engine implementation.
//!
//! The timer engine is a tick-counting state machine. It does not use
//! internal threads - a clock source (see [`super::clock`]) or the caller
//! feeds it `tick()` calls once per [`TICK_RESOLUTION_MS`].
//!
//! ## State Transitions
//!
//! ```text
//! Stopped -> Running <-> Paused
//!    ^          |          |
//!    +---- stop / reset ---+
//! ```
//!
//! Every run of the clock is a new tick *generation*. Halting the clock
//! (pause, stop, reset) bumps the generation, so a tick stamped by an older
//! schedule is ignored even if it was already queued.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new();
//! engine.load_preset(&preset)?;
//! let stamp = engine.tick_stamp().unwrap();
//! // once per 10ms:
//! engine.tick(stamp);
//! ```

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::markers::{evaluate, MarkerInput, MarkerSet, Signal};
use super::presets::Preset;
use crate::error::{CoreError, Result};
use crate::events::Event;
use crate::records::{format_time, SessionRecord, CUSTOM_PRESET, UNTITLED_SPEAKER};

/// Fixed clock resolution. Every accepted tick adds exactly this much.
pub const TICK_RESOLUTION_MS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Stopped,
    Running,
    Paused,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunState::Stopped => "stopped",
            RunState::Running => "running",
            RunState::Paused => "paused",
        })
    }
}

/// A refused custom-marker edit.
///
/// `events` holds what the refusal changed on the engine (a cleared marker
/// set after out-of-order input) so displays can follow it. It is empty when
/// nothing changed.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct MarkerRejection {
    pub error: CoreError,
    pub events: Vec<Event>,
}

impl From<MarkerRejection> for CoreError {
    fn from(rejection: MarkerRejection) -> Self {
        rejection.error
    }
}

/// Identifies the tick schedule a tick belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickStamp {
    generation: u64,
}

/// Serializable view of the engine for status output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub run_state: RunState,
    pub elapsed_ms: u64,
    pub elapsed: String,
    pub markers: MarkerSet,
    pub active_preset: Option<String>,
    pub speaker: Option<String>,
    pub signal: Signal,
}

/// Core timer engine.
///
/// Owns elapsed time, markers, run state and the active preset label.
/// Nothing else mutates them.
#[derive(Debug, Clone)]
pub struct TimerEngine {
    run_state: RunState,
    elapsed_ms: u64,
    markers: MarkerSet,
    active_preset: Option<String>,
    speaker: Option<String>,
    default_speaker: String,
    generation: u64,
}

impl TimerEngine {
    /// Create a stopped engine with no markers.
    pub fn new() -> Self {
        Self {
            run_state: RunState::Stopped,
            elapsed_ms: 0,
            markers: MarkerSet::ZERO,
            active_preset: None,
            speaker: None,
            default_speaker: UNTITLED_SPEAKER.to_string(),
            generation: 0,
        }
    }

    /// Speaker label recorded when [`TimerEngine::set_speaker`] was never called.
    pub fn with_default_speaker(mut self, speaker: impl Into<String>) -> Self {
        self.default_speaker = speaker.into();
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn markers(&self) -> MarkerSet {
        self.markers
    }

    pub fn active_preset(&self) -> Option<&str> {
        self.active_preset.as_deref()
    }

    pub fn speaker(&self) -> Option<&str> {
        self.speaker.as_deref()
    }

    /// Current color state and label, including the run-state override.
    pub fn signal(&self) -> Signal {
        evaluate(self.elapsed_ms, &self.markers).with_run_state(self.run_state, self.elapsed_ms)
    }

    /// Stamp for ticks of the current schedule. `None` unless running.
    pub fn tick_stamp(&self) -> Option<TickStamp> {
        (self.run_state == RunState::Running).then_some(TickStamp {
            generation: self.generation,
        })
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            run_state: self.run_state,
            elapsed_ms: self.elapsed_ms,
            elapsed: format_time(self.elapsed_ms),
            markers: self.markers,
            active_preset: self.active_preset.clone(),
            speaker: self.speaker.clone(),
            signal: self.signal(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start from Stopped, or resume from Paused. No-op while running.
    pub fn start(&mut self) -> Vec<Event> {
        match self.run_state {
            RunState::Stopped | RunState::Paused => {
                self.generation += 1;
                vec![self.transition(RunState::Running)]
            }
            RunState::Running => Vec::new(),
        }
    }

    /// Resume a paused timer. No-op in any other state.
    pub fn resume(&mut self) -> Vec<Event> {
        match self.run_state {
            RunState::Paused => self.start(),
            _ => Vec::new(),
        }
    }

    pub fn pause(&mut self) -> Vec<Event> {
        match self.run_state {
            RunState::Running => {
                self.halt_clock();
                vec![self.transition(RunState::Paused)]
            }
            _ => Vec::new(),
        }
    }

    /// Record the session and reset. No-op while stopped.
    pub fn stop(&mut self) -> Vec<Event> {
        if self.run_state == RunState::Stopped {
            return Vec::new();
        }
        self.halt_clock();

        let speaker = self
            .speaker
            .clone()
            .unwrap_or_else(|| self.default_speaker.clone());
        let preset = self
            .active_preset
            .clone()
            .unwrap_or_else(|| CUSTOM_PRESET.to_string());
        let record = SessionRecord::new(speaker, self.elapsed_ms, preset);
        info!(
            speaker = %record.speaker,
            duration = %record.duration,
            preset = %record.preset,
            "session recorded"
        );

        let mut events = vec![Event::RecordCreated { record }];
        events.extend(self.reset());
        events
    }

    /// Back to a clean slate: stopped, zero elapsed, no markers, no preset.
    pub fn reset(&mut self) -> Vec<Event> {
        self.halt_clock();
        let from = self.run_state;
        let had_markers = !self.markers.is_zero() || self.active_preset.is_some();

        self.markers = MarkerSet::ZERO;
        self.active_preset = None;
        self.elapsed_ms = 0;
        self.run_state = RunState::Stopped;

        let mut events = Vec::new();
        if had_markers {
            events.push(self.markers_changed());
        }
        if from != RunState::Stopped {
            events.push(self.state_changed(from));
        }
        events
    }

    /// Reset, install `preset`, and start timing immediately.
    ///
    /// On return the engine is running at zero elapsed with the preset's
    /// markers. An out-of-order preset is rejected before anything changes.
    pub fn load_preset(&mut self, preset: &Preset) -> Result<Vec<Event>> {
        preset.markers.validate()?;

        let mut events = self.reset();
        self.markers = preset.markers;
        self.active_preset = Some(preset.name.clone());
        self.elapsed_ms = 0;
        info!(preset = %preset.name, "preset loaded");

        events.push(self.markers_changed());
        events.extend(self.start());
        Ok(events)
    }

    /// Install hand-entered markers. Only allowed while stopped.
    ///
    /// Out-of-order input is discarded and the engine is forced back to zero
    /// elapsed with no markers. The rejection carries the resulting
    /// `MarkersChanged` event.
    pub fn set_custom_markers(
        &mut self,
        green: MarkerInput,
        yellow: MarkerInput,
        red: MarkerInput,
    ) -> Result<Vec<Event>, MarkerRejection> {
        if self.run_state != RunState::Stopped {
            return Err(MarkerRejection {
                error: CoreError::InvalidState {
                    operation: "edit markers",
                    state: self.run_state,
                },
                events: Vec::new(),
            });
        }

        let attempt = MarkerSet::unchecked(green.to_ms(), yellow.to_ms(), red.to_ms());
        self.elapsed_ms = 0;
        if let Err(e) = attempt.validate() {
            warn!(error = %e, "custom markers rejected");
            self.markers = MarkerSet::ZERO;
            self.active_preset = None;
            return Err(MarkerRejection {
                error: e.into(),
                events: vec![self.markers_changed()],
            });
        }

        self.markers = attempt;
        self.active_preset = Some(CUSTOM_PRESET.to_string());
        Ok(vec![self.markers_changed()])
    }

    /// Name the current speaker. `None` falls back to the default label.
    pub fn set_speaker(&mut self, speaker: Option<String>) {
        self.speaker = speaker
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
    }

    /// Advance by one tick. Ticks from a halted schedule are ignored.
    pub fn tick(&mut self, stamp: TickStamp) -> Option<Event> {
        if self.run_state != RunState::Running || stamp.generation != self.generation {
            debug!(
                stamp = stamp.generation,
                current = self.generation,
                "stale tick ignored"
            );
            return None;
        }
        self.elapsed_ms = self.elapsed_ms.saturating_add(TICK_RESOLUTION_MS);
        let signal = self.signal();
        Some(Event::Tick {
            elapsed_ms: self.elapsed_ms,
            color: signal.color,
            label: signal.label,
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn halt_clock(&mut self) {
        if self.run_state == RunState::Running {
            self.generation += 1;
        }
    }

    fn transition(&mut self, to: RunState) -> Event {
        let from = self.run_state;
        self.run_state = to;
        self.state_changed(from)
    }

    fn state_changed(&self, from: RunState) -> Event {
        info!(%from, to = %self.run_state, "timer state changed");
        Event::StateChanged {
            from,
            to: self.run_state,
            signal: self.signal(),
            at: Utc::now(),
        }
    }

    fn markers_changed(&self) -> Event {
        Event::MarkersChanged {
            markers: self.markers,
            preset: self.active_preset.clone(),
            signal: self.signal(),
            at: Utc::now(),
        }
    }
}

impl Default for TimerEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::timer::{ColorState, PresetCatalog, PresetId, SignalLabel};

    fn preset(name: &str) -> Preset {
        PresetCatalog::builtin()
            .resolve(&PresetId::Named(name.into()))
            .unwrap()
    }

    fn run_ticks(engine: &mut TimerEngine, n: u64) {
        let stamp = engine.tick_stamp().expect("engine should be running");
        for _ in 0..n {
            engine.tick(stamp);
        }
    }

    fn assert_clean(engine: &TimerEngine) {
        assert_eq!(engine.elapsed_ms(), 0);
        assert_eq!(engine.run_state(), RunState::Stopped);
        assert_eq!(engine.markers(), MarkerSet::ZERO);
        assert_eq!(engine.active_preset(), None);
    }

    #[test]
    fn start_pause_resume() {
        let mut engine = TimerEngine::new();
        assert_eq!(engine.run_state(), RunState::Stopped);

        assert_eq!(engine.start().len(), 1);
        assert_eq!(engine.run_state(), RunState::Running);
        assert!(engine.start().is_empty());

        assert_eq!(engine.pause().len(), 1);
        assert_eq!(engine.run_state(), RunState::Paused);
        assert!(engine.pause().is_empty());

        assert_eq!(engine.resume().len(), 1);
        assert_eq!(engine.run_state(), RunState::Running);
    }

    #[test]
    fn resume_only_from_paused() {
        let mut engine = TimerEngine::new();
        assert!(engine.resume().is_empty());
        assert_eq!(engine.run_state(), RunState::Stopped);
    }

    #[test]
    fn ticks_accumulate_exactly() {
        let mut engine = TimerEngine::new();
        engine.start();
        run_ticks(&mut engine, 10_000);
        assert_eq!(engine.elapsed_ms(), 100_000);
    }

    #[test]
    fn ticks_ignored_unless_running() {
        let mut engine = TimerEngine::new();
        engine.start();
        let stamp = engine.tick_stamp().unwrap();
        engine.tick(stamp);
        engine.pause();
        assert!(engine.tick_stamp().is_none());
        assert!(engine.tick(stamp).is_none());
        assert_eq!(engine.elapsed_ms(), 10);
    }

    #[test]
    fn stale_tick_after_restart_is_ignored() {
        let mut engine = TimerEngine::new();
        engine.start();
        let old = engine.tick_stamp().unwrap();
        engine.pause();
        engine.resume();
        assert!(engine.tick(old).is_none());
        assert_eq!(engine.elapsed_ms(), 0);

        let fresh = engine.tick_stamp().unwrap();
        assert!(engine.tick(fresh).is_some());
        assert_eq!(engine.elapsed_ms(), 10);
    }

    #[test]
    fn stale_tick_cannot_resurrect_after_reset() {
        let mut engine = TimerEngine::new();
        engine.load_preset(&preset("Table Topics")).unwrap();
        let stamp = engine.tick_stamp().unwrap();
        run_ticks(&mut engine, 5);
        engine.reset();
        engine.start();
        assert!(engine.tick(stamp).is_none());
        assert_eq!(engine.elapsed_ms(), 0);
    }

    #[test]
    fn tick_reports_color_transitions() {
        let mut engine = TimerEngine::new();
        engine.load_preset(&preset("1 min")).unwrap();
        run_ticks(&mut engine, 3_999);
        let stamp = engine.tick_stamp().unwrap();
        match engine.tick(stamp) {
            Some(Event::Tick {
                elapsed_ms,
                color,
                label,
            }) => {
                assert_eq!(elapsed_ms, 40_000);
                assert_eq!(color, ColorState::Green);
                assert_eq!(label, SignalLabel::Green);
            }
            other => panic!("expected tick, got {other:?}"),
        }
    }

    #[test]
    fn neutral_label_follows_run_state() {
        let mut engine = TimerEngine::new();
        engine.start();
        assert_eq!(engine.signal().label, SignalLabel::Timer);
        run_ticks(&mut engine, 1);
        assert_eq!(engine.signal().label, SignalLabel::Running);
        engine.pause();
        assert_eq!(engine.signal().label, SignalLabel::Paused);
    }

    #[test]
    fn reset_from_every_state() {
        let mut engine = TimerEngine::new();
        engine.reset();
        assert_clean(&engine);

        engine.load_preset(&preset("Prepared Speech")).unwrap();
        run_ticks(&mut engine, 42);
        engine.reset();
        assert_clean(&engine);

        engine.load_preset(&preset("Prepared Speech")).unwrap();
        run_ticks(&mut engine, 42);
        engine.pause();
        engine.reset();
        assert_clean(&engine);

        engine
            .set_custom_markers(
                MarkerInput::new(1, 0),
                MarkerInput::new(2, 0),
                MarkerInput::new(3, 0),
            )
            .unwrap();
        engine.reset();
        assert_clean(&engine);
    }

    #[test]
    fn load_preset_is_atomic() {
        let mut engine = TimerEngine::new();
        engine.start();
        run_ticks(&mut engine, 100);
        engine.pause();

        let keynote = preset("Keynote 18-22 mins");
        engine.load_preset(&keynote).unwrap();
        assert_eq!(engine.run_state(), RunState::Running);
        assert_eq!(engine.elapsed_ms(), 0);
        assert_eq!(engine.markers(), keynote.markers);
        assert_eq!(engine.active_preset(), Some("Keynote 18-22 mins"));
    }

    #[test]
    fn load_preset_rejects_unordered_markers() {
        let mut engine = TimerEngine::new();
        let bad = Preset {
            name: "bad".into(),
            group: crate::timer::PresetGroup::Custom,
            markers: MarkerSet::unchecked(3, 2, 1),
        };
        assert!(engine.load_preset(&bad).is_err());
        assert_clean(&engine);
    }

    #[test]
    fn custom_markers_out_of_order_force_reset() {
        let mut engine = TimerEngine::new();
        engine
            .set_custom_markers(
                MarkerInput::new(0, 30),
                MarkerInput::new(0, 40),
                MarkerInput::new(0, 50),
            )
            .unwrap();

        let err = engine
            .set_custom_markers(
                MarkerInput::new(0, 10),
                MarkerInput::new(0, 5),
                MarkerInput::new(0, 20),
            )
            .unwrap_err();
        assert!(matches!(
            err.error,
            CoreError::Validation(ValidationError::MarkerOrder { .. })
        ));
        assert_eq!(engine.elapsed_ms(), 0);
        assert_eq!(engine.markers(), MarkerSet::ZERO);
        assert!(matches!(
            err.events.as_slice(),
            [Event::MarkersChanged { markers, preset: None, .. }] if markers.is_zero()
        ));
    }

    #[test]
    fn custom_markers_rejected_while_running() {
        let mut engine = TimerEngine::new();
        engine.load_preset(&preset("Table Topics")).unwrap();
        let before = engine.markers();
        let err = engine
            .set_custom_markers(
                MarkerInput::new(0, 1),
                MarkerInput::new(0, 2),
                MarkerInput::new(0, 3),
            )
            .unwrap_err();
        assert!(matches!(err.error, CoreError::InvalidState { .. }));
        assert!(err.events.is_empty());
        assert_eq!(engine.markers(), before);
        assert_eq!(engine.run_state(), RunState::Running);
    }

    #[test]
    fn custom_markers_then_start_records_custom() {
        let mut engine = TimerEngine::new();
        engine
            .set_custom_markers(
                MarkerInput::new(0, 1),
                MarkerInput::new(0, 2),
                MarkerInput::new(-5, 3),
            )
            .unwrap();
        assert_eq!(engine.markers(), MarkerSet::unchecked(1_000, 2_000, 3_000));
        engine.start();
        run_ticks(&mut engine, 150);
        assert_eq!(engine.signal().color, ColorState::Green);

        let events = engine.stop();
        let record = events
            .iter()
            .find_map(|e| match e {
                Event::RecordCreated { record } => Some(record.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(record.preset, "Custom");
        assert_eq!(record.speaker, "Untitled Speaker");
        assert_eq!(record.duration, "00:01.50");
    }

    #[test]
    fn stop_emits_one_record_then_resets() {
        let mut engine = TimerEngine::new();
        engine.set_speaker(Some("Grace".into()));
        engine.load_preset(&preset("Table Topics")).unwrap();
        run_ticks(&mut engine, 12_500);
        assert_eq!(engine.elapsed_ms(), 125_000);

        let events = engine.stop();
        let records: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                Event::RecordCreated { record } => Some(record),
                _ => None,
            })
            .collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].duration, "02:05.00");
        assert_eq!(records[0].duration_ms, 125_000);
        assert_eq!(records[0].preset, "Table Topics");
        assert_eq!(records[0].speaker, "Grace");

        assert_clean(&engine);
        assert_eq!(engine.speaker(), Some("Grace"));
        assert!(engine.stop().is_empty());
    }

    #[test]
    fn stop_from_paused() {
        let mut engine = TimerEngine::new().with_default_speaker("Guest");
        engine.start();
        run_ticks(&mut engine, 7);
        engine.pause();
        let events = engine.stop();
        assert!(matches!(
            events.first(),
            Some(Event::RecordCreated { record }) if record.speaker == "Guest" && record.duration_ms == 70
        ));
        assert!(matches!(
            events.last(),
            Some(Event::StateChanged {
                from: RunState::Paused,
                to: RunState::Stopped,
                ..
            })
        ));
    }

    #[test]
    fn blank_speaker_falls_back_to_default() {
        let mut engine = TimerEngine::new();
        engine.set_speaker(Some("   ".into()));
        assert_eq!(engine.speaker(), None);
    }

    #[test]
    fn snapshot_reflects_state() {
        let mut engine = TimerEngine::new();
        engine.load_preset(&preset("Table Topics")).unwrap();
        run_ticks(&mut engine, 6_100);
        let snap = engine.snapshot();
        assert_eq!(snap.run_state, RunState::Running);
        assert_eq!(snap.elapsed, "01:01.00");
        assert_eq!(snap.signal.color, ColorState::Green);
        assert_eq!(snap.active_preset.as_deref(), Some("Table Topics"));
    }
}
