//! Timer session.
//!
//! Wires a [`TimerEngine`] to its collaborators: every event the engine
//! produces is published to the signal displays, appended to the record
//! sink when it is a record, and dispatched to registered listeners.
//!
//! Display loss is handled here. When the primary display goes away while
//! the timer runs, the session pauses the timer (if the config says so) and
//! reports it with [`Event::PresentationUnavailable`].

use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::warn;

use crate::error::Result;
use crate::events::{dispatch, Event, EventListener};
use crate::records::RecordSink;
use crate::signal::{BroadcastOutcome, SignalBroadcaster};
use crate::storage::Config;
use crate::timer::{
    ColorState, MarkerInput, MarkerSet, Preset, PresetCatalog, PresetGroup, PresetId, RunState,
    TickStamp, TimerEngine,
};

pub struct TimerSession {
    engine: TimerEngine,
    catalog: PresetCatalog,
    broadcaster: SignalBroadcaster,
    records: Box<dyn RecordSink>,
    listeners: Vec<Box<dyn EventListener>>,
    pause_on_primary_loss: bool,
}

impl TimerSession {
    pub fn new(
        engine: TimerEngine,
        catalog: PresetCatalog,
        broadcaster: SignalBroadcaster,
        records: Box<dyn RecordSink>,
    ) -> Self {
        Self {
            engine,
            catalog,
            broadcaster,
            records,
            listeners: Vec::new(),
            pause_on_primary_loss: true,
        }
    }

    /// Build a session with the speaker label, presets and signal policy
    /// from `config`.
    pub fn from_config(config: &Config, records: Box<dyn RecordSink>) -> Self {
        let engine = TimerEngine::new().with_default_speaker(config.records.default_speaker.clone());
        let broadcaster =
            SignalBroadcaster::new(Duration::from_secs(config.signal.flash_hold_secs));
        let mut session = Self::new(engine, config.catalog(), broadcaster, records);
        session.pause_on_primary_loss = config.signal.pause_on_primary_loss;
        session
    }

    pub fn set_pause_on_primary_loss(&mut self, enabled: bool) {
        self.pause_on_primary_loss = enabled;
    }

    pub fn subscribe(&mut self, listener: Box<dyn EventListener>) {
        self.listeners.push(listener);
    }

    pub fn engine(&self) -> &TimerEngine {
        &self.engine
    }

    pub fn catalog(&self) -> &PresetCatalog {
        &self.catalog
    }

    pub fn records(&self) -> &dyn RecordSink {
        self.records.as_ref()
    }

    pub fn broadcaster_mut(&mut self) -> &mut SignalBroadcaster {
        &mut self.broadcaster
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Vec<Event> {
        let events = self.engine.start();
        self.emit(events)
    }

    pub fn pause(&mut self) -> Vec<Event> {
        let events = self.engine.pause();
        self.emit(events)
    }

    pub fn resume(&mut self) -> Vec<Event> {
        let events = self.engine.resume();
        self.emit(events)
    }

    pub fn stop(&mut self) -> Vec<Event> {
        let events = self.engine.stop();
        self.emit(events)
    }

    pub fn reset(&mut self) -> Vec<Event> {
        let events = self.engine.reset();
        self.emit(events)
    }

    /// Resolve `id` against the catalog, then load and start it.
    ///
    /// An unknown name or bad speaker count leaves the timer untouched.
    pub fn load_preset(&mut self, id: &PresetId) -> Result<Vec<Event>> {
        let preset = self.catalog.resolve(id).inspect_err(|e| {
            warn!(error = %e, "preset rejected");
        })?;
        let events = self.engine.load_preset(&preset)?;
        Ok(self.emit(events))
    }

    /// Load an ad-hoc marker set under `label` and start it.
    pub fn load_markers(&mut self, markers: MarkerSet, label: &str) -> Result<Vec<Event>> {
        let preset = Preset {
            name: label.to_string(),
            group: PresetGroup::Custom,
            markers,
        };
        let events = self.engine.load_preset(&preset)?;
        Ok(self.emit(events))
    }

    /// Set hand-entered markers. On validation failure the displays are
    /// refreshed to the cleared state before the error is returned.
    pub fn set_custom_markers(
        &mut self,
        green: MarkerInput,
        yellow: MarkerInput,
        red: MarkerInput,
    ) -> Result<Vec<Event>> {
        match self.engine.set_custom_markers(green, yellow, red) {
            Ok(events) => Ok(self.emit(events)),
            Err(rejection) => {
                self.emit(rejection.events);
                Err(rejection.error)
            }
        }
    }

    pub fn set_speaker(&mut self, speaker: Option<String>) {
        self.engine.set_speaker(speaker);
    }

    /// Show a manual color card on every display. Timer state is unchanged.
    pub fn flash(&mut self, color: ColorState) -> Vec<Event> {
        let outcome = self.broadcaster.flash(color);
        self.handle_outcome(outcome)
    }

    pub fn tick(&mut self, stamp: TickStamp) -> Vec<Event> {
        match self.engine.tick(stamp) {
            Some(event) => self.emit(vec![event]),
            None => Vec::new(),
        }
    }

    /// Restore the evaluated signal once a manual flash has run out.
    pub fn refresh_displays(&mut self) -> Vec<Event> {
        match self.broadcaster.refresh_at(Instant::now()) {
            Some(outcome) => self.handle_outcome(outcome),
            None => Vec::new(),
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Deliver `events` to displays, the record sink and listeners.
    /// Returns them along with any events raised while delivering.
    ///
    /// The whole batch reaches listeners before a lost display is acted on,
    /// so a pause caused by the loss is always reported after the
    /// transitions that led up to it.
    fn emit(&mut self, events: Vec<Event>) -> Vec<Event> {
        let mut outcome = BroadcastOutcome::default();
        for event in &events {
            if let Event::RecordCreated { record } = event {
                if let Err(e) = self.records.append(record) {
                    warn!(error = %e, record = %record.id, "failed to store session record");
                }
            }

            for listener in &mut self.listeners {
                dispatch(listener.as_mut(), event);
            }

            if let Some(signal) = event.signal() {
                outcome.merge(self.broadcaster.publish(signal, self.engine.elapsed_ms()));
            }
        }

        let mut delivered = events;
        delivered.extend(self.handle_outcome(outcome));
        delivered
    }

    fn handle_outcome(&mut self, outcome: BroadcastOutcome) -> Vec<Event> {
        if outcome.lost.is_empty() {
            return Vec::new();
        }

        let pause = outcome.primary_lost()
            && self.pause_on_primary_loss
            && self.engine.run_state() == RunState::Running;

        let mut events: Vec<Event> = outcome
            .lost
            .into_iter()
            .map(|lost| Event::PresentationUnavailable {
                paused: pause && lost.primary,
                target: lost.name,
                at: Utc::now(),
            })
            .collect();

        for event in &events {
            for listener in &mut self.listeners {
                dispatch(listener.as_mut(), event);
            }
        }

        if pause {
            warn!("primary signal display lost, pausing timer");
            let paused = self.engine.pause();
            events.extend(self.emit(paused));
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CoreError, PresentationError, ValidationError};
    use crate::records::{MemoryRecordSink, SessionRecord};
    use crate::signal::{SignalFrame, SignalTarget};
    use crate::timer::Signal;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    struct Popup {
        open: Rc<Cell<bool>>,
        shown: Rc<RefCell<Vec<SignalFrame>>>,
    }

    impl SignalTarget for Popup {
        fn name(&self) -> &str {
            "popup"
        }

        fn is_live(&self) -> bool {
            self.open.get()
        }

        fn render(&mut self, frame: &SignalFrame) -> Result<(), PresentationError> {
            self.shown.borrow_mut().push(*frame);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Log {
        records: Rc<RefCell<Vec<SessionRecord>>>,
        transitions: Rc<RefCell<Vec<(RunState, RunState)>>>,
    }

    struct LogListener(Log);

    impl EventListener for LogListener {
        fn on_state_changed(&mut self, from: RunState, to: RunState) {
            self.0.transitions.borrow_mut().push((from, to));
        }

        fn on_record_created(&mut self, record: &SessionRecord) {
            self.0.records.borrow_mut().push(record.clone());
        }
    }

    struct Fixture {
        session: TimerSession,
        popup_open: Rc<Cell<bool>>,
        shown: Rc<RefCell<Vec<SignalFrame>>>,
        log: Log,
    }

    fn fixture() -> Fixture {
        let mut session = TimerSession::from_config(
            &Config::default(),
            Box::new(MemoryRecordSink::new()),
        );
        let popup_open = Rc::new(Cell::new(true));
        let shown = Rc::new(RefCell::new(Vec::new()));
        session.broadcaster_mut().add_primary(Box::new(Popup {
            open: popup_open.clone(),
            shown: shown.clone(),
        }));

        let log = Log::default();
        session.subscribe(Box::new(LogListener(Log {
            records: log.records.clone(),
            transitions: log.transitions.clone(),
        })));

        Fixture {
            session,
            popup_open,
            shown,
            log,
        }
    }

    fn tick_n(session: &mut TimerSession, n: usize) {
        for _ in 0..n {
            let stamp = session.engine().tick_stamp().unwrap();
            session.tick(stamp);
        }
    }

    #[test]
    fn stop_stores_record_and_notifies() {
        let mut f = fixture();
        f.session.set_speaker(Some("Ada".into()));
        f.session
            .load_preset(&PresetId::Named("Table Topics".into()))
            .unwrap();
        tick_n(&mut f.session, 12_500);
        f.session.stop();

        let stored = f.session.records().list().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].duration, "02:05.00");
        assert_eq!(stored[0].preset, "Table Topics");
        assert_eq!(f.log.records.borrow().len(), 1);
        assert_eq!(
            f.log.transitions.borrow().as_slice(),
            &[
                (RunState::Stopped, RunState::Running),
                (RunState::Running, RunState::Stopped)
            ]
        );
        assert_eq!(f.shown.borrow().last().unwrap().signal, Signal::NEUTRAL);
    }

    #[test]
    fn displays_follow_ticks() {
        let mut f = fixture();
        f.session
            .load_preset(&PresetId::Named("1 min".into()))
            .unwrap();
        tick_n(&mut f.session, 4_000);
        let last = *f.shown.borrow().last().unwrap();
        assert_eq!(last.signal.color, ColorState::Green);
        assert_eq!(last.elapsed_ms, 40_000);
    }

    #[test]
    fn losing_primary_display_pauses() {
        let mut f = fixture();
        f.session
            .load_preset(&PresetId::MultiSpeaker(3))
            .unwrap();
        tick_n(&mut f.session, 10);

        f.popup_open.set(false);
        let stamp = f.session.engine().tick_stamp().unwrap();
        let events = f.session.tick(stamp);

        assert!(events.iter().any(|e| matches!(
            e,
            Event::PresentationUnavailable { paused: true, .. }
        )));
        assert_eq!(f.session.engine().run_state(), RunState::Paused);
        assert_eq!(f.session.engine().elapsed_ms(), 110);
        assert!(f.session.engine().tick_stamp().is_none());
    }

    #[test]
    fn losing_primary_display_can_be_ignored() {
        let mut f = fixture();
        f.session.set_pause_on_primary_loss(false);
        f.session.start();
        f.popup_open.set(false);
        tick_n(&mut f.session, 3);
        assert_eq!(f.session.engine().run_state(), RunState::Running);
        assert_eq!(f.session.engine().elapsed_ms(), 30);
    }

    #[test]
    fn preset_loaded_without_display_reports_pause_last() {
        let mut f = fixture();
        f.popup_open.set(false);
        let events = f
            .session
            .load_preset(&PresetId::Named("Table Topics".into()))
            .unwrap();

        assert_eq!(f.session.engine().run_state(), RunState::Paused);
        assert_eq!(
            f.log.transitions.borrow().as_slice(),
            &[
                (RunState::Stopped, RunState::Running),
                (RunState::Running, RunState::Paused)
            ]
        );
        assert_eq!(
            f.log.transitions.borrow().last().map(|&(_, to)| to),
            Some(f.session.engine().run_state())
        );

        let returned: Vec<(RunState, RunState)> = events
            .iter()
            .filter_map(|e| match e {
                Event::StateChanged { from, to, .. } => Some((*from, *to)),
                _ => None,
            })
            .collect();
        assert_eq!(returned, f.log.transitions.borrow().clone());

        let lost_at = events
            .iter()
            .position(|e| matches!(e, Event::PresentationUnavailable { paused: true, .. }))
            .unwrap();
        let started_at = events
            .iter()
            .position(|e| matches!(e, Event::StateChanged { to: RunState::Running, .. }))
            .unwrap();
        assert!(started_at < lost_at);
    }

    #[test]
    fn invalid_speaker_count_changes_nothing() {
        let mut f = fixture();
        f.session.load_preset(&PresetId::Named("Table Topics".into())).unwrap();
        tick_n(&mut f.session, 5);

        let err = f.session.load_preset(&PresetId::MultiSpeaker(11)).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::SpeakerCount { count: 11, .. })
        ));
        assert_eq!(f.session.engine().run_state(), RunState::Running);
        assert_eq!(f.session.engine().elapsed_ms(), 50);
        assert_eq!(f.session.engine().active_preset(), Some("Table Topics"));
    }

    #[test]
    fn invalid_custom_markers_refresh_displays() {
        let mut f = fixture();
        let err = f
            .session
            .set_custom_markers(
                MarkerInput::new(0, 10),
                MarkerInput::new(0, 5),
                MarkerInput::new(0, 20),
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(f.session.engine().markers(), MarkerSet::ZERO);
        assert_eq!(f.shown.borrow().last().unwrap().signal, Signal::NEUTRAL);
    }

    #[test]
    fn load_markers_uses_label() {
        let mut f = fixture();
        let markers = MarkerSet::from_secs(1, 2, 3).unwrap();
        f.session.load_markers(markers, "Lightning Talk").unwrap();
        tick_n(&mut f.session, 10);
        f.session.stop();
        assert_eq!(f.session.records().list().unwrap()[0].preset, "Lightning Talk");
    }

    #[test]
    fn flash_does_not_touch_timer() {
        let mut f = fixture();
        f.session.start();
        tick_n(&mut f.session, 2);
        f.session.flash(ColorState::Yellow);
        assert_eq!(f.session.engine().run_state(), RunState::Running);
        assert_eq!(f.session.engine().elapsed_ms(), 20);

        let last = *f.shown.borrow().last().unwrap();
        assert!(last.flashing);
        assert_eq!(last.foreground_hex(), "#000000");
    }
}
