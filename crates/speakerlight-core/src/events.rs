use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::records::SessionRecord;
use crate::timer::{ColorState, MarkerSet, RunState, Signal, SignalLabel};

/// Every observable change in the timer produces an Event.
/// Displays, record sinks and other listeners subscribe to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Fired on every accepted clock tick.
    Tick {
        elapsed_ms: u64,
        color: ColorState,
        label: SignalLabel,
    },
    /// Run state transition.
    StateChanged {
        from: RunState,
        to: RunState,
        /// Signal to show after the transition.
        signal: Signal,
        at: DateTime<Utc>,
    },
    /// Marker set replaced by a preset load, a custom edit or a reset.
    MarkersChanged {
        markers: MarkerSet,
        preset: Option<String>,
        signal: Signal,
        at: DateTime<Utc>,
    },
    /// Fired once per stop.
    RecordCreated { record: SessionRecord },
    /// A display target went away. `paused` is set when the timer was
    /// paused because the lost target was the primary one.
    PresentationUnavailable {
        target: String,
        paused: bool,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Signal carried by this event, if it changes what displays show.
    pub fn signal(&self) -> Option<Signal> {
        match self {
            Event::Tick { color, label, .. } => Some(Signal {
                color: *color,
                label: *label,
            }),
            Event::StateChanged { signal, .. } | Event::MarkersChanged { signal, .. } => {
                Some(*signal)
            }
            Event::RecordCreated { .. } | Event::PresentationUnavailable { .. } => None,
        }
    }
}

/// Observer for timer events. All methods default to no-ops.
pub trait EventListener {
    fn on_tick(&mut self, _elapsed_ms: u64, _signal: Signal) {}

    fn on_state_changed(&mut self, _from: RunState, _to: RunState) {}

    fn on_markers_changed(&mut self, _markers: &MarkerSet, _preset: Option<&str>) {}

    fn on_record_created(&mut self, _record: &SessionRecord) {}

    fn on_presentation_unavailable(&mut self, _target: &str, _paused: bool) {}
}

/// Route `event` to the matching listener callback.
pub fn dispatch(listener: &mut dyn EventListener, event: &Event) {
    match event {
        Event::Tick {
            elapsed_ms,
            color,
            label,
        } => listener.on_tick(
            *elapsed_ms,
            Signal {
                color: *color,
                label: *label,
            },
        ),
        Event::StateChanged { from, to, .. } => listener.on_state_changed(*from, *to),
        Event::MarkersChanged {
            markers, preset, ..
        } => listener.on_markers_changed(markers, preset.as_deref()),
        Event::RecordCreated { record } => listener.on_record_created(record),
        Event::PresentationUnavailable { target, paused, .. } => {
            listener.on_presentation_unavailable(target, *paused)
        }
    }
}
