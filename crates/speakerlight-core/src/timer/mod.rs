mod clock;
mod engine;
mod markers;
mod presets;

pub use clock::{ClockHandle, ClockSource};
pub use engine::{
    MarkerRejection, RunState, TickStamp, TimerEngine, TimerSnapshot, TICK_RESOLUTION_MS,
};
pub use markers::{evaluate, ColorState, MarkerInput, MarkerSet, Signal, SignalLabel};
pub use presets::{
    multi_speaker_markers, Preset, PresetCatalog, PresetDef, PresetGroup, PresetId,
    MAX_SPEAKERS, MIN_SPEAKERS, MULTI_SPEAKER_LABEL,
};
