//! Threshold markers and the color-state evaluator.
//!
//! A [`MarkerSet`] holds the green/yellow/red elapsed-time boundaries.
//! [`evaluate`] maps an elapsed time onto a [`ColorState`] by checking the
//! most severe marker first, so a set that slipped past validation still
//! degrades to the most severe matching color.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::engine::RunState;
use crate::error::ValidationError;

/// Green/yellow/red thresholds in milliseconds. A zero marker is disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarkerSet {
    pub green_ms: u64,
    pub yellow_ms: u64,
    pub red_ms: u64,
}

impl MarkerSet {
    /// All markers disabled.
    pub const ZERO: MarkerSet = MarkerSet {
        green_ms: 0,
        yellow_ms: 0,
        red_ms: 0,
    };

    /// Build a marker set from whole seconds, rejecting out-of-order values.
    pub fn from_secs(green: u64, yellow: u64, red: u64) -> Result<Self, ValidationError> {
        Self::from_ms(
            green.saturating_mul(1000),
            yellow.saturating_mul(1000),
            red.saturating_mul(1000),
        )
    }

    /// Build a marker set from milliseconds, rejecting out-of-order values.
    pub fn from_ms(green_ms: u64, yellow_ms: u64, red_ms: u64) -> Result<Self, ValidationError> {
        let set = Self::unchecked(green_ms, yellow_ms, red_ms);
        set.validate()?;
        Ok(set)
    }

    /// Build without checking the ordering invariant.
    pub const fn unchecked(green_ms: u64, yellow_ms: u64, red_ms: u64) -> Self {
        Self {
            green_ms,
            yellow_ms,
            red_ms,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.red_ms < self.yellow_ms || self.yellow_ms < self.green_ms {
            return Err(ValidationError::MarkerOrder {
                green_ms: self.green_ms,
                yellow_ms: self.yellow_ms,
                red_ms: self.red_ms,
            });
        }
        Ok(())
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

/// A `{minutes, seconds}` pair as typed into a custom marker field.
///
/// Negative components count as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerInput {
    pub minutes: i64,
    pub seconds: i64,
}

impl MarkerInput {
    pub const fn new(minutes: i64, seconds: i64) -> Self {
        Self { minutes, seconds }
    }

    /// Parse `M:S`, `MM:SS` or a bare second count.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let err = || ValidationError::TimeFormat {
            input: input.to_string(),
        };
        let trimmed = input.trim();
        match trimmed.split_once(':') {
            Some((m, s)) => Ok(Self::new(
                m.trim().parse().map_err(|_| err())?,
                s.trim().parse().map_err(|_| err())?,
            )),
            None => Ok(Self::new(0, trimmed.parse().map_err(|_| err())?)),
        }
    }

    pub fn to_ms(self) -> u64 {
        let minutes = self.minutes.max(0) as u64;
        let seconds = self.seconds.max(0) as u64;
        minutes
            .saturating_mul(60)
            .saturating_add(seconds)
            .saturating_mul(1000)
    }
}

/// Derived signal color. Ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorState {
    Neutral,
    Green,
    Yellow,
    Red,
}

impl ColorState {
    /// Background color of the signal display.
    pub fn background_hex(self) -> &'static str {
        match self {
            ColorState::Neutral => "#333333",
            ColorState::Green => "#4CAF50",
            ColorState::Yellow => "#FFEB3B",
            ColorState::Red => "#F44336",
        }
    }

    /// Text color on top of [`ColorState::background_hex`].
    pub fn foreground_hex(self) -> &'static str {
        match self {
            ColorState::Yellow => "#000000",
            _ => "#FFFFFF",
        }
    }
}

/// Text shown on the signal display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalLabel {
    Timer,
    Running,
    Paused,
    Green,
    Yellow,
    Red,
}

impl SignalLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalLabel::Timer => "TIMER",
            SignalLabel::Running => "RUNNING",
            SignalLabel::Paused => "PAUSED",
            SignalLabel::Green => "GREEN",
            SignalLabel::Yellow => "YELLOW",
            SignalLabel::Red => "RED",
        }
    }
}

impl fmt::Display for SignalLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A color state with its display label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub color: ColorState,
    pub label: SignalLabel,
}

impl Signal {
    pub const NEUTRAL: Signal = Signal {
        color: ColorState::Neutral,
        label: SignalLabel::Timer,
    };

    /// Label for a manual flash of `color`.
    pub fn flash(color: ColorState) -> Signal {
        let label = match color {
            ColorState::Neutral => SignalLabel::Timer,
            ColorState::Green => SignalLabel::Green,
            ColorState::Yellow => SignalLabel::Yellow,
            ColorState::Red => SignalLabel::Red,
        };
        Signal { color, label }
    }

    /// Apply the run-state label override. Only a neutral signal is affected.
    pub fn with_run_state(self, run_state: RunState, elapsed_ms: u64) -> Signal {
        if self.color != ColorState::Neutral || elapsed_ms == 0 {
            return self;
        }
        let label = match run_state {
            RunState::Running => SignalLabel::Running,
            RunState::Paused => SignalLabel::Paused,
            RunState::Stopped => SignalLabel::Timer,
        };
        Signal { label, ..self }
    }
}

/// Map elapsed time onto a signal, checking red, then yellow, then green.
pub fn evaluate(elapsed_ms: u64, markers: &MarkerSet) -> Signal {
    let reached = |marker: u64| marker > 0 && elapsed_ms >= marker;

    if reached(markers.red_ms) {
        Signal::flash(ColorState::Red)
    } else if reached(markers.yellow_ms) {
        Signal::flash(ColorState::Yellow)
    } else if reached(markers.green_ms) {
        Signal::flash(ColorState::Green)
    } else {
        Signal::NEUTRAL
    }
}
