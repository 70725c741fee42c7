use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::BeatPulseError;

pub const MIN_BPM: f64 = 40.0;
pub const MAX_BPM: f64 = 240.0;
pub const MAX_SWING_PERCENT: f64 = 60.0;

const MIN_POLL_PERIOD_MS: f64 = 4.0;
const MAX_POLL_PERIOD_MS: f64 = 16.0;

/// Fraction of a musical beat used as the base firing interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quantize {
    #[default]
    Whole,
    Half,
    Quarter,
}

impl Quantize {
    pub fn factor(self) -> f64 {
        match self {
            Self::Whole => 1.0,
            Self::Half => 0.5,
            Self::Quarter => 0.25,
        }
    }
}

impl fmt::Display for Quantize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Whole => "1/1",
            Self::Half => "1/2",
            Self::Quarter => "1/4",
        };
        f.write_str(label)
    }
}

impl FromStr for Quantize {
    type Err = BeatPulseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "1/1" | "whole" => Ok(Self::Whole),
            "2" | "1/2" | "half" => Ok(Self::Half),
            "4" | "1/4" | "quarter" => Ok(Self::Quarter),
            other => Err(BeatPulseError::configuration(format!(
                "unknown quantize value `{other}`, expected 1/1, 1/2 or 1/4"
            ))),
        }
    }
}

/// Tempo parameters as supplied by the UI layer.
///
/// Values are free-form: nothing here is validated on construction. All
/// clamping happens when an interval is derived via [`TempoModel`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoConfig {
    pub bpm: f64,
    pub quantize: Quantize,
    pub swing_percent: f64,
    pub start_offset_ms: f64,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            quantize: Quantize::Whole,
            swing_percent: 0.0,
            start_offset_ms: 0.0,
        }
    }
}

impl TempoConfig {
    pub fn with_bpm(bpm: f64) -> Self {
        Self {
            bpm,
            ..Self::default()
        }
    }

    /// Start offset with non-finite input degraded to zero.
    pub fn effective_offset_ms(&self) -> f64 {
        if self.start_offset_ms.is_finite() {
            self.start_offset_ms
        } else {
            0.0
        }
    }
}

/// Derived timing for one tempo configuration. Never stored by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BeatInterval {
    pub interval_ms: f64,
    pub swing_fraction: f64,
}

impl BeatInterval {
    /// Delay applied to the slot with the given firing index. Only off-beats
    /// (odd indices) are pushed back; on-beats sit on the grid.
    pub fn swing_offset_ms(&self, index: u64) -> f64 {
        if index % 2 == 1 {
            self.interval_ms * self.swing_fraction * 0.5
        } else {
            0.0
        }
    }

    /// How often a scheduler should sample its clock for this interval.
    pub fn poll_period_ms(&self) -> f64 {
        (self.interval_ms / 8.0).clamp(MIN_POLL_PERIOD_MS, MAX_POLL_PERIOD_MS)
    }
}

/// Pure tempo arithmetic.
#[derive(Debug, Clone, Copy, Default)]
pub struct TempoModel;

impl TempoModel {
    pub fn clamp_bpm(bpm: f64) -> f64 {
        if bpm.is_nan() {
            return MIN_BPM;
        }
        bpm.clamp(MIN_BPM, MAX_BPM)
    }

    pub fn clamp_swing_percent(swing_percent: f64) -> f64 {
        if swing_percent.is_nan() {
            return 0.0;
        }
        swing_percent.clamp(0.0, MAX_SWING_PERCENT)
    }

    pub fn compute_interval(config: &TempoConfig) -> BeatInterval {
        let bpm = Self::clamp_bpm(config.bpm);
        BeatInterval {
            interval_ms: (60_000.0 / bpm) * config.quantize.factor(),
            swing_fraction: Self::clamp_swing_percent(config.swing_percent) / 100.0,
        }
    }
}
