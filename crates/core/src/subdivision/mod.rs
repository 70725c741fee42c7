use std::num::NonZeroU64;

use serde::Serialize;

use crate::{BeatPulseError, Result};

/// Default pulse length applied when a performer does not specify one.
pub const DEFAULT_PULSE_MS: f64 = 120.0;

/// Returns `true` when the performer dividing beats by `subdivision` should
/// react to `beat_index`.
pub fn is_relevant(beat_index: u64, subdivision: NonZeroU64) -> bool {
    beat_index % subdivision.get() == 0
}

/// A validated performer registration. The id doubles as the reactor id in
/// the scene graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformerSpec {
    id: String,
    subdivision: NonZeroU64,
    pulse_ms: f64,
}

impl PerformerSpec {
    /// Validates the subdivision factor. Zero or negative factors are
    /// rejected here so [`PerformerSpec::is_relevant`] never has to.
    pub fn new(id: impl Into<String>, subdivision: i64) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(BeatPulseError::configuration("performer id must not be empty"));
        }

        let subdivision = u64::try_from(subdivision)
            .ok()
            .and_then(NonZeroU64::new)
            .ok_or_else(|| {
                BeatPulseError::configuration(format!(
                    "performer `{id}` has subdivision {subdivision}, expected a positive integer"
                ))
            })?;

        Ok(Self {
            id,
            subdivision,
            pulse_ms: DEFAULT_PULSE_MS,
        })
    }

    pub fn with_pulse_ms(mut self, pulse_ms: f64) -> Self {
        self.pulse_ms = if pulse_ms.is_finite() {
            pulse_ms.max(0.0)
        } else {
            DEFAULT_PULSE_MS
        };
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn subdivision(&self) -> NonZeroU64 {
        self.subdivision
    }

    pub fn pulse_ms(&self) -> f64 {
        self.pulse_ms
    }

    pub fn is_relevant(&self, beat_index: u64) -> bool {
        is_relevant(beat_index, self.subdivision)
    }
}
