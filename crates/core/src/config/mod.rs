use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{PerformerSpec, ReactorKind, Result, TempoConfig, DEFAULT_PULSE_MS};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub tempo: TempoConfig,
    pub performers: Vec<PerformerConfig>,
    pub render: RenderConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tempo: TempoConfig::default(),
            performers: vec![
                PerformerConfig::new("kick", 1, ReactorKind::Ring),
                PerformerConfig::new("snare", 2, ReactorKind::Glow),
                PerformerConfig::new("strobe", 4, ReactorKind::Strobe),
            ],
            render: RenderConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json_str(&raw)?;
        tracing::debug!(path = %path.as_ref().display(), "loaded configuration");
        Ok(config)
    }

    /// Validates every performer entry. The first invalid entry aborts.
    pub fn performer_specs(&self) -> Result<Vec<PerformerSpec>> {
        self.performers.iter().map(PerformerConfig::to_spec).collect()
    }
}

/// A performer as written in a configuration file. The subdivision is kept
/// signed so that bad input reaches validation instead of failing to parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformerConfig {
    pub id: String,
    pub subdivision: i64,
    #[serde(default = "default_pulse_ms")]
    pub pulse_ms: f64,
    #[serde(default)]
    pub kind: ReactorKind,
}

impl PerformerConfig {
    pub fn new(id: impl Into<String>, subdivision: i64, kind: ReactorKind) -> Self {
        Self {
            id: id.into(),
            subdivision,
            pulse_ms: DEFAULT_PULSE_MS,
            kind,
        }
    }

    pub fn to_spec(&self) -> Result<PerformerSpec> {
        Ok(PerformerSpec::new(self.id.clone(), self.subdivision)?.with_pulse_ms(self.pulse_ms))
    }
}

fn default_pulse_ms() -> f64 {
    DEFAULT_PULSE_MS
}

/// Settings for the render frame loop, which is independent of beat timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub frame_rate: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { frame_rate: 60 }
    }
}

impl RenderConfig {
    pub fn frame_interval_ms(&self) -> f64 {
        1_000.0 / self.frame_rate.max(1) as f64
    }
}
