//! Core library for the Beatpulse performance engine.
//!
//! A tempo configuration becomes a drift-free stream of beat events that is
//! synchronised to an audio playback clock, filtered per performer, and
//! turned into non-stacking visual pulses on a rendering surface. Each module
//! owns one stage of that pipeline; [`Performance`] wires them together.

pub mod audio;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod performance;
pub mod pulse;
pub mod render;
pub mod scene;
pub mod subdivision;
pub mod tempo;
pub mod timeline;

pub use audio::{AudioBuffer, AudioDecoder, AudioOutput, ClockedOutput, PlaybackHandle, WavDecoder};
pub use config::{AppConfig, PerformerConfig, RenderConfig};
pub use error::{BeatPulseError, Result};
pub use lifecycle::{PlaybackLifecycle, PlaybackPhase};
pub use performance::{Performance, PerformanceStatus};
pub use pulse::{PulseCommand, PulseController, PulseState};
pub use render::{FrameClock, RenderGate, RenderSurface};
pub use scene::{Reactor, ReactorKind, SceneGraph};
pub use subdivision::{is_relevant, PerformerSpec, DEFAULT_PULSE_MS};
pub use tempo::{BeatInterval, Quantize, TempoConfig, TempoModel, MAX_BPM, MIN_BPM};
pub use timeline::{
    BeatEvent, BeatScheduler, ManualClock, MonotonicClock, SchedulerPhase, SystemClock,
};
