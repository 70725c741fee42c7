/// Result alias that carries the custom [`BeatPulseError`] type.
pub type Result<T> = std::result::Result<T, BeatPulseError>;

/// Common error type for the core crate.
///
/// Scheduling and pulse logic never produce these; they clamp or drop
/// instead. Only configuration and resource acquisition surface here.
#[derive(Debug, thiserror::Error)]
pub enum BeatPulseError {
    /// A performer or configuration value was rejected at construction.
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// The audio asset could not be decoded.
    #[error("failed to decode audio: {0}")]
    Decode(String),
    /// `play` was requested before any media was loaded.
    #[error("no media loaded")]
    NoMediaLoaded,
    /// The playback device refused to start.
    #[error("media unavailable: {0}")]
    MediaUnavailable(String),
    /// The rendering surface has not finished initialising.
    #[error("render target is not ready")]
    RenderTargetUnready,
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl BeatPulseError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn configuration<T: Into<String>>(msg: T) -> Self {
        Self::Configuration(msg.into())
    }
}

impl From<&str> for BeatPulseError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for BeatPulseError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

impl From<hound::Error> for BeatPulseError {
    fn from(value: hound::Error) -> Self {
        Self::Decode(value.to_string())
    }
}
