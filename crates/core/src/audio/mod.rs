use std::io::Cursor;

use crate::{BeatPulseError, MonotonicClock, Result};

/// Decoded audio held in memory, interleaved.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: u16,
    samples: Vec<f32>,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<f32>) -> Result<Self> {
        if sample_rate == 0 || channels == 0 {
            return Err(BeatPulseError::Decode(format!(
                "unsupported layout: {sample_rate} Hz, {channels} channel(s)"
            )));
        }
        Ok(Self {
            sample_rate,
            channels,
            samples,
        })
    }

    /// A silent mono buffer, handy for driving a performance without a file.
    pub fn silence(duration_ms: f64, sample_rate: u32) -> Self {
        let sample_rate = sample_rate.max(1);
        let frames = (duration_ms.max(0.0) / 1_000.0 * sample_rate as f64).round() as usize;
        Self {
            sample_rate,
            channels: 1,
            samples: vec![0.0; frames],
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration_ms(&self) -> f64 {
        self.frames() as f64 * 1_000.0 / self.sample_rate as f64
    }
}

/// Turns raw bytes into an [`AudioBuffer`].
pub trait AudioDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<AudioBuffer>;
}

/// RIFF/WAVE decoder supporting integer and float PCM.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavDecoder;

impl AudioDecoder for WavDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<AudioBuffer> {
        let reader = hound::WavReader::new(Cursor::new(bytes))?;
        let spec = reader.spec();

        let samples = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|sample| sample.map(|s| s as f32 * scale))
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };

        tracing::debug!(
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            samples = samples.len(),
            "decoded wav"
        );
        AudioBuffer::new(spec.sample_rate, spec.channels, samples)
    }
}

/// Opaque token for one playback of a buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackHandle {
    id: u64,
    start_time_ms: f64,
    duration_ms: f64,
}

impl PlaybackHandle {
    pub fn new(id: u64, start_time_ms: f64, duration_ms: f64) -> Self {
        Self {
            id,
            start_time_ms,
            duration_ms,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Monotonic time at which the first sample is heard.
    pub fn start_time_ms(&self) -> f64 {
        self.start_time_ms
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }
}

/// Audio playback device as seen by the lifecycle.
pub trait AudioOutput {
    fn play(&mut self, buffer: &AudioBuffer) -> Result<PlaybackHandle>;

    /// Stops the given playback. Unknown or already finished handles are
    /// ignored.
    fn stop(&mut self, handle: &PlaybackHandle);

    /// The "ended" notification: true once the handle has played to the end.
    fn has_ended(&self, handle: &PlaybackHandle) -> bool;
}

/// Output that produces no sound and advances purely on a monotonic clock.
/// A playback ends once its buffer's duration has elapsed.
#[derive(Debug)]
pub struct ClockedOutput<C> {
    clock: C,
    next_id: u64,
    current: Option<u64>,
}

impl<C: MonotonicClock> ClockedOutput<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            next_id: 1,
            current: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.current.is_some()
    }
}

impl<C: MonotonicClock> AudioOutput for ClockedOutput<C> {
    fn play(&mut self, buffer: &AudioBuffer) -> Result<PlaybackHandle> {
        if buffer.frames() == 0 {
            return Err(BeatPulseError::MediaUnavailable(
                "audio buffer contains no frames".to_string(),
            ));
        }

        let handle = PlaybackHandle::new(self.next_id, self.clock.now_ms(), buffer.duration_ms());
        self.next_id += 1;
        self.current = Some(handle.id());
        tracing::debug!(
            id = handle.id(),
            start_ms = handle.start_time_ms(),
            duration_ms = handle.duration_ms(),
            "playback started"
        );
        Ok(handle)
    }

    fn stop(&mut self, handle: &PlaybackHandle) {
        if self.current == Some(handle.id()) {
            self.current = None;
            tracing::debug!(id = handle.id(), "playback stopped");
        }
    }

    fn has_ended(&self, handle: &PlaybackHandle) -> bool {
        self.clock.now_ms() - handle.start_time_ms() >= handle.duration_ms()
    }
}
