use serde::{Deserialize, Serialize};

use crate::{
    AudioBuffer, AudioOutput, BeatEvent, BeatPulseError, BeatScheduler, PlaybackHandle, Result,
    TempoConfig, TempoModel,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackPhase {
    #[default]
    Stopped,
    Starting,
    Playing,
}

/// Everything that exists only while audio is playing.
#[derive(Debug)]
struct PlaybackSession {
    anchor_time_ms: f64,
    handle: PlaybackHandle,
    scheduler: BeatScheduler,
}

/// Coordinates audio playback with the beat scheduler.
///
/// The tempo configuration lives here rather than in shared state; changes
/// reach a running scheduler only through [`PlaybackLifecycle::set_tempo_config`].
#[derive(Debug)]
pub struct PlaybackLifecycle<A: AudioOutput> {
    output: A,
    media: Option<AudioBuffer>,
    config: TempoConfig,
    phase: PlaybackPhase,
    session: Option<PlaybackSession>,
}

impl<A: AudioOutput> PlaybackLifecycle<A> {
    pub fn new(output: A, config: TempoConfig) -> Self {
        Self {
            output,
            media: None,
            config,
            phase: PlaybackPhase::Stopped,
            session: None,
        }
    }

    pub fn load(&mut self, buffer: AudioBuffer) {
        tracing::debug!(duration_ms = buffer.duration_ms(), "media loaded");
        self.media = Some(buffer);
    }

    pub fn has_media(&self) -> bool {
        self.media.is_some()
    }

    /// Starts playback and the beat grid together. Any running session is
    /// torn down first. On failure the scheduler is never armed.
    pub fn play(&mut self) -> Result<()> {
        if self.media.is_none() {
            return Err(BeatPulseError::NoMediaLoaded);
        }
        self.stop();

        self.phase = PlaybackPhase::Starting;
        let started = match self.media.as_ref() {
            Some(buffer) => self.output.play(buffer),
            None => Err(BeatPulseError::NoMediaLoaded),
        };
        let handle = match started {
            Ok(handle) => handle,
            Err(err) => {
                self.phase = PlaybackPhase::Stopped;
                tracing::warn!(error = %err, "playback failed to start");
                return Err(err);
            }
        };

        let anchor_time_ms = handle.start_time_ms() + self.config.effective_offset_ms();
        let mut scheduler = BeatScheduler::new();
        scheduler.start(anchor_time_ms, self.config);

        tracing::info!(
            anchor_time_ms,
            interval_ms = scheduler.interval().interval_ms,
            "playback started"
        );
        self.session = Some(PlaybackSession {
            anchor_time_ms,
            handle,
            scheduler,
        });
        self.phase = PlaybackPhase::Playing;
        Ok(())
    }

    /// Stops audio and beats and releases the playback handle. Returns
    /// whether a session was actually torn down.
    pub fn stop(&mut self) -> bool {
        let Some(mut session) = self.session.take() else {
            self.phase = PlaybackPhase::Stopped;
            return false;
        };
        self.output.stop(&session.handle);
        session.scheduler.stop();
        self.phase = PlaybackPhase::Stopped;
        tracing::info!(beats = session.scheduler.beats_fired(), "playback stopped");
        true
    }

    /// Replaces the tempo configuration. A running grid is retimed in place
    /// and keeps its anchor; playback is not restarted.
    pub fn set_tempo_config(&mut self, config: TempoConfig) {
        self.config = config;
        if let Some(session) = self.session.as_mut() {
            session.scheduler.reschedule(config);
        }
    }

    /// Advances the session by one poll. Returns the beat due at `now_ms`,
    /// if any. The audio "ended" notification is observed here and ends the
    /// session exactly as [`PlaybackLifecycle::stop`] would.
    pub fn tick(&mut self, now_ms: f64) -> Option<BeatEvent> {
        let ended = self
            .session
            .as_ref()
            .map(|session| self.output.has_ended(&session.handle))
            .unwrap_or(false);
        if ended {
            tracing::debug!("audio ended");
            self.stop();
            return None;
        }
        self.session.as_mut()?.scheduler.poll(now_ms)
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    pub fn is_playing(&self) -> bool {
        self.phase == PlaybackPhase::Playing
    }

    pub fn config(&self) -> &TempoConfig {
        &self.config
    }

    pub fn beat_count(&self) -> u64 {
        self.session
            .as_ref()
            .map(|session| session.scheduler.beats_fired())
            .unwrap_or(0)
    }

    pub fn interval_ms(&self) -> f64 {
        TempoModel::compute_interval(&self.config).interval_ms
    }

    pub fn poll_period_ms(&self) -> f64 {
        TempoModel::compute_interval(&self.config).poll_period_ms()
    }

    pub fn anchor_time_ms(&self) -> Option<f64> {
        self.session.as_ref().map(|session| session.anchor_time_ms)
    }

    pub fn next_due_ms(&self) -> Option<f64> {
        self.session
            .as_ref()
            .and_then(|session| session.scheduler.next_due_ms())
    }

    pub fn output(&self) -> &A {
        &self.output
    }
}

impl<A: AudioOutput> Drop for PlaybackLifecycle<A> {
    fn drop(&mut self) {
        self.stop();
    }
}
