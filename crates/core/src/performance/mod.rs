//! Wires the beat source to the visual reactors.
//!
//! One [`Performance::tick`] per poll: the lifecycle may yield a beat, each
//! registered performer filters it by subdivision, relevant beats become
//! pulses, and the reaper retires expired pulses. Render frames are a
//! separate entry point and never touch beat timing.

use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};

use crate::{
    AudioBuffer, AudioOutput, BeatEvent, BeatPulseError, PerformerSpec, PlaybackLifecycle,
    PlaybackPhase, PulseCommand, PulseController, RenderGate, RenderSurface, Result, TempoConfig,
};

/// Snapshot handed to the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStatus {
    pub phase: PlaybackPhase,
    pub beat_count: u64,
    pub interval_ms: f64,
}

#[derive(Debug)]
pub struct Performance<A: AudioOutput, S: RenderSurface> {
    lifecycle: PlaybackLifecycle<A>,
    performers: Vec<PerformerSpec>,
    pulses: PulseController,
    render: RenderGate<S>,
}

impl<A: AudioOutput, S: RenderSurface> Performance<A, S> {
    pub fn new(output: A, surface: S, config: TempoConfig) -> Self {
        Self {
            lifecycle: PlaybackLifecycle::new(output, config),
            performers: Vec::new(),
            pulses: PulseController::new(),
            render: RenderGate::new(surface),
        }
    }

    /// Adds a performer. Duplicate ids are rejected; other performers are
    /// unaffected by a failed registration.
    pub fn register_performer(&mut self, spec: PerformerSpec) -> Result<()> {
        if self.performers.iter().any(|p| p.id() == spec.id()) {
            return Err(BeatPulseError::configuration(format!(
                "performer `{}` is already registered",
                spec.id()
            )));
        }
        tracing::debug!(
            id = spec.id(),
            subdivision = spec.subdivision().get(),
            pulse_ms = spec.pulse_ms(),
            "performer registered"
        );
        self.performers.push(spec);
        Ok(())
    }

    pub fn performers(&self) -> &[PerformerSpec] {
        &self.performers
    }

    pub fn load(&mut self, buffer: AudioBuffer) {
        self.lifecycle.load(buffer);
    }

    pub fn play(&mut self) -> Result<()> {
        self.release_pulses();
        self.lifecycle.play()
    }

    pub fn stop(&mut self) -> bool {
        let stopped = self.lifecycle.stop();
        self.release_pulses();
        stopped
    }

    pub fn set_tempo_config(&mut self, config: TempoConfig) {
        self.lifecycle.set_tempo_config(config);
    }

    /// Runs one poll at `now_ms`.
    pub fn tick(&mut self, now_ms: f64) -> Option<BeatEvent> {
        let mut fired = None;
        self.tick_with(now_ms, |event| {
            fired = Some(*event);
            ControlFlow::Continue(())
        });
        fired
    }

    /// Runs one poll and hands any beat to `on_beat` after it has been routed
    /// to the reactors. Returning [`ControlFlow::Break`] stops playback.
    pub fn tick_with<F>(&mut self, now_ms: f64, mut on_beat: F)
    where
        F: FnMut(&BeatEvent) -> ControlFlow<()>,
    {
        let was_playing = self.lifecycle.is_playing();
        let event = self.lifecycle.tick(now_ms);

        if let Some(event) = event {
            self.dispatch(&event, now_ms);
            if on_beat(&event).is_break() {
                self.lifecycle.stop();
            }
        }

        let reaped = self.pulses.reap(now_ms);
        self.render.apply_all(&reaped);

        if was_playing && !self.lifecycle.is_playing() {
            self.release_pulses();
        }
    }

    /// Advances idle motion on the render surface's own clock.
    pub fn render_frame(&mut self, delta_seconds: f32) {
        self.render.render_frame(delta_seconds);
    }

    pub fn status(&self) -> PerformanceStatus {
        PerformanceStatus {
            phase: self.lifecycle.phase(),
            beat_count: self.lifecycle.beat_count(),
            interval_ms: self.lifecycle.interval_ms(),
        }
    }

    pub fn lifecycle(&self) -> &PlaybackLifecycle<A> {
        &self.lifecycle
    }

    pub fn pulses(&self) -> &PulseController {
        &self.pulses
    }

    pub fn surface(&self) -> &S {
        self.render.surface()
    }

    pub fn surface_mut(&mut self) -> &mut S {
        self.render.surface_mut()
    }

    /// Suggested sleep between polls for the current tempo.
    pub fn poll_period_ms(&self) -> f64 {
        self.lifecycle.poll_period_ms()
    }

    fn dispatch(&mut self, event: &BeatEvent, now_ms: f64) {
        // Pulses run from the moment the beat is observed so a late or
        // catch-up beat still stays lit for its full length.
        let mut commands: Vec<PulseCommand> = Vec::new();
        for performer in self.performers.iter().filter(|p| p.is_relevant(event.index)) {
            commands.extend(
                self.pulses
                    .on_beat(performer.id(), now_ms, performer.pulse_ms()),
            );
        }
        self.render.apply_all(&commands);
    }

    fn release_pulses(&mut self) {
        let released = self.pulses.release_all();
        self.render.apply_all(&released);
    }
}

impl<A: AudioOutput, S: RenderSurface> Drop for Performance<A, S> {
    fn drop(&mut self) {
        self.stop();
    }
}
