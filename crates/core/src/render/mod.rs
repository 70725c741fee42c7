use std::collections::BTreeMap;

use crate::{BeatPulseError, PulseCommand, Result};

/// Rendering backend as seen by the core.
///
/// Implementations report [`BeatPulseError::RenderTargetUnready`] for pulse
/// requests that arrive before they can draw. Idle motion is driven by the
/// frame clock only and carries no beat information.
pub trait RenderSurface {
    fn is_ready(&self) -> bool;
    fn activate(&mut self, reactor_id: &str) -> Result<()>;
    fn deactivate(&mut self, reactor_id: &str) -> Result<()>;
    fn advance_idle(&mut self, delta_seconds: f32);
}

/// Render refresh clock, in seconds. Kept separate from the beat clock.
#[derive(Debug, Default, Clone)]
pub struct FrameClock {
    pub time_seconds: f32,
    pub frames: u64,
}

impl FrameClock {
    pub fn reset(&mut self) {
        self.time_seconds = 0.0;
        self.frames = 0;
    }

    pub fn advance(&mut self, delta: f32) -> f32 {
        let delta = if delta.is_finite() { delta.max(0.0) } else { 0.0 };
        self.time_seconds += delta;
        self.frames += 1;
        delta
    }
}

/// Front of a [`RenderSurface`] that tolerates an uninitialised target.
///
/// Requests that bounce off an unready surface are coalesced per reactor,
/// keeping only the latest desired state, and replayed once the surface
/// reports ready.
#[derive(Debug)]
pub struct RenderGate<S> {
    surface: S,
    pending: BTreeMap<String, bool>,
    frame_clock: FrameClock,
}

impl<S: RenderSurface> RenderGate<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            pending: BTreeMap::new(),
            frame_clock: FrameClock::default(),
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn frame_clock(&self) -> &FrameClock {
        &self.frame_clock
    }

    pub fn apply(&mut self, command: &PulseCommand) {
        self.flush();
        let id = command.reactor_id();
        if !self.pending.is_empty() {
            self.pending.insert(id.to_string(), command.is_activate());
            return;
        }
        if let Err(err) = self.forward(id, command.is_activate()) {
            self.park(id, command.is_activate(), err);
        }
    }

    pub fn apply_all(&mut self, commands: &[PulseCommand]) {
        for command in commands {
            self.apply(command);
        }
    }

    /// Advances idle motion by one render frame.
    pub fn render_frame(&mut self, delta_seconds: f32) {
        let delta = self.frame_clock.advance(delta_seconds);
        self.flush();
        self.surface.advance_idle(delta);
    }

    /// Replays buffered requests if the surface has become ready.
    pub fn flush(&mut self) {
        if self.pending.is_empty() || !self.surface.is_ready() {
            return;
        }
        let pending = std::mem::take(&mut self.pending);
        tracing::debug!(count = pending.len(), "flushing buffered pulse requests");
        for (id, lit) in pending {
            if let Err(err) = self.forward(&id, lit) {
                self.park(&id, lit, err);
            }
        }
    }

    fn forward(&mut self, id: &str, lit: bool) -> Result<()> {
        if lit {
            self.surface.activate(id)
        } else {
            self.surface.deactivate(id)
        }
    }

    fn park(&mut self, id: &str, lit: bool, err: BeatPulseError) {
        match err {
            BeatPulseError::RenderTargetUnready => {
                self.pending.insert(id.to_string(), lit);
            }
            other => {
                tracing::warn!(reactor = id, error = %other, "dropping pulse request");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Reactor, ReactorKind, SceneGraph};

    #[test]
    fn buffers_until_ready_and_keeps_latest_state() {
        let mut gate = RenderGate::new(SceneGraph::new());
        gate.apply(&PulseCommand::Activate("a".into()));
        gate.apply(&PulseCommand::Activate("b".into()));
        gate.apply(&PulseCommand::Deactivate("a".into()));
        assert_eq!(gate.pending(), 2);

        gate.surface_mut().initialize();
        gate.render_frame(1.0 / 60.0);

        assert_eq!(gate.pending(), 0);
        let scene = gate.surface();
        assert!(!scene.reactor("a").map(|r| r.lit).unwrap_or(false));
        assert!(scene.reactor("b").unwrap().lit);
    }

    #[test]
    fn forwards_directly_once_ready() {
        let mut scene = SceneGraph::new();
        scene.add_reactor(Reactor::new("kick", ReactorKind::Strobe));
        scene.initialize();
        let mut gate = RenderGate::new(scene);

        gate.apply(&PulseCommand::Activate("kick".into()));
        assert_eq!(gate.pending(), 0);
        assert!(gate.surface().reactor("kick").unwrap().lit);
    }

    #[test]
    fn frame_clock_ignores_bad_deltas() {
        let mut clock = FrameClock::default();
        clock.advance(0.5);
        clock.advance(-1.0);
        clock.advance(f32::NAN);
        assert_eq!(clock.time_seconds, 0.5);
        assert_eq!(clock.frames, 3);

        clock.reset();
        assert_eq!(clock.frames, 0);
    }
}
