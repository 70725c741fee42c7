use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{render::RenderSurface, BeatPulseError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactorKind {
    #[default]
    Glow,
    Ring,
    Strobe,
}

/// One visual element that lights up on a pulse and drifts while idle.
#[derive(Debug, Clone, Serialize)]
pub struct Reactor {
    pub id: String,
    pub kind: ReactorKind,
    pub lit: bool,
    pub activations: u64,
    /// Idle rotation in radians, advanced only by render frames.
    pub idle_phase: f32,
    pub idle_speed: f32,
}

impl Reactor {
    pub fn new(id: impl Into<String>, kind: ReactorKind) -> Self {
        Self {
            id: id.into(),
            kind,
            lit: false,
            activations: 0,
            idle_phase: 0.0,
            idle_speed: 0.5,
        }
    }
}

/// In-memory scene graph used as the reference rendering surface.
///
/// It refuses pulse requests until [`SceneGraph::initialize`] has run, the
/// same way a GPU-backed surface would before its first frame.
#[derive(Debug, Default)]
pub struct SceneGraph {
    ready: bool,
    reactors: BTreeMap<String, Reactor>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_reactor(&mut self, reactor: Reactor) {
        self.reactors.insert(reactor.id.clone(), reactor);
    }

    pub fn initialize(&mut self) {
        self.ready = true;
        tracing::debug!(reactors = self.reactors.len(), "scene graph ready");
    }

    pub fn reactor(&self, id: &str) -> Option<&Reactor> {
        self.reactors.get(id)
    }

    pub fn reactors(&self) -> impl Iterator<Item = &Reactor> {
        self.reactors.values()
    }

    pub fn lit_count(&self) -> usize {
        self.reactors.values().filter(|r| r.lit).count()
    }

    fn set_lit(&mut self, id: &str, lit: bool) -> Result<()> {
        if !self.ready {
            return Err(BeatPulseError::RenderTargetUnready);
        }
        // Pulses for reactors without a node are created on demand so a
        // performer never needs a matching scene entry up front.
        let reactor = self
            .reactors
            .entry(id.to_string())
            .or_insert_with(|| Reactor::new(id, ReactorKind::default()));
        if lit && !reactor.lit {
            reactor.activations += 1;
        }
        reactor.lit = lit;
        Ok(())
    }
}

impl RenderSurface for SceneGraph {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn activate(&mut self, reactor_id: &str) -> Result<()> {
        self.set_lit(reactor_id, true)
    }

    fn deactivate(&mut self, reactor_id: &str) -> Result<()> {
        self.set_lit(reactor_id, false)
    }

    fn advance_idle(&mut self, delta_seconds: f32) {
        if !self.ready {
            return;
        }
        for reactor in self.reactors.values_mut() {
            reactor.idle_phase =
                (reactor.idle_phase + reactor.idle_speed * delta_seconds) % std::f32::consts::TAU;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_pulses_before_initialisation() {
        let mut scene = SceneGraph::new();
        let err = scene.activate("kick").unwrap_err();
        assert!(matches!(err, BeatPulseError::RenderTargetUnready));
    }

    #[test]
    fn counts_activations_once_per_transition() {
        let mut scene = SceneGraph::new();
        scene.add_reactor(Reactor::new("kick", ReactorKind::Ring));
        scene.initialize();

        scene.activate("kick").unwrap();
        scene.activate("kick").unwrap();
        scene.deactivate("kick").unwrap();
        scene.activate("kick").unwrap();

        let kick = scene.reactor("kick").unwrap();
        assert_eq!(kick.activations, 2);
        assert!(kick.lit);
        assert_eq!(kick.kind, ReactorKind::Ring);
    }

    #[test]
    fn idle_motion_only_moves_phase() {
        let mut scene = SceneGraph::new();
        scene.add_reactor(Reactor::new("pad", ReactorKind::Glow));
        scene.advance_idle(1.0);
        assert_eq!(scene.reactor("pad").unwrap().idle_phase, 0.0);

        scene.initialize();
        scene.advance_idle(1.0);
        let pad = scene.reactor("pad").unwrap();
        assert!((pad.idle_phase - 0.5).abs() < 1e-6);
        assert!(!pad.lit);
    }
}
