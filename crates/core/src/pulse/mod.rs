use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-reactor activation state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PulseState {
    pub active: bool,
    pub expires_at_ms: Option<f64>,
}

/// Scene graph mutation requested by the [`PulseController`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PulseCommand {
    Activate(String),
    Deactivate(String),
}

impl PulseCommand {
    pub fn reactor_id(&self) -> &str {
        match self {
            Self::Activate(id) | Self::Deactivate(id) => id,
        }
    }

    pub fn is_activate(&self) -> bool {
        matches!(self, Self::Activate(_))
    }
}

/// Turns beats into bounded visual activations.
///
/// Each reactor has exactly one expiry. A beat that lands while the reactor
/// is already lit moves that expiry forward instead of arming a second
/// deactivation, and a single [`PulseController::reap`] sweep retires
/// expired pulses. Two beats in quick succession therefore produce one
/// activate and one deactivate, never two racing resets.
#[derive(Debug, Default)]
pub struct PulseController {
    states: BTreeMap<String, PulseState>,
}

impl PulseController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_beat(&mut self, reactor_id: &str, now_ms: f64, duration_ms: f64) -> Option<PulseCommand> {
        let duration_ms = if duration_ms.is_finite() {
            duration_ms.max(0.0)
        } else {
            0.0
        };
        let expires_at = now_ms + duration_ms;

        let state = self.states.entry(reactor_id.to_string()).or_default();
        state.expires_at_ms = Some(match state.expires_at_ms {
            // Never shorten a pulse that is already guaranteed to run longer.
            Some(current) if state.active => current.max(expires_at),
            _ => expires_at,
        });

        if state.active {
            return None;
        }
        state.active = true;
        Some(PulseCommand::Activate(reactor_id.to_string()))
    }

    /// Deactivates every pulse whose expiry has passed.
    pub fn reap(&mut self, now_ms: f64) -> Vec<PulseCommand> {
        let mut commands = Vec::new();
        for (id, state) in self.states.iter_mut() {
            let expired = state
                .expires_at_ms
                .map(|expires_at| expires_at <= now_ms)
                .unwrap_or(false);
            if state.active && expired {
                state.active = false;
                state.expires_at_ms = None;
                commands.push(PulseCommand::Deactivate(id.clone()));
            }
        }
        commands
    }

    /// Deactivates everything and forgets all reactors. Used when a session
    /// ends so nothing is left lit.
    pub fn release_all(&mut self) -> Vec<PulseCommand> {
        let commands = self
            .states
            .iter()
            .filter(|(_, state)| state.active)
            .map(|(id, _)| PulseCommand::Deactivate(id.clone()))
            .collect();
        self.states.clear();
        commands
    }

    pub fn state(&self, reactor_id: &str) -> Option<&PulseState> {
        self.states.get(reactor_id)
    }

    pub fn is_active(&self, reactor_id: &str) -> bool {
        self.state(reactor_id).map(|s| s.active).unwrap_or(false)
    }

    pub fn active_count(&self) -> usize {
        self.states.values().filter(|s| s.active).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_beat_activates() {
        let mut pulses = PulseController::new();
        let command = pulses.on_beat("kick", 0.0, 100.0);

        assert_eq!(command, Some(PulseCommand::Activate("kick".into())));
        assert_eq!(
            pulses.state("kick"),
            Some(&PulseState {
                active: true,
                expires_at_ms: Some(100.0)
            })
        );
    }

    #[test]
    fn overlapping_beats_do_not_stack() {
        let mut pulses = PulseController::new();
        let mut transitions = Vec::new();

        transitions.extend(pulses.on_beat("kick", 0.0, 100.0));
        transitions.extend(pulses.reap(40.0));
        transitions.extend(pulses.on_beat("kick", 50.0, 100.0));

        // The first expiry would have been 100 ms; it has been extended.
        transitions.extend(pulses.reap(100.0));
        assert!(pulses.is_active("kick"));
        transitions.extend(pulses.reap(149.0));
        transitions.extend(pulses.reap(150.0));
        transitions.extend(pulses.reap(400.0));

        assert_eq!(
            transitions,
            vec![
                PulseCommand::Activate("kick".into()),
                PulseCommand::Deactivate("kick".into()),
            ]
        );
    }

    #[test]
    fn never_deactivates_before_the_minimum_duration() {
        let mut pulses = PulseController::new();
        pulses.on_beat("wash", 0.0, 300.0);
        pulses.on_beat("wash", 10.0, 50.0);

        assert!(pulses.reap(299.0).is_empty());
        assert_eq!(pulses.reap(300.0).len(), 1);
    }

    #[test]
    fn reactors_are_independent() {
        let mut pulses = PulseController::new();
        pulses.on_beat("a", 0.0, 100.0);
        pulses.on_beat("b", 0.0, 300.0);

        assert_eq!(pulses.reap(150.0), vec![PulseCommand::Deactivate("a".into())]);
        assert!(pulses.is_active("b"));
        assert_eq!(pulses.active_count(), 1);
    }

    #[test]
    fn reactivates_after_expiry() {
        let mut pulses = PulseController::new();
        pulses.on_beat("strobe", 0.0, 50.0);
        pulses.reap(60.0);

        let again = pulses.on_beat("strobe", 500.0, 50.0);
        assert_eq!(again, Some(PulseCommand::Activate("strobe".into())));
    }

    #[test]
    fn release_all_turns_everything_off() {
        let mut pulses = PulseController::new();
        pulses.on_beat("a", 0.0, 100.0);
        pulses.on_beat("b", 0.0, 100.0);
        pulses.reap(200.0);
        pulses.on_beat("c", 200.0, 100.0);

        let released = pulses.release_all();
        assert_eq!(released, vec![PulseCommand::Deactivate("c".into())]);
        assert_eq!(pulses.active_count(), 0);
        assert!(pulses.state("a").is_none());
    }

    #[test]
    fn invalid_durations_collapse_to_zero() {
        let mut pulses = PulseController::new();
        pulses.on_beat("x", 10.0, f64::NAN);
        assert_eq!(pulses.reap(10.0).len(), 1);

        pulses.on_beat("x", 20.0, -5.0);
        assert_eq!(pulses.reap(20.0).len(), 1);
    }
}
