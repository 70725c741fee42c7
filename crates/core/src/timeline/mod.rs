//! Drift-corrected beat scheduling.
//!
//! Beat times are derived from a grid anchored at a fixed origin rather than
//! from the moment a poll happened to notice them. Polling jitter therefore
//! only affects how late a beat is *detected*, never where the grid lies.

mod clock;

pub use clock::{ManualClock, MonotonicClock, SystemClock};

use serde::{Deserialize, Serialize};

use crate::{BeatInterval, TempoConfig, TempoModel};

/// A single beat emitted by the [`BeatScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeatEvent {
    /// Firing counter; increments by exactly one per event.
    pub index: u64,
    /// Planned time on the beat grid, not the time the poll observed it.
    pub scheduled_at_ms: f64,
    pub is_off_beat: bool,
    /// Grid slots discarded by the stall policy before the slot that follows
    /// this event. Zero unless the poll loop fell behind.
    pub skipped_slots: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerPhase {
    Idle,
    Armed,
    Firing,
}

/// Poll-driven beat source.
///
/// Stall policy: when a poll arrives so late that the slot after the one
/// being fired is already in the past, the scheduler fires the stale armed
/// slot once and then fast-forwards over whole pairs of grid slots to the
/// first slot in the future. Skipping pairs keeps the swing pattern aligned
/// with the firing index. Reactors therefore see at most one stale pulse
/// after a stall instead of a burst.
#[derive(Debug)]
pub struct BeatScheduler {
    phase: SchedulerPhase,
    config: TempoConfig,
    interval: BeatInterval,
    anchor_ms: f64,
    origin_ms: f64,
    origin_slot: u64,
    slot: u64,
    next_index: u64,
    armed_ms: f64,
}

impl Default for BeatScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl BeatScheduler {
    pub fn new() -> Self {
        let config = TempoConfig::default();
        Self {
            phase: SchedulerPhase::Idle,
            config,
            interval: TempoModel::compute_interval(&config),
            anchor_ms: 0.0,
            origin_ms: 0.0,
            origin_slot: 0,
            slot: 0,
            next_index: 0,
            armed_ms: 0.0,
        }
    }

    /// Arms the scheduler so that beat 0 lands on `anchor_ms`. Calling
    /// `start` on a running scheduler restarts it from index 0.
    pub fn start(&mut self, anchor_ms: f64, config: TempoConfig) {
        let anchor_ms = if anchor_ms.is_finite() { anchor_ms } else { 0.0 };
        self.config = config;
        self.interval = TempoModel::compute_interval(&config);
        self.anchor_ms = anchor_ms;
        self.origin_ms = anchor_ms;
        self.origin_slot = 0;
        self.slot = 0;
        self.next_index = 0;
        self.armed_ms = anchor_ms;
        self.phase = SchedulerPhase::Armed;

        tracing::debug!(
            anchor_ms,
            interval_ms = self.interval.interval_ms,
            swing = self.interval.swing_fraction,
            "beat scheduler armed"
        );
    }

    /// Returns the scheduler to idle. Safe to call repeatedly, from any
    /// phase, including from a handler reacting to the scheduler's own event.
    pub fn stop(&mut self) {
        if self.phase == SchedulerPhase::Idle {
            return;
        }
        self.phase = SchedulerPhase::Idle;
        tracing::debug!(beats = self.next_index, "beat scheduler stopped");
    }

    /// Applies a new tempo configuration prospectively. The slot that is
    /// already armed fires at its original time; only the slots after it use
    /// the new interval, and the first of them is never earlier than the
    /// armed slot.
    pub fn reschedule(&mut self, config: TempoConfig) {
        let interval = TempoModel::compute_interval(&config);
        if self.phase != SchedulerPhase::Idle {
            // A swung off-beat can sit later than the new interval reaches
            // from its grid point; re-base on the armed time in that case so
            // the following slot never lands before it.
            let grid_ms = self.grid_ms(self.slot);
            self.origin_ms = if grid_ms + interval.interval_ms <= self.armed_ms {
                self.armed_ms
            } else {
                grid_ms
            };
            self.origin_slot = self.slot;
            tracing::debug!(
                from_ms = self.interval.interval_ms,
                to_ms = interval.interval_ms,
                "beat scheduler rescheduled"
            );
        }
        self.config = config;
        self.interval = interval;
    }

    /// Samples the clock once. Fires at most one event and never blocks.
    pub fn poll(&mut self, now_ms: f64) -> Option<BeatEvent> {
        if self.phase == SchedulerPhase::Idle || !now_ms.is_finite() || now_ms < self.armed_ms {
            return None;
        }

        let mut event = BeatEvent {
            index: self.next_index,
            scheduled_at_ms: self.armed_ms,
            is_off_beat: self.next_index % 2 == 1,
            skipped_slots: 0,
        };

        self.next_index += 1;
        self.slot += 1;
        self.armed_ms = self.slot_ms(self.slot, self.next_index);

        if self.armed_ms <= now_ms {
            let pair_ms = 2.0 * self.interval.interval_ms;
            let pairs = (((now_ms - self.armed_ms) / pair_ms).floor() as u64).saturating_add(1);
            let skipped = pairs.saturating_mul(2);
            self.slot = self.slot.saturating_add(skipped);
            self.armed_ms = self.slot_ms(self.slot, self.next_index);
            event.skipped_slots = skipped;
            tracing::debug!(
                index = event.index,
                skipped = event.skipped_slots,
                lateness_ms = now_ms - event.scheduled_at_ms,
                "beat scheduler fell behind, fast-forwarding"
            );
        }

        self.phase = SchedulerPhase::Firing;
        tracing::trace!(
            index = event.index,
            scheduled_at_ms = event.scheduled_at_ms,
            "beat"
        );
        Some(event)
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase != SchedulerPhase::Idle
    }

    pub fn config(&self) -> &TempoConfig {
        &self.config
    }

    pub fn interval(&self) -> BeatInterval {
        self.interval
    }

    pub fn anchor_ms(&self) -> f64 {
        self.anchor_ms
    }

    /// Number of events fired since the last `start`.
    pub fn beats_fired(&self) -> u64 {
        self.next_index
    }

    /// Planned time of the armed slot while running.
    pub fn next_due_ms(&self) -> Option<f64> {
        self.is_running().then_some(self.armed_ms)
    }

    pub fn poll_period_ms(&self) -> f64 {
        self.interval.poll_period_ms()
    }

    fn grid_ms(&self, slot: u64) -> f64 {
        self.origin_ms + (slot - self.origin_slot) as f64 * self.interval.interval_ms
    }

    fn slot_ms(&self, slot: u64, index: u64) -> f64 {
        self.grid_ms(slot) + self.interval.swing_offset_ms(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Quantize;

    /// Polls from `from` to `until` with an uneven step pattern, collecting
    /// every event.
    fn run_jittery(scheduler: &mut BeatScheduler, from: f64, until: f64) -> Vec<BeatEvent> {
        const STEPS: [f64; 5] = [3.1, 11.7, 6.4, 15.9, 0.8];
        let mut events = Vec::new();
        let mut now = from;
        let mut step = 0;
        while now < until {
            if let Some(event) = scheduler.poll(now) {
                events.push(event);
            }
            now += STEPS[step % STEPS.len()];
            step += 1;
        }
        events
    }

    #[test]
    fn idle_scheduler_never_fires() {
        let mut scheduler = BeatScheduler::new();
        assert_eq!(scheduler.phase(), SchedulerPhase::Idle);
        assert!(scheduler.poll(10_000.0).is_none());
    }

    #[test]
    fn fires_on_the_planned_grid_despite_jitter() {
        let mut scheduler = BeatScheduler::new();
        let config = TempoConfig::with_bpm(90.0);
        scheduler.start(250.0, config);

        let events = run_jittery(&mut scheduler, 250.0, 250.0 + 120_000.0);
        let interval = 60_000.0 / 90.0;

        assert!(events.len() >= 179);
        for (n, event) in events.iter().enumerate() {
            assert_eq!(event.index, n as u64);
            assert_eq!(event.skipped_slots, 0);
            let expected = 250.0 + n as f64 * interval;
            assert!(
                (event.scheduled_at_ms - expected).abs() < 1e-6,
                "beat {n} drifted to {}",
                event.scheduled_at_ms
            );
        }
    }

    #[test]
    fn swing_delays_only_odd_beats() {
        let mut scheduler = BeatScheduler::new();
        scheduler.start(
            0.0,
            TempoConfig {
                swing_percent: 40.0,
                ..TempoConfig::default()
            },
        );

        let events = run_jittery(&mut scheduler, 0.0, 10_000.0);
        assert!(events.len() >= 19);
        for event in &events {
            let grid = event.index as f64 * 500.0;
            let expected = if event.index % 2 == 1 { grid + 100.0 } else { grid };
            assert_eq!(event.is_off_beat, event.index % 2 == 1);
            assert!((event.scheduled_at_ms - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn timestamps_never_decrease() {
        let mut scheduler = BeatScheduler::new();
        scheduler.start(
            0.0,
            TempoConfig {
                bpm: 200.0,
                quantize: Quantize::Quarter,
                swing_percent: 60.0,
                start_offset_ms: 0.0,
            },
        );

        let events = run_jittery(&mut scheduler, 0.0, 5_000.0);
        for pair in events.windows(2) {
            assert_eq!(pair[1].index, pair[0].index + 1);
            assert!(pair[1].scheduled_at_ms >= pair[0].scheduled_at_ms);
        }
    }

    #[test]
    fn stall_emits_one_catch_up_event_and_resumes_on_grid() {
        let mut scheduler = BeatScheduler::new();
        scheduler.start(0.0, TempoConfig::default());

        assert_eq!(scheduler.poll(0.0).map(|e| e.index), Some(0));

        // Stall from 0 ms to 2_750 ms; slots 1..=5 have all passed.
        let catch_up = scheduler.poll(2_750.0).expect("stale slot fires once");
        assert_eq!(catch_up.index, 1);
        assert_eq!(catch_up.scheduled_at_ms, 500.0);
        assert_eq!(catch_up.skipped_slots, 4);
        assert!(scheduler.poll(2_750.0).is_none());

        let resumed = scheduler.poll(3_000.0).expect("next future slot");
        assert_eq!(resumed.index, 2);
        assert_eq!(resumed.scheduled_at_ms, 3_000.0);
        assert!(!resumed.is_off_beat);
    }

    #[test]
    fn reschedule_honours_the_armed_slot() {
        let mut scheduler = BeatScheduler::new();
        scheduler.start(0.0, TempoConfig::default());
        assert!(scheduler.poll(0.0).is_some());
        assert_eq!(scheduler.next_due_ms(), Some(500.0));

        scheduler.reschedule(TempoConfig::with_bpm(60.0));
        assert_eq!(scheduler.next_due_ms(), Some(500.0));
        assert_eq!(scheduler.anchor_ms(), 0.0);

        assert_eq!(scheduler.poll(500.0).map(|e| e.scheduled_at_ms), Some(500.0));
        assert_eq!(scheduler.next_due_ms(), Some(1_500.0));
        assert_eq!(scheduler.poll(1_500.0).map(|e| e.index), Some(2));
        assert_eq!(scheduler.next_due_ms(), Some(2_500.0));
    }

    #[test]
    fn stop_is_idempotent() {
        let mut scheduler = BeatScheduler::new();
        scheduler.stop();
        scheduler.stop();
        assert_eq!(scheduler.phase(), SchedulerPhase::Idle);

        scheduler.start(0.0, TempoConfig::default());
        assert_eq!(scheduler.phase(), SchedulerPhase::Armed);
        assert!(scheduler.poll(0.0).is_some());
        assert_eq!(scheduler.phase(), SchedulerPhase::Firing);

        scheduler.stop();
        scheduler.stop();
        assert!(scheduler.poll(500.0).is_none());
        assert_eq!(scheduler.next_due_ms(), None);
    }

    #[test]
    fn stop_from_within_a_beat_handler() {
        let mut scheduler = BeatScheduler::new();
        scheduler.start(0.0, TempoConfig::default());

        let mut seen = Vec::new();
        let mut now = 0.0;
        while now < 3_000.0 {
            if let Some(event) = scheduler.poll(now) {
                seen.push(event.index);
                if event.index == 2 {
                    scheduler.stop();
                }
            }
            now += 5.0;
        }

        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn non_finite_clock_readings_are_ignored() {
        let mut scheduler = BeatScheduler::new();
        scheduler.start(0.0, TempoConfig::default());
        assert!(scheduler.poll(f64::NAN).is_none());
        assert!(scheduler.poll(f64::INFINITY).is_none());
        assert_eq!(scheduler.phase(), SchedulerPhase::Armed);
        assert_eq!(scheduler.poll(0.0).map(|e| e.index), Some(0));
    }

    #[test]
    fn huge_stall_does_not_overflow() {
        let mut scheduler = BeatScheduler::new();
        scheduler.start(0.0, TempoConfig::default());
        assert!(scheduler.poll(0.0).is_some());

        let event = scheduler.poll(f64::MAX).expect("stale slot fires");
        assert_eq!(event.index, 1);
        assert!(event.skipped_slots > 0);
    }

    #[test]
    fn reschedule_while_a_swung_off_beat_is_armed() {
        let mut scheduler = BeatScheduler::new();
        let swing = TempoConfig {
            bpm: 40.0,
            swing_percent: 60.0,
            ..TempoConfig::default()
        };
        scheduler.start(0.0, swing);
        assert_eq!(scheduler.poll(0.0).map(|e| e.index), Some(0));
        let armed = scheduler.next_due_ms().unwrap();
        assert!((armed - 1_950.0).abs() < 1e-9);

        scheduler.reschedule(TempoConfig {
            bpm: 240.0,
            quantize: Quantize::Quarter,
            ..swing
        });
        assert_eq!(scheduler.next_due_ms(), Some(armed));

        let on_time = scheduler.poll(armed).expect("armed slot fires on time");
        assert_eq!(on_time.index, 1);
        assert_eq!(on_time.skipped_slots, 0);
        let next = scheduler.next_due_ms().unwrap();
        assert!((next - 2_012.5).abs() < 1e-9);

        let even = scheduler.poll(next).unwrap();
        assert_eq!(even.index, 2);
        assert_eq!(even.skipped_slots, 0);
        let swung = scheduler.next_due_ms().unwrap();
        assert!((swung - (1_950.0 + 125.0 + 18.75)).abs() < 1e-9);
    }
}
