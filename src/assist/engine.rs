//! Per-cycle assist correction
//!
//! Each cycle picks the detected target nearest the frame center, derives a
//! correction vector from its distance and direction, adds it to the current
//! right-stick reading and publishes the result through the override slot.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, trace};

use super::zones::magnitude;
use super::{AssistConfig, DetectionResult, Point};
use crate::controller::state::{InputState, SharedInput, StickOverride};
use crate::report::protocol::{AXIS_MAX, AXIS_MIN};
use crate::telemetry::LatencyTracker;

/// Target chosen for one cycle, relative to the frame center
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aim {
    pub index: usize,
    pub dx: f32,
    pub dy: f32,
}

/// Nearest target by Manhattan distance; the earliest index wins ties.
///
/// Targets with non-finite coordinates are skipped.
pub fn nearest_target(targets: &[Point], center: Point) -> Option<Aim> {
    let mut best: Option<(f32, Aim)> = None;

    for (index, target) in targets.iter().enumerate() {
        let dx = target.x - center.x;
        let dy = target.y - center.y;
        let distance = dx.abs() + dy.abs();
        if !distance.is_finite() {
            continue;
        }
        if best.map_or(true, |(shortest, _)| distance < shortest) {
            best = Some((distance, Aim { index, dx, dy }));
        }
    }

    best.map(|(_, aim)| aim)
}

fn offset_axis(value: u8, delta: f32) -> u8 {
    (f32::from(value) + delta)
        .round()
        .clamp(f32::from(AXIS_MIN), f32::from(AXIS_MAX)) as u8
}

/// Assist correction engine for one bridge session
pub struct AssistEngine {
    config: AssistConfig,
    shared: Arc<SharedInput>,
    last_activation: Option<Instant>,
    latency: LatencyTracker,
}

impl std::fmt::Debug for AssistEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AssistEngine {
    pub fn new(config: AssistConfig, shared: Arc<SharedInput>) -> Self {
        Self {
            config,
            shared,
            last_activation: None,
            latency: LatencyTracker::new("assist"),
        }
    }

    pub fn config(&self) -> &AssistConfig {
        &self.config
    }

    /// Run one correction cycle
    ///
    /// # Arguments
    ///
    /// * `detection` - Targets found in the latest frame
    /// * `frame_center` - Capture-frame center the targets are measured from
    ///
    /// # Returns
    ///
    /// * `Option<StickOverride>` - The override written to the shared slot,
    ///   `None` when the slot was cleared
    pub fn run_cycle(&mut self, detection: &DetectionResult, frame_center: Point) -> Option<StickOverride> {
        let started = Instant::now();

        let stick = self.correction(detection, frame_center, started);
        self.shared.override_slot().store(stick);

        self.latency.record(started.elapsed());
        stick
    }

    fn correction(&mut self, detection: &DetectionResult, center: Point, now: Instant) -> Option<StickOverride> {
        if !self.shared.is_connected() {
            return None;
        }

        let state = self.shared.state();
        if !self.trigger_active(&state, now) {
            return None;
        }

        let aim = nearest_target(&detection.targets, center)?;
        let r = aim.dx.hypot(aim.dy);
        if r == 0.0 {
            trace!("Target {} at frame center, no correction", aim.index);
            return None;
        }

        let precision_held = state.lt >= self.config.precision_threshold;
        let strength = magnitude(&self.config, r, precision_held);
        if strength <= 0.0 {
            return None;
        }

        let (cos, sin) = (aim.dx / r, aim.dy / r);
        let stick = StickOverride {
            rx: offset_axis(state.rx, strength * cos),
            ry: offset_axis(state.ry, strength * sin),
        };

        debug!(
            "Target {} at r={:.1}: strength {:.1}, stick ({}, {}) -> ({}, {})",
            aim.index, r, strength, state.rx, state.ry, stick.rx, stick.ry
        );
        Some(stick)
    }

    /// RT above the activation threshold, or released within the grace window
    fn trigger_active(&mut self, state: &InputState, now: Instant) -> bool {
        if state.rt > self.config.activation_threshold {
            self.last_activation = Some(now);
            return true;
        }
        self.last_activation
            .is_some_and(|at| now.saturating_duration_since(at) < self.config.release_grace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assist::AssistSettings;
    use std::time::Duration;

    const CENTER: Point = Point::new(160.0, 160.0);

    fn engine_with(settings: AssistSettings) -> (AssistEngine, Arc<SharedInput>) {
        let shared = Arc::new(SharedInput::default());
        let config = AssistConfig::from_settings(&settings).unwrap();
        (AssistEngine::new(config, Arc::clone(&shared)), shared)
    }

    fn engine() -> (AssistEngine, Arc<SharedInput>) {
        engine_with(AssistSettings::default())
    }

    fn set_triggers(shared: &SharedInput, lt: u8, rt: u8) {
        let mut state = shared.state();
        state.lt = lt;
        state.rt = rt;
        shared.set_state(state);
    }

    fn targets(points: &[(f32, f32)]) -> DetectionResult {
        DetectionResult::new(points.iter().map(|&(x, y)| Point::new(x, y)).collect())
    }

    // ==================== Target Selection Tests ====================

    #[test]
    fn test_nearest_by_manhattan_distance() {
        // Euclidean would pick index 0 (~14.1 vs 15), Manhattan picks index 1 (20 vs 15)
        let points = [Point::new(10.0, 10.0), Point::new(15.0, 0.0)];
        let aim = nearest_target(&points, Point::new(0.0, 0.0)).unwrap();
        assert_eq!(aim.index, 1);
    }

    #[test]
    fn test_nearest_tie_prefers_earliest() {
        let points = [Point::new(5.0, 0.0), Point::new(0.0, -5.0), Point::new(-5.0, 0.0)];
        let aim = nearest_target(&points, Point::new(0.0, 0.0)).unwrap();
        assert_eq!(aim.index, 0);
    }

    #[test]
    fn test_nearest_is_relative_to_center() {
        let points = [Point::new(0.0, 0.0), Point::new(100.0, 100.0)];
        let aim = nearest_target(&points, Point::new(90.0, 90.0)).unwrap();
        assert_eq!(aim.index, 1);
        assert_eq!((aim.dx, aim.dy), (10.0, 10.0));
    }

    #[test]
    fn test_nearest_skips_non_finite() {
        let points = [Point::new(f32::NAN, 0.0), Point::new(3.0, 4.0)];
        assert_eq!(nearest_target(&points, Point::default()).unwrap().index, 1);
        assert!(nearest_target(&[], Point::default()).is_none());
    }

    // ==================== Cycle Tests ====================

    #[test]
    fn test_no_targets_clears_override() {
        let (mut engine, shared) = engine();
        set_triggers(&shared, 0, 255);
        shared.override_slot().store(Some(StickOverride { rx: 1, ry: 2 }));

        assert_eq!(engine.run_cycle(&DetectionResult::default(), CENTER), None);
        assert_eq!(shared.override_slot().load(), None);
    }

    #[test]
    fn test_trigger_not_held_clears_override() {
        let (mut engine, shared) = engine();
        set_triggers(&shared, 255, 128); // RT must be strictly above 128
        shared.override_slot().store(Some(StickOverride { rx: 1, ry: 2 }));

        assert_eq!(engine.run_cycle(&targets(&[(170.0, 160.0)]), CENTER), None);
        assert_eq!(shared.override_slot().load(), None);
    }

    #[test]
    fn test_target_at_center_is_skipped() {
        let (mut engine, shared) = engine();
        set_triggers(&shared, 255, 255);
        assert_eq!(engine.run_cycle(&targets(&[(160.0, 160.0)]), CENTER), None);
    }

    #[test]
    fn test_target_outside_zones_is_ignored() {
        let (mut engine, shared) = engine();
        set_triggers(&shared, 255, 255);
        assert_eq!(engine.run_cycle(&targets(&[(400.0, 160.0)]), CENTER), None);
    }

    #[test]
    fn test_correction_points_toward_target() {
        let (mut engine, shared) = engine();
        set_triggers(&shared, 255, 255);

        // dx = 100 in the middle band: 127 * 0.2 = 25.4 units to the right
        let stick = engine.run_cycle(&targets(&[(260.0, 160.0)]), CENTER).unwrap();
        assert_eq!(stick, StickOverride { rx: 153, ry: 128 });
        assert_eq!(shared.override_slot().load(), Some(stick));

        // straight up, inner band center-ish
        let stick = engine.run_cycle(&targets(&[(160.0, 140.0)]), CENTER).unwrap();
        assert_eq!(stick.rx, 128);
        assert!(stick.ry < 128);
    }

    #[test]
    fn test_hipfire_weakens_correction() {
        let (mut engine, shared) = engine();
        set_triggers(&shared, 255, 255);
        let aimed = engine.run_cycle(&targets(&[(260.0, 160.0)]), CENTER).unwrap();

        set_triggers(&shared, 0, 255);
        let hipfire = engine.run_cycle(&targets(&[(260.0, 160.0)]), CENTER).unwrap();

        // 25.4 * 0.8 = 20.32
        assert_eq!(hipfire.rx, 148);
        assert!(hipfire.rx < aimed.rx);
    }

    #[test]
    fn test_override_is_clamped_to_axis_range() {
        let (mut engine, shared) = engine();
        let mut state = shared.state();
        state.rx = 250;
        state.ry = 3;
        state.rt = 255;
        state.lt = 255;
        shared.set_state(state);

        // inner band near center, full strength up-right
        let stick = engine.run_cycle(&targets(&[(161.0, 159.0)]), CENTER).unwrap();
        assert_eq!(stick, StickOverride { rx: 255, ry: 0 });
    }

    #[test]
    fn test_disconnected_clears_override() {
        let (mut engine, shared) = engine();
        set_triggers(&shared, 255, 255);
        shared.mark_removed();

        assert_eq!(engine.run_cycle(&targets(&[(170.0, 160.0)]), CENTER), None);
    }

    #[test]
    fn test_release_grace_keeps_assist_briefly() {
        let settings = AssistSettings {
            release_grace_ms: 60_000,
            ..AssistSettings::default()
        };
        let (mut engine, shared) = engine_with(settings);
        set_triggers(&shared, 255, 255);
        assert!(engine.run_cycle(&targets(&[(260.0, 160.0)]), CENTER).is_some());

        set_triggers(&shared, 255, 0);
        assert!(engine.run_cycle(&targets(&[(260.0, 160.0)]), CENTER).is_some());
    }

    #[test]
    fn test_no_grace_by_default() {
        let (mut engine, shared) = engine();
        set_triggers(&shared, 255, 255);
        let now = Instant::now();
        assert!(engine.trigger_active(&shared.state(), now));

        set_triggers(&shared, 255, 0);
        assert!(!engine.trigger_active(&shared.state(), now + Duration::from_millis(1)));
    }
}
