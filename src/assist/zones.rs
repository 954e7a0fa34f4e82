//! Concentric assist zones and correction magnitude

use super::AssistConfig;

/// Half-deflection of the native stick axis
pub const STICK_HALF_RANGE: f32 = 127.0;

/// Distance band a target falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    /// Inside the inner radius; uses the inner curve
    Inner,
    /// Between inner and middle radius; uses the outer curve
    Middle,
    /// At or beyond the middle radius; no correction
    None,
}

/// Classify a distance against the configured radii
pub fn classify(config: &AssistConfig, r: f32) -> Zone {
    if r < config.inner_radius() {
        Zone::Inner
    } else if r < config.middle_radius() {
        Zone::Middle
    } else {
        Zone::None
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Correction magnitude in native stick units for distance `r`
///
/// Inside a band the magnitude runs linearly from the smaller curve point at
/// the band's outer edge to the larger one at its inner edge, scaled by the
/// stick half range. Without the precision trigger it is further scaled by
/// the hipfire factor.
///
/// # Examples
///
/// ```
/// use pad_bridge::assist::{AssistConfig, AssistSettings};
/// use pad_bridge::assist::zones::magnitude;
///
/// let config = AssistConfig::from_settings(&AssistSettings::default()).unwrap();
/// assert_eq!(magnitude(&config, 500.0, true), 0.0);
/// assert!(magnitude(&config, 10.0, true) > 0.0);
/// ```
pub fn magnitude(config: &AssistConfig, r: f32, precision_held: bool) -> f32 {
    let (curve, outer_edge, inner_edge) = match classify(config, r) {
        Zone::Inner => (config.inner_curve, config.inner_radius(), 0.0),
        Zone::Middle => (config.outer_curve, config.middle_radius(), config.inner_radius()),
        Zone::None => return 0.0,
    };

    let width = outer_edge - inner_edge;
    let depth = if width > 0.0 {
        ((outer_edge - r) / width).clamp(0.0, 1.0)
    } else {
        1.0
    };

    let low = curve[0].min(curve[1]);
    let high = curve[0].max(curve[1]);
    let mut value = STICK_HALF_RANGE * lerp(low, high, depth);

    if !precision_held {
        value *= config.hipfire_scale;
    }
    value
}
