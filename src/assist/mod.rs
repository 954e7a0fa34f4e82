//! # Assist Module
//!
//! Right-stick correction toward the nearest detected target.
//!
//! This module handles:
//! - Validating assist thresholds and curves (`AssistConfig`)
//! - Zone classification and correction magnitude (`zones`)
//! - The per-cycle correction engine writing the stick override (`engine`)
//!
//! ## Zones
//!
//! Three concentric circles around the frame center, given as diameters in
//! capture-frame pixels. Targets inside the inner circle are corrected with
//! the inner curve, targets between the inner and middle circle with the
//! outer curve, anything further out is left alone.

pub mod engine;
pub mod zones;

use std::time::Duration;

use serde::Deserialize;

use crate::error::{BridgeError, Result};

pub use engine::AssistEngine;

/// Target center in capture-frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Targets found in one captured frame, in detector order
///
/// # Examples
///
/// ```
/// use pad_bridge::assist::DetectionResult;
///
/// let result: DetectionResult = serde_json::from_str(r#"{"targets":[{"x":1.0,"y":2.0}]}"#).unwrap();
/// assert_eq!(result.targets.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct DetectionResult {
    #[serde(default)]
    pub targets: Vec<Point>,
}

impl DetectionResult {
    pub fn new(targets: Vec<Point>) -> Self {
        Self { targets }
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Assist parameters as written in the configuration file
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AssistSettings {
    #[serde(default = "default_inner_diameter")]
    pub inner_diameter: f32,

    #[serde(default = "default_middle_diameter")]
    pub middle_diameter: f32,

    #[serde(default = "default_outer_diameter")]
    pub outer_diameter: f32,

    #[serde(default = "default_inner_curve")]
    pub inner_curve: [f32; 2],

    #[serde(default = "default_outer_curve")]
    pub outer_curve: [f32; 2],

    #[serde(default = "default_hipfire_scale")]
    pub hipfire_scale: f32,

    #[serde(default = "default_poll_interval_s")]
    pub poll_interval_s: f64,

    #[serde(default = "default_activation_threshold")]
    pub activation_threshold: u8,

    #[serde(default = "default_precision_threshold")]
    pub precision_threshold: u8,

    #[serde(default)]
    pub release_grace_ms: u64,

    #[serde(default)]
    pub frame_center: Option<[f32; 2]>,
}

fn default_inner_diameter() -> f32 { 80.0 }
fn default_middle_diameter() -> f32 { 320.0 }
fn default_outer_diameter() -> f32 { 320.0 }
fn default_inner_curve() -> [f32; 2] { [0.05, 1.0] }
fn default_outer_curve() -> [f32; 2] { [0.2, 0.2] }
fn default_hipfire_scale() -> f32 { 0.8 }
fn default_poll_interval_s() -> f64 { 0.05 }
fn default_activation_threshold() -> u8 { 128 }
fn default_precision_threshold() -> u8 { 128 }

impl Default for AssistSettings {
    fn default() -> Self {
        Self {
            inner_diameter: default_inner_diameter(),
            middle_diameter: default_middle_diameter(),
            outer_diameter: default_outer_diameter(),
            inner_curve: default_inner_curve(),
            outer_curve: default_outer_curve(),
            hipfire_scale: default_hipfire_scale(),
            poll_interval_s: default_poll_interval_s(),
            activation_threshold: default_activation_threshold(),
            precision_threshold: default_precision_threshold(),
            release_grace_ms: 0,
            frame_center: None,
        }
    }
}

/// Validated assist configuration
///
/// Diameters always satisfy `inner <= middle <= outer` and curve points lie
/// in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistConfig {
    pub inner_diameter: f32,
    pub middle_diameter: f32,
    pub outer_diameter: f32,
    pub inner_curve: [f32; 2],
    pub outer_curve: [f32; 2],
    pub hipfire_scale: f32,
    pub poll_interval: Duration,
    /// RT must be strictly above this to activate assist
    pub activation_threshold: u8,
    /// LT at or above this counts as precision aim
    pub precision_threshold: u8,
    pub release_grace: Duration,
    pub frame_center: Point,
}

fn invalid(msg: String) -> BridgeError {
    BridgeError::ConfigInvalid(msg)
}

impl AssistConfig {
    /// Correct and validate raw settings
    ///
    /// Diameters are reordered with `middle = min(middle, outer)` then
    /// `inner = min(inner, middle)`, and curve points are clamped to
    /// `[0, 1]`, before validation.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` if:
    /// - A diameter or curve point is not finite, or a diameter is negative
    /// - The outer diameter is zero
    /// - The hipfire scale is outside `[0, 1]`
    /// - The poll interval is not a positive number of seconds
    ///
    /// # Examples
    ///
    /// ```
    /// use pad_bridge::assist::{AssistConfig, AssistSettings};
    ///
    /// let mut settings = AssistSettings::default();
    /// settings.outer_diameter = 50.0;
    /// settings.middle_diameter = 80.0;
    /// settings.inner_diameter = 30.0;
    ///
    /// let config = AssistConfig::from_settings(&settings).unwrap();
    /// assert_eq!(config.middle_diameter, 50.0);
    /// ```
    pub fn from_settings(settings: &AssistSettings) -> Result<Self> {
        let diameters = [
            ("inner_diameter", settings.inner_diameter),
            ("middle_diameter", settings.middle_diameter),
            ("outer_diameter", settings.outer_diameter),
        ];
        for (name, value) in diameters {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(format!("{} must be a non-negative number, got {}", name, value)));
            }
        }
        if settings.outer_diameter == 0.0 {
            return Err(invalid("outer_diameter must be greater than 0".to_string()));
        }

        for (name, curve) in [("inner_curve", settings.inner_curve), ("outer_curve", settings.outer_curve)] {
            if curve.iter().any(|point| !point.is_finite()) {
                return Err(invalid(format!("{} points must be finite, got {:?}", name, curve)));
            }
        }

        if !settings.hipfire_scale.is_finite() || !(0.0..=1.0).contains(&settings.hipfire_scale) {
            return Err(invalid(format!(
                "hipfire_scale must be between 0 and 1, got {}",
                settings.hipfire_scale
            )));
        }

        let poll_interval = Duration::try_from_secs_f64(settings.poll_interval_s)
            .ok()
            .filter(|interval| !interval.is_zero())
            .ok_or_else(|| {
                invalid(format!(
                    "poll_interval_s must be greater than 0, got {}",
                    settings.poll_interval_s
                ))
            })?;

        let outer_diameter = settings.outer_diameter;
        let middle_diameter = settings.middle_diameter.min(outer_diameter);
        let inner_diameter = settings.inner_diameter.min(middle_diameter);

        let clamp_curve = |curve: [f32; 2]| curve.map(|point| point.clamp(0.0, 1.0));

        let frame_center = match settings.frame_center {
            Some([x, y]) if x.is_finite() && y.is_finite() => Point::new(x, y),
            Some(center) => return Err(invalid(format!("frame_center must be finite, got {:?}", center))),
            None => Point::new(outer_diameter / 2.0, outer_diameter / 2.0),
        };

        Ok(Self {
            inner_diameter,
            middle_diameter,
            outer_diameter,
            inner_curve: clamp_curve(settings.inner_curve),
            outer_curve: clamp_curve(settings.outer_curve),
            hipfire_scale: settings.hipfire_scale,
            poll_interval,
            activation_threshold: settings.activation_threshold,
            precision_threshold: settings.precision_threshold,
            release_grace: Duration::from_millis(settings.release_grace_ms),
            frame_center,
        })
    }

    pub fn inner_radius(&self) -> f32 {
        self.inner_diameter / 2.0
    }

    pub fn middle_radius(&self) -> f32 {
        self.middle_diameter / 2.0
    }

    pub fn outer_radius(&self) -> f32 {
        self.outer_diameter / 2.0
    }
}
