//! # Controller Module
//!
//! Physical controller handling.
//!
//! This module handles:
//! - Controller discovery and connection via HID
//! - The canonical input state shared with the emission loop and assist engine
//! - Per-vendor report layout and output model selection

pub mod device;
pub mod profile;
pub mod state;
