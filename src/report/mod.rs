//! # Report Codec Module
//!
//! Binary codec between the physical controller and the virtual pad.
//!
//! This module handles:
//! - Input report layout constants and bit masks
//! - Decoding raw input reports into the canonical input state
//! - Axis conversion and output report encoding for both capability models

pub mod protocol;
pub mod decoder;
pub mod encoder;
