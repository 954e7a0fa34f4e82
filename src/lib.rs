//! # Pad Bridge Library
//!
//! Mirror a physical game controller onto a virtual one and overlay a
//! right-stick correction toward externally detected targets.
//!
//! This library provides the building blocks of the bridge:
//! - `report` - raw input report decoding and virtual report encoding
//! - `controller` - device discovery, the HID session and the shared input state
//! - `virtual_pad` - the virtual controller output
//! - `bridge` - start/stop lifecycle and the fixed-period emission loop
//! - `assist` - target selection and zone-based correction
//! - `hotplug` - attach/detach detection for guided setup

pub mod assist;
pub mod bridge;
pub mod config;
pub mod controller;
pub mod error;
pub mod hotplug;
pub mod report;
pub mod telemetry;
pub mod virtual_pad;
