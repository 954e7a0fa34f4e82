//! # Virtual Pad Module
//!
//! Output side of the bridge: the virtual controller that mirrors the
//! physical one.
//!
//! This module handles:
//! - The `VirtualPad`/`PadFactory` seam used by the emission loop
//! - A uinput implementation for XUSB-like and DS4-like pads

pub mod pad_trait;
pub mod uinput;

pub use pad_trait::{PadFactory, VirtualPad};
pub use uinput::{UinputPad, UinputPadFactory};
