//! # Output Report Encoder
//!
//! Converts [`InputState`] into the report shape of the virtual controller.
//!
//! Two capability models are supported:
//!
//! - **XUSB** (XInput-like): signed 16-bit sticks with up-positive Y, 8-bit
//!   triggers, one 16-bit button mask with the d-pad folded into four bits.
//! - **DS4** (DualShock-like): native 8-bit sticks and triggers, discrete
//!   buttons, an 8-way d-pad direction and separate PS/touchpad buttons.
//!
//! Every report is built from scratch out of the current bitmasks, so each
//! emission re-asserts the full pressed/released state of every button.

use super::protocol::*;
use crate::controller::state::InputState;

// XUSB button bits
pub const XUSB_DPAD_UP: u16 = 0x0001;
pub const XUSB_DPAD_DOWN: u16 = 0x0002;
pub const XUSB_DPAD_LEFT: u16 = 0x0004;
pub const XUSB_DPAD_RIGHT: u16 = 0x0008;
pub const XUSB_START: u16 = 0x0010;
pub const XUSB_BACK: u16 = 0x0020;
pub const XUSB_LEFT_THUMB: u16 = 0x0040;
pub const XUSB_RIGHT_THUMB: u16 = 0x0080;
pub const XUSB_LEFT_SHOULDER: u16 = 0x0100;
pub const XUSB_RIGHT_SHOULDER: u16 = 0x0200;
pub const XUSB_GUIDE: u16 = 0x0400;
pub const XUSB_A: u16 = 0x1000;
pub const XUSB_B: u16 = 0x2000;
pub const XUSB_X: u16 = 0x4000;
pub const XUSB_Y: u16 = 0x8000;

// DS4 button bits (d-pad carried separately)
pub const DS4_SQUARE: u16 = 1 << 4;
pub const DS4_CROSS: u16 = 1 << 5;
pub const DS4_CIRCLE: u16 = 1 << 6;
pub const DS4_TRIANGLE: u16 = 1 << 7;
pub const DS4_SHOULDER_LEFT: u16 = 1 << 8;
pub const DS4_SHOULDER_RIGHT: u16 = 1 << 9;
pub const DS4_TRIGGER_LEFT: u16 = 1 << 10;
pub const DS4_TRIGGER_RIGHT: u16 = 1 << 11;
pub const DS4_SHARE: u16 = 1 << 12;
pub const DS4_OPTIONS: u16 = 1 << 13;
pub const DS4_THUMB_LEFT: u16 = 1 << 14;
pub const DS4_THUMB_RIGHT: u16 = 1 << 15;

// DS4 special buttons
pub const DS4_SPECIAL_PS: u8 = 0x01;
pub const DS4_SPECIAL_TOUCHPAD: u8 = 0x02;

/// D-pad bits for hat values 0-7, clockwise from north
const HAT_TO_XUSB_DPAD: [u16; 8] = [
    XUSB_DPAD_UP,
    XUSB_DPAD_UP | XUSB_DPAD_RIGHT,
    XUSB_DPAD_RIGHT,
    XUSB_DPAD_DOWN | XUSB_DPAD_RIGHT,
    XUSB_DPAD_DOWN,
    XUSB_DPAD_DOWN | XUSB_DPAD_LEFT,
    XUSB_DPAD_LEFT,
    XUSB_DPAD_UP | XUSB_DPAD_LEFT,
];

const FACE_TO_XUSB: [(u8, u16); 4] = [
    (FACE_CROSS, XUSB_A),
    (FACE_CIRCLE, XUSB_B),
    (FACE_SQUARE, XUSB_X),
    (FACE_TRIANGLE, XUSB_Y),
];

const SHOULDER_TO_XUSB: [(u8, u16); 6] = [
    (SHOULDER_L1, XUSB_LEFT_SHOULDER),
    (SHOULDER_R1, XUSB_RIGHT_SHOULDER),
    (SHOULDER_CREATE, XUSB_BACK),
    (SHOULDER_OPTIONS, XUSB_START),
    (SHOULDER_L3, XUSB_LEFT_THUMB),
    (SHOULDER_R3, XUSB_RIGHT_THUMB),
];

/// Capability model of the virtual controller.
///
/// Chosen once per bridge from the device identity (or configuration) and
/// never changed while the bridge runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputModel {
    /// XInput-like pad
    Xusb,
    /// DualShock-like pad
    Ds4,
}

/// Encoder bound to a capability model
pub type EncodeFn = fn(&InputState) -> OutputReport;

impl OutputModel {
    /// Returns the encoder for this model.
    ///
    /// Callers resolve this once and call the returned function on every
    /// tick, so no per-tick model dispatch happens.
    pub fn encoder(self) -> EncodeFn {
        match self {
            OutputModel::Xusb => encode_xusb,
            OutputModel::Ds4 => encode_ds4,
        }
    }

    /// Fully neutral report: buttons released, sticks centered, triggers zero
    pub fn neutral_report(self) -> OutputReport {
        match self {
            OutputModel::Xusb => OutputReport::Xusb(XusbReport::default()),
            OutputModel::Ds4 => OutputReport::Ds4(Ds4Report::default()),
        }
    }
}

/// XInput-like report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct XusbReport {
    pub buttons: u16,
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub thumb_lx: i16,
    pub thumb_ly: i16,
    pub thumb_rx: i16,
    pub thumb_ry: i16,
}

/// DualShock-like report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ds4Report {
    pub thumb_lx: u8,
    pub thumb_ly: u8,
    pub thumb_rx: u8,
    pub thumb_ry: u8,
    pub dpad: Direction,
    pub buttons: u16,
    pub special: u8,
    pub trigger_l: u8,
    pub trigger_r: u8,
}

impl Default for Ds4Report {
    fn default() -> Self {
        Self {
            thumb_lx: AXIS_CENTER,
            thumb_ly: AXIS_CENTER,
            thumb_rx: AXIS_CENTER,
            thumb_ry: AXIS_CENTER,
            dpad: Direction::Neutral,
            buttons: 0,
            special: 0,
            trigger_l: 0,
            trigger_r: 0,
        }
    }
}

/// Report for either capability model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputReport {
    Xusb(XusbReport),
    Ds4(Ds4Report),
}

impl OutputReport {
    /// Model this report belongs to
    pub fn model(&self) -> OutputModel {
        match self {
            OutputReport::Xusb(_) => OutputModel::Xusb,
            OutputReport::Ds4(_) => OutputModel::Ds4,
        }
    }

    /// Checks whether this is the neutral report of its model
    pub fn is_neutral(&self) -> bool {
        *self == self.model().neutral_report()
    }
}

/// Convert a native 0-255 axis value to the signed 16-bit range
///
/// `out = value * 257 - 32768`, so 0 maps to -32768 and 255 to 32767.
///
/// # Examples
///
/// ```
/// use pad_bridge::report::encoder::convert_axis;
///
/// assert_eq!(convert_axis(0), -32768);
/// assert_eq!(convert_axis(255), 32767);
/// ```
pub fn convert_axis(value: u8) -> i16 {
    (i32::from(value) * 257 - 32768) as i16
}

/// Convert a native Y axis value to the up-positive signed 16-bit range
///
/// `out = -convert_axis(value) - 1`
pub fn convert_axis_inverted(value: u8) -> i16 {
    // bitwise not is -x - 1 without overflow at i16::MIN
    !convert_axis(value)
}

/// Encode input state as an XUSB report
pub fn encode_xusb(state: &InputState) -> OutputReport {
    let mut buttons = 0u16;

    for (mask, bit) in FACE_TO_XUSB {
        if state.face_hat & mask != 0 {
            buttons |= bit;
        }
    }

    for (mask, bit) in SHOULDER_TO_XUSB {
        if state.shoulder & mask != 0 {
            buttons |= bit;
        }
    }

    if state.system & SYSTEM_PS != 0 {
        buttons |= XUSB_GUIDE;
    }

    if let Some(dpad) = HAT_TO_XUSB_DPAD.get(usize::from(state.face_hat & HAT_MASK)) {
        buttons |= *dpad;
    }

    OutputReport::Xusb(XusbReport {
        buttons,
        left_trigger: state.lt,
        right_trigger: state.rt,
        thumb_lx: convert_axis(state.lx),
        thumb_ly: convert_axis_inverted(state.ly),
        thumb_rx: convert_axis(state.rx),
        thumb_ry: convert_axis_inverted(state.ry),
    })
}

/// Encode input state as a DS4 report
///
/// Axes pass through in their native 0-255 range.
pub fn encode_ds4(state: &InputState) -> OutputReport {
    // Face bits sit in the same high nibble on both sides, shoulder byte
    // lines up with bits 8-15.
    let buttons = u16::from(state.face_hat & !HAT_MASK) | (u16::from(state.shoulder) << 8);

    let mut special = 0u8;
    if state.system & SYSTEM_PS != 0 {
        special |= DS4_SPECIAL_PS;
    }
    if state.system & SYSTEM_TOUCHPAD != 0 {
        special |= DS4_SPECIAL_TOUCHPAD;
    }

    OutputReport::Ds4(Ds4Report {
        thumb_lx: state.lx,
        thumb_ly: state.ly,
        thumb_rx: state.rx,
        thumb_ry: state.ry,
        dpad: state.hat(),
        buttons,
        special,
        trigger_l: state.lt,
        trigger_r: state.rt,
    })
}
