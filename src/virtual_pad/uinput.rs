//! # uinput Virtual Controller
//!
//! Virtual gamepad built on the Linux uinput driver through `evdev`.
//!
//! Every submitted report is translated into a full event frame: one event
//! per key and per axis followed by a `SYN_REPORT`. Released keys are
//! written as explicitly as pressed ones, so a frame always carries the
//! complete controller state.

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{
    AbsInfo, AbsoluteAxisType, AttributeSet, BusType, EventType, InputEvent, InputId, Key,
    UinputAbsSetup,
};
use tracing::info;

use super::pad_trait::{PadFactory, VirtualPad};
use crate::error::{BridgeError, Result};
use crate::report::encoder::*;

/// Identity reported by the XUSB virtual pad (Xbox 360 wired)
const XUSB_VENDOR_ID: u16 = 0x045E;
const XUSB_PRODUCT_ID: u16 = 0x028E;

/// Identity reported by the DS4 virtual pad (DualShock 4 v2)
const DS4_VENDOR_ID: u16 = 0x054C;
const DS4_PRODUCT_ID: u16 = 0x09CC;

const XUSB_KEYS: [(u16, Key); 11] = [
    (XUSB_A, Key::BTN_SOUTH),
    (XUSB_B, Key::BTN_EAST),
    (XUSB_X, Key::BTN_WEST),
    (XUSB_Y, Key::BTN_NORTH),
    (XUSB_LEFT_SHOULDER, Key::BTN_TL),
    (XUSB_RIGHT_SHOULDER, Key::BTN_TR),
    (XUSB_BACK, Key::BTN_SELECT),
    (XUSB_START, Key::BTN_START),
    (XUSB_GUIDE, Key::BTN_MODE),
    (XUSB_LEFT_THUMB, Key::BTN_THUMBL),
    (XUSB_RIGHT_THUMB, Key::BTN_THUMBR),
];

const DS4_KEYS: [(u16, Key); 12] = [
    (DS4_CROSS, Key::BTN_SOUTH),
    (DS4_CIRCLE, Key::BTN_EAST),
    (DS4_SQUARE, Key::BTN_WEST),
    (DS4_TRIANGLE, Key::BTN_NORTH),
    (DS4_SHOULDER_LEFT, Key::BTN_TL),
    (DS4_SHOULDER_RIGHT, Key::BTN_TR),
    (DS4_TRIGGER_LEFT, Key::BTN_TL2),
    (DS4_TRIGGER_RIGHT, Key::BTN_TR2),
    (DS4_SHARE, Key::BTN_SELECT),
    (DS4_OPTIONS, Key::BTN_START),
    (DS4_THUMB_LEFT, Key::BTN_THUMBL),
    (DS4_THUMB_RIGHT, Key::BTN_THUMBR),
];

const DS4_SPECIAL_KEYS: [(u8, Key); 2] = [
    (DS4_SPECIAL_PS, Key::BTN_MODE),
    (DS4_SPECIAL_TOUCHPAD, Key::BTN_TRIGGER_HAPPY1),
];

fn key_event(key: Key, pressed: bool) -> InputEvent {
    InputEvent::new(EventType::KEY, key.code(), i32::from(pressed))
}

fn abs_event(axis: AbsoluteAxisType, value: i32) -> InputEvent {
    InputEvent::new(EventType::ABSOLUTE, axis.0, value)
}

fn hat_from_dpad(buttons: u16) -> (i32, i32) {
    let x = i32::from(buttons & XUSB_DPAD_RIGHT != 0) - i32::from(buttons & XUSB_DPAD_LEFT != 0);
    let y = i32::from(buttons & XUSB_DPAD_DOWN != 0) - i32::from(buttons & XUSB_DPAD_UP != 0);
    (x, y)
}

/// Translate a report into one complete uinput event frame
///
/// # Arguments
///
/// * `report` - Report to translate
/// * `events` - Output buffer, cleared first
///
/// Stick Y values are written down-positive, as evdev gamepads report them.
pub fn fill_events(report: &OutputReport, events: &mut Vec<InputEvent>) {
    events.clear();

    match report {
        OutputReport::Xusb(r) => {
            for (mask, key) in XUSB_KEYS {
                events.push(key_event(key, r.buttons & mask != 0));
            }
            let (hat_x, hat_y) = hat_from_dpad(r.buttons);
            events.extend([
                abs_event(AbsoluteAxisType::ABS_X, i32::from(r.thumb_lx)),
                abs_event(AbsoluteAxisType::ABS_Y, i32::from(!r.thumb_ly)),
                abs_event(AbsoluteAxisType::ABS_RX, i32::from(r.thumb_rx)),
                abs_event(AbsoluteAxisType::ABS_RY, i32::from(!r.thumb_ry)),
                abs_event(AbsoluteAxisType::ABS_Z, i32::from(r.left_trigger)),
                abs_event(AbsoluteAxisType::ABS_RZ, i32::from(r.right_trigger)),
                abs_event(AbsoluteAxisType::ABS_HAT0X, hat_x),
                abs_event(AbsoluteAxisType::ABS_HAT0Y, hat_y),
            ]);
        }
        OutputReport::Ds4(r) => {
            for (mask, key) in DS4_KEYS {
                events.push(key_event(key, r.buttons & mask != 0));
            }
            for (mask, key) in DS4_SPECIAL_KEYS {
                events.push(key_event(key, r.special & mask != 0));
            }
            events.extend([
                abs_event(AbsoluteAxisType::ABS_X, i32::from(r.thumb_lx)),
                abs_event(AbsoluteAxisType::ABS_Y, i32::from(r.thumb_ly)),
                abs_event(AbsoluteAxisType::ABS_RX, i32::from(r.thumb_rx)),
                abs_event(AbsoluteAxisType::ABS_RY, i32::from(r.thumb_ry)),
                abs_event(AbsoluteAxisType::ABS_Z, i32::from(r.trigger_l)),
                abs_event(AbsoluteAxisType::ABS_RZ, i32::from(r.trigger_r)),
                abs_event(AbsoluteAxisType::ABS_HAT0X, r.dpad.x()),
                abs_event(AbsoluteAxisType::ABS_HAT0Y, r.dpad.y()),
            ]);
        }
    }

    events.push(InputEvent::new(EventType::SYNCHRONIZATION, 0, 0));
}

/// Virtual pad backed by a uinput device
pub struct UinputPad {
    device: VirtualDevice,
    events: Vec<InputEvent>,
}

impl std::fmt::Debug for UinputPad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UinputPad").finish_non_exhaustive()
    }
}

impl UinputPad {
    /// Create a virtual controller for `model`
    ///
    /// # Errors
    ///
    /// Returns `VirtualPad` error if `/dev/uinput` is unavailable or the
    /// device cannot be registered.
    pub fn create(model: OutputModel) -> Result<Self> {
        let device = build_device(model).map_err(|e| {
            BridgeError::VirtualPad(format!("Failed to create {:?} virtual pad: {}", model, e))
        })?;

        info!("Created {:?} virtual pad", model);

        Ok(Self {
            device,
            events: Vec::with_capacity(32),
        })
    }
}

impl VirtualPad for UinputPad {
    fn submit(&mut self, report: &OutputReport) -> Result<()> {
        fill_events(report, &mut self.events);
        self.device
            .emit(&self.events)
            .map_err(|e| BridgeError::VirtualPad(format!("Failed to emit report: {}", e)))
    }
}

fn build_device(model: OutputModel) -> std::io::Result<VirtualDevice> {
    let mut keys = AttributeSet::<Key>::new();
    let (name, vendor, product, stick_min, stick_max) = match model {
        OutputModel::Xusb => {
            XUSB_KEYS.iter().for_each(|(_, key)| keys.insert(*key));
            ("Pad Bridge XUSB Controller", XUSB_VENDOR_ID, XUSB_PRODUCT_ID, i32::from(i16::MIN), i32::from(i16::MAX))
        }
        OutputModel::Ds4 => {
            DS4_KEYS.iter().for_each(|(_, key)| keys.insert(*key));
            DS4_SPECIAL_KEYS.iter().for_each(|(_, key)| keys.insert(*key));
            ("Pad Bridge DS4 Controller", DS4_VENDOR_ID, DS4_PRODUCT_ID, 0, 255)
        }
    };

    let stick_center = match model {
        OutputModel::Xusb => 0,
        OutputModel::Ds4 => 128,
    };
    let stick = AbsInfo::new(stick_center, stick_min, stick_max, 16, 128, 0);
    let trigger = AbsInfo::new(0, 0, 255, 0, 0, 0);
    let hat = AbsInfo::new(0, -1, 1, 0, 0, 0);

    let mut builder = VirtualDeviceBuilder::new()?
        .name(name)
        .input_id(InputId::new(BusType::BUS_USB, vendor, product, 0x0110))
        .with_keys(&keys)?;

    for axis in [
        AbsoluteAxisType::ABS_X,
        AbsoluteAxisType::ABS_Y,
        AbsoluteAxisType::ABS_RX,
        AbsoluteAxisType::ABS_RY,
    ] {
        builder = builder.with_absolute_axis(&UinputAbsSetup::new(axis, stick))?;
    }
    for axis in [AbsoluteAxisType::ABS_Z, AbsoluteAxisType::ABS_RZ] {
        builder = builder.with_absolute_axis(&UinputAbsSetup::new(axis, trigger))?;
    }
    for axis in [AbsoluteAxisType::ABS_HAT0X, AbsoluteAxisType::ABS_HAT0Y] {
        builder = builder.with_absolute_axis(&UinputAbsSetup::new(axis, hat))?;
    }

    builder.build()
}

/// [`PadFactory`] producing [`UinputPad`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct UinputPadFactory;

impl PadFactory for UinputPadFactory {
    fn create(&self, model: OutputModel) -> Result<Box<dyn VirtualPad>> {
        Ok(Box::new(UinputPad::create(model)?))
    }
}
