//! # Canonical Input State
//!
//! The most recent controller reading, shared between the HID reader thread
//! (single writer), the emission loop and the assist engine (readers).
//!
//! ## Concurrency
//!
//! - [`InputState`] lives behind a `parking_lot::Mutex` held only for the
//!   copy in or copy out, never across I/O.
//! - The right-stick override pair lives in an [`OverrideSlot`], a single
//!   `AtomicU32` holding both axes and a presence bit. The pair is always
//!   stored and loaded as one word, so a reader can never see a torn update.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::report::decoder::decode_into;
use crate::report::protocol::{Direction, ReportLayout, AXIS_CENTER, HAT_MASK, HAT_NEUTRAL};

/// Canonical controller reading.
///
/// Sticks and triggers are native 0-255 values; the three bitmask bytes are
/// stored exactly as decoded.
///
/// # Examples
///
/// ```
/// use pad_bridge::controller::state::InputState;
///
/// let state = InputState::default();
/// assert_eq!(state.lx, 128);
/// assert_eq!(state.rt, 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputState {
    pub lx: u8,
    pub ly: u8,
    pub rx: u8,
    pub ry: u8,
    pub lt: u8,
    pub rt: u8,
    /// Face buttons (high nibble) and hat (low nibble)
    pub face_hat: u8,
    /// Shoulder, stick-click, create and options buttons
    pub shoulder: u8,
    /// PS, touchpad and mute buttons
    pub system: u8,
}

impl Default for InputState {
    /// Sticks centered, triggers released, hat neutral, no buttons.
    fn default() -> Self {
        Self {
            lx: AXIS_CENTER,
            ly: AXIS_CENTER,
            rx: AXIS_CENTER,
            ry: AXIS_CENTER,
            lt: 0,
            rt: 0,
            face_hat: HAT_NEUTRAL,
            shoulder: 0,
            system: 0,
        }
    }
}

impl InputState {
    /// D-pad direction of the hat nibble
    pub fn hat(&self) -> Direction {
        Direction::from_hat(self.face_hat & HAT_MASK)
    }

    /// Returns a copy with the right stick replaced by `stick`, if present.
    #[must_use]
    pub fn with_override(mut self, stick: Option<StickOverride>) -> Self {
        if let Some(stick) = stick {
            self.rx = stick.rx;
            self.ry = stick.ry;
        }
        self
    }
}

/// Replacement right-stick position in native 0-255 units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StickOverride {
    pub rx: u8,
    pub ry: u8,
}

const OVERRIDE_PRESENT: u32 = 1 << 16;

impl StickOverride {
    fn pack(self) -> u32 {
        OVERRIDE_PRESENT | (u32::from(self.rx) << 8) | u32::from(self.ry)
    }

    fn unpack(word: u32) -> Option<Self> {
        if word & OVERRIDE_PRESENT == 0 {
            return None;
        }
        Some(Self {
            rx: (word >> 8) as u8,
            ry: word as u8,
        })
    }
}

/// Single-slot, last-write-wins holder for the right-stick override.
#[derive(Debug, Default)]
pub struct OverrideSlot {
    word: AtomicU32,
}

impl OverrideSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the slot contents; `None` clears the override.
    pub fn store(&self, stick: Option<StickOverride>) {
        let word = stick.map_or(0, StickOverride::pack);
        self.word.store(word, Ordering::Release);
    }

    pub fn load(&self) -> Option<StickOverride> {
        StickOverride::unpack(self.word.load(Ordering::Acquire))
    }

    pub fn clear(&self) {
        self.store(None);
    }
}

/// What the emission loop outputs once the physical device disappears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalPolicy {
    /// Emit the neutral state
    #[default]
    Neutralize,
    /// Keep emitting the last decoded state
    Freeze,
}

/// One consistent view of state and override, taken together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSnapshot {
    pub state: InputState,
    pub stick_override: Option<StickOverride>,
    pub connected: bool,
}

impl InputSnapshot {
    /// State to emit: the decoded reading with any override applied
    pub fn effective(&self) -> InputState {
        self.state.with_override(self.stick_override)
    }
}

/// Shared canonical state for one bridge session.
///
/// Created when the device is opened and dropped when the bridge stops.
#[derive(Debug)]
pub struct SharedInput {
    state: Mutex<InputState>,
    stick_override: OverrideSlot,
    connected: AtomicBool,
    removal_policy: RemovalPolicy,
}

impl Default for SharedInput {
    fn default() -> Self {
        Self::new(RemovalPolicy::default())
    }
}

impl SharedInput {
    pub fn new(removal_policy: RemovalPolicy) -> Self {
        Self {
            state: Mutex::new(InputState::default()),
            stick_override: OverrideSlot::new(),
            connected: AtomicBool::new(true),
            removal_policy,
        }
    }

    /// Decode a raw report into the shared state.
    ///
    /// Decoding happens on a local copy; the lock is held only for the final
    /// assignment. Returns `false` for short reports, which are dropped.
    pub fn apply_report(&self, report: &[u8], layout: ReportLayout) -> bool {
        let mut decoded = InputState::default();
        if !decode_into(report, layout, &mut decoded) {
            return false;
        }
        *self.state.lock() = decoded;
        true
    }

    /// Copy of the current decoded state
    pub fn state(&self) -> InputState {
        *self.state.lock()
    }

    /// Overwrite the decoded state
    pub fn set_state(&self, state: InputState) {
        *self.state.lock() = state;
    }

    pub fn override_slot(&self) -> &OverrideSlot {
        &self.stick_override
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Record that the physical device is gone.
    ///
    /// The override is cleared; with [`RemovalPolicy::Neutralize`] later
    /// snapshots report the neutral state.
    pub fn mark_removed(&self) {
        self.connected.store(false, Ordering::Release);
        self.stick_override.clear();
    }

    /// Take a consistent snapshot for one emission tick.
    pub fn snapshot(&self) -> InputSnapshot {
        let connected = self.is_connected();
        if !connected && self.removal_policy == RemovalPolicy::Neutralize {
            return InputSnapshot {
                state: InputState::default(),
                stick_override: None,
                connected,
            };
        }

        InputSnapshot {
            state: self.state(),
            stick_override: self.stick_override.load(),
            connected,
        }
    }
}
