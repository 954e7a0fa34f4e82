//! # Input Report Constants and Types
//!
//! Byte offsets, bit masks and layout descriptions for the raw input report
//! delivered by the physical controller.
//!
//! ## Report Layout
//!
//! | Offset | Field |
//! |--------|-------|
//! | 0 | Report ID |
//! | 1 | Left stick X (0-255) |
//! | 2 | Left stick Y (0-255) |
//! | 3 | Right stick X (0-255) |
//! | 4 | Right stick Y (0-255) |
//! | 5 | Left trigger (0-255) |
//! | 6 | Right trigger (0-255) |
//! | 7 | Sequence counter (ignored) |
//! | 8-10 | Button bitmasks, order depends on [`ReportLayout`] |

/// Minimum report length accepted by the decoder
pub const MIN_REPORT_LEN: usize = 11;

/// Axis field offsets
pub const OFFSET_LX: usize = 1;
pub const OFFSET_LY: usize = 2;
pub const OFFSET_RX: usize = 3;
pub const OFFSET_RY: usize = 4;
pub const OFFSET_LT: usize = 5;
pub const OFFSET_RT: usize = 6;

/// Native axis range
pub const AXIS_MIN: u8 = 0;
pub const AXIS_MAX: u8 = 255;
pub const AXIS_CENTER: u8 = 128;

/// Low nibble of the face/hat byte
pub const HAT_MASK: u8 = 0x0F;
/// Hat value reported when the d-pad is released
pub const HAT_NEUTRAL: u8 = 0x08;

// Face/hat byte, high nibble
pub const FACE_SQUARE: u8 = 0x10;
pub const FACE_CROSS: u8 = 0x20;
pub const FACE_CIRCLE: u8 = 0x40;
pub const FACE_TRIANGLE: u8 = 0x80;

// Shoulder/stick/system byte
pub const SHOULDER_L1: u8 = 0x01;
pub const SHOULDER_R1: u8 = 0x02;
pub const SHOULDER_L2: u8 = 0x04;
pub const SHOULDER_R2: u8 = 0x08;
pub const SHOULDER_CREATE: u8 = 0x10;
pub const SHOULDER_OPTIONS: u8 = 0x20;
pub const SHOULDER_L3: u8 = 0x40;
pub const SHOULDER_R3: u8 = 0x80;

// Touchpad/system byte
pub const SYSTEM_PS: u8 = 0x01;
pub const SYSTEM_TOUCHPAD: u8 = 0x02;
pub const SYSTEM_MUTE: u8 = 0x04;

/// Position of the three button bitmask bytes inside a report.
///
/// Two layouts are observed in the field. The layout is bound once per
/// device from its identity and never inferred from packet contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportLayout {
    /// Face/hat at 8, shoulder at 9, system at 10
    #[default]
    Standard,
    /// Shoulder at 8, face/hat at 9, system at 10
    Swapped,
}

impl ReportLayout {
    /// Byte offset of the face-button/hat bitmask
    pub const fn face_hat_offset(self) -> usize {
        match self {
            ReportLayout::Standard => 8,
            ReportLayout::Swapped => 9,
        }
    }

    /// Byte offset of the shoulder/stick/system bitmask
    pub const fn shoulder_offset(self) -> usize {
        match self {
            ReportLayout::Standard => 9,
            ReportLayout::Swapped => 8,
        }
    }

    /// Byte offset of the touchpad/system bitmask
    pub const fn system_offset(self) -> usize {
        10
    }
}

/// Eight-way d-pad direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
    Neutral,
}

impl Direction {
    /// Map a 4-bit hat value to a direction.
    ///
    /// 0-7 walk clockwise from north; any other value is neutral.
    ///
    /// # Examples
    ///
    /// ```
    /// use pad_bridge::report::protocol::Direction;
    ///
    /// assert_eq!(Direction::from_hat(0), Direction::North);
    /// assert_eq!(Direction::from_hat(5), Direction::SouthWest);
    /// assert_eq!(Direction::from_hat(8), Direction::Neutral);
    /// ```
    pub const fn from_hat(hat: u8) -> Self {
        match hat {
            0 => Direction::North,
            1 => Direction::NorthEast,
            2 => Direction::East,
            3 => Direction::SouthEast,
            4 => Direction::South,
            5 => Direction::SouthWest,
            6 => Direction::West,
            7 => Direction::NorthWest,
            _ => Direction::Neutral,
        }
    }

    /// Hat value for this direction (8 for neutral)
    pub const fn hat(self) -> u8 {
        match self {
            Direction::North => 0,
            Direction::NorthEast => 1,
            Direction::East => 2,
            Direction::SouthEast => 3,
            Direction::South => 4,
            Direction::SouthWest => 5,
            Direction::West => 6,
            Direction::NorthWest => 7,
            Direction::Neutral => HAT_NEUTRAL,
        }
    }

    /// Horizontal component: -1 west, 0 none, 1 east
    pub const fn x(self) -> i32 {
        match self {
            Direction::NorthEast | Direction::East | Direction::SouthEast => 1,
            Direction::SouthWest | Direction::West | Direction::NorthWest => -1,
            _ => 0,
        }
    }

    /// Vertical component: -1 north, 0 none, 1 south
    pub const fn y(self) -> i32 {
        match self {
            Direction::North | Direction::NorthEast | Direction::NorthWest => -1,
            Direction::SouthEast | Direction::South | Direction::SouthWest => 1,
            _ => 0,
        }
    }
}
