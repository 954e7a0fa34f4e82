//! # Input Report Decoder
//!
//! Decodes raw controller input reports into [`InputState`].

use super::protocol::*;
use crate::controller::state::InputState;

/// Decode a raw input report
///
/// # Arguments
///
/// * `report` - Raw report bytes as delivered by the HID driver
/// * `layout` - Bitmask byte layout of the source device
///
/// # Returns
///
/// * `Option<InputState>` - Decoded state, or `None` for reports shorter
///   than [`MIN_REPORT_LEN`]. A short report is not an error; the caller keeps
///   its previous state.
///
/// # Examples
///
/// ```
/// use pad_bridge::report::decoder::decode_report;
/// use pad_bridge::report::protocol::ReportLayout;
///
/// let mut report = [0u8; 11];
/// report[1] = 255;
/// let state = decode_report(&report, ReportLayout::Standard).unwrap();
/// assert_eq!(state.lx, 255);
///
/// assert!(decode_report(&report[..5], ReportLayout::Standard).is_none());
/// ```
pub fn decode_report(report: &[u8], layout: ReportLayout) -> Option<InputState> {
    let mut state = InputState::default();
    decode_into(report, layout, &mut state).then_some(state)
}

/// Decode a raw input report in place
///
/// Overwrites `state` when the report is long enough and returns `true`.
/// Shorter reports leave `state` untouched and return `false`.
pub fn decode_into(report: &[u8], layout: ReportLayout, state: &mut InputState) -> bool {
    if report.len() < MIN_REPORT_LEN {
        return false;
    }

    state.lx = report[OFFSET_LX];
    state.ly = report[OFFSET_LY];
    state.rx = report[OFFSET_RX];
    state.ry = report[OFFSET_RY];
    state.lt = report[OFFSET_LT];
    state.rt = report[OFFSET_RT];

    state.face_hat = report[layout.face_hat_offset()];
    state.shoulder = report[layout.shoulder_offset()];
    state.system = report[layout.system_offset()];

    true
}
