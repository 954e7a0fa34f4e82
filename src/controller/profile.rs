//! # Device Profiles
//!
//! Binds a physical controller to its report layout and to the capability
//! model of the virtual controller that mirrors it. Resolved once when the
//! bridge starts.

use crate::report::encoder::OutputModel;
use crate::report::protocol::ReportLayout;

/// Sony Interactive Entertainment
pub const VENDOR_SONY: u16 = 0x054C;
/// Microsoft
pub const VENDOR_MICROSOFT: u16 = 0x045E;

/// Report layout and output model for one device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceProfile {
    pub layout: ReportLayout,
    pub model: OutputModel,
}

impl DeviceProfile {
    /// Profile implied by the vendor ID
    ///
    /// # Examples
    ///
    /// ```
    /// use pad_bridge::controller::profile::DeviceProfile;
    /// use pad_bridge::report::encoder::OutputModel;
    ///
    /// let profile = DeviceProfile::for_identity(0x054C, 0x0CE6);
    /// assert_eq!(profile.model, OutputModel::Ds4);
    /// ```
    pub fn for_identity(vendor_id: u16, _product_id: u16) -> Self {
        match vendor_id {
            VENDOR_SONY => Self {
                layout: ReportLayout::Standard,
                model: OutputModel::Ds4,
            },
            VENDOR_MICROSOFT => Self {
                layout: ReportLayout::Swapped,
                model: OutputModel::Xusb,
            },
            _ => Self {
                layout: ReportLayout::Standard,
                model: OutputModel::Xusb,
            },
        }
    }

    /// Replace either choice with an explicit one
    #[must_use]
    pub fn with_overrides(mut self, layout: Option<ReportLayout>, model: Option<OutputModel>) -> Self {
        if let Some(layout) = layout {
            self.layout = layout;
        }
        if let Some(model) = model {
            self.model = model;
        }
        self
    }
}
