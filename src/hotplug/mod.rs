//! # Hot-plug Module
//!
//! Poll-based attach/detach detection used by guided setup.
//!
//! Every interval the attached HID devices are enumerated into a set and
//! compared with the previous snapshot by symmetric difference:
//!
//! - empty difference: nothing changed, keep polling
//! - one device: a single attach or detach
//! - more than one: ambiguous, the user should plug or unplug one device
//!   at a time

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::controller::device::{DeviceEntry, HidBackend};
use crate::error::{BridgeError, Result};

/// Default polling interval
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Set of attached devices
pub type Snapshot = BTreeSet<DeviceEntry>;

/// Outcome of comparing two snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HotplugChange {
    Unchanged,
    Attached(DeviceEntry),
    Detached(DeviceEntry),
    /// More than one device changed at once
    Ambiguous {
        attached: Vec<DeviceEntry>,
        detached: Vec<DeviceEntry>,
    },
}

/// Compare two snapshots
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use pad_bridge::controller::device::DeviceEntry;
/// use pad_bridge::hotplug::{diff, HotplugChange};
///
/// let a = DeviceEntry::new(1, 2, "A");
/// let b = DeviceEntry::new(3, 4, "B");
/// let prev = BTreeSet::from([a.clone()]);
/// let curr = BTreeSet::from([a, b.clone()]);
///
/// assert_eq!(diff(&prev, &curr), HotplugChange::Attached(b));
/// ```
pub fn diff(previous: &Snapshot, current: &Snapshot) -> HotplugChange {
    let mut attached: Vec<DeviceEntry> = current.difference(previous).cloned().collect();
    let mut detached: Vec<DeviceEntry> = previous.difference(current).cloned().collect();

    if attached.len() + detached.len() > 1 {
        return HotplugChange::Ambiguous { attached, detached };
    }

    match (attached.pop(), detached.pop()) {
        (Some(entry), None) => HotplugChange::Attached(entry),
        (None, Some(entry)) => HotplugChange::Detached(entry),
        _ => HotplugChange::Unchanged,
    }
}

/// Take one snapshot of the attached devices
pub fn snapshot(backend: &dyn HidBackend) -> Result<Snapshot> {
    Ok(backend.enumerate()?.into_iter().collect())
}

/// Polling hot-plug monitor
pub struct HotplugMonitor {
    backend: Arc<dyn HidBackend>,
    previous: Snapshot,
    interval: Duration,
}

impl std::fmt::Debug for HotplugMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HotplugMonitor")
            .field("devices", &self.previous.len())
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl HotplugMonitor {
    /// Create a monitor, taking the initial snapshot
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` for a zero interval, or an error if the
    /// initial enumeration fails.
    pub fn new(backend: Arc<dyn HidBackend>, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(BridgeError::ConfigInvalid(
                "hot-plug interval must be greater than zero".to_string(),
            ));
        }
        let previous = snapshot(backend.as_ref())?;
        debug!("Hot-plug baseline: {} devices", previous.len());
        Ok(Self {
            backend,
            previous,
            interval,
        })
    }

    pub fn devices(&self) -> &Snapshot {
        &self.previous
    }

    /// Enumerate once and diff against the previous snapshot
    pub fn poll(&mut self) -> Result<HotplugChange> {
        let current = snapshot(self.backend.as_ref())?;
        let change = diff(&self.previous, &current);
        self.previous = current;

        match &change {
            HotplugChange::Unchanged => {}
            HotplugChange::Attached(entry) => info!("Device attached: {}", entry.path),
            HotplugChange::Detached(entry) => info!("Device detached: {}", entry.path),
            HotplugChange::Ambiguous { attached, detached } => warn!(
                "Ambiguous hot-plug change: {} attached, {} detached",
                attached.len(),
                detached.len()
            ),
        }

        Ok(change)
    }

    /// Poll on the configured interval until something changes
    ///
    /// # Errors
    ///
    /// Returns error if an enumeration fails.
    pub async fn next_change(&mut self) -> Result<HotplugChange> {
        let mut ticker = self.ticker();
        // first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let change = self.poll()?;
            if change != HotplugChange::Unchanged {
                return Ok(change);
            }
        }
    }

    fn ticker(&self) -> Interval {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }
}
