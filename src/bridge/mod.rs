//! # Bridge Module
//!
//! Start/stop lifecycle of one physical-to-virtual controller bridge.
//!
//! This module handles:
//! - Discovering and opening the physical controller
//! - Creating the virtual controller for the bound output model
//! - Running the fixed-period emission loop on a dedicated thread
//! - Guaranteeing a neutral virtual controller on every shutdown path
//! - Publishing lifecycle status through a `watch` channel
//!
//! ## Lifecycle
//!
//! `start()` acquires everything it needs before spawning the loop. If any
//! step fails, whatever was already acquired is released and no loop runs.
//! `stop()` is idempotent and never blocks longer than the configured stop
//! timeout.

mod emitter;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::controller::device::{discover, DeviceEntry, DeviceIdentity, DeviceSession, HidBackend, ReportEvent};
use crate::controller::profile::DeviceProfile;
use crate::controller::state::{RemovalPolicy, SharedInput};
use crate::error::{BridgeError, Result};
use crate::report::encoder::OutputModel;
use crate::report::protocol::ReportLayout;
use crate::virtual_pad::PadFactory;
use emitter::{EmissionLoop, Outputs};

/// Default emission period
pub const DEFAULT_PERIOD: Duration = Duration::from_micros(2000);

/// Default bound on how long `stop()` waits for the loop
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_millis(100);

/// Resolved bridge parameters
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeSettings {
    pub identity: DeviceIdentity,
    /// Report layout; `None` picks it from the device profile
    pub layout: Option<ReportLayout>,
    /// Output model; `None` picks it from the device profile
    pub model: Option<OutputModel>,
    pub period: Duration,
    pub stop_timeout: Duration,
    pub removal_policy: RemovalPolicy,
}

impl BridgeSettings {
    pub fn new(identity: DeviceIdentity) -> Self {
        Self {
            identity,
            layout: None,
            model: None,
            period: DEFAULT_PERIOD,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            removal_policy: RemovalPolicy::default(),
        }
    }
}

/// Observable lifecycle state of a bridge
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeStatus {
    /// Never started
    Idle,
    Running {
        device: DeviceEntry,
        since: DateTime<Utc>,
    },
    Stopped {
        at: DateTime<Utc>,
    },
    /// The emission loop ended on its own
    Faulted {
        reason: String,
        at: DateTime<Utc>,
    },
}

struct Running {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
    shared: Arc<SharedInput>,
    profile: DeviceProfile,
}

/// Controller bridge
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use pad_bridge::bridge::{Bridge, BridgeSettings};
/// use pad_bridge::controller::device::{DeviceIdentity, HidApiBackend};
/// use pad_bridge::virtual_pad::UinputPadFactory;
///
/// let settings = BridgeSettings::new(DeviceIdentity::new(0x054C, 0x0CE6));
/// let mut bridge = Bridge::new(settings, Arc::new(HidApiBackend::new()?), Box::new(UinputPadFactory));
/// bridge.start()?;
/// bridge.stop();
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Bridge {
    settings: BridgeSettings,
    backend: Arc<dyn HidBackend>,
    pads: Box<dyn PadFactory>,
    running: Option<Running>,
    status: Arc<watch::Sender<BridgeStatus>>,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("settings", &self.settings)
            .field("running", &self.running.is_some())
            .finish_non_exhaustive()
    }
}

impl Bridge {
    pub fn new(settings: BridgeSettings, backend: Arc<dyn HidBackend>, pads: Box<dyn PadFactory>) -> Self {
        let (status, _) = watch::channel(BridgeStatus::Idle);
        Self {
            settings,
            backend,
            pads,
            running: None,
            status: Arc::new(status),
        }
    }

    /// Discover the controller, open it and start the emission loop
    ///
    /// # Returns
    ///
    /// * `Result<()>` - Ok once the loop is running
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - No attached device matches the identity (`DeviceNotFound`)
    /// - The device cannot be opened
    /// - The virtual controller cannot be created
    ///
    /// Nothing is left open and no thread is spawned on error.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            warn!("Bridge already running");
            return Ok(());
        }
        if self.running.is_some() {
            // Loop ended on its own; release it before starting over
            self.stop();
        }

        let identity = &self.settings.identity;
        let entry = discover(self.backend.as_ref(), identity)?
            .ok_or_else(|| BridgeError::DeviceNotFound(identity.to_string()))?;

        let profile = DeviceProfile::for_identity(entry.vendor_id, entry.product_id)
            .with_overrides(self.settings.layout, self.settings.model);
        debug!("Device profile: {:?}", profile);

        let shared = Arc::new(SharedInput::new(self.settings.removal_policy));

        let session = {
            let shared = Arc::clone(&shared);
            let layout = profile.layout;
            DeviceSession::open(self.backend.as_ref(), &entry, move |event| match event {
                ReportEvent::Report(bytes) => {
                    shared.apply_report(bytes, layout);
                }
                ReportEvent::Removed => shared.mark_removed(),
            })?
        };

        let pad = self.pads.create(profile.model)?;

        let stop = Arc::new(AtomicBool::new(false));
        let emission = EmissionLoop {
            shared: Arc::clone(&shared),
            encode: profile.model.encoder(),
            period: self.settings.period,
            stop: Arc::clone(&stop),
            status: Arc::clone(&self.status),
            outputs: Outputs {
                pad,
                session,
                model: profile.model,
            },
        };

        let status = Arc::clone(&self.status);
        let handle = thread::Builder::new()
            .name("emission-loop".to_string())
            .spawn(move || {
                if panic::catch_unwind(AssertUnwindSafe(|| emission.run())).is_err() {
                    error!("Emission loop panicked");
                    status.send_replace(BridgeStatus::Faulted {
                        reason: "emission loop panicked".to_string(),
                        at: Utc::now(),
                    });
                }
            })?;

        info!(
            "Bridge running: {} -> {:?} every {:?}",
            entry.path, profile.model, self.settings.period
        );
        publish_running(&self.status, entry);

        self.running = Some(Running {
            stop,
            handle,
            shared,
            profile,
        });

        Ok(())
    }

    /// Stop the emission loop and release the hardware
    ///
    /// Idempotent; safe before `start()` and after the loop already ended.
    /// The virtual controller receives a neutral report before the device
    /// and the virtual controller are released.
    pub fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            debug!("Bridge not running, nothing to stop");
            return;
        };

        running.stop.store(true, Ordering::Release);
        running.shared.override_slot().clear();

        let deadline = Instant::now() + self.settings.stop_timeout;
        while !running.handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }

        if running.handle.is_finished() {
            if running.handle.join().is_err() {
                error!("Emission loop thread panicked");
            }
        } else {
            warn!(
                "Emission loop did not stop within {:?}, detaching",
                self.settings.stop_timeout
            );
        }

        self.status.send_modify(|status| {
            if !matches!(status, BridgeStatus::Faulted { .. }) {
                *status = BridgeStatus::Stopped { at: Utc::now() };
            }
        });
        info!("Bridge stopped");
    }

    /// Checks whether the emission loop is currently running
    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Shared input of the running session, for the assist engine
    pub fn shared_input(&self) -> Option<Arc<SharedInput>> {
        self.running.as_ref().map(|running| Arc::clone(&running.shared))
    }

    /// Profile bound at `start()`
    pub fn profile(&self) -> Option<DeviceProfile> {
        self.running.as_ref().map(|running| running.profile)
    }

    /// Subscribe to lifecycle status changes
    pub fn status(&self) -> watch::Receiver<BridgeStatus> {
        self.status.subscribe()
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }
}

/// Mark the bridge as running unless the loop has already faulted
fn publish_running(status: &watch::Sender<BridgeStatus>, device: DeviceEntry) -> bool {
    status.send_if_modified(|status| {
        if matches!(status, BridgeStatus::Faulted { .. }) {
            return false;
        }
        *status = BridgeStatus::Running {
            device,
            since: Utc::now(),
        };
        true
    })
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::device::mocks::MockBackend;
    use crate::controller::device::MockHidBackend;
    use crate::controller::state::{InputState, StickOverride};
    use crate::report::encoder::{encode_xusb, OutputReport};
    use crate::report::protocol::MIN_REPORT_LEN;
    use crate::virtual_pad::pad_trait::mocks::{MockPad, MockPadFactory};

    const VENDOR: u16 = 0x1234;
    const PRODUCT: u16 = 0x5678;

    struct Harness {
        bridge: Bridge,
        backend: Arc<MockBackend>,
        pad: MockPad,
    }

    fn harness() -> Harness {
        harness_with(|_| {})
    }

    fn harness_with(configure: impl FnOnce(&mut BridgeSettings)) -> Harness {
        let backend = Arc::new(MockBackend::new(vec![DeviceEntry::new(VENDOR, PRODUCT, "/dev/hidraw0")]));
        let factory = MockPadFactory::new();
        let pad = factory.pad.clone();

        let mut settings = BridgeSettings::new(DeviceIdentity::new(VENDOR, PRODUCT));
        settings.period = Duration::from_millis(1);
        settings.stop_timeout = Duration::from_millis(500);
        configure(&mut settings);

        let bridge = Bridge::new(settings, backend.clone(), Box::new(factory));
        Harness { bridge, backend, pad }
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    fn report_with_lx(lx: u8) -> Vec<u8> {
        let mut report = vec![0u8; MIN_REPORT_LEN];
        report[1] = lx;
        report[2] = 128;
        report[3] = 128;
        report[4] = 128;
        report[8] = 0x08;
        report
    }

    fn xusb_lx(report: Option<OutputReport>) -> Option<i16> {
        match report {
            Some(OutputReport::Xusb(r)) => Some(r.thumb_lx),
            _ => None,
        }
    }

    // ==================== Start Tests ====================

    #[test]
    fn test_start_emits_reports() {
        let mut h = harness();
        h.bridge.start().unwrap();

        assert!(h.bridge.is_running());
        assert!(wait_until(|| h.pad.get_submitted().len() >= 3));
        assert!(matches!(*h.bridge.status().borrow(), BridgeStatus::Running { .. }));

        h.bridge.stop();
    }

    #[test]
    fn test_start_device_not_found_has_no_side_effects() {
        let mut backend = MockHidBackend::new();
        backend.expect_enumerate().returning(|| Ok(Vec::new()));
        backend.expect_open().never();

        let factory = MockPadFactory::new();
        let created = factory.created.clone();
        let settings = BridgeSettings::new(DeviceIdentity::new(VENDOR, PRODUCT));
        let mut bridge = Bridge::new(settings, Arc::new(backend), Box::new(factory));

        match bridge.start() {
            Err(BridgeError::DeviceNotFound(msg)) => assert!(msg.contains("0x1234")),
            other => panic!("Expected DeviceNotFound, got: {:?}", other),
        }

        assert!(!bridge.is_running());
        assert!(bridge.shared_input().is_none());
        assert!(created.lock().is_empty());
        assert_eq!(*bridge.status().borrow(), BridgeStatus::Idle);
    }

    #[test]
    fn test_start_pad_failure_closes_device() {
        let h = harness();
        let backend = h.backend.clone();
        let factory = MockPadFactory::new();
        factory.create_error.store(true, Ordering::Release);
        let mut bridge = Bridge::new(h.bridge.settings().clone(), backend.clone(), Box::new(factory));

        assert!(matches!(bridge.start(), Err(BridgeError::VirtualPad(_))));
        assert!(!bridge.is_running());
        assert!(backend.reader.is_closed());
    }

    #[test]
    fn test_profile_selects_output_model() {
        let backend = Arc::new(MockBackend::new(vec![DeviceEntry::new(0x054C, 0x0CE6, "ds")]));
        let factory = MockPadFactory::new();
        let created = factory.created.clone();
        let mut settings = BridgeSettings::new(DeviceIdentity::new(0x054C, 0x0CE6));
        settings.period = Duration::from_millis(1);
        let mut bridge = Bridge::new(settings, backend, Box::new(factory));

        bridge.start().unwrap();
        assert_eq!(*created.lock(), vec![OutputModel::Ds4]);
        assert_eq!(bridge.profile().map(|p| p.layout), Some(ReportLayout::Standard));
        bridge.stop();
    }

    #[test]
    fn test_configured_model_overrides_profile() {
        let mut h = harness_with(|s| s.model = Some(OutputModel::Ds4));
        h.bridge.start().unwrap();
        assert!(wait_until(|| matches!(h.pad.last_submitted(), Some(OutputReport::Ds4(_)))));
        h.bridge.stop();
    }

    // ==================== Emission Tests ====================

    #[test]
    fn test_reports_flow_to_virtual_pad() {
        let mut h = harness();
        h.bridge.start().unwrap();

        h.backend.reader.push_report(&report_with_lx(255));
        assert!(wait_until(|| xusb_lx(h.pad.last_submitted()) == Some(32767)));

        h.bridge.stop();
    }

    #[test]
    fn test_override_replaces_right_stick() {
        let mut h = harness();
        h.bridge.start().unwrap();

        let shared = h.bridge.shared_input().unwrap();
        shared.override_slot().store(Some(StickOverride { rx: 255, ry: 128 }));

        assert!(wait_until(|| matches!(
            h.pad.last_submitted(),
            Some(OutputReport::Xusb(r)) if r.thumb_rx == 32767
        )));

        h.bridge.stop();
    }

    #[test]
    fn test_short_reports_are_ignored() {
        let mut h = harness();
        h.bridge.start().unwrap();

        h.backend.reader.push_report(&report_with_lx(0));
        assert!(wait_until(|| xusb_lx(h.pad.last_submitted()) == Some(-32768)));

        h.backend.reader.push_report(&[0x01, 0xFF, 0xFF, 0xFF, 0xFF]);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(xusb_lx(h.pad.last_submitted()), Some(-32768));

        h.bridge.stop();
    }

    #[test]
    fn test_removal_neutralizes_output() {
        let mut h = harness();
        h.bridge.start().unwrap();

        h.backend.reader.push_report(&report_with_lx(255));
        assert!(wait_until(|| xusb_lx(h.pad.last_submitted()) == Some(32767)));

        h.backend.reader.unplug();
        let centered = encode_xusb(&InputState::default());
        assert!(wait_until(|| h.pad.last_submitted() == Some(centered)));
        assert!(h.bridge.is_running());

        h.bridge.stop();
    }

    #[test]
    fn test_removal_freeze_keeps_last_state() {
        let mut h = harness_with(|s| s.removal_policy = RemovalPolicy::Freeze);
        h.bridge.start().unwrap();

        h.backend.reader.push_report(&report_with_lx(255));
        assert!(wait_until(|| xusb_lx(h.pad.last_submitted()) == Some(32767)));

        h.backend.reader.unplug();
        assert!(wait_until(|| !h.bridge.shared_input().unwrap().is_connected()));
        thread::sleep(Duration::from_millis(10));
        assert_eq!(xusb_lx(h.pad.last_submitted()), Some(32767));

        h.bridge.stop();
    }

    // ==================== Stop Tests ====================

    #[test]
    fn test_stop_is_idempotent_and_neutral() {
        let mut h = harness();
        h.bridge.start().unwrap();
        h.backend.reader.push_report(&report_with_lx(255));
        assert!(wait_until(|| xusb_lx(h.pad.last_submitted()) == Some(32767)));

        h.bridge.stop();
        h.bridge.stop();

        assert!(!h.bridge.is_running());
        assert!(h.pad.last_submitted().unwrap().is_neutral());
        assert!(h.backend.reader.is_closed());
        assert!(h.pad.is_dropped());
        assert!(matches!(*h.bridge.status().borrow(), BridgeStatus::Stopped { .. }));
    }

    #[test]
    fn test_stop_before_start_is_noop() {
        let mut h = harness();
        h.bridge.stop();
        assert!(h.pad.get_submitted().is_empty());
        assert_eq!(*h.bridge.status().borrow(), BridgeStatus::Idle);
    }

    #[test]
    fn test_restart_after_stop() {
        let mut h = harness();
        h.bridge.start().unwrap();
        h.bridge.stop();
        h.bridge.start().unwrap();
        assert!(h.bridge.is_running());
        h.bridge.stop();
        assert!(h.pad.last_submitted().unwrap().is_neutral());
    }

    #[test]
    fn test_drop_stops_bridge() {
        let h = harness();
        let Harness { mut bridge, backend, pad } = h;
        bridge.start().unwrap();
        drop(bridge);

        assert!(pad.last_submitted().unwrap().is_neutral());
        assert!(backend.reader.is_closed());
    }

    // ==================== Fault Tests ====================

    #[test]
    fn test_loop_fault_still_tears_down() {
        let mut h = harness();
        h.pad.set_fail_after(3);
        let mut status = h.bridge.status();
        h.bridge.start().unwrap();

        assert!(wait_until(|| !h.bridge.is_running()));
        assert!(matches!(*status.borrow_and_update(), BridgeStatus::Faulted { .. }));
        assert!(h.pad.last_submitted().unwrap().is_neutral());
        assert!(h.backend.reader.is_closed());

        // stop after the loop already exited must not hang or clear the fault
        h.bridge.stop();
        assert!(matches!(*h.bridge.status().borrow(), BridgeStatus::Faulted { .. }));
    }

    #[test]
    fn test_early_fault_is_not_overwritten_by_running() {
        let (status, _) = watch::channel(BridgeStatus::Idle);
        let device = DeviceEntry::new(VENDOR, PRODUCT, "hid-0");

        status.send_replace(BridgeStatus::Faulted {
            reason: "submit failed".to_string(),
            at: Utc::now(),
        });
        assert!(!publish_running(&status, device.clone()));
        assert!(matches!(*status.borrow(), BridgeStatus::Faulted { .. }));

        status.send_replace(BridgeStatus::Stopped { at: Utc::now() });
        assert!(publish_running(&status, device.clone()));
        assert!(matches!(&*status.borrow(), BridgeStatus::Running { device: d, .. } if *d == device));
    }

    #[test]
    fn test_fault_on_first_submit_is_reported() {
        let mut h = harness();
        h.pad.set_fail_after(0);
        h.bridge.start().unwrap();

        assert!(wait_until(|| !h.bridge.is_running()));
        assert!(matches!(*h.bridge.status().borrow(), BridgeStatus::Faulted { .. }));
    }
}
