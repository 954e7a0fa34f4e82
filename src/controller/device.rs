//! # Physical Device Lifecycle
//!
//! Discovers a physical controller by identity, opens it and registers a
//! report callback, and tears the connection down again.
//!
//! ## Device Addressing
//!
//! Devices are addressed by `(vendor_id, product_id, instance_path)`. The
//! instance path tells apart devices that share vendor and product IDs.
//! Discovery accepts either the pair alone (first match wins) or the full
//! triple (exact match).
//!
//! ## Report Delivery
//!
//! HID drivers deliver reports on a dedicated reader thread. Every report is
//! handed to the registered callback, which must copy and decode only: no
//! I/O and no lock held past its return.

use std::ffi::CString;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{BridgeError, Result};

/// Read timeout of the reader thread; bounds how long `close` waits for it
const READ_TIMEOUT_MS: i32 = 20;

/// Largest input report we expect from a supported controller
const REPORT_BUFFER_SIZE: usize = 64;

/// Identity a caller asks for.
///
/// With `path` unset, the first device with matching vendor and product IDs
/// is taken.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
    pub path: Option<String>,
}

impl DeviceIdentity {
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
            path: None,
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Checks whether an enumerated device satisfies this identity
    pub fn matches(&self, entry: &DeviceEntry) -> bool {
        self.vendor_id == entry.vendor_id
            && self.product_id == entry.product_id
            && self.path.as_deref().map_or(true, |path| path == entry.path)
    }
}

impl std::fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VID:0x{:04X} PID:0x{:04X}", self.vendor_id, self.product_id)?;
        if let Some(path) = &self.path {
            write!(f, " PATH:{}", path)?;
        }
        Ok(())
    }
}

/// One enumerated device
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceEntry {
    pub vendor_id: u16,
    pub product_id: u16,
    pub path: String,
    pub display_name: Option<String>,
}

impl DeviceEntry {
    pub fn new(vendor_id: u16, product_id: u16, path: impl Into<String>) -> Self {
        Self {
            vendor_id,
            product_id,
            path: path.into(),
            display_name: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Full identity of this device, path included
    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(self.vendor_id, self.product_id).with_path(self.path.clone())
    }
}

/// An opened device that yields raw reports
pub trait ReportReader: Send {
    /// Read one report, waiting at most `timeout_ms`.
    ///
    /// Returns `Ok(0)` on timeout. An error means the device is gone.
    fn read_report(&mut self, buf: &mut [u8], timeout_ms: i32) -> io::Result<usize>;

    /// Release the handle
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Enumerate and open HID devices
#[cfg_attr(test, mockall::automock)]
pub trait HidBackend: Send + Sync {
    /// One bounded enumeration of every attached device
    fn enumerate(&self) -> Result<Vec<DeviceEntry>>;

    /// Open a device for reading
    fn open(&self, entry: &DeviceEntry) -> Result<Box<dyn ReportReader>>;
}

/// Find the first attached device matching `identity`.
///
/// Returns `Ok(None)` when nothing matches; ties between devices sharing
/// vendor and product IDs are broken only by a caller-supplied path.
///
/// # Errors
///
/// Returns an error only if enumeration itself fails.
pub fn discover(backend: &dyn HidBackend, identity: &DeviceIdentity) -> Result<Option<DeviceEntry>> {
    let found = backend
        .enumerate()?
        .into_iter()
        .find(|entry| identity.matches(entry));

    match &found {
        Some(entry) => info!("Found controller {} at {}", identity, entry.path),
        None => debug!("No device matches {}", identity),
    }

    Ok(found)
}

/// What the reader thread hands to the registered callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportEvent<'a> {
    /// A raw report as delivered by the driver
    Report(&'a [u8]),
    /// The device stopped answering; no further events follow
    Removed,
}

/// An open device with its report callback registered.
///
/// Dropping the session closes it.
pub struct DeviceSession {
    entry: DeviceEntry,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("path", &self.entry.path)
            .field("open", &self.reader.is_some())
            .finish_non_exhaustive()
    }
}

impl DeviceSession {
    /// Open `entry` and start delivering its reports to `callback`.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be opened or the reader thread
    /// cannot be spawned. Nothing stays open on error.
    pub fn open<F>(backend: &dyn HidBackend, entry: &DeviceEntry, callback: F) -> Result<Self>
    where
        F: FnMut(ReportEvent<'_>) + Send + 'static,
    {
        let reader = backend.open(entry)?;
        let stop = Arc::new(AtomicBool::new(false));

        let handle = {
            let stop = Arc::clone(&stop);
            let path = entry.path.clone();
            thread::Builder::new()
                .name("hid-reader".to_string())
                .spawn(move || read_loop(reader, callback, stop, path))?
        };

        info!("Opened controller at {}", entry.path);

        Ok(Self {
            entry: entry.clone(),
            stop,
            reader: Some(handle),
        })
    }

    /// Close the device.
    ///
    /// Idempotent. Failures are logged and swallowed since the device may
    /// already be physically gone.
    pub fn close(&mut self) {
        let Some(handle) = self.reader.take() else {
            return;
        };

        self.stop.store(true, Ordering::Release);
        if handle.join().is_err() {
            warn!("HID reader thread for {} panicked", self.entry.path);
        }
        info!("Closed controller at {}", self.entry.path);
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn read_loop<F>(mut reader: Box<dyn ReportReader>, mut callback: F, stop: Arc<AtomicBool>, path: String)
where
    F: FnMut(ReportEvent<'_>),
{
    let mut buf = [0u8; REPORT_BUFFER_SIZE];

    while !stop.load(Ordering::Acquire) {
        match reader.read_report(&mut buf, READ_TIMEOUT_MS) {
            Ok(0) => continue,
            Ok(len) => callback(ReportEvent::Report(&buf[..len.min(buf.len())])),
            Err(e) => {
                warn!("Controller at {} stopped responding: {}", path, e);
                callback(ReportEvent::Removed);
                break;
            }
        }
    }

    if let Err(e) = reader.close() {
        warn!("Failed to close controller at {}: {}", path, e);
    }
}

/// [`HidBackend`] on top of `hidapi`
pub struct HidApiBackend {
    api: Mutex<hidapi::HidApi>,
}

impl std::fmt::Debug for HidApiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HidApiBackend").finish_non_exhaustive()
    }
}

impl HidApiBackend {
    /// Initialize the HID library
    ///
    /// # Errors
    ///
    /// Returns `Hid` error if the platform HID library cannot be initialized.
    pub fn new() -> Result<Self> {
        let api = hidapi::HidApi::new()
            .map_err(|e| BridgeError::Hid(format!("Failed to initialize HID API: {}", e)))?;
        Ok(Self { api: Mutex::new(api) })
    }
}

impl HidBackend for HidApiBackend {
    fn enumerate(&self) -> Result<Vec<DeviceEntry>> {
        let mut api = self.api.lock();
        api.refresh_devices()
            .map_err(|e| BridgeError::Hid(format!("Failed to enumerate devices: {}", e)))?;

        Ok(api
            .device_list()
            .map(|info| DeviceEntry {
                vendor_id: info.vendor_id(),
                product_id: info.product_id(),
                path: info.path().to_string_lossy().into_owned(),
                display_name: info.product_string().map(str::to_string),
            })
            .collect())
    }

    fn open(&self, entry: &DeviceEntry) -> Result<Box<dyn ReportReader>> {
        let path = CString::new(entry.path.as_str())
            .map_err(|e| BridgeError::Hid(format!("Invalid device path {}: {}", entry.path, e)))?;

        let device = self
            .api
            .lock()
            .open_path(&path)
            .map_err(|e| BridgeError::Hid(format!("Failed to open {}: {}", entry.path, e)))?;

        Ok(Box::new(HidApiReader { device }))
    }
}

struct HidApiReader {
    device: hidapi::HidDevice,
}

impl ReportReader for HidApiReader {
    fn read_report(&mut self, buf: &mut [u8], timeout_ms: i32) -> io::Result<usize> {
        self.device
            .read_timeout(buf, timeout_ms)
            .map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e.to_string()))
    }
}


#[cfg(test)]
mod tests {
    use super::mocks::*;
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    fn pad(vendor: u16, product: u16, path: &str) -> DeviceEntry {
        DeviceEntry::new(vendor, product, path)
    }

    // ==================== Identity Tests ====================

    #[test]
    fn test_identity_without_path_matches_any_path() {
        let identity = DeviceIdentity::new(0x054C, 0x0CE6);
        assert!(identity.matches(&pad(0x054C, 0x0CE6, "a")));
        assert!(identity.matches(&pad(0x054C, 0x0CE6, "b")));
        assert!(!identity.matches(&pad(0x054C, 0x0DF2, "a")));
    }

    #[test]
    fn test_identity_with_path_is_exact() {
        let identity = DeviceIdentity::new(0x054C, 0x0CE6).with_path("b");
        assert!(!identity.matches(&pad(0x054C, 0x0CE6, "a")));
        assert!(identity.matches(&pad(0x054C, 0x0CE6, "b")));
    }

    #[test]
    fn test_identity_display() {
        let identity = DeviceIdentity::new(0x054C, 0x0CE6);
        assert_eq!(identity.to_string(), "VID:0x054C PID:0x0CE6");
        let identity = identity.with_path("/dev/hidraw3");
        assert_eq!(identity.to_string(), "VID:0x054C PID:0x0CE6 PATH:/dev/hidraw3");
    }

    #[test]
    fn test_entry_identity_includes_path() {
        let entry = pad(1, 2, "A").with_name("Pad");
        assert_eq!(entry.identity(), DeviceIdentity::new(1, 2).with_path("A"));
        assert_eq!(entry.display_name.as_deref(), Some("Pad"));
    }

    // ==================== Discovery Tests ====================

    #[test]
    fn test_discover_first_match_wins() {
        let mut backend = MockHidBackend::new();
        backend.expect_enumerate().times(1).returning(|| {
            Ok(vec![
                pad(0x045E, 0x0B13, "x"),
                pad(0x054C, 0x0CE6, "first"),
                pad(0x054C, 0x0CE6, "second"),
            ])
        });

        let found = discover(&backend, &DeviceIdentity::new(0x054C, 0x0CE6)).unwrap();
        assert_eq!(found.map(|e| e.path), Some("first".to_string()));
    }

    #[test]
    fn test_discover_path_disambiguates() {
        let mut backend = MockHidBackend::new();
        backend
            .expect_enumerate()
            .returning(|| Ok(vec![pad(0x054C, 0x0CE6, "first"), pad(0x054C, 0x0CE6, "second")]));

        let identity = DeviceIdentity::new(0x054C, 0x0CE6).with_path("second");
        let found = discover(&backend, &identity).unwrap();
        assert_eq!(found.map(|e| e.path), Some("second".to_string()));
    }

    #[test]
    fn test_discover_not_found_is_not_an_error() {
        let mut backend = MockHidBackend::new();
        backend.expect_enumerate().returning(|| Ok(vec![pad(1, 2, "a")]));

        let found = discover(&backend, &DeviceIdentity::new(3, 4)).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_discover_propagates_enumeration_failure() {
        let mut backend = MockHidBackend::new();
        backend
            .expect_enumerate()
            .returning(|| Err(BridgeError::Hid("boom".to_string())));

        assert!(discover(&backend, &DeviceIdentity::new(1, 2)).is_err());
    }

    // ==================== Session Tests ====================

    #[test]
    fn test_session_delivers_reports_to_callback() {
        let entry = pad(1, 2, "a");
        let backend = MockBackend::new(vec![entry.clone()]);
        backend.reader.push_report(&[1, 2, 3]);
        backend.reader.push_report(&[4, 5]);

        let (tx, rx) = mpsc::channel();
        let mut session = DeviceSession::open(&backend, &entry, move |event| {
            if let ReportEvent::Report(bytes) = event {
                let _ = tx.send(bytes.to_vec());
            }
        })
        .unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), vec![1, 2, 3]);
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), vec![4, 5]);

        session.close();
        assert!(backend.reader.is_closed());
    }

    #[test]
    fn test_session_reports_removal() {
        let entry = pad(1, 2, "a");
        let backend = MockBackend::new(vec![entry.clone()]);

        let (tx, rx) = mpsc::channel();
        let _session = DeviceSession::open(&backend, &entry, move |event| {
            if event == ReportEvent::Removed {
                let _ = tx.send(());
            }
        })
        .unwrap();

        backend.reader.unplug();
        assert!(rx.recv_timeout(Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_session_close_is_idempotent() {
        let entry = pad(1, 2, "a");
        let backend = MockBackend::new(vec![entry.clone()]);

        let mut session = DeviceSession::open(&backend, &entry, |_| {}).unwrap();
        session.close();
        session.close();
        assert!(backend.reader.is_closed());
    }

    #[test]
    fn test_session_close_failure_is_swallowed() {
        let entry = pad(1, 2, "a");
        let backend = MockBackend::new(vec![entry.clone()]);
        backend.reader.close_error.store(true, Ordering::Release);

        let mut session = DeviceSession::open(&backend, &entry, |_| {}).unwrap();
        session.close();
        assert!(backend.reader.is_closed());
    }

    #[test]
    fn test_session_open_failure() {
        let entry = pad(1, 2, "a");
        let backend = MockBackend::new(vec![entry.clone()]);
        backend.open_error.store(true, Ordering::Release);

        let result = DeviceSession::open(&backend, &entry, |_| {});
        match result {
            Err(BridgeError::Hid(msg)) => assert!(msg.contains("a")),
            other => panic!("Expected Hid error, got: {:?}", other),
        }
    }

    // Integration test - only runs with real hardware
    #[test]
    #[ignore]
    fn test_enumerate_with_real_hardware() {
        let backend = HidApiBackend::new().expect("HID API unavailable");
        let devices = backend.enumerate().unwrap();
        for device in &devices {
            println!(
                "0x{:04X}:0x{:04X} {} {:?}",
                device.vendor_id, device.product_id, device.path, device.display_name
            );
        }
    }
}
