//! Fixed-period emission loop
//!
//! Runs on its own thread. Each tick snapshots the shared input, applies the
//! stick override, encodes for the bound output model and submits the
//! report to the virtual pad.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::BridgeStatus;
use crate::controller::device::DeviceSession;
use crate::controller::state::SharedInput;
use crate::report::encoder::{EncodeFn, OutputModel};
use crate::virtual_pad::VirtualPad;

/// Hardware handles owned by a running bridge.
///
/// Dropping this drives the pad to the neutral report, then closes the
/// device, then releases the pad, on every exit path including panics.
pub(crate) struct Outputs {
    pub pad: Box<dyn VirtualPad>,
    pub session: DeviceSession,
    pub model: OutputModel,
}

impl Drop for Outputs {
    fn drop(&mut self) {
        if let Err(e) = self.pad.submit(&self.model.neutral_report()) {
            warn!("Failed to submit neutral report during teardown: {}", e);
        }
        self.session.close();
        debug!("Virtual pad released");
    }
}

pub(crate) struct EmissionLoop {
    pub shared: Arc<SharedInput>,
    pub encode: EncodeFn,
    pub period: Duration,
    pub stop: Arc<AtomicBool>,
    pub status: Arc<watch::Sender<BridgeStatus>>,
    pub outputs: Outputs,
}

impl EmissionLoop {
    /// Run until the stop flag is raised or the pad fails
    pub fn run(mut self) {
        let mut ticks: u64 = 0;
        let mut connected = true;

        while !self.stop.load(Ordering::Acquire) {
            let started = Instant::now();

            let snapshot = self.shared.snapshot();
            if connected && !snapshot.connected {
                info!("Controller removed, right stick override cleared");
            }
            connected = snapshot.connected;

            let report = (self.encode)(&snapshot.effective());
            if let Err(e) = self.outputs.pad.submit(&report) {
                error!("Emission loop fault after {} ticks: {}", ticks, e);
                self.status.send_replace(BridgeStatus::Faulted {
                    reason: e.to_string(),
                    at: Utc::now(),
                });
                break;
            }
            ticks += 1;

            if let Some(remaining) = self.period.checked_sub(started.elapsed()) {
                thread::sleep(remaining);
            }
        }

        debug!("Emission loop exiting after {} ticks", ticks);
    }
}
