//! Trait abstraction for virtual controller output to enable testing

use crate::error::Result;
use crate::report::encoder::{OutputModel, OutputReport};

/// A virtual controller accepting full output reports
pub trait VirtualPad: Send {
    /// Push one report to the virtual driver
    fn submit(&mut self, report: &OutputReport) -> Result<()>;
}

/// Creates virtual controllers for a capability model
pub trait PadFactory: Send + Sync {
    fn create(&self, model: OutputModel) -> Result<Box<dyn VirtualPad>>;
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use crate::error::BridgeError;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Mock virtual pad recording every submitted report
    #[derive(Clone)]
    pub struct MockPad {
        pub submitted: Arc<Mutex<Vec<OutputReport>>>,
        /// Fail every submit once this many reports have been accepted
        pub fail_after: Arc<Mutex<Option<usize>>>,
        pub dropped: Arc<AtomicBool>,
    }

    impl MockPad {
        pub fn new() -> Self {
            Self {
                submitted: Arc::new(Mutex::new(Vec::new())),
                fail_after: Arc::new(Mutex::new(None)),
                dropped: Arc::new(AtomicBool::new(false)),
            }
        }

        pub fn get_submitted(&self) -> Vec<OutputReport> {
            self.submitted.lock().clone()
        }

        pub fn last_submitted(&self) -> Option<OutputReport> {
            self.submitted.lock().last().copied()
        }

        pub fn set_fail_after(&self, count: usize) {
            *self.fail_after.lock() = Some(count);
        }

        pub fn is_dropped(&self) -> bool {
            self.dropped.load(Ordering::Acquire)
        }
    }

    impl VirtualPad for MockPad {
        fn submit(&mut self, report: &OutputReport) -> Result<()> {
            let mut submitted = self.submitted.lock();
            if let Some(limit) = *self.fail_after.lock() {
                if submitted.len() >= limit && !report.is_neutral() {
                    return Err(BridgeError::VirtualPad("Mock submit error".to_string()));
                }
            }
            submitted.push(*report);
            Ok(())
        }
    }

    impl Drop for MockPad {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::Release);
        }
    }

    /// Factory handing out clones of one shared [`MockPad`]
    pub struct MockPadFactory {
        pub pad: MockPad,
        pub created: Arc<Mutex<Vec<OutputModel>>>,
        pub create_error: AtomicBool,
    }

    impl MockPadFactory {
        pub fn new() -> Self {
            Self {
                pad: MockPad::new(),
                created: Arc::new(Mutex::new(Vec::new())),
                create_error: AtomicBool::new(false),
            }
        }
    }

    impl PadFactory for MockPadFactory {
        fn create(&self, model: OutputModel) -> Result<Box<dyn VirtualPad>> {
            if self.create_error.load(Ordering::Acquire) {
                return Err(BridgeError::VirtualPad("Mock create error".to_string()));
            }
            self.created.lock().push(model);
            Ok(Box::new(self.pad.clone()))
        }
    }
}
