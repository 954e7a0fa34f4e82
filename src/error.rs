//! # Error Types
//!
//! Custom error types for Pad Bridge using `thiserror`.

use thiserror::Error;

/// Main error type for Pad Bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No attached device matched the requested identity
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// HID enumeration or open failures
    #[error("HID error: {0}")]
    Hid(String),

    /// Virtual controller creation or emission failures
    #[error("Virtual pad error: {0}")]
    VirtualPad(String),

    /// Configuration values that violate an invariant
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Configuration parse errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Pad Bridge
pub type Result<T> = std::result::Result<T, BridgeError>;
