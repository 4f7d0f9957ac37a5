//! Error types for the printer library

use thiserror::Error;

/// Printer error types
#[derive(Debug, Error)]
pub enum PrintError {
    /// Network connection error
    #[error("Connection failed: {0}")]
    Connection(String),

    /// IO error during printing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout waiting for printer
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Invalid printer configuration
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Direct USB (libusb) backend error
    #[error("USB device error: {0}")]
    UsbDevice(String),

    /// USB device-file backend error
    #[error("USB device file error: {0}")]
    UsbFile(String),
}

/// Result type for printer operations
pub type PrintResult<T> = Result<T, PrintError>;
