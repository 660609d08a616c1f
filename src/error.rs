//! Error types for the acquisition pipeline

use thiserror::Error;

use crate::status::{status_to_string, BusStatus, BUS_OK};

/// Error type for acquisition operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionError {
    /// Bus transfer returned a non-zero status
    #[error("Bus transfer error: {status} ({description})")]
    BusTransfer {
        status: BusStatus,
        description: String,
    },

    /// A profile-application call failed or the profile is invalid
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Device or GPIO capability failed its readiness check
    #[error("Device not ready: {0}")]
    DeviceNotReady(String),

    /// Invalid CHIP_ID response
    #[error("Invalid CHIP_ID response: expected 0x90, got 0x{0:02X}")]
    InvalidDeviceId(u8),

    /// Read request does not fit the receive buffer
    #[error("Invalid read length: requested {requested} bytes, maximum is {max}")]
    InvalidLength { requested: usize, max: usize },

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The worker thread could not be started
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(String),
}

impl From<BusStatus> for AcquisitionError {
    fn from(status: BusStatus) -> Self {
        if status == BUS_OK {
            panic!("Cannot convert BUS_OK to error");
        }
        AcquisitionError::BusTransfer {
            status,
            description: status_to_string(status).to_string(),
        }
    }
}

impl AcquisitionError {
    /// Whether the worker loop may absorb this error and keep running
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AcquisitionError::BusTransfer { .. } | AcquisitionError::InvalidLength { .. }
        )
    }
}

/// Result type for acquisition operations
pub type Result<T> = std::result::Result<T, AcquisitionError>;
