//! Pipeline configuration

use std::time::Duration;

use crate::bma400::DEFAULT_BURST_LEN;
use crate::bus::{ReadPolicy, MAX_READ_LEN};
use crate::error::{AcquisitionError, Result};
use crate::profile::DeviceConfig;

/// Worker thread settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub thread_name: String,
    /// Stack size in bytes
    pub stack_size: usize,
    /// Upper bound on FIFO drains per wakeup
    pub max_drain_passes: usize,
    /// How long the worker waits for an edge before re-checking the
    /// shutdown flag; `None` blocks until signaled
    pub idle_timeout: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            thread_name: "bma400-acq".to_string(),
            stack_size: 64 * 1024,
            max_drain_passes: 4,
            idle_timeout: None,
        }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.thread_name.is_empty() {
            return Err(AcquisitionError::InvalidParameter(
                "Worker thread name must not be empty".to_string(),
            ));
        }
        if self.max_drain_passes == 0 {
            return Err(AcquisitionError::InvalidParameter(
                "Worker needs at least one FIFO drain pass".to_string(),
            ));
        }
        if self.idle_timeout == Some(Duration::ZERO) {
            return Err(AcquisitionError::InvalidParameter(
                "Idle timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Everything the controller needs to bring the pipeline up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub profile: DeviceConfig,
    pub read_policy: ReadPolicy,
    /// FIFO bytes per bus transaction
    pub burst_len: usize,
    pub worker: WorkerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            profile: DeviceConfig::default(),
            read_policy: ReadPolicy::default(),
            burst_len: DEFAULT_BURST_LEN,
            worker: WorkerConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_profile(profile: DeviceConfig) -> Self {
        Self {
            profile,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.profile.validate()?;
        if self.burst_len == 0 || self.burst_len > MAX_READ_LEN {
            return Err(AcquisitionError::InvalidParameter(format!(
                "FIFO burst length must be between 1-{} bytes, got {}",
                MAX_READ_LEN, self.burst_len
            )));
        }
        self.worker.validate()
    }
}
