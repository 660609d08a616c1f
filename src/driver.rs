//! Sensor driver capability used by the controller and the worker

use crate::error::Result;
use crate::fifo::FifoBuffer;
use crate::profile::{DeviceConfig, InterruptChannel, InterruptKind, PowerMode};
use crate::sample::Sample;

/// Operations the acquisition pipeline needs from an accelerometer driver
///
/// Every method performs blocking bus transactions and must run in worker
/// or startup context with the bus powered.
pub trait SensorDriver {
    /// Soft-reset the sensor and verify its identity
    fn init(&mut self) -> Result<()>;

    /// Replace the active profile with `config`
    ///
    /// Clears every interrupt enable and route before writing the new
    /// profile and sets the power mode last.
    fn apply_config(&mut self, config: &DeviceConfig) -> Result<()>;

    /// Read the current sample from the data registers
    fn read_sample(&mut self) -> Result<Sample>;

    /// Drain the FIFO into `buffer` and decode it
    fn drain_fifo(&mut self, buffer: &mut FifoBuffer) -> Result<Vec<Sample>>;

    /// FIFO fill level in bytes
    fn fifo_length(&mut self) -> Result<usize>;

    /// Discard everything in the FIFO
    fn flush_fifo(&mut self) -> Result<()>;

    fn set_power_mode(&mut self, mode: PowerMode) -> Result<()>;

    /// Enable `kind` and route it to `channel`
    fn enable_interrupt(&mut self, channel: InterruptChannel, kind: InterruptKind) -> Result<()>;

    /// Disable every interrupt source and clear both channel maps
    fn disable_interrupts(&mut self) -> Result<()>;
}
