//! Interrupt-driven acquisition pipeline for the BMA400 accelerometer
//!
//! The sensor sits on an SPI bus whose controller lives in its own power
//! domain. An edge on the sensor's INT1 line only raises a signal; a worker
//! thread takes the signal, powers the bus, reads one sample or drains the
//! FIFO, forwards each sample to a sink and powers the bus down again.
//!
//! # Quick Start
//!
//! ## Single samples on data-ready
//! ```no_run
//! # #[cfg(feature = "mock")]
//! # fn main() -> bma400_acquisition::Result<()> {
//! use bma400_acquisition::mock::SimulatedBma400;
//! use bma400_acquisition::{PipelineConfig, Sample, SensorController};
//!
//! let sim = SimulatedBma400::new();
//! let controller =
//!     SensorController::new(PipelineConfig::default(), sim.spi(), sim.power(), sim.pin())?;
//!
//! let pipeline = controller.start(|sample: Sample| {
//!     println!("x={}, y={}, z={}", sample.x, sample.y, sample.z);
//! })?;
//!
//! sim.set_data(Sample::new(0, 0, 512));
//! sim.fire_edge();
//!
//! pipeline.stop().ok();
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "mock"))]
//! # fn main() {}
//! ```
//!
//! ## FIFO batches into classifier windows
//! ```no_run
//! # #[cfg(feature = "mock")]
//! # fn main() -> bma400_acquisition::Result<()> {
//! use bma400_acquisition::mock::SimulatedBma400;
//! use bma400_acquisition::{
//!     DeviceConfig, FeatureWindowSink, PipelineConfig, SensorController, WINDOW_VALUES,
//! };
//!
//! let sim = SimulatedBma400::new();
//! let config = PipelineConfig::with_profile(DeviceConfig::fifo_watermark(75));
//! let controller = SensorController::new(config, sim.spi(), sim.power(), sim.pin())?;
//!
//! let sink = FeatureWindowSink::new(|window: &[f32; WINDOW_VALUES]| {
//!     // 25 X values, then 25 Y, then 25 Z
//!     println!("window starts at x={}", window[0]);
//! });
//! let pipeline = controller.start(sink)?;
//! # pipeline.stop().ok();
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "mock"))]
//! # fn main() {}
//! ```

pub mod bma400;
pub mod bus;
pub mod common;
pub mod config;
pub mod controller;
pub mod driver;
pub mod error;
pub mod event;
pub mod fifo;
pub mod gpio;
pub mod power;
pub mod profile;
pub mod registers;
pub mod sample;
pub mod sink;
pub mod status;
pub mod worker;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(test)]
mod integration_tests;

// Re-export public API
pub use bma400::Bma400;
pub use bus::{ReadPolicy, RegisterBus, SpiBus};
pub use config::{PipelineConfig, WorkerConfig};
pub use controller::{RunningPipeline, SensorController};
pub use driver::SensorDriver;
pub use error::{AcquisitionError, Result};
pub use event::{interrupt_signal, SignalGiver, SignalTaker, WaitOutcome};
pub use fifo::FifoBuffer;
pub use gpio::{Edge, InterruptPin};
pub use power::{BusPowerState, PowerBracket, PowerDomain};
pub use profile::{DeviceConfig, Hysteresis, InterruptChannel, InterruptKind, PowerMode};
pub use sample::{Sample, TimestampedSample};
pub use sink::{
    FeatureWindowSink, LinkHandle, NotificationSink, NotifyTransport, QueueReceiver, QueueSink,
    SampleSink, WindowConsumer, WINDOW_VALUES,
};
pub use status::BusStatus;
pub use worker::{AcquisitionWorker, ShutdownHandle, WorkerHandle, WorkerStats};
