//! Startup sequencing
//!
//! [`SensorController::start`] brings the pipeline up in a fixed order and
//! aborts on the first failure, before any worker thread exists:
//!
//! 1. SPI device ready
//! 2. GPIO port ready
//! 3. interrupt pin as input with a rising-edge interrupt
//! 4. edge handler registered
//! 5. sensor reset and identified
//! 6. profile applied
//! 7. bus domain suspended
//! 8. worker spawned

use std::thread;

use log::{error, info};

use crate::bma400::Bma400;
use crate::bus::SpiBus;
use crate::config::PipelineConfig;
use crate::driver::SensorDriver;
use crate::error::{AcquisitionError, Result};
use crate::event::interrupt_signal;
use crate::gpio::{Edge, InterruptPin};
use crate::power::{PowerBracket, PowerDomain};
use crate::sink::SampleSink;
use crate::worker::{AcquisitionWorker, ShutdownHandle, WorkerHandle, WorkerStats};

/// Owns the sensor capabilities until the pipeline starts
pub struct SensorController<B, P, G>
where
    B: SpiBus,
    P: PowerDomain,
    G: InterruptPin,
{
    config: PipelineConfig,
    driver: Bma400<B>,
    power: PowerBracket<P>,
    pin: G,
}

impl<B, P, G> SensorController<B, P, G>
where
    B: SpiBus + Send + 'static,
    P: PowerDomain + Send + 'static,
    G: InterruptPin,
{
    /// Validate `config` and take ownership of the capabilities
    ///
    /// # Arguments
    /// * `config` - Profile, read policy and worker settings
    /// * `bus` - SPI device the sensor sits on
    /// * `power` - Power domain of the SPI controller, currently suspended
    /// * `pin` - GPIO wired to the sensor's INT1 output
    pub fn new(config: PipelineConfig, bus: B, power: P, pin: G) -> Result<Self> {
        config.validate()?;
        let driver = Bma400::new(bus, config.read_policy, config.burst_len)?;

        Ok(Self {
            config,
            driver,
            power: PowerBracket::new(power),
            pin,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Bring the pipeline up and hand samples to `sink`
    pub fn start<S>(mut self, sink: S) -> Result<RunningPipeline<G>>
    where
        S: SampleSink + Send + 'static,
    {
        if !self.driver.is_ready() {
            error!("Error: SPI device is not ready");
            return Err(AcquisitionError::DeviceNotReady(
                "SPI device is not ready".to_string(),
            ));
        }
        if !self.pin.is_ready() {
            error!("Error: GPIO port is not ready");
            return Err(AcquisitionError::DeviceNotReady(
                "GPIO port is not ready".to_string(),
            ));
        }

        self.pin.configure_input()?;
        self.pin.configure_interrupt(Edge::Rising)?;

        let (giver, taker) = interrupt_signal();
        let isr_giver = giver.clone();
        self.pin.register_callback(Box::new(move || {
            isr_giver.give();
        }))?;

        let profile = self.config.profile;
        let driver = &mut self.driver;
        self.power
            .with_bus_active(|| -> Result<()> {
                driver.init().map_err(init_error)?;
                driver.apply_config(&profile)
            })
            .and_then(|configured| configured)
            .map_err(|e| {
                error!("Sensor setup failed: {}", e);
                e
            })?;

        let worker = AcquisitionWorker::new(
            self.driver,
            self.power,
            sink,
            taker,
            &profile,
            self.config.worker.clone(),
        );
        let handle = worker.spawn(&giver)?;
        info!("Acquisition pipeline running with {} profile", profile.name());

        Ok(RunningPipeline {
            pin: self.pin,
            worker: handle,
        })
    }
}

// A sensor that does not answer during reset or identification is not ready
fn init_error(e: AcquisitionError) -> AcquisitionError {
    match e {
        AcquisitionError::InvalidDeviceId(_) | AcquisitionError::DeviceNotReady(_) => e,
        other => AcquisitionError::DeviceNotReady(format!("BMA400 did not respond: {}", other)),
    }
}

/// A started pipeline: the armed interrupt pin plus the worker thread
pub struct RunningPipeline<G: InterruptPin> {
    pin: G,
    worker: WorkerHandle,
}

impl<G: InterruptPin> RunningPipeline<G> {
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.worker.shutdown_handle()
    }

    pub fn pin(&self) -> &G {
        &self.pin
    }

    pub fn is_running(&self) -> bool {
        !self.worker.is_finished()
    }

    /// Stop the worker and return its final counters
    pub fn stop(self) -> thread::Result<WorkerStats> {
        self.worker.stop()
    }
}
