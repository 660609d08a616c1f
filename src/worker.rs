//! Acquisition worker
//!
//! The worker is the only thread that touches the bus. Each wakeup runs one
//! acquisition cycle inside a power bracket:
//!
//! 1. block on the interrupt signal
//! 2. resume the bus domain
//! 3. read one sample, or drain the FIFO until it is below the watermark
//!    (if the drain budget runs out first, the worker re-arms its own signal
//!    since the held interrupt line produces no new edge)
//! 4. publish every sample in acquisition order
//! 5. suspend the bus domain
//!
//! Bus errors end the cycle; they are logged and counted, and the worker
//! goes back to waiting. Nothing is retried.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error, info, trace, warn};

use crate::common::TimeKeeper;
use crate::config::WorkerConfig;
use crate::driver::SensorDriver;
use crate::error::{AcquisitionError, Result};
use crate::event::{SignalGiver, SignalTaker, WaitOutcome};
use crate::fifo::FifoBuffer;
use crate::power::{PowerBracket, PowerDomain};
use crate::profile::DeviceConfig;
use crate::sample::{Sample, TimestampedSample};
use crate::sink::SampleSink;

/// Counters reported by the worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Signals taken
    pub wakeups: u64,
    pub samples_published: u64,
    /// Non-empty FIFO drains
    pub batches: u64,
    /// Cycles that ended in an error
    pub failed_cycles: u64,
}

/// How a cycle gets its samples
enum Acquisition {
    Single,
    Fifo {
        buffer: FifoBuffer,
        watermark_bytes: usize,
    },
}

impl Acquisition {
    fn for_profile(profile: &DeviceConfig) -> Self {
        match *profile {
            DeviceConfig::FifoWatermark {
                sample_capacity, ..
            } => Acquisition::Fifo {
                buffer: FifoBuffer::new(sample_capacity as usize),
                watermark_bytes: profile.watermark_bytes().unwrap_or(0),
            },
            _ => Acquisition::Single,
        }
    }
}

/// Stops a running worker
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    requested: Arc<AtomicBool>,
    giver: SignalGiver,
}

impl ShutdownHandle {
    /// Ask the worker to exit and wake it if it is waiting
    pub fn shutdown(&self) {
        self.requested.store(true, Ordering::Release);
        self.giver.give();
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

/// Blocking consumer of interrupt events
pub struct AcquisitionWorker<D, P, S>
where
    D: SensorDriver,
    P: PowerDomain,
    S: SampleSink,
{
    driver: D,
    power: PowerBracket<P>,
    sink: S,
    signal: SignalTaker,
    acquisition: Acquisition,
    config: WorkerConfig,
    shutdown: Arc<AtomicBool>,
    clock: TimeKeeper,
    stats: WorkerStats,
}

impl<D, P, S> AcquisitionWorker<D, P, S>
where
    D: SensorDriver,
    P: PowerDomain,
    S: SampleSink,
{
    /// Create a worker for a sensor already configured with `profile`
    pub fn new(
        driver: D,
        power: PowerBracket<P>,
        sink: S,
        signal: SignalTaker,
        profile: &DeviceConfig,
        config: WorkerConfig,
    ) -> Self {
        Self {
            driver,
            power,
            sink,
            signal,
            acquisition: Acquisition::for_profile(profile),
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
            clock: TimeKeeper::new(),
            stats: WorkerStats::default(),
        }
    }

    /// Handle that stops this worker; `giver` must feed this worker's signal
    pub fn shutdown_handle(&self, giver: &SignalGiver) -> ShutdownHandle {
        ShutdownHandle {
            requested: self.shutdown.clone(),
            giver: giver.clone(),
        }
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn power(&self) -> &PowerBracket<P> {
        &self.power
    }

    fn wait(&self) -> WaitOutcome {
        match self.config.idle_timeout {
            Some(timeout) => self.signal.take_timeout(timeout),
            None => self.signal.take(),
        }
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Run until shut down or until every signal giver is dropped
    pub fn run(mut self) -> WorkerStats {
        info!("Acquisition worker started");

        loop {
            if self.shutdown_requested() {
                break;
            }

            match self.wait() {
                WaitOutcome::Signaled => {
                    if self.shutdown_requested() {
                        break;
                    }
                    self.stats.wakeups += 1;
                    self.service_event();
                }
                WaitOutcome::TimedOut => continue,
                WaitOutcome::Closed => {
                    debug!("Interrupt signal closed");
                    break;
                }
            }
        }

        info!(
            "Acquisition worker stopped: {} wakeups, {} samples, {} failed cycles",
            self.stats.wakeups, self.stats.samples_published, self.stats.failed_cycles
        );
        self.stats
    }

    /// Run one acquisition cycle; returns the number of samples published
    pub fn service_event(&mut self) -> usize {
        let Self {
            driver,
            power,
            sink,
            signal,
            acquisition,
            config,
            clock,
            stats,
            ..
        } = self;

        let mut published = 0usize;
        let mut publish = |sample: Sample, stats: &mut WorkerStats| {
            trace!("x={}, y={}, z={}", sample.x, sample.y, sample.z);
            sink.publish_timestamped(TimestampedSample {
                timestamp: clock.elapsed_secs(),
                sample,
            });
            stats.samples_published += 1;
            published += 1;
        };

        let outcome = power.with_bus_active(|| -> Result<()> {
            match acquisition {
                Acquisition::Single => {
                    let sample = driver.read_sample()?;
                    publish(sample, stats);
                    Ok(())
                }
                Acquisition::Fifo {
                    buffer,
                    watermark_bytes,
                } => {
                    let max_passes = config.max_drain_passes;
                    for pass in 1..=max_passes {
                        let samples = match driver.drain_fifo(buffer) {
                            Ok(samples) => samples,
                            Err(e) => {
                                // A partial drain leaves the FIFO mid-frame
                                if let Err(flush) = driver.flush_fifo() {
                                    warn!("FIFO flush after failed drain failed: {}", flush);
                                }
                                return Err(e);
                            }
                        };

                        if !samples.is_empty() {
                            stats.batches += 1;
                        }
                        for sample in samples {
                            publish(sample, stats);
                        }

                        let remaining = driver.fifo_length()?;
                        if remaining < *watermark_bytes {
                            break;
                        }
                        if pass == max_passes {
                            warn!(
                                "FIFO still holds {} bytes after {} drains, re-arming",
                                remaining, max_passes
                            );
                            signal.rearm();
                        }
                    }
                    Ok(())
                }
            }
        });

        if let Err(e) = outcome.and_then(|cycle| cycle) {
            stats.failed_cycles += 1;
            log_cycle_error(&e);
        }

        published
    }

    /// Run the worker on its own thread
    pub fn spawn(self, giver: &SignalGiver) -> Result<WorkerHandle>
    where
        D: Send + 'static,
        P: Send + 'static,
        S: Send + 'static,
    {
        let shutdown = self.shutdown_handle(giver);
        let handle = thread::Builder::new()
            .name(self.config.thread_name.clone())
            .stack_size(self.config.stack_size)
            .spawn(move || self.run())
            .map_err(|e| AcquisitionError::Spawn(e.to_string()))?;

        Ok(WorkerHandle { handle, shutdown })
    }
}

fn log_cycle_error(e: &AcquisitionError) {
    if e.is_transient() {
        error!("Acquisition cycle failed, data dropped: {}", e);
    } else {
        error!("Acquisition cycle failed with unexpected error: {}", e);
    }
}

/// Running worker thread
pub struct WorkerHandle {
    handle: JoinHandle<WorkerStats>,
    shutdown: ShutdownHandle,
}

impl WorkerHandle {
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Request shutdown and wait for the thread to exit
    pub fn stop(self) -> thread::Result<WorkerStats> {
        self.shutdown.shutdown();
        self.handle.join()
    }

    /// Wait for the thread to exit on its own
    pub fn join(self) -> thread::Result<WorkerStats> {
        self.handle.join()
    }
}
