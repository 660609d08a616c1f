//! Downstream consumers of acquired samples
//!
//! The worker calls [`SampleSink::publish`] once per sample, in acquisition
//! order, on its own thread. A sink may block; the worker does not read the
//! sensor again until `publish` returns.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;

use log::{debug, info, trace, warn};

use crate::common::TimeKeeper;
use crate::error::{AcquisitionError, Result};
use crate::sample::{Sample, TimestampedSample};
use crate::status::{BusStatus, BUS_OK};

/// Consumer of acquired samples
pub trait SampleSink {
    fn publish(&mut self, sample: Sample);

    /// Publish a sample stamped by the worker; the default drops the stamp
    fn publish_timestamped(&mut self, sample: TimestampedSample) {
        self.publish(sample.sample);
    }
}

impl<F: FnMut(Sample)> SampleSink for F {
    fn publish(&mut self, sample: Sample) {
        self(sample)
    }
}

/// Radio link that can push a characteristic value to a connected peer
pub trait NotifyTransport {
    /// Send `payload` as one notification; returns the stack's raw status
    fn notify(&mut self, payload: &[u8]) -> BusStatus;
}

impl<F: FnMut(&[u8]) -> BusStatus> NotifyTransport for F {
    fn notify(&mut self, payload: &[u8]) -> BusStatus {
        self(payload)
    }
}

#[derive(Debug, Default)]
struct LinkState {
    connected: AtomicBool,
    notifications_enabled: AtomicBool,
}

/// Connection lifecycle handle, driven by the radio stack's callbacks
#[derive(Debug, Clone)]
pub struct LinkHandle {
    state: Arc<LinkState>,
}

impl LinkHandle {
    /// A peer connected
    pub fn connected(&self) {
        self.state.connected.store(true, Ordering::Release);
        info!("Connected");
    }

    /// The peer disconnected; notifications stay off until re-enabled
    pub fn disconnected(&self, reason: u8) {
        self.state.connected.store(false, Ordering::Release);
        self.state
            .notifications_enabled
            .store(false, Ordering::Release);
        info!("Disconnected (reason {})", reason);
    }

    /// The peer wrote the characteristic's client configuration descriptor
    pub fn set_notifications_enabled(&self, enabled: bool) {
        self.state
            .notifications_enabled
            .store(enabled, Ordering::Release);
        info!(
            "Notifications {}",
            if enabled { "enabled" } else { "disabled" }
        );
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }

    pub fn notifications_enabled(&self) -> bool {
        self.state.notifications_enabled.load(Ordering::Acquire)
    }
}

/// Per-sink notification counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifyStats {
    pub sent: u64,
    /// Samples published with no subscribed peer
    pub skipped: u64,
    /// Notifications the transport rejected
    pub failed: u64,
}

/// Sends each sample as a 6-byte notification (x, y, z little-endian)
pub struct NotificationSink<T: NotifyTransport> {
    transport: T,
    link: LinkHandle,
    stats: NotifyStats,
}

impl<T: NotifyTransport> NotificationSink<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            link: LinkHandle {
                state: Arc::new(LinkState::default()),
            },
            stats: NotifyStats::default(),
        }
    }

    /// Handle for the radio stack's connection callbacks
    pub fn link(&self) -> LinkHandle {
        self.link.clone()
    }

    pub fn stats(&self) -> NotifyStats {
        self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: NotifyTransport> SampleSink for NotificationSink<T> {
    fn publish(&mut self, sample: Sample) {
        if !self.link.is_connected() || !self.link.notifications_enabled() {
            self.stats.skipped += 1;
            trace!("No subscriber, sample dropped");
            return;
        }

        let status = self.transport.notify(&sample.to_le_bytes());
        if status != BUS_OK {
            self.stats.failed += 1;
            warn!("Notify failed (err {})", status);
            return;
        }
        self.stats.sent += 1;
    }
}

/// Non-blocking hand-off to another thread through a bounded queue
///
/// When the queue is full the newest sample is dropped and counted; the
/// worker never waits on the consumer.
pub struct QueueSink {
    tx: SyncSender<TimestampedSample>,
    dropped: Arc<AtomicU64>,
    clock: TimeKeeper,
}

/// Consumer end of a [`QueueSink`]
pub struct QueueReceiver {
    rx: Receiver<TimestampedSample>,
    dropped: Arc<AtomicU64>,
}

impl QueueSink {
    /// Create a queue holding at most `capacity` samples
    pub fn bounded(capacity: usize) -> Result<(QueueSink, QueueReceiver)> {
        if capacity == 0 {
            return Err(AcquisitionError::InvalidParameter(
                "Queue capacity must be at least 1".to_string(),
            ));
        }

        let (tx, rx) = mpsc::sync_channel(capacity);
        let dropped = Arc::new(AtomicU64::new(0));
        Ok((
            QueueSink {
                tx,
                dropped: dropped.clone(),
                clock: TimeKeeper::new(),
            },
            QueueReceiver { rx, dropped },
        ))
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl SampleSink for QueueSink {
    /// Samples published without a worker stamp use the queue's own clock
    fn publish(&mut self, sample: Sample) {
        self.publish_timestamped(TimestampedSample {
            timestamp: self.clock.elapsed_secs(),
            sample,
        });
    }

    fn publish_timestamped(&mut self, sample: TimestampedSample) {
        match self.tx.try_send(sample) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                debug!("Sample queue full, {} dropped so far", dropped);
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl QueueReceiver {
    /// Block until a sample arrives; `None` once the sink is gone
    pub fn recv(&self) -> Option<TimestampedSample> {
        self.rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Option<TimestampedSample> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Everything queued right now
    pub fn drain(&self) -> Vec<TimestampedSample> {
        self.rx.try_iter().collect()
    }

    /// Samples the producer dropped because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Samples per classifier window
pub const WINDOW_SAMPLES: usize = 25;

/// Values per classifier window (three axes)
pub const WINDOW_VALUES: usize = WINDOW_SAMPLES * 3;

/// Receives complete feature windows
pub trait WindowConsumer {
    /// `window` is axis-major: 25 X values, then 25 Y, then 25 Z
    fn consume(&mut self, window: &[f32; WINDOW_VALUES]);
}

impl<F: FnMut(&[f32; WINDOW_VALUES])> WindowConsumer for F {
    fn consume(&mut self, window: &[f32; WINDOW_VALUES]) {
        self(window)
    }
}

/// Groups samples into classifier input windows
pub struct FeatureWindowSink<C: WindowConsumer> {
    consumer: C,
    pending: VecDeque<Sample>,
    stride: usize,
    windows: u64,
}

impl<C: WindowConsumer> FeatureWindowSink<C> {
    /// Back-to-back windows, each sample used once
    pub fn new(consumer: C) -> Self {
        Self {
            consumer,
            pending: VecDeque::with_capacity(WINDOW_SAMPLES),
            stride: WINDOW_SAMPLES,
            windows: 0,
        }
    }

    /// Overlapping windows that advance by `stride` samples
    pub fn with_stride(consumer: C, stride: usize) -> Result<Self> {
        if stride == 0 || stride > WINDOW_SAMPLES {
            return Err(AcquisitionError::InvalidParameter(format!(
                "Window stride must be between 1-{}, got {}",
                WINDOW_SAMPLES, stride
            )));
        }
        let mut sink = Self::new(consumer);
        sink.stride = stride;
        Ok(sink)
    }

    /// Windows emitted so far
    pub fn windows(&self) -> u64 {
        self.windows
    }

    /// Samples waiting for the next window
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn consumer(&self) -> &C {
        &self.consumer
    }
}

impl<C: WindowConsumer> SampleSink for FeatureWindowSink<C> {
    fn publish(&mut self, sample: Sample) {
        self.pending.push_back(sample);
        if self.pending.len() < WINDOW_SAMPLES {
            return;
        }

        let mut window = [0f32; WINDOW_VALUES];
        for (i, s) in self.pending.iter().enumerate() {
            window[i] = s.x as f32;
            window[WINDOW_SAMPLES + i] = s.y as f32;
            window[2 * WINDOW_SAMPLES + i] = s.z as f32;
        }
        self.consumer.consume(&window);
        self.windows += 1;

        self.pending.drain(..self.stride);
    }
}
