//! End-to-end tests: controller, worker and sinks against the simulated sensor

use std::sync::mpsc;
use std::time::{Duration, Instant};

use crate::config::PipelineConfig;
use crate::controller::SensorController;
use crate::error::AcquisitionError;
use crate::mock::SimulatedBma400;
use crate::power::BusPowerState;
use crate::profile::{DeviceConfig, DEFAULT_FIFO_SAMPLES};
use crate::registers::*;
use crate::sample::Sample;
use crate::sink::{NotificationSink, QueueSink};
use crate::status::{BUS_OK, EIO};

const TIMEOUT: Duration = Duration::from_secs(2);

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

fn controller(
    sim: &SimulatedBma400,
    profile: DeviceConfig,
) -> SensorController<crate::mock::SimSpi, crate::mock::SimPower, crate::mock::SimPin> {
    SensorController::new(
        PipelineConfig::with_profile(profile),
        sim.spi(),
        sim.power(),
        sim.pin(),
    )
    .unwrap()
}

#[test]
fn test_startup_leaves_bus_suspended_and_pin_armed() {
    let sim = SimulatedBma400::new();
    let (sink, _rx) = QueueSink::bounded(8).unwrap();
    let pipeline = controller(&sim, DeviceConfig::LowPowerDrdy).start(sink).unwrap();

    assert!(sim.pin_armed());
    assert_eq!(sim.power_state(), BusPowerState::Suspended);
    assert_eq!(
        sim.power_history(),
        vec![BusPowerState::Active, BusPowerState::Suspended]
    );
    assert!(sim.routes_to_int1(INT_DRDY));
    assert!(pipeline.is_running());

    let stats = pipeline.stop().unwrap();
    assert_eq!(stats.wakeups, 0);
    assert_eq!(sim.transfers_while_suspended(), 0);
}

#[test]
fn test_low_power_edge_publishes_one_sample() {
    let sim = SimulatedBma400::new();
    let (sink, rx) = QueueSink::bounded(8).unwrap();
    let pipeline = controller(&sim, DeviceConfig::LowPowerDrdy).start(sink).unwrap();

    sim.set_data(Sample::new(12, -340, 511));
    assert!(sim.fire_edge());
    let first = rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(first.sample, Sample::new(12, -340, 511));

    sim.set_data(Sample::new(-1, 0, 1));
    sim.fire_edge();
    let second = rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(second.sample, Sample::new(-1, 0, 1));
    assert!(second.timestamp >= first.timestamp);

    let stats = pipeline.stop().unwrap();
    assert_eq!(stats.samples_published, 2);
    assert_eq!(stats.failed_cycles, 0);

    // Startup bracket plus one bracket per event
    assert!(wait_until(|| sim.power_history().len() == 6));
    assert_eq!(sim.power_state(), BusPowerState::Suspended);
    assert_eq!(sim.transfers_while_suspended(), 0);
}

#[test]
fn test_fifo_watermark_publishes_full_batch_in_order() {
    let sim = SimulatedBma400::new();
    let (sink, rx) = QueueSink::bounded(128).unwrap();
    let pipeline = controller(&sim, DeviceConfig::fifo_watermark(DEFAULT_FIFO_SAMPLES))
        .start(sink)
        .unwrap();
    assert!(sim.routes_to_int1(INT_FIFO_WM));
    assert_eq!(sim.register(REG_FIFO_CONFIG1), 0x2C);
    assert_eq!(sim.register(REG_FIFO_CONFIG2), 0x01);

    let frames: Vec<Sample> = (0..75)
        .map(|i| Sample::new((i - 37) * 16, i * 16, -i * 16))
        .collect();
    sim.push_fifo_samples(&frames);
    sim.fire_edge();

    let mut received = Vec::new();
    while received.len() < frames.len() {
        match rx.recv_timeout(TIMEOUT) {
            Some(t) => received.push(t.sample),
            None => break,
        }
    }
    assert_eq!(received, frames);

    let stats = pipeline.stop().unwrap();
    assert_eq!(stats.batches, 1);
    assert_eq!(stats.samples_published, 75);
    assert_eq!(sim.fifo_len(), 0);
}

#[test]
fn test_bus_failure_mid_drain_drops_batch_and_recovers() {
    let sim = SimulatedBma400::new();
    let (sink, rx) = QueueSink::bounded(128).unwrap();
    let pipeline = controller(&sim, DeviceConfig::fifo_watermark(DEFAULT_FIFO_SAMPLES))
        .start(sink)
        .unwrap();

    sim.push_fifo_samples(&vec![Sample::new(16, 16, 16); 75]);
    // FIFO_LENGTH read and two bursts succeed, the third burst fails
    sim.fail_transfer_after(3, EIO);
    sim.fire_edge();

    assert!(wait_until(|| sim.power_history().len() == 4));
    assert_eq!(sim.power_state(), BusPowerState::Suspended);
    assert!(rx.recv_timeout(Duration::from_millis(50)).is_none());
    assert_eq!(sim.fifo_len(), 0);

    let frames: Vec<Sample> = (0..75).map(|i| Sample::new(i * 16, 0, 0)).collect();
    sim.push_fifo_samples(&frames);
    sim.fire_edge();

    let mut received = Vec::new();
    while received.len() < frames.len() {
        match rx.recv_timeout(TIMEOUT) {
            Some(t) => received.push(t.sample),
            None => break,
        }
    }
    assert_eq!(received, frames);

    let stats = pipeline.stop().unwrap();
    assert_eq!(stats.wakeups, 2);
    assert_eq!(stats.failed_cycles, 1);
    assert_eq!(sim.transfers_while_suspended(), 0);
}

#[test]
fn test_edges_during_a_busy_cycle_coalesce_into_one_wakeup() {
    let sim = SimulatedBma400::new();
    let (published_tx, published_rx) = mpsc::channel();
    let (gate_tx, gate_rx) = mpsc::channel::<()>();

    let sink = move |sample: Sample| {
        let _ = published_tx.send(sample);
        let _ = gate_rx.recv();
    };
    let pipeline = controller(&sim, DeviceConfig::LowPowerDrdy).start(sink).unwrap();

    sim.fire_edge();
    // Worker is now parked inside the sink
    published_rx.recv_timeout(TIMEOUT).unwrap();

    for _ in 0..5 {
        assert!(sim.fire_edge());
    }
    gate_tx.send(()).unwrap();
    gate_tx.send(()).unwrap();

    published_rx.recv_timeout(TIMEOUT).unwrap();
    assert!(published_rx
        .recv_timeout(Duration::from_millis(50))
        .is_err());

    let stats = pipeline.stop().unwrap();
    assert_eq!(stats.wakeups, 2);
    assert_eq!(sim.edges_fired(), 6);
}

#[test]
fn test_activity_profile_reads_on_generic_interrupt() {
    let sim = SimulatedBma400::new();
    let (sink, rx) = QueueSink::bounded(8).unwrap();
    let pipeline = controller(&sim, DeviceConfig::activity()).start(sink).unwrap();

    assert!(sim.routes_to_int1(INT_GEN1));
    assert!(!sim.routes_to_int1(INT_DRDY));
    assert_eq!(sim.register(REG_GEN1INT_CONFIG2), 0x10);

    sim.set_data(Sample::new(900, 0, 0));
    sim.fire_edge();
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap().sample, Sample::new(900, 0, 0));
    pipeline.stop().unwrap();
}

#[test]
fn test_notifications_reach_a_subscribed_peer() {
    let sim = SimulatedBma400::new();
    let (payload_tx, payload_rx) = mpsc::channel::<Vec<u8>>();
    let sink = NotificationSink::new(move |payload: &[u8]| {
        let _ = payload_tx.send(payload.to_vec());
        BUS_OK
    });
    let link = sink.link();
    let pipeline = controller(&sim, DeviceConfig::LowPowerDrdy).start(sink).unwrap();

    sim.set_data(Sample::new(1, 2, 3));
    sim.fire_edge();
    assert!(wait_until(|| sim.power_history().len() == 4));
    assert!(payload_rx.try_recv().is_err());

    link.connected();
    link.set_notifications_enabled(true);
    sim.fire_edge();
    assert_eq!(
        payload_rx.recv_timeout(TIMEOUT).unwrap(),
        vec![1, 0, 2, 0, 3, 0]
    );
    pipeline.stop().unwrap();
}

#[test]
fn test_startup_fails_before_touching_the_sensor_when_bus_is_not_ready() {
    let sim = SimulatedBma400::new();
    sim.set_bus_ready(false);
    let result = controller(&sim, DeviceConfig::LowPowerDrdy).start(|_: Sample| {});

    assert!(matches!(result, Err(AcquisitionError::DeviceNotReady(_))));
    assert!(sim.transfers().is_empty());
    assert!(!sim.pin_armed());
}

#[test]
fn test_startup_fails_when_gpio_is_not_ready() {
    let sim = SimulatedBma400::new();
    sim.set_gpio_ready(false);
    let result = controller(&sim, DeviceConfig::LowPowerDrdy).start(|_: Sample| {});

    assert!(matches!(result, Err(AcquisitionError::DeviceNotReady(_))));
    assert!(sim.transfers().is_empty());
}

#[test]
fn test_silent_sensor_reports_device_not_ready() {
    let sim = SimulatedBma400::new();
    // The SPI wake-up read is the first transfer
    sim.fail_transfer_after(0, EIO);
    let result = controller(&sim, DeviceConfig::LowPowerDrdy).start(|_: Sample| {});

    assert!(matches!(result, Err(AcquisitionError::DeviceNotReady(_))));
    assert_eq!(sim.power_state(), BusPowerState::Suspended);
    assert_eq!(sim.register(REG_INT_CONFIG0), 0x00);
}

#[test]
fn test_wrong_chip_id_aborts_startup_with_bus_suspended() {
    let sim = SimulatedBma400::new();
    sim.set_chip_id(0x1E);
    let result = controller(&sim, DeviceConfig::LowPowerDrdy).start(|_: Sample| {});

    assert!(matches!(result, Err(AcquisitionError::InvalidDeviceId(0x1E))));
    assert_eq!(sim.power_state(), BusPowerState::Suspended);
    assert_eq!(sim.register(REG_INT_CONFIG0), 0x00);
}

#[test]
fn test_failed_profile_write_aborts_startup() {
    let sim = SimulatedBma400::new();
    // Identification reads and the soft reset pass; the first profile write fails
    sim.fail_transfer_after(4, EIO);
    let result = controller(&sim, DeviceConfig::LowPowerDrdy).start(|_: Sample| {});

    assert!(matches!(result, Err(AcquisitionError::Configuration(_))));
    assert_eq!(sim.power_state(), BusPowerState::Suspended);
}

#[test]
fn test_invalid_configuration_is_rejected_up_front() {
    let sim = SimulatedBma400::new();
    let result = SensorController::new(
        PipelineConfig::with_profile(DeviceConfig::fifo_watermark(300)),
        sim.spi(),
        sim.power(),
        sim.pin(),
    );
    assert!(matches!(result, Err(AcquisitionError::Configuration(_))));
}
