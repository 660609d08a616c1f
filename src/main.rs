//! Acquisition pipeline demo on the simulated BMA400
//!
//! Runs the full pipeline (interrupt edge, worker, power bracket, notifier)
//! against the simulated sensor and logs every notification payload. Log
//! verbosity comes from `RUST_LOG`.
//!
//! ```text
//! cargo run --features demo -- --profile fifo --duration 10
//! ```

use std::f32::consts::TAU;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bma400_acquisition::fifo::FRAME_LEN;
use bma400_acquisition::mock::SimulatedBma400;
use bma400_acquisition::profile::DEFAULT_FIFO_SAMPLES;
use bma400_acquisition::status::BUS_OK;
use bma400_acquisition::{
    BusStatus, DeviceConfig, NotificationSink, PipelineConfig, Sample, SensorController,
};
use clap::Parser;
use log::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "accel-pipeline")]
#[command(about = "Run the BMA400 acquisition pipeline on a simulated sensor", long_about = None)]
struct Args {
    /// Acquisition profile: drdy, fifo or activity
    #[arg(short, long, default_value = "drdy")]
    profile: String,

    /// FIFO watermark in samples (fifo profile only)
    #[arg(short, long, default_value_t = DEFAULT_FIFO_SAMPLES)]
    watermark: u16,

    /// Simulated output data rate in Hz
    #[arg(short, long, default_value = "25")]
    rate: u32,

    /// Run time in seconds (default: until Ctrl+C)
    #[arg(short, long)]
    duration: Option<u64>,
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {:<5} {}] {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

fn parse_profile(args: &Args) -> Result<DeviceConfig, String> {
    match args.profile.as_str() {
        "drdy" => Ok(DeviceConfig::LowPowerDrdy),
        "fifo" => Ok(DeviceConfig::fifo_watermark(args.watermark)),
        "activity" => Ok(DeviceConfig::activity()),
        other => Err(format!(
            "Invalid profile '{}'. Use 'drdy', 'fifo' or 'activity'",
            other
        )),
    }
}

/// Slow wobble around 1 g on Z, in raw counts at +/-4 g
fn synthetic_sample(tick: u32, rate: u32) -> Sample {
    let phase = tick as f32 / rate as f32 * TAU * 0.5;
    Sample::new(
        (phase.sin() * 128.0) as i16,
        (phase.cos() * 64.0) as i16,
        512 + (phase.sin() * 32.0) as i16,
    )
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let args = Args::parse();

    if args.rate == 0 || args.rate > 1000 {
        return Err("Rate must be between 1-1000 Hz".into());
    }
    let rate = args.rate;
    let profile = parse_profile(&args)?;
    info!("BMA400 acquisition demo, {} profile", profile.name());

    let sim = SimulatedBma400::new();
    let notifier = NotificationSink::new(|payload: &[u8]| -> BusStatus {
        info!("notify {:02X?}", payload);
        BUS_OK
    });
    let link = notifier.link();

    let controller = SensorController::new(
        PipelineConfig::with_profile(profile),
        sim.spi(),
        sim.power(),
        sim.pin(),
    )?;
    let pipeline = controller.start(notifier)?;

    // A peer connects and subscribes right away
    link.connected();
    link.set_notifications_enabled(true);

    // Setup Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    let shutdown = pipeline.shutdown_handle();
    ctrlc::set_handler(move || {
        println!("\nReceived Ctrl+C, stopping acquisition...");
        r.store(false, Ordering::SeqCst);
        shutdown.shutdown();
    })?;

    match args.duration {
        Some(secs) => println!("Running for {} seconds (Ctrl+C to stop early)\n", secs),
        None => println!("Press Ctrl+C to stop\n"),
    }

    let generator_sim = sim.clone();
    let generator_running = running.clone();
    let generator = thread::Builder::new()
        .name("edge-generator".to_string())
        .spawn(move || {
            let period = Duration::from_micros(1_000_000 / rate as u64);
            let mut tick = 0u32;
            while generator_running.load(Ordering::SeqCst) {
                let sample = synthetic_sample(tick, rate);
                match profile {
                    DeviceConfig::FifoWatermark {
                        watermark_level, ..
                    } => {
                        generator_sim.push_fifo_samples(&[sample]);
                        if generator_sim.fifo_len() >= watermark_level as usize * FRAME_LEN {
                            generator_sim.fire_edge();
                        }
                    }
                    DeviceConfig::ActivityThreshold { .. } => {
                        generator_sim.set_data(sample);
                        // Motion bursts every few seconds
                        if tick % (rate * 3) < 5 {
                            generator_sim.fire_edge();
                        }
                    }
                    DeviceConfig::LowPowerDrdy => {
                        generator_sim.set_data(sample);
                        generator_sim.fire_edge();
                    }
                }
                tick = tick.wrapping_add(1);
                thread::sleep(period);
            }
        })?;

    let deadline = args
        .duration
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    while running.load(Ordering::SeqCst) && pipeline.is_running() {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        thread::sleep(Duration::from_millis(50));
    }
    running.store(false, Ordering::SeqCst);

    if generator.join().is_err() {
        warn!("Edge generator panicked");
    }
    match pipeline.stop() {
        Ok(stats) => {
            println!("\nAcquisition stopped");
            println!("Wakeups: {}", stats.wakeups);
            println!("Samples published: {}", stats.samples_published);
            println!("FIFO batches: {}", stats.batches);
            println!("Failed cycles: {}", stats.failed_cycles);
            println!("Interrupt edges: {}", sim.edges_fired());
        }
        Err(_) => warn!("Acquisition worker panicked"),
    }

    Ok(())
}
