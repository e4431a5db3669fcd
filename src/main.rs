use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep_until, Duration, Instant};

use pothole_detector::live_status::LiveStatus;
use pothole_detector::pipeline::{dispatch, PipelineStats};
use pothole_detector::recording::Recording;
use pothole_detector::sensors::{self, DriveProfile, SensorMessage};
use pothole_detector::{
    DetectionEngine, DetectorConfig, DeviceInfo, JsonLinesSink, SampleOutcome, StartRequest,
};

#[derive(Parser, Debug)]
#[command(name = "pothole_detector")]
#[command(about = "Live pothole detection over a streaming accelerometer feed", long_about = None)]
struct Args {
    /// Duration in seconds (0 = until Ctrl-C)
    #[arg(value_name = "SECONDS", default_value = "0")]
    duration: u64,

    /// JSON detector configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the debounce cooldown (ms)
    #[arg(long)]
    cooldown_ms: Option<i64>,

    /// Override the base threshold (m/s²)
    #[arg(long)]
    base_threshold: Option<f64>,

    /// Identity stamped on every detection
    #[arg(long, default_value = "local-user")]
    user_id: String,

    #[arg(long, default_value = "unknown")]
    device_model: String,

    #[arg(long, default_value = "unknown")]
    device_manufacturer: String,

    /// Seconds between simulated potholes in the synthetic drive
    #[arg(long, default_value = "7.0")]
    pothole_every: f64,

    /// Output directory
    #[arg(long, default_value = "pothole_sessions")]
    output_dir: String,

    /// Readings per recording file before it is flushed and a new part started
    #[arg(long, default_value = "30000", value_parser = clap::value_parser!(u64).range(1..))]
    chunk_readings: u64,
}

fn load_config(args: &Args) -> Result<DetectorConfig> {
    let mut config = match &args.config {
        Some(path) => DetectorConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => DetectorConfig::default(),
    };
    if let Some(cooldown) = args.cooldown_ms {
        config.cooldown_ms = cooldown;
    }
    if let Some(base) = args.base_threshold {
        config.threshold.base = base;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = load_config(&args)?;

    info!("Pothole detector starting");
    info!("  Duration: {} seconds (0=continuous)", args.duration);
    info!(
        "  Threshold: {:.2} + {:.2} * (v - {:.1}), cooldown {} ms",
        config.threshold.base, config.threshold.speed_scale, config.threshold.speed_offset, config.cooldown_ms
    );
    info!("  Output Dir: {}", args.output_dir);

    std::fs::create_dir_all(&args.output_dir)?;
    let stamp = ts_now_clean();
    let sink = JsonLinesSink::create(format!("{}/detections_{}.jsonl", args.output_dir, stamp))?;

    let device = DeviceInfo::new(&args.device_model, &args.device_manufacturer);
    let mut engine = DetectionEngine::new(config, device, sink)?;
    let session = engine.start(&StartRequest::new(&args.user_id, true))?;
    info!("Session {}", session.session_id);

    let (tx, mut rx) = mpsc::channel::<SensorMessage>(500);
    let profile = DriveProfile {
        pothole_every_secs: args.pothole_every,
        ..DriveProfile::default()
    };
    let _sample_handle = tokio::spawn(sensors::sample_loop(tx.clone(), profile.clone()));
    let _location_handle = tokio::spawn(sensors::location_loop(tx.clone(), profile));
    drop(tx);

    let start = Instant::now();
    let deadline = async {
        if args.duration > 0 {
            sleep_until(start + Duration::from_secs(args.duration)).await
        } else {
            std::future::pending::<()>().await
        }
    };
    tokio::pin!(deadline);

    let mut stats = PipelineStats::default();
    let mut recording = Recording::default();
    let mut part = 0u32;
    let mut status_tick = interval(Duration::from_secs(2));
    let status_path = format!("{}/live_status.json", args.output_dir);

    loop {
        tokio::select! {
            message = rx.recv() => {
                let Some(message) = message else {
                    warn!("All sensor sources closed");
                    break;
                };
                recording.push_message(&message);
                if let Some(chunk) = recording.take_if_full(args.chunk_readings as usize) {
                    part += 1;
                    let path = PathBuf::from(format!("{}/recording_{}_part{:03}.json.gz", args.output_dir, stamp, part));
                    match chunk.save(&path) {
                        Ok(()) => info!("Flushed {} readings to {}", chunk.readings.len(), path.display()),
                        Err(e) => warn!("Failed to flush recording part {}: {}", part, e),
                    }
                }
                match dispatch(&mut engine, message) {
                    Some(outcome) => {
                        stats.record(&outcome);
                        if let SampleOutcome::Detected(emission) = outcome {
                            recording.detections.push(emission.event);
                        }
                    }
                    None => stats.locations += 1,
                }
            }
            _ = status_tick.tick() => {
                let live = LiveStatus::new(&engine.status(), engine.state().location.as_ref(), start.elapsed().as_secs())
                    .with_stats(&stats);
                if let Err(e) = live.save(&status_path) {
                    warn!("Failed to write live status: {}", e);
                }
            }
            _ = &mut deadline => {
                info!("Duration reached, stopping...");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping...");
                break;
            }
        }
    }

    engine.stop();

    let final_status = LiveStatus::new(&engine.status(), engine.state().location.as_ref(), start.elapsed().as_secs())
        .with_stats(&stats);
    if let Err(e) = final_status.save(&format!("{}/live_status_final.json", args.output_dir)) {
        warn!("Failed to write final status: {}", e);
    }

    let recording_path = PathBuf::from(format!("{}/recording_{}.json.gz", args.output_dir, stamp));
    recording.save(&recording_path)?;
    info!(
        "Final save: {} readings, {} detections to {}",
        recording.readings.len(),
        recording.detections.len(),
        recording_path.display()
    );

    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn ts_now_clean() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}
