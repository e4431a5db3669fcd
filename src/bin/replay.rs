use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use pothole_detector::pipeline::replay_messages;
use pothole_detector::recording::Recording;
use pothole_detector::{DetectionEngine, DetectorConfig, DeviceInfo, MemorySink, StartRequest};
use serde_json::json;

#[derive(Parser, Debug)]
struct Args {
    /// Path to a recording_*.json[.gz] log
    #[arg(long, conflicts_with = "golden_dir")]
    log: Option<PathBuf>,

    /// Directory of logs to batch replay (processes *.json and *.json.gz)
    #[arg(long)]
    golden_dir: Option<PathBuf>,

    /// JSON detector configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the debounce cooldown (ms)
    #[arg(long)]
    cooldown_ms: Option<i64>,

    /// Override the base threshold (m/s²)
    #[arg(long)]
    base_threshold: Option<f64>,

    /// Override the speed scale (0 = fixed threshold)
    #[arg(long)]
    speed_scale: Option<f64>,

    /// Disable local-extrema extraction
    #[arg(long, default_value_t = false)]
    peak_only: bool,

    /// Accept crossings recorded before the first GPS fix
    #[arg(long, default_value_t = false)]
    ignore_location: bool,

    /// Include every detection record in the output
    #[arg(long, default_value_t = false)]
    events: bool,
}

fn build_config(args: &Args) -> anyhow::Result<DetectorConfig> {
    let mut config = match &args.config {
        Some(path) => DetectorConfig::from_json_file(path)?,
        None => DetectorConfig::default(),
    };
    if let Some(cooldown) = args.cooldown_ms {
        config.cooldown_ms = cooldown;
    }
    if let Some(base) = args.base_threshold {
        config.threshold.base = base;
    }
    if let Some(scale) = args.speed_scale {
        config.threshold.speed_scale = scale;
    }
    if args.peak_only {
        config.feature_extraction = false;
    }
    if args.ignore_location {
        config.require_location = false;
    }
    config.validate()?;
    Ok(config)
}

fn run_once(path: &Path, config: &DetectorConfig, include_events: bool) -> anyhow::Result<serde_json::Value> {
    let recording = Recording::load(path).with_context(|| format!("loading {}", path.display()))?;
    let messages = recording.to_messages();

    let mut engine = DetectionEngine::new(config.clone(), DeviceInfo::new("replay", "replay"), MemorySink::new())?;
    let session = engine.start(&StartRequest::new("replay", true))?;
    let (stats, events) = replay_messages(&mut engine, messages);
    engine.stop();

    let peaks: Vec<f64> = events.iter().filter_map(|e| e.zt_peak).collect();
    let max_peak = peaks.iter().fold(0.0_f64, |m, p| m.max(p.abs()));

    let mut summary = json!({
        "log": path.display().to_string(),
        "session_id": session.session_id.to_string(),
        "readings": recording.readings.len(),
        "recorded_detections": recording.detections.len(),
        "stats": stats,
        "max_abs_peak": max_peak,
    });
    if include_events {
        summary["events"] = serde_json::to_value(&events)?;
    }
    Ok(summary)
}

fn collect_logs(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut logs: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            let name = p.file_name().and_then(|n| n.to_str()).unwrap_or("");
            name.ends_with(".json") || name.ends_with(".json.gz")
        })
        .collect();
    logs.sort();
    Ok(logs)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    let config = build_config(&args)?;

    let logs = match (&args.log, &args.golden_dir) {
        (Some(log), _) => vec![log.clone()],
        (None, Some(dir)) => collect_logs(dir)?,
        (None, None) => bail!("pass --log <file> or --golden-dir <dir>"),
    };

    let mut results = Vec::with_capacity(logs.len());
    for path in &logs {
        match run_once(path, &config, args.events) {
            Ok(summary) => results.push(summary),
            Err(e) => {
                log::error!("{}: {:#}", path.display(), e);
                results.push(json!({ "log": path.display().to_string(), "error": format!("{:#}", e) }));
            }
        }
    }

    let output = if results.len() == 1 {
        results.remove(0)
    } else {
        json!({ "config": config, "results": results })
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
