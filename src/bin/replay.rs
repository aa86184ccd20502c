//! 記録済みの検出結果（JSON Lines）をパイプラインに流して結果を出力する
//!
//! 入力 1 行 = 1 フレーム: `{"timestamp": 0.033, "detections": [...]}`
//! `detections` が null の行、または `--detect-every` で間引かれたフレームは
//! 検出なし（予測）として扱う。

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use posewatch::pose::{DetectionRecord, RawDetection};
use posewatch::{Config, Pipeline};

#[derive(Parser, Debug)]
#[command(author, version = env!("POSEWATCH_BUILD_VERSION"), about = "Replay recorded pose detections through the tracking pipeline")]
struct Args {
    /// 入力ファイル（省略時は標準入力）
    input: Option<PathBuf>,

    /// 設定ファイル（TOML）。省略時は ./config.toml、無ければデフォルト
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// N フレームに 1 回だけ検出結果を使う（残りは予測）
    #[arg(long, default_value_t = 1)]
    detect_every: usize,

    /// デバッグログを出す
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Deserialize)]
struct FrameRecord {
    timestamp: f64,
    #[serde(default)]
    detections: Option<Vec<DetectionRecord>>,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "posewatch=debug" } else { "posewatch=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn to_detections(records: &[DetectionRecord], line: usize) -> Vec<RawDetection> {
    records
        .iter()
        .filter_map(|r| match RawDetection::try_from(r) {
            Ok(d) => Some(d),
            Err(e) => {
                warn!(line, "skipping detection: {}", e);
                None
            }
        })
        .collect()
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default("config.toml"),
    };
    let mut pipeline = Pipeline::new(config).context("invalid configuration")?;

    let reader: Box<dyn BufRead> = match &args.input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };
    let mut out = BufWriter::new(io::stdout().lock());
    let detect_every = args.detect_every.max(1);

    let mut frames = 0usize;
    let mut events = 0usize;
    for (i, line) in reader.lines().enumerate() {
        let line = line.context("failed to read input")?;
        if line.trim().is_empty() {
            continue;
        }
        let record: FrameRecord = serde_json::from_str(&line)
            .with_context(|| format!("line {}: malformed frame", i + 1))?;

        let output = match record.detections {
            Some(records) if frames % detect_every == 0 => {
                let detections = to_detections(&records, i + 1);
                pipeline.update(record.timestamp, &detections)
            }
            _ => pipeline.predict(record.timestamp),
        };
        if output.event.is_some() {
            events += 1;
        }

        serde_json::to_writer(&mut out, &output)?;
        out.write_all(b"\n")?;
        frames += 1;
    }
    out.flush()?;

    info!(frames, events, "replay finished");
    Ok(())
}
