//! frame_processor - batch reconciliation over a JSON-lines frame stream
//!
//! This binary:
//! 1. Reads frame records (one JSON object per line) from a file or stdin
//! 2. Cuts the stream into fixed-size batches
//! 3. Reconciles each batch per camera, classifying every tenth frame
//! 4. Writes sampled images and labels to the output directory
//! 5. Optionally persists per-camera continuity markers between runs

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use video_stream_processor::ingest::{batches, read_frame_records};
use video_stream_processor::{
    build_classifier, init_codec, BatchProcessor, CameraMarkers, FilesystemStore, FrameReconciler,
    ImageCrateCodec, ProcessorConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON-lines file of frame records ("-" reads stdin).
    #[arg(long, default_value = "-")]
    input: String,
    /// Output directory prefix for images and labels (overrides config).
    #[arg(long)]
    output_dir: Option<String>,
    /// Records per batch (overrides config).
    #[arg(long)]
    batch_size: Option<usize>,
    /// JSON file holding per-camera continuity markers (overrides config).
    #[arg(long)]
    marker_state: Option<PathBuf>,
    /// Classifier backend: stub or tract (overrides config).
    #[arg(long)]
    classifier: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = ProcessorConfig::load()?;
    if let Some(dir) = args.output_dir {
        cfg.output_dir = dir;
    }
    if let Some(size) = args.batch_size {
        cfg.batch_size = size;
    }
    if let Some(path) = args.marker_state {
        cfg.marker_state_path = Some(path);
    }
    if let Some(backend) = args.classifier {
        cfg.classifier.backend = backend.to_lowercase();
    }
    cfg.validate()?;

    init_codec();
    let classifier = build_classifier(&cfg.classifier)?;
    let reconciler = FrameReconciler::new(
        ImageCrateCodec::new(),
        classifier,
        FilesystemStore::new(),
        cfg.reconciler,
    )?;
    let markers = match &cfg.marker_state_path {
        Some(path) => CameraMarkers::load(path)?,
        None => CameraMarkers::new(),
    };
    log::info!(
        "frame_processor running. output_dir={} batch_size={} cadence={} carried markers={}",
        cfg.output_dir,
        cfg.batch_size,
        cfg.reconciler.cadence_threshold,
        markers.len()
    );
    let mut processor = BatchProcessor::new(reconciler, cfg.output_dir.clone(), markers);

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = running.clone();
    ctrlc::set_handler(move || {
        // A second Ctrl-C exits even while blocked waiting for input.
        if !handler_flag.swap(false, Ordering::SeqCst) {
            std::process::exit(130);
        }
        log::warn!("shutdown requested, finishing current batch (Ctrl-C again to abort)");
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    let reader: Box<dyn BufRead> = if args.input == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(&args.input)
            .with_context(|| format!("failed to open input {}", args.input))?;
        Box::new(BufReader::new(file))
    };
    let records = read_frame_records(reader).map_while(|record| match record {
        Ok(record) => Some(record),
        Err(e) => {
            log::error!("input read failed, stopping: {}", e);
            None
        }
    });

    let marker_state = cfg.marker_state_path.clone();
    let summary = processor.run(batches(records, cfg.batch_size)?, &running, |markers| {
        match &marker_state {
            Some(path) => markers.save(path),
            None => Ok(()),
        }
    })?;

    log::info!(
        "frame_processor done. batches={} samples={} failed camera batches={}",
        summary.batches,
        summary.samples,
        summary.failures
    );
    Ok(())
}
