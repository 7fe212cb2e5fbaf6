//! Video Stream Processor
//!
//! Per-camera batch reconciliation for a stream of captured video frames.
//!
//! # Architecture
//!
//! Every batch for a camera goes through the same steps:
//!
//! 1. **Merge**: the frame carried over from the previous batch joins the new frames.
//! 2. **Order**: the merged frames are sorted by capture timestamp.
//! 3. **Sample**: every tenth frame (by default) is encoded and classified.
//! 4. **Persist**: the sampled image and its label are written side by side.
//! 5. **Carry**: the last frame in order becomes the marker for the next batch.
//!
//! # Module Structure
//!
//! - `frame`: Transport records (`FrameRecord`, `Timestamp`, `PixelFormat`)
//! - `codec`: Raster reconstruction, resizing and JPEG encoding
//! - `classify`: Classifier backends (stub, ONNX via tract)
//! - `storage`: Artifact naming and independent image/label writes
//! - `reconcile`: The batch reconciler
//! - `pipeline`: Per-camera marker ownership and mixed-batch processing
//! - `ingest`: JSON-lines transport reader and batching
//! - `config`: File and environment configuration

pub mod classify;
pub mod codec;
pub mod config;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod reconcile;
pub mod storage;

pub use classify::{build_classifier, Classification, Classifier, StubClassifier};
pub use codec::{init_codec, ImageCodec, ImageCrateCodec, ImageFormat, RasterImage};
pub use config::{ClassifierSettings, ProcessorConfig};
pub use frame::{FrameError, FrameRecord, PixelFormat, Timestamp};
pub use pipeline::{BatchProcessor, BatchReport, CameraMarkers, RunSummary};
pub use reconcile::{
    order_frames, FrameReconciler, ReconcileError, ReconcileOutcome, ReconcilerSettings,
    SampleReport,
};
pub use storage::{ArtifactPaths, ArtifactStore, FilesystemStore, PersistReport};
