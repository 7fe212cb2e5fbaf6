//! Batch frame reconciliation.
//!
//! One call handles one batch for one camera:
//! 1. Drain the incoming frames and merge in the marker carried from the last batch
//! 2. Order everything by capture timestamp
//! 3. Rebuild and normalize every frame, sampling one frame per cadence window
//! 4. Classify and persist each sample
//! 5. Hand back the last frame in order as the marker for the next batch
//!
//! The reconciler keeps no state between calls. The cadence counter starts at
//! zero on every call and the marker is owned by whoever drives the batches.

use thiserror::Error;

use crate::classify::Classifier;
use crate::codec::{CodecError, ImageCodec, ImageFormat, RasterImage};
use crate::frame::{FrameRecord, Timestamp};
use crate::storage::{persist_classification, ArtifactPaths, ArtifactStore, PersistReport};

pub const DEFAULT_TARGET_WIDTH: u32 = 640;
pub const DEFAULT_TARGET_HEIGHT: u32 = 480;
pub const DEFAULT_CADENCE_THRESHOLD: u32 = 10;
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconcilerSettings {
    pub target_width: u32,
    pub target_height: u32,
    /// Every `cadence_threshold`-th frame in timestamp order is sampled.
    pub cadence_threshold: u32,
    pub jpeg_quality: u8,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            target_width: DEFAULT_TARGET_WIDTH,
            target_height: DEFAULT_TARGET_HEIGHT,
            cadence_threshold: DEFAULT_CADENCE_THRESHOLD,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl ReconcilerSettings {
    pub fn output_format(&self) -> ImageFormat {
        ImageFormat::Jpeg {
            quality: self.jpeg_quality,
        }
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("camera id must not be empty")]
    InvalidCameraId,
    #[error("invalid reconciler settings: {0}")]
    InvalidSettings(&'static str),
    #[error("camera {camera_id}: batch is empty and no marker was carried over")]
    EmptyBatch { camera_id: String },
    #[error("camera {camera_id}: malformed frame record at {timestamp}: {source}")]
    MalformedFrameRecord {
        camera_id: String,
        timestamp: Timestamp,
        #[source]
        source: CodecError,
    },
    #[error("camera {camera_id}: encoding frame at {timestamp} failed: {source}")]
    EncodingFailure {
        camera_id: String,
        timestamp: Timestamp,
        #[source]
        source: CodecError,
    },
    #[error("camera {camera_id}: classifier failed on frame at {timestamp}: {source}")]
    ClassifierUnavailable {
        camera_id: String,
        timestamp: Timestamp,
        #[source]
        source: anyhow::Error,
    },
}

/// One sampled frame.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleReport {
    /// 1-indexed position in the ordered batch.
    pub position: usize,
    pub timestamp: Timestamp,
    pub label: String,
    pub persisted: PersistReport,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReconcileOutcome {
    /// Last frame in timestamp order; carry it into the next call.
    pub marker: FrameRecord,
    /// Size of the ordered batch, carried marker included.
    pub frames_seen: usize,
    pub samples: Vec<SampleReport>,
}

/// Merge the carried marker with the batch and order by timestamp.
///
/// The marker is placed ahead of the batch before a stable sort, so on equal
/// timestamps it comes first and batch frames keep their arrival order.
pub fn order_frames<I>(frames: I, previous_marker: Option<FrameRecord>) -> Vec<FrameRecord>
where
    I: IntoIterator<Item = FrameRecord>,
{
    let mut ordered: Vec<FrameRecord> = previous_marker.into_iter().collect();
    ordered.extend(frames);
    ordered.sort_by_key(|record| record.timestamp);
    ordered
}

pub struct FrameReconciler<C, K, S> {
    codec: C,
    classifier: K,
    store: S,
    settings: ReconcilerSettings,
}

impl<C, K, S> FrameReconciler<C, K, S>
where
    C: ImageCodec,
    K: Classifier,
    S: ArtifactStore,
{
    pub fn new(
        codec: C,
        classifier: K,
        store: S,
        settings: ReconcilerSettings,
    ) -> Result<Self, ReconcileError> {
        if settings.cadence_threshold == 0 {
            return Err(ReconcileError::InvalidSettings(
                "cadence threshold must be greater than zero",
            ));
        }
        if settings.target_width == 0 || settings.target_height == 0 {
            return Err(ReconcileError::InvalidSettings(
                "target resolution must be non-zero",
            ));
        }
        if !(1..=100).contains(&settings.jpeg_quality) {
            return Err(ReconcileError::InvalidSettings(
                "jpeg quality must be within 1..=100",
            ));
        }
        Ok(Self {
            codec,
            classifier,
            store,
            settings,
        })
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    #[cfg(test)]
    pub(crate) fn classifier(&self) -> &K {
        &self.classifier
    }

    /// Reconcile one batch for `camera_id`.
    ///
    /// Codec and classifier failures abort the call; samples persisted before
    /// the failure stay on disk. Storage failures are logged and skipped.
    pub fn reconcile<I>(
        &mut self,
        camera_id: &str,
        frames: I,
        output_dir: &str,
        previous_marker: Option<FrameRecord>,
    ) -> Result<ReconcileOutcome, ReconcileError>
    where
        I: IntoIterator<Item = FrameRecord>,
    {
        if camera_id.trim().is_empty() {
            return Err(ReconcileError::InvalidCameraId);
        }
        if let Some(marker) = &previous_marker {
            log::warn!(
                "cameraId={} previous processed timestamp={}",
                camera_id,
                marker.timestamp
            );
        }

        let ordered = order_frames(frames, previous_marker);
        log::info!("cameraId={} total frames={}", camera_id, ordered.len());

        let mut samples = Vec::new();
        let mut cadence = 0u32;
        for (index, record) in ordered.iter().enumerate() {
            if record.camera_id != camera_id {
                log::warn!(
                    "cameraId={} received frame tagged cameraId={} at {}",
                    camera_id,
                    record.camera_id,
                    record.timestamp
                );
            }
            let resized = self.reconstruct(camera_id, record)?;
            cadence += 1;
            if cadence == self.settings.cadence_threshold {
                let report = self.sample(camera_id, record, &resized, index + 1, output_dir)?;
                samples.push(report);
                cadence = 0;
            }
        }

        let frames_seen = ordered.len();
        let marker = ordered
            .into_iter()
            .last()
            .ok_or_else(|| ReconcileError::EmptyBatch {
                camera_id: camera_id.to_string(),
            })?;
        Ok(ReconcileOutcome {
            marker,
            frames_seen,
            samples,
        })
    }

    fn reconstruct(
        &self,
        camera_id: &str,
        record: &FrameRecord,
    ) -> Result<RasterImage, ReconcileError> {
        let malformed = |source: CodecError| ReconcileError::MalformedFrameRecord {
            camera_id: camera_id.to_string(),
            timestamp: record.timestamp,
            source,
        };
        let pixels = record
            .decode_pixels()
            .map_err(|e| malformed(CodecError::from(e)))?;
        let raster = self
            .codec
            .decode(record.rows, record.cols, record.pixel_format_code, &pixels)
            .map_err(malformed)?;
        self.codec
            .resize(
                &raster,
                self.settings.target_width,
                self.settings.target_height,
            )
            .map_err(malformed)
    }

    fn sample(
        &mut self,
        camera_id: &str,
        record: &FrameRecord,
        image: &RasterImage,
        position: usize,
        output_dir: &str,
    ) -> Result<SampleReport, ReconcileError> {
        let format = self.settings.output_format();
        let encoded =
            self.codec
                .encode(image, format)
                .map_err(|source| ReconcileError::EncodingFailure {
                    camera_id: camera_id.to_string(),
                    timestamp: record.timestamp,
                    source,
                })?;
        let classification = self.classifier.classify(&encoded).map_err(|source| {
            ReconcileError::ClassifierUnavailable {
                camera_id: camera_id.to_string(),
                timestamp: record.timestamp,
                source,
            }
        })?;
        log::info!("cameraId={} best match {}", camera_id, classification);

        let paths = ArtifactPaths::new(output_dir, record, format);
        let persisted =
            persist_classification(&mut self.store, &paths, &encoded, &classification);
        Ok(SampleReport {
            position,
            timestamp: record.timestamp,
            label: classification.to_string(),
            persisted,
        })
    }
}
