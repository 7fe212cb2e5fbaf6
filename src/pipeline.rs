//! Batch orchestration across cameras.
//!
//! The reconciler is stateless; this layer owns what has to survive between
//! batches. Each camera gets its own continuity marker and its own
//! reconciliation call, so cadence never leaks from one camera to another.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::classify::Classifier;
use crate::codec::ImageCodec;
use crate::frame::FrameRecord;
use crate::reconcile::{FrameReconciler, ReconcileError, ReconcileOutcome};
use crate::storage::ArtifactStore;

/// Continuity markers keyed by camera id. At most one per camera.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CameraMarkers {
    markers: BTreeMap<String, FrameRecord>,
}

impl CameraMarkers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, camera_id: &str) -> Option<&FrameRecord> {
        self.markers.get(camera_id)
    }

    /// Remove and return the marker, leaving the camera without one.
    pub fn take(&mut self, camera_id: &str) -> Option<FrameRecord> {
        self.markers.remove(camera_id)
    }

    /// Replace the camera's marker, returning the previous one.
    pub fn insert(
        &mut self,
        camera_id: impl Into<String>,
        marker: FrameRecord,
    ) -> Option<FrameRecord> {
        self.markers.insert(camera_id.into(), marker)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn cameras(&self) -> impl Iterator<Item = &str> {
        self.markers.keys().map(String::as_str)
    }

    /// Load markers from a JSON state file. A missing file means no markers yet.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let raw = std::fs::read(path)
            .with_context(|| format!("failed to read marker state {}", path.display()))?;
        serde_json::from_slice(&raw)
            .with_context(|| format!("invalid marker state {}", path.display()))
    }

    /// Persist markers, replacing the state file only once the new copy is written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("failed to write marker state {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("failed to replace marker state {}", path.display()))?;
        Ok(())
    }
}

/// Per-camera results of one mixed batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: BTreeMap<String, ReconcileOutcome>,
    pub failures: BTreeMap<String, ReconcileError>,
}

impl BatchReport {
    pub fn sample_count(&self) -> usize {
        self.outcomes.values().map(|o| o.samples.len()).sum()
    }

    pub fn frame_count(&self) -> usize {
        self.outcomes.values().map(|o| o.frames_seen).sum()
    }
}

/// Totals over a run of batches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub batches: usize,
    pub samples: usize,
    pub failures: usize,
}

/// Drives one reconciliation per camera for every incoming batch.
pub struct BatchProcessor<C, K, S> {
    reconciler: FrameReconciler<C, K, S>,
    markers: CameraMarkers,
    output_dir: String,
}

impl<C, K, S> BatchProcessor<C, K, S>
where
    C: ImageCodec,
    K: Classifier,
    S: ArtifactStore,
{
    pub fn new(
        reconciler: FrameReconciler<C, K, S>,
        output_dir: impl Into<String>,
        markers: CameraMarkers,
    ) -> Self {
        Self {
            reconciler,
            markers,
            output_dir: output_dir.into(),
        }
    }

    pub fn markers(&self) -> &CameraMarkers {
        &self.markers
    }

    /// Group `records` by camera and reconcile each group with its own marker.
    ///
    /// A failing camera keeps the marker it had before the batch; the other
    /// cameras are processed regardless.
    pub fn process_batch<I>(&mut self, records: I) -> BatchReport
    where
        I: IntoIterator<Item = FrameRecord>,
    {
        let mut by_camera: BTreeMap<String, Vec<FrameRecord>> = BTreeMap::new();
        for record in records {
            by_camera
                .entry(record.camera_id.clone())
                .or_default()
                .push(record);
        }

        let mut report = BatchReport::default();
        for (camera_id, frames) in by_camera {
            let previous = self.markers.take(&camera_id);
            match self.reconciler.reconcile(
                &camera_id,
                frames,
                &self.output_dir,
                previous.clone(),
            ) {
                Ok(outcome) => {
                    self.markers.insert(camera_id.clone(), outcome.marker.clone());
                    report.outcomes.insert(camera_id, outcome);
                }
                Err(e) => {
                    log::error!("cameraId={} batch failed: {}", camera_id, e);
                    if let Some(marker) = previous {
                        self.markers.insert(camera_id.clone(), marker);
                    }
                    report.failures.insert(camera_id, e);
                }
            }
        }
        report
    }

    /// Process batches until the input ends or `running` is cleared.
    ///
    /// The flag is checked only after a batch has been processed and
    /// `after_batch` has run, so a batch already pulled from the input is
    /// never dropped.
    pub fn run<B, F>(
        &mut self,
        batches: B,
        running: &AtomicBool,
        mut after_batch: F,
    ) -> Result<RunSummary>
    where
        B: IntoIterator<Item = Vec<FrameRecord>>,
        F: FnMut(&CameraMarkers) -> Result<()>,
    {
        let mut summary = RunSummary::default();
        for batch in batches {
            let report = self.process_batch(batch);
            summary.batches += 1;
            summary.samples += report.sample_count();
            summary.failures += report.failures.len();
            log::info!(
                "batch #{}: cameras={} frames={} samples={} failures={}",
                summary.batches,
                report.outcomes.len() + report.failures.len(),
                report.frame_count(),
                report.sample_count(),
                report.failures.len()
            );
            after_batch(&self.markers)?;
            if !running.load(Ordering::SeqCst) {
                log::warn!(
                    "shutdown signal received, stopped after batch {}",
                    summary.batches
                );
                break;
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::io;
    use std::path::PathBuf;

    use super::*;
    use crate::classify::StubClassifier;
    use crate::codec::ImageCrateCodec;
    use crate::frame::{PixelFormat, Timestamp};
    use crate::reconcile::ReconcilerSettings;

    #[derive(Default)]
    struct MemoryStore {
        files: BTreeMap<PathBuf, Vec<u8>>,
    }

    impl ArtifactStore for MemoryStore {
        fn write_file(&mut self, path: &Path, bytes: &[u8]) -> io::Result<()> {
            self.files.insert(path.to_path_buf(), bytes.to_vec());
            Ok(())
        }
    }

    fn frame(camera: &str, ts: i64) -> FrameRecord {
        FrameRecord::from_pixels(camera, Timestamp(ts), 2, 2, PixelFormat::GRAY8, &[9; 4])
    }

    fn processor() -> BatchProcessor<ImageCrateCodec, StubClassifier, MemoryStore> {
        let settings = ReconcilerSettings {
            target_width: 4,
            target_height: 4,
            ..ReconcilerSettings::default()
        };
        let reconciler = FrameReconciler::new(
            ImageCrateCodec::new(),
            StubClassifier::new(),
            MemoryStore::default(),
            settings,
        )
        .unwrap();
        BatchProcessor::new(reconciler, "out/", CameraMarkers::new())
    }

    #[test]
    fn marker_carries_cadence_across_batches() {
        let mut p = processor();

        let first = p.process_batch((1..=6).map(|ts| frame("cam-a", ts)));
        assert_eq!(first.sample_count(), 0);
        assert_eq!(p.markers().get("cam-a").unwrap().timestamp, Timestamp(6));

        // marker (6) + 9 new frames = 10 ordered frames, sample at the last one
        let second = p.process_batch((7..=15).map(|ts| frame("cam-a", ts)));
        let outcome = &second.outcomes["cam-a"];
        assert_eq!(outcome.frames_seen, 10);
        assert_eq!(outcome.samples.len(), 1);
        assert_eq!(outcome.samples[0].timestamp, Timestamp(15));
        assert_eq!(p.markers().get("cam-a").unwrap().timestamp, Timestamp(15));
    }

    #[test]
    fn cameras_are_reconciled_independently() {
        let mut p = processor();
        let mut records: Vec<FrameRecord> = Vec::new();
        for ts in 1..=10 {
            records.push(frame("cam-a", ts));
            if ts <= 5 {
                records.push(frame("cam-b", ts));
            }
        }
        let report = p.process_batch(records);

        assert_eq!(report.outcomes["cam-a"].samples.len(), 1);
        assert!(report.outcomes["cam-b"].samples.is_empty());
        assert_eq!(report.frame_count(), 15);
        assert_eq!(p.markers().len(), 2);
        assert_eq!(
            p.markers().cameras().collect::<Vec<_>>(),
            vec!["cam-a", "cam-b"]
        );
    }

    #[test]
    fn failed_camera_keeps_previous_marker() {
        let mut p = processor();
        p.process_batch(vec![frame("cam-a", 1), frame("cam-b", 1)]);

        let broken =
            FrameRecord::from_pixels("cam-a", Timestamp(2), 2, 2, PixelFormat::GRAY8, &[0; 3]);
        let report = p.process_batch(vec![broken, frame("cam-b", 2)]);

        assert!(matches!(
            report.failures.get("cam-a"),
            Some(ReconcileError::MalformedFrameRecord { .. })
        ));
        assert_eq!(p.markers().get("cam-a").unwrap().timestamp, Timestamp(1));
        assert_eq!(p.markers().get("cam-b").unwrap().timestamp, Timestamp(2));
    }

    #[test]
    fn shutdown_finishes_the_batch_in_hand() {
        let mut p = processor();
        let running = AtomicBool::new(true);
        let mut pulled = 0;
        let batches = (0..3i64)
            .map(|b| (1..=5).map(|ts| frame("cam-a", b * 5 + ts)).collect::<Vec<_>>())
            .inspect(|_| pulled += 1);

        let mut saved = Vec::new();
        let summary = p
            .run(batches, &running, |markers| {
                saved.push(markers.get("cam-a").map(|m| m.timestamp));
                running.store(false, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        assert_eq!(pulled, 1);
        assert_eq!(summary.batches, 1);
        assert_eq!(saved, vec![Some(Timestamp(5))]);
        assert_eq!(p.markers().get("cam-a").unwrap().timestamp, Timestamp(5));
    }

    #[test]
    fn run_totals_every_batch_until_input_ends() {
        let mut p = processor();
        let running = AtomicBool::new(true);
        let batches = vec![
            (1..=6).map(|ts| frame("cam-a", ts)).collect::<Vec<_>>(),
            (7..=15).map(|ts| frame("cam-a", ts)).collect::<Vec<_>>(),
        ];

        let mut calls = 0;
        let summary = p
            .run(batches, &running, |_| {
                calls += 1;
                Ok(())
            })
            .unwrap();

        assert_eq!(calls, 2);
        assert_eq!(
            summary,
            RunSummary {
                batches: 2,
                samples: 1,
                failures: 0
            }
        );
    }

    #[test]
    fn markers_round_trip_through_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("markers.json");
        assert!(CameraMarkers::load(&path).unwrap().is_empty());

        let mut markers = CameraMarkers::new();
        markers.insert("cam-a", frame("cam-a", 41));
        assert!(markers.insert("cam-a", frame("cam-a", 42)).is_some());
        markers.save(&path).unwrap();

        let loaded = CameraMarkers::load(&path).unwrap();
        assert_eq!(loaded, markers);
        assert!(!path.with_extension("tmp").exists());
    }
}
