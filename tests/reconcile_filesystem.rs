use std::path::Path;

use video_stream_processor::{
    BatchProcessor, CameraMarkers, FilesystemStore, FrameReconciler, FrameRecord, ImageCrateCodec,
    PixelFormat, ReconcileError, ReconcilerSettings, StubClassifier, Timestamp,
};

const BASE_MS: i64 = 1_700_000_000_000;

fn bgr_frame(camera: &str, index: i64) -> FrameRecord {
    let (rows, cols) = (24, 32);
    let mut pixels = Vec::with_capacity(rows * cols * 3);
    for y in 0..rows {
        for x in 0..cols {
            pixels.extend_from_slice(&[(x * 8) as u8, (y * 10) as u8, (index * 5 % 256) as u8]);
        }
    }
    FrameRecord::from_pixels(
        camera,
        Timestamp(BASE_MS + index * 100),
        rows as i32,
        cols as i32,
        PixelFormat::BGR8,
        &pixels,
    )
}

fn output_prefix(dir: &Path) -> String {
    format!("{}/", dir.display())
}

fn reconciler() -> FrameReconciler<ImageCrateCodec, StubClassifier, FilesystemStore> {
    FrameReconciler::new(
        ImageCrateCodec::new(),
        StubClassifier::new(),
        FilesystemStore::new(),
        ReconcilerSettings::default(),
    )
    .expect("reconciler")
}

#[test]
fn sampled_frames_are_written_as_640x480_jpeg_with_label() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = output_prefix(dir.path());
    let mut batch: Vec<FrameRecord> = (1..=25).map(|i| bgr_frame("vid-01", i)).collect();
    batch.reverse();

    let outcome = reconciler()
        .reconcile("vid-01", batch, &prefix, None)
        .expect("reconcile");

    assert_eq!(outcome.marker, bgr_frame("vid-01", 25));
    assert_eq!(outcome.samples.len(), 2);

    for index in [10, 20] {
        let stem = format!("{}vid-01-T-{}", prefix, BASE_MS + index * 100);
        let jpeg = std::fs::read(format!("{}.jpg", stem)).expect("image artifact");
        let decoded = image::load_from_memory(&jpeg).expect("valid jpeg");
        assert_eq!((decoded.width(), decoded.height()), (640, 480));

        let label = std::fs::read_to_string(format!("{}.txt", stem)).expect("label artifact");
        assert!(label.ends_with("% likely)"), "unexpected label: {label}");
    }

    let artifacts = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(artifacts, 4);
}

#[test]
fn unwritable_output_directory_does_not_abort_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = format!("{}/does-not-exist/", dir.path().display());
    let batch: Vec<FrameRecord> = (1..=20).map(|i| bgr_frame("vid-02", i)).collect();

    let outcome = reconciler()
        .reconcile("vid-02", batch, &prefix, None)
        .expect("storage errors are not fatal");

    assert_eq!(outcome.samples.len(), 2);
    assert!(outcome
        .samples
        .iter()
        .all(|s| !s.persisted.image_written && !s.persisted.label_written));
    assert_eq!(outcome.marker.timestamp, Timestamp(BASE_MS + 2000));
}

#[test]
fn truncated_payload_fails_after_earlier_samples_are_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = output_prefix(dir.path());
    let mut batch: Vec<FrameRecord> = (1..=14).map(|i| bgr_frame("vid-03", i)).collect();
    let mut truncated = bgr_frame("vid-03", 13);
    truncated.rows += 1;
    batch[12] = truncated;

    let err = reconciler()
        .reconcile("vid-03", batch, &prefix, None)
        .unwrap_err();
    assert!(matches!(err, ReconcileError::MalformedFrameRecord { .. }));

    let stem = format!("{}vid-03-T-{}", prefix, BASE_MS + 1000);
    assert!(Path::new(&format!("{}.jpg", stem)).exists());
    assert!(Path::new(&format!("{}.txt", stem)).exists());
}

#[test]
fn markers_persist_across_processor_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = output_prefix(dir.path());
    let state = dir.path().join("markers.json");

    let mut first = BatchProcessor::new(reconciler(), prefix.clone(), CameraMarkers::new());
    let report = first.process_batch((1..=4).map(|i| bgr_frame("vid-04", i)));
    assert_eq!(report.sample_count(), 0);
    first.markers().save(&state).unwrap();

    let restored = CameraMarkers::load(&state).unwrap();
    let mut second = BatchProcessor::new(reconciler(), prefix, restored);
    let report = second.process_batch((5..=13).map(|i| bgr_frame("vid-04", i)));

    // marker (4) + frames 5..=13 = 10 ordered frames
    let outcome = &report.outcomes["vid-04"];
    assert_eq!(outcome.frames_seen, 10);
    assert_eq!(outcome.samples.len(), 1);
    assert_eq!(outcome.samples[0].timestamp, Timestamp(BASE_MS + 1300));
    assert_eq!(
        second.markers().get("vid-04").unwrap().timestamp,
        Timestamp(BASE_MS + 1300)
    );
}
