use std::io;
use std::path::{Path, PathBuf};

use crate::classify::Classification;
use crate::codec::ImageFormat;
use crate::frame::FrameRecord;

/// Storage collaborator for classification artifacts.
pub trait ArtifactStore {
    fn write_file(&mut self, path: &Path, bytes: &[u8]) -> io::Result<()>;
}

/// Writes artifacts straight to the local filesystem.
///
/// Directories are not created; an unwritable output location surfaces as a
/// write error for the caller to report.
#[derive(Clone, Copy, Debug, Default)]
pub struct FilesystemStore;

impl FilesystemStore {
    pub fn new() -> Self {
        Self
    }
}

impl ArtifactStore for FilesystemStore {
    fn write_file(&mut self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        std::fs::write(path, bytes)
    }
}

/// Paths of the image/label pair written for one sampled frame.
///
/// `output_dir` is used as a literal prefix: `{output_dir}{camera}-T-{millis}.jpg`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub image: PathBuf,
    pub label: PathBuf,
}

impl ArtifactPaths {
    pub fn new(output_dir: &str, record: &FrameRecord, format: ImageFormat) -> Self {
        let stem = format!("{}{}", output_dir, record.artifact_key());
        Self {
            image: PathBuf::from(format!("{}.{}", stem, format.extension())),
            label: PathBuf::from(format!("{}.txt", stem)),
        }
    }
}

/// Outcome of the two independent artifact writes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PersistReport {
    pub image_written: bool,
    pub label_written: bool,
}

impl PersistReport {
    pub fn is_complete(&self) -> bool {
        self.image_written && self.label_written
    }
}

/// Write the sampled image and its label. Failures are logged, never raised;
/// the label write is attempted whatever happened to the image.
pub fn persist_classification<S: ArtifactStore + ?Sized>(
    store: &mut S,
    paths: &ArtifactPaths,
    image: &[u8],
    classification: &Classification,
) -> PersistReport {
    log::info!("saving image to {}", paths.image.display());
    let image_written = match store.write_file(&paths.image, image) {
        Ok(()) => true,
        Err(e) => {
            log::error!(
                "couldn't save image to {}: {} (check that the output directory exists)",
                paths.image.display(),
                e
            );
            false
        }
    };

    log::info!("saving classification result to {}", paths.label.display());
    let label = classification.to_string();
    let label_written = match store.write_file(&paths.label, label.as_bytes()) {
        Ok(()) => true,
        Err(e) => {
            log::error!(
                "couldn't save classification result to {}: {}",
                paths.label.display(),
                e
            );
            false
        }
    };

    PersistReport {
        image_written,
        label_written,
    }
}
