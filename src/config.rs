use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::reconcile::{
    ReconcilerSettings, DEFAULT_CADENCE_THRESHOLD, DEFAULT_JPEG_QUALITY, DEFAULT_TARGET_HEIGHT,
    DEFAULT_TARGET_WIDTH,
};

const DEFAULT_OUTPUT_DIR: &str = "/tmp/processed-data/";
const DEFAULT_BATCH_SIZE: usize = 100;
const DEFAULT_CLASSIFIER: &str = "stub";
const DEFAULT_CLASSIFIER_INPUT: u32 = 224;

#[derive(Debug, Deserialize, Default)]
struct ProcessorConfigFile {
    output_dir: Option<String>,
    batch_size: Option<usize>,
    marker_state_path: Option<PathBuf>,
    sampling: Option<SamplingConfigFile>,
    classifier: Option<ClassifierConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SamplingConfigFile {
    cadence_threshold: Option<u32>,
    target_width: Option<u32>,
    target_height: Option<u32>,
    jpeg_quality: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
struct ClassifierConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    labels_path: Option<PathBuf>,
    input_width: Option<u32>,
    input_height: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Prefix for artifact paths; keep the trailing separator.
    pub output_dir: String,
    pub batch_size: usize,
    pub marker_state_path: Option<PathBuf>,
    pub reconciler: ReconcilerSettings,
    pub classifier: ClassifierSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierSettings {
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub labels_path: Option<PathBuf>,
    pub input_width: u32,
    pub input_height: u32,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            backend: DEFAULT_CLASSIFIER.to_string(),
            model_path: None,
            labels_path: None,
            input_width: DEFAULT_CLASSIFIER_INPUT,
            input_height: DEFAULT_CLASSIFIER_INPUT,
        }
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            marker_state_path: None,
            reconciler: ReconcilerSettings::default(),
            classifier: ClassifierSettings::default(),
        }
    }
}

impl ProcessorConfig {
    /// Defaults, then the file named by `PROCESSOR_CONFIG`, then env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PROCESSOR_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ProcessorConfigFile) -> Self {
        let sampling = file.sampling.unwrap_or_default();
        let classifier = file.classifier.unwrap_or_default();
        Self {
            output_dir: file
                .output_dir
                .unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string()),
            batch_size: file.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            marker_state_path: file.marker_state_path,
            reconciler: ReconcilerSettings {
                target_width: sampling.target_width.unwrap_or(DEFAULT_TARGET_WIDTH),
                target_height: sampling.target_height.unwrap_or(DEFAULT_TARGET_HEIGHT),
                cadence_threshold: sampling
                    .cadence_threshold
                    .unwrap_or(DEFAULT_CADENCE_THRESHOLD),
                jpeg_quality: sampling.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
            },
            classifier: ClassifierSettings {
                backend: classifier
                    .backend
                    .unwrap_or_else(|| DEFAULT_CLASSIFIER.to_string()),
                model_path: classifier.model_path,
                labels_path: classifier.labels_path,
                input_width: classifier.input_width.unwrap_or(DEFAULT_CLASSIFIER_INPUT),
                input_height: classifier.input_height.unwrap_or(DEFAULT_CLASSIFIER_INPUT),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("PROCESSOR_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.output_dir = dir;
            }
        }
        if let Ok(cadence) = std::env::var("PROCESSOR_CADENCE") {
            self.reconciler.cadence_threshold = cadence
                .trim()
                .parse()
                .map_err(|_| anyhow!("PROCESSOR_CADENCE must be a positive integer"))?;
        }
        if let Ok(quality) = std::env::var("PROCESSOR_JPEG_QUALITY") {
            self.reconciler.jpeg_quality = quality
                .trim()
                .parse()
                .map_err(|_| anyhow!("PROCESSOR_JPEG_QUALITY must be an integer in 1..=100"))?;
        }
        if let Ok(batch_size) = std::env::var("PROCESSOR_BATCH_SIZE") {
            self.batch_size = batch_size
                .trim()
                .parse()
                .map_err(|_| anyhow!("PROCESSOR_BATCH_SIZE must be a positive integer"))?;
        }
        if let Ok(backend) = std::env::var("PROCESSOR_CLASSIFIER") {
            if !backend.trim().is_empty() {
                self.classifier.backend = backend.trim().to_lowercase();
            }
        }
        if let Ok(path) = std::env::var("PROCESSOR_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.classifier.model_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(path) = std::env::var("PROCESSOR_LABELS_PATH") {
            if !path.trim().is_empty() {
                self.classifier.labels_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(path) = std::env::var("PROCESSOR_MARKER_STATE") {
            if !path.trim().is_empty() {
                self.marker_state_path = Some(PathBuf::from(path));
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.output_dir.trim().is_empty() {
            return Err(anyhow!("output_dir must not be empty"));
        }
        if self.batch_size == 0 {
            return Err(anyhow!("batch_size must be greater than zero"));
        }
        if self.reconciler.cadence_threshold == 0 {
            return Err(anyhow!("cadence_threshold must be greater than zero"));
        }
        if self.reconciler.target_width == 0 || self.reconciler.target_height == 0 {
            return Err(anyhow!("target resolution must be non-zero"));
        }
        if !(1..=100).contains(&self.reconciler.jpeg_quality) {
            return Err(anyhow!("jpeg_quality must be within 1..=100"));
        }
        if self.classifier.backend == "tract"
            && (self.classifier.model_path.is_none() || self.classifier.labels_path.is_none())
        {
            return Err(anyhow!(
                "tract classifier requires both model_path and labels_path"
            ));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ProcessorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
