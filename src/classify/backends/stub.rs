use anyhow::{anyhow, Result};
use sha2::{Digest, Sha256};

use crate::classify::backend::Classifier;
use crate::classify::result::Classification;

const STUB_LABELS: &[&str] = &[
    "person",
    "car",
    "bicycle",
    "dog",
    "cat",
    "truck",
    "traffic light",
    "background",
];

/// Stub classifier for testing. Hashes the encoded bytes to pick a label, so
/// identical input always yields the same answer.
pub struct StubClassifier {
    labels: Vec<String>,
}

impl StubClassifier {
    pub fn new() -> Self {
        Self::with_labels(STUB_LABELS.iter().map(|l| l.to_string()).collect())
    }

    pub fn with_labels(labels: Vec<String>) -> Self {
        Self { labels }
    }
}

impl Default for StubClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for StubClassifier {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn classify(&mut self, encoded: &[u8]) -> Result<Classification> {
        if encoded.is_empty() {
            return Err(anyhow!("stub classifier received an empty image"));
        }
        if self.labels.is_empty() {
            return Err(anyhow!("stub classifier has no labels"));
        }
        let digest: [u8; 32] = Sha256::digest(encoded).into();
        let index = u64::from_le_bytes([
            digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
        ]) % self.labels.len() as u64;
        let confidence = 0.5 + f32::from(digest[8]) / 510.0;
        Ok(Classification::new(
            self.labels[index as usize].clone(),
            confidence,
        ))
    }
}
