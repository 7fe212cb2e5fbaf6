use std::fmt;

/// Best match reported by a classifier.
#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
    pub label: String,
    /// Probability of `label`, 0..=1.
    pub confidence: f32,
}

impl Classification {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Rendered form is what gets persisted next to the sampled image.
impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:.2}% likely)",
            self.label,
            self.confidence * 100.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_label_with_percentage() {
        let c = Classification::new("tabby cat", 0.8731);
        assert_eq!(c.to_string(), "tabby cat (87.31% likely)");
    }
}
