mod backend;
mod backends;
mod result;

use anyhow::{anyhow, Result};

use crate::config::ClassifierSettings;

pub use backend::Classifier;
pub use backends::StubClassifier;
#[cfg(feature = "backend-tract")]
pub use backends::TractClassifier;
pub use result::Classification;

/// Build the classifier named by `settings.backend`.
pub fn build_classifier(settings: &ClassifierSettings) -> Result<Box<dyn Classifier>> {
    let mut classifier: Box<dyn Classifier> = match settings.backend.as_str() {
        "stub" => Box::new(StubClassifier::new()),
        #[cfg(feature = "backend-tract")]
        "tract" => {
            let model_path = settings
                .model_path
                .as_ref()
                .ok_or_else(|| anyhow!("tract classifier requires a model path"))?;
            let labels_path = settings
                .labels_path
                .as_ref()
                .ok_or_else(|| anyhow!("tract classifier requires a labels path"))?;
            Box::new(TractClassifier::new(
                model_path,
                labels_path,
                settings.input_width,
                settings.input_height,
            )?)
        }
        #[cfg(not(feature = "backend-tract"))]
        "tract" => {
            return Err(anyhow!(
                "classifier backend 'tract' requires the backend-tract feature"
            ))
        }
        other => return Err(anyhow!("unknown classifier backend '{}'", other)),
    };
    classifier.warm_up()?;
    log::info!("classifier backend ready: {}", classifier.name());
    Ok(classifier)
}
