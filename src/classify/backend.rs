use anyhow::Result;

use super::result::Classification;

/// Classifier collaborator.
///
/// Receives a compressed image (JPEG) and returns the best-matching label.
/// The byte slice is borrowed for the duration of the call only.
pub trait Classifier: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Classify one encoded image.
    fn classify(&mut self, encoded: &[u8]) -> Result<Classification>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn classify(&mut self, encoded: &[u8]) -> Result<Classification> {
        (**self).classify(encoded)
    }

    fn warm_up(&mut self) -> Result<()> {
        (**self).warm_up()
    }
}
