//! Vision backend trait.
//!
//! A backend accepts an image and a free-form question and answers with
//! free-form text. It is treated as opaque: the ensemble only normalizes the
//! returned text.

use image::DynamicImage;

use falldetect_core::Result;

/// A single, stateful vision-language capability.
///
/// `ask` takes `&mut self`: callers must hold exclusive access, which the
/// `ResourceGate` provides.
pub trait VisionBackend: Send {
    /// Ask one question about one image. Errors are `ClassificationFailure`.
    fn ask(&mut self, image: &DynamicImage, question: &str) -> Result<String>;

    /// Short identifier for logs.
    fn name(&self) -> &str {
        "vision"
    }
}
