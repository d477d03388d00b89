//! FallDetect Infer: gated access to the vision backend and the multi-crop
//! ensemble that turns yes/no answers into a verdict.
//!
//! The backend is stateful and not reentrant, so every call goes through a
//! single `ResourceGate`. `HttpVisionBackend` talks to an OpenAI-compatible
//! chat-completions server hosting the vision-language model.

pub mod answer;
pub mod backend;
pub mod crops;
pub mod decode;
pub mod ensemble;
pub mod gate;
pub mod http_backend;

pub use answer::Answer;
pub use backend::VisionBackend;
pub use crops::{crop_regions, make_crops, CropRegion};
pub use decode::{decode_image, sniff_format};
pub use ensemble::{EnsembleClassifier, EnsembleOutcome, VoteTally};
pub use gate::ResourceGate;
pub use http_backend::HttpVisionBackend;
