//! Multi-crop ensemble voting.
//!
//! Each crop gets a presence question; only crops with a visible subject get
//! the condition question. A crop votes positive only on two affirmative
//! answers. The verdict is a strict majority over the crops.

use image::DynamicImage;
use serde::Serialize;
use tracing::{debug, info};

use crate::answer::Answer;
use crate::backend::VisionBackend;
use crate::crops::make_crops;
use falldetect_core::config::{DEFAULT_CONDITION_QUESTION, DEFAULT_PRESENCE_QUESTION};
use falldetect_core::{Error, Result, Verdict, VisionSettings};

/// Per-call vote counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VoteTally {
    pub positive_count: u32,
    pub negative_count: u32,
    pub total_crops: u32,
}

impl VoteTally {
    fn record(&mut self, positive: bool) {
        if positive {
            self.positive_count += 1;
        } else {
            self.negative_count += 1;
        }
        self.total_crops += 1;
    }

    pub fn verdict(&self) -> Verdict {
        if self.positive_count > self.negative_count {
            Verdict::Positive
        } else {
            Verdict::Negative
        }
    }

    /// Winning-vote fraction, rounded to three decimals.
    pub fn confidence(&self) -> f64 {
        if self.total_crops == 0 {
            return 0.0;
        }
        let winning = self.positive_count.max(self.negative_count) as f64;
        (winning / self.total_crops as f64 * 1000.0).round() / 1000.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnsembleOutcome {
    pub verdict: Verdict,
    pub confidence: f64,
    pub tally: VoteTally,
}

pub struct EnsembleClassifier {
    presence_question: String,
    condition_question: String,
}

impl EnsembleClassifier {
    pub fn new(presence_question: impl Into<String>, condition_question: impl Into<String>) -> Self {
        Self {
            presence_question: presence_question.into(),
            condition_question: condition_question.into(),
        }
    }

    pub fn from_settings(settings: &VisionSettings) -> Self {
        Self::new(&settings.presence_question, &settings.condition_question)
    }

    /// Classify one image. `backend` is the gate-held resource.
    ///
    /// The first backend failure aborts the remaining crops.
    pub fn classify(
        &self,
        backend: &mut dyn VisionBackend,
        image: &DynamicImage,
    ) -> Result<EnsembleOutcome> {
        let crops = make_crops(image);
        let mut tally = VoteTally::default();

        for (idx, crop) in crops.iter().enumerate() {
            let seen = self.ask(backend, crop, &self.presence_question)?;
            debug!("Crop {}/{} subject visible: {:?}", idx + 1, crops.len(), seen);

            let positive = if seen.is_affirmative() {
                let condition = self.ask(backend, crop, &self.condition_question)?;
                debug!("Crop {}/{} condition: {:?}", idx + 1, crops.len(), condition);
                condition.is_affirmative()
            } else {
                false
            };
            tally.record(positive);
        }

        let outcome = EnsembleOutcome {
            verdict: tally.verdict(),
            confidence: tally.confidence(),
            tally,
        };
        info!(
            "Votes -> positive: {}, negative: {}, verdict: {}",
            tally.positive_count, tally.negative_count, outcome.verdict
        );
        Ok(outcome)
    }

    fn ask(
        &self,
        backend: &mut dyn VisionBackend,
        crop: &DynamicImage,
        question: &str,
    ) -> Result<Answer> {
        let raw = backend.ask(crop, question).map_err(|e| match e {
            Error::ClassificationFailure(_) => e,
            other => Error::ClassificationFailure(other.to_string()),
        })?;
        Ok(Answer::normalize(&raw))
    }
}

impl Default for EnsembleClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_PRESENCE_QUESTION, DEFAULT_CONDITION_QUESTION)
    }
}
