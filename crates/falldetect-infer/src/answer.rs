//! Normalization of free-form model answers to yes/no.

/// Interpretation of a raw model answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Affirmative,
    Negative,
    /// Neither token found. Counts as non-affirmative.
    Indeterminate,
}

const AFFIRMATIVE: &str = "yes";
const NEGATIVE: &str = "no";

impl Answer {
    /// Prefix match wins over substring match, and a bare substring "yes"
    /// only counts when "no" does not also appear.
    pub fn normalize(raw: &str) -> Self {
        let text = raw.trim().to_lowercase();

        if text.starts_with(AFFIRMATIVE) {
            return Self::Affirmative;
        }
        if text.starts_with(NEGATIVE) {
            return Self::Negative;
        }
        let has_yes = text.contains(AFFIRMATIVE);
        let has_no = text.contains(NEGATIVE);
        if has_yes && !has_no {
            return Self::Affirmative;
        }
        if has_no {
            return Self::Negative;
        }
        Self::Indeterminate
    }

    pub fn is_affirmative(&self) -> bool {
        matches!(self, Self::Affirmative)
    }
}
