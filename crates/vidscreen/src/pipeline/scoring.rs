//! Final weighted scoring of a record.

/// Outcome of filtering one record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterOutcome {
    pub total_score: f64,
    pub pass: bool,
}

/// Sum of the question similarities, each weighted by `1/N`.
/// A record without questions scores 0.
pub fn total_score(similarities: &[f64]) -> f64 {
    if similarities.is_empty() {
        return 0.0;
    }
    similarities.iter().sum::<f64>() / similarities.len() as f64
}

pub fn evaluate(similarities: &[f64], threshold: f64) -> FilterOutcome {
    let total_score = total_score(similarities);
    FilterOutcome {
        total_score,
        pass: total_score >= threshold,
    }
}
