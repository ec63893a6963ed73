//! Result formatting for the results label

use crate::constants::NOTHING_FOUND;
use crate::logic::model::Observation;

/// "label 90.0%" lines for the first `top_k` observations, or "nothing found".
///
/// Observations are expected ranked already.
pub fn format_results(observations: &[Observation], top_k: usize) -> String {
    if observations.is_empty() {
        return NOTHING_FOUND.to_string();
    }

    observations
        .iter()
        .take(top_k)
        .map(|o| format!("{} {:.1}%", o.label, o.confidence * 100.0))
        .collect::<Vec<_>>()
        .join("\n")
}
