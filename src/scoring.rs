// Candidate scoring

/// Weight of the faithfulness baseline. The spicy term contributes `1 - w`.
pub const BASELINE_WEIGHT: f64 = 0.8;

/// Combine a faithfulness score and a spicy score into one ranking score.
///
/// Faithfulness dominates; the spicy term is a bonus scaled by faithfulness
/// itself, so an unfaithful rewrite cannot score well however calm it is.
/// The result is not clamped and may exceed 1.0.
pub fn overall_score(faithfulness: f64, spicy: f64) -> f64 {
    faithfulness + (1.0 - BASELINE_WEIGHT) * spicy * faithfulness
}
