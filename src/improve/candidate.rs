// Scored rewrite candidates

use serde::Serialize;

use crate::prompts::StructuredValue;
use crate::scoring::overall_score;

/// Alternative rewrites produced by the variants improve prompt.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RewriteVariants {
    pub worst_terms: Vec<String>,
    pub worst_fix: String,
    /// Non-violent-communication rewrite (`nvc` in the model answer).
    pub perspective: String,
    pub constructive: String,
}

impl RewriteVariants {
    /// Pull the variant fields out of an improve answer, if it has them.
    pub fn from_improvement(value: &StructuredValue) -> Option<Self> {
        let worst_fix = value.str_field("worst_fix");
        let perspective = value.str_field("nvc");
        let constructive = value.str_field("constructive");
        if worst_fix.is_none() && perspective.is_none() && constructive.is_none() {
            return None;
        }

        Some(Self {
            worst_terms: value.string_list("worst_terms").unwrap_or_default(),
            worst_fix: worst_fix.unwrap_or_default().to_string(),
            perspective: perspective.unwrap_or_default().to_string(),
            constructive: constructive.unwrap_or_default().to_string(),
        })
    }
}

/// One scored rewrite. Immutable once built; the overall score is derived
/// from the two model scores at construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    edit: String,
    critique: String,
    faithfulness_score: f64,
    spicy_score: f64,
    overall_score: f64,
    request_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    variants: Option<RewriteVariants>,
}

impl Candidate {
    pub fn new(
        edit: impl Into<String>,
        critique: impl Into<String>,
        faithfulness_score: f64,
        spicy_score: f64,
        request_count: u32,
    ) -> Self {
        Self {
            edit: edit.into(),
            critique: critique.into(),
            faithfulness_score,
            spicy_score,
            overall_score: overall_score(faithfulness_score, spicy_score),
            request_count,
            variants: None,
        }
    }

    pub fn with_variants(mut self, variants: Option<RewriteVariants>) -> Self {
        self.variants = variants;
        self
    }

    pub fn edit(&self) -> &str {
        &self.edit
    }

    pub fn critique(&self) -> &str {
        &self.critique
    }

    pub fn faithfulness_score(&self) -> f64 {
        self.faithfulness_score
    }

    pub fn spicy_score(&self) -> f64 {
        self.spicy_score
    }

    pub fn overall_score(&self) -> f64 {
        self.overall_score
    }

    /// Session request count when this candidate was retained.
    pub fn request_count(&self) -> u32 {
        self.request_count
    }

    pub fn variants(&self) -> Option<&RewriteVariants> {
        self.variants.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::templates::{IMPROVED_TEXT, IMPROVED_VARIANTS};
    use serde_json::json;

    #[test]
    fn test_overall_score_is_derived() {
        let c = Candidate::new("calm", "fine", 0.9, 0.1, 4);
        assert!((c.overall_score() - 0.918).abs() < 1e-12);
        assert_eq!(c.request_count(), 4);
    }

    #[test]
    fn test_variants_extracted() {
        let value = IMPROVED_VARIANTS
            .validate(json!({
                "worst_terms": ["so slow"],
                "worst_fix": "You are slower than planned.",
                "nvc": "I feel worried about the timeline.",
                "constructive": "Can we look at the timeline together?",
                "best": "We are behind schedule."
            }))
            .unwrap();

        let variants = RewriteVariants::from_improvement(&value).unwrap();
        assert_eq!(variants.worst_terms, vec!["so slow".to_string()]);
        assert_eq!(variants.perspective, "I feel worried about the timeline.");
    }

    #[test]
    fn test_simple_answer_has_no_variants() {
        let value = IMPROVED_TEXT.validate(json!({ "text": "calm" })).unwrap();
        assert!(RewriteVariants::from_improvement(&value).is_none());
    }

    #[test]
    fn test_serialized_shape() {
        let c = Candidate::new("calm", "fine", 1.0, 0.0, 8);
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["edit"], "calm");
        assert_eq!(v["overall_score"], 1.0);
        assert_eq!(v["request_count"], 8);
        assert!(v.get("variants").is_none());
    }
}
