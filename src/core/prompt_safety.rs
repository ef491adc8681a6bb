//! Image Prompt Safety Rewriting
//!
//! Rewrites draft image prompts so protected real people are not depicted
//! photorealistically: direct "portrait/photo of" phrasing is stripped,
//! photorealistic styles are forced to an illustrative rendering with an
//! explicit not-a-likeness clause, and prompts close with an instruction to
//! emphasize the historical setting over facial specificity.
//!
//! Detection is keyword and pattern based and is a known-incomplete
//! heuristic: public figures missing from the roster pass through (false
//! negatives) and common nouns can trip a role keyword (false positives).
//! The detector is a pluggable trait so the heuristic can be replaced
//! without touching the transformation rules, and every appended clause is
//! containment-guarded so sanitation is idempotent.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};

use crate::core::likeness::RiskAssessment;

// ============================================================================
// Patterns
// ============================================================================

static DIRECT_DEPICTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:a\s+|an\s+|the\s+)?(?:portrait|photo(?:graph)?|picture|image)\s+of\s+(?:the\s+)?")
        .unwrap()
});

static ROLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:monarch|king|queen|president|prime minister|emperor|empress|pope|chancellor|premier|pharaoh|tsar|sultan|senator)\b",
    )
    .unwrap()
});

static PHOTOREAL_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)photo\s*-?\s*realis(?:tic|m)|hyper\s*-?\s*realis(?:tic|m)").unwrap()
});

/// Frequently requested historical figures; matched case-insensitively
const KNOWN_FIGURES: &[&str] = &[
    "queen elizabeth",
    "winston churchill",
    "abraham lincoln",
    "george washington",
    "napoleon",
    "julius caesar",
    "cleopatra",
    "albert einstein",
    "mahatma gandhi",
    "martin luther king",
    "john f. kennedy",
    "princess diana",
    "nelson mandela",
    "marie curie",
    "leonardo da vinci",
];

/// Styles already considered non-photorealistic renderings
const ARTISTIC_STYLE_KEYWORDS: &[&str] = &[
    "illustration",
    "illustrated",
    "sketch",
    "watercolor",
    "painting",
    "drawing",
];

const FORCED_STYLE: &str = "digital illustration";
const LIKENESS_DISCLAIMER: &str = "stylized artistic representation, not a direct likeness";
const GENERIC_STYLIZATION: &str = "rendered as a stylized period illustration";
const HISTORICAL_EMPHASIS: &str = "emphasize the historical setting and period-appropriate \
                                   clothing, architecture, and objects rather than facial detail";

// ============================================================================
// Detection Seam
// ============================================================================

/// Predicate deciding whether text likely names an identifiable real person
pub trait IdentifyingDetector: Send + Sync {
    fn is_likely_identifying(&self, text: &str) -> bool;
}

/// Default detector: depiction phrasing, role/title keywords, and a fixed
/// roster of historical figures. Deliberately not exhaustive.
#[derive(Debug, Default)]
pub struct KeywordDetector;

impl IdentifyingDetector for KeywordDetector {
    fn is_likely_identifying(&self, text: &str) -> bool {
        if DIRECT_DEPICTION.is_match(text) || ROLE_PATTERN.is_match(text) {
            return true;
        }
        let lower = text.to_lowercase();
        KNOWN_FIGURES.iter().any(|name| lower.contains(name))
    }
}

// ============================================================================
// Sanitizer
// ============================================================================

/// A rewritten image prompt and the style it should be dispatched with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizedPrompt {
    pub prompt: String,
    pub style: String,
}

pub struct PromptSanitizer {
    detector: Arc<dyn IdentifyingDetector>,
}

impl PromptSanitizer {
    pub fn new() -> Self {
        Self {
            detector: Arc::new(KeywordDetector),
        }
    }

    pub fn with_detector(detector: Arc<dyn IdentifyingDetector>) -> Self {
        Self { detector }
    }

    /// Rewrite a draft prompt for likeness safety.
    ///
    /// A present assessment that allows likeness use makes this a
    /// passthrough; otherwise (disallowed or no assessment) the rewrite
    /// rules apply. Reapplying with the same style yields the same output.
    pub fn sanitize(
        &self,
        draft: &str,
        requested_style: &str,
        assessment: Option<&RiskAssessment>,
    ) -> SanitizedPrompt {
        if assessment.is_some_and(|a| a.can_use_likeness) {
            return SanitizedPrompt {
                prompt: draft.to_string(),
                style: requested_style.to_string(),
            };
        }

        let mut prompt = draft.to_string();
        let mut style = requested_style.to_string();

        // Strip direct depiction phrasing to a fixpoint; a single pass can
        // uncover a new "photo of" adjacency in pathological inputs
        if self.detector.is_likely_identifying(&prompt) {
            loop {
                let stripped = DIRECT_DEPICTION.replace_all(&prompt, "").trim().to_string();
                if stripped == prompt {
                    break;
                }
                prompt = stripped;
            }
        }

        let identifying = self.detector.is_likely_identifying(&prompt);

        if identifying && PHOTOREAL_STYLE.is_match(&style) {
            style = FORCED_STYLE.to_string();
            append_clause(&mut prompt, LIKENESS_DISCLAIMER);
        } else if identifying && !is_artistic(&prompt) && !is_artistic(&style) {
            append_clause(&mut prompt, GENERIC_STYLIZATION);
        }

        if identifying {
            append_clause(&mut prompt, HISTORICAL_EMPHASIS);
        }

        SanitizedPrompt { prompt, style }
    }
}

impl Default for PromptSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

fn is_artistic(text: &str) -> bool {
    let lower = text.to_lowercase();
    ARTISTIC_STYLE_KEYWORDS
        .iter()
        .any(|keyword| lower.contains(keyword))
}

fn append_clause(prompt: &mut String, clause: &str) {
    if prompt.to_lowercase().contains(&clause.to_lowercase()) {
        return;
    }
    if !prompt.is_empty() {
        prompt.push_str(", ");
    }
    prompt.push_str(clause);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::likeness::RiskLevel;
    use proptest::prelude::*;
    use rstest::rstest;

    fn restricted() -> RiskAssessment {
        RiskAssessment::conservative()
    }

    fn permissive() -> RiskAssessment {
        RiskAssessment {
            can_use_likeness: true,
            risk_level: RiskLevel::Low,
            justification: "fine".to_string(),
            recommendation: "fine".to_string(),
            inferred_attributes: None,
        }
    }

    #[rstest]
    #[case("A photo of the Queen at her coronation", true)]
    #[case("Portrait of Winston Churchill", true)]
    #[case("The president signing the treaty", true)]
    #[case("Napoleon crossing the Alps", true)]
    #[case("A medieval castle on a hill", false)]
    #[case("Crowds celebrating in the street", false)]
    fn test_keyword_detection(#[case] text: &str, #[case] expected: bool) {
        assert_eq!(KeywordDetector.is_likely_identifying(text), expected);
    }

    #[test]
    fn test_strips_direct_depiction_phrasing() {
        let sanitizer = PromptSanitizer::new();
        let result = sanitizer.sanitize(
            "A photo of the Queen at her coronation",
            "Watercolor painting",
            Some(&restricted()),
        );

        assert!(!result.prompt.to_lowercase().contains("photo of"));
        assert!(result.prompt.starts_with("Queen at her coronation"));
    }

    #[test]
    fn test_photorealistic_style_forced_with_disclaimer() {
        let sanitizer = PromptSanitizer::new();
        let result = sanitizer.sanitize(
            "A photo of the Queen at her coronation",
            "Photorealistic",
            Some(&restricted()),
        );

        assert_eq!(result.style, FORCED_STYLE);
        assert!(result.prompt.contains(LIKENESS_DISCLAIMER));
        assert!(result.prompt.contains("historical setting"));
        assert!(!result.prompt.to_lowercase().contains("photo of"));
    }

    #[test]
    fn test_generic_stylization_when_no_artistic_style() {
        let sanitizer = PromptSanitizer::new();
        let result = sanitizer.sanitize(
            "Napoleon addressing his troops",
            "Cinematic",
            Some(&restricted()),
        );

        assert!(result.prompt.contains(GENERIC_STYLIZATION));
        assert_eq!(result.style, "Cinematic");
    }

    #[test]
    fn test_artistic_style_skips_generic_stylization() {
        let sanitizer = PromptSanitizer::new();
        let result = sanitizer.sanitize(
            "Napoleon addressing his troops",
            "Watercolor painting",
            Some(&restricted()),
        );

        assert!(!result.prompt.contains(GENERIC_STYLIZATION));
        // Identifying content still gets the historical closing instruction
        assert!(result.prompt.contains("historical setting"));
    }

    #[test]
    fn test_non_identifying_prompt_untouched() {
        let sanitizer = PromptSanitizer::new();
        let result = sanitizer.sanitize(
            "A medieval castle on a hill at dawn",
            "Photorealistic",
            Some(&restricted()),
        );

        assert_eq!(result.prompt, "A medieval castle on a hill at dawn");
        assert_eq!(result.style, "Photorealistic");
    }

    #[test]
    fn test_permissive_assessment_is_passthrough() {
        let sanitizer = PromptSanitizer::new();
        let result = sanitizer.sanitize(
            "A photo of the Queen at her coronation",
            "Photorealistic",
            Some(&permissive()),
        );

        assert_eq!(result.prompt, "A photo of the Queen at her coronation");
        assert_eq!(result.style, "Photorealistic");
    }

    #[test]
    fn test_missing_assessment_applies_rules() {
        let sanitizer = PromptSanitizer::new();
        let result = sanitizer.sanitize("Portrait of Abraham Lincoln", "Photorealistic", None);

        assert_eq!(result.style, FORCED_STYLE);
        assert!(!result.prompt.to_lowercase().contains("portrait of"));
    }

    #[test]
    fn test_custom_detector_replaces_heuristic() {
        struct EverythingIsIdentifying;

        impl IdentifyingDetector for EverythingIsIdentifying {
            fn is_likely_identifying(&self, _text: &str) -> bool {
                true
            }
        }

        let sanitizer = PromptSanitizer::with_detector(Arc::new(EverythingIsIdentifying));
        let result = sanitizer.sanitize("A quiet mountain lake", "Photorealistic", None);

        assert_eq!(result.style, FORCED_STYLE);
        assert!(result.prompt.contains(LIKENESS_DISCLAIMER));
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let sanitizer = PromptSanitizer::new();
        let style = "Photorealistic";

        let once = sanitizer.sanitize("A photo of the Queen at her coronation", style, None);
        let twice = sanitizer.sanitize(&once.prompt, style, None);

        assert_eq!(once, twice);
    }

    proptest! {
        #[test]
        fn prop_sanitize_stable_under_reapplication(
            draft in "[ -~]{0,80}",
            style_index in 0usize..4,
        ) {
            let styles = ["Photorealistic", "Cinematic", "Watercolor painting", "Sketch"];
            let style = styles[style_index];
            let sanitizer = PromptSanitizer::new();

            let once = sanitizer.sanitize(&draft, style, None);
            let twice = sanitizer.sanitize(&once.prompt, style, None);

            prop_assert_eq!(once, twice);
        }
    }
}
