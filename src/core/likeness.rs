//! Likeness Risk Classifier
//!
//! Decides whether a timeline topic may depict real identifiable people
//! photorealistically. The decision is delegated to the text provider with a
//! system prompt encoding the legal test (newsworthiness, transformative
//! use, right-of-publicity exposure) and a structured JSON reply is
//! expected.
//!
//! The component fails closed: a provider error, timeout, empty body,
//! malformed JSON, or missing field always resolves to the conservative
//! default (`can_use_likeness = false`, high risk). A permissive assessment
//! can only come from a well-formed reply that explicitly grants it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::core::generation::parse;
use crate::core::generation::provider::{GenerationProvider, TextRequest};

/// Bound on the classifier's provider call
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const SYSTEM_PROMPT: &str = "You are a media-law risk reviewer for a timeline publishing platform. \
Given a timeline topic, decide whether photorealistic depiction of the real people involved is \
acceptable, weighing newsworthiness, transformative use, and right-of-publicity exposure. \
Reply with a single JSON object with fields: can_use_likeness (bool), risk_level \
(\"low\"|\"medium\"|\"high\"), justification (string), recommendation (string), and \
inferred_attributes (object with subjects (string array), format, likeness_use, \
copyrighted_material, framing).";

// ============================================================================
// Assessment Types
// ============================================================================

/// Legal/policy exposure level for a topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Map a free-form reply string; anything unrecognized is high risk
    fn from_reply(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "low" => RiskLevel::Low,
            "medium" | "moderate" => RiskLevel::Medium,
            _ => RiskLevel::High,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}

/// Structured detail the classifier inferred about the topic
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferredAttributes {
    #[serde(default)]
    pub subjects: Vec<String>,
    pub format: Option<String>,
    pub likeness_use: Option<String>,
    pub copyrighted_material: Option<String>,
    pub framing: Option<String>,
}

/// Outcome of the likeness review for one topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub can_use_likeness: bool,
    pub risk_level: RiskLevel,
    pub justification: String,
    pub recommendation: String,
    pub inferred_attributes: Option<InferredAttributes>,
}

impl RiskAssessment {
    /// The fail-closed default used whenever the review cannot complete
    pub fn conservative() -> Self {
        Self {
            can_use_likeness: false,
            risk_level: RiskLevel::High,
            justification: "The likeness review could not be completed; the topic is treated as \
                            high risk."
                .to_string(),
            recommendation: "Use stylized, non-photorealistic imagery without recognizable faces."
                .to_string(),
            inferred_attributes: None,
        }
    }
}

// ============================================================================
// Wire Shape
// ============================================================================

/// Raw reply shape. Every field is optional so a partially well-formed reply
/// still defaults conservatively field by field.
#[derive(Debug, Default, Deserialize)]
struct RawAssessment {
    can_use_likeness: Option<bool>,
    risk_level: Option<String>,
    justification: Option<String>,
    recommendation: Option<String>,
    inferred_attributes: Option<RawAttributes>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAttributes {
    subjects: Option<Vec<String>>,
    format: Option<String>,
    likeness_use: Option<String>,
    copyrighted_material: Option<String>,
    framing: Option<String>,
}

// ============================================================================
// Classifier
// ============================================================================

pub struct LikenessClassifier {
    provider: Arc<dyn GenerationProvider>,
    timeout: Duration,
}

impl LikenessClassifier {
    pub fn new(provider: Arc<dyn GenerationProvider>) -> Self {
        Self {
            provider,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Assess whether the topic may use real-person likeness.
    ///
    /// Never fails: every failure mode resolves to
    /// [`RiskAssessment::conservative`].
    pub async fn assess(&self, topic_title: &str, topic_description: &str) -> RiskAssessment {
        let request = TextRequest::new(format!(
            "Topic: {topic_title}\nDescription: {topic_description}"
        ))
        .with_system(SYSTEM_PROMPT)
        .structured();

        let call = self.provider.generate_text(request);
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(response)) => Self::parse_reply(&response.content),
            Ok(Err(err)) => {
                log::warn!("likeness review call failed, defaulting to restricted: {err}");
                RiskAssessment::conservative()
            }
            Err(_) => {
                log::warn!("likeness review timed out, defaulting to restricted");
                RiskAssessment::conservative()
            }
        }
    }

    fn parse_reply(content: &str) -> RiskAssessment {
        if content.trim().is_empty() {
            log::warn!("likeness review returned an empty reply, defaulting to restricted");
            return RiskAssessment::conservative();
        }

        let raw: RawAssessment = match parse::from_reply(content) {
            Ok(raw) => raw,
            Err(err) => {
                log::warn!("likeness review reply unparsable, defaulting to restricted: {err}");
                return RiskAssessment::conservative();
            }
        };

        let fallback = RiskAssessment::conservative();
        RiskAssessment {
            can_use_likeness: raw.can_use_likeness.unwrap_or(false),
            risk_level: raw
                .risk_level
                .as_deref()
                .map(RiskLevel::from_reply)
                .unwrap_or(RiskLevel::High),
            justification: raw
                .justification
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(fallback.justification),
            recommendation: raw
                .recommendation
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(fallback.recommendation),
            inferred_attributes: raw.inferred_attributes.map(|attrs| InferredAttributes {
                subjects: attrs.subjects.unwrap_or_default(),
                format: attrs.format,
                likeness_use: attrs.likeness_use,
                copyrighted_material: attrs.copyrighted_material,
                framing: attrs.framing,
            }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::generation::provider::{
        ImagePayload, ImageRequest, ProviderError, ProviderResult, TextResponse,
    };
    use async_trait::async_trait;

    struct ScriptedProvider {
        reply: String,
    }

    #[async_trait]
    impl GenerationProvider for ScriptedProvider {
        async fn generate_text(&self, _request: TextRequest) -> ProviderResult<TextResponse> {
            Ok(TextResponse::new(self.reply.clone()))
        }

        async fn generate_image(&self, _request: ImageRequest) -> ProviderResult<ImagePayload> {
            Err(ProviderError::NotConfigured("text-only stub".to_string()))
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl GenerationProvider for FailingProvider {
        async fn generate_text(&self, _request: TextRequest) -> ProviderResult<TextResponse> {
            Err(ProviderError::Api {
                status: 500,
                message: "upstream exploded".to_string(),
            })
        }

        async fn generate_image(&self, _request: ImageRequest) -> ProviderResult<ImagePayload> {
            Err(ProviderError::NotConfigured("text-only stub".to_string()))
        }
    }

    struct HangingProvider;

    #[async_trait]
    impl GenerationProvider for HangingProvider {
        async fn generate_text(&self, _request: TextRequest) -> ProviderResult<TextResponse> {
            std::future::pending().await
        }

        async fn generate_image(&self, _request: ImageRequest) -> ProviderResult<ImagePayload> {
            std::future::pending().await
        }
    }

    fn classifier_with_reply(reply: &str) -> LikenessClassifier {
        LikenessClassifier::new(Arc::new(ScriptedProvider {
            reply: reply.to_string(),
        }))
    }

    #[tokio::test]
    async fn test_well_formed_permissive_reply() {
        let classifier = classifier_with_reply(
            r#"{
                "can_use_likeness": true,
                "risk_level": "low",
                "justification": "Historical public event with strong newsworthiness.",
                "recommendation": "Proceed with period-accurate imagery.",
                "inferred_attributes": {
                    "subjects": ["Apollo 11 crew"],
                    "format": "timeline",
                    "likeness_use": "documentary",
                    "copyrighted_material": "none",
                    "framing": "educational"
                }
            }"#,
        );

        let assessment = classifier.assess("Apollo 11", "The first Moon landing").await;
        assert!(assessment.can_use_likeness);
        assert_eq!(assessment.risk_level, RiskLevel::Low);
        let attrs = assessment.inferred_attributes.unwrap();
        assert_eq!(attrs.subjects, vec!["Apollo 11 crew"]);
        assert_eq!(attrs.framing.as_deref(), Some("educational"));
    }

    #[tokio::test]
    async fn test_code_fenced_reply_parses() {
        let classifier = classifier_with_reply(
            "```json\n{\"can_use_likeness\": true, \"risk_level\": \"medium\", \
             \"justification\": \"ok\", \"recommendation\": \"ok\"}\n```",
        );

        let assessment = classifier.assess("t", "d").await;
        assert!(assessment.can_use_likeness);
        assert_eq!(assessment.risk_level, RiskLevel::Medium);
    }

    #[tokio::test]
    async fn test_missing_fields_default_conservatively() {
        let classifier = classifier_with_reply(r#"{"justification": "partial reply"}"#);

        let assessment = classifier.assess("t", "d").await;
        assert!(!assessment.can_use_likeness);
        assert_eq!(assessment.risk_level, RiskLevel::High);
        assert_eq!(assessment.justification, "partial reply");
        assert!(!assessment.recommendation.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_risk_level_maps_to_high() {
        let classifier = classifier_with_reply(
            r#"{"can_use_likeness": true, "risk_level": "purple"}"#,
        );

        let assessment = classifier.assess("t", "d").await;
        assert_eq!(assessment.risk_level, RiskLevel::High);
    }

    #[tokio::test]
    async fn test_malformed_reply_fails_closed() {
        let classifier = classifier_with_reply("I think it's fine to use their likeness!");

        let assessment = classifier.assess("t", "d").await;
        assert_eq!(assessment, RiskAssessment::conservative());
    }

    #[tokio::test]
    async fn test_empty_reply_fails_closed() {
        let classifier = classifier_with_reply("   ");

        let assessment = classifier.assess("t", "d").await;
        assert_eq!(assessment, RiskAssessment::conservative());
    }

    #[tokio::test]
    async fn test_provider_error_fails_closed() {
        let classifier = LikenessClassifier::new(Arc::new(FailingProvider));

        let assessment = classifier.assess("t", "d").await;
        assert!(!assessment.can_use_likeness);
        assert_eq!(assessment.risk_level, RiskLevel::High);
    }

    #[tokio::test]
    async fn test_timeout_fails_closed() {
        let classifier = LikenessClassifier::new(Arc::new(HangingProvider))
            .with_timeout(Duration::from_millis(10));

        let assessment = classifier.assess("t", "d").await;
        assert_eq!(assessment, RiskAssessment::conservative());
    }
}
