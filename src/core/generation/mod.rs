//! Generation Pipeline
//!
//! The orchestrated path from a timeline topic to dated events, narrative
//! descriptions, and illustrative images. Stages run strictly in order
//! within one invocation; every chargeable stage is gated by the credit
//! ledger and memoized through the content cache.
//!
//! # Module Structure
//!
//! - `provider`: the opaque generation-capability seam
//! - `retry`: bounded retry policy for provider calls
//! - `orchestrator`: stage sequencing, billing, caching, likeness gating

pub mod orchestrator;
pub(crate) mod parse;
pub mod provider;
pub mod retry;

pub use orchestrator::GenerationOrchestrator;
pub use provider::{
    GenerationProvider, ImagePayload, ImageRequest, ProviderError, ProviderResult, TextRequest,
    TextResponse,
};
pub use retry::RetryPolicy;

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Stages
// ============================================================================

/// Ordered steps of a generation invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    EventsDraft,
    Descriptions,
    Images,
}

impl PipelineStage {
    /// Ledger action label recorded for this stage's charge
    pub fn action_label(&self) -> &'static str {
        match self {
            PipelineStage::EventsDraft => "generate_events",
            PipelineStage::Descriptions => "generate_descriptions",
            PipelineStage::Images => "generate_images",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::EventsDraft => write!(f, "events_draft"),
            PipelineStage::Descriptions => write!(f, "descriptions"),
            PipelineStage::Images => write!(f, "images"),
        }
    }
}

// ============================================================================
// Request/Result Types
// ============================================================================

/// A generation request entering the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub user_id: String,
    pub topic_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_description: Option<String>,
    pub style: String,
    pub event_count: usize,
}

impl GenerationRequest {
    pub fn new(user_id: impl Into<String>, topic_title: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            topic_title: topic_title.into(),
            topic_description: None,
            style: "Photorealistic".to_string(),
            event_count: 8,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.topic_description = Some(description.into());
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    pub fn with_event_count(mut self, count: usize) -> Self {
        self.event_count = count;
        self
    }
}

/// One dated event on the drafted timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub date: String,
    pub headline: String,
}

/// Narrative text and draft image prompt for one event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventNarrative {
    pub description: String,
    pub image_prompt: String,
}

/// Successful pipeline result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub events: Vec<TimelineEvent>,
    pub descriptions: Vec<String>,
    pub image_prompts: Vec<String>,
    pub images: Vec<ImagePayload>,
    pub credits_charged: u32,
    pub new_balance: u32,
}

// ============================================================================
// Errors
// ============================================================================

/// Errors that terminate a pipeline invocation
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Insufficient credits at {stage}: {required} required, {available} available")]
    InsufficientCredits {
        stage: PipelineStage,
        required: u32,
        available: u32,
    },

    #[error("Provider failure at {stage}: {source}")]
    Provider {
        stage: PipelineStage,
        #[source]
        source: ProviderError,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GenerationError {
    /// Stage at which the invocation failed, if it reached one
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            GenerationError::InsufficientCredits { stage, .. }
            | GenerationError::Provider { stage, .. } => Some(*stage),
            GenerationError::Internal(_) => None,
        }
    }
}

pub type GenerationResult<T> = Result<T, GenerationError>;
