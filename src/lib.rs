//! Chronoweave Generation Core
//!
//! The AI content-generation subsystem of the Chronoweave timeline studio.
//! Turns a user-supplied timeline topic into dated events, narrative
//! descriptions, and illustrative images while:
//!
//! - metering a per-user credit balance so generation cannot be used for
//!   free or double-charged,
//! - gating real-person likeness through a legal-risk classifier that fails
//!   closed,
//! - rewriting image prompts that would depict protected subjects
//!   photorealistically,
//! - avoiding redundant paid provider calls through a content-addressed,
//!   TTL-bounded cache.
//!
//! Identity, persistence, payments, asset storage, and the generation
//! provider itself are external collaborators reached through narrow
//! interfaces; the provider is an injected
//! [`crate::core::generation::GenerationProvider`] trait object.
//!
//! # Module Structure
//!
//! - [`crate::core::cache`]: content-addressed result cache
//! - [`crate::core::credits`]: atomic credit ledger
//! - [`crate::core::likeness`]: likeness risk classifier
//! - [`crate::core::prompt_safety`]: image prompt sanitizer
//! - [`crate::core::prompt_store`]: versioned prompt templates
//! - [`crate::core::generation`]: pipeline orchestration, provider seam, retries
//! - [`crate::core::config`]: runtime tunables

pub mod core;

// Re-export the main service types
pub use crate::core::cache::{CacheStats, ContentCache};
pub use crate::core::config::{GenerationConfig, RetrySettings, StageCosts};
pub use crate::core::credits::{AuditRecord, CreditAccount, CreditError, CreditLedger};
pub use crate::core::generation::{
    EventNarrative, GenerationError, GenerationOrchestrator, GenerationOutcome,
    GenerationProvider, GenerationRequest, ImagePayload, ImageRequest, PipelineStage,
    ProviderError, ProviderResult, RetryPolicy, TextRequest, TextResponse, TimelineEvent,
};
pub use crate::core::likeness::{InferredAttributes, LikenessClassifier, RiskAssessment, RiskLevel};
pub use crate::core::prompt_safety::{
    IdentifyingDetector, KeywordDetector, PromptSanitizer, SanitizedPrompt,
};
pub use crate::core::prompt_store::{
    PipelineStep, PromptStore, PromptStoreError, StoredPromptTemplate, TemplatePatch,
};
