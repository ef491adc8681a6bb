//! Generation Orchestrator
//!
//! Sequences a generation invocation through its stages in strict order:
//! events draft, then descriptions with draft image prompts, then images.
//! Before each stage the credit ledger is charged and the content cache is
//! consulted; a cache hit elides the provider call but never the charge (the
//! price models the value delivered, not the compute spent). Provider calls
//! run through the bounded retry policy, and credits already deducted are
//! not refunded when retries exhaust or the caller aborts.
//!
//! The images stage consults the likeness classifier once per invocation
//! topic; when likeness is disallowed, every image prompt is rewritten by
//! the sanitizer before dispatch.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::core::cache::ContentCache;
use crate::core::config::{GenerationConfig, StageCosts};
use crate::core::credits::{CreditError, CreditLedger};
use crate::core::likeness::LikenessClassifier;
use crate::core::prompt_safety::PromptSanitizer;
use crate::core::prompt_store::{PipelineStep, PromptStore};

use super::parse;
use super::provider::{GenerationProvider, ImagePayload, ImageRequest, TextRequest};
use super::retry::RetryPolicy;
use super::{
    EventNarrative, GenerationError, GenerationOutcome, GenerationRequest, GenerationResult,
    PipelineStage, TimelineEvent,
};

// ============================================================================
// Default Stage Templates
// ============================================================================

const DEFAULT_EVENTS_SYSTEM: &str = "You are a historical researcher for a timeline publishing \
studio. Reply with JSON only.";
const DEFAULT_EVENTS_USER: &str = "List the {count} most significant dated events for the topic \
\"{topic}\". {description}Reply with a JSON array of objects with \"date\" and \"headline\" \
fields, ordered chronologically.";

const DEFAULT_DESCRIPTIONS_SYSTEM: &str = "You are a narrative editor for a timeline publishing \
studio. Reply with JSON only.";
const DEFAULT_DESCRIPTIONS_USER: &str = "For each event of the timeline \"{topic}\", write a \
two-sentence description and a draft image prompt. Events: {events}. Reply with a JSON array of \
objects with \"description\" and \"image_prompt\" fields, in the same order as the events.";

fn default_prompts(step: PipelineStep) -> (&'static str, &'static str) {
    match step {
        PipelineStep::Events => (DEFAULT_EVENTS_SYSTEM, DEFAULT_EVENTS_USER),
        PipelineStep::Descriptions | PipelineStep::Images => {
            (DEFAULT_DESCRIPTIONS_SYSTEM, DEFAULT_DESCRIPTIONS_USER)
        }
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Running totals for one invocation's billing
#[derive(Debug, Default)]
struct Billing {
    charged: u32,
    balance: u32,
}

pub struct GenerationOrchestrator {
    provider: Arc<dyn GenerationProvider>,
    ledger: Arc<CreditLedger>,
    cache: Arc<ContentCache>,
    prompts: Arc<PromptStore>,
    classifier: LikenessClassifier,
    sanitizer: PromptSanitizer,
    retry: RetryPolicy,
    stage_costs: StageCosts,
    provider_timeout: Duration,
}

impl GenerationOrchestrator {
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        ledger: Arc<CreditLedger>,
        cache: Arc<ContentCache>,
        prompts: Arc<PromptStore>,
        config: &GenerationConfig,
    ) -> Self {
        Self {
            classifier: LikenessClassifier::new(Arc::clone(&provider))
                .with_timeout(config.provider_timeout()),
            sanitizer: PromptSanitizer::new(),
            retry: config.retry_policy(),
            stage_costs: config.stage_costs.clone(),
            provider_timeout: config.provider_timeout(),
            provider,
            ledger,
            cache,
            prompts,
        }
    }

    /// Replace the sanitizer's detection heuristic
    pub fn with_sanitizer(mut self, sanitizer: PromptSanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Run the full pipeline for one request
    pub async fn generate(&self, request: GenerationRequest) -> GenerationResult<GenerationOutcome> {
        log::info!(
            "starting generation pipeline for user {} topic {:?}",
            request.user_id,
            request.topic_title
        );
        let mut billing = Billing::default();

        let events = self.events_stage(&request, &mut billing).await?;
        let narratives = self
            .descriptions_stage(&request, &events, &mut billing)
            .await?;
        let images = self.images_stage(&request, &narratives, &mut billing).await?;

        log::info!(
            "generation pipeline finished for user {}: {} events, {} images, {} credits charged",
            request.user_id,
            events.len(),
            images.len(),
            billing.charged
        );

        Ok(GenerationOutcome {
            descriptions: narratives.iter().map(|n| n.description.clone()).collect(),
            image_prompts: narratives.iter().map(|n| n.image_prompt.clone()).collect(),
            events,
            images,
            credits_charged: billing.charged,
            new_balance: billing.balance,
        })
    }

    // ------------------------------------------------------------------
    // Stages
    // ------------------------------------------------------------------

    async fn events_stage(
        &self,
        request: &GenerationRequest,
        billing: &mut Billing,
    ) -> GenerationResult<Vec<TimelineEvent>> {
        let stage = PipelineStage::EventsDraft;
        self.charge(request, stage, self.stage_costs.events, billing)
            .await?;

        let key = self.stage_key(stage, request, Value::Null)?;
        if let Some(cached) = self.cache.get_as::<Vec<TimelineEvent>>(&key).await {
            log::debug!("events stage served from cache for {:?}", request.topic_title);
            return Ok(cached);
        }

        let (system, user) = self.stage_prompts(PipelineStep::Events, request, None).await;
        let text_request = TextRequest::new(user).with_system(system).structured();

        let events: Vec<TimelineEvent> = self
            .retry
            .run(self.provider_timeout, || {
                let provider = Arc::clone(&self.provider);
                let text_request = text_request.clone();
                async move {
                    let response = provider.generate_text(text_request).await?;
                    parse::from_reply(&response.content)
                }
            })
            .await
            .map_err(|source| GenerationError::Provider { stage, source })?;

        self.store(&key, &events).await;
        Ok(events)
    }

    async fn descriptions_stage(
        &self,
        request: &GenerationRequest,
        events: &[TimelineEvent],
        billing: &mut Billing,
    ) -> GenerationResult<Vec<EventNarrative>> {
        let stage = PipelineStage::Descriptions;
        self.charge(request, stage, self.stage_costs.descriptions, billing)
            .await?;

        let key = self.stage_key(stage, request, json_value(events)?)?;
        if let Some(cached) = self.cache.get_as::<Vec<EventNarrative>>(&key).await {
            log::debug!(
                "descriptions stage served from cache for {:?}",
                request.topic_title
            );
            return Ok(cached);
        }

        let (system, user) = self
            .stage_prompts(PipelineStep::Descriptions, request, Some(events))
            .await;
        let text_request = TextRequest::new(user).with_system(system).structured();

        let narratives: Vec<EventNarrative> = self
            .retry
            .run(self.provider_timeout, || {
                let provider = Arc::clone(&self.provider);
                let text_request = text_request.clone();
                async move {
                    let response = provider.generate_text(text_request).await?;
                    parse::from_reply(&response.content)
                }
            })
            .await
            .map_err(|source| GenerationError::Provider { stage, source })?;

        self.store(&key, &narratives).await;
        Ok(narratives)
    }

    async fn images_stage(
        &self,
        request: &GenerationRequest,
        narratives: &[EventNarrative],
        billing: &mut Billing,
    ) -> GenerationResult<Vec<ImagePayload>> {
        let stage = PipelineStage::Images;
        self.charge(request, stage, self.stage_costs.images, billing)
            .await?;

        let prompts: Vec<&str> = narratives.iter().map(|n| n.image_prompt.as_str()).collect();
        let key = self.stage_key(stage, request, json_value(&prompts)?)?;
        if let Some(cached) = self.cache.get_as::<Vec<ImagePayload>>(&key).await {
            log::debug!("images stage served from cache for {:?}", request.topic_title);
            return Ok(cached);
        }

        // One likeness ruling per invocation topic, reused for every image
        let assessment = self
            .classifier
            .assess(
                &request.topic_title,
                request.topic_description.as_deref().unwrap_or(""),
            )
            .await;
        if !assessment.can_use_likeness {
            log::info!(
                "likeness restricted for topic {:?} ({} risk); image prompts will be rewritten",
                request.topic_title,
                assessment.risk_level
            );
        }

        let mut images = Vec::with_capacity(narratives.len());
        for narrative in narratives {
            let (prompt, style) = if assessment.can_use_likeness {
                (narrative.image_prompt.clone(), request.style.clone())
            } else {
                let sanitized =
                    self.sanitizer
                        .sanitize(&narrative.image_prompt, &request.style, Some(&assessment));
                if sanitized.prompt != narrative.image_prompt {
                    log::debug!("image prompt rewritten for likeness safety");
                }
                (sanitized.prompt, sanitized.style)
            };

            let image_request = ImageRequest::new(prompt, style);
            let image = self
                .retry
                .run(self.provider_timeout, || {
                    let provider = Arc::clone(&self.provider);
                    let image_request = image_request.clone();
                    async move { provider.generate_image(image_request).await }
                })
                .await
                .map_err(|source| GenerationError::Provider { stage, source })?;
            images.push(image);
        }

        self.store(&key, &images).await;
        Ok(images)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    async fn charge(
        &self,
        request: &GenerationRequest,
        stage: PipelineStage,
        amount: u32,
        billing: &mut Billing,
    ) -> GenerationResult<()> {
        match self
            .ledger
            .check_and_deduct(&request.user_id, amount, stage.action_label())
            .await
        {
            Ok(balance) => {
                billing.charged += amount;
                billing.balance = balance;
                Ok(())
            }
            Err(CreditError::InsufficientCredits { required, available }) => {
                log::warn!(
                    "pipeline for user {} stopped at {stage}: {required} credits required, \
                     {available} available",
                    request.user_id
                );
                Err(GenerationError::InsufficientCredits {
                    stage,
                    required,
                    available,
                })
            }
        }
    }

    /// Canonical content hash for a stage's cache slot
    fn stage_key(
        &self,
        stage: PipelineStage,
        request: &GenerationRequest,
        inputs: Value,
    ) -> GenerationResult<String> {
        ContentCache::hash(&serde_json::json!({
            "stage": stage.to_string(),
            "topic": request.topic_title,
            "description": request.topic_description,
            "style": request.style,
            "count": request.event_count,
            "inputs": inputs,
        }))
        .map_err(|e| GenerationError::Internal(e.to_string()))
    }

    async fn store<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(value) => self.cache.set(key, value).await,
            Err(e) => log::warn!("failed to cache stage result: {e}"),
        }
    }

    /// Stage instructions: the latest stored template for the step, or the
    /// built-in defaults, with placeholders substituted
    async fn stage_prompts(
        &self,
        step: PipelineStep,
        request: &GenerationRequest,
        events: Option<&[TimelineEvent]>,
    ) -> (String, String) {
        let (default_system, default_user) = default_prompts(step);
        let template = self.prompts.latest(step).await;

        let (system, user) = match template {
            Some(template) => (
                template
                    .system_prompt
                    .unwrap_or_else(|| default_system.to_string()),
                template
                    .user_prompt
                    .unwrap_or_else(|| default_user.to_string()),
            ),
            None => (default_system.to_string(), default_user.to_string()),
        };

        (
            render(&system, request, events),
            render(&user, request, events),
        )
    }
}

fn render(template: &str, request: &GenerationRequest, events: Option<&[TimelineEvent]>) -> String {
    let description = request
        .topic_description
        .as_deref()
        .map(|d| format!("Context: {d}. "))
        .unwrap_or_default();
    let events_json = events
        .map(|e| serde_json::to_string(e).unwrap_or_default())
        .unwrap_or_default();

    template
        .replace("{topic}", &request.topic_title)
        .replace("{description}", &description)
        .replace("{count}", &request.event_count.to_string())
        .replace("{events}", &events_json)
}

fn json_value<T: Serialize + ?Sized>(value: &T) -> GenerationResult<Value> {
    serde_json::to_value(value).map_err(|e| GenerationError::Internal(e.to_string()))
}

// ============================================================================
// Tests
// ============================================================================
