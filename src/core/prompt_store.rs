//! Prompt Version Store
//!
//! Named, versioned prompt templates for each pipeline step so the
//! orchestrator's instructions to the generation provider can be iterated
//! without code changes. Pure bookkeeping: the only business rule is that
//! the "latest" template for a step is the most recently updated one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::RwLock;
use uuid::Uuid;

// ============================================================================
// Types
// ============================================================================

/// Pipeline step a template is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStep {
    Events,
    Descriptions,
    Images,
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStep::Events => write!(f, "events"),
            PipelineStep::Descriptions => write!(f, "descriptions"),
            PipelineStep::Images => write!(f, "images"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PromptStoreError {
    #[error("Template not found: {0}")]
    TemplateNotFound(String),
}

pub type PromptStoreResult<T> = Result<T, PromptStoreError>;

/// A stored prompt template with its version history metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPromptTemplate {
    pub id: String,
    pub step: PipelineStep,
    pub system_prompt: Option<String>,
    pub user_prompt: Option<String>,
    pub version: u32,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Merge-patch for template updates; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct TemplatePatch {
    pub system_prompt: Option<String>,
    pub user_prompt: Option<String>,
    pub metadata: Option<HashMap<String, Value>>,
}

impl TemplatePatch {
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn user_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.user_prompt = Some(prompt.into());
        self
    }

    pub fn metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

// ============================================================================
// Prompt Store
// ============================================================================

pub struct PromptStore {
    templates: RwLock<HashMap<String, StoredPromptTemplate>>,
}

impl PromptStore {
    pub fn new() -> Self {
        Self {
            templates: RwLock::new(HashMap::new()),
        }
    }

    /// Save a new template at version 1, returning its id
    pub async fn save(
        &self,
        step: PipelineStep,
        system_prompt: Option<String>,
        user_prompt: Option<String>,
        metadata: Option<HashMap<String, Value>>,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let template = StoredPromptTemplate {
            id: id.clone(),
            step,
            system_prompt,
            user_prompt,
            version: 1,
            metadata: metadata.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };

        self.templates.write().await.insert(id.clone(), template);
        log::debug!("saved {step} prompt template {id}");
        id
    }

    pub async fn get(&self, id: &str) -> Option<StoredPromptTemplate> {
        self.templates.read().await.get(id).cloned()
    }

    /// Most recently updated template for the step
    pub async fn latest(&self, step: PipelineStep) -> Option<StoredPromptTemplate> {
        self.templates
            .read()
            .await
            .values()
            .filter(|template| template.step == step)
            .max_by_key(|template| template.updated_at)
            .cloned()
    }

    /// Apply a merge-patch: provided fields replace, metadata keys merge,
    /// version bumps, `updated_at` refreshes
    pub async fn update(
        &self,
        id: &str,
        patch: TemplatePatch,
    ) -> PromptStoreResult<StoredPromptTemplate> {
        let mut templates = self.templates.write().await;
        let template = templates
            .get_mut(id)
            .ok_or_else(|| PromptStoreError::TemplateNotFound(id.to_string()))?;

        if let Some(system_prompt) = patch.system_prompt {
            template.system_prompt = Some(system_prompt);
        }
        if let Some(user_prompt) = patch.user_prompt {
            template.user_prompt = Some(user_prompt);
        }
        if let Some(metadata) = patch.metadata {
            template.metadata.extend(metadata);
        }

        template.version += 1;
        template.updated_at = Utc::now();
        log::debug!("updated prompt template {id} to version {}", template.version);

        Ok(template.clone())
    }

    /// Templates for one step, or all steps, most recently updated first
    pub async fn list(&self, step: Option<PipelineStep>) -> Vec<StoredPromptTemplate> {
        let templates = self.templates.read().await;
        let mut filtered: Vec<_> = templates
            .values()
            .filter(|template| step.is_none_or(|s| template.step == s))
            .cloned()
            .collect();

        filtered.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        filtered
    }

    /// Remove a template; returns whether it existed
    pub async fn delete(&self, id: &str) -> bool {
        self.templates.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.templates.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.templates.read().await.is_empty()
    }
}

impl Default for PromptStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
