//! Generation Provider Seam
//!
//! The pipeline treats the underlying generation capability as a black box:
//! something that accepts a prompt and returns text or an image. Transport,
//! authentication, and model identity live entirely behind this trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ============================================================================
// Error Types
// ============================================================================

/// Errors surfaced by a generation provider
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Content policy rejection: {0}")]
    ContentPolicy(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timeout")]
    Timeout,
}

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request for a text generation call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    pub user_prompt: String,
    /// Hint that the reply should be machine-readable JSON
    #[serde(default)]
    pub structured_json: bool,
}

impl TextRequest {
    pub fn new(user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: None,
            user_prompt: user_prompt.into(),
            structured_json: false,
        }
    }

    pub fn with_system(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn structured(mut self) -> Self {
        self.structured_json = true;
        self
    }
}

/// Response from a text generation call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextResponse {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl TextResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: None,
        }
    }
}

/// Request for an image generation call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRequest {
    pub prompt: String,
    pub style: String,
    #[serde(default)]
    pub reference_images: Vec<String>,
}

impl ImageRequest {
    pub fn new(prompt: impl Into<String>, style: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            style: style.into(),
            reference_images: Vec::new(),
        }
    }

    pub fn with_reference(mut self, url: impl Into<String>) -> Self {
        self.reference_images.push(url.into());
        self
    }
}

/// Generated image payload: providers return either a hosted URL or raw bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImagePayload {
    Url(String),
    Bytes(Vec<u8>),
}

// ============================================================================
// Provider Trait
// ============================================================================

/// Trait implemented by the platform's generation backends
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Generate text from a prompt pair
    async fn generate_text(&self, request: TextRequest) -> ProviderResult<TextResponse>;

    /// Generate an image from a prompt and style
    async fn generate_image(&self, request: ImageRequest) -> ProviderResult<ImagePayload>;
}
