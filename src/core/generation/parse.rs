//! Lenient JSON extraction from provider replies.
//!
//! Models wrap structured replies in code fences or prose often enough that
//! strict parsing would fail healthy calls. The scan takes the outermost
//! object or array and leaves stricter validation to the typed decode.

use serde::de::DeserializeOwned;

use super::provider::{ProviderError, ProviderResult};

/// Extract the outermost JSON object from a reply
pub(crate) fn extract_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Extract the outermost JSON array from a reply
pub(crate) fn extract_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}

/// Decode a typed value from a possibly fenced or prose-wrapped reply.
///
/// Tries the raw text first, then whichever of the outermost object/array
/// fragments starts earliest. An unparsable reply is an
/// [`ProviderError::InvalidResponse`], which callers treat as retryable.
pub(crate) fn from_reply<T: DeserializeOwned>(text: &str) -> ProviderResult<T> {
    if let Ok(value) = serde_json::from_str(text.trim()) {
        return Ok(value);
    }

    let candidates = match (text.find('['), text.find('{')) {
        (Some(a), Some(o)) if a < o => [extract_array(text), extract_object(text)],
        _ => [extract_object(text), extract_array(text)],
    };

    let mut last_error = None;
    for fragment in candidates.into_iter().flatten() {
        match serde_json::from_str(fragment) {
            Ok(value) => return Ok(value),
            Err(e) => last_error = Some(e),
        }
    }

    Err(match last_error {
        Some(e) => ProviderError::InvalidResponse(format!("unparsable JSON reply: {e}")),
        None => ProviderError::InvalidResponse("reply contains no JSON".to_string()),
    })
}
