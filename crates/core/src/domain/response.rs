use serde::{Deserialize, Serialize};

use crate::domain::intent::{Entity, Intent};

/// Text returned when response generation cannot produce anything usable.
pub const FALLBACK_RESPONSE: &str =
    "I'm having trouble understanding your request right now. Please try again in a moment.";
pub const FALLBACK_CONFIDENCE: f64 = 0.2;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(default)]
    pub include_upsell: bool,
    #[serde(default)]
    pub include_negotiation: bool,
    #[serde(default)]
    pub max_response_length: Option<usize>,
}

/// Generator output before the router attaches provider and timing metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneratedText {
    pub text: String,
    pub confidence: f64,
    pub personality_applied: bool,
    pub upsell_included: bool,
    pub negotiation_included: bool,
}

impl GeneratedText {
    pub fn plain(text: impl Into<String>, confidence: f64) -> Self {
        Self {
            text: text.into(),
            confidence,
            personality_applied: false,
            upsell_included: false,
            negotiation_included: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub provider: String,
    pub processing_time_ms: u64,
    pub personality_applied: bool,
    pub upsell_included: bool,
    pub negotiation_included: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub text: String,
    pub confidence: f64,
    pub metadata: GenerationMetadata,
}

impl GenerationResult {
    pub fn from_generated(generated: GeneratedText, provider: &str, processing_time_ms: u64) -> Self {
        Self {
            text: generated.text,
            confidence: generated.confidence,
            metadata: GenerationMetadata {
                provider: provider.to_string(),
                processing_time_ms,
                personality_applied: generated.personality_applied,
                upsell_included: generated.upsell_included,
                negotiation_included: generated.negotiation_included,
            },
        }
    }

    pub fn fallback(provider: &str, processing_time_ms: u64) -> Self {
        Self::from_generated(
            GeneratedText::plain(FALLBACK_RESPONSE, FALLBACK_CONFIDENCE),
            provider,
            processing_time_ms,
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessedMessage {
    pub intent: Intent,
    pub entities: Vec<Entity>,
    pub response: GenerationResult,
    pub confidence: f64,
}
