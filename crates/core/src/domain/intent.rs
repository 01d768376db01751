use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Confidence at or above which an intent counts as recognized.
pub const RECOGNITION_THRESHOLD: f64 = 0.5;

/// Closed catalogue of customer intents.
///
/// Declaration order is significant: classifiers break score ties in favour of
/// the earlier variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentName {
    Greeting,
    PriceInquiry,
    BrowseProducts,
    AddToCart,
    ProductInquiry,
    NegotiatePrice,
    Help,
    Farewell,
    Unknown,
}

impl IntentName {
    pub const CATALOGUE: [IntentName; 9] = [
        Self::Greeting,
        Self::PriceInquiry,
        Self::BrowseProducts,
        Self::AddToCart,
        Self::ProductInquiry,
        Self::NegotiatePrice,
        Self::Help,
        Self::Farewell,
        Self::Unknown,
    ];

    pub fn from_label(value: &str) -> Self {
        let normalized = normalize_label(value);
        Self::CATALOGUE
            .into_iter()
            .find(|intent| intent.as_str() == normalized)
            .unwrap_or(Self::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::PriceInquiry => "price_inquiry",
            Self::BrowseProducts => "browse_products",
            Self::AddToCart => "add_to_cart",
            Self::ProductInquiry => "product_inquiry",
            Self::NegotiatePrice => "negotiate_price",
            Self::Help => "help",
            Self::Farewell => "farewell",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for IntentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized names map to [`IntentName::Unknown`] so that labels produced by
/// newer strategies never fail to parse.
impl FromStr for IntentName {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_label(value))
    }
}

impl<'de> Deserialize<'de> for IntentName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_label(&raw))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Quantity,
    Unit,
    ProductName,
    Price,
    Other,
}

impl EntityType {
    pub const ALL: [EntityType; 5] =
        [Self::Quantity, Self::Unit, Self::ProductName, Self::Price, Self::Other];

    pub fn from_label(value: &str) -> Self {
        let normalized = normalize_label(value);
        Self::ALL
            .into_iter()
            .find(|entity_type| entity_type.as_str() == normalized)
            .unwrap_or(Self::Other)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quantity => "quantity",
            Self::Unit => "unit",
            Self::ProductName => "product_name",
            Self::Price => "price",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_label(value))
    }
}

impl<'de> Deserialize<'de> for EntityType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_label(&raw))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub value: String,
    pub confidence: f64,
}

impl Entity {
    pub fn new(entity_type: EntityType, value: impl Into<String>, confidence: f64) -> Self {
        Self { entity_type, value: value.into(), confidence: clamp_confidence(confidence) }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub name: IntentName,
    pub confidence: f64,
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl Intent {
    pub fn new(name: IntentName, confidence: f64) -> Self {
        Self { name, confidence: clamp_confidence(confidence), entities: Vec::new() }
    }

    pub fn unknown(confidence: f64) -> Self {
        Self::new(IntentName::Unknown, confidence)
    }

    pub fn with_entities(mut self, entities: Vec<Entity>) -> Self {
        self.entities = entities;
        self
    }

    pub fn is_recognized(&self) -> bool {
        self.name != IntentName::Unknown && self.confidence >= RECOGNITION_THRESHOLD
    }

    /// The name callers should act on: sub-threshold intents behave as unknown.
    pub fn effective_name(&self) -> IntentName {
        if self.is_recognized() {
            self.name
        } else {
            IntentName::Unknown
        }
    }

    pub fn entities_of(&self, entity_type: EntityType) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(move |entity| entity.entity_type == entity_type)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub intent: Intent,
    pub confidence: f64,
}

impl ClassificationResult {
    pub fn new(intent: Intent) -> Self {
        let confidence = intent.confidence;
        Self { intent, confidence }
    }

    pub fn unknown(confidence: f64) -> Self {
        Self::new(Intent::unknown(confidence))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub entities: Vec<Entity>,
    pub confidence: f64,
}

impl ExtractionResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Confidence is the mean entity confidence, or zero when nothing was found.
    pub fn from_entities(entities: Vec<Entity>) -> Self {
        if entities.is_empty() {
            return Self::empty();
        }
        let total: f64 = entities.iter().map(|entity| entity.confidence).sum();
        let confidence = clamp_confidence(total / entities.len() as f64);
        Self { entities, confidence }
    }
}

fn normalize_label(value: &str) -> String {
    value.trim().to_ascii_lowercase().replace(['-', ' '], "_")
}

pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
