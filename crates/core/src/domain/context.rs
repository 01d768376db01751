use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::intent::{Entity, IntentName};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Customer,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub speaker: Speaker,
    pub text: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub name: String,
    #[serde(default)]
    pub segment: Option<String>,
}

/// Conversation state supplied by the caller. The router only reads it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    #[serde(default)]
    pub current_intent: Option<IntentName>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
    #[serde(default)]
    pub customer: Option<CustomerProfile>,
    #[serde(default)]
    pub preferences: BTreeMap<String, String>,
    #[serde(default)]
    pub negotiation_history: Vec<String>,
    #[serde(default)]
    pub upsell_history: Vec<String>,
}

impl ConversationContext {
    pub fn customer_name(&self) -> Option<&str> {
        self.customer
            .as_ref()
            .map(|customer| customer.name.trim())
            .filter(|name| !name.is_empty())
    }

    pub fn preference(&self, key: &str) -> Option<&str> {
        self.preferences.get(key).map(String::as_str)
    }

    pub fn is_first_turn(&self) -> bool {
        !self.history.iter().any(|turn| turn.speaker == Speaker::Assistant)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: String,
    pub name: String,
    pub category: String,
    pub unit: String,
    pub unit_price: Decimal,
    pub stock_quantity: Decimal,
    #[serde(default)]
    pub description: Option<String>,
}

impl InventoryItem {
    /// Matches a free-text product mention against this item, tolerating case
    /// and simple plural forms.
    pub fn matches_mention(&self, mention: &str) -> bool {
        let mention = singular_form(&mention.trim().to_ascii_lowercase());
        if mention.is_empty() {
            return false;
        }
        let name = singular_form(&self.name.trim().to_ascii_lowercase());
        let id = self.id.trim().to_ascii_lowercase();
        name == mention || id == mention || name.split_whitespace().any(|word| word == mention)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    #[serde(default)]
    pub product_id: Option<String>,
    pub title: String,
    pub discount_pct: Decimal,
}

/// Business data supplied by the caller alongside the conversation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessContext {
    #[serde(default)]
    pub inventory: Vec<InventoryItem>,
    #[serde(default)]
    pub promotions: Vec<Promotion>,
    #[serde(default)]
    pub conversation: ConversationContext,
}

impl BusinessContext {
    pub fn find_product(&self, mention: &str) -> Option<&InventoryItem> {
        self.inventory.iter().find(|item| item.matches_mention(mention))
    }

    /// Distinct categories in first-seen inventory order.
    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> = Vec::new();
        for item in &self.inventory {
            let category = item.category.trim();
            if !category.is_empty() && !categories.contains(&category) {
                categories.push(category);
            }
        }
        categories
    }
}

pub fn singular_form(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{stem}y");
        }
    }
    if let Some(stem) = word.strip_suffix("oes") {
        return format!("{stem}o");
    }
    if ["ches", "shes", "xes", "sses"].iter().any(|suffix| word.ends_with(suffix)) {
        if let Some(stem) = word.strip_suffix("es") {
            return stem.to_string();
        }
    }
    if word.ends_with("ss") {
        return word.to_string();
    }
    word.strip_suffix('s').filter(|stem| stem.len() > 1).unwrap_or(word).to_string()
}
