//! Lexical entity extraction over tokenized customer messages.

use std::collections::BTreeSet;

use harvest_core::domain::context::singular_form;
use harvest_core::domain::intent::{Entity, EntityType, ExtractionResult};
use harvest_core::errors::StageError;

use tracing::debug;

use crate::text::{
    canonical_unit, is_currency_symbol, is_currency_word, is_numeric_literal, parse_number, tokenize,
};

pub trait EntityExtractor: Send + Sync {
    fn extract(&self, message: &str) -> Result<ExtractionResult, StageError>;

    fn supported_entity_types(&self) -> Vec<EntityType>;
}

const QUANTITY_CONFIDENCE: f64 = 0.9;
const UNIT_CONFIDENCE: f64 = 0.85;
const SYMBOL_PRICE_CONFIDENCE: f64 = 0.9;
const WORD_PRICE_CONFIDENCE: f64 = 0.85;
const KNOWN_PRODUCT_CONFIDENCE: f64 = 0.85;
const INFERRED_PRODUCT_CONFIDENCE: f64 = 0.6;

const DEFAULT_PRODUCE: &[&str] = &[
    "apple", "apricot", "asparagus", "banana", "basil", "bean", "beet", "blackberry",
    "blueberry", "bread", "broccoli", "butter", "cabbage", "carrot", "cauliflower", "celery",
    "cheese", "cherry", "chicken", "corn", "cream", "cucumber", "egg", "garlic", "grape",
    "green bean", "herb", "honey", "jam", "kale", "leek", "lettuce", "melon", "milk",
    "mushroom", "onion", "peach", "pear", "pepper", "plum", "potato", "pumpkin", "radish",
    "raspberry", "spinach", "squash", "strawberry", "sweet corn", "sweet potato", "tomato",
    "watermelon", "yogurt", "zucchini",
];

/// Words skipped when looking for the noun after `<unit> of`.
const FILLER_WORDS: &[&str] = &[
    "a", "an", "the", "your", "those", "these", "some", "fresh", "organic", "ripe", "local",
    "nice", "good", "best", "red", "green", "yellow", "big", "small", "large",
];

/// Deterministic extractor for quantities, units, prices and produce names.
#[derive(Clone, Debug)]
pub struct LexicalEntityExtractor {
    vocabulary: BTreeSet<String>,
}

impl Default for LexicalEntityExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl LexicalEntityExtractor {
    pub fn new() -> Self {
        Self { vocabulary: DEFAULT_PRODUCE.iter().map(|name| (*name).to_string()).collect() }
    }

    /// Adds shop-specific product names; matching is case-insensitive and
    /// tolerant of simple plurals.
    pub fn with_vocabulary<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let normalized = singular_phrase(&name.as_ref().trim().to_lowercase());
            if !normalized.is_empty() {
                self.vocabulary.insert(normalized);
            }
        }
        self
    }

    pub fn scan(&self, message: &str) -> Vec<Entity> {
        let tokens = split_compounds(tokenize(message));
        let mut entities = Vec::new();
        let mut inferred_product_at: Option<usize> = None;
        let mut index = 0;

        while index < tokens.len() {
            let token = tokens[index].as_str();

            if let Some(amount) = symbol_price(token) {
                entities.push(Entity::new(EntityType::Price, amount, SYMBOL_PRICE_CONFIDENCE));
                index += 1;
                continue;
            }

            if let Some(number) = parse_number(token) {
                let next = tokens.get(index + 1).map(String::as_str);
                if next.is_some_and(is_currency_word) {
                    entities.push(Entity::new(
                        EntityType::Price,
                        number.to_string(),
                        WORD_PRICE_CONFIDENCE,
                    ));
                    index += 2;
                    continue;
                }

                entities.push(Entity::new(EntityType::Quantity, number.to_string(), QUANTITY_CONFIDENCE));
                index += 1;

                if let Some(unit) = next.and_then(canonical_unit) {
                    entities.push(Entity::new(EntityType::Unit, unit, UNIT_CONFIDENCE));
                    index += 1;
                    if tokens.get(index).map(String::as_str) == Some("of") {
                        inferred_product_at = first_content_word(&tokens, index + 1);
                    }
                }
                continue;
            }

            if is_numeric_literal(token) {
                debug!(
                    event_name = "extractor.quantity.unparsed",
                    token_length = token.len(),
                    "numeric token out of range; quantity skipped"
                );
                index += 1;
                if let Some(unit) = tokens.get(index).map(String::as_str).and_then(canonical_unit) {
                    entities.push(Entity::new(EntityType::Unit, unit, UNIT_CONFIDENCE));
                    index += 1;
                    if tokens.get(index).map(String::as_str) == Some("of") {
                        inferred_product_at = first_content_word(&tokens, index + 1);
                    }
                }
                continue;
            }

            if let Some(next) = tokens.get(index + 1) {
                let phrase = format!("{token} {next}");
                if self.is_known_product(&phrase) {
                    entities.push(Entity::new(
                        EntityType::ProductName,
                        phrase,
                        KNOWN_PRODUCT_CONFIDENCE,
                    ));
                    index += 2;
                    continue;
                }
            }

            if self.is_known_product(token) {
                entities.push(Entity::new(EntityType::ProductName, token, KNOWN_PRODUCT_CONFIDENCE));
            } else if inferred_product_at == Some(index) && is_plain_word(token) {
                entities.push(Entity::new(
                    EntityType::ProductName,
                    token,
                    INFERRED_PRODUCT_CONFIDENCE,
                ));
            }
            index += 1;
        }

        entities
    }

    fn is_known_product(&self, candidate: &str) -> bool {
        self.vocabulary.contains(&singular_phrase(candidate))
    }
}

impl EntityExtractor for LexicalEntityExtractor {
    fn extract(&self, message: &str) -> Result<ExtractionResult, StageError> {
        Ok(ExtractionResult::from_entities(self.scan(message)))
    }

    fn supported_entity_types(&self) -> Vec<EntityType> {
        vec![EntityType::Quantity, EntityType::Unit, EntityType::ProductName, EntityType::Price]
    }
}

/// Splits glued quantity tokens such as `5kg` or `3dollars` into number and suffix.
fn split_compounds(tokens: Vec<String>) -> Vec<String> {
    let mut split = Vec::with_capacity(tokens.len());
    for token in tokens {
        let boundary = token.find(|c: char| c.is_alphabetic());
        match boundary {
            Some(position) if position > 0 => {
                let (number, suffix) = token.split_at(position);
                let glued_unit = canonical_unit(suffix).is_some() || is_currency_word(suffix);
                if glued_unit && parse_number(number).is_some() {
                    split.push(number.to_string());
                    split.push(suffix.to_string());
                } else {
                    split.push(token);
                }
            }
            _ => split.push(token),
        }
    }
    split
}

/// `$5.99`, `€3` or `5.99$`.
fn symbol_price(token: &str) -> Option<String> {
    let stripped = token
        .strip_prefix(is_currency_symbol)
        .or_else(|| token.strip_suffix(is_currency_symbol))?;
    parse_number(stripped).map(|amount| amount.to_string())
}

fn first_content_word(tokens: &[String], start: usize) -> Option<usize> {
    (start..tokens.len()).find(|&position| !FILLER_WORDS.contains(&tokens[position].as_str()))
}

fn is_plain_word(token: &str) -> bool {
    token.len() > 1 && token.chars().all(char::is_alphabetic)
}

fn singular_phrase(phrase: &str) -> String {
    phrase.split_whitespace().map(singular_form).collect::<Vec<_>>().join(" ")
}
