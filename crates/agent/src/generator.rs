//! Template response generation and its optional post-processing stages.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::warn;

use harvest_core::domain::context::{BusinessContext, ConversationContext, InventoryItem};
use harvest_core::domain::intent::{Entity, EntityType, Intent, IntentName};
use harvest_core::domain::response::{GeneratedText, GenerationOptions};
use harvest_core::errors::StageError;

use crate::collaborators::{
    FriendlyPersonality, NegotiationService, PersonalityService, PromotionUpsell, UpsellService,
    VolumeNegotiation,
};
use crate::extractor::{EntityExtractor, LexicalEntityExtractor};
use crate::text::{parse_number, truncate_chars};

pub trait ResponseGenerator: Send + Sync {
    fn generate(
        &self,
        intent: &Intent,
        context: &ConversationContext,
        business: &BusinessContext,
        raw_message: Option<&str>,
        options: &GenerationOptions,
    ) -> Result<GeneratedText, StageError>;
}

pub const RESOLVED_CONFIDENCE: f64 = 0.9;
pub const CLARIFYING_CONFIDENCE: f64 = 0.7;
pub const UNKNOWN_CONFIDENCE: f64 = 0.5;

const HELP_TEXT: &str = "I can show you what we have, check prices, add items to your cart, \
and answer questions about our produce. What would you like to do?";
const UNKNOWN_TEXT: &str = "I'm not sure I understood that. You can ask me what we have, \
check a price, or add something to your cart.";

/// Template-based generator with personality, upsell and negotiation stages.
#[derive(Clone)]
pub struct TemplateResponseGenerator {
    extractor: Arc<dyn EntityExtractor>,
    personality: Arc<dyn PersonalityService>,
    upsell: Arc<dyn UpsellService>,
    negotiation: Arc<dyn NegotiationService>,
}

impl Default for TemplateResponseGenerator {
    fn default() -> Self {
        Self {
            extractor: Arc::new(LexicalEntityExtractor::new()),
            personality: Arc::new(FriendlyPersonality),
            upsell: Arc::new(PromotionUpsell),
            negotiation: Arc::new(VolumeNegotiation::default()),
        }
    }
}

impl TemplateResponseGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn EntityExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_personality(mut self, personality: Arc<dyn PersonalityService>) -> Self {
        self.personality = personality;
        self
    }

    pub fn with_upsell(mut self, upsell: Arc<dyn UpsellService>) -> Self {
        self.upsell = upsell;
        self
    }

    pub fn with_negotiation(mut self, negotiation: Arc<dyn NegotiationService>) -> Self {
        self.negotiation = negotiation;
        self
    }

    /// Product and quantity from the intent, then the raw message, then the
    /// entities accumulated in the conversation.
    fn resolve(
        &self,
        intent: &Intent,
        context: &ConversationContext,
        raw_message: Option<&str>,
    ) -> Resolved {
        let from_message = raw_message
            .and_then(|message| self.extractor.extract(message).ok())
            .map(|result| result.entities)
            .unwrap_or_default();
        let sources = [intent.entities.as_slice(), from_message.as_slice(), context.entities.as_slice()];

        let product = first_value(&sources, EntityType::ProductName);
        let quantity = first_value(&sources, EntityType::Quantity).and_then(|value| parse_number(&value));
        Resolved { product, quantity }
    }

    fn base_response(
        &self,
        intent: &Intent,
        context: &ConversationContext,
        business: &BusinessContext,
        resolved: &Resolved,
    ) -> Result<(String, f64), StageError> {
        match intent.effective_name() {
            IntentName::Greeting => {
                let text = match context.customer_name() {
                    Some(name) => format!(
                        "Hello {name}! Welcome to our farm shop. How can I help you today?"
                    ),
                    None => "Hello! Welcome to our farm shop. How can I help you today?".to_string(),
                };
                Ok((text, RESOLVED_CONFIDENCE))
            }
            IntentName::BrowseProducts => {
                let categories = business.categories();
                if categories.is_empty() {
                    return Ok((
                        "We don't have any products available right now. Please check back soon."
                            .to_string(),
                        RESOLVED_CONFIDENCE,
                    ));
                }
                Ok((
                    format!(
                        "We currently have: {}. What would you like to see?",
                        categories.join(", ")
                    ),
                    RESOLVED_CONFIDENCE,
                ))
            }
            IntentName::PriceInquiry => price_response(business, resolved),
            IntentName::AddToCart => cart_response(business, resolved),
            IntentName::ProductInquiry => Ok(product_response(business, resolved)),
            IntentName::NegotiatePrice => Ok((
                "I understand you're looking for a better price. Let me see what I can do."
                    .to_string(),
                RESOLVED_CONFIDENCE,
            )),
            IntentName::Help => Ok((HELP_TEXT.to_string(), CLARIFYING_CONFIDENCE)),
            IntentName::Farewell => {
                let text = match context.customer_name() {
                    Some(name) => format!("Thank you for visiting, {name}! Have a great day."),
                    None => "Thank you for visiting! Have a great day.".to_string(),
                };
                Ok((text, RESOLVED_CONFIDENCE))
            }
            IntentName::Unknown => Ok((UNKNOWN_TEXT.to_string(), UNKNOWN_CONFIDENCE)),
        }
    }
}

impl ResponseGenerator for TemplateResponseGenerator {
    fn generate(
        &self,
        intent: &Intent,
        context: &ConversationContext,
        business: &BusinessContext,
        raw_message: Option<&str>,
        options: &GenerationOptions,
    ) -> Result<GeneratedText, StageError> {
        let resolved = self.resolve(intent, context, raw_message);
        let (text, confidence) = self.base_response(intent, context, business, &resolved)?;
        let mut generated = GeneratedText::plain(text, confidence);

        match self.personality.personalize(&generated.text, intent, context) {
            Ok(Some(text)) => {
                generated.text = text;
                generated.personality_applied = true;
            }
            Ok(None) => {}
            Err(error) => warn!(
                event_name = "generator.personality.skipped",
                error = %error,
                "personality stage failed; keeping base text"
            ),
        }

        if options.include_upsell {
            let suggestion = self.upsell.is_eligible(intent, business).and_then(|eligible| {
                if eligible {
                    self.upsell.suggestion(intent, business)
                } else {
                    Ok(None)
                }
            });
            match suggestion {
                Ok(Some(suggestion)) => {
                    append_sentence(&mut generated.text, &suggestion);
                    generated.upsell_included = true;
                }
                Ok(None) => {}
                Err(error) => warn!(
                    event_name = "generator.upsell.skipped",
                    error = %error,
                    "upsell stage failed; response sent without suggestion"
                ),
            }
        }

        if options.include_negotiation {
            match self.negotiation.propose(intent, resolved.quantity, business) {
                Ok(Some(proposal)) => {
                    append_sentence(&mut generated.text, &proposal);
                    generated.negotiation_included = true;
                }
                Ok(None) => {}
                Err(error) => warn!(
                    event_name = "generator.negotiation.skipped",
                    error = %error,
                    "negotiation stage failed; response sent without offer"
                ),
            }
        }

        if let Some(limit) = options.max_response_length {
            truncate_chars(&mut generated.text, limit);
        }

        Ok(generated)
    }
}

struct Resolved {
    product: Option<String>,
    quantity: Option<Decimal>,
}

fn first_value(sources: &[&[Entity]], entity_type: EntityType) -> Option<String> {
    sources.iter().find_map(|entities| {
        entities.iter().find(|entity| entity.entity_type == entity_type).map(|entity| entity.value.clone())
    })
}

fn price_response(business: &BusinessContext, resolved: &Resolved) -> Result<(String, f64), StageError> {
    let Some(mention) = resolved.product.as_deref() else {
        return Ok(("Which product would you like a price for?".to_string(), CLARIFYING_CONFIDENCE));
    };
    let Some(item) = business.find_product(mention) else {
        return Ok((not_carried(mention, business), CLARIFYING_CONFIDENCE));
    };

    let unit_price = format_amount(item.unit_price);
    let Some(quantity) = resolved.quantity else {
        return Ok((
            format!("{} is {unit_price} per {}.", item.name, item.unit),
            RESOLVED_CONFIDENCE,
        ));
    };

    let total = line_total(item, quantity)?;
    let mut text = format!(
        "{} is {unit_price} per {unit}, so {quantity} {unit} comes to {total}.",
        item.name,
        unit = item.unit,
        quantity = quantity.normalize(),
        total = format_amount(total),
    );
    if quantity > item.stock_quantity {
        text.push_str(&format!(
            " We currently have only {} {} in stock.",
            item.stock_quantity.normalize(),
            item.unit
        ));
    }
    Ok((text, RESOLVED_CONFIDENCE))
}

fn cart_response(business: &BusinessContext, resolved: &Resolved) -> Result<(String, f64), StageError> {
    let Some(mention) = resolved.product.as_deref() else {
        return Ok(("What would you like to add to your cart?".to_string(), CLARIFYING_CONFIDENCE));
    };
    let Some(item) = business.find_product(mention) else {
        return Ok((not_carried(mention, business), CLARIFYING_CONFIDENCE));
    };
    let Some(quantity) = resolved.quantity else {
        return Ok((
            format!("How many {} of {} would you like?", item.unit, item.name),
            CLARIFYING_CONFIDENCE,
        ));
    };

    if quantity > item.stock_quantity {
        return Ok((
            format!(
                "Sorry, we only have {} {} of {} in stock right now.",
                item.stock_quantity.normalize(),
                item.unit,
                item.name
            ),
            RESOLVED_CONFIDENCE,
        ));
    }

    let total = line_total(item, quantity)?;
    Ok((
        format!(
            "Added {} {} of {} to your cart for {}.",
            quantity.normalize(),
            item.unit,
            item.name,
            format_amount(total)
        ),
        RESOLVED_CONFIDENCE,
    ))
}

fn product_response(business: &BusinessContext, resolved: &Resolved) -> (String, f64) {
    let Some(mention) = resolved.product.as_deref() else {
        return (
            "Which product would you like to know more about?".to_string(),
            CLARIFYING_CONFIDENCE,
        );
    };
    let Some(item) = business.find_product(mention) else {
        return (not_carried(mention, business), CLARIFYING_CONFIDENCE);
    };

    if item.stock_quantity <= Decimal::ZERO {
        return (format!("{} is currently out of stock. Check back soon!", item.name), RESOLVED_CONFIDENCE);
    }

    let description = item
        .description
        .as_deref()
        .map(str::trim)
        .filter(|description| !description.is_empty())
        .unwrap_or("fresh from our farm");
    (
        format!(
            "{} ({}): {}. We have {} {} in stock at {} per {}.",
            item.name,
            item.category,
            description.trim_end_matches('.'),
            item.stock_quantity.normalize(),
            item.unit,
            format_amount(item.unit_price),
            item.unit
        ),
        RESOLVED_CONFIDENCE,
    )
}

fn not_carried(mention: &str, business: &BusinessContext) -> String {
    let categories = business.categories();
    if categories.is_empty() {
        format!("Sorry, we don't carry {mention} at the moment.")
    } else {
        format!(
            "Sorry, we don't carry {mention} at the moment. We currently offer: {}.",
            categories.join(", ")
        )
    }
}

fn line_total(item: &InventoryItem, quantity: Decimal) -> Result<Decimal, StageError> {
    item.unit_price.checked_mul(quantity).ok_or_else(|| {
        StageError::Generation(format!("line total for `{}` overflowed", item.id))
    })
}

fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}

fn append_sentence(text: &mut String, sentence: &str) {
    if !text.is_empty() {
        text.push(' ');
    }
    text.push_str(sentence);
}
