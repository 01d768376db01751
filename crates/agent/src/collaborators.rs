//! Pluggable business services consulted by the response generator.
//!
//! Each service may decline (`Ok(None)`) or fail; the generator treats a
//! failure as "stage not applied" and keeps the text it already has.

use rust_decimal::Decimal;

use harvest_core::domain::context::{BusinessContext, ConversationContext};
use harvest_core::domain::intent::{Intent, IntentName};
use harvest_core::errors::StageError;

pub trait PersonalityService: Send + Sync {
    /// Returns rewritten text, or `None` when no personalization applies.
    fn personalize(
        &self,
        text: &str,
        intent: &Intent,
        context: &ConversationContext,
    ) -> Result<Option<String>, StageError>;
}

pub trait UpsellService: Send + Sync {
    fn is_eligible(&self, intent: &Intent, business: &BusinessContext) -> Result<bool, StageError>;

    fn suggestion(
        &self,
        intent: &Intent,
        business: &BusinessContext,
    ) -> Result<Option<String>, StageError>;
}

pub trait NegotiationService: Send + Sync {
    fn propose(
        &self,
        intent: &Intent,
        quantity: Option<Decimal>,
        business: &BusinessContext,
    ) -> Result<Option<String>, StageError>;
}

/// Greets returning customers by name on the first turn and honours a `tone`
/// preference (`formal` or `enthusiastic`).
#[derive(Clone, Debug, Default)]
pub struct FriendlyPersonality;

impl PersonalityService for FriendlyPersonality {
    fn personalize(
        &self,
        text: &str,
        intent: &Intent,
        context: &ConversationContext,
    ) -> Result<Option<String>, StageError> {
        let mut personalized = text.to_string();
        let mut changed = false;

        if let Some(name) = context.customer_name() {
            let greets = intent.effective_name() == IntentName::Greeting || text.contains(name);
            if context.is_first_turn() && !greets {
                personalized = format!("Hi {name}! {personalized}");
                changed = true;
            }
        }

        match context.preference("tone").map(|tone| tone.trim().to_ascii_lowercase()).as_deref() {
            Some("formal") => {
                personalized = format!("Thank you for your message. {personalized}");
                changed = true;
            }
            Some("enthusiastic") => {
                personalized.push_str(" Happy harvesting!");
                changed = true;
            }
            _ => {}
        }

        Ok(changed.then_some(personalized))
    }
}

/// Suggests the first promotion not already offered in this conversation.
#[derive(Clone, Debug, Default)]
pub struct PromotionUpsell;

impl PromotionUpsell {
    fn eligible_intent(intent: &Intent) -> bool {
        matches!(
            intent.effective_name(),
            IntentName::AddToCart | IntentName::PriceInquiry | IntentName::BrowseProducts
        )
    }
}

impl UpsellService for PromotionUpsell {
    fn is_eligible(&self, intent: &Intent, business: &BusinessContext) -> Result<bool, StageError> {
        let offered = &business.conversation.upsell_history;
        Ok(Self::eligible_intent(intent)
            && business.promotions.iter().any(|promotion| !offered.contains(&promotion.title)))
    }

    fn suggestion(
        &self,
        _intent: &Intent,
        business: &BusinessContext,
    ) -> Result<Option<String>, StageError> {
        let offered = &business.conversation.upsell_history;
        let Some(promotion) =
            business.promotions.iter().find(|promotion| !offered.contains(&promotion.title))
        else {
            return Ok(None);
        };

        let product = promotion
            .product_id
            .as_deref()
            .and_then(|id| business.inventory.iter().find(|item| item.id == id));
        let discount = promotion.discount_pct.normalize();
        let text = match product {
            Some(item) => format!(
                "By the way, {}: {discount}% off {} this week.",
                promotion.title, item.name
            ),
            None => format!("By the way, {}: {discount}% off this week.", promotion.title),
        };
        Ok(Some(text))
    }
}

/// Bulk discount tiers for large quantities.
#[derive(Clone, Debug)]
pub struct VolumeNegotiation {
    /// `(minimum quantity, discount percent)`, highest threshold first.
    tiers: Vec<(Decimal, Decimal)>,
}

impl Default for VolumeNegotiation {
    fn default() -> Self {
        Self::new(vec![
            (Decimal::from(50), Decimal::from(15)),
            (Decimal::from(20), Decimal::from(10)),
            (Decimal::from(10), Decimal::from(5)),
        ])
    }
}

impl VolumeNegotiation {
    pub fn new(mut tiers: Vec<(Decimal, Decimal)>) -> Self {
        tiers.sort_by(|left, right| right.0.cmp(&left.0));
        Self { tiers }
    }

    pub fn discount_for(&self, quantity: Decimal) -> Option<Decimal> {
        self.tiers.iter().find(|(minimum, _)| quantity >= *minimum).map(|(_, discount)| *discount)
    }

    fn smallest_tier(&self) -> Option<Decimal> {
        self.tiers.last().map(|(minimum, _)| *minimum)
    }
}

impl NegotiationService for VolumeNegotiation {
    fn propose(
        &self,
        intent: &Intent,
        quantity: Option<Decimal>,
        _business: &BusinessContext,
    ) -> Result<Option<String>, StageError> {
        if let Some(quantity) = quantity {
            if let Some(discount) = self.discount_for(quantity) {
                return Ok(Some(format!(
                    "For an order of {} we can offer a {discount}% volume discount.",
                    quantity.normalize()
                )));
            }
        }

        if intent.effective_name() == IntentName::NegotiatePrice {
            if let Some(minimum) = self.smallest_tier() {
                return Ok(Some(format!(
                    "Orders of {minimum} or more qualify for a volume discount."
                )));
            }
        }

        Ok(None)
    }
}
