//! Deterministic intent classification by weighted lexical cues.

use std::sync::Arc;

use harvest_core::domain::context::ConversationContext;
use harvest_core::domain::intent::{
    ClassificationResult, Entity, EntityType, Intent, IntentName, RECOGNITION_THRESHOLD,
};
use harvest_core::errors::StageError;
use tracing::debug;

use crate::extractor::{EntityExtractor, LexicalEntityExtractor};
use crate::text::words;

pub trait IntentClassifier: Send + Sync {
    fn classify(
        &self,
        message: &str,
        context: &ConversationContext,
    ) -> Result<ClassificationResult, StageError>;

    fn supported_intents(&self) -> Vec<IntentName>;
}

pub const EMPTY_MESSAGE_CONFIDENCE: f64 = 0.1;
pub const CONTINUATION_CONFIDENCE: f64 = 0.6;
const MAX_SCORE: f64 = 0.95;

const STRONG: f64 = 0.6;
const MEDIUM: f64 = 0.5;
const WEAK: f64 = 0.3;
const PHRASE: f64 = 0.7;

struct IntentCues {
    intent: IntentName,
    keywords: &'static [(&'static str, f64)],
    phrases: &'static [&'static str],
}

const CUES: &[IntentCues] = &[
    IntentCues {
        intent: IntentName::Greeting,
        keywords: &[
            ("hello", STRONG),
            ("hi", STRONG),
            ("hey", STRONG),
            ("howdy", STRONG),
            ("greetings", STRONG),
            ("morning", WEAK),
            ("afternoon", WEAK),
            ("evening", WEAK),
        ],
        phrases: &["good morning", "good afternoon", "good evening"],
    },
    IntentCues {
        intent: IntentName::PriceInquiry,
        keywords: &[
            ("price", STRONG),
            ("prices", STRONG),
            ("cost", STRONG),
            ("costs", STRONG),
            ("pricing", STRONG),
            ("expensive", MEDIUM),
            ("much", WEAK),
        ],
        phrases: &["how much", "what does it cost", "price of", "price for"],
    },
    IntentCues {
        intent: IntentName::BrowseProducts,
        keywords: &[
            ("browse", STRONG),
            ("catalog", STRONG),
            ("catalogue", STRONG),
            ("products", MEDIUM),
            ("selection", MEDIUM),
            ("available", MEDIUM),
            ("menu", MEDIUM),
            ("selling", WEAK),
        ],
        phrases: &["what do you have", "what do you sell", "show me", "what is available"],
    },
    IntentCues {
        intent: IntentName::AddToCart,
        keywords: &[
            ("buy", STRONG),
            ("add", STRONG),
            ("cart", STRONG),
            ("order", STRONG),
            ("purchase", STRONG),
            ("need", MEDIUM),
            ("want", MEDIUM),
            ("take", WEAK),
            ("get", WEAK),
        ],
        phrases: &["ill take", "i will take", "add to cart", "put in my basket"],
    },
    IntentCues {
        intent: IntentName::ProductInquiry,
        keywords: &[
            ("organic", MEDIUM),
            ("fresh", WEAK),
            ("ripe", WEAK),
            ("origin", MEDIUM),
            ("grown", MEDIUM),
            ("details", MEDIUM),
            ("information", MEDIUM),
            ("about", WEAK),
            ("stock", MEDIUM),
        ],
        phrases: &["tell me about", "do you have", "are they", "is it", "in stock"],
    },
    IntentCues {
        intent: IntentName::NegotiatePrice,
        keywords: &[
            ("discount", STRONG),
            ("negotiate", STRONG),
            ("cheaper", STRONG),
            ("deal", MEDIUM),
            ("bargain", STRONG),
            ("bulk", MEDIUM),
            ("lower", MEDIUM),
            ("offer", WEAK),
        ],
        phrases: &["best price", "better price", "come down", "knock off"],
    },
    IntentCues {
        intent: IntentName::Help,
        keywords: &[("help", STRONG), ("assist", STRONG), ("support", MEDIUM), ("confused", MEDIUM)],
        phrases: &["how do i", "what can you do", "how does this work"],
    },
    IntentCues {
        intent: IntentName::Farewell,
        keywords: &[
            ("bye", STRONG),
            ("goodbye", STRONG),
            ("farewell", STRONG),
            ("thanks", MEDIUM),
            ("cheers", MEDIUM),
        ],
        phrases: &["see you", "thank you", "thats all", "have a nice day", "have a good day"],
    },
];

const AFFIRMATIONS: &[&str] = &[
    "yes", "yeah", "yep", "yup", "ok", "okay", "sure", "please", "alright", "definitely",
    "absolutely", "sounds", "good", "great", "perfect", "do", "it",
];

/// Scores every catalogue intent by weighted keyword and phrase hits, with
/// small boosts from extracted entities. Only intents with at least one
/// lexical hit receive entity boosts.
#[derive(Clone)]
pub struct KeywordIntentClassifier {
    extractor: Arc<dyn EntityExtractor>,
}

impl Default for KeywordIntentClassifier {
    fn default() -> Self {
        Self::new(Arc::new(LexicalEntityExtractor::new()))
    }
}

impl KeywordIntentClassifier {
    pub fn new(extractor: Arc<dyn EntityExtractor>) -> Self {
        Self { extractor }
    }

    fn attached_entities(&self, message: &str) -> Vec<Entity> {
        match self.extractor.extract(message) {
            Ok(result) => result.entities,
            Err(error) => {
                debug!(
                    event_name = "classifier.entities.skipped",
                    error = %error,
                    "entity extraction failed during classification"
                );
                Vec::new()
            }
        }
    }
}

impl IntentClassifier for KeywordIntentClassifier {
    fn classify(
        &self,
        message: &str,
        context: &ConversationContext,
    ) -> Result<ClassificationResult, StageError> {
        let words = words(message);
        if words.is_empty() {
            return Ok(ClassificationResult::unknown(EMPTY_MESSAGE_CONFIDENCE));
        }

        let entities = self.attached_entities(message);

        if let Some(current) = context.current_intent.filter(|intent| *intent != IntentName::Unknown) {
            if is_affirmation(&words) {
                let intent = Intent::new(current, CONTINUATION_CONFIDENCE).with_entities(entities);
                return Ok(ClassificationResult::new(intent));
            }
        }

        let padded = format!(" {} ", words.join(" "));
        let has = |entity_type: EntityType| entities.iter().any(|entity| entity.entity_type == entity_type);
        let signals = EntitySignals {
            quantity: has(EntityType::Quantity),
            price: has(EntityType::Price),
            product: has(EntityType::ProductName),
        };

        let mut best: Option<(IntentName, f64)> = None;
        for cues in CUES {
            let score = score_intent(cues, &words, &padded, signals);
            let is_better = best.map(|(_, best_score)| score > best_score).unwrap_or(score > 0.0);
            if is_better {
                best = Some((cues.intent, score));
            }
        }

        let intent = match best {
            Some((name, score)) if score >= RECOGNITION_THRESHOLD => Intent::new(name, score),
            Some((_, score)) => Intent::unknown(score),
            None => Intent::unknown(EMPTY_MESSAGE_CONFIDENCE),
        };
        debug!(
            event_name = "classifier.scored",
            intent = %intent.name,
            confidence = intent.confidence,
            "message classified"
        );

        Ok(ClassificationResult::new(intent.with_entities(entities)))
    }

    fn supported_intents(&self) -> Vec<IntentName> {
        IntentName::CATALOGUE.to_vec()
    }
}

#[derive(Clone, Copy)]
struct EntitySignals {
    quantity: bool,
    price: bool,
    product: bool,
}

fn score_intent(cues: &IntentCues, words: &[String], padded: &str, signals: EntitySignals) -> f64 {
    let keyword_score: f64 = words
        .iter()
        .filter_map(|word| {
            cues.keywords.iter().find(|(keyword, _)| keyword == word).map(|(_, weight)| *weight)
        })
        .sum();
    let phrase_score = count_phrases(padded, cues.phrases) as f64 * PHRASE;
    let lexical = keyword_score.max(phrase_score) + keyword_score.min(phrase_score) * 0.25;
    if lexical <= 0.0 {
        return 0.0;
    }

    let boost = match cues.intent {
        IntentName::PriceInquiry => {
            0.05 * (u8::from(signals.product) + u8::from(signals.quantity) + u8::from(signals.price)) as f64
        }
        IntentName::AddToCart => {
            0.15 * f64::from(u8::from(signals.quantity)) + 0.05 * f64::from(u8::from(signals.product))
        }
        IntentName::ProductInquiry => 0.1 * f64::from(u8::from(signals.product)),
        IntentName::NegotiatePrice => 0.05 * f64::from(u8::from(signals.price)),
        _ => 0.0,
    };

    (lexical + boost).min(MAX_SCORE)
}

fn count_phrases(padded: &str, phrases: &[&str]) -> usize {
    phrases.iter().filter(|phrase| padded.contains(&format!(" {phrase} "))).count()
}

fn is_affirmation(words: &[String]) -> bool {
    words.len() <= 4 && words.iter().all(|word| AFFIRMATIONS.contains(&word.as_str()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use harvest_core::domain::context::ConversationContext;
    use harvest_core::domain::intent::{EntityType, ExtractionResult, IntentName};
    use harvest_core::errors::StageError;

    use super::{IntentClassifier, KeywordIntentClassifier, CONTINUATION_CONFIDENCE};
    use crate::extractor::EntityExtractor;

    fn classify(message: &str) -> (IntentName, f64) {
        let result = KeywordIntentClassifier::default()
            .classify(message, &ConversationContext::default())
            .expect("classification should succeed");
        (result.intent.name, result.confidence)
    }

    #[test]
    fn greeting_is_recognised_with_confidence() {
        let (name, confidence) = classify("Hello there!");
        assert_eq!(name, IntentName::Greeting);
        assert!(confidence > 0.5);
    }

    #[test]
    fn empty_message_is_unknown_with_low_confidence() {
        let (name, confidence) = classify("   ");
        assert_eq!(name, IntentName::Unknown);
        assert!(confidence > 0.0 && confidence < 0.5);
    }

    #[test]
    fn catalogue_intents_are_recognised() {
        assert_eq!(classify("How much for 2 kg of tomatoes?").0, IntentName::PriceInquiry);
        assert_eq!(classify("What do you have today?").0, IntentName::BrowseProducts);
        assert_eq!(classify("I need 5 kg of tomatoes").0, IntentName::AddToCart);
        assert_eq!(classify("Do you have organic carrots?").0, IntentName::ProductInquiry);
        assert_eq!(classify("Can you give me a better price?").0, IntentName::NegotiatePrice);
        assert_eq!(classify("Can you help me?").0, IntentName::Help);
        assert_eq!(classify("Thanks, bye!").0, IntentName::Farewell);
    }

    #[test]
    fn unmatched_message_collapses_to_unknown() {
        let (name, confidence) = classify("the weather is lovely");
        assert_eq!(name, IntentName::Unknown);
        assert!(confidence < 0.5);
    }

    #[test]
    fn weak_single_cue_stays_below_threshold() {
        let (name, confidence) = classify("fresh?");
        assert_eq!(name, IntentName::Unknown);
        assert!((confidence - 0.3).abs() < 1e-9);
    }

    #[test]
    fn scores_never_exceed_cap() {
        let (_, confidence) = classify("hello hi hey hello good morning");
        assert!(confidence <= 0.95);
    }

    #[test]
    fn classification_is_deterministic() {
        let first = classify("I want to buy 3 bags of apples");
        let second = classify("I want to buy 3 bags of apples");
        assert_eq!(first, second);
    }

    #[test]
    fn entities_are_attached_to_intent() {
        let result = KeywordIntentClassifier::default()
            .classify("I need 5 kg of tomatoes", &ConversationContext::default())
            .expect("classification should succeed");
        assert!(result.intent.entities_of(EntityType::Quantity).any(|entity| entity.value == "5"));
        assert!(result.intent.entities_of(EntityType::Unit).any(|entity| entity.value == "kg"));
    }

    #[test]
    fn affirmation_continues_current_intent() {
        let context = ConversationContext {
            current_intent: Some(IntentName::AddToCart),
            ..ConversationContext::default()
        };
        let result = KeywordIntentClassifier::default()
            .classify("Yes please", &context)
            .expect("classification should succeed");
        assert_eq!(result.intent.name, IntentName::AddToCart);
        assert_eq!(result.confidence, CONTINUATION_CONFIDENCE);
    }

    struct BrokenExtractor;

    impl EntityExtractor for BrokenExtractor {
        fn extract(&self, _message: &str) -> Result<ExtractionResult, StageError> {
            Err(StageError::Extraction("vocabulary unavailable".to_string()))
        }

        fn supported_entity_types(&self) -> Vec<EntityType> {
            Vec::new()
        }
    }

    #[test]
    fn extractor_failure_does_not_fail_classification() {
        let classifier = KeywordIntentClassifier::new(Arc::new(BrokenExtractor));
        let result = classifier
            .classify("hello", &ConversationContext::default())
            .expect("classification should succeed");
        assert_eq!(result.intent.name, IntentName::Greeting);
        assert!(result.intent.entities.is_empty());
    }
}
