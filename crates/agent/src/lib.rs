//! Natural-language pipeline for the farm-shop assistant.
//!
//! A message flows through three stages, each routed to a provider chosen by
//! the active routing policy:
//! 1. **Classification** (`classifier`) - map text to one of the catalogue intents
//! 2. **Extraction** (`extractor`) - pull products, quantities, units and prices
//! 3. **Generation** (`generator`) - render a reply from templates and business data
//!
//! `NlpRouter` owns the policy, the metrics and the degrade-on-failure
//! behaviour. Stage strategies and backends are trait objects so callers can
//! swap them in tests or production wiring.

pub mod backend;
pub mod classifier;
pub mod collaborators;
pub mod extractor;
pub mod generator;
pub mod router;
mod text;

pub use backend::{BackendRegistry, InferenceBackend, InferenceRequest, SimulatedBackend};
pub use classifier::{IntentClassifier, KeywordIntentClassifier};
pub use collaborators::{
    FriendlyPersonality, NegotiationService, PersonalityService, PromotionUpsell, UpsellService,
    VolumeNegotiation,
};
pub use extractor::{EntityExtractor, LexicalEntityExtractor};
pub use generator::{ResponseGenerator, TemplateResponseGenerator};
pub use router::{NlpRouter, NlpRouterBuilder};
