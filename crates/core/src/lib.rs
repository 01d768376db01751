pub mod config;
pub mod costs;
pub mod domain;
pub mod errors;
pub mod metrics;
pub mod routing;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::context::{
    BusinessContext, ConversationContext, ConversationTurn, CustomerProfile, InventoryItem,
    Promotion, Speaker,
};
pub use domain::intent::{
    ClassificationResult, Entity, EntityType, ExtractionResult, Intent, IntentName,
    RECOGNITION_THRESHOLD,
};
pub use domain::provider::{
    PreferredProvider, ProviderKind, ProviderSpec, RoutingPolicy, PLACEHOLDER_PROVIDER,
};
pub use domain::response::{
    GeneratedText, GenerationMetadata, GenerationOptions, GenerationResult, ProcessedMessage,
    FALLBACK_CONFIDENCE, FALLBACK_RESPONSE,
};
pub use errors::{ApplicationError, InterfaceError, StageError};
pub use metrics::{Metrics, MetricsCollector, Outcome, ThresholdReport};
pub use routing::{
    select_provider, ConfigStore, OperationKind, PolicyPatch, ProviderSelection, SelectionSource,
};
