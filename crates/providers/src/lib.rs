//! Local inference service management: presets, validation, setup
//! instructions and discovery of Ollama / LM Studio instances.

pub mod error;
pub mod manager;
pub mod presets;
pub mod probe;

pub use error::ProviderError;
pub use manager::{DetectionReport, LocalProviderManager, RecommendedSetup, ValidationReport};
pub use presets::{find_preset, LocalPreset, ModelTier, ModelTiers, PRESETS};
pub use probe::{HttpProbe, ProbeResponse, ServiceProbe};
