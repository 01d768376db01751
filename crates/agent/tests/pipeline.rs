use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use harvest_agent::{
    BackendRegistry, EntityExtractor, InferenceBackend, InferenceRequest, IntentClassifier,
    NlpRouter, ResponseGenerator,
};
use harvest_core::domain::context::{BusinessContext, ConversationContext, InventoryItem};
use harvest_core::domain::intent::{
    ClassificationResult, Entity, EntityType, ExtractionResult, Intent, IntentName,
};
use harvest_core::domain::provider::{ProviderSpec, RoutingPolicy};
use harvest_core::domain::response::{GeneratedText, GenerationOptions};
use harvest_core::errors::StageError;

fn farm_shop() -> BusinessContext {
    BusinessContext {
        inventory: vec![
            InventoryItem {
                id: "veg-tomato".to_string(),
                name: "Tomatoes".to_string(),
                category: "Vegetables".to_string(),
                unit: "kg".to_string(),
                unit_price: Decimal::new(599, 2),
                stock_quantity: Decimal::from(40),
                description: Some("Vine-ripened heirloom tomatoes".to_string()),
            },
            InventoryItem {
                id: "fruit-apple".to_string(),
                name: "Apples".to_string(),
                category: "Fruit".to_string(),
                unit: "kg".to_string(),
                unit_price: Decimal::new(349, 2),
                stock_quantity: Decimal::from(120),
                description: None,
            },
        ],
        ..BusinessContext::default()
    }
}

fn local_and_cloud() -> RoutingPolicy {
    RoutingPolicy {
        local_provider: Some(
            ProviderSpec::new("ollama").with_endpoint("http://localhost:11434").with_model("llama3.1:8b"),
        ),
        cloud_provider: Some(ProviderSpec::new("openai").with_model("gpt-4o-mini")),
        ..RoutingPolicy::default()
    }
}

struct BrokenClassifier;

impl IntentClassifier for BrokenClassifier {
    fn classify(&self, _message: &str, _context: &ConversationContext) -> Result<ClassificationResult, StageError> {
        Err(StageError::Classification("weights failed to load".to_string()))
    }

    fn supported_intents(&self) -> Vec<IntentName> {
        IntentName::CATALOGUE.to_vec()
    }
}

struct BrokenExtractor;

impl EntityExtractor for BrokenExtractor {
    fn extract(&self, _message: &str) -> Result<ExtractionResult, StageError> {
        Err(StageError::Extraction("vocabulary unavailable".to_string()))
    }

    fn supported_entity_types(&self) -> Vec<EntityType> {
        EntityType::ALL.to_vec()
    }
}

struct BrokenGenerator;

impl ResponseGenerator for BrokenGenerator {
    fn generate(
        &self,
        _intent: &Intent,
        _context: &ConversationContext,
        _business: &BusinessContext,
        _raw_message: Option<&str>,
        _options: &GenerationOptions,
    ) -> Result<GeneratedText, StageError> {
        Err(StageError::Generation("template missing".to_string()))
    }
}

struct OfflineBackend;

#[async_trait]
impl InferenceBackend for OfflineBackend {
    async fn dispatch(&self, request: &InferenceRequest) -> Result<Decimal, StageError> {
        Err(StageError::ProviderUnavailable {
            provider: request.spec.provider.clone(),
            reason: "service not running".to_string(),
        })
    }
}

#[tokio::test]
async fn greeting_is_classified_with_confidence_above_threshold() {
    let router = NlpRouter::new(local_and_cloud());
    let result = router.classify_intent("Hello there!", &ConversationContext::default()).await;

    assert_eq!(result.intent.name, IntentName::Greeting);
    assert!(result.confidence > 0.5);
}

#[tokio::test]
async fn quantity_and_unit_are_extracted() {
    let router = NlpRouter::new(local_and_cloud());
    let result = router.extract_entities("I need 5 kg of tomatoes").await;

    assert!(result.entities.contains(&Entity::new(EntityType::Quantity, "5", 0.9)));
    assert!(result
        .entities
        .iter()
        .any(|entity| entity.entity_type == EntityType::Unit && entity.value == "kg"));
    assert!((0.0..=1.0).contains(&result.confidence));
}

#[tokio::test]
async fn empty_message_extracts_nothing() {
    let router = NlpRouter::new(local_and_cloud());
    let result = router.extract_entities("").await;

    assert!(result.entities.is_empty());
    assert_eq!(result.confidence, 0.0);
}

#[tokio::test]
async fn price_inquiry_quotes_unit_price_and_total() {
    let router = NlpRouter::new(local_and_cloud());
    let intent = Intent::new(IntentName::PriceInquiry, 0.9).with_entities(vec![
        Entity::new(EntityType::ProductName, "tomatoes", 0.85),
        Entity::new(EntityType::Quantity, "2", 0.9),
        Entity::new(EntityType::Unit, "kg", 0.85),
    ]);

    let result = router.generate_response(&intent, &farm_shop(), None, &GenerationOptions::default()).await;

    assert!(result.text.contains("5.99"), "{}", result.text);
    assert!(result.text.contains("2 kg"), "{}", result.text);
    assert!(result.text.contains("11.98"), "{}", result.text);
}

#[tokio::test]
async fn max_response_length_caps_generated_text() {
    let router = NlpRouter::new(local_and_cloud());
    let options = GenerationOptions { max_response_length: Some(50), ..GenerationOptions::default() };

    let result = router
        .generate_response(&Intent::new(IntentName::Help, 0.9), &farm_shop(), None, &options)
        .await;

    assert!(result.text.chars().count() <= 50);
    assert!(!result.text.is_empty());
}

#[tokio::test]
async fn auto_policy_prefers_the_local_provider() {
    let router = NlpRouter::new(local_and_cloud());
    let result = router
        .generate_response(&Intent::new(IntentName::Greeting, 0.9), &farm_shop(), None, &GenerationOptions::default())
        .await;

    assert_eq!(result.metadata.provider, "ollama");
    let metrics = router.metrics();
    assert_eq!(metrics.provider_usage.get("ollama"), Some(&1));
    assert_eq!(metrics.provider_usage.get("openai"), None);
    assert_eq!(metrics.total_cost, Decimal::ZERO);
}

#[tokio::test]
async fn failing_stages_degrade_instead_of_erroring() {
    let router = NlpRouter::builder(local_and_cloud())
        .classifier(Arc::new(BrokenClassifier))
        .extractor(Arc::new(BrokenExtractor))
        .generator(Arc::new(BrokenGenerator))
        .build();

    let processed = router
        .process_message("How much are the apples?", &ConversationContext::default(), &farm_shop())
        .await;

    assert_eq!(processed.intent.name, IntentName::Unknown);
    assert_eq!(processed.confidence, 0.0);
    assert!(processed.entities.is_empty());
    assert!(processed.response.text.contains("trouble understanding"));

    let metrics = router.metrics();
    assert_eq!(metrics.total_requests, 1);
    assert_eq!(metrics.failed_requests, 1);
}

#[tokio::test]
async fn offline_local_backend_degrades_every_stage() {
    let backends = BackendRegistry::default().with_backend("ollama", Arc::new(OfflineBackend));
    let router = NlpRouter::builder(local_and_cloud()).backends(backends).build();

    let processed = router
        .process_message("Hello there!", &ConversationContext::default(), &farm_shop())
        .await;

    assert_eq!(processed.intent.name, IntentName::Unknown);
    assert!(processed.response.text.contains("trouble understanding"));
    assert_eq!(processed.response.metadata.provider, "ollama");
}

#[tokio::test]
async fn classification_is_idempotent() {
    let router = NlpRouter::new(local_and_cloud());
    let context = ConversationContext::default();

    let first = router.classify_intent("Can I add 3 kg of apples to my cart?", &context).await;
    let second = router.classify_intent("Can I add 3 kg of apples to my cart?", &context).await;

    assert_eq!(first, second);
    assert!((0.0..=1.0).contains(&first.confidence));
}

#[tokio::test]
async fn concurrent_requests_keep_metrics_consistent() {
    let router = Arc::new(NlpRouter::new(local_and_cloud()));
    let messages = ["hello", "how much are apples", "show me your vegetables", "bye", "what?"];

    let handles: Vec<_> = (0..20)
        .map(|index| {
            let router = Arc::clone(&router);
            let message = messages[index % messages.len()].to_string();
            tokio::spawn(async move {
                router.classify_intent(&message, &ConversationContext::default()).await
            })
        })
        .collect();
    for handle in handles {
        handle.await.expect("classification task should not panic");
    }

    let metrics = router.metrics();
    assert_eq!(metrics.total_requests, 20);
    assert_eq!(metrics.successful_requests + metrics.failed_requests, metrics.total_requests);
    assert_eq!(metrics.provider_usage.values().sum::<u64>(), metrics.total_requests);

    router.reset_metrics();
    let metrics = router.metrics();
    assert_eq!(metrics.total_requests, 0);
    assert_eq!(metrics.average_latency_ms, 0.0);
}
