//! Request router: picks a provider per operation, runs the stage, degrades on
//! failure and records one metrics entry per public call.

use std::sync::Arc;
use std::time::Instant;

use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use harvest_core::domain::context::{BusinessContext, ConversationContext};
use harvest_core::domain::intent::{
    ClassificationResult, EntityType, ExtractionResult, Intent, IntentName,
};
use harvest_core::domain::provider::RoutingPolicy;
use harvest_core::domain::response::{GenerationOptions, GenerationResult, ProcessedMessage};
use harvest_core::errors::{ApplicationError, StageError};
use harvest_core::metrics::{Metrics, MetricsCollector, Outcome, ThresholdReport};
use harvest_core::routing::{
    select_provider, ConfigStore, OperationKind, PolicyPatch, ProviderSelection,
};

use crate::backend::{BackendRegistry, InferenceRequest};
use crate::classifier::{IntentClassifier, KeywordIntentClassifier};
use crate::extractor::{EntityExtractor, LexicalEntityExtractor};
use crate::generator::{ResponseGenerator, TemplateResponseGenerator};
use crate::text::truncate_chars;

pub struct NlpRouter {
    store: ConfigStore,
    metrics: MetricsCollector,
    classifier: Arc<dyn IntentClassifier>,
    extractor: Arc<dyn EntityExtractor>,
    generator: Arc<dyn ResponseGenerator>,
    backends: BackendRegistry,
}

pub struct NlpRouterBuilder {
    policy: RoutingPolicy,
    classifier: Option<Arc<dyn IntentClassifier>>,
    extractor: Option<Arc<dyn EntityExtractor>>,
    generator: Option<Arc<dyn ResponseGenerator>>,
    backends: BackendRegistry,
}

impl NlpRouterBuilder {
    pub fn classifier(mut self, classifier: Arc<dyn IntentClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn EntityExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn ResponseGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn backends(mut self, backends: BackendRegistry) -> Self {
        self.backends = backends;
        self
    }

    /// Missing strategies default to the lexical implementations, all sharing
    /// one extractor.
    pub fn build(self) -> NlpRouter {
        let extractor = self.extractor.unwrap_or_else(|| Arc::new(LexicalEntityExtractor::new()));
        let classifier = self
            .classifier
            .unwrap_or_else(|| Arc::new(KeywordIntentClassifier::new(Arc::clone(&extractor))));
        let generator = self.generator.unwrap_or_else(|| {
            Arc::new(TemplateResponseGenerator::new().with_extractor(Arc::clone(&extractor)))
        });

        NlpRouter {
            store: ConfigStore::new(self.policy),
            metrics: MetricsCollector::new(),
            classifier,
            extractor,
            generator,
            backends: self.backends,
        }
    }
}

/// Outcome of one stage after the degrade seam.
struct StageRun<T> {
    value: T,
    outcome: Outcome,
    cost: Decimal,
}

impl NlpRouter {
    pub fn new(policy: RoutingPolicy) -> Self {
        Self::builder(policy).build()
    }

    pub fn builder(policy: RoutingPolicy) -> NlpRouterBuilder {
        NlpRouterBuilder {
            policy,
            classifier: None,
            extractor: None,
            generator: None,
            backends: BackendRegistry::default(),
        }
    }

    pub async fn classify_intent(
        &self,
        message: &str,
        context: &ConversationContext,
    ) -> ClassificationResult {
        let started = Instant::now();
        let correlation_id = new_correlation_id();
        let policy = self.store.get();
        let selection = self.select(&policy, OperationKind::Classification, &correlation_id);

        let run = self.run_classification(&selection, &correlation_id, message, context).await;
        self.record(run.outcome, started, run.cost, &selection);
        run.value
    }

    pub async fn extract_entities(&self, message: &str) -> ExtractionResult {
        let started = Instant::now();
        let correlation_id = new_correlation_id();
        let policy = self.store.get();
        let selection = self.select(&policy, OperationKind::Extraction, &correlation_id);

        let run = self.run_extraction(&selection, &correlation_id, message).await;
        self.record(run.outcome, started, run.cost, &selection);
        run.value
    }

    pub async fn generate_response(
        &self,
        intent: &Intent,
        business: &BusinessContext,
        raw_message: Option<&str>,
        options: &GenerationOptions,
    ) -> GenerationResult {
        let started = Instant::now();
        let correlation_id = new_correlation_id();
        let policy = self.store.get();
        let selection = self.select(&policy, OperationKind::Generation, &correlation_id);

        let run = self
            .run_generation(
                &selection,
                &correlation_id,
                intent,
                &business.conversation,
                business,
                raw_message,
                options,
                started,
            )
            .await;
        self.record(run.outcome, started, run.cost, &selection);
        run.value
    }

    /// Classification, extraction and generation in sequence under one policy
    /// snapshot, recorded as a single request.
    pub async fn process_message(
        &self,
        message: &str,
        context: &ConversationContext,
        business: &BusinessContext,
    ) -> ProcessedMessage {
        self.process_message_with(message, context, business, &GenerationOptions::default()).await
    }

    pub async fn process_message_with(
        &self,
        message: &str,
        context: &ConversationContext,
        business: &BusinessContext,
        options: &GenerationOptions,
    ) -> ProcessedMessage {
        let started = Instant::now();
        let correlation_id = new_correlation_id();
        let policy = self.store.get();

        let selection = self.select(&policy, OperationKind::Classification, &correlation_id);
        let classification = self.run_classification(&selection, &correlation_id, message, context).await;

        let selection = self.select(&policy, OperationKind::Extraction, &correlation_id);
        let extraction = self.run_extraction(&selection, &correlation_id, message).await;

        let selection = self.select(&policy, OperationKind::Generation, &correlation_id);
        let mut intent = classification.value.intent;
        if intent.entities.is_empty() {
            intent.entities = extraction.value.entities.clone();
        }
        let generation = self
            .run_generation(
                &selection,
                &correlation_id,
                &intent,
                context,
                business,
                Some(message),
                options,
                started,
            )
            .await;

        let outcome = match (classification.outcome, extraction.outcome, generation.outcome) {
            (Outcome::Success, Outcome::Success, Outcome::Success) => Outcome::Success,
            _ => Outcome::Failure,
        };
        let cost = classification.cost + extraction.cost + generation.cost;
        self.record(outcome, started, cost, &selection);

        info!(
            event_name = "router.process.completed",
            correlation_id = %correlation_id,
            intent = %intent.name,
            confidence = intent.confidence,
            provider = %selection.provider_name(),
            success = outcome == Outcome::Success,
            "message processed"
        );

        let confidence = intent.confidence;
        ProcessedMessage {
            intent,
            entities: extraction.value.entities,
            response: generation.value,
            confidence,
        }
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
        info!(event_name = "router.metrics.reset", "metrics reset");
    }

    pub fn threshold_report(&self) -> ThresholdReport {
        self.metrics.threshold_report(&self.store.get())
    }

    pub fn update_config(&self, patch: PolicyPatch) -> Result<(), ApplicationError> {
        self.store.update(patch).map(|_| ())
    }

    pub fn policy(&self) -> Arc<RoutingPolicy> {
        self.store.get()
    }

    pub fn supported_intents(&self) -> Vec<IntentName> {
        self.classifier.supported_intents()
    }

    pub fn supported_entity_types(&self) -> Vec<EntityType> {
        self.extractor.supported_entity_types()
    }

    fn select(
        &self,
        policy: &RoutingPolicy,
        operation: OperationKind,
        correlation_id: &str,
    ) -> ProviderSelection {
        let selection = select_provider(policy, operation);
        info!(
            event_name = "router.provider.selected",
            correlation_id = %correlation_id,
            operation = %operation,
            provider = %selection.provider_name(),
            source = ?selection.source,
            "provider selected"
        );
        selection
    }

    async fn dispatch(
        &self,
        selection: &ProviderSelection,
        correlation_id: &str,
        input: &str,
    ) -> Result<Decimal, StageError> {
        let request = InferenceRequest::for_selection(selection, correlation_id, input);
        self.backends.resolve(selection.provider_name()).dispatch(&request).await
    }

    async fn run_classification(
        &self,
        selection: &ProviderSelection,
        correlation_id: &str,
        message: &str,
        context: &ConversationContext,
    ) -> StageRun<ClassificationResult> {
        let result = match self.dispatch(selection, correlation_id, message).await {
            Ok(cost) => self.classifier.classify(message, context).map(|value| (value, cost)),
            Err(error) => Err(error),
        };
        degrade(OperationKind::Classification, correlation_id, selection, result, || {
            ClassificationResult::unknown(0.0)
        })
    }

    async fn run_extraction(
        &self,
        selection: &ProviderSelection,
        correlation_id: &str,
        message: &str,
    ) -> StageRun<ExtractionResult> {
        let result = match self.dispatch(selection, correlation_id, message).await {
            Ok(cost) => self.extractor.extract(message).map(|value| (value, cost)),
            Err(error) => Err(error),
        };
        degrade(OperationKind::Extraction, correlation_id, selection, result, ExtractionResult::empty)
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_generation(
        &self,
        selection: &ProviderSelection,
        correlation_id: &str,
        intent: &Intent,
        context: &ConversationContext,
        business: &BusinessContext,
        raw_message: Option<&str>,
        options: &GenerationOptions,
        started: Instant,
    ) -> StageRun<GenerationResult> {
        let prompt = raw_message.unwrap_or(intent.name.as_str());
        let result = match self.dispatch(selection, correlation_id, prompt).await {
            Ok(cost) => self
                .generator
                .generate(intent, context, business, raw_message, options)
                .map(|value| (value, cost)),
            Err(error) => Err(error),
        };
        let provider = selection.provider_name();
        let result = result.map(|(generated, cost)| {
            (GenerationResult::from_generated(generated, provider, elapsed_ms(started)), cost)
        });
        degrade(OperationKind::Generation, correlation_id, selection, result, || {
            let mut fallback = GenerationResult::fallback(provider, elapsed_ms(started));
            if let Some(limit) = options.max_response_length {
                truncate_chars(&mut fallback.text, limit);
            }
            fallback
        })
    }

    fn record(&self, outcome: Outcome, started: Instant, cost: Decimal, selection: &ProviderSelection) {
        self.metrics.record(outcome, elapsed_ms(started), cost, selection.provider_name());
    }
}

/// The single catch-and-degrade seam: a stage error becomes the fallback
/// value with a failed outcome and no cost.
fn degrade<T>(
    operation: OperationKind,
    correlation_id: &str,
    selection: &ProviderSelection,
    result: Result<(T, Decimal), StageError>,
    fallback: impl FnOnce() -> T,
) -> StageRun<T> {
    match result {
        Ok((value, cost)) => StageRun { value, outcome: Outcome::Success, cost },
        Err(error) => {
            warn!(
                event_name = degraded_event(operation),
                correlation_id = %correlation_id,
                provider = %selection.provider_name(),
                stage = error.stage(),
                error = %error,
                "stage failed; returning degraded result"
            );
            StageRun { value: fallback(), outcome: Outcome::Failure, cost: Decimal::ZERO }
        }
    }
}

fn degraded_event(operation: OperationKind) -> &'static str {
    match operation {
        OperationKind::Classification => "router.classify.degraded",
        OperationKind::Extraction => "router.extract.degraded",
        OperationKind::Generation => "router.generate.degraded",
    }
}

fn new_correlation_id() -> String {
    format!("req-{}", Uuid::new_v4().simple())
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
