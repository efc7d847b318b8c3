//! Incremental editing of an existing itinerary: classify the request, apply
//! it, and describe the result as an ordered stream of patch events.

pub mod applicator;
pub mod classifier;
pub mod diff;
pub mod intent;

pub use applicator::{remove_days, ChangePlan, ModificationApplicator, PriceBounds};
pub use classifier::{
    classify_rules, resolve_envelope, types_for_keyword, ConversationTurn,
    ModificationClassifier, RULE_CONFIDENCE_THRESHOLD,
};
pub use diff::{diff, PatchEvent, PatchStream};
pub use intent::{IntentParams, ModificationIntent, ModificationType, TypeFilterAction};

use std::{sync::Arc, time::Duration};

use tracing::info;

use crate::{
    agents::SearchLayer,
    config::PlannerConfig,
    services::{CompletionClient, Discovery},
    types::Itinerary,
};

/// Result of running one edit request end to end
#[derive(Debug)]
pub struct ModificationOutcome {
    pub intent: ModificationIntent,
    pub itinerary: Itinerary,
    pub events: PatchStream,
}

/// Classifier and applicator wired to the same collaborators
#[derive(Clone)]
pub struct ModificationEngine {
    classifier: ModificationClassifier,
    applicator: ModificationApplicator,
}

impl ModificationEngine {
    pub fn new(completion: Arc<dyn CompletionClient>, discovery: Arc<dyn Discovery>) -> Self {
        Self {
            classifier: ModificationClassifier::new(Arc::clone(&completion)),
            applicator: ModificationApplicator::new(completion, discovery),
        }
    }

    pub fn from_config(
        config: &PlannerConfig,
        completion: Arc<dyn CompletionClient>,
        discovery: Arc<dyn Discovery>,
    ) -> Self {
        let search = SearchLayer::new(Arc::clone(&discovery), Arc::clone(&completion))
            .with_config(config);
        Self::new(completion, discovery)
            .with_search_layer(search)
            .with_timeout(config.completion_timeout)
    }

    pub fn with_search_layer(mut self, search: SearchLayer) -> Self {
        self.applicator = self.applicator.with_search_layer(search);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.classifier = self.classifier.with_timeout(timeout);
        self.applicator = self.applicator.with_timeout(timeout);
        self
    }

    pub fn classifier(&self) -> &ModificationClassifier {
        &self.classifier
    }

    pub fn applicator(&self) -> &ModificationApplicator {
        &self.applicator
    }

    pub async fn classify(
        &self,
        request: &str,
        itinerary: &Itinerary,
        context: &[ConversationTurn],
    ) -> ModificationIntent {
        self.classifier.classify(request, itinerary, context).await
    }

    pub async fn apply(&self, itinerary: Itinerary, intent: ModificationIntent) -> Itinerary {
        self.applicator.apply(itinerary, intent).await
    }

    /// Classify, apply and diff. Non-modifications come back unchanged with only
    /// the start and completion events.
    pub async fn modify(
        &self,
        request: &str,
        itinerary: &Itinerary,
        context: &[ConversationTurn],
    ) -> ModificationOutcome {
        let intent = self.classify(request, itinerary, context).await;
        let modified = self.apply(itinerary.clone(), intent.clone()).await;

        info!(
            target: "trip_planner::modification",
            kind = %intent.kind,
            days_before = itinerary.days.len(),
            days_after = modified.days.len(),
            "Modification finished"
        );

        let events = diff(itinerary, &modified).with_start(&intent);
        ModificationOutcome {
            intent,
            itinerary: modified,
            events,
        }
    }
}
