use std::{collections::HashSet, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{cache::VenueCache, state::RunState, steps::PipelineStep};
use crate::{
    agents::{
        assemble, ItineraryValidator, SearchLayer, ThemeAnalyzer, DEFAULT_MIN_PLACES_PER_DAY,
    },
    config::PlannerConfig,
    services::{CompletionClient, Discovery, PriceLookup},
    types::{PipelineRun, ValidationResult, Venue},
};

/// Validation failures that re-enter place search before finalizing anyway
pub const MAX_RETRIES: u32 = 1;

/// Places per day used to group anchors for restaurant search
const RESTAURANT_ANCHORS_PER_DAY: usize = 3;

/// Phases of a generation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Start,
    Analyze,
    SearchPlaces,
    SearchRestaurants,
    Assemble,
    Validate,
    Retry,
    Finalize,
    Done,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Start => "start",
            Phase::Analyze => "analyze",
            Phase::SearchPlaces => "search_places",
            Phase::SearchRestaurants => "search_restaurants",
            Phase::Assemble => "assemble",
            Phase::Validate => "validate",
            Phase::Retry => "retry",
            Phase::Finalize => "finalize",
            Phase::Done => "done",
        }
    }

    /// Fraction of the run complete once this phase finishes
    pub fn progress(&self) -> f64 {
        match self {
            Phase::Start | Phase::Retry => 0.0,
            Phase::Analyze => 0.15,
            Phase::SearchPlaces => 0.45,
            Phase::SearchRestaurants => 0.65,
            Phase::Assemble => 0.80,
            Phase::Validate => 0.90,
            Phase::Finalize | Phase::Done => 1.0,
        }
    }
}

/// What a phase handler reports back to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    Continue,
    Validated { passed: bool, retries_used: u32 },
}

/// Next phase after `phase` finished with `outcome`
pub fn transition(phase: Phase, outcome: &PhaseOutcome) -> Phase {
    match (phase, outcome) {
        (Phase::Start, _) => Phase::Analyze,
        (Phase::Analyze, _) => Phase::SearchPlaces,
        (Phase::SearchPlaces, _) => Phase::SearchRestaurants,
        (Phase::SearchRestaurants, _) => Phase::Assemble,
        (Phase::Assemble, _) => Phase::Validate,
        (
            Phase::Validate,
            PhaseOutcome::Validated {
                passed: false,
                retries_used,
            },
        ) if *retries_used < MAX_RETRIES => Phase::Retry,
        (Phase::Validate, _) => Phase::Finalize,
        (Phase::Retry, _) => Phase::SearchPlaces,
        (Phase::Finalize, _) | (Phase::Done, _) => Phase::Done,
    }
}

/// Generation pipeline: analyze, search places, search restaurants, assemble,
/// validate (with one retry into place search), finalize.
#[derive(Clone)]
pub struct TripPipeline {
    analyzer: ThemeAnalyzer,
    search: SearchLayer,
    validator: ItineraryValidator,
    cache: VenueCache,
}

impl TripPipeline {
    pub fn new(completion: Arc<dyn CompletionClient>, discovery: Arc<dyn Discovery>) -> Self {
        Self {
            analyzer: ThemeAnalyzer::new(Arc::clone(&completion)),
            search: SearchLayer::new(discovery, Arc::clone(&completion)),
            validator: ItineraryValidator::new(completion),
            cache: VenueCache::new(),
        }
    }

    pub fn from_config(
        config: &PlannerConfig,
        completion: Arc<dyn CompletionClient>,
        discovery: Arc<dyn Discovery>,
    ) -> Self {
        let mut pipeline = Self::new(completion, discovery);
        pipeline.analyzer = pipeline.analyzer.with_timeout(config.completion_timeout);
        pipeline.validator = pipeline.validator.with_timeout(config.completion_timeout);
        pipeline.search = pipeline.search.with_config(config);
        pipeline
    }

    pub fn with_price_lookup(mut self, price_lookup: Arc<dyn PriceLookup>) -> Self {
        self.search = self.search.with_price_lookup(price_lookup);
        self
    }

    pub fn with_search_layer(mut self, search: SearchLayer) -> Self {
        self.search = search;
        self
    }

    /// Share a venue cache with the caller. It is cleared at the start of each run.
    pub fn with_cache(mut self, cache: VenueCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &VenueCache {
        &self.cache
    }

    pub fn search_layer(&self) -> &SearchLayer {
        &self.search
    }

    /// Run the pipeline to completion. Never fails: phase failures are collected
    /// in the result's `errors`, and `success` is false only when no itinerary exists.
    pub async fn run(&self, query: &str) -> PipelineRun {
        let mut state = RunState::new(query);
        self.cache.clear();

        info!(
            target: "trip_planner::pipeline",
            execution_id = %state.execution_id,
            query,
            "Starting pipeline"
        );

        let mut phase = transition(Phase::Start, &PhaseOutcome::Continue);
        while phase != Phase::Done {
            state.enter(phase);
            let outcome = match phase {
                Phase::Analyze => self.analyze(&mut state).await,
                Phase::SearchPlaces => self.search_places(&mut state).await,
                Phase::SearchRestaurants => self.search_restaurants(&mut state).await,
                Phase::Assemble => self.assemble(&mut state),
                Phase::Validate => self.validate(&mut state).await,
                Phase::Retry => self.retry(&mut state),
                Phase::Finalize => self.finalize(&mut state),
                Phase::Start | Phase::Done => PhaseOutcome::Continue,
            };
            phase = transition(phase, &outcome);
        }

        let run = state.into_run();
        info!(
            target: "trip_planner::pipeline",
            execution_id = %run.execution_id,
            success = run.success,
            errors = run.errors.len(),
            retries = run.retries,
            duration_ms = run.duration.as_millis() as u64,
            "Pipeline finished"
        );
        run
    }

    async fn analyze(&self, state: &mut RunState) -> PhaseOutcome {
        match self.analyzer.analyze(&state.query).await {
            Ok(theme) => {
                state.add_step(PipelineStep::action(
                    "query_analyzer",
                    "analyze",
                    format!("Theme: {}, City: {}", theme.theme, theme.city),
                ));
                state.theme = Some(theme);
                state.complete(Phase::Analyze);
            }
            Err(err) => state.record_error(Phase::Analyze, format!("Query analysis failed: {err}")),
        }
        PhaseOutcome::Continue
    }

    async fn search_places(&self, state: &mut RunState) -> PhaseOutcome {
        let Some(theme) = state.theme.clone() else {
            state.record_error(Phase::SearchPlaces, "No theme analysis available");
            return PhaseOutcome::Continue;
        };

        let results = self
            .search
            .search_places(&theme, DEFAULT_MIN_PLACES_PER_DAY)
            .await;
        self.cache.record_all(&results.venues);
        state.extend_errors(results.failures);
        state.add_step(PipelineStep::action(
            "places_agent",
            "search",
            format!("Found {} places", results.venues.len()),
        ));
        state.places = results.venues;
        state.complete(Phase::SearchPlaces);
        PhaseOutcome::Continue
    }

    async fn search_restaurants(&self, state: &mut RunState) -> PhaseOutcome {
        let Some(theme) = state.theme.clone() else {
            state.record_error(Phase::SearchRestaurants, "No theme analysis available");
            return PhaseOutcome::Continue;
        };

        let buckets: Vec<Vec<Venue>> = (0..theme.duration_days.max(1) as usize)
            .map(|day_idx| {
                state
                    .places
                    .iter()
                    .skip(day_idx * RESTAURANT_ANCHORS_PER_DAY)
                    .take(RESTAURANT_ANCHORS_PER_DAY)
                    .cloned()
                    .collect()
            })
            .collect();

        let results = self
            .search
            .search_restaurants(&theme, &buckets, &HashSet::new())
            .await;
        self.cache.record_all(&results.venues);
        state.extend_errors(results.failures);
        state.add_step(PipelineStep::action(
            "restaurant_agent",
            "search",
            format!("Found {} restaurants", results.venues.len()),
        ));
        state.restaurants = results.venues;
        state.complete(Phase::SearchRestaurants);
        PhaseOutcome::Continue
    }

    fn assemble(&self, state: &mut RunState) -> PhaseOutcome {
        let Some(theme) = state.theme.as_ref() else {
            state.record_error(Phase::Assemble, "No theme analysis available");
            return PhaseOutcome::Continue;
        };

        let itinerary = assemble(theme, &state.places, &state.restaurants);
        state.add_step(PipelineStep::action(
            "assembler",
            "assemble",
            format!("Created {} day plan", itinerary.days.len()),
        ));
        state.itinerary = Some(itinerary);
        state.complete(Phase::Assemble);
        PhaseOutcome::Continue
    }

    async fn validate(&self, state: &mut RunState) -> PhaseOutcome {
        let validation = match state.itinerary.as_ref() {
            Some(itinerary) => self.validator.validate(itinerary).await,
            None => ValidationResult::failed("No itinerary to validate"),
        };

        state.add_step(PipelineStep::action(
            "validator",
            "validate",
            format!(
                "Score: {:.2}, Valid: {}",
                validation.quality_score, validation.is_valid
            ),
        ));
        let passed = validation.is_valid;
        state.validation = Some(validation);
        state.complete(Phase::Validate);

        PhaseOutcome::Validated {
            passed,
            retries_used: state.retries,
        }
    }

    fn retry(&self, state: &mut RunState) -> PhaseOutcome {
        state.retries += 1;
        let quality_score = state
            .validation
            .as_ref()
            .map(|validation| validation.quality_score)
            .unwrap_or(0.0);
        state.add_step(PipelineStep::Retry {
            attempt: state.retries,
            quality_score,
        });
        PhaseOutcome::Continue
    }

    fn finalize(&self, state: &mut RunState) -> PhaseOutcome {
        let Some(itinerary) = state.itinerary.as_mut() else {
            state.record_error(Phase::Finalize, "No itinerary to finalize");
            return PhaseOutcome::Continue;
        };

        let mut enriched = 0;
        for day in itinerary.days.iter_mut() {
            for venue in day.places.iter_mut().chain(day.restaurants.iter_mut()) {
                if self.cache.enrich(venue) {
                    enriched += 1;
                }
            }
        }

        match serde_json::to_value(&*itinerary) {
            Ok(document) => {
                state.document = Some(document);
                state.add_step(PipelineStep::action(
                    "orchestrator",
                    "finalize",
                    format!("Trip finalized ({enriched} venues enriched from cache)"),
                ));
                state.complete(Phase::Finalize);
            }
            Err(err) => state.record_error(
                Phase::Finalize,
                format!("Failed to serialize itinerary: {err}"),
            ),
        }
        PhaseOutcome::Continue
    }
}
