//! trip-planner-rs: themed itinerary generation and live incremental editing
//!
//! Two subsystems share one itinerary document:
//!
//! * [`TripPipeline`] turns a free-text request into a day-by-day
//!   [`Itinerary`] (analyze, search places, search restaurants, assemble,
//!   validate with one bounded retry, finalize).
//! * [`modification::ModificationEngine`] classifies an edit request against an
//!   existing itinerary, applies it as a deduplicated patch and describes the
//!   change as an ordered stream of [`PatchEvent`]s.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use trip_planner_rs::{
//!     GooglePlacesClient, OpenAICompatibleClient, PlannerConfig, TripPipeline,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PlannerConfig::from_env()?;
//!     let pipeline = TripPipeline::from_config(
//!         &config,
//!         Arc::new(OpenAICompatibleClient::from_config(&config)),
//!         Arc::new(GooglePlacesClient::from_config(&config)),
//!     );
//!
//!     let run = pipeline.run("3 days of anime spots in Tokyo").await;
//!     println!("{}", run.replay());
//!     Ok(())
//! }
//! ```

pub mod agents;
pub mod config;
pub mod core;
pub mod error;
pub mod modification;
pub mod schemas;
pub mod services;
pub mod types;

pub use config::PlannerConfig;
pub use crate::core::{Phase, PipelineStep, TripPipeline, VenueCache};
pub use error::{PlannerError, Result};
pub use modification::{
    diff, ConversationTurn, ModificationEngine, ModificationIntent, ModificationOutcome,
    ModificationType, PatchEvent, PatchStream,
};
pub use services::{
    CompletionClient, Discovery, GooglePlacesClient, JinaSearchClient, OpenAICompatibleClient,
    PriceLookup, SearchRequest,
};
pub use types::{
    price_level_label, DayPlan, Itinerary, MealCategory, PipelineRun, ThemeDescriptor,
    ValidationResult, Venue, MAX_TRIP_DAYS,
};

#[cfg(feature = "cli")]
pub mod cli;
