use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::{
    schemas::{cached_schema, parse_or, CompletionSchema, ParseMode, SchemaHandle},
    services::{with_timeout, CompletionClient},
    types::{Itinerary, MealCategory, ValidationResult},
};

const MIN_PLACES: usize = 3;
const MIN_RESTAURANTS: usize = 3;
const VALID_THRESHOLD: f64 = 0.5;
const DEFAULT_REVIEW_SCORE: f64 = 0.7;

const VALIDATOR_PROMPT: &str = "You are a trip plan quality validator. Check THEME CONSISTENCY \
(flag generic tourist spots that do not fit the theme), QUANTITY (at least 3 places and exactly \
3 restaurants per day: breakfast, lunch, dinner), GEOGRAPHIC LOGIC (places within a day are \
reasonably close), DATA COMPLETENESS and VARIETY. Be strict but fair; a good trip scores 0.7+.";

/// Semantic review returned by the completion service
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SemanticReview {
    #[serde(default = "default_review_score")]
    pub quality_score: f64,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

fn default_review_score() -> f64 {
    DEFAULT_REVIEW_SCORE
}

impl Default for SemanticReview {
    fn default() -> Self {
        Self {
            quality_score: DEFAULT_REVIEW_SCORE,
            issues: Vec::new(),
            suggestions: Vec::new(),
        }
    }
}

impl CompletionSchema for SemanticReview {
    fn schema() -> &'static SchemaHandle {
        static SCHEMA: OnceLock<SchemaHandle> = OnceLock::new();
        cached_schema::<SemanticReview>(&SCHEMA, "SemanticReview")
    }
}

/// Outcome of the cheap structural pass
#[derive(Debug, Clone, PartialEq)]
pub struct StructuralReport {
    pub score: f64,
    pub issues: Vec<String>,
    /// A day has too few places or restaurants
    pub insufficient: bool,
}

/// Count and completeness checks. Each problem lowers the score from 1.0.
pub fn structural_checks(itinerary: &Itinerary) -> StructuralReport {
    let mut score = 1.0;
    let mut issues = Vec::new();
    let mut insufficient = false;

    for day in &itinerary.days {
        let day_num = day.day_number;

        if day.places.len() < MIN_PLACES {
            issues.push(format!(
                "Day {}: Only {} places (minimum {} required)",
                day_num,
                day.places.len(),
                MIN_PLACES
            ));
            score -= 0.1;
            insufficient = true;
        }

        if day.restaurants.len() < MIN_RESTAURANTS {
            issues.push(format!(
                "Day {}: Only {} restaurants (need breakfast, lunch, dinner)",
                day_num,
                day.restaurants.len()
            ));
            score -= 0.1;
            insufficient = true;
        }

        for category in MealCategory::ALL {
            if !day
                .restaurants
                .iter()
                .any(|restaurant| restaurant.category == Some(category))
            {
                issues.push(format!("Day {}: Missing {} restaurant", day_num, category));
                score -= 0.05;
            }
        }

        for place in &day.places {
            if place.location.is_none() {
                issues.push(format!(
                    "Day {}: Place '{}' missing coordinates",
                    day_num, place.name
                ));
                score -= 0.02;
            }
        }

        for restaurant in &day.restaurants {
            if restaurant.category.is_none() {
                issues.push(format!(
                    "Day {}: Restaurant '{}' missing category",
                    day_num, restaurant.name
                ));
                score -= 0.02;
            }
        }
    }

    StructuralReport {
        score,
        issues,
        insufficient,
    }
}

/// Scores itinerary quality and decides pass/fail
#[derive(Clone)]
pub struct ItineraryValidator {
    client: Arc<dyn CompletionClient>,
    timeout: Duration,
}

impl ItineraryValidator {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn validate(&self, itinerary: &Itinerary) -> ValidationResult {
        let report = structural_checks(itinerary);
        let mut score = report.score;
        let mut issues = report.issues;
        let mut suggestions = Vec::new();

        match self.review(itinerary).await {
            Some(review) => {
                issues.extend(review.issues);
                suggestions.extend(review.suggestions);
                score = (score + review.quality_score.clamp(0.0, 1.0)) / 2.0;
            }
            None => suggestions.push("Could not perform deep theme validation".to_string()),
        }

        let quality_score = score.clamp(0.0, 1.0);
        let is_valid = quality_score >= VALID_THRESHOLD && !report.insufficient;

        info!(
            target: "trip_planner::validator",
            is_valid,
            quality_score,
            issues = issues.len(),
            "Validation complete"
        );

        ValidationResult {
            is_valid,
            issues,
            suggestions,
            quality_score,
        }
    }

    /// `None` when the completion call itself failed; an unparseable answer
    /// yields the default review
    async fn review(&self, itinerary: &Itinerary) -> Option<SemanticReview> {
        let summary = json!({
            "title": itinerary.title,
            "theme": itinerary.theme,
            "city": itinerary.city,
            "days": itinerary.days.iter().map(|day| json!({
                "day": day.day_number,
                "title": day.title,
                "places": day.places.iter().map(|place| json!({
                    "name": place.name,
                    "types": place.types.iter().take(3).collect::<Vec<_>>(),
                })).collect::<Vec<_>>(),
                "restaurants": day.restaurants.iter().map(|restaurant| json!({
                    "name": restaurant.name,
                    "cuisine": restaurant.cuisine,
                    "category": restaurant.category,
                })).collect::<Vec<_>>(),
            })).collect::<Vec<_>>(),
        });

        let prompt = format!(
            "{}\n\nTrip Theme: {}\nCity: {}\nDuration: {} days\n\nTrip Plan:\n{}\n\n{}",
            VALIDATOR_PROMPT,
            itinerary.theme,
            itinerary.city,
            itinerary.duration_days,
            serde_json::to_string_pretty(&summary).unwrap_or_default(),
            SemanticReview::schema().prompt_instructions()
        );

        match with_timeout(
            self.timeout,
            "validation",
            self.client.complete(&prompt, None),
        )
        .await
        {
            Ok(text) => Some(parse_or(&text, ParseMode::SerdeFirst, SemanticReview::default())),
            Err(err) => {
                warn!(
                    target: "trip_planner::validator",
                    error = %err,
                    "Semantic validation unavailable"
                );
                None
            }
        }
    }
}
