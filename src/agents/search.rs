use std::{
    collections::HashSet,
    sync::{Arc, OnceLock},
    time::Duration,
};

use futures::{future::join_all, stream, StreamExt};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::{
    config::PlannerConfig,
    error::Result,
    schemas::{cached_schema, parse_structured, CompletionSchema, ParseMode, SchemaHandle},
    services::{
        extract_ticket_price, with_timeout, CompletionClient, Discovery, PriceLookup,
        SearchRequest,
    },
    types::{MealCategory, ThemeDescriptor, Venue},
};

/// Places per day the place search aims for during generation
pub const DEFAULT_MIN_PLACES_PER_DAY: usize = 4;

const RESULTS_PER_QUERY: usize = 5;
const RELATED_THEME_RESULTS: usize = 10;
const MAX_RELATED_THEMES: usize = 3;
const MAX_SCORED_CANDIDATES: usize = 30;
const PRICE_LOOKUP_LIMIT: usize = 15;
const RESTAURANT_RESULTS: usize = 3;
const RESTAURANT_RADIUS_M: u32 = 1500;

/// Venue types that never count as places to visit
const FOOD_TYPES: &[&str] = &[
    "restaurant",
    "food",
    "cafe",
    "bakery",
    "bar",
    "meal_delivery",
    "meal_takeaway",
    "night_club",
    "liquor_store",
    "coffee_shop",
];

const THEME_CUISINES: &[(&str, &str)] = &[
    ("anime", "japanese"),
    ("manga", "japanese"),
    ("japanese", "japanese"),
    ("romantic", "french"),
    ("couples", "romantic"),
    ("biker", "steakhouse"),
    ("motorcycle", "american"),
    ("vegan", "vegan"),
    ("vegetarian", "vegetarian"),
    ("adventure", "local cuisine"),
    ("foodie", "michelin"),
    ("budget", "street food"),
    ("luxury", "fine dining"),
    ("family", "family restaurant"),
    ("nightlife", "late night"),
];

const RELEVANCE_PROMPT: &str = "You are evaluating places for a THEMED trip. Score each place's \
relevance to the theme from 0.0 to 1.0: 1.0 perfectly matches (an anime shop for an anime trip), \
0.7-0.9 strongly related, 0.4-0.6 somewhat related, 0.1-0.3 weakly related, 0.0 unrelated generic \
tourist spot. Be strict: generic landmarks that do not match the theme get LOW scores.";

/// Cuisine used to build restaurant queries for a theme
pub fn cuisine_for_theme(theme: &str) -> &'static str {
    let theme = theme.trim().to_lowercase();
    THEME_CUISINES
        .iter()
        .find(|(name, _)| *name == theme)
        .map(|(_, cuisine)| *cuisine)
        .unwrap_or("local cuisine")
}

pub fn is_food_venue(venue: &Venue) -> bool {
    venue
        .types
        .iter()
        .any(|tag| FOOD_TYPES.contains(&tag.as_str()))
}

/// Venues found by a search, plus the failures that were recovered along the way
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub venues: Vec<Venue>,
    pub failures: Vec<String>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.venues.is_empty()
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct RelevanceScore {
    place_id: String,
    /// 0.0 (unrelated) to 1.0 (perfect match)
    relevance_score: f64,
}

impl CompletionSchema for Vec<RelevanceScore> {
    fn schema() -> &'static SchemaHandle {
        static SCHEMA: OnceLock<SchemaHandle> = OnceLock::new();
        cached_schema::<Vec<RelevanceScore>>(&SCHEMA, "RelevanceScores")
    }
}

/// Fans discovery queries out concurrently, deduplicates by venue id and ranks by theme relevance
#[derive(Clone)]
pub struct SearchLayer {
    discovery: Arc<dyn Discovery>,
    completion: Arc<dyn CompletionClient>,
    price_lookup: Option<Arc<dyn PriceLookup>>,
    call_timeout: Duration,
    completion_timeout: Duration,
    min_relevance: f64,
    price_lookup_concurrency: usize,
}

impl SearchLayer {
    pub fn new(discovery: Arc<dyn Discovery>, completion: Arc<dyn CompletionClient>) -> Self {
        Self {
            discovery,
            completion,
            price_lookup: None,
            call_timeout: Duration::from_secs(30),
            completion_timeout: Duration::from_secs(60),
            min_relevance: 0.3,
            price_lookup_concurrency: 5,
        }
    }

    /// Apply timeouts and thresholds from the planner configuration
    pub fn with_config(mut self, config: &PlannerConfig) -> Self {
        self.call_timeout = config.call_timeout;
        self.completion_timeout = config.completion_timeout;
        self.min_relevance = config.min_theme_relevance;
        self.price_lookup_concurrency = config.price_lookup_concurrency.max(1);
        self
    }

    pub fn with_price_lookup(mut self, price_lookup: Arc<dyn PriceLookup>) -> Self {
        self.price_lookup = Some(price_lookup);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_min_relevance(mut self, min_relevance: f64) -> Self {
        self.min_relevance = min_relevance;
        self
    }

    async fn discover(&self, request: &SearchRequest) -> Result<Vec<Venue>> {
        with_timeout(
            self.call_timeout,
            "discovery",
            self.discovery.search(request),
        )
        .await
    }

    /// Find themed places. Never fails: query errors are collected in `failures`.
    pub async fn search_places(
        &self,
        theme: &ThemeDescriptor,
        min_places_per_day: usize,
    ) -> SearchResults {
        let total_needed = theme.duration_days.max(1) as usize * min_places_per_day;
        let cap = (total_needed * 2).max(20);

        info!(
            target: "trip_planner::search",
            theme = %theme.theme,
            city = %theme.city,
            queries = theme.search_queries.len(),
            "Searching places for theme"
        );

        let requests: Vec<SearchRequest> = theme
            .search_queries
            .iter()
            .map(|query| SearchRequest::new(query.clone(), RESULTS_PER_QUERY))
            .collect();

        let mut results = SearchResults::default();
        let mut seen = HashSet::new();
        let mut unique = Vec::new();

        let batches = join_all(requests.iter().map(|request| self.discover(request))).await;
        collect_unique(&requests, batches, &mut seen, &mut unique, &mut results.failures);

        if unique.is_empty() && !theme.related_themes.is_empty() {
            warn!(
                target: "trip_planner::search",
                theme = %theme.theme,
                "No places found, trying related themes"
            );
            let related: Vec<SearchRequest> = theme
                .related_themes
                .iter()
                .take(MAX_RELATED_THEMES)
                .map(|related| {
                    SearchRequest::new(format!("{} {}", related, theme.city), RELATED_THEME_RESULTS)
                })
                .collect();
            let batches = join_all(related.iter().map(|request| self.discover(request))).await;
            collect_unique(&related, batches, &mut seen, &mut unique, &mut results.failures);
        }

        let found = unique.len();
        let mut places: Vec<Venue> = unique
            .into_iter()
            .filter(|venue| !is_food_venue(venue))
            .collect();

        if !places.is_empty() {
            if let Err(err) = self.score_relevance(&mut places, theme).await {
                warn!(
                    target: "trip_planner::search",
                    error = %err,
                    "Failed to evaluate theme relevance"
                );
                results
                    .failures
                    .push(format!("Theme relevance scoring failed: {}", err));
            }
        }

        places.sort_by(|a, b| b.theme_relevance.total_cmp(&a.theme_relevance));

        let (mut kept, low): (Vec<Venue>, Vec<Venue>) = places
            .into_iter()
            .partition(|venue| venue.theme_relevance >= self.min_relevance);
        if kept.len() < total_needed {
            let remaining = total_needed - kept.len();
            kept.extend(low.into_iter().take(remaining));
        }
        kept.truncate(cap);

        if let Some(price_lookup) = &self.price_lookup {
            self.annotate_prices(price_lookup, &mut kept, &theme.city).await;
        }

        info!(
            target: "trip_planner::search",
            total_found = found,
            after_filter = kept.len(),
            theme = %theme.theme,
            "Places search complete"
        );

        results.venues = kept;
        results
    }

    async fn score_relevance(&self, places: &mut [Venue], theme: &ThemeDescriptor) -> Result<()> {
        let candidates: Vec<_> = places
            .iter()
            .take(MAX_SCORED_CANDIDATES)
            .map(|venue| {
                json!({
                    "place_id": venue.place_id,
                    "name": venue.name,
                    "types": venue.types.iter().take(5).collect::<Vec<_>>(),
                    "address": venue.address,
                })
            })
            .collect();

        let prompt = format!(
            "{}\n\nTheme: {}\nRelated themes: {}\n\nPlaces to evaluate:\n{}\n\n{}",
            RELEVANCE_PROMPT,
            theme.theme,
            theme.related_themes.join(", "),
            serde_json::to_string_pretty(&candidates)?,
            <Vec<RelevanceScore> as CompletionSchema>::schema().prompt_instructions()
        );

        let text = with_timeout(
            self.completion_timeout,
            "relevance scoring",
            self.completion.complete(&prompt, None),
        )
        .await?;
        let scores: Vec<RelevanceScore> = parse_structured(&text, ParseMode::SerdeFirst)?;

        for score in scores {
            if let Some(venue) = places.iter_mut().find(|venue| venue.place_id == score.place_id) {
                venue.theme_relevance = score.relevance_score.clamp(0.0, 1.0);
            }
        }

        Ok(())
    }

    async fn annotate_prices(
        &self,
        price_lookup: &Arc<dyn PriceLookup>,
        places: &mut [Venue],
        city: &str,
    ) {
        let lookups: Vec<(usize, String)> = places
            .iter()
            .take(PRICE_LOOKUP_LIMIT)
            .enumerate()
            .map(|(idx, venue)| (idx, format!("{} {} entrance fee ticket price", venue.name, city)))
            .collect();

        let timeout = self.call_timeout;
        let found: Vec<(usize, Option<String>)> = stream::iter(lookups)
            .map(|(idx, query)| {
                let price_lookup = Arc::clone(price_lookup);
                async move {
                    match with_timeout(timeout, "price lookup", price_lookup.lookup(&query)).await {
                        Ok(text) => (idx, extract_ticket_price(&text)),
                        Err(err) => {
                            debug!(
                                target: "trip_planner::search",
                                query = %query,
                                error = %err,
                                "Price lookup failed"
                            );
                            (idx, None)
                        }
                    }
                }
            })
            .buffer_unordered(self.price_lookup_concurrency.max(1))
            .collect()
            .await;

        let mut priced = 0;
        for (idx, price) in found {
            if let (Some(price), Some(venue)) = (price, places.get_mut(idx)) {
                venue.price = Some(price);
                priced += 1;
            }
        }

        info!(target: "trip_planner::search", priced, "Found ticket prices");
    }

    /// Find one breakfast, lunch and dinner per day near that day's places.
    ///
    /// Results never repeat a venue, and never include ids in `exclude`.
    pub async fn search_restaurants(
        &self,
        theme: &ThemeDescriptor,
        day_places: &[Vec<Venue>],
        exclude: &HashSet<String>,
    ) -> SearchResults {
        let cuisine = cuisine_for_theme(&theme.theme);
        info!(
            target: "trip_planner::search",
            theme = %theme.theme,
            city = %theme.city,
            days = day_places.len(),
            cuisine,
            "Searching restaurants"
        );

        let day_searches = day_places.iter().map(|places| async move {
            let requests = meal_requests(places, cuisine, &theme.city);
            let batches = join_all(requests.iter().map(|(_, request)| self.discover(request))).await;
            requests.into_iter().zip(batches).collect::<Vec<_>>()
        });
        let per_day = join_all(day_searches).await;

        let mut results = SearchResults::default();
        let mut used: HashSet<String> = exclude.clone();

        for (day_idx, meals) in per_day.into_iter().enumerate() {
            for ((category, request), batch) in meals {
                match batch {
                    Ok(mut candidates) => {
                        candidates.sort_by(|a, b| {
                            b.rating.unwrap_or(0.0).total_cmp(&a.rating.unwrap_or(0.0))
                        });
                        let pick = candidates.into_iter().find(|venue| {
                            !venue.place_id.is_empty() && !used.contains(&venue.place_id)
                        });
                        if let Some(mut restaurant) = pick {
                            used.insert(restaurant.place_id.clone());
                            restaurant.category = Some(category);
                            restaurant.cuisine = Some(cuisine.to_string());
                            results.venues.push(restaurant);
                        }
                    }
                    Err(err) => {
                        warn!(
                            target: "trip_planner::search",
                            day = day_idx + 1,
                            query = %request.query,
                            error = %err,
                            "Restaurant search failed"
                        );
                        results.failures.push(format!(
                            "Restaurant search failed for day {} ({}): {}",
                            day_idx + 1,
                            category,
                            err
                        ));
                    }
                }
            }
        }

        info!(
            target: "trip_planner::search",
            total_found = results.venues.len(),
            "Restaurant search complete"
        );

        results
    }

    /// Find the best rated `category` restaurant for one day, skipping `exclude`.
    ///
    /// The query is biased towards the day's anchor place; a day without places
    /// searches the whole city instead.
    pub async fn search_meal(
        &self,
        theme: &ThemeDescriptor,
        cuisine: &str,
        category: MealCategory,
        places: &[Venue],
        exclude: &HashSet<String>,
    ) -> Result<Option<Venue>> {
        let anchor = meal_anchor(places, category);
        let request = meal_request(category, anchor, cuisine, &theme.city);
        debug!(
            target: "trip_planner::search",
            query = %request.query,
            city_wide = request.location.is_none(),
            "Searching one meal"
        );

        let mut candidates = self.discover(&request).await?;
        candidates.sort_by(|a, b| b.rating.unwrap_or(0.0).total_cmp(&a.rating.unwrap_or(0.0)));

        Ok(candidates
            .into_iter()
            .find(|venue| !venue.place_id.is_empty() && !exclude.contains(&venue.place_id))
            .map(|mut restaurant| {
                restaurant.category = Some(category);
                restaurant.cuisine = Some(cuisine.to_string());
                restaurant
            }))
    }
}

/// Breakfast near the first place, lunch near the middle one, dinner near the last
fn meal_anchor(places: &[Venue], category: MealCategory) -> Option<&Venue> {
    let idx = match category {
        MealCategory::Breakfast => 0,
        MealCategory::Lunch => places.len() / 2,
        MealCategory::Dinner => places.len().checked_sub(1)?,
    };
    places.get(idx)
}

fn meal_request(
    category: MealCategory,
    anchor: Option<&Venue>,
    cuisine: &str,
    city: &str,
) -> SearchRequest {
    let request = SearchRequest::new(
        format!("{} {} {}", cuisine, category, city),
        RESTAURANT_RESULTS,
    );
    match anchor.and_then(|venue| venue.location) {
        Some(location) => request.near(location, RESTAURANT_RADIUS_M),
        None => request,
    }
}

/// One request per meal for a day with places; none for an empty day
fn meal_requests(
    places: &[Venue],
    cuisine: &str,
    city: &str,
) -> Vec<(MealCategory, SearchRequest)> {
    if places.is_empty() {
        return Vec::new();
    }

    MealCategory::ALL
        .into_iter()
        .map(|category| {
            let anchor = meal_anchor(places, category);
            (category, meal_request(category, anchor, cuisine, city))
        })
        .collect()
}

fn collect_unique(
    requests: &[SearchRequest],
    batches: Vec<Result<Vec<Venue>>>,
    seen: &mut HashSet<String>,
    unique: &mut Vec<Venue>,
    failures: &mut Vec<String>,
) {
    for (request, batch) in requests.iter().zip(batches) {
        match batch {
            Ok(venues) => {
                debug!(
                    target: "trip_planner::search",
                    query = %request.query,
                    count = venues.len(),
                    "Query returned results"
                );
                for venue in venues {
                    if !venue.place_id.is_empty() && seen.insert(venue.place_id.clone()) {
                        unique.push(venue);
                    }
                }
            }
            Err(err) => {
                warn!(
                    target: "trip_planner::search",
                    query = %request.query,
                    error = %err,
                    "Search failed"
                );
                failures.push(format!("Search failed for query '{}': {}", request.query, err));
            }
        }
    }
}
