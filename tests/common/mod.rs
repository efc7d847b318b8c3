#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use serde_json::{json, Value};
use trip_planner_rs::{
    services::{CompletionClient, Discovery, PriceLookup, SearchRequest},
    types::{DayPlan, Itinerary, MealCategory, Venue},
    PlannerError, Result,
};

pub const ANALYZER: &str = "`ThemeAnalysis`";
pub const RELEVANCE: &str = "`RelevanceScores`";
pub const REVIEW: &str = "`SemanticReview`";
pub const CLASSIFIER: &str = "`ModificationClassification`";
pub const CHANGE_PLAN: &str = "`ChangePlan`";

/// Completion client that answers by matching a needle in the prompt.
/// Prompts without a scripted reply fail as an unavailable upstream.
#[derive(Default)]
pub struct ScriptedCompletion {
    replies: Vec<(&'static str, Option<String>)>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, needle: &'static str, reply: Value) -> Self {
        self.replies.push((needle, Some(reply.to_string())));
        self
    }

    pub fn reply_text(mut self, needle: &'static str, reply: &str) -> Self {
        self.replies.push((needle, Some(reply.to_string())));
        self
    }

    pub fn fail(mut self, needle: &'static str) -> Self {
        self.replies.push((needle, None));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_matching(&self, needle: &str) -> usize {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|prompt| prompt.contains(needle))
            .count()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(&self, prompt: &str, _system: Option<&str>) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        match self
            .replies
            .iter()
            .find(|(needle, _)| prompt.contains(needle))
        {
            Some((_, Some(reply))) => Ok(reply.clone()),
            Some((needle, None)) => Err(PlannerError::Upstream(format!(
                "scripted failure for {needle}"
            ))),
            None => Err(PlannerError::Upstream("no scripted reply".to_string())),
        }
    }
}

type Handler = dyn Fn(&SearchRequest) -> Result<Vec<Venue>> + Send + Sync;

/// Discovery backed by a closure, recording every query it receives
pub struct MockDiscovery {
    handler: Box<Handler>,
    calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl MockDiscovery {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&SearchRequest) -> Result<Vec<Venue>> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::new(|_| Ok(Vec::new()))
    }

    /// Themed places for place queries, three candidates per meal for restaurant queries
    pub fn city() -> Self {
        Self::new(city_results)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Discovery for MockDiscovery {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Venue>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(request.query.clone());
        (self.handler)(request)
    }
}

/// Price lookup returning the same page for every query
pub struct FixedPriceLookup {
    pub page: String,
    pub calls: AtomicUsize,
}

impl FixedPriceLookup {
    pub fn new(page: &str) -> Self {
        Self {
            page: page.to_string(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PriceLookup for FixedPriceLookup {
    async fn lookup(&self, _query: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.page.clone())
    }
}

fn slug(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

pub fn city_results(request: &SearchRequest) -> Result<Vec<Venue>> {
    let query = request.query.to_lowercase();
    if let Some(category) = MealCategory::mentioned_in(&query) {
        return Ok((0..6)
            .map(|idx| {
                restaurant(&format!("{}-{}", category, idx), category)
                    .with_rating(4.5 - idx as f64 * 0.1)
            })
            .collect());
    }

    let prefix = slug(&request.query);
    Ok((0..5)
        .map(|idx| {
            place(&format!("{prefix}-{idx}"), None)
                .with_types(["museum", "tourist_attraction"])
                .with_location(48.86 + idx as f64 * 0.001, 2.35)
        })
        .collect())
}

pub fn place(id: &str, price_level: Option<i32>) -> Venue {
    let mut venue = Venue::new(id, format!("Place {id}"))
        .with_types(["tourist_attraction"])
        .with_location(48.85, 2.35);
    venue.price_level = price_level;
    venue
}

pub fn restaurant(id: &str, category: MealCategory) -> Venue {
    Venue::new(id, format!("Restaurant {id}"))
        .with_types(["restaurant"])
        .with_location(48.85, 2.35)
        .with_category(category)
}

pub fn day(number: u32, places: Vec<Venue>, restaurants: Vec<Venue>) -> DayPlan {
    let mut day = DayPlan::new(number, format!("Day {number}"), "");
    day.places = places;
    day.restaurants = restaurants;
    day
}

pub fn trip(days: Vec<DayPlan>) -> Itinerary {
    Itinerary {
        title: "Art Trip to Paris".to_string(),
        description: "A 2-day art experience in Paris, France".to_string(),
        city: "Paris".to_string(),
        country: "France".to_string(),
        duration_days: days.len() as u32,
        theme: "art".to_string(),
        days,
    }
}

/// Two days of three places and three meals each
pub fn paris_trip() -> Itinerary {
    let meals = |prefix: &str| {
        MealCategory::ALL
            .into_iter()
            .map(|category| restaurant(&format!("{prefix}-{category}"), category))
            .collect::<Vec<_>>()
    };
    trip(vec![
        day(
            1,
            vec![place("louvre", Some(2)), place("orsay", Some(2)), place("tuileries", Some(0))],
            meals("d1"),
        ),
        day(
            2,
            vec![place("orangerie", Some(1)), place("rodin", Some(3)), place("montmartre", Some(0))],
            meals("d2"),
        ),
    ])
}

pub fn analysis(theme: &str, city: &str, days: u32) -> Value {
    json!({
        "theme": theme,
        "related_themes": ["galleries"],
        "search_queries": [
            format!("{theme} museums in {city}"),
            format!("{theme} galleries in {city}"),
        ],
        "restaurant_queries": [format!("restaurants in {city}")],
        "city": city,
        "country": "France",
        "duration_days": days,
        "special_requirements": [],
    })
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
