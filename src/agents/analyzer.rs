use std::{sync::Arc, sync::OnceLock, time::Duration};

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    error::{PlannerError, Result},
    schemas::{cached_schema, parse_structured, CompletionSchema, ParseMode, SchemaHandle},
    services::{with_timeout, CompletionClient},
    types::{ThemeDescriptor, MAX_TRIP_DAYS},
};

const DEFAULT_DURATION_DAYS: u32 = 3;

const ANALYZER_SYSTEM_PROMPT: &str = "You are a query analyzer for a trip planning system. \
Parse the trip request and extract: the main THEME (e.g. \"anime\", \"romantic\", \"vegan\"), \
3-5 RELATED_THEMES used to widen the search, 8-12 SEARCH_QUERIES that find places matching the \
theme (never generic \"attractions in X\" queries), 4-6 RESTAURANT_QUERIES, the destination CITY \
and COUNTRY, the trip DURATION_DAYS and any SPECIAL_REQUIREMENTS (accessibility, dietary, ...).\n\n\
Example for \"3 day anime trip to Tokyo\": theme \"anime\", related themes [\"manga\", \"cosplay\", \
\"gaming\"], search queries [\"anime shops Tokyo\", \"manga stores Akihabara\", \"Pokemon center Tokyo\"], \
city \"Tokyo\", country \"Japan\", duration_days 3.";

/// Default destination city for a country named in a request
const COUNTRY_DEFAULT_CITIES: &[(&str, &str)] = &[
    ("japan", "Tokyo"),
    ("france", "Paris"),
    ("italy", "Rome"),
    ("spain", "Madrid"),
    ("germany", "Berlin"),
    ("united kingdom", "London"),
    ("uk", "London"),
    ("united states", "New York"),
    ("usa", "New York"),
    ("thailand", "Bangkok"),
    ("china", "Beijing"),
    ("south korea", "Seoul"),
    ("australia", "Sydney"),
    ("netherlands", "Amsterdam"),
    ("greece", "Athens"),
    ("turkey", "Istanbul"),
    ("egypt", "Cairo"),
    ("morocco", "Marrakech"),
    ("portugal", "Lisbon"),
    ("brazil", "Rio de Janeiro"),
    ("mexico", "Mexico City"),
    ("india", "Mumbai"),
    ("vietnam", "Ho Chi Minh City"),
    ("indonesia", "Bali"),
    ("singapore", "Singapore"),
    ("malaysia", "Kuala Lumpur"),
    ("uae", "Dubai"),
    ("czech republic", "Prague"),
    ("austria", "Vienna"),
    ("switzerland", "Zurich"),
    ("belgium", "Brussels"),
    ("poland", "Warsaw"),
    ("hungary", "Budapest"),
    ("ireland", "Dublin"),
    ("scotland", "Edinburgh"),
    ("croatia", "Dubrovnik"),
    ("norway", "Oslo"),
    ("sweden", "Stockholm"),
    ("denmark", "Copenhagen"),
    ("finland", "Helsinki"),
    ("iceland", "Reykjavik"),
    ("russia", "Moscow"),
    ("canada", "Toronto"),
    ("argentina", "Buenos Aires"),
    ("peru", "Lima"),
    ("colombia", "Bogota"),
    ("new zealand", "Auckland"),
    ("philippines", "Manila"),
    ("taiwan", "Taipei"),
    ("hong kong", "Hong Kong"),
];

/// Raw analyzer completion. Every field is optional; gaps are filled from defaults.
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct AnalyzerResponse {
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub related_themes: Option<Vec<String>>,
    #[serde(default)]
    pub search_queries: Option<Vec<String>>,
    #[serde(default)]
    pub restaurant_queries: Option<Vec<String>>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    /// Number of days; strings and floats are tolerated
    #[serde(default)]
    pub duration_days: Option<Value>,
    #[serde(default)]
    pub special_requirements: Option<Vec<String>>,
}

impl CompletionSchema for AnalyzerResponse {
    fn schema() -> &'static SchemaHandle {
        static SCHEMA: OnceLock<SchemaHandle> = OnceLock::new();
        cached_schema::<AnalyzerResponse>(&SCHEMA, "ThemeAnalysis")
    }
}

/// Turns a free-text trip request into a `ThemeDescriptor`
#[derive(Clone)]
pub struct ThemeAnalyzer {
    client: Arc<dyn CompletionClient>,
    timeout: Duration,
}

impl ThemeAnalyzer {
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

    /// Analyze a request. Completion failures degrade to a descriptor built from
    /// the query itself; only a blank request is an error.
    pub async fn analyze(&self, query: &str) -> Result<ThemeDescriptor> {
        let query = query.trim();
        if query.is_empty() {
            return Err(PlannerError::InvalidRequest(
                "Trip request is empty".to_string(),
            ));
        }

        info!(target: "trip_planner::analyzer", query, "Analyzing query");

        let prompt = format!(
            "Analyze this trip request:\n\n{}\n\n{}",
            query,
            AnalyzerResponse::schema().prompt_instructions()
        );

        let completion = with_timeout(
            self.timeout,
            "theme analysis",
            self.client.complete(&prompt, Some(ANALYZER_SYSTEM_PROMPT)),
        )
        .await;

        let raw = match completion
            .and_then(|text| parse_structured::<AnalyzerResponse>(&text, ParseMode::SerdeFirst))
        {
            Ok(raw) => raw,
            Err(err) => {
                warn!(
                    target: "trip_planner::analyzer",
                    error = %err,
                    "Query analysis failed, using fallback descriptor"
                );
                return Ok(fallback_descriptor(query));
            }
        };

        let descriptor = resolve_descriptor(raw, query);

        info!(
            target: "trip_planner::analyzer",
            theme = %descriptor.theme,
            city = %descriptor.city,
            duration = descriptor.duration_days,
            search_queries = descriptor.search_queries.len(),
            "Query analyzed"
        );

        Ok(descriptor)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty() && !text.eq_ignore_ascii_case("unknown"))
}

fn non_empty(list: Option<Vec<String>>) -> Option<Vec<String>> {
    list.map(|items| {
        items
            .into_iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect::<Vec<_>>()
    })
    .filter(|items| !items.is_empty())
}

/// Read a positive day count out of a loosely typed completion value,
/// capped at [`MAX_TRIP_DAYS`]
fn parse_duration(value: Option<&Value>) -> Option<u32> {
    let days = match value? {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().map(|days| days.round().max(0.0) as u64))?,
        Value::String(text) => text.trim().parse::<u64>().ok()?,
        _ => return None,
    };

    u32::try_from(days.min(u64::from(MAX_TRIP_DAYS)))
        .ok()
        .filter(|days| *days >= 1)
}

/// Map a country name to its default city
pub fn default_city_for_country(country: &str) -> Option<&'static str> {
    let country = country.trim().to_lowercase();
    COUNTRY_DEFAULT_CITIES
        .iter()
        .find(|(name, _)| *name == country)
        .map(|(_, city)| *city)
}

/// Find the first known country mentioned in free text
fn country_in_text(text: &str) -> Option<(&'static str, &'static str)> {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect();
    let normalized = format!(" {} ", words.join(" "));

    COUNTRY_DEFAULT_CITIES
        .iter()
        .find(|(name, _)| normalized.contains(&format!(" {} ", name)))
        .copied()
}

pub(crate) fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fill gaps in a raw analysis using the query and defaults
pub fn resolve_descriptor(raw: AnalyzerResponse, query: &str) -> ThemeDescriptor {
    let mut country = non_blank(raw.country);
    let city = match non_blank(raw.city) {
        Some(city) => city,
        None => match country.as_deref() {
            Some(known) => default_city_for_country(known)
                .map(str::to_string)
                .unwrap_or_else(|| known.to_string()),
            None => match country_in_text(query) {
                Some((name, city)) => {
                    country = Some(title_case(name));
                    city.to_string()
                }
                None => "Unknown".to_string(),
            },
        },
    };

    ThemeDescriptor {
        theme: non_blank(raw.theme).unwrap_or_else(|| "general".to_string()),
        related_themes: non_empty(raw.related_themes).unwrap_or_default(),
        search_queries: non_empty(raw.search_queries)
            .unwrap_or_else(|| vec![format!("attractions in {}", city)]),
        restaurant_queries: non_empty(raw.restaurant_queries)
            .unwrap_or_else(|| vec![format!("restaurants in {}", city)]),
        duration_days: parse_duration(raw.duration_days.as_ref()).unwrap_or(DEFAULT_DURATION_DAYS),
        special_requirements: non_empty(raw.special_requirements).unwrap_or_default(),
        country: country.unwrap_or_else(|| "Unknown".to_string()),
        city,
    }
}

/// Descriptor used when the completion is unavailable or unparseable
pub fn fallback_descriptor(query: &str) -> ThemeDescriptor {
    let (city, country) = match country_in_text(query) {
        Some((name, city)) => (city.to_string(), title_case(name)),
        None => ("Unknown".to_string(), "Unknown".to_string()),
    };

    info!(
        target: "trip_planner::analyzer",
        city = %city,
        country = %country,
        "Created fallback descriptor"
    );

    ThemeDescriptor {
        theme: "general".to_string(),
        related_themes: Vec::new(),
        search_queries: vec![
            format!("tourist attractions in {}", city),
            format!("things to do in {}", city),
        ],
        restaurant_queries: vec![
            format!("best restaurants in {}", city),
            format!("local food in {}", city),
        ],
        city,
        country,
        duration_days: DEFAULT_DURATION_DAYS,
        special_requirements: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_fills_city_from_country() {
        let raw: AnalyzerResponse = serde_json::from_value(json!({
            "theme": "anime",
            "country": "Japan",
            "city": null,
            "duration_days": "4",
            "search_queries": ["anime shops Tokyo", "  "]
        }))
        .unwrap();

        let descriptor = resolve_descriptor(raw, "anime trip to japan");
        assert_eq!(descriptor.city, "Tokyo");
        assert_eq!(descriptor.duration_days, 4);
        assert_eq!(descriptor.search_queries, vec!["anime shops Tokyo"]);
        assert_eq!(descriptor.restaurant_queries, vec!["restaurants in Tokyo"]);
    }

    #[test]
    fn test_resolve_defaults_invalid_duration() {
        let raw: AnalyzerResponse =
            serde_json::from_value(json!({"city": "Paris", "duration_days": 0})).unwrap();
        let descriptor = resolve_descriptor(raw, "Paris");
        assert_eq!(descriptor.duration_days, 3);
        assert_eq!(descriptor.theme, "general");
        assert_eq!(descriptor.country, "Unknown");
    }

    #[test]
    fn test_resolve_caps_duration() {
        for huge in [json!(4_000_000_000u64), json!("90"), json!(1e12)] {
            let raw: AnalyzerResponse =
                serde_json::from_value(json!({"city": "Paris", "duration_days": huge})).unwrap();
            assert_eq!(resolve_descriptor(raw, "trip").duration_days, MAX_TRIP_DAYS);
        }
    }

    #[test]
    fn test_resolve_finds_country_in_query() {
        let descriptor = resolve_descriptor(AnalyzerResponse::default(), "A week in Portugal");
        assert_eq!(descriptor.city, "Lisbon");
        assert_eq!(descriptor.country, "Portugal");
    }

    #[test]
    fn test_fallback_descriptor() {
        let descriptor = fallback_descriptor("food tour in south korea please");
        assert_eq!(descriptor.city, "Seoul");
        assert_eq!(descriptor.country, "South Korea");
        assert_eq!(descriptor.duration_days, 3);
        assert_eq!(descriptor.search_queries[0], "tourist attractions in Seoul");
    }

    #[test]
    fn test_country_match_is_word_bounded() {
        assert!(country_in_text("ukraine trip").is_none());
        assert_eq!(country_in_text("Visit the UK!").map(|(_, city)| city), Some("London"));
    }
}
