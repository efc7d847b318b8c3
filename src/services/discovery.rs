use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    config::PlannerConfig,
    error::{PlannerError, Result},
    types::{GeoPoint, Venue},
};

const FIELD_MASK: &str = "places.id,places.displayName,places.formattedAddress,places.rating,\
places.priceLevel,places.types,places.location,places.photos,places.regularOpeningHours,\
places.editorialSummary";
const MAX_RESULT_COUNT: usize = 20;
const PHOTO_MAX_WIDTH: u32 = 800;

/// A single discovery query
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub max_results: usize,
    /// Bias results toward this point
    pub location: Option<GeoPoint>,
    pub radius_m: Option<u32>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, max_results: usize) -> Self {
        Self {
            query: query.into(),
            max_results,
            location: None,
            radius_m: None,
        }
    }

    pub fn near(mut self, location: GeoPoint, radius_m: u32) -> Self {
        self.location = Some(location);
        self.radius_m = Some(radius_m);
        self
    }
}

/// Place/restaurant index. May return fewer results than asked for, or none.
#[async_trait]
pub trait Discovery: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Venue>>;
}

/// Discovery backed by the Google Places Text Search API
#[derive(Debug, Clone)]
pub struct GooglePlacesClient {
    api_key: String,
    base_url: String,
    client: Client,
}

impl GooglePlacesClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: crate::config::DEFAULT_PLACES_BASE_URL.to_string(),
            client: Client::new(),
        }
    }

    pub fn from_config(config: &PlannerConfig) -> Self {
        Self::new(config.places_api_key.clone()).with_base_url(config.places_base_url.clone())
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request_body(request: &SearchRequest) -> Value {
        let mut body = json!({
            "textQuery": request.query,
            "maxResultCount": request.max_results.clamp(1, MAX_RESULT_COUNT),
            "languageCode": "en",
        });

        if let Some(center) = request.location {
            body["locationBias"] = json!({
                "circle": {
                    "center": {"latitude": center.lat, "longitude": center.lng},
                    "radius": request.radius_m.unwrap_or(1500),
                }
            });
        }

        body
    }

    fn photo_url(&self, photo_name: &str) -> String {
        format!(
            "{}/{}/media?maxWidthPx={}&key={}",
            self.base_url, photo_name, PHOTO_MAX_WIDTH, self.api_key
        )
    }

    fn convert_place(&self, place: RawPlace) -> Venue {
        let mut venue = Venue::new(
            place.id,
            place
                .display_name
                .map(|name| name.text)
                .unwrap_or_else(|| "Unknown".to_string()),
        );

        venue.address = place.formatted_address;
        venue.rating = place.rating;
        venue.price_level = place.price_level.as_deref().and_then(parse_price_level);
        venue.types = place.types;
        venue.location = place.location.map(|loc| GeoPoint {
            lat: loc.latitude,
            lng: loc.longitude,
        });
        venue.photo_urls = place
            .photos
            .iter()
            .take(3)
            .map(|photo| self.photo_url(&photo.name))
            .collect();
        venue.opening_hours = place
            .regular_opening_hours
            .map(|hours| hours.weekday_descriptions);
        venue.description = place.editorial_summary.map(|summary| summary.text);
        venue
    }
}

#[async_trait]
impl Discovery for GooglePlacesClient {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Venue>> {
        let url = format!("{}/places:searchText", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("X-Goog-Api-Key", &self.api_key)
            .header("X-Goog-FieldMask", FIELD_MASK)
            .json(&Self::request_body(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlannerError::Upstream(format!(
                "Places search returned status {}: {}",
                status, body
            )));
        }

        let parsed: SearchTextResponse = response.json().await?;
        let venues: Vec<Venue> = parsed
            .places
            .into_iter()
            .filter(|place| !place.id.is_empty())
            .map(|place| self.convert_place(place))
            .collect();

        debug!(
            target: "trip_planner::discovery",
            query = %request.query,
            count = venues.len(),
            "Places search complete"
        );

        Ok(venues)
    }
}

/// Map a Places `PRICE_LEVEL_*` enum onto the 0-4 ordinal
pub fn parse_price_level(raw: &str) -> Option<i32> {
    match raw {
        "PRICE_LEVEL_FREE" => Some(0),
        "PRICE_LEVEL_INEXPENSIVE" => Some(1),
        "PRICE_LEVEL_MODERATE" => Some(2),
        "PRICE_LEVEL_EXPENSIVE" => Some(3),
        "PRICE_LEVEL_VERY_EXPENSIVE" => Some(4),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct SearchTextResponse {
    #[serde(default)]
    places: Vec<RawPlace>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlace {
    #[serde(default)]
    id: String,
    display_name: Option<LocalizedText>,
    formatted_address: Option<String>,
    rating: Option<f64>,
    price_level: Option<String>,
    #[serde(default)]
    types: Vec<String>,
    location: Option<RawLocation>,
    #[serde(default)]
    photos: Vec<RawPhoto>,
    regular_opening_hours: Option<RawOpeningHours>,
    editorial_summary: Option<LocalizedText>,
}

#[derive(Debug, Deserialize)]
struct LocalizedText {
    text: String,
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct RawPhoto {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOpeningHours {
    #[serde(default)]
    weekday_descriptions: Vec<String>,
}
