use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::HashSet, fmt};

use crate::error::{PlannerError, Result};

/// Geographic coordinates of a venue
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Meal slot a restaurant is assigned to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealCategory {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealCategory {
    pub const ALL: [MealCategory; 3] = [
        MealCategory::Breakfast,
        MealCategory::Lunch,
        MealCategory::Dinner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MealCategory::Breakfast => "breakfast",
            MealCategory::Lunch => "lunch",
            MealCategory::Dinner => "dinner",
        }
    }

    /// Find the first meal category named in free text ("romantic dinner" -> Dinner)
    pub fn mentioned_in(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| lower.contains(category.as_str()))
    }
}

impl fmt::Display for MealCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display label for an ordinal price level. Out-of-range and missing levels map to "".
pub fn price_level_label(price_level: Option<i32>) -> &'static str {
    match price_level {
        Some(0) => "Free",
        Some(1) => "$",
        Some(2) => "$$",
        Some(3) => "$$$",
        Some(4) => "$$$$",
        _ => "",
    }
}

fn default_relevance() -> f64 {
    1.0
}

/// A place or restaurant candidate returned by discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    pub place_id: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    /// 0 (free) to 4 (very expensive)
    #[serde(default)]
    pub price_level: Option<i32>,
    /// Human ticket price found by price lookup ("€25", "Free")
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub photo_urls: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub opening_hours: Option<Vec<String>>,
    #[serde(default)]
    pub cuisine: Option<String>,
    #[serde(default = "default_relevance")]
    pub theme_relevance: f64,
    /// Only set on restaurants
    #[serde(default)]
    pub category: Option<MealCategory>,
}

impl Venue {
    pub fn new(place_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            place_id: place_id.into(),
            name: name.into(),
            address: None,
            rating: None,
            price_level: None,
            price: None,
            types: Vec::new(),
            location: None,
            photo_urls: Vec::new(),
            description: None,
            opening_hours: None,
            cuisine: None,
            theme_relevance: default_relevance(),
            category: None,
        }
    }

    pub fn with_price_level(mut self, price_level: i32) -> Self {
        self.price_level = Some(price_level);
        self
    }

    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_location(mut self, lat: f64, lng: f64) -> Self {
        self.location = Some(GeoPoint { lat, lng });
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn with_category(mut self, category: MealCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn price_label(&self) -> &'static str {
        price_level_label(self.price_level)
    }

    pub fn has_any_type(&self, wanted: &[String]) -> bool {
        self.types.iter().any(|tag| wanted.contains(tag))
    }
}

/// Plan for a single day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayPlan {
    #[serde(alias = "dayNumber")]
    pub day_number: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub places: Vec<Venue>,
    #[serde(default)]
    pub restaurants: Vec<Venue>,
}

impl DayPlan {
    pub fn new(day_number: u32, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            day_number,
            title: title.into(),
            description: description.into(),
            places: Vec::new(),
            restaurants: Vec::new(),
        }
    }
}

/// Day-by-day itinerary document. Both generation and modification produce this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Itinerary {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
    #[serde(alias = "durationDays", default)]
    pub duration_days: u32,
    #[serde(default)]
    pub theme: String,
    #[serde(default)]
    pub days: Vec<DayPlan>,
}

impl Itinerary {
    /// Read an itinerary document received from outside the crate.
    ///
    /// Structural problems are rejected here; the core functions assume a
    /// well-formed document and never fail on one.
    pub fn from_document(document: Value) -> Result<Self> {
        let Some(object) = document.as_object() else {
            return Err(PlannerError::InvalidItinerary(
                "itinerary must be a JSON object".to_string(),
            ));
        };
        match object.get("days") {
            Some(Value::Array(_)) => {}
            Some(_) => {
                return Err(PlannerError::InvalidItinerary(
                    "`days` must be a list".to_string(),
                ))
            }
            None => {
                return Err(PlannerError::InvalidItinerary(
                    "`days` is missing".to_string(),
                ))
            }
        }

        let mut itinerary: Itinerary = serde_path_to_error::deserialize(document)
            .map_err(|err| {
                PlannerError::InvalidItinerary(format!(
                    "invalid itinerary at {}: {}",
                    err.path(),
                    err.inner()
                ))
            })?;
        if itinerary.duration_days == 0 {
            itinerary.duration_days = itinerary.days.len() as u32;
        }
        Ok(itinerary)
    }

    /// Every place and restaurant id present anywhere in the itinerary
    pub fn venue_ids(&self) -> HashSet<String> {
        self.days
            .iter()
            .flat_map(|day| day.places.iter().chain(day.restaurants.iter()))
            .filter(|venue| !venue.place_id.is_empty())
            .map(|venue| venue.place_id.clone())
            .collect()
    }

    /// Renumber days 1..N and keep `duration_days` equal to the day count
    pub fn renumber_days(&mut self) {
        for (idx, day) in self.days.iter_mut().enumerate() {
            day.day_number = idx as u32 + 1;
        }
        self.duration_days = self.days.len() as u32;
    }

    pub fn day(&self, day_number: u32) -> Option<&DayPlan> {
        self.days.iter().find(|day| day.day_number == day_number)
    }

    pub fn place_count(&self) -> usize {
        self.days.iter().map(|day| day.places.len()).sum()
    }
}
