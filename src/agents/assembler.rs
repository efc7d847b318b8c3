use std::collections::{HashMap, HashSet};

use tracing::info;

use super::analyzer::title_case;
use crate::types::{DayPlan, Itinerary, MealCategory, ThemeDescriptor, Venue};

const MIN_PLACES_PER_DAY: usize = 3;

/// Tags too generic to name a day after
const IGNORED_TAGS: &[&str] = &["point_of_interest", "establishment"];

const TAG_LABELS: &[(&str, &str)] = &[
    ("museum", "Museums"),
    ("art_gallery", "Art"),
    ("park", "Nature"),
    ("shopping_mall", "Shopping"),
    ("store", "Shopping"),
    ("tourist_attraction", "Sightseeing"),
    ("amusement_park", "Thrills"),
    ("church", "Heritage"),
    ("place_of_worship", "Heritage"),
    ("night_club", "Nightlife"),
    ("cafe", "Cafes"),
    ("restaurant", "Dining"),
];

fn tag_label(tag: &str) -> String {
    TAG_LABELS
        .iter()
        .find(|(name, _)| *name == tag)
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| title_case(&tag.replace('_', " ")))
}

/// Title a day after the two most frequent tags among its places
pub fn day_title(day_number: u32, places: &[Venue], theme: &str) -> String {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    let mut order = 0;
    for tag in places.iter().flat_map(|venue| venue.types.iter()) {
        if IGNORED_TAGS.contains(&tag.as_str()) {
            continue;
        }
        let entry = counts.entry(tag.as_str()).or_insert((0, order));
        entry.0 += 1;
        order += 1;
    }

    let mut ranked: Vec<(&str, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));

    let mut labels: Vec<String> = Vec::new();
    for (tag, _) in ranked {
        let label = tag_label(tag);
        if !labels.contains(&label) {
            labels.push(label);
        }
        if labels.len() == 2 {
            break;
        }
    }

    if labels.is_empty() {
        format!("Day {}: Exploring {}", day_number, title_case(theme))
    } else {
        format!("Day {}: {}", day_number, labels.join(" & "))
    }
}

fn pick_restaurant<'a>(
    day_slice: &'a [Venue],
    all: &'a [Venue],
    category: MealCategory,
    used: &HashSet<String>,
) -> Option<&'a Venue> {
    let matches = |venue: &&Venue| {
        venue.category == Some(category)
            && !venue.place_id.is_empty()
            && !used.contains(&venue.place_id)
    };

    day_slice
        .iter()
        .find(matches)
        .or_else(|| all.iter().find(matches))
}

/// Partition discovered venues across days and build the itinerary document
pub fn assemble(theme: &ThemeDescriptor, places: &[Venue], restaurants: &[Venue]) -> Itinerary {
    let duration = theme.duration_days.max(1) as usize;
    let places_per_day = (places.len() / duration).max(MIN_PLACES_PER_DAY);
    let restaurants_per_day = restaurants.len() / duration;

    info!(
        target: "trip_planner::assembler",
        days = duration,
        places = places.len(),
        restaurants = restaurants.len(),
        "Assembling itinerary"
    );

    let mut used: HashSet<String> = HashSet::new();
    let mut days = Vec::with_capacity(duration);

    for day_idx in 0..duration {
        let day_number = day_idx as u32 + 1;

        let start = (day_idx * places_per_day).min(places.len());
        let end = (start + places_per_day).min(places.len());
        let day_places: Vec<Venue> = places[start..end]
            .iter()
            .filter(|venue| !venue.place_id.is_empty() && used.insert(venue.place_id.clone()))
            .cloned()
            .collect();

        let r_start = (day_idx * restaurants_per_day).min(restaurants.len());
        let r_end = (r_start + restaurants_per_day).min(restaurants.len());
        let day_slice = &restaurants[r_start..r_end];

        let mut day_restaurants = Vec::new();
        for category in MealCategory::ALL {
            if let Some(restaurant) = pick_restaurant(day_slice, restaurants, category, &used) {
                used.insert(restaurant.place_id.clone());
                day_restaurants.push(restaurant.clone());
            }
        }

        let mut day = DayPlan::new(
            day_number,
            day_title(day_number, &day_places, &theme.theme),
            format!(
                "Day {} of your {} adventure in {}",
                day_number, theme.theme, theme.city
            ),
        );
        day.places = day_places;
        day.restaurants = day_restaurants;
        days.push(day);
    }

    Itinerary {
        title: format!("{} Trip to {}", title_case(&theme.theme), theme.city),
        description: format!(
            "A {}-day {} experience in {}, {}",
            duration, theme.theme, theme.city, theme.country
        ),
        city: theme.city.clone(),
        country: theme.country.clone(),
        duration_days: duration as u32,
        theme: theme.theme.clone(),
        days,
    }
}
