use std::{
    collections::{BTreeMap, HashSet},
    sync::{Arc, OnceLock},
    time::Duration,
};

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::intent::{ModificationIntent, ModificationType, TypeFilterAction};
use crate::{
    agents::{cuisine_for_theme, SearchLayer, ThemeAnalyzer},
    error::Result,
    schemas::{cached_schema, parse_structured, CompletionSchema, ParseMode, SchemaHandle},
    services::{with_timeout, CompletionClient, Discovery},
    types::{DayPlan, Itinerary, MealCategory, ThemeDescriptor, Venue, MAX_TRIP_DAYS},
};

/// Price level assumed for venues without one
const ASSUMED_PRICE_LEVEL: i32 = 2;

/// Extra candidates requested beyond the number of removed places
const REPLACEMENT_HEADROOM: usize = 5;

/// Places given to each added day
const PLACES_PER_NEW_DAY: usize = 5;

/// Days below this many places are backfilled after a semantic change
const MIN_PLACES_AFTER_CHANGE: usize = 3;

const MAX_PLAN_QUERIES: usize = 3;

/// Itinerary JSON is truncated to this many characters in the change-plan prompt
const PLAN_PROMPT_TRIP_CHARS: usize = 3000;

const PLANNER_SYSTEM_PROMPT: &str = "You adjust existing travel itineraries. Be conservative: \
only change what is necessary for the requested change. Return only JSON.";

/// Change plan requested for semantic edits
#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ChangePlan {
    pub places_to_remove: Vec<PlaceRemoval>,
    /// Up to three searches for new places
    pub search_queries_for_new_places: Vec<String>,
    pub restaurants_to_change: Vec<RestaurantChange>,
    pub title_suggestion: Option<String>,
    pub description_update: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PlaceRemoval {
    pub day_number: u32,
    pub place_index: usize,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RestaurantChange {
    pub day_number: u32,
    /// e.g. "romantic dinner"
    #[serde(default)]
    pub criteria: String,
}

impl CompletionSchema for ChangePlan {
    fn schema() -> &'static SchemaHandle {
        static SCHEMA: OnceLock<SchemaHandle> = OnceLock::new();
        cached_schema::<ChangePlan>(&SCHEMA, "ChangePlan")
    }
}

/// Inclusive price bounds; missing price levels count as `ASSUMED_PRICE_LEVEL`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriceBounds {
    pub max: Option<i32>,
    pub min: Option<i32>,
}

impl PriceBounds {
    pub fn accepts(&self, venue: &Venue) -> bool {
        let level = venue.price_level.unwrap_or(ASSUMED_PRICE_LEVEL);
        self.max.map_or(true, |max| level <= max) && self.min.map_or(true, |min| level >= min)
    }
}

/// Where a removed place used to sit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    day_idx: usize,
    place_idx: usize,
}

/// Executes a classified intent against an itinerary
#[derive(Clone)]
pub struct ModificationApplicator {
    analyzer: ThemeAnalyzer,
    search: SearchLayer,
    completion: Arc<dyn CompletionClient>,
    timeout: Duration,
}

impl ModificationApplicator {
    pub fn new(completion: Arc<dyn CompletionClient>, discovery: Arc<dyn Discovery>) -> Self {
        Self {
            analyzer: ThemeAnalyzer::new(Arc::clone(&completion)),
            search: SearchLayer::new(discovery, Arc::clone(&completion)),
            completion,
            timeout: Duration::from_secs(60),
        }
    }

    /// Reuse an already configured search layer (and its price lookup)
    pub fn with_search_layer(mut self, search: SearchLayer) -> Self {
        self.search = search;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.analyzer = self.analyzer.with_timeout(timeout);
        self.timeout = timeout;
        self
    }

    /// Apply `intent` and return the edited itinerary. Never fails: searches that
    /// come back empty shrink the itinerary, and out-of-range targets are no-ops.
    pub async fn apply(&self, mut itinerary: Itinerary, intent: ModificationIntent) -> Itinerary {
        info!(
            target: "trip_planner::modification",
            kind = %intent.kind,
            description = %intent.description,
            "Applying modification"
        );

        let params = intent.params;
        match intent.kind {
            ModificationType::FilterBudgetFree => {
                let bounds = PriceBounds {
                    max: Some(0),
                    min: None,
                };
                self.filter_by_price(&mut itinerary, bounds, params.replace())
                    .await;
            }
            ModificationType::FilterBudgetCheaper => {
                let bounds = PriceBounds {
                    max: Some(2),
                    min: None,
                };
                self.filter_by_price(&mut itinerary, bounds, params.replace())
                    .await;
            }
            ModificationType::FilterBudgetLuxury => {
                let bounds = PriceBounds {
                    max: None,
                    min: Some(3),
                };
                self.filter_by_price(&mut itinerary, bounds, params.replace())
                    .await;
            }
            ModificationType::FilterType => {
                self.filter_by_type(&mut itinerary, params.action(), &params.types, params.replace())
                    .await;
            }
            ModificationType::AddDay => {
                self.add_days(&mut itinerary, params.days_to_add() as usize)
                    .await;
            }
            ModificationType::RemoveDay => {
                remove_days(
                    &mut itinerary,
                    params.days_to_remove() as usize,
                    &params.day_numbers,
                );
            }
            ModificationType::ReplacePlace => {
                if let (Some(day_number), Some(place_index)) = (params.day_number, params.place_index)
                {
                    self.replace_place(&mut itinerary, day_number, place_index)
                        .await;
                } else {
                    debug!(target: "trip_planner::modification", "Replace place without a target");
                }
            }
            ModificationType::ReplaceRestaurant => {
                if let (Some(day_number), Some(restaurant_index)) =
                    (params.day_number, params.restaurant_index)
                {
                    self.replace_restaurant(
                        &mut itinerary,
                        day_number,
                        restaurant_index,
                        params.criteria.as_deref(),
                    )
                    .await;
                } else {
                    debug!(target: "trip_planner::modification", "Replace restaurant without a target");
                }
            }
            ModificationType::Semantic => {
                let goal = params
                    .semantic_intent
                    .clone()
                    .unwrap_or_else(|| intent.description.clone());
                if let Err(err) = self.apply_semantic(&mut itinerary, &goal).await {
                    warn!(
                        target: "trip_planner::modification",
                        error = %err,
                        "Semantic modification stopped early"
                    );
                }
            }
            ModificationType::ReorderPlaces | ModificationType::NotModification => {
                info!(
                    target: "trip_planner::modification",
                    kind = %intent.kind,
                    "Nothing to apply for this modification type"
                );
            }
        }

        itinerary
    }

    /// Derive a descriptor for searches from the itinerary itself
    async fn descriptor_for(&self, itinerary: &Itinerary) -> Option<ThemeDescriptor> {
        let duration = match (itinerary.duration_days, itinerary.days.len()) {
            (0, 0) => 2,
            (0, days) => days as u32,
            (duration, _) => duration,
        };
        let city = if itinerary.city.is_empty() {
            "Unknown"
        } else {
            itinerary.city.as_str()
        };
        let query = format!("{} days in {} {}", duration, city, itinerary.theme);

        match self.analyzer.analyze(query.trim()).await {
            Ok(descriptor) => Some(descriptor),
            Err(err) => {
                warn!(
                    target: "trip_planner::modification",
                    error = %err,
                    "Could not derive a search descriptor"
                );
                None
            }
        }
    }

    async fn filter_by_price(&self, itinerary: &mut Itinerary, bounds: PriceBounds, replace: bool) {
        let removed = remove_places_where(itinerary, |venue| !bounds.accepts(venue));

        info!(
            target: "trip_planner::modification",
            places_removed = removed.len(),
            max_price_level = ?bounds.max,
            min_price_level = ?bounds.min,
            "Budget filter applied"
        );

        if replace && !removed.is_empty() {
            self.fill_slots(itinerary, &removed, |venue| bounds.accepts(venue))
                .await;
        }
    }

    async fn filter_by_type(
        &self,
        itinerary: &mut Itinerary,
        action: TypeFilterAction,
        types: &[String],
        replace: bool,
    ) {
        if types.is_empty() {
            debug!(target: "trip_planner::modification", "Type filter without types");
            return;
        }

        let wanted = |venue: &Venue| match action {
            TypeFilterAction::Remove => !venue.has_any_type(types),
            TypeFilterAction::Only => venue.has_any_type(types),
        };
        let removed = remove_places_where(itinerary, |venue| !wanted(venue));

        info!(
            target: "trip_planner::modification",
            action = ?action,
            types = ?types,
            places_removed = removed.len(),
            "Type filter applied"
        );

        if replace && !removed.is_empty() {
            self.fill_slots(itinerary, &removed, wanted).await;
        }
    }

    /// Search for replacements and put them back into the removed slots in order
    async fn fill_slots<F>(&self, itinerary: &mut Itinerary, slots: &[Slot], accepts: F)
    where
        F: Fn(&Venue) -> bool,
    {
        let Some(descriptor) = self.descriptor_for(itinerary).await else {
            return;
        };

        let mut present = itinerary.venue_ids();
        let found = self
            .search
            .search_places(&descriptor, slots.len() + REPLACEMENT_HEADROOM)
            .await;

        let replacements: Vec<Venue> = found
            .venues
            .into_iter()
            .filter(|venue| accepts(venue))
            .filter(|venue| !venue.place_id.is_empty() && present.insert(venue.place_id.clone()))
            .collect();

        let mut filled = 0;
        for (slot, venue) in slots.iter().zip(replacements) {
            let places = &mut itinerary.days[slot.day_idx].places;
            let at = slot.place_idx.min(places.len());
            places.insert(at, venue);
            filled += 1;
        }

        info!(
            target: "trip_planner::modification",
            requested = slots.len(),
            found = filled,
            "Replacements placed"
        );
    }

    async fn add_days(&self, itinerary: &mut Itinerary, days_to_add: usize) {
        let room = (MAX_TRIP_DAYS as usize).saturating_sub(itinerary.days.len());
        let days_to_add = days_to_add.max(1).min(room);
        if days_to_add == 0 {
            info!(
                target: "trip_planner::modification",
                total_days = itinerary.days.len(),
                "Trip is already at the day limit"
            );
            return;
        }
        let Some(descriptor) = self.descriptor_for(itinerary).await else {
            return;
        };

        let mut present = itinerary.venue_ids();
        let found = self
            .search
            .search_places(&descriptor, PLACES_PER_NEW_DAY * days_to_add)
            .await;
        let fresh: Vec<Venue> = found
            .venues
            .into_iter()
            .filter(|venue| !venue.place_id.is_empty() && present.insert(venue.place_id.clone()))
            .collect();

        let day_places: Vec<Vec<Venue>> = (0..days_to_add)
            .map(|idx| {
                fresh
                    .iter()
                    .skip(idx * PLACES_PER_NEW_DAY)
                    .take(PLACES_PER_NEW_DAY)
                    .cloned()
                    .collect()
            })
            .collect();

        let restaurants = self
            .search
            .search_restaurants(&descriptor, &day_places, &present)
            .await
            .venues;
        let restaurants_per_day = restaurants.len() / days_to_add;

        let first_new = itinerary.days.len() as u32 + 1;
        for (idx, places) in day_places.into_iter().enumerate() {
            let day_number = first_new + idx as u32;
            let mut day = DayPlan::new(
                day_number,
                format!("Day {}: More {}", day_number, descriptor.theme),
                format!("Additional day exploring {}", descriptor.city),
            );
            day.places = places;
            day.restaurants = restaurants
                .iter()
                .skip(idx * restaurants_per_day)
                .take(restaurants_per_day)
                .cloned()
                .collect();
            itinerary.days.push(day);
        }
        itinerary.renumber_days();

        info!(
            target: "trip_planner::modification",
            days_added = days_to_add,
            total_days = itinerary.duration_days,
            "Days added"
        );
    }

    async fn replace_place(&self, itinerary: &mut Itinerary, day_number: u32, place_index: usize) {
        let Some(day_idx) = day_index(itinerary, day_number) else {
            return;
        };
        if place_index >= itinerary.days[day_idx].places.len() {
            return;
        }

        let Some(descriptor) = self.descriptor_for(itinerary).await else {
            return;
        };
        let present = itinerary.venue_ids();
        let found = self
            .search
            .search_places(&descriptor, PLACES_PER_NEW_DAY)
            .await;

        let Some(replacement) = found
            .venues
            .into_iter()
            .find(|venue| !venue.place_id.is_empty() && !present.contains(&venue.place_id))
        else {
            info!(target: "trip_planner::modification", day = day_number, "No replacement place found");
            return;
        };

        let old = std::mem::replace(
            &mut itinerary.days[day_idx].places[place_index],
            replacement,
        );
        info!(
            target: "trip_planner::modification",
            day = day_number,
            old_place = %old.name,
            new_place = %itinerary.days[day_idx].places[place_index].name,
            "Place replaced"
        );
    }

    async fn replace_restaurant(
        &self,
        itinerary: &mut Itinerary,
        day_number: u32,
        restaurant_index: usize,
        criteria: Option<&str>,
    ) {
        let Some(day_idx) = day_index(itinerary, day_number) else {
            return;
        };
        if restaurant_index >= itinerary.days[day_idx].restaurants.len() {
            return;
        }

        let Some(descriptor) = self.descriptor_for(itinerary).await else {
            return;
        };
        self.swap_restaurant(itinerary, &descriptor, day_idx, restaurant_index, criteria)
            .await;
    }

    /// Replace one restaurant with a new one of the same meal category near the day's places,
    /// or anywhere in the city when the day has none
    async fn swap_restaurant(
        &self,
        itinerary: &mut Itinerary,
        descriptor: &ThemeDescriptor,
        day_idx: usize,
        restaurant_index: usize,
        criteria: Option<&str>,
    ) -> bool {
        let day = &itinerary.days[day_idx];
        let category = day.restaurants[restaurant_index]
            .category
            .unwrap_or(MealCategory::Lunch);
        let cuisine = criteria
            .map(str::trim)
            .filter(|hint| !hint.is_empty())
            .unwrap_or_else(|| cuisine_for_theme(&descriptor.theme));

        let present = itinerary.venue_ids();
        let found = self
            .search
            .search_meal(descriptor, cuisine, category, &day.places, &present)
            .await;

        let replacement = match found {
            Ok(Some(replacement)) => replacement,
            Ok(None) => {
                info!(
                    target: "trip_planner::modification",
                    day = day_idx + 1,
                    category = %category,
                    "No replacement restaurant found"
                );
                return false;
            }
            Err(err) => {
                warn!(
                    target: "trip_planner::modification",
                    day = day_idx + 1,
                    category = %category,
                    error = %err,
                    "Restaurant search failed"
                );
                return false;
            }
        };

        let old = std::mem::replace(
            &mut itinerary.days[day_idx].restaurants[restaurant_index],
            replacement,
        );
        info!(
            target: "trip_planner::modification",
            day = day_idx + 1,
            old = %old.name,
            new = %itinerary.days[day_idx].restaurants[restaurant_index].name,
            "Restaurant replaced"
        );
        true
    }

    /// Ask for a change plan and apply it step by step. Steps applied before a
    /// failure stay applied.
    async fn apply_semantic(&self, itinerary: &mut Itinerary, goal: &str) -> Result<()> {
        let trip_json = serde_json::to_string_pretty(&*itinerary)?;
        let trip_excerpt: String = trip_json.chars().take(PLAN_PROMPT_TRIP_CHARS).collect();
        let prompt = format!(
            "Plan the changes needed to make this trip: \"{}\"\n\nCURRENT TRIP:\n{}\n\n{}",
            goal,
            trip_excerpt,
            ChangePlan::schema().prompt_instructions()
        );

        let text = with_timeout(
            self.timeout,
            "change plan",
            self.completion.complete(&prompt, Some(PLANNER_SYSTEM_PROMPT)),
        )
        .await?;
        let plan = parse_structured::<ChangePlan>(&text, ParseMode::Strict)?;

        let removed = remove_planned_places(itinerary, &plan.places_to_remove);

        let queries: Vec<&str> = plan
            .search_queries_for_new_places
            .iter()
            .map(|query| query.trim())
            .filter(|query| !query.is_empty())
            .take(MAX_PLAN_QUERIES)
            .collect();
        let needs_search = !queries.is_empty() || !plan.restaurants_to_change.is_empty();
        let descriptor = if needs_search {
            self.descriptor_for(itinerary).await
        } else {
            None
        };

        let mut added = 0;
        if let Some(descriptor) = descriptor.as_ref() {
            for query in &queries {
                let found = self
                    .search
                    .search_places(&descriptor.for_query(query), 2)
                    .await;
                added += backfill_short_days(itinerary, found.venues);
            }

            for change in &plan.restaurants_to_change {
                let Some(day_idx) = day_index(itinerary, change.day_number) else {
                    continue;
                };
                let restaurants = &itinerary.days[day_idx].restaurants;
                if restaurants.is_empty() {
                    continue;
                }
                let target = MealCategory::mentioned_in(&change.criteria)
                    .and_then(|meal| {
                        restaurants
                            .iter()
                            .position(|venue| venue.category == Some(meal))
                    })
                    .unwrap_or(0);
                self.swap_restaurant(
                    itinerary,
                    descriptor,
                    day_idx,
                    target,
                    Some(change.criteria.as_str()),
                )
                .await;
            }
        }

        if let Some(title) = plan.title_suggestion.filter(|title| !title.trim().is_empty()) {
            itinerary.title = title;
        }
        if let Some(description) = plan
            .description_update
            .filter(|description| !description.trim().is_empty())
        {
            itinerary.description = description;
        }

        info!(
            target: "trip_planner::modification",
            goal,
            places_removed = removed,
            places_added = added,
            "Semantic modification applied"
        );
        Ok(())
    }
}

/// Remove every place matching `remove`, remembering where each one was
fn remove_places_where<F>(itinerary: &mut Itinerary, remove: F) -> Vec<Slot>
where
    F: Fn(&Venue) -> bool,
{
    let mut removed = Vec::new();
    for (day_idx, day) in itinerary.days.iter_mut().enumerate() {
        let places = std::mem::take(&mut day.places);
        for (place_idx, venue) in places.into_iter().enumerate() {
            if remove(&venue) {
                removed.push(Slot { day_idx, place_idx });
            } else {
                day.places.push(venue);
            }
        }
    }
    removed
}

/// Remove days by number, or trim from the end. At least one day always remains.
pub fn remove_days(itinerary: &mut Itinerary, days_to_remove: usize, day_numbers: &[u32]) {
    let before = itinerary.days.len();
    if before == 0 {
        return;
    }

    if day_numbers.is_empty() {
        let keep = before.saturating_sub(days_to_remove).max(1);
        itinerary.days.truncate(keep);
    } else {
        let named: HashSet<u32> = day_numbers.iter().copied().collect();
        let kept: Vec<DayPlan> = itinerary
            .days
            .iter()
            .filter(|day| !named.contains(&day.day_number))
            .cloned()
            .collect();
        if kept.is_empty() {
            itinerary.days.truncate(1);
        } else {
            itinerary.days = kept;
        }
    }
    itinerary.renumber_days();

    info!(
        target: "trip_planner::modification",
        removed = before - itinerary.days.len(),
        remaining = itinerary.duration_days,
        "Days removed"
    );
}

/// Position of a 1-based day number in `days`, if in range
fn day_index(itinerary: &Itinerary, day_number: u32) -> Option<usize> {
    let idx = (day_number as usize).checked_sub(1)?;
    (idx < itinerary.days.len()).then_some(idx)
}

/// Apply planned removals; indexes refer to the itinerary before any removal
fn remove_planned_places(itinerary: &mut Itinerary, removals: &[PlaceRemoval]) -> usize {
    let mut per_day: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for removal in removals {
        if let Some(day_idx) = day_index(itinerary, removal.day_number) {
            per_day.entry(day_idx).or_default().push(removal.place_index);
        }
    }

    let mut removed = 0;
    for (day_idx, mut indexes) in per_day {
        indexes.sort_unstable_by(|a, b| b.cmp(a));
        indexes.dedup();
        let places = &mut itinerary.days[day_idx].places;
        for idx in indexes {
            if idx < places.len() {
                places.remove(idx);
                removed += 1;
            }
        }
    }
    removed
}

/// Top up days with fewer than the minimum places from `pool`; returns how many were added
fn backfill_short_days(itinerary: &mut Itinerary, pool: Vec<Venue>) -> usize {
    let mut present = itinerary.venue_ids();
    let mut pool = pool.into_iter();

    let mut added = 0;
    for day in itinerary.days.iter_mut() {
        while day.places.len() < MIN_PLACES_AFTER_CHANGE {
            let Some(venue) = pool
                .find(|venue| !venue.place_id.is_empty() && !present.contains(&venue.place_id))
            else {
                return added;
            };
            present.insert(venue.place_id.clone());
            day.places.push(venue);
            added += 1;
        }
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(number: u32, places: &[(&str, Option<i32>)]) -> DayPlan {
        let mut day = DayPlan::new(number, format!("Day {}", number), "");
        day.places = places
            .iter()
            .map(|(id, price)| {
                let venue = Venue::new(*id, id.to_uppercase());
                match price {
                    Some(level) => venue.with_price_level(*level),
                    None => venue,
                }
            })
            .collect();
        day
    }

    fn trip(days: Vec<DayPlan>) -> Itinerary {
        Itinerary {
            title: "Trip".to_string(),
            description: String::new(),
            city: "Paris".to_string(),
            country: "France".to_string(),
            duration_days: days.len() as u32,
            theme: "art".to_string(),
            days,
        }
    }

    fn ids(day: &DayPlan) -> Vec<&str> {
        day.places.iter().map(|venue| venue.place_id.as_str()).collect()
    }

    #[test]
    fn test_price_bounds_treat_missing_as_moderate() {
        let free = PriceBounds {
            max: Some(0),
            min: None,
        };
        assert!(free.accepts(&Venue::new("a", "A").with_price_level(0)));
        assert!(!free.accepts(&Venue::new("b", "B")));

        let luxury = PriceBounds {
            max: None,
            min: Some(3),
        };
        assert!(!luxury.accepts(&Venue::new("c", "C")));
        assert!(luxury.accepts(&Venue::new("d", "D").with_price_level(4)));
    }

    #[test]
    fn test_remove_places_records_slots() {
        let mut itinerary = trip(vec![
            day(1, &[("a", Some(0)), ("b", Some(3)), ("c", None)]),
            day(2, &[("d", Some(4))]),
        ]);
        let removed = remove_places_where(&mut itinerary, |venue| {
            venue.price_level.unwrap_or(ASSUMED_PRICE_LEVEL) > 2
        });

        assert_eq!(
            removed,
            vec![
                Slot {
                    day_idx: 0,
                    place_idx: 1
                },
                Slot {
                    day_idx: 1,
                    place_idx: 0
                }
            ]
        );
        assert_eq!(ids(&itinerary.days[0]), vec!["a", "c"]);
        assert!(itinerary.days[1].places.is_empty());
    }

    #[test]
    fn test_remove_days_trims_and_renumbers() {
        let mut itinerary = trip((1..=3).map(|n| day(n, &[])).collect());
        remove_days(&mut itinerary, 99, &[]);
        assert_eq!(itinerary.days.len(), 1);
        assert_eq!(itinerary.days[0].day_number, 1);
        assert_eq!(itinerary.duration_days, 1);
    }

    #[test]
    fn test_remove_named_days() {
        let mut itinerary = trip(vec![
            day(1, &[("a", None)]),
            day(2, &[("b", None)]),
            day(3, &[("c", None)]),
        ]);
        remove_days(&mut itinerary, 1, &[2]);
        assert_eq!(itinerary.days.len(), 2);
        assert_eq!(itinerary.days[1].day_number, 2);
        assert_eq!(ids(&itinerary.days[1]), vec!["c"]);

        remove_days(&mut itinerary, 1, &[1, 2]);
        assert_eq!(itinerary.days.len(), 1);
        assert_eq!(ids(&itinerary.days[0]), vec!["a"]);
    }

    #[test]
    fn test_planned_removals_use_original_indexes() {
        let mut itinerary = trip(vec![day(
            1,
            &[("a", None), ("b", None), ("c", None), ("d", None)],
        )]);
        let removals = vec![
            PlaceRemoval {
                day_number: 1,
                place_index: 0,
                reason: None,
            },
            PlaceRemoval {
                day_number: 1,
                place_index: 2,
                reason: None,
            },
            PlaceRemoval {
                day_number: 1,
                place_index: 9,
                reason: None,
            },
            PlaceRemoval {
                day_number: 4,
                place_index: 0,
                reason: None,
            },
        ];

        assert_eq!(remove_planned_places(&mut itinerary, &removals), 2);
        assert_eq!(ids(&itinerary.days[0]), vec!["b", "d"]);
    }

    #[test]
    fn test_backfill_skips_present_ids() {
        let mut itinerary = trip(vec![
            day(1, &[("a", None), ("b", None)]),
            day(2, &[("c", None), ("d", None), ("e", None)]),
        ]);
        let pool = vec![
            Venue::new("a", "dup"),
            Venue::new("x", "X"),
            Venue::new("x", "X again"),
            Venue::new("y", "Y"),
        ];

        assert_eq!(backfill_short_days(&mut itinerary, pool), 1);
        assert_eq!(ids(&itinerary.days[0]), vec!["a", "b", "x"]);
        assert_eq!(itinerary.days[1].places.len(), 3);
    }

    #[test]
    fn test_day_index_bounds() {
        let itinerary = trip(vec![day(1, &[]), day(2, &[])]);
        assert_eq!(day_index(&itinerary, 0), None);
        assert_eq!(day_index(&itinerary, 2), Some(1));
        assert_eq!(day_index(&itinerary, 3), None);
    }
}
