use std::{
    collections::{BTreeSet, HashSet, VecDeque},
    iter::FusedIterator,
};

use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::intent::{ModificationIntent, ModificationType};
use crate::{
    error::Result,
    types::{DayPlan, Itinerary, Venue},
};

/// One incremental change between two itinerary states
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum PatchEvent {
    ModificationStart {
        #[serde(rename = "type")]
        kind: ModificationType,
        description: String,
    },
    DayRemove {
        day_number: u32,
    },
    PlaceRemove {
        day_number: u32,
        place_id: String,
    },
    RestaurantRemove {
        day_number: u32,
        place_id: String,
    },
    PlaceAdd {
        day_number: u32,
        slot_index: usize,
        place: Venue,
    },
    RestaurantAdd {
        day_number: u32,
        slot_index: usize,
        restaurant: Venue,
    },
    DayAdd {
        day_number: u32,
        title: String,
        description: String,
        places_count: usize,
        restaurants_count: usize,
    },
    /// Full resulting itinerary, for clients that missed intermediate events
    Complete {
        itinerary: Itinerary,
    },
}

impl PatchEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PatchEvent::ModificationStart { .. } => "modification_start",
            PatchEvent::DayRemove { .. } => "day_remove",
            PatchEvent::PlaceRemove { .. } => "place_remove",
            PatchEvent::RestaurantRemove { .. } => "restaurant_remove",
            PatchEvent::PlaceAdd { .. } => "place_add",
            PatchEvent::RestaurantAdd { .. } => "restaurant_add",
            PatchEvent::DayAdd { .. } => "day_add",
            PatchEvent::Complete { .. } => "complete",
        }
    }

    /// Render as a server-sent event frame
    pub fn to_sse(&self) -> Result<String> {
        let mut value = serde_json::to_value(self)?;
        let data = value
            .get_mut("data")
            .map(Value::take)
            .unwrap_or(Value::Null);
        Ok(format!(
            "event: {}\ndata: {}\n\n",
            self.name(),
            serde_json::to_string(&data)?
        ))
    }

    /// Id of the venue this event adds or removes
    pub fn place_id(&self) -> Option<&str> {
        match self {
            PatchEvent::PlaceRemove { place_id, .. }
            | PatchEvent::RestaurantRemove { place_id, .. } => Some(place_id),
            PatchEvent::PlaceAdd { place, .. } => Some(&place.place_id),
            PatchEvent::RestaurantAdd { restaurant, .. } => Some(&restaurant.place_id),
            _ => None,
        }
    }
}

/// Ordered, one-shot sequence of patch events between two itineraries.
///
/// Events are produced lazily, one day at a time:
/// 1. removed days, highest day number first
/// 2. for each day present in both, ascending: place removals, restaurant
///    removals, place additions, restaurant additions
/// 3. added days, ascending, each followed by its place and restaurant additions
/// 4. a final `Complete` carrying the modified itinerary
///
/// The sequence cannot be restarted; a consumer that drops it part way must
/// re-read the full itinerary.
#[derive(Debug)]
pub struct PatchStream {
    original: Itinerary,
    modified: Option<Itinerary>,
    preamble: Option<PatchEvent>,
    removed_days: std::vec::IntoIter<u32>,
    common_days: std::vec::IntoIter<u32>,
    added_days: std::vec::IntoIter<u32>,
    pending: VecDeque<PatchEvent>,
}

impl PatchStream {
    pub fn new(original: Itinerary, modified: Itinerary) -> Self {
        let before: BTreeSet<u32> = original.days.iter().map(|day| day.day_number).collect();
        let after: BTreeSet<u32> = modified.days.iter().map(|day| day.day_number).collect();

        let mut removed_days: Vec<u32> = before.difference(&after).copied().collect();
        removed_days.reverse();
        let common_days: Vec<u32> = before.intersection(&after).copied().collect();
        let added_days: Vec<u32> = after.difference(&before).copied().collect();

        Self {
            original,
            modified: Some(modified),
            preamble: None,
            removed_days: removed_days.into_iter(),
            common_days: common_days.into_iter(),
            added_days: added_days.into_iter(),
            pending: VecDeque::new(),
        }
    }

    /// Lead with a `modification_start` event describing the intent
    pub fn with_start(mut self, intent: &ModificationIntent) -> Self {
        self.preamble = Some(PatchEvent::ModificationStart {
            kind: intent.kind,
            description: intent.description.clone(),
        });
        self
    }

    /// Adapt into an async stream for server-sent event responses
    pub fn into_stream(self) -> impl Stream<Item = PatchEvent> {
        futures::stream::iter(self)
    }

    fn queue_day_changes(&mut self, day_number: u32) {
        let (Some(before), Some(after)) = (
            self.original.day(day_number),
            self.modified.as_ref().and_then(|modified| modified.day(day_number)),
        ) else {
            return;
        };

        let before_places = ids(&before.places);
        let after_places = ids(&after.places);
        let before_restaurants = ids(&before.restaurants);
        let after_restaurants = ids(&after.restaurants);

        let mut events = Vec::new();
        events.extend(removed(&before.places, &after_places).map(|venue| {
            PatchEvent::PlaceRemove {
                day_number,
                place_id: venue.place_id.clone(),
            }
        }));
        events.extend(removed(&before.restaurants, &after_restaurants).map(|venue| {
            PatchEvent::RestaurantRemove {
                day_number,
                place_id: venue.place_id.clone(),
            }
        }));
        events.extend(added(&after.places, &before_places).map(|(slot_index, venue)| {
            PatchEvent::PlaceAdd {
                day_number,
                slot_index,
                place: venue.clone(),
            }
        }));
        events.extend(added(&after.restaurants, &before_restaurants).map(
            |(slot_index, venue)| PatchEvent::RestaurantAdd {
                day_number,
                slot_index,
                restaurant: venue.clone(),
            },
        ));

        self.pending.extend(events);
    }

    fn queue_new_day(&mut self, day_number: u32) {
        let Some(day) = self
            .modified
            .as_ref()
            .and_then(|modified| modified.day(day_number))
        else {
            return;
        };

        let events = new_day_events(day);
        self.pending.extend(events);
    }
}

impl Iterator for PatchStream {
    type Item = PatchEvent;

    fn next(&mut self) -> Option<PatchEvent> {
        if let Some(event) = self.preamble.take() {
            return Some(event);
        }

        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            if let Some(day_number) = self.removed_days.next() {
                return Some(PatchEvent::DayRemove { day_number });
            }
            if let Some(day_number) = self.common_days.next() {
                self.queue_day_changes(day_number);
                continue;
            }
            if let Some(day_number) = self.added_days.next() {
                self.queue_new_day(day_number);
                continue;
            }
            return self
                .modified
                .take()
                .map(|itinerary| PatchEvent::Complete { itinerary });
        }
    }
}

impl FusedIterator for PatchStream {}

/// Patch events turning `original` into `modified`
pub fn diff(original: &Itinerary, modified: &Itinerary) -> PatchStream {
    PatchStream::new(original.clone(), modified.clone())
}

fn ids(venues: &[Venue]) -> HashSet<&str> {
    venues.iter().map(|venue| venue.place_id.as_str()).collect()
}

fn removed<'a>(
    before: &'a [Venue],
    after: &'a HashSet<&'a str>,
) -> impl Iterator<Item = &'a Venue> + 'a {
    before
        .iter()
        .filter(move |venue| !after.contains(venue.place_id.as_str()))
}

fn added<'a>(
    after: &'a [Venue],
    before: &'a HashSet<&'a str>,
) -> impl Iterator<Item = (usize, &'a Venue)> + 'a {
    after
        .iter()
        .enumerate()
        .filter(move |(_, venue)| !before.contains(venue.place_id.as_str()))
}

fn new_day_events(day: &DayPlan) -> Vec<PatchEvent> {
    let mut events = vec![PatchEvent::DayAdd {
        day_number: day.day_number,
        title: day.title.clone(),
        description: day.description.clone(),
        places_count: day.places.len(),
        restaurants_count: day.restaurants.len(),
    }];
    events.extend(
        day.places
            .iter()
            .enumerate()
            .map(|(slot_index, venue)| PatchEvent::PlaceAdd {
                day_number: day.day_number,
                slot_index,
                place: venue.clone(),
            }),
    );
    events.extend(
        day.restaurants
            .iter()
            .enumerate()
            .map(|(slot_index, venue)| PatchEvent::RestaurantAdd {
                day_number: day.day_number,
                slot_index,
                restaurant: venue.clone(),
            }),
    );
    events
}
