use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use crate::types::{GeoPoint, Venue};

/// Photo and coordinate metadata remembered for a venue
#[derive(Debug, Clone, PartialEq)]
pub struct CachedVenue {
    pub photo_urls: Vec<String>,
    pub location: Option<GeoPoint>,
}

/// Venue metadata keyed by place id, filled during search and read at finalize.
///
/// Clones share storage. The pipeline clears it at the start of every run, so two
/// runs sharing one cache can clobber each other's entries; give each concurrent
/// run its own cache when that matters.
#[derive(Debug, Clone, Default)]
pub struct VenueCache {
    inner: Arc<RwLock<HashMap<String, CachedVenue>>>,
}

impl VenueCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&self) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn record(&self, venue: &Venue) {
        if venue.place_id.is_empty() {
            return;
        }
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                venue.place_id.clone(),
                CachedVenue {
                    photo_urls: venue.photo_urls.clone(),
                    location: venue.location,
                },
            );
    }

    pub fn record_all<'a>(&self, venues: impl IntoIterator<Item = &'a Venue>) {
        for venue in venues {
            self.record(venue);
        }
    }

    pub fn get(&self, place_id: &str) -> Option<CachedVenue> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(place_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill missing photos and coordinates from the cache. Returns true if anything changed.
    pub fn enrich(&self, venue: &mut Venue) -> bool {
        let Some(cached) = self.get(&venue.place_id) else {
            return false;
        };

        let mut changed = false;
        if venue.photo_urls.is_empty() && !cached.photo_urls.is_empty() {
            venue.photo_urls = cached.photo_urls;
            changed = true;
        }
        if venue.location.is_none() && cached.location.is_some() {
            venue.location = cached.location;
            changed = true;
        }
        changed
    }
}
