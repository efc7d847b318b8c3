mod common;

use std::collections::HashSet;

use common::{
    analysis, day, paris_trip, place, shared, trip, MockDiscovery, ScriptedCompletion,
};
use serde_json::json;
use trip_planner_rs::{
    modification::{
        remove_days, ConversationTurn, IntentParams, ModificationEngine, ModificationIntent,
        ModificationType, TypeFilterAction,
    },
    services::SearchRequest,
    types::{Itinerary, MealCategory, Venue},
    PlannerError, Result,
};

fn scripted() -> ScriptedCompletion {
    ScriptedCompletion::new()
        .reply(common::ANALYZER, analysis("art", "Paris", 2))
        .reply(common::RELEVANCE, json!([]))
}

fn all_ids(itinerary: &Itinerary) -> Vec<String> {
    itinerary
        .days
        .iter()
        .flat_map(|day| day.places.iter().chain(day.restaurants.iter()))
        .map(|venue| venue.place_id.clone())
        .collect()
}

fn assert_no_duplicates(itinerary: &Itinerary) {
    let ids = all_ids(itinerary);
    let unique: HashSet<&String> = ids.iter().collect();
    assert_eq!(ids.len(), unique.len(), "duplicate venues: {:?}", ids);
}

fn assert_contiguous(itinerary: &Itinerary) {
    let numbers: Vec<u32> = itinerary.days.iter().map(|day| day.day_number).collect();
    let expected: Vec<u32> = (1..=itinerary.days.len() as u32).collect();
    assert_eq!(numbers, expected);
    assert_eq!(itinerary.duration_days as usize, itinerary.days.len());
}

#[tokio::test]
async fn test_trip_without_days_is_not_a_modification() {
    let completion = shared(scripted());
    let engine = ModificationEngine::new(completion.clone(), shared(MockDiscovery::city()));

    let intent = engine
        .classify("make it cheaper", &trip(Vec::new()), &[])
        .await;

    assert_eq!(intent.kind, ModificationType::NotModification);
    assert_eq!(intent.confidence, 1.0);
    assert!(!intent.is_modification());
    assert_eq!(completion.calls(), 0);
}

#[tokio::test]
async fn test_keyword_rules_skip_the_completion() {
    let completion = shared(scripted());
    let engine = ModificationEngine::new(completion.clone(), shared(MockDiscovery::city()));
    let itinerary = paris_trip();

    let free = engine.classify("Only free stuff please", &itinerary, &[]).await;
    assert_eq!(free.kind, ModificationType::FilterBudgetFree);
    assert_eq!(free.params.max_price_level, Some(0));
    assert!(free.confidence >= 0.8);

    let russian = engine.classify("сделай дешевле", &itinerary, &[]).await;
    assert_eq!(russian.kind, ModificationType::FilterBudgetCheaper);

    let museums = engine.classify("убери музеи", &itinerary, &[]).await;
    assert_eq!(museums.kind, ModificationType::FilterType);
    assert_eq!(museums.params.types, vec!["museum".to_string()]);

    assert_eq!(completion.calls(), 0);
}

#[tokio::test]
async fn test_free_filter_on_free_trip_changes_nothing() {
    let completion = shared(scripted());
    let discovery = shared(MockDiscovery::city());
    let engine = ModificationEngine::new(completion.clone(), discovery.clone());

    let itinerary = trip(vec![
        day(1, vec![place("garden", Some(0)), place("bridge", Some(0))], Vec::new()),
        day(2, vec![place("square", Some(0))], Vec::new()),
    ]);

    let outcome = engine.modify("free entry only", &itinerary, &[]).await;

    assert_eq!(outcome.intent.kind, ModificationType::FilterBudgetFree);
    assert_eq!(outcome.itinerary, itinerary);
    assert_eq!(discovery.calls(), 0);
    assert_eq!(completion.calls(), 0);

    let names: Vec<&str> = outcome.events.map(|event| event.name()).collect();
    assert_eq!(names, vec!["modification_start", "complete"]);
}

#[tokio::test]
async fn test_free_filter_replaces_paid_places_in_their_slots() {
    let discovery = MockDiscovery::new(|request| {
        let mut venues = common::city_results(request)?;
        for venue in venues.iter_mut() {
            venue.place_id = format!("free-{}", venue.place_id);
            venue.price_level = Some(0);
        }
        Ok(venues)
    });
    let engine = ModificationEngine::new(shared(scripted()), shared(discovery));
    let itinerary = paris_trip();

    let outcome = engine.modify("make everything free", &itinerary, &[]).await;
    let modified = &outcome.itinerary;

    for day in &modified.days {
        assert_eq!(day.places.len(), 3);
        assert!(day.places.iter().all(|venue| venue.price_level == Some(0)));
    }
    // Free places keep their position behind the replacements
    assert_eq!(modified.days[0].places[2].place_id, "tuileries");
    assert_eq!(modified.days[1].places[2].place_id, "montmartre");
    assert!(modified.days[0].places[0].place_id.starts_with("free-"));
    assert_no_duplicates(modified);
    assert_eq!(modified.days[0].restaurants, itinerary.days[0].restaurants);

    let events: Vec<_> = outcome.events.collect();
    let removed: Vec<&str> = events
        .iter()
        .filter(|event| event.name() == "place_remove")
        .filter_map(|event| event.place_id())
        .collect();
    assert_eq!(removed, vec!["louvre", "orsay", "orangerie", "rodin"]);
    assert_eq!(
        events.iter().filter(|event| event.name() == "place_add").count(),
        4
    );
}

#[tokio::test]
async fn test_remove_day_keeps_at_least_one_day() {
    let engine = ModificationEngine::new(shared(scripted()), shared(MockDiscovery::city()));
    let itinerary = paris_trip();

    let outcome = engine.modify("remove 99 days", &itinerary, &[]).await;

    assert_eq!(outcome.intent.kind, ModificationType::RemoveDay);
    assert_eq!(outcome.intent.params.days_to_remove, Some(1));
    assert_eq!(outcome.itinerary.days.len(), 1);
    assert_contiguous(&outcome.itinerary);

    let names: Vec<&str> = outcome.events.map(|event| event.name()).collect();
    assert_eq!(names, vec!["modification_start", "day_remove", "complete"]);
}

#[tokio::test]
async fn test_apply_remove_ninety_nine_days_from_three() {
    let discovery = shared(MockDiscovery::city());
    let engine = ModificationEngine::new(shared(scripted()), discovery.clone());
    let mut itinerary = paris_trip();
    itinerary
        .days
        .push(day(3, vec![place("versailles", Some(3))], Vec::new()));
    itinerary.duration_days = 3;

    let intent = ModificationIntent::new(
        ModificationType::RemoveDay,
        IntentParams {
            days_to_remove: Some(99),
            ..Default::default()
        },
        0.9,
        "Remove 99 days",
    );
    let modified = engine.apply(itinerary.clone(), intent).await;

    assert_eq!(modified.days.len(), 1);
    assert_eq!(modified.days[0].day_number, 1);
    assert_eq!(modified.days[0].places, itinerary.days[0].places);
    assert_contiguous(&modified);
    assert_eq!(discovery.calls(), 0);
}

#[test]
fn test_remove_named_day_renumbers() {
    let mut itinerary = paris_trip();
    remove_days(&mut itinerary, 1, &[1]);

    assert_eq!(itinerary.days.len(), 1);
    assert_eq!(itinerary.days[0].day_number, 1);
    assert_eq!(itinerary.days[0].places[0].place_id, "orangerie");
    assert_contiguous(&itinerary);

    let mut itinerary = paris_trip();
    remove_days(&mut itinerary, 1, &[1, 2]);
    assert_eq!(itinerary.days.len(), 1);
    assert_contiguous(&itinerary);
}

#[tokio::test]
async fn test_add_days_appends_contiguous_days() {
    let discovery = shared(MockDiscovery::city());
    let engine = ModificationEngine::new(shared(scripted()), discovery.clone());
    let itinerary = paris_trip();

    let outcome = engine.modify("add 2 more days", &itinerary, &[]).await;
    let modified = &outcome.itinerary;

    assert_eq!(outcome.intent.kind, ModificationType::AddDay);
    assert_eq!(outcome.intent.estimated_cost_ms, 16000);
    assert_eq!(modified.days.len(), 4);
    assert_contiguous(modified);
    assert_no_duplicates(modified);
    assert_eq!(modified.days[2].title, "Day 3: More art");
    assert_eq!(modified.days[3].description, "Additional day exploring Paris");
    assert_eq!(modified.days[2].places.len(), 5);
    assert_eq!(modified.days[0], itinerary.days[0]);

    for day in &modified.days[2..] {
        let meals: Vec<_> = day.restaurants.iter().map(|r| r.category).collect();
        assert_eq!(meals, MealCategory::ALL.into_iter().map(Some).collect::<Vec<_>>());
    }

    let days_added: Vec<u32> = outcome
        .events
        .filter_map(|event| match event {
            trip_planner_rs::PatchEvent::DayAdd { day_number, .. } => Some(day_number),
            _ => None,
        })
        .collect();
    assert_eq!(days_added, vec![3, 4]);
}

#[tokio::test]
async fn test_completion_fallback_maps_envelope() {
    let completion = shared(scripted().reply(
        common::CLASSIFIER,
        json!({
            "type": "replace_place",
            "is_modification": true,
            "confidence": "0.85",
            "params": {"day_number": 1, "place_index": "1", "criteria": "quieter"},
            "description": "Swap the second place"
        }),
    ));
    let engine = ModificationEngine::new(completion.clone(), shared(MockDiscovery::city()));

    let context = vec![
        ConversationTurn::new("user", "Plan 2 days of art in Paris"),
        ConversationTurn::new("assistant", "Here is your trip"),
    ];
    let intent = engine
        .classify("swap the second stop on the first morning for somewhere quieter", &paris_trip(), &context)
        .await;

    assert_eq!(intent.kind, ModificationType::ReplacePlace);
    assert_eq!(intent.confidence, 0.85);
    assert_eq!(intent.params.day_number, Some(1));
    assert_eq!(intent.params.place_index, Some(1));
    assert_eq!(intent.params.criteria.as_deref(), Some("quieter"));
    assert!(intent.requires_search);

    let prompt = &completion.prompts()[0];
    assert!(prompt.contains("assistant: Here is your trip"));
}

#[tokio::test]
async fn test_unknown_type_is_not_a_modification() {
    let completion = shared(scripted().reply(
        common::CLASSIFIER,
        json!({"type": "TELEPORT", "confidence": 0.99}),
    ));
    let engine = ModificationEngine::new(completion, shared(MockDiscovery::city()));

    let intent = engine
        .classify("beam us to the moon", &paris_trip(), &[])
        .await;

    assert_eq!(intent.kind, ModificationType::NotModification);
    assert_eq!(intent.confidence, 0.5);
}

#[tokio::test]
async fn test_classifier_completion_failure_defaults() {
    let engine = ModificationEngine::new(
        shared(scripted().fail(common::CLASSIFIER)),
        shared(MockDiscovery::city()),
    );

    let intent = engine
        .classify("something about the trip", &paris_trip(), &[])
        .await;

    assert_eq!(intent.kind, ModificationType::NotModification);
    assert_eq!(intent.confidence, 0.5);
    assert_eq!(intent.description, "Could not determine modification type");
}

#[tokio::test]
async fn test_out_of_range_replace_is_a_noop() {
    let completion = shared(scripted());
    let discovery = shared(MockDiscovery::city());
    let engine = ModificationEngine::new(completion.clone(), discovery.clone());
    let itinerary = paris_trip();

    let intent = ModificationIntent::new(
        ModificationType::ReplacePlace,
        IntentParams {
            day_number: Some(5),
            place_index: Some(0),
            ..Default::default()
        },
        0.9,
        "Replace a place on day 5",
    );
    let modified = engine.apply(itinerary.clone(), intent).await;

    assert_eq!(modified, itinerary);
    assert_eq!(discovery.calls(), 0);
    assert_eq!(completion.calls(), 0);
}

#[tokio::test]
async fn test_replace_place_keeps_slot() {
    let engine = ModificationEngine::new(shared(scripted()), shared(MockDiscovery::city()));
    let itinerary = paris_trip();

    let intent = ModificationIntent::new(
        ModificationType::ReplacePlace,
        IntentParams {
            day_number: Some(1),
            place_index: Some(1),
            ..Default::default()
        },
        0.9,
        "Replace the second place",
    );
    let modified = engine.apply(itinerary.clone(), intent).await;

    let places: Vec<&str> = modified.days[0]
        .places
        .iter()
        .map(|venue| venue.place_id.as_str())
        .collect();
    assert_eq!(places.len(), 3);
    assert_eq!(places[0], "louvre");
    assert_ne!(places[1], "orsay");
    assert_eq!(places[2], "tuileries");
    assert_no_duplicates(&modified);
}

#[tokio::test]
async fn test_semantic_plan_is_applied_in_order() {
    let completion = shared(scripted().reply(
        common::CHANGE_PLAN,
        json!({
            "places_to_remove": [
                {"day_number": 1, "place_index": 0, "reason": "too busy"},
                {"day_number": 1, "place_index": 2, "reason": "not romantic"}
            ],
            "search_queries_for_new_places": ["rose gardens"],
            "restaurants_to_change": [{"day_number": 2, "criteria": "romantic dinner"}],
            "title_suggestion": "Romantic Art in Paris"
        }),
    ));
    let engine = ModificationEngine::new(completion.clone(), shared(MockDiscovery::city()));
    let itinerary = paris_trip();

    let intent = ModificationIntent::new(
        ModificationType::Semantic,
        IntentParams {
            semantic_intent: Some("make it more romantic".to_string()),
            ..Default::default()
        },
        0.8,
        "More romantic",
    );
    let modified = engine.apply(itinerary.clone(), intent).await;

    assert_eq!(modified.title, "Romantic Art in Paris");
    assert_eq!(modified.description, itinerary.description);

    let day_one: Vec<&str> = modified.days[0]
        .places
        .iter()
        .map(|venue| venue.place_id.as_str())
        .collect();
    assert_eq!(day_one.len(), 3);
    assert_eq!(day_one[0], "orsay");
    assert!(day_one[1..].iter().all(|id| id.starts_with("rose-gardens")));
    assert_eq!(modified.days[1].places, itinerary.days[1].places);

    let dinner = &modified.days[1].restaurants[2];
    assert_eq!(dinner.category, Some(MealCategory::Dinner));
    assert_ne!(dinner.place_id, "d2-dinner");
    assert_eq!(dinner.cuisine.as_deref(), Some("romantic dinner"));
    assert_eq!(modified.days[1].restaurants[0], itinerary.days[1].restaurants[0]);
    assert_no_duplicates(&modified);

    assert!(completion.prompts()[0].contains("make it more romantic"));
}

#[tokio::test]
async fn test_unusable_semantic_plan_leaves_trip_unchanged() {
    let intent = ModificationIntent::new(
        ModificationType::Semantic,
        IntentParams::default(),
        0.8,
        "More active",
    );

    for reply in [
        "I cannot help with that".to_string(),
        json!({
            "places_to_remove": [{"day_number": 1, "place_index": "first"}],
            "title_suggestion": "Active Paris"
        })
        .to_string(),
    ] {
        let discovery = shared(MockDiscovery::city());
        let engine = ModificationEngine::new(
            shared(scripted().reply_text(common::CHANGE_PLAN, &reply)),
            discovery.clone(),
        );
        let itinerary = paris_trip();

        let modified = engine.apply(itinerary.clone(), intent.clone()).await;

        assert_eq!(modified, itinerary);
        assert_eq!(discovery.calls(), 0);
    }
}

/// Per query: an already planned venue, then candidates across price levels and types
fn priced_results(request: &SearchRequest) -> Result<Vec<Venue>> {
    let prefix = request.query.to_lowercase().replace(' ', "-");
    let candidate = |suffix: &str, price_level: i32, kind: &str| {
        place(&format!("{prefix}-{suffix}"), Some(price_level)).with_types([kind])
    };
    Ok(vec![
        place("louvre", Some(1)),
        candidate("pricey", 4, "museum"),
        candidate("cheap", 1, "museum"),
        candidate("park", 0, "park"),
        candidate("gala", 3, "museum"),
    ])
}

fn filter_intent(kind: ModificationType, params: IntentParams) -> ModificationIntent {
    ModificationIntent::new(kind, params, 0.9, "Filter places")
}

fn place_ids(itinerary: &Itinerary, day_idx: usize) -> Vec<String> {
    itinerary.days[day_idx]
        .places
        .iter()
        .map(|venue| venue.place_id.clone())
        .collect()
}

fn assert_refills_are_new(original: &Itinerary, modified: &Itinerary, refills: &[String]) {
    let before = original.venue_ids();
    for id in refills {
        assert!(!before.contains(id), "{id} was already planned");
    }
    assert_no_duplicates(modified);
}

#[tokio::test]
async fn test_cheaper_filter_refills_the_removed_slot() {
    let engine = ModificationEngine::new(
        shared(scripted()),
        shared(MockDiscovery::new(priced_results)),
    );
    let itinerary = paris_trip();

    let modified = engine
        .apply(
            itinerary.clone(),
            filter_intent(ModificationType::FilterBudgetCheaper, IntentParams::default()),
        )
        .await;

    assert_eq!(place_ids(&modified, 0), place_ids(&itinerary, 0));
    let day_two = place_ids(&modified, 1);
    assert_eq!(day_two.len(), 3);
    assert_eq!(day_two[0], "orangerie");
    assert_eq!(day_two[1], "art-museums-in-paris-cheap");
    assert_eq!(day_two[2], "montmartre");
    assert!(modified
        .days
        .iter()
        .flat_map(|day| day.places.iter())
        .all(|venue| venue.price_level.unwrap_or(2) <= 2));
    assert_refills_are_new(&itinerary, &modified, &day_two[1..2]);
}

#[tokio::test]
async fn test_luxury_filter_refills_in_place_and_shrinks_when_short() {
    let engine = ModificationEngine::new(
        shared(scripted()),
        shared(MockDiscovery::new(priced_results)),
    );
    let itinerary = paris_trip();

    let modified = engine
        .apply(
            itinerary.clone(),
            filter_intent(ModificationType::FilterBudgetLuxury, IntentParams::default()),
        )
        .await;

    // Five slots open up but only four upscale candidates exist
    let day_one = place_ids(&modified, 0);
    assert_eq!(
        day_one,
        vec![
            "art-museums-in-paris-pricey",
            "art-museums-in-paris-gala",
            "art-galleries-in-paris-pricey",
        ]
    );
    let day_two = place_ids(&modified, 1);
    assert_eq!(day_two, vec!["art-galleries-in-paris-gala", "rodin"]);
    assert!(modified
        .days
        .iter()
        .flat_map(|day| day.places.iter())
        .all(|venue| venue.price_level >= Some(3)));

    let mut refills = day_one.clone();
    refills.push(day_two[0].clone());
    assert_refills_are_new(&itinerary, &modified, &refills);
}

#[tokio::test]
async fn test_only_type_filter_keeps_matches_and_refills_with_that_type() {
    let engine = ModificationEngine::new(
        shared(scripted()),
        shared(MockDiscovery::new(priced_results)),
    );
    let mut itinerary = paris_trip();
    itinerary.days[0].places[2].types = vec!["park".to_string()];
    itinerary.days[1].places[2].types =
        vec!["park".to_string(), "tourist_attraction".to_string()];

    let modified = engine
        .apply(
            itinerary.clone(),
            filter_intent(
                ModificationType::FilterType,
                IntentParams {
                    action: Some(TypeFilterAction::Only),
                    types: vec!["park".to_string()],
                    ..Default::default()
                },
            ),
        )
        .await;

    let day_one = place_ids(&modified, 0);
    assert_eq!(
        day_one,
        vec!["art-museums-in-paris-park", "art-galleries-in-paris-park", "tuileries"]
    );
    assert_eq!(place_ids(&modified, 1), vec!["montmartre"]);
    assert!(modified
        .days
        .iter()
        .flat_map(|day| day.places.iter())
        .all(|venue| venue.types.iter().any(|tag| tag == "park")));
    assert_refills_are_new(&itinerary, &modified, &day_one[..2]);
}

#[tokio::test]
async fn test_replace_restaurant_on_day_without_places_searches_city() {
    let discovery = shared(MockDiscovery::new(|request| {
        if request.location.is_some() {
            return Err(PlannerError::Upstream("unexpected location bias".to_string()));
        }
        common::city_results(request)
    }));
    let engine = ModificationEngine::new(shared(scripted()), discovery.clone());
    let mut itinerary = paris_trip();
    itinerary.days[1].places.clear();

    let intent = ModificationIntent::new(
        ModificationType::ReplaceRestaurant,
        IntentParams {
            day_number: Some(2),
            restaurant_index: Some(2),
            ..Default::default()
        },
        0.9,
        "Another dinner on day 2",
    );
    let modified = engine.apply(itinerary.clone(), intent).await;

    let dinner = &modified.days[1].restaurants[2];
    assert_eq!(dinner.place_id, "dinner-0");
    assert_eq!(dinner.category, Some(MealCategory::Dinner));
    assert_eq!(modified.days[1].restaurants[..2], itinerary.days[1].restaurants[..2]);
    assert_eq!(discovery.queries(), vec!["local cuisine dinner Paris".to_string()]);
    assert_no_duplicates(&modified);
}
