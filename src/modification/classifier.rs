use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::intent::{IntentParams, ModificationIntent, ModificationType, TypeFilterAction};
use crate::{
    error::Result,
    schemas::{cached_schema, parse_structured, CompletionSchema, ParseMode, SchemaHandle},
    services::{with_timeout, CompletionClient},
    types::Itinerary,
};

/// Rule matches at or above this confidence skip the completion fallback
pub const RULE_CONFIDENCE_THRESHOLD: f64 = 0.8;

/// Conversation turns included in the fallback prompt
const CONTEXT_TURNS: usize = 4;

const FREE_KEYWORDS: &[&str] = &[
    "бесплатно",
    "free",
    "без денег",
    "даром",
    "no cost",
    "без оплаты",
    "бесплатные",
    "free entry",
    "free admission",
];

const CHEAPER_KEYWORDS: &[&str] = &[
    "дешевле",
    "cheaper",
    "budget",
    "бюджет",
    "экономнее",
    "подешевле",
    "менее дорого",
    "less expensive",
    "affordable",
    "доступнее",
];

const LUXURY_KEYWORDS: &[&str] = &[
    "дороже",
    "люкс",
    "luxury",
    "премиум",
    "premium",
    "vip",
    "expensive",
    "high-end",
    "эксклюзив",
    "exclusive",
];

const ADD_DAY_KEYWORDS: &[&str] = &[
    "+1 день",
    "добавь день",
    "add day",
    "add a day",
    "ещё день",
    "еще день",
    "добавить день",
    "another day",
    "one more day",
    "+1 day",
    "продли",
    "extend",
    "longer",
];

const REMOVE_DAY_KEYWORDS: &[&str] = &[
    "-1 день",
    "убери день",
    "remove day",
    "remove a day",
    "удали день",
    "короче",
    "меньше дней",
    "less days",
    "fewer days",
    "shorten",
    "сократи",
];

const REMOVE_TYPE_PATTERNS: &[&str] = &[
    r"\bубери\s+(музе[йи]|парк[иа]?|рестораны?|пляж[иа]?)",
    r"\bбез\s+(музе[йе]в|парков|ресторанов|пляжей)",
    r"\bremove\s+(?:the\s+|all\s+)?(museums?|parks?|restaurants?|beach(?:es)?)",
    r"\bno\s+(?:more\s+)?(museums?|parks?|restaurants?|beach(?:es)?)",
];

const ONLY_TYPE_PATTERNS: &[&str] = &[
    r"\bтолько\s+(музе[йи]|парк[иа]?|пляж[иа]?)",
    r"\bonly\s+(museums?|parks?|beach(?:es)?)",
];

/// Keyword stem to place type tags
const TYPE_KEYWORDS: &[(&str, &[&str])] = &[
    ("музе", &["museum"]),
    ("museum", &["museum"]),
    ("парк", &["park"]),
    ("park", &["park"]),
    ("пляж", &["beach"]),
    ("beach", &["beach"]),
    ("ресторан", &["restaurant", "food", "cafe"]),
    ("restaurant", &["restaurant", "food", "cafe"]),
];

const CLASSIFIER_SYSTEM_PROMPT: &str = "You decide whether a message asks to MODIFY an existing \
trip or to plan a NEW one, and which kind of modification it is. Return only JSON.";

const TYPE_GUIDE: &str = "\
FILTER_BUDGET_CHEAPER - make the trip cheaper or more affordable
FILTER_BUDGET_FREE - only free places
FILTER_BUDGET_LUXURY - make the trip more luxurious
FILTER_TYPE - remove, or keep only, specific place types (params: action remove|only, types)
ADD_DAY - add days to the trip (params: days_to_add)
REMOVE_DAY - remove days (params: days_to_remove or day_numbers)
REPLACE_PLACE - replace one place (params: day_number, place_index, criteria)
REPLACE_RESTAURANT - replace one restaurant (params: day_number, restaurant_index, criteria)
REORDER_PLACES - change the order of places
SEMANTIC - complex changes like more romantic, more active, family friendly \
(params: semantic_intent, aspects_to_change)
NOT_MODIFICATION - a request for a completely new trip";

/// One prior message of the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: String,
    pub content: String,
}

impl ConversationTurn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Envelope the completion fallback is asked to return
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ClassificationEnvelope {
    /// One of the modification type names
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub is_modification: Option<bool>,
    /// 0.0 to 1.0
    pub confidence: Option<Value>,
    /// Type-specific parameters
    #[serde(default)]
    pub params: Value,
    pub description: Option<String>,
}

impl CompletionSchema for ClassificationEnvelope {
    fn schema() -> &'static SchemaHandle {
        static SCHEMA: OnceLock<SchemaHandle> = OnceLock::new();
        cached_schema::<ClassificationEnvelope>(&SCHEMA, "ModificationClassification")
    }
}

/// Maps an edit request against the current itinerary to a `ModificationIntent`
#[derive(Clone)]
pub struct ModificationClassifier {
    client: Arc<dyn CompletionClient>,
    timeout: Duration,
}

impl ModificationClassifier {
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

    /// Classify a request. Never fails: completion problems resolve to
    /// `NOT_MODIFICATION` with confidence 0.5.
    pub async fn classify(
        &self,
        request: &str,
        itinerary: &Itinerary,
        context: &[ConversationTurn],
    ) -> ModificationIntent {
        if itinerary.days.is_empty() {
            return ModificationIntent::not_modification(1.0, "No existing trip to modify");
        }

        if let Some(intent) = classify_rules(request, itinerary) {
            if intent.confidence >= RULE_CONFIDENCE_THRESHOLD {
                info!(
                    target: "trip_planner::modification",
                    kind = %intent.kind,
                    confidence = intent.confidence,
                    "Rule-based classification matched"
                );
                return intent;
            }
        }

        match self.classify_with_completion(request, itinerary, context).await {
            Ok(intent) => {
                info!(
                    target: "trip_planner::modification",
                    kind = %intent.kind,
                    confidence = intent.confidence,
                    "Completion classification resolved"
                );
                intent
            }
            Err(err) => {
                warn!(
                    target: "trip_planner::modification",
                    error = %err,
                    "Completion classification failed"
                );
                ModificationIntent::not_modification(0.5, "Could not determine modification type")
            }
        }
    }

    async fn classify_with_completion(
        &self,
        request: &str,
        itinerary: &Itinerary,
        context: &[ConversationTurn],
    ) -> Result<ModificationIntent> {
        let prompt = classification_prompt(request, itinerary, context);
        let text = with_timeout(
            self.timeout,
            "modification classification",
            self.client.complete(&prompt, Some(CLASSIFIER_SYSTEM_PROMPT)),
        )
        .await?;

        let envelope = parse_structured::<ClassificationEnvelope>(&text, ParseMode::SerdeFirst)?;
        Ok(resolve_envelope(envelope))
    }
}

/// Map a parsed envelope onto the closed type set. Unknown names never fail.
pub fn resolve_envelope(envelope: ClassificationEnvelope) -> ModificationIntent {
    let name = envelope.kind.unwrap_or_default();
    let Some(kind) = ModificationType::parse(&name) else {
        debug!(target: "trip_planner::modification", kind = %name, "Unrecognized modification type");
        return ModificationIntent::not_modification(
            0.5,
            format!("Unrecognized modification type: {:?}", name),
        );
    };

    let confidence = envelope
        .confidence
        .as_ref()
        .and_then(|value| match value {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        })
        .unwrap_or(0.7);

    ModificationIntent::new(
        kind,
        IntentParams::from_value(envelope.params),
        confidence,
        envelope.description.unwrap_or_default(),
    )
}

fn classification_prompt(
    request: &str,
    itinerary: &Itinerary,
    context: &[ConversationTurn],
) -> String {
    let mut prompt = format!(
        "EXISTING TRIP:\nTitle: {}\nCity: {}\nTheme: {}\nDays: {}\n\n",
        if itinerary.title.is_empty() {
            "Trip"
        } else {
            &itinerary.title
        },
        if itinerary.city.is_empty() {
            "Unknown"
        } else {
            &itinerary.city
        },
        itinerary.theme,
        itinerary.days.len()
    );

    let recent = &context[context.len().saturating_sub(CONTEXT_TURNS)..];
    if !recent.is_empty() {
        prompt.push_str("RECENT CONVERSATION:\n");
        for turn in recent {
            prompt.push_str(&format!("{}: {}\n", turn.role, turn.content));
        }
        prompt.push('\n');
    }

    prompt.push_str(&format!(
        "USER REQUEST: \"{}\"\n\nModification types:\n{}\n\n{}",
        request,
        TYPE_GUIDE,
        ClassificationEnvelope::schema().prompt_instructions()
    ));
    prompt
}

/// Fast keyword and pattern pass. Returns `None` when no rule applies.
pub fn classify_rules(request: &str, itinerary: &Itinerary) -> Option<ModificationIntent> {
    let text = request.trim().to_lowercase();
    let mentions = |keywords: &[&str]| keywords.iter().any(|keyword| text.contains(keyword));

    if mentions(FREE_KEYWORDS) {
        return Some(ModificationIntent::new(
            ModificationType::FilterBudgetFree,
            IntentParams {
                max_price_level: Some(0),
                replace: Some(true),
                ..Default::default()
            },
            0.95,
            "Replace paid places with free alternatives",
        ));
    }

    if mentions(CHEAPER_KEYWORDS) {
        return Some(ModificationIntent::new(
            ModificationType::FilterBudgetCheaper,
            IntentParams {
                max_price_level: Some(2),
                replace: Some(true),
                ..Default::default()
            },
            0.9,
            "Replace expensive places with cheaper alternatives",
        ));
    }

    if mentions(LUXURY_KEYWORDS) {
        return Some(ModificationIntent::new(
            ModificationType::FilterBudgetLuxury,
            IntentParams {
                min_price_level: Some(3),
                replace: Some(true),
                ..Default::default()
            },
            0.9,
            "Replace budget places with luxury alternatives",
        ));
    }

    let added = day_count(add_day_regex(), &text);
    if mentions(ADD_DAY_KEYWORDS) || added.is_some() {
        let days_to_add = added.unwrap_or(1).max(1);
        return Some(ModificationIntent::new(
            ModificationType::AddDay,
            IntentParams {
                days_to_add: Some(days_to_add),
                ..Default::default()
            },
            0.9,
            format!("Add {} day(s) to the trip", days_to_add),
        ));
    }

    let removed = day_count(remove_day_regex(), &text);
    if mentions(REMOVE_DAY_KEYWORDS) || removed.is_some() {
        let current_days = itinerary.days.len() as u32;
        let mut days_to_remove = removed.unwrap_or(1).max(1);
        if days_to_remove >= current_days {
            days_to_remove = current_days.saturating_sub(1).max(1);
        }
        return Some(ModificationIntent::new(
            ModificationType::RemoveDay,
            IntentParams {
                days_to_remove: Some(days_to_remove),
                ..Default::default()
            },
            0.9,
            format!("Remove {} day(s) from the trip", days_to_remove),
        ));
    }

    for (patterns, action) in [
        (remove_type_regexes(), TypeFilterAction::Remove),
        (only_type_regexes(), TypeFilterAction::Only),
    ] {
        let matched = patterns
            .iter()
            .find_map(|pattern| pattern.captures(&text))
            .and_then(|captures| captures.get(1).map(|word| word.as_str().to_string()));

        let Some(word) = matched else { continue };
        let types = types_for_keyword(&word);
        if types.is_empty() {
            continue;
        }

        let description = match action {
            TypeFilterAction::Remove => format!("Remove {} and find alternatives", word),
            TypeFilterAction::Only => {
                format!("Keep only {}, find alternatives for others", word)
            }
        };
        return Some(ModificationIntent::new(
            ModificationType::FilterType,
            IntentParams {
                action: Some(action),
                types,
                replace: Some(true),
                ..Default::default()
            },
            0.85,
            description,
        ));
    }

    None
}

/// Place type tags for a keyword such as "museums" or "парки"
pub fn types_for_keyword(word: &str) -> Vec<String> {
    let word = word.to_lowercase();
    TYPE_KEYWORDS
        .iter()
        .find(|(stem, _)| word.contains(stem))
        .map(|(_, types)| types.iter().map(|tag| tag.to_string()).collect())
        .unwrap_or_default()
}

fn day_count(pattern: Option<&Regex>, text: &str) -> Option<u32> {
    pattern?
        .captures(text)?
        .get(1)?
        .as_str()
        .parse::<u32>()
        .ok()
}

fn add_day_regex() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"(?:\+\s*|add\s+|добавь\s+|добавить\s+)(\d+)\s*(?:more\s+|extra\s+)?(?:день|дня|дней|days?)",
            )
            .ok()
        })
        .as_ref()
}

fn remove_day_regex() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"(?:-\s*|remove\s+|убери\s+|удали\s+)(\d+)\s*(?:день|дня|дней|days?)").ok()
        })
        .as_ref()
}

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
}

fn remove_type_regexes() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| compile_all(REMOVE_TYPE_PATTERNS))
}

fn only_type_regexes() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| compile_all(ONLY_TYPE_PATTERNS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DayPlan;
    use serde_json::json;

    fn trip(days: u32) -> Itinerary {
        Itinerary {
            title: "Anime Trip to Tokyo".to_string(),
            description: String::new(),
            city: "Tokyo".to_string(),
            country: "Japan".to_string(),
            duration_days: days,
            theme: "anime".to_string(),
            days: (1..=days)
                .map(|n| DayPlan::new(n, format!("Day {}", n), ""))
                .collect(),
        }
    }

    fn rules(text: &str) -> Option<ModificationIntent> {
        classify_rules(text, &trip(3))
    }

    #[test]
    fn test_budget_rules_in_priority_order() {
        let free = rules("Only FREE stuff please").unwrap();
        assert_eq!(free.kind, ModificationType::FilterBudgetFree);
        assert_eq!(free.confidence, 0.95);
        assert_eq!(free.params.max_price_level, Some(0));

        let cheaper = rules("сделай дешевле").unwrap();
        assert_eq!(cheaper.kind, ModificationType::FilterBudgetCheaper);
        assert_eq!(cheaper.params.max_price_level, Some(2));

        let luxury = rules("I want a luxury version").unwrap();
        assert_eq!(luxury.kind, ModificationType::FilterBudgetLuxury);
        assert_eq!(luxury.params.min_price_level, Some(3));
    }

    #[test]
    fn test_add_day_counts() {
        let one = rules("can you add a day?").unwrap();
        assert_eq!(one.kind, ModificationType::AddDay);
        assert_eq!(one.params.days_to_add, Some(1));

        let two = rules("+2 days please").unwrap();
        assert_eq!(two.params.days_to_add, Some(2));
        assert_eq!(two.estimated_cost_ms, 16000);

        let russian = rules("+3 дня").unwrap();
        assert_eq!(russian.params.days_to_add, Some(3));
    }

    #[test]
    fn test_remove_day_clamps_to_keep_one() {
        let intent = classify_rules("remove 5 days", &trip(3)).unwrap();
        assert_eq!(intent.kind, ModificationType::RemoveDay);
        assert_eq!(intent.params.days_to_remove, Some(2));
        assert!(!intent.requires_search);

        let single = classify_rules("shorten the trip", &trip(1)).unwrap();
        assert_eq!(single.params.days_to_remove, Some(1));
    }

    #[test]
    fn test_type_rules() {
        let remove = rules("remove museums").unwrap();
        assert_eq!(remove.kind, ModificationType::FilterType);
        assert_eq!(remove.confidence, 0.85);
        assert_eq!(remove.params.action(), TypeFilterAction::Remove);
        assert_eq!(remove.params.types, vec!["museum"]);

        let only = rules("only parks").unwrap();
        assert_eq!(only.params.action(), TypeFilterAction::Only);
        assert_eq!(only.params.types, vec!["park"]);

        let russian = rules("без музеев").unwrap();
        assert_eq!(russian.params.types, vec!["museum"]);

        let food = rules("no restaurants").unwrap();
        assert_eq!(food.params.types, vec!["restaurant", "food", "cafe"]);
    }

    #[test]
    fn test_no_rule_for_semantic_requests() {
        assert!(rules("make it more romantic").is_none());
        assert!(rules("swap the second place on day 2").is_none());
    }

    #[test]
    fn test_resolve_envelope_maps_unknown_types() {
        let unknown = resolve_envelope(ClassificationEnvelope {
            kind: Some("TIME_TRAVEL".to_string()),
            ..Default::default()
        });
        assert_eq!(unknown.kind, ModificationType::NotModification);
        assert_eq!(unknown.confidence, 0.5);
        assert!(unknown.description.contains("TIME_TRAVEL"));

        let semantic = resolve_envelope(ClassificationEnvelope {
            kind: Some("semantic".to_string()),
            confidence: Some(json!("0.8")),
            params: json!({"semantic_intent": "more romantic"}),
            description: Some("Make it romantic".to_string()),
            ..Default::default()
        });
        assert_eq!(semantic.kind, ModificationType::Semantic);
        assert_eq!(semantic.confidence, 0.8);
        assert!(semantic.requires_search);
        assert!(semantic.requires_semantic_reasoning);
        assert_eq!(
            semantic.params.semantic_intent.as_deref(),
            Some("more romantic")
        );
    }

    #[test]
    fn test_prompt_includes_recent_turns_only() {
        let context: Vec<ConversationTurn> = (0..6)
            .map(|n| ConversationTurn::new("user", format!("turn {}", n)))
            .collect();
        let prompt = classification_prompt("make it romantic", &trip(2), &context);

        assert!(!prompt.contains("turn 1"));
        assert!(prompt.contains("turn 2"));
        assert!(prompt.contains("turn 5"));
        assert!(prompt.contains("Days: 2"));
        assert!(prompt.contains("ModificationClassification"));
    }
}
