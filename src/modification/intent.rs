use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{error::PlannerError, types::MAX_TRIP_DAYS};

/// Closed set of edits the applicator knows how to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModificationType {
    FilterBudgetCheaper,
    FilterBudgetFree,
    FilterBudgetLuxury,
    FilterType,
    AddDay,
    RemoveDay,
    ReplacePlace,
    ReplaceRestaurant,
    ReorderPlaces,
    Semantic,
    NotModification,
}

impl ModificationType {
    pub const ALL: [ModificationType; 11] = [
        ModificationType::FilterBudgetCheaper,
        ModificationType::FilterBudgetFree,
        ModificationType::FilterBudgetLuxury,
        ModificationType::FilterType,
        ModificationType::AddDay,
        ModificationType::RemoveDay,
        ModificationType::ReplacePlace,
        ModificationType::ReplaceRestaurant,
        ModificationType::ReorderPlaces,
        ModificationType::Semantic,
        ModificationType::NotModification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModificationType::FilterBudgetCheaper => "FILTER_BUDGET_CHEAPER",
            ModificationType::FilterBudgetFree => "FILTER_BUDGET_FREE",
            ModificationType::FilterBudgetLuxury => "FILTER_BUDGET_LUXURY",
            ModificationType::FilterType => "FILTER_TYPE",
            ModificationType::AddDay => "ADD_DAY",
            ModificationType::RemoveDay => "REMOVE_DAY",
            ModificationType::ReplacePlace => "REPLACE_PLACE",
            ModificationType::ReplaceRestaurant => "REPLACE_RESTAURANT",
            ModificationType::ReorderPlaces => "REORDER_PLACES",
            ModificationType::Semantic => "SEMANTIC",
            ModificationType::NotModification => "NOT_MODIFICATION",
        }
    }

    /// Case-insensitive lookup accepting `FILTER_TYPE`, `filter_type` or `filter-type`
    pub fn parse(name: &str) -> Option<Self> {
        let normalized = name.trim().replace('-', "_").to_uppercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
    }

    /// Whether applying this edit needs the discovery service
    pub fn requires_search(&self) -> bool {
        matches!(
            self,
            ModificationType::FilterBudgetCheaper
                | ModificationType::FilterBudgetFree
                | ModificationType::FilterBudgetLuxury
                | ModificationType::FilterType
                | ModificationType::AddDay
                | ModificationType::ReplacePlace
                | ModificationType::ReplaceRestaurant
                | ModificationType::Semantic
        )
    }

    /// Whether applying this edit needs a completion-driven change plan
    pub fn requires_semantic_reasoning(&self) -> bool {
        matches!(self, ModificationType::Semantic)
    }

    /// Latency hint in milliseconds for a single unit of this edit
    pub fn base_cost_ms(&self) -> u64 {
        match self {
            ModificationType::FilterBudgetCheaper
            | ModificationType::FilterBudgetFree
            | ModificationType::FilterBudgetLuxury
            | ModificationType::FilterType => 5000,
            ModificationType::AddDay => 8000,
            ModificationType::RemoveDay | ModificationType::ReorderPlaces => 100,
            ModificationType::ReplacePlace | ModificationType::ReplaceRestaurant => 3000,
            ModificationType::Semantic => 10000,
            ModificationType::NotModification => 0,
        }
    }
}

impl fmt::Display for ModificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModificationType {
    type Err = PlannerError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::parse(name).ok_or_else(|| {
            PlannerError::Validation(format!("Unknown modification type: {}", name))
        })
    }
}

/// Whether a type filter removes the named types or keeps only them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeFilterAction {
    Remove,
    Only,
}

/// Parameters of an intent. Every field is optional; accessors supply defaults.
///
/// Deserialization is lenient so a loosely typed completion ("2", 2.0, a bare
/// string instead of a list) still yields usable values, and unreadable fields
/// are dropped rather than failing the whole intent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentParams {
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_i32")]
    pub max_price_level: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_i32")]
    pub min_price_level: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_bool")]
    pub replace: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_action")]
    pub action: Option<TypeFilterAction>,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "lenient_strings")]
    pub types: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_u32")]
    pub days_to_add: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_u32")]
    pub days_to_remove: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "lenient_u32s")]
    pub day_numbers: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_u32")]
    pub day_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_usize")]
    pub place_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_usize")]
    pub restaurant_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub criteria: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub semantic_intent: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "lenient_strings")]
    pub aspects_to_change: Vec<String>,
}

impl IntentParams {
    /// Read params from a completion value; anything unreadable yields defaults
    pub fn from_value(value: Value) -> Self {
        if value.is_null() {
            return Self::default();
        }
        serde_json::from_value(value).unwrap_or_default()
    }

    pub fn replace(&self) -> bool {
        self.replace.unwrap_or(true)
    }

    pub fn action(&self) -> TypeFilterAction {
        self.action.unwrap_or(TypeFilterAction::Remove)
    }

    pub fn days_to_add(&self) -> u32 {
        self.days_to_add.unwrap_or(1).clamp(1, MAX_TRIP_DAYS)
    }

    pub fn days_to_remove(&self) -> u32 {
        self.days_to_remove.unwrap_or(1).max(1)
    }
}

/// A classified edit request, consumed once by the applicator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModificationIntent {
    #[serde(rename = "type")]
    pub kind: ModificationType,
    #[serde(default)]
    pub params: IntentParams,
    pub confidence: f64,
    pub requires_search: bool,
    pub requires_semantic_reasoning: bool,
    /// Latency hint in milliseconds
    pub estimated_cost_ms: u64,
    #[serde(default)]
    pub description: String,
}

impl ModificationIntent {
    /// Build an intent whose flags and cost come from the type table
    pub fn new(
        kind: ModificationType,
        params: IntentParams,
        confidence: f64,
        description: impl Into<String>,
    ) -> Self {
        let estimated_cost_ms = match kind {
            ModificationType::AddDay => kind.base_cost_ms() * u64::from(params.days_to_add()),
            _ => kind.base_cost_ms(),
        };

        Self {
            kind,
            params,
            confidence: confidence.clamp(0.0, 1.0),
            requires_search: kind.requires_search(),
            requires_semantic_reasoning: kind.requires_semantic_reasoning(),
            estimated_cost_ms,
            description: description.into(),
        }
    }

    pub fn not_modification(confidence: f64, description: impl Into<String>) -> Self {
        Self::new(
            ModificationType::NotModification,
            IntentParams::default(),
            confidence,
            description,
        )
    }

    pub fn is_modification(&self) -> bool {
        self.kind != ModificationType::NotModification
    }
}

fn number_from(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn whole_number(value: &Value) -> Option<i64> {
    number_from(value)
        .filter(|number| number.is_finite())
        .map(|number| number.round() as i64)
}

fn lenient_i32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i32>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(whole_number)
        .and_then(|number| i32::try_from(number).ok()))
}

fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(whole_number)
        .and_then(|number| u32::try_from(number).ok()))
}

fn lenient_usize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<usize>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(whole_number)
        .and_then(|number| usize::try_from(number).ok()))
}

fn lenient_u32s<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u32>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    let items = match value {
        Some(Value::Array(items)) => items,
        Some(single) => vec![single],
        None => Vec::new(),
    };
    Ok(items
        .iter()
        .filter_map(whole_number)
        .filter_map(|number| u32::try_from(number).ok())
        .collect())
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(flag)) => Some(flag),
        Some(Value::String(text)) => text.trim().parse::<bool>().ok(),
        _ => None,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
        _ => None,
    })
}

fn lenient_strings<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    let items = match value {
        Some(Value::Array(items)) => items,
        Some(single) => vec![single],
        None => Vec::new(),
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            _ => None,
        })
        .collect())
}

fn lenient_action<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<TypeFilterAction>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value.as_ref().and_then(Value::as_str) {
        Some(text) => match text.trim().to_lowercase().as_str() {
            "remove" | "exclude" => Some(TypeFilterAction::Remove),
            "only" | "keep" | "keep_only" => Some(TypeFilterAction::Only),
            _ => None,
        },
        None => None,
    })
}
