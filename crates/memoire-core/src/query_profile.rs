//! QueryProfile — the structured plan an LLM hands the Retriever:
//! per-signal weights, filters, and a retrieval strategy. Generation (the
//! actual LLM call) lives outside this crate; this module only defines the
//! shape and its duck-typed deserialization.

use std::collections::HashMap;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const REQUIRED_WEIGHT_KEYS: &[&str] = &["tags_roget", "emotion", "timestamp", "personnes", "resume_texte"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryProfile {
    pub intent: String,
    pub confidence: f64,
    pub weights: HashMap<String, f64>,
    pub filters: QueryFilters,
    pub strategy: QueryStrategy,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryFilters {
    #[serde(default)]
    pub date_range_days: Option<i64>,
    #[serde(default)]
    pub personnes: Vec<String>,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryStrategy {
    pub top_k: usize,
    pub include_text_fallback: bool,
}

impl Default for QueryStrategy {
    fn default() -> Self {
        Self {
            top_k: 5,
            include_text_fallback: true,
        }
    }
}

impl Default for QueryProfile {
    fn default() -> Self {
        let mut weights = HashMap::new();
        for key in REQUIRED_WEIGHT_KEYS {
            weights.insert(key.to_string(), 1.0);
        }
        Self {
            intent: String::new(),
            confidence: 0.5,
            weights,
            filters: QueryFilters::default(),
            strategy: QueryStrategy::default(),
        }
    }
}

/// A fully-typed `QueryProfile` JSON shape, used by the first deserialization
/// attempt before falling back to the duck-typed map reader.
#[derive(Debug, Deserialize)]
struct TypedShape {
    #[serde(default)]
    intent: String,
    #[serde(default = "default_confidence")]
    confidence: f64,
    #[serde(default)]
    weights: HashMap<String, f64>,
    #[serde(default)]
    filters: QueryFilters,
    #[serde(default)]
    strategy: Option<QueryStrategy>,
}

fn default_confidence() -> f64 {
    0.5
}

/// Accepts both the structured `QueryProfile` shape and a bare JSON object
/// carrying the same keys at the top level (the original's duck-typed LLM
/// output, which doesn't reliably nest `filters`/`strategy`). Missing keys
/// fall back to [`QueryProfile::default`]'s values.
impl<'de> Deserialize<'de> for QueryProfile {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;

        if let Ok(typed) = serde_json::from_value::<TypedShape>(value.clone()) {
            if !typed.weights.is_empty() || typed.strategy.is_some() {
                let mut profile = QueryProfile::default();
                profile.intent = typed.intent;
                profile.confidence = typed.confidence;
                if !typed.weights.is_empty() {
                    profile.weights = typed.weights;
                }
                profile.filters = typed.filters;
                if let Some(strategy) = typed.strategy {
                    profile.strategy = strategy;
                }
                return Ok(profile);
            }
        }

        let Value::Object(map) = value else {
            return Err(DeError::custom("QueryProfile must be a JSON object"));
        };
        Ok(from_bare_map(&map))
    }
}

fn from_bare_map(map: &Map<String, Value>) -> QueryProfile {
    let mut profile = QueryProfile::default();

    if let Some(Value::String(intent)) = map.get("intent") {
        profile.intent = intent.clone();
    }
    if let Some(confidence) = map.get("confidence").and_then(Value::as_f64) {
        profile.confidence = confidence;
    }
    for key in REQUIRED_WEIGHT_KEYS {
        if let Some(w) = map.get(*key).and_then(Value::as_f64) {
            profile.weights.insert(key.to_string(), w);
        }
    }
    if let Some(weights_obj) = map.get("weights").and_then(Value::as_object) {
        for (k, v) in weights_obj {
            if let Some(w) = v.as_f64() {
                profile.weights.insert(k.clone(), w);
            }
        }
    }
    if let Some(personnes) = map.get("personnes").and_then(Value::as_array) {
        profile.filters.personnes = personnes.iter().filter_map(|v| v.as_str().map(str::to_string)).collect();
    }
    if let Some(days) = map.get("date_range_days").and_then(Value::as_i64) {
        profile.filters.date_range_days = Some(days);
    }
    if let Some(top_k) = map.get("top_k").and_then(Value::as_u64) {
        profile.strategy.top_k = top_k as usize;
    }
    if let Some(fallback) = map.get("include_text_fallback").and_then(Value::as_bool) {
        profile.strategy.include_text_fallback = fallback;
    }

    profile
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_all_required_weight_keys() {
        let profile = QueryProfile::default();
        for key in REQUIRED_WEIGHT_KEYS {
            assert!(profile.weights.contains_key(*key));
        }
    }

    #[test]
    fn deserializes_structured_shape() {
        let raw = r#"{
            "intent": "recall_person",
            "confidence": 0.8,
            "weights": {"tags_roget": 0.5, "emotion": 0.2, "timestamp": 0.1, "personnes": 0.8, "resume_texte": 0.3},
            "filters": {"personnes": ["Marie"]},
            "strategy": {"top_k": 10, "include_text_fallback": false}
        }"#;
        let profile: QueryProfile = serde_json::from_str(raw).unwrap();
        assert_eq!(profile.intent, "recall_person");
        assert_eq!(profile.strategy.top_k, 10);
        assert_eq!(profile.filters.personnes, vec!["Marie".to_string()]);
    }

    #[test]
    fn deserializes_bare_map_shape() {
        let raw = r#"{"intent": "recall_person", "personnes": ["Marie"], "top_k": 7}"#;
        let profile: QueryProfile = serde_json::from_str(raw).unwrap();
        assert_eq!(profile.intent, "recall_person");
        assert_eq!(profile.filters.personnes, vec!["Marie".to_string()]);
        assert_eq!(profile.strategy.top_k, 7);
        assert!(profile.weights.contains_key("emotion"));
    }
}
