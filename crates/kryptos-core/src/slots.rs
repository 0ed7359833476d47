//! Slot resolution
//!
//! Turns the named parameters of a planned or routed operation into concrete
//! values. Priority per slot: special variables, then classifier entities at
//! or above the confidence threshold, then analyzer signals, then the raw
//! utterance. Resolution never fails; the worst case is the raw text.

use crate::model::Entity;
use crate::signals::SignalMap;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Slot template: slot name mapped to an ordered list of candidate names.
/// An empty list means "try the slot's own name".
pub type SlotTemplate = BTreeMap<String, Vec<String>>;

/// Per-request inputs available to slot resolution
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    /// Raw utterance exactly as received
    pub text: &'a str,
    /// Classifier entities for this request
    pub entities: &'a [Entity],
    /// Strongest analyzer signal per kind
    pub signals: &'a SignalMap,
    /// Caller-owned conversation state
    pub state: &'a Map<String, Value>,
    /// Minimum confidence for an entity to participate
    pub entity_threshold: f64,
}

/// Resolve every slot in a route template.
#[must_use]
pub fn resolve_template(template: &SlotTemplate, ctx: &ResolveContext<'_>) -> Map<String, Value> {
    let mut params = Map::new();
    for (slot, candidates) in template {
        let value = if candidates.is_empty() {
            resolve_slot(std::slice::from_ref(slot), ctx)
        } else {
            resolve_slot(candidates, ctx)
        };
        params.insert(slot.clone(), Value::String(value));
    }
    params
}

/// Resolve planner-provided step params.
///
/// A string equal to a special variable is substituted, an empty string is
/// resolved by its own key, and every other value the planner chose is kept
/// untouched.
#[must_use]
pub fn resolve_params(params: &Map<String, Value>, ctx: &ResolveContext<'_>) -> Map<String, Value> {
    let mut resolved = Map::new();
    for (key, value) in params {
        let value = match value {
            Value::String(s) => match special_var(s.trim(), ctx) {
                Some(substituted) => Value::String(substituted),
                None if s.trim().is_empty() => {
                    Value::String(resolve_slot(std::slice::from_ref(key), ctx))
                }
                None => value.clone(),
            },
            other => other.clone(),
        };
        resolved.insert(key.clone(), value);
    }
    resolved
}

fn resolve_slot(candidates: &[String], ctx: &ResolveContext<'_>) -> String {
    for candidate in candidates {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            continue;
        }
        if let Some(value) = special_var(candidate, ctx) {
            return value;
        }
        if candidate.starts_with('$') {
            // Unrecognized variable, try the next candidate.
            continue;
        }
        let wanted = candidate.to_lowercase();
        if let Some(value) = entity_value(&wanted, ctx) {
            return value;
        }
        if let Some(value) = ctx.signals.get(&wanted) {
            return value.clone();
        }
    }
    ctx.text.to_string()
}

// `$text` and `$state:key` resolve here and terminate the candidate walk,
// even to an empty string. A missing state key is an empty string, not an
// error.
fn special_var(candidate: &str, ctx: &ResolveContext<'_>) -> Option<String> {
    let lowered = candidate.to_lowercase();
    if lowered == "$text" {
        return Some(ctx.text.to_string());
    }
    if let Some(rest) = lowered.strip_prefix("$state:") {
        if rest.trim().is_empty() {
            return None;
        }
        // Key lookup keeps the caller's original casing.
        let key = candidate["$state:".len()..].trim();
        return Some(ctx.state.get(key).map(state_string).unwrap_or_default());
    }
    None
}

fn state_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// Highest confidence wins; the first entity seen keeps ties. Empty values
// never match.
fn entity_value(kind: &str, ctx: &ResolveContext<'_>) -> Option<String> {
    let mut best: Option<&Entity> = None;
    for entity in ctx.entities {
        if entity.confidence < ctx.entity_threshold || !entity.kind.eq_ignore_ascii_case(kind) {
            continue;
        }
        if best.is_none_or(|b| entity.confidence > b.confidence) {
            best = Some(entity);
        }
    }
    best.map(|e| e.value.clone()).filter(|v| !v.is_empty())
}
