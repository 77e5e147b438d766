//! Per-invocation collector configuration.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Option name to value mapping supplied by the caller for one collector run.
///
/// Values keep whatever shape the caller gave them (TOML table, JSON object,
/// `key=value` pairs); the typed accessors do the coercion each collector
/// needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectorConfig {
    values: Map<String, Value>,
}

impl CollectorConfig {
    /// Create an empty configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Raw value for `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Whether `key` is present and truthy
    #[must_use]
    pub fn is_truthy(&self, key: &str) -> bool {
        self.values.get(key).is_some_and(is_truthy)
    }

    /// Non-empty string value for `key`
    #[must_use]
    pub fn str(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    /// Scalar value for `key` as a string (numbers and booleans are
    /// stringified), or `default`
    #[must_use]
    pub fn string_or(&self, key: &str, default: &str) -> String {
        self.values
            .get(key)
            .and_then(scalar_to_string)
            .unwrap_or_else(|| default.to_string())
    }

    /// List value for `key`; a scalar is treated as a one-element list
    #[must_use]
    pub fn string_list(&self, key: &str) -> Vec<String> {
        match self.values.get(key) {
            Some(Value::Array(items)) => items.iter().filter_map(scalar_to_string).collect(),
            Some(other) => scalar_to_string(other).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Boolean value for `key`; accepts `true`/`false`, `yes`/`no`, `1`/`0`
    #[must_use]
    pub fn bool(&self, key: &str) -> Option<bool> {
        match self.values.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_u64().map(|n| n != 0),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(true),
                "false" | "no" | "off" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Unsigned integer value for `key`; numeric strings are accepted
    #[must_use]
    pub fn u64(&self, key: &str) -> Option<u64> {
        match self.values.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Caller-supplied `environment` classification
    #[must_use]
    pub fn environment(&self) -> Option<&str> {
        self.str("environment")
    }

    /// Caller-supplied `group` classification
    #[must_use]
    pub fn group(&self) -> Option<&str> {
        self.str("group")
    }

    /// Caller-supplied free-form `tags` table
    #[must_use]
    pub fn tags(&self) -> BTreeMap<String, Value> {
        match self.values.get("tags") {
            Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            _ => BTreeMap::new(),
        }
    }

    /// Return a copy of `self` with every key of `defaults` that `self` lacks
    #[must_use]
    pub fn merged_over(&self, defaults: &Self) -> Self {
        let mut merged = defaults.clone();
        for (key, value) in &self.values {
            merged.values.insert(key.clone(), value.clone());
        }
        merged
    }

    /// Option names in key order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl From<Map<String, Value>> for CollectorConfig {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for CollectorConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Truthiness used for required parameters.
///
/// `null`, `false`, `0`, blank strings, empty arrays and empty tables are falsy.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
