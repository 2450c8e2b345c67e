//! Flat last-write-wins records (config and access domains).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field carrying the record's logical write time (epoch millis).
pub const LAST_UPDATE_TIME_FIELD: &str = "lastUpdateTime";

/// A JSON object record whose conflicts resolve by `lastUpdateTime`.
///
/// The record is kept schemaless: config and access stores grow fields
/// across app versions, and backfill has to carry fields this build does
/// not know about.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LwwRecord(Map<String, Value>);

impl LwwRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing JSON object.
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Logical write time, 0 when absent or not a number.
    pub fn last_update_time(&self) -> i64 {
        match self.0.get(LAST_UPDATE_TIME_FIELD) {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or_default(),
            _ => 0,
        }
    }

    /// Overwrite the logical write time.
    pub fn set_last_update_time(&mut self, millis: i64) {
        self.0
            .insert(LAST_UPDATE_TIME_FIELD.to_string(), Value::from(millis));
    }

    /// Set a field (builder style).
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Read a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Borrow the underlying object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Mutably borrow the underlying object.
    pub fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    /// Unwrap into the underlying object.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}
