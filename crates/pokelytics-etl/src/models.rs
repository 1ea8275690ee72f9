//! Record types flowing through the pipeline

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A creature as extracted from the API, before validation.
///
/// Produced by the remote client and consumed once by the shaper. Its JSON
/// form (see [`RawRecord::to_value`]) is what the shaper validates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawRecord {
    pub id: i64,
    pub name: String,
    pub types: Vec<String>,
    pub abilities: Vec<String>,
    pub moves: Vec<String>,
    /// Stat name to base value, e.g. "hp" -> 45
    pub stats: BTreeMap<String, i64>,
    /// Evolution lineage names in pre-order, root first
    pub lineage: Vec<String>,
    pub is_evolved: bool,
}

impl RawRecord {
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "name": self.name,
            "types": self.types,
            "abilities": self.abilities,
            "moves": self.moves,
            "stats": self.stats,
            "lineage": self.lineage,
            "is_evolved": self.is_evolved,
        })
    }
}

/// The entity row: `(id, name, is_evolved)`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MainRecord {
    pub id: i64,
    pub name: String,
    pub is_evolved: bool,
}

/// One `(stat_name, base_value)` pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatValue {
    pub stat_name: String,
    pub base_value: i64,
}

/// A lineage entry with its 1-based stage number
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineageStage {
    pub name: String,
    pub stage: u32,
}

/// Validated, storage-ready form of a fetched creature.
///
/// `lineage` is never empty for a record produced by the shaper.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShapedRecord {
    pub main: MainRecord,
    pub types: Vec<String>,
    pub abilities: Vec<String>,
    pub moves: Vec<String>,
    pub stats: Vec<StatValue>,
    pub lineage_id: String,
    pub lineage: Vec<LineageStage>,
}

impl ShapedRecord {
    pub fn id(&self) -> i64 {
        self.main.id
    }

    pub fn name(&self) -> &str {
        &self.main.name
    }
}
