//! Record shaping (transform stage)
//!
//! Validates a raw record's JSON form and normalizes it into a
//! [`ShapedRecord`]. The rules are lenient where upstream data is known to
//! wobble (scalar instead of list, non-numeric stats) and strict where the
//! store needs guarantees (identity fields, stat mapping, lineage).

use serde_json::{Map, Value};
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::{EtlError, Result};
use crate::models::{LineageStage, MainRecord, RawRecord, ShapedRecord, StatValue};

/// Shape an extracted record.
pub fn shape_record(raw: &RawRecord) -> Result<ShapedRecord> {
    shape(&raw.to_value())
}

/// Shape a raw record given as JSON.
///
/// Any failure, including a panic inside the rules, is reported as
/// [`EtlError::Invalid`].
pub fn shape(raw: &Value) -> Result<ShapedRecord> {
    catch_unwind(AssertUnwindSafe(|| shape_value(raw)))
        .unwrap_or_else(|_| Err(EtlError::invalid("internal error while shaping record")))
}

fn shape_value(raw: &Value) -> Result<ShapedRecord> {
    let record = raw
        .as_object()
        .filter(|record| !record.is_empty())
        .ok_or_else(|| EtlError::invalid("record must be a non-empty object"))?;

    let main = main_record(record)?;

    let types = name_list(record.get("types"));
    let abilities = name_list(record.get("abilities"));
    let moves = name_list(record.get("moves"));

    let stats = match record.get("stats") {
        Some(Value::Object(stats)) => numeric_stats(stats),
        _ => return Err(EtlError::invalid("stats must be a mapping")),
    };

    let entries = match record.get("lineage") {
        Some(Value::Array(entries)) if !entries.is_empty() => entries,
        _ => return Err(EtlError::invalid("lineage must be a non-empty list")),
    };
    let lineage = lineage_stages(entries);
    // A non-string first entry falls back to the first named stage
    let lineage_id = match (entries.first(), lineage.first()) {
        (Some(Value::String(first)), _) => first.clone(),
        (_, Some(stage)) => stage.name.clone(),
        (_, None) => return Err(EtlError::invalid("lineage has no named entries")),
    };

    Ok(ShapedRecord {
        main,
        types,
        abilities,
        moves,
        stats,
        lineage_id,
        lineage,
    })
}

fn main_record(record: &Map<String, Value>) -> Result<MainRecord> {
    let id = record
        .get("id")
        .ok_or_else(|| EtlError::invalid("missing id"))?
        .as_i64()
        .ok_or_else(|| EtlError::invalid("id must be an integer"))?;

    let name = record
        .get("name")
        .ok_or_else(|| EtlError::invalid("missing name"))?
        .as_str()
        .ok_or_else(|| EtlError::invalid("name must be a string"))?
        .to_string();

    let is_evolved = record
        .get("is_evolved")
        .map(truthy)
        .ok_or_else(|| EtlError::invalid("missing is_evolved"))?;

    Ok(MainRecord {
        id,
        name,
        is_evolved,
    })
}

/// Coerce any JSON value to a strict boolean.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Normalize a list-valued field into distinct names, keeping first-seen order.
///
/// A truthy scalar becomes a one-element list; a falsy or missing value
/// becomes empty. Numbers and booleans are kept in their JSON text form;
/// null and nested containers are dropped.
fn name_list(value: Option<&Value>) -> Vec<String> {
    let names: Vec<String> = match value {
        Some(Value::Array(items)) => items.iter().filter_map(name_of).collect(),
        Some(single) if truthy(single) => name_of(single).into_iter().collect(),
        _ => Vec::new(),
    };

    let mut seen = HashSet::new();
    names
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

fn name_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Keep numeric stat entries, truncating floats toward zero.
fn numeric_stats(stats: &Map<String, Value>) -> Vec<StatValue> {
    stats
        .iter()
        .filter_map(|(name, value)| {
            let base_value = match value {
                Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64))?,
                _ => return None,
            };
            Some(StatValue {
                stat_name: name.clone(),
                base_value,
            })
        })
        .collect()
}

/// Stage numbers follow the entry's position (1-based), so skipped
/// non-string entries leave gaps.
fn lineage_stages(entries: &[Value]) -> Vec<LineageStage> {
    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            entry.as_str().map(|name| LineageStage {
                name: name.to_string(),
                stage: index as u32 + 1,
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> Value {
        json!({
            "id": 1,
            "name": "bulbasaur",
            "is_evolved": false,
            "types": ["grass", "poison"],
            "abilities": ["overgrow", "chlorophyll"],
            "moves": ["tackle", "vine-whip"],
            "stats": {
                "hp": 45, "attack": 49, "defense": 49,
                "special-attack": 65, "special-defense": 65, "speed": 45
            },
            "lineage": ["bulbasaur", "ivysaur", "venusaur"]
        })
    }

    fn with(key: &str, value: Value) -> Value {
        let mut record = valid();
        record[key] = value;
        record
    }

    fn without(key: &str) -> Value {
        let mut record = valid();
        record.as_object_mut().unwrap().remove(key);
        record
    }

    #[test]
    fn test_successful_shape() {
        let shaped = shape(&valid()).unwrap();

        assert_eq!(
            shaped.main,
            MainRecord {
                id: 1,
                name: "bulbasaur".to_string(),
                is_evolved: false
            }
        );
        assert_eq!(shaped.types, vec!["grass", "poison"]);
        assert_eq!(shaped.abilities, vec!["overgrow", "chlorophyll"]);
        assert_eq!(shaped.moves, vec!["tackle", "vine-whip"]);
        assert_eq!(shaped.stats.len(), 6);
        let hp = shaped.stats.iter().find(|s| s.stat_name == "hp").unwrap();
        assert_eq!(hp.base_value, 45);
        assert_eq!(shaped.lineage_id, "bulbasaur");
        assert_eq!(shaped.lineage.len(), 3);
        assert_eq!(
            shaped.lineage[2],
            LineageStage {
                name: "venusaur".to_string(),
                stage: 3
            }
        );
    }

    #[test]
    fn test_non_object_input_is_invalid() {
        assert!(shape(&Value::Null).is_err());
        assert!(shape(&json!({})).is_err());
        assert!(shape(&json!("not a record")).is_err());
        assert!(shape(&json!([1, 2, 3])).is_err());
    }

    #[test]
    fn test_missing_identity_fields_are_invalid() {
        for key in ["id", "name", "is_evolved"] {
            let err = shape(&without(key)).unwrap_err();
            assert!(matches!(err, EtlError::Invalid(_)), "{} should be required", key);
        }
        assert!(shape(&with("id", json!("one"))).is_err());
        assert!(shape(&with("name", json!(7))).is_err());
    }

    #[test]
    fn test_is_evolved_coerced_to_bool() {
        assert!(shape(&with("is_evolved", json!(1))).unwrap().main.is_evolved);
        assert!(!shape(&with("is_evolved", json!(0))).unwrap().main.is_evolved);
        assert!(!shape(&with("is_evolved", json!([]))).unwrap().main.is_evolved);
        assert!(!shape(&with("is_evolved", Value::Null)).unwrap().main.is_evolved);
        assert!(shape(&with("is_evolved", json!("yes"))).unwrap().main.is_evolved);
    }

    #[test]
    fn test_scalar_lists_are_wrapped() {
        let mut record = valid();
        record["types"] = json!("grass");
        record["abilities"] = json!("overgrow");
        record["moves"] = json!("tackle");

        let shaped = shape(&record).unwrap();
        assert_eq!(shaped.types, vec!["grass"]);
        assert_eq!(shaped.abilities, vec!["overgrow"]);
        assert_eq!(shaped.moves, vec!["tackle"]);
    }

    #[test]
    fn test_missing_or_falsy_lists_become_empty() {
        let mut record = without("types");
        record["abilities"] = json!("");
        record["moves"] = Value::Null;

        let shaped = shape(&record).unwrap();
        assert!(shaped.types.is_empty());
        assert!(shaped.abilities.is_empty());
        assert!(shaped.moves.is_empty());
    }

    #[test]
    fn test_numeric_scalar_is_wrapped() {
        let shaped = shape(&with("types", json!(5))).unwrap();
        assert_eq!(shaped.types, vec!["5"]);

        let shaped = shape(&with("moves", json!(0))).unwrap();
        assert!(shaped.moves.is_empty());
    }

    #[test]
    fn test_mixed_list_items_are_kept() {
        let shaped = shape(&with("abilities", json!(["a", 3, 2.5, true, null, ["x"]]))).unwrap();
        assert_eq!(shaped.abilities, vec!["a", "3", "2.5", "true"]);
    }

    #[test]
    fn test_duplicate_names_are_removed() {
        let shaped = shape(&with("moves", json!(["tackle", "growl", "tackle"]))).unwrap();
        assert_eq!(shaped.moves, vec!["tackle", "growl"]);
    }

    #[test]
    fn test_stats_must_be_mapping() {
        assert!(shape(&with("stats", json!([45, 49]))).is_err());
        assert!(shape(&with("stats", json!("hp"))).is_err());
        assert!(shape(&without("stats")).is_err());
    }

    #[test]
    fn test_non_numeric_stats_dropped_and_floats_truncated() {
        let record = with(
            "stats",
            json!({ "hp": 45.0, "attack": "high", "defense": null, "speed": 45.9, "luck": true }),
        );
        let shaped = shape(&record).unwrap();

        let mut stats: Vec<(String, i64)> = shaped
            .stats
            .into_iter()
            .map(|s| (s.stat_name, s.base_value))
            .collect();
        stats.sort();
        assert_eq!(stats, vec![("hp".to_string(), 45), ("speed".to_string(), 45)]);
    }

    #[test]
    fn test_empty_stats_are_allowed() {
        let shaped = shape(&with("stats", json!({}))).unwrap();
        assert!(shaped.stats.is_empty());
    }

    #[test]
    fn test_lineage_rules() {
        assert!(shape(&without("lineage")).is_err());
        assert!(shape(&with("lineage", json!([]))).is_err());
        assert!(shape(&with("lineage", json!("bulbasaur"))).is_err());
        assert!(shape(&with("lineage", json!([1, 2, null]))).is_err());
    }

    #[test]
    fn test_lineage_skips_non_strings_keeping_positions() {
        let shaped = shape(&with("lineage", json!([1, "ivysaur", null, "venusaur"]))).unwrap();

        assert_eq!(
            shaped.lineage,
            vec![
                LineageStage {
                    name: "ivysaur".to_string(),
                    stage: 2
                },
                LineageStage {
                    name: "venusaur".to_string(),
                    stage: 4
                },
            ]
        );
        assert_eq!(shaped.lineage_id, "ivysaur");
    }

    #[test]
    fn test_shape_record_round_trip_from_raw() {
        let raw = RawRecord {
            id: 4,
            name: "charmander".to_string(),
            types: vec!["fire".to_string()],
            abilities: vec!["blaze".to_string()],
            moves: vec![],
            stats: [("hp".to_string(), 39)].into_iter().collect(),
            lineage: vec!["charmander".to_string(), "charmeleon".to_string()],
            is_evolved: false,
        };

        let shaped = shape_record(&raw).unwrap();
        assert_eq!(shaped.id(), 4);
        assert_eq!(shaped.name(), "charmander");
        assert_eq!(shaped.lineage_id, "charmander");
        assert_eq!(shaped.stats, vec![StatValue { stat_name: "hp".to_string(), base_value: 39 }]);
    }
}
