//! Entity <-> row conversion.
//!
//! Structured fields (objects and arrays) are stored as JSON text unless the
//! store runs with native JSON columns. A small JSON object in the type-hint
//! column records which fields need decoding on the way back:
//!
//! | hint | field was            |
//! |------|----------------------|
//! | `o`  | a JSON object        |
//! | `a`  | a JSON array         |
//! | `d`  | a timestamp          |

use crate::entity::{Entity, EntityName};
use crate::error::{StoreError, StoreResult};
use crate::naming::ColumnMapper;
use crate::value::{Fields, Value};
use chrono::{DateTime, Utc};
use serde_json::error::Category;
use serde_json::{Map, Value as Json};

/// Default name of the type-hint column.
pub const DEFAULT_TYPE_HINT_COLUMN: &str = "type_hints";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeHint {
    Object,
    Array,
    Date,
}

impl TypeHint {
    fn code(self) -> &'static str {
        match self {
            TypeHint::Object => "o",
            TypeHint::Array => "a",
            TypeHint::Date => "d",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code {
            "o" => Some(TypeHint::Object),
            "a" => Some(TypeHint::Array),
            "d" => Some(TypeHint::Date),
            _ => None,
        }
    }

    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Json(Json::Object(_)) => Some(TypeHint::Object),
            Value::Json(Json::Array(_)) => Some(TypeHint::Array),
            Value::Timestamp(_) => Some(TypeHint::Date),
            _ => None,
        }
    }
}

/// Converts entities to rows and back.
#[derive(Debug, Clone)]
pub struct Codec {
    /// Structured values are bound as JSON documents and no hints are kept.
    pub json_native: bool,
    /// Logical name of the type-hint column.
    pub hint_column: String,
}

impl Default for Codec {
    fn default() -> Self {
        Self {
            json_native: false,
            hint_column: DEFAULT_TYPE_HINT_COLUMN.to_string(),
        }
    }
}

impl Codec {
    pub fn new(json_native: bool, hint_column: impl Into<String>) -> Self {
        Self {
            json_native,
            hint_column: hint_column.into(),
        }
    }

    /// Fields to write for `entity`, keyed by field name.
    ///
    /// Field names containing `$` are control keys and never written. The
    /// hint column is only added when at least one field needs a hint.
    pub fn entity_to_row(&self, entity: &Entity) -> StoreResult<Fields> {
        let mut row = Fields::new();
        let mut hints = Map::new();

        for (field, value) in entity.fields() {
            if field.contains('$') || *field == self.hint_column {
                continue;
            }

            if self.json_native {
                row.insert(field.clone(), value.clone());
                continue;
            }

            if let Some(hint) = TypeHint::of(value) {
                hints.insert(field.clone(), Json::String(hint.code().to_string()));
            }

            let stored = match value {
                Value::Json(doc) if value.is_structured() => {
                    Value::Text(serde_json::to_string(doc)?)
                }
                other => other.clone(),
            };
            row.insert(field.clone(), stored);
        }

        if !hints.is_empty() {
            row.insert(
                self.hint_column.clone(),
                Value::Text(serde_json::to_string(&Json::Object(hints))?),
            );
        }

        Ok(row)
    }

    /// Build an entity from a decoded row keyed by column name.
    pub fn row_to_entity(
        &self,
        name: &EntityName,
        row: Fields,
        mapper: &dyn ColumnMapper,
    ) -> StoreResult<Entity> {
        let hint_column = mapper.to_column(&self.hint_column);
        let hints = match row.get(&hint_column) {
            Some(raw) => parse_hints(&hint_column, raw)?,
            None => Map::new(),
        };

        let mut fields = Fields::new();
        for (column, value) in row {
            if column == hint_column {
                continue;
            }
            let field = mapper.from_column(&column);
            let hint = hints
                .get(&field)
                .and_then(Json::as_str)
                .and_then(TypeHint::from_code);
            let value = decode_field(&column, value, hint)?;
            fields.insert(field, value);
        }

        Ok(Entity::from_fields(name.clone(), fields))
    }
}

fn parse_hints(column: &str, raw: &Value) -> StoreResult<Map<String, Json>> {
    match raw {
        Value::Null => Ok(Map::new()),
        Value::Json(Json::Object(map)) => Ok(map.clone()),
        Value::Text(s) => match serde_json::from_str::<Json>(s) {
            Ok(Json::Object(map)) => Ok(map),
            Ok(other) => Err(StoreError::decode(
                column,
                format!("type hints must be an object, got {other}"),
            )),
            Err(e) => Err(StoreError::decode(column, e.to_string())),
        },
        other => Err(StoreError::decode(
            column,
            format!("unexpected type hint value {other:?}"),
        )),
    }
}

/// Decode one stored field.
///
/// A hint that no longer matches the stored text (the field was merge-saved
/// with a different shape) is ignored and the text is decoded as untagged.
fn decode_field(column: &str, value: Value, hint: Option<TypeHint>) -> StoreResult<Value> {
    let Value::Text(s) = value else {
        return Ok(value);
    };
    match hint {
        Some(TypeHint::Object | TypeHint::Array) => match serde_json::from_str::<Json>(&s) {
            Ok(doc) => Ok(Value::Json(doc)),
            Err(_) => {
                tracing::debug!(target: "pgentity.store", column, "stale type hint ignored");
                untagged(s)
            }
        },
        Some(TypeHint::Date) => match DateTime::parse_from_rfc3339(&s) {
            Ok(t) => Ok(Value::Timestamp(t.with_timezone(&Utc))),
            Err(_) => {
                tracing::debug!(target: "pgentity.store", column, "stale type hint ignored");
                untagged(s)
            }
        },
        None => untagged(s),
    }
}

fn untagged(s: String) -> StoreResult<Value> {
    if looks_like_json(&s) {
        best_effort_json(s)
    } else {
        Ok(Value::Text(s))
    }
}

fn looks_like_json(s: &str) -> bool {
    matches!(s.trim_start().chars().next(), Some('{' | '['))
}

/// Parse text that looks like a JSON container; keep it as text if it is not
/// valid JSON.
fn best_effort_json(s: String) -> StoreResult<Value> {
    match serde_json::from_str::<Json>(&s) {
        Ok(doc) => Ok(Value::Json(doc)),
        Err(e) if matches!(e.classify(), Category::Syntax | Category::Eof) => Ok(Value::Text(s)),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::{IdentityMapper, SnakeCaseMapper};
    use chrono::TimeZone;
    use serde_json::json;

    fn name() -> EntityName {
        EntityName::new("foo")
    }

    #[test]
    fn structured_fields_round_trip_through_text() {
        let codec = Codec::default();
        let entity = Entity::from_json(name(), json!({"a": 1, "b": [1, 2, 3], "c": {"x": "y"}}));

        let row = codec.entity_to_row(&entity).unwrap();
        assert_eq!(row.get("b"), Some(&Value::Text("[1,2,3]".into())));
        let hints: Json = serde_json::from_str(row["type_hints"].as_str().unwrap()).unwrap();
        assert_eq!(hints, json!({"b": "a", "c": "o"}));

        let back = codec.row_to_entity(&name(), row, &IdentityMapper).unwrap();
        assert_eq!(back.to_json(), json!({"a": 1, "b": [1, 2, 3], "c": {"x": "y"}}));
        assert!(back.get("type_hints").is_none());
    }

    #[test]
    fn plain_entities_get_no_hint_column() {
        let row = Codec::default()
            .entity_to_row(&Entity::from_json(name(), json!({"a": 1, "s": "x"})))
            .unwrap();
        assert!(!row.contains_key("type_hints"));
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn native_json_keeps_documents() {
        let codec = Codec::new(true, "type_hints");
        let row = codec
            .entity_to_row(&Entity::from_json(name(), json!({"b": [1, 2]})))
            .unwrap();
        assert_eq!(row.get("b"), Some(&Value::Json(json!([1, 2]))));
        assert!(!row.contains_key("type_hints"));
    }

    #[test]
    fn control_fields_are_not_written() {
        let row = Codec::default()
            .entity_to_row(&Entity::from_json(name(), json!({"a": 1, "id$": "x"})))
            .unwrap();
        assert_eq!(row.keys().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn date_hint_restores_timestamps() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let codec = Codec::default();
        let row = codec
            .entity_to_row(&Entity::new(name()).set("at", ts))
            .unwrap();

        // A text column hands the timestamp back as a string.
        let mut stored = row.clone();
        stored.insert("at".into(), Value::Text(ts.to_rfc3339()));
        let back = codec.row_to_entity(&name(), stored, &IdentityMapper).unwrap();
        assert_eq!(back.get("at"), Some(&Value::Timestamp(ts)));
    }

    #[test]
    fn unhinted_text_is_parsed_best_effort() {
        let codec = Codec::default();
        let mut row = Fields::new();
        row.insert("doc".into(), Value::Text(r#"{"k": 1}"#.into()));
        row.insert("broken".into(), Value::Text("{not json".into()));
        row.insert("plain".into(), Value::Text("hello".into()));

        let e = codec.row_to_entity(&name(), row, &IdentityMapper).unwrap();
        assert_eq!(e.get("doc"), Some(&Value::Json(json!({"k": 1}))));
        assert_eq!(e.get("broken"), Some(&Value::Text("{not json".into())));
        assert_eq!(e.get("plain"), Some(&Value::Text("hello".into())));
    }

    #[test]
    fn stale_hints_fall_back_to_untagged_decoding() {
        let mut row = Fields::new();
        row.insert("meta".into(), Value::Text("plain".into()));
        row.insert("b".into(), Value::Text("[1,".into()));
        row.insert("at".into(), Value::Text(r#"{"k": 2}"#.into()));
        row.insert(
            "type_hints".into(),
            Value::Text(r#"{"meta":"o","b":"a","at":"d"}"#.into()),
        );
        let e = Codec::default()
            .row_to_entity(&name(), row, &IdentityMapper)
            .unwrap();
        assert_eq!(e.get("meta"), Some(&Value::Text("plain".into())));
        assert_eq!(e.get("b"), Some(&Value::Text("[1,".into())));
        assert_eq!(e.get("at"), Some(&Value::Json(json!({"k": 2}))));
    }

    #[test]
    fn malformed_hint_column_is_a_decode_error() {
        let mut row = Fields::new();
        row.insert("type_hints".into(), Value::Text("[1]".into()));
        let err = Codec::default()
            .row_to_entity(&name(), row, &IdentityMapper)
            .unwrap_err();
        assert!(matches!(err, StoreError::Decode { ref column, .. } if column == "type_hints"));
    }

    #[test]
    fn columns_are_mapped_back_to_fields() {
        let mut row = Fields::new();
        row.insert("user_name".into(), Value::Text("ann".into()));
        row.insert("type_hints".into(), Value::Null);
        let e = Codec::default()
            .row_to_entity(&name(), row, &SnakeCaseMapper)
            .unwrap();
        assert_eq!(e.get("userName"), Some(&Value::Text("ann".into())));
        assert_eq!(e.fields().len(), 1);
    }
}
