//! Entities and the names that locate their tables.

use crate::value::{Fields, Value};

/// Canonical entity name: `zone/base/name`.
///
/// The physical table is `base_name` when a base is set, otherwise `name`.
/// The zone is a logical namespace and does not reach the table name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntityName {
    pub zone: Option<String>,
    pub base: Option<String>,
    pub name: String,
}

impl EntityName {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            zone: None,
            base: None,
            name: name.into(),
        }
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    /// Parse `name`, `base/name` or `zone/base/name`. A `-` segment means "unset".
    pub fn parse(canon: &str) -> Self {
        let segment = |s: &str| (!s.is_empty() && s != "-").then(|| s.to_string());
        let parts: Vec<&str> = canon.split('/').collect();
        match parts.as_slice() {
            [name] => Self::new(*name),
            [base, name] => Self {
                zone: None,
                base: segment(*base),
                name: name.to_string(),
            },
            [zone, base, name, ..] => Self {
                zone: segment(*zone),
                base: segment(*base),
                name: name.to_string(),
            },
            [] => Self::default(),
        }
    }

    /// The physical table name (unescaped).
    pub fn table_name(&self) -> String {
        match &self.base {
            Some(base) => format!("{}_{}", base, self.name),
            None => self.name.clone(),
        }
    }
}

/// An in-memory record mapped to one table row.
///
/// Fields that are absent are never written; a field explicitly set to
/// [`Value::Null`] is written as NULL.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Entity {
    name: EntityName,
    fields: Fields,
    new_id: Option<Value>,
}

impl Entity {
    pub fn new(name: EntityName) -> Self {
        Self {
            name,
            fields: Fields::new(),
            new_id: None,
        }
    }

    /// Build an entity from already-populated fields.
    pub fn from_fields(name: EntityName, fields: Fields) -> Self {
        Self {
            name,
            fields,
            new_id: None,
        }
    }

    /// Build an entity from a JSON object; non-object input yields no fields.
    pub fn from_json(name: EntityName, data: serde_json::Value) -> Self {
        let fields = match data {
            serde_json::Value::Object(map) => {
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect()
            }
            _ => Fields::new(),
        };
        Self::from_fields(name, fields)
    }

    /// Set a field (chainable).
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Request a specific id for a new entity instead of a generated one.
    pub fn with_new_id(mut self, id: impl Into<Value>) -> Self {
        self.new_id = Some(id.into());
        self
    }

    pub fn new_id(&self) -> Option<&Value> {
        self.new_id.as_ref()
    }

    pub fn name(&self) -> &EntityName {
        &self.name
    }

    pub fn table_name(&self) -> String {
        self.name.table_name()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// The entity id, when set and not null.
    pub fn id(&self) -> Option<&Value> {
        self.fields.get("id").filter(|v| !v.is_null())
    }

    /// Declared field names, in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn into_fields(self) -> Fields {
        self.fields
    }

    /// Render all fields as a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn table_name_joins_base_and_name() {
        assert_eq!(EntityName::new("foo").table_name(), "foo");
        assert_eq!(EntityName::new("foo").with_base("moon").table_name(), "moon_foo");
        assert_eq!(
            EntityName::new("foo").with_base("moon").with_zone("z").table_name(),
            "moon_foo"
        );
    }

    #[test]
    fn parses_canonical_names() {
        assert_eq!(EntityName::parse("foo").table_name(), "foo");
        assert_eq!(EntityName::parse("moon/bar").table_name(), "moon_bar");
        assert_eq!(EntityName::parse("-/-/bar").table_name(), "bar");
        let n = EntityName::parse("z/b/n");
        assert_eq!(n.zone.as_deref(), Some("z"));
        assert_eq!(n.base.as_deref(), Some("b"));
    }

    #[test]
    fn null_id_is_no_id() {
        let e = Entity::new(EntityName::new("foo")).set("id", Value::Null);
        assert!(e.id().is_none());
        let e = e.set("id", "abc");
        assert_eq!(e.id(), Some(&Value::Text("abc".into())));
    }

    #[test]
    fn from_json_keeps_structure() {
        let e = Entity::from_json(
            EntityName::new("foo"),
            json!({"name": "pear", "meta": {"a": 1}, "price": 200}),
        );
        assert_eq!(e.get("price"), Some(&Value::Int(200)));
        assert!(e.get("meta").unwrap().is_structured());
        assert_eq!(e.to_json()["meta"], json!({"a": 1}));
    }
}
