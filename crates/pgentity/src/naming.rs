//! Field name <-> column name mapping.

use heck::{ToLowerCamelCase, ToSnakeCase};
use serde::Deserialize;
use std::fmt::Debug;
use std::sync::Arc;

/// Maps logical entity field names to physical column names and back.
///
/// `from_column(to_column(f)) == f` must hold for every field name a caller
/// relies on. Mappers are not required to be injective for arbitrary input.
pub trait ColumnMapper: Debug + Send + Sync {
    fn to_column(&self, field: &str) -> String;
    fn from_column(&self, column: &str) -> String;
}

/// Column names equal field names.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityMapper;

impl ColumnMapper for IdentityMapper {
    fn to_column(&self, field: &str) -> String {
        field.to_string()
    }

    fn from_column(&self, column: &str) -> String {
        column.to_string()
    }
}

/// `camelCase` fields stored in `snake_case` columns.
///
/// Names that already contain underscores (`user_id`) come back as
/// `userId`, so the round trip only holds for camelCase field names.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnakeCaseMapper;

impl ColumnMapper for SnakeCaseMapper {
    fn to_column(&self, field: &str) -> String {
        field.to_snake_case()
    }

    fn from_column(&self, column: &str) -> String {
        column.to_lower_camel_case()
    }
}

/// Named mapper selection, as written in configuration files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnNaming {
    #[default]
    Identity,
    SnakeCase,
}

impl ColumnNaming {
    pub fn mapper(self) -> Arc<dyn ColumnMapper> {
        match self {
            ColumnNaming::Identity => Arc::new(IdentityMapper),
            ColumnNaming::SnakeCase => Arc::new(SnakeCaseMapper),
        }
    }
}
