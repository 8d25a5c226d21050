//! Statement builders.
//!
//! Each builder turns a table name plus a [`Query`](crate::Query) or a row of
//! fields into a [`Statement`]: SQL text with placeholders and the values
//! bound to them, in placeholder order.
//!
//! ## Design
//!
//! - Builders are pure functions; nothing here touches a connection.
//! - Identifiers go through the column mapper, then through the dialect's
//!   identifier escaping. Values are always bound.
//! - Placeholders are numbered contiguously from 1 across the whole statement.

pub mod delete;
pub mod insert;
pub mod native;
pub mod select;
pub mod update;

pub use delete::{delete_all, delete_by_ids};
pub use insert::{insert, upsert};
pub use native::native;
pub use select::{select, select_ids, select_one};
pub use update::{fill_missing, table_columns, update, update_merging_hints};


use crate::client::GenericClient;
use crate::compile::Fragment;
use crate::error::StoreResult;
use crate::ident::escape_literal;
use crate::value::Value;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

/// What a statement does; used as a log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Upsert,
    Update,
    Delete,
    Schema,
    Native,
}

/// A compiled statement: text plus bound values.
///
/// The Nth placeholder in `text` refers to `values[N - 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub text: String,
    pub values: Vec<Value>,
}

impl Statement {
    pub(crate) fn from_fragment(kind: StatementKind, frag: Fragment) -> Self {
        Self {
            kind,
            text: frag.text,
            values: frag.values,
        }
    }

    /// Get parameters as references compatible with tokio-postgres.
    pub fn params_ref(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.values
            .iter()
            .map(|v| v as &(dyn ToSql + Sync))
            .collect()
    }

    /// Execute and return all rows.
    pub async fn fetch_all(&self, conn: &impl GenericClient) -> StoreResult<Vec<Row>> {
        conn.query(&self.text, &self.params_ref()).await
    }

    /// Execute and return the first row, if any.
    pub async fn fetch_opt(&self, conn: &impl GenericClient) -> StoreResult<Option<Row>> {
        conn.query_opt(&self.text, &self.params_ref()).await
    }

    /// Execute and return the number of affected rows.
    pub async fn execute(&self, conn: &impl GenericClient) -> StoreResult<u64> {
        conn.execute(&self.text, &self.params_ref()).await
    }

    /// Render the statement with its values inlined as literals.
    ///
    /// For logs and debugging only. The output is never sent to the database.
    pub fn to_debug_sql(&self) -> String {
        let mut out = String::with_capacity(self.text.len());
        let mut chars = self.text.chars().peekable();
        let mut positional = 0;

        while let Some(ch) = chars.next() {
            match ch {
                '$' if chars.peek().is_some_and(char::is_ascii_digit) => {
                    let mut n = 0usize;
                    while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
                        n = n * 10 + d as usize;
                        chars.next();
                    }
                    match n.checked_sub(1).and_then(|i| self.values.get(i)) {
                        Some(v) => out.push_str(&debug_literal(v)),
                        None => {
                            out.push('$');
                            out.push_str(&n.to_string());
                        }
                    }
                }
                '?' if positional < self.values.len() => {
                    match self.values.get(positional) {
                        Some(v) => out.push_str(&debug_literal(v)),
                        None => out.push('?'),
                    }
                    positional += 1;
                }
                _ => out.push(ch),
            }
        }
        out
    }
}

fn debug_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Decimal(d) => d.to_string(),
        Value::Text(s) => format!("'{}'", escape_literal(s)),
        Value::Timestamp(t) => format!("'{}'", t.to_rfc3339()),
        Value::Uuid(u) => format!("'{u}'"),
        Value::Json(j) => format!("'{}'", escape_literal(&j.to_string())),
    }
}

/// Truncate statement text for logging, on a char boundary.
pub(crate) fn truncate_sql(sql: &str, max_bytes: Option<usize>) -> String {
    match max_bytes {
        Some(max) if sql.len() > max => {
            let mut end = max;
            while end > 0 && !sql.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &sql[..end])
        }
        _ => sql.to_string(),
    }
}
