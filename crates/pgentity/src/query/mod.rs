//! Query objects: filters plus the control keys that shape a statement.
//!
//! A [`Query`] is built either with the typed builder methods or parsed once
//! from a JSON query object with [`Query::from_json`]:
//!
//! ```ignore
//! use pgentity::{Query, SortOrder};
//! use serde_json::json;
//!
//! let q = Query::new()
//!     .gte("price", 200)
//!     .sort("price", SortOrder::Asc)
//!     .limit(1)
//!     .fields(["name"]);
//!
//! let same = Query::from_json(&json!({
//!     "price": {"gte$": 200},
//!     "sort$": {"price": 1},
//!     "limit$": 1,
//!     "fields$": ["name"],
//! }))?;
//! ```

mod filter;
mod parse;

#[cfg(test)]
mod tests;

pub use filter::{BoolOp, Clause, Comparison, Filter, Pattern};

use crate::value::Value;

/// Sort direction of an `ORDER BY` term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// Non-negative sort values sort ascending, negative ones descending.
    pub fn from_sign(value: f64) -> Self {
        if value >= 0.0 {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Raw SQL escape hatch (`native$`).
///
/// `?` markers in `sql` are rewritten to the dialect's placeholders and bound
/// to `bindings` in order. Nothing is escaped.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeQuery {
    pub sql: String,
    pub bindings: Vec<Value>,
}

impl NativeQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            bindings: Vec::new(),
        }
    }

    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.bindings.push(value.into());
        self
    }
}

/// A declarative query: filter clauses plus statement-shaping control keys.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub clauses: Vec<Clause>,
    /// `limit$`
    pub limit: Option<u64>,
    /// `skip$` / `offset$`
    pub skip: Option<u64>,
    /// `sort$`, in key order.
    pub sort: Vec<(String, SortOrder)>,
    /// `fields$` projection allow-list; `id` is always added.
    pub fields: Option<Vec<String>>,
    /// `ids$`: shorthand for OR-ed equality on `id`.
    pub ids: Option<Vec<Value>>,
    /// `all$`: remove every matching row.
    pub all: bool,
    /// `load$`: return the removed entity.
    pub load: bool,
    /// `upsert$`: conflict-target fields.
    pub upsert: Option<Vec<String>>,
    /// `native$`
    pub native: Option<NativeQuery>,
    /// `merge$`: `false` replaces the whole row on update.
    pub merge: bool,
    /// `auto_increment$`: let the database assign the id of new entities.
    pub auto_increment: bool,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            clauses: Vec::new(),
            limit: None,
            skip: None,
            sort: Vec::new(),
            fields: None,
            ids: None,
            all: false,
            load: false,
            upsert: None,
            native: None,
            merge: true,
            auto_increment: false,
        }
    }
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query matching a single id.
    pub fn by_id(id: impl Into<Value>) -> Self {
        Self::new().eq("id", id)
    }

    /// Add a filter on a field.
    pub fn filter(mut self, field: impl Into<String>, filter: Filter) -> Self {
        self.clauses.push(Clause::Column(field.into(), filter));
        self
    }

    /// `field = value` (`IS NULL` for a null value).
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(field, Filter::eq(value))
    }

    pub fn is_null(self, field: impl Into<String>) -> Self {
        self.filter(field, Filter::Null)
    }

    pub fn in_list<V: Into<Value>>(
        self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.filter(field, Filter::List(values.into_iter().map(Into::into).collect()))
    }

    pub fn pattern(self, field: impl Into<String>, pattern: Pattern) -> Self {
        self.filter(field, Filter::Pattern(pattern))
    }

    /// Operator map on one field; every comparison must hold.
    pub fn ops(self, field: impl Into<String>, ops: Vec<Comparison>) -> Self {
        self.filter(field, Filter::Ops(ops))
    }

    pub fn ne(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops(field, vec![Comparison::Ne(value.into())])
    }

    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops(field, vec![Comparison::Gt(value.into())])
    }

    pub fn gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops(field, vec![Comparison::Gte(value.into())])
    }

    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops(field, vec![Comparison::Lt(value.into())])
    }

    pub fn lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops(field, vec![Comparison::Lte(value.into())])
    }

    /// `or$`: at least one of the sub-queries' filters must hold.
    pub fn or(self, branches: impl IntoIterator<Item = Query>) -> Self {
        self.group(BoolOp::Or, branches)
    }

    /// `and$`: every sub-query's filters must hold.
    pub fn and(self, branches: impl IntoIterator<Item = Query>) -> Self {
        self.group(BoolOp::And, branches)
    }

    fn group(mut self, op: BoolOp, branches: impl IntoIterator<Item = Query>) -> Self {
        let branches = branches.into_iter().map(|q| q.clauses).collect();
        self.clauses.push(Clause::Group(op, branches));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort.push((field.into(), order));
        self
    }

    pub fn fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn ids<V: Into<Value>>(mut self, ids: impl IntoIterator<Item = V>) -> Self {
        self.ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn all(mut self) -> Self {
        self.all = true;
        self
    }

    pub fn load(mut self) -> Self {
        self.load = true;
        self
    }

    pub fn upsert<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        let fields: Vec<String> = fields
            .into_iter()
            .map(Into::into)
            .filter(|f: &String| !f.contains('$'))
            .collect();
        self.upsert = (!fields.is_empty()).then_some(fields);
        self
    }

    pub fn native(mut self, native: NativeQuery) -> Self {
        self.native = Some(native);
        self
    }

    pub fn merge(mut self, merge: bool) -> Self {
        self.merge = merge;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// The filter clauses, with `ids$` folded in as an OR of id equalities.
    pub fn where_clauses(&self) -> Vec<Clause> {
        let mut clauses = self.clauses.clone();
        if let Some(ids) = &self.ids {
            let branches = ids
                .iter()
                .map(|id| vec![Clause::Column("id".to_string(), Filter::eq(id.clone()))])
                .collect();
            clauses.push(Clause::Group(BoolOp::Or, branches));
        }
        clauses
    }

    /// Conflict targets for an upsert, if any.
    pub fn upsert_fields(&self) -> Option<&[String]> {
        self.upsert.as_deref().filter(|f| !f.is_empty())
    }
}
