//! Filter values: the closed set of shapes a column filter can take.

use crate::error::{StoreError, StoreResult};
use crate::value::Value;

/// One operator inside an operator map (`{price: {gte$: 100, lt$: 300}}`).
#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
}

impl Comparison {
    /// The query-object key for this operator.
    pub fn key(&self) -> &'static str {
        match self {
            Comparison::Eq(_) => "eq$",
            Comparison::Ne(_) => "ne$",
            Comparison::Gt(_) => "gt$",
            Comparison::Gte(_) => "gte$",
            Comparison::Lt(_) => "lt$",
            Comparison::Lte(_) => "lte$",
            Comparison::In(_) => "in$",
            Comparison::Nin(_) => "nin$",
        }
    }

    /// Build a comparison from its query-object key and JSON operand.
    pub fn from_key(key: &str, operand: &serde_json::Value) -> StoreResult<Self> {
        let list = || match operand {
            serde_json::Value::Array(items) => {
                Ok(items.iter().cloned().map(Value::from).collect::<Vec<_>>())
            }
            _ => Err(StoreError::invalid_query(format!(
                "operator {key} accepts only an array value"
            ))),
        };
        let single = || Value::from(operand.clone());

        Ok(match key {
            "eq$" => Comparison::Eq(single()),
            "ne$" => Comparison::Ne(single()),
            "gt$" => Comparison::Gt(single()),
            "gte$" => Comparison::Gte(single()),
            "lt$" => Comparison::Lt(single()),
            "lte$" => Comparison::Lte(single()),
            "in$" => Comparison::In(list()?),
            "nin$" => Comparison::Nin(list()?),
            other => return Err(StoreError::UnknownOperator(other.to_string())),
        })
    }
}

/// A regular expression matched with PostgreSQL's `~` / `~*` operators.
///
/// The source is PostgreSQL (ARE) syntax and is bound as-is; a malformed
/// pattern is reported by the server when the statement runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    case_insensitive: bool,
}

impl Pattern {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            case_insensitive: false,
        }
    }

    /// A pattern matched with `~*`.
    pub fn case_insensitive(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            case_insensitive: true,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    /// The SQL match operator for this pattern.
    pub fn operator(&self) -> &'static str {
        if self.case_insensitive { "~*" } else { "~" }
    }
}

/// The filter attached to a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `col = $n`
    Scalar(Value),
    /// `col IS NULL`
    Null,
    /// `col IN (...)`
    List(Vec<Value>),
    /// `col ~ $n`
    Pattern(Pattern),
    /// One clause per operator, AND-ed together.
    Ops(Vec<Comparison>),
}

impl Filter {
    /// Equality filter; a null value becomes [`Filter::Null`].
    pub fn eq(value: impl Into<Value>) -> Self {
        match value.into() {
            Value::Null => Filter::Null,
            v => Filter::Scalar(v),
        }
    }

    /// Parse a JSON filter value (the right-hand side of `{column: ...}`).
    pub fn from_json(value: &serde_json::Value) -> StoreResult<Self> {
        Ok(match value {
            serde_json::Value::Null => Filter::Null,
            serde_json::Value::Array(items) => {
                Filter::List(items.iter().cloned().map(Value::from).collect())
            }
            serde_json::Value::Object(ops) => Filter::Ops(
                ops.iter()
                    .map(|(key, operand)| Comparison::from_key(key, operand))
                    .collect::<StoreResult<Vec<_>>>()?,
            ),
            scalar => Filter::Scalar(Value::from(scalar.clone())),
        })
    }
}

/// Boolean combinator of a clause group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

impl BoolOp {
    pub fn key(self) -> &'static str {
        match self {
            BoolOp::And => "and$",
            BoolOp::Or => "or$",
        }
    }

    pub(crate) fn separator(self) -> &'static str {
        match self {
            BoolOp::And => " AND ",
            BoolOp::Or => " OR ",
        }
    }

    /// The SQL identity element, used for empty groups.
    pub(crate) fn identity(self) -> &'static str {
        match self {
            BoolOp::And => "TRUE",
            BoolOp::Or => "FALSE",
        }
    }
}

/// A single top-level predicate term.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// A filter on a logical field name.
    Column(String, Filter),
    /// `and$` / `or$` over nested clause lists; each list is AND-ed internally.
    Group(BoolOp, Vec<Vec<Clause>>),
}
