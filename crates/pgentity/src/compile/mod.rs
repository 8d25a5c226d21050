//! Expression compiler: filter clauses to a parameterized predicate.
//!
//! Compilation is a fold over the clause tree. Every step takes the running
//! [`Fragment`] and hands back an extended one, so the placeholder counter is
//! never shared between calls:
//!
//! ```ignore
//! let q = Query::from_json(&json!({"or$": [{"a": 1}, {"and$": [{"b": 2}, {"c": 3}]}]}))?;
//! let frag = compile_where(&q.clauses, &BuildContext::default(), 1)?;
//! assert_eq!(frag.text, r#"("a" = $1 OR ("b" = $2 AND "c" = $3))"#);
//! assert_eq!(frag.next_param, 4);
//! ```

#[cfg(test)]
mod tests;

use crate::error::StoreResult;
use crate::ident::Dialect;
use crate::naming::{ColumnMapper, IdentityMapper};
use crate::query::{BoolOp, Clause, Comparison, Filter};
use crate::value::Value;
use std::sync::Arc;

/// Row cap applied to list queries without `limit$`. `None` means no cap.
pub const DEFAULT_LIST_LIMIT: Option<u64> = None;

/// Everything a builder needs besides the query itself.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub dialect: Dialect,
    pub mapper: Arc<dyn ColumnMapper>,
    pub default_limit: Option<u64>,
}

impl Default for BuildContext {
    fn default() -> Self {
        Self {
            dialect: Dialect::POSTGRES,
            mapper: Arc::new(IdentityMapper),
            default_limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl BuildContext {
    pub fn new(dialect: Dialect, mapper: Arc<dyn ColumnMapper>) -> Self {
        Self {
            dialect,
            mapper,
            default_limit: DEFAULT_LIST_LIMIT,
        }
    }

    pub fn with_default_limit(mut self, limit: Option<u64>) -> Self {
        self.default_limit = limit;
        self
    }

    /// Map a field name to its column and quote it.
    pub fn column(&self, field: &str) -> String {
        self.dialect
            .escape_identifier(&self.mapper.to_column(field))
    }

    /// Quote a table name. Table names are not passed through the mapper.
    pub fn table(&self, name: &str) -> String {
        self.dialect.escape_identifier(name)
    }
}

/// A piece of SQL text plus the values its placeholders refer to.
///
/// `values[i]` belongs to placeholder `first_param + i`, and `next_param` is
/// the index the next bound value will get.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub text: String,
    pub values: Vec<Value>,
    pub next_param: usize,
}

impl Fragment {
    /// An empty fragment whose first placeholder will be `first_param`.
    pub fn new(first_param: usize) -> Self {
        Self {
            text: String::new(),
            values: Vec::new(),
            next_param: first_param,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Append raw SQL text.
    pub fn push(mut self, sql: &str) -> Self {
        self.text.push_str(sql);
        self
    }

    /// Append a placeholder bound to `value`.
    pub fn bind(mut self, dialect: &Dialect, value: Value) -> Self {
        dialect.write_placeholder(&mut self.text, self.next_param);
        self.values.push(value);
        self.next_param += 1;
        self
    }

    /// Append `values` as a comma-separated placeholder list.
    pub fn bind_list(self, dialect: &Dialect, values: &[Value]) -> Self {
        values.iter().enumerate().fold(self, |frag, (i, v)| {
            let frag = if i == 0 { frag } else { frag.push(", ") };
            frag.bind(dialect, v.clone())
        })
    }

    /// Append another fragment compiled from this one's `next_param`.
    pub fn append(mut self, other: Fragment) -> Self {
        self.text.push_str(&other.text);
        self.values.extend(other.values);
        self.next_param = other.next_param;
        self
    }
}

/// Compile filter clauses into a predicate (without the `WHERE` keyword).
///
/// Clauses are AND-ed. An empty clause list yields an empty fragment, which
/// callers render as "no WHERE clause".
pub fn compile_where(
    clauses: &[Clause],
    cx: &BuildContext,
    first_param: usize,
) -> StoreResult<Fragment> {
    conjunction(clauses, cx, Fragment::new(first_param))
}

/// AND the clauses onto `frag`. An empty list appends nothing.
fn conjunction(clauses: &[Clause], cx: &BuildContext, frag: Fragment) -> StoreResult<Fragment> {
    clauses
        .iter()
        .enumerate()
        .try_fold(frag, |frag, (i, clause)| {
            let frag = if i == 0 { frag } else { frag.push(" AND ") };
            compile_clause(clause, cx, frag)
        })
}

fn compile_clause(clause: &Clause, cx: &BuildContext, frag: Fragment) -> StoreResult<Fragment> {
    match clause {
        Clause::Column(field, filter) => compile_filter(&cx.column(field), filter, cx, frag),
        Clause::Group(op, branches) => compile_group(*op, branches, cx, frag),
    }
}

fn compile_group(
    op: BoolOp,
    branches: &[Vec<Clause>],
    cx: &BuildContext,
    frag: Fragment,
) -> StoreResult<Fragment> {
    if branches.is_empty() {
        return Ok(frag.push(op.identity()));
    }

    let frag = branches
        .iter()
        .enumerate()
        .try_fold(frag.push("("), |frag, (i, branch)| {
            let frag = if i == 0 { frag } else { frag.push(op.separator()) };
            match branch.len() {
                0 => Ok(frag.push("TRUE")),
                1 => conjunction(branch, cx, frag),
                _ => conjunction(branch, cx, frag.push("(")).map(|f| f.push(")")),
            }
        })?;

    Ok(frag.push(")"))
}

fn compile_filter(
    column: &str,
    filter: &Filter,
    cx: &BuildContext,
    frag: Fragment,
) -> StoreResult<Fragment> {
    let d = &cx.dialect;
    Ok(match filter {
        Filter::Null => frag.push(column).push(" IS NULL"),
        Filter::Scalar(v) => frag.push(column).push(" = ").bind(d, v.clone()),
        Filter::List(values) => in_list(column, "IN", values, "FALSE", d, frag),
        Filter::Pattern(p) => frag
            .push(column)
            .push(" ")
            .push(p.operator())
            .push(" ")
            .bind(d, Value::Text(p.source().to_string())),
        Filter::Ops(ops) => match ops.as_slice() {
            [] => frag.push("TRUE"),
            [single] => comparison(column, single, d, frag),
            many => {
                let frag = many
                    .iter()
                    .enumerate()
                    .fold(frag.push("("), |frag, (i, cmp)| {
                        let frag = if i == 0 { frag } else { frag.push(" AND ") };
                        comparison(column, cmp, d, frag)
                    });
                frag.push(")")
            }
        },
    })
}

fn comparison(column: &str, cmp: &Comparison, d: &Dialect, frag: Fragment) -> Fragment {
    let binary = |frag: Fragment, op: &str, v: &Value| {
        frag.push(column).push(" ").push(op).push(" ").bind(d, v.clone())
    };

    match cmp {
        Comparison::Eq(Value::Null) => frag.push(column).push(" IS NULL"),
        Comparison::Ne(Value::Null) => frag.push(column).push(" IS NOT NULL"),
        Comparison::Eq(v) => binary(frag, "=", v),
        Comparison::Ne(v) => binary(frag, "<>", v),
        Comparison::Gt(v) => binary(frag, ">", v),
        Comparison::Gte(v) => binary(frag, ">=", v),
        Comparison::Lt(v) => binary(frag, "<", v),
        Comparison::Lte(v) => binary(frag, "<=", v),
        Comparison::In(values) => in_list(column, "IN", values, "FALSE", d, frag),
        Comparison::Nin(values) => in_list(column, "NOT IN", values, "TRUE", d, frag),
    }
}

fn in_list(
    column: &str,
    op: &str,
    values: &[Value],
    when_empty: &str,
    d: &Dialect,
    frag: Fragment,
) -> Fragment {
    if values.is_empty() {
        return frag.push(when_empty);
    }
    frag.push(column)
        .push(" ")
        .push(op)
        .push(" (")
        .bind_list(d, values)
        .push(")")
}
