use super::{Statement, StatementKind};
use crate::compile::{BuildContext, Fragment, compile_where};
use crate::error::StoreResult;
use crate::query::Query;
use crate::value::Value;

/// `SELECT` for a list query.
///
/// The row cap is `limit$`, else the number of `ids$`, else the context's
/// default limit.
pub fn select(cx: &BuildContext, table: &str, query: &Query) -> StoreResult<Statement> {
    let limit = query
        .limit
        .or_else(|| query.ids.as_ref().map(|ids| ids.len() as u64))
        .or(cx.default_limit);
    select_with(cx, &projection(cx, query), table, query, limit)
}

/// `SELECT` for a single-entity load (`LIMIT 1`).
pub fn select_one(cx: &BuildContext, table: &str, query: &Query) -> StoreResult<Statement> {
    select_with(cx, &projection(cx, query), table, query, Some(1))
}

/// `SELECT "id"` honoring the query's filter, sort and skip.
pub fn select_ids(
    cx: &BuildContext,
    table: &str,
    query: &Query,
    limit: Option<u64>,
) -> StoreResult<Statement> {
    select_with(cx, &cx.column("id"), table, query, limit)
}

fn select_with(
    cx: &BuildContext,
    projection: &str,
    table: &str,
    query: &Query,
    limit: Option<u64>,
) -> StoreResult<Statement> {
    let frag = Fragment::new(1)
        .push("SELECT ")
        .push(projection)
        .push(" FROM ")
        .push(&cx.table(table));
    let frag = filtered_tail(cx, query, limit, frag)?;
    Ok(Statement::from_fragment(StatementKind::Select, frag))
}

/// Append `WHERE`, `ORDER BY`, `LIMIT` and `OFFSET` for `query`.
pub(crate) fn filtered_tail(
    cx: &BuildContext,
    query: &Query,
    limit: Option<u64>,
    frag: Fragment,
) -> StoreResult<Fragment> {
    let predicate = compile_where(&query.where_clauses(), cx, frag.next_param)?;
    let frag = if predicate.is_empty() {
        frag
    } else {
        frag.push(" WHERE ").append(predicate)
    };
    Ok(paging(cx, query, limit, frag))
}

fn paging(cx: &BuildContext, query: &Query, limit: Option<u64>, frag: Fragment) -> Fragment {
    let d = &cx.dialect;

    let frag = query
        .sort
        .iter()
        .enumerate()
        .fold(frag, |frag, (i, (field, order))| {
            let frag = frag.push(if i == 0 { " ORDER BY " } else { ", " });
            frag.push(&cx.column(field)).push(" ").push(order.as_sql())
        });

    let frag = match limit {
        Some(n) => frag.push(" LIMIT ").bind(d, Value::Int(clamp(n))),
        None => frag,
    };

    match query.skip {
        Some(n) => frag.push(" OFFSET ").bind(d, Value::Int(clamp(n))),
        None => frag,
    }
}

fn clamp(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// `*`, or the `fields$` columns with `id` added once.
fn projection(cx: &BuildContext, query: &Query) -> String {
    let Some(fields) = &query.fields else {
        return "*".to_string();
    };

    let mut names: Vec<&str> = Vec::with_capacity(fields.len() + 1);
    if !fields.iter().any(|f| f == "id") {
        names.push("id");
    }
    for f in fields {
        if !names.contains(&f.as_str()) {
            names.push(f);
        }
    }

    names
        .iter()
        .map(|f| cx.column(f))
        .collect::<Vec<_>>()
        .join(", ")
}
