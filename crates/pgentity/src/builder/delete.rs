use super::select::filtered_tail;
use super::{Statement, StatementKind};
use crate::compile::{BuildContext, Fragment, compile_where};
use crate::error::StoreResult;
use crate::query::Query;
use crate::value::Value;

/// `DELETE FROM t WHERE "id" IN (...) RETURNING *`.
pub fn delete_by_ids(cx: &BuildContext, table: &str, ids: &[Value]) -> Statement {
    let frag = Fragment::new(1)
        .push("DELETE FROM ")
        .push(&cx.table(table))
        .push(" WHERE ")
        .push(&cx.column("id"))
        .push(" IN (")
        .bind_list(&cx.dialect, ids)
        .push(") RETURNING *");
    Statement::from_fragment(StatementKind::Delete, frag)
}

/// Delete every row matching the query (`all$`).
///
/// Without paging the predicate is used directly. With `limit$`, `skip$` or
/// `sort$` the rows are picked through an id sub-select.
pub fn delete_all(cx: &BuildContext, table: &str, query: &Query) -> StoreResult<Statement> {
    let table = cx.table(table);
    let frag = Fragment::new(1).push("DELETE FROM ").push(&table);

    let paged = query.limit.is_some() || query.skip.is_some() || !query.sort.is_empty();
    let frag = if paged {
        let id = cx.column("id");
        let frag = frag
            .push(" WHERE ")
            .push(&id)
            .push(" IN (SELECT ")
            .push(&id)
            .push(" FROM ")
            .push(&table);
        filtered_tail(cx, query, query.limit, frag)?.push(")")
    } else {
        let predicate = compile_where(&query.where_clauses(), cx, frag.next_param)?;
        if predicate.is_empty() {
            frag
        } else {
            frag.push(" WHERE ").append(predicate)
        }
    };

    Ok(Statement::from_fragment(
        StatementKind::Delete,
        frag.push(" RETURNING *"),
    ))
}
