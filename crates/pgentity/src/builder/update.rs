use super::{Statement, StatementKind};
use crate::compile::{BuildContext, Fragment};
use crate::naming::ColumnMapper;
use crate::value::{Fields, Value};

/// `UPDATE t SET ... WHERE "id" = $n RETURNING *`.
///
/// `id` is never assigned. A row with nothing else to assign sets `id` to
/// itself so the statement still reports whether the row exists.
pub fn update(cx: &BuildContext, table: &str, row: &Fields, id: &Value) -> Statement {
    update_with(cx, table, row, id, None)
}

/// Like [`update`], but merges the row's type hints into the stored ones.
///
/// Hints of the fields being written are dropped from the stored hint object
/// before the new hints are added; hints of untouched fields survive:
///
/// ```sql
/// "type_hints" = ((COALESCE(NULLIF("type_hints", ''), '{}')::jsonb - $1::text) || $2::jsonb)::text
/// ```
pub fn update_merging_hints(
    cx: &BuildContext,
    table: &str,
    row: &Fields,
    id: &Value,
    hint_column: &str,
) -> Statement {
    update_with(cx, table, row, id, Some(hint_column))
}

fn update_with(
    cx: &BuildContext,
    table: &str,
    row: &Fields,
    id: &Value,
    hint_column: Option<&str>,
) -> Statement {
    let d = &cx.dialect;
    let id_column = cx.column("id");

    let frag = Fragment::new(1)
        .push("UPDATE ")
        .push(&cx.table(table))
        .push(" SET ");

    let assignments: Vec<(&String, &Value)> = row
        .iter()
        .filter(|(field, _)| field.as_str() != "id" && Some(field.as_str()) != hint_column)
        .collect();
    let hints = hint_column.and_then(|h| row.get(h).map(|v| (h, v)));

    let frag = if assignments.is_empty() && hints.is_none() {
        frag.push(&id_column).push(" = ").bind(d, id.clone())
    } else {
        let frag = assignments
            .iter()
            .enumerate()
            .fold(frag, |frag, (i, (field, value))| {
                let frag = if i == 0 { frag } else { frag.push(", ") };
                frag.push(&cx.column(field))
                    .push(" = ")
                    .bind(d, (*value).clone())
            });
        match hints {
            Some((hint_field, value)) => {
                let frag = if assignments.is_empty() { frag } else { frag.push(", ") };
                let column = cx.column(hint_field);
                let frag = frag
                    .push(&column)
                    .push(" = ((COALESCE(NULLIF(")
                    .push(&column)
                    .push(", ''), '{}')::jsonb");
                assignments
                    .iter()
                    .fold(frag, |frag, (field, _)| {
                        frag.push(" - ")
                            .bind(d, Value::Text((*field).clone()))
                            .push("::text")
                    })
                    .push(") || ")
                    .bind(d, value.clone())
                    .push("::jsonb)::text")
            }
            None => frag,
        }
    };

    let frag = frag
        .push(" WHERE ")
        .push(&id_column)
        .push(" = ")
        .bind(d, id.clone())
        .push(" RETURNING *");

    Statement::from_fragment(StatementKind::Update, frag)
}

/// Column names of `table` in the current schema, in ordinal order.
pub fn table_columns(cx: &BuildContext, table: &str) -> Statement {
    let frag = Fragment::new(1)
        .push(
            "SELECT column_name::text AS column_name FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = ",
        )
        .bind(&cx.dialect, Value::Text(table.to_string()))
        .push(" ORDER BY ordinal_position");
    Statement::from_fragment(StatementKind::Schema, frag)
}

/// Add an explicit NULL for every schema column the row does not set.
///
/// Used by the replace (`merge$: false`) update strategy.
pub fn fill_missing(row: &mut Fields, columns: &[String], mapper: &dyn ColumnMapper) {
    for column in columns {
        let field = mapper.from_column(column);
        let present = row.contains_key(&field)
            || row.keys().any(|f| mapper.to_column(f) == *column);
        if !present {
            row.insert(field, Value::Null);
        }
    }
}
