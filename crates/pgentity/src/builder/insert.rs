use super::{Statement, StatementKind};
use crate::compile::{BuildContext, Fragment};
use crate::value::{Fields, Value};

/// `INSERT INTO t (cols) VALUES (...) RETURNING *`.
///
/// An empty row inserts `DEFAULT VALUES`.
pub fn insert(cx: &BuildContext, table: &str, row: &Fields) -> Statement {
    let frag = insert_head(cx, table, row).push(" RETURNING *");
    Statement::from_fragment(StatementKind::Insert, frag)
}

/// Insert, or update the conflicting row.
///
/// `ON CONFLICT (targets) DO UPDATE SET` assigns every row column except the
/// conflict targets and `id`. With nothing left to assign the statement uses
/// `DO NOTHING`, which returns no row when the conflict fires.
pub fn upsert(cx: &BuildContext, table: &str, row: &Fields, targets: &[String]) -> Statement {
    let d = &cx.dialect;

    let conflict = targets
        .iter()
        .map(|t| cx.column(t))
        .collect::<Vec<_>>()
        .join(", ");
    let frag = insert_head(cx, table, row)
        .push(" ON CONFLICT (")
        .push(&conflict)
        .push(")");

    let assignments: Vec<(&String, &Value)> = row
        .iter()
        .filter(|(field, _)| field.as_str() != "id" && !targets.contains(field))
        .collect();

    let frag = if assignments.is_empty() {
        frag.push(" DO NOTHING")
    } else {
        assignments
            .into_iter()
            .enumerate()
            .fold(frag.push(" DO UPDATE SET "), |frag, (i, (field, value))| {
                let frag = if i == 0 { frag } else { frag.push(", ") };
                frag.push(&cx.column(field))
                    .push(" = ")
                    .bind(d, value.clone())
            })
    };

    Statement::from_fragment(StatementKind::Upsert, frag.push(" RETURNING *"))
}

fn insert_head(cx: &BuildContext, table: &str, row: &Fields) -> Fragment {
    let frag = Fragment::new(1)
        .push("INSERT INTO ")
        .push(&cx.table(table));

    if row.is_empty() {
        return frag.push(" DEFAULT VALUES");
    }

    let columns = row
        .keys()
        .map(|f| cx.column(f))
        .collect::<Vec<_>>()
        .join(", ");
    let values: Vec<Value> = row.values().cloned().collect();

    frag.push(" (")
        .push(&columns)
        .push(") VALUES (")
        .bind_list(&cx.dialect, &values)
        .push(")")
}
