//! JSON query-object parsing.
//!
//! This is the only place that inspects the dynamic shape of a query object.
//! Everything downstream matches on [`Clause`] and [`Filter`].

use super::filter::{BoolOp, Clause, Filter};
use super::{NativeQuery, Query, SortOrder};
use crate::error::{StoreError, StoreResult};
use crate::value::Value;
use serde_json::{Map, Value as Json};

/// Marker character of control and operator keys.
const CONTROL_MARK: char = '$';

impl Query {
    /// Parse a JSON query object.
    ///
    /// - a string or number selects by `id`
    /// - an array selects by `id IN (...)`
    /// - `null` matches everything
    /// - an object is a mapping of field (or control key) to filter
    ///
    /// Unrecognized `$` keys at the top level are skipped. Unknown operators
    /// inside an operator map, and malformed control values, are errors.
    pub fn from_json(q: &Json) -> StoreResult<Self> {
        match q {
            Json::Null => Ok(Query::new()),
            Json::String(_) | Json::Number(_) => Ok(Query::by_id(Value::from(q.clone()))),
            Json::Array(ids) => Ok(Query::new().in_list("id", ids.iter().cloned().map(Value::from))),
            Json::Object(map) => parse_object(map),
            Json::Bool(_) => Err(StoreError::invalid_query(
                "query must be an object, an id or a list of ids",
            )),
        }
    }
}

fn parse_object(map: &Map<String, Json>) -> StoreResult<Query> {
    let mut query = Query::new();

    for (key, value) in map {
        match key.as_str() {
            "limit$" => query.limit = non_negative(value),
            "skip$" | "offset$" => query.skip = non_negative(value),
            "sort$" => query.sort = parse_sort(value)?,
            "fields$" => query.fields = parse_fields(value)?,
            "ids$" => query.ids = Some(parse_ids(value)),
            "all$" => query.all = truthy(value),
            "load$" => query.load = truthy(value),
            "merge$" => query.merge = !matches!(value, Json::Bool(false)),
            "auto_increment$" => query.auto_increment = truthy(value),
            "upsert$" => {
                if let Json::Array(items) = value {
                    query = query.upsert(items.iter().filter_map(Json::as_str));
                }
            }
            "native$" => query.native = Some(parse_native(value)?),
            _ => {}
        }
    }

    query.clauses = parse_clauses(map)?;
    Ok(query)
}

/// Parse the filter part of a query object (columns and `and$`/`or$` groups).
pub(crate) fn parse_clauses(map: &Map<String, Json>) -> StoreResult<Vec<Clause>> {
    let mut clauses = Vec::new();

    for (key, value) in map {
        let group = match key.as_str() {
            "and$" => Some(BoolOp::And),
            "or$" => Some(BoolOp::Or),
            _ => None,
        };

        if let Some(op) = group {
            clauses.push(Clause::Group(op, parse_group(op, value)?));
            continue;
        }

        if key.contains(CONTROL_MARK) {
            continue;
        }

        clauses.push(Clause::Column(key.clone(), Filter::from_json(value)?));
    }

    Ok(clauses)
}

fn parse_group(op: BoolOp, value: &Json) -> StoreResult<Vec<Vec<Clause>>> {
    let Json::Array(items) = value else {
        return Err(StoreError::invalid_query(format!(
            "{} operator requires an array value",
            op.key()
        )));
    };

    items
        .iter()
        .map(|item| match item {
            Json::Object(map) => parse_clauses(map),
            _ => Err(StoreError::invalid_query(format!(
                "{} operator requires an array of query objects",
                op.key()
            ))),
        })
        .collect()
}

fn non_negative(value: &Json) -> Option<u64> {
    match value {
        Json::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        _ => None,
    }
}

fn truthy(value: &Json) -> bool {
    match value {
        Json::Null => false,
        Json::Bool(b) => *b,
        Json::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Json::String(s) => !s.is_empty(),
        Json::Array(_) | Json::Object(_) => true,
    }
}

fn parse_sort(value: &Json) -> StoreResult<Vec<(String, SortOrder)>> {
    let Json::Object(map) = value else {
        return Err(StoreError::invalid_query("sort$ must be an object of field: direction"));
    };

    map.iter()
        .map(|(field, dir)| {
            let sign = dir.as_f64().ok_or_else(|| {
                StoreError::invalid_query(format!("sort$ direction for {field} must be a number"))
            })?;
            Ok((field.clone(), SortOrder::from_sign(sign)))
        })
        .collect()
}

fn parse_fields(value: &Json) -> StoreResult<Option<Vec<String>>> {
    let Json::Array(items) = value else {
        return Err(StoreError::invalid_query("fields$ must be an array of field names"));
    };

    let fields = items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                StoreError::invalid_query(format!("fields$ entries must be strings, got {item}"))
            })
        })
        .collect::<StoreResult<Vec<_>>>()?;

    Ok((!fields.is_empty()).then_some(fields))
}

fn parse_ids(value: &Json) -> Vec<Value> {
    match value {
        Json::Array(items) => items.iter().cloned().map(Value::from).collect(),
        single => vec![Value::from(single.clone())],
    }
}

fn parse_native(value: &Json) -> StoreResult<NativeQuery> {
    match value {
        Json::String(sql) => Ok(NativeQuery::new(sql.clone())),
        Json::Array(items) => {
            let Some((head, bindings)) = items.split_first() else {
                return Err(StoreError::invalid_query("native$ array must not be empty"));
            };
            let Json::String(sql) = head else {
                return Err(StoreError::invalid_query(
                    "native$ array must start with the SQL string",
                ));
            };
            Ok(NativeQuery {
                sql: sql.clone(),
                bindings: bindings.iter().cloned().map(Value::from).collect(),
            })
        }
        _ => Err(StoreError::invalid_query(
            "native$ must be a SQL string or [sql, ...bindings]",
        )),
    }
}
