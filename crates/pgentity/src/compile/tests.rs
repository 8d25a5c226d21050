use super::*;
use crate::error::StoreError;
use crate::naming::SnakeCaseMapper;
use crate::query::{Pattern, Query};
use regex::Regex;
use serde_json::json;

fn compile(q: serde_json::Value) -> Fragment {
    let q = Query::from_json(&q).unwrap();
    compile_where(&q.clauses, &BuildContext::default(), 1).unwrap()
}

/// Placeholders must be `$first..$next_param-1`, in order, one per value.
fn assert_contiguous(frag: &Fragment, first: usize) {
    let re = Regex::new(r"\$(\d+)").unwrap();
    let seen: Vec<usize> = re
        .captures_iter(&frag.text)
        .map(|c| c[1].parse().unwrap())
        .collect();
    let expected: Vec<usize> = (first..frag.next_param).collect();
    assert_eq!(seen, expected, "{}", frag.text);
    assert_eq!(frag.values.len(), frag.next_param - first);
}

#[test]
fn test_empty_query_has_no_predicate() {
    let frag = compile(json!({}));
    assert!(frag.is_empty());
    assert!(frag.values.is_empty());
    assert_eq!(frag.next_param, 1);
}

#[test]
fn test_scalar_equality() {
    let frag = compile(json!({"name": "pear"}));
    assert_eq!(frag.text, r#""name" = $1"#);
    assert_eq!(frag.values, vec![Value::Text("pear".into())]);
    assert_eq!(frag.next_param, 2);
}

#[test]
fn test_columns_are_anded_in_key_order() {
    let frag = compile(json!({"a": 1, "b": "x"}));
    assert_eq!(frag.text, r#""a" = $1 AND "b" = $2"#);
}

#[test]
fn test_nested_or_and() {
    let frag = compile(json!({"or$": [{"a": 1}, {"and$": [{"b": 2}, {"c": 3}]}]}));
    assert_eq!(frag.text, r#"("a" = $1 OR ("b" = $2 AND "c" = $3))"#);
    assert_eq!(
        frag.values,
        vec![Value::Int(1), Value::Int(2), Value::Int(3)]
    );
    assert_eq!(frag.next_param, 4);
}

#[test]
fn test_multi_column_branch_is_parenthesized() {
    let frag = compile(json!({"or$": [{"a": 1, "b": 2}, {"c": 3}]}));
    assert_eq!(frag.text, r#"(("a" = $1 AND "b" = $2) OR "c" = $3)"#);
}

#[test]
fn test_null_consumes_no_placeholder() {
    let frag = compile(json!({"a": null, "b": 1}));
    assert_eq!(frag.text, r#""a" IS NULL AND "b" = $1"#);
    assert_eq!(frag.values, vec![Value::Int(1)]);
}

#[test]
fn test_eq_ne_null_operators() {
    let frag = compile(json!({"a": {"eq$": null}, "b": {"ne$": null}}));
    assert_eq!(frag.text, r#""a" IS NULL AND "b" IS NOT NULL"#);
    assert!(frag.values.is_empty());
}

#[test]
fn test_array_value_is_in_list() {
    let frag = compile(json!({"id": [1, 2, 3]}));
    assert_eq!(frag.text, r#""id" IN ($1, $2, $3)"#);
    assert_contiguous(&frag, 1);
}

#[test]
fn test_empty_in_is_false_and_empty_nin_is_true() {
    assert_eq!(compile(json!({"id": []})).text, "FALSE");
    assert_eq!(compile(json!({"id": {"in$": []}})).text, "FALSE");
    assert_eq!(compile(json!({"id": {"nin$": []}})).text, "TRUE");
}

#[test]
fn test_in_and_nin_on_same_column_are_both_emitted() {
    let frag = compile(json!({"a": {"in$": [1, 2], "nin$": [3]}}));
    assert_eq!(frag.text, r#"("a" IN ($1, $2) AND "a" NOT IN ($3))"#);
    assert_eq!(frag.values.len(), 3);
}

#[test]
fn test_comparison_operators() {
    let frag = compile(json!({
        "p": {"gt$": 1, "gte$": 2, "lt$": 3, "lte$": 4, "ne$": 5, "eq$": 6}
    }));
    assert_eq!(
        frag.text,
        r#"("p" > $1 AND "p" >= $2 AND "p" < $3 AND "p" <= $4 AND "p" <> $5 AND "p" = $6)"#
    );
    assert_contiguous(&frag, 1);
}

#[test]
fn test_empty_groups() {
    assert_eq!(compile(json!({"and$": []})).text, "TRUE");
    assert_eq!(compile(json!({"or$": []})).text, "FALSE");
    assert_eq!(compile(json!({"a": 1, "or$": []})).text, r#""a" = $1 AND FALSE"#);
}

#[test]
fn test_unknown_operator_is_rejected() {
    let err = Query::from_json(&json!({"a": {"like$": "x%"}})).unwrap_err();
    assert!(matches!(err, StoreError::UnknownOperator(ref op) if op == "like$"));
    assert!(err.is_compile_error());
}

#[test]
fn test_malformed_group_is_rejected() {
    let err = Query::from_json(&json!({"or$": {"a": 1}})).unwrap_err();
    assert!(matches!(err, StoreError::InvalidQuery(_)));
    let err = Query::from_json(&json!({"and$": [1, 2]})).unwrap_err();
    assert!(matches!(err, StoreError::InvalidQuery(_)));
}

#[test]
fn test_control_keys_are_not_columns() {
    let frag = compile(json!({"a": 1, "limit$": 3, "whatever$": true}));
    assert_eq!(frag.text, r#""a" = $1"#);
}

#[test]
fn test_pattern_filter() {
    let q = Query::new()
        .pattern("name", Pattern::new("^pe"))
        .pattern("city", Pattern::case_insensitive("lon"))
        .pattern("code", Pattern::new(r"^(\d)\1$"));
    let frag = compile_where(&q.clauses, &BuildContext::default(), 1).unwrap();
    assert_eq!(frag.text, r#""name" ~ $1 AND "city" ~* $2 AND "code" ~ $3"#);
    assert_eq!(frag.values[0], Value::Text("^pe".into()));
    assert_eq!(frag.values[2], Value::Text(r"^(\d)\1$".into()));
}

#[test]
fn test_first_param_offsets_numbering() {
    let q = Query::from_json(&json!({"a": 1, "b": [2, 3]})).unwrap();
    let frag = compile_where(&q.clauses, &BuildContext::default(), 5).unwrap();
    assert_eq!(frag.text, r#""a" = $5 AND "b" IN ($6, $7)"#);
    assert_eq!(frag.next_param, 8);
    assert_contiguous(&frag, 5);
}

#[test]
fn test_placeholders_are_contiguous() {
    let queries = [
        json!({"a": 1, "b": null, "c": [1, 2]}),
        json!({"or$": [{"a": 1}, {"b": {"nin$": []}}, {"and$": [{"c": [3, 4]}, {"d": {"gt$": 0}}]}]}),
        json!({"x": {"in$": [], "lt$": 9}, "and$": [{"y": 1}, {"or$": []}, {"z": {"ne$": 2}}]}),
    ];
    for q in queries {
        assert_contiguous(&compile(q), 1);
    }
}

#[test]
fn test_mapper_and_escaping_apply_to_columns() {
    let cx = BuildContext::new(Dialect::POSTGRES, Arc::new(SnakeCaseMapper));
    let q = Query::new().eq("userName", "ann").eq(r#"we"ird"#, 1);
    let frag = compile_where(&q.clauses, &cx, 1).unwrap();
    assert_eq!(frag.text, r#""user_name" = $1 AND "we""ird" = $2"#);
}

#[test]
fn test_mysql_dialect() {
    let cx = BuildContext::new(Dialect::MYSQL, Arc::new(IdentityMapper));
    let q = Query::from_json(&json!({"a": 1, "b": [2, 3]})).unwrap();
    let frag = compile_where(&q.clauses, &cx, 1).unwrap();
    assert_eq!(frag.text, "`a` = ? AND `b` IN (?, ?)");
    assert_eq!(frag.next_param, 4);
}
