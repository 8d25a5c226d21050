use super::*;
use serde_json::json;

#[test]
fn test_id_shorthands() {
    let q = Query::from_json(&json!("abc")).unwrap();
    assert_eq!(q.clauses, vec![Clause::Column("id".into(), Filter::Scalar("abc".into()))]);

    let q = Query::from_json(&json!(7)).unwrap();
    assert_eq!(q.clauses, vec![Clause::Column("id".into(), Filter::Scalar(Value::Int(7)))]);

    let q = Query::from_json(&json!(["a", "b"])).unwrap();
    assert_eq!(
        q.clauses,
        vec![Clause::Column(
            "id".into(),
            Filter::List(vec!["a".into(), "b".into()])
        )]
    );

    assert!(Query::from_json(&json!(null)).unwrap().clauses.is_empty());
    assert!(Query::from_json(&json!(true)).is_err());
}

#[test]
fn test_control_keys() {
    let q = Query::from_json(&json!({
        "price": {"gte$": 200},
        "sort$": {"price": 1, "name": -1},
        "limit$": 1,
        "skip$": 2,
        "fields$": ["name"],
    }))
    .unwrap();

    assert_eq!(q.limit, Some(1));
    assert_eq!(q.skip, Some(2));
    assert_eq!(
        q.sort,
        vec![
            ("price".to_string(), SortOrder::Asc),
            ("name".to_string(), SortOrder::Desc)
        ]
    );
    assert_eq!(q.fields, Some(vec!["name".to_string()]));
    assert_eq!(
        q.clauses,
        vec![Clause::Column(
            "price".into(),
            Filter::Ops(vec![Comparison::Gte(Value::Int(200))])
        )]
    );
}

#[test]
fn test_json_and_builder_agree() {
    let parsed = Query::from_json(&json!({
        "price": {"gte$": 200},
        "sort$": {"price": 1},
        "limit$": 1,
        "fields$": ["name"],
    }))
    .unwrap();
    let built = Query::new()
        .gte("price", 200)
        .sort("price", SortOrder::Asc)
        .limit(1)
        .fields(["name"]);
    assert_eq!(parsed, built);
}

#[test]
fn test_sort_zero_is_ascending() {
    assert_eq!(SortOrder::from_sign(0.0), SortOrder::Asc);
    assert_eq!(SortOrder::from_sign(-0.5), SortOrder::Desc);
    assert!(Query::from_json(&json!({"sort$": {"a": "up"}})).is_err());
    assert!(Query::from_json(&json!({"sort$": ["a"]})).is_err());
}

#[test]
fn test_invalid_limit_and_skip_are_dropped() {
    let q = Query::from_json(&json!({"limit$": -1, "skip$": "x"})).unwrap();
    assert_eq!(q.limit, None);
    assert_eq!(q.skip, None);

    let q = Query::from_json(&json!({"offset$": 4})).unwrap();
    assert_eq!(q.skip, Some(4));
}

#[test]
fn test_fields_must_be_strings() {
    assert!(Query::from_json(&json!({"fields$": "name"})).is_err());
    assert!(Query::from_json(&json!({"fields$": ["name", 1]})).is_err());
    assert_eq!(Query::from_json(&json!({"fields$": []})).unwrap().fields, None);
}

#[test]
fn test_upsert_drops_control_names() {
    let q = Query::from_json(&json!({"upsert$": ["email", "x$", 3]})).unwrap();
    assert_eq!(q.upsert_fields(), Some(&["email".to_string()][..]));

    let q = Query::from_json(&json!({"upsert$": ["x$"]})).unwrap();
    assert_eq!(q.upsert_fields(), None);

    let q = Query::from_json(&json!({"upsert$": "email"})).unwrap();
    assert_eq!(q.upsert_fields(), None);
}

#[test]
fn test_flags() {
    let q = Query::from_json(&json!({"all$": true, "load$": 1, "merge$": false, "auto_increment$": true}))
        .unwrap();
    assert!(q.all && q.load && q.auto_increment);
    assert!(!q.merge);

    let q = Query::new();
    assert!(q.merge && !q.all && !q.load);
}

#[test]
fn test_native_shapes() {
    let q = Query::from_json(&json!({"native$": "SELECT 1"})).unwrap();
    assert_eq!(q.native, Some(NativeQuery::new("SELECT 1")));

    let q = Query::from_json(&json!({"native$": ["SELECT * FROM t WHERE a = ?", 5]})).unwrap();
    assert_eq!(
        q.native,
        Some(NativeQuery::new("SELECT * FROM t WHERE a = ?").bind(5))
    );

    assert!(Query::from_json(&json!({"native$": []})).is_err());
    assert!(Query::from_json(&json!({"native$": [1, 2]})).is_err());
    assert!(Query::from_json(&json!({"native$": 3})).is_err());
}

#[test]
fn test_ids_fold_into_or_group() {
    let q = Query::from_json(&json!({"ids$": ["a", "b"]})).unwrap();
    assert!(q.clauses.is_empty());
    let clauses = q.where_clauses();
    assert_eq!(
        clauses,
        vec![Clause::Group(
            BoolOp::Or,
            vec![
                vec![Clause::Column("id".into(), Filter::Scalar("a".into()))],
                vec![Clause::Column("id".into(), Filter::Scalar("b".into()))],
            ]
        )]
    );
}

#[test]
fn test_in_requires_array() {
    assert!(Query::from_json(&json!({"a": {"in$": 1}})).is_err());
    assert!(Query::from_json(&json!({"a": {"nin$": "x"}})).is_err());
}

#[test]
fn test_patterns_keep_postgres_syntax() {
    let p = Pattern::case_insensitive("^ab");
    assert_eq!(p.operator(), "~*");
    assert_eq!(p.source(), "^ab");

    // back-references and look-ahead are valid for the server's engine
    assert_eq!(Pattern::new(r"(a)\1").source(), r"(a)\1");
    assert_eq!(Pattern::new("foo(?=bar)").operator(), "~");
}
