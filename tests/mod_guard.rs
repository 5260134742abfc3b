use serde_json::json;

use docwire::query::guard::{GuardConfig, check_pattern, translate};
use docwire::Error;

fn cfg() -> GuardConfig {
    GuardConfig::default()
}

#[test]
fn blocked_operator_at_top_level() {
    let input = json!({"$where": "this.a == 1"});
    let err = translate(&input, &cfg()).unwrap_err();
    assert!(matches!(err, Error::BlockedOperator(ref op) if op == "$where"));
    assert!(err.is_security());
}

#[test]
fn blocked_operator_nested_arbitrarily_deep() {
    let input = json!({"$and": [
        {"age": {"$gt": 21}},
        {"$or": [
            {"name": {"$eq": "x"}},
            {"profile": {"$function": {"body": "evil"}}},
        ]},
    ]});
    assert!(matches!(translate(&input, &cfg()), Err(Error::BlockedOperator(_))));
}

#[test]
fn blocklist_wins_over_allowlist_distinction() {
    // $accumulator is blocked; $foo is merely unknown. The two reject with
    // different error kinds so callers can tell attack from typo.
    let blocked = translate(&json!({"$accumulator": 1}), &cfg()).unwrap_err();
    assert!(matches!(blocked, Error::BlockedOperator(_)));

    let unknown = translate(&json!({"$foo": 1}), &cfg()).unwrap_err();
    assert!(matches!(unknown, Error::UnknownOperator(_)));
    assert!(!unknown.is_security());
}

#[test]
fn allowed_subset_translates() {
    let input = json!({"play_count": {"$gte": 10}, "name": {"$in": ["a", "b"]}});
    let out = translate(&input, &cfg()).unwrap();
    assert_eq!(out, json!({"playCount": {"$gte": 10}, "name": {"$in": ["a", "b"]}}));
}

#[test]
fn field_names_normalize_at_every_depth() {
    let input = json!({"$or": [
        {"play_count": {"$lt": 5}},
        {"release_date": {"$exists": true}},
    ]});
    let out = translate(&input, &cfg()).unwrap();
    assert_eq!(
        out,
        json!({"$or": [
            {"playCount": {"$lt": 5}},
            {"releaseDate": {"$exists": true}},
        ]})
    );
}

#[test]
fn excessive_depth_is_rejected() {
    let mut nested = json!({"a": 1});
    for _ in 0..12 {
        nested = json!({"$and": [nested]});
    }
    assert!(matches!(translate(&nested, &cfg()), Err(Error::DepthExceeded { .. })));
}

#[test]
fn depth_within_limit_passes() {
    let input = json!({"$and": [{"$or": [{"a": {"$eq": 1}}]}]});
    assert!(translate(&input, &cfg()).is_ok());
}

#[test]
fn oversized_pattern_rejected() {
    let pattern = "a".repeat(501);
    assert!(matches!(check_pattern(&pattern, &cfg()), Err(Error::UnsafePattern(_))));
    assert!(check_pattern(&"a".repeat(500), &cfg()).is_ok());
}

#[test]
fn dangerous_constructs_are_hard_rejections() {
    for pattern in [
        "(?=ahead)",
        "(?!behind)",
        "(?<=back)",
        "a{5000}",
        "a{2,99999}",
        ".*.*",
        ".+.+",
        "(x+)*",
        "(ab*)+",
    ] {
        assert!(
            matches!(check_pattern(pattern, &cfg()), Err(Error::UnsafePattern(_))),
            "pattern should be rejected: {pattern}"
        );
    }
}

#[test]
fn benign_patterns_pass() {
    for pattern in ["^abc$", "colou?r", "a{2,5}", "[a-z]+", "foo|bar", "a.*b"] {
        assert!(check_pattern(pattern, &cfg()).is_ok(), "pattern should pass: {pattern}");
    }
}

#[test]
fn regex_values_in_translate_are_checked() {
    let input = json!({"name": {"$regex": "(a+)+$"}});
    assert!(matches!(translate(&input, &cfg()), Err(Error::UnsafePattern(_))));

    let input = json!({"name": {"$regex": "^ali", "$options": "i"}});
    assert!(translate(&input, &cfg()).is_ok());
}

#[test]
fn custom_limits_are_honored() {
    let tight = GuardConfig { max_depth: 1, max_pattern_len: 3, max_repetition: 2 };
    assert!(matches!(
        translate(&json!({"a": {"$eq": 1}}), &tight),
        Err(Error::DepthExceeded { .. })
    ));
    assert!(matches!(check_pattern("abcd", &tight), Err(Error::UnsafePattern(_))));
    assert!(matches!(check_pattern("a{3}", &tight), Err(Error::UnsafePattern(_))));
    assert!(check_pattern("a{2}", &tight).is_ok());
}
