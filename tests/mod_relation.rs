use std::collections::BTreeMap;

use serde_json::json;

use docwire::query::{CompiledFragment, Constraint, Operator, Stage};
use docwire::{Error, Value};

fn params(entries: &[(&str, &str)]) -> Value {
    let mut m = BTreeMap::new();
    for (k, v) in entries {
        m.insert((*k).to_owned(), Value::Str((*v).to_owned()));
    }
    Value::Map(m)
}

#[test]
fn equals_linked_pointer_builds_extract_lookup_compare() {
    let c = Constraint::new(
        "owner",
        Operator::EqualsLinkedPointer,
        params(&[("through", "manager"), ("field", "owner"), ("class", "Team")]),
    );
    let CompiledFragment::Pipeline(stages) = c.compile().unwrap() else {
        panic!("expected a pipeline fragment");
    };
    assert_eq!(stages.len(), 3);

    let Stage::AddFields(extract) = &stages[0] else { panic!("expected $addFields first") };
    assert_eq!(
        serde_json::Value::Object(extract.clone()),
        json!({"__owner_link_id": {"$arrayElemAt": [{"$split": ["$_p_manager", "$"]}, 1]}})
    );

    let Stage::Lookup { from, local_field, foreign_field, as_field } = &stages[1] else {
        panic!("expected $lookup second");
    };
    assert_eq!(from, "Team");
    assert_eq!(local_field, "__owner_link_id");
    assert_eq!(foreign_field, "_id");
    assert_eq!(as_field, "__owner_link_doc");

    let Stage::Match(cmp) = &stages[2] else { panic!("expected $match third") };
    assert_eq!(
        serde_json::Value::Object(cmp.clone()),
        json!({"$expr": {"$eq": [
            {"$arrayElemAt": ["$__owner_link_doc.owner", 0]},
            "$owner",
        ]}})
    );
}

#[test]
fn negated_variant_compares_with_ne() {
    let c = Constraint::new(
        "owner",
        Operator::DoesNotEqualLinkedPointer,
        params(&[("through", "manager"), ("field", "owner"), ("class", "Team")]),
    );
    let CompiledFragment::Pipeline(stages) = c.compile().unwrap() else {
        panic!("expected a pipeline fragment");
    };
    let Stage::Match(cmp) = &stages[2] else { panic!("expected $match third") };
    let wire = serde_json::Value::Object(cmp.clone());
    assert!(wire["$expr"].get("$ne").is_some());
}

#[test]
fn class_defaults_to_capitalized_field() {
    let c = Constraint::new(
        "team",
        Operator::EqualsLinkedPointer,
        params(&[("through", "manager"), ("field", "team")]),
    );
    let CompiledFragment::Pipeline(stages) = c.compile().unwrap() else {
        panic!("expected a pipeline fragment");
    };
    let Stage::Lookup { from, .. } = &stages[1] else { panic!("expected $lookup") };
    assert_eq!(from, "Team");
}

#[test]
fn missing_required_params_fail_validation() {
    let c = Constraint::new(
        "owner",
        Operator::EqualsLinkedPointer,
        params(&[("field", "owner")]),
    );
    assert!(matches!(c.compile(), Err(Error::Validation(ref m)) if m.contains("through")));

    let c = Constraint::new(
        "owner",
        Operator::EqualsLinkedPointer,
        params(&[("through", "manager")]),
    );
    assert!(matches!(c.compile(), Err(Error::Validation(ref m)) if m.contains("field")));

    let c = Constraint::new("owner", Operator::EqualsLinkedPointer, 7i64);
    assert!(matches!(c.compile(), Err(Error::Validation(_))));
}

#[test]
fn through_field_is_normalized_to_pointer_column() {
    let c = Constraint::new(
        "owner",
        Operator::EqualsLinkedPointer,
        params(&[("through", "team_lead"), ("field", "owner"), ("class", "Team")]),
    );
    let CompiledFragment::Pipeline(stages) = c.compile().unwrap() else {
        panic!("expected a pipeline fragment");
    };
    let Stage::AddFields(extract) = &stages[0] else { panic!("expected $addFields") };
    let wire = serde_json::to_string(&extract).unwrap();
    assert!(wire.contains("$_p_teamLead"), "got {wire}");
}
