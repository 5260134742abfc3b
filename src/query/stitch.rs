//! Pipeline stitcher: merges compiled fragments plus the caller's base
//! conditions into one final query. Inputs are assumed valid; all
//! validation happens upstream in the builders.

use crate::query::fragment::{CompiledFragment, CompiledQuery, Stage};
use crate::types::JsonMap;

/// Merges `extra` into `into`. A duplicate top-level key is combined under a
/// flattened `$and` wrapper instead of overwriting the earlier condition.
fn merge_direct(into: &mut JsonMap, extra: JsonMap) {
    for (key, value) in extra {
        if key == "$and" {
            // Incoming $and lists fold into the existing one.
            if let serde_json::Value::Array(items) = value {
                push_and(into, items);
            }
            continue;
        }
        if into.contains_key(&key) {
            let prior = into.remove(&key).unwrap_or_default();
            let mut clause_a = JsonMap::new();
            clause_a.insert(key.clone(), prior);
            let mut clause_b = JsonMap::new();
            clause_b.insert(key, value);
            push_and(
                into,
                vec![serde_json::Value::Object(clause_a), serde_json::Value::Object(clause_b)],
            );
        } else if and_contains_key(into, &key) {
            // The field was already folded into $and by an earlier duplicate;
            // keep flattening instead of re-introducing the top-level key.
            let mut clause = JsonMap::new();
            clause.insert(key, value);
            push_and(into, vec![serde_json::Value::Object(clause)]);
        } else {
            into.insert(key, value);
        }
    }
}

/// True when any clause of the document's `$and` list constrains `key`.
fn and_contains_key(doc: &JsonMap, key: &str) -> bool {
    match doc.get("$and") {
        Some(serde_json::Value::Array(items)) => {
            items.iter().any(|c| c.as_object().is_some_and(|m| m.contains_key(key)))
        }
        _ => false,
    }
}

/// Appends clauses to the document's `$and` list, creating it if needed and
/// flattening rather than nesting.
fn push_and(doc: &mut JsonMap, clauses: Vec<serde_json::Value>) {
    match doc.get_mut("$and") {
        Some(serde_json::Value::Array(existing)) => existing.extend(clauses),
        _ => {
            doc.insert("$and".to_owned(), serde_json::Value::Array(clauses));
        }
    }
}

/// Merges two match-stage conditions under logical AND, flattening any
/// pre-existing `$and` wrapper on either side.
fn and_merge(a: JsonMap, b: JsonMap) -> JsonMap {
    let mut clauses = Vec::new();
    for m in [a, b] {
        match unwrap_sole_and(m) {
            Ok(items) => clauses.extend(items),
            Err(whole) => clauses.push(serde_json::Value::Object(whole)),
        }
    }
    let mut out = JsonMap::new();
    out.insert("$and".to_owned(), serde_json::Value::Array(clauses));
    out
}

/// If the document is exactly `{$and: [...]}`, yields its clauses;
/// otherwise returns the document unchanged.
fn unwrap_sole_and(m: JsonMap) -> Result<Vec<serde_json::Value>, JsonMap> {
    if m.len() == 1
        && let Some(serde_json::Value::Array(items)) = m.get("$and")
    {
        return Ok(items.clone());
    }
    Err(m)
}

/// Collapses adjacent `$match` stages: an identical neighbor is dropped,
/// differing neighbors merge into a single AND stage. Any non-match stage is
/// a merge boundary and passes through untouched.
fn collapse(stages: Vec<Stage>) -> Vec<Stage> {
    let mut out: Vec<Stage> = Vec::with_capacity(stages.len());
    for stage in stages {
        if let (Some(Stage::Match(prev)), Some(cur)) = (out.last(), stage.as_match()) {
            if prev == cur {
                log::debug!("dropped duplicate adjacent $match stage");
                continue;
            }
            let Some(Stage::Match(prev)) = out.pop() else { unreachable!() };
            log::debug!("merged adjacent $match stages");
            out.push(Stage::Match(and_merge(prev, cur.clone())));
            continue;
        }
        out.push(stage);
    }
    out
}

/// Produces the final artifact from ordinary base conditions plus compiled
/// fragments, in declaration order.
///
/// All-direct input merges into a single flat document. One pipeline
/// fragment anywhere forces the aggregation form: base conditions lead as a
/// match stage, direct fragments become match stages in place, and the
/// collapse pass keeps the result minimal.
#[must_use]
pub fn stitch(base: JsonMap, fragments: Vec<CompiledFragment>) -> CompiledQuery {
    if !fragments.iter().any(CompiledFragment::is_pipeline) {
        let mut doc = base;
        for fragment in fragments {
            let CompiledFragment::Direct(m) = fragment else { unreachable!() };
            merge_direct(&mut doc, m);
        }
        return CompiledQuery::Direct(doc);
    }

    let mut stages: Vec<Stage> = Vec::with_capacity(fragments.len() + 1);
    if !base.is_empty() {
        stages.push(Stage::Match(base));
    }
    for fragment in fragments {
        match fragment {
            CompiledFragment::Direct(m) => stages.push(Stage::Match(m)),
            CompiledFragment::Pipeline(run) => stages.extend(run),
        }
    }
    let stages = collapse(stages);
    CompiledQuery::Pipeline(stages.iter().map(Stage::to_wire).collect())
}
