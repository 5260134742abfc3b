//! Direct-match evaluation over wire documents, plus an in-memory
//! [`PageExecutor`] built on it. This keeps the crate usable and testable
//! without the HTTP collaborator; the evaluator understands exactly the
//! operator subset the direct compilation path emits.

use std::cmp::Ordering;

use crate::errors::Error;
use crate::query::cursor::{Order, PageExecutor, SortSpec};
use crate::query::fragment::CompiledQuery;
use crate::types::JsonMap;

const MAX_PATH_DEPTH: usize = 32;

/// Evaluates a flat match document against one wire document.
#[must_use]
pub fn eval_direct(doc: &JsonMap, query: &JsonMap) -> bool {
    query.iter().all(|(key, cond)| match key.as_str() {
        "$and" => clauses(cond).iter().all(|c| eval_direct(doc, c)),
        "$or" => clauses(cond).iter().any(|c| eval_direct(doc, c)),
        "$nor" => !clauses(cond).iter().any(|c| eval_direct(doc, c)),
        _ => eval_condition(get_path(doc, key), cond),
    })
}

fn clauses(cond: &serde_json::Value) -> Vec<JsonMap> {
    match cond {
        serde_json::Value::Array(items) => {
            items.iter().filter_map(|i| i.as_object().cloned()).collect()
        }
        _ => Vec::new(),
    }
}

fn eval_condition(actual: Option<&serde_json::Value>, cond: &serde_json::Value) -> bool {
    if let Some(ops) = cond.as_object()
        && ops.keys().any(|k| k.starts_with('$'))
    {
        return ops.iter().all(|(op, v)| eval_op(actual, op, v));
    }
    // The store treats `{field: null}` as matching an absent field too.
    match actual {
        Some(a) => json_eq(a, cond),
        None => cond.is_null(),
    }
}

fn eval_op(actual: Option<&serde_json::Value>, op: &str, v: &serde_json::Value) -> bool {
    match op {
        "$eq" => actual.map_or(v.is_null(), |a| json_eq(a, v)),
        "$ne" => !actual.map_or(v.is_null(), |a| json_eq(a, v)),
        "$gt" => ordered(actual, v, |o| o == Ordering::Greater),
        "$gte" => ordered(actual, v, |o| o != Ordering::Less),
        "$lt" => ordered(actual, v, |o| o == Ordering::Less),
        "$lte" => ordered(actual, v, |o| o != Ordering::Greater),
        "$in" => {
            actual.is_some_and(|a| set_of(v).iter().any(|x| json_eq(a, x)))
        }
        "$nin" => !actual.is_some_and(|a| set_of(v).iter().any(|x| json_eq(a, x))),
        "$all" => actual.and_then(serde_json::Value::as_array).is_some_and(|have| {
            set_of(v).iter().all(|want| have.iter().any(|h| json_eq(h, want)))
        }),
        "$exists" => v.as_bool().is_some_and(|want| actual.is_some() == want),
        "$regex" => match (actual.and_then(serde_json::Value::as_str), v.as_str()) {
            (Some(s), Some(pattern)) => {
                regex::Regex::new(pattern).is_ok_and(|re| re.is_match(s))
            }
            _ => false,
        },
        _ => false,
    }
}

fn set_of(v: &serde_json::Value) -> Vec<serde_json::Value> {
    match v {
        serde_json::Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

fn ordered(
    actual: Option<&serde_json::Value>,
    v: &serde_json::Value,
    accept: impl Fn(Ordering) -> bool,
) -> bool {
    actual.is_some_and(|a| json_cmp(a, v).is_some_and(accept))
}

fn get_path<'a>(doc: &'a JsonMap, path: &str) -> Option<&'a serde_json::Value> {
    let mut iter = path.split('.');
    let first = iter.next()?;
    let mut depth = 1usize;
    let mut cur = doc.get(first);
    for part in iter {
        depth += 1;
        if depth > MAX_PATH_DEPTH {
            return None;
        }
        match cur {
            Some(serde_json::Value::Object(m)) => cur = m.get(part),
            _ => return None,
        }
    }
    cur
}

/// The `iso` string of a `__type: Date` envelope, when the value is one.
fn date_iso(v: &serde_json::Value) -> Option<&str> {
    let obj = v.as_object()?;
    if obj.get("__type").and_then(serde_json::Value::as_str) == Some("Date") {
        obj.get("iso").and_then(serde_json::Value::as_str)
    } else {
        None
    }
}

fn json_eq(a: &serde_json::Value, b: &serde_json::Value) -> bool {
    json_cmp(a, b).map_or_else(|| a == b, |o| o == Ordering::Equal)
}

/// Ordering across the comparable wire shapes: numbers, strings, booleans,
/// and Date envelopes (RFC3339 strings order chronologically).
fn json_cmp(a: &serde_json::Value, b: &serde_json::Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y);
    }
    if let (Some(x), Some(y)) = (date_iso(a), date_iso(b)) {
        return Some(x.cmp(y));
    }
    match (a, b) {
        (serde_json::Value::String(x), serde_json::Value::String(y)) => Some(x.cmp(y)),
        (serde_json::Value::Bool(x), serde_json::Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn compare_rows(a: &JsonMap, b: &JsonMap, specs: &[SortSpec]) -> Ordering {
    for spec in specs {
        let av = get_path(a, &spec.field);
        let bv = get_path(b, &spec.field);
        let ord = match (av, bv) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => json_cmp(x, y).unwrap_or(Ordering::Equal),
        };
        if ord != Ordering::Equal {
            return if spec.order == Order::Asc { ord } else { ord.reverse() };
        }
    }
    Ordering::Equal
}

/// In-memory page executor over a fixed set of wire documents. Supports the
/// direct query form only; aggregation pipelines need the real store.
pub struct MemoryExecutor {
    rows: Vec<JsonMap>,
}

impl MemoryExecutor {
    #[must_use]
    pub fn new(rows: Vec<JsonMap>) -> Self {
        Self { rows }
    }
}

impl PageExecutor for MemoryExecutor {
    fn fetch(
        &self,
        _class_name: &str,
        query: &CompiledQuery,
        order: &[SortSpec],
        limit: usize,
    ) -> Result<Vec<JsonMap>, Error> {
        let CompiledQuery::Direct(q) = query else {
            return Err(Error::Executor(
                "aggregation pipelines are not supported by the in-memory executor".to_owned(),
            ));
        };
        let mut rows: Vec<JsonMap> =
            self.rows.iter().filter(|r| eval_direct(r, q)).cloned().collect();
        rows.sort_by(|a, b| compare_rows(a, b, order));
        rows.truncate(limit);
        Ok(rows)
    }
}
