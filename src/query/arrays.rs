//! Array-shape builders. The simple query endpoint cannot express any of
//! these, so every builder emits a `$match` pipeline stage built around
//! `$expr`. Missing fields are defaulted to `[]` with `$ifNull` so a size
//! test on an absent array behaves like a size test on an empty one.

use serde_json::json;

use crate::errors::Error;
use crate::query::fragment::{CompiledFragment, Stage, map1};
use crate::query::operator::Operator;
use crate::types::Value;

fn size_expr(field: &str) -> serde_json::Value {
    json!({ "$size": { "$ifNull": [format!("${field}"), []] } })
}

fn array_expr(field: &str) -> serde_json::Value {
    json!({ "$ifNull": [format!("${field}"), []] })
}

fn expr_match(expr: serde_json::Value) -> CompiledFragment {
    CompiledFragment::Pipeline(vec![Stage::Match(map1("$expr", expr))])
}

fn non_negative(field: &str, value: &Value) -> Result<i64, Error> {
    match value {
        Value::Int(n) if *n >= 0 => Ok(*n),
        Value::Int(n) => {
            Err(Error::Validation(format!("size on `{field}` must be non-negative, got {n}")))
        }
        _ => Err(Error::Validation(format!("size on `{field}` requires an integer"))),
    }
}

/// `size`: exact integer, or a map of relational sub-operators combined
/// under `$and`. All bounds are validated non-negative.
pub(crate) fn size(field: &str, value: &Value) -> Result<CompiledFragment, Error> {
    match value {
        Value::Int(_) => {
            let n = non_negative(field, value)?;
            Ok(expr_match(json!({ "$eq": [size_expr(field), n] })))
        }
        Value::Map(subs) => {
            if subs.is_empty() {
                return Err(Error::Validation(format!(
                    "size on `{field}` requires at least one sub-operator"
                )));
            }
            let mut clauses = Vec::with_capacity(subs.len());
            // BTreeMap iteration keeps sub-operator order deterministic.
            for (tag, bound) in subs {
                let wire = match Operator::resolve(tag)? {
                    op @ (Operator::Eq
                    | Operator::Ne
                    | Operator::Lt
                    | Operator::Lte
                    | Operator::Gt
                    | Operator::Gte) => op.wire().unwrap_or("$eq"),
                    other => {
                        return Err(Error::Validation(format!(
                            "size on `{field}` does not accept sub-operator `{}`",
                            other.tag()
                        )));
                    }
                };
                let n = non_negative(field, bound)?;
                clauses.push(json!({ wire: [size_expr(field), n] }));
            }
            if clauses.len() == 1 {
                let only = clauses.pop().unwrap_or_default();
                Ok(expr_match(only))
            } else {
                Ok(expr_match(json!({ "$and": clauses })))
            }
        }
        _ => Err(Error::Validation(format!(
            "size on `{field}` requires an integer or a map of relational bounds"
        ))),
    }
}

/// `arr_empty`: boolean-only operator. `true` also matches a missing field,
/// which the store treats as an empty array.
pub(crate) fn arr_empty(field: &str, value: &Value) -> Result<CompiledFragment, Error> {
    let Value::Bool(empty) = value else {
        return Err(Error::Validation(format!(
            "arr_empty on `{field}` requires a boolean value"
        )));
    };
    if *empty {
        let cond = json!({ "$or": [
            { field: { "$exists": false } },
            { "$expr": { "$eq": [size_expr(field), 0] } },
        ]});
        let serde_json::Value::Object(m) = cond else { unreachable!() };
        Ok(CompiledFragment::Pipeline(vec![Stage::Match(m)]))
    } else {
        Ok(expr_match(json!({ "$gt": [size_expr(field), 0] })))
    }
}

fn literal_ids(value: &Value) -> Vec<serde_json::Value> {
    value.as_list().iter().map(Value::to_id_wire).collect()
}

/// `set_equals`: order-insensitive array equality. Pointer elements reduce
/// to their object id before comparison.
pub(crate) fn set_equals(field: &str, value: &Value) -> CompiledFragment {
    expr_match(json!({ "$setEquals": [array_expr(field), literal_ids(value)] }))
}

/// `eq_array` / `neq_array`: order-sensitive array (in)equality. Same
/// pointer reduction as `set_equals`; only the order sensitivity differs.
pub(crate) fn eq_array(field: &str, value: &Value, negate: bool) -> CompiledFragment {
    let op = if negate { "$ne" } else { "$eq" };
    expr_match(json!({ op: [format!("${field}"), literal_ids(value)] }))
}

/// `subset_of`: every element of the field is contained in the given set.
pub(crate) fn subset_of(field: &str, value: &Value) -> CompiledFragment {
    expr_match(json!({ "$setIsSubset": [array_expr(field), literal_ids(value)] }))
}

/// `first` / `last`: compare one extremal element of the array.
pub(crate) fn element_at(field: &str, value: &Value, last: bool) -> CompiledFragment {
    let idx = if last { -1 } else { 0 };
    expr_match(json!({ "$eq": [
        { "$arrayElemAt": [format!("${field}"), idx] },
        value.to_id_wire(),
    ]}))
}

/// `elem_match`: a map of comparison sub-operators applied to individual
/// array elements.
pub(crate) fn elem_match(field: &str, value: &Value) -> Result<CompiledFragment, Error> {
    let Value::Map(subs) = value else {
        return Err(Error::Validation(format!(
            "elem_match on `{field}` requires a map of sub-operators"
        )));
    };
    if subs.is_empty() {
        return Err(Error::Validation(format!(
            "elem_match on `{field}` requires at least one sub-operator"
        )));
    }
    let mut body = crate::types::JsonMap::new();
    for (tag, v) in subs {
        let op = Operator::resolve(tag)?;
        let wire = match op {
            Operator::Eq
            | Operator::Ne
            | Operator::Lt
            | Operator::Lte
            | Operator::Gt
            | Operator::Gte
            | Operator::In
            | Operator::Nin
            | Operator::Exists => op.wire().unwrap_or("$eq"),
            other => {
                return Err(Error::Validation(format!(
                    "elem_match on `{field}` does not accept sub-operator `{}`",
                    other.tag()
                )));
            }
        };
        let wired = match op {
            Operator::In | Operator::Nin => {
                serde_json::Value::Array(v.as_list().iter().map(Value::to_reference_wire).collect())
            }
            _ => v.to_reference_wire(),
        };
        body.insert(wire.to_owned(), wired);
    }
    Ok(CompiledFragment::Pipeline(vec![Stage::Match(map1(
        field,
        json!({ "$elemMatch": body }),
    ))]))
}
