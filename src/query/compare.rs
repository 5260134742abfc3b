//! Comparison, equality and containment builders. Everything here is
//! expressible by the simple query endpoint, so all outputs are
//! `CompiledFragment::Direct`.

use serde_json::json;

use crate::errors::Error;
use crate::query::fragment::{CompiledFragment, map1};
use crate::query::operator::Operator;
use crate::types::Value;

// Mirror of the store's own cap on $in/$nin sets.
pub(crate) const MAX_IN_SET: usize = 1000;

/// `lt/lte/gt/gte/ne`: value formatted per its tagged type under the wire
/// keyword.
pub(crate) fn comparison(field: &str, op: Operator, value: &Value) -> Result<CompiledFragment, Error> {
    let wire = op
        .wire()
        .ok_or_else(|| Error::Validation(format!("{} has no wire keyword", op.tag())))?;
    Ok(CompiledFragment::Direct(map1(
        field,
        json!({ wire: value.to_reference_wire() }),
    )))
}

/// Plain equality: the bare wire value, no operator wrapper.
pub(crate) fn equality(field: &str, value: &Value) -> CompiledFragment {
    CompiledFragment::Direct(map1(field, value.to_reference_wire()))
}

/// `exists`: value must be a boolean.
pub(crate) fn exists(field: &str, value: &Value) -> Result<CompiledFragment, Error> {
    let Value::Bool(b) = value else {
        return Err(Error::Validation(format!(
            "exists on `{field}` requires a boolean value"
        )));
    };
    Ok(CompiledFragment::Direct(map1(field, json!({ "$exists": b }))))
}

/// `in/nin/all`: scalar input is wrapped as a singleton, pointer entries are
/// reduced to their reference form. A `Value::Query` input compiles to the
/// `$inQuery`/`$notInQuery` envelope instead of a literal set.
pub(crate) fn containment(field: &str, op: Operator, value: &Value) -> Result<CompiledFragment, Error> {
    if let Value::Query(sub) = value {
        let keyword = match op {
            Operator::In => "$inQuery",
            Operator::Nin => "$notInQuery",
            Operator::All => {
                return Err(Error::Validation(format!(
                    "all on `{field}` does not accept a sub-query"
                )));
            }
            _ => unreachable!("containment called with {:?}", op),
        };
        return Ok(CompiledFragment::Direct(map1(field, json!({ keyword: sub.to_wire() }))));
    }
    let items = value.as_list();
    if items.len() > MAX_IN_SET {
        return Err(Error::Validation(format!(
            "{} on `{field}` exceeds the {MAX_IN_SET}-element set limit",
            op.tag()
        )));
    }
    let wire = op
        .wire()
        .ok_or_else(|| Error::Validation(format!("{} has no wire keyword", op.tag())))?;
    let wired: Vec<serde_json::Value> = items.iter().map(Value::to_reference_wire).collect();
    Ok(CompiledFragment::Direct(map1(field, json!({ wire: wired }))))
}
