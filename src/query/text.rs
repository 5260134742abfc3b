//! Regex and text-search builders.
//!
//! Raw patterns pass through the pattern-safety check unconditionally, not
//! only on the untrusted path: a catastrophic-backtracking pattern hurts the
//! store the same regardless of who wrote it. `starts_with`/`contains`
//! escape their input first, so user text can never inject regex syntax.

use serde_json::json;

use crate::errors::Error;
use crate::query::fragment::{CompiledFragment, map1};
use crate::query::guard::{GuardConfig, check_pattern};
use crate::types::Value;

fn str_value<'a>(field: &str, op_tag: &str, value: &'a Value) -> Result<&'a str, Error> {
    match value {
        Value::Str(s) => Ok(s),
        _ => Err(Error::Validation(format!("{op_tag} on `{field}` requires a string value"))),
    }
}

/// `like`: a raw regex pattern, safety-checked before it is emitted.
pub(crate) fn like(field: &str, value: &Value) -> Result<CompiledFragment, Error> {
    let pattern = str_value(field, "like", value)?;
    check_pattern(pattern, &GuardConfig::default())?;
    Ok(CompiledFragment::Direct(map1(field, json!({ "$regex": pattern }))))
}

/// `starts_with`: anchored match on escaped literal text.
pub(crate) fn starts_with(field: &str, value: &Value) -> Result<CompiledFragment, Error> {
    let text = str_value(field, "starts_with", value)?;
    let pattern = format!("^{}", regex::escape(text));
    Ok(CompiledFragment::Direct(map1(field, json!({ "$regex": pattern }))))
}

/// `contains`: unanchored match on escaped literal text.
pub(crate) fn contains(field: &str, value: &Value) -> Result<CompiledFragment, Error> {
    let text = str_value(field, "contains", value)?;
    Ok(CompiledFragment::Direct(map1(field, json!({ "$regex": regex::escape(text) }))))
}

/// `text_search`: the store's full-text operator; no regex involved.
pub(crate) fn text_search(field: &str, value: &Value) -> Result<CompiledFragment, Error> {
    let term = str_value(field, "text_search", value)?;
    Ok(CompiledFragment::Direct(map1(
        field,
        json!({ "$text": { "$search": { "$term": term } } }),
    )))
}
