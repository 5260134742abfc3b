//! Cross-document builders: compare a field on a document referenced by a
//! local pointer against a field on this document. Compiles to a three-stage
//! pipeline: extract the referenced id from the pointer's `Class$id`
//! composite, left-join the referenced collection, then compare through a
//! `$expr` match.

use serde_json::json;

use crate::errors::Error;
use crate::query::fragment::{CompiledFragment, Stage, map1};
use crate::types::{Value, normalize_field, pointer_column};

/// Parameters of a linked-pointer comparison, parsed out of the constraint's
/// map value. `through` (the local pointer field) and `field` (the field on
/// the joined document) are required; `class` defaults to the capitalized
/// constraint field name.
struct LinkParams {
    through: String,
    target_field: String,
    class: String,
}

fn parse_params(local_field: &str, op_tag: &str, value: &Value) -> Result<LinkParams, Error> {
    let Value::Map(params) = value else {
        return Err(Error::Validation(format!(
            "{op_tag} on `{local_field}` requires a map with `through` and `field`"
        )));
    };
    let get_str = |key: &str| -> Option<String> {
        match params.get(key) {
            Some(Value::Str(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    };
    let through = get_str("through").ok_or_else(|| {
        Error::Validation(format!("{op_tag} on `{local_field}` is missing required `through`"))
    })?;
    let target_field = get_str("field").ok_or_else(|| {
        Error::Validation(format!("{op_tag} on `{local_field}` is missing required `field`"))
    })?;
    let class = get_str("class").unwrap_or_else(|| {
        let mut chars = local_field.chars();
        chars.next().map_or_else(String::new, |c| {
            c.to_uppercase().collect::<String>() + chars.as_str()
        })
    });
    Ok(LinkParams { through, target_field, class })
}

/// `equals_linked_pointer` / `does_not_equal_linked_pointer`.
pub(crate) fn linked_pointer(
    local_field: &str,
    value: &Value,
    negate: bool,
) -> Result<CompiledFragment, Error> {
    let op_tag =
        if negate { "does_not_equal_linked_pointer" } else { "equals_linked_pointer" };
    let params = parse_params(local_field, op_tag, value)?;
    let through_col = pointer_column(&params.through);
    let target = normalize_field(&params.target_field);

    // Hidden working fields; double underscore keeps them out of the
    // caller's namespace and they never appear in returned documents.
    let id_field = format!("__{local_field}_link_id");
    let doc_field = format!("__{local_field}_link_doc");

    let extract = Stage::AddFields(map1(
        &id_field,
        json!({ "$arrayElemAt": [{ "$split": [format!("${through_col}"), "$"] }, 1] }),
    ));
    let lookup = Stage::Lookup {
        from: params.class,
        local_field: id_field,
        foreign_field: "_id".to_owned(),
        as_field: doc_field.clone(),
    };
    let cmp = if negate { "$ne" } else { "$eq" };
    let compare = Stage::Match(map1(
        "$expr",
        json!({ cmp: [
            { "$arrayElemAt": [format!("${doc_field}.{target}"), 0] },
            format!("${local_field}"),
        ]}),
    ));
    Ok(CompiledFragment::Pipeline(vec![extract, lookup, compare]))
}
