//! Permission-filter builders. The permission columns (`_rperm`/`_wperm`)
//! are only queryable through the aggregation endpoint, so every builder
//! here emits a single `$match` pipeline stage.
//!
//! Two store conventions shape the output: the public wildcard `*` satisfies
//! any principal, and a document with no permission column at all is
//! historically public. An explicitly empty permission list is the opposite
//! of both: visible to no one.

use std::collections::BTreeMap;

use serde_json::json;

use crate::errors::Error;
use crate::query::fragment::{CompiledFragment, Stage};
use crate::query::operator::Operator;
use crate::types::{Principal, Value};

/// Maximum transitive role expansion depth; bounds traversal of cyclic role
/// graphs.
pub const MAX_ROLE_DEPTH: usize = 5;

/// In-memory role hierarchy: a child role's members inherit the parent
/// role's grants.
#[derive(Debug, Clone, Default)]
pub struct RoleGraph {
    children: BTreeMap<String, Vec<String>>,
}

impl RoleGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_child(&mut self, role: &str, child: &str) {
        self.children.entry(role.to_owned()).or_default().push(child.to_owned());
    }

    /// All role names granted by `root`, itself included, visited
    /// breadth-first to at most `max_depth` levels. Revisits are skipped, so
    /// cyclic graphs terminate; output is sorted for determinism.
    #[must_use]
    pub fn expand(&self, root: &str, max_depth: usize) -> Vec<String> {
        let mut seen = vec![root.to_owned()];
        let mut frontier = vec![root.to_owned()];
        for _ in 0..max_depth {
            let mut next = Vec::new();
            for role in &frontier {
                for child in self.children.get(role).map_or(&[][..], Vec::as_slice) {
                    if !seen.contains(child) {
                        seen.push(child.clone());
                        next.push(child.clone());
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        seen.sort();
        seen
    }
}

/// Converts a constraint value to a principal, per operator.
///
/// `readable_by`/`writable_by` accept a user id string, a `*` wildcard, an
/// already-formatted `role:` key, or a pointer; the `_by_role` variants take
/// a bare role name.
pub(crate) fn principal_from_value(op: Operator, value: &Value) -> Result<Principal, Error> {
    let role_variant = matches!(op, Operator::ReadableByRole | Operator::WritableByRole);
    match value {
        Value::Str(s) if s == "*" => Ok(Principal::Wildcard),
        Value::Str(s) if role_variant => Ok(Principal::Role(s.clone())),
        Value::Str(s) if s.starts_with("role:") => Ok(Principal::RawKey(s.clone())),
        Value::Str(s) => Ok(Principal::User(s.clone())),
        Value::Pointer(p) if p.class_name == "_Role" => Ok(Principal::Role(p.object_id.clone())),
        Value::Pointer(p) => Ok(Principal::PointerRef(p.clone())),
        _ => Err(Error::Validation(format!(
            "{} requires a user id, role name, pointer or `*`",
            op.tag()
        ))),
    }
}

const fn perm_column(op: Operator) -> &'static str {
    match op {
        Operator::WritableBy | Operator::WritableByRole => "_wperm",
        _ => "_rperm",
    }
}

/// The full key set a principal matches: its own key, transitively granted
/// role keys, and always the public wildcard.
fn match_keys(principal: &Principal, roles: Option<&RoleGraph>, depth: usize) -> Vec<String> {
    let mut keys = match principal {
        Principal::Role(name) => match roles {
            Some(graph) => {
                graph.expand(name, depth).into_iter().map(|r| format!("role:{r}")).collect()
            }
            None => vec![principal.to_key()],
        },
        other => vec![other.to_key()],
    };
    if !keys.iter().any(|k| k == "*") {
        keys.push("*".to_owned());
    }
    keys
}

/// `readable_by` / `writable_by` and the role-qualified variants.
pub(crate) fn permission(
    op: Operator,
    value: &Value,
    roles: Option<&RoleGraph>,
    depth: usize,
) -> Result<CompiledFragment, Error> {
    let principal = principal_from_value(op, value)?;
    let column = perm_column(op);
    let keys = match_keys(&principal, roles, depth);
    // Absent column is public, so presence of any matching key OR no column
    // at all satisfies the constraint.
    let cond = json!({ "$or": [
        { column: { "$exists": false } },
        { column: { "$in": keys } },
    ]});
    let serde_json::Value::Object(m) = cond else { unreachable!() };
    Ok(CompiledFragment::Pipeline(vec![Stage::Match(m)]))
}

/// `private_acl`: `true` selects documents not publicly readable (the
/// permission column exists and lacks the wildcard); `false` selects the
/// effectively-public complement, including documents with no column.
pub(crate) fn private_acl(value: &Value) -> Result<CompiledFragment, Error> {
    let Value::Bool(private) = value else {
        return Err(Error::Validation("private_acl requires a boolean value".to_owned()));
    };
    let cond = if *private {
        json!({ "$and": [
            { "_rperm": { "$exists": true } },
            { "_rperm": { "$nin": ["*"] } },
        ]})
    } else {
        json!({ "$or": [
            { "_rperm": { "$exists": false } },
            { "_rperm": { "$in": ["*"] } },
        ]})
    };
    let serde_json::Value::Object(m) = cond else { unreachable!() };
    Ok(CompiledFragment::Pipeline(vec![Stage::Match(m)]))
}

/// Matches documents the principal can *not* read: the permission column
/// must exist and be an explicitly empty list, or exist without any of the
/// principal's keys. Both the empty-set and the keyless conditions are
/// required; an absent column would be public.
pub fn not_readable_by(
    value: &Value,
    roles: Option<&RoleGraph>,
    depth: usize,
) -> Result<CompiledFragment, Error> {
    let principal = principal_from_value(Operator::ReadableBy, value)?;
    let keys = match_keys(&principal, roles, depth);
    let cond = json!({ "$and": [
        { "_rperm": { "$exists": true } },
        { "$or": [
            { "_rperm": { "$eq": [] } },
            { "_rperm": { "$nin": keys } },
        ]},
    ]});
    let serde_json::Value::Object(m) = cond else { unreachable!() };
    Ok(CompiledFragment::Pipeline(vec![Stage::Match(m)]))
}
