use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// Every operator the constraint DSL understands.
///
/// A closed enum instead of open registration: adding an operator without
/// handling it in the builder dispatch is a compile error, and the tag table
/// below fails fast on duplicates the first time it is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    // comparison / range
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Exists,
    // containment
    In,
    Nin,
    All,
    // array shape (aggregation only)
    Size,
    ArrEmpty,
    SetEquals,
    EqArray,
    NeqArray,
    ElemMatch,
    SubsetOf,
    First,
    Last,
    // permission filters (aggregation only)
    ReadableBy,
    WritableBy,
    ReadableByRole,
    WritableByRole,
    PrivateAcl,
    // cross-document (aggregation only)
    EqualsLinkedPointer,
    DoesNotEqualLinkedPointer,
    // geo
    Near,
    WithinBox,
    WithinPolygon,
    // text / regex
    Like,
    StartsWith,
    Contains,
    TextSearch,
}

/// Registry entry for one operator: its DSL tag, the wire keyword it maps to
/// on the direct path (if any), and whether it can only be expressed as an
/// aggregation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorSpec {
    pub tag: &'static str,
    pub wire: Option<&'static str>,
    pub op: Operator,
    pub pipeline_only: bool,
}

impl Operator {
    pub const ALL: &'static [Operator] = &[
        Self::Eq,
        Self::Ne,
        Self::Lt,
        Self::Lte,
        Self::Gt,
        Self::Gte,
        Self::Exists,
        Self::In,
        Self::Nin,
        Self::All,
        Self::Size,
        Self::ArrEmpty,
        Self::SetEquals,
        Self::EqArray,
        Self::NeqArray,
        Self::ElemMatch,
        Self::SubsetOf,
        Self::First,
        Self::Last,
        Self::ReadableBy,
        Self::WritableBy,
        Self::ReadableByRole,
        Self::WritableByRole,
        Self::PrivateAcl,
        Self::EqualsLinkedPointer,
        Self::DoesNotEqualLinkedPointer,
        Self::Near,
        Self::WithinBox,
        Self::WithinPolygon,
        Self::Like,
        Self::StartsWith,
        Self::Contains,
        Self::TextSearch,
    ];

    #[must_use]
    pub const fn spec(self) -> OperatorSpec {
        macro_rules! spec {
            ($tag:literal, $wire:expr, $pipe:literal) => {
                OperatorSpec { tag: $tag, wire: $wire, op: self, pipeline_only: $pipe }
            };
        }
        match self {
            Self::Eq => spec!("eq", Some("$eq"), false),
            Self::Ne => spec!("ne", Some("$ne"), false),
            Self::Lt => spec!("lt", Some("$lt"), false),
            Self::Lte => spec!("lte", Some("$lte"), false),
            Self::Gt => spec!("gt", Some("$gt"), false),
            Self::Gte => spec!("gte", Some("$gte"), false),
            Self::Exists => spec!("exists", Some("$exists"), false),
            Self::In => spec!("in", Some("$in"), false),
            Self::Nin => spec!("nin", Some("$nin"), false),
            Self::All => spec!("all", Some("$all"), false),
            Self::Size => spec!("size", None, true),
            Self::ArrEmpty => spec!("arr_empty", None, true),
            Self::SetEquals => spec!("set_equals", None, true),
            Self::EqArray => spec!("eq_array", None, true),
            Self::NeqArray => spec!("neq_array", None, true),
            Self::ElemMatch => spec!("elem_match", Some("$elemMatch"), true),
            Self::SubsetOf => spec!("subset_of", None, true),
            Self::First => spec!("first", None, true),
            Self::Last => spec!("last", None, true),
            Self::ReadableBy => spec!("readable_by", None, true),
            Self::WritableBy => spec!("writable_by", None, true),
            Self::ReadableByRole => spec!("readable_by_role", None, true),
            Self::WritableByRole => spec!("writable_by_role", None, true),
            Self::PrivateAcl => spec!("private_acl", None, true),
            Self::EqualsLinkedPointer => spec!("equals_linked_pointer", None, true),
            Self::DoesNotEqualLinkedPointer => {
                spec!("does_not_equal_linked_pointer", None, true)
            }
            Self::Near => spec!("near", Some("$nearSphere"), false),
            Self::WithinBox => spec!("within_box", Some("$within"), false),
            Self::WithinPolygon => spec!("within_polygon", Some("$geoWithin"), false),
            Self::Like => spec!("like", Some("$regex"), false),
            Self::StartsWith => spec!("starts_with", Some("$regex"), false),
            Self::Contains => spec!("contains", Some("$regex"), false),
            Self::TextSearch => spec!("text_search", Some("$text"), false),
        }
    }

    #[must_use]
    pub const fn tag(self) -> &'static str {
        self.spec().tag
    }

    #[must_use]
    pub const fn wire(self) -> Option<&'static str> {
        self.spec().wire
    }

    #[must_use]
    pub const fn is_pipeline_only(self) -> bool {
        self.spec().pipeline_only
    }

    /// Looks up an operator by DSL tag. Accepts the canonical tags plus the
    /// alias spellings; `tag()` always reports the canonical name.
    ///
    /// # Errors
    /// `Error::UnknownOperator` when the tag is not registered.
    pub fn resolve(tag: &str) -> Result<Self, Error> {
        REGISTRY.get(tag).copied().ok_or_else(|| Error::UnknownOperator(tag.to_owned()))
    }
}

/// Alternate caller-facing spellings, each resolving to an existing
/// operator.
const ALIASES: &[(&str, Operator)] = &[("neq", Operator::NeqArray), ("regex", Operator::Like)];

// Built once at first use. A duplicate tag is a programming error and panics
// here, at process start, not at query time.
static REGISTRY: Lazy<HashMap<&'static str, Operator>> = Lazy::new(|| {
    let mut table = HashMap::with_capacity(Operator::ALL.len() + ALIASES.len());
    for &op in Operator::ALL {
        let spec = op.spec();
        assert!(
            table.insert(spec.tag, op).is_none(),
            "duplicate operator tag registered: {}",
            spec.tag
        );
    }
    for &(alias, op) in ALIASES {
        assert!(
            table.insert(alias, op).is_none(),
            "operator alias shadows a registered tag: {alias}"
        );
    }
    table
});
