//! Constraint compilation and cursor pagination.
//!
//! Callers build [`Constraint`] values from `(field, operator, value)`
//! triples; [`Constraint::compile`] turns each into a [`CompiledFragment`]
//! and [`stitch`] assembles the fragments into one [`CompiledQuery`]. Which
//! output form is produced (flat match document or aggregation pipeline) is
//! decided solely by the operators used.

// The untrusted-input path is its own public surface.
pub mod guard;

mod acl;
mod arrays;
mod compare;
mod cursor;
mod eval;
mod fragment;
mod geo;
mod operator;
mod relation;
mod stitch;
mod text;

pub use acl::{MAX_ROLE_DEPTH, RoleGraph, not_readable_by};
pub use cursor::{
    DEFAULT_ORDER_FIELD, MAX_PAGE_SIZE, Order, PageCursor, PageExecutor, Pages, SortSpec,
};
pub use eval::{MemoryExecutor, eval_direct};
pub use fragment::{CompiledFragment, CompiledQuery, Stage, map1};
pub use operator::{Operator, OperatorSpec};
pub use stitch::stitch;

use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::types::{JsonMap, Value, normalize_field};

/// Context threaded through compilation. Only the permission-filter family
/// consumes it (role expansion); everything else is a pure function of the
/// constraint.
#[derive(Debug, Clone, Default)]
pub struct CompileContext {
    /// Role hierarchy for transitive permission expansion.
    pub roles: Option<RoleGraph>,
    /// Expansion depth bound; zero falls back to [`MAX_ROLE_DEPTH`].
    pub role_depth: usize,
}

impl CompileContext {
    fn depth(&self) -> usize {
        if self.role_depth == 0 { MAX_ROLE_DEPTH } else { self.role_depth }
    }
}

/// One field/operator/value triple of the query DSL. Immutable once built;
/// the field name is normalized to the wire convention exactly once, here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    field: String,
    operator: Operator,
    value: Value,
}

impl Constraint {
    #[must_use]
    pub fn new(field: &str, operator: Operator, value: impl Into<Value>) -> Self {
        Self { field: normalize_field(field), operator, value: value.into() }
    }

    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[must_use]
    pub const fn operator(&self) -> Operator {
        self.operator
    }

    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }

    /// Compiles with an empty context; see [`Constraint::compile_with`].
    ///
    /// # Errors
    /// `Error::Validation` when the value shape does not fit the operator.
    pub fn compile(&self) -> Result<CompiledFragment, Error> {
        self.compile_with(&CompileContext::default())
    }

    /// Compiles this constraint into exactly one fragment. Either the whole
    /// fragment is produced or an error is returned; there is no partial
    /// output.
    ///
    /// # Errors
    /// `Error::Validation` for a wrong-shaped value,
    /// `Error::UnsafePattern` for a rejected `like` pattern,
    /// `Error::UnknownOperator` for a bad sub-operator tag.
    pub fn compile_with(&self, ctx: &CompileContext) -> Result<CompiledFragment, Error> {
        let (f, v) = (self.field.as_str(), &self.value);
        match self.operator {
            Operator::Eq => Ok(compare::equality(f, v)),
            Operator::Ne | Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte => {
                compare::comparison(f, self.operator, v)
            }
            Operator::Exists => compare::exists(f, v),
            Operator::In | Operator::Nin | Operator::All => {
                compare::containment(f, self.operator, v)
            }
            Operator::Size => arrays::size(f, v),
            Operator::ArrEmpty => arrays::arr_empty(f, v),
            Operator::SetEquals => Ok(arrays::set_equals(f, v)),
            Operator::EqArray => Ok(arrays::eq_array(f, v, false)),
            Operator::NeqArray => Ok(arrays::eq_array(f, v, true)),
            Operator::ElemMatch => arrays::elem_match(f, v),
            Operator::SubsetOf => Ok(arrays::subset_of(f, v)),
            Operator::First => Ok(arrays::element_at(f, v, false)),
            Operator::Last => Ok(arrays::element_at(f, v, true)),
            Operator::ReadableBy
            | Operator::WritableBy
            | Operator::ReadableByRole
            | Operator::WritableByRole => {
                acl::permission(self.operator, v, ctx.roles.as_ref(), ctx.depth())
            }
            Operator::PrivateAcl => acl::private_acl(v),
            Operator::EqualsLinkedPointer => relation::linked_pointer(f, v, false),
            Operator::DoesNotEqualLinkedPointer => relation::linked_pointer(f, v, true),
            Operator::Near => geo::near(f, v),
            Operator::WithinBox => geo::within_box(f, v),
            Operator::WithinPolygon => geo::within_polygon(f, v),
            Operator::Like => text::like(f, v),
            Operator::StartsWith => text::starts_with(f, v),
            Operator::Contains => text::contains(f, v),
            Operator::TextSearch => text::text_search(f, v),
        }
    }
}

/// Compiles a constraint set in declaration order. Fails on the first bad
/// constraint; no partial output.
///
/// # Errors
/// Whatever the failing builder raised.
pub fn compile_all(
    constraints: &[Constraint],
    ctx: &CompileContext,
) -> Result<Vec<CompiledFragment>, Error> {
    constraints.iter().map(|c| c.compile_with(ctx)).collect()
}

/// Compiles and stitches in one step: the common entry point for executing
/// a query.
///
/// # Errors
/// Whatever the failing builder raised.
pub fn build_query(
    base: JsonMap,
    constraints: &[Constraint],
    ctx: &CompileContext,
) -> Result<CompiledQuery, Error> {
    let fragments = compile_all(constraints, ctx)?;
    Ok(stitch(base, fragments))
}
