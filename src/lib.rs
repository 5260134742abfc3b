//! docwire: client-side constraint compilation and cursor pagination for a
//! BaaS document store.
//!
//! The [`query`] module compiles `(field, operator, value)` constraints into
//! either a flat match document for the simple query endpoint or an
//! aggregation pipeline, stitches fragments into one query, validates
//! untrusted constraint input, and paginates results with a stable
//! identifier tie-break.

pub mod errors;
pub mod logger;
pub mod query;
pub mod types;

pub use errors::Error;
pub use query::{
    CompileContext, CompiledFragment, CompiledQuery, Constraint, MemoryExecutor, Operator, Order,
    PageCursor, PageExecutor, RoleGraph, SortSpec, Stage, build_query, stitch,
};
pub use types::{GeoPoint, JsonMap, Pointer, Principal, SubQuery, Value};
