//! Cursor pagination over compiled queries.
//!
//! A [`PageCursor`] owns its traversal state and is not safe to share
//! between callers; concurrent pagination over the same logical dataset
//! should use independent cursors. The only blocking call is the page fetch
//! performed by the [`PageExecutor`] collaborator.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::Error;
use crate::query::fragment::{CompiledQuery, map1};
use crate::query::{CompileContext, Constraint, compile_all, stitch};
use crate::types::{JsonMap, normalize_field};

pub const MAX_PAGE_SIZE: usize = 1000;
pub const DEFAULT_ORDER_FIELD: &str = "createdAt";

const ID_FIELD: &str = "objectId";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

/// The external client seam: executes one compiled query against a class
/// and returns at most `limit` wire documents in the requested order.
pub trait PageExecutor {
    /// # Errors
    /// Any transport or store failure, surfaced as `Error::Executor`.
    fn fetch(
        &self,
        class_name: &str,
        query: &CompiledQuery,
        order: &[SortSpec],
        limit: usize,
    ) -> Result<Vec<JsonMap>, Error>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Position {
    last_order_value: serde_json::Value,
    last_object_id: String,
}

// The serializable whole of a cursor: restoring this plus the original
// executor reproduces the traversal exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CursorState {
    class_name: String,
    constraints: Vec<Constraint>,
    page_size: usize,
    order: SortSpec,
    position: Option<Position>,
    pages_fetched: u64,
    items_fetched: u64,
    exhausted: bool,
}

/// Forward-only cursor producing successive tie-broken page queries.
pub struct PageCursor {
    executor: Arc<dyn PageExecutor>,
    state: CursorState,
}

impl std::fmt::Debug for PageCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageCursor")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl PageCursor {
    /// Builds a cursor over `constraints` against `class_name`.
    ///
    /// The page size is clamped up to 1 and rejected above
    /// [`MAX_PAGE_SIZE`]. The ordering defaults to [`DEFAULT_ORDER_FIELD`]
    /// ascending when omitted; a secondary identifier tie-break is always
    /// applied unless the chosen field already is the identifier.
    ///
    /// # Errors
    /// `Error::Validation` for a page size above the limit.
    pub fn new(
        executor: Arc<dyn PageExecutor>,
        class_name: &str,
        constraints: Vec<Constraint>,
        page_size: usize,
        order: Option<SortSpec>,
    ) -> Result<Self, Error> {
        if page_size > MAX_PAGE_SIZE {
            return Err(Error::Validation(format!(
                "page size {page_size} exceeds maximum {MAX_PAGE_SIZE}"
            )));
        }
        let order = order.map_or_else(
            || SortSpec { field: DEFAULT_ORDER_FIELD.to_owned(), order: Order::Asc },
            |s| SortSpec { field: normalize_field(&s.field), order: s.order },
        );
        Ok(Self {
            executor,
            state: CursorState {
                class_name: class_name.to_owned(),
                constraints,
                page_size: page_size.max(1),
                order,
                position: None,
                pages_fetched: 0,
                items_fetched: 0,
                exhausted: false,
            },
        })
    }

    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.state.class_name
    }

    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.state.page_size
    }

    #[must_use]
    pub const fn pages_fetched(&self) -> u64 {
        self.state.pages_fetched
    }

    #[must_use]
    pub const fn items_fetched(&self) -> u64 {
        self.state.items_fetched
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.state.exhausted
    }

    /// Full ordering sent with each page query: the caller's field plus the
    /// identifier tie-break in the same direction.
    #[must_use]
    pub fn order_spec(&self) -> Vec<SortSpec> {
        let mut specs = vec![self.state.order.clone()];
        if self.state.order.field != ID_FIELD {
            specs.push(SortSpec { field: ID_FIELD.to_owned(), order: self.state.order.order });
        }
        specs
    }

    // "(order field strictly beyond last value) OR (order field equal AND
    // identifier strictly beyond last identifier)", with "beyond" following
    // the scan direction. This composite disjunction is what keeps rows with
    // duplicate order values from being skipped or fetched twice.
    fn tie_break(&self, pos: &Position) -> JsonMap {
        let beyond = match self.state.order.order {
            Order::Asc => "$gt",
            Order::Desc => "$lt",
        };
        let field = self.state.order.field.as_str();
        let last_value = pos.last_order_value.clone();
        let last_id = pos.last_object_id.clone();
        if field == ID_FIELD {
            return map1(ID_FIELD, json!({ beyond: last_id }));
        }
        map1(
            "$or",
            json!([
                { field: { beyond: last_value.clone() } },
                { "$and": [
                    { field: last_value },
                    { ID_FIELD: { beyond: last_id } },
                ]},
            ]),
        )
    }

    /// The query the next `next_page` call would execute. Exposed for
    /// inspection and testing; building it never mutates the cursor.
    ///
    /// # Errors
    /// Compilation errors from the base constraint set.
    pub fn page_query(&self) -> Result<CompiledQuery, Error> {
        let mut fragments = compile_all(&self.state.constraints, &CompileContext::default())?;
        if let Some(pos) = &self.state.position {
            fragments.push(crate::query::CompiledFragment::Direct(self.tie_break(pos)));
        }
        Ok(stitch(JsonMap::new(), fragments))
    }

    /// Fetches the next page and advances the cursor position to its last
    /// row. Returns an empty page once exhausted; a page shorter than the
    /// page size marks the cursor exhausted, a full page does not (the next
    /// call issues one more fetch).
    ///
    /// # Errors
    /// Compilation errors, executor failures, or a returned row missing the
    /// identifier needed for the tie-break.
    pub fn next_page(&mut self) -> Result<Vec<JsonMap>, Error> {
        if self.state.exhausted {
            return Ok(Vec::new());
        }
        let query = self.page_query()?;
        let rows = self.executor.fetch(
            &self.state.class_name,
            &query,
            &self.order_spec(),
            self.state.page_size,
        )?;
        self.state.pages_fetched += 1;
        self.state.items_fetched += rows.len() as u64;
        if rows.len() < self.state.page_size {
            self.state.exhausted = true;
        }
        if let Some(last) = rows.last() {
            let last_object_id = last
                .get(ID_FIELD)
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| {
                    Error::CursorState(format!("page row is missing `{ID_FIELD}`"))
                })?
                .to_owned();
            let last_order_value =
                last.get(&self.state.order.field).cloned().unwrap_or(serde_json::Value::Null);
            self.state.position = Some(Position { last_order_value, last_object_id });
        }
        log::debug!(
            "fetched page {} ({} rows, exhausted={})",
            self.state.pages_fetched,
            rows.len(),
            self.state.exhausted
        );
        Ok(rows)
    }

    /// Lazy, forward-only sequence of pages. Empty once exhausted; never an
    /// error to re-iterate.
    pub fn pages(&mut self) -> Pages<'_> {
        Pages { cursor: self, done: false }
    }

    /// Lazy, forward-only sequence of individual items.
    pub fn items(&mut self) -> impl Iterator<Item = Result<JsonMap, Error>> + '_ {
        self.pages().flat_map(|page| match page {
            Ok(rows) => rows.into_iter().map(Ok).collect::<Vec<_>>(),
            Err(e) => vec![Err(e)],
        })
    }

    /// Returns the cursor to its initial state: position and counters
    /// cleared, ready to traverse from the start.
    pub fn reset(&mut self) {
        self.state.position = None;
        self.state.pages_fetched = 0;
        self.state.items_fetched = 0;
        self.state.exhausted = false;
    }

    /// Captures the full traversal state as an opaque string, stable across
    /// process restarts.
    ///
    /// # Errors
    /// Serialization failure only.
    pub fn serialize(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(&self.state)?)
    }

    /// Restores a cursor from [`PageCursor::serialize`] output. The restored
    /// cursor's next page equals what the original would have produced had
    /// it not been interrupted.
    ///
    /// # Errors
    /// `Error::Json` for malformed input, `Error::Validation` for an
    /// out-of-range captured page size.
    pub fn deserialize(raw: &str, executor: Arc<dyn PageExecutor>) -> Result<Self, Error> {
        let state: CursorState = serde_json::from_str(raw)?;
        if state.page_size == 0 || state.page_size > MAX_PAGE_SIZE {
            return Err(Error::Validation(format!(
                "restored page size {} out of range",
                state.page_size
            )));
        }
        Ok(Self { executor, state })
    }
}

/// Iterator over pages; see [`PageCursor::pages`].
pub struct Pages<'a> {
    cursor: &'a mut PageCursor,
    done: bool,
}

impl Iterator for Pages<'_> {
    type Item = Result<Vec<JsonMap>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.cursor.next_page() {
            Ok(rows) if rows.is_empty() => {
                self.done = true;
                None
            }
            Ok(rows) => {
                if self.cursor.is_exhausted() {
                    self.done = true;
                }
                Some(Ok(rows))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
