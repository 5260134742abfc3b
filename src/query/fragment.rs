use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::types::JsonMap;

/// One aggregation pipeline stage, typed. `to_wire` produces the single-key
/// document form the aggregation endpoint consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stage {
    Match(JsonMap),
    AddFields(JsonMap),
    Lookup { from: String, local_field: String, foreign_field: String, as_field: String },
}

impl Stage {
    #[must_use]
    pub fn to_wire(&self) -> JsonMap {
        let mut out = JsonMap::new();
        match self {
            Self::Match(m) => {
                out.insert("$match".to_owned(), serde_json::Value::Object(m.clone()));
            }
            Self::AddFields(m) => {
                out.insert("$addFields".to_owned(), serde_json::Value::Object(m.clone()));
            }
            Self::Lookup { from, local_field, foreign_field, as_field } => {
                out.insert(
                    "$lookup".to_owned(),
                    json!({
                        "from": from,
                        "localField": local_field,
                        "foreignField": foreign_field,
                        "as": as_field,
                    }),
                );
            }
        }
        out
    }

    #[must_use]
    pub const fn as_match(&self) -> Option<&JsonMap> {
        match self {
            Self::Match(m) => Some(m),
            _ => None,
        }
    }
}

/// What one constraint compiles to. Callers must inspect the kind before
/// merging; the stitcher is the only sanctioned consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CompiledFragment {
    /// A document mergeable into the flat query for the simple endpoint.
    Direct(JsonMap),
    /// An ordered run of pipeline stages for the aggregation endpoint.
    Pipeline(Vec<Stage>),
}

impl CompiledFragment {
    #[must_use]
    pub const fn is_pipeline(&self) -> bool {
        matches!(self, Self::Pipeline(_))
    }
}

/// The final artifact handed to the query executor. Which form is produced
/// is decided by the operators used, never by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CompiledQuery {
    Direct(JsonMap),
    Pipeline(Vec<JsonMap>),
}

/// Shorthand for a one-entry wire document.
#[must_use]
pub fn map1(key: &str, value: serde_json::Value) -> JsonMap {
    let mut m = JsonMap::new();
    m.insert(key.to_owned(), value);
    m
}
