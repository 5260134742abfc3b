use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::Error;

/// A wire-format JSON document (one object of the REST protocol).
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// A typed reference to a document in another collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pointer {
    pub class_name: String,
    pub object_id: String,
}

impl Pointer {
    #[must_use]
    pub fn new(class_name: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self { class_name: class_name.into(), object_id: object_id.into() }
    }

    /// The `Class$objectId` composite form the store keeps in pointer columns.
    #[must_use]
    pub fn composite(&self) -> String {
        format!("{}${}", self.class_name, self.object_id)
    }

    #[must_use]
    pub fn to_wire(&self) -> serde_json::Value {
        json!({
            "__type": "Pointer",
            "className": self.class_name,
            "objectId": self.object_id,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// # Errors
    /// Rejects coordinates outside ±90 latitude or ±180 longitude.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, Error> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(Error::Validation(format!("latitude out of range: {latitude}")));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(Error::Validation(format!("longitude out of range: {longitude}")));
        }
        Ok(Self { latitude, longitude })
    }

    #[must_use]
    pub fn to_wire(&self) -> serde_json::Value {
        json!({
            "__type": "GeoPoint",
            "latitude": self.latitude,
            "longitude": self.longitude,
        })
    }
}

/// An inner query embedded as a constraint value (`$inQuery` / `$notInQuery`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubQuery {
    pub class_name: String,
    /// Already-compiled direct match conditions of the inner query.
    pub where_clause: JsonMap,
}

impl SubQuery {
    #[must_use]
    pub fn new(class_name: impl Into<String>, where_clause: JsonMap) -> Self {
        Self { class_name: class_name.into(), where_clause }
    }

    #[must_use]
    pub fn to_wire(&self) -> serde_json::Value {
        json!({ "className": self.class_name, "where": self.where_clause })
    }
}

/// Tagged union over every value shape the constraint DSL accepts.
///
/// `Map` uses a `BTreeMap` so compiled output is byte-deterministic for a
/// given input, which the purity tests rely on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(DateTime<Utc>),
    Geo(GeoPoint),
    Pointer(Pointer),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Query(Box<SubQuery>),
}

impl Value {
    /// Encodes the value in the REST protocol's JSON form. Dates, pointers
    /// and geo-points become their `__type` envelopes; everything else maps
    /// onto plain JSON.
    #[must_use]
    pub fn to_wire(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => json!(b),
            Self::Int(i) => json!(i),
            Self::Float(f) => json!(f),
            Self::Str(s) => json!(s),
            Self::Date(d) => json!({
                "__type": "Date",
                "iso": d.to_rfc3339_opts(SecondsFormat::Millis, true),
            }),
            Self::Geo(g) => g.to_wire(),
            Self::Pointer(p) => p.to_wire(),
            Self::List(items) => {
                serde_json::Value::Array(items.iter().map(Self::to_wire).collect())
            }
            Self::Map(m) => {
                let mut out = JsonMap::new();
                for (k, v) in m {
                    out.insert(k.clone(), v.to_wire());
                }
                serde_json::Value::Object(out)
            }
            Self::Query(q) => q.to_wire(),
        }
    }

    /// Containment-family normalization: a list passes through, any scalar is
    /// wrapped as a singleton.
    #[must_use]
    pub fn as_list(&self) -> Vec<Value> {
        match self {
            Self::List(items) => items.clone(),
            other => vec![other.clone()],
        }
    }

    /// Reference form for containment comparisons: pointers reduce to their
    /// wire envelope, everything else to its plain wire value.
    #[must_use]
    pub fn to_reference_wire(&self) -> serde_json::Value {
        match self {
            Self::Pointer(p) => p.to_wire(),
            other => other.to_wire(),
        }
    }

    /// Identifier form for set comparisons: pointers reduce to their object
    /// id, everything else to its plain wire value.
    #[must_use]
    pub fn to_id_wire(&self) -> serde_json::Value {
        match self {
            Self::Pointer(p) => json!(p.object_id),
            other => other.to_wire(),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}
impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}
impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}
impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}
impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Self::Date(d)
    }
}
impl From<GeoPoint> for Value {
    fn from(g: GeoPoint) -> Self {
        Self::Geo(g)
    }
}
impl From<Pointer> for Value {
    fn from(p: Pointer) -> Self {
        Self::Pointer(p)
    }
}
impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}
impl From<SubQuery> for Value {
    fn from(q: SubQuery) -> Self {
        Self::Query(Box::new(q))
    }
}

/// A principal a permission-filter constraint resolves against.
///
/// Closed sum rather than runtime type probing: every caller shape has an
/// explicit conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Principal {
    /// A user, by object id.
    User(String),
    /// A role, by name; membership expands transitively.
    Role(String),
    /// A pointer to a user document.
    PointerRef(Pointer),
    /// An already-formatted permission key (e.g. `role:Admins`).
    RawKey(String),
    /// The public wildcard `*`.
    Wildcard,
}

impl Principal {
    /// The permission-list key this principal matches.
    #[must_use]
    pub fn to_key(&self) -> String {
        match self {
            Self::User(id) => id.clone(),
            Self::Role(name) => format!("role:{name}"),
            Self::PointerRef(p) => p.object_id.clone(),
            Self::RawKey(k) => k.clone(),
            Self::Wildcard => "*".to_owned(),
        }
    }
}

/// Normalizes a local snake_case field name to the wire camelCase convention.
///
/// Edge cases, all deliberate:
/// - names with a leading underscore are preserved verbatim (`_rperm`);
/// - `id` and `object_id` both map to `objectId`;
/// - `created_at` / `updated_at` map to the builtin timestamp names;
/// - already-camelCase input passes through unchanged;
/// - interior double underscores collapse (no empty segments).
#[must_use]
pub fn normalize_field(name: &str) -> String {
    if name.starts_with('_') {
        return name.to_owned();
    }
    match name {
        "id" | "object_id" => return "objectId".to_owned(),
        "created_at" => return "createdAt".to_owned(),
        "updated_at" => return "updatedAt".to_owned(),
        _ => {}
    }
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for ch in name.chars() {
        if ch == '_' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Storage column name for a pointer-valued field on the aggregation path.
#[must_use]
pub fn pointer_column(name: &str) -> String {
    format!("_p_{}", normalize_field(name))
}
