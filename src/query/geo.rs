//! Geo builders. All of these are expressible by the simple query endpoint.

use serde_json::json;

use crate::errors::Error;
use crate::query::fragment::{CompiledFragment, map1};
use crate::types::{GeoPoint, Value};

fn point(value: &Value, op_tag: &str, field: &str) -> Result<GeoPoint, Error> {
    match value {
        Value::Geo(g) => Ok(*g),
        _ => Err(Error::Validation(format!("{op_tag} on `{field}` requires geo-point values"))),
    }
}

/// `near`: a geo-point, or a `[point, max_distance]` list. The distance
/// constraint is attached only when the second component is a positive
/// number.
pub(crate) fn near(field: &str, value: &Value) -> Result<CompiledFragment, Error> {
    let (center, max_distance) = match value {
        Value::Geo(g) => (*g, None),
        Value::List(items) => match items.as_slice() {
            [p] => (point(p, "near", field)?, None),
            [p, d] => {
                let dist = match d {
                    Value::Int(n) => *n as f64,
                    Value::Float(f) => *f,
                    _ => {
                        return Err(Error::Validation(format!(
                            "near on `{field}` max distance must be numeric"
                        )));
                    }
                };
                (point(p, "near", field)?, (dist > 0.0).then_some(dist))
            }
            _ => {
                return Err(Error::Validation(format!(
                    "near on `{field}` takes a point and an optional max distance"
                )));
            }
        },
        _ => return Err(Error::Validation(format!("near on `{field}` requires a geo-point"))),
    };
    let mut cond = map1("$nearSphere", center.to_wire());
    if let Some(d) = max_distance {
        cond.insert("$maxDistance".to_owned(), json!(d));
    }
    Ok(CompiledFragment::Direct(map1(field, serde_json::Value::Object(cond))))
}

/// `within_box`: exactly two corner points.
pub(crate) fn within_box(field: &str, value: &Value) -> Result<CompiledFragment, Error> {
    let Value::List(items) = value else {
        return Err(Error::Validation(format!(
            "within_box on `{field}` requires a list of two geo-points"
        )));
    };
    let [sw, ne] = items.as_slice() else {
        return Err(Error::Validation(format!(
            "within_box on `{field}` requires exactly 2 points, got {}",
            items.len()
        )));
    };
    let sw = point(sw, "within_box", field)?;
    let ne = point(ne, "within_box", field)?;
    Ok(CompiledFragment::Direct(map1(
        field,
        json!({ "$within": { "$box": [sw.to_wire(), ne.to_wire()] } }),
    )))
}

/// `within_polygon`: at least three vertices.
pub(crate) fn within_polygon(field: &str, value: &Value) -> Result<CompiledFragment, Error> {
    let Value::List(items) = value else {
        return Err(Error::Validation(format!(
            "within_polygon on `{field}` requires a list of geo-points"
        )));
    };
    if items.len() < 3 {
        return Err(Error::Validation(format!(
            "within_polygon on `{field}` requires at least 3 points, got {}",
            items.len()
        )));
    }
    let mut wired = Vec::with_capacity(items.len());
    for p in items {
        wired.push(point(p, "within_polygon", field)?.to_wire());
    }
    Ok(CompiledFragment::Direct(map1(
        field,
        json!({ "$geoWithin": { "$polygon": wired } }),
    )))
}
