use serde_json::json;

use docwire::query::{CompiledFragment, Constraint, Operator};
use docwire::{Error, GeoPoint, Value};

fn direct(c: &Constraint) -> serde_json::Value {
    match c.compile().unwrap() {
        CompiledFragment::Direct(m) => serde_json::Value::Object(m),
        CompiledFragment::Pipeline(_) => panic!("expected a direct fragment"),
    }
}

fn gp(lat: f64, lng: f64) -> GeoPoint {
    GeoPoint::new(lat, lng).unwrap()
}

#[test]
fn geo_point_coordinates_are_validated() {
    assert!(GeoPoint::new(91.0, 0.0).is_err());
    assert!(GeoPoint::new(0.0, 181.0).is_err());
    assert!(GeoPoint::new(-90.0, 180.0).is_ok());
}

#[test]
fn near_without_distance() {
    let c = Constraint::new("location", Operator::Near, gp(40.0, -73.0));
    assert_eq!(
        direct(&c),
        json!({"location": {"$nearSphere": {"__type": "GeoPoint", "latitude": 40.0, "longitude": -73.0}}})
    );
}

#[test]
fn near_attaches_only_positive_distance() {
    let c = Constraint::new(
        "location",
        Operator::Near,
        Value::List(vec![Value::Geo(gp(40.0, -73.0)), Value::Float(2.5)]),
    );
    assert_eq!(
        direct(&c),
        json!({"location": {
            "$nearSphere": {"__type": "GeoPoint", "latitude": 40.0, "longitude": -73.0},
            "$maxDistance": 2.5,
        }})
    );

    // Zero and negative distances are dropped, not errors.
    let c = Constraint::new(
        "location",
        Operator::Near,
        Value::List(vec![Value::Geo(gp(40.0, -73.0)), Value::Float(0.0)]),
    );
    assert_eq!(
        direct(&c),
        json!({"location": {"$nearSphere": {"__type": "GeoPoint", "latitude": 40.0, "longitude": -73.0}}})
    );

    let c = Constraint::new(
        "location",
        Operator::Near,
        Value::List(vec![Value::Geo(gp(40.0, -73.0)), Value::Str("far".into())]),
    );
    assert!(matches!(c.compile(), Err(Error::Validation(_))));
}

#[test]
fn within_box_requires_exactly_two_points() {
    let c = Constraint::new(
        "location",
        Operator::WithinBox,
        Value::List(vec![Value::Geo(gp(10.0, 10.0)), Value::Geo(gp(20.0, 20.0))]),
    );
    assert_eq!(
        direct(&c),
        json!({"location": {"$within": {"$box": [
            {"__type": "GeoPoint", "latitude": 10.0, "longitude": 10.0},
            {"__type": "GeoPoint", "latitude": 20.0, "longitude": 20.0},
        ]}}})
    );

    let one = Constraint::new(
        "location",
        Operator::WithinBox,
        Value::List(vec![Value::Geo(gp(10.0, 10.0))]),
    );
    assert!(matches!(one.compile(), Err(Error::Validation(_))));

    let three = Constraint::new(
        "location",
        Operator::WithinBox,
        Value::List(vec![
            Value::Geo(gp(1.0, 1.0)),
            Value::Geo(gp(2.0, 2.0)),
            Value::Geo(gp(3.0, 3.0)),
        ]),
    );
    assert!(matches!(three.compile(), Err(Error::Validation(_))));
}

#[test]
fn within_polygon_requires_three_points_minimum() {
    let c = Constraint::new(
        "location",
        Operator::WithinPolygon,
        Value::List(vec![
            Value::Geo(gp(0.0, 0.0)),
            Value::Geo(gp(0.0, 10.0)),
            Value::Geo(gp(10.0, 0.0)),
        ]),
    );
    let wire = direct(&c);
    assert_eq!(wire["location"]["$geoWithin"]["$polygon"].as_array().unwrap().len(), 3);

    let two = Constraint::new(
        "location",
        Operator::WithinPolygon,
        Value::List(vec![Value::Geo(gp(0.0, 0.0)), Value::Geo(gp(0.0, 10.0))]),
    );
    assert!(matches!(two.compile(), Err(Error::Validation(_))));

    let not_points = Constraint::new(
        "location",
        Operator::WithinPolygon,
        Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
    );
    assert!(matches!(not_points.compile(), Err(Error::Validation(_))));
}

#[test]
fn like_passes_safe_patterns_through() {
    let c = Constraint::new("name", Operator::Like, "^ali.e$");
    assert_eq!(direct(&c), json!({"name": {"$regex": "^ali.e$"}}));
}

#[test]
fn like_rejects_dangerous_patterns_even_on_trusted_path() {
    let c = Constraint::new("name", Operator::Like, "(a+)+b");
    let err = c.compile().unwrap_err();
    assert!(matches!(err, Error::UnsafePattern(_)));
    assert!(err.is_security());

    let c = Constraint::new("name", Operator::Like, "(?=evil)");
    assert!(matches!(c.compile(), Err(Error::UnsafePattern(_))));
}

#[test]
fn starts_with_escapes_metacharacters() {
    let c = Constraint::new("name", Operator::StartsWith, "a.b*");
    assert_eq!(direct(&c), json!({"name": {"$regex": "^a\\.b\\*"}}));
}

#[test]
fn contains_escapes_metacharacters() {
    let c = Constraint::new("name", Operator::Contains, "(hi)");
    assert_eq!(direct(&c), json!({"name": {"$regex": "\\(hi\\)"}}));
}

#[test]
fn text_search_shape() {
    let c = Constraint::new("lyrics", Operator::TextSearch, "letting go");
    assert_eq!(
        direct(&c),
        json!({"lyrics": {"$text": {"$search": {"$term": "letting go"}}}})
    );
    assert!(matches!(
        Constraint::new("lyrics", Operator::TextSearch, 3i64).compile(),
        Err(Error::Validation(_))
    ));
}
