use std::collections::HashMap;

use ochre::{evaluate, parse_expression, EvaluationContext, Feature, Globals, Value};
use serde_json::json;

fn fixture_feature() -> Feature {
    let mut properties = HashMap::new();
    properties.insert("name".to_string(), Value::String("Ochre Way".into()));
    properties.insert("lanes".to_string(), Value::Number(3.0));
    properties.insert("class".to_string(), Value::String("primary".into()));
    Feature::new(properties)
}

fn eval_parsed(expr: &ochre::Expr, feature: &Feature, zoom: f64) -> Result<Value, String> {
    let mut ctx = EvaluationContext::new();
    ctx.reset(Globals { zoom }, Some(feature), None);
    evaluate(expr, &mut ctx).map_err(|e| e.message)
}

/// Serialization must reproduce an equivalent expression: reparsing the
/// serialized form evaluates identically on a fixed context. The JSON
/// text itself need not be byte-identical.
fn assert_round_trip(expr: serde_json::Value) {
    let parsed = parse_expression(&expr, None)
        .unwrap_or_else(|errors| panic!("parse failed for {}: {:?}", expr, errors));
    let serialized = parsed.serialize();
    let reparsed = parse_expression(&serialized, None)
        .unwrap_or_else(|errors| panic!("reparse failed for {}: {:?}", serialized, errors));

    let feature = fixture_feature();
    for zoom in [0.0, 7.5, 16.0] {
        let original = eval_parsed(&parsed, &feature, zoom);
        let round_tripped = eval_parsed(&reparsed, &feature, zoom);
        assert_eq!(
            original, round_tripped,
            "diverged at zoom {} for {}",
            zoom, expr
        );
    }
}

#[test]
fn test_round_trip_literals() {
    assert_round_trip(json!(42));
    assert_round_trip(json!("label"));
    assert_round_trip(json!(true));
    assert_round_trip(json!(["literal", [1, 2, 3]]));
    assert_round_trip(json!(["literal", {"a": 1, "b": "two"}]));
}

#[test]
fn test_round_trip_folded_constants() {
    // constant subtrees fold to literals at parse time; the folded
    // form must still serialize to an equivalent expression
    assert_round_trip(json!(["+", 1, 2, 3]));
    assert_round_trip(json!(["rgb", 255, 128, 0]));
    assert_round_trip(json!(["concat", "a", 1, true]));
}

#[test]
fn test_round_trip_conditionals() {
    assert_round_trip(json!([
        "case",
        ["==", ["get", "class"], "primary"], "wide",
        ["==", ["get", "class"], "secondary"], "medium",
        "narrow"
    ]));
    assert_round_trip(json!([
        "match", ["get", "class"],
        ["primary", "trunk"], 4,
        "secondary", 2,
        1
    ]));
    assert_round_trip(json!(["coalesce", ["get", "missing"], ["get", "name"], "anonymous"]));
}

#[test]
fn test_round_trip_bindings() {
    assert_round_trip(json!([
        "let", "base", 1.5,
        ["*", ["var", "base"], ["get", "lanes"]]
    ]));
}

#[test]
fn test_round_trip_curves() {
    assert_round_trip(json!(["step", ["zoom"], "small", 10, "medium", 15, "large"]));
    assert_round_trip(json!([
        "interpolate", ["linear"], ["zoom"], 0, 1, 22, 12
    ]));
    assert_round_trip(json!([
        "interpolate", ["exponential", 1.5], ["zoom"], 5, 1, 15, 10
    ]));
    assert_round_trip(json!([
        "interpolate", ["cubic-bezier", 0.25, 0.1, 0.25, 1.0], ["zoom"], 0, 0, 20, 100
    ]));
}

#[test]
fn test_round_trip_assertions_and_coercions() {
    assert_round_trip(json!(["string", ["get", "name"]]));
    assert_round_trip(json!(["number", ["get", "lanes"]]));
    assert_round_trip(json!(["array", "number", ["literal", [1, 2]]]));
    assert_round_trip(json!(["to-number", ["get", "lanes"], 0]));
    assert_round_trip(json!(["to-string", ["get", "lanes"]]));
    assert_round_trip(json!(["to-color", "#ff00ff"]));
}

#[test]
fn test_round_trip_collator() {
    assert_round_trip(json!([
        "==", ["get", "name"], "ochre way",
        ["collator", {"case-sensitive": false, "diacritic-sensitive": true, "locale": "en-US"}]
    ]));
}

#[test]
fn test_round_trip_array_operations() {
    assert_round_trip(json!(["at", 1, ["literal", [10, 20, 30]]]));
    assert_round_trip(json!(["in", "a", ["get", "name"]]));
    assert_round_trip(json!(["index-of", "e", ["get", "name"]]));
    assert_round_trip(json!(["slice", ["get", "name"], 0, 5]));
    assert_round_trip(json!(["length", ["get", "name"]]));
}

#[test]
fn test_round_trip_feature_data() {
    assert_round_trip(json!(["get", "name"]));
    assert_round_trip(json!(["has", "lanes"]));
    assert_round_trip(json!(["geometry-type"]));
    assert_round_trip(json!(["id"]));
    assert_round_trip(json!(["properties"]));
}

#[test]
fn test_serialized_form_is_array_json() {
    let parsed = parse_expression(&json!(["get", "name"]), None).unwrap();
    assert_eq!(parsed.serialize(), json!(["get", "name"]));

    // color literals serialize through their rgba constructor form
    let parsed = parse_expression(&json!(["rgb", 255, 0, 0]), None).unwrap();
    assert_eq!(parsed.serialize(), json!(["rgba", 255.0, 0.0, 0.0, 1.0]));
}
