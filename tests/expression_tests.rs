use std::collections::HashMap;

use ochre::{
    evaluate, parse_expression, Color, EvaluationContext, Feature, Globals, ParsingError, Value,
};
use serde_json::json;

fn eval(expr: serde_json::Value) -> Result<Value, String> {
    eval_at(expr, None, 0.0)
}

fn eval_at(
    expr: serde_json::Value,
    feature: Option<&Feature>,
    zoom: f64,
) -> Result<Value, String> {
    let parsed = parse_expression(&expr, None).map_err(|errors| format!("{:?}", errors))?;
    let mut ctx = EvaluationContext::new();
    ctx.reset(Globals { zoom }, feature, None);
    evaluate(&parsed, &mut ctx).map_err(|e| e.message)
}

fn eval_with_state(
    expr: serde_json::Value,
    feature: &Feature,
    state: &HashMap<String, Value>,
) -> Result<Value, String> {
    let parsed = parse_expression(&expr, None).map_err(|errors| format!("{:?}", errors))?;
    let mut ctx = EvaluationContext::new();
    ctx.reset(Globals { zoom: 0.0 }, Some(feature), Some(state));
    evaluate(&parsed, &mut ctx).map_err(|e| e.message)
}

fn parse_errors(expr: serde_json::Value) -> Vec<ParsingError> {
    match parse_expression(&expr, None) {
        Ok(_) => Vec::new(),
        Err(errors) => errors,
    }
}

fn feature(pairs: Vec<(&str, Value)>) -> Feature {
    let mut properties = HashMap::new();
    for (k, v) in pairs {
        properties.insert(k.to_string(), v);
    }
    Feature::new(properties)
}

#[test]
fn test_literal_scalars() {
    assert_eq!(eval(json!(42)).unwrap(), Value::Number(42.0));
    assert_eq!(eval(json!("hello")).unwrap(), Value::String("hello".into()));
    assert_eq!(eval(json!(true)).unwrap(), Value::Bool(true));
    assert_eq!(eval(json!(null)).unwrap(), Value::Null);
}

#[test]
fn test_literal_arrays_and_objects() {
    assert_eq!(
        eval(json!(["literal", [1, 2, 3]])).unwrap(),
        Value::Array(vec![
            Value::Number(1.0),
            Value::Number(2.0),
            Value::Number(3.0)
        ])
    );

    let result = eval(json!(["literal", {"a": 1}])).unwrap();
    match result {
        Value::Object(map) => assert_eq!(map.get("a"), Some(&Value::Number(1.0))),
        other => panic!("expected object, got {:?}", other),
    }
}

#[test]
fn test_bare_objects_rejected() {
    let errors = parse_errors(json!({"a": 1}));
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("Bare objects invalid"));
}

#[test]
fn test_empty_array_rejected() {
    let errors = parse_errors(json!([]));
    assert!(errors[0]
        .message
        .contains("Expected an array with at least one element"));
}

#[test]
fn test_unknown_operator() {
    let errors = parse_errors(json!(["frobnicate", 1]));
    assert!(errors[0].message.contains("Unknown expression \"frobnicate\""));
}

#[test]
fn test_error_keys_reflect_json_path() {
    let errors = parse_errors(json!(["+", 1, ["to-number"]]));
    assert_eq!(errors[0].key, "[2]");
    assert!(errors[0].message.contains("Expected at least one argument."));
}

#[test]
fn test_case_short_circuits_to_first_true_branch() {
    let expr = json!(["case", ["==", 1, 2], "a", ["==", 2, 2], "b", "c"]);
    assert_eq!(eval(expr).unwrap(), Value::String("b".into()));
}

#[test]
fn test_case_falls_through_to_otherwise() {
    let expr = json!(["case", false, "a", false, "b", "c"]);
    assert_eq!(eval(expr).unwrap(), Value::String("c".into()));
}

#[test]
fn test_coalesce_returns_first_non_null() {
    assert_eq!(
        eval(json!(["coalesce", null, null, "x"])).unwrap(),
        Value::String("x".into())
    );
    assert_eq!(eval(json!(["coalesce", null, null])).unwrap(), Value::Null);
}

#[test]
fn test_to_number_fallback() {
    assert_eq!(
        eval(json!(["to-number", "abc", 5])).unwrap(),
        Value::Number(5.0)
    );
    assert_eq!(eval(json!(["to-number", "3.5"])).unwrap(), Value::Number(3.5));
    assert_eq!(eval(json!(["to-number", true])).unwrap(), Value::Number(1.0));
    assert_eq!(eval(json!(["to-number", null])).unwrap(), Value::Number(0.0));

    let error = eval(json!(["to-number", "abc"])).unwrap_err();
    assert!(error.contains("Could not convert"), "{}", error);
}

#[test]
fn test_to_boolean_and_to_string() {
    assert_eq!(eval(json!(["to-boolean", ""])).unwrap(), Value::Bool(false));
    assert_eq!(eval(json!(["to-boolean", "x"])).unwrap(), Value::Bool(true));
    assert_eq!(eval(json!(["to-boolean", 0])).unwrap(), Value::Bool(false));
    assert_eq!(eval(json!(["to-boolean", null])).unwrap(), Value::Bool(false));

    assert_eq!(
        eval(json!(["to-string", 5])).unwrap(),
        Value::String("5".into())
    );
    assert_eq!(
        eval(json!(["to-string", null])).unwrap(),
        Value::String("".into())
    );
    assert_eq!(
        eval(json!(["to-string", ["rgb", 255, 0, 0]])).unwrap(),
        Value::String("rgba(255,0,0,1)".into())
    );
}

#[test]
fn test_to_color() {
    assert_eq!(
        eval(json!(["to-color", "#ff0000"])).unwrap(),
        Value::Color(Color::new(1.0, 0.0, 0.0, 1.0))
    );
    assert_eq!(
        eval(json!(["to-color", "rgb(255, 0, 0)"])).unwrap(),
        Value::Color(Color::new(1.0, 0.0, 0.0, 1.0))
    );
    assert_eq!(
        eval(json!(["to-color", "blue"])).unwrap(),
        Value::Color(Color::new(0.0, 0.0, 1.0, 1.0))
    );
    // fallback to a later argument
    assert_eq!(
        eval(json!(["to-color", "not-a-color", "#00ff00"])).unwrap(),
        Value::Color(Color::new(0.0, 1.0, 0.0, 1.0))
    );

    let error = eval(json!(["to-color", "not-a-color"])).unwrap_err();
    assert!(error.contains("Could not parse color"), "{}", error);
}

#[test]
fn test_to_color_from_array() {
    assert_eq!(
        eval(json!(["to-color", ["literal", [255, 0, 0]]])).unwrap(),
        Value::Color(Color::new(1.0, 0.0, 0.0, 1.0))
    );
    let error = eval(json!(["to-color", ["literal", [300, 0, 0]]])).unwrap_err();
    assert!(error.contains("Invalid rgba value"), "{}", error);
}

#[test]
fn test_assertion_returns_first_matching_argument() {
    assert_eq!(
        eval(json!(["string", 1, "two"])).unwrap(),
        Value::String("two".into())
    );

    let error = eval(json!(["number", "abc"])).unwrap_err();
    assert_eq!(
        error,
        "Expected value to be of type number, but found string instead."
    );
}

#[test]
fn test_array_assertion() {
    assert_eq!(
        eval(json!(["array", "number", ["literal", [1, 2]]])).unwrap(),
        Value::Array(vec![Value::Number(1.0), Value::Number(2.0)])
    );

    let error = eval(json!(["array", "number", 2, ["literal", [1, 2, 3]]])).unwrap_err();
    assert!(error.contains("array<number, 2>"), "{}", error);

    let error = eval(json!(["array", "string", ["literal", [1]]])).unwrap_err();
    assert!(error.contains("array<string>"), "{}", error);
}

#[test]
fn test_empty_array_literal_adopts_expected_type() {
    // [] satisfies array<number> when that is the expected type
    let parsed = parse_expression(
        &json!(["literal", []]),
        Some(&ochre::Type::array(ochre::Type::Number, None)),
    )
    .unwrap();
    assert_eq!(parsed.ty(), ochre::Type::array(ochre::Type::Number, None));
}

#[test]
fn test_match_with_single_and_grouped_labels() {
    let f = feature(vec![("class", Value::String("motorway".into()))]);
    let expr = json!([
        "match", ["get", "class"],
        ["motorway", "trunk"], "major",
        "residential", "minor",
        "other"
    ]);
    assert_eq!(
        eval_at(expr, Some(&f), 0.0).unwrap(),
        Value::String("major".into())
    );

    let f = feature(vec![("class", Value::String("path".into()))]);
    let expr = json!([
        "match", ["get", "class"],
        ["motorway", "trunk"], "major",
        "residential", "minor",
        "other"
    ]);
    assert_eq!(
        eval_at(expr, Some(&f), 0.0).unwrap(),
        Value::String("other".into())
    );
}

#[test]
fn test_match_numeric_labels() {
    let f = feature(vec![("admin_level", Value::Number(2.0))]);
    let expr = json!(["match", ["get", "admin_level"], 2, "country", 4, "state", "none"]);
    assert_eq!(
        eval_at(expr, Some(&f), 0.0).unwrap(),
        Value::String("country".into())
    );
}

#[test]
fn test_match_rejects_duplicate_labels() {
    let errors = parse_errors(json!(["match", ["get", "x"], "a", 1, "a", 2, 0]));
    assert!(errors[0].message.contains("Branch labels must be unique."));
}

#[test]
fn test_match_rejects_fractional_labels() {
    let errors = parse_errors(json!(["match", ["get", "x"], 1.5, 1, 0]));
    assert!(errors[0]
        .message
        .contains("Numeric branch labels must be integer values."));
}

#[test]
fn test_let_and_var() {
    let expr = json!(["let", "density", 100, ["+", ["var", "density"], 20]]);
    assert_eq!(eval(expr).unwrap(), Value::Number(120.0));

    // inner bindings shadow outer ones
    let expr = json!([
        "let", "x", 1,
        ["let", "x", 2, ["var", "x"]]
    ]);
    assert_eq!(eval(expr).unwrap(), Value::Number(2.0));
}

#[test]
fn test_var_requires_enclosing_binding() {
    let errors = parse_errors(json!(["var", "missing"]));
    assert!(errors[0].message.contains("Unknown variable \"missing\""));
}

#[test]
fn test_arithmetic() {
    assert_eq!(eval(json!(["+", 1, 2, 3])).unwrap(), Value::Number(6.0));
    assert_eq!(eval(json!(["*", 2, 3, 4])).unwrap(), Value::Number(24.0));
    assert_eq!(eval(json!(["-", 10, 4])).unwrap(), Value::Number(6.0));
    assert_eq!(eval(json!(["-", 5])).unwrap(), Value::Number(-5.0));
    assert_eq!(eval(json!(["/", 10, 4])).unwrap(), Value::Number(2.5));
    assert_eq!(eval(json!(["%", 7, 3])).unwrap(), Value::Number(1.0));
    assert_eq!(eval(json!(["^", 2, 10])).unwrap(), Value::Number(1024.0));
    assert_eq!(eval(json!(["abs", -3])).unwrap(), Value::Number(3.0));
    assert_eq!(eval(json!(["min", 3, 1, 2])).unwrap(), Value::Number(1.0));
    assert_eq!(eval(json!(["max", 3, 1, 2])).unwrap(), Value::Number(3.0));
    assert_eq!(eval(json!(["round", 2.5])).unwrap(), Value::Number(3.0));
    assert_eq!(eval(json!(["floor", 2.9])).unwrap(), Value::Number(2.0));
    assert_eq!(eval(json!(["ceil", 2.1])).unwrap(), Value::Number(3.0));
    assert_eq!(eval(json!(["sqrt", 16])).unwrap(), Value::Number(4.0));
}

#[test]
fn test_arithmetic_type_errors() {
    let f = feature(vec![("name", Value::String("x".into()))]);
    let error = eval_at(json!(["+", 1, ["get", "name"]]), Some(&f), 0.0).unwrap_err();
    assert_eq!(
        error,
        "Expected value to be of type number, but found string instead."
    );
}

#[test]
fn test_comparison_and_logic() {
    assert_eq!(eval(json!(["==", 1, 1])).unwrap(), Value::Bool(true));
    assert_eq!(eval(json!(["==", 1, "1"])).unwrap(), Value::Bool(false));
    assert_eq!(eval(json!(["!=", 1, 2])).unwrap(), Value::Bool(true));
    assert_eq!(eval(json!(["<", 1, 2])).unwrap(), Value::Bool(true));
    assert_eq!(eval(json!([">=", 2, 2])).unwrap(), Value::Bool(true));
    assert_eq!(eval(json!(["<", "a", "b"])).unwrap(), Value::Bool(true));

    assert_eq!(eval(json!(["!", true])).unwrap(), Value::Bool(false));
    assert_eq!(eval(json!(["all", true, true])).unwrap(), Value::Bool(true));
    assert_eq!(eval(json!(["all", true, false])).unwrap(), Value::Bool(false));
    assert_eq!(eval(json!(["any", false, true])).unwrap(), Value::Bool(true));
    assert_eq!(eval(json!(["any", false, false])).unwrap(), Value::Bool(false));
}

#[test]
fn test_comparison_requires_matching_types() {
    let f = feature(vec![("name", Value::String("x".into()))]);
    let error = eval_at(json!(["<", ["get", "name"], 5]), Some(&f), 0.0).unwrap_err();
    assert!(
        error.contains("string or number"),
        "unexpected message: {}",
        error
    );
}

#[test]
fn test_collator_comparison() {
    let expr = json!(["==", "Tunnel", "tunnel", ["collator", {"case-sensitive": false}]]);
    assert_eq!(eval(expr).unwrap(), Value::Bool(true));

    let expr = json!(["==", "Tunnel", "tunnel", ["collator", {"case-sensitive": true}]]);
    assert_eq!(eval(expr).unwrap(), Value::Bool(false));

    let expr = json!(["==", "cafe", "café", ["collator", {"diacritic-sensitive": false}]]);
    assert_eq!(eval(expr).unwrap(), Value::Bool(true));

    let expr = json!(["resolved-locale", ["collator", {"locale": "de-DE"}]]);
    assert_eq!(eval(expr).unwrap(), Value::String("de-DE".into()));

    let expr = json!(["resolved-locale", ["collator", {}]]);
    assert_eq!(eval(expr).unwrap(), Value::String("en".into()));
}

#[test]
fn test_string_operations() {
    assert_eq!(
        eval(json!(["concat", "zoom ", 12, "!"])).unwrap(),
        Value::String("zoom 12!".into())
    );
    assert_eq!(
        eval(json!(["upcase", "main st"])).unwrap(),
        Value::String("MAIN ST".into())
    );
    assert_eq!(
        eval(json!(["downcase", "Main St"])).unwrap(),
        Value::String("main st".into())
    );
}

#[test]
fn test_length_at_in_index_of_slice() {
    assert_eq!(eval(json!(["length", "abc"])).unwrap(), Value::Number(3.0));
    assert_eq!(
        eval(json!(["length", ["literal", [1, 2]]])).unwrap(),
        Value::Number(2.0)
    );

    assert_eq!(
        eval(json!(["at", 1, ["literal", [10, 20, 30]]])).unwrap(),
        Value::Number(20.0)
    );
    let error = eval(json!(["at", 5, ["literal", [10]]])).unwrap_err();
    assert!(error.contains("out of bounds"), "{}", error);

    assert_eq!(
        eval(json!(["in", "b", ["literal", ["a", "b"]]])).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(eval(json!(["in", "ell", "hello"])).unwrap(), Value::Bool(true));
    assert_eq!(eval(json!(["in", "x", "hello"])).unwrap(), Value::Bool(false));

    assert_eq!(
        eval(json!(["index-of", "b", ["literal", ["a", "b", "b"]]])).unwrap(),
        Value::Number(1.0)
    );
    assert_eq!(
        eval(json!(["index-of", "b", ["literal", ["a", "b", "b"]], 2])).unwrap(),
        Value::Number(2.0)
    );
    assert_eq!(
        eval(json!(["index-of", "z", "hello"])).unwrap(),
        Value::Number(-1.0)
    );

    assert_eq!(
        eval(json!(["slice", "hello", 1, 3])).unwrap(),
        Value::String("el".into())
    );
    assert_eq!(
        eval(json!(["slice", ["literal", [1, 2, 3, 4]], 1])).unwrap(),
        Value::Array(vec![
            Value::Number(2.0),
            Value::Number(3.0),
            Value::Number(4.0)
        ])
    );
    assert_eq!(
        eval(json!(["slice", ["literal", [1, 2, 3, 4]], -2])).unwrap(),
        Value::Array(vec![Value::Number(3.0), Value::Number(4.0)])
    );
}

#[test]
fn test_feature_data_access() {
    let mut f = feature(vec![
        ("name", Value::String("Bridge St".into())),
        ("lanes", Value::Number(2.0)),
    ]);
    f.id = Value::Number(42.0);
    f.geometry_type = Some("MultiLineString".to_string());

    assert_eq!(
        eval_at(json!(["get", "name"]), Some(&f), 0.0).unwrap(),
        Value::String("Bridge St".into())
    );
    assert_eq!(
        eval_at(json!(["get", "missing"]), Some(&f), 0.0).unwrap(),
        Value::Null
    );
    assert_eq!(
        eval_at(json!(["has", "lanes"]), Some(&f), 0.0).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        eval_at(json!(["has", "missing"]), Some(&f), 0.0).unwrap(),
        Value::Bool(false)
    );
    assert_eq!(
        eval_at(json!(["id"]), Some(&f), 0.0).unwrap(),
        Value::Number(42.0)
    );
    // Multi* collapses to the base kind
    assert_eq!(
        eval_at(json!(["geometry-type"]), Some(&f), 0.0).unwrap(),
        Value::String("LineString".into())
    );
}

#[test]
fn test_get_from_object_argument() {
    let expr = json!(["get", "a", ["literal", {"a": 7}]]);
    assert_eq!(eval(expr).unwrap(), Value::Number(7.0));

    let expr = json!(["has", "b", ["literal", {"a": 7}]]);
    assert_eq!(eval(expr).unwrap(), Value::Bool(false));
}

#[test]
fn test_feature_state() {
    let f = feature(vec![]);
    let mut state = HashMap::new();
    state.insert("hover".to_string(), Value::Bool(true));

    assert_eq!(
        eval_with_state(json!(["feature-state", "hover"]), &f, &state).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        eval_with_state(json!(["feature-state", "selected"]), &f, &state).unwrap(),
        Value::Null
    );
}

#[test]
fn test_zoom_builtin() {
    assert_eq!(eval_at(json!(["zoom"]), None, 12.5).unwrap(), Value::Number(12.5));
}

#[test]
fn test_step_evaluation() {
    let expr = json!(["step", ["zoom"], "small", 10, "medium", 15, "large"]);
    assert_eq!(
        eval_at(expr.clone(), None, 5.0).unwrap(),
        Value::String("small".into())
    );
    assert_eq!(
        eval_at(expr.clone(), None, 10.0).unwrap(),
        Value::String("medium".into())
    );
    assert_eq!(
        eval_at(expr.clone(), None, 12.0).unwrap(),
        Value::String("medium".into())
    );
    assert_eq!(
        eval_at(expr, None, 20.0).unwrap(),
        Value::String("large".into())
    );
}

#[test]
fn test_step_requires_ascending_stops() {
    let errors = parse_errors(json!(["step", ["zoom"], 0, 10, 1, 5, 2]));
    assert!(errors[0].message.contains("strictly ascending"));
}

#[test]
fn test_interpolate_linear() {
    let expr = json!(["interpolate", ["linear"], ["zoom"], 5, 1, 15, 10]);
    let result = eval_at(expr, None, 10.0).unwrap();
    match result {
        Value::Number(n) => assert!((n - 5.5).abs() < 1e-9),
        other => panic!("expected number, got {:?}", other),
    }
}

#[test]
fn test_interpolate_clamps_outside_stop_range() {
    let expr = json!(["interpolate", ["linear"], ["zoom"], 5, 1, 15, 10]);
    assert_eq!(eval_at(expr.clone(), None, 0.0).unwrap(), Value::Number(1.0));
    assert_eq!(eval_at(expr, None, 22.0).unwrap(), Value::Number(10.0));
}

#[test]
fn test_interpolate_exponential() {
    let expr = json!(["interpolate", ["exponential", 2], ["zoom"], 0, 0, 10, 100]);
    let result = eval_at(expr, None, 5.0).unwrap();
    // (2^5 - 1) / (2^10 - 1) of the way from 0 to 100
    let expected = 100.0 * 31.0 / 1023.0;
    match result {
        Value::Number(n) => assert!((n - expected).abs() < 1e-9),
        other => panic!("expected number, got {:?}", other),
    }
}

#[test]
fn test_interpolate_colors() {
    let expr = json!([
        "interpolate", ["linear"], ["zoom"],
        0, ["rgb", 0, 0, 0],
        10, ["rgb", 255, 0, 0]
    ]);
    let result = eval_at(expr, None, 5.0).unwrap();
    assert_eq!(result, Value::Color(Color::new(0.5, 0.0, 0.0, 1.0)));
}

#[test]
fn test_interpolate_numeric_arrays() {
    let expr = json!([
        "interpolate", ["linear"], ["zoom"],
        0, ["literal", [0, 10]],
        10, ["literal", [10, 20]]
    ]);
    let result = eval_at(expr, None, 5.0).unwrap();
    assert_eq!(
        result,
        Value::Array(vec![Value::Number(5.0), Value::Number(15.0)])
    );
}

#[test]
fn test_interpolate_cubic_bezier_stays_within_bounds() {
    let expr = json!([
        "interpolate", ["cubic-bezier", 0.42, 0.0, 0.58, 1.0], ["zoom"],
        0, 0, 10, 100
    ]);
    let mid = eval_at(expr.clone(), None, 5.0).unwrap();
    match mid {
        Value::Number(n) => assert!((n - 50.0).abs() < 1.0, "midpoint {}", n),
        other => panic!("expected number, got {:?}", other),
    }
    assert_eq!(eval_at(expr.clone(), None, 0.0).unwrap(), Value::Number(0.0));
    assert_eq!(eval_at(expr, None, 10.0).unwrap(), Value::Number(100.0));
}

#[test]
fn test_interpolate_rejects_non_interpolatable_outputs() {
    let errors = parse_errors(json!([
        "interpolate", ["linear"], ["zoom"], 0, "a", 10, "b"
    ]));
    assert!(errors[0].message.contains("is not interpolatable"));
}

#[test]
fn test_rgb_and_to_rgba() {
    assert_eq!(
        eval(json!(["rgb", 255, 128, 0])).unwrap(),
        Value::Color(Color::from_rgba_channels(255.0, 128.0, 0.0, 1.0))
    );
    assert_eq!(
        eval(json!(["rgba", 255, 0, 0, 0.5])).unwrap(),
        Value::Color(Color::from_rgba_channels(255.0, 0.0, 0.0, 0.5))
    );

    let error = eval(json!(["rgb", 300, 0, 0])).unwrap_err();
    assert!(error.contains("between 0 and 255"), "{}", error);

    assert_eq!(
        eval(json!(["to-rgba", ["rgb", 255, 0, 0]])).unwrap(),
        Value::Array(vec![
            Value::Number(255.0),
            Value::Number(0.0),
            Value::Number(0.0),
            Value::Number(1.0)
        ])
    );
}

#[test]
fn test_typeof() {
    assert_eq!(
        eval(json!(["typeof", 1])).unwrap(),
        Value::String("number".into())
    );
    assert_eq!(
        eval(json!(["typeof", "x"])).unwrap(),
        Value::String("string".into())
    );
    assert_eq!(
        eval(json!(["typeof", ["literal", [1, 2]]])).unwrap(),
        Value::String("array<number, 2>".into())
    );
}

#[test]
fn test_legacy_filter_operators() {
    let mut f = feature(vec![
        ("class", Value::String("park".into())),
        ("area", Value::Number(1000.0)),
    ]);
    f.id = Value::Number(7.0);
    f.geometry_type = Some("Polygon".to_string());

    assert_eq!(
        eval_at(json!(["filter-==", "class", "park"]), Some(&f), 0.0).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        eval_at(json!(["filter->", "area", 500]), Some(&f), 0.0).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        eval_at(json!(["filter-<=", "area", 500]), Some(&f), 0.0).unwrap(),
        Value::Bool(false)
    );
    assert_eq!(
        eval_at(json!(["filter-type-==", "Polygon"]), Some(&f), 0.0).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        eval_at(json!(["filter-id-==", 7]), Some(&f), 0.0).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        eval_at(json!(["filter-has", "class"]), Some(&f), 0.0).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        eval_at(json!(["filter-has-id"]), Some(&f), 0.0).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        eval_at(
            json!(["filter-in-small", "class", ["literal", ["park", "wood"]]]),
            Some(&f),
            0.0
        )
        .unwrap(),
        Value::Bool(true)
    );
}

#[test]
fn test_overload_mismatch_reports_argument_errors() {
    // Arity 3 selects the collator overload of ==; a numeric third
    // argument fails its parameter type with a keyed error.
    let errors = parse_errors(json!(["==", 1, 2, 3]));
    assert_eq!(errors[0].key, "[3]");
    assert_eq!(
        errors[0].message,
        "Expected collator but found number instead."
    );
}

#[test]
fn test_wrong_arity_is_a_parse_error() {
    let errors = parse_errors(json!(["length", "a", "b"]));
    assert!(errors[0]
        .message
        .contains("Expected 1 argument, but found 2 instead."));
}
