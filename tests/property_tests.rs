use std::collections::HashMap;

use ochre::{
    create_property_expression, ExpressionCapabilities, ExpressionKind, Feature, Globals,
    Parameter, PropertyExpression, PropertySpec, SpecType, Value,
};
use serde_json::json;

fn number_spec() -> PropertySpec {
    let mut spec = PropertySpec::new(SpecType::Number);
    spec.default = Some(json!(1.0));
    spec.expression = Some(ExpressionCapabilities {
        interpolated: true,
        parameters: vec![Parameter::Zoom, Parameter::Feature],
    });
    spec
}

fn string_spec() -> PropertySpec {
    let mut spec = PropertySpec::new(SpecType::String);
    spec.default = Some(json!("default"));
    spec.expression = Some(ExpressionCapabilities {
        interpolated: false,
        parameters: vec![Parameter::Zoom, Parameter::Feature],
    });
    spec
}

fn enum_spec(values: Vec<&str>, default: &str) -> PropertySpec {
    let mut spec = PropertySpec::new(SpecType::Enum);
    spec.values = Some(values.into_iter().map(String::from).collect());
    spec.default = Some(json!(default));
    spec.expression = Some(ExpressionCapabilities {
        interpolated: false,
        parameters: vec![Parameter::Zoom, Parameter::Feature],
    });
    spec
}

fn feature(pairs: Vec<(&str, Value)>) -> Feature {
    let mut properties = HashMap::new();
    for (k, v) in pairs {
        properties.insert(k.to_string(), v);
    }
    Feature::new(properties)
}

fn globals(zoom: f64) -> Globals {
    Globals { zoom }
}

#[test]
fn test_constant_classification() {
    let expr = create_property_expression(&json!(3), &number_spec()).unwrap();
    assert_eq!(expr.kind(), ExpressionKind::Constant);
    assert!(!expr.is_state_dependent());
}

#[test]
fn test_source_classification() {
    let expr = create_property_expression(&json!(["get", "width"]), &number_spec()).unwrap();
    assert_eq!(expr.kind(), ExpressionKind::Source);
}

#[test]
fn test_camera_classification() {
    let expr = create_property_expression(
        &json!(["interpolate", ["linear"], ["zoom"], 0, 0, 10, 10]),
        &number_spec(),
    )
    .unwrap();
    assert_eq!(expr.kind(), ExpressionKind::Camera);

    match &expr {
        PropertyExpression::ZoomDependent(curve) => {
            assert_eq!(curve.zoom_stops, vec![0.0, 10.0]);
            assert!((curve.interpolation_factor(5.0, 0.0, 10.0) - 0.5).abs() < 1e-9);
        }
        other => panic!("expected a zoom-dependent expression, got {:?}", other),
    }
}

#[test]
fn test_composite_classification() {
    let expr = create_property_expression(
        &json!(["step", ["zoom"], ["get", "a"], 10, 5]),
        &number_spec(),
    )
    .unwrap();
    assert_eq!(expr.kind(), ExpressionKind::Composite);

    match &expr {
        PropertyExpression::ZoomDependent(curve) => {
            // the implicit leading stop is not a real zoom stop
            assert_eq!(curve.zoom_stops, vec![10.0]);
            // step curves report no interpolation
            assert_eq!(curve.interpolation_factor(5.0, 0.0, 10.0), 0.0);
        }
        other => panic!("expected a zoom-dependent expression, got {:?}", other),
    }
}

#[test]
fn test_camera_evaluation_over_zoom() {
    let mut expr = create_property_expression(
        &json!(["interpolate", ["linear"], ["zoom"], 0, 0, 10, 100]),
        &number_spec(),
    )
    .unwrap();
    assert_eq!(expr.evaluate(globals(0.0), None, None), Value::Number(0.0));
    assert_eq!(expr.evaluate(globals(5.0), None, None), Value::Number(50.0));
    assert_eq!(expr.evaluate(globals(10.0), None, None), Value::Number(100.0));
}

#[test]
fn test_interpolate_requires_interpolation_support() {
    let expr = create_property_expression(
        &json!(["interpolate", ["linear"], ["zoom"], 0, 0, 10, 10]),
        &string_spec(),
    );
    let errors = expr.err().expect("expected a parse failure");
    assert!(
        errors[0]
            .message
            .contains("\"interpolate\" expressions cannot be used with this property"),
        "unexpected message: {}",
        errors[0].message
    );
}

#[test]
fn test_zoom_outside_curve_position_fails() {
    // zoom nested below a non-curve operator
    let errors = create_property_expression(&json!(["+", ["zoom"], 1]), &number_spec())
        .err()
        .expect("expected a parse failure");
    assert!(
        errors[0].message.contains(
            "\"zoom\" expression may only be used as input to a top-level \"step\" or \"interpolate\" expression."
        ),
        "unexpected message: {}",
        errors[0].message
    );

    // a curve that is itself nested below a non-wrapper node
    let errors = create_property_expression(
        &json!(["+", 1, ["interpolate", ["linear"], ["zoom"], 0, 0, 10, 10]]),
        &number_spec(),
    )
    .err()
    .expect("expected a parse failure");
    assert!(errors[0].message.contains("top-level"));
}

#[test]
fn test_only_one_zoom_curve_allowed() {
    let errors = create_property_expression(
        &json!([
            "coalesce",
            ["step", ["zoom"], ["get", "a"], 10, 5],
            ["step", ["zoom"], 0, 10, 1]
        ]),
        &number_spec(),
    )
    .err()
    .expect("expected a parse failure");
    assert!(
        errors[0]
            .message
            .contains("Only one zoom-based \"step\" or \"interpolate\" subexpression"),
        "unexpected message: {}",
        errors[0].message
    );
}

#[test]
fn test_zoom_curve_reachable_through_let() {
    let expr = create_property_expression(
        &json!(["let", "base", 2, ["step", ["zoom"], ["var", "base"], 10, 4]]),
        &number_spec(),
    )
    .unwrap();
    assert_eq!(expr.kind(), ExpressionKind::Camera);
}

#[test]
fn test_data_expressions_gated_by_feature_parameter() {
    let mut spec = number_spec();
    spec.expression = Some(ExpressionCapabilities {
        interpolated: true,
        parameters: vec![Parameter::Zoom],
    });
    let errors = create_property_expression(&json!(["get", "x"]), &spec)
        .err()
        .expect("expected a parse failure");
    assert!(errors[0].message.contains("data expressions not supported"));
}

#[test]
fn test_zoom_expressions_gated_by_zoom_parameter() {
    let mut spec = number_spec();
    spec.expression = Some(ExpressionCapabilities {
        interpolated: true,
        parameters: vec![Parameter::Feature],
    });
    let errors = create_property_expression(
        &json!(["interpolate", ["linear"], ["zoom"], 0, 0, 10, 10]),
        &spec,
    )
    .err()
    .expect("expected a parse failure");
    assert!(errors[0].message.contains("zoom expressions not supported"));
}

#[test]
fn test_runtime_error_falls_back_to_default() {
    let mut expr = create_property_expression(&json!(["get", "width"]), &number_spec()).unwrap();
    let f = feature(vec![("width", Value::String("wide".into()))]);
    // assertion failure inside evaluate falls back to the default
    assert_eq!(expr.evaluate(globals(0.0), Some(&f), None), Value::Number(1.0));
}

#[test]
fn test_null_result_falls_back_to_default() {
    let mut expr = create_property_expression(&json!(["get", "width"]), &number_spec()).unwrap();
    let f = feature(vec![]);
    assert_eq!(expr.evaluate(globals(0.0), Some(&f), None), Value::Number(1.0));
}

#[test]
fn test_enum_validation_substitutes_default_and_warns_once() {
    let mut expr = create_property_expression(
        &json!(["get", "anchor"]),
        &enum_spec(vec!["map", "viewport"], "map"),
    )
    .unwrap();

    let f = feature(vec![("anchor", Value::String("invalid".into()))]);
    for _ in 0..5 {
        assert_eq!(
            expr.evaluate(globals(0.0), Some(&f), None),
            Value::String("map".into())
        );
    }
    // one distinct message, logged once despite repeated evaluation
    assert_eq!(expr.style_expression().warning_count(), 1);

    let valid = feature(vec![("anchor", Value::String("viewport".into()))]);
    assert_eq!(
        expr.evaluate(globals(0.0), Some(&valid), None),
        Value::String("viewport".into())
    );
}

#[test]
fn test_constant_expression_is_idempotent() {
    let mut expr = create_property_expression(&json!(42), &number_spec()).unwrap();
    let a = feature(vec![("x", Value::Number(1.0))]);
    let b = feature(vec![("x", Value::Number(2.0))]);
    let first = expr.evaluate(globals(3.0), Some(&a), None);
    let second = expr.evaluate(globals(3.0), Some(&b), None);
    assert_eq!(first, second);
    assert_eq!(first, Value::Number(42.0));
}

#[test]
fn test_rebind_clears_cached_constant() {
    let mut expr = create_property_expression(&json!(7), &number_spec()).unwrap();
    match &mut expr {
        PropertyExpression::ZoomConstant(constant) => {
            assert_eq!(constant.evaluate(globals(0.0), None, None), Value::Number(7.0));
            constant.rebind();
            assert_eq!(constant.evaluate(globals(0.0), None, None), Value::Number(7.0));
        }
        other => panic!("expected a zoom-constant expression, got {:?}", other),
    }
}

#[test]
fn test_state_dependence() {
    let mut spec = string_spec();
    spec.ty = SpecType::String;
    let expr = create_property_expression(
        &json!(["string", ["feature-state", "label"], "fallback"]),
        &spec,
    )
    .unwrap();
    assert_eq!(expr.kind(), ExpressionKind::Source);
    assert!(expr.is_state_dependent());

    let expr = create_property_expression(&json!(["get", "name"]), &spec).unwrap();
    assert!(!expr.is_state_dependent());
}

#[test]
fn test_feature_state_evaluation() {
    let mut expr =
        create_property_expression(&json!(["string", ["feature-state", "label"], "fallback"]), &string_spec())
            .unwrap();
    let f = feature(vec![]);
    let mut state = HashMap::new();
    state.insert("label".to_string(), Value::String("hovered".into()));

    assert_eq!(
        expr.evaluate(globals(0.0), Some(&f), Some(&state)),
        Value::String("hovered".into())
    );
    assert_eq!(
        expr.evaluate(globals(0.0), Some(&f), None),
        Value::String("fallback".into())
    );
}

#[test]
fn test_evaluate_without_error_handling_propagates() {
    let expr = create_property_expression(&json!(["get", "width"]), &number_spec()).unwrap();
    let f = feature(vec![("width", Value::String("wide".into()))]);
    match expr {
        PropertyExpression::ZoomConstant(mut e) => {
            let error = e
                .evaluate_without_error_handling(globals(0.0), Some(&f), None)
                .unwrap_err();
            assert!(error.message.contains("Expected value to be of type number"));
        }
        other => panic!("expected a zoom-constant expression, got {:?}", other),
    }
}

#[test]
fn test_possible_outputs() {
    let expr = create_property_expression(
        &json!(["case", ["get", "flag"], "a", "b"]),
        &string_spec(),
    )
    .unwrap();
    let outputs = expr.style_expression().possible_outputs();
    assert!(outputs.contains(&Some(Value::String("a".into()))));
    assert!(outputs.contains(&Some(Value::String("b".into()))));

    let expr = create_property_expression(&json!(["get", "name"]), &string_spec()).unwrap();
    assert_eq!(expr.style_expression().possible_outputs(), vec![None]);
}

#[test]
fn test_color_default_is_parsed() {
    let mut spec = PropertySpec::new(SpecType::Color);
    spec.default = Some(json!("#ff0000"));
    spec.expression = Some(ExpressionCapabilities {
        interpolated: true,
        parameters: vec![Parameter::Zoom, Parameter::Feature],
    });

    let mut expr = create_property_expression(&json!(["get", "tint"]), &spec).unwrap();
    let f = feature(vec![]);
    assert_eq!(
        expr.evaluate(globals(0.0), Some(&f), None),
        Value::Color(ochre::Color::new(1.0, 0.0, 0.0, 1.0))
    );
}
