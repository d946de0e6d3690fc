use std::collections::HashMap;

use crate::cli::CliError;
use crate::evaluator::{Feature, Globals};
use crate::property::{create_expression, PropertySpec, SpecType};
use crate::value::Value;

/// Options for the `check` subcommand.
pub struct CheckOptions {
    /// The expression JSON to validate.
    pub expression: String,
    /// Expected result type name, if any.
    pub expect: Option<String>,
}

/// Options for the `eval` subcommand.
pub struct EvalOptions {
    /// The expression JSON to evaluate.
    pub expression: String,
    /// Feature JSON: either a bare property object or a GeoJSON-style
    /// feature with `properties`, `id`, and `geometry.type`.
    pub input: Option<String>,
    /// Zoom level for the evaluation.
    pub zoom: f64,
    /// Feature-state JSON object.
    pub state: Option<String>,
    /// Expected result type name, if any.
    pub expect: Option<String>,
}

/// Validate an expression without evaluating it.
pub fn execute_check(options: &CheckOptions) -> Result<(), CliError> {
    let json: serde_json::Value = serde_json::from_str(&options.expression)?;
    let spec = parse_spec(options.expect.as_deref())?;
    create_expression(&json, spec.as_ref()).map_err(CliError::Parse)?;
    Ok(())
}

/// Parse and evaluate an expression against the given inputs.
pub fn execute_eval(options: &EvalOptions) -> Result<serde_json::Value, CliError> {
    let json: serde_json::Value = serde_json::from_str(&options.expression)?;
    let spec = parse_spec(options.expect.as_deref())?;
    let mut style = create_expression(&json, spec.as_ref()).map_err(CliError::Parse)?;

    let feature = match &options.input {
        Some(input) => {
            let json: serde_json::Value = serde_json::from_str(input)?;
            Some(feature_from_json(&json))
        }
        None => None,
    };
    let state = match &options.state {
        Some(state) => {
            let json: serde_json::Value = serde_json::from_str(state)?;
            Some(value_map(&json))
        }
        None => None,
    };

    let value = style.evaluate_without_error_handling(
        Globals { zoom: options.zoom },
        feature.as_ref(),
        state.as_ref(),
    )?;
    Ok(value.to_json())
}

fn parse_spec(expect: Option<&str>) -> Result<Option<PropertySpec>, CliError> {
    let name = match expect {
        Some(name) => name,
        None => return Ok(None),
    };
    let ty = match name {
        "number" => SpecType::Number,
        "string" => SpecType::String,
        "boolean" => SpecType::Boolean,
        "color" => SpecType::Color,
        other => return Err(CliError::UnknownType(other.to_string())),
    };
    Ok(Some(PropertySpec::new(ty)))
}

/// Build a feature from input JSON. A bare object is the property bag;
/// an object carrying `properties` is treated as a full feature with
/// optional `id` and `geometry.type`.
fn feature_from_json(json: &serde_json::Value) -> Feature {
    let obj = match json.as_object() {
        Some(obj) => obj,
        None => return Feature::default(),
    };

    if !obj.contains_key("properties") {
        return Feature::new(value_map(json));
    }

    let mut feature = Feature::new(
        obj.get("properties")
            .map(value_map)
            .unwrap_or_default(),
    );
    if let Some(id) = obj.get("id") {
        feature.id = Value::from_json(id);
    }
    let geometry_type = obj
        .get("geometry")
        .and_then(|g| g.get("type"))
        .or_else(|| obj.get("type").filter(|t| t.as_str() != Some("Feature")))
        .and_then(|t| t.as_str());
    if let Some(t) = geometry_type {
        feature.geometry_type = Some(t.to_string());
    }
    feature
}

fn value_map(json: &serde_json::Value) -> HashMap<String, Value> {
    match json.as_object() {
        Some(map) => map
            .iter()
            .map(|(k, v)| (k.clone(), Value::from_json(v)))
            .collect(),
        None => HashMap::new(),
    }
}
