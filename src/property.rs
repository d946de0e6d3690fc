//! Property expression wrappers.
//!
//! A style property value becomes one of four kinds of wrapper,
//! classified once at construction from the feature- and
//! zoom-dependence of its expression:
//!
//! - `constant` — evaluated once, never re-evaluated
//! - `source` — re-evaluated per feature
//! - `camera` — re-evaluated per zoom, may be pre-evaluated at the
//!   curve's zoom stops
//! - `composite` — re-evaluated per zoom and per feature
//!
//! The classification is immutable and decides which evaluation
//! strategy the consuming renderer may use (uniform vs. per-vertex
//! attribute). Evaluation at this boundary is total: runtime errors
//! and null results fall back to the property default with a
//! deduplicated warning.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::analysis::{
    find_zoom_curve, is_feature_constant, is_global_property_constant, is_state_constant,
    ZOOM_POSITION_MESSAGE,
};
use crate::ast::expressions::{Expr, Interpolation};
use crate::color::Color;
use crate::evaluator::{evaluate, EvaluationContext, Feature, Globals, RuntimeError};
use crate::parser::{parse_expression, ParsingError};
use crate::stops;
use crate::types::Type;
use crate::value::Value;

/// The declared type of a style property.
#[derive(Debug, Clone, PartialEq)]
pub enum SpecType {
    Number,
    String,
    Boolean,
    Color,
    /// String constrained to the spec's `values` set.
    Enum,
    Array {
        item: Box<SpecType>,
        length: Option<usize>,
    },
}

impl SpecType {
    fn expected_type(&self) -> Type {
        match self {
            SpecType::Number => Type::Number,
            SpecType::String => Type::String,
            SpecType::Boolean => Type::Boolean,
            SpecType::Color => Type::Color,
            SpecType::Enum => Type::String,
            SpecType::Array { item, length } => Type::array(item.expected_type(), *length),
        }
    }
}

/// Which evaluation inputs a property's expressions may depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    Zoom,
    Feature,
}

/// The `expression` block of a property specification.
#[derive(Debug, Clone, Default)]
pub struct ExpressionCapabilities {
    /// Whether `interpolate` curves are legal for this property.
    pub interpolated: bool,
    /// Subset of `{zoom, feature}`.
    pub parameters: Vec<Parameter>,
}

/// A property specification from the style schema.
#[derive(Debug, Clone)]
pub struct PropertySpec {
    pub ty: SpecType,
    /// Legal values for enum-typed properties.
    pub values: Option<Vec<String>>,
    /// Static fallback substituted on evaluation failure.
    pub default: Option<serde_json::Value>,
    pub transition: bool,
    pub expression: Option<ExpressionCapabilities>,
}

impl PropertySpec {
    pub fn new(ty: SpecType) -> PropertySpec {
        PropertySpec {
            ty,
            values: None,
            default: None,
            transition: false,
            expression: None,
        }
    }

    pub fn supports_interpolation(&self) -> bool {
        self.expression
            .as_ref()
            .map(|e| e.interpolated)
            .unwrap_or(false)
    }

    pub fn supports_zoom(&self) -> bool {
        self.expression
            .as_ref()
            .map(|e| e.parameters.contains(&Parameter::Zoom))
            .unwrap_or(false)
    }

    pub fn supports_feature(&self) -> bool {
        self.expression
            .as_ref()
            .map(|e| e.parameters.contains(&Parameter::Feature))
            .unwrap_or(false)
    }

    pub fn expected_type(&self) -> Type {
        self.ty.expected_type()
    }

    /// The declared default, converted to a runtime value (color
    /// strings are parsed). Null when the spec has no default.
    pub fn default_value(&self) -> Value {
        match &self.default {
            None => Value::Null,
            Some(json) => {
                if self.ty == SpecType::Color {
                    if let Some(s) = json.as_str() {
                        if let Some(color) = Color::parse(s) {
                            return Value::Color(color);
                        }
                    }
                }
                Value::from_json(json)
            }
        }
    }
}

/// A validated expression bound to its property specification.
///
/// Owns the reusable evaluation state (binding scope and color cache),
/// so a wrapper instance must not be shared across concurrent
/// evaluators; `&mut self` receivers enforce that.
#[derive(Debug)]
pub struct StyleExpression {
    expression: Expr,
    default_value: Value,
    enum_values: Option<Vec<String>>,
    warned: HashSet<String>,
    scope_cache: Vec<(String, Value)>,
    color_cache: HashMap<String, Color>,
}

impl StyleExpression {
    pub(crate) fn new(expression: Expr, spec: Option<&PropertySpec>) -> StyleExpression {
        let default_value = spec.map(PropertySpec::default_value).unwrap_or(Value::Null);
        let enum_values = spec.and_then(|s| match s.ty {
            SpecType::Enum => s.values.clone(),
            _ => None,
        });
        StyleExpression {
            expression,
            default_value,
            enum_values,
            warned: HashSet::new(),
            scope_cache: Vec::new(),
            color_cache: HashMap::new(),
        }
    }

    pub fn expression(&self) -> &Expr {
        &self.expression
    }

    /// Serialize back to the nested-array JSON form.
    pub fn serialize(&self) -> serde_json::Value {
        self.expression.serialize()
    }

    pub fn possible_outputs(&self) -> Vec<Option<Value>> {
        self.expression.possible_outputs()
    }

    /// Number of distinct warnings emitted so far.
    pub fn warning_count(&self) -> usize {
        self.warned.len()
    }

    /// Evaluate without the default-value fallback or warning
    /// deduplication. Only for callers that have already established
    /// the expression cannot fail.
    pub fn evaluate_without_error_handling(
        &mut self,
        globals: Globals,
        feature: Option<&Feature>,
        feature_state: Option<&HashMap<String, Value>>,
    ) -> Result<Value, RuntimeError> {
        let scope = std::mem::take(&mut self.scope_cache);
        let colors = std::mem::take(&mut self.color_cache);
        let mut ctx = EvaluationContext::with_caches(scope, colors);
        ctx.reset(globals, feature, feature_state);
        let result = evaluate(&self.expression, &mut ctx);
        let (scope, colors) = ctx.into_caches();
        self.scope_cache = scope;
        self.color_cache = colors;
        result
    }

    /// Evaluate with full error handling: a runtime error or a null
    /// result substitutes the property default, enum-typed properties
    /// re-validate the result against the declared value set, and each
    /// distinct failure message is logged at most once per wrapper
    /// instance. Never fails; safe inside a render loop.
    pub fn evaluate(
        &mut self,
        globals: Globals,
        feature: Option<&Feature>,
        feature_state: Option<&HashMap<String, Value>>,
    ) -> Value {
        match self.evaluate_without_error_handling(globals, feature, feature_state) {
            Ok(Value::Null) => self.default_value.clone(),
            Ok(value) => {
                let violation = match &self.enum_values {
                    Some(values) => {
                        let valid = matches!(&value, Value::String(s) if values.contains(s));
                        if valid {
                            None
                        } else {
                            let list: Vec<String> =
                                values.iter().map(|v| format!("\"{}\"", v)).collect();
                            Some(format!(
                                "Expected value to be one of {}, but found {} instead.",
                                list.join(", "),
                                value.render()
                            ))
                        }
                    }
                    None => None,
                };
                match violation {
                    Some(message) => {
                        self.warn_once(message);
                        self.default_value.clone()
                    }
                    None => value,
                }
            }
            Err(error) => {
                self.warn_once(error.message);
                self.default_value.clone()
            }
        }
    }

    fn warn_once(&mut self, message: String) {
        if self.warned.insert(message.clone()) {
            tracing::warn!("Failed to evaluate expression: {}", message);
        }
    }
}

/// The four-way classification of a property expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionKind {
    Constant,
    Source,
    Camera,
    Composite,
}

impl fmt::Display for ExpressionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExpressionKind::Constant => "constant",
            ExpressionKind::Source => "source",
            ExpressionKind::Camera => "camera",
            ExpressionKind::Composite => "composite",
        };
        write!(f, "{}", name)
    }
}

/// A zoom-independent property expression (`constant` or `source`).
#[derive(Debug)]
pub struct ZoomConstantExpression {
    pub kind: ExpressionKind,
    expression: StyleExpression,
    pub is_state_dependent: bool,
    cached: Option<Value>,
}

impl ZoomConstantExpression {
    pub fn evaluate(
        &mut self,
        globals: Globals,
        feature: Option<&Feature>,
        feature_state: Option<&HashMap<String, Value>>,
    ) -> Value {
        if self.kind == ExpressionKind::Constant {
            if let Some(value) = &self.cached {
                return value.clone();
            }
            let value = self.expression.evaluate(globals, feature, feature_state);
            self.cached = Some(value.clone());
            return value;
        }
        self.expression.evaluate(globals, feature, feature_state)
    }

    pub fn evaluate_without_error_handling(
        &mut self,
        globals: Globals,
        feature: Option<&Feature>,
        feature_state: Option<&HashMap<String, Value>>,
    ) -> Result<Value, RuntimeError> {
        self.expression
            .evaluate_without_error_handling(globals, feature, feature_state)
    }

    /// Drop the cached constant value after upstream style data
    /// changed, so the next evaluation recomputes without reparsing.
    /// The wrapper must not be visible to another evaluator while a
    /// rebind is in progress; `&mut self` enforces single ownership.
    pub fn rebind(&mut self) {
        self.cached = None;
    }

    pub fn style_expression(&self) -> &StyleExpression {
        &self.expression
    }

    pub fn style_expression_mut(&mut self) -> &mut StyleExpression {
        &mut self.expression
    }
}

/// A zoom-dependent property expression (`camera` or `composite`),
/// carrying its curve's stop positions.
#[derive(Debug)]
pub struct ZoomDependentExpression {
    pub kind: ExpressionKind,
    expression: StyleExpression,
    /// Finite zoom stops of the underlying curve, for callers that
    /// pre-evaluate camera values at fixed zooms.
    pub zoom_stops: Vec<f64>,
    interpolation: Option<Interpolation>,
    pub is_state_dependent: bool,
}

impl ZoomDependentExpression {
    pub fn evaluate(
        &mut self,
        globals: Globals,
        feature: Option<&Feature>,
        feature_state: Option<&HashMap<String, Value>>,
    ) -> Value {
        self.expression.evaluate(globals, feature, feature_state)
    }

    pub fn evaluate_without_error_handling(
        &mut self,
        globals: Globals,
        feature: Option<&Feature>,
        feature_state: Option<&HashMap<String, Value>>,
    ) -> Result<Value, RuntimeError> {
        self.expression
            .evaluate_without_error_handling(globals, feature, feature_state)
    }

    /// Interpolation progress of `input` between two stop zooms.
    /// Step curves report 0: no interpolation, use the nearest stop.
    pub fn interpolation_factor(&self, input: f64, lower: f64, upper: f64) -> f64 {
        match &self.interpolation {
            Some(interpolation) => stops::interpolation_factor(interpolation, input, lower, upper),
            None => 0.0,
        }
    }

    pub fn style_expression(&self) -> &StyleExpression {
        &self.expression
    }

    pub fn style_expression_mut(&mut self) -> &mut StyleExpression {
        &mut self.expression
    }
}

/// A classified property expression, as handed to consumers.
#[derive(Debug)]
pub enum PropertyExpression {
    ZoomConstant(ZoomConstantExpression),
    ZoomDependent(ZoomDependentExpression),
}

impl PropertyExpression {
    pub fn kind(&self) -> ExpressionKind {
        match self {
            PropertyExpression::ZoomConstant(e) => e.kind,
            PropertyExpression::ZoomDependent(e) => e.kind,
        }
    }

    pub fn is_state_dependent(&self) -> bool {
        match self {
            PropertyExpression::ZoomConstant(e) => e.is_state_dependent,
            PropertyExpression::ZoomDependent(e) => e.is_state_dependent,
        }
    }

    pub fn evaluate(
        &mut self,
        globals: Globals,
        feature: Option<&Feature>,
        feature_state: Option<&HashMap<String, Value>>,
    ) -> Value {
        match self {
            PropertyExpression::ZoomConstant(e) => e.evaluate(globals, feature, feature_state),
            PropertyExpression::ZoomDependent(e) => e.evaluate(globals, feature, feature_state),
        }
    }

    pub fn style_expression(&self) -> &StyleExpression {
        match self {
            PropertyExpression::ZoomConstant(e) => e.style_expression(),
            PropertyExpression::ZoomDependent(e) => e.style_expression(),
        }
    }
}

/// Parse and validate an expression, optionally against a property
/// specification's expected type.
pub fn create_expression(
    json: &serde_json::Value,
    spec: Option<&PropertySpec>,
) -> Result<StyleExpression, Vec<ParsingError>> {
    let expected = spec.map(PropertySpec::expected_type);
    let expression = parse_expression(json, expected.as_ref())?;
    Ok(StyleExpression::new(expression, spec))
}

/// Parse, validate, and classify a property expression.
///
/// Beyond parsing, this enforces the property's capability gates: a
/// feature-dependent expression requires the `feature` parameter, zoom
/// dependence requires the `zoom` parameter and the single top-level
/// curve position, and an `interpolate` curve requires the property to
/// declare interpolation support.
pub fn create_property_expression(
    json: &serde_json::Value,
    spec: &PropertySpec,
) -> Result<PropertyExpression, Vec<ParsingError>> {
    let style = create_expression(json, Some(spec))?;

    let feature_constant = is_feature_constant(style.expression());
    if !feature_constant && !spec.supports_feature() {
        return Err(vec![ParsingError::new(
            "",
            "data expressions not supported",
        )]);
    }

    let zoom_constant = is_global_property_constant(style.expression(), &["zoom"]);
    if !zoom_constant && !spec.supports_zoom() {
        return Err(vec![ParsingError::new("", "zoom expressions not supported")]);
    }

    let curve = match find_zoom_curve(style.expression()) {
        None if !zoom_constant => {
            return Err(vec![ParsingError::new("", ZOOM_POSITION_MESSAGE)]);
        }
        None => None,
        Some(Err(message)) => return Err(vec![ParsingError::new("", message)]),
        Some(Ok(curve)) => {
            let interpolation = match curve {
                Expr::Interpolate { interpolation, .. } => Some(*interpolation),
                _ => None,
            };
            if interpolation.is_some() && !spec.supports_interpolation() {
                return Err(vec![ParsingError::new(
                    "",
                    "\"interpolate\" expressions cannot be used with this property",
                )]);
            }
            let zoom_stops = match curve {
                Expr::Step { labels, .. } | Expr::Interpolate { labels, .. } => {
                    labels.iter().copied().filter(|l| l.is_finite()).collect()
                }
                _ => Vec::new(),
            };
            Some((zoom_stops, interpolation))
        }
    };

    let state_constant = is_state_constant(style.expression());

    Ok(match curve {
        None => {
            let kind = if feature_constant {
                ExpressionKind::Constant
            } else {
                ExpressionKind::Source
            };
            PropertyExpression::ZoomConstant(ZoomConstantExpression {
                kind,
                expression: style,
                is_state_dependent: kind != ExpressionKind::Constant && !state_constant,
                cached: None,
            })
        }
        Some((zoom_stops, interpolation)) => {
            let kind = if feature_constant {
                ExpressionKind::Camera
            } else {
                ExpressionKind::Composite
            };
            PropertyExpression::ZoomDependent(ZoomDependentExpression {
                kind,
                expression: style,
                zoom_stops,
                interpolation,
                is_state_dependent: kind != ExpressionKind::Camera && !state_constant,
            })
        }
    })
}
