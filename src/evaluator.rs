use std::collections::HashMap;

use crate::ast::expressions::Expr;
use crate::color::Color;
use crate::stops;
use crate::types::{check_subtype, Type};
use crate::value::{type_of, Value};

/// An error raised during expression evaluation.
///
/// Runtime errors never escape the property wrapper: they are caught at
/// that boundary and replaced by the property's default value.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub message: String,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> RuntimeError {
        RuntimeError {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RuntimeError {}

/// The feature being styled: id, geometry type, and the property bag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Feature {
    /// Feature id, a number or string when present.
    pub id: Value,
    /// Raw geometry type name (`"Point"`, `"MultiPolygon"`, ...).
    pub geometry_type: Option<String>,
    /// Per-feature attribute map.
    pub properties: HashMap<String, Value>,
}

impl Feature {
    pub fn new(properties: HashMap<String, Value>) -> Feature {
        Feature {
            id: Value::Null,
            geometry_type: None,
            properties,
        }
    }

    /// Geometry type with Multi* variants collapsed to their base kind,
    /// the form the `geometry-type` builtin reports.
    pub fn geometry_kind(&self) -> Option<&str> {
        self.geometry_type.as_deref().map(|t| match t {
            "MultiPoint" => "Point",
            "MultiLineString" => "LineString",
            "MultiPolygon" => "Polygon",
            other => other,
        })
    }
}

/// Global (map-wide) evaluation inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Globals {
    /// Current map zoom level.
    pub zoom: f64,
}

/// The mutable state threaded through one evaluation.
///
/// A context is caller-owned and not shared: the property wrapper keeps
/// one per instance and overwrites the transient fields each call via
/// [`EvaluationContext::reset`]. The color cache memoizes parsed color
/// strings for the lifetime of the context instance.
#[derive(Debug, Default)]
pub struct EvaluationContext<'a> {
    pub globals: Globals,
    pub feature: Option<&'a Feature>,
    /// External mutable state for the current feature, keyed by
    /// attribute name.
    pub feature_state: Option<&'a HashMap<String, Value>>,
    pub(crate) scope: Vec<(String, Value)>,
    color_cache: HashMap<String, Color>,
}

impl<'a> EvaluationContext<'a> {
    pub fn new() -> EvaluationContext<'a> {
        EvaluationContext::default()
    }

    /// Overwrite the transient inputs in place, keeping the allocations
    /// and the color cache. No evaluation may be in flight on this
    /// context when called; `&mut` makes concurrent use a compile
    /// error.
    pub fn reset(
        &mut self,
        globals: Globals,
        feature: Option<&'a Feature>,
        feature_state: Option<&'a HashMap<String, Value>>,
    ) {
        self.globals = globals;
        self.feature = feature;
        self.feature_state = feature_state;
        self.scope.clear();
    }

    /// Parse a color string, memoized by source string.
    pub fn parse_color(&mut self, s: &str) -> Option<Color> {
        if let Some(color) = self.color_cache.get(s) {
            return Some(*color);
        }
        let color = Color::parse(s)?;
        self.color_cache.insert(s.to_string(), color);
        Some(color)
    }

    /// Look up a `let` binding, innermost first.
    pub(crate) fn lookup(&self, name: &str) -> Option<&Value> {
        self.scope
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Split off the reusable allocations so a wrapper can carry them
    /// across calls.
    pub(crate) fn into_caches(self) -> (Vec<(String, Value)>, HashMap<String, Color>) {
        (self.scope, self.color_cache)
    }

    pub(crate) fn with_caches(
        scope: Vec<(String, Value)>,
        color_cache: HashMap<String, Color>,
    ) -> EvaluationContext<'a> {
        EvaluationContext {
            globals: Globals::default(),
            feature: None,
            feature_state: None,
            scope,
            color_cache,
        }
    }
}

/// Evaluate an expression tree against a context.
///
/// Fails with a [`RuntimeError`] on type violations that the static
/// checker could not rule out (untyped feature data, failed coercions,
/// out-of-range access). Never panics.
pub fn evaluate(expr: &Expr, ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    match expr {
        Expr::Literal { value, .. } => Ok(value.clone()),

        Expr::Assertion { ty, args } => {
            for (i, arg) in args.iter().enumerate() {
                let value = evaluate(arg, ctx)?;
                let actual = type_of(&value);
                if check_subtype(ty, &actual).is_none() {
                    return Ok(value);
                }
                if i == args.len() - 1 {
                    return Err(RuntimeError::new(format!(
                        "Expected value to be of type {}, but found {} instead.",
                        ty, actual
                    )));
                }
            }
            Err(RuntimeError::new(format!(
                "Expected value to be of type {}, but found no arguments instead.",
                ty
            )))
        }

        Expr::Coercion { ty, args } => eval_coercion(ty, args, ctx),

        Expr::At { index, input, .. } => {
            let index = expect_number(evaluate(index, ctx)?)?;
            let array = match evaluate(input, ctx)? {
                Value::Array(items) => items,
                other => {
                    return Err(RuntimeError::new(format!(
                        "Expected value to be of type array, but found {} instead.",
                        type_of(&other)
                    )))
                }
            };
            if index.fract() != 0.0 {
                return Err(RuntimeError::new(format!(
                    "Array index must be an integer, but found {} instead.",
                    index
                )));
            }
            if index < 0.0 {
                return Err(RuntimeError::new(format!(
                    "Array index out of bounds: {} < 0.",
                    index
                )));
            }
            let i = index as usize;
            if i >= array.len() {
                return Err(RuntimeError::new(format!(
                    "Array index out of bounds: {} > {}.",
                    index,
                    array.len() as i64 - 1
                )));
            }
            Ok(array[i].clone())
        }

        Expr::In { needle, haystack } => {
            let needle = evaluate(needle, ctx)?;
            let haystack = evaluate(haystack, ctx)?;
            eval_in(&needle, &haystack).map(Value::Bool)
        }

        Expr::IndexOf {
            needle,
            haystack,
            from,
        } => {
            let needle = evaluate(needle, ctx)?;
            let haystack = evaluate(haystack, ctx)?;
            let from = match from {
                Some(expr) => expect_number(evaluate(expr, ctx)?)? as i64,
                None => 0,
            };
            eval_index_of(&needle, &haystack, from).map(|i| Value::Number(i as f64))
        }

        Expr::Slice {
            input, begin, end, ..
        } => {
            let input = evaluate(input, ctx)?;
            let begin = expect_number(evaluate(begin, ctx)?)? as i64;
            let end = match end {
                Some(expr) => Some(expect_number(evaluate(expr, ctx)?)? as i64),
                None => None,
            };
            eval_slice(&input, begin, end)
        }

        Expr::Length { input } => match evaluate(input, ctx)? {
            Value::String(s) => Ok(Value::Number(s.chars().count() as f64)),
            Value::Array(items) => Ok(Value::Number(items.len() as f64)),
            other => Err(RuntimeError::new(format!(
                "Expected value to be of type string or array, but found {} instead.",
                type_of(&other)
            ))),
        },

        Expr::Case {
            branches,
            otherwise,
            ..
        } => {
            for (test, result) in branches {
                if evaluate(test, ctx)?.is_truthy() {
                    return evaluate(result, ctx);
                }
            }
            evaluate(otherwise, ctx)
        }

        Expr::Match {
            input,
            branches,
            otherwise,
            ..
        } => {
            let input = evaluate(input, ctx)?;
            for (labels, output) in branches {
                if labels.iter().any(|label| label.matches(&input)) {
                    return evaluate(output, ctx);
                }
            }
            evaluate(otherwise, ctx)
        }

        Expr::Coalesce { args, .. } => {
            for arg in args {
                let value = evaluate(arg, ctx)?;
                if value != Value::Null {
                    return Ok(value);
                }
            }
            Ok(Value::Null)
        }

        Expr::Let { bindings, result } => {
            let mut evaluated = Vec::with_capacity(bindings.len());
            for (name, bound) in bindings {
                evaluated.push((name.clone(), evaluate(bound, ctx)?));
            }
            let depth = ctx.scope.len();
            ctx.scope.extend(evaluated);
            let value = evaluate(result, ctx);
            ctx.scope.truncate(depth);
            value
        }

        Expr::Var { name, .. } => ctx.lookup(name).cloned().ok_or_else(|| {
            RuntimeError::new(format!("Binding \"{}\" is not defined.", name))
        }),

        Expr::Step {
            input,
            labels,
            outputs,
            ..
        } => {
            if outputs.len() == 1 {
                return evaluate(&outputs[0], ctx);
            }
            let value = expect_number(evaluate(input, ctx)?)?;
            if value >= labels[labels.len() - 1] {
                return evaluate(&outputs[outputs.len() - 1], ctx);
            }
            let index = stops::find_stop_less_than_or_equal_to(labels, value)?;
            evaluate(&outputs[index], ctx)
        }

        Expr::Interpolate {
            ty,
            interpolation,
            input,
            labels,
            outputs,
        } => {
            if outputs.len() == 1 {
                return evaluate(&outputs[0], ctx);
            }
            let value = expect_number(evaluate(input, ctx)?)?;
            if value <= labels[0] {
                return evaluate(&outputs[0], ctx);
            }
            let last = labels.len() - 1;
            if value >= labels[last] {
                return evaluate(&outputs[last], ctx);
            }
            let index = stops::find_stop_less_than_or_equal_to(labels, value)?;
            let t = stops::interpolation_factor(
                interpolation,
                value,
                labels[index],
                labels[index + 1],
            );
            let lower = evaluate(&outputs[index], ctx)?;
            let upper = evaluate(&outputs[index + 1], ctx)?;
            stops::interpolate_values(ty, &lower, &upper, t)
        }

        Expr::CollatorExpr {
            case_sensitive,
            diacritic_sensitive,
            locale,
        } => {
            let case_sensitive = evaluate(case_sensitive, ctx)?.is_truthy();
            let diacritic_sensitive = evaluate(diacritic_sensitive, ctx)?.is_truthy();
            let locale = match locale {
                Some(expr) => match evaluate(expr, ctx)? {
                    Value::String(s) => Some(s),
                    other => {
                        return Err(RuntimeError::new(format!(
                            "Expected value to be of type string, but found {} instead.",
                            type_of(&other)
                        )))
                    }
                },
                None => None,
            };
            Ok(Value::Collator(crate::value::Collator::new(
                case_sensitive,
                diacritic_sensitive,
                locale,
            )))
        }

        Expr::Compound { args, eval, .. } => eval(args, ctx),
    }
}

/// Number extraction with the standard type-mismatch message.
pub(crate) fn expect_number(value: Value) -> Result<f64, RuntimeError> {
    match value {
        Value::Number(n) => Ok(n),
        other => Err(RuntimeError::new(format!(
            "Expected value to be of type number, but found {} instead.",
            type_of(&other)
        ))),
    }
}

fn eval_coercion(ty: &Type, args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    match ty {
        Type::Boolean => {
            let value = evaluate(&args[0], ctx)?;
            Ok(Value::Bool(value.is_truthy()))
        }
        Type::String => {
            let value = evaluate(&args[0], ctx)?;
            Ok(Value::String(value.stringify()))
        }
        Type::Number => {
            let mut last = Value::Null;
            for arg in args {
                last = evaluate(arg, ctx)?;
                match &last {
                    Value::Null => return Ok(Value::Number(0.0)),
                    Value::Bool(b) => return Ok(Value::Number(if *b { 1.0 } else { 0.0 })),
                    Value::Number(n) => return Ok(Value::Number(*n)),
                    Value::String(s) => {
                        if let Ok(n) = s.trim().parse::<f64>() {
                            return Ok(Value::Number(n));
                        }
                    }
                    _ => {}
                }
            }
            Err(RuntimeError::new(format!(
                "Could not convert {} to number.",
                last.render()
            )))
        }
        Type::Color => {
            let mut error = String::new();
            for arg in args {
                let value = evaluate(arg, ctx)?;
                match &value {
                    Value::Color(_) => return Ok(value),
                    Value::String(s) => match ctx.parse_color(s) {
                        Some(color) => return Ok(Value::Color(color)),
                        None => error = format!("Could not parse color from value '{}'", s),
                    },
                    Value::Array(items) => match rgba_from_array(items) {
                        Ok(color) => return Ok(Value::Color(color)),
                        Err(message) => error = message,
                    },
                    other => {
                        error = format!("Could not parse color from value '{}'", other.render())
                    }
                }
            }
            Err(RuntimeError::new(error))
        }
        other => Err(RuntimeError::new(format!(
            "Cannot coerce to type {}.",
            other
        ))),
    }
}

/// Validate a `[r, g, b]` or `[r, g, b, a]` numeric array as a color,
/// with 0-255 channels and a 0-1 alpha.
fn rgba_from_array(items: &[Value]) -> Result<Color, String> {
    let rendered = || {
        let parts: Vec<String> = items.iter().map(Value::render).collect();
        format!("[{}]", parts.join(", "))
    };

    if items.len() != 3 && items.len() != 4 {
        return Err(format!(
            "Invalid rgba value {}: expected an array containing either three or four numeric values.",
            rendered()
        ));
    }
    let mut channels = [0.0f64; 4];
    channels[3] = 1.0;
    for (i, item) in items.iter().enumerate() {
        let n = match item {
            Value::Number(n) => *n,
            _ => {
                return Err(format!(
                    "Invalid rgba value {}: expected an array containing either three or four numeric values.",
                    rendered()
                ))
            }
        };
        if i < 3 && !(0.0..=255.0).contains(&n) {
            return Err(format!(
                "Invalid rgba value {}: channels must be between 0 and 255.",
                rendered()
            ));
        }
        if i == 3 && !(0.0..=1.0).contains(&n) {
            return Err(format!(
                "Invalid rgba value {}: alpha must be between 0 and 1.",
                rendered()
            ));
        }
        channels[i] = n;
    }
    Ok(Color::from_rgba_channels(
        channels[0],
        channels[1],
        channels[2],
        channels[3],
    ))
}

fn eval_in(needle: &Value, haystack: &Value) -> Result<bool, RuntimeError> {
    match haystack {
        Value::Null => Ok(false),
        Value::String(s) => match needle {
            Value::String(n) => Ok(s.contains(n.as_str())),
            Value::Number(_) | Value::Bool(_) | Value::Null => {
                Ok(s.contains(&needle.stringify()))
            }
            other => Err(RuntimeError::new(format!(
                "Expected first argument to be of type boolean, string, number or null, but found {} instead.",
                type_of(other)
            ))),
        },
        Value::Array(items) => match needle {
            Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Null => {
                Ok(items.contains(needle))
            }
            other => Err(RuntimeError::new(format!(
                "Expected first argument to be of type boolean, string, number or null, but found {} instead.",
                type_of(other)
            ))),
        },
        other => Err(RuntimeError::new(format!(
            "Expected second argument to be of type array or string, but found {} instead.",
            type_of(other)
        ))),
    }
}

fn eval_index_of(needle: &Value, haystack: &Value, from: i64) -> Result<i64, RuntimeError> {
    match haystack {
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let needle = match needle {
                Value::String(n) => n.clone(),
                Value::Number(_) | Value::Bool(_) | Value::Null => needle.stringify(),
                other => {
                    return Err(RuntimeError::new(format!(
                        "Expected first argument to be of type boolean, string, number or null, but found {} instead.",
                        type_of(other)
                    )))
                }
            };
            let needle_chars: Vec<char> = needle.chars().collect();
            let start = clamp_index(from, chars.len());
            if needle_chars.is_empty() {
                return Ok(start as i64);
            }
            for i in start..chars.len() {
                if chars[i..].starts_with(&needle_chars) {
                    return Ok(i as i64);
                }
            }
            Ok(-1)
        }
        Value::Array(items) => {
            let start = clamp_index(from, items.len());
            for (i, item) in items.iter().enumerate().skip(start) {
                if item == needle {
                    return Ok(i as i64);
                }
            }
            Ok(-1)
        }
        other => Err(RuntimeError::new(format!(
            "Expected second argument to be of type array or string, but found {} instead.",
            type_of(other)
        ))),
    }
}

fn eval_slice(input: &Value, begin: i64, end: Option<i64>) -> Result<Value, RuntimeError> {
    match input {
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let (from, to) = slice_range(begin, end, chars.len());
            Ok(Value::String(chars[from..to].iter().collect()))
        }
        Value::Array(items) => {
            let (from, to) = slice_range(begin, end, items.len());
            Ok(Value::Array(items[from..to].to_vec()))
        }
        other => Err(RuntimeError::new(format!(
            "Expected first argument to be of type array or string, but found {} instead.",
            type_of(other)
        ))),
    }
}

fn clamp_index(i: i64, len: usize) -> usize {
    if i < 0 {
        len.saturating_sub(i.unsigned_abs() as usize)
    } else {
        (i as usize).min(len)
    }
}

fn slice_range(begin: i64, end: Option<i64>, len: usize) -> (usize, usize) {
    let from = clamp_index(begin, len);
    let to = end.map(|e| clamp_index(e, len)).unwrap_or(len);
    (from, to.max(from))
}
