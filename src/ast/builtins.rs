//! Compound builtin operators.
//!
//! Every operator without a dedicated AST variant lives here: math,
//! comparison, logic, feature-data access, strings, colors, and the
//! legacy `filter-*` family. The registry is populated once behind a
//! lazily-initialized static and injected into the parsing context;
//! nodes never reach for it at evaluation time because overload
//! resolution stores the winning signature's evaluation function on the
//! node itself.

use std::cmp::Ordering;
use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::ast::expressions::{EvalFn, Expr};
use crate::color::Color;
use crate::evaluator::{evaluate, expect_number, EvaluationContext, RuntimeError};
use crate::types::Type;
use crate::value::{type_of, Value};

/// Parameter shape of one signature.
#[derive(Debug, Clone)]
pub enum Params {
    /// Exact positional parameter types.
    Fixed(Vec<Type>),
    /// Any number of arguments of one type.
    Variadic(Type),
}

impl Params {
    /// Whether a call with `n` arguments can match this shape.
    pub fn matches_arity(&self, n: usize) -> bool {
        match self {
            Params::Fixed(params) => params.len() == n,
            Params::Variadic(_) => true,
        }
    }

    /// The expected type of the argument at `i`.
    pub fn param_type(&self, i: usize) -> &Type {
        match self {
            Params::Fixed(params) => &params[i],
            Params::Variadic(ty) => ty,
        }
    }

    /// Rendering used in overload-mismatch diagnostics:
    /// `(number, number)` or `(value...)`.
    pub fn describe(&self) -> String {
        match self {
            Params::Fixed(params) => {
                let names: Vec<String> = params.iter().map(Type::to_string).collect();
                format!("({})", names.join(", "))
            }
            Params::Variadic(ty) => format!("({}...)", ty),
        }
    }
}

/// One callable signature of a builtin.
#[derive(Debug, Clone)]
pub struct Signature {
    pub params: Params,
    pub eval: EvalFn,
}

impl Signature {
    fn fixed(params: Vec<Type>, eval: EvalFn) -> Signature {
        Signature {
            params: Params::Fixed(params),
            eval,
        }
    }

    fn variadic(ty: Type, eval: EvalFn) -> Signature {
        Signature {
            params: Params::Variadic(ty),
            eval,
        }
    }
}

/// A named builtin with its result type and overloads.
#[derive(Debug, Clone)]
pub struct Builtin {
    pub name: &'static str,
    pub result: Type,
    pub signatures: Vec<Signature>,
}

/// The operator table, built once and read-only afterwards.
#[derive(Debug, Default)]
pub struct Registry {
    ops: HashMap<&'static str, Builtin>,
}

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

impl Registry {
    /// The process-wide registry instance.
    pub fn global() -> &'static Registry {
        &REGISTRY
    }

    pub fn get(&self, name: &str) -> Option<&Builtin> {
        self.ops.get(name)
    }

    fn define(&mut self, name: &'static str, result: Type, signatures: Vec<Signature>) {
        self.ops.insert(
            name,
            Builtin {
                name,
                result,
                signatures,
            },
        );
    }

    fn new() -> Registry {
        use Type::{Boolean, Collator, Number, Object, String as Str, Value as Val};

        let mut reg = Registry::default();

        // Math
        reg.define("+", Number, vec![Signature::variadic(Number, eval_add)]);
        reg.define("*", Number, vec![Signature::variadic(Number, eval_mul)]);
        reg.define(
            "-",
            Number,
            vec![
                Signature::fixed(vec![Number, Number], eval_sub),
                Signature::fixed(vec![Number], eval_neg),
            ],
        );
        reg.define(
            "/",
            Number,
            vec![Signature::fixed(vec![Number, Number], eval_div)],
        );
        reg.define(
            "%",
            Number,
            vec![Signature::fixed(vec![Number, Number], eval_mod)],
        );
        reg.define(
            "^",
            Number,
            vec![Signature::fixed(vec![Number, Number], eval_pow)],
        );
        reg.define("abs", Number, vec![Signature::fixed(vec![Number], eval_abs)]);
        reg.define(
            "ceil",
            Number,
            vec![Signature::fixed(vec![Number], eval_ceil)],
        );
        reg.define(
            "floor",
            Number,
            vec![Signature::fixed(vec![Number], eval_floor)],
        );
        reg.define(
            "round",
            Number,
            vec![Signature::fixed(vec![Number], eval_round)],
        );
        reg.define(
            "sqrt",
            Number,
            vec![Signature::fixed(vec![Number], eval_sqrt)],
        );
        reg.define("ln", Number, vec![Signature::fixed(vec![Number], eval_ln)]);
        reg.define(
            "log10",
            Number,
            vec![Signature::fixed(vec![Number], eval_log10)],
        );
        reg.define(
            "log2",
            Number,
            vec![Signature::fixed(vec![Number], eval_log2)],
        );
        reg.define("sin", Number, vec![Signature::fixed(vec![Number], eval_sin)]);
        reg.define("cos", Number, vec![Signature::fixed(vec![Number], eval_cos)]);
        reg.define("tan", Number, vec![Signature::fixed(vec![Number], eval_tan)]);
        reg.define(
            "asin",
            Number,
            vec![Signature::fixed(vec![Number], eval_asin)],
        );
        reg.define(
            "acos",
            Number,
            vec![Signature::fixed(vec![Number], eval_acos)],
        );
        reg.define(
            "atan",
            Number,
            vec![Signature::fixed(vec![Number], eval_atan)],
        );
        reg.define("min", Number, vec![Signature::variadic(Number, eval_min)]);
        reg.define("max", Number, vec![Signature::variadic(Number, eval_max)]);
        reg.define("e", Number, vec![Signature::fixed(vec![], eval_e)]);
        reg.define("pi", Number, vec![Signature::fixed(vec![], eval_pi)]);
        reg.define("ln2", Number, vec![Signature::fixed(vec![], eval_ln2)]);

        // Comparison; the three-argument overloads compare strings
        // under a collator.
        for (name, eval2, eval3) in [
            ("==", eval_eq as EvalFn, eval_eq_collator as EvalFn),
            ("!=", eval_neq, eval_neq_collator),
            ("<", eval_lt, eval_lt_collator),
            ("<=", eval_lte, eval_lte_collator),
            (">", eval_gt, eval_gt_collator),
            (">=", eval_gte, eval_gte_collator),
        ] {
            reg.define(
                name,
                Boolean,
                vec![
                    Signature::fixed(vec![Val, Val], eval2),
                    Signature::fixed(vec![Val, Val, Collator], eval3),
                ],
            );
        }

        // Logic
        reg.define(
            "!",
            Boolean,
            vec![Signature::fixed(vec![Boolean], eval_not)],
        );
        reg.define("all", Boolean, vec![Signature::variadic(Boolean, eval_all)]);
        reg.define("any", Boolean, vec![Signature::variadic(Boolean, eval_any)]);

        // Feature data
        reg.define(
            "get",
            Val,
            vec![
                Signature::fixed(vec![Str], eval_get),
                Signature::fixed(vec![Str, Object], eval_get_object),
            ],
        );
        reg.define(
            "has",
            Boolean,
            vec![
                Signature::fixed(vec![Str], eval_has),
                Signature::fixed(vec![Str, Object], eval_has_object),
            ],
        );
        reg.define(
            "properties",
            Object,
            vec![Signature::fixed(vec![], eval_properties)],
        );
        reg.define(
            "geometry-type",
            Str,
            vec![Signature::fixed(vec![], eval_geometry_type)],
        );
        reg.define("id", Val, vec![Signature::fixed(vec![], eval_id)]);
        reg.define(
            "feature-state",
            Val,
            vec![Signature::fixed(vec![Str], eval_feature_state)],
        );

        // Zoom. Positional legality is enforced by the zoom-curve
        // analysis, not here.
        reg.define("zoom", Number, vec![Signature::fixed(vec![], eval_zoom)]);

        // Strings
        reg.define("concat", Str, vec![Signature::variadic(Val, eval_concat)]);
        reg.define(
            "upcase",
            Str,
            vec![Signature::fixed(vec![Str], eval_upcase)],
        );
        reg.define(
            "downcase",
            Str,
            vec![Signature::fixed(vec![Str], eval_downcase)],
        );

        // Colors
        reg.define(
            "rgb",
            Type::Color,
            vec![Signature::fixed(vec![Number, Number, Number], eval_rgb)],
        );
        reg.define(
            "rgba",
            Type::Color,
            vec![Signature::fixed(
                vec![Number, Number, Number, Number],
                eval_rgba,
            )],
        );
        reg.define(
            "to-rgba",
            Type::array(Number, Some(4)),
            vec![Signature::fixed(vec![Type::Color], eval_to_rgba)],
        );

        // Types and collation
        reg.define(
            "typeof",
            Str,
            vec![Signature::fixed(vec![Val], eval_typeof)],
        );
        reg.define(
            "resolved-locale",
            Str,
            vec![Signature::fixed(vec![Collator], eval_resolved_locale)],
        );

        // Legacy filter operators, kept for compiled style filters.
        // Their feature dependence is recognized by name prefix in the
        // constancy analysis.
        reg.define(
            "filter-==",
            Boolean,
            vec![Signature::fixed(vec![Str, Val], eval_filter_eq)],
        );
        reg.define(
            "filter-<",
            Boolean,
            vec![Signature::fixed(vec![Str, Val], eval_filter_lt)],
        );
        reg.define(
            "filter->",
            Boolean,
            vec![Signature::fixed(vec![Str, Val], eval_filter_gt)],
        );
        reg.define(
            "filter-<=",
            Boolean,
            vec![Signature::fixed(vec![Str, Val], eval_filter_lte)],
        );
        reg.define(
            "filter->=",
            Boolean,
            vec![Signature::fixed(vec![Str, Val], eval_filter_gte)],
        );
        reg.define(
            "filter-id-==",
            Boolean,
            vec![Signature::fixed(vec![Val], eval_filter_id_eq)],
        );
        reg.define(
            "filter-type-==",
            Boolean,
            vec![Signature::fixed(vec![Str], eval_filter_type_eq)],
        );
        reg.define(
            "filter-has",
            Boolean,
            vec![Signature::fixed(vec![Str], eval_filter_has)],
        );
        reg.define(
            "filter-has-id",
            Boolean,
            vec![Signature::fixed(vec![], eval_filter_has_id)],
        );
        reg.define(
            "filter-in-small",
            Boolean,
            vec![Signature::fixed(
                vec![Str, Type::array(Val, None)],
                eval_filter_in,
            )],
        );
        reg.define(
            "filter-in-large",
            Boolean,
            vec![Signature::fixed(
                vec![Str, Type::array(Val, None)],
                eval_filter_in,
            )],
        );

        reg
    }
}

fn num(args: &[Expr], i: usize, ctx: &mut EvaluationContext) -> Result<f64, RuntimeError> {
    expect_number(evaluate(&args[i], ctx)?)
}

fn string(args: &[Expr], i: usize, ctx: &mut EvaluationContext) -> Result<String, RuntimeError> {
    match evaluate(&args[i], ctx)? {
        Value::String(s) => Ok(s),
        other => Err(RuntimeError::new(format!(
            "Expected value to be of type string, but found {} instead.",
            type_of(&other)
        ))),
    }
}

// Math

fn eval_add(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    let mut sum = 0.0;
    for i in 0..args.len() {
        sum += num(args, i, ctx)?;
    }
    Ok(Value::Number(sum))
}

fn eval_mul(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    let mut product = 1.0;
    for i in 0..args.len() {
        product *= num(args, i, ctx)?;
    }
    Ok(Value::Number(product))
}

fn eval_sub(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Number(num(args, 0, ctx)? - num(args, 1, ctx)?))
}

fn eval_neg(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Number(-num(args, 0, ctx)?))
}

fn eval_div(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Number(num(args, 0, ctx)? / num(args, 1, ctx)?))
}

fn eval_mod(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Number(num(args, 0, ctx)? % num(args, 1, ctx)?))
}

fn eval_pow(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Number(num(args, 0, ctx)?.powf(num(args, 1, ctx)?)))
}

fn eval_abs(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Number(num(args, 0, ctx)?.abs()))
}

fn eval_ceil(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Number(num(args, 0, ctx)?.ceil()))
}

fn eval_floor(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Number(num(args, 0, ctx)?.floor()))
}

fn eval_round(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Number(num(args, 0, ctx)?.round()))
}

fn eval_sqrt(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Number(num(args, 0, ctx)?.sqrt()))
}

fn eval_ln(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Number(num(args, 0, ctx)?.ln()))
}

fn eval_log10(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Number(num(args, 0, ctx)?.log10()))
}

fn eval_log2(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Number(num(args, 0, ctx)?.log2()))
}

fn eval_sin(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Number(num(args, 0, ctx)?.sin()))
}

fn eval_cos(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Number(num(args, 0, ctx)?.cos()))
}

fn eval_tan(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Number(num(args, 0, ctx)?.tan()))
}

fn eval_asin(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Number(num(args, 0, ctx)?.asin()))
}

fn eval_acos(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Number(num(args, 0, ctx)?.acos()))
}

fn eval_atan(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Number(num(args, 0, ctx)?.atan()))
}

fn eval_min(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    let mut min = f64::INFINITY;
    for i in 0..args.len() {
        min = min.min(num(args, i, ctx)?);
    }
    Ok(Value::Number(min))
}

fn eval_max(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    let mut max = f64::NEG_INFINITY;
    for i in 0..args.len() {
        max = max.max(num(args, i, ctx)?);
    }
    Ok(Value::Number(max))
}

fn eval_e(_args: &[Expr], _ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Number(std::f64::consts::E))
}

fn eval_pi(_args: &[Expr], _ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Number(std::f64::consts::PI))
}

fn eval_ln2(_args: &[Expr], _ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Number(std::f64::consts::LN_2))
}

// Comparison

fn eval_eq(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    let a = evaluate(&args[0], ctx)?;
    let b = evaluate(&args[1], ctx)?;
    Ok(Value::Bool(a == b))
}

fn eval_neq(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    let a = evaluate(&args[0], ctx)?;
    let b = evaluate(&args[1], ctx)?;
    Ok(Value::Bool(a != b))
}

fn collator_compare(
    args: &[Expr],
    ctx: &mut EvaluationContext,
) -> Result<Ordering, RuntimeError> {
    let a = string(args, 0, ctx)?;
    let b = string(args, 1, ctx)?;
    match evaluate(&args[2], ctx)? {
        Value::Collator(collator) => Ok(collator.compare(&a, &b)),
        other => Err(RuntimeError::new(format!(
            "Expected value to be of type collator, but found {} instead.",
            type_of(&other)
        ))),
    }
}

fn eval_eq_collator(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(collator_compare(args, ctx)? == Ordering::Equal))
}

fn eval_neq_collator(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(collator_compare(args, ctx)? != Ordering::Equal))
}

/// Ordering comparison over two runtime values: both numbers or both
/// strings, anything else is a runtime error.
fn compare_values(a: &Value, b: &Value) -> Result<Ordering, RuntimeError> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => {
            a.partial_cmp(b)
                .ok_or_else(|| RuntimeError::new("Input is not a number."))
        }
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        (a, b) => Err(RuntimeError::new(format!(
            "Expected arguments to be of type string or number, but found {} and {} instead.",
            type_of(a),
            type_of(b)
        ))),
    }
}

fn ordered(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Ordering, RuntimeError> {
    let a = evaluate(&args[0], ctx)?;
    let b = evaluate(&args[1], ctx)?;
    compare_values(&a, &b)
}

fn eval_lt(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(ordered(args, ctx)? == Ordering::Less))
}

fn eval_lte(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(ordered(args, ctx)? != Ordering::Greater))
}

fn eval_gt(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(ordered(args, ctx)? == Ordering::Greater))
}

fn eval_gte(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(ordered(args, ctx)? != Ordering::Less))
}

fn eval_lt_collator(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(collator_compare(args, ctx)? == Ordering::Less))
}

fn eval_lte_collator(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(collator_compare(args, ctx)? != Ordering::Greater))
}

fn eval_gt_collator(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(collator_compare(args, ctx)? == Ordering::Greater))
}

fn eval_gte_collator(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(collator_compare(args, ctx)? != Ordering::Less))
}

// Logic

fn eval_not(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(!evaluate(&args[0], ctx)?.is_truthy()))
}

fn eval_all(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    for arg in args {
        if !evaluate(arg, ctx)?.is_truthy() {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

fn eval_any(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    for arg in args {
        if evaluate(arg, ctx)?.is_truthy() {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

// Feature data

fn feature_property(ctx: &EvaluationContext, key: &str) -> Value {
    ctx.feature
        .and_then(|f| f.properties.get(key))
        .cloned()
        .unwrap_or(Value::Null)
}

fn eval_get(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    let key = string(args, 0, ctx)?;
    Ok(feature_property(ctx, &key))
}

fn eval_get_object(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    let key = string(args, 0, ctx)?;
    match evaluate(&args[1], ctx)? {
        Value::Object(map) => Ok(map.get(&key).cloned().unwrap_or(Value::Null)),
        other => Err(RuntimeError::new(format!(
            "Expected value to be of type object, but found {} instead.",
            type_of(&other)
        ))),
    }
}

fn eval_has(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    let key = string(args, 0, ctx)?;
    Ok(Value::Bool(
        ctx.feature
            .map(|f| f.properties.contains_key(&key))
            .unwrap_or(false),
    ))
}

fn eval_has_object(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    let key = string(args, 0, ctx)?;
    match evaluate(&args[1], ctx)? {
        Value::Object(map) => Ok(Value::Bool(map.contains_key(&key))),
        other => Err(RuntimeError::new(format!(
            "Expected value to be of type object, but found {} instead.",
            type_of(&other)
        ))),
    }
}

fn eval_properties(_args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Object(
        ctx.feature.map(|f| f.properties.clone()).unwrap_or_default(),
    ))
}

fn eval_geometry_type(_args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(ctx
        .feature
        .and_then(|f| f.geometry_kind())
        .map(|kind| Value::String(kind.to_string()))
        .unwrap_or(Value::Null))
}

fn eval_id(_args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(ctx.feature.map(|f| f.id.clone()).unwrap_or(Value::Null))
}

fn eval_feature_state(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    let key = string(args, 0, ctx)?;
    Ok(ctx
        .feature_state
        .and_then(|state| state.get(&key))
        .cloned()
        .unwrap_or(Value::Null))
}

fn eval_zoom(_args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Number(ctx.globals.zoom))
}

// Strings

fn eval_concat(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    let mut out = String::new();
    for arg in args {
        out.push_str(&evaluate(arg, ctx)?.stringify());
    }
    Ok(Value::String(out))
}

fn eval_upcase(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::String(string(args, 0, ctx)?.to_uppercase()))
}

fn eval_downcase(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::String(string(args, 0, ctx)?.to_lowercase()))
}

// Colors

fn color_channels(
    args: &[Expr],
    ctx: &mut EvaluationContext,
) -> Result<(f64, f64, f64, f64), RuntimeError> {
    let r = num(args, 0, ctx)?;
    let g = num(args, 1, ctx)?;
    let b = num(args, 2, ctx)?;
    let a = if args.len() == 4 { num(args, 3, ctx)? } else { 1.0 };

    for channel in [r, g, b] {
        if !(0.0..=255.0).contains(&channel) {
            return Err(RuntimeError::new(format!(
                "Invalid rgba value [{}, {}, {}, {}]: channels must be between 0 and 255.",
                r, g, b, a
            )));
        }
    }
    if !(0.0..=1.0).contains(&a) {
        return Err(RuntimeError::new(format!(
            "Invalid rgba value [{}, {}, {}, {}]: alpha must be between 0 and 1.",
            r, g, b, a
        )));
    }
    Ok((r, g, b, a))
}

fn eval_rgb(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    let (r, g, b, a) = color_channels(args, ctx)?;
    Ok(Value::Color(Color::from_rgba_channels(r, g, b, a)))
}

fn eval_rgba(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    let (r, g, b, a) = color_channels(args, ctx)?;
    Ok(Value::Color(Color::from_rgba_channels(r, g, b, a)))
}

fn eval_to_rgba(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    match evaluate(&args[0], ctx)? {
        Value::Color(c) => Ok(Value::Array(vec![
            Value::Number(c.r * 255.0),
            Value::Number(c.g * 255.0),
            Value::Number(c.b * 255.0),
            Value::Number(c.a),
        ])),
        other => Err(RuntimeError::new(format!(
            "Expected value to be of type color, but found {} instead.",
            type_of(&other)
        ))),
    }
}

// Types and collation

fn eval_typeof(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    let value = evaluate(&args[0], ctx)?;
    Ok(Value::String(type_of(&value).to_string()))
}

fn eval_resolved_locale(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    match evaluate(&args[0], ctx)? {
        Value::Collator(collator) => Ok(Value::String(collator.resolved_locale().to_string())),
        other => Err(RuntimeError::new(format!(
            "Expected value to be of type collator, but found {} instead.",
            type_of(&other)
        ))),
    }
}

// Legacy filters

fn eval_filter_eq(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    let key = string(args, 0, ctx)?;
    let rhs = evaluate(&args[1], ctx)?;
    Ok(Value::Bool(feature_property(ctx, &key) == rhs))
}

fn filter_ordered(
    args: &[Expr],
    ctx: &mut EvaluationContext,
) -> Result<Option<Ordering>, RuntimeError> {
    let key = string(args, 0, ctx)?;
    let rhs = evaluate(&args[1], ctx)?;
    let lhs = feature_property(ctx, &key);
    match (&lhs, &rhs) {
        (Value::Number(_), Value::Number(_)) | (Value::String(_), Value::String(_)) => {
            Ok(compare_values(&lhs, &rhs).ok())
        }
        _ => Ok(None),
    }
}

fn eval_filter_lt(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(
        filter_ordered(args, ctx)? == Some(Ordering::Less),
    ))
}

fn eval_filter_gt(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(
        filter_ordered(args, ctx)? == Some(Ordering::Greater),
    ))
}

fn eval_filter_lte(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(matches!(
        filter_ordered(args, ctx)?,
        Some(Ordering::Less) | Some(Ordering::Equal)
    )))
}

fn eval_filter_gte(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(matches!(
        filter_ordered(args, ctx)?,
        Some(Ordering::Greater) | Some(Ordering::Equal)
    )))
}

fn eval_filter_id_eq(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    let rhs = evaluate(&args[0], ctx)?;
    let id = ctx.feature.map(|f| f.id.clone()).unwrap_or(Value::Null);
    Ok(Value::Bool(id == rhs))
}

fn eval_filter_type_eq(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    let rhs = string(args, 0, ctx)?;
    Ok(Value::Bool(
        ctx.feature.and_then(|f| f.geometry_kind()) == Some(rhs.as_str()),
    ))
}

fn eval_filter_has(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    let key = string(args, 0, ctx)?;
    Ok(Value::Bool(
        ctx.feature
            .map(|f| f.properties.contains_key(&key))
            .unwrap_or(false),
    ))
}

fn eval_filter_has_id(_args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(
        ctx.feature.map(|f| f.id != Value::Null).unwrap_or(false),
    ))
}

fn eval_filter_in(args: &[Expr], ctx: &mut EvaluationContext) -> Result<Value, RuntimeError> {
    let key = string(args, 0, ctx)?;
    let haystack = match evaluate(&args[1], ctx)? {
        Value::Array(items) => items,
        other => {
            return Err(RuntimeError::new(format!(
                "Expected value to be of type array, but found {} instead.",
                type_of(&other)
            )))
        }
    };
    Ok(Value::Bool(haystack.contains(&feature_property(ctx, &key))))
}
