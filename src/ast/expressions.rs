use serde_json::json;

use crate::evaluator::{EvaluationContext, RuntimeError};
use crate::types::Type;
use crate::value::Value;

/// Evaluation function for a compound builtin, selected during overload
/// resolution and stored on the node.
pub type EvalFn = fn(&[Expr], &mut EvaluationContext) -> Result<Value, RuntimeError>;

/// A label in a `match` branch: a string or an integer number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MatchLabel {
    Number(i64),
    String(String),
}

impl MatchLabel {
    /// Whether a runtime value matches this label.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (MatchLabel::Number(n), Value::Number(v)) => *v == *n as f64,
            (MatchLabel::String(s), Value::String(v)) => s == v,
            _ => false,
        }
    }

    fn serialize(&self) -> serde_json::Value {
        match self {
            MatchLabel::Number(n) => json!(n),
            MatchLabel::String(s) => json!(s),
        }
    }
}

/// The interpolation scheme of an `interpolate` curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Interpolation {
    Linear,
    Exponential { base: f64 },
    CubicBezier { x1: f64, y1: f64, x2: f64, y2: f64 },
}

impl Interpolation {
    pub fn serialize(&self) -> serde_json::Value {
        match self {
            Interpolation::Linear => json!(["linear"]),
            Interpolation::Exponential { base } => json!(["exponential", base]),
            Interpolation::CubicBezier { x1, y1, x2, y2 } => {
                json!(["cubic-bezier", x1, y1, x2, y2])
            }
        }
    }
}

/// A typed expression node.
///
/// Constructed once by the parser from the JSON wire form, immutable
/// thereafter. Children are owned boxes; the tree has no back-edges and
/// no sharing.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A constant value with its inferred (or adopted) type.
    Literal { ty: Type, value: Value },

    /// Runtime type assertion (`string`/`number`/`boolean`/`object`/
    /// `array`): returns the first argument whose runtime type matches,
    /// fails only when the last argument also mismatches.
    Assertion { ty: Type, args: Vec<Expr> },

    /// Type conversion (`to-number`/`to-color` with fallback arguments,
    /// `to-boolean`/`to-string` which never fail).
    Coercion { ty: Type, args: Vec<Expr> },

    /// Array element access by index.
    At {
        ty: Type,
        index: Box<Expr>,
        input: Box<Expr>,
    },

    /// Membership test on an array or substring test on a string.
    In {
        needle: Box<Expr>,
        haystack: Box<Expr>,
    },

    /// First index of a needle in an array or string, optionally
    /// starting from an offset. `-1` when absent.
    IndexOf {
        needle: Box<Expr>,
        haystack: Box<Expr>,
        from: Option<Box<Expr>>,
    },

    /// Subsequence of an array or string.
    Slice {
        ty: Type,
        input: Box<Expr>,
        begin: Box<Expr>,
        end: Option<Box<Expr>>,
    },

    /// Element or character count of an array or string.
    Length { input: Box<Expr> },

    /// Ordered (test, result) pairs plus a mandatory otherwise branch;
    /// short-circuits at the first true test.
    Case {
        ty: Type,
        branches: Vec<(Expr, Expr)>,
        otherwise: Box<Expr>,
    },

    /// Input matched against branch labels (strings or integers, single
    /// or grouped), with a mandatory otherwise branch.
    Match {
        ty: Type,
        input: Box<Expr>,
        branches: Vec<(Vec<MatchLabel>, Expr)>,
        otherwise: Box<Expr>,
    },

    /// First non-null argument.
    Coalesce { ty: Type, args: Vec<Expr> },

    /// Lexical bindings visible to `var` inside the result expression.
    Let {
        bindings: Vec<(String, Expr)>,
        result: Box<Expr>,
    },

    /// Reference to a `let` binding.
    Var { ty: Type, name: String },

    /// Stepwise curve: output of the greatest label `<=` input. The
    /// first label is always negative infinity.
    Step {
        ty: Type,
        input: Box<Expr>,
        labels: Vec<f64>,
        outputs: Vec<Expr>,
    },

    /// Continuous curve interpolating between stop outputs.
    Interpolate {
        ty: Type,
        interpolation: Interpolation,
        input: Box<Expr>,
        labels: Vec<f64>,
        outputs: Vec<Expr>,
    },

    /// Locale-aware comparator construction.
    CollatorExpr {
        case_sensitive: Box<Expr>,
        diacritic_sensitive: Box<Expr>,
        locale: Option<Box<Expr>>,
    },

    /// A builtin from the operator registry, with the evaluation
    /// function of the signature that won overload resolution.
    Compound {
        ty: Type,
        name: &'static str,
        args: Vec<Expr>,
        eval: EvalFn,
    },
}

impl Expr {
    /// Construct a literal, inferring the type from the value.
    pub fn literal(value: Value) -> Expr {
        let ty = crate::value::type_of(&value);
        Expr::Literal { ty, value }
    }

    /// The node's resolved output type.
    pub fn ty(&self) -> Type {
        match self {
            Expr::Literal { ty, .. }
            | Expr::Assertion { ty, .. }
            | Expr::Coercion { ty, .. }
            | Expr::At { ty, .. }
            | Expr::Slice { ty, .. }
            | Expr::Case { ty, .. }
            | Expr::Match { ty, .. }
            | Expr::Coalesce { ty, .. }
            | Expr::Var { ty, .. }
            | Expr::Step { ty, .. }
            | Expr::Interpolate { ty, .. }
            | Expr::Compound { ty, .. } => ty.clone(),
            Expr::In { .. } => Type::Boolean,
            Expr::IndexOf { .. } => Type::Number,
            Expr::Length { .. } => Type::Number,
            Expr::Let { result, .. } => result.ty(),
            Expr::CollatorExpr { .. } => Type::Collator,
        }
    }

    /// Visit each direct child. `var` nodes have none; `let` visits both
    /// bindings and result, so a whole-tree walk sees every dependency a
    /// `var` can refer to.
    pub fn each_child<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        match self {
            Expr::Literal { .. } | Expr::Var { .. } => {}
            Expr::Assertion { args, .. }
            | Expr::Coercion { args, .. }
            | Expr::Coalesce { args, .. }
            | Expr::Compound { args, .. } => {
                for arg in args {
                    f(arg);
                }
            }
            Expr::At { index, input, .. } => {
                f(index);
                f(input);
            }
            Expr::In { needle, haystack } => {
                f(needle);
                f(haystack);
            }
            Expr::IndexOf {
                needle,
                haystack,
                from,
            } => {
                f(needle);
                f(haystack);
                if let Some(from) = from {
                    f(from);
                }
            }
            Expr::Slice {
                input, begin, end, ..
            } => {
                f(input);
                f(begin);
                if let Some(end) = end {
                    f(end);
                }
            }
            Expr::Length { input } => f(input),
            Expr::Case {
                branches,
                otherwise,
                ..
            } => {
                for (test, result) in branches {
                    f(test);
                    f(result);
                }
                f(otherwise);
            }
            Expr::Match {
                input,
                branches,
                otherwise,
                ..
            } => {
                f(input);
                for (_, output) in branches {
                    f(output);
                }
                f(otherwise);
            }
            Expr::Let { bindings, result } => {
                for (_, bound) in bindings {
                    f(bound);
                }
                f(result);
            }
            Expr::Step { input, outputs, .. } | Expr::Interpolate { input, outputs, .. } => {
                f(input);
                for output in outputs {
                    f(output);
                }
            }
            Expr::CollatorExpr {
                case_sensitive,
                diacritic_sensitive,
                locale,
            } => {
                f(case_sensitive);
                f(diacritic_sensitive);
                if let Some(locale) = locale {
                    f(locale);
                }
            }
        }
    }

    /// Whether any node in the tree satisfies the predicate.
    pub fn any_descendant(&self, pred: &mut dyn FnMut(&Expr) -> bool) -> bool {
        if pred(self) {
            return true;
        }
        let mut found = false;
        self.each_child(&mut |child| {
            if !found && child.any_descendant(pred) {
                found = true;
            }
        });
        found
    }

    /// Serialize back to the nested-array JSON form. The result is
    /// semantically equivalent to the source expression, not necessarily
    /// byte-identical.
    pub fn serialize(&self) -> serde_json::Value {
        match self {
            Expr::Literal { value, .. } => match value {
                Value::Color(c) => {
                    let [r, g, b, a] = c.to_array();
                    json!(["rgba", r * 255.0, g * 255.0, b * 255.0, a])
                }
                Value::Array(_) | Value::Object(_) => json!(["literal", value.to_json()]),
                other => other.to_json(),
            },
            Expr::Assertion { ty, args } => {
                let mut out = match ty {
                    Type::Array { item, length } => {
                        let mut out = vec![json!("array")];
                        if **item != Type::Value {
                            out.push(json!(item.kind()));
                            if let Some(n) = length {
                                out.push(json!(n));
                            }
                        }
                        out
                    }
                    other => vec![json!(other.kind())],
                };
                out.extend(args.iter().map(Expr::serialize));
                serde_json::Value::Array(out)
            }
            Expr::Coercion { ty, args } => {
                let op = match ty {
                    Type::Color => "to-color",
                    Type::Boolean => "to-boolean",
                    Type::String => "to-string",
                    _ => "to-number",
                };
                let mut out = vec![json!(op)];
                out.extend(args.iter().map(Expr::serialize));
                serde_json::Value::Array(out)
            }
            Expr::At { index, input, .. } => json!(["at", index.serialize(), input.serialize()]),
            Expr::In { needle, haystack } => {
                json!(["in", needle.serialize(), haystack.serialize()])
            }
            Expr::IndexOf {
                needle,
                haystack,
                from,
            } => {
                let mut out = vec![json!("index-of"), needle.serialize(), haystack.serialize()];
                if let Some(from) = from {
                    out.push(from.serialize());
                }
                serde_json::Value::Array(out)
            }
            Expr::Slice {
                input, begin, end, ..
            } => {
                let mut out = vec![json!("slice"), input.serialize(), begin.serialize()];
                if let Some(end) = end {
                    out.push(end.serialize());
                }
                serde_json::Value::Array(out)
            }
            Expr::Length { input } => json!(["length", input.serialize()]),
            Expr::Case {
                branches,
                otherwise,
                ..
            } => {
                let mut out = vec![json!("case")];
                for (test, result) in branches {
                    out.push(test.serialize());
                    out.push(result.serialize());
                }
                out.push(otherwise.serialize());
                serde_json::Value::Array(out)
            }
            Expr::Match {
                input,
                branches,
                otherwise,
                ..
            } => {
                let mut out = vec![json!("match"), input.serialize()];
                for (labels, output) in branches {
                    if labels.len() == 1 {
                        out.push(labels[0].serialize());
                    } else {
                        out.push(serde_json::Value::Array(
                            labels.iter().map(MatchLabel::serialize).collect(),
                        ));
                    }
                    out.push(output.serialize());
                }
                out.push(otherwise.serialize());
                serde_json::Value::Array(out)
            }
            Expr::Coalesce { args, .. } => {
                let mut out = vec![json!("coalesce")];
                out.extend(args.iter().map(Expr::serialize));
                serde_json::Value::Array(out)
            }
            Expr::Let { bindings, result } => {
                let mut out = vec![json!("let")];
                for (name, bound) in bindings {
                    out.push(json!(name));
                    out.push(bound.serialize());
                }
                out.push(result.serialize());
                serde_json::Value::Array(out)
            }
            Expr::Var { name, .. } => json!(["var", name]),
            Expr::Step {
                input,
                labels,
                outputs,
                ..
            } => {
                let mut out = vec![json!("step"), input.serialize(), outputs[0].serialize()];
                for (label, output) in labels.iter().zip(outputs.iter()).skip(1) {
                    out.push(json!(label));
                    out.push(output.serialize());
                }
                serde_json::Value::Array(out)
            }
            Expr::Interpolate {
                interpolation,
                input,
                labels,
                outputs,
                ..
            } => {
                let mut out = vec![
                    json!("interpolate"),
                    interpolation.serialize(),
                    input.serialize(),
                ];
                for (label, output) in labels.iter().zip(outputs.iter()) {
                    out.push(json!(label));
                    out.push(output.serialize());
                }
                serde_json::Value::Array(out)
            }
            Expr::CollatorExpr {
                case_sensitive,
                diacritic_sensitive,
                locale,
            } => {
                let mut options = serde_json::Map::new();
                options.insert("case-sensitive".to_string(), case_sensitive.serialize());
                options.insert(
                    "diacritic-sensitive".to_string(),
                    diacritic_sensitive.serialize(),
                );
                if let Some(locale) = locale {
                    options.insert("locale".to_string(), locale.serialize());
                }
                json!(["collator", serde_json::Value::Object(options)])
            }
            Expr::Compound { name, args, .. } => {
                let mut out = vec![json!(name)];
                out.extend(args.iter().map(Expr::serialize));
                serde_json::Value::Array(out)
            }
        }
    }

    /// A finite sample of the literal values this node can produce, or
    /// `None` entries where the output is unconstrained. Used by
    /// property rules that require statically-known outputs (for
    /// example, font lists).
    pub fn possible_outputs(&self) -> Vec<Option<Value>> {
        match self {
            Expr::Literal { value, .. } => vec![Some(value.clone())],
            Expr::Assertion { args, .. } | Expr::Coercion { args, .. } => {
                args.iter().flat_map(Expr::possible_outputs).collect()
            }
            Expr::Coalesce { args, .. } => {
                args.iter().flat_map(Expr::possible_outputs).collect()
            }
            Expr::Case {
                branches,
                otherwise,
                ..
            } => {
                let mut outputs: Vec<Option<Value>> = branches
                    .iter()
                    .flat_map(|(_, result)| result.possible_outputs())
                    .collect();
                outputs.extend(otherwise.possible_outputs());
                outputs
            }
            Expr::Match {
                branches,
                otherwise,
                ..
            } => {
                let mut outputs: Vec<Option<Value>> = branches
                    .iter()
                    .flat_map(|(_, output)| output.possible_outputs())
                    .collect();
                outputs.extend(otherwise.possible_outputs());
                outputs
            }
            Expr::Step { outputs, .. } | Expr::Interpolate { outputs, .. } => {
                outputs.iter().flat_map(Expr::possible_outputs).collect()
            }
            Expr::Let { result, .. } => result.possible_outputs(),
            _ => vec![None],
        }
    }
}
