use std::collections::HashSet;

use serde_json::Value as Json;

use crate::analysis::{is_feature_constant, is_global_property_constant};
use crate::ast::builtins::{Params, Registry, Signature};
use crate::ast::expressions::{Expr, Interpolation, MatchLabel};
use crate::evaluator::{evaluate, EvaluationContext};
use crate::types::{check_subtype, Type};
use crate::value::Value;

/// Largest integer exactly representable in an f64; the limit on
/// numeric `match` labels.
const MAX_SAFE_INTEGER: f64 = 9007199254740991.0;

/// A static error produced while parsing an expression.
///
/// Errors are collected, never thrown one at a time; a failed parse
/// returns the whole batch and no partial AST. The key is the JSON path
/// of the offending element, `"[2][1]"`-style.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsingError {
    pub key: String,
    pub message: String,
}

impl ParsingError {
    pub fn new(key: impl Into<String>, message: impl Into<String>) -> ParsingError {
        ParsingError {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ParsingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.key.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.key, self.message)
        }
    }
}

impl std::error::Error for ParsingError {}

/// How to reconcile a parsed node with the caller's expected type.
///
/// The default depends on the expectation: assertable kinds insert a
/// runtime assertion, color expectations insert a coercion. `Omit` is
/// used by variants that defer annotation to an enclosing node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TypeAnnotation {
    Assert,
    Coerce,
    Omit,
}

/// State threaded through one parse: the injected operator registry,
/// the accumulated errors, the JSON path used for error keys, and the
/// lexical scope of `let` bindings.
pub struct ParsingContext<'a> {
    registry: &'a Registry,
    pub errors: Vec<ParsingError>,
    path: Vec<usize>,
    scope: Vec<(String, Type)>,
}

/// Parse a complete expression against the global registry.
///
/// On failure returns every independent fault found; no partial AST is
/// ever produced.
pub fn parse_expression(json: &Json, expected: Option<&Type>) -> Result<Expr, Vec<ParsingError>> {
    let mut ctx = ParsingContext::new(Registry::global());
    match ctx.parse_root(json, expected) {
        Some(expr) if ctx.errors.is_empty() => Ok(expr),
        _ => {
            if ctx.errors.is_empty() {
                ctx.error("Expected an expression.".to_string());
            }
            Err(ctx.errors)
        }
    }
}

impl<'a> ParsingContext<'a> {
    pub fn new(registry: &'a Registry) -> ParsingContext<'a> {
        ParsingContext {
            registry,
            errors: Vec::new(),
            path: Vec::new(),
            scope: Vec::new(),
        }
    }

    /// The error key for the current position, e.g. `"[2][1]"`.
    pub fn key(&self) -> String {
        self.path.iter().map(|i| format!("[{}]", i)).collect()
    }

    fn error(&mut self, message: String) {
        let key = self.key();
        self.errors.push(ParsingError::new(key, message));
    }

    fn error_at(&mut self, index: usize, message: String) {
        let key = format!("{}[{}]", self.key(), index);
        self.errors.push(ParsingError::new(key, message));
    }

    /// Parse the root of an expression (no path component).
    pub fn parse_root(&mut self, json: &Json, expected: Option<&Type>) -> Option<Expr> {
        self.parse_internal(json, expected, None)
    }

    /// Parse the child at `index`, recording it in the error path.
    ///
    /// Returns `None` after recording at least one error; callers
    /// propagate `None` without assuming partial results.
    pub fn parse(
        &mut self,
        json: &Json,
        index: usize,
        expected: Option<&Type>,
        annotation: Option<TypeAnnotation>,
    ) -> Option<Expr> {
        self.path.push(index);
        let result = self.parse_internal(json, expected, annotation);
        self.path.pop();
        result
    }

    fn parse_internal(
        &mut self,
        json: &Json,
        expected: Option<&Type>,
        annotation: Option<TypeAnnotation>,
    ) -> Option<Expr> {
        let node = match json {
            Json::Null | Json::Bool(_) | Json::Number(_) | Json::String(_) => {
                Some(Expr::literal(Value::from_json(json)))
            }
            Json::Object(_) => {
                self.error(
                    "Bare objects invalid. Use [\"literal\", {...}] instead.".to_string(),
                );
                None
            }
            Json::Array(arr) => self.parse_array(arr, expected),
        }?;

        let node = match expected {
            Some(expected) => self.apply_annotation(node, expected, annotation)?,
            None => node,
        };

        Some(fold_constant(node))
    }

    fn parse_array(&mut self, arr: &[Json], expected: Option<&Type>) -> Option<Expr> {
        if arr.is_empty() {
            self.error(
                "Expected an array with at least one element. If you wanted a literal array, use [\"literal\", []].".to_string(),
            );
            return None;
        }

        let op = match arr[0].as_str() {
            Some(op) => op,
            None => {
                self.error(format!(
                    "Expression name must be a string, but found {} instead. If you wanted a literal array, use [\"literal\", [...]].",
                    json_type_name(&arr[0])
                ));
                return None;
            }
        };

        match op {
            "literal" => self.parse_literal(arr, expected),
            "string" => self.parse_assertion(Type::String, arr),
            "number" => self.parse_assertion(Type::Number, arr),
            "boolean" => self.parse_assertion(Type::Boolean, arr),
            "object" => self.parse_assertion(Type::Object, arr),
            "array" => self.parse_array_assertion(arr),
            "to-number" => self.parse_coercion(Type::Number, arr),
            "to-color" => self.parse_coercion(Type::Color, arr),
            "to-boolean" => self.parse_coercion(Type::Boolean, arr),
            "to-string" => self.parse_coercion(Type::String, arr),
            "case" => self.parse_case(arr, expected),
            "match" => self.parse_match(arr, expected),
            "coalesce" => self.parse_coalesce(arr, expected),
            "let" => {
                let depth = self.scope.len();
                let result = self.parse_let(arr, expected);
                self.scope.truncate(depth);
                result
            }
            "var" => self.parse_var(arr),
            "step" => self.parse_step(arr, expected),
            "interpolate" => self.parse_interpolate(arr, expected),
            "collator" => self.parse_collator(arr),
            "at" => self.parse_at(arr),
            "in" => self.parse_in(arr),
            "index-of" => self.parse_index_of(arr),
            "slice" => self.parse_slice(arr),
            "length" => self.parse_length(arr),
            _ => self.parse_compound(op, arr),
        }
    }

    /// Wrap `node` to satisfy `expected` when its resolved type does
    /// not already: a runtime assertion for assertable kinds, a
    /// coercion for colors, an error for anything else.
    fn apply_annotation(
        &mut self,
        node: Expr,
        expected: &Type,
        annotation: Option<TypeAnnotation>,
    ) -> Option<Expr> {
        let actual = node.ty();
        let mismatch = match check_subtype(expected, &actual) {
            None => return Some(node),
            Some(message) => message,
        };

        let default = match expected {
            Type::String
            | Type::Number
            | Type::Boolean
            | Type::Object
            | Type::Array { .. } => Some(TypeAnnotation::Assert),
            Type::Color => Some(TypeAnnotation::Coerce),
            _ => None,
        };

        match annotation.or(default) {
            Some(TypeAnnotation::Assert) => Some(Expr::Assertion {
                ty: expected.clone(),
                args: vec![node],
            }),
            Some(TypeAnnotation::Coerce) => Some(Expr::Coercion {
                ty: expected.clone(),
                args: vec![node],
            }),
            Some(TypeAnnotation::Omit) => Some(node),
            None => {
                self.error(mismatch);
                None
            }
        }
    }

    fn parse_literal(&mut self, arr: &[Json], expected: Option<&Type>) -> Option<Expr> {
        if arr.len() != 2 {
            self.error(format!(
                "'literal' expression requires exactly one argument, but found {} instead.",
                arr.len() - 1
            ));
            return None;
        }
        let value = Value::from_json(&arr[1]);
        let mut ty = crate::value::type_of(&value);

        // A zero-length array literal adopts a compatible expected
        // array type, so [] can satisfy array<number, 0>.
        if let (
            Type::Array {
                length: Some(0), ..
            },
            Some(Type::Array { item, length }),
        ) = (&ty, expected)
        {
            if length.is_none() || *length == Some(0) {
                ty = Type::Array {
                    item: item.clone(),
                    length: *length,
                };
            }
        }

        Some(Expr::Literal { ty, value })
    }

    fn parse_assertion(&mut self, ty: Type, arr: &[Json]) -> Option<Expr> {
        if arr.len() < 2 {
            self.error("Expected at least one argument.".to_string());
            return None;
        }
        let mut args = Vec::with_capacity(arr.len() - 1);
        for (i, arg) in arr[1..].iter().enumerate() {
            args.push(self.parse(arg, i + 1, Some(&Type::Value), None)?);
        }
        Some(Expr::Assertion { ty, args })
    }

    fn parse_array_assertion(&mut self, arr: &[Json]) -> Option<Expr> {
        if !(2..=4).contains(&arr.len()) {
            self.error(format!(
                "Expected 1, 2, or 3 arguments, but found {} instead.",
                arr.len() - 1
            ));
            return None;
        }

        let mut item = Type::Value;
        let mut length = None;

        if arr.len() > 2 {
            item = match arr[1].as_str() {
                Some("string") => Type::String,
                Some("number") => Type::Number,
                Some("boolean") => Type::Boolean,
                _ => {
                    self.error_at(
                        1,
                        "The item type argument of \"array\" must be one of string, number, boolean".to_string(),
                    );
                    return None;
                }
            };
        }

        if arr.len() > 3 {
            length = match arr[2].as_u64() {
                Some(n) => Some(n as usize),
                None => {
                    self.error_at(
                        2,
                        "The length argument to \"array\" must be a positive integer literal".to_string(),
                    );
                    return None;
                }
            };
        }

        let input = self.parse(&arr[arr.len() - 1], arr.len() - 1, Some(&Type::Value), None)?;
        Some(Expr::Assertion {
            ty: Type::array(item, length),
            args: vec![input],
        })
    }

    fn parse_coercion(&mut self, ty: Type, arr: &[Json]) -> Option<Expr> {
        let single_argument = matches!(ty, Type::Boolean | Type::String);
        if single_argument && arr.len() != 2 {
            self.error("Expected one argument.".to_string());
            return None;
        }
        if arr.len() < 2 {
            self.error("Expected at least one argument.".to_string());
            return None;
        }
        let mut args = Vec::with_capacity(arr.len() - 1);
        for (i, arg) in arr[1..].iter().enumerate() {
            args.push(self.parse(arg, i + 1, Some(&Type::Value), None)?);
        }
        Some(Expr::Coercion { ty, args })
    }

    fn parse_case(&mut self, arr: &[Json], expected: Option<&Type>) -> Option<Expr> {
        if arr.len() < 4 {
            self.error(format!(
                "Expected at least 3 arguments, but found only {}.",
                arr.len() - 1
            ));
            return None;
        }
        if arr.len() % 2 != 0 {
            self.error("Expected an odd number of arguments.".to_string());
            return None;
        }

        // Branch annotation is deferred: results parse unannotated and
        // the whole case is wrapped by the caller when needed.
        let expected_output = expected.filter(|t| **t != Type::Value);
        let mut output_type: Option<Type> = expected_output.cloned();
        let mut branches = Vec::new();

        let mut i = 1;
        while i < arr.len() - 1 {
            let test = self.parse(&arr[i], i, Some(&Type::Boolean), None)?;
            let result =
                self.parse(&arr[i + 1], i + 1, output_type.as_ref(), Some(TypeAnnotation::Omit))?;

            match &output_type {
                None => output_type = Some(result.ty()),
                Some(output) if expected_output.is_none() => {
                    if let Some(message) = check_subtype(output, &result.ty()) {
                        self.error_at(i + 1, message);
                        return None;
                    }
                }
                Some(_) => {}
            }
            branches.push((test, result));
            i += 2;
        }

        let otherwise = self.parse(
            &arr[arr.len() - 1],
            arr.len() - 1,
            output_type.as_ref(),
            Some(TypeAnnotation::Omit),
        )?;
        let output_type = match output_type {
            Some(ty) => {
                if expected_output.is_none() {
                    if let Some(message) = check_subtype(&ty, &otherwise.ty()) {
                        self.error_at(arr.len() - 1, message);
                        return None;
                    }
                }
                ty
            }
            None => otherwise.ty(),
        };

        let ty = match expected_output {
            Some(exp) => {
                let needs_annotation = branches
                    .iter()
                    .map(|(_, result)| result)
                    .chain(std::iter::once(&otherwise))
                    .any(|result| check_subtype(exp, &result.ty()).is_some());
                if needs_annotation {
                    Type::Value
                } else {
                    output_type
                }
            }
            None => output_type,
        };

        Some(Expr::Case {
            ty,
            branches,
            otherwise: Box::new(otherwise),
        })
    }

    fn parse_match(&mut self, arr: &[Json], expected: Option<&Type>) -> Option<Expr> {
        if arr.len() < 5 {
            self.error(format!(
                "Expected at least 4 arguments, but found only {}.",
                arr.len() - 1
            ));
            return None;
        }
        if arr.len() % 2 != 1 {
            self.error("Expected an even number of arguments.".to_string());
            return None;
        }

        let expected_output = expected.filter(|t| **t != Type::Value);
        let mut output_type: Option<Type> = expected_output.cloned();
        let mut input_type: Option<Type> = None;
        let mut seen: HashSet<MatchLabel> = HashSet::new();
        let mut branches = Vec::new();

        let mut i = 2;
        while i < arr.len() - 1 {
            let label_values: Vec<&Json> = match &arr[i] {
                Json::Array(labels) => {
                    if labels.is_empty() {
                        self.error_at(i, "Expected at least one branch label.".to_string());
                        return None;
                    }
                    labels.iter().collect()
                }
                single => vec![single],
            };

            let mut labels = Vec::with_capacity(label_values.len());
            for label_json in label_values {
                let (label, label_type) = match label_json {
                    Json::String(s) => (MatchLabel::String(s.clone()), Type::String),
                    Json::Number(n) => {
                        let n = n.as_f64().unwrap_or(f64::NAN);
                        if n.abs() > MAX_SAFE_INTEGER {
                            self.error_at(
                                i,
                                format!(
                                    "Branch labels must be integers no larger than {}.",
                                    MAX_SAFE_INTEGER as i64
                                ),
                            );
                            return None;
                        }
                        if n.fract() != 0.0 || n.is_nan() {
                            self.error_at(
                                i,
                                "Numeric branch labels must be integer values.".to_string(),
                            );
                            return None;
                        }
                        (MatchLabel::Number(n as i64), Type::Number)
                    }
                    _ => {
                        self.error_at(i, "Branch labels must be numbers or strings.".to_string());
                        return None;
                    }
                };

                match &input_type {
                    None => input_type = Some(label_type),
                    Some(input) => {
                        if let Some(message) = check_subtype(input, &label_type) {
                            self.error_at(i, message);
                            return None;
                        }
                    }
                }

                if !seen.insert(label.clone()) {
                    self.error_at(i, "Branch labels must be unique.".to_string());
                    return None;
                }
                labels.push(label);
            }

            let output = self.parse(&arr[i + 1], i + 1, output_type.as_ref(), None)?;
            if output_type.is_none() {
                output_type = Some(output.ty());
            }
            branches.push((labels, output));
            i += 2;
        }

        let input = self.parse(&arr[1], 1, Some(&Type::Value), None)?;
        let otherwise = self.parse(&arr[arr.len() - 1], arr.len() - 1, output_type.as_ref(), None)?;

        let input_type = input_type?;
        if input.ty() != Type::Value {
            if let Some(message) = check_subtype(&input_type, &input.ty()) {
                self.error_at(1, message);
                return None;
            }
        }

        let ty = output_type.unwrap_or_else(|| otherwise.ty());
        Some(Expr::Match {
            ty,
            input: Box::new(input),
            branches,
            otherwise: Box::new(otherwise),
        })
    }

    fn parse_coalesce(&mut self, arr: &[Json], expected: Option<&Type>) -> Option<Expr> {
        if arr.len() < 2 {
            self.error("Expected at least one argument.".to_string());
            return None;
        }

        // Arguments never inherit the outer annotation: a coercion
        // failure inside a later argument must not preempt a successful
        // earlier one. When the result itself must satisfy an
        // expectation, the caller wraps the whole coalesce instead.
        let expected_output = expected.filter(|t| **t != Type::Value);
        let mut output_type: Option<Type> = expected_output.cloned();
        let mut args = Vec::with_capacity(arr.len() - 1);

        for (i, arg) in arr[1..].iter().enumerate() {
            let parsed =
                self.parse(arg, i + 1, output_type.as_ref(), Some(TypeAnnotation::Omit))?;
            if output_type.is_none() {
                output_type = Some(parsed.ty());
            }
            args.push(parsed);
        }

        let ty = match (expected_output, output_type) {
            (Some(exp), Some(output)) => {
                let needs_annotation =
                    args.iter().any(|arg| check_subtype(exp, &arg.ty()).is_some());
                if needs_annotation {
                    Type::Value
                } else {
                    output
                }
            }
            (None, Some(output)) => output,
            (_, None) => Type::Value,
        };

        Some(Expr::Coalesce { ty, args })
    }

    fn parse_let(&mut self, arr: &[Json], expected: Option<&Type>) -> Option<Expr> {
        if arr.len() < 4 {
            self.error(format!(
                "Expected at least 3 arguments, but found {} instead.",
                arr.len() - 1
            ));
            return None;
        }
        if arr.len() % 2 != 0 {
            self.error("Expected an even number of arguments.".to_string());
            return None;
        }

        let mut bindings = Vec::new();
        let mut i = 1;
        while i < arr.len() - 1 {
            let name = match arr[i].as_str() {
                Some(name) => name,
                None => {
                    self.error_at(
                        i,
                        format!(
                            "Expected string, but found {} instead.",
                            json_type_name(&arr[i])
                        ),
                    );
                    return None;
                }
            };
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                self.error_at(
                    i,
                    format!(
                        "Invalid binding name \"{}\": names may only contain alphanumeric characters or '_'",
                        name
                    ),
                );
                return None;
            }

            let bound = self.parse(&arr[i + 1], i + 1, None, None)?;
            self.scope.push((name.to_string(), bound.ty()));
            bindings.push((name.to_string(), bound));
            i += 2;
        }

        let result = self.parse(&arr[arr.len() - 1], arr.len() - 1, expected, None)?;
        Some(Expr::Let {
            bindings,
            result: Box::new(result),
        })
    }

    fn parse_var(&mut self, arr: &[Json]) -> Option<Expr> {
        if arr.len() != 2 || arr[1].as_str().is_none() {
            self.error(
                "'var' expression requires exactly one string literal argument.".to_string(),
            );
            return None;
        }
        let name = arr[1].as_str()?;
        let ty = match self.scope.iter().rev().find(|(n, _)| n == name) {
            Some((_, ty)) => ty.clone(),
            None => {
                self.error(format!(
                    "Unknown variable \"{}\". Make sure \"{}\" has been bound in an enclosing \"let\" expression before using it.",
                    name, name
                ));
                return None;
            }
        };
        Some(Expr::Var {
            ty,
            name: name.to_string(),
        })
    }

    fn parse_step(&mut self, arr: &[Json], expected: Option<&Type>) -> Option<Expr> {
        if arr.len() < 5 {
            self.error(format!(
                "Expected at least 4 arguments, but found only {}.",
                arr.len() - 1
            ));
            return None;
        }
        if (arr.len() - 1) % 2 != 0 {
            self.error("Expected an even number of arguments.".to_string());
            return None;
        }

        let input = self.parse(&arr[1], 1, Some(&Type::Number), None)?;

        let expected_output = expected.filter(|t| **t != Type::Value);
        let mut output_type: Option<Type> = expected_output.cloned();

        let mut labels = vec![f64::NEG_INFINITY];
        let mut outputs = Vec::new();

        let first = self.parse(&arr[2], 2, output_type.as_ref(), None)?;
        if output_type.is_none() {
            output_type = Some(first.ty());
        }
        outputs.push(first);

        let mut i = 3;
        while i < arr.len() {
            let label = match arr[i].as_f64() {
                Some(label) => label,
                None => {
                    self.error_at(
                        i,
                        "Input/output pairs for \"step\" expressions must be defined using literal numeric values.".to_string(),
                    );
                    return None;
                }
            };
            if label <= labels[labels.len() - 1] {
                self.error_at(
                    i,
                    "Input/output pairs for \"step\" expressions must be arranged with input values in strictly ascending order.".to_string(),
                );
                return None;
            }
            labels.push(label);
            outputs.push(self.parse(&arr[i + 1], i + 1, output_type.as_ref(), None)?);
            i += 2;
        }

        let ty = output_type.unwrap_or(Type::Value);
        Some(Expr::Step {
            ty,
            input: Box::new(input),
            labels,
            outputs,
        })
    }

    fn parse_interpolate(&mut self, arr: &[Json], expected: Option<&Type>) -> Option<Expr> {
        if arr.len() < 5 {
            self.error(format!(
                "Expected at least 4 arguments, but found only {}.",
                arr.len() - 1
            ));
            return None;
        }
        if (arr.len() - 1) % 2 != 0 {
            self.error("Expected an even number of arguments.".to_string());
            return None;
        }

        let interpolation = self.parse_interpolation(&arr[1])?;
        let input = self.parse(&arr[2], 2, Some(&Type::Number), None)?;

        let expected_output = expected.filter(|t| **t != Type::Value);
        let mut output_type: Option<Type> = expected_output.cloned();

        let mut labels = Vec::new();
        let mut outputs = Vec::new();

        let mut i = 3;
        while i < arr.len() {
            let label = match arr[i].as_f64() {
                Some(label) => label,
                None => {
                    self.error_at(
                        i,
                        "Input/output pairs for \"interpolate\" expressions must be defined using literal numeric values.".to_string(),
                    );
                    return None;
                }
            };
            if let Some(last) = labels.last() {
                if label <= *last {
                    self.error_at(
                        i,
                        "Input/output pairs for \"interpolate\" expressions must be arranged with input values in strictly ascending order.".to_string(),
                    );
                    return None;
                }
            }
            labels.push(label);

            let output = self.parse(&arr[i + 1], i + 1, output_type.as_ref(), None)?;
            if output_type.is_none() {
                output_type = Some(output.ty());
            }
            outputs.push(output);
            i += 2;
        }

        let ty = output_type.unwrap_or(Type::Value);
        let interpolatable = matches!(
            &ty,
            Type::Number | Type::Color
        ) || matches!(&ty, Type::Array { item, length } if **item == Type::Number && length.is_some());
        if !interpolatable {
            self.error(format!("Type {} is not interpolatable.", ty));
            return None;
        }

        Some(Expr::Interpolate {
            ty,
            interpolation,
            input: Box::new(input),
            labels,
            outputs,
        })
    }

    fn parse_interpolation(&mut self, json: &Json) -> Option<Interpolation> {
        let arr = match json.as_array() {
            Some(arr) if !arr.is_empty() => arr,
            _ => {
                self.error_at(1, "Expected an interpolation type expression.".to_string());
                return None;
            }
        };

        match arr[0].as_str() {
            Some("linear") => Some(Interpolation::Linear),
            Some("exponential") => match arr.get(1).and_then(Json::as_f64) {
                Some(base) if arr.len() == 2 => Some(Interpolation::Exponential { base }),
                _ => {
                    self.error_at(1, "Exponential interpolation requires a numeric base.".to_string());
                    None
                }
            },
            Some("cubic-bezier") => {
                let controls: Vec<f64> = arr[1..].iter().filter_map(Json::as_f64).collect();
                if controls.len() != 4
                    || arr.len() != 5
                    || !(0.0..=1.0).contains(&controls[0])
                    || !(0.0..=1.0).contains(&controls[2])
                {
                    self.error_at(
                        1,
                        "Cubic bezier interpolation requires four numeric arguments with values between 0 and 1.".to_string(),
                    );
                    return None;
                }
                Some(Interpolation::CubicBezier {
                    x1: controls[0],
                    y1: controls[1],
                    x2: controls[2],
                    y2: controls[3],
                })
            }
            other => {
                self.error_at(
                    1,
                    format!(
                        "Unknown interpolation type {:?}",
                        other.unwrap_or_default()
                    ),
                );
                None
            }
        }
    }

    fn parse_collator(&mut self, arr: &[Json]) -> Option<Expr> {
        if arr.len() != 2 {
            self.error("Expected one argument.".to_string());
            return None;
        }
        let options = match arr[1].as_object() {
            Some(options) => options,
            None => {
                self.error_at(1, "Collator options argument must be an object.".to_string());
                return None;
            }
        };

        let case_sensitive = match options.get("case-sensitive") {
            Some(json) => self.parse(json, 1, Some(&Type::Boolean), None)?,
            None => Expr::literal(Value::Bool(false)),
        };
        let diacritic_sensitive = match options.get("diacritic-sensitive") {
            Some(json) => self.parse(json, 1, Some(&Type::Boolean), None)?,
            None => Expr::literal(Value::Bool(false)),
        };
        let locale = match options.get("locale") {
            Some(json) => Some(Box::new(self.parse(json, 1, Some(&Type::String), None)?)),
            None => None,
        };

        Some(Expr::CollatorExpr {
            case_sensitive: Box::new(case_sensitive),
            diacritic_sensitive: Box::new(diacritic_sensitive),
            locale,
        })
    }

    fn parse_at(&mut self, arr: &[Json]) -> Option<Expr> {
        if arr.len() != 3 {
            self.error(format!(
                "Expected 2 arguments, but found {} instead.",
                arr.len() - 1
            ));
            return None;
        }
        let index = self.parse(&arr[1], 1, Some(&Type::Number), None)?;
        let input = self.parse(&arr[2], 2, Some(&Type::array(Type::Value, None)), None)?;
        let ty = match input.ty() {
            Type::Array { item, .. } => *item,
            _ => Type::Value,
        };
        Some(Expr::At {
            ty,
            index: Box::new(index),
            input: Box::new(input),
        })
    }

    fn parse_in(&mut self, arr: &[Json]) -> Option<Expr> {
        if arr.len() != 3 {
            self.error(format!(
                "Expected 2 arguments, but found {} instead.",
                arr.len() - 1
            ));
            return None;
        }
        let needle = self.parse(&arr[1], 1, Some(&Type::Value), None)?;
        let haystack = self.parse(&arr[2], 2, Some(&Type::Value), None)?;

        if !matches!(
            needle.ty(),
            Type::Boolean | Type::String | Type::Number | Type::Null | Type::Value
        ) {
            self.error(format!(
                "Expected first argument to be of type boolean, string, number or null, but found {} instead.",
                needle.ty()
            ));
            return None;
        }
        if !matches!(
            haystack.ty(),
            Type::String | Type::Array { .. } | Type::Value
        ) {
            self.error(format!(
                "Expected second argument to be of type array or string, but found {} instead.",
                haystack.ty()
            ));
            return None;
        }

        Some(Expr::In {
            needle: Box::new(needle),
            haystack: Box::new(haystack),
        })
    }

    fn parse_index_of(&mut self, arr: &[Json]) -> Option<Expr> {
        if arr.len() != 3 && arr.len() != 4 {
            self.error(format!(
                "Expected 2 or 3 arguments, but found {} instead.",
                arr.len() - 1
            ));
            return None;
        }
        let needle = self.parse(&arr[1], 1, Some(&Type::Value), None)?;
        let haystack = self.parse(&arr[2], 2, Some(&Type::Value), None)?;
        let from = match arr.get(3) {
            Some(json) => Some(Box::new(self.parse(json, 3, Some(&Type::Number), None)?)),
            None => None,
        };

        if !matches!(
            needle.ty(),
            Type::Boolean | Type::String | Type::Number | Type::Null | Type::Value
        ) {
            self.error(format!(
                "Expected first argument to be of type boolean, string, number or null, but found {} instead.",
                needle.ty()
            ));
            return None;
        }
        if !matches!(
            haystack.ty(),
            Type::String | Type::Array { .. } | Type::Value
        ) {
            self.error(format!(
                "Expected second argument to be of type array or string, but found {} instead.",
                haystack.ty()
            ));
            return None;
        }

        Some(Expr::IndexOf {
            needle: Box::new(needle),
            haystack: Box::new(haystack),
            from,
        })
    }

    fn parse_slice(&mut self, arr: &[Json]) -> Option<Expr> {
        if arr.len() != 3 && arr.len() != 4 {
            self.error(format!(
                "Expected 2 or 3 arguments, but found {} instead.",
                arr.len() - 1
            ));
            return None;
        }
        let input = self.parse(&arr[1], 1, Some(&Type::Value), None)?;
        let begin = self.parse(&arr[2], 2, Some(&Type::Number), None)?;
        let end = match arr.get(3) {
            Some(json) => Some(Box::new(self.parse(json, 3, Some(&Type::Number), None)?)),
            None => None,
        };

        let ty = input.ty();
        if !matches!(ty, Type::String | Type::Array { .. } | Type::Value) {
            self.error(format!(
                "Expected first argument to be of type array or string, but found {} instead.",
                ty
            ));
            return None;
        }

        Some(Expr::Slice {
            ty,
            input: Box::new(input),
            begin: Box::new(begin),
            end,
        })
    }

    fn parse_length(&mut self, arr: &[Json]) -> Option<Expr> {
        if arr.len() != 2 {
            self.error(format!(
                "Expected 1 argument, but found {} instead.",
                arr.len() - 1
            ));
            return None;
        }
        let input = self.parse(&arr[1], 1, Some(&Type::Value), None)?;
        if !matches!(input.ty(), Type::String | Type::Array { .. } | Type::Value) {
            self.error(format!(
                "Expected argument of type string or array, but found {} instead.",
                input.ty()
            ));
            return None;
        }
        Some(Expr::Length {
            input: Box::new(input),
        })
    }

    /// Resolve a builtin against the registry.
    ///
    /// Overload resolution: filter candidates by arity, parse each
    /// argument once (guided by the expected type of the unique
    /// remaining candidate, when there is exactly one), then pick the
    /// first candidate whose parameter types accept every parsed
    /// argument under subtyping.
    fn parse_compound(&mut self, op: &str, arr: &[Json]) -> Option<Expr> {
        let registry = self.registry;
        let builtin = match registry.get(op) {
            Some(builtin) => builtin,
            None => {
                self.error(format!(
                    "Unknown expression \"{}\". If you wanted a literal array, use [\"literal\", [...]].",
                    op
                ));
                return None;
            }
        };

        let n_args = arr.len() - 1;
        let candidates: Vec<&Signature> = builtin
            .signatures
            .iter()
            .filter(|sig| sig.params.matches_arity(n_args))
            .collect();

        if candidates.is_empty() {
            let arities: Vec<String> = builtin
                .signatures
                .iter()
                .map(|sig| match &sig.params {
                    Params::Fixed(params) => params.len().to_string(),
                    Params::Variadic(_) => "...".to_string(),
                })
                .collect();
            self.error(format!(
                "Expected {} arguments, but found {} instead.",
                arities.join(" or "),
                n_args
            ));
            return None;
        }

        let unique = if candidates.len() == 1 {
            Some(candidates[0])
        } else {
            None
        };

        let mut args = Vec::with_capacity(n_args);
        for (i, arg) in arr[1..].iter().enumerate() {
            let expected = unique.map(|sig| sig.params.param_type(i).clone());
            args.push(self.parse(arg, i + 1, expected.as_ref(), None)?);
        }

        for sig in &candidates {
            let matches = args
                .iter()
                .enumerate()
                .all(|(i, arg)| check_subtype(sig.params.param_type(i), &arg.ty()).is_none());
            if matches {
                return Some(Expr::Compound {
                    ty: builtin.result.clone(),
                    name: builtin.name,
                    args,
                    eval: sig.eval,
                });
            }
        }

        if let Some(sig) = unique {
            for (i, arg) in args.iter().enumerate() {
                if let Some(message) = check_subtype(sig.params.param_type(i), &arg.ty()) {
                    self.error_at(i + 1, message);
                }
            }
        } else {
            let signatures: Vec<String> = candidates
                .iter()
                .map(|sig| sig.params.describe())
                .collect();
            let actual: Vec<String> = args.iter().map(|arg| arg.ty().to_string()).collect();
            self.error(format!(
                "Expected arguments of type {}, but found ({}) instead.",
                signatures.join(" | "),
                actual.join(", ")
            ));
        }
        None
    }
}

fn json_type_name(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

/// Replace a constant subtree with the literal it evaluates to.
///
/// A node folds when it is feature-constant, zoom-free, and carries no
/// `let`/`var` machinery or collator construction. A fold-time runtime
/// error leaves the node in place so the failure surfaces at
/// evaluation time instead of rejecting the parse.
fn fold_constant(node: Expr) -> Expr {
    if matches!(node, Expr::Literal { .. }) || node.ty() == Type::ExpressionError {
        return node;
    }
    if !is_foldable(&node) {
        return node;
    }
    let mut ctx = EvaluationContext::new();
    match evaluate(&node, &mut ctx) {
        Ok(value) => Expr::Literal {
            ty: node.ty(),
            value,
        },
        Err(_) => node,
    }
}

fn is_foldable(node: &Expr) -> bool {
    if node.any_descendant(&mut |n| {
        matches!(
            n,
            Expr::Var { .. } | Expr::Let { .. } | Expr::CollatorExpr { .. }
        )
    }) {
        return false;
    }
    is_feature_constant(node) && is_global_property_constant(node, &["zoom"])
}
