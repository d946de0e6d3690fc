use std::fmt;

/// A type descriptor in the expression type system.
///
/// Types are created once at parse time and compared structurally.
/// `Value` is the universal supertype, `ExpressionError` the universal
/// subtype (an erroring subexpression satisfies any expectation).
///
/// # Examples
///
/// ```
/// use ochre::types::{Type, check_subtype};
///
/// let expected = Type::array(Type::Number, None);
/// let actual = Type::array(Type::Number, Some(3));
/// assert!(check_subtype(&expected, &actual).is_none());
/// assert_eq!(actual.to_string(), "array<number, 3>");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    /// The null type (the type of the `null` literal).
    Null,

    /// 64-bit floating point number.
    Number,

    /// UTF-8 string.
    String,

    /// Boolean.
    Boolean,

    /// RGBA color.
    Color,

    /// Object with string keys.
    Object,

    /// The top type: any runtime value.
    Value,

    /// The bottom type, produced by subexpressions that failed to type.
    ExpressionError,

    /// Locale-aware string comparator.
    Collator,

    /// Array with an item type and an optional fixed length.
    Array {
        item: Box<Type>,
        length: Option<usize>,
    },
}

impl Type {
    /// Convenience constructor for array types.
    pub fn array(item: Type, length: Option<usize>) -> Type {
        Type::Array {
            item: Box::new(item),
            length,
        }
    }

    /// The canonical name of the type's kind, without array parameters.
    pub fn kind(&self) -> &'static str {
        match self {
            Type::Null => "null",
            Type::Number => "number",
            Type::String => "string",
            Type::Boolean => "boolean",
            Type::Color => "color",
            Type::Object => "object",
            Type::Value => "value",
            Type::ExpressionError => "error",
            Type::Collator => "collator",
            Type::Array { .. } => "array",
        }
    }
}

impl fmt::Display for Type {
    /// Canonical rendering used in diagnostics: `array<number, 3>`,
    /// `array<string>`, and plain `array` for `array<value>` with no
    /// fixed length. This form is stable; it appears in error messages
    /// and test fixtures.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Array { item, length } => match (item.as_ref(), length) {
                (Type::Value, None) => write!(f, "array"),
                (item, None) => write!(f, "array<{}>", item),
                (item, Some(n)) => write!(f, "array<{}, {}>", item, n),
            },
            other => write!(f, "{}", other.kind()),
        }
    }
}

/// Check whether `actual` is a subtype of `expected`.
///
/// Returns `None` on success, or an error message describing the
/// mismatch. The rules are structural and exact:
///
/// - an erroring subexpression satisfies any expectation;
/// - `array<A, NA>` subtypes `array<B, NB>` iff `A` subtypes `B` and
///   `NB` is unspecified or equal to `NA`;
/// - identical kinds match;
/// - every type subtypes `value`.
pub fn check_subtype(expected: &Type, actual: &Type) -> Option<String> {
    if *actual == Type::ExpressionError {
        return None;
    }

    match (expected, actual) {
        (
            Type::Array {
                item: expected_item,
                length: expected_len,
            },
            Type::Array {
                item: actual_item,
                length: actual_len,
            },
        ) => {
            if check_subtype(expected_item, actual_item).is_none()
                && (expected_len.is_none() || expected_len == actual_len)
            {
                return None;
            }
        }
        _ => {
            if expected.kind() == actual.kind() {
                return None;
            }
            if *expected == Type::Value {
                return None;
            }
        }
    }

    Some(format!(
        "Expected {} but found {} instead.",
        expected, actual
    ))
}
