use std::cmp::Ordering;
use std::collections::HashMap;

use crate::color::Color;
use crate::types::Type;

/// A runtime value produced by expression evaluation.
///
/// Covers the JSON types plus the two engine-internal kinds that have no
/// JSON form: colors and collators. Numbers are f64 throughout; the
/// style wire format does not distinguish integers from floats.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// JSON null
    #[default]
    Null,

    /// JSON boolean
    Bool(bool),

    /// Floating-point number
    Number(f64),

    /// UTF-8 string
    String(String),

    /// RGBA color, produced by color coercion or the rgb/rgba builtins
    Color(Color),

    /// Locale-aware comparator, produced by the `collator` expression
    Collator(Collator),

    /// Array of values
    Array(Vec<Value>),

    /// Object with string keys
    Object(HashMap<String, Value>),
}

impl Value {
    /// Convert an input JSON value into a runtime value.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Render the value back to JSON. Colors render as their
    /// `[r, g, b, a]` array form; collators have no JSON rendering and
    /// become null.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Color(c) => serde_json::Value::Array(
                c.to_array()
                    .iter()
                    .filter_map(|v| serde_json::Number::from_f64(*v))
                    .map(serde_json::Value::Number)
                    .collect(),
            ),
            Value::Collator(_) => serde_json::Value::Null,
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Get as number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Truthiness under boolean coercion: null, false, 0, NaN, and the
    /// empty string are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// String rendering under string coercion: null becomes the empty
    /// string, colors their `rgba(...)` form, arrays and objects
    /// compact JSON.
    pub fn stringify(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Color(c) => c.to_rgba_string(),
            other => other.to_json().to_string(),
        }
    }

    /// Compact rendering for diagnostics.
    pub fn render(&self) -> String {
        match self {
            Value::String(s) => format!("{:?}", s),
            Value::Color(c) => c.to_rgba_string(),
            other => other.to_json().to_string(),
        }
    }
}

/// Format a number the way the wire format writes it: integral values
/// without a fractional part.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Determine the runtime type of a value.
///
/// Array values report the unified item type: the single kind when all
/// items agree, `value` when mixed or empty, always with the concrete
/// length.
pub fn type_of(value: &Value) -> Type {
    match value {
        Value::Null => Type::Null,
        Value::Bool(_) => Type::Boolean,
        Value::Number(_) => Type::Number,
        Value::String(_) => Type::String,
        Value::Color(_) => Type::Color,
        Value::Collator(_) => Type::Collator,
        Value::Object(_) => Type::Object,
        Value::Array(items) => {
            let mut item_type: Option<Type> = None;
            for item in items {
                let t = type_of(item);
                match &item_type {
                    None => item_type = Some(t),
                    Some(existing) if *existing == t => {}
                    Some(_) => {
                        item_type = Some(Type::Value);
                        break;
                    }
                }
            }
            Type::array(item_type.unwrap_or(Type::Value), Some(items.len()))
        }
    }
}

/// A locale-aware string comparator.
///
/// Constructed by the `collator` expression from `case-sensitive`,
/// `diacritic-sensitive`, and `locale` sub-expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct Collator {
    pub case_sensitive: bool,
    pub diacritic_sensitive: bool,
    pub locale: Option<String>,
}

impl Collator {
    pub fn new(
        case_sensitive: bool,
        diacritic_sensitive: bool,
        locale: Option<String>,
    ) -> Collator {
        Collator {
            case_sensitive,
            diacritic_sensitive,
            locale,
        }
    }

    /// Compare two strings under this collator's folding rules.
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        let fold = |s: &str| -> String {
            let s = if self.diacritic_sensitive {
                s.to_string()
            } else {
                fold_diacritics(s)
            };
            if self.case_sensitive {
                s
            } else {
                s.to_lowercase()
            }
        };
        fold(a).cmp(&fold(b))
    }

    /// The locale this collator resolved to. Reports the requested tag
    /// only; the internal search-mode folding never appears here.
    pub fn resolved_locale(&self) -> &str {
        self.locale.as_deref().unwrap_or("en")
    }
}

/// Strip accents from the Latin ranges that occur in map labels. Not a
/// full Unicode decomposition; covers Latin-1 Supplement and Latin
/// Extended-A.
fn fold_diacritics(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'à'..='å' | 'ā' | 'ă' | 'ą' => 'a',
            'À'..='Å' | 'Ā' | 'Ă' | 'Ą' => 'A',
            'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => 'c',
            'Ç' | 'Ć' | 'Ĉ' | 'Ċ' | 'Č' => 'C',
            'è'..='ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => 'e',
            'È'..='Ë' | 'Ē' | 'Ĕ' | 'Ė' | 'Ę' | 'Ě' => 'E',
            'ì'..='ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => 'i',
            'Ì'..='Ï' | 'Ĩ' | 'Ī' | 'Ĭ' | 'Į' | 'İ' => 'I',
            'ñ' | 'ń' | 'ņ' | 'ň' => 'n',
            'Ñ' | 'Ń' | 'Ņ' | 'Ň' => 'N',
            'ò'..='ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => 'o',
            'Ò'..='Ö' | 'Ø' | 'Ō' | 'Ŏ' | 'Ő' => 'O',
            'ù'..='ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => 'u',
            'Ù'..='Ü' | 'Ũ' | 'Ū' | 'Ŭ' | 'Ů' | 'Ű' | 'Ų' => 'U',
            'ý' | 'ÿ' => 'y',
            'Ý' | 'Ÿ' => 'Y',
            'ź' | 'ż' | 'ž' => 'z',
            'Ź' | 'Ż' | 'Ž' => 'Z',
            'ś' | 'ŝ' | 'ş' | 'š' => 's',
            'Ś' | 'Ŝ' | 'Ş' | 'Š' => 'S',
            'ĝ' | 'ğ' | 'ġ' | 'ģ' => 'g',
            'Ĝ' | 'Ğ' | 'Ġ' | 'Ģ' => 'G',
            other => other,
        })
        .collect()
}
