pub mod analysis;
pub mod ast;
#[cfg(feature = "cli")]
pub mod cli;
pub mod color;
pub mod evaluator;
pub mod parser;
pub mod property;
pub mod stops;
pub mod types;
pub mod value;

pub use ast::{Expr, Interpolation, MatchLabel};
pub use color::Color;
pub use evaluator::{evaluate, EvaluationContext, Feature, Globals, RuntimeError};
pub use parser::{parse_expression, ParsingContext, ParsingError};
pub use property::{
    create_expression, create_property_expression, ExpressionCapabilities, ExpressionKind,
    Parameter, PropertyExpression, PropertySpec, SpecType, StyleExpression,
    ZoomConstantExpression, ZoomDependentExpression,
};
pub use types::{check_subtype, Type};
pub use value::{type_of, Collator, Value};
