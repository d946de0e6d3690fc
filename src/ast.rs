//! # Style expression Abstract Syntax Tree
//!
//! A parsed style expression is a strict tree of [`Expr`] nodes, typed at
//! parse time and immutable afterwards. Each node knows its resolved
//! output type, exposes its children for structural traversal, and can
//! serialize itself back to the nested-array JSON wire form.
//!
//! The variants split into two groups:
//!
//! - **Structural forms** with dedicated parse rules and payloads:
//!   literals, assertions, coercions, `case`/`match`/`coalesce`
//!   conditionals, `let`/`var` bindings, `step`/`interpolate` curves,
//!   array operations, and `collator` construction.
//! - **[`Expr::Compound`]** — every other builtin (`get`, `+`, `concat`,
//!   `zoom`, ...), resolved against the operator registry in
//!   [`builtins`] through overload matching at parse time.
//!
//! ```text
//! ["case", ["==", ["get", "class"], "park"], "#90c890", "#e8e0d8"]
//! ```
//!
//! parses to a `Case` node whose test is a `Compound` equality over a
//! `Compound` property lookup and a string `Literal`.

pub mod builtins;
pub mod expressions;

pub use builtins::{Builtin, Params, Registry, Signature};
pub use expressions::{Expr, Interpolation, MatchLabel};
