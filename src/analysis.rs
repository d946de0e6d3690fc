//! Constancy and zoom-curve analysis.
//!
//! Three structural predicates decide how often a parsed expression
//! must be re-evaluated, and the zoom-curve discovery enforces the one
//! legal position for zoom dependence. All of them recurse over the
//! tree and exit early on the first violation.

use crate::ast::expressions::Expr;

pub(crate) const ZOOM_POSITION_MESSAGE: &str =
    "\"zoom\" expression may only be used as input to a top-level \"step\" or \"interpolate\" expression.";

pub(crate) const ONE_ZOOM_CURVE_MESSAGE: &str =
    "Only one zoom-based \"step\" or \"interpolate\" subexpression may be used in an expression.";

/// Whether the expression's value is independent of the feature being
/// styled.
///
/// False when any descendant reads feature data: a one-argument
/// `get`/`has`, `feature-state`, `properties`, `geometry-type`, `id`,
/// or any of the legacy `filter-*` builtins.
pub fn is_feature_constant(expr: &Expr) -> bool {
    !expr.any_descendant(&mut |node| match node {
        Expr::Compound { name, args, .. } => {
            (matches!(*name, "get" | "has") && args.len() == 1)
                || matches!(
                    *name,
                    "feature-state" | "properties" | "geometry-type" | "id"
                )
                || name.starts_with("filter-")
        }
        _ => false,
    })
}

/// Whether the expression's value is independent of external feature
/// state.
pub fn is_state_constant(expr: &Expr) -> bool {
    !expr.any_descendant(&mut |node| {
        matches!(node, Expr::Compound { name, .. } if *name == "feature-state")
    })
}

/// Whether the expression avoids every global property named in
/// `names` (used with `["zoom"]`).
pub fn is_global_property_constant(expr: &Expr, names: &[&str]) -> bool {
    !expr.any_descendant(&mut |node| {
        matches!(node, Expr::Compound { name, .. } if names.contains(name))
    })
}

fn is_zoom_input(expr: &Expr) -> bool {
    matches!(expr, Expr::Compound { name: "zoom", .. })
}

/// Locate the single legal zoom curve: a `step` or `interpolate` whose
/// direct input is the `zoom` builtin, at the top level or reached only
/// through `let` results and `coalesce` arguments.
///
/// Returns `None` when the expression has no zoom curve at all,
/// `Some(Ok(node))` with the curve node, or `Some(Err(message))` when a
/// curve sits in an illegal position or more than one distinct curve
/// exists.
pub fn find_zoom_curve(expr: &Expr) -> Option<Result<&Expr, String>> {
    let mut result = match expr {
        Expr::Let { result, .. } => find_zoom_curve(result),
        Expr::Coalesce { args, .. } => {
            let mut found = None;
            for arg in args {
                found = find_zoom_curve(arg);
                if found.is_some() {
                    break;
                }
            }
            found
        }
        Expr::Step { input, .. } | Expr::Interpolate { input, .. } if is_zoom_input(input) => {
            Some(Ok(expr))
        }
        _ => None,
    };

    if matches!(result, Some(Err(_))) {
        return result;
    }

    expr.each_child(&mut |child| {
        let child_result = match find_zoom_curve(child) {
            Some(child_result) => child_result,
            None => return,
        };
        if matches!(result, Some(Err(_))) {
            return;
        }
        match child_result {
            Err(message) => result = Some(Err(message)),
            Ok(found) => match &result {
                // A curve below a non-wrapper position is illegal.
                None => result = Some(Err(ZOOM_POSITION_MESSAGE.to_string())),
                Some(Ok(existing)) if !std::ptr::eq(*existing, found) => {
                    result = Some(Err(ONE_ZOOM_CURVE_MESSAGE.to_string()))
                }
                _ => {}
            },
        }
    });

    result
}
