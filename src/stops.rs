use crate::ast::expressions::Interpolation;
use crate::color::Color;
use crate::evaluator::RuntimeError;
use crate::types::Type;
use crate::value::Value;

/// Find the greatest index `i` such that `stops[i] <= input < stops[i+1]`.
///
/// Returns `0` when the input precedes every stop and the last index
/// when the input is at or past the final stop. `stops` must be sorted
/// ascending and non-empty; a non-comparable input (NaN) is a runtime
/// error, unreachable when the type checker ran upstream.
pub fn find_stop_less_than_or_equal_to(stops: &[f64], input: f64) -> Result<usize, RuntimeError> {
    if input.is_nan() {
        return Err(RuntimeError::new("Input is not a number."));
    }

    let last = stops.len() - 1;
    let mut lower = 0usize;
    let mut upper = last;

    while lower <= upper {
        let current = (lower + upper) / 2;
        let value = stops[current];
        if value.is_nan() {
            return Err(RuntimeError::new("Input is not a number."));
        }
        if value <= input {
            if current == last || input < stops[current + 1] {
                return Ok(current);
            }
            lower = current + 1;
        } else {
            if current == 0 {
                break;
            }
            upper = current - 1;
        }
    }

    Ok(0)
}

/// Interpolation progress of `input` between `lower` and `upper` for an
/// exponential curve. Base 1 degenerates to linear.
pub fn exponential_interpolation(input: f64, base: f64, lower: f64, upper: f64) -> f64 {
    let difference = upper - lower;
    let progress = input - lower;
    if difference == 0.0 {
        0.0
    } else if base == 1.0 {
        progress / difference
    } else {
        (base.powf(progress) - 1.0) / (base.powf(difference) - 1.0)
    }
}

/// Interpolation factor for an `interpolate` curve segment.
pub fn interpolation_factor(
    interpolation: &Interpolation,
    input: f64,
    lower: f64,
    upper: f64,
) -> f64 {
    match interpolation {
        Interpolation::Linear => exponential_interpolation(input, 1.0, lower, upper),
        Interpolation::Exponential { base } => {
            exponential_interpolation(input, *base, lower, upper)
        }
        Interpolation::CubicBezier { x1, y1, x2, y2 } => {
            let t = exponential_interpolation(input, 1.0, lower, upper);
            UnitBezier::new(*x1, *y1, *x2, *y2).solve(t, 1e-6)
        }
    }
}

/// Interpolate between two stop outputs of the given type.
///
/// Supports numbers, colors (channel-wise), and numeric arrays
/// (element-wise); the parser rejects other output types up front.
pub fn interpolate_values(
    ty: &Type,
    lower: &Value,
    upper: &Value,
    t: f64,
) -> Result<Value, RuntimeError> {
    match (lower, upper) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(lerp(*a, *b, t))),
        (Value::Color(a), Value::Color(b)) => Ok(Value::Color(Color::new(
            lerp(a.r, b.r, t),
            lerp(a.g, b.g, t),
            lerp(a.b, b.b, t),
            lerp(a.a, b.a, t),
        ))),
        (Value::Array(a), Value::Array(b)) if a.len() == b.len() => {
            let mut out = Vec::with_capacity(a.len());
            for (x, y) in a.iter().zip(b.iter()) {
                match (x, y) {
                    (Value::Number(x), Value::Number(y)) => {
                        out.push(Value::Number(lerp(*x, *y, t)))
                    }
                    _ => {
                        return Err(RuntimeError::new(format!(
                            "Cannot interpolate values of type {}.",
                            ty
                        )))
                    }
                }
            }
            Ok(Value::Array(out))
        }
        _ => Err(RuntimeError::new(format!(
            "Cannot interpolate values of type {}.",
            ty
        ))),
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Cubic bezier timing curve through (0,0), (x1,y1), (x2,y2), (1,1),
/// solved for y at a given x with Newton iteration and a bisection
/// fallback.
#[derive(Debug, Clone, Copy)]
pub struct UnitBezier {
    cx: f64,
    bx: f64,
    ax: f64,
    cy: f64,
    by: f64,
    ay: f64,
}

impl UnitBezier {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> UnitBezier {
        let cx = 3.0 * x1;
        let bx = 3.0 * (x2 - x1) - cx;
        let ax = 1.0 - cx - bx;
        let cy = 3.0 * y1;
        let by = 3.0 * (y2 - y1) - cy;
        let ay = 1.0 - cy - by;
        UnitBezier {
            cx,
            bx,
            ax,
            cy,
            by,
            ay,
        }
    }

    fn sample_x(&self, t: f64) -> f64 {
        ((self.ax * t + self.bx) * t + self.cx) * t
    }

    fn sample_y(&self, t: f64) -> f64 {
        ((self.ay * t + self.by) * t + self.cy) * t
    }

    fn sample_x_derivative(&self, t: f64) -> f64 {
        (3.0 * self.ax * t + 2.0 * self.bx) * t + self.cx
    }

    fn solve_x(&self, x: f64, epsilon: f64) -> f64 {
        let mut t = x;
        for _ in 0..8 {
            let x2 = self.sample_x(t) - x;
            if x2.abs() < epsilon {
                return t;
            }
            let d = self.sample_x_derivative(t);
            if d.abs() < 1e-6 {
                break;
            }
            t -= x2 / d;
        }

        let mut lo = 0.0f64;
        let mut hi = 1.0f64;
        t = x.clamp(lo, hi);
        while lo < hi {
            let x2 = self.sample_x(t);
            if (x2 - x).abs() < epsilon {
                return t;
            }
            if x > x2 {
                lo = t;
            } else {
                hi = t;
            }
            let next = (hi - lo) / 2.0 + lo;
            if next == t {
                break;
            }
            t = next;
        }
        t
    }

    /// y value of the curve at the given x progress.
    pub fn solve(&self, x: f64, epsilon: f64) -> f64 {
        self.sample_y(self.solve_x(x.clamp(0.0, 1.0), epsilon))
    }
}
