use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// A cubic polynomial `f(t) = a + b*t + c*t^2 + d*t^3`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Poly3 {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

/// Coefficients below this magnitude degrade a cubic to a quadratic (and a
/// quadratic to a line) in the interval extremum computation.
const DEGENERATE_EPSILON: f64 = 1e-6;

impl Poly3 {
    pub fn new(a: f64, b: f64, c: f64, d: f64) -> Self {
        Poly3 { a, b, c, d }
    }

    pub fn eval(&self, t: f64) -> f64 {
        self.a + t * (self.b + t * (self.c + t * self.d))
    }

    pub fn eval_derivative(&self, t: f64) -> f64 {
        self.b + t * (2.0 * self.c + t * 3.0 * self.d)
    }

    pub fn eval_2nd_derivative(&self, t: f64) -> f64 {
        2.0 * self.c + t * 6.0 * self.d
    }

    /// The antiderivative `F(t) = ∫₀ᵗ f`, with `F(0) = 0`.
    pub fn eval_anti_derivative(&self, t: f64) -> f64 {
        t * (self.a + t * (self.b / 2.0 + t * (self.c / 3.0 + t * self.d / 4.0)))
    }

    /// A polynomial `p` such that `p.eval(t) == self.eval(t + offset)`,
    /// barring floating point error.
    pub fn translate(&self, offset: f64) -> Poly3 {
        Poly3 {
            a: -offset * offset * offset * self.d + offset * offset * self.c - offset * self.b + self.a,
            b: 3.0 * offset * offset * self.d - 2.0 * offset * self.c + self.b,
            c: -3.0 * offset * self.d + self.c,
            d: self.d,
        }
    }

    /// A polynomial `p` such that `p.eval(t) == self.eval(t * factor)`,
    /// barring floating point error.
    pub fn scale(&self, factor: f64) -> Poly3 {
        Poly3 {
            a: self.a,
            b: self.b * factor,
            c: self.c * factor * factor,
            d: self.d * factor * factor * factor,
        }
    }

    /// The maximum value this polynomial takes in `[start_t, end_t]`.
    ///
    /// The extremum is exact: the endpoints and every real root of the
    /// derivative inside the interval are evaluated.
    pub fn max_value_in_interval(&self, start_t: f64, end_t: f64) -> f64 {
        self.extreme_value_in_interval(start_t, end_t, f64::max)
    }

    /// The minimum value this polynomial takes in `[start_t, end_t]`.
    pub fn min_value_in_interval(&self, start_t: f64, end_t: f64) -> f64 {
        self.extreme_value_in_interval(start_t, end_t, f64::min)
    }

    fn extreme_value_in_interval(&self, start_t: f64, end_t: f64, pick: fn(f64, f64) -> f64) -> f64 {
        debug_assert!(start_t <= end_t);

        let mut extreme = pick(self.eval(start_t), self.eval(end_t));

        if self.d.abs() < DEGENERATE_EPSILON {
            if self.c.abs() < DEGENERATE_EPSILON {
                // Linear; the extrema are at the endpoints.
                return extreme;
            }
            let root = -self.b / (2.0 * self.c);
            if root < start_t || root > end_t {
                return extreme;
            }
            return pick(extreme, self.eval(root));
        }

        let deriv_disc_sq = 4.0 * self.c * self.c - 12.0 * self.d * self.b;
        if deriv_disc_sq > 0.0 {
            let deriv_disc = deriv_disc_sq.sqrt();
            let root_a = (deriv_disc - 2.0 * self.c) / (6.0 * self.d);
            let root_b = (-deriv_disc - 2.0 * self.c) / (6.0 * self.d);
            if root_a > start_t && root_a < end_t {
                extreme = pick(extreme, self.eval(root_a));
            }
            if root_b > start_t && root_b < end_t {
                extreme = pick(extreme, self.eval(root_b));
            }
            extreme
        } else if deriv_disc_sq > -DEGENERATE_EPSILON {
            // Discriminant within tolerance of zero: a double root.
            let root = self.c / (-3.0 * self.d);
            pick(extreme, self.eval(root))
        } else {
            // No real critical points inside the interval.
            extreme
        }
    }
}

impl Add for Poly3 {
    type Output = Poly3;

    fn add(self, rhs: Poly3) -> Poly3 {
        Poly3 {
            a: self.a + rhs.a,
            b: self.b + rhs.b,
            c: self.c + rhs.c,
            d: self.d + rhs.d,
        }
    }
}

impl AddAssign for Poly3 {
    fn add_assign(&mut self, rhs: Poly3) {
        *self = *self + rhs;
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn eval_and_derivatives() {
        let poly = Poly3::new(1.0, -2.0, 3.0, 0.5);
        assert_relative_eq!(poly.eval(2.0), 1.0 - 4.0 + 12.0 + 4.0);
        assert_relative_eq!(poly.eval_derivative(2.0), -2.0 + 12.0 + 6.0);
        assert_relative_eq!(poly.eval_2nd_derivative(2.0), 6.0 + 6.0);
    }

    #[test]
    fn anti_derivative_matches_numeric_integral() {
        let poly = Poly3::new(0.25, -1.0, 2.0, 3.0);
        let t = 1.7;
        let steps = 100_000;
        let h = t / steps as f64;
        let mut sum = 0.0;
        for i in 0..steps {
            sum += poly.eval((i as f64 + 0.5) * h) * h;
        }
        assert_relative_eq!(poly.eval_anti_derivative(t), sum, epsilon = 1e-6);
    }

    #[test]
    fn translate_shifts_the_argument() {
        let poly = Poly3::new(1.0, 2.0, -0.5, 0.25);
        let translated = poly.translate(3.0);
        for i in 0..20 {
            let t = -2.0 + 0.3 * i as f64;
            assert_relative_eq!(translated.eval(t), poly.eval(t + 3.0), epsilon = 1e-3);
        }
    }

    #[test]
    fn scale_scales_the_argument() {
        let poly = Poly3::new(1.0, 2.0, -0.5, 0.25);
        let scaled = poly.scale(2.5);
        for i in 0..20 {
            let t = -2.0 + 0.3 * i as f64;
            assert_relative_eq!(scaled.eval(t), poly.eval(t * 2.5), epsilon = 1e-3);
        }
    }

    #[test]
    fn extrema_of_a_cubic_with_interior_critical_points() {
        // f(t) = t^3 - 3t has a local max at t=-1 (value 2) and a local min
        // at t=1 (value -2).
        let poly = Poly3::new(0.0, -3.0, 0.0, 1.0);
        assert_relative_eq!(poly.max_value_in_interval(-2.0, 2.0), 2.0);
        assert_relative_eq!(poly.min_value_in_interval(-2.0, 2.0), -2.0);

        // With the critical points outside the interval, the endpoints win.
        assert_relative_eq!(poly.max_value_in_interval(-0.5, 0.5), poly.eval(-0.5));
        assert_relative_eq!(poly.min_value_in_interval(-0.5, 0.5), poly.eval(0.5));
    }

    #[test]
    fn extrema_of_degenerate_polynomials() {
        // Quadratic: f(t) = -(t-1)^2 + 4, max 4 at t=1.
        let quadratic = Poly3::new(3.0, 2.0, -1.0, 0.0);
        assert_relative_eq!(quadratic.max_value_in_interval(-1.0, 3.0), 4.0);

        // Linear.
        let linear = Poly3::new(1.0, 2.0, 0.0, 0.0);
        assert_relative_eq!(linear.max_value_in_interval(0.0, 5.0), 11.0);
        assert_relative_eq!(linear.min_value_in_interval(0.0, 5.0), 1.0);
    }

    #[test]
    fn extrema_with_double_root() {
        // f(t) = t^3 has an inflection with zero derivative at t=0; the
        // extrema on [-1, 1] are still at the endpoints.
        let poly = Poly3::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(poly.max_value_in_interval(-1.0, 1.0), 1.0);
        assert_relative_eq!(poly.min_value_in_interval(-1.0, 1.0), -1.0);
    }

    #[test]
    fn addition_is_coefficient_wise() {
        let sum = Poly3::new(1.0, 2.0, 3.0, 4.0) + Poly3::new(0.5, -2.0, 1.0, -4.0);
        assert_eq!(sum, Poly3::new(1.5, 0.0, 4.0, 0.0));
    }
}
