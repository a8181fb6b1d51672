//! The canonical Euler spiral (clothoid) primitive.
//!
//! The canonical clothoid with curvature rate `rate` starts at the origin
//! with zero heading and zero curvature; at arc length `p` its heading is
//! `θ(p) = rate·p²/2` and its position is the Fresnel integral
//! `(∫cos θ(u) du, ∫sin θ(u) du)`. Spiral geometries evaluate themselves by
//! differencing two points on this canonical curve and rotating the offset
//! into the road frame.

use glam::DVec2;

/// The heading of the canonical clothoid at arc length `p`.
pub(crate) fn canonical_heading(p: f64, rate: f64) -> f64 {
    0.5 * rate * p * p
}

/// The chord `canonical(p1) - canonical(p0)` of the canonical clothoid.
///
/// The Fresnel integral has no closed form; it's integrated with composite
/// Simpson steps whose size is bounded by the integrand's phase speed
/// (`|rate·p|`, the curvature at `p`), so accuracy is retained where the
/// integrand oscillates. Integrating the chord directly, rather than two
/// whole canonical points, keeps the work proportional to `|p1 - p0|` even
/// when a nearly-constant-curvature spiral puts `p0` far from the origin.
pub(crate) fn arc_delta(p0: f64, p1: f64, rate: f64) -> DVec2 {
    if p0 == p1 {
        return DVec2::ZERO;
    }

    let len = (p1 - p0).abs();
    let max_phase_speed = (rate * p0).abs().max((rate * p1).abs());
    let max_step = (0.01 / max_phase_speed.max(0.04)).min(0.25);
    let mut steps = (len / max_step).ceil() as usize;
    steps = steps.max(8);
    if steps % 2 == 1 {
        steps += 1;
    }

    let h = (p1 - p0) / steps as f64;
    let f = |t: f64| {
        let phase = canonical_heading(t, rate);
        DVec2::new(phase.cos(), phase.sin())
    };

    let mut sum = f(p0) + f(p1);
    for i in 1..steps {
        let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
        sum += weight * f(p0 + i as f64 * h);
    }
    sum * (h / 3.0)
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn matches_fresnel_integral_reference_values() {
        // With rate = π the canonical clothoid position at p equals the
        // standard Fresnel integrals (C(p), S(p)). Reference values from
        // Abramowitz & Stegun, table 7.7.
        let pt = arc_delta(0.0, 0.5, PI);
        assert_relative_eq!(pt.x, 0.4923442258714464, epsilon = 1e-8);
        assert_relative_eq!(pt.y, 0.0647324328599993, epsilon = 1e-8);

        let pt = arc_delta(0.0, 1.0, PI);
        assert_relative_eq!(pt.x, 0.7798934003768229, epsilon = 1e-8);
        assert_relative_eq!(pt.y, 0.4382591473903548, epsilon = 1e-8);

        let pt = arc_delta(0.0, 2.0, PI);
        assert_relative_eq!(pt.x, 0.4882534060753407, epsilon = 1e-8);
        assert_relative_eq!(pt.y, 0.3434156783636982, epsilon = 1e-8);
    }

    #[test]
    fn chords_are_additive() {
        let rate = 0.013;
        let total = arc_delta(3.0, 40.0, rate);
        let split = arc_delta(3.0, 17.5, rate) + arc_delta(17.5, 40.0, rate);
        assert_relative_eq!(total.x, split.x, epsilon = 1e-9);
        assert_relative_eq!(total.y, split.y, epsilon = 1e-9);
    }

    #[test]
    fn negative_direction_mirrors() {
        let rate = 0.2;
        let forward = arc_delta(1.0, 5.0, rate);
        let backward = arc_delta(5.0, 1.0, rate);
        assert_relative_eq!(forward.x, -backward.x, epsilon = 1e-12);
        assert_relative_eq!(forward.y, -backward.y, epsilon = 1e-12);
    }

    #[test]
    fn chord_derivative_matches_integrand() {
        // d/dp1 arc_delta(p0, p1) = (cos θ(p1), sin θ(p1)).
        let rate = 0.05;
        let p0 = 2.0;
        let p1 = 30.0;
        let eps = 1e-5;
        let numeric = (arc_delta(p0, p1 + eps, rate) - arc_delta(p0, p1 - eps, rate)) / (2.0 * eps);
        let heading = canonical_heading(p1, rate);
        assert_relative_eq!(numeric.x, heading.cos(), epsilon = 1e-7);
        assert_relative_eq!(numeric.y, heading.sin(), epsilon = 1e-7);
    }
}
