//! # Universal-variable propagation
//!
//! Element-free two-body propagation based on the universal anomaly `x` and the Stumpff
//! functions `C(z)`, `S(z)` with `z = α·x²`, `α = 1/a`. A single formulation covers ellipses and
//! hyperbolas, so a state `(r₀, v₀)` can be pushed forward by `Δt` without building a full
//! [`OrbitalElements`](crate::orbit_type::OrbitalElements) set first.
//!
//! The state after `Δt` follows from the Lagrange coefficients:
//!
//! ```text
//! r = f·r₀ + g·v₀        f = 1 − x²C/r₀        g = Δt − x³S/√μ
//! v = ḟ·r₀ + ġ·v₀        ḟ = √μ/(r·r₀)·(α·x³S − x)   ġ = 1 − x²C/r
//! ```
//!
//! See also
//! ------------
//! * [`crate::kepler::advance`] – element-based propagation used by the tick loop.
//! * [`crate::simulation::Simulation::predict_position`] – main consumer of this module.
use log::trace;

use crate::{
    conic_errors::ConicError,
    constants::{Seconds, Vec2, CIRCULAR_ECCENTRICITY, DPI},
    math::{cross_z, wrap_to_pi},
    orbit_type::anomaly::{asymptote_true_anomaly, eccentric_from_true, hyperbolic_from_true},
    params::PropagationParams,
};

/// Below this `|z|` the Stumpff functions are evaluated by their power series.
const STUMPFF_SERIES_THRESHOLD: f64 = 1e-3;
const STUMPFF_SERIES_TERMS: i32 = 8;

/// `|α|` under which the trajectory is considered parabolic for the initial guess.
const PARABOLIC_ALPHA: f64 = 1e-12;

/// Stumpff function `C(z) = (1 − cos √z)/z`, continued analytically for `z ≤ 0`.
pub fn stumpff_c(z: f64) -> f64 {
    if z.abs() < STUMPFF_SERIES_THRESHOLD {
        // Σ (−z)^k / (2k+2)!
        let mut term = 0.5;
        let mut sum = term;
        for k in 1..STUMPFF_SERIES_TERMS {
            term *= -z / ((2 * k + 1) as f64 * (2 * k + 2) as f64);
            sum += term;
        }
        sum
    } else if z > 0.0 {
        (1.0 - z.sqrt().cos()) / z
    } else {
        ((-z).sqrt().cosh() - 1.0) / -z
    }
}

/// Stumpff function `S(z) = (√z − sin √z)/√z³`, continued analytically for `z ≤ 0`.
pub fn stumpff_s(z: f64) -> f64 {
    if z.abs() < STUMPFF_SERIES_THRESHOLD {
        // Σ (−z)^k / (2k+3)!
        let mut term = 1.0 / 6.0;
        let mut sum = term;
        for k in 1..STUMPFF_SERIES_TERMS {
            term *= -z / ((2 * k + 2) as f64 * (2 * k + 3) as f64);
            sum += term;
        }
        sum
    } else if z > 0.0 {
        let sz = z.sqrt();
        (sz - sz.sin()) / sz.powi(3)
    } else {
        let sz = (-z).sqrt();
        (sz.sinh() - sz) / sz.powi(3)
    }
}

/// Lagrange coefficients mapping `(r₀, v₀)` to the propagated state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LagrangeCoefficients {
    pub f: f64,
    pub g: f64,
    pub f_dot: f64,
    pub g_dot: f64,
}

impl LagrangeCoefficients {
    /// Apply the coefficients to an initial state.
    pub fn apply(&self, position: &Vec2, velocity: &Vec2) -> (Vec2, Vec2) {
        (
            self.f * position + self.g * velocity,
            self.f_dot * position + self.g_dot * velocity,
        )
    }
}

/// Initial universal anomaly for the Newton iteration.
fn initial_guess(
    radius: f64,
    radial_velocity_term: f64,
    alpha: f64,
    dt: Seconds,
    mu: f64,
) -> f64 {
    let sqrt_mu = mu.sqrt();
    if alpha > PARABOLIC_ALPHA {
        return sqrt_mu * dt * alpha;
    }
    if alpha < -PARABOLIC_ALPHA {
        let a = 1.0 / alpha;
        let sign = if dt >= 0.0 { 1.0 } else { -1.0 };
        let numerator = -2.0 * mu * alpha * dt;
        let denominator =
            radial_velocity_term + sign * (-mu * a).sqrt() * (1.0 - radius * alpha);
        let ratio = numerator / denominator;
        if ratio > 0.0 {
            return sign * (-a).sqrt() * ratio.ln();
        }
    }
    sqrt_mu * dt / radius
}

/// Solve the universal Kepler equation for `x` and build the Lagrange coefficients.
///
/// Arguments
/// -----------------
/// * `position`, `velocity`: initial state relative to the attracting source.
/// * `dt`: propagation time, either sign.
/// * `mu`: gravitational parameter of the source.
/// * `params`: iteration cap and tolerance (`universal_max_iter`, `universal_tolerance`).
///
/// Return
/// ----------
/// * The Lagrange coefficients, or [`ConicError::UniversalVariableDiverged`] if the solution is
///   not finite.
pub fn lagrange_coefficients(
    position: &Vec2,
    velocity: &Vec2,
    dt: Seconds,
    mu: f64,
    params: &PropagationParams,
) -> Result<LagrangeCoefficients, ConicError> {
    let r0 = position.norm();
    if r0 == 0.0 {
        return Err(ConicError::ZeroRelativePosition);
    }
    let sqrt_mu = mu.sqrt();
    let alpha = 2.0 / r0 - velocity.norm_squared() / mu;

    // a full revolution is the identity, keep the Newton iteration short
    let dt = if alpha > PARABOLIC_ALPHA {
        dt % (DPI / (sqrt_mu * alpha.powf(1.5)))
    } else {
        dt
    };

    let rv = position.dot(velocity);
    let radial = rv / sqrt_mu;
    let mut x = initial_guess(r0, rv, alpha, dt, mu);

    let mut converged = false;
    for _ in 0..params.universal_max_iter {
        let z = alpha * x * x;
        let c = stumpff_c(z);
        let s = stumpff_s(z);
        let residual =
            radial * x * x * c + (1.0 - alpha * r0) * x.powi(3) * s + r0 * x - sqrt_mu * dt;
        let slope = radial * x * (1.0 - z * s) + (1.0 - alpha * r0) * x * x * c + r0;
        let delta = residual / slope;
        x -= delta;
        if delta.abs() < params.universal_tolerance * x.abs().max(1.0) {
            converged = true;
            break;
        }
    }
    if !converged {
        trace!("universal variable solver hit its iteration cap (dt = {dt}, x = {x})");
    }

    let z = alpha * x * x;
    let c = stumpff_c(z);
    let s = stumpff_s(z);

    let f = 1.0 - x * x / r0 * c;
    let g = dt - x.powi(3) / sqrt_mu * s;
    let r = (f * position + g * velocity).norm();
    let f_dot = sqrt_mu / (r * r0) * (alpha * x.powi(3) * s - x);
    let g_dot = 1.0 - x * x / r * c;

    let coefficients = LagrangeCoefficients { f, g, f_dot, g_dot };
    if [f, g, f_dot, g_dot].iter().all(|v| v.is_finite()) {
        Ok(coefficients)
    } else {
        Err(ConicError::UniversalVariableDiverged)
    }
}

/// Propagate a relative state by `dt` with the universal-variable formulation.
///
/// Return
/// ----------
/// * `(position, velocity)` relative to the same source after `dt`.
pub fn propagate(
    position: &Vec2,
    velocity: &Vec2,
    dt: Seconds,
    mu: f64,
    params: &PropagationParams,
) -> Result<(Vec2, Vec2), ConicError> {
    if !(mu > 0.0 && mu.is_finite()) {
        return Err(ConicError::NonPositiveMass(mu));
    }
    if !position.iter().chain(velocity.iter()).all(|c| c.is_finite()) || !dt.is_finite() {
        return Err(ConicError::InvalidVector(format!(
            "r = ({}, {}), v = ({}, {}), dt = {dt}",
            position.x, position.y, velocity.x, velocity.y
        )));
    }
    if dt == 0.0 {
        return Ok((*position, *velocity));
    }
    Ok(lagrange_coefficients(position, velocity, dt, mu, params)?.apply(position, velocity))
}

/// Forward time needed to travel from `p0` to the direction of `p_target`.
///
/// The conic is the one through `(p0, v0)`; `eccentricity_vector` fixes its periapsis direction
/// and `p_target` is only used for its polar angle around the source.
///
/// Return
/// ----------
/// * Ellipse: a time in `[0, period)`.
/// * Hyperbola: the (possibly negative) time to the target direction, or `+∞` if that direction
///   lies outside the asymptotes.
pub fn time_of_flight(
    p0: &Vec2,
    v0: &Vec2,
    p_target: &Vec2,
    eccentricity_vector: &Vec2,
    mu: f64,
) -> f64 {
    let r0 = p0.norm();
    let e = eccentricity_vector.norm();
    let a = 1.0 / (2.0 / r0 - v0.norm_squared() / mu);
    let direction = if cross_z(p0, v0) < 0.0 { -1.0 } else { 1.0 };

    let periapsis = if e > CIRCULAR_ECCENTRICITY {
        eccentricity_vector.y.atan2(eccentricity_vector.x)
    } else {
        p0.y.atan2(p0.x)
    };
    let anomaly_of = |p: &Vec2| wrap_to_pi(direction * (p.y.atan2(p.x) - periapsis));
    let nu0 = anomaly_of(p0);
    let nu_target = anomaly_of(p_target);

    let x = if e < 1.0 {
        let e0 = eccentric_from_true(e, nu0);
        let et = eccentric_from_true(e, nu_target);
        a.sqrt() * (et - e0).rem_euclid(DPI)
    } else {
        let limit = asymptote_true_anomaly(e);
        if nu_target.abs() >= limit {
            return f64::INFINITY;
        }
        (-a).sqrt() * (hyperbolic_from_true(e, nu_target) - hyperbolic_from_true(e, nu0))
    };

    let z = x * x / a;
    let sqrt_mu = mu.sqrt();
    (x.powi(3) * stumpff_s(z)
        + p0.dot(v0) / sqrt_mu * x * x * stumpff_c(z)
        + r0 * x * (1.0 - z * stumpff_s(z)))
        / sqrt_mu
}

#[cfg(test)]
mod universal_test {
    use super::*;
    use crate::kepler::advance;
    use crate::orbit_type::OrbitalElements;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use std::f64::consts::PI;

    #[test]
    fn test_stumpff_values() {
        assert_eq!(stumpff_c(0.0), 0.5);
        assert_eq!(stumpff_s(0.0), 1.0 / 6.0);

        // (1 − cos π)/π² and (π − sin π)/π³
        let z = PI * PI;
        assert_abs_diff_eq!(stumpff_c(z), 2.0 / z, epsilon = 1e-15);
        assert_abs_diff_eq!(stumpff_s(z), PI / PI.powi(3), epsilon = 1e-15);

        // series and closed forms agree across the switch
        for &z in &[1e-3, -1e-3] {
            let below = z * (1.0 - 1e-9);
            assert_abs_diff_eq!(stumpff_c(below), stumpff_c(z), epsilon = 1e-12);
            assert_abs_diff_eq!(stumpff_s(below), stumpff_s(z), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_propagate_matches_kepler_golden_values() {
        let params = PropagationParams::default();
        let (position, velocity) =
            propagate(&Vec2::new(10.0, 0.0), &Vec2::new(0.0, 3.0), 1.0, 100.0, &params).unwrap();

        assert_abs_diff_eq!(position.x, 9.502929830495539, epsilon = 1e-9);
        assert_abs_diff_eq!(position.y, 2.950026285510553, epsilon = 1e-9);
        assert_abs_diff_eq!(velocity.x, -0.9882544130562986, epsilon = 1e-9);
        assert_abs_diff_eq!(velocity.y, 2.850134010018231, epsilon = 1e-9);
    }

    #[test]
    fn test_propagate_eccentric_orbit() {
        let params = PropagationParams::default();
        let (position, velocity) =
            propagate(&Vec2::new(10.0, 0.0), &Vec2::new(0.0, 5.0), 3.0, 100.0, &params).unwrap();

        assert_abs_diff_eq!(position.x, 6.6082253981, epsilon = 1e-8);
        assert_abs_diff_eq!(position.y, 13.5635135117, epsilon = 1e-8);
        assert_abs_diff_eq!(velocity.x, -1.79796095632, epsilon = 1e-8);
        assert_abs_diff_eq!(velocity.y, 3.87597739672, epsilon = 1e-8);
    }

    #[test]
    fn test_propagate_agrees_with_kepler() {
        let params = PropagationParams::default();
        let cases = [
            (Vec2::new(10.0, 0.0), Vec2::new(-1.0, 6.0), 100.0),
            (Vec2::new(-20.0, 5.0), Vec2::new(1.0, -3.0), 150.0),
            (Vec2::new(7.0, -7.0), Vec2::new(2.0, 2.5), 60.0),
        ];
        for (r, v, mu) in cases {
            let elements = OrbitalElements::from_state(&r, &v, mu).unwrap();
            for &dt in &[0.5, 3.0, 12.0, -4.0] {
                let kepler = advance(&elements, dt, &params);
                let (position, velocity) = propagate(&r, &v, dt, mu, &params).unwrap();
                assert_relative_eq!(position, kepler.position, epsilon = 1e-7, max_relative = 1e-7);
                assert_relative_eq!(velocity, kepler.velocity, epsilon = 1e-7, max_relative = 1e-7);
            }
        }
    }

    #[test]
    fn test_propagate_full_period_and_zero_step() {
        let params = PropagationParams::default();
        let r = Vec2::new(10.0, 0.0);
        let v = Vec2::new(0.0, 3.0);
        let period = OrbitalElements::from_state(&r, &v, 100.0).unwrap().period();

        let (position, velocity) = propagate(&r, &v, period, 100.0, &params).unwrap();
        assert_relative_eq!(position, r, epsilon = 1e-8);
        assert_relative_eq!(velocity, v, epsilon = 1e-8);

        assert_eq!(propagate(&r, &v, 0.0, 100.0, &params).unwrap(), (r, v));
    }

    #[test]
    fn test_propagate_rejects_bad_input() {
        let params = PropagationParams::default();
        let v = Vec2::new(0.0, 3.0);
        assert_eq!(
            propagate(&Vec2::zeros(), &v, 1.0, 100.0, &params),
            Err(ConicError::ZeroRelativePosition)
        );
        assert_eq!(
            propagate(&Vec2::new(1.0, 0.0), &v, 1.0, -1.0, &params),
            Err(ConicError::NonPositiveMass(-1.0))
        );
        assert!(matches!(
            propagate(&Vec2::new(1.0, 0.0), &v, f64::NAN, 100.0, &params),
            Err(ConicError::InvalidVector(_))
        ));
    }

    #[test]
    fn test_time_of_flight_half_period() {
        let r = Vec2::new(10.0, 0.0);
        let v = Vec2::new(0.0, 3.0);
        let elements = OrbitalElements::from_state(&r, &v, 100.0).unwrap();
        let periapsis = Vec2::new(-10.0 * 0.9 / 1.1, 0.0);

        let tof = time_of_flight(&r, &v, &periapsis, &elements.eccentricity_vector(), 100.0);
        assert_relative_eq!(tof, 8.611143864540752, max_relative = 1e-9);
        assert_relative_eq!(tof, elements.period() / 2.0, max_relative = 1e-9);
    }

    #[test]
    fn test_time_of_flight_inverts_propagation() {
        let params = PropagationParams::default();
        for (r, v) in [
            (Vec2::new(10.0, 0.0), Vec2::new(0.0, 3.0)),
            (Vec2::new(10.0, 0.0), Vec2::new(0.0, -3.5)),
            (Vec2::new(10.0, 0.0), Vec2::new(-1.0, 6.0)),
        ] {
            let elements = OrbitalElements::from_state(&r, &v, 100.0).unwrap();
            for &dt in &[0.4, 2.5, 6.0] {
                let target = advance(&elements, dt, &params).position;
                let tof = time_of_flight(&r, &v, &target, &elements.eccentricity_vector(), 100.0);
                assert_relative_eq!(tof, dt, max_relative = 1e-8);
            }
        }
    }

    #[test]
    fn test_time_of_flight_outside_asymptotes() {
        let r = Vec2::new(10.0, 0.0);
        let v = Vec2::new(0.0, 6.0);
        let elements = OrbitalElements::from_state(&r, &v, 100.0).unwrap();
        // directly behind the source, beyond acos(−1/e)
        let behind = Vec2::new(-10.0, 0.0);
        assert_eq!(
            time_of_flight(&r, &v, &behind, &elements.eccentricity_vector(), 100.0),
            f64::INFINITY
        );
    }
}
