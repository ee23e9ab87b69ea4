//! # Kepler propagation
//!
//! Analytic two-body propagation of an [`OrbitalElements`] set: the mean anomaly is advanced by
//! `n·t`, Kepler's equation is solved with a bounded Newton–Raphson iteration and the resulting
//! true anomaly is mapped back to a relative position and velocity.
//!
//! - Ellipse: `E − e·sin E = M` with `M` reduced to `[0, 2π)`,
//! - Hyperbola: `e·sinh H − H = M` with `M` unbounded.
//!
//! Both solvers stop after `kepler_max_iter` iterations (6 by default) or as soon as the update
//! falls below `kepler_tolerance`. The last iterate is always returned, converged or not.
use log::trace;

use crate::{
    constants::{Radian, Seconds, Vec2},
    math::{principal_angle, wrap_to_pi},
    orbit_type::{
        anomaly::{true_from_eccentric, true_from_hyperbolic},
        OrbitalElements, TrajectoryType,
    },
    params::PropagationParams,
};

/// Solve the elliptic Kepler equation `E − e·sin E = M` for `E`.
///
/// Arguments
/// -----------------
/// * `eccentricity`: orbit eccentricity, `0 ≤ e < 1`.
/// * `mean_anomaly`: mean anomaly `M` in radians.
/// * `max_iter`: Newton–Raphson iteration cap.
/// * `tolerance`: early exit threshold on `|ΔE|`.
///
/// Return
/// ----------
/// * The eccentric anomaly after at most `max_iter` Newton steps, starting from Danby's guess
///   `E₀ = M + 0.85·e·sign(sin M)`.
pub fn solve_kepler_equation(
    eccentricity: f64,
    mean_anomaly: f64,
    max_iter: usize,
    tolerance: f64,
) -> f64 {
    let sign = if mean_anomaly.sin() >= 0.0 { 1.0 } else { -1.0 };
    let mut ecc_anomaly = mean_anomaly + 0.85 * eccentricity * sign;

    for _ in 0..max_iter {
        let delta = (ecc_anomaly - eccentricity * ecc_anomaly.sin() - mean_anomaly)
            / (1.0 - eccentricity * ecc_anomaly.cos());
        ecc_anomaly -= delta;
        if delta.abs() < tolerance {
            return ecc_anomaly;
        }
    }

    trace!("elliptic Kepler solver capped (e = {eccentricity}, M = {mean_anomaly})");
    ecc_anomaly
}

/// Solve the hyperbolic Kepler equation `e·sinh H − H = M` for `H`.
///
/// The starting guess `H₀ = sign(M)·ln(2|M|/e + 1.8)` keeps the iteration well behaved for large
/// mean anomalies, where `sinh` would otherwise overshoot.
pub fn solve_hyperbolic_kepler_equation(
    eccentricity: f64,
    mean_anomaly: f64,
    max_iter: usize,
    tolerance: f64,
) -> f64 {
    let mut hyp_anomaly = (2.0 * mean_anomaly.abs() / eccentricity + 1.8)
        .ln()
        .copysign(mean_anomaly);

    for _ in 0..max_iter {
        let delta = (eccentricity * hyp_anomaly.sinh() - hyp_anomaly - mean_anomaly)
            / (eccentricity * hyp_anomaly.cosh() - 1.0);
        hyp_anomaly -= delta;
        if delta.abs() < tolerance {
            return hyp_anomaly;
        }
    }

    trace!("hyperbolic Kepler solver capped (e = {eccentricity}, M = {mean_anomaly})");
    hyp_anomaly
}

/// Instantaneous state of a body on its conic, relative to the dominant source.
///
/// `position` and `velocity` are expressed in world axes but centred on the source; callers add
/// the source's own world state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitalState {
    pub true_anomaly: Radian,
    pub radius: f64,
    pub position: Vec2,
    pub velocity: Vec2,
    pub flight_path_angle: Radian,
}

/// True anomaly reached `time_since_epoch` seconds after the element epoch.
///
/// At `t = 0` the stored epoch anomaly is returned without solving anything.
pub fn true_anomaly_at(
    elements: &OrbitalElements,
    time_since_epoch: Seconds,
    params: &PropagationParams,
) -> Radian {
    if time_since_epoch == 0.0 {
        return elements.true_anomaly_at_epoch();
    }

    let e = elements.eccentricity();
    let drift = elements.mean_motion() * time_since_epoch;
    match elements.trajectory_type() {
        TrajectoryType::Ellipse => {
            let mean_anomaly = principal_angle(elements.mean_anomaly_at_epoch() + drift);
            let ecc_anomaly = solve_kepler_equation(
                e,
                mean_anomaly,
                params.kepler_max_iter,
                params.kepler_tolerance,
            );
            wrap_to_pi(true_from_eccentric(e, ecc_anomaly))
        }
        TrajectoryType::Hyperbola => {
            let mean_anomaly = elements.mean_anomaly_at_epoch() + drift;
            let hyp_anomaly = solve_hyperbolic_kepler_equation(
                e,
                mean_anomaly,
                params.kepler_max_iter,
                params.kepler_tolerance,
            );
            true_from_hyperbolic(e, hyp_anomaly)
        }
    }
}

/// Advance an element set by `time_since_epoch` seconds.
///
/// Arguments
/// -----------------
/// * `elements`: element set relative to the dominant source.
/// * `time_since_epoch`: elapsed simulated time since the element epoch.
/// * `params`: Kepler solver settings.
///
/// Return
/// ----------
/// * An [`OrbitalState`]: signed true anomaly, conic radius `a(1−e²)/(1+e·cos ν)`, relative
///   position and velocity, and flight-path angle.
///
/// See also
/// ------------
/// * [`OrbitalElements::state_at_true_anomaly`] – state from a known true anomaly.
/// * [`crate::universal::propagate`] – element-free alternative.
pub fn advance(
    elements: &OrbitalElements,
    time_since_epoch: Seconds,
    params: &PropagationParams,
) -> OrbitalState {
    let true_anomaly = true_anomaly_at(elements, time_since_epoch, params);
    let (position, velocity) = elements.state_at_true_anomaly(true_anomaly);

    OrbitalState {
        true_anomaly,
        radius: elements.radius_at(true_anomaly),
        position,
        velocity,
        flight_path_angle: elements.flight_path_angle_at(true_anomaly),
    }
}

/// Whether a hyperbolic body should stop solving Kepler's equation and coast on its asymptote.
///
/// True only on the receding leg (`ν > 0`) of a hyperbola, when the analytic speed is within
/// `asymptote_speed_margin` of the excess speed `v∞` and the finite-difference velocity
/// disagrees with the analytic one by more than `asymptote_divergence` (relative).
pub fn asymptote_reached(
    elements: &OrbitalElements,
    state: &OrbitalState,
    finite_difference_velocity: &Vec2,
    params: &PropagationParams,
) -> bool {
    let Some(excess_speed) = elements.hyperbolic_excess_speed() else {
        return false;
    };
    if state.true_anomaly <= 0.0 {
        return false;
    }

    let speed = state.velocity.norm();
    if (speed - excess_speed).abs() >= params.asymptote_speed_margin || speed == 0.0 {
        return false;
    }

    (finite_difference_velocity - state.velocity).norm() / speed > params.asymptote_divergence
}
