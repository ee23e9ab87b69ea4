//! # Planar orbital elements
//!
//! This module defines [`OrbitalElements`], the two-body element set used by every propagator in
//! the crate, and the conversion from a relative Cartesian state `(r, v)` into that set.
//!
//! ## Conversion outline
//!
//! Given a relative position `r`, velocity `v` and gravitational parameter `μ = G·M`:
//!
//! 1. `h = r × v` (z component only); its sign fixes the handedness (`h < 0` ⇒ clockwise),
//! 2. `e_vec = (v × h)/μ − r̂`,
//! 3. `a = 1 / (2/r − v²/μ)` (negative for hyperbolas),
//! 4. `e = |e_vec|`, [`TrajectoryType::Ellipse`] iff `e < 1`,
//! 5. `b = a·√(1−e²)` (ellipse) or `b = −a·√(e²−1)` (hyperbola),
//! 6. `ω = atan2(e_vec)`; for circular orbits the current position direction is used instead,
//! 7. `ν = acos(e_vec·r / (e·r))`, negated while approaching periapsis (`r·v < 0`),
//! 8. eccentric/hyperbolic anomaly, mean anomaly at epoch and mean motion `n = √(μ/|a|³)`.
//!
//! ## Angle convention
//!
//! The true anomaly is measured from periapsis **in the direction of motion** and kept signed in
//! `(-π, π]`. The polar angle of the body in the source frame is therefore `ω + s·ν` where
//! `s = +1` for counter-clockwise and `−1` for clockwise orbits.
//!
//! ## Example
//!
//! ```rust
//! use patched_conics::constants::Vec2;
//! use patched_conics::orbit_type::{OrbitalElements, TrajectoryType};
//!
//! let elements =
//!     OrbitalElements::from_state(&Vec2::new(10.0, 0.0), &Vec2::new(0.0, 3.0), 100.0).unwrap();
//! assert_eq!(elements.trajectory_type(), TrajectoryType::Ellipse);
//! assert!((elements.eccentricity() - 0.1).abs() < 1e-12);
//! ```
use std::fmt;

use crate::{
    conic_errors::ConicError,
    constants::{Radian, Vec2, CIRCULAR_ECCENTRICITY, DPI, RADIAL_ANGULAR_MOMENTUM},
    math::{cross_with_z, cross_z, perpendicular, rescale, unit_at, wrap_to_pi},
};

/// Closed-form anomaly conversions.
pub mod anomaly;

use anomaly::{
    asymptote_true_anomaly, eccentric_from_true, hyperbolic_from_true, mean_from_eccentric,
    mean_from_hyperbolic,
};

/// Conic family of a two-body trajectory, selected by `e < 1`.
///
/// Parabolic orbits are not modelled: an eccentricity of exactly one falls on the hyperbolic side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrajectoryType {
    Ellipse,
    Hyperbola,
}

impl TrajectoryType {
    pub fn from_eccentricity(eccentricity: f64) -> Self {
        if eccentricity < 1.0 {
            TrajectoryType::Ellipse
        } else {
            TrajectoryType::Hyperbola
        }
    }
}

impl fmt::Display for TrajectoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrajectoryType::Ellipse => write!(f, "ellipse"),
            TrajectoryType::Hyperbola => write!(f, "hyperbola"),
        }
    }
}

/// Osculating planar two-body elements relative to a gravity source.
///
/// Fields are private: the trajectory type and every derived quantity are refreshed together by
/// [`OrbitalElements::set_eccentricity_vector`], so a partially updated element set cannot be
/// observed.
///
/// Units
/// -----
/// * lengths and speeds in simulation units, angles in radians, times in simulation seconds.
/// * `mu` is the gravitational parameter `G·M` of the source.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitalElements {
    mu: f64,
    eccentricity_vector: Vec2,
    eccentricity: f64,
    semi_major_axis: f64,
    semi_minor_axis: f64,
    argument_of_periapsis: Radian,
    angular_momentum: f64,
    specific_energy: f64,
    mean_motion: f64,
    period: f64,
    true_anomaly_at_epoch: Radian,
    mean_anomaly_at_epoch: Radian,
    trajectory_type: TrajectoryType,
    hyperbolic_excess_speed: Option<f64>,
    asymptote_true_anomaly: Option<Radian>,
}

impl OrbitalElements {
    /// Build the element set from a state relative to the dominant source.
    ///
    /// Arguments
    /// ---------
    /// * `relative_position`: position of the body minus position of the source.
    /// * `relative_velocity`: velocity of the body minus velocity of the source.
    /// * `mu`: gravitational parameter `G·M` of the source.
    ///
    /// Errors
    /// ------
    /// * [`ConicError::NonPositiveMass`] if `mu` is not strictly positive and finite.
    /// * [`ConicError::ZeroRelativePosition`] if the body sits on the source centre.
    /// * [`ConicError::InvalidVector`] if a component is NaN or infinite.
    /// * [`ConicError::RadialTrajectory`] if the body is at rest or moves along the radius.
    pub fn from_state(
        relative_position: &Vec2,
        relative_velocity: &Vec2,
        mu: f64,
    ) -> Result<Self, ConicError> {
        if !(mu > 0.0 && mu.is_finite()) {
            return Err(ConicError::NonPositiveMass(mu));
        }
        if !relative_position.iter().chain(relative_velocity.iter()).all(|c| c.is_finite()) {
            return Err(ConicError::InvalidVector(format!(
                "r = ({}, {}), v = ({}, {})",
                relative_position.x, relative_position.y, relative_velocity.x, relative_velocity.y
            )));
        }

        let radius = relative_position.norm();
        if radius == 0.0 {
            return Err(ConicError::ZeroRelativePosition);
        }

        let angular_momentum = cross_z(relative_position, relative_velocity);
        if angular_momentum.abs() <= RADIAL_ANGULAR_MOMENTUM * radius * relative_velocity.norm() {
            return Err(ConicError::RadialTrajectory);
        }
        let eccentricity_vector =
            cross_with_z(relative_velocity, angular_momentum) / mu - relative_position / radius;
        let semi_major_axis = 1.0 / (2.0 / radius - relative_velocity.norm_squared() / mu);

        let mut elements = OrbitalElements {
            mu,
            eccentricity_vector: Vec2::zeros(),
            eccentricity: 0.0,
            semi_major_axis,
            semi_minor_axis: 0.0,
            argument_of_periapsis: wrap_to_pi(relative_position.y.atan2(relative_position.x)),
            angular_momentum,
            specific_energy: -mu / (2.0 * semi_major_axis),
            mean_motion: 0.0,
            period: f64::INFINITY,
            true_anomaly_at_epoch: 0.0,
            mean_anomaly_at_epoch: 0.0,
            trajectory_type: TrajectoryType::Ellipse,
            hyperbolic_excess_speed: None,
            asymptote_true_anomaly: None,
        };
        elements.set_eccentricity_vector(eccentricity_vector);

        let true_anomaly = if elements.eccentricity > CIRCULAR_ECCENTRICITY {
            let cos_nu = (eccentricity_vector.dot(relative_position)
                / (elements.eccentricity * radius))
                .clamp(-1.0, 1.0);
            let nu = cos_nu.acos();
            if relative_position.dot(relative_velocity) < 0.0 {
                -nu
            } else {
                nu
            }
        } else {
            0.0
        };
        elements.set_true_anomaly_at_epoch(true_anomaly);

        Ok(elements)
    }

    /// Replace the eccentricity vector and refresh everything that depends on it.
    ///
    /// The semi-latus rectum `p = h²/μ` is kept, so the semi-major axis follows `a = p/(1−e²)`
    /// except when the stored axis already agrees (the state-vector path), in which case the
    /// vis-viva value is preserved untouched. The trajectory type, semi-minor axis, argument of
    /// periapsis, mean motion, period, excess speed and asymptote angle are all recomputed here.
    pub fn set_eccentricity_vector(&mut self, eccentricity_vector: Vec2) {
        let eccentricity = eccentricity_vector.norm();
        let semi_latus_rectum = self.angular_momentum * self.angular_momentum / self.mu;
        let one_minus_e2 = 1.0 - eccentricity * eccentricity;

        // keep the vis-viva axis when it already describes this conic
        let from_rectum = semi_latus_rectum / one_minus_e2;
        let consistent = (self.semi_major_axis * one_minus_e2 - semi_latus_rectum).abs()
            <= 1e-9 * semi_latus_rectum.abs().max(1.0);
        if !consistent && from_rectum.is_finite() && from_rectum != 0.0 {
            self.semi_major_axis = from_rectum;
        }

        self.eccentricity_vector = eccentricity_vector;
        self.eccentricity = eccentricity;
        self.trajectory_type = TrajectoryType::from_eccentricity(eccentricity);

        let a = self.semi_major_axis;
        self.specific_energy = -self.mu / (2.0 * a);
        self.mean_motion = (self.mu / a.abs().powi(3)).sqrt();

        match self.trajectory_type {
            TrajectoryType::Ellipse => {
                self.semi_minor_axis = a * one_minus_e2.sqrt();
                self.period = DPI / self.mean_motion;
                self.hyperbolic_excess_speed = None;
                self.asymptote_true_anomaly = None;
            }
            TrajectoryType::Hyperbola => {
                self.semi_minor_axis = -a * (-one_minus_e2).sqrt();
                self.period = f64::INFINITY;
                self.hyperbolic_excess_speed = Some((self.mu / a.abs()).sqrt());
                self.asymptote_true_anomaly = Some(asymptote_true_anomaly(eccentricity));
            }
        }

        if eccentricity > CIRCULAR_ECCENTRICITY {
            self.argument_of_periapsis =
                wrap_to_pi(eccentricity_vector.y.atan2(eccentricity_vector.x));
        }

        // the epoch anomaly must be re-expressed on the new conic
        self.set_true_anomaly_at_epoch(self.true_anomaly_at_epoch);
    }

    fn set_true_anomaly_at_epoch(&mut self, true_anomaly: Radian) {
        self.true_anomaly_at_epoch = true_anomaly;
        self.mean_anomaly_at_epoch = match self.trajectory_type {
            TrajectoryType::Ellipse => mean_from_eccentric(
                self.eccentricity,
                eccentric_from_true(self.eccentricity, true_anomaly),
            ),
            TrajectoryType::Hyperbola => mean_from_hyperbolic(
                self.eccentricity,
                hyperbolic_from_true(self.eccentricity, true_anomaly),
            ),
        };
    }

    pub fn mu(&self) -> f64 {
        self.mu
    }

    pub fn eccentricity_vector(&self) -> Vec2 {
        self.eccentricity_vector
    }

    pub fn eccentricity(&self) -> f64 {
        self.eccentricity
    }

    /// Semi-major axis, negative for hyperbolic trajectories.
    pub fn semi_major_axis(&self) -> f64 {
        self.semi_major_axis
    }

    pub fn semi_minor_axis(&self) -> f64 {
        self.semi_minor_axis
    }

    pub fn argument_of_periapsis(&self) -> Radian {
        self.argument_of_periapsis
    }

    /// z component of the specific angular momentum `r × v`.
    pub fn angular_momentum(&self) -> f64 {
        self.angular_momentum
    }

    pub fn is_clockwise(&self) -> bool {
        self.angular_momentum < 0.0
    }

    /// `+1.0` for counter-clockwise motion, `-1.0` for clockwise motion.
    pub fn direction(&self) -> f64 {
        if self.is_clockwise() {
            -1.0
        } else {
            1.0
        }
    }

    /// Specific orbital energy `v²/2 − μ/r = −μ/(2a)`.
    pub fn specific_energy(&self) -> f64 {
        self.specific_energy
    }

    pub fn mean_motion(&self) -> f64 {
        self.mean_motion
    }

    /// Orbital period, `+∞` for hyperbolas.
    pub fn period(&self) -> f64 {
        self.period
    }

    pub fn true_anomaly_at_epoch(&self) -> Radian {
        self.true_anomaly_at_epoch
    }

    pub fn mean_anomaly_at_epoch(&self) -> Radian {
        self.mean_anomaly_at_epoch
    }

    pub fn trajectory_type(&self) -> TrajectoryType {
        self.trajectory_type
    }

    pub fn hyperbolic_excess_speed(&self) -> Option<f64> {
        self.hyperbolic_excess_speed
    }

    pub fn asymptote_true_anomaly(&self) -> Option<Radian> {
        self.asymptote_true_anomaly
    }

    /// `p = a·(1 − e²) = h²/μ`.
    pub fn semi_latus_rectum(&self) -> f64 {
        self.semi_major_axis * (1.0 - self.eccentricity * self.eccentricity)
    }

    pub fn periapsis_radius(&self) -> f64 {
        self.semi_latus_rectum() / (1.0 + self.eccentricity)
    }

    /// Apoapsis radius, `+∞` for hyperbolas.
    pub fn apoapsis_radius(&self) -> f64 {
        match self.trajectory_type {
            TrajectoryType::Ellipse => self.semi_latus_rectum() / (1.0 - self.eccentricity),
            TrajectoryType::Hyperbola => f64::INFINITY,
        }
    }

    /// Conic radius at a given true anomaly, `r = p / (1 + e·cos ν)`.
    pub fn radius_at(&self, true_anomaly: Radian) -> f64 {
        self.semi_latus_rectum() / (1.0 + self.eccentricity * true_anomaly.cos())
    }

    /// Position relative to the source at a given true anomaly.
    pub fn position_at(&self, true_anomaly: Radian) -> Vec2 {
        self.radius_at(true_anomaly)
            * unit_at(self.argument_of_periapsis + self.direction() * true_anomaly)
    }

    /// Signed flight-path angle `φ = atan2(e·sin ν, 1 + e·cos ν)`, positive while receding.
    pub fn flight_path_angle_at(&self, true_anomaly: Radian) -> Radian {
        (self.eccentricity * true_anomaly.sin()).atan2(1.0 + self.eccentricity * true_anomaly.cos())
    }

    /// Vis-viva speed at a given radius, `v = √(μ(2/r − 1/a))`.
    pub fn speed_at_radius(&self, radius: f64) -> f64 {
        (self.mu * (2.0 / radius - 1.0 / self.semi_major_axis))
            .max(0.0)
            .sqrt()
    }

    /// Relative state `(position, velocity)` at a given true anomaly.
    ///
    /// The velocity is built from the vis-viva speed and the flight-path angle:
    /// `v·(sin φ·r̂ + cos φ·t̂)` with `t̂` the unit tangent in the direction of motion.
    pub fn state_at_true_anomaly(&self, true_anomaly: Radian) -> (Vec2, Vec2) {
        let radius = self.radius_at(true_anomaly);
        let angle = self.argument_of_periapsis + self.direction() * true_anomaly;
        let radial = unit_at(angle);
        let tangent = self.tangent_at_angle(angle);
        let phi = self.flight_path_angle_at(true_anomaly);
        let speed = self.speed_at_radius(radius);
        (
            radius * radial,
            speed * (phi.sin() * radial + phi.cos() * tangent),
        )
    }

    /// Sample `n` points of the conic relative to the source, for plotting.
    ///
    /// Ellipses are sampled over a full turn (first and last point coincide). Hyperbolas are
    /// sampled symmetrically between the asymptotes, stopping at `limit_fraction` of the
    /// asymptote true anomaly (a value in `(0, 1)`; e.g. `0.95`).
    pub fn sample_conic(&self, n: usize, limit_fraction: f64) -> Vec<Vec2> {
        if n == 0 {
            return Vec::new();
        }
        let (start, end) = match self.asymptote_true_anomaly {
            None => (-std::f64::consts::PI, std::f64::consts::PI),
            Some(limit) => {
                let bound = limit * limit_fraction.clamp(0.0, 1.0 - f64::EPSILON);
                (-bound, bound)
            }
        };
        let last = (n - 1).max(1) as f64;
        (0..n)
            .map(|i| self.position_at(rescale(i as f64, 0.0, last, start, end)))
            .collect()
    }

    /// Unit tangent in the direction of motion at polar angle `angle`.
    pub(crate) fn tangent_at_angle(&self, angle: Radian) -> Vec2 {
        self.direction() * perpendicular(&unit_at(angle))
    }
}

/// Compute elements from a relative state, a source mass and the gravitational constant.
pub fn compute_elements(
    relative_position: &Vec2,
    relative_velocity: &Vec2,
    source_mass: f64,
    gravitational_constant: f64,
) -> Result<OrbitalElements, ConicError> {
    if !(source_mass > 0.0 && source_mass.is_finite()) {
        return Err(ConicError::NonPositiveMass(source_mass));
    }
    OrbitalElements::from_state(
        relative_position,
        relative_velocity,
        gravitational_constant * source_mass,
    )
}

impl fmt::Display for OrbitalElements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Orbital elements ({})", self.trajectory_type)?;
        writeln!(f, "  a      = {:.6}", self.semi_major_axis)?;
        writeln!(f, "  b      = {:.6}", self.semi_minor_axis)?;
        writeln!(f, "  e      = {:.6}", self.eccentricity)?;
        writeln!(f, "  ω      = {:.6} rad", self.argument_of_periapsis)?;
        writeln!(f, "  h      = {:.6}", self.angular_momentum)?;
        writeln!(f, "  ν0     = {:.6} rad", self.true_anomaly_at_epoch)?;
        writeln!(f, "  M0     = {:.6} rad", self.mean_anomaly_at_epoch)?;
        write!(f, "  period = {:.6}", self.period)
    }
}
