//! # Constants and type definitions for patched-conic propagation
//!
//! This module centralizes the **numerical constants**, **default tuning values**, and **common
//! type aliases** used throughout the crate.
//!
//! ## Overview
//!
//! - Angle constants and thresholds used by the element converter
//! - Default values of [`PropagationParams`](crate::params::PropagationParams)
//! - Core type aliases (planar vectors, angles, simulation time)
//!
//! All quantities are expressed in **simulation units**: lengths, masses and times are whatever
//! the caller chooses, as long as the gravitational constant is consistent with them.

use nalgebra::Vector2;

// -------------------------------------------------------------------------------------------------
// Numerical constants
// -------------------------------------------------------------------------------------------------

/// 2π, useful for trigonometric conversions
pub const DPI: f64 = 2. * std::f64::consts::PI;

/// Eccentricity below which an orbit is treated as circular when choosing a periapsis direction
pub const CIRCULAR_ECCENTRICITY: f64 = 1e-9;

/// Ratio `|h| / (r·v)` at or below which a relative state is treated as a radial line
pub const RADIAL_ANGULAR_MOMENTUM: f64 = 1e-12;

/// Exponent of the mass ratio in the Laplace sphere-of-influence radius `a·(m/M)^(2/5)`
pub const SOI_MASS_EXPONENT: f64 = 0.4;

// -------------------------------------------------------------------------------------------------
// Default propagation parameters
// -------------------------------------------------------------------------------------------------

/// Default gravitational constant (simulation units)
pub const DEFAULT_GRAVITATIONAL_CONSTANT: f64 = 1.0;

/// Simulated seconds during which a body ignores further SOI transitions
pub const DEFAULT_SOI_COOLDOWN: f64 = 0.2;

/// Newton–Raphson iteration cap for Kepler's equation
pub const DEFAULT_KEPLER_MAX_ITER: usize = 6;

/// Early-exit tolerance on the anomaly increment for Kepler's equation
pub const DEFAULT_KEPLER_TOLERANCE: f64 = 1e-6;

/// Speed margin around the hyperbolic excess speed that arms the asymptote test
pub const DEFAULT_ASYMPTOTE_SPEED_MARGIN: f64 = 1.5;

/// Relative divergence between finite-difference and analytic velocity that triggers coasting
pub const DEFAULT_ASYMPTOTE_DIVERGENCE: f64 = 0.02;

/// Newton–Raphson iteration cap for the universal Kepler equation
pub const DEFAULT_UNIVERSAL_MAX_ITER: usize = 100;

/// Relative tolerance on the universal anomaly increment
pub const DEFAULT_UNIVERSAL_TOLERANCE: f64 = 1e-10;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Planar vector (position, velocity, force)
pub type Vec2 = Vector2<f64>;
/// Angle in radians
pub type Radian = f64;
/// Simulation time in seconds
pub type Seconds = f64;
