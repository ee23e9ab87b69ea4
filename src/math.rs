//! Scalar and planar-vector helpers shared by the propagators.
//!
//! Hyperbolic trigonometry comes straight from `f64::{sinh, cosh, tanh, atanh}`; this module only
//! adds angle normalization, range rescaling and the 2D cross products used by the element
//! converter.

use std::f64::consts::PI;

use crate::constants::{Vec2, DPI};

/// Principal value of an angle in radians, in `[0, 2π)`.
pub fn principal_angle(a: f64) -> f64 {
    a.rem_euclid(DPI)
}

/// Wrap an angle to `(-π, π]`.
pub fn wrap_to_pi(a: f64) -> f64 {
    let wrapped = PI - (PI - a).rem_euclid(DPI);
    if wrapped <= -PI {
        wrapped + DPI
    } else {
        wrapped
    }
}

/// Linearly map `value` from `[from_min, from_max]` onto `[to_min, to_max]`.
///
/// A degenerate source range maps everything onto `to_min`.
pub fn rescale(value: f64, from_min: f64, from_max: f64, to_min: f64, to_max: f64) -> f64 {
    let span = from_max - from_min;
    if span == 0.0 {
        return to_min;
    }
    to_min + (value - from_min) * (to_max - to_min) / span
}

/// z-component of the planar cross product `a × b`.
#[inline]
pub fn cross_z(a: &Vec2, b: &Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Planar part of `v × (h·ẑ)`, i.e. `v` rotated clockwise by 90° and scaled by `h`.
#[inline]
pub fn cross_with_z(v: &Vec2, h: f64) -> Vec2 {
    Vec2::new(v.y * h, -v.x * h)
}

/// Unit vector at polar angle `angle`.
#[inline]
pub fn unit_at(angle: f64) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin())
}

/// `v` rotated counter-clockwise by 90°.
#[inline]
pub fn perpendicular(v: &Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}
