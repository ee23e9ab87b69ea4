//! Fixed-step integration of a body pushed by an external force.
//!
//! Used while a body is in [`OrbitMode::Iterative`](crate::orbiting_body::OrbitMode): the
//! dominant source's point-mass gravity and the external acceleration are integrated in the
//! source frame with a kick-drift-kick velocity Verlet step.

use crate::constants::Vec2;

/// Point-mass gravitational acceleration `−μ·r/|r|³` at a position relative to the source.
#[inline]
pub fn gravity_acceleration(relative_position: &Vec2, mu: f64) -> Vec2 {
    let r = relative_position.norm();
    -mu * relative_position / (r * r * r)
}

/// Advance `(position, velocity)` by one velocity-Verlet step.
///
/// `acceleration` is evaluated twice: at `x_n` and at `x_n+1`.
pub fn velocity_verlet<F>(
    position: &Vec2,
    velocity: &Vec2,
    dt: f64,
    acceleration: F,
) -> (Vec2, Vec2)
where
    F: Fn(&Vec2) -> Vec2,
{
    let half_dt = 0.5 * dt;

    // kick: v_n+1/2 = v_n + dt/2 a_n
    let half_velocity = velocity + half_dt * acceleration(position);
    // drift: x_n+1 = x_n + dt v_n+1/2
    let new_position = position + dt * half_velocity;
    // kick: v_n+1 = v_n+1/2 + dt/2 a_n+1
    let new_velocity = half_velocity + half_dt * acceleration(&new_position);

    (new_position, new_velocity)
}

/// One Verlet step under source gravity plus a constant external acceleration.
pub fn step_with_thrust(
    relative_position: &Vec2,
    relative_velocity: &Vec2,
    dt: f64,
    mu: f64,
    thrust_acceleration: &Vec2,
) -> (Vec2, Vec2) {
    velocity_verlet(relative_position, relative_velocity, dt, |r| {
        gravity_acceleration(r, mu) + thrust_acceleration
    })
}
