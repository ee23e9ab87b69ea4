//! # Anomaly conversions
//!
//! Closed-form mappings between the three angular positions along a conic:
//!
//! - **true anomaly** `ν` – actual angle from periapsis,
//! - **eccentric anomaly** `E` (ellipse) / **hyperbolic anomaly** `H` (hyperbola),
//! - **mean anomaly** `M` – uniform in time.
//!
//! All functions follow the crate-wide signed convention: `ν`, `E`/`H` and `M` share the same
//! sign, negative while the body approaches periapsis. Elliptic results lie in `(-π, π]`.

/// Eccentric anomaly from the true anomaly (ellipse, `e < 1`).
pub fn eccentric_from_true(eccentricity: f64, true_anomaly: f64) -> f64 {
    let half = 0.5 * true_anomaly;
    2.0 * ((1.0 - eccentricity).sqrt() * half.sin()).atan2((1.0 + eccentricity).sqrt() * half.cos())
}

/// True anomaly from the eccentric anomaly (ellipse, `e < 1`).
pub fn true_from_eccentric(eccentricity: f64, eccentric_anomaly: f64) -> f64 {
    let half = 0.5 * eccentric_anomaly;
    2.0 * ((1.0 + eccentricity).sqrt() * half.sin()).atan2((1.0 - eccentricity).sqrt() * half.cos())
}

/// Mean anomaly from the eccentric anomaly: `M = E − e·sin E`.
pub fn mean_from_eccentric(eccentricity: f64, eccentric_anomaly: f64) -> f64 {
    eccentric_anomaly - eccentricity * eccentric_anomaly.sin()
}

/// Hyperbolic anomaly from the true anomaly (hyperbola, `e > 1`).
///
/// The true anomaly must lie strictly between the asymptotes, `|ν| < acos(−1/e)`.
pub fn hyperbolic_from_true(eccentricity: f64, true_anomaly: f64) -> f64 {
    let ratio = ((eccentricity - 1.0) / (eccentricity + 1.0)).sqrt();
    2.0 * (ratio * (0.5 * true_anomaly).tan()).atanh()
}

/// True anomaly from the hyperbolic anomaly (hyperbola, `e > 1`).
pub fn true_from_hyperbolic(eccentricity: f64, hyperbolic_anomaly: f64) -> f64 {
    let ratio = ((eccentricity + 1.0) / (eccentricity - 1.0)).sqrt();
    2.0 * (ratio * (0.5 * hyperbolic_anomaly).tanh()).atan()
}

/// Mean anomaly from the hyperbolic anomaly: `M = e·sinh H − H`.
pub fn mean_from_hyperbolic(eccentricity: f64, hyperbolic_anomaly: f64) -> f64 {
    eccentricity * hyperbolic_anomaly.sinh() - hyperbolic_anomaly
}

/// True anomaly of the outgoing asymptote, `acos(−1/e)`, for `e > 1`.
pub fn asymptote_true_anomaly(eccentricity: f64) -> f64 {
    (-1.0 / eccentricity).acos()
}
