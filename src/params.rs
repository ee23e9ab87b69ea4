//! # Propagation parameters
//!
//! This module defines [`PropagationParams`], the configuration shared by every propagator of a
//! [`Simulation`](crate::simulation::Simulation), and its validating builder.
//!
//! ## Purpose
//!
//! The parameters centralize the tunable constants of the patched-conic core:
//!
//! - the gravitational constant `G` used to turn source masses into `μ = G·M`,
//! - the sphere-of-influence transition cooldown (simulated seconds),
//! - iteration caps and tolerances of the Kepler and universal-variable Newton solvers,
//! - the two thresholds arming the hyperbolic asymptote coast.
//!
//! The Kepler solver deliberately runs a small, bounded number of iterations; a non-converged
//! anomaly is accepted as is, so the cost of a tick stays fixed.
//!
//! ## Example
//!
//! ```rust
//! use patched_conics::params::PropagationParams;
//!
//! let params = PropagationParams::builder()
//!     .gravitational_constant(6.674e-11)
//!     .soi_cooldown(0.5)
//!     .kepler_max_iter(8)
//!     .build()
//!     .unwrap();
//!
//! println!("{params:#}");
//! ```
//!
//! ## See also
//!
//! * [`crate::kepler::advance`] – analytic propagation driven by `kepler_*` and `asymptote_*`
//! * [`crate::universal::propagate`] – universal-variable propagation driven by `universal_*`
//! * [`crate::scenario::ScenarioConfig`] – YAML loading of these parameters
use std::cmp::Ordering::{Equal, Greater};
use std::fmt;

use serde::Deserialize;

use crate::conic_errors::ConicError;
use crate::constants::{
    DEFAULT_ASYMPTOTE_DIVERGENCE, DEFAULT_ASYMPTOTE_SPEED_MARGIN, DEFAULT_GRAVITATIONAL_CONSTANT,
    DEFAULT_KEPLER_MAX_ITER, DEFAULT_KEPLER_TOLERANCE, DEFAULT_SOI_COOLDOWN,
    DEFAULT_UNIVERSAL_MAX_ITER, DEFAULT_UNIVERSAL_TOLERANCE,
};

/// Configuration of the propagation core.
///
/// Missing fields in a scenario file fall back to [`PropagationParams::default`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PropagationParams {
    /// Gravitational constant `G` (simulation units).
    pub gravitational_constant: f64,
    /// Simulated seconds during which a body ignores new SOI transitions.
    pub soi_cooldown: f64,

    // --- Kepler solver ---
    pub kepler_max_iter: usize,
    pub kepler_tolerance: f64,

    // --- Hyperbolic asymptote coast ---
    /// Maximum `|v − v∞|` for the asymptote test to be considered.
    pub asymptote_speed_margin: f64,
    /// Relative disagreement between finite-difference and analytic velocity that triggers
    /// coasting.
    pub asymptote_divergence: f64,

    // --- Universal variable solver ---
    pub universal_max_iter: usize,
    pub universal_tolerance: f64,
}

impl PropagationParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a builder initialized with the default values.
    pub fn builder() -> PropagationParamsBuilder {
        PropagationParamsBuilder::new()
    }

    /// Check every validation rule of [`PropagationParamsBuilder::build`].
    ///
    /// Used for parameters obtained without the builder, e.g. deserialized from a scenario.
    pub fn validate(&self) -> Result<(), ConicError> {
        fn gt0(x: f64) -> bool {
            matches!(x.partial_cmp(&0.0), Some(Greater)) && x.is_finite()
        }
        fn ge0(x: f64) -> bool {
            matches!(x.partial_cmp(&0.0), Some(Greater) | Some(Equal)) && x.is_finite()
        }

        if !gt0(self.gravitational_constant) {
            return Err(ConicError::InvalidPropagationParameter(
                "gravitational_constant must be > 0".into(),
            ));
        }
        if !ge0(self.soi_cooldown) {
            return Err(ConicError::InvalidPropagationParameter(
                "soi_cooldown must be >= 0".into(),
            ));
        }
        if self.kepler_max_iter == 0 {
            return Err(ConicError::InvalidPropagationParameter(
                "kepler_max_iter must be >= 1".into(),
            ));
        }
        if !gt0(self.kepler_tolerance) {
            return Err(ConicError::InvalidPropagationParameter(
                "kepler_tolerance must be > 0".into(),
            ));
        }
        if !ge0(self.asymptote_speed_margin) {
            return Err(ConicError::InvalidPropagationParameter(
                "asymptote_speed_margin must be >= 0".into(),
            ));
        }
        if !gt0(self.asymptote_divergence) {
            return Err(ConicError::InvalidPropagationParameter(
                "asymptote_divergence must be > 0".into(),
            ));
        }
        if self.universal_max_iter == 0 {
            return Err(ConicError::InvalidPropagationParameter(
                "universal_max_iter must be >= 1".into(),
            ));
        }
        if !gt0(self.universal_tolerance) {
            return Err(ConicError::InvalidPropagationParameter(
                "universal_tolerance must be > 0".into(),
            ));
        }
        Ok(())
    }
}

impl Default for PropagationParams {
    fn default() -> Self {
        PropagationParams {
            gravitational_constant: DEFAULT_GRAVITATIONAL_CONSTANT,
            soi_cooldown: DEFAULT_SOI_COOLDOWN,

            kepler_max_iter: DEFAULT_KEPLER_MAX_ITER,
            kepler_tolerance: DEFAULT_KEPLER_TOLERANCE,

            asymptote_speed_margin: DEFAULT_ASYMPTOTE_SPEED_MARGIN,
            asymptote_divergence: DEFAULT_ASYMPTOTE_DIVERGENCE,

            universal_max_iter: DEFAULT_UNIVERSAL_MAX_ITER,
            universal_tolerance: DEFAULT_UNIVERSAL_TOLERANCE,
        }
    }
}

/// Fluent builder for [`PropagationParams`].
#[derive(Debug, Clone)]
pub struct PropagationParamsBuilder {
    params: PropagationParams,
}

impl Default for PropagationParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PropagationParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: PropagationParams::default(),
        }
    }

    pub fn gravitational_constant(mut self, v: f64) -> Self {
        self.params.gravitational_constant = v;
        self
    }
    pub fn soi_cooldown(mut self, v: f64) -> Self {
        self.params.soi_cooldown = v;
        self
    }

    // --- Kepler solver ---
    pub fn kepler_max_iter(mut self, v: usize) -> Self {
        self.params.kepler_max_iter = v;
        self
    }
    pub fn kepler_tolerance(mut self, v: f64) -> Self {
        self.params.kepler_tolerance = v;
        self
    }

    // --- Asymptote coast ---
    pub fn asymptote_speed_margin(mut self, v: f64) -> Self {
        self.params.asymptote_speed_margin = v;
        self
    }
    pub fn asymptote_divergence(mut self, v: f64) -> Self {
        self.params.asymptote_divergence = v;
        self
    }

    // --- Universal variable solver ---
    pub fn universal_max_iter(mut self, v: usize) -> Self {
        self.params.universal_max_iter = v;
        self
    }
    pub fn universal_tolerance(mut self, v: f64) -> Self {
        self.params.universal_tolerance = v;
        self
    }

    /// Finalize the builder and produce a [`PropagationParams`] instance.
    ///
    /// Validation rules
    /// -----------------
    /// * `gravitational_constant > 0`
    /// * `soi_cooldown >= 0` (zero disables the debounce)
    /// * `kepler_max_iter >= 1`, `kepler_tolerance > 0`
    /// * `asymptote_speed_margin >= 0`, `asymptote_divergence > 0`
    /// * `universal_max_iter >= 1`, `universal_tolerance > 0`
    ///
    /// All values must also be finite.
    ///
    /// Returns
    /// -----------------
    /// * `Ok(PropagationParams)` if all values are valid.
    /// * `Err(ConicError::InvalidPropagationParameter)` naming the first failing rule.
    pub fn build(self) -> Result<PropagationParams, ConicError> {
        self.params.validate()?;
        Ok(self.params)
    }
}

impl fmt::Display for PropagationParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            const PARAM_COL: usize = 44;
            writeln!(f, "Propagation Parameters")?;
            writeln!(f, "----------------------")?;

            macro_rules! line {
                ($fmt:expr, $val:expr, $comment:expr) => {{
                    let s = format!($fmt, $val);
                    let pad = if s.len() < PARAM_COL {
                        " ".repeat(PARAM_COL - s.len())
                    } else {
                        " ".to_string()
                    };
                    writeln!(f, "  {}{}# {}", s, pad, $comment)
                }};
            }

            writeln!(f, "[Physics]")?;
            line!(
                "gravitational_constant = {:.6e}",
                self.gravitational_constant,
                "G, mu = G * M"
            )?;
            line!(
                "soi_cooldown           = {:.3} s",
                self.soi_cooldown,
                "Debounce after an SOI transition"
            )?;

            writeln!(f, "\n[Kepler solver]")?;
            line!(
                "kepler_max_iter        = {}",
                self.kepler_max_iter,
                "Newton–Raphson iteration cap"
            )?;
            line!(
                "kepler_tolerance       = {:.1e}",
                self.kepler_tolerance,
                "Early exit on |ΔE|"
            )?;

            writeln!(f, "\n[Hyperbolic asymptote]")?;
            line!(
                "asymptote_speed_margin = {:.3}",
                self.asymptote_speed_margin,
                "Arms the test when |v - v∞| is below"
            )?;
            line!(
                "asymptote_divergence   = {:.3}",
                self.asymptote_divergence,
                "Relative velocity mismatch to coast"
            )?;

            writeln!(f, "\n[Universal variable solver]")?;
            line!(
                "universal_max_iter     = {}",
                self.universal_max_iter,
                "Newton–Raphson iteration cap"
            )?;
            write!(
                f,
                "  universal_tolerance    = {:.1e}",
                self.universal_tolerance
            )
        } else {
            write!(
                f,
                "PropagationParams(G={:e}, soi_cooldown={:.2}s, kepler={}it/{:.0e}, asymptote=({:.2}, {:.2}), universal={}it/{:.0e})",
                self.gravitational_constant,
                self.soi_cooldown,
                self.kepler_max_iter,
                self.kepler_tolerance,
                self.asymptote_speed_margin,
                self.asymptote_divergence,
                self.universal_max_iter,
                self.universal_tolerance,
            )
        }
    }
}

#[cfg(test)]
mod params_test {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let params = PropagationParams::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.gravitational_constant, 1.0);
        assert_eq!(params.soi_cooldown, 0.2);
        assert_eq!(params.kepler_max_iter, 6);
        assert_eq!(params.kepler_tolerance, 1e-6);
        assert_eq!(params.asymptote_speed_margin, 1.5);
        assert_eq!(params.asymptote_divergence, 0.02);
        assert_eq!(PropagationParams::builder().build().unwrap(), params);
    }

    #[test]
    fn builder_overrides_fields() {
        let params = PropagationParams::builder()
            .gravitational_constant(2.0)
            .soi_cooldown(0.0)
            .kepler_max_iter(10)
            .kepler_tolerance(1e-9)
            .asymptote_speed_margin(0.5)
            .asymptote_divergence(0.1)
            .universal_max_iter(20)
            .universal_tolerance(1e-8)
            .build()
            .unwrap();

        assert_eq!(params.gravitational_constant, 2.0);
        assert_eq!(params.soi_cooldown, 0.0);
        assert_eq!(params.kepler_max_iter, 10);
        assert_eq!(params.universal_max_iter, 20);
    }

    #[test]
    fn builder_rejects_invalid_values() {
        let cases = [
            PropagationParams::builder().gravitational_constant(0.0),
            PropagationParams::builder().gravitational_constant(f64::NAN),
            PropagationParams::builder().soi_cooldown(-1.0),
            PropagationParams::builder().kepler_max_iter(0),
            PropagationParams::builder().kepler_tolerance(0.0),
            PropagationParams::builder().asymptote_speed_margin(-0.1),
            PropagationParams::builder().asymptote_divergence(0.0),
            PropagationParams::builder().universal_max_iter(0),
            PropagationParams::builder().universal_tolerance(f64::INFINITY),
        ];
        for builder in cases {
            assert!(matches!(
                builder.build(),
                Err(ConicError::InvalidPropagationParameter(_))
            ));
        }
    }

    #[test]
    fn display_formats() {
        let params = PropagationParams::default();
        let short = format!("{params}");
        assert!(short.starts_with("PropagationParams("));

        let table = format!("{params:#}");
        assert!(table.starts_with("Propagation Parameters"));
        assert!(table.contains("[Kepler solver]"));
        assert!(table.contains("soi_cooldown"));
    }
}
