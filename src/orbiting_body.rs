//! # Orbiting bodies
//!
//! An [`OrbitingBody`] is a test mass (a ship, a probe, a small asteroid) moving under the
//! gravity of exactly one source of a [`GravityTree`] at a time. Each tick it is driven by a
//! two-state machine:
//!
//! | mode                         | entered when                              | propagation            |
//! |------------------------------|-------------------------------------------|------------------------|
//! | [`OrbitMode::Deterministic`] | a tick passes without external force      | analytic Kepler        |
//! | [`OrbitMode::Iterative`]     | an external force is pending for the tick | velocity Verlet + `F/m`|
//!
//! Iterative mode is not sticky: forces must be applied again every tick. When a body falls
//! back to deterministic mode its elements are re-derived from its current relative state and
//! the orbit epoch is reset before analytic propagation resumes.
//!
//! After propagation, unless the transition cooldown is running, the body checks whether it
//! left its source's sphere of influence (switching to the parent), entered a deeper one (a
//! child of its source) or a sibling's one. A transition re-initializes the orbit against the
//! new source and is reported as a [`SourceChange`].
use log::{debug, warn};

use crate::{
    conic_errors::ConicError,
    constants::{Seconds, Vec2},
    gravity_tree::{GravityTree, SourceId},
    integrator::step_with_thrust,
    kepler::{self, asymptote_reached},
    orbit_type::{compute_elements, OrbitalElements},
    params::PropagationParams,
};

/// Index of a body inside its [`Simulation`](crate::simulation::Simulation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub(crate) usize);

impl BodyId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Propagation mode of a body for the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrbitMode {
    /// Analytic two-body propagation from the stored elements.
    Deterministic,
    /// Numerical integration of source gravity plus an external force.
    Iterative,
}

/// Physical description of an orbiting body.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDefinition {
    pub name: String,
    pub mass: f64,
}

impl BodyDefinition {
    pub fn new(name: impl Into<String>, mass: f64) -> Self {
        BodyDefinition {
            name: name.into(),
            mass,
        }
    }
}

/// Notification emitted when a body switches dominant source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceChange {
    pub body: BodyId,
    pub previous: SourceId,
    pub current: SourceId,
    /// Simulation time at which the transition happened.
    pub time: Seconds,
}

/// Outcome of one propagation, applied to the body only when it is valid.
struct Propagation {
    mode: OrbitMode,
    /// Replacement elements when the orbit was re-derived during the step.
    elements: Option<OrbitalElements>,
    time_since_epoch: Seconds,
    relative_position: Vec2,
    relative_velocity: Vec2,
    coasting: bool,
}

#[derive(Debug, Clone)]
pub struct OrbitingBody {
    name: String,
    mass: f64,
    dominant_source: SourceId,
    mode: OrbitMode,
    elements: OrbitalElements,
    time_since_epoch: Seconds,

    position: Vec2,
    velocity: Vec2,
    relative_position: Vec2,
    relative_velocity: Vec2,

    cooldown_until: Seconds,
    coasting: bool,
    pending_force: Option<Vec2>,
}

impl OrbitingBody {
    /// Attach a body to a tree from its world state.
    ///
    /// The dominant source is the innermost source whose SOI contains `position`, searched from
    /// the root, and the elements are computed once against it.
    pub fn new(
        definition: BodyDefinition,
        position: Vec2,
        velocity: Vec2,
        tree: &GravityTree,
        params: &PropagationParams,
    ) -> Result<Self, ConicError> {
        if !(definition.mass > 0.0 && definition.mass.is_finite()) {
            return Err(ConicError::NonPositiveMass(definition.mass));
        }

        let dominant_source = tree.dominant_source_at(tree.root(), &position, false);
        let source = tree.get(dominant_source)?;
        let relative_position = position - source.position();
        let relative_velocity = velocity - source.velocity();
        let elements = compute_elements(
            &relative_position,
            &relative_velocity,
            source.mass(),
            params.gravitational_constant,
        )?;

        Ok(OrbitingBody {
            name: definition.name,
            mass: definition.mass,
            dominant_source,
            mode: OrbitMode::Deterministic,
            elements,
            time_since_epoch: 0.0,
            position,
            velocity,
            relative_position,
            relative_velocity,
            cooldown_until: f64::NEG_INFINITY,
            coasting: false,
            pending_force: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn dominant_source(&self) -> SourceId {
        self.dominant_source
    }

    pub fn mode(&self) -> OrbitMode {
        self.mode
    }

    pub fn elements(&self) -> &OrbitalElements {
        &self.elements
    }

    pub fn time_since_epoch(&self) -> Seconds {
        self.time_since_epoch
    }

    /// World position.
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// World velocity.
    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn relative_position(&self) -> Vec2 {
        self.relative_position
    }

    pub fn relative_velocity(&self) -> Vec2 {
        self.relative_velocity
    }

    /// Whether the body stopped solving Kepler's equation and coasts on its asymptote.
    pub fn is_coasting(&self) -> bool {
        self.coasting
    }

    /// Simulation time until which SOI transitions are ignored.
    pub fn cooldown_until(&self) -> Seconds {
        self.cooldown_until
    }

    /// Accumulate an external force for the next tick only.
    pub fn add_external_force(&mut self, force: Vec2) {
        *self.pending_force.get_or_insert_with(Vec2::zeros) += force;
    }

    /// Advance the body by one tick.
    ///
    /// `now` is the simulation time at the end of the tick; the tree must already be updated to
    /// it. Returns the source transition, if any.
    ///
    /// The step is all-or-nothing: when it fails the pending force is discarded and every other
    /// field keeps its value from before the call.
    pub fn step(
        &mut self,
        id: BodyId,
        dt: Seconds,
        now: Seconds,
        tree: &GravityTree,
        params: &PropagationParams,
    ) -> Result<Option<SourceChange>, ConicError> {
        let source = tree.get(self.dominant_source)?;
        let mu = source.mu(params);

        let propagation = match self.pending_force.take() {
            Some(force) => self.propagate_iterative(force, dt, mu)?,
            None => self.propagate_deterministic(dt, mu, params)?,
        };
        self.commit(propagation);

        self.position = source.position() + self.relative_position;
        self.velocity = source.velocity() + self.relative_velocity;

        if now < self.cooldown_until {
            return Ok(None);
        }
        let candidate = self.find_dominant_source(tree)?;
        if candidate == self.dominant_source {
            return Ok(None);
        }
        self.change_source(id, candidate, now, tree, params).map(Some)
    }

    /// Keep the relative state and move with the dominant source.
    ///
    /// Used for a body whose [`OrbitingBody::step`] failed, so that its world state still follows
    /// the updated tree.
    pub(crate) fn follow_source(&mut self, tree: &GravityTree) {
        if let Ok(source) = tree.get(self.dominant_source) {
            self.position = source.position() + self.relative_position;
            self.velocity = source.velocity() + self.relative_velocity;
        }
    }

    fn propagate_iterative(
        &self,
        force: Vec2,
        dt: Seconds,
        mu: f64,
    ) -> Result<Propagation, ConicError> {
        let (position, velocity) = step_with_thrust(
            &self.relative_position,
            &self.relative_velocity,
            dt,
            mu,
            &(force / self.mass),
        );
        let elements = OrbitalElements::from_state(&position, &velocity, mu)?;

        Ok(Propagation {
            mode: OrbitMode::Iterative,
            elements: Some(elements),
            time_since_epoch: 0.0,
            relative_position: position,
            relative_velocity: velocity,
            coasting: false,
        })
    }

    fn propagate_deterministic(
        &self,
        dt: Seconds,
        mu: f64,
        params: &PropagationParams,
    ) -> Result<Propagation, ConicError> {
        // leaving iterative mode: the orbit restarts from the current state
        let rebased = match self.mode {
            OrbitMode::Iterative => Some(OrbitalElements::from_state(
                &self.relative_position,
                &self.relative_velocity,
                mu,
            )?),
            OrbitMode::Deterministic => None,
        };
        let (elements, time_since_epoch) = match &rebased {
            Some(elements) => (elements, dt),
            None => (&self.elements, self.time_since_epoch + dt),
        };

        let coast = (
            self.relative_position + self.relative_velocity * dt,
            self.relative_velocity,
            true,
        );
        let (relative_position, relative_velocity, coasting) = if self.coasting {
            coast
        } else {
            let state = kepler::advance(elements, time_since_epoch, params);
            let finite_difference_velocity = (state.position - self.relative_position) / dt;
            if asymptote_reached(elements, &state, &finite_difference_velocity, params) {
                warn!(
                    "body '{}' reached its hyperbolic asymptote, coasting at {:.6}",
                    self.name,
                    self.relative_velocity.norm()
                );
                coast
            } else {
                (state.position, state.velocity, false)
            }
        };

        if !relative_position.iter().chain(relative_velocity.iter()).all(|c| c.is_finite()) {
            return Err(ConicError::InvalidVector(format!(
                "r = ({}, {}), v = ({}, {})",
                relative_position.x, relative_position.y, relative_velocity.x, relative_velocity.y
            )));
        }

        Ok(Propagation {
            mode: OrbitMode::Deterministic,
            elements: rebased,
            time_since_epoch,
            relative_position,
            relative_velocity,
            coasting,
        })
    }

    fn commit(&mut self, propagation: Propagation) {
        if propagation.mode != self.mode {
            debug!(
                "body '{}' switches to {} propagation",
                self.name,
                match propagation.mode {
                    OrbitMode::Deterministic => "deterministic",
                    OrbitMode::Iterative => "iterative",
                }
            );
        }
        self.mode = propagation.mode;
        if let Some(elements) = propagation.elements {
            self.elements = elements;
        }
        self.time_since_epoch = propagation.time_since_epoch;
        self.relative_position = propagation.relative_position;
        self.relative_velocity = propagation.relative_velocity;
        self.coasting = propagation.coasting;
    }

    /// Source that should govern the body at its current world position.
    fn find_dominant_source(&self, tree: &GravityTree) -> Result<SourceId, ConicError> {
        let current = tree.get(self.dominant_source)?;

        if self.relative_position.norm() >= current.soi_radius() {
            if let Some(parent) = current.parent() {
                return Ok(parent);
            }
        }

        let deeper = tree.dominant_source_at(self.dominant_source, &self.position, false);
        if deeper != self.dominant_source {
            return Ok(deeper);
        }

        if let Some(parent) = current.parent() {
            let sibling = tree.dominant_source_at(parent, &self.position, true);
            if sibling != parent {
                return Ok(sibling);
            }
        }
        Ok(self.dominant_source)
    }

    fn change_source(
        &mut self,
        id: BodyId,
        new_source: SourceId,
        now: Seconds,
        tree: &GravityTree,
        params: &PropagationParams,
    ) -> Result<SourceChange, ConicError> {
        let source = tree.get(new_source)?;
        let relative_position = self.position - source.position();
        let relative_velocity = self.velocity - source.velocity();
        let elements = compute_elements(
            &relative_position,
            &relative_velocity,
            source.mass(),
            params.gravitational_constant,
        )?;

        let previous = self.dominant_source;
        debug!(
            "body '{}' changes dominant source {} -> {} at t = {now:.3}",
            self.name,
            tree.get(previous)?.name(),
            source.name()
        );

        self.dominant_source = new_source;
        self.relative_position = relative_position;
        self.relative_velocity = relative_velocity;
        self.elements = elements;
        self.time_since_epoch = 0.0;
        self.cooldown_until = now + params.soi_cooldown;
        self.coasting = false;

        Ok(SourceChange {
            body: id,
            previous,
            current: new_source,
            time: now,
        })
    }
}
