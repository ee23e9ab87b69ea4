//! # Simulation context
//!
//! [`Simulation`] is the single entry point of the propagation core. It owns the
//! [`GravityTree`], every [`OrbitingBody`], the simulation clock and the registered listeners,
//! and is driven by a fixed-step [`Simulation::tick`].
//!
//! ## Tick
//!
//! 1. the gravity tree is updated depth-first from the root,
//! 2. every body consumes its pending external force (if any), is propagated in
//!    [`OrbitMode::Deterministic`] or [`OrbitMode::Iterative`] mode and checks for SOI
//!    transitions,
//! 3. transitions are forwarded to the listeners and returned to the caller.
//!
//! ## Example
//!
//! ```rust
//! use patched_conics::constants::Vec2;
//! use patched_conics::gravity_tree::SourceDefinition;
//! use patched_conics::orbiting_body::BodyDefinition;
//! use patched_conics::params::PropagationParams;
//! use patched_conics::simulation::Simulation;
//!
//! let mut sim =
//!     Simulation::new(SourceDefinition::new("star", 100.0, 1.0), PropagationParams::default())
//!         .unwrap();
//! let probe = sim
//!     .add_body(BodyDefinition::new("probe", 1.0), Vec2::new(10.0, 0.0), Vec2::new(0.0, 3.0))
//!     .unwrap();
//!
//! for _ in 0..100 {
//!     sim.tick(0.01).unwrap();
//! }
//! let position = sim.position(probe).unwrap();
//! assert!((position - Vec2::new(9.5029, 2.9500)).norm() < 1e-3);
//! ```
use log::{info, warn};

use crate::{
    conic_errors::ConicError,
    constants::{Seconds, Vec2},
    gravity_tree::{GravitySource, GravityTree, SourceDefinition, SourceId, SourceNode},
    orbit_type::OrbitalElements,
    orbiting_body::{BodyDefinition, BodyId, OrbitMode, OrbitingBody, SourceChange},
    params::PropagationParams,
    universal,
};

type SourceChangeListener = Box<dyn FnMut(&SourceChange)>;

pub struct Simulation {
    params: PropagationParams,
    tree: GravityTree,
    bodies: Vec<OrbitingBody>,
    time: Seconds,
    listeners: Vec<SourceChangeListener>,
}

impl Simulation {
    /// Create a simulation holding a single root source at rest at the origin.
    pub fn new(root: SourceDefinition, params: PropagationParams) -> Result<Self, ConicError> {
        params.validate()?;
        let tree = GravityTree::with_root(root, Vec2::zeros(), Vec2::zeros())?;
        Ok(Self::from_tree(tree, params))
    }

    /// Create a simulation from a full source hierarchy.
    ///
    /// The first node is the root and must not name a parent; see [`GravityTree::from_nodes`]
    /// for the other rules. Nothing is built if any node is rejected.
    pub fn initialize_system(
        nodes: &[SourceNode],
        params: PropagationParams,
    ) -> Result<Self, ConicError> {
        params.validate()?;
        let tree = GravityTree::from_nodes(nodes, &params)?;
        Ok(Self::from_tree(tree, params))
    }

    fn from_tree(tree: GravityTree, params: PropagationParams) -> Self {
        info!(
            "patched conic system initialized: {} gravity source(s), root '{}'",
            tree.len(),
            tree.get(tree.root()).map(GravitySource::name).unwrap_or_default()
        );
        Simulation {
            params,
            tree,
            bodies: Vec::new(),
            time: 0.0,
            listeners: Vec::new(),
        }
    }

    pub fn params(&self) -> &PropagationParams {
        &self.params
    }

    pub fn tree(&self) -> &GravityTree {
        &self.tree
    }

    /// Simulated time elapsed since creation.
    pub fn time(&self) -> Seconds {
        self.time
    }

    /// Attach a source orbiting `parent`, from a state relative to it.
    pub fn add_source(
        &mut self,
        parent: SourceId,
        definition: SourceDefinition,
        relative_position: Vec2,
        relative_velocity: Vec2,
    ) -> Result<SourceId, ConicError> {
        self.tree.add_child(
            parent,
            definition,
            relative_position,
            relative_velocity,
            &self.params,
        )
    }

    /// Attach a body from its world state.
    pub fn add_body(
        &mut self,
        definition: BodyDefinition,
        position: Vec2,
        velocity: Vec2,
    ) -> Result<BodyId, ConicError> {
        let body = OrbitingBody::new(definition, position, velocity, &self.tree, &self.params)?;
        info!(
            "body '{}' added around '{}'",
            body.name(),
            self.tree.get(body.dominant_source())?.name()
        );
        self.bodies.push(body);
        Ok(BodyId(self.bodies.len() - 1))
    }

    pub fn body(&self, id: BodyId) -> Result<&OrbitingBody, ConicError> {
        self.bodies.get(id.0).ok_or(ConicError::UnknownBody(id.0))
    }

    pub fn source(&self, id: SourceId) -> Result<&GravitySource, ConicError> {
        self.tree.get(id)
    }

    pub fn find_body(&self, name: &str) -> Option<BodyId> {
        self.bodies
            .iter()
            .position(|body| body.name() == name)
            .map(BodyId)
    }

    pub fn find_source(&self, name: &str) -> Option<SourceId> {
        self.tree.find_by_name(name)
    }

    pub fn bodies(&self) -> impl Iterator<Item = (BodyId, &OrbitingBody)> {
        self.bodies
            .iter()
            .enumerate()
            .map(|(index, body)| (BodyId(index), body))
    }

    /// Register a listener called for every dominant-source change.
    pub fn on_dominant_source_changed<F>(&mut self, listener: F)
    where
        F: FnMut(&SourceChange) + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Queue an external force on a body for the next tick only.
    ///
    /// Forces added before the same tick are summed. A body with a pending force is propagated
    /// in [`OrbitMode::Iterative`] mode during that tick.
    pub fn add_external_force(&mut self, body: BodyId, force: Vec2) -> Result<(), ConicError> {
        if !force.iter().all(|c| c.is_finite()) {
            return Err(ConicError::InvalidVector(format!("force = ({}, {})", force.x, force.y)));
        }
        self.bodies
            .get_mut(body.0)
            .ok_or(ConicError::UnknownBody(body.0))?
            .add_external_force(force);
        Ok(())
    }

    /// Advance the whole system by `dt` simulated seconds.
    ///
    /// Return
    /// ----------
    /// * The dominant-source changes that happened during the tick, in body order. A zero `dt`
    ///   is a no-op; a negative or non-finite `dt` is rejected with
    ///   [`ConicError::InvalidTimeStep`] before anything moves.
    ///
    /// A body whose propagation fails (for instance a force that drives its state to infinity)
    /// drops its force and keeps its relative state for the tick, riding along with its source.
    /// The other bodies and the listeners are unaffected.
    pub fn tick(&mut self, dt: Seconds) -> Result<Vec<SourceChange>, ConicError> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(ConicError::InvalidTimeStep(dt));
        }
        if dt == 0.0 {
            return Ok(Vec::new());
        }

        self.time += dt;
        self.tree.update(dt, &self.params);

        let mut changes = Vec::new();
        for (index, body) in self.bodies.iter_mut().enumerate() {
            match body.step(BodyId(index), dt, self.time, &self.tree, &self.params) {
                Ok(Some(change)) => changes.push(change),
                Ok(None) => {}
                Err(err) => {
                    warn!("body '{}' keeps its orbit for this tick: {err}", body.name());
                    body.follow_source(&self.tree);
                }
            }
        }

        for change in &changes {
            for listener in self.listeners.iter_mut() {
                listener(change);
            }
        }
        Ok(changes)
    }

    /// World position of a body.
    pub fn position(&self, body: BodyId) -> Result<Vec2, ConicError> {
        Ok(self.body(body)?.position())
    }

    /// World velocity of a body.
    pub fn velocity(&self, body: BodyId) -> Result<Vec2, ConicError> {
        Ok(self.body(body)?.velocity())
    }

    /// Current elements of a body relative to its dominant source.
    pub fn elements(&self, body: BodyId) -> Result<&OrbitalElements, ConicError> {
        Ok(self.body(body)?.elements())
    }

    pub fn mode(&self, body: BodyId) -> Result<OrbitMode, ConicError> {
        Ok(self.body(body)?.mode())
    }

    pub fn dominant_source(&self, body: BodyId) -> Result<SourceId, ConicError> {
        Ok(self.body(body)?.dominant_source())
    }

    /// Distance from a body to the centre of its dominant source, `+∞` for an unknown body.
    pub fn source_distance(&self, body: BodyId) -> f64 {
        self.body(body)
            .map(|body| body.relative_position().norm())
            .unwrap_or(f64::INFINITY)
    }

    /// World position of a source `dt` seconds from now.
    ///
    /// Each level of the hierarchy is propagated with the universal-variable solver relative to
    /// its parent's own prediction; the root extrapolates linearly.
    pub fn predict_position(&self, source: SourceId, dt: Seconds) -> Result<Vec2, ConicError> {
        Ok(self.predict_source_state(source, dt)?.0)
    }

    fn predict_source_state(
        &self,
        source: SourceId,
        dt: Seconds,
    ) -> Result<(Vec2, Vec2), ConicError> {
        let node = self.tree.get(source)?;
        let Some(parent) = node.parent() else {
            return Ok((node.position() + node.velocity() * dt, node.velocity()));
        };

        let (parent_position, parent_velocity) = self.predict_source_state(parent, dt)?;
        let (position, velocity) = universal::propagate(
            &node.relative_position(),
            &node.relative_velocity(),
            dt,
            self.tree.get(parent)?.mu(&self.params),
            &self.params,
        )?;
        Ok((parent_position + position, parent_velocity + velocity))
    }

    /// World position of a body `dt` seconds from now, assuming no force and no SOI change.
    pub fn predict_body_position(&self, body: BodyId, dt: Seconds) -> Result<Vec2, ConicError> {
        let body = self.body(body)?;
        let source = body.dominant_source();
        let (source_position, _) = self.predict_source_state(source, dt)?;
        let (position, _) = universal::propagate(
            &body.relative_position(),
            &body.relative_velocity(),
            dt,
            self.tree.get(source)?.mu(&self.params),
            &self.params,
        )?;
        Ok(source_position + position)
    }

    /// Time for a body to reach the direction of a world position, seen from its dominant source.
    ///
    /// Combined with [`Simulation::predict_body_position`] this answers "where will body B be
    /// when body A reaches this point". Returns `+∞` when a hyperbolic body never gets there and a
    /// negative time when it already passed that direction.
    pub fn time_of_flight(&self, body: BodyId, target: Vec2) -> Result<f64, ConicError> {
        let body = self.body(body)?;
        let source = self.tree.get(body.dominant_source())?;
        Ok(universal::time_of_flight(
            &body.relative_position(),
            &body.relative_velocity(),
            &(target - source.position()),
            &body.elements().eccentricity_vector(),
            source.mu(&self.params),
        ))
    }
}
