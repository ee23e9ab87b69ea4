//! # Gravity source hierarchy
//!
//! A [`GravityTree`] owns every gravity source of a system (a star, its planets, their moons)
//! in an arena indexed by [`SourceId`]. Each source but the root follows a deterministic Kepler
//! orbit around its parent and carries a sphere of influence (SOI) of radius
//!
//! ```text
//! r_soi = |a| · (m / M)^(2/5)
//! ```
//!
//! where `a` is the semi-major axis of its orbit, `m` its mass and `M` the parent's mass. The root
//! has an infinite SOI and moves in a straight line.
//!
//! ## Structure
//!
//! - Exactly one root, always [`GravityTree::root`], created by [`GravityTree::with_root`].
//! - Children are appended with [`GravityTree::add_child`] and never removed; a parent is always
//!   inserted before its children.
//! - Each source keeps its ordered children, so dominance queries are deterministic.
//!
//! ## Update order
//!
//! [`GravityTree::update`] walks the tree depth-first from the root, so a source is always moved
//! after its parent and reads the parent's state of the current tick.
use log::debug;

use crate::{
    conic_errors::ConicError,
    constants::{Seconds, Vec2, SOI_MASS_EXPONENT},
    kepler,
    orbit_type::{compute_elements, OrbitalElements},
    params::PropagationParams,
};

/// Index of a gravity source inside its [`GravityTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub(crate) usize);

impl SourceId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Physical description of a gravity source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDefinition {
    pub name: String,
    pub mass: f64,
    /// Physical radius of the body.
    pub radius: f64,
}

impl SourceDefinition {
    pub fn new(name: impl Into<String>, mass: f64, radius: f64) -> Self {
        SourceDefinition {
            name: name.into(),
            mass,
            radius,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConicError> {
        if !(self.mass > 0.0 && self.mass.is_finite()) {
            return Err(ConicError::NonPositiveMass(self.mass));
        }
        if !(self.radius > 0.0 && self.radius.is_finite()) {
            return Err(ConicError::NonPositiveRadius(self.name.clone()));
        }
        Ok(())
    }
}

/// A source declared by name, as found in a system description.
///
/// The first node of a system is the root: its state is absolute and it must not name a parent.
/// Every other node names an already declared parent and gives its state relative to it.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceNode {
    pub definition: SourceDefinition,
    pub parent: Option<String>,
    pub position: Vec2,
    pub velocity: Vec2,
}

/// A node of the gravity tree.
#[derive(Debug, Clone)]
pub struct GravitySource {
    name: String,
    mass: f64,
    radius: f64,
    soi_radius: f64,
    rank: usize,
    parent: Option<SourceId>,
    children: Vec<SourceId>,

    position: Vec2,
    velocity: Vec2,
    relative_position: Vec2,
    relative_velocity: Vec2,
    elements: Option<OrbitalElements>,
    time_since_epoch: Seconds,
}

impl GravitySource {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Sphere-of-influence radius, `+∞` for the root.
    pub fn soi_radius(&self) -> f64 {
        self.soi_radius
    }

    /// Depth in the tree, the root has rank 0.
    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn parent(&self) -> Option<SourceId> {
        self.parent
    }

    pub fn children(&self) -> &[SourceId] {
        &self.children
    }

    /// World position.
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// World velocity.
    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    /// Position relative to the parent (zero for the root).
    pub fn relative_position(&self) -> Vec2 {
        self.relative_position
    }

    pub fn relative_velocity(&self) -> Vec2 {
        self.relative_velocity
    }

    /// Orbit around the parent, `None` for the root.
    pub fn elements(&self) -> Option<&OrbitalElements> {
        self.elements.as_ref()
    }

    /// Gravitational parameter `G·M` of this source.
    pub fn mu(&self, params: &PropagationParams) -> f64 {
        params.gravitational_constant * self.mass
    }

    fn contains(&self, position: &Vec2) -> bool {
        (position - self.position).norm_squared() < self.soi_radius * self.soi_radius
    }
}

fn check_finite_state(position: &Vec2, velocity: &Vec2) -> Result<(), ConicError> {
    if position.iter().chain(velocity.iter()).all(|c| c.is_finite()) {
        Ok(())
    } else {
        Err(ConicError::InvalidVector(format!(
            "r = ({}, {}), v = ({}, {})",
            position.x, position.y, velocity.x, velocity.y
        )))
    }
}

/// Arena of gravity sources rooted at [`GravityTree::root`].
#[derive(Debug, Clone)]
pub struct GravityTree {
    sources: Vec<GravitySource>,
}

impl GravityTree {
    /// Create a tree holding only its root source.
    pub fn with_root(
        definition: SourceDefinition,
        position: Vec2,
        velocity: Vec2,
    ) -> Result<Self, ConicError> {
        definition.validate()?;
        check_finite_state(&position, &velocity)?;
        Ok(GravityTree {
            sources: vec![GravitySource {
                name: definition.name,
                mass: definition.mass,
                radius: definition.radius,
                soi_radius: f64::INFINITY,
                rank: 0,
                parent: None,
                children: Vec::new(),
                position,
                velocity,
                relative_position: Vec2::zeros(),
                relative_velocity: Vec2::zeros(),
                elements: None,
                time_since_epoch: 0.0,
            }],
        })
    }

    /// Build a tree from a list of named nodes.
    ///
    /// Errors
    /// ------
    /// * [`ConicError::NoRootSource`] if `nodes` is empty.
    /// * [`ConicError::RootHasParent`] if the first node names a parent.
    /// * [`ConicError::UnknownParent`] if a node names a parent not declared before it.
    /// * [`ConicError::DuplicateSourceName`], [`ConicError::NonPositiveMass`],
    ///   [`ConicError::NonPositiveRadius`] for invalid definitions.
    pub fn from_nodes(
        nodes: &[SourceNode],
        params: &PropagationParams,
    ) -> Result<Self, ConicError> {
        let (root, children) = nodes.split_first().ok_or(ConicError::NoRootSource)?;
        if root.parent.is_some() {
            return Err(ConicError::RootHasParent(root.definition.name.clone()));
        }

        let mut tree =
            GravityTree::with_root(root.definition.clone(), root.position, root.velocity)?;
        for node in children {
            let parent_name = node.parent.as_deref().unwrap_or_default();
            let parent = tree
                .find_by_name(parent_name)
                .ok_or_else(|| ConicError::UnknownParent {
                    source_name: node.definition.name.clone(),
                    parent: parent_name.to_string(),
                })?;
            tree.add_child(
                parent,
                node.definition.clone(),
                node.position,
                node.velocity,
                params,
            )?;
        }
        Ok(tree)
    }

    pub fn root(&self) -> SourceId {
        SourceId(0)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn get(&self, id: SourceId) -> Result<&GravitySource, ConicError> {
        self.sources.get(id.0).ok_or(ConicError::UnknownSource(id.0))
    }

    pub fn find_by_name(&self, name: &str) -> Option<SourceId> {
        self.sources
            .iter()
            .position(|source| source.name == name)
            .map(SourceId)
    }

    /// Iterate over `(id, source)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (SourceId, &GravitySource)> {
        self.sources
            .iter()
            .enumerate()
            .map(|(index, source)| (SourceId(index), source))
    }

    /// Attach a new source orbiting `parent`.
    ///
    /// Arguments
    /// -----------------
    /// * `parent`: existing source the new one orbits.
    /// * `definition`: name, mass and radius; the name must be unique in the tree.
    /// * `relative_position`, `relative_velocity`: initial state relative to the parent.
    /// * `params`: provides the gravitational constant.
    ///
    /// Return
    /// ----------
    /// * The id of the new source. Its orbit around the parent, world state, rank and SOI radius
    ///   are computed immediately.
    pub fn add_child(
        &mut self,
        parent: SourceId,
        definition: SourceDefinition,
        relative_position: Vec2,
        relative_velocity: Vec2,
        params: &PropagationParams,
    ) -> Result<SourceId, ConicError> {
        definition.validate()?;
        if self.find_by_name(&definition.name).is_some() {
            return Err(ConicError::DuplicateSourceName(definition.name));
        }
        let (rank, parent_position, parent_velocity) = {
            let parent_source = self.get(parent)?;
            (parent_source.rank + 1, parent_source.position, parent_source.velocity)
        };

        let id = SourceId(self.sources.len());
        self.sources.push(GravitySource {
            name: definition.name,
            mass: definition.mass,
            radius: definition.radius,
            soi_radius: 0.0,
            rank,
            parent: Some(parent),
            children: Vec::new(),
            position: parent_position,
            velocity: parent_velocity,
            relative_position: Vec2::zeros(),
            relative_velocity: Vec2::zeros(),
            elements: None,
            time_since_epoch: 0.0,
        });

        if let Err(err) =
            self.set_relative_state(id, relative_position, relative_velocity, params)
        {
            self.sources.pop();
            return Err(err);
        }
        self.sources[parent.0].children.push(id);

        debug!(
            "gravity source '{}' attached to '{}' (rank {rank}, soi radius {:.6})",
            self.sources[id.0].name, self.sources[parent.0].name, self.sources[id.0].soi_radius
        );
        Ok(id)
    }

    /// Re-initialize the orbit of a non-root source from a state relative to its parent.
    ///
    /// Elements, SOI radius and world state are refreshed, the orbit epoch is reset and every
    /// descendant is placed again relative to its moved parent. Setting the state of the root
    /// moves it to `relative_position` with `relative_velocity`.
    pub(crate) fn set_relative_state(
        &mut self,
        id: SourceId,
        relative_position: Vec2,
        relative_velocity: Vec2,
        params: &PropagationParams,
    ) -> Result<(), ConicError> {
        let (parent, mass) = {
            let source = self.get(id)?;
            (source.parent, source.mass)
        };
        let Some(parent) = parent else {
            check_finite_state(&relative_position, &relative_velocity)?;
            let root = &mut self.sources[id.0];
            root.position = relative_position;
            root.velocity = relative_velocity;
            self.place_descendants(id);
            return Ok(());
        };

        let (parent_mass, parent_position, parent_velocity) = {
            let parent_source = self.get(parent)?;
            (parent_source.mass, parent_source.position, parent_source.velocity)
        };
        let elements = compute_elements(
            &relative_position,
            &relative_velocity,
            parent_mass,
            params.gravitational_constant,
        )?;
        let soi_radius =
            elements.semi_major_axis().abs() * (mass / parent_mass).powf(SOI_MASS_EXPONENT);

        let source = &mut self.sources[id.0];
        source.soi_radius = soi_radius;
        source.elements = Some(elements);
        source.time_since_epoch = 0.0;
        source.relative_position = relative_position;
        source.relative_velocity = relative_velocity;
        source.position = parent_position + relative_position;
        source.velocity = parent_velocity + relative_velocity;
        self.place_descendants(id);
        Ok(())
    }

    /// Put every descendant of `id` at its parent's world state plus its relative state.
    fn place_descendants(&mut self, id: SourceId) {
        let mut stack = self.sources[id.0].children.clone();
        while let Some(child) = stack.pop() {
            let Some(parent) = self.sources[child.0].parent else {
                continue;
            };
            let (parent_position, parent_velocity) = {
                let parent_source = &self.sources[parent.0];
                (parent_source.position, parent_source.velocity)
            };
            let source = &mut self.sources[child.0];
            source.position = parent_position + source.relative_position;
            source.velocity = parent_velocity + source.relative_velocity;
            stack.extend(source.children.iter().copied());
        }
    }

    /// Source ids in depth-first pre-order from the root, children in declaration order.
    pub fn depth_first_order(&self) -> Vec<SourceId> {
        let mut order = Vec::with_capacity(self.sources.len());
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.sources[id.0].children.iter().rev().copied());
        }
        order
    }

    /// Advance every source by `dt`.
    ///
    /// The root drifts with its velocity; every other source advances its Kepler orbit and is
    /// placed at its parent's (already updated) world state plus its relative state.
    pub fn update(&mut self, dt: Seconds, params: &PropagationParams) {
        for id in self.depth_first_order() {
            let Some(parent) = self.sources[id.0].parent else {
                let root = &mut self.sources[id.0];
                root.position += root.velocity * dt;
                continue;
            };
            let (parent_position, parent_velocity) = {
                let parent_source = &self.sources[parent.0];
                (parent_source.position, parent_source.velocity)
            };

            let source = &mut self.sources[id.0];
            source.time_since_epoch += dt;
            if let Some(elements) = &source.elements {
                let state = kepler::advance(elements, source.time_since_epoch, params);
                source.relative_position = state.position;
                source.relative_velocity = state.velocity;
            }
            source.position = parent_position + source.relative_position;
            source.velocity = parent_velocity + source.relative_velocity;
        }
    }

    /// Source whose sphere of influence governs `position`, searching below `from`.
    ///
    /// The children of `from` are scanned in order; the first one whose SOI strictly contains
    /// `position` is returned when `first_level_only` is set, or searched recursively otherwise.
    /// When no child contains the position, `from` itself is returned.
    pub fn dominant_source_at(
        &self,
        from: SourceId,
        position: &Vec2,
        first_level_only: bool,
    ) -> SourceId {
        let mut current = from;
        loop {
            let Some(source) = self.sources.get(current.0) else {
                return current;
            };
            let inner = source
                .children
                .iter()
                .copied()
                .find(|child| self.sources[child.0].contains(position));
            match inner {
                Some(child) if first_level_only => return child,
                Some(child) => current = child,
                None => return current,
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod gravity_tree_test {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    /// Sun (mass 1000) at the origin, a planet on a circular orbit of radius 100 and a moon on a
    /// circular orbit of radius 2 around the planet.
    pub(crate) fn star_planet_moon() -> (GravityTree, SourceId, SourceId, SourceId) {
        let params = PropagationParams::default();
        let mut tree = GravityTree::with_root(
            SourceDefinition::new("sun", 1000.0, 5.0),
            Vec2::zeros(),
            Vec2::zeros(),
        )
        .unwrap();
        let sun = tree.root();
        let planet = tree
            .add_child(
                sun,
                SourceDefinition::new("planet", 1.0, 0.5),
                Vec2::new(100.0, 0.0),
                Vec2::new(0.0, 10f64.sqrt()),
                &params,
            )
            .unwrap();
        let moon = tree
            .add_child(
                planet,
                SourceDefinition::new("moon", 0.01, 0.1),
                Vec2::new(2.0, 0.0),
                Vec2::new(0.0, 0.5f64.sqrt()),
                &params,
            )
            .unwrap();
        (tree, sun, planet, moon)
    }

    #[test]
    fn soi_radius_and_rank() {
        let (tree, sun, planet, moon) = star_planet_moon();

        assert_eq!(tree.get(sun).unwrap().soi_radius(), f64::INFINITY);
        assert_relative_eq!(
            tree.get(planet).unwrap().soi_radius(),
            100.0 * 0.001f64.powf(0.4),
            max_relative = 1e-9
        );
        assert_relative_eq!(
            tree.get(moon).unwrap().soi_radius(),
            2.0 * 0.01f64.powf(0.4),
            max_relative = 1e-9
        );
        assert_eq!(tree.get(sun).unwrap().rank(), 0);
        assert_eq!(tree.get(planet).unwrap().rank(), 1);
        assert_eq!(tree.get(moon).unwrap().rank(), 2);
        assert_eq!(tree.get(planet).unwrap().children(), &[moon]);
        assert_eq!(tree.get(moon).unwrap().parent(), Some(planet));
        assert_eq!(tree.get(moon).unwrap().position(), Vec2::new(102.0, 0.0));
    }

    #[test]
    fn dominant_source_returns_innermost_container() {
        let (tree, sun, planet, moon) = star_planet_moon();

        assert_eq!(tree.dominant_source_at(sun, &Vec2::new(50.0, 0.0), false), sun);
        assert_eq!(tree.dominant_source_at(sun, &Vec2::new(97.0, 0.0), false), planet);
        assert_eq!(tree.dominant_source_at(sun, &Vec2::new(102.1, 0.0), false), moon);
        assert_eq!(tree.dominant_source_at(sun, &Vec2::new(102.1, 0.0), true), planet);
        assert_eq!(tree.dominant_source_at(planet, &Vec2::new(102.1, 0.0), true), moon);
        assert_eq!(tree.dominant_source_at(moon, &Vec2::new(0.0, 0.0), false), moon);
    }

    #[test]
    fn dominant_source_always_contains_query() {
        let (tree, sun, _, _) = star_planet_moon();
        for i in 0..200 {
            let x = 90.0 + i as f64 * 0.1;
            for &y in &[-1.0, 0.0, 0.05, 3.0] {
                let p = Vec2::new(x, y);
                let found = tree.get(tree.dominant_source_at(sun, &p, false)).unwrap();
                assert!(found.soi_radius() == f64::INFINITY || found.contains(&p));
                // no child of the returned source contains the point
                for child in found.children() {
                    assert!(!tree.get(*child).unwrap().contains(&p));
                }
            }
        }
    }

    #[test]
    fn update_moves_children_after_parents() {
        let (mut tree, sun, planet, moon) = star_planet_moon();
        let params = PropagationParams::default();

        assert_eq!(tree.depth_first_order(), vec![sun, planet, moon]);

        let planet_period = tree.get(planet).unwrap().elements().unwrap().period();
        tree.update(planet_period / 4.0, &params);

        let planet_source = tree.get(planet).unwrap();
        assert_relative_eq!(planet_source.position(), Vec2::new(0.0, 100.0), epsilon = 1e-8);
        assert_abs_diff_eq!(planet_source.velocity().norm(), 10f64.sqrt(), epsilon = 1e-9);

        let moon_source = tree.get(moon).unwrap();
        assert_relative_eq!(
            moon_source.position(),
            planet_source.position() + moon_source.relative_position(),
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(moon_source.relative_position().norm(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn relative_state_reset_moves_the_subtree() {
        let (mut tree, sun, planet, moon) = star_planet_moon();
        let params = PropagationParams::default();

        tree.set_relative_state(
            planet,
            Vec2::new(0.0, 50.0),
            Vec2::new(-20f64.sqrt(), 0.0),
            &params,
        )
        .unwrap();
        assert_eq!(tree.get(planet).unwrap().position(), Vec2::new(0.0, 50.0));
        assert_relative_eq!(
            tree.get(planet).unwrap().soi_radius(),
            50.0 * 0.001f64.powf(0.4),
            max_relative = 1e-9
        );
        assert_eq!(tree.get(moon).unwrap().position(), Vec2::new(2.0, 50.0));
        assert_relative_eq!(
            tree.get(moon).unwrap().velocity(),
            Vec2::new(-20f64.sqrt(), 0.5f64.sqrt()),
            epsilon = 1e-15
        );

        tree.set_relative_state(sun, Vec2::new(10.0, 0.0), Vec2::zeros(), &params)
            .unwrap();
        assert_eq!(tree.get(moon).unwrap().position(), Vec2::new(12.0, 50.0));
        assert!(matches!(
            tree.set_relative_state(sun, Vec2::new(f64::NAN, 0.0), Vec2::zeros(), &params),
            Err(ConicError::InvalidVector(_))
        ));
        assert_eq!(tree.get(sun).unwrap().position(), Vec2::new(10.0, 0.0));
    }

    #[test]
    fn root_drifts_linearly() {
        let mut tree = GravityTree::with_root(
            SourceDefinition::new("sun", 1.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(2.0, -1.0),
        )
        .unwrap();
        tree.update(0.5, &PropagationParams::default());
        assert_eq!(tree.get(tree.root()).unwrap().position(), Vec2::new(2.0, 0.5));
    }

    #[test]
    fn invalid_definitions_are_rejected() {
        let params = PropagationParams::default();
        assert_eq!(
            GravityTree::with_root(
                SourceDefinition::new("sun", 0.0, 1.0),
                Vec2::zeros(),
                Vec2::zeros()
            )
            .unwrap_err(),
            ConicError::NonPositiveMass(0.0)
        );
        assert_eq!(
            GravityTree::with_root(
                SourceDefinition::new("sun", 1.0, -1.0),
                Vec2::zeros(),
                Vec2::zeros()
            )
            .unwrap_err(),
            ConicError::NonPositiveRadius("sun".into())
        );
        assert!(matches!(
            GravityTree::with_root(
                SourceDefinition::new("sun", 1.0, 1.0),
                Vec2::new(f64::INFINITY, 0.0),
                Vec2::zeros()
            ),
            Err(ConicError::InvalidVector(_))
        ));

        let (mut tree, sun, _, _) = star_planet_moon();
        assert_eq!(
            tree.add_child(
                sun,
                SourceDefinition::new("planet", 1.0, 1.0),
                Vec2::new(50.0, 0.0),
                Vec2::new(0.0, 4.0),
                &params
            ),
            Err(ConicError::DuplicateSourceName("planet".into()))
        );
        assert_eq!(
            tree.add_child(
                SourceId(42),
                SourceDefinition::new("comet", 1.0, 1.0),
                Vec2::new(50.0, 0.0),
                Vec2::new(0.0, 4.0),
                &params
            ),
            Err(ConicError::UnknownSource(42))
        );
        assert_eq!(
            tree.add_child(
                sun,
                SourceDefinition::new("comet", 1.0, 1.0),
                Vec2::zeros(),
                Vec2::new(0.0, 4.0),
                &params
            ),
            Err(ConicError::ZeroRelativePosition)
        );
        // failed insertions leave the tree untouched
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.get(sun).unwrap().children().len(), 1);
    }

    #[test]
    fn from_nodes_validates_hierarchy() {
        let params = PropagationParams::default();
        let node = |name: &str, parent: Option<&str>| SourceNode {
            definition: SourceDefinition::new(name, 10.0, 1.0),
            parent: parent.map(str::to_string),
            position: Vec2::new(30.0, 0.0),
            velocity: Vec2::new(0.0, 0.5),
        };

        assert_eq!(
            GravityTree::from_nodes(&[], &params).unwrap_err(),
            ConicError::NoRootSource
        );
        assert_eq!(
            GravityTree::from_nodes(&[node("sun", Some("galaxy"))], &params).unwrap_err(),
            ConicError::RootHasParent("sun".into())
        );
        assert_eq!(
            GravityTree::from_nodes(&[node("sun", None), node("moon", Some("planet"))], &params)
                .unwrap_err(),
            ConicError::UnknownParent {
                source_name: "moon".into(),
                parent: "planet".into()
            }
        );

        let tree = GravityTree::from_nodes(
            &[node("sun", None), node("planet", Some("sun")), node("moon", Some("planet"))],
            &params,
        )
        .unwrap();
        assert_eq!(tree.len(), 3);
        let moon = tree.find_by_name("moon").unwrap();
        assert_eq!(tree.get(moon).unwrap().rank(), 2);
        assert_eq!(tree.get(moon).unwrap().position(), Vec2::new(90.0, 0.0));
    }
}
