//! Scenario files for building a [`Simulation`] from YAML.
//!
//! A scenario lists the propagation parameters, the gravity sources (root first) and the
//! orbiting bodies:
//!
//! ```yaml
//! params:                       # optional, every field defaults
//!   gravitational_constant: 1.0
//!   soi_cooldown: 0.2
//!
//! sources:
//!   - name: sun                 # root: absolute state, no parent
//!     mass: 1000.0
//!     radius: 5.0
//!   - name: planet
//!     parent: sun               # must be declared above
//!     mass: 1.0
//!     radius: 0.5
//!     position: [100.0, 0.0]    # relative to the parent
//!     velocity: [0.0, 3.1622776601683795]
//!
//! bodies:
//!   - name: probe
//!     mass: 1.0
//!     position: [50.0, 0.0]     # world frame
//!     velocity: [0.0, 4.5]
//! ```
//!
//! Vectors are written as two-element sequences `[x, y]`; omitted source states default to zero.

use std::{fs::File, io::BufReader, path::Path};

use serde::Deserialize;

use crate::{
    conic_errors::ConicError,
    constants::Vec2,
    gravity_tree::{SourceDefinition, SourceNode},
    orbiting_body::BodyDefinition,
    params::PropagationParams,
    simulation::Simulation,
};

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct SourceConfig {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    pub mass: f64,
    pub radius: f64,
    #[serde(default)]
    pub position: [f64; 2],
    #[serde(default)]
    pub velocity: [f64; 2],
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct BodyConfig {
    pub name: String,
    pub mass: f64,
    pub position: [f64; 2],
    pub velocity: [f64; 2],
}

/// Top-level scenario document.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub params: PropagationParams,
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub bodies: Vec<BodyConfig>,
}

impl ScenarioConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConicError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConicError> {
        let file = File::open(path.as_ref()).map_err(|err| {
            ConicError::ScenarioIo(format!("{}: {err}", path.as_ref().display()))
        })?;
        Ok(serde_yaml::from_reader(BufReader::new(file))?)
    }

    /// Source hierarchy in declaration order.
    pub fn source_nodes(&self) -> Vec<SourceNode> {
        self.sources
            .iter()
            .map(|source| SourceNode {
                definition: SourceDefinition::new(source.name.clone(), source.mass, source.radius),
                parent: source.parent.clone(),
                position: Vec2::from(source.position),
                velocity: Vec2::from(source.velocity),
            })
            .collect()
    }
}

impl Simulation {
    /// Build a simulation from a parsed scenario.
    ///
    /// Sources are validated as in [`Simulation::initialize_system`], then bodies are attached
    /// in order. Any error aborts the whole construction.
    pub fn from_scenario(scenario: &ScenarioConfig) -> Result<Self, ConicError> {
        let mut simulation =
            Simulation::initialize_system(&scenario.source_nodes(), scenario.params.clone())?;
        for body in &scenario.bodies {
            simulation.add_body(
                BodyDefinition::new(body.name.clone(), body.mass),
                Vec2::from(body.position),
                Vec2::from(body.velocity),
            )?;
        }
        Ok(simulation)
    }
}
