pub mod conic_errors;
pub mod constants;
pub mod gravity_tree;
pub mod integrator;
pub mod kepler;
pub mod math;
pub mod orbit_type;
pub mod orbiting_body;
pub mod params;
pub mod scenario;
pub mod simulation;
pub mod universal;
