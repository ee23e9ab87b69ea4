use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConicError {
    #[error("Root gravity source '{0}' must not declare a parent")]
    RootHasParent(String),

    #[error("A system needs a root gravity source")]
    NoRootSource,

    #[error("Gravity source '{source_name}' references unknown parent '{parent}'")]
    UnknownParent { source_name: String, parent: String },

    #[error("Gravity source '{0}' is declared more than once")]
    DuplicateSourceName(String),

    #[error("Mass must be strictly positive and finite, got {0}")]
    NonPositiveMass(f64),

    #[error("Radius of '{0}' must be strictly positive and finite")]
    NonPositiveRadius(String),

    #[error("Invalid propagation parameter: {0}")]
    InvalidPropagationParameter(String),

    #[error("Unable to parse scenario: {0}")]
    ScenarioParse(#[from] serde_yaml::Error),

    #[error("Unable to read scenario file {0}")]
    ScenarioIo(String),

    #[error("Unknown gravity source id: {0}")]
    UnknownSource(usize),

    #[error("Unknown orbiting body id: {0}")]
    UnknownBody(usize),

    #[error("Relative position to the dominant source is zero")]
    ZeroRelativePosition,

    #[error("Zero angular momentum: a radial or resting trajectory is not a conic")]
    RadialTrajectory,

    #[error("Invalid time step: {0}")]
    InvalidTimeStep(f64),

    #[error("Vector has non-finite components: {0}")]
    InvalidVector(String),

    #[error("Universal variable solver produced a non-finite state")]
    UniversalVariableDiverged,
}

impl PartialEq for ConicError {
    fn eq(&self, other: &Self) -> bool {
        use ConicError::*;
        match (self, other) {
            (RootHasParent(a), RootHasParent(b)) => a == b,
            (
                UnknownParent {
                    source_name: s1,
                    parent: p1,
                },
                UnknownParent {
                    source_name: s2,
                    parent: p2,
                },
            ) => s1 == s2 && p1 == p2,
            (DuplicateSourceName(a), DuplicateSourceName(b)) => a == b,
            (NonPositiveMass(a), NonPositiveMass(b)) => a == b || (a.is_nan() && b.is_nan()),
            (NonPositiveRadius(a), NonPositiveRadius(b)) => a == b,
            (InvalidPropagationParameter(a), InvalidPropagationParameter(b)) => a == b,
            (UnknownSource(a), UnknownSource(b)) => a == b,
            (UnknownBody(a), UnknownBody(b)) => a == b,
            (InvalidTimeStep(a), InvalidTimeStep(b)) => a == b || (a.is_nan() && b.is_nan()),
            (InvalidVector(a), InvalidVector(b)) => a == b,
            (ScenarioIo(a), ScenarioIo(b)) => a == b,

            // serde errors are not comparable: equal if same variant
            (ScenarioParse(_), ScenarioParse(_)) => true,

            (NoRootSource, NoRootSource) => true,
            (ZeroRelativePosition, ZeroRelativePosition) => true,
            (RadialTrajectory, RadialTrajectory) => true,
            (UniversalVariableDiverged, UniversalVariableDiverged) => true,

            _ => false,
        }
    }
}
