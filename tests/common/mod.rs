use approx::assert_relative_eq;
use patched_conics::orbit_type::OrbitalElements;

pub fn assert_elements_close(actual: &OrbitalElements, expected: &OrbitalElements, epsilon: f64) {
    assert_eq!(actual.trajectory_type(), expected.trajectory_type());
    assert_relative_eq!(actual.mu(), expected.mu(), epsilon = epsilon);
    assert_relative_eq!(
        actual.semi_major_axis(),
        expected.semi_major_axis(),
        epsilon = epsilon
    );
    assert_relative_eq!(
        actual.eccentricity(),
        expected.eccentricity(),
        epsilon = epsilon
    );
    assert_relative_eq!(
        actual.angular_momentum(),
        expected.angular_momentum(),
        epsilon = epsilon
    );
    assert_relative_eq!(
        actual.argument_of_periapsis(),
        expected.argument_of_periapsis(),
        epsilon = epsilon
    );
}
