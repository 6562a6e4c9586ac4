//! Semi-implicit (symplectic) Euler

use glam::Vec3;

/// Advance one body by `dt`: velocity first, then position from the
/// updated velocity. `dt` must be positive.
#[inline]
pub fn integrate(position: &mut Vec3, velocity: &mut Vec3, acceleration: Vec3, dt: f32) {
    debug_assert!(dt > 0.0, "time step must be positive, got {dt}");
    *velocity += acceleration * dt;
    *position += *velocity * dt;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn position_uses_updated_velocity() {
        let mut position = Vec3::new(1.0, 2.0, 3.0);
        let mut velocity = Vec3::new(0.5, 0.0, -1.0);
        let acceleration = Vec3::new(2.0, -4.0, 0.0);
        let dt = 0.25;

        let expected = Vec3::new(1.0, 2.0, 3.0) + (Vec3::new(0.5, 0.0, -1.0) + acceleration * dt) * dt;
        let explicit = Vec3::new(1.0, 2.0, 3.0) + Vec3::new(0.5, 0.0, -1.0) * dt;

        integrate(&mut position, &mut velocity, acceleration, dt);

        assert_relative_eq!(position.x, expected.x);
        assert_relative_eq!(position.y, expected.y);
        assert_relative_eq!(position.z, expected.z);
        assert!((position - explicit).length() > 1e-3);
        assert_relative_eq!(velocity.y, -1.0);
    }

    #[test]
    #[should_panic]
    #[cfg(debug_assertions)]
    fn rejects_non_positive_step_in_debug() {
        let mut position = Vec3::ZERO;
        let mut velocity = Vec3::ZERO;
        integrate(&mut position, &mut velocity, Vec3::ONE, 0.0);
    }
}
