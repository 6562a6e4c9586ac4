//! Brute-force gravitational acceleration
//!
//! NOTE: These are the reference kernels. The device engine runs the same
//! arithmetic in `shaders/forces.wgsl`.

use crate::params::SceneParams;
use glam::Vec3;

/// Acceleration of a body at `this` due to a point mass at `other`.
/// a = G * m * normalize(other - this) / r²
///
/// Contributions with `r² <= min_separation_sq` are zero, which covers both
/// coincident bodies and a body compared against itself.
pub fn gravity_acceleration(
    this: Vec3,
    other: Vec3,
    mass: f32,
    g: f32,
    min_separation_sq: f32,
) -> Vec3 {
    let offset = other - this;
    let distance_sq = offset.length_squared();

    if distance_sq <= min_separation_sq {
        return Vec3::ZERO;
    }

    offset.normalize() * (g * mass / distance_sq)
}

/// Acceleration of a body at `position` due to the central mass alone
pub fn central_acceleration(position: Vec3, params: &SceneParams) -> Vec3 {
    gravity_acceleration(
        position,
        Vec3::ZERO,
        params.central_mass,
        params.g,
        params.min_separation_sq,
    )
}

/// Total acceleration of body `index`: the central mass plus every body in
/// `positions`, itself included (the self term contributes zero).
pub fn body_acceleration(index: usize, positions: &[Vec3], params: &SceneParams) -> Vec3 {
    let here = positions[index];
    positions
        .iter()
        .fold(central_acceleration(here, params), |acceleration, &other| {
            acceleration
                + gravity_acceleration(
                    here,
                    other,
                    params.body_mass,
                    params.g,
                    params.min_separation_sq,
                )
        })
}
