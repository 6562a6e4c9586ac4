//! Deterministic scene generation
//!
//! Every body derives its random numbers from a hash of `(index, seed)` only,
//! so bodies can be generated in any order or concurrently and still produce
//! the same scene. The integer hash and the float conversion are mirrored
//! bit-for-bit in `shaders/scene.wgsl`.

use crate::params::SceneParams;
use glam::Vec3;
use std::f32::consts::TAU;

/// 32-bit integer avalanche hash
pub fn hash(input: u32) -> u32 {
    let mut a = input;
    a = a.wrapping_add(0x7ed5_5d16).wrapping_add(a << 12);
    a = (a ^ 0xc761_c23c) ^ (a >> 19);
    a = a.wrapping_add(0x1656_67b1).wrapping_add(a << 5);
    a = a.wrapping_add(0xd3a2_646c) ^ (a << 9);
    a = a.wrapping_add(0xfd70_46c5).wrapping_add(a << 3);
    a = (a ^ 0xb55a_4f09) ^ (a >> 16);
    a
}

/// Map the top 24 bits of a hash to `[0, 1)`. Exact in `f32`.
fn unit_float(bits: u32) -> f32 {
    (bits >> 8) as f32 * (1.0 / 16_777_216.0)
}

/// Three uniform samples in `[0, 1)` keyed by body index and scene seed
pub fn random_vec3(index: u32, seed: u32) -> Vec3 {
    let mut state = hash(index.wrapping_add(hash(seed)));
    let mut next = || {
        state = hash(state);
        unit_float(state)
    };
    let x = next();
    let y = next();
    let z = next();
    Vec3::new(x, y, z)
}

/// Planar radius of the disc rim. With the vertical spread added, no body
/// is farther than `scale` from the origin.
pub fn disc_radius(params: &SceneParams) -> f32 {
    params.scale / (1.0 + params.disc_thickness * params.disc_thickness).sqrt()
}

/// Initial position of body `index`: a flattened disc whose vertical spread
/// grows with the planar radius, contained in the sphere of radius `scale`.
pub fn initial_position(index: u32, params: &SceneParams) -> Vec3 {
    let sample = random_vec3(index, params.seed);
    let radius = disc_radius(params) * sample.x.sqrt();
    let theta = TAU * sample.y;
    let height = params.disc_thickness * radius * (2.0 * sample.z - 1.0);
    Vec3::new(radius * theta.cos(), radius * theta.sin(), height)
}

/// Velocity of a circular orbit around the central mass, tangent to the
/// position and perpendicular to the vertical axis.
///
/// Bodies with no planar offset get zero velocity.
pub fn circular_velocity(position: Vec3, params: &SceneParams) -> Vec3 {
    let radius = position.truncate().length() + params.epsilon;
    let speed = (params.g * params.central_mass / radius).sqrt();
    let direction = (position / radius).cross(Vec3::Z).normalize_or_zero();
    direction * speed
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn hash_is_a_pure_function() {
        assert_eq!(hash(0), hash(0));
        assert_eq!(hash(12345), hash(12345));
        assert_ne!(hash(1), hash(2));
    }

    #[test]
    fn random_samples_lie_in_unit_interval() {
        for index in 0..2048 {
            let sample = random_vec3(index, 7);
            for value in sample.to_array() {
                assert!((0.0..1.0).contains(&value), "{value} out of range");
            }
        }
    }

    #[test]
    fn seed_changes_the_scene() {
        let a = random_vec3(3, 1);
        let b = random_vec3(3, 2);
        assert_ne!(a, b);
    }

    #[test]
    fn positions_fill_a_thin_disc() {
        let params = SceneParams::default();
        for index in 0..4096 {
            let p = initial_position(index, &params);
            let planar = p.truncate().length();
            assert!(planar <= disc_radius(&params));
            assert!(p.z.abs() <= params.disc_thickness * planar + 1e-4);
        }
    }

    #[test]
    fn positions_stay_within_scale() {
        for thickness in [0.0, 0.1, 0.5, 1.0] {
            let mut params = SceneParams::default().with_seed(11);
            params.disc_thickness = thickness;
            for index in 0..5000 {
                let distance = initial_position(index, &params).length();
                assert!(
                    distance <= params.scale,
                    "body {index} at {distance} with thickness {thickness}"
                );
            }
        }
    }

    #[test]
    fn thickness_shrinks_the_rim() {
        let mut params = SceneParams::default();
        params.disc_thickness = 0.0;
        assert_eq!(disc_radius(&params), params.scale);
        params.disc_thickness = 1.0;
        assert_relative_eq!(disc_radius(&params), params.scale / 2.0_f32.sqrt());
    }

    #[test]
    fn generation_order_does_not_matter() {
        let params = SceneParams::default();
        let forward: Vec<Vec3> = (0..256).map(|i| initial_position(i, &params)).collect();
        let mut backward: Vec<Vec3> =
            (0..256).rev().map(|i| initial_position(i, &params)).collect();
        backward.reverse();
        assert_eq!(forward, backward);
    }

    #[test]
    fn circular_velocity_has_orbital_speed() {
        let params = SceneParams::default();
        let position = Vec3::new(30.0, -40.0, 1.5);
        let velocity = circular_velocity(position, &params);
        assert_relative_eq!(velocity.length(), params.circular_speed(50.0), max_relative = 1e-5);
        assert_relative_eq!(velocity.z, 0.0);
        assert_relative_eq!(velocity.dot(position.with_z(0.0)), 0.0, epsilon = 1e-4);
    }

    #[test]
    fn circular_velocity_at_origin_is_zero() {
        let params = SceneParams::default();
        assert_eq!(circular_velocity(Vec3::ZERO, &params), Vec3::ZERO);
    }
}
