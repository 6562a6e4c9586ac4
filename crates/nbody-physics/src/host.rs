//! Host-side data-parallel engine
//!
//! Same contract as the device engine, with the per-body kernels dispatched
//! over a rayon thread pool. Used as the reference in tests and as a
//! fallback where no compute device exists.

use crate::error::BodyError;
use crate::forces::body_acceleration;
use crate::integrator::integrate;
use crate::params::SceneParams;
use crate::projection::project_positions;
use crate::scene::{circular_velocity, initial_position};
use glam::Vec3;
use rayon::prelude::*;

/// Structure-of-arrays body state owned by the host
pub struct HostSimulation {
    params: SceneParams,
    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    accelerations: Vec<Vec3>,
    ticks: u64,
}

impl HostSimulation {
    /// Generate the scene described by `params`
    pub fn new(params: SceneParams) -> Self {
        let positions: Vec<Vec3> = (0..params.body_count)
            .into_par_iter()
            .map(|index| initial_position(index, &params))
            .collect();

        let velocities: Vec<Vec3> = positions
            .par_iter()
            .map(|&position| circular_velocity(position, &params))
            .collect();

        Self::from_state(params, positions, velocities)
    }

    /// Start from explicit bodies. `params.body_count` is replaced by their number.
    pub fn with_bodies(
        mut params: SceneParams,
        positions: Vec<Vec3>,
        velocities: Vec<Vec3>,
    ) -> Result<Self, BodyError> {
        if positions.len() != velocities.len() {
            return Err(BodyError::MismatchedBodies {
                positions: positions.len(),
                velocities: velocities.len(),
            });
        }
        params.body_count = u32::try_from(positions.len())
            .map_err(|_| BodyError::TooManyBodies(positions.len()))?;

        Ok(Self::from_state(params, positions, velocities))
    }

    fn from_state(params: SceneParams, positions: Vec<Vec3>, velocities: Vec<Vec3>) -> Self {
        let accelerations = vec![Vec3::ZERO; positions.len()];
        Self {
            params,
            positions,
            velocities,
            accelerations,
            ticks: 0,
        }
    }

    /// Recompute every acceleration from the current positions
    pub fn compute_accelerations(&mut self) {
        let positions = &self.positions;
        let params = &self.params;
        self.accelerations
            .par_iter_mut()
            .enumerate()
            .for_each(|(index, acceleration)| {
                *acceleration = body_acceleration(index, positions, params);
            });
    }

    /// Advance every body by `dt` using the accelerations already computed
    pub fn integrate(&mut self, dt: f32) {
        self.positions
            .par_iter_mut()
            .zip(self.velocities.par_iter_mut())
            .zip(self.accelerations.par_iter())
            .for_each(|((position, velocity), &acceleration)| {
                integrate(position, velocity, acceleration, dt);
            });
    }

    /// One tick: all accelerations, then all integrations
    pub fn step(&mut self, dt: f32) {
        self.compute_accelerations();
        self.integrate(dt);
        self.ticks += 1;
    }

    pub fn params(&self) -> &SceneParams {
        &self.params
    }

    pub fn body_count(&self) -> usize {
        self.positions.len()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn velocities(&self) -> &[Vec3] {
        &self.velocities
    }

    pub fn accelerations(&self) -> &[Vec3] {
        &self.accelerations
    }

    /// Write the render projection into `out` (4 floats per body)
    pub fn project_into(&self, out: &mut [f32]) -> Result<(), BodyError> {
        project_positions(&self.positions, self.params.scale, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forces::central_acceleration;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn planet_on_x_axis(params: &SceneParams, radius: f32) -> HostSimulation {
        let position = Vec3::new(radius, 0.0, 0.0);
        let velocity = circular_velocity(position, params);
        HostSimulation::with_bodies(*params, vec![position], vec![velocity]).unwrap()
    }

    #[test]
    fn scene_lies_within_scale_and_orbits() {
        let params = SceneParams::default().with_body_count(5000);
        let sim = HostSimulation::new(params);
        assert_eq!(sim.body_count(), 5000);
        assert_eq!(sim.params(), &params);

        for (position, velocity) in sim.positions().iter().zip(sim.velocities()) {
            let planar = position.truncate().length();
            assert!(
                position.length() <= params.scale,
                "body at {} outside scale",
                position.length()
            );
            if planar > 1e-3 {
                assert_relative_eq!(
                    velocity.length(),
                    params.circular_speed(planar),
                    max_relative = 1e-4
                );
            }
        }
    }

    #[test]
    fn identical_params_give_identical_scenes() {
        let params = SceneParams::default().with_body_count(1024).with_seed(9);
        let a = HostSimulation::new(params);
        let b = HostSimulation::new(params);
        let bits = |v: &[Vec3]| -> Vec<u32> {
            v.iter().flat_map(|p| p.to_array()).map(f32::to_bits).collect()
        };
        assert_eq!(bits(a.positions()), bits(b.positions()));
        assert_eq!(bits(a.velocities()), bits(b.velocities()));
    }

    #[test]
    fn lone_body_feels_only_the_central_mass() {
        let params = SceneParams::default();
        let mut sim = planet_on_x_axis(&params, 40.0);
        sim.compute_accelerations();
        assert_eq!(
            sim.accelerations()[0],
            central_acceleration(sim.positions()[0], &params)
        );
    }

    #[test]
    fn coincident_bodies_get_finite_accelerations() {
        let params = SceneParams::default();
        let p = Vec3::new(-20.0, 5.0, 0.0);
        let mut sim = HostSimulation::with_bodies(
            params,
            vec![p, p, p + Vec3::splat(params.epsilon)],
            vec![Vec3::ZERO; 3],
        )
        .unwrap();
        sim.step(0.2);
        for a in sim.accelerations() {
            assert!(a.is_finite());
        }
        for p in sim.positions() {
            assert!(p.is_finite());
        }
    }

    #[test]
    fn one_tick_stays_on_the_circle() {
        let params = SceneParams::default();
        let radius = 50.0;
        let mut sim = planet_on_x_axis(&params, radius);
        sim.step(0.2);
        let r = sim.positions()[0].length();
        assert!((r - radius).abs() < 1e-3, "radius drifted to {r}");
        assert!(sim.positions()[0].y.abs() > 0.0);
    }

    #[test]
    fn circular_orbit_radius_stays_bounded() {
        let params = SceneParams::default();
        let radius = 50.0;
        let mut sim = planet_on_x_axis(&params, radius);
        for _ in 0..3000 {
            sim.step(0.2);
            let r = sim.positions()[0].length();
            assert!(
                (r - radius).abs() < 0.01 * radius,
                "tick {}: radius {r}",
                sim.ticks()
            );
        }
    }

    #[test]
    fn step_order_is_accelerations_then_integration() {
        let params = SceneParams::default().with_body_count(64);
        let mut sim = HostSimulation::new(params);
        let before: Vec<Vec3> = sim.positions().to_vec();
        let velocities: Vec<Vec3> = sim.velocities().to_vec();
        let dt = 0.5;
        sim.step(dt);

        for index in 0..before.len() {
            let a = body_acceleration(index, &before, &params);
            let expected = before[index] + (velocities[index] + a * dt) * dt;
            assert_relative_eq!(sim.positions()[index].x, expected.x, max_relative = 1e-5);
            assert_relative_eq!(sim.positions()[index].y, expected.y, max_relative = 1e-5);
        }
    }

    #[test]
    fn parallel_accelerations_match_sequential() {
        let mut rng = StdRng::seed_from_u64(42);
        let params = SceneParams::default();
        let positions: Vec<Vec3> = (0..200)
            .map(|_| {
                Vec3::new(
                    rng.random_range(-100.0..100.0),
                    rng.random_range(-100.0..100.0),
                    rng.random_range(-5.0..5.0),
                )
            })
            .collect();
        let mut sim =
            HostSimulation::with_bodies(params, positions.clone(), vec![Vec3::ZERO; 200]).unwrap();
        sim.compute_accelerations();
        for (index, &a) in sim.accelerations().iter().enumerate() {
            assert_eq!(a, body_acceleration(index, &positions, &params));
        }
    }

    #[test]
    fn projection_matches_positions() {
        let params = SceneParams::default().with_body_count(16);
        let sim = HostSimulation::new(params);
        let mut out = vec![0.0; 64];
        sim.project_into(&mut out).unwrap();
        for (vertex, p) in out.chunks_exact(4).zip(sim.positions()) {
            assert_relative_eq!(vertex[0], -p.x / params.scale, max_relative = 1e-6);
            assert_eq!(vertex[3], 1.0);
        }
    }

    #[test]
    fn rejects_mismatched_bodies() {
        let result = HostSimulation::with_bodies(
            SceneParams::default(),
            vec![Vec3::X, Vec3::Y],
            vec![Vec3::ZERO],
        );
        assert_eq!(
            result.err(),
            Some(BodyError::MismatchedBodies {
                positions: 2,
                velocities: 1
            })
        );
    }

    #[test]
    fn explicit_bodies_replace_the_body_count() {
        let params = SceneParams::default().with_body_count(5000);
        let sim = HostSimulation::with_bodies(params, vec![Vec3::X; 3], vec![Vec3::ZERO; 3]).unwrap();
        assert_eq!(sim.params().body_count, 3);
        assert_eq!(sim.body_count(), 3);
    }

    #[test]
    fn projection_rejects_short_buffer() {
        let sim = HostSimulation::new(SceneParams::default().with_body_count(4));
        let mut out = vec![0.0; 15];
        assert_eq!(
            sim.project_into(&mut out),
            Err(BodyError::ProjectionLength {
                expected: 16,
                actual: 15
            })
        );
    }
}
