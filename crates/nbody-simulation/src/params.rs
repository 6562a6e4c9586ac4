//! Simulation parameters as seen by the compute shaders

use bytemuck::{Pod, Zeroable};
use nbody_physics::SceneParams;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct SimParams {
    // Group 1: Gravity
    // x: G, y: central_mass, z: body_mass, w: min_separation_sq
    pub gravity: [f32; 4],

    // Group 2: Scene & Integration
    // x: scale, y: epsilon, z: disc_thickness, w: dt
    pub scene: [f32; 4],

    // Group 3: Counts
    // x: body_count, y: seed, z: padding, w: padding
    pub counts: [u32; 4],
}

impl SimParams {
    pub fn new(scene: &SceneParams, dt: f32) -> Self {
        Self {
            gravity: [
                scene.g,
                scene.central_mass,
                scene.body_mass,
                scene.min_separation_sq,
            ],
            scene: [scene.scale, scene.epsilon, scene.disc_thickness, dt],
            counts: [scene.body_count, scene.seed, 0, 0],
        }
    }

    pub fn dt(&self) -> f32 {
        self.scene[3]
    }

    pub fn set_dt(&mut self, dt: f32) {
        self.scene[3] = dt;
    }

    pub fn body_count(&self) -> u32 {
        self.counts[0]
    }
}

/// One body vector in a storage buffer.
/// WGSL `array<vec3<f32>>` has a 16-byte stride.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuVec3 {
    pub xyz: [f32; 3],
    _padding: f32,
}

impl From<glam::Vec3> for GpuVec3 {
    fn from(v: glam::Vec3) -> Self {
        Self {
            xyz: v.to_array(),
            _padding: 0.0,
        }
    }
}

impl From<GpuVec3> for glam::Vec3 {
    fn from(v: GpuVec3) -> Self {
        glam::Vec3::from_array(v.xyz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_layout_matches_wgsl() {
        assert_eq!(std::mem::size_of::<SimParams>(), 48);
        assert_eq!(std::mem::size_of::<GpuVec3>(), 16);
    }

    #[test]
    fn packs_scene_parameters() {
        let scene = SceneParams::default().with_body_count(123).with_seed(7);
        let mut params = SimParams::new(&scene, 0.5);
        assert_eq!(params.body_count(), 123);
        assert_eq!(params.counts[1], 7);
        assert_eq!(params.gravity[0], scene.g);
        assert_eq!(params.gravity[3], scene.min_separation_sq);
        assert_eq!(params.dt(), 0.5);
        params.set_dt(0.1);
        assert_eq!(params.scene[3], 0.1);
    }

    #[test]
    fn vec3_round_trips_through_padding() {
        let v = glam::Vec3::new(1.0, -2.0, 3.5);
        let gpu = GpuVec3::from(v);
        assert_eq!(bytemuck::cast::<GpuVec3, [f32; 4]>(gpu), [1.0, -2.0, 3.5, 0.0]);
        assert_eq!(glam::Vec3::from(gpu), v);
    }
}
