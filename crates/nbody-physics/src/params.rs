//! Scene parameters shared by the host and device engines

use crate::constants::*;

/// Everything that determines an initial scene and its dynamics.
///
/// Two engines built from equal `SceneParams` generate bit-identical bodies.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneParams {
    /// Number of bodies (fixed for the lifetime of a simulation)
    pub body_count: u32,
    /// Radius of the initial disc; also the inverse scale of the render projection
    pub scale: f32,
    /// Scene "time" tag for the per-body hash
    pub seed: u32,
    /// Mass of the fixed body at the origin
    pub central_mass: f32,
    /// Mass of each simulated body
    pub body_mass: f32,
    /// Gravitational constant
    pub g: f32,
    /// Added to the planar radius for initial orbital speed
    pub epsilon: f32,
    /// Squared distance at or below which a contribution is dropped
    pub min_separation_sq: f32,
    /// Vertical spread relative to planar radius
    pub disc_thickness: f32,
}

impl Default for SceneParams {
    fn default() -> Self {
        Self {
            body_count: DEFAULT_BODY_COUNT,
            scale: SCENE_SCALE,
            seed: SCENE_SEED,
            central_mass: CENTRAL_MASS,
            body_mass: BODY_MASS,
            g: G,
            epsilon: EPSILON,
            min_separation_sq: MIN_SEPARATION_SQ,
            disc_thickness: DISC_THICKNESS,
        }
    }
}

impl SceneParams {
    pub fn with_body_count(mut self, body_count: u32) -> Self {
        self.body_count = body_count;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_masses(mut self, central_mass: f32, body_mass: f32) -> Self {
        self.central_mass = central_mass;
        self.body_mass = body_mass;
        self
    }

    /// Orbital speed of a circular orbit at planar radius `radius`
    pub fn circular_speed(&self, radius: f32) -> f32 {
        (self.g * self.central_mass / (radius + self.epsilon)).sqrt()
    }
}
