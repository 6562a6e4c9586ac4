//! Physical constants for the gravity simulation
//!
//! Values are scaled so a disc of a few thousand bodies orbits the central
//! mass visibly at interactive time steps.

/// Gravitational constant
pub const G: f32 = 6.67e-11;

/// Mass of the fixed central body at the origin
pub const CENTRAL_MASS: f32 = 5e10;

/// Mass of every simulated body
pub const BODY_MASS: f32 = 3e8;

/// Radius of the initial disc in simulation space
pub const SCENE_SCALE: f32 = 1e2;

/// Scene "time" tag mixed into the per-body hash.
/// Not wall-clock time; reusing it reproduces the same scene.
pub const SCENE_SEED: u32 = 1;

/// Added to the planar radius when computing the initial orbital speed
pub const EPSILON: f32 = 1e-4;

/// Pairwise contributions with `r² <=` this value are dropped.
/// Also covers every body's interaction with itself.
pub const MIN_SEPARATION_SQ: f32 = 1e-2;

/// Vertical spread of the disc relative to the planar radius
pub const DISC_THICKNESS: f32 = 0.1;

/// Invocations per compute workgroup (must match the WGSL `@workgroup_size`)
pub const WORKGROUP_SIZE: u32 = 256;

/// Default number of bodies
pub const DEFAULT_BODY_COUNT: u32 = 5000;

/// Default tick length in seconds
pub const DEFAULT_DT: f32 = 0.2;
