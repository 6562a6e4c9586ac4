//! # N-Body Physics
//!
//! Device-independent core of the gravity simulation: constants, scene
//! parameters, the per-body kernels and a host-side data-parallel engine.

pub mod constants;
pub mod error;
pub mod forces;
pub mod host;
pub mod integrator;
pub mod params;
pub mod projection;
pub mod scene;

pub use constants::*;
pub use error::BodyError;
pub use forces::*;
pub use host::*;
pub use integrator::*;
pub use params::*;
pub use projection::*;
pub use scene::*;
