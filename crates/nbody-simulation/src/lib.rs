//! # N-Body Simulation Engine
//!
//! Device-resident body state for a disc of equal-mass bodies orbiting a
//! heavy central mass. Forces, integration and render projection all run as
//! compute passes; the host only ever sees copies.

pub mod buffers;
pub mod context;
pub mod error;
pub mod params;
pub mod simulation;

pub use buffers::BodyBuffers;
pub use context::GpuContext;
pub use error::{Result, SimulationError};
pub use params::*;
pub use simulation::*;
