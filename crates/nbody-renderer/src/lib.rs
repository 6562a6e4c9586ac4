//! # N-Body Renderer
//!
//! Draws the projected body positions as points.

pub mod camera;
pub mod renderer;

pub use camera::*;
pub use renderer::*;
