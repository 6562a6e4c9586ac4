//! Render projection of body positions
//!
//! Each body becomes four floats `(x, y, z, 1)` with the coordinates negated
//! and divided by the scene scale, ready to be used as a vertex buffer.

use crate::error::BodyError;
use glam::Vec3;

/// Floats written per body
pub const FLOATS_PER_VERTEX: usize = 4;

pub fn project_position(position: Vec3, scale: f32) -> [f32; 4] {
    let c_scale = -1.0 / scale;
    let p = position * c_scale;
    [p.x, p.y, p.z, 1.0]
}

/// Project every position into the front of `out`, which must hold at least
/// `4 * positions.len()` floats. Trailing floats are left untouched.
pub fn project_positions(positions: &[Vec3], scale: f32, out: &mut [f32]) -> Result<(), BodyError> {
    let expected = positions.len() * FLOATS_PER_VERTEX;
    if out.len() < expected {
        return Err(BodyError::ProjectionLength {
            expected,
            actual: out.len(),
        });
    }
    for (vertex, &position) in out.chunks_exact_mut(FLOATS_PER_VERTEX).zip(positions) {
        vertex.copy_from_slice(&project_position(position, scale));
    }
    Ok(())
}

/// Mean distance from the vertical axis
pub fn mean_planar_radius(positions: &[Vec3]) -> f32 {
    if positions.is_empty() {
        return 0.0;
    }
    let total: f64 = positions
        .iter()
        .map(|p| p.truncate().length() as f64)
        .sum();
    (total / positions.len() as f64) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negates_and_scales() {
        assert_eq!(
            project_position(Vec3::new(32.0, -64.0, 0.0), 64.0),
            [-0.5, 1.0, -0.0, 1.0]
        );
    }

    #[test]
    fn lays_out_four_floats_per_body() {
        let positions = [Vec3::new(8.0, 0.0, 0.0), Vec3::new(0.0, 16.0, -32.0)];
        let mut out = vec![0.0; 8];
        project_positions(&positions, 8.0, &mut out).unwrap();
        assert_eq!(out, vec![-1.0, -0.0, -0.0, 1.0, -0.0, -2.0, 4.0, 1.0]);
    }

    #[test]
    fn rejects_short_buffer() {
        let mut short = vec![0.0; 3];
        assert_eq!(
            project_positions(&[Vec3::ONE], 1.0, &mut short),
            Err(BodyError::ProjectionLength {
                expected: 4,
                actual: 3
            })
        );
        assert_eq!(short, vec![0.0; 3]);

        let mut long = vec![7.0; 6];
        project_positions(&[Vec3::ONE], 1.0, &mut long).unwrap();
        assert_eq!(long, vec![-1.0, -1.0, -1.0, 1.0, 7.0, 7.0]);
    }

    #[test]
    fn mean_radius_ignores_height() {
        let positions = [Vec3::new(3.0, 4.0, 100.0), Vec3::new(0.0, 1.0, -5.0)];
        assert!((mean_planar_radius(&positions) - 3.0).abs() < 1e-6);
    }
}
