//! Body state storage on the compute device
//!
//! Three parallel arrays of `body_count` entries: position, velocity and
//! acceleration. They are allocated together and released together; no other
//! component ever sees a partially allocated set.

use crate::error::{Result, SimulationError};
use crate::params::GpuVec3;

pub struct BodyBuffers {
    pub positions: wgpu::Buffer,
    pub velocities: wgpu::Buffer,
    pub accelerations: wgpu::Buffer,
    body_count: u32,
}

impl BodyBuffers {
    /// Bytes needed for one array of `body_count` vectors
    pub fn array_size(body_count: u32) -> u64 {
        body_count as u64 * std::mem::size_of::<GpuVec3>() as u64
    }

    /// Reserve all three arrays, or none of them.
    pub fn allocate(device: &wgpu::Device, body_count: u32) -> Result<Self> {
        if body_count == 0 {
            return Err(SimulationError::InvalidConfiguration(
                "body count must be at least 1".into(),
            ));
        }

        let size = Self::array_size(body_count);
        let limits = device.limits();
        let max_binding = limits.max_storage_buffer_binding_size as u64;
        if size > max_binding || size > limits.max_buffer_size {
            return Err(SimulationError::Allocation {
                buffer: "body state",
                bytes: size * 3,
                reason: format!(
                    "{body_count} bodies need {size} bytes per array, device allows {}",
                    max_binding.min(limits.max_buffer_size)
                ),
            });
        }

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

        // Positions and velocities are read back and overwritten from the host;
        // accelerations are also read back for inspection.
        let usage = wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_DST
            | wgpu::BufferUsages::COPY_SRC;

        let create = |label: &'static str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage,
                mapped_at_creation: false,
            })
        };

        let positions = create("Position Buffer");
        let velocities = create("Velocity Buffer");
        let accelerations = create("Acceleration Buffer");

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            positions.destroy();
            velocities.destroy();
            accelerations.destroy();
            return Err(SimulationError::Allocation {
                buffer: "body state",
                bytes: size * 3,
                reason: error.to_string(),
            });
        }

        log::info!(
            "Allocated body buffers: {} bodies, {} bytes per array",
            body_count,
            size
        );

        Ok(Self {
            positions,
            velocities,
            accelerations,
            body_count,
        })
    }

    pub fn body_count(&self) -> u32 {
        self.body_count
    }

    /// Free all three arrays. Consumes the buffers so this happens exactly once.
    pub fn release(self) {
        self.positions.destroy();
        self.velocities.destroy();
        self.accelerations.destroy();
        log::info!("Released body buffers ({} bodies)", self.body_count);
    }
}
