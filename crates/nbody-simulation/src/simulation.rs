//! GPU-based N-body simulation manager
//!
//! Lifecycle: [`Simulation::new`] allocates and generates the scene (Ready),
//! [`Simulation::step`] may then be called any number of times (Stepping),
//! and [`Simulation::end`] consumes the simulation and frees its buffers
//! (Torn Down). Stepping before initialization or after teardown cannot be
//! expressed.
//!
//! Every tick runs the force pass and the integration pass as two compute
//! passes of one submission. The pass boundary is the barrier: all
//! accelerations are written before any body is integrated.

use crate::buffers::BodyBuffers;
use crate::error::{Result, SimulationError};
use crate::params::{GpuVec3, SimParams};
use glam::Vec3;
use nbody_physics::{SceneParams, FLOATS_PER_VERTEX, WORKGROUP_SIZE};
use wgpu::util::DeviceExt;

/// Bytes per projected vertex `(x, y, z, 1)`
pub const VERTEX_SIZE: u64 = (FLOATS_PER_VERTEX * std::mem::size_of::<f32>()) as u64;

/// GPU-based N-body simulation
pub struct Simulation {
    device: wgpu::Device,
    queue: wgpu::Queue,

    // Buffers
    buffers: BodyBuffers,
    params_buffer: wgpu::Buffer,

    // Compute pipelines
    force_pipeline: wgpu::ComputePipeline,
    integrate_pipeline: wgpu::ComputePipeline,
    project_pipeline: wgpu::ComputePipeline,

    // Bind groups (the projection target is external, so its group is built per call)
    force_bind_group: wgpu::BindGroup,
    integrate_bind_group: wgpu::BindGroup,
    project_bind_group_layout: wgpu::BindGroupLayout,

    scene: SceneParams,
    params: SimParams,
    ticks: u64,
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn compute_pipeline(
    device: &wgpu::Device,
    label: &str,
    bind_group_layout: &wgpu::BindGroupLayout,
    module: &wgpu::ShaderModule,
    entry_point: &str,
) -> wgpu::ComputePipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[bind_group_layout],
        push_constant_ranges: &[],
    });

    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        module,
        entry_point: Some(entry_point),
        compilation_options: Default::default(),
        cache: None,
    })
}

fn validate_scene(scene: &SceneParams) -> Result<()> {
    if scene.body_count == 0 {
        return Err(SimulationError::InvalidConfiguration(
            "body count must be at least 1".into(),
        ));
    }
    if !(scene.scale.is_finite() && scene.scale > 0.0) {
        return Err(SimulationError::InvalidConfiguration(format!(
            "scene scale must be positive, got {}",
            scene.scale
        )));
    }
    Ok(())
}

impl Simulation {
    /// Allocate body state for `scene.body_count` bodies and generate the
    /// initial disc on the device. Returns once generation has completed.
    #[track_caller]
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, scene: SceneParams) -> Result<Self> {
        let simulation = Self::allocate(device, queue, scene)?;
        simulation.generate_scene()?;
        log::info!("✓ Generated {} bodies", scene.body_count);
        Ok(simulation)
    }

    /// Allocate body state and upload explicit bodies instead of generating a
    /// scene. `scene.body_count` is replaced by the number of bodies given.
    #[track_caller]
    pub fn with_bodies(
        device: wgpu::Device,
        queue: wgpu::Queue,
        mut scene: SceneParams,
        positions: &[Vec3],
        velocities: &[Vec3],
    ) -> Result<Self> {
        if positions.len() != velocities.len() {
            return Err(SimulationError::InvalidConfiguration(format!(
                "{} positions but {} velocities",
                positions.len(),
                velocities.len()
            )));
        }
        scene.body_count = u32::try_from(positions.len()).map_err(|_| {
            SimulationError::InvalidConfiguration(format!("{} bodies", positions.len()))
        })?;

        let simulation = Self::allocate(device, queue, scene)?;

        let positions: Vec<GpuVec3> = positions.iter().copied().map(GpuVec3::from).collect();
        let velocities: Vec<GpuVec3> = velocities.iter().copied().map(GpuVec3::from).collect();
        simulation.queue.write_buffer(
            &simulation.buffers.positions,
            0,
            bytemuck::cast_slice(&positions),
        );
        simulation.queue.write_buffer(
            &simulation.buffers.velocities,
            0,
            bytemuck::cast_slice(&velocities),
        );

        log::info!("✓ Uploaded {} bodies", scene.body_count);
        Ok(simulation)
    }

    #[track_caller]
    fn allocate(device: wgpu::Device, queue: wgpu::Queue, scene: SceneParams) -> Result<Self> {
        log::info!("Initializing Simulation...");
        validate_scene(&scene)?;

        let buffers = BodyBuffers::allocate(&device, scene.body_count)?;

        let params = SimParams::new(&scene, nbody_physics::DEFAULT_DT);
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Simulation Params Buffer"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        log::info!("Buffers created");

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let force_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Force Compute Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/forces.wgsl").into()),
        });

        let integrate_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Integration Compute Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/integrate.wgsl").into()),
        });

        let project_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Projection Compute Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/project.wgsl").into()),
        });

        log::info!("Shaders loaded");

        // 0: positions (read), 1: accelerations (write), 2: params
        let force_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Force Bind Group Layout"),
                entries: &[
                    storage_entry(0, true),
                    storage_entry(1, false),
                    uniform_entry(2),
                ],
            });

        // 0: positions, 1: velocities, 2: accelerations (read), 3: params
        let integrate_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Integration Bind Group Layout"),
                entries: &[
                    storage_entry(0, false),
                    storage_entry(1, false),
                    storage_entry(2, true),
                    uniform_entry(3),
                ],
            });

        // 0: positions (read), 1: destination vertices (write), 2: params
        let project_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Projection Bind Group Layout"),
                entries: &[
                    storage_entry(0, true),
                    storage_entry(1, false),
                    uniform_entry(2),
                ],
            });

        log::info!("Bind group layouts created");

        let force_pipeline = compute_pipeline(
            &device,
            "Force Pipeline",
            &force_bind_group_layout,
            &force_shader,
            "main",
        );
        let integrate_pipeline = compute_pipeline(
            &device,
            "Integration Pipeline",
            &integrate_bind_group_layout,
            &integrate_shader,
            "main",
        );
        let project_pipeline = compute_pipeline(
            &device,
            "Projection Pipeline",
            &project_bind_group_layout,
            &project_shader,
            "main",
        );

        log::info!("Pipelines created");

        let force_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Force Bind Group"),
            layout: &force_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffers.positions.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buffers.accelerations.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params_buffer.as_entire_binding(),
                },
            ],
        });

        let integrate_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Integration Bind Group"),
            layout: &integrate_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffers.positions.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buffers.velocities.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: buffers.accelerations.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: params_buffer.as_entire_binding(),
                },
            ],
        });

        log::info!("Bind groups created");

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            buffers.release();
            return Err(SimulationError::launch("pipeline creation", error));
        }

        Ok(Self {
            device,
            queue,
            buffers,
            params_buffer,
            force_pipeline,
            integrate_pipeline,
            project_pipeline,
            force_bind_group,
            integrate_bind_group,
            project_bind_group_layout,
            scene,
            params,
            ticks: 0,
        })
    }

    /// Fill positions, then velocities from those positions. The scene
    /// pipelines are only needed once, so they are not kept.
    #[track_caller]
    fn generate_scene(&self) -> Result<()> {
        let workgroup_count = self.workgroup_count("scene generation")?;

        self.with_validation("scene generation", || {
            let scene_shader = self
                .device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some("Scene Generation Shader"),
                    source: wgpu::ShaderSource::Wgsl(include_str!("shaders/scene.wgsl").into()),
                });

            // 0: positions, 1: velocities, 2: params
            let scene_bind_group_layout =
                self.device
                    .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                        label: Some("Scene Bind Group Layout"),
                        entries: &[
                            storage_entry(0, false),
                            storage_entry(1, false),
                            uniform_entry(2),
                        ],
                    });

            let position_pipeline = compute_pipeline(
                &self.device,
                "Scene Position Pipeline",
                &scene_bind_group_layout,
                &scene_shader,
                "generate_positions",
            );
            let velocity_pipeline = compute_pipeline(
                &self.device,
                "Scene Velocity Pipeline",
                &scene_bind_group_layout,
                &scene_shader,
                "generate_velocities",
            );

            let scene_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Scene Bind Group"),
                layout: &scene_bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: self.buffers.positions.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: self.buffers.velocities.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: self.params_buffer.as_entire_binding(),
                    },
                ],
            });

            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Scene Generation Encoder"),
                });

            // Step 1: Positions
            {
                let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Scene Position Pass"),
                    timestamp_writes: None,
                });
                compute_pass.set_pipeline(&position_pipeline);
                compute_pass.set_bind_group(0, &scene_bind_group, &[]);
                compute_pass.dispatch_workgroups(workgroup_count, 1, 1);
            }

            // Step 2: Circular velocities (reads the positions written above)
            {
                let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Scene Velocity Pass"),
                    timestamp_writes: None,
                });
                compute_pass.set_pipeline(&velocity_pipeline);
                compute_pass.set_bind_group(0, &scene_bind_group, &[]);
                compute_pass.dispatch_workgroups(workgroup_count, 1, 1);
            }

            self.queue.submit(std::iter::once(encoder.finish()));
        })?;

        // Initialization must be complete before the first tick
        if let Err(error) = self.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        }) {
            return Err(SimulationError::launch("scene generation", error));
        }

        Ok(())
    }

    /// Advance every body by one tick of `dt` seconds.
    ///
    /// `dt` must be positive; this is only checked in debug builds.
    #[track_caller]
    pub fn step(&mut self, dt: f32) -> Result<()> {
        debug_assert!(dt > 0.0, "time step must be positive, got {dt}");

        let workgroup_count = self.workgroup_count("step")?;

        if self.params.dt() != dt {
            self.params.set_dt(dt);
            self.queue
                .write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&self.params));
        }

        self.with_validation("step", || {
            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Simulation Encoder"),
                });

            // Step 1: Compute accelerations
            {
                let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Force Compute Pass"),
                    timestamp_writes: None,
                });
                compute_pass.set_pipeline(&self.force_pipeline);
                compute_pass.set_bind_group(0, &self.force_bind_group, &[]);
                compute_pass.dispatch_workgroups(workgroup_count, 1, 1);
            }

            // Step 2: Integrate motion
            {
                let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Integration Compute Pass"),
                    timestamp_writes: None,
                });
                compute_pass.set_pipeline(&self.integrate_pipeline);
                compute_pass.set_bind_group(0, &self.integrate_bind_group, &[]);
                compute_pass.dispatch_workgroups(workgroup_count, 1, 1);
            }

            self.queue.submit(std::iter::once(encoder.finish()));
        })?;

        self.ticks += 1;
        log::trace!("tick {} (dt = {})", self.ticks, dt);
        Ok(())
    }

    /// Project current positions into an externally owned buffer of
    /// `4 * body_count` floats laid out as `(x, y, z, 1)` per body.
    ///
    /// The destination must have `STORAGE` usage; add `VERTEX` to draw from it.
    #[track_caller]
    pub fn copy_positions_to_buffer(&self, destination: &wgpu::Buffer) -> Result<()> {
        let required = self.body_count() as u64 * VERTEX_SIZE;
        if destination.size() < required {
            return Err(SimulationError::InvalidConfiguration(format!(
                "projection buffer holds {} bytes, {} bodies need {}",
                destination.size(),
                self.body_count(),
                required
            )));
        }
        if !destination.usage().contains(wgpu::BufferUsages::STORAGE) {
            return Err(SimulationError::InvalidConfiguration(
                "projection buffer needs STORAGE usage".into(),
            ));
        }

        let workgroup_count = self.workgroup_count("copy positions to buffer")?;

        self.with_validation("copy positions to buffer", || {
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Projection Bind Group"),
                layout: &self.project_bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: self.buffers.positions.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: destination.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: self.params_buffer.as_entire_binding(),
                    },
                ],
            });

            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Projection Encoder"),
                });

            {
                let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Projection Compute Pass"),
                    timestamp_writes: None,
                });
                compute_pass.set_pipeline(&self.project_pipeline);
                compute_pass.set_bind_group(0, &bind_group, &[]);
                compute_pass.dispatch_workgroups(workgroup_count, 1, 1);
            }

            self.queue.submit(std::iter::once(encoder.finish()));
        })
    }

    /// Host copy of the render projection
    #[track_caller]
    pub fn read_projected_positions(&self) -> Result<Vec<[f32; 4]>> {
        let vertex_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Projection Readback Buffer"),
            size: self.body_count() as u64 * VERTEX_SIZE,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        self.copy_positions_to_buffer(&vertex_buffer)?;
        let vertices = self.read_buffer(&vertex_buffer, "projected positions");
        vertex_buffer.destroy();
        vertices
    }

    /// Host copy of the positions
    pub fn read_positions(&self) -> Result<Vec<Vec3>> {
        self.read_vectors(&self.buffers.positions, "positions")
    }

    /// Host copy of the velocities
    pub fn read_velocities(&self) -> Result<Vec<Vec3>> {
        self.read_vectors(&self.buffers.velocities, "velocities")
    }

    /// Host copy of the accelerations computed by the last tick
    pub fn read_accelerations(&self) -> Result<Vec<Vec3>> {
        self.read_vectors(&self.buffers.accelerations, "accelerations")
    }

    /// Release all device storage. Consumes the simulation, so teardown
    /// happens exactly once and nothing can run afterwards.
    pub fn end(self) {
        log::info!("Ending simulation after {} ticks", self.ticks);
        let Self {
            buffers,
            params_buffer,
            ..
        } = self;
        params_buffer.destroy();
        buffers.release();
    }

    pub fn body_count(&self) -> u32 {
        self.buffers.body_count()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn scene(&self) -> &SceneParams {
        &self.scene
    }

    /// Workgroups covering every body, or a launch error when the device
    /// cannot dispatch that many along one dimension.
    #[track_caller]
    fn workgroup_count(&self, operation: &'static str) -> Result<u32> {
        let workgroup_count = self.body_count().div_ceil(WORKGROUP_SIZE);
        let max = self.device.limits().max_compute_workgroups_per_dimension;
        if workgroup_count > max {
            return Err(SimulationError::launch(
                operation,
                format!("{workgroup_count} workgroups exceed the device limit of {max}"),
            ));
        }
        Ok(workgroup_count)
    }

    /// Run `encode` inside a validation error scope and turn any captured
    /// error into a launch failure.
    #[track_caller]
    fn with_validation<T>(&self, operation: &'static str, encode: impl FnOnce() -> T) -> Result<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = encode();
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(SimulationError::launch(operation, error));
        }
        Ok(value)
    }

    fn read_vectors(&self, source: &wgpu::Buffer, operation: &'static str) -> Result<Vec<Vec3>> {
        let vectors: Vec<GpuVec3> = self.read_buffer(source, operation)?;
        Ok(vectors.into_iter().map(Vec3::from).collect())
    }

    fn read_buffer<T: bytemuck::Pod>(
        &self,
        source: &wgpu::Buffer,
        operation: &'static str,
    ) -> Result<Vec<T>> {
        let size = source.size();
        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Staging Buffer"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(source, 0, &staging_buffer, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging_buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .map_err(|error| SimulationError::readback(operation, error))?;

        receiver
            .recv()
            .map_err(|error| SimulationError::readback(operation, error))?
            .map_err(|error| SimulationError::readback(operation, error))?;

        let values = {
            let data = slice.get_mapped_range();
            bytemuck::cast_slice::<u8, T>(&data).to_vec()
        };
        staging_buffer.unmap();
        staging_buffer.destroy();

        Ok(values)
    }
}

