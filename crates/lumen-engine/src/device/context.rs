use anyhow::{Context, Result};
use winit::window::Window;

use super::surface::{self, SurfaceErrorAction};
use super::{Extent, RenderBackend, RenderConfig};
use crate::frame::{DispatchGrid, FrameConstants};
use crate::shader::{CompileError, FrameLayout, ENTRY_POINT};

/// Device, queue and swap chain bound to one window.
///
/// Field order is drop order: the surface goes before the device it was
/// configured with.
struct GpuContext<'w> {
    surface: wgpu::Surface<'w>,
    constants: wgpu::Buffer,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    queue: wgpu::Queue,
    device: wgpu::Device,
    config: wgpu::SurfaceConfiguration,
    layout: FrameLayout,

    /// Kept for the live-object report at release.
    instance: wgpu::Instance,
}

/// Size-dependent resources for one swap-chain size.
pub struct GpuTargets {
    /// `vec4<f32>` running average per pixel, zero-initialized.
    accumulation: wgpu::Buffer,
    depth: wgpu::Texture,
    depth_view: wgpu::TextureView,
}

/// A validated compute pipeline.
pub struct GpuProgram {
    pipeline: wgpu::ComputePipeline,
}

/// Represents a single acquired frame.
///
/// This object is short-lived and must be presented promptly. Holding the
/// surface texture prevents acquisition of subsequent frames.
pub struct GpuFrame {
    surface_texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
    dispatched: bool,
}

/// `RenderBackend` on top of wgpu.
///
/// The surface lifetime is tied to the window via `'w`; the owner must keep the
/// window alive for as long as this backend exists.
pub struct WgpuBackend<'w> {
    window: &'w Window,
    config: RenderConfig,
    context: Option<GpuContext<'w>>,
}

impl<'w> WgpuBackend<'w> {
    /// Creates the backend. No GPU object exists until `create_context`.
    pub fn new(window: &'w Window, config: RenderConfig) -> Self {
        Self {
            window,
            config,
            context: None,
        }
    }

    fn context(&self) -> Result<&GpuContext<'w>> {
        self.context.as_ref().context("render context not created")
    }
}

impl<'w> GpuContext<'w> {
    /// Adapter/device acquisition is asynchronous under wgpu.
    async fn new(window: &'w Window, config: &RenderConfig, size: Extent) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .context("failed to create wgpu surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: config.power_preference,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let info = adapter.get_info();
        let level = surface::negotiate_feature_level(&config.feature_levels, adapter.features())
            .with_context(|| {
                format!("adapter `{}` supports none of the requested feature levels", info.name)
            })?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("lumen device"),
                required_features: level.features,
                required_limits: config.required_limits.clone(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let caps = surface.get_capabilities(&adapter);
        anyhow::ensure!(
            caps.usages.contains(wgpu::TextureUsages::STORAGE_BINDING),
            "surface does not support storage writes (usages: {:?})",
            caps.usages
        );

        let format = surface::choose_storage_format(&caps.formats, level.features)
            .with_context(|| format!("no storage-capable surface format in {:?}", caps.formats))?;
        let layout = FrameLayout::new(format)
            .with_context(|| format!("surface format {format:?} has no shader layout"))?;
        let present_mode = surface::choose_present_mode(&caps.present_modes, config.wait_for_vsync);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::STORAGE_BINDING,
            format,
            width: size.width,
            height: size.height,
            present_mode,
            alpha_mode: surface::choose_alpha_mode(&caps),
            view_formats: vec![],
            desired_maximum_frame_latency: config.desired_maximum_frame_latency,
        };

        surface.configure(&device, &surface_config);

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lumen frame bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: FrameLayout::CONSTANTS_BINDING,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(FrameConstants::SIZE),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: FrameLayout::TARGET_BINDING,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: FrameLayout::ACCUMULATION_BINDING,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(FrameLayout::ACCUMULATION_TEXEL_SIZE),
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lumen frame pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let constants = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lumen frame constants"),
            size: FrameConstants::SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        log::info!(
            "render context on {} ({:?}): feature level {}, {format:?}, {present_mode:?}",
            info.name,
            info.backend,
            level.name
        );

        Ok(Self {
            surface,
            constants,
            bind_group_layout,
            pipeline_layout,
            queue,
            device,
            config: surface_config,
            layout,
            instance,
        })
    }

    fn reconfigure(&self) {
        self.surface.configure(&self.device, &self.config);
    }
}

impl<'w> RenderBackend for WgpuBackend<'w> {
    type Targets = GpuTargets;
    type Program = GpuProgram;
    type Frame = GpuFrame;

    fn has_context(&self) -> bool {
        self.context.is_some()
    }

    fn create_context(&mut self, size: Extent) -> Result<()> {
        anyhow::ensure!(!size.is_empty(), "window has zero size");
        let context = pollster::block_on(GpuContext::new(self.window, &self.config, size))?;
        self.context = Some(context);
        Ok(())
    }

    fn resize_swap_chain(&mut self, size: Extent) -> Result<()> {
        let ctx = self.context.as_mut().context("render context not created")?;
        ctx.config.width = size.width;
        ctx.config.height = size.height;
        ctx.reconfigure();
        Ok(())
    }

    fn create_targets(&mut self, size: Extent) -> Result<GpuTargets> {
        let ctx = self.context()?;
        let limits = ctx.device.limits();

        let bytes = size.pixel_count() * FrameLayout::ACCUMULATION_TEXEL_SIZE;
        let max = u64::from(limits.max_storage_buffer_binding_size).min(limits.max_buffer_size);
        anyhow::ensure!(
            bytes <= max,
            "accumulation buffer for {}x{} needs {bytes} bytes, device allows {max}",
            size.width,
            size.height
        );

        let accumulation = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lumen accumulation"),
            size: bytes,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });

        let depth = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("lumen depth"),
            size: wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Depth24PlusStencil8,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(GpuTargets {
            accumulation,
            depth,
            depth_view,
        })
    }

    fn release_targets(&mut self, targets: GpuTargets) {
        let GpuTargets {
            accumulation,
            depth,
            depth_view,
        } = targets;

        drop(depth_view);
        depth.destroy();
        accumulation.destroy();
    }

    fn compile_program(
        &mut self,
        source: &str,
        origin: &str,
    ) -> std::result::Result<GpuProgram, CompileError> {
        let Some(ctx) = self.context.as_ref() else {
            return Err(CompileError::new(origin, "render context not created"));
        };

        let wgsl = ctx.layout.prepare(source, origin)?;

        // Anything naga let through but wgpu rejects must not reach the
        // uncaptured-error handler, which panics.
        let scope = ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = ctx.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(origin),
            source: wgpu::ShaderSource::Wgsl(wgsl.into()),
        });

        let pipeline = ctx.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("lumen compute pipeline"),
            layout: Some(&ctx.pipeline_layout),
            module: &module,
            entry_point: Some(ENTRY_POINT),
            compilation_options: Default::default(),
            cache: None,
        });

        pipeline_error(origin, pollster::block_on(scope.pop()))?;

        Ok(GpuProgram { pipeline })
    }

    fn upload_constants(&mut self, constants: &FrameConstants) -> Result<()> {
        let ctx = self.context()?;
        ctx.queue
            .write_buffer(&ctx.constants, 0, bytemuck::bytes_of(constants));
        Ok(())
    }

    fn acquire_frame(&mut self) -> Result<Option<GpuFrame>> {
        let ctx = self.context()?;

        let surface_texture = match ctx.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(err) => {
                return match surface::map_surface_error(&err) {
                    SurfaceErrorAction::Reconfigure => {
                        log::debug!("surface {err}; reconfiguring");
                        ctx.reconfigure();
                        Ok(None)
                    }
                    SurfaceErrorAction::SkipFrame => {
                        log::debug!("surface {err}; skipping frame");
                        Ok(None)
                    }
                    SurfaceErrorAction::Fatal => {
                        Err(err).context("failed to acquire swap chain texture")
                    }
                };
            }
        };

        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("lumen frame encoder"),
            });

        Ok(Some(GpuFrame {
            surface_texture,
            view,
            encoder,
            dispatched: false,
        }))
    }

    fn dispatch(
        &mut self,
        frame: &mut GpuFrame,
        program: &GpuProgram,
        targets: &GpuTargets,
        grid: DispatchGrid,
    ) {
        let Some(ctx) = self.context.as_ref() else { return };

        // The back buffer changes every frame, so the bind group does too.
        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lumen frame bind group"),
            layout: &ctx.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: FrameLayout::CONSTANTS_BINDING,
                    resource: ctx.constants.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: FrameLayout::TARGET_BINDING,
                    resource: wgpu::BindingResource::TextureView(&frame.view),
                },
                wgpu::BindGroupEntry {
                    binding: FrameLayout::ACCUMULATION_BINDING,
                    resource: targets.accumulation.as_entire_binding(),
                },
            ],
        });

        {
            let mut pass = frame.encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("lumen path trace"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&program.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(grid.x, grid.y, grid.z);
        }

        frame.dispatched = true;
    }

    fn present(&mut self, mut frame: GpuFrame) {
        let Some(ctx) = self.context.as_ref() else { return };

        // Without a program the back buffer holds undefined contents.
        if !frame.dispatched {
            let _rpass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("lumen clear"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        }

        ctx.queue.submit(std::iter::once(frame.encoder.finish()));
        drop(frame.view);

        self.window.pre_present_notify();
        frame.surface_texture.present();
    }

    fn release_context(&mut self) {
        let Some(ctx) = self.context.take() else { return };

        // Targets and program are gone by now; anything still counted leaked.
        if let Some(report) = ctx.instance.generate_report() {
            log::debug!("live GPU objects before device release: {report:#?}");
        }

        drop(ctx);
        log::debug!("render context released");
    }
}

fn pipeline_error(origin: &str, error: Option<wgpu::Error>) -> Result<(), CompileError> {
    match error {
        Some(err) => Err(CompileError::new(origin, err.to_string())),
        None => Ok(()),
    }
}
