// GPU particle renderer.
//
// 1. Upload the picture once and the trail raster whenever it is flagged dirty
// 2. Draw every particle as an instanced quad with additive blending (particles.wgsl)
// 3. Copy the offscreen target into a staging buffer and read it back for the window

use crate::camera::PerspectiveCamera;
use crate::error::Error;
use crate::particles::{ParticleField, ParticleVertex};
use crate::render::{ParticleRenderer, CLEAR_COLOR};
use crate::trail::TrailRaster;
use crate::types::{pack_rgb, unpack_rgb, FrameBuffer};
use image::RgbaImage;
use tracing::{debug, info, warn};
use wgpu::util::DeviceExt;

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const PARTICLE_ATTRIBUTES: [wgpu::VertexAttribute; 4] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2, 2 => Float32, 3 => Float32];

/// Uniform block, laid out to match `Uniforms` in particles.wgsl (144 bytes).
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Uniforms {
    view: [[f32; 4]; 4],
    projection: [[f32; 4]; 4],
    resolution: [f32; 2],
    point_scale: f32,
    displacement_strength: f32,
}

/// Offscreen colour target plus the buffer it is copied into for readback.
struct Target {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    readback: wgpu::Buffer,
    width: u32,
    height: u32,
    padded_bytes_per_row: u32,
}

pub struct GpuRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    instance_buffer: wgpu::Buffer,
    instance_count: u32,
    trail_texture: wgpu::Texture,
    trail_size: (u32, u32),
    trail_bytes: Vec<u8>, // reused staging copy of the raster
    target: Option<Target>,
}

fn create_texture(device: &wgpu::Device, label: &str, width: u32, height: u32, usage: wgpu::TextureUsages) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TARGET_FORMAT,
        usage,
        view_formats: &[],
    })
}

fn write_rgba(queue: &wgpu::Queue, texture: &wgpu::Texture, data: &[u8], width: u32, height: u32) {
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(width * 4),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
    );
}

/// Buffer copies need rows aligned to 256 bytes.
fn padded_row_bytes(width: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (width * 4).div_ceil(align) * align
}

/// Largest offscreen size that fits both the texture side limit and the readback
/// buffer limit, keeping the frame's aspect ratio.
fn target_extent(width: u32, height: u32, max_side: u32, max_buffer: u64) -> (u32, u32) {
    let (w, h) = (width.max(1), height.max(1));
    let side_scale = (max_side as f64 / w.max(h) as f64).min(1.0);
    let mut scale = side_scale;
    loop {
        let tw = ((w as f64 * scale).floor() as u32).clamp(1, max_side);
        let th = ((h as f64 * scale).floor() as u32).clamp(1, max_side);
        if padded_row_bytes(tw) as u64 * th as u64 <= max_buffer || (tw == 1 && th == 1) {
            return (tw, th);
        }
        scale *= 0.9;
    }
}

/// Copy a padded RGBA8 readback (`src_width` x `src_height`, rows `padded_bytes_per_row`
/// apart) into `out`. Nearest-neighbour scaled when the target is smaller than the frame.
fn unpad_readback(data: &[u8], padded_bytes_per_row: usize, src_width: usize, src_height: usize, out: &mut FrameBuffer) {
    if out.width == 0 || out.height == 0 || src_width == 0 || src_height == 0 {
        return;
    }
    for y in 0..out.height {
        let start = (y * src_height / out.height) * padded_bytes_per_row;
        let row = &data[start..start + src_width * 4];
        let dst = &mut out.pixels[y * out.width..(y + 1) * out.width];
        for (x, px) in dst.iter_mut().enumerate() {
            let sx = (x * src_width / out.width) * 4;
            *px = pack_rgb(row[sx], row[sx + 1], row[sx + 2]);
        }
    }
}

impl GpuRenderer {
    /// Blocking wrapper: the frame loop is synchronous.
    pub fn new(picture: &RgbaImage, field: &ParticleField, trail: &TrailRaster) -> Result<Self, Error> {
        pollster::block_on(Self::init(picture, field, trail))
    }

    async fn init(picture: &RgbaImage, field: &ParticleField, trail: &TrailRaster) -> Result<Self, Error> {
        info!("Initializing GPU particle renderer");

        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| Error::GpuInit("no suitable adapter".into()))?;

        let adapter_info = adapter.get_info();
        info!(name = %adapter_info.name, backend = ?adapter_info.backend, "GPU adapter selected");

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("particle_device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(|e| Error::GpuInit(format!("request device: {e}")))?;

        // Catch shader/pipeline validation errors instead of panicking in the error callback.
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("particles_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/particles.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("particles_bind_group_layout"),
            entries: &[
                // Uniforms
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Picture texture
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Displacement (trail) texture
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("particles_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let additive = wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("particles_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<ParticleVertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Instance,
                    attributes: &PARTICLE_ATTRIBUTES,
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TARGET_FORMAT,
                    blend: Some(additive),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        // Picture: uploaded once.
        let picture_texture = create_texture(
            &device,
            "picture_texture",
            picture.width(),
            picture.height(),
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );
        write_rgba(&queue, &picture_texture, picture.as_raw(), picture.width(), picture.height());

        // Trail: rewritten whenever the raster is invalidated.
        let trail_size = (trail.width() as u32, trail.height() as u32);
        let trail_texture = create_texture(
            &device,
            "trail_texture",
            trail_size.0,
            trail_size.1,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("particles_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("particles_uniforms"),
            size: std::mem::size_of::<Uniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Per-point attributes never change after creation: one upload.
        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("particles_instances"),
            contents: bytemuck::cast_slice(field.vertices()),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let picture_view = picture_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let trail_view = trail_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("particles_bind_group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: uniform_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(&picture_view) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::TextureView(&trail_view) },
                wgpu::BindGroupEntry { binding: 3, resource: wgpu::BindingResource::Sampler(&sampler) },
            ],
        });

        if let Some(err) = device.pop_error_scope().await {
            return Err(Error::GpuInit(format!("pipeline setup: {err}")));
        }

        debug!(particles = field.len(), "GPU particle pipeline ready");

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group,
            uniform_buffer,
            instance_buffer,
            instance_count: field.len() as u32,
            trail_texture,
            trail_size,
            trail_bytes: Vec::new(),
            target: None,
        })
    }

    /// (Re)allocate the offscreen target when the frame size changes.
    /// Frames beyond the device limits render smaller and are scaled up on readback.
    fn ensure_target(&mut self, width: u32, height: u32) {
        let limits = self.device.limits();
        let (tw, th) = target_extent(width, height, limits.max_texture_dimension_2d, limits.max_buffer_size);
        if let Some(t) = &self.target {
            if t.width == tw && t.height == th {
                return;
            }
        }

        if (tw, th) != (width, height) {
            warn!(width, height, target_width = tw, target_height = th, "Frame exceeds GPU limits, rendering smaller");
        }
        debug!(width = tw, height = th, "Allocating offscreen target");

        let texture = create_texture(
            &self.device,
            "particles_target",
            tw,
            th,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let padded_bytes_per_row = padded_row_bytes(tw);
        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("particles_readback"),
            size: padded_bytes_per_row as u64 * th as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        self.target = Some(Target { texture, view, readback, width: tw, height: th, padded_bytes_per_row });
    }

    /// Upload the raster only when it was invalidated since the last frame.
    fn upload_trail(&mut self, trail: &mut TrailRaster) {
        if !trail.texture.take_dirty() {
            return;
        }
        trail.write_rgba8(&mut self.trail_bytes);
        write_rgba(&self.queue, &self.trail_texture, &self.trail_bytes, self.trail_size.0, self.trail_size.1);
    }
}

impl ParticleRenderer for GpuRenderer {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn render(
        &mut self,
        camera: &PerspectiveCamera,
        field: &ParticleField,
        trail: &mut TrailRaster,
        out: &mut FrameBuffer,
    ) -> Result<(), Error> {
        self.upload_trail(trail);
        self.ensure_target(out.width as u32, out.height as u32);

        let params = field.params();
        let uniforms = Uniforms {
            view: camera.view().to_cols_array_2d(),
            projection: camera.projection().to_cols_array_2d(),
            resolution: field.resolution(),
            point_scale: params.point_scale,
            displacement_strength: params.displacement_strength,
        };
        self.queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let Some(target) = self.target.as_ref() else {
            return Err(Error::GpuReadback("offscreen target missing".into()));
        };

        let (cr, cg, cb) = unpack_rgb(CLEAR_COLOR);
        let clear = wgpu::Color {
            r: cr as f64 / 255.0,
            g: cg as f64 / 255.0,
            b: cb as f64 / 255.0,
            a: 1.0,
        };

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("particles_encoder"),
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("particles_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.set_vertex_buffer(0, self.instance_buffer.slice(..));
            pass.draw(0..4, 0..self.instance_count);
        }

        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &target.readback,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(target.padded_bytes_per_row),
                    rows_per_image: Some(target.height),
                },
            },
            wgpu::Extent3d { width: target.width, height: target.height, depth_or_array_layers: 1 },
        );

        self.queue.submit(std::iter::once(encoder.finish()));

        // Read back results
        let slice = target.readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|e| Error::GpuReadback(format!("map callback dropped: {e}")))?
            .map_err(|e| Error::GpuReadback(format!("buffer map: {e:?}")))?;

        {
            let data = slice.get_mapped_range();
            unpad_readback(
                &data,
                target.padded_bytes_per_row as usize,
                target.width as usize,
                target.height as usize,
                out,
            );
        }
        target.readback.unmap();

        Ok(())
    }
}
