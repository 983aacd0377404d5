use std::time::{Duration, Instant};

use compositor::TextSurface;
use motion::Viewport;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, warn};
use wgpu::util::{DeviceExt, TextureDataOrder};
use winit::dpi::PhysicalSize;

use super::context::GpuContext;
use super::pipeline::ScenePipelines;
use super::uniforms::SceneUniforms;
use crate::present::{Color, DotInstance, Presenter};
use crate::types::{Antialiasing, InitError};

const INITIAL_DOT_CAPACITY: usize = 32;

struct MultisampleTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    sample_count: u32,
    size: PhysicalSize<u32>,
}

impl MultisampleTarget {
    fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        size: PhysicalSize<u32>,
        sample_count: u32,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("msaa color target"),
            size: wgpu::Extent3d {
                width: size.width.max(1),
                height: size.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
            sample_count,
            size,
        }
    }

    fn matches(&self, size: PhysicalSize<u32>, sample_count: u32) -> bool {
        self.size == size && self.sample_count == sample_count
    }
}

struct TextTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
}

/// Per-second frame counter for debug logging.
struct FrameStats {
    frames: u32,
    since: Instant,
}

impl FrameStats {
    fn new() -> Self {
        Self {
            frames: 0,
            since: Instant::now(),
        }
    }

    fn record(&mut self, dots: usize, has_text: bool) {
        self.frames += 1;
        let elapsed = self.since.elapsed();
        if elapsed >= Duration::from_secs(1) {
            debug!(
                fps = (self.frames as f32 / elapsed.as_secs_f32()).round(),
                dots,
                has_text,
                "render stats"
            );
            self.frames = 0;
            self.since = Instant::now();
        }
    }
}

/// `wgpu` implementation of [`Presenter`].
///
/// Calls between `clear` and `present` only record state; `present` acquires
/// the swapchain image and encodes a single render pass.
pub(crate) struct GpuPresenter {
    context: GpuContext,
    pipelines: ScenePipelines,
    uniforms: SceneUniforms,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
    dot_count: u32,
    clear_color: Color,
    text: Option<TextTexture>,
    draw_text: bool,
    multisample: Option<MultisampleTarget>,
    stats: FrameStats,
}

impl GpuPresenter {
    pub(crate) fn new<T>(
        target: &T,
        size: PhysicalSize<u32>,
        antialiasing: Antialiasing,
    ) -> Result<Self, InitError>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, size, antialiasing)?;
        let pipelines =
            ScenePipelines::new(&context.device, context.surface_format, context.sample_count)?;

        let uniforms = SceneUniforms::new(context.size.width, context.size.height);
        let uniform_buffer = context
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("scene uniforms"),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        let uniform_bind_group = context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("scene uniform bind group"),
                layout: &pipelines.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });
        let instance_buffer = create_instance_buffer(&context.device, INITIAL_DOT_CAPACITY);

        let multisample = (context.sample_count > 1).then(|| {
            MultisampleTarget::new(
                &context.device,
                context.surface_format,
                context.size,
                context.sample_count,
            )
        });

        Ok(Self {
            context,
            pipelines,
            uniforms,
            uniform_buffer,
            uniform_bind_group,
            instance_buffer,
            instance_capacity: INITIAL_DOT_CAPACITY,
            dot_count: 0,
            clear_color: Color::UPDATE_BLUE,
            text: None,
            draw_text: false,
            multisample,
            stats: FrameStats::new(),
        })
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if self.context.resize(new_size) {
            self.uniforms.set_viewport(new_size.width, new_size.height);
            self.ensure_multisample_target();
        }
    }

    /// Recovers from `Lost`/`Outdated` surfaces.
    pub(crate) fn reconfigure(&mut self) {
        self.context.reconfigure();
    }

    fn ensure_multisample_target(&mut self) {
        let sample_count = self.context.sample_count;
        if sample_count <= 1 {
            self.multisample = None;
            return;
        }
        let size = self.context.size;
        let stale = self
            .multisample
            .as_ref()
            .is_none_or(|target| !target.matches(size, sample_count));
        if stale {
            self.multisample = Some(MultisampleTarget::new(
                &self.context.device,
                self.context.surface_format,
                size,
                sample_count,
            ));
        }
    }

    fn encode(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        let (attachment_view, resolve_target) = match self.multisample.as_ref() {
            Some(msaa) => (&msaa.view, Some(view)),
            None => (view, None),
        };
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("scene pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: attachment_view,
                depth_slice: None,
                resolve_target,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear_color.to_wgpu()),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        if self.dot_count > 0 {
            pass.set_pipeline(&self.pipelines.dots);
            pass.set_vertex_buffer(0, self.instance_buffer.slice(..));
            pass.draw(0..6, 0..self.dot_count);
        }
        if let (true, Some(text)) = (self.draw_text, self.text.as_ref()) {
            pass.set_pipeline(&self.pipelines.text);
            pass.set_bind_group(1, &text.bind_group, &[]);
            pass.draw(0..6, 0..1);
        }
    }
}

fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("dot instances"),
        size: (capacity * std::mem::size_of::<DotInstance>()) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

impl Presenter for GpuPresenter {
    type Error = wgpu::SurfaceError;

    fn viewport(&self) -> Viewport {
        Viewport::new(self.context.size.width, self.context.size.height)
    }

    fn clear(&mut self, color: Color) {
        self.clear_color = color;
        self.dot_count = 0;
        self.draw_text = false;
    }

    fn draw_dots(&mut self, dots: &[DotInstance], color: Color) {
        if dots.len() > self.instance_capacity {
            self.instance_capacity = dots.len().next_power_of_two();
            self.instance_buffer = create_instance_buffer(&self.context.device, self.instance_capacity);
        }
        if !dots.is_empty() {
            self.context
                .queue
                .write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(dots));
        }
        self.dot_count = dots.len() as u32;
        self.uniforms.set_dot_color(color);
    }

    fn upload_text(&mut self, surface: &TextSurface) {
        let (width, height) = (surface.width(), surface.height());
        let extent = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        if let Some(existing) = self
            .text
            .as_ref()
            .filter(|text| text.width == width && text.height == height)
        {
            self.context.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &existing.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                surface.as_raw(),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(width * 4),
                    rows_per_image: Some(height),
                },
                extent,
            );
            return;
        }

        let texture = self.context.device.create_texture_with_data(
            &self.context.queue,
            &wgpu::TextureDescriptor {
                label: Some("status text"),
                size: extent,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            TextureDataOrder::LayerMajor,
            surface.as_raw(),
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self
            .context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("status text bind group"),
                layout: &self.pipelines.text_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.pipelines.text_sampler),
                    },
                ],
            });
        debug!(width, height, "allocated text texture");
        self.text = Some(TextTexture {
            texture,
            bind_group,
            width,
            height,
        });
    }

    fn draw_text(&mut self, origin: (f32, f32)) {
        if let Some(text) = self.text.as_ref() {
            self.uniforms
                .set_text_rect(origin, (text.width, text.height));
            self.draw_text = true;
        }
    }

    fn present(&mut self) -> Result<(), wgpu::SurfaceError> {
        let frame = self.context.surface.get_current_texture()?;
        if frame.suboptimal {
            warn!("surface is suboptimal; reconfiguring after this frame");
        }
        let suboptimal = frame.suboptimal;

        self.context
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&self.uniforms));

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("frame encoder"),
                });
        self.encode(&mut encoder, &view);
        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();

        if suboptimal {
            self.context.reconfigure();
        }
        self.stats
            .record(self.dot_count as usize, self.draw_text);
        Ok(())
    }
}
