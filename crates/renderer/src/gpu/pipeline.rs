use wgpu::naga::ShaderStage;

use crate::compile::{
    compile_glsl, dot_fragment_source, dot_vertex_source, text_fragment_source,
    text_vertex_source,
};
use crate::present::DotInstance;
use crate::types::InitError;

/// Per-instance attributes matching [`DotInstance`].
const DOT_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32];

/// Layouts, sampler and both render pipelines. Built once per device.
pub(crate) struct ScenePipelines {
    pub uniform_layout: wgpu::BindGroupLayout,
    pub text_layout: wgpu::BindGroupLayout,
    pub text_sampler: wgpu::Sampler,
    pub dots: wgpu::RenderPipeline,
    pub text: wgpu::RenderPipeline,
}

impl ScenePipelines {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        sample_count: u32,
    ) -> Result<Self, InitError> {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("scene uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let text_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("text texture layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let text_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("text sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let dot_vertex = compile_glsl(device, "dot vertex", &dot_vertex_source(), ShaderStage::Vertex)?;
        let dot_fragment = compile_glsl(
            device,
            "dot fragment",
            &dot_fragment_source(),
            ShaderStage::Fragment,
        )?;
        let text_vertex = compile_glsl(
            device,
            "text vertex",
            &text_vertex_source(),
            ShaderStage::Vertex,
        )?;
        let text_fragment = compile_glsl(
            device,
            "text fragment",
            &text_fragment_source(),
            ShaderStage::Fragment,
        )?;

        let dot_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("dot pipeline layout"),
            bind_group_layouts: &[&uniform_layout],
            push_constant_ranges: &[],
        });
        let text_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("text pipeline layout"),
            bind_group_layouts: &[&uniform_layout, &text_layout],
            push_constant_ranges: &[],
        });

        let instance_buffers = [wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<DotInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &DOT_ATTRIBUTES,
        }];

        let dots = build_pipeline(
            device,
            "dot pipeline",
            &dot_layout,
            (&dot_vertex, &instance_buffers),
            &dot_fragment,
            surface_format,
            sample_count,
        );
        let text = build_pipeline(
            device,
            "text pipeline",
            &text_pipeline_layout,
            (&text_vertex, &[]),
            &text_fragment,
            surface_format,
            sample_count,
        );

        Ok(Self {
            uniform_layout,
            text_layout,
            text_sampler,
            dots,
            text,
        })
    }
}

fn build_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    vertex: (&wgpu::ShaderModule, &[wgpu::VertexBufferLayout<'_>]),
    fragment: &wgpu::ShaderModule,
    surface_format: wgpu::TextureFormat,
    sample_count: u32,
) -> wgpu::RenderPipeline {
    let (vertex_module, buffers) = vertex;
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: vertex_module,
            entry_point: Some("main"),
            buffers,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: sample_count,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        fragment: Some(wgpu::FragmentState {
            module: fragment,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: surface_format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    })
}
