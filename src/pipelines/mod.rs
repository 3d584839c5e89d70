//! Render pipelines and the GPU resource binder.
//!
//! Two shading modes are built up front, each with a bind group layout that
//! is created once and shared by every bind group of that mode:
//!
//! - [`ShadingMode::Flat`]: transform uniform only, position + color vertices
//! - [`ShadingMode::Textured`]: transform uniform, sampler and diffuse texture,
//!   position + uv vertices
//!
//! Further pipelines can be requested through [`PipelineConfig`]; equal
//! configurations share one compiled pipeline.

use std::{collections::HashMap, rc::Rc};

use wgpu::util::DeviceExt;

use crate::{
    context::InitContext,
    data_structures::{
        model::{ColorVertex, TexturedVertex, VertexLayout},
        texture::{self, Texture},
    },
    error::{EngineError, Result},
};

pub mod flat;
pub mod text;
pub mod textured;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShadingMode {
    Flat,
    Textured,
}

impl ShadingMode {
    pub fn vertex_layout(self) -> VertexLayout {
        match self {
            ShadingMode::Flat => VertexLayout::PositionColor,
            ShadingMode::Textured => VertexLayout::PositionUv,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendMode {
    Replace,
    Alpha,
}

impl BlendMode {
    pub fn state(self) -> wgpu::BlendState {
        match self {
            BlendMode::Replace => wgpu::BlendState::REPLACE,
            BlendMode::Alpha => text::TEXT_BLEND,
        }
    }
}

/// Structural description of a custom pipeline. Used directly as the cache
/// key, so two configs compare equal exactly when every field matches.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PipelineConfig {
    pub label: String,
    /// Name of a shader registered with [`GpuResourceBinder::shader`].
    pub shader: String,
    /// Selects both the vertex layout and the bind group layout.
    pub shading: ShadingMode,
    pub color_format: wgpu::TextureFormat,
    pub blend: BlendMode,
    pub depth_write: bool,
}

pub(crate) fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub(crate) fn depth_state(write: bool) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: Texture::DEPTH_FORMAT,
        depth_write_enabled: write,
        depth_compare: wgpu::CompareFunction::Less,
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

/// `layout: None` lets wgpu derive the layout from the shader.
#[allow(clippy::too_many_arguments)]
pub fn mk_render_pipeline(
    device: &wgpu::Device,
    layout: Option<&wgpu::PipelineLayout>,
    color_format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
    depth_stencil: Option<wgpu::DepthStencilState>,
    vertex_layouts: &[wgpu::VertexBufferLayout],
    shader: &wgpu::ShaderModule,
    label: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some(label),
        layout,
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: vertex_layouts,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            // flat models are viewed from both sides while spinning
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview_mask: None,
    })
}

fn compile_shader(device: &wgpu::Device, name: &str, source: &str) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(name),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    })
}

/// Owns pipelines, layouts, shaders and the shared sampler, and wraps buffer
/// creation for everything drawn with them.
///
/// Buffers are not checked against the pipeline they end up bound to; a
/// vertex buffer must use the [`VertexLayout`] of its [`ShadingMode`].
pub struct GpuResourceBinder {
    gpu: InitContext,
    flat_layout: wgpu::BindGroupLayout,
    textured_layout: wgpu::BindGroupLayout,
    flat_pipeline: wgpu::RenderPipeline,
    textured_pipeline: wgpu::RenderPipeline,
    sampler: wgpu::Sampler,
    shaders: HashMap<String, Rc<wgpu::ShaderModule>>,
    pipelines: HashMap<PipelineConfig, Rc<wgpu::RenderPipeline>>,
}

impl GpuResourceBinder {
    pub const FLAT_SHADER: &'static str = "flat";
    pub const TEXTURED_SHADER: &'static str = "textured";

    pub fn new(gpu: InitContext) -> Self {
        let device = &gpu.device;
        let flat_shader = Rc::new(compile_shader(device, Self::FLAT_SHADER, flat::SHADER));
        let textured_shader = Rc::new(compile_shader(
            device,
            Self::TEXTURED_SHADER,
            textured::SHADER,
        ));

        let flat_layout = flat::mk_bind_group_layout(device);
        let textured_layout = textured::mk_bind_group_layout(device);
        let flat_pipeline = flat::mk_flat_pipeline(device, gpu.format, &flat_layout, &flat_shader);
        let textured_pipeline =
            textured::mk_textured_pipeline(device, gpu.format, &textured_layout, &textured_shader);
        let sampler = texture::create_default_sampler(device);

        let shaders = HashMap::from([
            (Self::FLAT_SHADER.to_string(), flat_shader),
            (Self::TEXTURED_SHADER.to_string(), textured_shader),
        ]);

        Self {
            gpu,
            flat_layout,
            textured_layout,
            flat_pipeline,
            textured_pipeline,
            sampler,
            shaders,
            pipelines: HashMap::new(),
        }
    }

    pub fn gpu(&self) -> &InitContext {
        &self.gpu
    }

    pub fn pipeline(&self, mode: ShadingMode) -> &wgpu::RenderPipeline {
        match mode {
            ShadingMode::Flat => &self.flat_pipeline,
            ShadingMode::Textured => &self.textured_pipeline,
        }
    }

    pub fn bind_group_layout(&self, mode: ShadingMode) -> &wgpu::BindGroupLayout {
        match mode {
            ShadingMode::Flat => &self.flat_layout,
            ShadingMode::Textured => &self.textured_layout,
        }
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    /// Compiles `source` under `name`, or returns the module already
    /// registered under that name.
    pub fn shader(&mut self, name: &str, source: &str) -> Rc<wgpu::ShaderModule> {
        if let Some(module) = self.shaders.get(name) {
            return module.clone();
        }
        let module = Rc::new(compile_shader(&self.gpu.device, name, source));
        self.shaders.insert(name.to_string(), module.clone());
        module
    }

    /// Returns the pipeline for `config`, building it on first request.
    pub fn custom_pipeline(&mut self, config: &PipelineConfig) -> Result<Rc<wgpu::RenderPipeline>> {
        if let Some(pipeline) = self.pipelines.get(config) {
            return Ok(pipeline.clone());
        }
        let shader = self
            .shaders
            .get(&config.shader)
            .cloned()
            .ok_or(EngineError::ResourceNotReady("custom pipeline shader"))?;

        let layout = self
            .gpu
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&config.label),
                bind_group_layouts: &[self.bind_group_layout(config.shading)],
                immediate_size: 0,
            });
        let vertex_layout = match config.shading {
            ShadingMode::Flat => ColorVertex::desc(),
            ShadingMode::Textured => TexturedVertex::desc(),
        };
        let pipeline = Rc::new(mk_render_pipeline(
            &self.gpu.device,
            Some(&layout),
            config.color_format,
            Some(config.blend.state()),
            Some(depth_state(config.depth_write)),
            &[vertex_layout],
            &shader,
            &config.label,
        ));
        log::debug!("built custom pipeline {}", config.label);
        self.pipelines.insert(config.clone(), pipeline.clone());
        Ok(pipeline)
    }

    /// Allocates a buffer and uploads `contents` in one step.
    pub fn create_buffer_init(
        &self,
        label: &str,
        contents: &[u8],
        usage: wgpu::BufferUsages,
    ) -> wgpu::Buffer {
        self.gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage,
            })
    }

    pub fn vertex_buffer(&self, label: &str, vertices: &[f32]) -> wgpu::Buffer {
        self.create_buffer_init(
            label,
            bytemuck::cast_slice(vertices),
            wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        )
    }

    /// `T` is `u16` or `u32`.
    pub fn index_buffer<T: bytemuck::Pod>(&self, label: &str, indices: &[T]) -> wgpu::Buffer {
        self.create_buffer_init(
            label,
            bytemuck::cast_slice(indices),
            wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
        )
    }

    /// Zero-initialized uniform buffer of `size` bytes.
    pub fn uniform_buffer(&self, label: &str, size: wgpu::BufferAddress) -> wgpu::Buffer {
        self.gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    pub fn write_buffer(&self, buffer: &wgpu::Buffer, offset: wgpu::BufferAddress, data: &[u8]) {
        self.gpu.queue.write_buffer(buffer, offset, data);
    }

    /// Bind group for flat shading: just the transform uniform.
    pub fn flat_bind_group(&self, uniform: &wgpu::Buffer) -> wgpu::BindGroup {
        self.gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.flat_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform.as_entire_binding(),
            }],
            label: Some("flat_bind_group"),
        })
    }

    /// Bind group for textured shading, sampling `texture` with the shared sampler.
    pub fn textured_bind_group(&self, uniform: &wgpu::Buffer, texture: &Texture) -> wgpu::BindGroup {
        self.gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.textured_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
            ],
            label: Some("textured_bind_group"),
        })
    }
}
