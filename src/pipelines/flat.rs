use crate::data_structures::model::ColorVertex;

pub const SHADER: &str = include_str!("flat.wgsl");

/// Transform uniform at binding 0, nothing else.
pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[super::uniform_entry(0)],
        label: Some("flat_bind_group_layout"),
    })
}

pub fn mk_flat_pipeline(
    device: &wgpu::Device,
    color_format: wgpu::TextureFormat,
    bind_group_layout: &wgpu::BindGroupLayout,
    shader: &wgpu::ShaderModule,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Flat Pipeline Layout"),
        bind_group_layouts: &[bind_group_layout],
        immediate_size: 0,
    });

    super::mk_render_pipeline(
        device,
        Some(&layout),
        color_format,
        Some(wgpu::BlendState::REPLACE),
        Some(super::depth_state(true)),
        &[ColorVertex::desc()],
        shader,
        "flat pipeline",
    )
}
