//! Mesh and material records produced by the asset parser.
//!
//! A [`MeshRecord`] is a flat, interleaved `f32` stream. Its [`VertexLayout`]
//! states which of the two vertex formats the stream uses, and that format has
//! to match the pipeline the buffer is eventually bound to.

/// Interleaved vertex formats understood by the two shading modes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexLayout {
    /// position xyz + color rgb
    PositionColor,
    /// position xyz + uv
    PositionUv,
}

impl VertexLayout {
    pub const fn floats_per_vertex(self) -> usize {
        match self {
            VertexLayout::PositionColor => 6,
            VertexLayout::PositionUv => 5,
        }
    }

    pub fn desc(self) -> wgpu::VertexBufferLayout<'static> {
        match self {
            VertexLayout::PositionColor => ColorVertex::desc(),
            VertexLayout::PositionUv => TexturedVertex::desc(),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ColorVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

impl ColorVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ColorVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TexturedVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl TexturedVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<TexturedVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// Interleaved vertex data for non-indexed drawing, three vertices per face.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshRecord {
    pub vertices: Vec<f32>,
    pub vertex_count: u32,
    pub layout: VertexLayout,
}

impl MeshRecord {
    pub fn new(vertices: Vec<f32>, layout: VertexLayout) -> Self {
        let vertex_count = (vertices.len() / layout.floats_per_vertex()) as u32;
        Self {
            vertices,
            vertex_count,
            layout,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_count == 0
    }

    /// Six colored vertices forming a unit quad, used when the startup model
    /// cannot be loaded so there is always something to draw.
    pub fn fallback_quad() -> Self {
        #[rustfmt::skip]
        let vertices = vec![
            // position           color
            -0.5,  0.5, 0.0,      1.0, 0.0, 0.0, // top left
            -0.5, -0.5, 0.0,      0.0, 1.0, 0.0, // bottom left
             0.5, -0.5, 0.0,      0.0, 0.0, 1.0, // bottom right

            -0.5,  0.5, 0.0,      1.0, 0.0, 0.0, // top left
             0.5, -0.5, 0.0,      0.0, 0.0, 1.0, // bottom right
             0.5,  0.5, 0.0,      1.0, 1.0, 0.0, // top right
        ];
        Self::new(vertices, VertexLayout::PositionColor)
    }
}

/// One `newmtl` block. Only the diffuse map is consumed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MaterialRecord {
    pub name: String,
    /// Already resolved against the material library's location.
    pub diffuse_texture: Option<String>,
}

/// A loaded model: geometry plus the diffuse texture it should be drawn with.
/// Immutable once created; shared out of the resource cache.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelAsset {
    pub mesh: MeshRecord,
    pub texture_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_match_vertex_structs() {
        assert_eq!(
            ColorVertex::desc().array_stride as usize,
            VertexLayout::PositionColor.floats_per_vertex() * 4
        );
        assert_eq!(
            TexturedVertex::desc().array_stride as usize,
            VertexLayout::PositionUv.floats_per_vertex() * 4
        );
    }

    #[test]
    fn fallback_quad_has_six_colored_vertices() {
        let quad = MeshRecord::fallback_quad();
        assert_eq!(quad.vertex_count, 6);
        assert_eq!(quad.vertices.len(), 36);
        assert_eq!(quad.layout, VertexLayout::PositionColor);
        let first: &[ColorVertex] = bytemuck::cast_slice(&quad.vertices[..6]);
        assert_eq!(first[0].color, [1.0, 0.0, 0.0]);
    }
}
