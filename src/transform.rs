//! Per-frame transform: a rotation about the view axis followed by an
//! aspect-correcting projection.

use cgmath::{Matrix4, Rad, SquareMatrix};

/// Width over height; a zero height counts as square.
pub fn aspect_ratio(width: u32, height: u32) -> f32 {
    if height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    }
}

/// Shrinks the longer screen axis so geometry keeps its proportions.
///
/// Landscape (`aspect >= 1`) scales x by `scale / aspect`; portrait scales y
/// by `scale * aspect`. The other axis is scaled by `scale`.
pub fn projection(aspect: f32, scale: f32) -> Matrix4<f32> {
    if aspect >= 1.0 {
        Matrix4::from_nonuniform_scale(scale / aspect, scale, 1.0)
    } else {
        Matrix4::from_nonuniform_scale(scale, scale * aspect, 1.0)
    }
}

pub fn rotation(angle: f32) -> Matrix4<f32> {
    Matrix4::from_angle_z(Rad(angle))
}

/// Uniform layout of the transform buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TransformUniform {
    pub matrix: [[f32; 4]; 4],
}

impl From<Matrix4<f32>> for TransformUniform {
    fn from(m: Matrix4<f32>) -> Self {
        Self { matrix: m.into() }
    }
}

#[derive(Clone, Debug)]
pub struct TransformState {
    /// Radians; only ever grows.
    pub angle: f32,
    pub aspect: f32,
    pub scale: f32,
    matrix: Matrix4<f32>,
}

impl TransformState {
    pub fn new(scale: f32) -> Self {
        Self {
            angle: 0.0,
            aspect: 1.0,
            scale,
            matrix: Matrix4::identity(),
        }
        .recomputed()
    }

    fn recomputed(mut self) -> Self {
        self.recompute();
        self
    }

    fn recompute(&mut self) {
        self.matrix = projection(self.aspect, self.scale) * rotation(self.angle);
    }

    /// Advances the rotation by `dt` seconds at `angular_rate` rad/s.
    pub fn advance(&mut self, dt: f32, angular_rate: f32) {
        self.angle += dt * angular_rate;
        self.recompute();
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.aspect = aspect_ratio(width, height);
        self.recompute();
    }

    pub fn matrix(&self) -> Matrix4<f32> {
        self.matrix
    }

    pub fn uniform(&self) -> TransformUniform {
        self.matrix.into()
    }
}
