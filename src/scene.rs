//! The spinning scene.
//!
//! A [`SceneRenderer`] owns the drawables, the shared transform uniform and
//! the resource manager they were loaded through. Each frame it advances the
//! rotation, writes the transform and records a single render pass that draws
//! every drawable and then every [`Overlay`].

use std::{iter, rc::Rc};

use crate::{
    config::EngineConfig,
    context::InitContext,
    data_structures::{
        model::{MeshRecord, ModelAsset},
        texture::Texture,
    },
    error::Result,
    pipelines::{GpuResourceBinder, ShadingMode},
    resources::{AssetSource, ResourceManager},
    transform::{TransformState, TransformUniform},
};

/// Something drawn on top of the scene inside the same pass.
pub trait Overlay {
    /// Called once per frame before the pass is recorded, with the size of
    /// the target in pixels.
    fn prepare(&self, width: u32, height: u32);

    /// Records draw calls and returns how many were issued.
    fn draw(&self, pass: &mut wgpu::RenderPass<'_>) -> u32;
}

/// One mesh on the GPU, ready for a single non-indexed draw.
///
/// The vertex buffer belongs to the drawable and is released on drop. The
/// texture is shared with the resource cache and only kept alive here.
pub struct Drawable {
    vertex_buffer: wgpu::Buffer,
    vertex_count: u32,
    mode: ShadingMode,
    bind_group: wgpu::BindGroup,
    texture: Option<Rc<Texture>>,
}

impl Drawable {
    pub fn mode(&self) -> ShadingMode {
        self.mode
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn texture(&self) -> Option<&Texture> {
        self.texture.as_deref()
    }
}

impl Drop for Drawable {
    fn drop(&mut self) {
        self.vertex_buffer.destroy();
    }
}

pub struct SceneRenderer<S> {
    binder: GpuResourceBinder,
    resources: ResourceManager<S>,
    transform: TransformState,
    transform_buffer: wgpu::Buffer,
    drawables: Vec<Drawable>,
    angular_rate: f32,
    clear_colour: wgpu::Color,
    size: (u32, u32),
}

impl<S: AssetSource + 'static> SceneRenderer<S> {
    /// Builds both shading pipelines on `gpu` and binds `resources` to it.
    pub fn new(gpu: InitContext, mut resources: ResourceManager<S>, config: &EngineConfig) -> Self {
        resources.bind_device(gpu.clone());
        let binder = GpuResourceBinder::new(gpu);
        let transform = TransformState::new(config.projection_scale);
        let transform_buffer = binder.create_buffer_init(
            "transform uniform",
            bytemuck::cast_slice(&[transform.uniform()]),
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        );
        Self {
            binder,
            resources,
            transform,
            transform_buffer,
            drawables: Vec::new(),
            angular_rate: config.angular_rate,
            clear_colour: config.clear_colour,
            size: (1, 1),
        }
    }

    pub fn binder(&self) -> &GpuResourceBinder {
        &self.binder
    }

    pub fn binder_mut(&mut self) -> &mut GpuResourceBinder {
        &mut self.binder
    }

    pub fn resources(&self) -> &ResourceManager<S> {
        &self.resources
    }

    pub fn transform(&self) -> &TransformState {
        &self.transform
    }

    pub fn drawables(&self) -> &[Drawable] {
        &self.drawables
    }

    pub fn set_clear_colour(&mut self, colour: wgpu::Color) {
        self.clear_colour = colour;
    }

    /// Loads `url` and adds it as a drawable, never failing.
    ///
    /// The textured variant is tried first. Without a diffuse texture, or when
    /// the texture cannot be loaded, the model is loaded again in the colored
    /// layout and drawn flat. If that fails too, the embedded quad is drawn
    /// instead. Returns the shading mode that was used.
    pub async fn load_scene(&mut self, url: &str) -> ShadingMode {
        match self.load_textured(url).await {
            Ok(Some((asset, texture))) => {
                if self.add_mesh(&asset.mesh, Some(texture)).is_some() {
                    return ShadingMode::Textured;
                }
            }
            Ok(None) => (),
            Err(e) => log::warn!("drawing {url} without texture: {e}"),
        }

        let mesh = match self.resources.load_model(url).await {
            Ok(asset) if !asset.mesh.is_empty() => asset.mesh.clone(),
            Ok(_) => {
                log::warn!("{url} has no faces, drawing fallback quad");
                MeshRecord::fallback_quad()
            }
            Err(e) => {
                log::warn!("failed to load {url}, drawing fallback quad: {e}");
                MeshRecord::fallback_quad()
            }
        };
        self.add_mesh(&mesh, None);
        ShadingMode::Flat
    }

    async fn load_textured(&self, url: &str) -> Result<Option<(Rc<ModelAsset>, Rc<Texture>)>> {
        let asset = self.resources.load_model_with_texture(url).await?;
        let Some(path) = asset.texture_path.as_deref() else {
            return Ok(None);
        };
        if asset.mesh.is_empty() {
            return Ok(None);
        }
        let texture = self.resources.load_texture(path).await?;
        Ok(Some((asset, texture)))
    }

    /// Uploads `mesh` as a new drawable, textured when `texture` is given.
    ///
    /// Returns `None` for a mesh without faces, or if the mesh layout does not
    /// fit the shading mode the texture selects.
    pub fn add_mesh(&mut self, mesh: &MeshRecord, texture: Option<Rc<Texture>>) -> Option<usize> {
        if mesh.is_empty() {
            log::warn!("skipping {:?} mesh without faces", mesh.layout);
            return None;
        }
        let mode = if texture.is_some() {
            ShadingMode::Textured
        } else {
            ShadingMode::Flat
        };
        if mesh.layout != mode.vertex_layout() {
            log::warn!("{:?} mesh cannot be drawn with {mode:?} shading", mesh.layout);
            return None;
        }

        let vertex_buffer = self.binder.vertex_buffer("scene vertex buffer", &mesh.vertices);
        let bind_group = match &texture {
            Some(texture) => self.binder.textured_bind_group(&self.transform_buffer, texture),
            None => self.binder.flat_bind_group(&self.transform_buffer),
        };
        self.drawables.push(Drawable {
            vertex_buffer,
            vertex_count: mesh.vertex_count,
            mode,
            bind_group,
            texture,
        });
        log::debug!("added {mode:?} drawable with {} vertices", mesh.vertex_count);
        Some(self.drawables.len() - 1)
    }

    /// Drops every drawable and its vertex buffer.
    pub fn clear(&mut self) {
        self.drawables.clear();
    }

    /// Drawable size in pixels; feeds the aspect ratio and the viewport.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.size = (width, height);
        self.transform.set_viewport(width, height);
    }

    /// Advances the rotation by `dt` seconds and uploads the new transform.
    pub fn update(&mut self, dt: f32) {
        self.transform.advance(dt, self.angular_rate);
        self.transform.set_viewport(self.size.0, self.size.1);
        let uniform: TransformUniform = self.transform.uniform();
        self.binder
            .write_buffer(&self.transform_buffer, 0, bytemuck::cast_slice(&[uniform]));
    }

    /// Records and submits one frame into `color_view`. Returns the number of
    /// draw calls issued, overlays included.
    pub fn render(
        &self,
        color_view: &wgpu::TextureView,
        depth_view: &wgpu::TextureView,
        overlays: &[&dyn Overlay],
    ) -> u32 {
        let (width, height) = self.size;
        for overlay in overlays {
            overlay.prepare(width, height);
        }

        let gpu = self.binder.gpu();
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        let mut draws = 0;
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });
            render_pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);

            for drawable in &self.drawables {
                render_pass.set_pipeline(self.binder.pipeline(drawable.mode));
                render_pass.set_bind_group(0, &drawable.bind_group, &[]);
                render_pass.set_vertex_buffer(0, drawable.vertex_buffer.slice(..));
                render_pass.draw(0..drawable.vertex_count, 0..1);
                draws += 1;
            }
            for overlay in overlays {
                draws += overlay.draw(&mut render_pass);
            }
        }
        gpu.queue.submit(iter::once(encoder.finish()));
        draws
    }
}
