//! Dynamic text overlay.
//!
//! Every text entry is rasterized into its own texture and drawn as one
//! screen-space quad on top of the scene. Any change to an entry rebuilds its
//! bitmap, texture, vertex buffer and bind group together.
//!
//! The renderer starts without a device. It becomes ready either through
//! [`TextRenderer::bind`] once the caller has a device, or through
//! [`TextRenderer::init`], which polls a [`DeviceSource`] within a
//! [`ReadinessBudget`]. Entries added before that are kept and built as soon
//! as the renderer is ready. If the budget runs out the renderer stays
//! disabled and never draws.

use wgpu::util::DeviceExt;

use crate::{
    config::ReadinessBudget,
    context::{DeviceSource, InitContext},
    data_structures::texture::{self, Texture},
    error::Result,
    pipelines::text::{self as text_pipeline, CanvasUniform, TextVertex},
    scene::Overlay,
};

pub mod font;

pub use font::{Bitmap, FontBook, FontDescriptor, FontWeight, GlyphRasterizer};

/// Visual style of a text entry.
#[derive(Clone, Debug, PartialEq)]
pub struct TextStyle {
    /// Font size in CSS pixels, before device pixel ratio and `scale`.
    pub size: f32,
    /// Normalized RGBA.
    pub color: [f32; 4],
    pub family: String,
    pub weight: FontWeight,
    /// Extra per-entry magnification.
    pub scale: Option<f32>,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            size: 16.0,
            color: [1.0, 1.0, 1.0, 1.0],
            family: font::DEFAULT_FAMILY.to_string(),
            weight: FontWeight::Normal,
            scale: None,
        }
    }
}

impl TextStyle {
    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    pub fn with_color(mut self, color: [f32; 4]) -> Self {
        self.color = color;
        self
    }

    pub fn with_family(mut self, family: impl Into<String>) -> Self {
        self.family = family.into();
        self
    }

    pub fn with_weight(mut self, weight: FontWeight) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn descriptor(&self, device_pixel_ratio: f32) -> FontDescriptor {
        FontDescriptor {
            weight: self.weight,
            px: self.size * device_pixel_ratio * self.scale.unwrap_or(1.0),
            family: self.family.clone(),
        }
    }
}

/// Partial change to an entry; `None` fields are left as they are.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextUpdate {
    pub text: Option<String>,
    pub position: Option<[f32; 2]>,
    pub size: Option<f32>,
    pub color: Option<[f32; 4]>,
    pub family: Option<String>,
    pub weight: Option<FontWeight>,
    pub scale: Option<f32>,
}

impl TextUpdate {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    fn apply(self, entry: &mut TextEntry) {
        if let Some(text) = self.text {
            entry.text = text;
        }
        if let Some(position) = self.position {
            entry.position = position;
        }
        if let Some(size) = self.size {
            entry.style.size = size;
        }
        if let Some(color) = self.color {
            entry.style.color = color;
        }
        if let Some(family) = self.family {
            entry.style.family = family;
        }
        if let Some(weight) = self.weight {
            entry.style.weight = weight;
        }
        if let Some(scale) = self.scale {
            entry.style.scale = Some(scale);
        }
    }
}

/// Stable handle to a text entry. Ids are never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextId(usize);

/// Two triangles covering `size` pixels at `position` (top-left origin),
/// each vertex carrying `color`.
pub fn build_quad(position: [f32; 2], size: [f32; 2], color: [f32; 4]) -> [TextVertex; 6] {
    let [x, y] = position;
    let [w, h] = size;
    let v = |px: f32, py: f32, u: f32, t: f32| TextVertex {
        position: [px, py],
        uv: [u, t],
        color,
    };
    [
        v(x, y, 0.0, 0.0),
        v(x + w, y, 1.0, 0.0),
        v(x, y + h, 0.0, 1.0),
        v(x + w, y, 1.0, 0.0),
        v(x + w, y + h, 1.0, 1.0),
        v(x, y + h, 0.0, 1.0),
    ]
}

/// GPU resources of one entry. Dropping releases them.
struct TextGpu {
    texture: Texture,
    vertex_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl Drop for TextGpu {
    fn drop(&mut self) {
        self.texture.destroy();
        self.vertex_buffer.destroy();
    }
}

struct TextEntry {
    text: String,
    /// Top-left corner in surface pixels.
    position: [f32; 2],
    style: TextStyle,
    gpu: Option<TextGpu>,
}

struct TextPipeline {
    gpu: InitContext,
    pipeline: wgpu::RenderPipeline,
    sampler: wgpu::Sampler,
    canvas: wgpu::Buffer,
}

impl TextPipeline {
    fn new(gpu: InitContext, depth_format: Option<wgpu::TextureFormat>) -> Self {
        let shader = gpu
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("text"),
                source: wgpu::ShaderSource::Wgsl(text_pipeline::SHADER.into()),
            });
        let pipeline =
            text_pipeline::mk_text_pipeline(&gpu.device, gpu.format, depth_format, &shader);
        let sampler = texture::create_clamped_sampler(&gpu.device);
        let canvas = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("text canvas uniform"),
                contents: bytemuck::cast_slice(&[CanvasUniform::new(1, 1)]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        Self {
            gpu,
            pipeline,
            sampler,
            canvas,
        }
    }

    fn build(
        &self,
        rasterizer: &impl GlyphRasterizer,
        device_pixel_ratio: f32,
        entry: &TextEntry,
    ) -> Result<TextGpu> {
        let font = entry.style.descriptor(device_pixel_ratio);
        let bitmap = rasterizer.rasterize(&entry.text, &font)?;
        let texture = Texture::from_rgba(
            &self.gpu.device,
            &self.gpu.queue,
            &bitmap.rgba,
            bitmap.width,
            bitmap.height,
            "text texture",
        )?;

        let quad = build_quad(
            entry.position,
            [bitmap.width as f32, bitmap.height as f32],
            entry.style.color,
        );
        let vertex_buffer = self
            .gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("text vertex buffer"),
                contents: bytemuck::cast_slice(&quad),
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            });

        let layout = self.pipeline.get_bind_group_layout(0);
        let bind_group = self.gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.canvas.as_entire_binding(),
                },
            ],
            label: Some("text bind group"),
        });

        log::debug!("rasterized {:?} as {font} into {}x{}", entry.text, bitmap.width, bitmap.height);
        Ok(TextGpu {
            texture,
            vertex_buffer,
            bind_group,
        })
    }
}

enum State {
    NotStarted,
    Polling { attempt: u32 },
    Ready(TextPipeline),
    Failed,
}

/// Observable startup state of a [`TextRenderer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readiness {
    NotStarted,
    Polling { attempt: u32 },
    Ready,
    Failed,
}

async fn sleep(duration: instant::Duration) {
    #[cfg(not(target_arch = "wasm32"))]
    tokio::time::sleep(duration).await;

    #[cfg(target_arch = "wasm32")]
    {
        use wasm_bindgen_futures::js_sys;

        let millis = duration.as_millis() as i32;
        let promise = js_sys::Promise::new(&mut |resolve, _| {
            if let Some(window) = web_sys::window() {
                let _ = window
                    .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, millis);
            }
        });
        let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
    }
}

/// Text overlay drawn after the scene in the same render pass.
pub struct TextRenderer<R = FontBook> {
    state: State,
    rasterizer: R,
    entries: Vec<Option<TextEntry>>,
    device_pixel_ratio: f32,
    depth_format: Option<wgpu::TextureFormat>,
    budget: ReadinessBudget,
}

impl<R: GlyphRasterizer> TextRenderer<R> {
    /// An unbound renderer that expects to draw inside a pass with the
    /// engine's depth attachment.
    pub fn new(rasterizer: R, budget: ReadinessBudget) -> Self {
        Self {
            state: State::NotStarted,
            rasterizer,
            entries: Vec::new(),
            device_pixel_ratio: 1.0,
            depth_format: Some(Texture::DEPTH_FORMAT),
            budget,
        }
    }

    /// Depth format of the pass the overlay is drawn in. Only takes effect
    /// for pipelines built afterwards.
    pub fn with_depth_format(mut self, depth_format: Option<wgpu::TextureFormat>) -> Self {
        self.depth_format = depth_format;
        self
    }

    pub fn readiness(&self) -> Readiness {
        match self.state {
            State::NotStarted => Readiness::NotStarted,
            State::Polling { attempt } => Readiness::Polling { attempt },
            State::Ready(_) => Readiness::Ready,
            State::Failed => Readiness::Failed,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    pub fn rasterizer_mut(&mut self) -> &mut R {
        &mut self.rasterizer
    }

    /// Waits for `devices` to provide a device, checking up to
    /// `budget.max_attempts` times with `budget.interval` between checks.
    /// Returns whether the renderer ended up ready.
    pub async fn init(&mut self, devices: &impl DeviceSource) -> bool {
        match self.state {
            State::Ready(_) => return true,
            State::Failed => return false,
            _ => (),
        }
        let ReadinessBudget {
            max_attempts,
            interval,
        } = self.budget;

        for attempt in 1..=max_attempts {
            self.state = State::Polling { attempt };
            if let Some(gpu) = devices.init_context() {
                self.bind(gpu);
                return true;
            }
            log::debug!("graphics device not available yet (attempt {attempt}/{max_attempts})");
            if attempt < max_attempts {
                sleep(interval).await;
            }
        }

        log::error!("no graphics device after {max_attempts} attempts; text overlay disabled");
        self.state = State::Failed;
        false
    }

    /// Seals the renderer ready on `gpu` and builds every queued entry.
    pub fn bind(&mut self, gpu: InitContext) {
        self.state = State::Ready(TextPipeline::new(gpu, self.depth_format));
        log::info!("text renderer ready");
        self.rebuild_all();
    }

    /// Rebuilds all entries when the ratio changes.
    pub fn set_device_pixel_ratio(&mut self, ratio: f32) {
        if ratio > 0.0 && ratio != self.device_pixel_ratio {
            self.device_pixel_ratio = ratio;
            self.rebuild_all();
        }
    }

    pub fn device_pixel_ratio(&self) -> f32 {
        self.device_pixel_ratio
    }

    fn rebuild_all(&mut self) {
        let State::Ready(pipeline) = &self.state else {
            return;
        };
        for entry in self.entries.iter_mut().flatten() {
            rebuild(pipeline, &self.rasterizer, self.device_pixel_ratio, entry);
        }
    }

    /// Adds an entry at `position` (surface pixels, top-left). Its resources
    /// are built now if the renderer is ready, otherwise once it becomes so.
    pub fn add_text(&mut self, text: impl Into<String>, position: [f32; 2], style: TextStyle) -> TextId {
        let mut entry = TextEntry {
            text: text.into(),
            position,
            style,
            gpu: None,
        };
        if let State::Ready(pipeline) = &self.state {
            rebuild(pipeline, &self.rasterizer, self.device_pixel_ratio, &mut entry);
        }
        self.entries.push(Some(entry));
        TextId(self.entries.len() - 1)
    }

    /// Applies `update` and rebuilds the entry. Returns `false` for an
    /// unknown or removed id.
    pub fn update_text(&mut self, id: TextId, update: TextUpdate) -> bool {
        let Some(Some(entry)) = self.entries.get_mut(id.0) else {
            return false;
        };
        update.apply(entry);
        if let State::Ready(pipeline) = &self.state {
            rebuild(pipeline, &self.rasterizer, self.device_pixel_ratio, entry);
        }
        true
    }

    /// Removes the entry and releases its GPU resources.
    pub fn remove_text(&mut self, id: TextId) -> bool {
        self.entries
            .get_mut(id.0)
            .and_then(Option::take)
            .is_some()
    }

    pub fn text(&self, id: TextId) -> Option<&str> {
        self.entries.get(id.0)?.as_ref().map(|e| e.text.as_str())
    }

    /// Number of live entries, built or not.
    pub fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of quads the next [`render`](Self::render) call will draw.
    pub fn pending_draws(&self) -> usize {
        if !self.is_ready() {
            return 0;
        }
        self.entries
            .iter()
            .flatten()
            .filter(|e| e.gpu.is_some())
            .count()
    }

    /// Writes the live surface size into the canvas uniform. Call once per
    /// frame before the pass is recorded.
    pub fn prepare(&self, width: u32, height: u32) {
        if let State::Ready(pipeline) = &self.state {
            pipeline.gpu.queue.write_buffer(
                &pipeline.canvas,
                0,
                bytemuck::cast_slice(&[CanvasUniform::new(width, height)]),
            );
        }
    }

    /// Draws every built entry. Returns the number of draw calls issued.
    pub fn render(&self, pass: &mut wgpu::RenderPass<'_>) -> u32 {
        let State::Ready(pipeline) = &self.state else {
            return 0;
        };
        if self.entries.is_empty() {
            return 0;
        }
        pass.set_pipeline(&pipeline.pipeline);
        let mut draws = 0;
        for gpu in self.entries.iter().flatten().filter_map(|e| e.gpu.as_ref()) {
            pass.set_bind_group(0, &gpu.bind_group, &[]);
            pass.set_vertex_buffer(0, gpu.vertex_buffer.slice(..));
            pass.draw(0..6, 0..1);
            draws += 1;
        }
        draws
    }
}

impl<R: GlyphRasterizer> Overlay for TextRenderer<R> {
    fn prepare(&self, width: u32, height: u32) {
        TextRenderer::prepare(self, width, height);
    }

    fn draw(&self, pass: &mut wgpu::RenderPass<'_>) -> u32 {
        self.render(pass)
    }
}

/// Replaces the entry's resources. The old ones are released first; a
/// failed rebuild leaves the entry without resources until the next change.
fn rebuild(
    pipeline: &TextPipeline,
    rasterizer: &impl GlyphRasterizer,
    device_pixel_ratio: f32,
    entry: &mut TextEntry,
) {
    entry.gpu = None;
    match pipeline.build(rasterizer, device_pixel_ratio, entry) {
        Ok(gpu) => entry.gpu = Some(gpu),
        Err(e) => log::warn!("skipping text {:?}: {e}", entry.text),
    }
}
