#![cfg(feature = "integration-tests")]

use std::{cell::Cell, rc::Rc};

use vibe_ngin::{
    EngineConfig, EngineError, FontBook, ReadinessBudget, TextRenderer, TextStyle, TextUpdate,
    context::InitContext,
    data_structures::texture::Texture,
    error::Result,
    pipelines::{BlendMode, GpuResourceBinder, PipelineConfig, ShadingMode},
    resources::{MemorySource, ResourceManager, obj},
    scene::{Overlay, SceneRenderer},
    text::{Bitmap, FontDescriptor, GlyphRasterizer},
};

const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

fn color_target(gpu: &InitContext, width: u32, height: u32) -> wgpu::TextureView {
    gpu.device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("smoke test target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

const QUAD_OBJ: &str = "\
mtllib quad.mtl
v 0 0 0
v 1 0 0
v 0 1 0
vt 0 0
vt 1 0
vt 0 1
usemtl skin
f 1/1 2/2 3/3
";

const QUAD_MTL: &str = "newmtl skin\nmap_Kd tex.png\n";

fn red_png() -> Vec<u8> {
    let mut bytes = Vec::new();
    image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 0, 0, 255]))
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

fn quad_source(texture: Vec<u8>) -> MemorySource {
    MemorySource::new()
        .with("models/quad.obj", QUAD_OBJ)
        .with("models/quad.mtl", QUAD_MTL)
        .with("models/tex.png", texture)
}

/// Fixed-size blocks, counting how often it was asked to rasterize.
#[derive(Default)]
struct CountingRasterizer {
    calls: Cell<usize>,
}

impl GlyphRasterizer for CountingRasterizer {
    fn rasterize(&self, text: &str, font: &FontDescriptor) -> Result<Bitmap> {
        self.calls.set(self.calls.get() + 1);
        let width = (text.chars().count() as f32 * font.px * 0.5).ceil() as u32;
        Ok(Bitmap::transparent(width, font.px.ceil() as u32))
    }
}

#[tokio::test]
async fn missing_model_still_draws_the_fallback_quad() {
    let gpu = InitContext::headless(FORMAT).await.unwrap();
    let resources = ResourceManager::new(MemorySource::new());
    let mut scene = SceneRenderer::new(gpu.clone(), resources, &EngineConfig::default());
    scene.resize(256, 128);

    assert_eq!(scene.load_scene("models/missing.obj").await, ShadingMode::Flat);
    assert_eq!(scene.drawables().len(), 1);
    assert_eq!(scene.drawables()[0].vertex_count(), 6);

    // no fonts registered: the entry is skipped, the scene still renders
    let mut text = TextRenderer::new(FontBook::new(), ReadinessBudget::default());
    text.bind(gpu.clone());
    text.add_text("unrenderable", [4.0, 4.0], TextStyle::default());
    assert_eq!(text.pending_draws(), 0);

    scene.update(0.016);
    let color = color_target(&gpu, 256, 128);
    let depth = Texture::create_depth_texture(&gpu.device, [256, 128], "smoke depth");
    let draws = scene.render(&color, &depth.view, &[&text as &dyn Overlay]);
    assert_eq!(draws, 1);
}

#[tokio::test]
async fn untextured_model_is_drawn_flat() {
    let gpu = InitContext::headless(FORMAT).await.unwrap();
    let source = MemorySource::new().with(
        "models/square.obj",
        "v -1 -1 0\nv 1 -1 0\nv 1 1 0\nv -1 1 0\nvt 1 0 0\nvt 0 1 0\nvt 0 0 1\nvt 1 1 0\n\
         f 1/1 2/2 3/3\nf 1/1 3/3 4/4\n",
    );
    let mut scene = SceneRenderer::new(gpu, ResourceManager::new(source), &EngineConfig::default());

    assert_eq!(scene.load_scene("models/square.obj").await, ShadingMode::Flat);
    assert_eq!(scene.drawables()[0].vertex_count(), 6);
    assert!(scene.drawables()[0].texture().is_none());
}

#[tokio::test]
async fn mesh_without_faces_is_not_added() {
    let gpu = InitContext::headless(FORMAT).await.unwrap();
    let resources = ResourceManager::new(MemorySource::new());
    let mut scene = SceneRenderer::new(gpu.clone(), resources, &EngineConfig::default());

    let mesh = obj::parse_mesh("v 0 0 0\nv 1 0 0\n");
    assert!(mesh.is_empty());
    assert_eq!(scene.add_mesh(&mesh, None), None);
    assert!(scene.drawables().is_empty());

    scene.update(0.016);
    let color = color_target(&gpu, 64, 64);
    let depth = Texture::create_depth_texture(&gpu.device, [64, 64], "empty depth");
    assert_eq!(scene.render(&color, &depth.view, &[]), 0);
}

#[tokio::test]
async fn model_with_diffuse_map_is_drawn_textured() {
    let gpu = InitContext::headless(FORMAT).await.unwrap();
    let resources = ResourceManager::new(quad_source(red_png()));
    let mut scene = SceneRenderer::new(gpu.clone(), resources, &EngineConfig::default());
    scene.resize(64, 64);

    assert_eq!(scene.load_scene("models/quad.obj").await, ShadingMode::Textured);
    assert_eq!(scene.drawables().len(), 1);
    let drawable = &scene.drawables()[0];
    assert_eq!(drawable.mode(), ShadingMode::Textured);
    assert_eq!(drawable.vertex_count(), 3);
    assert!(drawable.texture().is_some());

    scene.update(0.016);
    let color = color_target(&gpu, 64, 64);
    let depth = Texture::create_depth_texture(&gpu.device, [64, 64], "textured depth");
    assert_eq!(scene.render(&color, &depth.view, &[]), 1);
}

#[tokio::test]
async fn undecodable_texture_falls_back_to_flat() {
    let gpu = InitContext::headless(FORMAT).await.unwrap();
    let resources = ResourceManager::new(quad_source(b"not a png".to_vec()));
    let mut scene = SceneRenderer::new(gpu, resources, &EngineConfig::default());

    assert_eq!(scene.load_scene("models/quad.obj").await, ShadingMode::Flat);
    assert_eq!(scene.drawables().len(), 1);
    assert_eq!(scene.drawables()[0].vertex_count(), 3);
    assert!(scene.drawables()[0].texture().is_none());
}

#[tokio::test]
async fn custom_pipelines_are_built_once_per_config() {
    let gpu = InitContext::headless(FORMAT).await.unwrap();
    let resources = ResourceManager::new(MemorySource::new());
    let mut scene = SceneRenderer::new(gpu, resources, &EngineConfig::default());

    let config = PipelineConfig {
        label: "flat overlay".into(),
        shader: GpuResourceBinder::FLAT_SHADER.into(),
        shading: ShadingMode::Flat,
        color_format: FORMAT,
        blend: BlendMode::Alpha,
        depth_write: false,
    };
    let first = scene.binder_mut().custom_pipeline(&config).unwrap();
    let second = scene.binder_mut().custom_pipeline(&config).unwrap();
    assert!(Rc::ptr_eq(&first, &second));

    let other = PipelineConfig {
        depth_write: true,
        ..config.clone()
    };
    let third = scene.binder_mut().custom_pipeline(&other).unwrap();
    assert!(!Rc::ptr_eq(&first, &third));

    let unknown = PipelineConfig {
        shader: "unregistered".into(),
        ..config
    };
    assert_eq!(
        scene.binder_mut().custom_pipeline(&unknown).unwrap_err(),
        EngineError::ResourceNotReady("custom pipeline shader")
    );
}

#[tokio::test]
async fn updating_ready_text_rebuilds_it() {
    let gpu = InitContext::headless(FORMAT).await.unwrap();
    let resources = ResourceManager::new(MemorySource::new());
    let mut scene = SceneRenderer::new(gpu.clone(), resources, &EngineConfig::default());
    scene.resize(128, 64);

    let mut text = TextRenderer::new(CountingRasterizer::default(), ReadinessBudget::default());
    text.bind(gpu.clone());
    assert!(text.is_ready());

    let id = text.add_text("fps", [4.0, 4.0], TextStyle::default());
    assert_eq!(text.rasterizer_mut().calls.get(), 1);

    assert!(text.update_text(id, TextUpdate::text("fps: 60")));
    assert_eq!(text.text(id), Some("fps: 60"));
    assert_eq!(text.rasterizer_mut().calls.get(), 2);
    assert_eq!(text.pending_draws(), 1);

    text.set_device_pixel_ratio(2.0);
    assert_eq!(text.rasterizer_mut().calls.get(), 3);

    scene.load_scene("models/missing.obj").await;
    scene.update(0.016);
    let color = color_target(&gpu, 128, 64);
    let depth = Texture::create_depth_texture(&gpu.device, [128, 64], "text depth");
    assert_eq!(scene.render(&color, &depth.view, &[&text as &dyn Overlay]), 2);
}

#[tokio::test]
async fn rgba_upload_checks_the_byte_count() {
    let gpu = InitContext::headless(FORMAT).await.unwrap();

    let texture = Texture::from_rgba(&gpu.device, &gpu.queue, &[255; 16], 2, 2, "square").unwrap();
    assert_eq!(texture.texture.width(), 2);
    assert_eq!(texture.texture.height(), 2);

    let err = Texture::from_rgba(&gpu.device, &gpu.queue, &[255; 12], 2, 2, "short").unwrap_err();
    assert!(matches!(err, EngineError::TextureUpload { label, .. } if label == "short"));
}
