//! Graphics device and surface ownership.
//!
//! [`Context`] owns the window surface. The device, queue and output format
//! are bundled in [`InitContext`], a cheap clonable handle that is passed to
//! subsystems which need the device but not the surface. [`GpuSlot`] lets a
//! subsystem that starts before the device exists observe it arriving later.

use std::{cell::RefCell, rc::Rc, sync::Arc};

use winit::window::Window;

use crate::{
    data_structures::texture::Texture,
    error::{EngineError, Result},
};

/// Device handles needed to create and upload GPU resources.
#[derive(Clone, Debug)]
pub struct InitContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    /// Color format render targets are created with.
    pub format: wgpu::TextureFormat,
}

impl InitContext {
    async fn request(
        instance: &wgpu::Instance,
        surface: Option<&wgpu::Surface<'_>>,
    ) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue)> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: surface,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| EngineError::DeviceUnavailable(e.to_string()))?;
        log::info!("using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("vibe-ngin device"),
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| EngineError::DeviceUnavailable(e.to_string()))?;
        Ok((adapter, device, queue))
    }

    /// A device without any surface, rendering into `format` targets.
    /// Used for offscreen rendering and tests.
    pub async fn headless(format: wgpu::TextureFormat) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let (_, device, queue) = Self::request(&instance, None).await?;
        Ok(Self {
            device,
            queue,
            format,
        })
    }
}

/// Anything that can tell whether a device is available yet.
pub trait DeviceSource {
    fn init_context(&self) -> Option<InitContext>;
}

/// Shared, initially empty holder for the device handles.
#[derive(Clone, Debug, Default)]
pub struct GpuSlot(Rc<RefCell<Option<InitContext>>>);

impl GpuSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fill(&self, gpu: InitContext) {
        *self.0.borrow_mut() = Some(gpu);
    }

    pub fn is_filled(&self) -> bool {
        self.0.borrow().is_some()
    }
}

impl DeviceSource for GpuSlot {
    fn init_context(&self) -> Option<InitContext> {
        self.0.borrow().clone()
    }
}

impl DeviceSource for InitContext {
    fn init_context(&self) -> Option<InitContext> {
        Some(self.clone())
    }
}

#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub(crate) depth_texture: Texture,
    pub surface: wgpu::Surface<'static>,
    pub config: wgpu::SurfaceConfiguration,
    pub gpu: InitContext,
}

impl Context {
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| EngineError::DeviceUnavailable(e.to_string()))?;

        let (adapter, device, queue) = InitContext::request(&instance, Some(&surface)).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        // Shaders output linear colors and rely on an sRGB target.
        let format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| EngineError::DeviceUnavailable("surface reports no formats".into()))?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_texture =
            Texture::create_depth_texture(&device, [config.width, config.height], "depth_texture");

        Ok(Self {
            window,
            depth_texture,
            surface,
            config,
            gpu: InitContext {
                device,
                queue,
                format,
            },
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.gpu.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.gpu.queue
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Reconfigures the surface for a new drawable size. A zero-sized
    /// request (minimized window) is ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.gpu.device, &self.config);
        self.depth_texture =
            Texture::create_depth_texture(&self.gpu.device, [width, height], "depth_texture");
        log::debug!("surface reconfigured to {width}x{height}");
    }

    /// Reapplies the current configuration after the surface was lost.
    pub fn reconfigure(&self) {
        self.surface.configure(&self.gpu.device, &self.config);
    }
}
