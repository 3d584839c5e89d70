//! Application event loop.
//!
//! [`run`] opens a window, brings up the graphics device, the scene and the
//! text overlay, and then drives one frame per redraw:
//!
//! 1. apply a debounced resize, if one has settled
//! 2. call [`GraphicsFlow::on_update`] so the host can change its text
//! 3. advance the scene transform
//! 4. render the scene and the overlay in one pass and present
//!
//! The text overlay starts independently of the device and waits for it
//! within its [`ReadinessBudget`](crate::config::ReadinessBudget).

use std::sync::Arc;

use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::{Window, WindowId},
};

use crate::{
    config::EngineConfig,
    context::{Context, GpuSlot},
    error::{EngineError, Result},
    resources::{FileSource, ResourceManager},
    scene::{Overlay, SceneRenderer},
    text::{FontBook, TextRenderer},
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Collapses a burst of resize notifications into one, delivered once no
/// further notification arrived for the configured window.
#[derive(Clone, Debug)]
pub struct ResizeDebouncer {
    window: Duration,
    pending: Option<(PhysicalSize<u32>, Instant)>,
}

impl ResizeDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    /// Records `size` as the latest size and restarts the quiet period.
    pub fn notify(&mut self, size: PhysicalSize<u32>, now: Instant) {
        self.pending = Some((size, now));
    }

    /// Returns the latest size once it has been stable for the whole window.
    pub fn poll(&mut self, now: Instant) -> Option<PhysicalSize<u32>> {
        match self.pending {
            Some((size, at)) if now.duration_since(at) >= self.window => {
                self.pending = None;
                Some(size)
            }
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Host hooks. The host owns its own state and drives the text overlay
/// through them; the scene itself is configured by [`EngineConfig`].
pub trait GraphicsFlow {
    /// Called once after startup. The overlay may still be unavailable if no
    /// device showed up in time; entries added then are simply never drawn.
    fn on_init(&mut self, text: &mut TextRenderer);

    /// Called every frame with the time since the previous frame.
    fn on_update(&mut self, text: &mut TextRenderer, dt: Duration);

    fn on_window_events(&mut self, _event: &WindowEvent) {}
}

pub(crate) struct Engine {
    ctx: Context,
    scene: SceneRenderer<FileSource>,
}

impl Engine {
    async fn new(window: Arc<Window>, config: &EngineConfig, slot: &GpuSlot) -> Result<Self> {
        let ctx = Context::new(window).await?;
        slot.fill(ctx.gpu.clone());

        let resources = ResourceManager::new(FileSource::new(config.asset_root.clone()));
        let mut scene = SceneRenderer::new(ctx.gpu.clone(), resources, config);
        let (width, height) = ctx.size();
        scene.resize(width, height);
        let mode = scene.load_scene(&config.model).await;
        log::info!("scene ready, {} drawn {:?}", config.model, mode);

        Ok(Self { ctx, scene })
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        self.ctx.resize(size.width, size.height);
        self.scene.resize(size.width, size.height);
    }

    fn render(&mut self, text: &TextRenderer) {
        let output = match self.ctx.surface.get_current_texture() {
            Ok(output) => output,
            // Reconfigure the surface if it's lost or outdated
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.ctx.reconfigure();
                return;
            }
            Err(e) => {
                log::error!("Unable to render {}", e);
                return;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.scene
            .render(&view, &self.ctx.depth_texture.view, &[text as &dyn Overlay]);
        output.present();
    }
}

/// What the event loop does once startup has settled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AfterStart {
    Render,
    /// The engine could not start; nothing will ever be drawn.
    Exit,
}

impl AfterStart {
    fn of<T>(engine: &Result<T>) -> Self {
        match engine {
            Ok(_) => AfterStart::Render,
            Err(_) => AfterStart::Exit,
        }
    }
}

pub(crate) enum FlowEvent {
    #[allow(dead_code)]
    Initialized {
        engine: Result<Engine>,
        text: TextRenderer,
    },
}

pub(crate) struct App<F> {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    #[allow(dead_code)]
    proxy: EventLoopProxy<FlowEvent>,
    config: EngineConfig,
    flow: F,
    engine: Option<Engine>,
    /// Taken while startup runs, returned with the engine.
    text: Option<TextRenderer>,
    resize: ResizeDebouncer,
    last_time: Instant,
    started: bool,
    /// Set when startup failed; returned from [`run`] after the loop exits.
    fatal: Option<EngineError>,
}

impl<F: GraphicsFlow> App<F> {
    fn new(
        event_loop: &EventLoop<FlowEvent>,
        config: EngineConfig,
        fonts: FontBook,
        flow: F,
    ) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        #[cfg(not(target_arch = "wasm32"))]
        let async_runtime = tokio::runtime::Runtime::new()?;
        let text = TextRenderer::new(fonts, config.text_readiness);
        let resize = ResizeDebouncer::new(config.resize_debounce);
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime,
            proxy,
            config,
            flow,
            engine: None,
            text: Some(text),
            resize,
            last_time: Instant::now(),
            started: false,
            fatal: None,
        })
    }

    fn initialized(&mut self, event_loop: &ActiveEventLoop, engine: Result<Engine>, mut text: TextRenderer) {
        if AfterStart::of(&engine) == AfterStart::Exit {
            if let Err(e) = engine {
                log::error!("engine start failed: {e}");
                self.fatal = Some(e);
            }
            self.text = Some(text);
            event_loop.exit();
            return;
        }
        if let Ok(engine) = engine {
            engine.ctx.window().request_redraw();
            self.engine = Some(engine);
        }
        self.flow.on_init(&mut text);
        self.text = Some(text);
        self.last_time = Instant::now();
    }
}

impl<F: GraphicsFlow + 'static> ApplicationHandler<FlowEvent> for App<F> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.started {
            return;
        }
        let Some(mut text) = self.text.take() else {
            return;
        };
        self.started = true;

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title("vibe-ngin");

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let canvas = web_sys::window()
                .and_then(|window| window.document())
                .and_then(|document| document.get_element_by_id(CANVAS_ID))
                .map(|canvas| canvas.unchecked_into());
            if canvas.is_none() {
                log::warn!("no #{CANVAS_ID} element on the page");
            }
            window_attributes = window_attributes.with_canvas(canvas);
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("could not create a window: {e}");
                event_loop.exit();
                return;
            }
        };

        let ratio = self
            .config
            .device_pixel_ratio
            .unwrap_or(window.scale_factor() as f32);
        text.set_device_pixel_ratio(ratio);

        let config = self.config.clone();
        let init_future = async move {
            let slot = GpuSlot::new();
            let (engine, _) = futures::join!(Engine::new(window, &config, &slot), text.init(&slot));
            (engine, text)
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            let (engine, text) = self.async_runtime.block_on(init_future);
            self.initialized(event_loop, engine, text);
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let (engine, text) = init_future.await;
                if proxy
                    .send_event(FlowEvent::Initialized { engine, text })
                    .is_err()
                {
                    log::error!("event loop closed before startup finished");
                }
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: FlowEvent) {
        match event {
            FlowEvent::Initialized { engine, text } => {
                // This is the message from our wasm `spawn_local`
                self.initialized(event_loop, engine, text);
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        self.flow.on_window_events(&event);

        let (Some(engine), Some(text)) = (&mut self.engine, &mut self.text) else {
            if let WindowEvent::CloseRequested = event {
                event_loop.exit();
            }
            return;
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                self.resize.notify(size, Instant::now());
                engine.ctx.window().request_redraw();
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                if self.config.device_pixel_ratio.is_none() {
                    text.set_device_pixel_ratio(scale_factor as f32);
                }
            }
            WindowEvent::RedrawRequested => {
                // invoke main render loop
                engine.ctx.window().request_redraw();

                let now = Instant::now();
                if let Some(size) = self.resize.poll(now) {
                    engine.resize(size);
                }
                let dt = now.duration_since(self.last_time);
                self.last_time = now;

                self.flow.on_update(text, dt);
                engine.scene.update(dt.as_secs_f32());
                engine.render(text);
            }
            _ => {}
        }
    }
}

/// Runs the engine until the window is closed.
///
/// Returns the startup error if no graphics device could be brought up; the
/// window is closed in that case instead of staying blank.
///
/// `fonts` backs the text overlay; register at least one font in it or every
/// text entry is skipped.
pub fn run<F: GraphicsFlow + 'static>(
    config: EngineConfig,
    fonts: FontBook,
    flow: F,
) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info).unwrap_throw();
    }

    let event_loop: EventLoop<FlowEvent> = EventLoop::with_user_event().build()?;

    let mut app = App::new(&event_loop, config, fonts, flow)?;

    event_loop.run_app(&mut app)?;

    if let Some(e) = app.fatal.take() {
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_of_resizes_settles_once() {
        let start = Instant::now();
        let mut debouncer = ResizeDebouncer::new(Duration::from_millis(100));
        assert_eq!(debouncer.poll(start), None);

        debouncer.notify(PhysicalSize::new(800, 600), start);
        debouncer.notify(
            PhysicalSize::new(810, 600),
            start + Duration::from_millis(60),
        );
        // quiet period restarted by the second notification
        assert_eq!(debouncer.poll(start + Duration::from_millis(120)), None);
        assert!(debouncer.is_pending());

        assert_eq!(
            debouncer.poll(start + Duration::from_millis(160)),
            Some(PhysicalSize::new(810, 600))
        );
        assert!(!debouncer.is_pending());
        assert_eq!(debouncer.poll(start + Duration::from_millis(400)), None);
    }

    #[test]
    fn failed_start_exits_the_loop() {
        let failed: Result<()> = Err(EngineError::DeviceUnavailable("no adapter".into()));
        assert_eq!(AfterStart::of(&failed), AfterStart::Exit);
        assert_eq!(AfterStart::of(&Ok(())), AfterStart::Render);
    }
}
