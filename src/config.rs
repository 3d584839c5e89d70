//! Engine configuration.
//!
//! All knobs live in [`EngineConfig`]; every field has a documented default so
//! `EngineConfig::default()` reproduces the stock spinning-quad scene.

use instant::Duration;

/// How long the text overlay waits for a graphics device before giving up.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReadinessBudget {
    /// Number of availability checks, including the first one.
    pub max_attempts: u32,
    /// Sleep between two checks.
    pub interval: Duration,
}

impl Default for ReadinessBudget {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_millis(100),
        }
    }
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Directory (native) or URL prefix (web) every asset path is relative to.
    pub asset_root: String,
    /// Mesh loaded at startup, relative to `asset_root`.
    pub model: String,
    pub clear_colour: wgpu::Color,
    /// Rotation speed of the scene in radians per second.
    pub angular_rate: f32,
    /// Uniform shrink applied by the projection so the model stays in view.
    pub projection_scale: f32,
    /// Quiescence window before a resize reconfigures the surface.
    pub resize_debounce: Duration,
    pub text_readiness: ReadinessBudget,
    /// Overrides the window's scale factor for text rasterization.
    pub device_pixel_ratio: Option<f32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            asset_root: "assets".to_string(),
            model: "models/square.obj".to_string(),
            clear_colour: wgpu::Color {
                r: 0.1,
                g: 0.1,
                b: 0.2,
                a: 1.0,
            },
            angular_rate: 0.785,
            projection_scale: 0.8,
            resize_debounce: Duration::from_millis(100),
            text_readiness: ReadinessBudget::default(),
            device_pixel_ratio: None,
        }
    }
}

impl EngineConfig {
    pub fn with_asset_root(mut self, root: impl Into<String>) -> Self {
        self.asset_root = root.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_clear_colour(mut self, colour: wgpu::Color) -> Self {
        self.clear_colour = colour;
        self
    }

    pub fn with_angular_rate(mut self, rate: f32) -> Self {
        self.angular_rate = rate;
        self
    }

    pub fn with_text_readiness(mut self, budget: ReadinessBudget) -> Self {
        self.text_readiness = budget;
        self
    }

    pub fn with_device_pixel_ratio(mut self, ratio: f32) -> Self {
        self.device_pixel_ratio = Some(ratio);
        self
    }
}
