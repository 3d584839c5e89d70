use std::time::Duration;

use vibe_ngin::{
    EngineConfig, FontBook, FontWeight, GraphicsFlow, TextId, TextRenderer, TextStyle, TextUpdate,
};

/// Shows the frame rate in the top-left corner, refreshed once a second.
struct FpsCounter {
    label: Option<TextId>,
    frames: u32,
    elapsed: Duration,
}

impl GraphicsFlow for FpsCounter {
    fn on_init(&mut self, text: &mut TextRenderer) {
        text.add_text(
            "vibe-ngin",
            [16.0, 16.0],
            TextStyle::default().with_size(32.0).with_weight(FontWeight::Bold),
        );
        self.label = Some(text.add_text(
            "FPS: --",
            [16.0, 64.0],
            TextStyle::default().with_color([1.0, 0.8, 0.2, 1.0]),
        ));
    }

    fn on_update(&mut self, text: &mut TextRenderer, dt: Duration) {
        self.frames += 1;
        self.elapsed += dt;
        if self.elapsed < Duration::from_secs(1) {
            return;
        }
        let fps = self.frames as f32 / self.elapsed.as_secs_f32();
        if let Some(id) = self.label {
            text.update_text(id, TextUpdate::text(format!("FPS: {fps:.0}")));
        }
        self.frames = 0;
        self.elapsed = Duration::ZERO;
    }
}

fn main() -> anyhow::Result<()> {
    let mut fonts = FontBook::new();
    match std::env::args().nth(1) {
        Some(path) => fonts.register("sans-serif", FontWeight::Normal, &std::fs::read(path)?)?,
        None => println!("Warning: no font given, text will not be shown"),
    }

    vibe_ngin::run(
        EngineConfig::default().with_asset_root(concat!(env!("CARGO_MANIFEST_DIR"), "/../../assets")),
        fonts,
        FpsCounter {
            label: None,
            frames: 0,
            elapsed: Duration::ZERO,
        },
    )
}
