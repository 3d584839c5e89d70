use instant::Duration;
use vibe_ngin::{
    FontBook, ReadinessBudget, TextRenderer, TextStyle, TextUpdate,
    context::GpuSlot,
    text::Readiness,
};

#[tokio::test(start_paused = true)]
async fn custom_budget_bounds_the_wait() {
    let budget = ReadinessBudget {
        max_attempts: 3,
        interval: Duration::from_millis(50),
    };
    let mut text = TextRenderer::new(FontBook::new(), budget);
    let fps = text.add_text("FPS: --", [8.0, 8.0], TextStyle::default());

    let started = tokio::time::Instant::now();
    assert!(!text.init(&GpuSlot::new()).await);
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(100) && waited < Duration::from_millis(150));
    assert_eq!(text.readiness(), Readiness::Failed);

    // entries can still be edited, they are just never drawn
    assert!(text.update_text(fps, TextUpdate::text("FPS: 60")));
    assert_eq!(text.text(fps), Some("FPS: 60"));
    assert_eq!(text.pending_draws(), 0);
}

#[cfg(feature = "integration-tests")]
#[tokio::test(start_paused = true)]
async fn device_arriving_late_flushes_queued_entries() {
    use vibe_ngin::{context::InitContext, text::GlyphRasterizer, text::font::Bitmap};

    struct Blocks;
    impl GlyphRasterizer for Blocks {
        fn rasterize(
            &self,
            text: &str,
            font: &vibe_ngin::text::FontDescriptor,
        ) -> vibe_ngin::Result<Bitmap> {
            Ok(Bitmap::transparent(
                (text.len() as f32 * font.px * 0.5) as u32,
                font.px as u32,
            ))
        }
    }

    let gpu = InitContext::headless(wgpu::TextureFormat::Rgba8UnormSrgb)
        .await
        .unwrap();
    let slot = GpuSlot::new();
    let mut text = TextRenderer::new(Blocks, ReadinessBudget::default());
    text.add_text("queued", [0.0, 0.0], TextStyle::default().with_size(24.0));

    let (ready, ()) = futures::join!(text.init(&slot), async {
        tokio::time::sleep(Duration::from_millis(250)).await;
        slot.fill(gpu);
    });

    assert!(ready);
    assert_eq!(text.readiness(), Readiness::Ready);
    assert_eq!(text.pending_draws(), 1);
}
