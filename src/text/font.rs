//! Font selection and string rasterization.

use std::fmt;

use crate::error::{EngineError, Result};

/// Family every lookup falls back to.
pub const DEFAULT_FAMILY: &str = "sans-serif";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

impl fmt::Display for FontWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FontWeight::Normal => "normal",
            FontWeight::Bold => "bold",
        })
    }
}

/// A fully resolved font request. Displays as a CSS-like font string,
/// e.g. `bold 32px sans-serif`.
#[derive(Clone, Debug, PartialEq)]
pub struct FontDescriptor {
    pub weight: FontWeight,
    /// Final raster size in device pixels.
    pub px: f32,
    pub family: String,
}

impl fmt::Display for FontDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}px {}", self.weight, self.px, self.family)
    }
}

/// A rasterized string. Color channels are white and alpha carries glyph
/// coverage, so the overlay shader can tint it with the entry's color.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Bitmap {
    /// A fully transparent bitmap of at least 1x1 pixels.
    pub fn transparent(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let rgba = [255, 255, 255, 0].repeat(width as usize * height as usize);
        Self {
            width,
            height,
            rgba,
        }
    }

    fn blend_coverage(&mut self, x: i32, y: i32, coverage: u8) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let alpha = &mut self.rgba[(y as usize * self.width as usize + x as usize) * 4 + 3];
        *alpha = (*alpha).max(coverage);
    }
}

/// Turns a string into a coverage bitmap.
pub trait GlyphRasterizer {
    fn rasterize(&self, text: &str, font: &FontDescriptor) -> Result<Bitmap>;
}

/// Registered fonts, looked up by family and weight.
///
/// Families are compared case-insensitively. When the exact pair is missing
/// the lookup tries, in order: the family at normal weight, the default
/// family at the requested weight, the default family at normal weight, and
/// finally the first font registered.
#[derive(Default)]
pub struct FontBook {
    keys: Vec<(String, FontWeight)>,
    fonts: Vec<fontdue::Font>,
}

impl FontBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a TrueType/OpenType font and registers it. Registering the same
    /// family and weight again replaces the earlier font.
    pub fn register(&mut self, family: &str, weight: FontWeight, bytes: &[u8]) -> Result<()> {
        let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(|e| EngineError::TextRaster(format!("font {family} ({weight}): {e}")))?;
        match self
            .keys
            .iter()
            .position(|(f, w)| f.eq_ignore_ascii_case(family) && *w == weight)
        {
            Some(idx) => self.fonts[idx] = font,
            None => {
                self.keys.push((family.to_string(), weight));
                self.fonts.push(font);
            }
        }
        log::debug!("registered font {family} ({weight})");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

fn resolve(available: &[(String, FontWeight)], family: &str, weight: FontWeight) -> Option<usize> {
    let find = |family: &str, weight: FontWeight| {
        available
            .iter()
            .position(|(f, w)| f.eq_ignore_ascii_case(family) && *w == weight)
    };
    find(family, weight)
        .or_else(|| find(family, FontWeight::Normal))
        .or_else(|| find(DEFAULT_FAMILY, weight))
        .or_else(|| find(DEFAULT_FAMILY, FontWeight::Normal))
        .or_else(|| (!available.is_empty()).then_some(0))
}

impl GlyphRasterizer for FontBook {
    fn rasterize(&self, text: &str, font: &FontDescriptor) -> Result<Bitmap> {
        let idx = resolve(&self.keys, &font.family, font.weight)
            .ok_or_else(|| EngineError::TextRaster("no fonts registered".into()))?;
        let face = &self.fonts[idx];
        let px = font.px;
        if !(px.is_finite() && px > 0.0) {
            return Err(EngineError::TextRaster(format!("invalid font size in {font}")));
        }

        // Baseline sits at the ascent; without line metrics fall back to
        // the size itself and a 1.2 line height.
        let (ascent, height) = match face.horizontal_line_metrics(px) {
            Some(line) => (line.ascent, (line.ascent - line.descent).ceil()),
            None => (px, (px * 1.2).ceil()),
        };

        let mut pen = 0.0_f32;
        let mut glyphs = Vec::with_capacity(text.len());
        for ch in text.chars() {
            let (metrics, coverage) = face.rasterize(ch, px);
            glyphs.push((pen, metrics, coverage));
            pen += metrics.advance_width;
        }

        let mut bitmap = Bitmap::transparent(pen.ceil() as u32, height as u32);
        for (origin, metrics, coverage) in glyphs {
            let left = (origin + metrics.xmin as f32).round() as i32;
            let top = (ascent - (metrics.ymin as f32 + metrics.height as f32)).round() as i32;
            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    bitmap.blend_coverage(
                        left + gx as i32,
                        top + gy as i32,
                        coverage[gy * metrics.width + gx],
                    );
                }
            }
        }
        Ok(bitmap)
    }
}
