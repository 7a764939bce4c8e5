use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings};
use fontdue::{Font, FontSettings};
use tiny_skia::{Mask, Paint, Pixmap, Rect, Transform};
use tracing::debug;

use crate::config::FontConfig;
use crate::resources::{Bitmap, ResourceHandle, Texture};
use crate::schema::Color;

/// Side of the square text canvas, independent of text length.
pub const TEXT_CANVAS_SIZE: u32 = 2048;
/// Faces are looked up as `<family>:900` before the bare family name.
pub const TEXT_FONT_WEIGHT: u16 = 900;

/// Every input of a text texture. Two equal styles always rasterize to
/// identical pixels.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextStyle {
    pub text: String,
    pub color: Color,
    pub font_size: u32,
    pub font_family: String,
    pub stroke_color: Color,
    pub stroke_width: u32,
}

/// Single-line alpha coverage, tightly bounding the laid out glyphs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coverage {
    pub width: u32,
    pub height: u32,
    pub alpha: Vec<u8>,
}

impl Coverage {
    pub fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            alpha: Vec::new(),
        }
    }

    fn at(&self, x: u32, y: u32) -> u8 {
        self.alpha[y as usize * self.width as usize + x as usize]
    }
}

/// Shapes one line of text into coverage. Implementations must be
/// deterministic for identical arguments.
pub trait GlyphSource: Send + Sync {
    fn shape_line(&self, text: &str, family: &str, px: f32) -> Result<Coverage>;
}

/// Font faces from the catalog, rasterized with fontdue.
pub struct FontBook {
    faces: BTreeMap<String, Font>,
    fallback: Option<String>,
}

impl FontBook {
    pub fn from_config(config: &FontConfig) -> Result<Self> {
        let mut faces = BTreeMap::new();
        for (family, path) in &config.faces {
            faces.insert(family.clone(), load_font(path)?);
        }
        Ok(Self {
            faces,
            fallback: config.fallback.clone(),
        })
    }

    pub fn from_fonts(faces: BTreeMap<String, Font>, fallback: Option<String>) -> Self {
        Self { faces, fallback }
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    fn face(&self, family: &str) -> Result<&Font> {
        let weighted = format!("{family}:{TEXT_FONT_WEIGHT}");
        self.faces
            .get(&weighted)
            .or_else(|| self.faces.get(family))
            .or_else(|| {
                self.fallback
                    .as_ref()
                    .and_then(|fallback| self.faces.get(fallback))
            })
            .ok_or_else(|| {
                anyhow!(
                    "no font face for family '{family}' and no fallback configured (known: {})",
                    self.faces.keys().cloned().collect::<Vec<_>>().join(", ")
                )
            })
    }
}

/// Horizontal window of a laid out line that can reach the canvas: the
/// middle of the line plus one font size of margin on each side for the
/// outline. Returns the pixels cropped from the left and the kept width.
/// Cropping is symmetric, so centering on the canvas is unchanged.
fn line_window(full_width: i64, px: f32) -> (i64, u32) {
    let window = i64::from(TEXT_CANVAS_SIZE) + 2 * px.ceil().max(0.0) as i64;
    let crop = ((full_width - window) / 2).max(0);
    (crop, (full_width - 2 * crop).max(0) as u32)
}

fn load_font(path: &Path) -> Result<Font> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read font file {}", path.display()))?;
    Font::from_bytes(bytes, FontSettings::default())
        .map_err(|error| anyhow!("failed to parse font {}: {error}", path.display()))
}

impl GlyphSource for FontBook {
    fn shape_line(&self, text: &str, family: &str, px: f32) -> Result<Coverage> {
        if text.is_empty() {
            return Ok(Coverage::empty());
        }
        let font = self.face(family)?;
        let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings {
            wrap_hard_breaks: false,
            ..LayoutSettings::default()
        });
        layout.append(&[font], &fontdue::layout::TextStyle::new(text, px, 0));

        let glyphs = layout.glyphs();
        let min_x = glyphs
            .iter()
            .map(|glyph| glyph.x.floor() as i64)
            .min()
            .unwrap_or(0)
            .min(0);
        let full_width = glyphs
            .iter()
            .map(|glyph| glyph.x.round() as i64 + glyph.width as i64 - min_x)
            .max()
            .unwrap_or(0)
            .max(0);
        let (crop, width) = line_window(full_width, px);
        let origin = min_x + crop;
        let height = layout.height().ceil().max(0.0) as u32;
        let mut coverage = Coverage {
            width,
            height,
            alpha: vec![0; width as usize * height as usize],
        };

        for glyph in glyphs {
            if glyph.width == 0 || glyph.height == 0 {
                continue;
            }
            let left = glyph.x.round() as i64 - origin;
            if left + glyph.width as i64 <= 0 || left >= i64::from(width) {
                continue;
            }
            let left = left as i32;
            let (_, bitmap) = font.rasterize_config(glyph.key);
            let top = glyph.y.round() as i32;
            for row in 0..glyph.height {
                let y = top + row as i32;
                if y < 0 || y >= height as i32 {
                    continue;
                }
                for col in 0..glyph.width {
                    let x = left + col as i32;
                    if x < 0 || x >= width as i32 {
                        continue;
                    }
                    let idx = y as usize * width as usize + x as usize;
                    coverage.alpha[idx] = coverage.alpha[idx].max(bitmap[row * glyph.width + col]);
                }
            }
        }
        Ok(coverage)
    }
}

pub struct TextRasterizer {
    glyphs: Box<dyn GlyphSource>,
}

impl TextRasterizer {
    pub fn new(glyphs: Box<dyn GlyphSource>) -> Self {
        Self { glyphs }
    }

    /// Draws the outline first and the fill on top, both centered on the
    /// canvas. Text wider than the canvas is clipped, never wrapped.
    pub fn rasterize(&self, style: &TextStyle) -> Result<Bitmap> {
        let size = TEXT_CANVAS_SIZE;
        let mut pixmap = Pixmap::new(size, size).context("failed to create text pixmap")?;
        let coverage = self
            .glyphs
            .shape_line(&style.text, &style.font_family, style.font_size as f32)
            .with_context(|| format!("failed to shape text '{}'", style.text))?;
        if coverage.alpha.len() != coverage.width as usize * coverage.height as usize {
            bail!(
                "glyph coverage {}x{} has {} samples",
                coverage.width,
                coverage.height,
                coverage.alpha.len()
            );
        }

        if coverage.width > 0 && coverage.height > 0 {
            let left = (i64::from(size) - i64::from(coverage.width)) / 2;
            let top = (i64::from(size) - i64::from(coverage.height)) / 2;

            if style.stroke_width > 0 {
                let radius = style.stroke_width as f32 / 2.0;
                let mask = stroke_mask(&coverage, left, top, radius, size)?;
                paint_mask(&mut pixmap, &mask, style.stroke_color)?;
            }
            let mask = fill_mask(&coverage, left, top, size)?;
            paint_mask(&mut pixmap, &mask, style.color)?;
        }

        let mut pixels = Vec::with_capacity(size as usize * size as usize * 4);
        for pixel in pixmap.pixels() {
            let color = pixel.demultiply();
            pixels.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
        }
        Bitmap::from_rgba(size, size, pixels)
    }
}

fn paint_mask(pixmap: &mut Pixmap, mask: &Mask, color: Color) -> Result<()> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, 255);
    paint.anti_alias = false;
    let rect = Rect::from_xywh(0.0, 0.0, pixmap.width() as f32, pixmap.height() as f32)
        .context("invalid text canvas rect")?;
    pixmap.fill_rect(rect, &paint, Transform::identity(), Some(mask));
    Ok(())
}

fn fill_mask(coverage: &Coverage, left: i64, top: i64, size: u32) -> Result<Mask> {
    let mut mask = Mask::new(size, size).context("failed to create text mask")?;
    let data = mask.data_mut();
    for y in 0..coverage.height {
        let cy = top + i64::from(y);
        if cy < 0 || cy >= i64::from(size) {
            continue;
        }
        for x in 0..coverage.width {
            let cx = left + i64::from(x);
            if cx < 0 || cx >= i64::from(size) {
                continue;
            }
            data[(cy * i64::from(size) + cx) as usize] = coverage.at(x, y);
        }
    }
    Ok(mask)
}

/// Dilates the fill coverage by a disc, approximating a centered outline of
/// twice `radius` around every glyph edge.
fn stroke_mask(coverage: &Coverage, left: i64, top: i64, radius: f32, size: u32) -> Result<Mask> {
    let mut mask = Mask::new(size, size).context("failed to create stroke mask")?;
    let reach = radius.ceil() as i64;
    let offsets: Vec<(i64, i64)> = (-reach..=reach)
        .flat_map(|dy| (-reach..=reach).map(move |dx| (dx, dy)))
        .filter(|(dx, dy)| ((dx * dx + dy * dy) as f32) <= radius * radius)
        .collect();

    let data = mask.data_mut();
    let size = i64::from(size);
    for y in 0..coverage.height {
        for x in 0..coverage.width {
            let alpha = coverage.at(x, y);
            if alpha == 0 {
                continue;
            }
            let cx = left + i64::from(x);
            let cy = top + i64::from(y);
            for (dx, dy) in &offsets {
                let (px, py) = (cx + dx, cy + dy);
                if px < 0 || py < 0 || px >= size || py >= size {
                    continue;
                }
                let idx = (py * size + px) as usize;
                data[idx] = data[idx].max(alpha);
            }
        }
    }
    Ok(mask)
}

/// Memoized text textures, one entry per slot. A slot's entry is replaced
/// when any style input changes; stale entries are dropped.
pub struct TextTextureCache<K> {
    entries: BTreeMap<K, (TextStyle, ResourceHandle)>,
    rasterizations: u64,
}

impl<K: Ord + Clone + std::fmt::Debug> TextTextureCache<K> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            rasterizations: 0,
        }
    }

    pub fn get_or_rasterize(
        &mut self,
        key: K,
        style: &TextStyle,
        rasterizer: &TextRasterizer,
    ) -> Result<ResourceHandle> {
        if let Some((cached, handle)) = self.entries.get(&key) {
            if cached == style {
                return Ok(Arc::clone(handle));
            }
        }
        let bitmap = rasterizer.rasterize(style)?;
        self.rasterizations += 1;
        debug!(slot = ?key, text = %style.text, size = style.font_size, "rasterized text texture");
        let handle = Arc::new(Texture::new(format!("text:{}", style.text), bitmap));
        self.entries
            .insert(key, (style.clone(), Arc::clone(&handle)));
        Ok(handle)
    }

    pub fn evict(&mut self, key: &K) {
        self.entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total rasterizations performed, cache misses only.
    pub fn rasterizations(&self) -> u64 {
        self.rasterizations
    }
}

impl<K: Ord + Clone + std::fmt::Debug> Default for TextTextureCache<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        line_window, Coverage, GlyphSource, TextRasterizer, TextStyle, TextTextureCache,
        TEXT_CANVAS_SIZE,
    };
    use crate::schema::Color;
    use anyhow::Result;

    /// Every character is a solid block `px / 2` wide and `px` tall.
    struct Blocks;

    impl GlyphSource for Blocks {
        fn shape_line(&self, text: &str, _family: &str, px: f32) -> Result<Coverage> {
            let advance = (px / 2.0) as u32;
            let width = advance * text.chars().count() as u32;
            let height = px as u32;
            Ok(Coverage {
                width,
                height,
                alpha: vec![255; width as usize * height as usize],
            })
        }
    }

    fn style(text: &str) -> TextStyle {
        TextStyle {
            text: text.to_owned(),
            color: Color::BLACK,
            font_size: 64,
            font_family: "Arial".to_owned(),
            stroke_color: Color::WHITE,
            stroke_width: 6,
        }
    }

    #[test]
    fn stroke_is_drawn_under_fill() {
        let rasterizer = TextRasterizer::new(Box::new(Blocks));
        let bitmap = rasterizer.rasterize(&style("AB")).unwrap();
        let center = TEXT_CANVAS_SIZE / 2;
        assert_eq!(bitmap.pixel(center, center), Some([0, 0, 0, 255]));

        // The block spans 64 px around the center; 2 px past its edge is stroke.
        let edge = center + 32 + 2;
        assert_eq!(bitmap.pixel(edge, center), Some([255, 255, 255, 255]));
        assert_eq!(bitmap.pixel(center + 32 + 10, center), Some([0, 0, 0, 0]));
    }

    #[test]
    fn overflowing_text_is_clipped() {
        let rasterizer = TextRasterizer::new(Box::new(Blocks));
        let wide = "W".repeat(200);
        let bitmap = rasterizer.rasterize(&style(&wide)).unwrap();
        assert_eq!(bitmap.width(), TEXT_CANVAS_SIZE);
        assert_eq!(bitmap.pixel(0, TEXT_CANVAS_SIZE / 2), Some([0, 0, 0, 255]));
    }

    #[test]
    fn cache_replaces_entries_on_change() {
        let rasterizer = TextRasterizer::new(Box::new(Blocks));
        let mut cache = TextTextureCache::new();
        let first = cache.get_or_rasterize("front", &style("23"), &rasterizer).unwrap();
        let again = cache.get_or_rasterize("front", &style("23"), &rasterizer).unwrap();
        assert!(std::sync::Arc::ptr_eq(&first, &again));
        assert_eq!(cache.rasterizations(), 1);

        let changed = cache.get_or_rasterize("front", &style("24"), &rasterizer).unwrap();
        assert!(!std::sync::Arc::ptr_eq(&first, &changed));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.rasterizations(), 2);
    }

    #[test]
    fn overlong_lines_are_cropped_to_the_canvas_window() {
        assert_eq!(line_window(300, 70.0), (0, 300));

        let (crop, width) = line_window(400 * 1_000_000, 400.0);
        assert_eq!(width, TEXT_CANVAS_SIZE + 800);
        assert_eq!(crop * 2 + i64::from(width), 400 * 1_000_000);

        // Odd excess keeps the kept width's parity, so centering is unchanged.
        let (crop, width) = line_window(5001, 100.0);
        assert_eq!(crop * 2 + i64::from(width), 5001);
        assert!(width <= TEXT_CANVAS_SIZE + 201);
    }

    #[test]
    fn rasterizing_twice_yields_identical_pixels() {
        let rasterizer = TextRasterizer::new(Box::new(Blocks));
        let style = style("JOHNSON 23");
        let first = rasterizer.rasterize(&style).unwrap();
        let second = rasterizer.rasterize(&style).unwrap();
        assert!(first == second);
        assert_eq!(first.digest(), second.digest());
    }

    #[test]
    fn every_style_input_changes_the_pixels() {
        let rasterizer = TextRasterizer::new(Box::new(Blocks));
        let base = style("AB");
        let digest = |style: &TextStyle| rasterizer.rasterize(style).unwrap().digest();
        let reference = digest(&base);

        let variants = [
            TextStyle {
                text: "ABC".to_owned(),
                ..base.clone()
            },
            TextStyle {
                color: Color::parse_hex("#D0102C").unwrap(),
                ..base.clone()
            },
            TextStyle {
                font_size: 70,
                ..base.clone()
            },
            TextStyle {
                stroke_color: Color::parse_hex("#00FF00").unwrap(),
                ..base.clone()
            },
            TextStyle {
                stroke_width: 12,
                ..base.clone()
            },
        ];
        for variant in &variants {
            assert_ne!(digest(variant), reference, "{variant:?}");
        }

        // Blocks ignores the family, so only the memo key can tell the difference.
        let mut cache = TextTextureCache::new();
        cache.get_or_rasterize("front", &base, &rasterizer).unwrap();
        let family = TextStyle {
            font_family: "Oswald".to_owned(),
            ..base.clone()
        };
        cache.get_or_rasterize("front", &family, &rasterizer).unwrap();
        assert_eq!(cache.rasterizations(), 2);
    }
}
