//! Drawing surface abstraction and the headless raster implementation.
//!
//! The composer only talks to [`Surface`], so layout can be tested against a
//! recording surface and rendered for real on a [`RasterSurface`].

use std::io::Cursor;

use embedded_graphics::mono_font::iso_8859_1::{
    FONT_10X20, FONT_5X8, FONT_6X10, FONT_6X12, FONT_7X13, FONT_7X14, FONT_9X15, FONT_9X18,
};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::color::Color;
use crate::label::CanvasSize;

/// Largest glyph magnification tried when matching a font size.
const MAX_GLYPH_SCALE: u32 = 8;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("cannot allocate a {width}x{height} surface: {reason}")]
    Allocation { width: u32, height: u32, reason: String },

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Pixel coordinate for an unsigned length, saturating at `i32::MAX`.
pub fn px(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(px(self.width))
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(px(self.height))
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right() && other.x < self.right() && self.y < other.bottom() && other.y < self.bottom()
    }

    /// Vertical spans overlap.
    pub fn overlaps_rows(&self, top: i32, bottom: i32) -> bool {
        self.y < bottom && top < self.bottom()
    }
}

/// Extent of a single line of text relative to its baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextExtent {
    pub width: u32,
    pub ascent: u32,
    pub descent: u32,
}

/// Minimal 2-D drawing interface used by the composer.
pub trait Surface {
    fn size(&self) -> CanvasSize;

    fn fill_rect(&mut self, rect: Rect, color: Color);

    /// Stroke `rect` with a line of `line_width` centered on its edges.
    fn stroke_rect(&mut self, rect: Rect, line_width: u32, color: Color);

    fn measure_text(&self, text: &str, font_size: u32) -> TextExtent;

    /// Draw `text` with its left edge at `x` and its alphabetic baseline at `baseline`.
    fn draw_text(&mut self, text: &str, x: i32, baseline: i32, font_size: u32, color: Color);

    /// Draw `image` scaled into `dest` with nearest-neighbor sampling.
    fn draw_image(&mut self, image: &RgbaImage, dest: Rect);

    fn to_bytes(&self) -> Result<Vec<u8>, SurfaceError>;
}

/// Software RGBA surface backed by an `image` buffer.
pub struct RasterSurface {
    image: RgbaImage,
}

impl RasterSurface {
    pub fn new(size: CanvasSize, max_dimension: u32) -> Result<Self, SurfaceError> {
        let fail = |reason: &str| SurfaceError::Allocation {
            width: size.width,
            height: size.height,
            reason: reason.to_string(),
        };
        if size.is_empty() {
            return Err(fail("dimensions must be positive"));
        }
        if size.width > max_dimension || size.height > max_dimension {
            return Err(fail(&format!("dimensions above {max_dimension}px are not supported")));
        }
        Ok(Self { image: RgbaImage::new(size.width, size.height) })
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    fn blend(&mut self, x: i32, y: i32, color: Rgba<u8>) {
        if x < 0 || y < 0 || x as u32 >= self.image.width() || y as u32 >= self.image.height() {
            return;
        }
        let dst = self.image.get_pixel_mut(x as u32, y as u32);
        *dst = source_over(*dst, color);
    }
}

impl Surface for RasterSurface {
    fn size(&self) -> CanvasSize {
        CanvasSize::new(self.image.width(), self.image.height())
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        let rgba = color.to_rgba();
        let (w, h) = (px(self.image.width()), px(self.image.height()));
        for y in rect.y.max(0)..rect.bottom().min(h) {
            for x in rect.x.max(0)..rect.right().min(w) {
                self.blend(x, y, rgba);
            }
        }
    }

    fn stroke_rect(&mut self, rect: Rect, line_width: u32, color: Color) {
        let half = px(line_width / 2);
        let outer = Rect::new(
            rect.x.saturating_sub(half),
            rect.y.saturating_sub(half),
            rect.width.saturating_add(line_width),
            rect.height.saturating_add(line_width),
        );
        let lw = px(line_width);

        // Four bands; corners belong to the horizontal ones.
        self.fill_rect(Rect::new(outer.x, outer.y, outer.width, line_width), color);
        self.fill_rect(Rect::new(outer.x, outer.bottom().saturating_sub(lw), outer.width, line_width), color);
        let side_height = outer.height.saturating_sub(line_width.saturating_mul(2));
        self.fill_rect(Rect::new(outer.x, outer.y.saturating_add(lw), line_width, side_height), color);
        self.fill_rect(Rect::new(outer.right().saturating_sub(lw), outer.y.saturating_add(lw), line_width, side_height), color);
    }

    fn measure_text(&self, text: &str, font_size: u32) -> TextExtent {
        measure_text(text, font_size)
    }

    fn draw_text(&mut self, text: &str, x: i32, baseline: i32, font_size: u32, color: Color) {
        if text.is_empty() {
            return;
        }
        let face = GlyphFace::for_size(font_size);
        let mask = face.rasterize(text);
        let top = baseline.saturating_sub(px(face.font.baseline * face.scale));
        let rgba = color.to_rgba();

        for (mx, my, on) in mask.cells() {
            if !on {
                continue;
            }
            let gx = x.saturating_add(px(mx * face.scale));
            let gy = top.saturating_add(px(my * face.scale));
            for dy in 0..px(face.scale) {
                for dx in 0..px(face.scale) {
                    self.blend(gx.saturating_add(dx), gy.saturating_add(dy), rgba);
                }
            }
        }
    }

    fn draw_image(&mut self, image: &RgbaImage, dest: Rect) {
        if dest.width == 0 || dest.height == 0 || image.width() == 0 || image.height() == 0 {
            return;
        }
        let scaled;
        let src = if image.dimensions() == (dest.width, dest.height) {
            image
        } else {
            scaled = imageops::resize(image, dest.width, dest.height, FilterType::Nearest);
            &scaled
        };
        for (sx, sy, pixel) in src.enumerate_pixels() {
            self.blend(dest.x.saturating_add(px(sx)), dest.y.saturating_add(px(sy)), *pixel);
        }
    }

    fn to_bytes(&self) -> Result<Vec<u8>, SurfaceError> {
        let mut buf = Vec::new();
        self.image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        Ok(buf)
    }
}

fn source_over(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let sa = src.0[3] as u32;
    if sa == 255 {
        return src;
    }
    if sa == 0 {
        return dst;
    }
    let da = dst.0[3] as u32;
    let out_a = sa + da * (255 - sa) / 255;
    if out_a == 0 {
        return Rgba([0, 0, 0, 0]);
    }
    let mut out = [0u8; 4];
    for i in 0..3 {
        let c = (src.0[i] as u32 * sa + dst.0[i] as u32 * da * (255 - sa) / 255) / out_a;
        out[i] = c.min(255) as u8;
    }
    out[3] = out_a as u8;
    Rgba(out)
}

/// Extent of `text` in the glyph face chosen for `font_size`. Every
/// raster surface measures text this way.
pub fn measure_text(text: &str, font_size: u32) -> TextExtent {
    GlyphFace::for_size(font_size).extent(text)
}

fn faces() -> [&'static MonoFont<'static>; 8] {
    [&FONT_5X8, &FONT_6X10, &FONT_6X12, &FONT_7X13, &FONT_7X14, &FONT_9X15, &FONT_9X18, &FONT_10X20]
}

/// A bitmap font magnified by an integer factor.
#[derive(Clone, Copy)]
struct GlyphFace {
    font: &'static MonoFont<'static>,
    scale: u32,
}

impl GlyphFace {
    /// Font and scale whose pixel height is closest to `font_size`.
    /// Ties go to the smaller magnification.
    fn for_size(font_size: u32) -> Self {
        let target = font_size.max(1);
        let faces = faces();
        let mut best = GlyphFace { font: faces[0], scale: 1 };
        let mut best_err = u32::MAX;

        for scale in 1..=MAX_GLYPH_SCALE {
            for font in faces {
                let err = (font.character_size.height * scale).abs_diff(target);
                if err < best_err {
                    best = GlyphFace { font, scale };
                    best_err = err;
                }
            }
        }
        best
    }

    fn advance(&self) -> u32 {
        self.font.character_size.width + self.font.character_spacing
    }

    fn extent(&self, text: &str) -> TextExtent {
        let chars = text.chars().count() as u32;
        let width = chars
            .saturating_mul(self.advance())
            .saturating_sub(self.font.character_spacing)
            .saturating_mul(self.scale);
        let ascent = self.font.baseline * self.scale;
        let descent = (self.font.character_size.height - self.font.baseline) * self.scale;
        TextExtent { width, ascent, descent }
    }

    fn rasterize(&self, text: &str) -> GlyphMask {
        let chars = text.chars().count() as u32;
        let mut mask = GlyphMask::new(chars * self.advance(), self.font.character_size.height);
        let style = MonoTextStyle::new(self.font, BinaryColor::On);
        let _ = Text::with_baseline(text, Point::zero(), style, Baseline::Top).draw(&mut mask);
        mask
    }
}

/// One-bit offscreen target that glyphs are rasterized into before scaling.
struct GlyphMask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl GlyphMask {
    fn new(width: u32, height: u32) -> Self {
        Self { width, height, bits: vec![false; (width * height) as usize] }
    }

    fn cells(&self) -> impl Iterator<Item = (u32, u32, bool)> + '_ {
        self.bits
            .iter()
            .enumerate()
            .map(move |(i, on)| (i as u32 % self.width, i as u32 / self.width, *on))
    }
}

impl DrawTarget for GlyphMask {
    type Color = BinaryColor;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            let (x, y) = (point.x as u32, point.y as u32);
            if x < self.width && y < self.height {
                self.bits[(y * self.width + x) as usize] = color.is_on();
            }
        }
        Ok(())
    }
}

impl OriginDimensions for GlyphMask {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}
