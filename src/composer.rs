//! Label Composer - LabelSpec in, PNG out.
//!
//! Sub-encodings (QR, barcode) and text layout are resolved before the first
//! pixel is drawn, so a failing label never yields a partial image.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::color::{Color, ColorError};
use crate::label::{CanvasSize, LabelSpec, OverflowPolicy};
use crate::surface::{self, px, RasterSurface, Rect, Surface, SurfaceError, TextExtent};
use crate::symbology::{self, SymbologyError};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] SymbologyError),

    #[error("invalid {field}: {source}")]
    InvalidColor {
        field: &'static str,
        #[source]
        source: ColorError,
    },

    #[error("render failure: {0}")]
    RenderFailure(#[from] SurfaceError),

    #[error("text overflow: {line:?} {reason}")]
    TextOverflow { line: String, reason: String },

    #[error("font size {0} is outside {min}..={max}", min = MIN_FONT_SIZE, max = MAX_FONT_SIZE)]
    UnsupportedFontSize(u32),
}

/// Font sizes the glyph renderer lays out.
pub const MIN_FONT_SIZE: u32 = 6;
pub const MAX_FONT_SIZE: u32 = 160;

fn check_font_size(font_size: u32) -> Result<(), RenderError> {
    if (MIN_FONT_SIZE..=MAX_FONT_SIZE).contains(&font_size) {
        Ok(())
    } else {
        Err(RenderError::UnsupportedFontSize(font_size))
    }
}

/// Layout constants. Defaults reproduce the reference label geometry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComposerConfig {
    pub text_x: i32,
    /// First baseline sits at `fontSize + first_baseline_pad`.
    pub first_baseline_pad: u32,
    /// Baselines advance by `fontSize + line_gap`.
    pub line_gap: u32,
    pub border_width: u32,
    pub qr_size: u32,
    pub qr_margin: u32,
    pub barcode_height: u32,
    pub barcode_margin: u32,
    /// Minimum clearance between text and a code region when clipping.
    pub text_clearance: u32,
    pub max_dimension: u32,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            text_x: 10,
            first_baseline_pad: 10,
            line_gap: 5,
            border_width: 2,
            qr_size: 80,
            qr_margin: 10,
            barcode_height: 50,
            barcode_margin: 10,
            text_clearance: 4,
            max_dimension: 4096,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    pub baseline: i32,
    #[serde(default)]
    pub truncated: bool,
}

/// Where everything ended up on the canvas.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelLayout {
    pub lines: Vec<TextLine>,
    /// Lines not drawn because they fell below the text area.
    pub dropped: Vec<String>,
    pub qr_region: Option<Rect>,
    pub barcode_region: Option<Rect>,
}

impl LabelLayout {
    pub fn overflowed(&self) -> bool {
        !self.dropped.is_empty() || self.lines.iter().any(|l| l.truncated)
    }
}

#[derive(Debug, Clone)]
pub struct RenderedLabel {
    pub size: CanvasSize,
    pub png: Vec<u8>,
    pub layout: LabelLayout,
}

struct Palette {
    background: Color,
    text: Color,
    border: Color,
}

impl Palette {
    fn resolve(spec: &LabelSpec) -> Result<Self, RenderError> {
        let parse = |field: &'static str, value: &str| {
            Color::parse(value).map_err(|source| RenderError::InvalidColor { field, source })
        };
        Ok(Self {
            background: parse("backgroundColor", &spec.style.background_color)?,
            text: parse("textColor", &spec.style.text_color)?,
            border: parse("borderColor", &spec.style.border_color)?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct LabelComposer {
    config: ComposerConfig,
}

impl LabelComposer {
    pub fn new(config: ComposerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    pub fn qr_region(&self, size: CanvasSize) -> Rect {
        let c = &self.config;
        Rect::new(
            px(size.width).saturating_sub(px(c.qr_size.saturating_add(c.qr_margin))),
            px(c.qr_margin),
            c.qr_size,
            c.qr_size,
        )
    }

    pub fn barcode_region(&self, size: CanvasSize) -> Rect {
        let c = &self.config;
        Rect::new(
            px(c.barcode_margin),
            px(size.height).saturating_sub(px(c.barcode_height.saturating_add(c.barcode_margin))),
            size.width.saturating_sub(c.barcode_margin.saturating_mul(2)),
            c.barcode_height,
        )
    }

    /// Render to PNG on a fresh raster surface.
    #[tracing::instrument(skip_all, fields(width = spec.canvas_size.width, height = spec.canvas_size.height))]
    pub fn render(&self, spec: &LabelSpec) -> Result<RenderedLabel, RenderError> {
        let mut surface = RasterSurface::new(spec.canvas_size, self.config.max_dimension)?;
        let layout = self.compose(spec, &mut surface)?;
        let png = surface.to_bytes()?;

        debug!(lines = layout.lines.len(), bytes = png.len(), "label rendered");
        Ok(RenderedLabel { size: spec.canvas_size, png, layout })
    }

    /// Draw `spec` onto `surface`. Nothing is drawn unless every sub-encoding
    /// and the text plan succeed.
    pub fn compose<S: Surface>(&self, spec: &LabelSpec, surface: &mut S) -> Result<LabelLayout, RenderError> {
        let size = surface.size();
        check_font_size(spec.style.font_size)?;
        let palette = Palette::resolve(spec)?;

        let qr = spec
            .qr()
            .map(|payload| symbology::render_qr(payload, self.config.qr_size, palette.text, palette.background))
            .transpose()?;
        let barcode = spec
            .barcode()
            .map(|payload| {
                symbology::render_barcode(
                    spec.barcode_format,
                    payload,
                    self.config.barcode_height,
                    palette.text,
                    palette.background,
                )
            })
            .transpose()?;

        let mut layout = LabelLayout {
            qr_region: qr.as_ref().map(|_| self.qr_region(size)),
            barcode_region: barcode.as_ref().map(|_| self.barcode_region(size)),
            ..LabelLayout::default()
        };
        self.plan_text(spec, spec.overflow, size, &mut layout, |text, font_size| {
            surface.measure_text(text, font_size)
        })?;

        if layout.overflowed() {
            warn!(
                dropped = layout.dropped.len(),
                truncated = layout.lines.iter().filter(|l| l.truncated).count(),
                "label text clipped to fit"
            );
        }

        let bw = self.config.border_width;
        surface.fill_rect(Rect::new(0, 0, size.width, size.height), palette.background);
        surface.stroke_rect(
            Rect::new(
                (bw / 2) as i32,
                (bw / 2) as i32,
                size.width.saturating_sub(bw),
                size.height.saturating_sub(bw),
            ),
            bw,
            palette.border,
        );

        for line in &layout.lines {
            surface.draw_text(&line.text, self.config.text_x, line.baseline, spec.style.font_size, palette.text);
        }
        if let (Some(image), Some(region)) = (&qr, layout.qr_region) {
            surface.draw_image(image, region);
        }
        if let (Some(image), Some(region)) = (&barcode, layout.barcode_region) {
            surface.draw_image(image, region);
        }

        Ok(layout)
    }

    /// The layout `compose` would produce under the `clip` policy, without
    /// encoding codes or drawing. Lines the composer would drop or truncate
    /// show up in `dropped` and as `truncated`.
    pub fn predict_layout(&self, spec: &LabelSpec) -> Result<LabelLayout, RenderError> {
        check_font_size(spec.style.font_size)?;
        let size = spec.canvas_size;
        let mut layout = LabelLayout {
            qr_region: spec.qr().map(|_| self.qr_region(size)),
            barcode_region: spec.barcode().map(|_| self.barcode_region(size)),
            ..LabelLayout::default()
        };
        self.plan_text(spec, OverflowPolicy::Clip, size, &mut layout, surface::measure_text)?;
        Ok(layout)
    }

    fn plan_text(
        &self,
        spec: &LabelSpec,
        policy: OverflowPolicy,
        size: CanvasSize,
        layout: &mut LabelLayout,
        measure: impl Fn(&str, u32) -> TextExtent,
    ) -> Result<(), RenderError> {
        let c = &self.config;
        let font_size = spec.style.font_size;
        let step = px(font_size.saturating_add(c.line_gap));
        let mut baseline = px(font_size.saturating_add(c.first_baseline_pad));

        let text_bottom = match layout.barcode_region {
            Some(region) => region.y.saturating_sub(px(c.text_clearance)),
            None => px(size.height).saturating_sub(px(c.border_width)),
        };

        for (label, value) in spec.fields.non_empty() {
            let text = format!("{label}: {value}");

            if policy == OverflowPolicy::Overlap {
                layout.lines.push(TextLine { text, baseline, truncated: false });
                baseline = baseline.saturating_add(step);
                continue;
            }

            let extent = measure(&text, font_size);
            let top = baseline.saturating_sub(px(extent.ascent));
            let bottom = baseline.saturating_add(px(extent.descent));

            if bottom > text_bottom {
                if policy == OverflowPolicy::Reject {
                    return Err(RenderError::TextOverflow {
                        reason: format!("reaches y={bottom} but the text area ends at y={text_bottom}"),
                        line: text,
                    });
                }
                layout.dropped.push(text);
                continue;
            }

            let right_limit = match layout.qr_region {
                Some(qr) if qr.overlaps_rows(top, bottom) => qr.x.saturating_sub(px(c.text_clearance)),
                _ => px(size.width).saturating_sub(px(c.border_width)),
            };
            let available = right_limit.saturating_sub(c.text_x);

            if c.text_x.saturating_add(px(extent.width)) <= right_limit {
                layout.lines.push(TextLine { text, baseline, truncated: false });
            } else if policy == OverflowPolicy::Reject {
                return Err(RenderError::TextOverflow {
                    reason: format!("is {}px wide but only {available}px are free", extent.width),
                    line: text,
                });
            } else {
                let clipped = truncate_to_width(&measure, &text, font_size, available);
                if clipped.is_empty() {
                    layout.dropped.push(text);
                    continue;
                }
                layout.lines.push(TextLine { text: clipped, baseline, truncated: true });
            }
            baseline = baseline.saturating_add(step);
        }

        Ok(())
    }
}

fn truncate_to_width(
    measure: &impl Fn(&str, u32) -> TextExtent,
    text: &str,
    font_size: u32,
    max_width: i32,
) -> String {
    let mut out = text.to_string();
    while !out.is_empty() && px(measure(&out, font_size).width) > max_width {
        out.pop();
    }
    out
}
