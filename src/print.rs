//! Print sizing
//!
//! Label stock is specified in millimetres; the composer works in pixels.
//! `PrintSpec` records where the DPI came from and does the conversion.

use serde::{Deserialize, Serialize};

use crate::label::CanvasSize;

const MM_PER_INCH: f64 = 25.4;

/// Where a print DPI came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintAuthority {
    /// System defaults (fallback)
    #[default]
    System,
    /// Template-defined specifications
    Template,
    /// User-provided overrides (with validation)
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrintSpec {
    pub authority: PrintAuthority,
    pub dpi: u32,
}

impl Default for PrintSpec {
    /// 203 dpi, the common thermal label printer resolution.
    fn default() -> Self {
        Self {
            authority: PrintAuthority::System,
            dpi: 203,
        }
    }
}

impl PrintSpec {
    pub fn from_template(dpi: u32) -> Self {
        Self {
            authority: PrintAuthority::Template,
            dpi,
        }
    }

    /// Create from user with validation
    pub fn from_user(dpi: u32) -> Result<Self, &'static str> {
        if !(72..=1200).contains(&dpi) {
            return Err("DPI must be between 72 and 1200");
        }
        Ok(Self {
            authority: PrintAuthority::User,
            dpi,
        })
    }

    pub fn mm_to_px(&self, mm: f64) -> u32 {
        (mm / MM_PER_INCH * self.dpi as f64).round().max(0.0) as u32
    }

    /// Canvas for a physical label of `width_mm` × `height_mm`.
    pub fn canvas_for_mm(&self, width_mm: f64, height_mm: f64) -> CanvasSize {
        CanvasSize::new(self.mm_to_px(width_mm), self.mm_to_px(height_mm))
    }
}

/// Parse `"50x30"` (millimetres) into a pair.
pub fn parse_mm_pair(input: &str) -> Option<(f64, f64)> {
    let (w, h) = input.trim().split_once(&['x', 'X'][..])?;
    let w: f64 = w.trim().parse().ok()?;
    let h: f64 = h.trim().parse().ok()?;
    (w > 0.0 && h > 0.0 && w.is_finite() && h.is_finite()).then_some((w, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mm_conversion() {
        let spec = PrintSpec::from_template(203);
        assert_eq!(spec.canvas_for_mm(50.0, 30.0), CanvasSize::new(400, 240));
        assert_eq!(PrintSpec::from_template(300).mm_to_px(25.4), 300);
    }

    #[test]
    fn test_user_dpi_bounds() {
        assert!(PrintSpec::from_user(71).is_err());
        assert!(PrintSpec::from_user(1201).is_err());
        assert_eq!(PrintSpec::from_user(300).unwrap().authority, PrintAuthority::User);
    }

    #[test]
    fn test_parse_mm_pair() {
        assert_eq!(parse_mm_pair("50x30"), Some((50.0, 30.0)));
        assert_eq!(parse_mm_pair(" 101.6 X 152.4 "), Some((101.6, 152.4)));
        assert_eq!(parse_mm_pair("50"), None);
        assert_eq!(parse_mm_pair("0x30"), None);
    }
}
