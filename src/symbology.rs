//! QR and 1-D barcode sub-images.
//!
//! The encoders themselves are the `qrcode` and `barcoders` crates. This
//! module checks payloads against each symbology's content rules, so errors
//! read well, and turns encoder output into RGBA sub-images ready to be
//! composited.

use std::fmt;

use barcoders::sym::codabar::Codabar;
use barcoders::sym::code128::Code128;
use barcoders::sym::code39::Code39;
use barcoders::sym::code93::Code93;
use barcoders::sym::ean13::EAN13;
use barcoders::sym::ean8::EAN8;
use barcoders::sym::tf::TF;
use image::RgbaImage;
use qrcode::QrCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::color::Color;

/// Code 128 character-set B selector expected by `barcoders`.
const CODE128_SET_B: char = '\u{0181}';

/// Quiet zone around the QR symbol, in modules.
const QR_QUIET_MODULES: usize = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BarcodeFormat {
    #[default]
    Code128,
    Code39,
    Code93,
    Ean13,
    Ean8,
    Upc,
    Itf14,
    Itf,
    Codabar,
}

impl BarcodeFormat {
    pub const ALL: [BarcodeFormat; 9] = [
        BarcodeFormat::Code128,
        BarcodeFormat::Code39,
        BarcodeFormat::Code93,
        BarcodeFormat::Ean13,
        BarcodeFormat::Ean8,
        BarcodeFormat::Upc,
        BarcodeFormat::Itf14,
        BarcodeFormat::Itf,
        BarcodeFormat::Codabar,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BarcodeFormat::Code128 => "CODE128",
            BarcodeFormat::Code39 => "CODE39",
            BarcodeFormat::Code93 => "CODE93",
            BarcodeFormat::Ean13 => "EAN13",
            BarcodeFormat::Ean8 => "EAN8",
            BarcodeFormat::Upc => "UPC",
            BarcodeFormat::Itf14 => "ITF14",
            BarcodeFormat::Itf => "ITF",
            BarcodeFormat::Codabar => "CODABAR",
        }
    }

    /// Check `payload` against the format's content rules and return the
    /// data handed to the encoder.
    pub fn normalize(&self, payload: &str) -> Result<String, SymbologyError> {
        let fail = |reason: String| SymbologyError::new(Symbology::Barcode(*self), reason);

        match self {
            BarcodeFormat::Code128 => {
                if let Some(c) = payload.chars().find(|c| !(' '..='~').contains(c)) {
                    return Err(fail(format!("character {c:?} is not printable ASCII")));
                }
                Ok(format!("{CODE128_SET_B}{payload}"))
            }
            BarcodeFormat::Ean13 => gs1_digits(payload, 12).map_err(fail),
            BarcodeFormat::Ean8 => gs1_digits(payload, 7).map_err(fail),
            // UPC-A is EAN-13 with a leading zero.
            BarcodeFormat::Upc => gs1_digits(payload, 11).map(|d| format!("0{d}")).map_err(fail),
            BarcodeFormat::Itf14 => gs1_digits(payload, 13)
                .map(|d| {
                    let check = gs1_check_digit(&d);
                    format!("{d}{check}")
                })
                .map_err(fail),
            BarcodeFormat::Itf => {
                require_digits(payload).map_err(fail)?;
                if payload.len() % 2 != 0 {
                    return Err(fail(format!("needs an even number of digits, got {}", payload.len())));
                }
                Ok(payload.to_string())
            }
            BarcodeFormat::Code39 | BarcodeFormat::Code93 | BarcodeFormat::Codabar => {
                Ok(payload.to_string())
            }
        }
    }

    /// Encode to a module sequence, `1` for a bar and `0` for a space.
    pub fn encode(&self, payload: &str) -> Result<Vec<u8>, SymbologyError> {
        let data = self.normalize(payload)?;
        let fail = |e: barcoders::error::Error| SymbologyError::new(Symbology::Barcode(*self), e.to_string());

        let modules = match self {
            BarcodeFormat::Code128 => Code128::new(data).map_err(fail)?.encode(),
            BarcodeFormat::Code39 => Code39::new(data).map_err(fail)?.encode(),
            BarcodeFormat::Code93 => Code93::new(data).map_err(fail)?.encode(),
            BarcodeFormat::Ean13 | BarcodeFormat::Upc => EAN13::new(data).map_err(fail)?.encode(),
            BarcodeFormat::Ean8 => EAN8::new(data).map_err(fail)?.encode(),
            BarcodeFormat::Itf14 | BarcodeFormat::Itf => TF::interleaved(data).map_err(fail)?.encode(),
            BarcodeFormat::Codabar => Codabar::new(data).map_err(fail)?.encode(),
        };

        if modules.is_empty() {
            return Err(SymbologyError::new(Symbology::Barcode(*self), "encoder produced no modules".into()));
        }
        Ok(modules)
    }
}

impl fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Symbology {
    Qr,
    Barcode(BarcodeFormat),
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbology::Qr => f.write_str("QR code"),
            Symbology::Barcode(format) => write!(f, "{format} barcode"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{symbology}: {reason}")]
pub struct SymbologyError {
    pub symbology: Symbology,
    pub reason: String,
}

impl SymbologyError {
    pub fn new(symbology: Symbology, reason: String) -> Self {
        Self { symbology, reason }
    }
}

fn require_digits(payload: &str) -> Result<(), String> {
    if payload.is_empty() {
        return Err("payload is empty".to_string());
    }
    match payload.chars().find(|c| !c.is_ascii_digit()) {
        Some(c) => Err(format!("only digits allowed, found {c:?}")),
        None => Ok(()),
    }
}

/// Accept `data_len` digits, or `data_len + 1` digits ending in a valid
/// check digit. Returns the data digits without the check digit.
fn gs1_digits(payload: &str, data_len: usize) -> Result<String, String> {
    require_digits(payload)?;
    match payload.len() {
        n if n == data_len => Ok(payload.to_string()),
        n if n == data_len + 1 => {
            let (data, check) = payload.split_at(data_len);
            let expected = gs1_check_digit(data);
            if check.chars().next() == char::from_digit(expected, 10) {
                Ok(data.to_string())
            } else {
                Err(format!("check digit {check} is wrong, expected {expected}"))
            }
        }
        n => Err(format!("needs {} or {} digits, got {n}", data_len, data_len + 1)),
    }
}

/// GS1 mod-10 check digit: weights 3,1,3,... from the rightmost data digit.
pub fn gs1_check_digit(digits: &str) -> u32 {
    let sum: u32 = digits
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { d * 3 } else { d })
        .sum();
    (10 - sum % 10) % 10
}

/// Render a QR symbol into a `size`×`size` image with integer module scaling,
/// centered on the background color.
pub fn render_qr(payload: &str, size: u32, fg: Color, bg: Color) -> Result<RgbaImage, SymbologyError> {
    let code = QrCode::new(payload.as_bytes())
        .map_err(|e| SymbologyError::new(Symbology::Qr, e.to_string()))?;

    let modules = code.width();
    let total = (modules + 2 * QR_QUIET_MODULES) as u32;
    let scale = size / total;
    if scale == 0 {
        return Err(SymbologyError::new(
            Symbology::Qr,
            format!("payload needs {total} modules, more than the {size}px region holds"),
        ));
    }

    let offset = (size - total * scale) / 2 + QR_QUIET_MODULES as u32 * scale;
    let mut image = RgbaImage::from_pixel(size, size, bg.to_rgba());

    for (i, color) in code.to_colors().iter().enumerate() {
        if *color != qrcode::Color::Dark {
            continue;
        }
        let mx = (i % modules) as u32;
        let my = (i / modules) as u32;
        for dy in 0..scale {
            for dx in 0..scale {
                image.put_pixel(offset + mx * scale + dx, offset + my * scale + dy, fg.to_rgba());
            }
        }
    }

    Ok(image)
}

/// Render a barcode at one pixel per module. The composer stretches it into
/// its region.
pub fn render_barcode(
    format: BarcodeFormat,
    payload: &str,
    height: u32,
    fg: Color,
    bg: Color,
) -> Result<RgbaImage, SymbologyError> {
    let modules = format.encode(payload)?;
    let width = modules.len() as u32;

    Ok(RgbaImage::from_fn(width, height.max(1), |x, _| {
        if modules[x as usize] == 1 { fg.to_rgba() } else { bg.to_rgba() }
    }))
}
