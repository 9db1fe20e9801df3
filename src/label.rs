//! Label description types.
//!
//! A [`LabelSpec`] is plain immutable input. It is built per render call,
//! passed to the composer by reference and dropped afterwards.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::symbology::BarcodeFormat;

/// Placeholder replaced by the serial number during batch generation.
pub const SERIAL_PLACEHOLDER: &str = "{serial}";

const FILE_NAME_CONTENT_CHARS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelStyle {
    #[serde(default = "default_background")]
    pub background_color: String,
    #[serde(default = "default_ink")]
    pub text_color: String,
    #[serde(default = "default_ink")]
    pub border_color: String,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
}

fn default_background() -> String { "#ffffff".to_string() }
fn default_ink() -> String { "#000000".to_string() }
fn default_font_size() -> u32 { 14 }

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            background_color: default_background(),
            text_color: default_ink(),
            border_color: default_ink(),
            font_size: default_font_size(),
        }
    }
}

/// What to do with text lines that would run into the QR or barcode regions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Drop lines below the text area and truncate lines beside the QR code.
    #[default]
    Clip,
    /// Fail the render.
    Reject,
    /// Draw everything; text may collide with the code regions.
    Overlap,
}

/// Ordered label → value mapping. Keys are unique; re-inserting a key keeps
/// its original position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelFields(IndexMap<String, String>);

impl LabelFields {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn insert(&mut self, label: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(label.into(), value.into())
    }

    pub fn remove(&mut self, label: &str) -> Option<String> {
        self.0.shift_remove(label)
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.0.get(label).map(String::as_str)
    }

    /// Move `label` to position `to` (clamped to the last index).
    pub fn move_to(&mut self, label: &str, to: usize) -> bool {
        match self.0.get_index_of(label) {
            Some(from) => {
                let last = self.0.len() - 1;
                self.0.move_index(from, to.min(last));
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Entries that produce a drawn line.
    pub fn non_empty(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(_, v)| !v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelFields {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut fields = LabelFields::new();
        for (k, v) in iter {
            fields.insert(k, v);
        }
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSpec {
    /// Optional display name, used for the output file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: LabelFields,
    pub canvas_size: CanvasSize,
    #[serde(default)]
    pub style: LabelStyle,
    #[serde(default)]
    pub qr_payload: Option<String>,
    #[serde(default)]
    pub barcode_payload: Option<String>,
    #[serde(default)]
    pub barcode_format: BarcodeFormat,
    #[serde(default)]
    pub overflow: OverflowPolicy,
}

impl LabelSpec {
    pub fn new(canvas_size: CanvasSize) -> Self {
        Self {
            name: None,
            fields: LabelFields::new(),
            canvas_size,
            style: LabelStyle::default(),
            qr_payload: None,
            barcode_payload: None,
            barcode_format: BarcodeFormat::default(),
            overflow: OverflowPolicy::default(),
        }
    }

    pub fn with_field(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(label, value);
        self
    }

    pub fn with_qr(mut self, payload: impl Into<String>) -> Self {
        self.qr_payload = Some(payload.into());
        self
    }

    pub fn with_barcode(mut self, format: BarcodeFormat, payload: impl Into<String>) -> Self {
        self.barcode_format = format;
        self.barcode_payload = Some(payload.into());
        self
    }

    /// QR payload if one should be drawn. Empty strings count as absent.
    pub fn qr(&self) -> Option<&str> {
        self.qr_payload.as_deref().filter(|p| !p.is_empty())
    }

    /// Barcode payload if one should be drawn. Empty strings count as absent.
    pub fn barcode(&self) -> Option<&str> {
        self.barcode_payload.as_deref().filter(|p| !p.is_empty())
    }

    /// Copy of this spec with every `{serial}` placeholder replaced.
    pub fn with_serial(&self, serial: &str) -> LabelSpec {
        let sub = |s: &str| s.replace(SERIAL_PLACEHOLDER, serial);
        LabelSpec {
            name: self.name.as_deref().map(sub),
            fields: self.fields.iter().map(|(k, v)| (k, sub(v))).collect(),
            canvas_size: self.canvas_size,
            style: self.style.clone(),
            qr_payload: self.qr_payload.as_deref().map(sub),
            barcode_payload: self.barcode_payload.as_deref().map(sub),
            barcode_format: self.barcode_format,
            overflow: self.overflow,
        }
    }

    /// `label-{name}.png`, where name falls back to the first 20 characters
    /// of the label content.
    pub fn file_name(&self) -> String {
        let stem = self
            .name
            .as_deref()
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or_else(|| {
                self.qr()
                    .or_else(|| self.barcode())
                    .or_else(|| self.fields.non_empty().map(|(_, v)| v).next())
                    .map(|content| content.chars().take(FILE_NAME_CONTENT_CHARS).collect())
            })
            .unwrap_or_else(|| "untitled".to_string());

        format!("label-{}.png", sanitize_file_stem(&stem))
    }
}

fn sanitize_file_stem(stem: &str) -> String {
    stem.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
