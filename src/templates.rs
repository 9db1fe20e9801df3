//! Label templates - reusable label layouts with value patterns

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::label::{CanvasSize, LabelSpec, LabelStyle, OverflowPolicy, SERIAL_PLACEHOLDER};
use crate::print::PrintSpec;
use crate::symbology::BarcodeFormat;

pub type TemplateId = String;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template {template} has neither canvasSize nor physicalSizeMm")]
    MissingCanvas { template: String },

    #[error("template {template} references unknown field {placeholder:?}")]
    UnknownPlaceholder { template: String, placeholder: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelTemplate {
    pub id: TemplateId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub template_version: String,
    pub engine_min_version: String,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub superseded_by: Option<String>,
    /// Pixel size. Takes precedence over `physical_size_mm`.
    #[serde(default)]
    pub canvas_size: Option<CanvasSize>,
    #[serde(default)]
    pub physical_size_mm: Option<[f64; 2]>,
    #[serde(default)]
    pub dpi: Option<u32>,
    #[serde(default)]
    pub style: LabelStyle,
    #[serde(default)]
    pub fields: Vec<TemplateField>,
    /// QR payload pattern, e.g. `"{SKU}"`.
    #[serde(default)]
    pub qr: Option<String>,
    #[serde(default)]
    pub barcode: Option<BarcodeTemplate>,
    /// File name pattern, e.g. `"{SKU}-{serial}"`.
    #[serde(default)]
    pub name_pattern: Option<String>,
    #[serde(default)]
    pub overflow: OverflowPolicy,
    #[serde(default)]
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateField {
    pub label: String,
    /// Default value; may contain `{serial}`.
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarcodeTemplate {
    #[serde(default)]
    pub format: BarcodeFormat,
    pub payload: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationConfig {
    #[serde(default)]
    pub failure_mode: FailureMode,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    #[default]
    Block,
    Warn,
    Log,
}

impl LabelTemplate {
    pub fn canvas(&self) -> Result<CanvasSize, TemplateError> {
        if let Some(size) = self.canvas_size {
            return Ok(size);
        }
        let [w, h] = self.physical_size_mm.ok_or_else(|| TemplateError::MissingCanvas {
            template: self.id.clone(),
        })?;
        let print = self.dpi.map(PrintSpec::from_template).unwrap_or_default();
        Ok(print.canvas_for_mm(w, h))
    }

    /// Build a spec from caller `values` layered over the template defaults.
    /// Values for labels the template does not define are appended.
    /// `{serial}` is left in place for batch substitution.
    pub fn instantiate(&self, values: &IndexMap<String, String>) -> Result<LabelSpec, TemplateError> {
        let mut spec = LabelSpec::new(self.canvas()?);
        spec.style = self.style.clone();
        spec.overflow = self.overflow;

        for field in &self.fields {
            let value = values.get(&field.label).unwrap_or(&field.value);
            spec.fields.insert(field.label.clone(), value.clone());
        }
        for (label, value) in values {
            if spec.fields.get(label).is_none() {
                spec.fields.insert(label.clone(), value.clone());
            }
        }

        let expand = |pattern: &str| expand_pattern(&self.id, pattern, &spec);
        let qr = self.qr.as_deref().map(expand).transpose()?;
        let barcode = self
            .barcode
            .as_ref()
            .map(|b| expand(&b.payload).map(|payload| (b.format, payload)))
            .transpose()?;
        let name = self.name_pattern.as_deref().map(expand).transpose()?;

        spec.qr_payload = qr;
        if let Some((format, payload)) = barcode {
            spec.barcode_format = format;
            spec.barcode_payload = Some(payload);
        }
        spec.name = name;
        Ok(spec)
    }
}

/// Replace `{Label}` with that field's value. `{serial}` passes through.
fn expand_pattern(template: &str, pattern: &str, spec: &LabelSpec) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let Some(len) = rest[start..].find('}') else {
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let token = &rest[start..start + len + 1];
        let key = &token[1..token.len() - 1];

        if token == SERIAL_PLACEHOLDER {
            out.push_str(token);
        } else if let Some(value) = spec.fields.get(key) {
            out.push_str(value);
        } else {
            return Err(TemplateError::UnknownPlaceholder {
                template: template.to_string(),
                placeholder: key.to_string(),
            });
        }
        rest = &rest[start + len + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Template registry - loads and caches templates
pub struct TemplateRegistry {
    templates: HashMap<TemplateId, LabelTemplate>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self { templates: HashMap::new() }
    }

    /// Registry preloaded with the stock label layouts.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for template in builtin_templates() {
            registry.register(template);
        }
        registry
    }

    /// Load every `*.json` template in `dir` on top of the built-ins.
    /// Files that fail to parse are skipped with a warning.
    pub fn load_from_dir(dir: &Path) -> Result<Self, std::io::Error> {
        let mut registry = Self::with_builtins();
        if !dir.exists() {
            debug!(dir = %dir.display(), "templates directory missing, using built-ins");
            return Ok(registry);
        }

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().map_or(true, |e| e != "json") {
                continue;
            }
            let parsed = fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|content| serde_json::from_str::<LabelTemplate>(&content).map_err(|e| e.to_string()));
            match parsed {
                Ok(template) => {
                    debug!(id = %template.id, path = %path.display(), "template loaded");
                    registry.register(template);
                }
                Err(error) => warn!(path = %path.display(), %error, "skipping unreadable template"),
            }
        }
        Ok(registry)
    }

    pub fn get(&self, id: &str) -> Option<&LabelTemplate> {
        self.templates.get(id)
    }

    /// All templates, ordered by id.
    pub fn list(&self) -> Vec<&LabelTemplate> {
        let mut all: Vec<_> = self.templates.values().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn register(&mut self, template: LabelTemplate) {
        self.templates.insert(template.id.clone(), template);
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn field(label: &str, value: &str) -> TemplateField {
    TemplateField { label: label.to_string(), value: value.to_string() }
}

fn builtin(id: &str, name: &str, description: &str) -> LabelTemplate {
    LabelTemplate {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        template_version: "1.0.0".to_string(),
        engine_min_version: crate::MIN_TEMPLATE_VERSION.to_string(),
        deprecated: false,
        superseded_by: None,
        canvas_size: None,
        physical_size_mm: None,
        dpi: None,
        style: LabelStyle::default(),
        fields: vec![],
        qr: None,
        barcode: None,
        name_pattern: None,
        overflow: OverflowPolicy::Clip,
        validation: ValidationConfig::default(),
    }
}

pub fn builtin_templates() -> Vec<LabelTemplate> {
    let fabric_roll = LabelTemplate {
        canvas_size: Some(CanvasSize::new(300, 200)),
        fields: vec![
            field("SKU", ""),
            field("Fabric", ""),
            field("Color", ""),
            field("Width", ""),
            field("Length", ""),
            field("Location", ""),
        ],
        qr: Some("{SKU}".to_string()),
        barcode: Some(BarcodeTemplate { format: BarcodeFormat::Code128, payload: "{SKU}".to_string() }),
        name_pattern: Some("{SKU}".to_string()),
        ..builtin("fabric-roll", "Fabric Roll", "Roll tag with SKU QR code and Code 128 barcode")
    };

    let bin_location = LabelTemplate {
        canvas_size: Some(CanvasSize::new(300, 150)),
        style: LabelStyle { font_size: 20, ..LabelStyle::default() },
        fields: vec![field("Location", ""), field("Zone", "")],
        qr: Some("{Location}".to_string()),
        name_pattern: Some("{Location}".to_string()),
        ..builtin("bin-location", "Bin Location", "Shelf/bin marker with location QR code")
    };

    let shipping_carton = LabelTemplate {
        physical_size_mm: Some([101.6, 152.4]),
        dpi: Some(203),
        style: LabelStyle { font_size: 28, ..LabelStyle::default() },
        fields: vec![
            field("PO", ""),
            field("Destination", ""),
            field("GTIN", ""),
            field("Carton", "{serial}"),
        ],
        barcode: Some(BarcodeTemplate { format: BarcodeFormat::Itf14, payload: "{GTIN}".to_string() }),
        name_pattern: Some("carton-{serial}".to_string()),
        ..builtin("shipping-carton", "Shipping Carton", "4x6in outer carton label with ITF-14")
    };

    vec![fabric_roll, bin_location, shipping_carton]
}
