//! Validation System - Rule/Policy Separation
//!
//! Rules produce structured violations.
//! Policy maps violations to actions.

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::composer::{ComposerConfig, LabelComposer, MAX_FONT_SIZE, MIN_FONT_SIZE};
use crate::label::{LabelSpec, OverflowPolicy};
use crate::templates::FailureMode;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationViolation {
    pub rule: String,
    pub severity: ViolationSeverity,
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub remediation: Vec<String>,
}

impl ValidationViolation {
    fn new(rule: &str, severity: ViolationSeverity, message: impl Into<String>) -> Self {
        Self {
            rule: rule.to_string(),
            severity,
            message: message.into(),
            expected: None,
            actual: None,
            remediation: vec![],
        }
    }

    fn expected(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }

    fn remedy(mut self, remediation: &str) -> Self {
        self.remediation.push(remediation.to_string());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub violations: Vec<ValidationViolation>,
}

impl ValidationResult {
    pub fn success() -> Self {
        Self { valid: true, violations: vec![] }
    }

    pub fn failure(violations: Vec<ValidationViolation>) -> Self {
        Self { valid: false, violations }
    }

    pub fn has_errors(&self) -> bool {
        self.violations.iter().any(|v| v.severity == ViolationSeverity::Error)
    }

    /// `rule: message` pairs joined for a one-line summary.
    pub fn summary(&self) -> String {
        self.violations
            .iter()
            .map(|v| format!("{}: {}", v.rule, v.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Validation rule trait - produces violations
pub trait ValidationRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn validate(&self, spec: &LabelSpec, config: &ComposerConfig) -> Vec<ValidationViolation>;
}

// --- Concrete Rules ---

pub struct CanvasSizeRule;

impl ValidationRule for CanvasSizeRule {
    fn name(&self) -> &'static str { "canvas_size" }

    fn validate(&self, spec: &LabelSpec, config: &ComposerConfig) -> Vec<ValidationViolation> {
        let size = spec.canvas_size;
        let max = config.max_dimension;
        if size.is_empty() || size.width > max || size.height > max {
            vec![ValidationViolation::new(self.name(), ViolationSeverity::Error, "Canvas size out of range")
                .expected(format!("1..={max} px per side"), format!("{}x{}", size.width, size.height))
                .remedy("Use positive canvas dimensions within the supported maximum")]
        } else {
            vec![]
        }
    }
}

pub struct ColorRule;

impl ValidationRule for ColorRule {
    fn name(&self) -> &'static str { "color" }

    fn validate(&self, spec: &LabelSpec, _config: &ComposerConfig) -> Vec<ValidationViolation> {
        let style = &spec.style;
        [
            ("backgroundColor", &style.background_color),
            ("textColor", &style.text_color),
            ("borderColor", &style.border_color),
        ]
        .into_iter()
        .filter(|(_, value)| Color::parse(value).is_err())
        .map(|(field, value)| {
            ValidationViolation::new(self.name(), ViolationSeverity::Error, format!("Invalid {field}"))
                .expected("hex (#rrggbb), rgb()/rgba() or a CSS color name", value.as_str())
                .remedy("Pick a color from the style editor")
        })
        .collect()
    }
}

pub struct FontSizeRule;

impl ValidationRule for FontSizeRule {
    fn name(&self) -> &'static str { "font_size" }

    fn validate(&self, spec: &LabelSpec, _config: &ComposerConfig) -> Vec<ValidationViolation> {
        let size = spec.style.font_size;
        if (MIN_FONT_SIZE..=MAX_FONT_SIZE).contains(&size) {
            return vec![];
        }
        vec![ValidationViolation::new(self.name(), ViolationSeverity::Error, "Font size out of range")
            .expected(format!("{MIN_FONT_SIZE}..={MAX_FONT_SIZE}"), size.to_string())]
    }
}

/// The QR region must fit inside the canvas.
pub struct QrRegionRule;

impl ValidationRule for QrRegionRule {
    fn name(&self) -> &'static str { "qr_region" }

    fn validate(&self, spec: &LabelSpec, config: &ComposerConfig) -> Vec<ValidationViolation> {
        if spec.qr().is_none() {
            return vec![];
        }
        let needed = config.qr_size.saturating_add(config.qr_margin.saturating_mul(2));
        let size = spec.canvas_size;
        if size.width < needed || size.height < needed {
            return vec![ValidationViolation::new(self.name(), ViolationSeverity::Error, "Canvas too small for QR code")
                .expected(format!("at least {needed}x{needed}"), format!("{}x{}", size.width, size.height))];
        }
        vec![]
    }
}

/// The barcode region must fit. Payload content is the encoder's call and
/// surfaces as `InvalidPayload` at render time.
pub struct BarcodeRegionRule;

impl ValidationRule for BarcodeRegionRule {
    fn name(&self) -> &'static str { "barcode_region" }

    fn validate(&self, spec: &LabelSpec, config: &ComposerConfig) -> Vec<ValidationViolation> {
        if spec.barcode().is_none() {
            return vec![];
        }
        let size = spec.canvas_size;
        let margins = config.barcode_margin.saturating_mul(2);
        let min_height = config.barcode_height.saturating_add(margins);
        let min_width = margins.saturating_add(1);

        if size.height < min_height || size.width < min_width {
            return vec![ValidationViolation::new(self.name(), ViolationSeverity::Error, "Canvas too small for barcode")
                .expected(format!("at least {min_width}x{min_height}"), format!("{}x{}", size.width, size.height))];
        }
        vec![]
    }
}

/// Predicts lines the composer would drop below the text area or truncate
/// beside the QR code. Only an error when the label asks to reject overflow.
pub struct TextOverflowRule;

impl ValidationRule for TextOverflowRule {
    fn name(&self) -> &'static str { "text_overflow" }

    fn validate(&self, spec: &LabelSpec, config: &ComposerConfig) -> Vec<ValidationViolation> {
        // An unsupported font size is reported by FontSizeRule.
        let Ok(layout) = LabelComposer::new(config.clone()).predict_layout(spec) else {
            return vec![];
        };
        let severity = match spec.overflow {
            OverflowPolicy::Reject => ViolationSeverity::Error,
            OverflowPolicy::Clip => ViolationSeverity::Warning,
            OverflowPolicy::Overlap => ViolationSeverity::Info,
        };

        let mut violations = vec![];
        if !layout.dropped.is_empty() {
            let dropped = layout.dropped.len();
            violations.push(
                ValidationViolation::new(self.name(), severity.clone(), "Text overflows into the barcode area")
                    .expected("every field line fits above the barcode", format!("{dropped} line(s) dropped"))
                    .remedy("Reduce the font size, remove fields or use a taller canvas"),
            );
        }
        let truncated = layout.lines.iter().filter(|l| l.truncated).count();
        if truncated > 0 {
            violations.push(
                ValidationViolation::new(self.name(), severity, "Text runs into the QR code")
                    .expected("every line fits left of the QR code", format!("{truncated} line(s) truncated"))
                    .remedy("Shorten the values, reduce the font size or widen the canvas"),
            );
        }
        violations
    }
}

/// QR and barcode regions overlap on short canvases.
pub struct RegionOverlapRule;

impl ValidationRule for RegionOverlapRule {
    fn name(&self) -> &'static str { "region_overlap" }

    fn validate(&self, spec: &LabelSpec, config: &ComposerConfig) -> Vec<ValidationViolation> {
        if spec.qr().is_none() || spec.barcode().is_none() {
            return vec![];
        }
        let qr_bottom = config.qr_margin.saturating_add(config.qr_size);
        let barcode_band = config.barcode_height.saturating_add(config.barcode_margin);
        let barcode_top = spec.canvas_size.height.saturating_sub(barcode_band);
        if qr_bottom > barcode_top {
            return vec![ValidationViolation::new(self.name(), ViolationSeverity::Warning, "QR code overlaps the barcode")
                .expected(format!("canvas height >= {}", qr_bottom.saturating_add(barcode_band)),
                    spec.canvas_size.height.to_string())];
        }
        vec![]
    }
}

/// Validator orchestrates rules and applies policy
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(CanvasSizeRule),
                Box::new(ColorRule),
                Box::new(FontSizeRule),
                Box::new(QrRegionRule),
                Box::new(BarcodeRegionRule),
                Box::new(TextOverflowRule),
                Box::new(RegionOverlapRule),
            ],
        }
    }

    pub fn validate(&self, spec: &LabelSpec, config: &ComposerConfig, mode: FailureMode) -> ValidationResult {
        let mut all_violations = vec![];

        for rule in &self.rules {
            all_violations.extend(rule.validate(spec, config));
        }

        let has_errors = all_violations.iter()
            .any(|v| v.severity == ViolationSeverity::Error);

        match mode {
            FailureMode::Block if has_errors => ValidationResult::failure(all_violations),
            FailureMode::Block => {
                // Warnings don't block
                ValidationResult { valid: true, violations: all_violations }
            }
            FailureMode::Warn | FailureMode::Log => {
                // Never block, just record
                ValidationResult { valid: true, violations: all_violations }
            }
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}
