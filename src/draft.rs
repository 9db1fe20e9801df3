//! Label generator page state.
//!
//! The editor state is a plain serializable value. Every user action is a
//! [`DraftCommand`] and [`LabelDraft::apply`] returns the next state, so the
//! page logic can be exercised without any UI.

use serde::{Deserialize, Serialize};

use crate::batch::BatchRequest;
use crate::label::{CanvasSize, LabelSpec, LabelStyle, OverflowPolicy};
use crate::notice::Notice;
use crate::pipeline::{CompiledLabel, RenderRequest};
use crate::symbology::BarcodeFormat;

/// History entries kept on the page.
const MAX_HISTORY: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSettings {
    pub start: u64,
    pub count: u32,
    pub pad_width: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self { start: 1, count: 10, pad_width: 3 }
    }
}

/// One generated file as remembered by the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedEntry {
    pub filename: String,
    pub hash: String,
    pub size: [u32; 2],
}

impl From<&CompiledLabel> for GeneratedEntry {
    fn from(label: &CompiledLabel) -> Self {
        Self {
            filename: label.file.filename.clone(),
            hash: label.file.hash.clone(),
            size: label.file.size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelDraft {
    pub spec: LabelSpec,
    pub batch: BatchSettings,
    /// Newest first.
    pub generated: Vec<GeneratedEntry>,
    pub last_notice: Option<Notice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DraftCommand {
    SetField { label: String, value: String },
    RemoveField { label: String },
    MoveField { label: String, to: usize },
    SetCanvasSize { size: CanvasSize },
    SetStyle { style: LabelStyle },
    SetQrPayload { payload: Option<String> },
    SetBarcode { format: BarcodeFormat, payload: Option<String> },
    SetOverflow { policy: OverflowPolicy },
    SetName { name: Option<String> },
    SetBatch { settings: BatchSettings },
    RecordGenerated { entries: Vec<GeneratedEntry> },
    RecordNotice { notice: Notice },
    ClearHistory,
    Reset,
}

impl Default for LabelDraft {
    fn default() -> Self {
        Self::new(CanvasSize::new(300, 200))
    }
}

impl LabelDraft {
    pub fn new(size: CanvasSize) -> Self {
        Self {
            spec: LabelSpec::new(size),
            batch: BatchSettings::default(),
            generated: vec![],
            last_notice: None,
        }
    }

    pub fn apply(mut self, command: DraftCommand) -> Self {
        match command {
            DraftCommand::SetField { label, value } => {
                if !label.trim().is_empty() {
                    self.spec.fields.insert(label, value);
                }
            }
            DraftCommand::RemoveField { label } => {
                self.spec.fields.remove(&label);
            }
            DraftCommand::MoveField { label, to } => {
                self.spec.fields.move_to(&label, to);
            }
            DraftCommand::SetCanvasSize { size } => {
                if !size.is_empty() {
                    self.spec.canvas_size = size;
                }
            }
            DraftCommand::SetStyle { style } => self.spec.style = style,
            DraftCommand::SetQrPayload { payload } => self.spec.qr_payload = payload,
            DraftCommand::SetBarcode { format, payload } => {
                self.spec.barcode_format = format;
                self.spec.barcode_payload = payload;
            }
            DraftCommand::SetOverflow { policy } => self.spec.overflow = policy,
            DraftCommand::SetName { name } => self.spec.name = name,
            DraftCommand::SetBatch { settings } => self.batch = settings,
            DraftCommand::RecordGenerated { entries } => {
                let mut generated = entries;
                generated.reverse();
                generated.extend(self.generated);
                generated.truncate(MAX_HISTORY);
                self.generated = generated;
            }
            DraftCommand::RecordNotice { notice } => self.last_notice = Some(notice),
            DraftCommand::ClearHistory => {
                self.generated.clear();
                self.last_notice = None;
            }
            DraftCommand::Reset => return Self::new(self.spec.canvas_size),
        }
        self
    }

    pub fn render_request(&self) -> RenderRequest {
        RenderRequest::Spec { spec: self.spec.clone() }
    }

    pub fn batch_request(&self) -> BatchRequest {
        BatchRequest {
            source: self.render_request(),
            start: self.batch.start,
            count: self.batch.count,
            pad_width: self.batch.pad_width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(label: &str, value: &str) -> DraftCommand {
        DraftCommand::SetField { label: label.into(), value: value.into() }
    }

    #[test]
    fn test_field_editing() {
        let draft = LabelDraft::default()
            .apply(field("SKU", "FAB-001"))
            .apply(field("Location", "A-01"))
            .apply(field("  ", "ignored"))
            .apply(DraftCommand::MoveField { label: "Location".into(), to: 0 })
            .apply(DraftCommand::RemoveField { label: "SKU".into() });

        let fields: Vec<_> = draft.spec.fields.iter().collect();
        assert_eq!(fields, vec![("Location", "A-01")]);
    }

    #[test]
    fn test_zero_canvas_ignored() {
        let draft = LabelDraft::default().apply(DraftCommand::SetCanvasSize { size: CanvasSize::new(0, 50) });
        assert_eq!(draft.spec.canvas_size, CanvasSize::new(300, 200));
    }

    #[test]
    fn test_history_newest_first_and_capped() {
        let entry = |n: usize| GeneratedEntry { filename: format!("label-{n}.png"), hash: String::new(), size: [1, 1] };
        let mut draft = LabelDraft::default();
        draft = draft.apply(DraftCommand::RecordGenerated { entries: (0..40).map(entry).collect() });
        draft = draft.apply(DraftCommand::RecordGenerated { entries: (40..60).map(entry).collect() });

        assert_eq!(draft.generated.len(), MAX_HISTORY);
        assert_eq!(draft.generated[0].filename, "label-59.png");
    }

    #[test]
    fn test_reset_keeps_canvas() {
        let draft = LabelDraft::new(CanvasSize::new(400, 240))
            .apply(field("SKU", "X"))
            .apply(DraftCommand::Reset);
        assert!(draft.spec.fields.is_empty());
        assert_eq!(draft.spec.canvas_size, CanvasSize::new(400, 240));
    }

    #[test]
    fn test_commands_deserialize() {
        let cmd: DraftCommand =
            serde_json::from_str(r#"{"type": "set_barcode", "format": "EAN13", "payload": "400638133393"}"#).unwrap();
        let draft = LabelDraft::default().apply(cmd);
        assert_eq!(draft.spec.barcode_format, BarcodeFormat::Ean13);
        assert_eq!(draft.batch_request().count, 10);
    }
}
