//! LabelForge Core - Label Composition Engine
//!
//! # Guarantees
//! 1. Output dimensions equal the requested canvas size
//! 2. Fields render in insertion order; empty values are skipped
//! 3. A bad QR or barcode payload fails the label, never half-draws it
//! 4. Rendering always validates first
//! 5. Same spec, same pixels

pub mod color;
pub mod label;
pub mod symbology;
pub mod surface;
pub mod composer;
pub mod templates;
pub mod validation;
pub mod hashing;
pub mod print;
pub mod notice;
pub mod pipeline;
pub mod batch;
pub mod draft;

pub use color::Color;
pub use label::{CanvasSize, LabelFields, LabelSpec, LabelStyle, OverflowPolicy};
pub use symbology::{BarcodeFormat, Symbology, SymbologyError};
pub use composer::{ComposerConfig, LabelComposer, LabelLayout, RenderError, RenderedLabel};
pub use templates::{LabelTemplate, TemplateRegistry};
pub use validation::{ValidationResult, ValidationRule, ValidationViolation, ViolationSeverity};
pub use hashing::{compute_manifest_hash, compute_job_hash, canonical_json};
pub use print::{PrintAuthority, PrintSpec};
pub use notice::{Notice, NoticeLevel};
pub use pipeline::{CompiledLabel, LabelPipeline, PipelineError, RenderRequest};
pub use batch::{BatchReport, BatchRequest};
pub use draft::{DraftCommand, LabelDraft};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const MIN_TEMPLATE_VERSION: &str = "1.0.0";
