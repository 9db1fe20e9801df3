//! Label Pipeline - Single Entry Point
//!
//! CRITICAL: render_label MUST call validate internally. No bypass.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::composer::{ComposerConfig, LabelComposer, LabelLayout, RenderError};
use crate::hashing::{compute_job_hash, compute_manifest_hash, sha256_hex};
use crate::label::LabelSpec;
use crate::templates::{FailureMode, LabelTemplate, TemplateError, TemplateRegistry};
use crate::validation::{ValidationResult, Validator};
use crate::ENGINE_VERSION;

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "test-hooks")]
static VALIDATION_CALL_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_validation_call_count() -> u32 {
    VALIDATION_CALL_COUNT.load(Ordering::SeqCst)
}

#[cfg(feature = "test-hooks")]
pub fn reset_validation_call_count() {
    VALIDATION_CALL_COUNT.store(0, Ordering::SeqCst);
}

/// Template id recorded for labels rendered from a raw spec.
const ADHOC_TEMPLATE: &str = "adhoc";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Template version {0} requires engine >= {1}, current is {2}")]
    EngineVersionMismatch(String, String, String),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Compilation error: {0}")]
    CompilationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// What to render: a complete spec, or a template plus field values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderRequest {
    Spec {
        spec: LabelSpec,
    },
    Template {
        template_id: String,
        #[serde(default)]
        values: IndexMap<String, String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledLabel {
    pub id: String,
    pub template_id: String,
    pub template_version: String,
    pub engine_version: String,
    pub created_at: DateTime<Utc>,
    pub manifest_hash: String,
    pub job_hash: String,
    pub validation: ValidationResult,
    pub layout: LabelLayout,
    pub file: ExportedFile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedFile {
    pub filename: String,
    pub format: String,
    pub size: [u32; 2],
    pub data_base64: String,
    pub hash: String,
    #[serde(skip)]
    pub png: Vec<u8>,
}

/// A request resolved to the concrete spec it renders.
pub struct ResolvedLabel<'a> {
    pub spec: LabelSpec,
    pub template: Option<&'a LabelTemplate>,
}

impl ResolvedLabel<'_> {
    fn failure_mode(&self) -> FailureMode {
        self.template.map(|t| t.validation.failure_mode).unwrap_or_default()
    }

    fn template_ref(&self) -> (&str, &str) {
        match self.template {
            Some(t) => (t.id.as_str(), t.template_version.as_str()),
            None => (ADHOC_TEMPLATE, ENGINE_VERSION),
        }
    }
}

/// The label pipeline - single entry point for all label operations
pub struct LabelPipeline {
    registry: TemplateRegistry,
    validator: Validator,
    composer: LabelComposer,
}

impl LabelPipeline {
    pub fn new(registry: TemplateRegistry) -> Self {
        Self::with_config(registry, ComposerConfig::default())
    }

    pub fn with_config(registry: TemplateRegistry, config: ComposerConfig) -> Self {
        Self {
            registry,
            validator: Validator::new(),
            composer: LabelComposer::new(config),
        }
    }

    /// List all available templates
    pub fn list_templates(&self) -> Vec<&LabelTemplate> {
        self.registry.list()
    }

    /// Get a specific template
    pub fn get_template(&self, id: &str) -> Option<&LabelTemplate> {
        self.registry.get(id)
    }

    pub fn composer(&self) -> &LabelComposer {
        &self.composer
    }

    /// Turn a request into the spec it describes. `{serial}` placeholders
    /// are left in place.
    pub fn resolve(&self, request: &RenderRequest) -> Result<ResolvedLabel<'_>, PipelineError> {
        match request {
            RenderRequest::Spec { spec } => Ok(ResolvedLabel { spec: spec.clone(), template: None }),
            RenderRequest::Template { template_id, values } => {
                let template = self.registry.get(template_id)
                    .ok_or_else(|| PipelineError::TemplateNotFound(template_id.clone()))?;
                self.check_engine_version(template)?;
                if template.deprecated {
                    warn!(
                        template = %template.id,
                        superseded_by = template.superseded_by.as_deref().unwrap_or("-"),
                        "rendering deprecated template"
                    );
                }
                Ok(ResolvedLabel { spec: template.instantiate(values)?, template: Some(template) })
            }
        }
    }

    /// Validate a label request
    ///
    /// This is the ONLY validation entry point.
    pub fn validate_label(&self, request: &RenderRequest) -> Result<ValidationResult, PipelineError> {
        let resolved = self.resolve(request)?;
        Ok(self.validate_resolved(&resolved))
    }

    fn validate_resolved(&self, resolved: &ResolvedLabel<'_>) -> ValidationResult {
        #[cfg(feature = "test-hooks")]
        VALIDATION_CALL_COUNT.fetch_add(1, Ordering::SeqCst);

        self.validator.validate(&resolved.spec, self.composer.config(), resolved.failure_mode())
    }

    /// Render one label
    ///
    /// CRITICAL: This ALWAYS validates first. No bypass possible.
    pub fn render_label(&self, request: &RenderRequest) -> Result<CompiledLabel, PipelineError> {
        let resolved = self.resolve(request)?;
        self.compile(&resolved)
    }

    /// Validate, render and describe an already resolved label.
    pub fn compile(&self, resolved: &ResolvedLabel<'_>) -> Result<CompiledLabel, PipelineError> {
        // MANDATORY: Validation is always called. This is non-negotiable.
        let validation = self.validate_resolved(resolved);

        if !validation.valid {
            return Err(PipelineError::ValidationFailed(validation.summary()));
        }

        let rendered = self.composer.render(&resolved.spec)?;
        let (template_id, template_version) = resolved.template_ref();

        let job_hash = compute_job_hash(template_id, template_version, &resolved.spec, ENGINE_VERSION)?;

        let file = ExportedFile {
            filename: resolved.spec.file_name(),
            format: "png".to_string(),
            size: [rendered.size.width, rendered.size.height],
            data_base64: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &rendered.png),
            hash: sha256_hex(&rendered.png),
            png: rendered.png,
        };

        let mut label = CompiledLabel {
            id: Uuid::new_v4().to_string(),
            template_id: template_id.to_string(),
            template_version: template_version.to_string(),
            engine_version: ENGINE_VERSION.to_string(),
            created_at: Utc::now(),
            manifest_hash: String::new(),  // Computed after
            job_hash,
            validation,
            layout: rendered.layout,
            file,
        };

        // Compute manifest hash (includes everything)
        label.manifest_hash = compute_manifest_hash(&label)?;

        info!(file = %label.file.filename, template = template_id, "label compiled");
        Ok(label)
    }

    fn check_engine_version(&self, template: &LabelTemplate) -> Result<(), PipelineError> {
        let engine_ver = semver::Version::parse(ENGINE_VERSION)
            .map_err(|_| PipelineError::CompilationError("Invalid engine version".into()))?;
        let min_ver = semver::Version::parse(&template.engine_min_version)
            .map_err(|_| PipelineError::CompilationError("Invalid template min version".into()))?;

        if engine_ver < min_ver {
            return Err(PipelineError::EngineVersionMismatch(
                template.template_version.clone(),
                template.engine_min_version.clone(),
                ENGINE_VERSION.to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for LabelPipeline {
    fn default() -> Self {
        Self::new(TemplateRegistry::with_builtins())
    }
}
