//! LabelForge CLI - Bridge interface for the label generator page
//!
//! Commands: templates, validate, render, batch
//! Outputs JSON to stdout, logs to stderr
//! Exit codes: 0 ok, 1 usage or I/O error, 2 validation or render failure

use clap::{Args, Parser, Subcommand};
use indexmap::IndexMap;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use labelforge_core::{
    batch::{write_labels, BatchRequest, WriteReport},
    pipeline::ResolvedLabel,
    print::{parse_mm_pair, PrintSpec},
    templates::TemplateRegistry,
    ComposerConfig, LabelPipeline, LabelSpec, Notice, PipelineError, RenderRequest,
};

const VALIDATION_FAILURE: u8 = 2;

#[derive(Parser)]
#[command(name = "labelforge-cli")]
#[command(about = "LabelForge CLI - Label Composition Engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory of JSON templates, merged over the built-in presets
    #[arg(short, long, env = "LABELFORGE_TEMPLATES_DIR")]
    templates_dir: Option<PathBuf>,

    /// JSON file with composer layout settings
    #[arg(short, long, env = "LABELFORGE_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

/// Where the label comes from: a template plus values, or a full spec.
#[derive(Args)]
struct Source {
    /// Template ID. The payload is then a JSON object of field values.
    #[arg(short, long)]
    template: Option<String>,

    /// JSON payload (LabelSpec, or field values with --template)
    #[arg(short, long)]
    payload: String,
}

#[derive(Subcommand)]
enum Commands {
    /// List available templates
    Templates,

    /// Validate a label without rendering it
    Validate {
        #[command(flatten)]
        source: Source,
    },

    /// Render one label
    Render {
        #[command(flatten)]
        source: Source,

        /// Write the PNG into this directory
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Physical label size in millimetres, e.g. 50x30
        #[arg(long)]
        size_mm: Option<String>,

        /// Printer resolution used with --size-mm
        #[arg(long)]
        dpi: Option<u32>,
    },

    /// Render a serialized run of labels
    Batch {
        #[command(flatten)]
        source: Source,

        #[arg(short, long)]
        count: u32,

        #[arg(long, default_value_t = 1)]
        start: u64,

        /// Zero-pad serials to this many digits
        #[arg(long, default_value_t = 0)]
        pad: usize,

        /// Write the PNGs into this directory
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let pipeline = match build_pipeline(cli.templates_dir.as_deref(), cli.config.as_deref()) {
        Ok(p) => p,
        Err(e) => return usage_error(&e),
    };

    match cli.command {
        Commands::Templates => {
            let templates: Vec<_> = pipeline.list_templates()
                .iter()
                .map(|t| serde_json::json!({
                    "id": t.id,
                    "name": t.name,
                    "version": t.template_version,
                    "canvas": t.canvas().ok(),
                    "deprecated": t.deprecated,
                }))
                .collect();

            emit(&templates);
            ExitCode::SUCCESS
        }

        Commands::Validate { source } => {
            let request = match source.request() {
                Ok(r) => r,
                Err(e) => return usage_error(&e),
            };

            match pipeline.validate_label(&request) {
                Ok(result) => {
                    emit(&result);
                    if result.valid {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::from(VALIDATION_FAILURE)
                    }
                }
                Err(e) => pipeline_failure("Validation", &e),
            }
        }

        Commands::Render { source, out, size_mm, dpi } => {
            let request = match source.request() {
                Ok(r) => r,
                Err(e) => return usage_error(&e),
            };
            let print = match print_spec(size_mm.as_deref(), dpi) {
                Ok(p) => p,
                Err(e) => return usage_error(&e),
            };

            let label = match render_one(&pipeline, &request, print) {
                Ok(label) => label,
                Err(e) => return pipeline_failure("Label render", &e),
            };

            let written = match out {
                Some(dir) => match write_labels(std::slice::from_ref(&label), &dir) {
                    Ok(written) => written,
                    Err(e) => return usage_error(&format!("Failed to write labels: {e}")),
                },
                None => WriteReport::default(),
            };

            emit(&serde_json::json!({
                "success": written.is_complete(),
                "label": label,
                "written": written.written,
                "writeFailures": written.failures,
            }));
            if written.is_complete() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }

        Commands::Batch { source, count, start, pad, out } => {
            let request = match source.request() {
                Ok(r) => r,
                Err(e) => return usage_error(&e),
            };
            let batch = BatchRequest { source: request, start, count, pad_width: pad };

            let report = match pipeline.render_batch(&batch) {
                Ok(report) => report,
                Err(e) => return pipeline_failure("Batch generation", &e),
            };

            let written = match out {
                Some(dir) => match write_labels(&report.labels, &dir) {
                    Ok(written) => written,
                    Err(e) => return usage_error(&format!("Failed to write labels: {e}")),
                },
                None => WriteReport::default(),
            };

            emit(&serde_json::json!({
                "success": report.failures.is_empty() && written.is_complete(),
                "notice": report.notice(),
                "report": report,
                "written": written.written,
                "writeFailures": written.failures,
            }));
            if !written.is_complete() {
                ExitCode::FAILURE
            } else if report.failures.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(VALIDATION_FAILURE)
            }
        }
    }
}

impl Source {
    fn request(&self) -> Result<RenderRequest, String> {
        match &self.template {
            Some(template_id) => {
                let values: IndexMap<String, String> = serde_json::from_str(&self.payload)
                    .map_err(|e| format!("Invalid payload: {e}"))?;
                Ok(RenderRequest::Template { template_id: template_id.clone(), values })
            }
            None => {
                let spec: LabelSpec = serde_json::from_str(&self.payload)
                    .map_err(|e| format!("Invalid payload: {e}"))?;
                Ok(RenderRequest::Spec { spec })
            }
        }
    }
}

fn build_pipeline(templates_dir: Option<&Path>, config: Option<&Path>) -> Result<LabelPipeline, String> {
    let registry = match templates_dir {
        Some(dir) => TemplateRegistry::load_from_dir(dir)
            .map_err(|e| format!("Failed to load templates: {e}"))?,
        None => TemplateRegistry::with_builtins(),
    };

    let config = match config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
            serde_json::from_str::<ComposerConfig>(&raw)
                .map_err(|e| format!("Invalid config {}: {e}", path.display()))?
        }
        None => ComposerConfig::default(),
    };

    Ok(LabelPipeline::with_config(registry, config))
}

fn print_spec(size_mm: Option<&str>, dpi: Option<u32>) -> Result<Option<(PrintSpec, f64, f64)>, String> {
    let Some(size) = size_mm else {
        return Ok(None);
    };
    let (w, h) = parse_mm_pair(size).ok_or_else(|| format!("Invalid --size-mm {size:?}, expected WxH"))?;
    let print = match dpi {
        Some(dpi) => PrintSpec::from_user(dpi)?,
        None => PrintSpec::default(),
    };
    Ok(Some((print, w, h)))
}

fn render_one(
    pipeline: &LabelPipeline,
    request: &RenderRequest,
    print: Option<(PrintSpec, f64, f64)>,
) -> Result<labelforge_core::CompiledLabel, PipelineError> {
    let resolved = pipeline.resolve(request)?;
    let resolved = match print {
        Some((print, w, h)) => {
            let mut spec = resolved.spec;
            spec.canvas_size = print.canvas_for_mm(w, h);
            ResolvedLabel { spec, template: resolved.template }
        }
        None => resolved,
    };
    pipeline.compile(&resolved)
}

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_env("LABELFORGE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn emit<T: Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap());
}

fn usage_error(message: &str) -> ExitCode {
    emit(&serde_json::json!({ "success": false, "error": message }));
    ExitCode::FAILURE
}

fn pipeline_failure(operation: &str, error: &PipelineError) -> ExitCode {
    emit(&serde_json::json!({
        "success": false,
        "error": error.to_string(),
        "notice": Notice::failure(operation, error),
    }));
    ExitCode::from(VALIDATION_FAILURE)
}
