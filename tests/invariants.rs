//! Contract Invariant Tests
//!
//! These tests verify the non-negotiable guarantees.

use indexmap::IndexMap;
use labelforge_core::{
    hashing::canonical_json,
    pipeline::ResolvedLabel,
    templates::{FailureMode, LabelTemplate, TemplateField, TemplateRegistry, ValidationConfig},
    BarcodeFormat, CanvasSize, LabelPipeline, LabelSpec, LabelStyle, OverflowPolicy, PipelineError,
    RenderError, RenderRequest,
};

fn create_test_template() -> LabelTemplate {
    LabelTemplate {
        id: "test-bin".to_string(),
        name: "Test Bin".to_string(),
        description: "Test template".to_string(),
        template_version: "1.0.0".to_string(),
        engine_min_version: "1.0.0".to_string(),
        deprecated: false,
        superseded_by: None,
        canvas_size: Some(CanvasSize::new(300, 200)),
        physical_size_mm: None,
        dpi: None,
        style: LabelStyle::default(),
        fields: vec![
            TemplateField { label: "SKU".to_string(), value: String::new() },
            TemplateField { label: "Location".to_string(), value: "A-01".to_string() },
        ],
        qr: Some("{SKU}".to_string()),
        barcode: None,
        name_pattern: Some("{SKU}".to_string()),
        overflow: OverflowPolicy::Clip,
        validation: ValidationConfig { failure_mode: FailureMode::Block },
    }
}

fn create_pipeline() -> LabelPipeline {
    let mut registry = TemplateRegistry::new();
    registry.register(create_test_template());
    LabelPipeline::new(registry)
}

fn values(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn template_request(pairs: &[(&str, &str)]) -> RenderRequest {
    RenderRequest::Template { template_id: "test-bin".to_string(), values: values(pairs) }
}

#[test]
fn invariant_render_calls_validate() {
    // An invalid label must be rejected before the composer runs.
    let pipeline = create_pipeline();

    let mut spec = LabelSpec::new(CanvasSize::new(300, 200)).with_field("SKU", "FAB-001");
    spec.style.font_size = 2;

    let result = pipeline.render_label(&RenderRequest::Spec { spec });

    assert!(result.is_err());
    let err = result.unwrap_err();
    assert!(err.to_string().contains("Validation failed"));
    assert!(err.to_string().contains("font_size"));
}

#[test]
fn invariant_compile_validates_resolved_labels_too() {
    let pipeline = create_pipeline();
    let resolved = ResolvedLabel { spec: LabelSpec::new(CanvasSize::new(0, 200)), template: None };

    assert!(matches!(pipeline.compile(&resolved), Err(PipelineError::ValidationFailed(_))));
}

#[test]
fn invariant_valid_label_renders() {
    let pipeline = create_pipeline();

    let label = pipeline.render_label(&template_request(&[("SKU", "FAB-001")])).unwrap();

    assert!(label.validation.valid);
    assert!(!label.manifest_hash.is_empty());
    assert_eq!(label.template_id, "test-bin");
    assert_eq!(label.file.filename, "label-FAB-001.png");
    assert_eq!(label.file.size, [300, 200]);
    assert_eq!(label.layout.lines[0].text, "SKU: FAB-001");
    assert_eq!(label.layout.lines[1].text, "Location: A-01");
}

#[test]
fn invariant_job_hash_stable() {
    // Same inputs must produce the same job hash and the same pixels
    let pipeline = create_pipeline();
    let request = template_request(&[("SKU", "FAB-001")]);

    let label1 = pipeline.render_label(&request).unwrap();
    let label2 = pipeline.render_label(&request).unwrap();

    assert_eq!(label1.job_hash, label2.job_hash);
    assert_eq!(label1.file.hash, label2.file.hash);
    assert_eq!(label1.template_version, label2.template_version);

    // Ids and timestamps differ, so the manifest hash does too
    assert_ne!(label1.id, label2.id);
}

#[test]
fn invariant_job_hash_tracks_field_order() {
    let pipeline = create_pipeline();
    let a = LabelSpec::new(CanvasSize::new(300, 200)).with_field("A", "1").with_field("B", "2");
    let b = LabelSpec::new(CanvasSize::new(300, 200)).with_field("B", "2").with_field("A", "1");

    let la = pipeline.render_label(&RenderRequest::Spec { spec: a }).unwrap();
    let lb = pipeline.render_label(&RenderRequest::Spec { spec: b }).unwrap();

    assert_ne!(la.job_hash, lb.job_hash);
}

#[test]
fn invariant_canonical_json_deterministic() {
    use serde_json::json;

    let obj1 = json!({"z": 1, "a": 2, "m": {"b": 1, "a": 2}});
    let obj2 = json!({"a": 2, "m": {"a": 2, "b": 1}, "z": 1});

    let c1 = canonical_json(&obj1).unwrap();
    let c2 = canonical_json(&obj2).unwrap();

    // Must be identical despite different input ordering
    assert_eq!(c1, c2);
}

#[test]
fn invariant_template_not_found_error() {
    let pipeline = create_pipeline();

    let request = RenderRequest::Template { template_id: "nonexistent".to_string(), values: IndexMap::new() };

    let result = pipeline.render_label(&request);
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("Template not found"));
}

#[test]
fn invariant_engine_version_enforced() {
    let mut template = create_test_template();
    template.engine_min_version = "99.0.0".to_string();
    let mut registry = TemplateRegistry::new();
    registry.register(template);
    let pipeline = LabelPipeline::new(registry);

    let result = pipeline.render_label(&template_request(&[("SKU", "FAB-001")]));
    assert!(matches!(result, Err(PipelineError::EngineVersionMismatch(..))));
}

#[test]
fn invariant_validation_result_structure() {
    let pipeline = create_pipeline();

    let mut spec = LabelSpec::new(CanvasSize::new(60, 60)).with_qr("FAB-001");
    spec.style.text_color = "chartreuse-ish".to_string();

    let result = pipeline.validate_label(&RenderRequest::Spec { spec }).unwrap();

    // Validation failed
    assert!(!result.valid);

    // Has violations with required fields
    let rules: Vec<_> = result.violations.iter().map(|v| v.rule.as_str()).collect();
    assert!(rules.contains(&"color"));
    assert!(rules.contains(&"qr_region"));
    for v in &result.violations {
        assert!(!v.rule.is_empty());
        assert!(!v.message.is_empty());
    }
}

#[test]
fn invariant_warn_mode_never_blocks() {
    let mut template = create_test_template();
    template.validation.failure_mode = FailureMode::Warn;
    template.canvas_size = Some(CanvasSize::new(300, 60));
    let mut registry = TemplateRegistry::new();
    registry.register(template);
    let pipeline = LabelPipeline::new(registry);

    let result = pipeline.validate_label(&template_request(&[("SKU", "FAB-001")])).unwrap();
    assert!(result.valid);
    assert!(result.has_errors());
}

#[test]
fn invariant_payload_errors_surface_from_the_encoder() {
    let pipeline = create_pipeline();
    let spec = LabelSpec::new(CanvasSize::new(300, 200))
        .with_field("SKU", "FAB-001")
        .with_barcode(BarcodeFormat::Itf14, "FAB-001");

    // Region fits, so validation passes and the encoder rejects the payload.
    assert!(pipeline.validate_label(&RenderRequest::Spec { spec: spec.clone() }).unwrap().valid);

    match pipeline.render_label(&RenderRequest::Spec { spec }) {
        Err(PipelineError::Render(RenderError::InvalidPayload(e))) => {
            assert!(e.to_string().starts_with("ITF14 barcode"));
        }
        other => panic!("expected InvalidPayload, got {other:?}"),
    }
}

#[test]
fn invariant_huge_font_is_a_validation_failure() {
    let pipeline = create_pipeline();
    let mut spec = LabelSpec::new(CanvasSize::new(300, 200))
        .with_field("SKU", "FAB-001")
        .with_qr("FAB-001")
        .with_barcode(BarcodeFormat::Code128, "FAB-001");
    spec.style.font_size = u32::MAX;

    match pipeline.render_label(&RenderRequest::Spec { spec }) {
        Err(PipelineError::ValidationFailed(summary)) => assert!(summary.contains("font_size")),
        other => panic!("expected ValidationFailed, got {other:?}"),
    }
}

#[test]
fn invariant_huge_font_under_warn_mode_is_a_render_error() {
    let mut template = create_test_template();
    template.validation.failure_mode = FailureMode::Warn;
    template.style.font_size = u32::MAX;
    let mut registry = TemplateRegistry::new();
    registry.register(template);
    let pipeline = LabelPipeline::new(registry);

    let result = pipeline.render_label(&template_request(&[("SKU", "FAB-001")]));
    assert!(matches!(result, Err(PipelineError::Render(RenderError::UnsupportedFontSize(u32::MAX)))));
}

#[test]
fn invariant_reject_overflow_fails_in_validation_not_render() {
    // The descent of "B: 2" crosses the text area edge above the barcode.
    let pipeline = create_pipeline();
    let mut spec = LabelSpec::new(CanvasSize::new(300, 108))
        .with_field("A", "1")
        .with_field("B", "2")
        .with_barcode(BarcodeFormat::Code128, "X");
    spec.overflow = OverflowPolicy::Reject;

    match pipeline.render_label(&RenderRequest::Spec { spec: spec.clone() }) {
        Err(PipelineError::ValidationFailed(summary)) => assert!(summary.contains("text_overflow")),
        other => panic!("expected ValidationFailed, got {other:?}"),
    }

    spec.overflow = OverflowPolicy::Clip;
    let label = pipeline.render_label(&RenderRequest::Spec { spec }).unwrap();
    assert_eq!(label.layout.dropped, vec!["B: 2".to_string()]);
    assert!(label.validation.violations.iter().any(|v| v.rule == "text_overflow"));
}
