//! Render always validates. Counted through the test hook, so this file
//! holds a single test and runs with `--features test-hooks`.

#![cfg(feature = "test-hooks")]

use labelforge_core::{
    pipeline::{get_validation_call_count, reset_validation_call_count},
    BatchRequest, CanvasSize, LabelPipeline, LabelSpec, RenderRequest,
};

#[test]
fn every_render_path_validates() {
    let pipeline = LabelPipeline::default();
    let request = RenderRequest::Spec {
        spec: LabelSpec::new(CanvasSize::new(300, 200)).with_field("SKU", "FAB-{serial}"),
    };

    reset_validation_call_count();
    pipeline.render_label(&request).unwrap();
    assert_eq!(get_validation_call_count(), 1);

    reset_validation_call_count();
    pipeline.validate_label(&request).unwrap();
    assert_eq!(get_validation_call_count(), 1);

    reset_validation_call_count();
    let report = pipeline.render_many(&[request.clone(), request.clone()]);
    assert_eq!(report.succeeded(), 2);
    assert_eq!(get_validation_call_count(), 2);

    reset_validation_call_count();
    let batch = BatchRequest { source: request, start: 1, count: 5, pad_width: 2 };
    pipeline.render_batch(&batch).unwrap();
    assert_eq!(get_validation_call_count(), 5);
}
