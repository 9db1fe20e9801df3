//! Composer properties: output size, determinism, field skipping and
//! presence of the code regions.

use image::RgbaImage;
use labelforge_core::{
    batch::write_labels,
    BarcodeFormat, CanvasSize, LabelComposer, LabelPipeline, LabelSpec, PipelineError, RenderError,
    RenderRequest,
};
use proptest::prelude::*;

fn decode(png: &[u8]) -> RgbaImage {
    image::load_from_memory(png).expect("valid png").to_rgba8()
}

fn has_ink(image: &RgbaImage, xs: std::ops::Range<u32>, ys: std::ops::Range<u32>) -> bool {
    ys.flat_map(|y| xs.clone().map(move |x| (x, y)))
        .any(|(x, y)| image.get_pixel(x, y).0[..3] != [255, 255, 255])
}

fn base_spec() -> LabelSpec {
    LabelSpec::new(CanvasSize::new(300, 200))
        .with_field("SKU", "FAB-001")
        .with_field("Location", "A-01")
}

#[test]
fn reference_label_renders() {
    let spec = base_spec()
        .with_qr("FAB-001")
        .with_barcode(BarcodeFormat::Code128, "FAB-001");

    let out = LabelComposer::default().render(&spec).unwrap();
    let image = decode(&out.png);

    assert_eq!(image.dimensions(), (300, 200));
    assert_eq!(out.layout.lines.len(), 2);
    assert_eq!(out.layout.lines[0].baseline, 24);
    assert_eq!(out.layout.lines[1].baseline, 43);
    assert!(!out.layout.overflowed());

    // Border, background, QR and barcode
    assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0, 255]);
    assert_eq!(image.get_pixel(150, 110).0, [255, 255, 255, 255]);
    assert!(has_ink(&image, 210..290, 10..90));
    assert!(has_ink(&image, 10..290, 140..190));
}

#[test]
fn sku_label_with_qr_and_empty_barcode() {
    let mut spec = base_spec().with_qr("FAB-001");
    spec.barcode_payload = Some(String::new());

    let out = LabelComposer::default().render(&spec).unwrap();
    let image = decode(&out.png);
    let texts: Vec<_> = out.layout.lines.iter().map(|l| l.text.as_str()).collect();

    assert_eq!(image.dimensions(), (300, 200));
    assert_eq!(texts, vec!["SKU: FAB-001", "Location: A-01"]);
    assert!(out.layout.qr_region.is_some());
    assert!(out.layout.barcode_region.is_none());
    assert!(has_ink(&image, 210..290, 10..90));
    assert!(!has_ink(&image, 10..290, 140..190));
}

#[test]
fn identical_specs_render_identical_bytes() {
    let spec = base_spec().with_qr("FAB-001").with_barcode(BarcodeFormat::Ean13, "400638133393");
    let composer = LabelComposer::default();

    let a = composer.render(&spec).unwrap();
    let b = composer.render(&spec.clone()).unwrap();

    assert_eq!(a.png, b.png);
}

#[test]
fn empty_fields_are_skipped() {
    let spec = LabelSpec::new(CanvasSize::new(300, 200))
        .with_field("SKU", "FAB-001")
        .with_field("Color", "")
        .with_field("Width", "")
        .with_field("Location", "A-01");

    let out = LabelComposer::default().render(&spec).unwrap();
    let texts: Vec<_> = out.layout.lines.iter().map(|l| l.text.as_str()).collect();

    assert_eq!(texts, vec!["SKU: FAB-001", "Location: A-01"]);
}

#[test]
fn code_regions_drawn_only_when_requested() {
    let composer = LabelComposer::default();
    let cases = [
        (None, None),
        (Some("FAB-001"), None),
        (None, Some("FAB-001")),
        (Some("FAB-001"), Some("FAB-001")),
    ];

    for (qr, barcode) in cases {
        let mut spec = base_spec();
        spec.qr_payload = qr.map(str::to_string);
        spec.barcode_payload = barcode.map(str::to_string);

        let out = composer.render(&spec).unwrap();
        let image = decode(&out.png);

        assert_eq!(has_ink(&image, 210..290, 10..90), qr.is_some(), "qr={qr:?} barcode={barcode:?}");
        assert_eq!(has_ink(&image, 10..290, 140..190), barcode.is_some(), "qr={qr:?} barcode={barcode:?}");
        assert_eq!(out.layout.qr_region.is_some(), qr.is_some());
        assert_eq!(out.layout.barcode_region.is_some(), barcode.is_some());
    }
}

#[test]
fn empty_payload_counts_as_absent() {
    let mut spec = base_spec();
    spec.qr_payload = Some(String::new());
    spec.barcode_payload = Some(String::new());

    let out = LabelComposer::default().render(&spec).unwrap();
    assert!(out.layout.qr_region.is_none());
    assert!(out.layout.barcode_region.is_none());
}

#[test]
fn non_numeric_itf14_fails_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = LabelPipeline::default();
    let spec = base_spec().with_barcode(BarcodeFormat::Itf14, "FAB-001");

    let request = RenderRequest::Spec { spec };
    let result = pipeline.render_label(&request);
    assert!(matches!(result, Err(PipelineError::Render(RenderError::InvalidPayload(_)))));

    let report = pipeline.render_many(std::slice::from_ref(&request));
    let written = write_labels(&report.labels, dir.path()).unwrap();
    assert!(written.written.is_empty());
    assert!(written.is_complete());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn oversized_qr_payload_is_invalid() {
    let payload = "X".repeat(1500);
    let spec = base_spec().with_qr(payload);

    assert!(matches!(
        LabelComposer::default().render(&spec),
        Err(RenderError::InvalidPayload(_))
    ));
}

#[test]
fn zero_canvas_is_a_render_failure() {
    let spec = LabelSpec::new(CanvasSize::new(0, 200)).with_field("SKU", "FAB-001");
    assert!(matches!(
        LabelComposer::default().render(&spec),
        Err(RenderError::RenderFailure(_))
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn output_matches_requested_size(
        width in 1u32..=640,
        height in 1u32..=480,
        font_size in 6u32..=48,
        lines in 0usize..8,
    ) {
        let mut spec = LabelSpec::new(CanvasSize::new(width, height));
        spec.style.font_size = font_size;
        for i in 0..lines {
            spec.fields.insert(format!("Field {i}"), format!("value {i}"));
        }

        let out = LabelComposer::default().render(&spec).unwrap();
        let image = decode(&out.png);

        prop_assert_eq!(image.dimensions(), (width, height));
        prop_assert_eq!(out.size, CanvasSize::new(width, height));
        prop_assert_eq!(out.layout.lines.len() + out.layout.dropped.len(), lines);
    }
}
