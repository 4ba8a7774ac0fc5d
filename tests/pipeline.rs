mod common;

use std::path::{Path, PathBuf};

use image::{ColorType, DynamicImage, GenericImageView, GrayImage, Luma, RgbImage};
use page_stamp::document::{Assembler, Rasterizer};
use page_stamp::config::StampConfig;
use page_stamp::detector::NullDetector;
use page_stamp::marker::{EnrichError, MarkerPayload, PayloadEnricher};
use page_stamp::pipeline::{PagePipeline, PipelineResult, Stage};
use page_stamp::placement::Placement;
use page_stamp::StampError;

use common::{RecordingAssembler, StubRasterizer, blank_page, drawing, entries};

fn config_in(temp_root: &Path) -> StampConfig {
    StampConfig {
        temp_root: Some(temp_root.to_path_buf()),
        ..StampConfig::default()
    }
}

#[test]
fn three_pages_are_stamped_in_order() {
    let scratch = tempfile::tempdir().expect("scratch root");
    let out_dir = tempfile::tempdir().expect("out dir");
    let config = config_in(scratch.path());
    let pipeline = PagePipeline::new(&config, &NullDetector);

    let rasterizer = StubRasterizer::new(vec![
        blank_page(1000, 800),
        drawing(900, 700),
        blank_page(1100, 800),
    ]);
    let assembler = RecordingAssembler::default();
    let output = out_dir.path().join("qr_plan.pdf");

    let result = pipeline.process_document(
        &rasterizer,
        &assembler,
        Path::new("plan.pdf"),
        &MarkerPayload::new("Document: plan.pdf"),
        &output,
    );
    assert!(result.is_success(), "{:?}", result.error());
    assert_eq!(result.final_stage(), Stage::Done);
    assert_eq!(result.artifact_path(), Some(output.as_path()));

    let artifact = result.into_result().expect("artifact");
    let numbers: Vec<usize> = artifact.pages.iter().map(|p| p.page).collect();
    assert_eq!(numbers, [1, 2, 3]);
    assert_eq!(artifact.pages[0].placement, Placement::new(800, 50));
    assert_eq!(artifact.pages[2].placement, Placement::new(900, 50));
    assert_eq!(artifact.pages[1].payload, "Document: plan.pdf\nPage: 2 of 3");

    let dims: Vec<(u32, u32)> = assembler.pages.borrow().iter().map(RgbImage::dimensions).collect();
    assert_eq!(dims, [(1000, 800), (900, 700), (1100, 800)]);

    assert!(output.exists());
    assert_eq!(entries(scratch.path()), 0);
}

#[test]
fn failing_page_aborts_without_output() {
    let scratch = tempfile::tempdir().expect("scratch root");
    let out_dir = tempfile::tempdir().expect("out dir");
    let config = config_in(scratch.path());
    let pipeline = PagePipeline::new(&config, &NullDetector);

    let rasterizer = StubRasterizer::new(vec![
        blank_page(1000, 800),
        blank_page(200, 200),
        blank_page(1000, 800),
    ]);
    let assembler = RecordingAssembler::default();
    let output = out_dir.path().join("qr_plan.pdf");

    let result = pipeline.process_document(
        &rasterizer,
        &assembler,
        Path::new("plan.pdf"),
        &MarkerPayload::new("Document: plan.pdf"),
        &output,
    );
    match &result {
        PipelineResult::Failed { stage, error } => {
            assert_eq!(*stage, Stage::Arbitrate);
            assert!(matches!(error, StampError::PlacementNotFound { page: 2 }));
        }
        PipelineResult::Stamped(_) => panic!("page 2 has no room for a marker"),
    }
    assert_eq!(result.final_stage(), Stage::Aborted);
    assert!(!output.exists());
    assert!(assembler.pages.borrow().is_empty());
    assert_eq!(entries(scratch.path()), 0);
    assert_eq!(entries(out_dir.path()), 0);
}

/// Page 2 cannot be rendered.
struct BrokenSecondPage(StubRasterizer);

impl Rasterizer for BrokenSecondPage {
    fn page_count(&self, path: &Path) -> page_stamp::Result<usize> {
        self.0.page_count(path)
    }

    fn rasterize(&self, path: &Path, dpi: u32, page_index: usize) -> page_stamp::Result<DynamicImage> {
        if page_index == 1 {
            return Err(StampError::Rasterization {
                page: 2,
                reason: "corrupt content stream".into(),
            });
        }
        self.0.rasterize(path, dpi, page_index)
    }
}

/// Fails every write after touching the target it was given.
struct FullDisk;

impl Assembler for FullDisk {
    fn assemble(&self, _pages: &[PathBuf], _dpi: u32, output: &Path) -> page_stamp::Result<()> {
        std::fs::write(output, b"%PDF-partial")?;
        Err(StampError::output(output, "disk full"))
    }
}

#[test]
fn unreadable_page_aborts_at_rasterize() {
    let scratch = tempfile::tempdir().expect("scratch root");
    let out_dir = tempfile::tempdir().expect("out dir");
    let config = config_in(scratch.path());
    let pipeline = PagePipeline::new(&config, &NullDetector);

    let rasterizer = BrokenSecondPage(StubRasterizer::new(vec![
        blank_page(1000, 800),
        blank_page(1000, 800),
        blank_page(1000, 800),
    ]));
    let assembler = RecordingAssembler::default();
    let output = out_dir.path().join("qr_plan.pdf");

    let result = pipeline.process_document(
        &rasterizer,
        &assembler,
        Path::new("plan.pdf"),
        &MarkerPayload::new("Document: plan.pdf"),
        &output,
    );
    match &result {
        PipelineResult::Failed { stage, error } => {
            assert_eq!(*stage, Stage::Rasterize);
            assert!(matches!(error, StampError::Rasterization { page: 2, .. }));
        }
        PipelineResult::Stamped(_) => panic!("page 2 cannot be rendered"),
    }
    assert_eq!(result.final_stage(), Stage::Aborted);
    assert!(!output.exists());
    assert!(assembler.pages.borrow().is_empty());
    assert_eq!(entries(scratch.path()), 0);
    assert_eq!(entries(out_dir.path()), 0);
}

#[test]
fn failed_write_aborts_at_reassemble() {
    let scratch = tempfile::tempdir().expect("scratch root");
    let out_dir = tempfile::tempdir().expect("out dir");
    let config = config_in(scratch.path());
    let pipeline = PagePipeline::new(&config, &NullDetector);

    let rasterizer = StubRasterizer::new(vec![blank_page(1000, 800), drawing(900, 700)]);
    let output = out_dir.path().join("qr_plan.pdf");

    let result = pipeline.process_document(
        &rasterizer,
        &FullDisk,
        Path::new("plan.pdf"),
        &MarkerPayload::new("Document: plan.pdf"),
        &output,
    );
    match &result {
        PipelineResult::Failed { stage, error } => {
            assert_eq!(*stage, Stage::Reassemble);
            assert!(matches!(error, StampError::OutputWrite { .. }));
        }
        PipelineResult::Stamped(_) => panic!("the assembler cannot write"),
    }
    assert!(!output.exists());
    assert_eq!(entries(scratch.path()), 0);
    assert_eq!(entries(out_dir.path()), 0);
}

#[test]
fn empty_document_is_rejected() {
    let scratch = tempfile::tempdir().expect("scratch root");
    let config = config_in(scratch.path());
    let pipeline = PagePipeline::new(&config, &NullDetector);
    let result = pipeline.process_document(
        &StubRasterizer::new(Vec::new()),
        &RecordingAssembler::default(),
        Path::new("empty.pdf"),
        &MarkerPayload::new("x"),
        &scratch.path().join("out.pdf"),
    );
    assert!(matches!(result.error(), Some(StampError::Input { .. })));
}

#[test]
fn same_input_same_output() {
    let scratch = tempfile::tempdir().expect("scratch root");
    let out_dir = tempfile::tempdir().expect("out dir");
    let config = config_in(scratch.path());
    let pipeline = PagePipeline::new(&config, &NullDetector);
    let rasterizer = StubRasterizer::new(vec![drawing(1000, 800)]);

    let run = |name: &str| {
        let assembler = RecordingAssembler::default();
        let artifact = pipeline
            .process_document(
                &rasterizer,
                &assembler,
                Path::new("plan.pdf"),
                &MarkerPayload::new("ID: 1"),
                &out_dir.path().join(name),
            )
            .into_result()
            .expect("stamped");
        (artifact.pages, assembler.pages.into_inner())
    };
    let (placements_a, pages_a) = run("a.pdf");
    let (placements_b, pages_b) = run("b.pdf");
    assert_eq!(placements_a, placements_b);
    assert_eq!(pages_a, pages_b);
}

#[test]
fn image_round_trip_changes_only_marker_area() {
    let dir = tempfile::tempdir().expect("dir");
    let input = dir.path().join("sheet.png");
    let output = dir.path().join("qr_sheet.png");
    let original = drawing(1000, 800);
    original.save(&input).expect("save input");

    let config = config_in(dir.path());
    let pipeline = PagePipeline::new(&config, &NullDetector);
    let payload = MarkerPayload::new("Document: sheet.png");
    let artifact = pipeline
        .process_image(&input, &payload, &output)
        .into_result()
        .expect("stamped");
    assert_eq!(artifact.pages.len(), 1);
    assert_eq!(artifact.pages[0].payload, "Document: sheet.png");

    let Placement { x, y } = artifact.pages[0].placement;
    let stamped = image::open(&output).expect("open output").to_rgb8();
    assert_eq!(stamped.dimensions(), original.dimensions());
    for (px, py, pixel) in stamped.enumerate_pixels() {
        let inside = (x..x + 150).contains(&px) && (y..y + 150).contains(&py);
        if !inside {
            assert_eq!(pixel, original.get_pixel(px, py), "pixel ({px}, {py}) changed");
        }
    }
}

#[test]
fn gray_scan_stays_gray() {
    let dir = tempfile::tempdir().expect("dir");
    let input = dir.path().join("scan.jpg");
    let output = dir.path().join("qr_scan.jpg");
    GrayImage::from_pixel(1000, 800, Luma([255]))
        .save(&input)
        .expect("save input");

    let config = config_in(dir.path());
    let pipeline = PagePipeline::new(&config, &NullDetector);
    pipeline
        .process_image(&input, &MarkerPayload::new("Document: scan.jpg"), &output)
        .into_result()
        .expect("stamped");

    let stamped = image::open(&output).expect("open output");
    assert_eq!(stamped.color(), ColorType::L8);
    assert_eq!(stamped.dimensions(), (1000, 800));
}

#[test]
fn missing_image_fails_at_start() {
    let dir = tempfile::tempdir().expect("dir");
    let config = config_in(dir.path());
    let pipeline = PagePipeline::new(&config, &NullDetector);
    let result = pipeline.process_image(
        &dir.path().join("absent.png"),
        &MarkerPayload::new("x"),
        &dir.path().join("out.png"),
    );
    assert!(matches!(result, PipelineResult::Failed { stage: Stage::Start, .. }));
    assert!(!dir.path().join("out.png").exists());
}

struct TitleBlock;

impl PayloadEnricher for TitleBlock {
    fn enrich(
        &self,
        _page: &DynamicImage,
        payload: &MarkerPayload,
    ) -> Result<MarkerPayload, EnrichError> {
        Ok(MarkerPayload::new(format!("{payload}\nTitle: Bracket")))
    }
}

struct Unreadable;

impl PayloadEnricher for Unreadable {
    fn enrich(
        &self,
        _page: &DynamicImage,
        _payload: &MarkerPayload,
    ) -> Result<MarkerPayload, EnrichError> {
        Err(EnrichError("no text found".into()))
    }
}

#[test]
fn enricher_extends_payload() {
    let config = StampConfig::default();
    let enricher = TitleBlock;
    let pipeline = PagePipeline::new(&config, &NullDetector).with_enricher(&enricher);
    let mut page = DynamicImage::ImageRgb8(blank_page(1000, 800));
    let stamped = pipeline
        .stamp_page(1, &mut page, &MarkerPayload::new("ID: 9"))
        .expect("stamp");
    assert_eq!(stamped.payload, "ID: 9\nTitle: Bracket");
}

#[test]
fn enrichment_failure_keeps_payload() {
    let config = StampConfig::default();
    let enricher = Unreadable;
    let pipeline = PagePipeline::new(&config, &NullDetector).with_enricher(&enricher);
    let mut page = DynamicImage::ImageRgb8(blank_page(1000, 800));
    let stamped = pipeline
        .stamp_page(1, &mut page, &MarkerPayload::new("ID: 9"))
        .expect("stamp");
    assert_eq!(stamped.payload, "ID: 9");
}
