use clap::Parser;
use std::error::Error;
use std::path::{Path, PathBuf};

use chrono::Local;
use page_stamp::compose::visualize_placement;
use page_stamp::detector::{NullDetector, RegionDetector};
use page_stamp::document::{ImageRasterizer, InputKind, PdfAssembler, Rasterizer};
use page_stamp::marker::DocumentInfo;
use page_stamp::pipeline::{PagePipeline, StampedArtifact};
use page_stamp::record::{JsonLinesSink, PlacementSink, records_for};
use page_stamp::{StampConfig, StampError};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "stamp",
    about = "Stamp a QR marker onto every page of a drawing or document",
    version
)]
struct Cli {
    /// Input image or PDF
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Output path (defaults to qr_<input name> next to the input)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Document name printed in the marker (defaults to the input file name)
    #[arg(long = "name")]
    name: Option<String>,

    #[arg(long = "doc-version", default_value = "1.0")]
    doc_version: String,

    #[arg(long = "author", default_value = "unknown")]
    author: String,

    /// Document id (defaults to the input file stem)
    #[arg(long = "id")]
    id: Option<String>,

    /// Append placement records to this JSON-lines file
    #[arg(long = "record")]
    record: Option<PathBuf>,

    /// Write a PNG of the first page with the marker slot framed
    #[arg(long = "preview")]
    preview: Option<PathBuf>,

    /// YOLO empty-space model (ONNX)
    #[cfg(feature = "onnx")]
    #[arg(long = "model")]
    model: Option<PathBuf>,
}

fn default_output(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("qr_{name}"))
}

#[cfg(feature = "onnx")]
fn build_detector(cli: &Cli, config: &mut StampConfig) -> Box<dyn RegionDetector> {
    use page_stamp::detector::{LazyDetector, YoloRegionDetector};

    if let Some(model) = &cli.model {
        config.detector.model_path = Some(model.clone());
    }
    if config.detector.model_path.is_none() {
        return Box::new(NullDetector);
    }
    let detector_config = config.detector.clone();
    Box::new(LazyDetector::new(move || {
        YoloRegionDetector::from_config(&detector_config)
    }))
}

#[cfg(not(feature = "onnx"))]
fn build_detector(_cli: &Cli, _config: &mut StampConfig) -> Box<dyn RegionDetector> {
    Box::new(NullDetector)
}

#[cfg(feature = "pdfium")]
fn pdf_rasterizer() -> Result<Box<dyn Rasterizer>, StampError> {
    Ok(Box::new(page_stamp::document::PdfiumRasterizer::new()?))
}

#[cfg(not(feature = "pdfium"))]
fn pdf_rasterizer() -> Result<Box<dyn Rasterizer>, StampError> {
    Err(StampError::input(
        "pdf",
        "this build has no PDF support (enable the `pdfium` feature)",
    ))
}

fn write_preview(
    rasterizer: &dyn Rasterizer,
    input: &Path,
    artifact: &StampedArtifact,
    config: &StampConfig,
    preview: &Path,
) -> Result<(), Box<dyn Error>> {
    let Some(first) = artifact.pages.first() else {
        return Ok(());
    };
    let page = rasterizer.rasterize(input, config.dpi, 0)?;
    visualize_placement(&page, first.placement, config.marker_size).save(preview)?;
    info!(path = %preview.display(), "preview written");
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => StampConfig::from_json_file(path)?,
        None => StampConfig::default(),
    };
    let kind = InputKind::from_path(&cli.input)
        .ok_or_else(|| StampError::input(&cli.input, "unsupported file type"))?;
    let output = cli.output.clone().unwrap_or_else(|| default_output(&cli.input));

    let info = DocumentInfo {
        name: cli.name.clone().unwrap_or_else(|| {
            cli.input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        }),
        version: cli.doc_version.clone(),
        author: cli.author.clone(),
        id: cli.id.clone().unwrap_or_else(|| {
            cli.input
                .file_stem()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        }),
        timestamp: Local::now(),
    };
    let payload = info.payload();

    let detector = build_detector(&cli, &mut config);
    let pipeline = PagePipeline::new(&config, detector.as_ref());

    let (result, rasterizer): (_, Box<dyn Rasterizer>) = match kind {
        InputKind::Image => (
            pipeline.process_image(&cli.input, &payload, &output),
            Box::new(ImageRasterizer) as Box<dyn Rasterizer>,
        ),
        InputKind::Pdf => {
            let rasterizer = pdf_rasterizer()?;
            let assembler = PdfAssembler::new(config.jpeg_quality);
            let result = pipeline.process_document(
                rasterizer.as_ref(),
                &assembler,
                &cli.input,
                &payload,
                &output,
            );
            (result, rasterizer)
        }
    };
    let artifact = result.into_result()?;

    if let Some(path) = &cli.record {
        JsonLinesSink::new(path).store(&records_for(&info.id, &artifact))?;
    }
    if let Some(preview) = &cli.preview {
        write_preview(rasterizer.as_ref(), &cli.input, &artifact, &config, preview)?;
    }

    println!("{}", artifact.path.display());
    Ok(())
}
