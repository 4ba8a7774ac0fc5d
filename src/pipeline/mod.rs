//! The page pipeline: rasterize, place, stamp and reassemble a whole input,
//! or produce nothing at all.
//!
//! Pages are processed strictly in order. Each stamped page is written to a
//! per-document scratch directory and dropped from memory before the next
//! one is rasterized. The first failing page aborts the run; the scratch
//! directory is removed on every path and the output is only published
//! after reassembly succeeded.

pub mod workspace;
pub use workspace::ScratchSpace;

use std::fs;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::compose::Compositor;
use crate::config::StampConfig;
use crate::detector::RegionDetector;
use crate::document::{Assembler, ImageAssembler, ImageRasterizer, Rasterizer};
use crate::error::{Result, StampError};
use crate::marker::{MarkerPayload, MarkerRenderer, PayloadEnricher};
use crate::placement::{Placement, PlacementArbiter, Strategy};

/// Pipeline states, in the order a successful run visits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Start,
    Rasterize,
    Arbitrate,
    RenderMarker,
    Composite,
    Accumulate,
    Reassemble,
    Done,
    Aborted,
}

/// Where the marker went on one page and what it says.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagePlacement {
    /// 1-based page number.
    pub page: usize,
    pub placement: Placement,
    pub strategy: Strategy,
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StampedArtifact {
    pub path: PathBuf,
    pub pages: Vec<PagePlacement>,
}

/// Outcome of one pipeline run.
#[derive(Debug)]
pub enum PipelineResult {
    Stamped(StampedArtifact),
    /// `stage` is the step that failed.
    Failed { stage: Stage, error: StampError },
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Stamped(_))
    }

    /// Terminal state of the run.
    pub fn final_stage(&self) -> Stage {
        match self {
            Self::Stamped(_) => Stage::Done,
            Self::Failed { .. } => Stage::Aborted,
        }
    }

    pub fn artifact_path(&self) -> Option<&Path> {
        match self {
            Self::Stamped(artifact) => Some(&artifact.path),
            Self::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&StampError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            Self::Stamped(_) => None,
        }
    }

    pub fn into_result(self) -> Result<StampedArtifact> {
        match self {
            Self::Stamped(artifact) => Ok(artifact),
            Self::Failed { error, .. } => Err(error),
        }
    }
}

struct Failure {
    stage: Stage,
    error: StampError,
}

fn at(stage: Stage) -> impl FnOnce(StampError) -> Failure {
    move |error| Failure { stage, error }
}

pub struct PagePipeline<'a> {
    config: &'a StampConfig,
    arbiter: PlacementArbiter<'a>,
    renderer: MarkerRenderer,
    compositor: Compositor,
    enricher: Option<&'a dyn PayloadEnricher>,
}

impl<'a> PagePipeline<'a> {
    pub fn new(config: &'a StampConfig, detector: &'a dyn RegionDetector) -> Self {
        Self {
            config,
            arbiter: PlacementArbiter::new(config, detector),
            renderer: MarkerRenderer::from_config(config),
            compositor: Compositor::from_config(config),
            enricher: None,
        }
    }

    pub fn with_enricher(mut self, enricher: &'a dyn PayloadEnricher) -> Self {
        self.enricher = Some(enricher);
        self
    }

    /// Places, renders and composites the marker on one page in memory.
    pub fn stamp_page(
        &self,
        page: usize,
        raster: &mut DynamicImage,
        payload: &MarkerPayload,
    ) -> Result<PagePlacement> {
        self.stamp_page_staged(page, raster, payload)
            .map_err(|failure| failure.error)
    }

    fn stamp_page_staged(
        &self,
        page: usize,
        raster: &mut DynamicImage,
        payload: &MarkerPayload,
    ) -> std::result::Result<PagePlacement, Failure> {
        let decision = self
            .arbiter
            .place(raster)
            .map_err(at(Stage::Arbitrate))?
            .ok_or(StampError::PlacementNotFound { page })
            .map_err(at(Stage::Arbitrate))?;

        let payload = self.enrich(raster, payload);
        let marker = self
            .renderer
            .render(payload.as_str())
            .map_err(at(Stage::RenderMarker))?;
        self.compositor
            .composite(raster, decision.placement, &marker)
            .map_err(at(Stage::Composite))?;

        info!(
            page,
            x = decision.placement.x,
            y = decision.placement.y,
            strategy = ?decision.strategy,
            "page stamped"
        );
        Ok(PagePlacement {
            page,
            placement: decision.placement,
            strategy: decision.strategy,
            payload: payload.into_string(),
        })
    }

    fn enrich(&self, raster: &DynamicImage, payload: &MarkerPayload) -> MarkerPayload {
        let Some(enricher) = self.enricher else {
            return payload.clone();
        };
        match enricher.enrich(raster, payload) {
            Ok(enriched) => enriched,
            Err(e) => {
                warn!(error = %e, "keeping payload without enrichment");
                payload.clone()
            }
        }
    }

    /// Stamps a single raster image; the payload is used as given.
    pub fn process_image(&self, input: &Path, payload: &MarkerPayload, output: &Path) -> PipelineResult {
        self.run(&ImageRasterizer, &ImageAssembler, input, output, |_, _| {
            payload.clone()
        })
    }

    /// Stamps every page of a document; page `i` of `n` gets
    /// `template + "\nPage: i of n"`.
    pub fn process_document(
        &self,
        rasterizer: &dyn Rasterizer,
        assembler: &dyn Assembler,
        input: &Path,
        template: &MarkerPayload,
        output: &Path,
    ) -> PipelineResult {
        self.run(rasterizer, assembler, input, output, |page, count| {
            template.for_page(page, count)
        })
    }

    fn run(
        &self,
        rasterizer: &dyn Rasterizer,
        assembler: &dyn Assembler,
        input: &Path,
        output: &Path,
        payload_for: impl Fn(usize, usize) -> MarkerPayload,
    ) -> PipelineResult {
        info!(input = %input.display(), output = %output.display(), "pipeline started");
        match self.run_staged(rasterizer, assembler, input, output, payload_for) {
            Ok(artifact) => {
                info!(pages = artifact.pages.len(), output = %artifact.path.display(), "pipeline done");
                PipelineResult::Stamped(artifact)
            }
            Err(Failure { stage, error }) => {
                error!(?stage, page = error.page(), error = %error, "pipeline aborted");
                PipelineResult::Failed { stage, error }
            }
        }
    }

    fn run_staged(
        &self,
        rasterizer: &dyn Rasterizer,
        assembler: &dyn Assembler,
        input: &Path,
        output: &Path,
        payload_for: impl Fn(usize, usize) -> MarkerPayload,
    ) -> std::result::Result<StampedArtifact, Failure> {
        let count = rasterizer.page_count(input).map_err(at(Stage::Start))?;
        if count == 0 {
            return Err(at(Stage::Start)(StampError::input(input, "document has no pages")));
        }
        let mut scratch =
            ScratchSpace::create(self.config.temp_root.as_deref()).map_err(at(Stage::Start))?;

        let mut pages = Vec::with_capacity(count);
        for index in 0..count {
            let number = index + 1;
            let mut raster = rasterizer
                .rasterize(input, self.config.dpi, index)
                .map_err(at(Stage::Rasterize))?;
            debug!(page = number, of = count, "page rasterized");

            let payload = payload_for(number, count);
            pages.push(self.stamp_page_staged(number, &mut raster, &payload)?);
            scratch
                .accumulate(number, raster)
                .map_err(at(Stage::Accumulate))?;
        }

        let staged = scratch.staging_path(output);
        assembler
            .assemble(scratch.pages(), self.config.dpi, &staged)
            .map_err(at(Stage::Reassemble))?;
        publish(&staged, output).map_err(at(Stage::Reassemble))?;
        if let Err(e) = scratch.close() {
            warn!(error = %e, "scratch space not fully removed");
        }

        Ok(StampedArtifact {
            path: output.to_path_buf(),
            pages,
        })
    }
}

/// Moves the staged file to `output`, copying across filesystems. A failed
/// copy leaves no partial output behind.
fn publish(staged: &Path, output: &Path) -> Result<()> {
    if fs::rename(staged, output).is_ok() {
        return Ok(());
    }
    if let Err(e) = fs::copy(staged, output) {
        let _ = fs::remove_file(output);
        return Err(StampError::output(output, e));
    }
    Ok(())
}
