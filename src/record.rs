//! Placement records handed to persistence after a successful run.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StampError};
use crate::pipeline::StampedArtifact;

/// One stamped page of a registered document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRecord {
    pub document_id: String,
    pub page: usize,
    pub x: u32,
    pub y: u32,
    pub payload: String,
}

pub fn records_for(document_id: &str, artifact: &StampedArtifact) -> Vec<PlacementRecord> {
    artifact
        .pages
        .iter()
        .map(|page| PlacementRecord {
            document_id: document_id.to_string(),
            page: page.page,
            x: page.placement.x,
            y: page.placement.y,
            payload: page.payload.clone(),
        })
        .collect()
}

pub trait PlacementSink {
    fn store(&mut self, records: &[PlacementRecord]) -> Result<()>;
}

/// Appends one JSON object per line.
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PlacementSink for JsonLinesSink {
    fn store(&mut self, records: &[PlacementRecord]) -> Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut out = BufWriter::new(file);
        for record in records {
            serde_json::to_writer(&mut out, record)
                .map_err(|e| StampError::output(&self.path, e))?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        Ok(())
    }
}
