//! Access to the population dataset.
//!
//! Each [`PopulationDataset::scan`] call opens an independent lazy handle so that
//! concurrent extraction tasks never share a reader.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use h3o::{CellIndex, Resolution};
use log::debug;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::error::{PopgridError, PopgridResult};
use crate::COL;

/// On-disk formats the population dataset can be read from.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
pub enum DatasetFormat {
    Parquet,
    Csv,
}

impl DatasetFormat {
    /// Guess the format from a file extension, falling back to parquet.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| DatasetFormat::from_str(ext).ok())
            .unwrap_or(DatasetFormat::Parquet)
    }
}

/// A read-only population table of `(h3, population)` rows.
#[derive(Clone, Debug)]
pub struct PopulationDataset {
    path: PathBuf,
    format: DatasetFormat,
}

impl PopulationDataset {
    pub fn new<P: Into<PathBuf>>(path: P, format: Option<DatasetFormat>) -> Self {
        let path = path.into();
        let format = format.unwrap_or_else(|| DatasetFormat::from_path(&path));
        Self { path, format }
    }

    /// Open a fresh lazy handle with the cell id as a string and population as Int64.
    pub fn scan(&self) -> PopgridResult<LazyFrame> {
        debug!("scanning {} as {}", self.path.display(), self.format);
        let frame = match self.format {
            DatasetFormat::Parquet => {
                LazyFrame::scan_parquet(&self.path, ScanArgsParquet::default())?
            }
            DatasetFormat::Csv => LazyCsvReader::new(&self.path)
                .with_has_header(true)
                .finish()?,
        };
        Ok(frame.select([
            col(COL::H3).cast(DataType::String),
            col(COL::POPULATION).cast(DataType::Int64),
        ]))
    }

    /// Resolution shared by every cell of the dataset.
    pub fn probe_resolution(&self) -> PopgridResult<Resolution> {
        probe_resolution(self.scan()?)
    }
}

/// Read the first row of `frame` and report the resolution of its cell id.
///
/// All rows share one resolution, so a single sample is enough.
pub fn probe_resolution(frame: LazyFrame) -> PopgridResult<Resolution> {
    let sample = frame.select([col(COL::H3)]).limit(1).collect()?;
    if sample.height() == 0 {
        return Err(PopgridError::EmptyDataset);
    }
    let cell = sample
        .column(COL::H3)?
        .str()?
        .get(0)
        .ok_or_else(|| PopgridError::InvalidCell("null".into()))?;
    let cell = parse_cell(cell)?;
    Ok(cell.resolution())
}

pub(crate) fn parse_cell(cell: &str) -> PopgridResult<CellIndex> {
    CellIndex::from_str(cell).map_err(|_| PopgridError::InvalidCell(cell.to_string()))
}
