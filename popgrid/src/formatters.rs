use std::io::{BufWriter, Cursor, Write};
use std::path::Path;

use anyhow::Result;
use enum_dispatch::enum_dispatch;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::EnumString;
use tempfile::NamedTempFile;

use crate::error::{PopgridError, PopgridResult};
use crate::join::CountryExtract;

/// Trait to define different output generators. `save` writes the extract
/// to a writer and `format` renders it as a string.
#[enum_dispatch]
pub trait OutputGenerator {
    fn save(&self, writer: &mut impl Write, extract: &CountryExtract) -> Result<()>;
    fn format(&self, extract: &CountryExtract) -> Result<String> {
        let mut data: Vec<u8> = vec![];
        let mut buff = Cursor::new(&mut data);
        self.save(&mut buff, extract)?;

        Ok(String::from_utf8(data)?)
    }
}

/// Enum of output formatters, one for each artifact type
#[enum_dispatch(OutputGenerator)]
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum OutputFormatter {
    Csv(CsvFormatter),
    JsonPairs(JsonPairsFormatter),
}

/// Artifact formats selectable by name.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, EnumString, PartialEq, Eq)]
#[strum(ascii_case_insensitive)]
pub enum OutputFormat {
    Csv,
    Json,
}

impl From<OutputFormat> for OutputFormatter {
    fn from(value: OutputFormat) -> Self {
        match value {
            OutputFormat::Csv => OutputFormatter::Csv(CsvFormatter),
            OutputFormat::Json => OutputFormatter::JsonPairs(JsonPairsFormatter),
        }
    }
}

/// `cell,population` rows without a header line
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct CsvFormatter;

impl OutputGenerator for CsvFormatter {
    fn save(&self, writer: &mut impl Write, extract: &CountryExtract) -> Result<()> {
        let mut df = extract.as_df().clone();
        CsvWriter::new(writer)
            .include_header(false)
            .finish(&mut df)?;
        Ok(())
    }
}

/// A single JSON array of `[cell, population]` pairs
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct JsonPairsFormatter;

impl OutputGenerator for JsonPairsFormatter {
    fn save(&self, writer: &mut impl Write, extract: &CountryExtract) -> Result<()> {
        serde_json::to_writer(writer, &extract.pairs()?)?;
        Ok(())
    }
}

/// Write `extract` to `path`.
///
/// The artifact is written to a temporary file next to `path` and renamed into
/// place once complete, so `path` only ever exists with its full contents. An
/// empty extract produces a zero-length file, which marks the entity as
/// processed without data.
pub fn write_extract<P: AsRef<Path>>(
    path: P,
    formatter: &OutputFormatter,
    extract: &CountryExtract,
) -> PopgridResult<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let staged = NamedTempFile::new_in(dir).map_err(|err| PopgridError::artifact(path, err))?;
    if !extract.is_empty() {
        let mut writer = BufWriter::new(staged.as_file());
        formatter
            .save(&mut writer, extract)
            .and_then(|_| Ok(writer.flush()?))
            .map_err(|err| PopgridError::artifact(path, format!("{err:#}")))?;
    }
    staged
        .persist(path)
        .map_err(|err| PopgridError::artifact(path, err.error))?;
    Ok(())
}
