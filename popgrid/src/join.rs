use itertools::izip;
use log::debug;
use polars::prelude::*;

use crate::error::PopgridResult;
use crate::rasterize::CellSet;
use crate::COL;

/// The population rows that fall inside one boundary, in dataset order.
#[derive(Clone, Debug, PartialEq)]
pub struct CountryExtract(pub DataFrame);

impl CountryExtract {
    pub fn empty() -> PopgridResult<Self> {
        let df = df!(
            COL::H3 => Vec::<String>::new(),
            COL::POPULATION => Vec::<i64>::new()
        )?;
        Ok(Self(df))
    }

    pub fn len(&self) -> usize {
        self.0.height()
    }

    pub fn is_empty(&self) -> bool {
        self.0.height() == 0
    }

    pub fn as_df(&self) -> &DataFrame {
        &self.0
    }

    /// `(cell id, population)` pairs.
    pub fn pairs(&self) -> PopgridResult<Vec<(String, i64)>> {
        let pairs = izip!(
            self.0.column(COL::H3)?.str()?,
            self.0.column(COL::POPULATION)?.i64()?
        )
        .filter_map(|(cell, population)| Some((cell?.to_string(), population?)))
        .collect();
        Ok(pairs)
    }
}

/// Inner join of `population` against the candidate `cells`.
///
/// The candidates become a string series matched with `is_in`, which hashes
/// the set once instead of comparing every row against a list. Row order
/// follows the dataset, not the cell set. Rows with a null id or count are
/// dropped here so every output format sees the same rows. An empty candidate
/// set never touches the dataset.
pub fn join_cells(population: LazyFrame, cells: &CellSet) -> PopgridResult<CountryExtract> {
    if cells.is_empty() {
        return CountryExtract::empty();
    }
    debug!("joining {} candidate cells", cells.len());
    let candidates = cells.to_series("candidates");
    let df = population
        .filter(col(COL::H3).is_in(lit(candidates)))
        .select([col(COL::H3), col(COL::POPULATION)])
        .drop_nulls(None)
        .collect()?;
    Ok(CountryExtract(df))
}
