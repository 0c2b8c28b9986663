//! Boundary to cell rasterization.

use std::collections::HashSet;

use geo::Polygon;
use h3o::geom::{PolyfillConfig, Polygon as CellPolygon, ToCells};
use h3o::{CellIndex, Resolution};
use polars::prelude::{NamedFrom, Series};

use crate::boundary::Boundary;
use crate::error::PopgridResult;

/// A deduplicated set of grid cells covered by a boundary.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CellSet(HashSet<CellIndex>);

impl CellSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, cell: &CellIndex) -> bool {
        self.0.contains(cell)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CellIndex> {
        self.0.iter()
    }

    pub fn union_with(&mut self, other: CellSet) {
        self.0.extend(other.0);
    }

    /// Cell ids as a string series, the form the population dataset stores them in.
    pub fn to_series(&self, name: &str) -> Series {
        let ids: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        Series::new(name, ids)
    }
}

impl FromIterator<CellIndex> for CellSet {
    fn from_iter<T: IntoIterator<Item = CellIndex>>(iter: T) -> Self {
        CellSet(iter.into_iter().collect())
    }
}

impl Extend<CellIndex> for CellSet {
    fn extend<T: IntoIterator<Item = CellIndex>>(&mut self, iter: T) {
        self.0.extend(iter)
    }
}

/// Cells whose centroid falls inside the outer ring of `polygon`.
///
/// Interior rings are ignored: holes are not subtracted. An empty outer ring
/// yields no cells.
pub fn rasterize_polygon(polygon: &Polygon<f64>, resolution: Resolution) -> PopgridResult<CellSet> {
    if polygon.exterior().0.is_empty() {
        return Ok(CellSet::new());
    }
    let outer = Polygon::new(polygon.exterior().clone(), vec![]);
    let polygon = CellPolygon::from_degrees(outer)?;
    let cells = polygon.to_cells(PolyfillConfig::new(resolution)).collect();
    Ok(cells)
}

/// Union of the cells of every part of `boundary`.
pub fn rasterize(boundary: &Boundary, resolution: Resolution) -> PopgridResult<CellSet> {
    let mut cells = CellSet::new();
    for part in boundary.parts() {
        cells.union_with(rasterize_polygon(part, resolution)?);
    }
    Ok(cells)
}
