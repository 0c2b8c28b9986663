//! Single-region extraction: one ad-hoc area instead of every country.

use std::path::PathBuf;

use h3o::Resolution;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::boundary::{read_features, BBox, Boundary};
use crate::dataset::PopulationDataset;
use crate::error::{PopgridError, PopgridResult};
use crate::join::{join_cells, CountryExtract};
use crate::rasterize::{rasterize, CellSet};

/// How the region is described.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum RegionSpec {
    /// Every Polygon or MultiPolygon feature of a GeoJSON file
    Boundaries(PathBuf),
    BoundingBox(BBox),
}

impl RegionSpec {
    /// Boundaries making up the region. Features that are not polygons are skipped.
    pub fn boundaries(&self) -> PopgridResult<Vec<Boundary>> {
        match self {
            RegionSpec::BoundingBox(bbox) => Ok(vec![Boundary::from(geo::Polygon::from(*bbox))]),
            RegionSpec::Boundaries(path) => {
                let mut boundaries = vec![];
                for feature in read_features(path)? {
                    let Some(geometry) = feature.geometry else {
                        warn!("Skipping feature without geometry");
                        continue;
                    };
                    let boundary = geo::Geometry::<f64>::try_from(geometry.value)
                        .map_err(PopgridError::from)
                        .and_then(Boundary::try_from);
                    match boundary {
                        Ok(boundary) => boundaries.push(boundary),
                        Err(err) => warn!("Skipping region feature: {err}"),
                    }
                }
                Ok(boundaries)
            }
        }
    }

    /// Union of the cells of every region boundary.
    pub fn cells(&self, resolution: Resolution) -> PopgridResult<CellSet> {
        let mut cells = CellSet::new();
        for boundary in self.boundaries()? {
            cells.union_with(rasterize(&boundary, resolution)?);
        }
        info!("Generated {} potential cells for the region", cells.len());
        Ok(cells)
    }
}

/// Population rows inside the region, in dataset order.
pub fn extract_region(
    dataset: &PopulationDataset,
    spec: &RegionSpec,
    resolution: Resolution,
) -> PopgridResult<CountryExtract> {
    let cells = spec.cells(resolution)?;
    let extract = join_cells(dataset.scan()?, &cells)?;
    info!("Found {} populated cells in the region", extract.len());
    Ok(extract)
}
