//! Navigation metadata: name, code, bounding box and centroid for every country.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use geo::{Area, BoundingRect, Centroid, Geometry, Polygon};
use itertools::Itertools;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::boundary::{geometry_type_name, BBox, Country};
use crate::error::{PopgridError, PopgridResult};

/// One element of the metadata index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CountryMetadata {
    pub name: String,
    pub code: String,
    pub centroid: [f64; 2],
    pub bbox: BBox,
}

/// Bounding box and centroid of a geometry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Summary {
    pub bbox: BBox,
    pub centroid: [f64; 2],
}

fn summarize_polygon(polygon: &Polygon<f64>) -> PopgridResult<Summary> {
    let bbox = polygon
        .bounding_rect()
        .ok_or_else(|| PopgridError::Geometry("polygon has no coordinates".into()))?;
    let centroid = polygon
        .centroid()
        .ok_or_else(|| PopgridError::Geometry("polygon has no centroid".into()))?;
    Ok(Summary {
        bbox: bbox.into(),
        centroid: [centroid.x(), centroid.y()],
    })
}

/// Summarize a Polygon as a whole, or a MultiPolygon by its largest part.
///
/// Using only the largest part keeps a distant exclave or island from
/// stretching the box. Ties go to the first part.
pub fn summarize(geometry: &Geometry<f64>) -> PopgridResult<Summary> {
    match geometry {
        Geometry::Polygon(polygon) => summarize_polygon(polygon),
        Geometry::MultiPolygon(multi_polygon) => {
            let largest = multi_polygon
                .iter()
                .fold(None, |largest: Option<(&Polygon<f64>, f64)>, part| {
                    let area = part.unsigned_area();
                    match largest {
                        Some((_, max)) if max >= area => largest,
                        _ => Some((part, area)),
                    }
                })
                .map(|(part, _)| part)
                .ok_or_else(|| PopgridError::Geometry("multi polygon has no parts".into()))?;
            summarize_polygon(largest)
        }
        other => Err(PopgridError::Geometry(format!(
            "unsupported geometry type {}",
            geometry_type_name(other)
        ))),
    }
}

impl CountryMetadata {
    pub fn from_country(country: &Country) -> PopgridResult<Self> {
        let Summary { bbox, centroid } = summarize(&country.geo_geometry()?)?;
        Ok(Self {
            name: country.name.clone(),
            code: country.code.clone(),
            centroid,
            bbox,
        })
    }
}

/// Summarize every country in order. Countries that fail are logged and left out.
pub fn build_index(countries: &[Country]) -> Vec<CountryMetadata> {
    for (code, count) in countries
        .iter()
        .map(|country| country.code.as_str())
        .counts()
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .sorted()
    {
        warn!("{count} countries share the code {code}; their extracts overwrite each other");
    }
    countries
        .iter()
        .filter_map(|country| match CountryMetadata::from_country(country) {
            Ok(metadata) => Some(metadata),
            Err(err) => {
                warn!("Error processing metadata for {}: {err}", country.name);
                None
            }
        })
        .collect()
}

/// Write the index as one JSON array.
pub fn write_index<P: AsRef<Path>>(path: P, index: &[CountryMetadata]) -> PopgridResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|err| PopgridError::artifact(parent, err))?;
    }
    let file = File::create(path).map_err(|err| PopgridError::artifact(path, err))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, index).map_err(|err| PopgridError::artifact(path, err))?;
    writer
        .flush()
        .map_err(|err| PopgridError::artifact(path, err))?;
    info!("Saved metadata for {} countries to {}", index.len(), path.display());
    Ok(())
}
