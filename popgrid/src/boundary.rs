//! Boundary inputs: GeoJSON feature collections of country or region outlines.

use std::ops::Index;
use std::path::Path;
use std::str::FromStr;

use geo::{Geometry, MultiPolygon, Polygon, Rect};
use geojson::{Feature, GeoJson};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{PopgridError, PopgridResult};

/// Property holding the display name of a country.
pub const NAME_PROPERTY: &str = "name";
/// Property holding the ISO 3166-1 alpha-3 code.
pub const ISO3_PROPERTY: &str = "ISO3166-1-Alpha-3";
/// Placeholder used by the boundary source when no ISO code is assigned.
pub const MISSING_ISO3: &str = "-99";

const UNKNOWN_NAME: &str = "Unknown";

/// A country as read from the boundary input.
///
/// The geometry is kept in its GeoJSON form so that a malformed shape only
/// fails the steps that need it, not the whole load.
#[derive(Clone, Debug)]
pub struct Country {
    pub name: String,
    pub code: String,
    pub geometry: Option<geojson::Geometry>,
}

impl Country {
    pub fn from_feature(feature: Feature) -> Self {
        let name = feature
            .property(NAME_PROPERTY)
            .and_then(|value| value.as_str())
            .unwrap_or(UNKNOWN_NAME)
            .to_string();
        let iso3 = feature
            .property(ISO3_PROPERTY)
            .and_then(|value| value.as_str());
        let code = derive_code(&name, iso3);
        Self {
            name,
            code,
            geometry: feature.geometry,
        }
    }

    /// The country outline as a `geo` geometry.
    pub fn geo_geometry(&self) -> PopgridResult<Geometry<f64>> {
        let geometry = self
            .geometry
            .as_ref()
            .ok_or_else(|| PopgridError::Geometry(format!("{} has no geometry", self.name)))?;
        Geometry::<f64>::try_from(geometry.value.clone())
            .map_err(|err| PopgridError::Geometry(err.to_string()))
    }

    pub fn boundary(&self) -> PopgridResult<Boundary> {
        Boundary::try_from(self.geo_geometry()?)
    }
}

/// Code used to name a country's artifacts.
///
/// The ISO alpha-3 code wins unless it is absent, blank or the `-99` placeholder;
/// otherwise the name is uppercased with spaces replaced by underscores. Two
/// countries can end up with the same fallback code.
pub fn derive_code(name: &str, iso3: Option<&str>) -> String {
    match iso3.map(str::trim) {
        Some(code) if !code.is_empty() && code != MISSING_ISO3 => code.to_string(),
        _ => name.replace(' ', "_").to_uppercase(),
    }
}

/// One or more polygon parts, each with its rings in (longitude, latitude) order.
#[derive(Clone, Debug, PartialEq)]
pub struct Boundary(pub MultiPolygon<f64>);

impl Boundary {
    pub fn parts(&self) -> impl Iterator<Item = &Polygon<f64>> {
        self.0.iter()
    }
}

impl From<Polygon<f64>> for Boundary {
    fn from(polygon: Polygon<f64>) -> Self {
        Boundary(MultiPolygon::new(vec![polygon]))
    }
}

impl From<MultiPolygon<f64>> for Boundary {
    fn from(multi_polygon: MultiPolygon<f64>) -> Self {
        Boundary(multi_polygon)
    }
}

impl TryFrom<Geometry<f64>> for Boundary {
    type Error = PopgridError;

    fn try_from(geometry: Geometry<f64>) -> Result<Self, Self::Error> {
        match geometry {
            Geometry::Polygon(polygon) => Ok(polygon.into()),
            Geometry::MultiPolygon(multi_polygon) => Ok(multi_polygon.into()),
            other => Err(PopgridError::Geometry(format!(
                "unsupported geometry type {}",
                geometry_type_name(&other)
            ))),
        }
    }
}

pub(crate) fn geometry_type_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// `[minLon, minLat, maxLon, maxLat]`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BBox(pub [f64; 4]);

impl Index<usize> for BBox {
    type Output = f64;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl From<Rect<f64>> for BBox {
    fn from(rect: Rect<f64>) -> Self {
        BBox([rect.min().x, rect.min().y, rect.max().x, rect.max().y])
    }
}

impl From<BBox> for Polygon<f64> {
    fn from(bbox: BBox) -> Self {
        Rect::new((bbox[0], bbox[1]), (bbox[2], bbox[3])).to_polygon()
    }
}

impl FromStr for BBox {
    type Err = &'static str;
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f64> = value
            .split(',')
            .map(|s| s.trim().parse::<f64>().map_err(|_| "Failed to parse bbox"))
            .collect::<Result<Vec<_>, _>>()?;

        if parts.len() != 4 {
            return Err("Bounding boxes need to have 4 coords");
        }
        let mut bbox = [0.0; 4];
        bbox.copy_from_slice(&parts);
        Ok(BBox(bbox))
    }
}

/// Parse a GeoJSON FeatureCollection into its features.
pub fn parse_features(contents: &str) -> PopgridResult<Vec<Feature>> {
    match GeoJson::from_str(contents)? {
        GeoJson::FeatureCollection(collection) => Ok(collection.features),
        GeoJson::Feature(feature) => Ok(vec![feature]),
        GeoJson::Geometry(_) => Err(PopgridError::Boundaries(
            "expected a FeatureCollection, found a bare geometry".into(),
        )),
    }
}

pub fn read_features<P: AsRef<Path>>(path: P) -> PopgridResult<Vec<Feature>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .map_err(|err| PopgridError::Boundaries(format!("{}: {err}", path.display())))?;
    let features = parse_features(&contents)?;
    debug!("read {} features from {}", features.len(), path.display());
    Ok(features)
}

/// Load every country of a world boundary file.
pub fn read_countries<P: AsRef<Path>>(path: P) -> PopgridResult<Vec<Country>> {
    Ok(read_features(path)?
        .into_iter()
        .map(Country::from_feature)
        .collect())
}
