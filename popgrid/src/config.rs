use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dataset::DatasetFormat;

/// Run configuration, constructed once at startup and passed into [`crate::Popgrid`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Population dataset with `h3` and `population` columns
    pub population_path: PathBuf,
    /// Dataset format; inferred from the file extension when unset
    pub population_format: Option<DatasetFormat>,
    /// World boundaries as a GeoJSON FeatureCollection
    pub boundaries_path: PathBuf,
    /// Directory receiving one extract per country
    pub output_dir: PathBuf,
    /// Combined metadata index
    pub countries_index_file: PathBuf,
    /// Worker count for extraction; defaults to the available parallelism
    pub workers: Option<usize>,
    pub region: RegionConfig,
}

/// Inputs and outputs of the single-region variant.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RegionConfig {
    pub boundaries_path: PathBuf,
    pub output_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            population_path: "kontur_population_20231101.parquet".into(),
            population_format: None,
            boundaries_path: "world_countries.geojson".into(),
            output_dir: "public/data".into(),
            countries_index_file: "public/countries.json".into(),
            workers: None,
            region: RegionConfig::default(),
        }
    }
}

impl Default for RegionConfig {
    fn default() -> Self {
        RegionConfig {
            boundaries_path: "norway.geojson".into(),
            output_file: "norway_population.json".into(),
        }
    }
}

impl Config {
    /// Number of extraction workers, never less than one.
    pub fn worker_count(&self) -> usize {
        self.workers
            .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
            .unwrap_or(1)
            .max(1)
    }
}

/// Location of the extract for a country code.
pub(crate) fn extract_path(output_dir: &Path, code: &str) -> PathBuf {
    output_dir.join(format!("{code}.csv"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_should_fill_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"output_dir": "out", "workers": 0, "region": {"output_file": "r.json"}}"#,
        )
        .unwrap();
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(
            config.boundaries_path,
            Config::default().boundaries_path,
            "unset fields should keep their defaults"
        );
        assert_eq!(config.region.boundaries_path, PathBuf::from("norway.geojson"));
        assert_eq!(config.worker_count(), 1, "zero workers is clamped to one");
    }

    #[test]
    fn extract_path_uses_country_code() {
        let config = Config::default();
        assert_eq!(
            extract_path(&config.output_dir, "NOR"),
            PathBuf::from("public/data/NOR.csv")
        );
    }
}
