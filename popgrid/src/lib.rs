use std::path::Path;

use h3o::Resolution;
use log::{debug, info};

use crate::boundary::Country;
use crate::config::Config;
use crate::dataset::PopulationDataset;
use crate::error::{PopgridError, PopgridResult};
use crate::extract::{tasks_for, ExtractionPool, TaskReport, TaskStatus};
use crate::formatters::{write_extract, OutputFormatter};
use crate::metadata::CountryMetadata;
use crate::region::RegionSpec;

// Re-exports
pub use column_names as COL;

// Modules
pub mod boundary;
pub mod column_names;
pub mod config;
pub mod dataset;
pub mod error;
pub mod extract;
pub mod formatters;
pub mod join;
pub mod metadata;
pub mod rasterize;
pub mod region;

/// Entry point tying the configured inputs and outputs together
pub struct Popgrid {
    pub config: Config,
}

/// Counts of task outcomes for one extraction phase
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub indexed: usize,
    pub generated: usize,
    pub skipped: usize,
    pub empty: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_reports(indexed: usize, reports: &[TaskReport]) -> Self {
        reports
            .iter()
            .fold(Self { indexed, ..Default::default() }, |mut summary, report| {
                match report.status {
                    TaskStatus::Generated { .. } => summary.generated += 1,
                    TaskStatus::Skipped => summary.skipped += 1,
                    TaskStatus::Empty => summary.empty += 1,
                    TaskStatus::Failed { .. } => summary.failed += 1,
                }
                summary
            })
    }
}

impl Default for Popgrid {
    fn default() -> Self {
        Self::new()
    }
}

impl Popgrid {
    /// Setup the Popgrid object with default configuration
    pub fn new() -> Self {
        Self::new_with_config(Config::default())
    }

    /// Setup the Popgrid object with custom configuration
    pub fn new_with_config(config: Config) -> Self {
        debug!("config: {config:?}");
        Self { config }
    }

    pub fn dataset(&self) -> PopulationDataset {
        PopulationDataset::new(&self.config.population_path, self.config.population_format)
    }

    /// Resolution of the population dataset. Fails with `EmptyDataset` when it has no rows.
    pub async fn probe_resolution(&self) -> PopgridResult<Resolution> {
        let dataset = self.dataset();
        let resolution = tokio::task::spawn_blocking(move || dataset.probe_resolution())
            .await
            .map_err(|err| PopgridError::Worker(err.to_string()))??;
        info!("H3 resolution: {resolution}");
        Ok(resolution)
    }

    pub fn countries(&self) -> PopgridResult<Vec<Country>> {
        boundary::read_countries(&self.config.boundaries_path)
    }

    /// Summarize every country and write the metadata index.
    pub fn build_index(&self, countries: &[Country]) -> PopgridResult<Vec<CountryMetadata>> {
        info!("Collecting metadata for {} countries", countries.len());
        let index = metadata::build_index(countries);
        metadata::write_index(&self.config.countries_index_file, &index)?;
        Ok(index)
    }

    /// Extract every country in parallel, reporting each completed task to `on_report`.
    pub async fn extract_countries<F>(
        &self,
        countries: Vec<Country>,
        resolution: Resolution,
        on_report: F,
    ) -> PopgridResult<Vec<TaskReport>>
    where
        F: FnMut(usize, usize, &TaskReport),
    {
        let output_dir = &self.config.output_dir;
        std::fs::create_dir_all(output_dir)
            .map_err(|err| PopgridError::artifact(output_dir, err))?;
        let tasks = tasks_for(countries, &self.dataset(), resolution, output_dir);
        let pool = ExtractionPool::new(self.config.worker_count());
        Ok(pool.run(tasks, on_report).await)
    }

    /// Probe, index, then extract. Only an unusable dataset or boundary file
    /// stops the run; per-country failures are reported and skipped.
    pub async fn run<F>(&self, on_report: F) -> PopgridResult<RunSummary>
    where
        F: FnMut(usize, usize, &TaskReport),
    {
        let resolution = self.probe_resolution().await?;
        let countries = self.countries()?;
        let index = self.build_index(&countries)?;
        let reports = self.extract_countries(countries, resolution, on_report).await?;
        Ok(RunSummary::from_reports(index.len(), &reports))
    }

    /// Extract a single region and write it to `output_file`.
    pub async fn extract_region<P: AsRef<Path>>(
        &self,
        spec: RegionSpec,
        output_file: P,
        formatter: OutputFormatter,
    ) -> PopgridResult<usize> {
        let resolution = self.probe_resolution().await?;
        let dataset = self.dataset();
        let extract = tokio::task::spawn_blocking(move || {
            region::extract_region(&dataset, &spec, resolution)
        })
        .await
        .map_err(|err| PopgridError::Worker(err.to_string()))??;
        let output_file = output_file.as_ref();
        write_extract(output_file, &formatter, &extract)?;
        info!("Saved to {}", output_file.display());
        Ok(extract.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::tests::WORLD;
    use crate::extract::tests::write_population;
    use crate::formatters::{JsonPairsFormatter, OutputFormat};

    fn test_config(dir: &Path) -> Config {
        write_population(dir);
        let boundaries_path = dir.join("world.geojson");
        std::fs::write(&boundaries_path, WORLD).unwrap();
        Config {
            population_path: dir.join("population.csv"),
            population_format: None,
            boundaries_path,
            output_dir: dir.join("public").join("data"),
            countries_index_file: dir.join("public").join("countries.json"),
            workers: Some(2),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn run_should_index_then_extract() {
        let dir = tempfile::tempdir().unwrap();
        let popgrid = Popgrid::new_with_config(test_config(dir.path()));
        let summary = popgrid.run(|_, _, _| {}).await.unwrap();
        assert_eq!(
            summary,
            RunSummary {
                indexed: 2,
                generated: 1,
                skipped: 0,
                empty: 1,
                failed: 1,
            }
        );

        let index: Vec<CountryMetadata> = serde_json::from_str(
            &std::fs::read_to_string(&popgrid.config.countries_index_file).unwrap(),
        )
        .unwrap();
        assert_eq!(index.len(), 2);

        let rerun = popgrid.run(|_, _, _| {}).await.unwrap();
        assert_eq!(rerun.skipped, 2, "processed countries are skipped on rerun");
        assert_eq!(rerun.generated, 0);
    }

    #[tokio::test]
    async fn empty_dataset_aborts_before_any_work() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        std::fs::write(&config.population_path, "h3,population\n").unwrap();
        let popgrid = Popgrid::new_with_config(config);
        let result = popgrid.run(|_, _, _| {}).await;
        assert!(matches!(result, Err(PopgridError::EmptyDataset)));
        assert!(
            !popgrid.config.countries_index_file.exists(),
            "the index is not written when the run cannot start"
        );
    }

    #[tokio::test]
    async fn region_outside_dataset_writes_zero_length_file() {
        let dir = tempfile::tempdir().unwrap();
        let popgrid = Popgrid::new_with_config(test_config(dir.path()));
        let output = dir.path().join("region.json");
        let spec = RegionSpec::BoundingBox(boundary::BBox([-60.0, -40.0, -59.0, -39.0]));
        let rows = popgrid
            .extract_region(spec, &output, OutputFormat::Json.into())
            .await
            .unwrap();
        assert_eq!(rows, 0);
        assert_eq!(std::fs::metadata(&output).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn region_writes_json_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let popgrid = Popgrid::new_with_config(test_config(dir.path()));
        let output = dir.path().join("region.json");
        let spec = RegionSpec::BoundingBox(boundary::BBox([10.0, 60.0, 10.2, 60.2]));
        let rows = popgrid
            .extract_region(spec, &output, OutputFormatter::JsonPairs(JsonPairsFormatter))
            .await
            .unwrap();
        assert_eq!(rows, 2);
        let pairs: Vec<(String, i64)> =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(pairs.iter().map(|(_, pop)| *pop).collect::<Vec<_>>(), vec![100, 5]);
    }
}
