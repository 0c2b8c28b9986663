//! Parallel, resumable per-country extraction.
//!
//! Every country becomes one [`ExtractionTask`]. Tasks are queued into a
//! stream that a fixed number of blocking workers drain; reports come back in
//! completion order. A task whose artifact already exists is skipped, so an
//! interrupted run can simply be started again.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use h3o::Resolution;
use log::{debug, info, warn};

use crate::boundary::Country;
use crate::config::extract_path;
use crate::dataset::PopulationDataset;
use crate::error::{PopgridError, PopgridResult};
use crate::formatters::{write_extract, CsvFormatter, OutputFormatter};
use crate::join::join_cells;
use crate::rasterize::rasterize;

/// Outcome of a single extraction task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    /// Matched rows were written
    Generated { rows: usize, resolution: Resolution },
    /// An artifact already existed
    Skipped,
    /// Processed, but no population matched; a zero-length marker was written
    Empty,
    Failed { message: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskReport {
    pub name: String,
    pub code: String,
    pub status: TaskStatus,
}

impl TaskReport {
    fn failed(name: String, code: String, err: PopgridError) -> Self {
        Self {
            name,
            code,
            status: TaskStatus::Failed {
                message: err.to_string(),
            },
        }
    }
}

impl Display for TaskReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.status {
            TaskStatus::Generated { rows, resolution } => write!(
                f,
                "Generated {rows} cells for {} (native res {resolution})",
                self.name
            ),
            TaskStatus::Skipped => write!(f, "Skipped {} ({}) - exists", self.name, self.code),
            TaskStatus::Empty => write!(f, "No population for {}", self.name),
            TaskStatus::Failed { message } => write!(f, "Error {}: {message}", self.name),
        }
    }
}

/// Everything one worker needs to extract a single country.
///
/// The dataset is only a location; the task opens its own handle.
#[derive(Clone, Debug)]
pub struct ExtractionTask {
    pub country: Country,
    pub resolution: Resolution,
    pub dataset: PopulationDataset,
    pub output_dir: PathBuf,
}

impl ExtractionTask {
    pub fn output_path(&self) -> PathBuf {
        extract_path(&self.output_dir, &self.country.code)
    }

    /// Run the task, turning any error into a failed report.
    pub fn run(&self) -> TaskReport {
        match self.extract() {
            Ok(status) => TaskReport {
                name: self.country.name.clone(),
                code: self.country.code.clone(),
                status,
            },
            Err(err) => TaskReport::failed(self.country.name.clone(), self.country.code.clone(), err),
        }
    }

    fn extract(&self) -> PopgridResult<TaskStatus> {
        let path = self.output_path();
        if path.exists() {
            return Ok(TaskStatus::Skipped);
        }
        let cells = rasterize(&self.country.boundary()?, self.resolution)?;
        debug!("{} covers {} cells", self.country.code, cells.len());
        let extract = join_cells(self.dataset.scan()?, &cells)?;
        write_extract(&path, &OutputFormatter::Csv(CsvFormatter), &extract)?;
        if extract.is_empty() {
            Ok(TaskStatus::Empty)
        } else {
            Ok(TaskStatus::Generated {
                rows: extract.len(),
                resolution: self.resolution,
            })
        }
    }
}

/// A fixed-size pool running extraction tasks on blocking threads.
#[derive(Clone, Copy, Debug)]
pub struct ExtractionPool {
    workers: usize,
}

impl ExtractionPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// Run every task and collect one report each.
    ///
    /// `on_report` sees `(completed, total, report)` as each task finishes. A
    /// failed or panicking task never stops its siblings.
    pub async fn run<F>(&self, tasks: Vec<ExtractionTask>, mut on_report: F) -> Vec<TaskReport>
    where
        F: FnMut(usize, usize, &TaskReport),
    {
        let total = tasks.len();
        info!("Processing {total} countries with {} workers", self.workers);
        let mut completed = stream::iter(tasks.into_iter().map(|task| async move {
            let name = task.country.name.clone();
            let code = task.country.code.clone();
            match tokio::task::spawn_blocking(move || task.run()).await {
                Ok(report) => report,
                Err(err) => TaskReport::failed(name, code, PopgridError::Worker(err.to_string())),
            }
        }))
        .buffer_unordered(self.workers);

        let mut reports = Vec::with_capacity(total);
        while let Some(report) = completed.next().await {
            match &report.status {
                TaskStatus::Failed { .. } => warn!("{report}"),
                _ => info!("{report}"),
            }
            on_report(reports.len() + 1, total, &report);
            reports.push(report);
        }
        reports
    }
}

/// Build one task per country against a shared read-only dataset location.
pub fn tasks_for(
    countries: Vec<Country>,
    dataset: &PopulationDataset,
    resolution: Resolution,
    output_dir: &Path,
) -> Vec<ExtractionTask> {
    countries
        .into_iter()
        .map(|country| ExtractionTask {
            country,
            resolution,
            dataset: dataset.clone(),
            output_dir: output_dir.to_path_buf(),
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::boundary::{parse_features, tests::WORLD};
    use h3o::LatLng;
    use std::io::Write;

    pub(crate) const RES: Resolution = Resolution::Seven;

    pub(crate) fn cell(lat: f64, lng: f64) -> String {
        LatLng::new(lat, lng).unwrap().to_cell(RES).to_string()
    }

    /// Two populated cells inside "Square Land" and one well outside it.
    pub(crate) fn write_population(dir: &Path) -> PopulationDataset {
        let path = dir.join("population.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "h3,population").unwrap();
        writeln!(file, "{},100", cell(60.1, 10.1)).unwrap();
        writeln!(file, "{},50", cell(61.0, 10.1)).unwrap();
        writeln!(file, "{},5", cell(60.15, 10.05)).unwrap();
        PopulationDataset::new(path, None)
    }

    fn world_tasks(dir: &Path) -> Vec<ExtractionTask> {
        let dataset = write_population(dir);
        let countries = parse_features(WORLD)
            .unwrap()
            .into_iter()
            .map(Country::from_feature)
            .collect();
        let output_dir = dir.join("out");
        std::fs::create_dir_all(&output_dir).unwrap();
        tasks_for(countries, &dataset, RES, &output_dir)
    }

    fn status_of<'a>(reports: &'a [TaskReport], code: &str) -> &'a TaskStatus {
        &reports.iter().find(|r| r.code == code).unwrap().status
    }

    #[tokio::test]
    async fn pool_should_report_every_country() {
        let dir = tempfile::tempdir().unwrap();
        let tasks = world_tasks(dir.path());
        let mut seen = vec![];
        let reports = ExtractionPool::new(2)
            .run(tasks, |done, total, report| {
                seen.push((done, total, report.code.clone()))
            })
            .await;

        assert_eq!(reports.len(), 3, "failures must not stop sibling tasks");
        assert_eq!(seen.iter().map(|(done, _, _)| *done).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(seen.iter().all(|(_, total, _)| *total == 3));

        assert_eq!(
            status_of(&reports, "SQL"),
            &TaskStatus::Generated { rows: 2, resolution: RES }
        );
        assert_eq!(status_of(&reports, "TEST_LAND"), &TaskStatus::Empty);
        assert!(matches!(
            status_of(&reports, "POINT_LAND"),
            TaskStatus::Failed { .. }
        ));

        let out = dir.path().join("out");
        let sql = std::fs::read_to_string(out.join("SQL.csv")).unwrap();
        assert_eq!(
            sql,
            format!("{},100\n{},5\n", cell(60.1, 10.1), cell(60.15, 10.05)),
            "rows keep dataset order and have no header"
        );
        assert_eq!(std::fs::metadata(out.join("TEST_LAND.csv")).unwrap().len(), 0);
        assert!(!out.join("POINT_LAND.csv").exists(), "failed tasks leave no artifact");
    }

    #[tokio::test]
    async fn second_run_should_skip_processed_countries() {
        let dir = tempfile::tempdir().unwrap();
        let pool = ExtractionPool::new(4);
        pool.run(world_tasks(dir.path()), |_, _, _| {}).await;
        let out = dir.path().join("out");
        let first = std::fs::read(out.join("SQL.csv")).unwrap();

        let reports = pool.run(world_tasks(dir.path()), |_, _, _| {}).await;
        assert_eq!(status_of(&reports, "SQL"), &TaskStatus::Skipped);
        assert_eq!(status_of(&reports, "TEST_LAND"), &TaskStatus::Skipped);
        assert_eq!(std::fs::read(out.join("SQL.csv")).unwrap(), first);
    }

    #[tokio::test]
    async fn existing_artifact_is_not_recomputed() {
        let dir = tempfile::tempdir().unwrap();
        let tasks = world_tasks(dir.path());
        let existing = dir.path().join("out").join("SQL.csv");
        std::fs::write(&existing, "sentinel").unwrap();

        let reports = ExtractionPool::new(1).run(tasks, |_, _, _| {}).await;
        assert_eq!(status_of(&reports, "SQL"), &TaskStatus::Skipped);
        assert_eq!(std::fs::read_to_string(existing).unwrap(), "sentinel");
    }

    #[tokio::test]
    async fn missing_dataset_fails_each_task_independently() {
        let dir = tempfile::tempdir().unwrap();
        let mut tasks = world_tasks(dir.path());
        for task in &mut tasks {
            task.dataset = PopulationDataset::new(dir.path().join("missing.csv"), None);
        }
        let reports = ExtractionPool::new(2).run(tasks, |_, _, _| {}).await;
        assert!(matches!(status_of(&reports, "SQL"), TaskStatus::Failed { .. }));
        assert!(matches!(status_of(&reports, "POINT_LAND"), TaskStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn failed_write_is_retried_on_next_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut tasks = world_tasks(dir.path());
        let out = dir.path().join("out");
        std::fs::remove_dir(&out).unwrap();

        let reports = ExtractionPool::new(2).run(tasks.clone(), |_, _, _| {}).await;
        assert!(matches!(status_of(&reports, "SQL"), TaskStatus::Failed { .. }));
        assert!(!out.join("SQL.csv").exists());

        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join(".tmpStale"), "interrupted").unwrap();
        tasks.retain(|task| task.country.code == "SQL");
        let reports = ExtractionPool::new(2).run(tasks, |_, _, _| {}).await;
        assert_eq!(
            status_of(&reports, "SQL"),
            &TaskStatus::Generated { rows: 2, resolution: RES }
        );
    }

    #[tokio::test]
    async fn colliding_codes_share_one_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = write_population(dir.path());
        let twins = r#"{"type": "FeatureCollection", "features": [
            {
                "type": "Feature",
                "properties": {"name": "Twin Land", "ISO3166-1-Alpha-3": "-99"},
                "geometry": {"type": "Polygon", "coordinates": [[[10.0, 60.0], [10.2, 60.0], [10.2, 60.2], [10.0, 60.2], [10.0, 60.0]]]}
            },
            {
                "type": "Feature",
                "properties": {"name": "TWIN LAND"},
                "geometry": {"type": "Polygon", "coordinates": [[[20.0, 40.0], [21.0, 40.0], [21.0, 41.0], [20.0, 41.0], [20.0, 40.0]]]}
            }
        ]}"#;
        let countries = parse_features(twins)
            .unwrap()
            .into_iter()
            .map(Country::from_feature)
            .collect();
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        let tasks = tasks_for(countries, &dataset, RES, &out);

        let reports = ExtractionPool::new(2).run(tasks, |_, _, _| {}).await;
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.code == "TWIN_LAND"));
        assert!(
            reports
                .iter()
                .all(|r| !matches!(r.status, TaskStatus::Failed { .. })),
            "{reports:?}"
        );
        let artifact = std::fs::read_to_string(out.join("TWIN_LAND.csv")).unwrap();
        let square = format!("{},100\n{},5\n", cell(60.1, 10.1), cell(60.15, 10.05));
        assert!(
            artifact == square || artifact.is_empty(),
            "one twin's complete rows win: {artifact:?}"
        );
    }

    #[test]
    fn report_lines_name_the_country() {
        let report = TaskReport {
            name: "Norway".into(),
            code: "NOR".into(),
            status: TaskStatus::Skipped,
        };
        assert_eq!(report.to_string(), "Skipped Norway (NOR) - exists");
        let report = TaskReport {
            status: TaskStatus::Failed {
                message: "boom".into(),
            },
            ..report
        };
        assert_eq!(report.to_string(), "Error Norway: boom");
    }
}
