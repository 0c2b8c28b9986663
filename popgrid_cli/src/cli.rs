use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use enum_dispatch::enum_dispatch;
use log::info;
use popgrid::{
    boundary::BBox,
    config::Config,
    dataset::DatasetFormat,
    extract::TaskReport,
    formatters::OutputFormat,
    region::RegionSpec,
    Popgrid,
};
use spinners::{Spinner, Spinners};

use crate::display::display_summary;
use crate::error::PopgridCliResult;

const DEFAULT_PROGRESS_SPINNER: Spinners = Spinners::Dots;
const COMPLETE_PROGRESS_STRING: &str = "✔";
const RUNNING_TAIL_STRING: &str = "...";

/// Trait that defines what to run when a given subcommand is invoked.
#[enum_dispatch]
pub trait RunCommand {
    async fn run(&self, config: Config) -> PopgridCliResult<()>;
}

/// Overrides for the dataset location shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct DatasetArgs {
    #[arg(short = 'p', long, help = "Population dataset (parquet or csv)")]
    population: Option<PathBuf>,
    #[arg(long, value_name = "parquet|csv", help = "Population dataset format")]
    population_format: Option<DatasetFormat>,
}

impl DatasetArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(population) = &self.population {
            config.population_path = population.clone();
        }
        if let Some(format) = self.population_format {
            config.population_format = Some(format);
        }
    }
}

/// Overrides for the country inputs and outputs.
#[derive(Args, Debug, Clone, Default)]
pub struct CountryArgs {
    #[arg(short = 'b', long, help = "World boundaries GeoJSON")]
    boundaries: Option<PathBuf>,
    #[arg(short = 'i', long, help = "Metadata index output file")]
    index_file: Option<PathBuf>,
}

impl CountryArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(boundaries) = &self.boundaries {
            config.boundaries_path = boundaries.clone();
        }
        if let Some(index_file) = &self.index_file {
            config.countries_index_file = index_file.clone();
        }
    }
}

fn start_spinner(quiet: bool, message: &str) -> Option<Spinner> {
    (!quiet).then(|| {
        Spinner::with_timer(
            DEFAULT_PROGRESS_SPINNER,
            message.to_string() + RUNNING_TAIL_STRING,
        )
    })
}

fn stop_spinner(sp: Option<Spinner>) {
    if let Some(mut s) = sp {
        s.stop_with_symbol(COMPLETE_PROGRESS_STRING)
    }
}

fn print_report(quiet: bool) -> impl FnMut(usize, usize, &TaskReport) {
    move |done, total, report| {
        if !quiet {
            println!("[{done}/{total}] {report}");
        }
    }
}

/// The `countries` command writes the metadata index and one extract per country.
#[derive(Args, Debug)]
pub struct CountriesCommand {
    #[command(flatten)]
    dataset_args: DatasetArgs,
    #[command(flatten)]
    country_args: CountryArgs,
    #[arg(short = 'o', long, help = "Directory receiving the per-country extracts")]
    output_dir: Option<PathBuf>,
    #[arg(short = 'w', long, help = "Number of extraction workers")]
    workers: Option<usize>,
    #[arg(from_global)]
    quiet: bool,
}

impl RunCommand for CountriesCommand {
    async fn run(&self, mut config: Config) -> PopgridCliResult<()> {
        info!("Running `countries` subcommand");
        self.dataset_args.apply(&mut config);
        self.country_args.apply(&mut config);
        if let Some(output_dir) = &self.output_dir {
            config.output_dir = output_dir.clone();
        }
        if self.workers.is_some() {
            config.workers = self.workers;
        }
        let popgrid = Popgrid::new_with_config(config);
        if !self.quiet {
            println!(
                "Processing countries with {} workers, index at {}",
                popgrid.config.worker_count(),
                popgrid.config.countries_index_file.display()
            );
        }
        let summary = popgrid.run(print_report(self.quiet)).await?;
        display_summary(&summary);
        Ok(())
    }
}

/// The `index` command only writes the metadata index.
#[derive(Args, Debug)]
pub struct IndexCommand {
    #[command(flatten)]
    country_args: CountryArgs,
    #[arg(from_global)]
    quiet: bool,
}

impl RunCommand for IndexCommand {
    async fn run(&self, mut config: Config) -> PopgridCliResult<()> {
        info!("Running `index` subcommand");
        self.country_args.apply(&mut config);
        let popgrid = Popgrid::new_with_config(config);
        let countries = popgrid.countries()?;
        let sp = start_spinner(self.quiet, "Collecting metadata for all countries");
        let index = popgrid.build_index(&countries);
        stop_spinner(sp);
        println!(
            "Saved metadata for {} of {} countries to {}",
            index?.len(),
            countries.len(),
            popgrid.config.countries_index_file.display()
        );
        Ok(())
    }
}

/// The `probe` command prints the resolution of the population dataset.
#[derive(Args, Debug)]
pub struct ProbeCommand {
    #[command(flatten)]
    dataset_args: DatasetArgs,
}

impl RunCommand for ProbeCommand {
    async fn run(&self, mut config: Config) -> PopgridCliResult<()> {
        info!("Running `probe` subcommand");
        self.dataset_args.apply(&mut config);
        let resolution = Popgrid::new_with_config(config).probe_resolution().await?;
        println!("{resolution}");
        Ok(())
    }
}

/// Region may be given either as a GeoJSON file or a bounding box.
#[derive(Args, Debug, Clone)]
#[group(required = false, multiple = false)]
pub struct RegionArgs {
    #[arg(short = 'r', long, help = "Region boundaries GeoJSON")]
    region: Option<PathBuf>,
    #[arg(
        long,
        value_name = "MIN_LON,MIN_LAT,MAX_LON,MAX_LAT",
        allow_hyphen_values = true,
        help = "Bounding box of the region"
    )]
    bbox: Option<BBox>,
}

/// The `region` command extracts the population of a single region.
#[derive(Args, Debug)]
pub struct RegionCommand {
    #[command(flatten)]
    dataset_args: DatasetArgs,
    #[command(flatten)]
    region_args: RegionArgs,
    #[arg(short = 'o', long, help = "Output file")]
    output_file: Option<PathBuf>,
    #[arg(
        short = 'f',
        long,
        value_name = "json|csv",
        default_value = "json",
        help = "Output format for the results"
    )]
    output_format: OutputFormat,
    #[arg(from_global)]
    quiet: bool,
}

impl RegionCommand {
    fn region_spec(&self, config: &Config) -> RegionSpec {
        match (&self.region_args.bbox, &self.region_args.region) {
            (Some(bbox), _) => RegionSpec::BoundingBox(*bbox),
            (None, Some(path)) => RegionSpec::Boundaries(path.clone()),
            (None, None) => RegionSpec::Boundaries(config.region.boundaries_path.clone()),
        }
    }
}

impl RunCommand for RegionCommand {
    async fn run(&self, mut config: Config) -> PopgridCliResult<()> {
        info!("Running `region` subcommand");
        self.dataset_args.apply(&mut config);
        let spec = self.region_spec(&config);
        let output_file = self
            .output_file
            .clone()
            .unwrap_or_else(|| config.region.output_file.clone());
        let popgrid = Popgrid::new_with_config(config);

        let sp = start_spinner(self.quiet, "Extracting region");
        let rows = popgrid
            .extract_region(spec, &output_file, self.output_format.into())
            .await;
        stop_spinner(sp);
        println!("Found {} populated cells, saved to {}", rows?, output_file.display());
        Ok(())
    }
}

#[derive(Parser, Debug)]
#[command(version, about="Popgrid splits global H3 population grids into per-country extracts", long_about = None, name="popgrid")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    #[arg(short = 'c', long, global = true, help = "Path to a TOML config file")]
    pub config: Option<PathBuf>,
    #[arg(
        short = 'q',
        long = "quiet",
        help = "\
            Do not print progress to stdout. Results and logs (when `RUST_LOG`\n\
            is set) will still be printed.",
        global = true
    )]
    quiet: bool,
}

/// Subcommands of the CLI, each implementing `RunCommand`.
#[derive(Subcommand, Debug)]
#[enum_dispatch(RunCommand)]
pub enum Commands {
    /// Write the country index, then extract every country in parallel
    Countries(CountriesCommand),
    /// Write the country index only
    Index(IndexCommand),
    /// Print the H3 resolution of the population dataset
    Probe(ProbeCommand),
    /// Extract the population of a single region
    Region(RegionCommand),
}
