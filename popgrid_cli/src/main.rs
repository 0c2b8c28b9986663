mod cli;
mod display;
mod error;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, RunCommand};
use log::debug;
use popgrid::config::Config;

use crate::error::PopgridCliResult;

const DEFAULT_LOGGING_LEVEL: &str = "warn";

#[tokio::main]
async fn main() -> Result<()> {
    // Set RUST_LOG to `DEFAULT_LOGGING_LEVEL` if not set
    let _ =
        std::env::var("RUST_LOG").map_err(|_| std::env::set_var("RUST_LOG", DEFAULT_LOGGING_LEVEL));
    pretty_env_logger::init_timed();
    let args = Cli::parse();
    debug!("args: {args:?}");
    let config = read_config_from_toml(args.config.as_deref())?;
    debug!("config: {config:?}");

    if let Some(command) = args.command {
        command.run(config).await?;
    }
    Ok(())
}

fn default_config_path() -> Option<PathBuf> {
    // macOS: ~/Library/Application Support/popgrid/config.toml
    dirs::config_dir().map(|dir| dir.join("popgrid").join("config.toml"))
}

/// Read the config from an explicit path, else the user config directory, else defaults.
fn read_config_from_toml(path: Option<&Path>) -> PopgridCliResult<Config> {
    let (file_path, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => match default_config_path() {
            Some(path) => (path, false),
            None => return Ok(Config::default()),
        },
    };
    match std::fs::read_to_string(&file_path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => Ok(Config::default()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn config_should_load_from_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "output_dir = \"extracts\"\nworkers = 3\n\n[region]\noutput_file = \"r.json\"").unwrap();
        let config = read_config_from_toml(Some(file.path())).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("extracts"));
        assert_eq!(config.workers, Some(3));
        assert_eq!(config.region.output_file, PathBuf::from("r.json"));
        assert_eq!(config.boundaries_path, Config::default().boundaries_path);
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_config_from_toml(Some(&dir.path().join("nope.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "workers = \"many\"").unwrap();
        assert!(read_config_from_toml(Some(file.path())).is_err());
    }
}
