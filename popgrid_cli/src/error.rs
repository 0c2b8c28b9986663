use popgrid::error::PopgridError;

#[derive(thiserror::Error, Debug)]
pub enum PopgridCliError {
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("popgrid error: {0}")]
    PopgridError(#[from] PopgridError),
    #[error("Invalid TOML in config file: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("std IO error: {0}")]
    IOError(#[from] std::io::Error),
}

pub type PopgridCliResult<T> = Result<T, PopgridCliError>;
