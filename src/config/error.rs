use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("input_dirs cannot be empty")]
    NoInputDirs,

    #[error("tiles cannot be empty")]
    NoTiles,

    #[error("tile {0:?} is not of the form hHHvVV")]
    Tile(String),

    #[error("nodata must be a finite number")]
    Nodata,

    #[error("workers must be at least 1")]
    Workers,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}
