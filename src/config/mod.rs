use serde::de::Error;
use serde::{Deserialize, Deserializer, Serialize};

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::inventory::TileId;

pub mod error;
pub use error::ConfigError;

/// Run parameters, loaded from a JSON file.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RunConfig {
    input_dirs: Vec<PathBuf>,
    tiles: Vec<TileId>,
    boundary: PathBuf,
    output_dir: PathBuf,
    raster_extension: String,
    nodata: f64,
    cutline_blend_px: u32,
    workers: Option<usize>,
}

// Deserializes a RunConfig, validating that the inventory has somewhere to
// look, the tile list parses, and the optional knobs are usable values.
impl<'de> Deserialize<'de> for RunConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ConfigHelper {
            input_dirs: Vec<PathBuf>,
            tiles: Vec<String>,
            boundary: PathBuf,
            output_dir: PathBuf,
            raster_extension: Option<String>,
            nodata: Option<f64>,
            cutline_blend_px: Option<u32>,
            workers: Option<usize>,
        }

        let helper = ConfigHelper::deserialize(deserializer)?;

        if helper.input_dirs.is_empty() {
            return Err(D::Error::custom(ConfigError::NoInputDirs));
        }

        if helper.tiles.is_empty() {
            return Err(D::Error::custom(ConfigError::NoTiles));
        }

        let mut tiles = Vec::with_capacity(helper.tiles.len());
        for raw in &helper.tiles {
            let tile = TileId::parse(raw)
                .ok_or_else(|| D::Error::custom(ConfigError::Tile(raw.clone())))?;
            tiles.push(tile);
        }

        let nodata = helper.nodata.unwrap_or(-999.0);
        if !nodata.is_finite() {
            return Err(D::Error::custom(ConfigError::Nodata));
        }

        if helper.workers == Some(0) {
            return Err(D::Error::custom(ConfigError::Workers));
        }

        Ok(RunConfig {
            input_dirs: helper.input_dirs,
            tiles,
            boundary: helper.boundary,
            output_dir: helper.output_dir,
            raster_extension: helper
                .raster_extension
                .unwrap_or_else(|| "hdf".to_string()),
            nodata,
            cutline_blend_px: helper.cutline_blend_px.unwrap_or(5),
            workers: helper.workers,
        })
    }
}

impl RunConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<RunConfig, ConfigError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let config: RunConfig = serde_json::from_reader(reader).map_err(ConfigError::from)?;

        Ok(config)
    }

    pub fn input_dirs(&self) -> &[PathBuf] {
        &self.input_dirs
    }

    pub fn tiles(&self) -> &[TileId] {
        &self.tiles
    }

    /// How many tiles cover the study area; drives the date qualifying
    /// rule.
    pub fn required_tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn boundary(&self) -> &Path {
        &self.boundary
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn raster_extension(&self) -> &str {
        &self.raster_extension
    }

    pub fn nodata(&self) -> f64 {
        self.nodata
    }

    pub fn cutline_blend_px(&self) -> u32 {
        self.cutline_blend_px
    }

    pub fn workers(&self) -> Option<usize> {
        self.workers
    }
}
