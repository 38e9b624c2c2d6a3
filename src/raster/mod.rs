pub mod gdal;
#[cfg(test)]
pub mod mock;

use std::path::{Path, PathBuf};

use crate::bounds::Bounds;
use crate::error::{PipelineError, StageError};

/// Affine transform mapping grid indices to georeferenced coordinates, in
/// the order GDAL reports the six coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub x_rotation: f64,
    pub origin_y: f64,
    pub y_rotation: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn from_gdal(gt: [f64; 6]) -> GeoTransform {
        GeoTransform {
            origin_x: gt[0],
            pixel_width: gt[1],
            x_rotation: gt[2],
            origin_y: gt[3],
            y_rotation: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.x_rotation,
            self.origin_y,
            self.y_rotation,
            self.pixel_height,
        ]
    }

    /// Coordinate of a cell's center, half a cell in from its top-left
    /// corner along both axes.
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        self.apply(row as f64 + 0.5, col as f64 + 0.5)
    }

    /// Coordinate of a grid node, e.g. `corner(0, 0)` is the raster origin.
    pub fn corner(&self, row: usize, col: usize) -> (f64, f64) {
        self.apply(row as f64, col as f64)
    }

    fn apply(&self, row: f64, col: f64) -> (f64, f64) {
        let x = self.origin_x + col * self.pixel_width + row * self.x_rotation;
        let y = self.origin_y + col * self.y_rotation + row * self.pixel_height;
        (x, y)
    }
}

/// Cell size probed once per run from the first raster the pipeline
/// converts, then applied to every reprojection. `y` is a magnitude, not
/// the usually negative north-up coefficient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunResolution {
    pub x: f64,
    pub y: f64,
}

/// Shape and georeferencing of a raster, without its cell values.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterProfile {
    pub cols: usize,
    pub rows: usize,
    pub geo_transform: GeoTransform,
    pub projection: String,
}

/// A raster's single band read into memory, row-major.
#[derive(Debug, Clone)]
pub struct BandData {
    pub profile: RasterProfile,
    pub values: Vec<f32>,
    pub nodata: Option<f64>,
}

/// Clipping polygon with the spatial reference the whole run reprojects
/// into.
#[derive(Debug, Clone)]
pub struct Boundary {
    pub path: PathBuf,
    pub srs: String,
    pub extent: Bounds,
}

/// Everything a reprojection needs beyond its input and output paths.
#[derive(Debug, Clone, PartialEq)]
pub struct WarpParams {
    pub target_srs: String,
    pub resolution: RunResolution,
    pub nodata: f64,
    pub cutline: PathBuf,
    pub cutline_blend_px: u32,
}

/// Raster access and transformation, behind a trait so the pipeline can be
/// exercised without GDAL datasets on disk.
pub trait RasterEngine: Send + Sync {
    /// Subdataset names advertised by a container format, in order. Plain
    /// rasters report none.
    fn list_subdatasets(&self, src: &Path) -> Result<Vec<String>, StageError>;

    fn raster_profile(&self, src: &Path) -> Result<RasterProfile, StageError>;

    fn read_band(&self, src: &Path) -> Result<BandData, StageError>;

    fn write_geotiff(
        &self,
        dst: &Path,
        profile: &RasterProfile,
        values: &[f32],
    ) -> Result<(), StageError>;

    /// Builds a virtual mosaic referencing `sources` at `dst`.
    fn build_virtual_mosaic(
        &self,
        sources: &[PathBuf],
        dst: &Path,
        srs: &str,
    ) -> Result<(), StageError>;

    /// Reprojects, resamples and clips `src` to `dst` in one pass.
    fn reproject(&self, src: &Path, dst: &Path, params: &WarpParams) -> Result<(), StageError>;
}

/// Vector access for the clipping boundary.
pub trait VectorEngine: Send + Sync {
    fn open_boundary(&self, path: &Path) -> Result<Boundary, PipelineError>;
}
