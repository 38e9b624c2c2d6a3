use std::path::{Path, PathBuf};

use crate::bounds::Bounds;
use crate::error::StageError;
use crate::inventory::DateKey;
use crate::raster::RasterEngine;

/// Spatial reference of the sinusoidal grid the swaths arrive in.
pub const MODIS_SINUSOIDAL: &str =
    "+proj=sinu +lon_0=0 +x_0=0 +y_0=0 +R=6371007.181 +units=m +no_defs";

/// One date's swaths gathered into a single raster input for the warp.
#[derive(Debug, Clone)]
pub struct Mosaic {
    pub date: DateKey,
    pub sources: Vec<PathBuf>,
    /// The virtual mosaic for multi-source dates, or the lone source
    /// itself; no pixels are resampled either way.
    pub raster: PathBuf,
    /// Union of the source extents on the native grid.
    pub bounds: Bounds,
}

/// Builds the warp input for one date. Dates with one converted raster
/// skip the virtual mosaic and pass that raster through untouched.
pub fn build(
    engine: &dyn RasterEngine,
    date: &DateKey,
    rasters: &[PathBuf],
    vrt_path: &Path,
) -> Result<Mosaic, StageError> {
    let first = rasters.first().ok_or(StageError::NoSources)?;

    let mut bounds = grid_bounds(engine, first)?;
    for raster in &rasters[1..] {
        bounds = bounds.union(&grid_bounds(engine, raster)?);
    }

    let raster = if rasters.len() > 1 {
        engine.build_virtual_mosaic(rasters, vrt_path, MODIS_SINUSOIDAL)?;
        log::debug!(
            "mosaicked {} rasters for {} -> {}",
            rasters.len(),
            date,
            vrt_path.display()
        );
        vrt_path.to_path_buf()
    } else {
        first.clone()
    };

    Ok(Mosaic {
        date: date.clone(),
        sources: rasters.to_vec(),
        raster,
        bounds,
    })
}

fn grid_bounds(engine: &dyn RasterEngine, raster: &Path) -> Result<Bounds, StageError> {
    let profile = engine.raster_profile(raster)?;

    Ok(Bounds::from_grid(
        &profile.geo_transform,
        profile.cols,
        profile.rows,
    ))
}
