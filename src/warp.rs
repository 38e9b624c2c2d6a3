use std::path::{Path, PathBuf};

use crate::error::StageError;
use crate::inventory::DateKey;
use crate::mosaic::Mosaic;
use crate::raster::{GeoTransform, RasterEngine, WarpParams};

/// A date's mosaic reprojected onto the boundary's grid and clipped to the
/// boundary polygon.
#[derive(Debug, Clone)]
pub struct ClippedRaster {
    pub date: DateKey,
    pub path: PathBuf,
    pub projection: String,
    pub geo_transform: GeoTransform,
    pub cols: usize,
    pub rows: usize,
    pub nodata: f64,
}

/// Warps one date's mosaic to `dst`. External reprojection failures get a
/// single retry; a second failure excludes the date.
pub fn reproject_clip(
    engine: &dyn RasterEngine,
    mosaic: &Mosaic,
    dst: &Path,
    params: &WarpParams,
) -> Result<ClippedRaster, StageError> {
    log::debug!(
        "warping {} ({} sources, bounds {:?})",
        mosaic.raster.display(),
        mosaic.sources.len(),
        mosaic.bounds
    );

    if let Err(err) = engine.reproject(&mosaic.raster, dst, params) {
        if !matches!(err, StageError::ExternalTool { .. }) {
            return Err(err);
        }
        log::warn!(
            "reprojection of {} failed, retrying once: {}",
            mosaic.raster.display(),
            err
        );
        engine.reproject(&mosaic.raster, dst, params)?;
    }

    let profile = engine.raster_profile(dst)?;
    log::info!(
        "clipped {} to {} x {} cells in {}",
        mosaic.date,
        profile.rows,
        profile.cols,
        profile.projection
    );

    Ok(ClippedRaster {
        date: mosaic.date.clone(),
        path: dst.to_path_buf(),
        projection: profile.projection,
        geo_transform: profile.geo_transform,
        cols: profile.cols,
        rows: profile.rows,
        nodata: params.nodata,
    })
}
