use std::path::{Path, PathBuf};

use crate::error::StageError;
use crate::inventory::SwathFile;
use crate::raster::{RasterEngine, RunResolution};

/// Copies each swath's temperature band into a Float32 GeoTIFF under
/// `converted_dir`, named after the swath file. Georeferencing carries
/// over unchanged.
pub fn convert_swaths(
    engine: &dyn RasterEngine,
    converted_dir: &Path,
    swaths: &[SwathFile],
) -> Result<Vec<PathBuf>, StageError> {
    let mut rasters = Vec::with_capacity(swaths.len());

    for swath in swaths {
        let src = band_source(engine, swath)?;
        let band = engine.read_band(&src)?;

        let dst = converted_dir.join(format!("{}.tif", swath.stem()));
        engine.write_geotiff(&dst, &band.profile, &band.values)?;
        log::debug!("converted {} -> {}", swath.path.display(), dst.display());

        rasters.push(dst);
    }

    Ok(rasters)
}

/// Native cell size of a swath, captured once per run and applied to every
/// reprojection afterwards. The vertical size comes back as a magnitude
/// even though north-up rasters store it negated.
pub fn probe_resolution(
    engine: &dyn RasterEngine,
    swath: &SwathFile,
) -> Result<RunResolution, StageError> {
    let src = band_source(engine, swath)?;
    let gt = engine.raster_profile(&src)?.geo_transform;

    Ok(RunResolution {
        x: gt.pixel_width.abs(),
        y: gt.pixel_height.abs(),
    })
}

/// The raster holding a swath's temperature band: the first subdataset of
/// a container format, or the file itself when there are none.
fn band_source(engine: &dyn RasterEngine, swath: &SwathFile) -> Result<PathBuf, StageError> {
    let subdatasets = engine.list_subdatasets(&swath.path)?;

    Ok(match subdatasets.first() {
        Some(name) => PathBuf::from(name),
        None => swath.path.clone(),
    })
}
