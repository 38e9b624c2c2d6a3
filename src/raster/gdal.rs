use std::path::{Path, PathBuf};
use std::process::Command;

use gdal::raster::Buffer;
use gdal::vector::LayerAccess;
use gdal::{Dataset, DriverManager, Metadata};

use crate::bounds::Bounds;
use crate::error::{PipelineError, StageError};
use crate::raster::{
    BandData, Boundary, GeoTransform, RasterEngine, RasterProfile, VectorEngine, WarpParams,
};

/// Production engine: raster access through the GDAL library, mosaicking
/// and reprojection through the `gdalbuildvrt` and `gdalwarp` command line
/// tools.
#[derive(Debug, Default)]
pub struct GdalEngine;

impl GdalEngine {
    pub fn new() -> GdalEngine {
        GdalEngine
    }
}

impl RasterEngine for GdalEngine {
    fn list_subdatasets(&self, src: &Path) -> Result<Vec<String>, StageError> {
        let dataset = Dataset::open(src)?;
        let entries = dataset
            .metadata_domain("SUBDATASETS")
            .unwrap_or_default();

        Ok(subdataset_names(&entries))
    }

    fn raster_profile(&self, src: &Path) -> Result<RasterProfile, StageError> {
        let dataset = Dataset::open(src)?;

        Ok(profile_of(&dataset)?)
    }

    fn read_band(&self, src: &Path) -> Result<BandData, StageError> {
        let dataset = Dataset::open(src)?;
        let profile = profile_of(&dataset)?;

        let band = dataset.rasterband(1)?;
        let size = (profile.cols, profile.rows);
        let buffer = band.read_as::<f32>((0, 0), size, size, None)?;

        Ok(BandData {
            profile,
            values: buffer.data().to_vec(),
            nodata: band.no_data_value(),
        })
    }

    fn write_geotiff(
        &self,
        dst: &Path,
        profile: &RasterProfile,
        values: &[f32],
    ) -> Result<(), StageError> {
        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let mut dataset =
            driver.create_with_band_type::<f32, _>(dst, profile.cols, profile.rows, 1)?;

        dataset.set_geo_transform(&profile.geo_transform.to_gdal())?;
        dataset.set_projection(&profile.projection)?;

        let mut band = dataset.rasterband(1)?;
        let mut buffer = Buffer::new((profile.cols, profile.rows), values.to_vec());
        band.write((0, 0), (profile.cols, profile.rows), &mut buffer)?;

        dataset.flush_cache()?;

        Ok(())
    }

    fn build_virtual_mosaic(
        &self,
        sources: &[PathBuf],
        dst: &Path,
        srs: &str,
    ) -> Result<(), StageError> {
        run_tool("gdalbuildvrt", &vrt_args(sources, dst, srs))
    }

    fn reproject(&self, src: &Path, dst: &Path, params: &WarpParams) -> Result<(), StageError> {
        run_tool("gdalwarp", &warp_args(src, dst, params))
    }
}

impl VectorEngine for GdalEngine {
    fn open_boundary(&self, path: &Path) -> Result<Boundary, PipelineError> {
        let dataset = Dataset::open(path)?;

        let layer = dataset.layers().next().ok_or_else(|| PipelineError::Boundary {
            path: path.to_path_buf(),
            detail: "no vector layers".to_string(),
        })?;

        let srs = layer
            .spatial_ref()
            .ok_or_else(|| PipelineError::Boundary {
                path: path.to_path_buf(),
                detail: "layer carries no spatial reference".to_string(),
            })?
            .to_proj4()?;

        let envelope = layer.get_extent()?;
        let extent = Bounds::new(envelope.MinX, envelope.MaxX, envelope.MinY, envelope.MaxY)
            .map_err(|detail| PipelineError::Boundary {
                path: path.to_path_buf(),
                detail,
            })?;

        Ok(Boundary {
            path: path.to_path_buf(),
            srs,
            extent,
        })
    }
}

/// The SUBDATASETS domain lists `SUBDATASET_<n>_NAME=...` and
/// `SUBDATASET_<n>_DESC=...` pairs; only the names open as datasets.
fn subdataset_names(entries: &[String]) -> Vec<String> {
    entries
        .iter()
        .filter_map(|entry| {
            let (key, value) = entry.split_once('=')?;
            (key.starts_with("SUBDATASET_") && key.ends_with("_NAME"))
                .then(|| value.to_string())
        })
        .collect()
}

fn profile_of(dataset: &Dataset) -> Result<RasterProfile, gdal::errors::GdalError> {
    let (cols, rows) = dataset.raster_size();

    Ok(RasterProfile {
        cols,
        rows,
        geo_transform: GeoTransform::from_gdal(dataset.geo_transform()?),
        projection: dataset.projection(),
    })
}

fn run_tool(tool: &str, args: &[String]) -> Result<(), StageError> {
    log::debug!("{} {}", tool, args.join(" "));

    let output = Command::new(tool).args(args).output()?;
    if output.status.success() {
        return Ok(());
    }

    Err(StageError::ExternalTool {
        tool: tool.to_string(),
        status: output.status.code(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

fn vrt_args(sources: &[PathBuf], dst: &Path, srs: &str) -> Vec<String> {
    let mut args = vec![
        "-a_srs".to_string(),
        srs.to_string(),
        dst.display().to_string(),
    ];
    args.extend(sources.iter().map(|s| s.display().to_string()));

    args
}

fn warp_args(src: &Path, dst: &Path, params: &WarpParams) -> Vec<String> {
    vec![
        "-overwrite".to_string(),
        "-t_srs".to_string(),
        params.target_srs.clone(),
        "-tr".to_string(),
        params.resolution.x.to_string(),
        params.resolution.y.to_string(),
        "-r".to_string(),
        "bilinear".to_string(),
        "-of".to_string(),
        "GTiff".to_string(),
        "-dstnodata".to_string(),
        params.nodata.to_string(),
        "-cutline".to_string(),
        params.cutline.display().to_string(),
        "-cblend".to_string(),
        params.cutline_blend_px.to_string(),
        src.display().to_string(),
        dst.display().to_string(),
    ]
}
