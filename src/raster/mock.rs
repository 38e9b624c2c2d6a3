use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use crate::bounds::Bounds;
use crate::error::{PipelineError, StageError};
use crate::raster::{
    BandData, Boundary, GeoTransform, RasterEngine, RasterProfile, VectorEngine, WarpParams,
};

/// In-memory raster backing the mock.
#[derive(Debug, Clone)]
pub struct MockRaster {
    pub profile: RasterProfile,
    pub values: Vec<f32>,
    pub nodata: Option<f64>,
    pub subdatasets: Vec<String>,
}

impl MockRaster {
    pub fn new(profile: RasterProfile, values: Vec<f32>) -> MockRaster {
        MockRaster {
            profile,
            values,
            nodata: None,
            subdatasets: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WarpCall {
    pub src: PathBuf,
    pub dst: PathBuf,
    pub params: WarpParams,
}

/// Engine double holding every raster in memory.
///
/// Reprojection output does not depend on the input raster: each call
/// produces the shared warp grid, with cell values derived from the date
/// token found in the source path. That makes per-date results predictable
/// without reimplementing a warp.
pub struct MockEngine {
    rasters: Mutex<HashMap<PathBuf, MockRaster>>,
    warp_profile: RasterProfile,
    warp_masks: Mutex<HashMap<String, Vec<bool>>>,
    reproject_failures: Mutex<HashMap<String, u32>>,
    warp_calls: Mutex<Vec<WarpCall>>,
    vrt_calls: Mutex<Vec<(Vec<PathBuf>, PathBuf, String)>>,
    boundary_srs: String,
    boundary_extent: Bounds,
}

impl MockEngine {
    /// A mock whose reprojections all land on a `rows` x `cols` grid.
    pub fn new(rows: usize, cols: usize) -> MockEngine {
        let warp_profile = RasterProfile {
            cols,
            rows,
            geo_transform: GeoTransform {
                origin_x: 560_000.0,
                pixel_width: 1000.0,
                x_rotation: 0.0,
                origin_y: 5_200_000.0,
                y_rotation: 0.0,
                pixel_height: -1000.0,
            },
            projection: default_boundary_srs(),
        };

        MockEngine {
            rasters: Mutex::new(HashMap::new()),
            warp_profile,
            warp_masks: Mutex::new(HashMap::new()),
            reproject_failures: Mutex::new(HashMap::new()),
            warp_calls: Mutex::new(Vec::new()),
            vrt_calls: Mutex::new(Vec::new()),
            boundary_srs: default_boundary_srs(),
            boundary_extent: Bounds {
                xmin: 560_000.0,
                xmax: 585_000.0,
                ymin: 5_180_000.0,
                ymax: 5_200_000.0,
            },
        }
    }

    pub fn add_raster(&self, path: impl Into<PathBuf>, raster: MockRaster) {
        self.rasters.lock().unwrap().insert(path.into(), raster);
    }

    /// Registers a swath whose band sits behind an HDF-style subdataset
    /// name instead of the file path itself.
    pub fn add_swath_with_subdataset(
        &self,
        path: impl Into<PathBuf>,
        subdataset: &str,
        raster: MockRaster,
    ) {
        let path = path.into();
        let mut container = raster.clone();
        container.subdatasets = vec![subdataset.to_string()];
        self.add_raster(path, container);
        self.add_raster(PathBuf::from(subdataset), raster);
    }

    /// Makes the next `times` reprojections of the given date token fail.
    pub fn fail_reproject(&self, token: &str, times: u32) {
        self.reproject_failures
            .lock()
            .unwrap()
            .insert(token.to_string(), times);
    }

    /// Marks cells of the warp grid as nodata for one date token. Dates
    /// without an override keep every cell.
    pub fn set_warp_mask(&self, token: &str, mask: Vec<bool>) {
        assert_eq!(mask.len(), self.warp_profile.cols * self.warp_profile.rows);
        self.warp_masks.lock().unwrap().insert(token.to_string(), mask);
    }

    pub fn warp_calls(&self) -> Vec<WarpCall> {
        self.warp_calls.lock().unwrap().clone()
    }

    pub fn vrt_calls(&self) -> Vec<(Vec<PathBuf>, PathBuf, String)> {
        self.vrt_calls.lock().unwrap().clone()
    }

    pub fn warp_profile(&self) -> &RasterProfile {
        &self.warp_profile
    }

    /// Cell value the mock warp produces for a date token at a flat grid
    /// index.
    pub fn warp_value(token: &str, index: usize) -> f32 {
        token.parse::<u32>().unwrap_or(0) as f32 + index as f32
    }

    fn raster(&self, path: &Path) -> Result<MockRaster, StageError> {
        self.rasters
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| {
                StageError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no mock raster at {}", path.display()),
                ))
            })
    }
}

/// First path component that looks like a 7-digit date token.
fn token_in(path: &Path) -> Option<String> {
    path.components().rev().find_map(|component| {
        let Component::Normal(name) = component else {
            return None;
        };
        let name = name.to_str()?;
        (name.len() == 7 && name.bytes().all(|b| b.is_ascii_digit()))
            .then(|| name.to_string())
    })
}

fn default_boundary_srs() -> String {
    "+proj=aea +lat_1=43 +lat_2=48 +lat_0=34 +lon_0=-120 +x_0=600000 +y_0=0 \
     +datum=NAD83 +units=m +no_defs"
        .to_string()
}

impl RasterEngine for MockEngine {
    fn list_subdatasets(&self, src: &Path) -> Result<Vec<String>, StageError> {
        Ok(self.raster(src)?.subdatasets)
    }

    fn raster_profile(&self, src: &Path) -> Result<RasterProfile, StageError> {
        Ok(self.raster(src)?.profile)
    }

    fn read_band(&self, src: &Path) -> Result<BandData, StageError> {
        let raster = self.raster(src)?;

        Ok(BandData {
            profile: raster.profile,
            values: raster.values,
            nodata: raster.nodata,
        })
    }

    fn write_geotiff(
        &self,
        dst: &Path,
        profile: &RasterProfile,
        values: &[f32],
    ) -> Result<(), StageError> {
        self.add_raster(dst, MockRaster::new(profile.clone(), values.to_vec()));

        Ok(())
    }

    fn build_virtual_mosaic(
        &self,
        sources: &[PathBuf],
        dst: &Path,
        srs: &str,
    ) -> Result<(), StageError> {
        let first = sources.first().ok_or(StageError::NoSources)?;
        let profile = self.raster(first)?.profile;
        self.add_raster(dst, MockRaster::new(profile, Vec::new()));

        self.vrt_calls
            .lock()
            .unwrap()
            .push((sources.to_vec(), dst.to_path_buf(), srs.to_string()));

        Ok(())
    }

    fn reproject(&self, src: &Path, dst: &Path, params: &WarpParams) -> Result<(), StageError> {
        self.warp_calls.lock().unwrap().push(WarpCall {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
            params: params.clone(),
        });

        let token = token_in(src).unwrap_or_default();

        let mut failures = self.reproject_failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(&token) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StageError::ExternalTool {
                    tool: "gdalwarp".to_string(),
                    status: Some(1),
                    stderr: format!("mock warp failure for {token}"),
                });
            }
        }
        drop(failures);

        let cells = self.warp_profile.cols * self.warp_profile.rows;
        let mask = self.warp_masks.lock().unwrap().get(&token).cloned();
        let values: Vec<f32> = (0..cells)
            .map(|index| {
                let masked = mask.as_ref().is_some_and(|m| m[index]);
                if masked {
                    params.nodata as f32
                } else {
                    MockEngine::warp_value(&token, index)
                }
            })
            .collect();

        let mut raster = MockRaster::new(self.warp_profile.clone(), values);
        raster.nodata = Some(params.nodata);
        self.add_raster(dst, raster);

        Ok(())
    }
}

impl VectorEngine for MockEngine {
    fn open_boundary(&self, path: &Path) -> Result<Boundary, PipelineError> {
        Ok(Boundary {
            path: path.to_path_buf(),
            srs: self.boundary_srs.clone(),
            extent: self.boundary_extent,
        })
    }
}

/// A native-grid profile for registering input swaths.
pub fn swath_profile(cell_size: f64) -> RasterProfile {
    RasterProfile {
        cols: 4,
        rows: 4,
        geo_transform: GeoTransform {
            origin_x: -2_015_109.354,
            pixel_width: cell_size,
            x_rotation: 0.0,
            origin_y: 5_559_752.598,
            y_rotation: 0.0,
            pixel_height: -cell_size,
        },
        projection: "+proj=sinu +lon_0=0 +x_0=0 +y_0=0 +R=6371007.181 +units=m +no_defs"
            .to_string(),
    }
}
