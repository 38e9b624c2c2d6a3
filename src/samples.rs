use std::path::Path;

use crate::error::StageError;
use crate::inventory::DateKey;
use crate::raster::{GeoTransform, RasterEngine};
use crate::warp::ClippedRaster;

/// One kept cell of a clipped raster. Grid position rides along so later
/// joins can verify they line up cells from the same grid, not merely the
/// same count of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct CellSample {
    /// 1-based, assigned row-major over the kept cells.
    pub id: u32,
    pub row: u32,
    pub col: u32,
    pub x: f64,
    pub y: f64,
    pub value: f32,
}

/// Samples of one date, in cell id order.
#[derive(Debug, Clone)]
pub struct DateTable {
    pub date: DateKey,
    pub samples: Vec<CellSample>,
    /// Decimal places for coordinate columns in CSV output.
    pub coord_decimals: usize,
}

/// Flattens a clipped raster to its non-nodata cells, row-major, with
/// pixel-center coordinates.
pub fn flatten(
    engine: &dyn RasterEngine,
    clipped: &ClippedRaster,
) -> Result<DateTable, StageError> {
    let band = engine.read_band(&clipped.path)?;

    let expected = clipped.rows * clipped.cols;
    if band.values.len() != expected {
        return Err(StageError::BandSize {
            path: clipped.path.clone(),
            expected,
            actual: band.values.len(),
        });
    }

    if let Some(advertised) = band.nodata {
        if advertised != clipped.nodata {
            log::debug!(
                "{} advertises nodata {} but the run uses {}",
                clipped.path.display(),
                advertised,
                clipped.nodata
            );
        }
    }

    let nodata = clipped.nodata as f32;
    let mut samples = Vec::new();
    for row in 0..clipped.rows {
        for col in 0..clipped.cols {
            let value = band.values[row * clipped.cols + col];
            if value == nodata {
                continue;
            }

            let (x, y) = clipped.geo_transform.cell_center(row, col);
            samples.push(CellSample {
                id: samples.len() as u32 + 1,
                row: row as u32,
                col: col as u32,
                x,
                y,
                value,
            });
        }
    }

    log::debug!(
        "{}: kept {} of {} cells in {}",
        clipped.path.display(),
        samples.len(),
        expected,
        clipped.projection
    );

    Ok(DateTable {
        date: clipped.date.clone(),
        samples,
        coord_decimals: coord_decimals(&clipped.geo_transform, clipped.cols, clipped.rows),
    })
}

/// Decimal places that keep coordinates exact enough without bloating the
/// CSV: six when the grid looks geographic, three for projected grids
/// measured in meters.
pub fn coord_decimals(gt: &GeoTransform, cols: usize, rows: usize) -> usize {
    let x_span = (cols as f64 * gt.pixel_width).abs();
    let y_span = (rows as f64 * gt.pixel_height).abs();
    let geographic = gt.origin_x.abs() < 180.0
        && gt.origin_y.abs() < 180.0
        && x_span < 180.0
        && y_span < 180.0;

    if geographic { 6 } else { 3 }
}

impl DateTable {
    /// Writes the per-date table: one row per kept cell with its id,
    /// coordinates and value.
    pub fn write_csv(&self, path: &Path) -> Result<(), StageError> {
        let mut writer = csv::Writer::from_path(path)?;

        writer.write_record(["cell_id", "x", "y", self.date.as_str()])?;
        for sample in &self.samples {
            writer.write_record([
                sample.id.to_string(),
                format!("{:.*}", self.coord_decimals, sample.x),
                format!("{:.*}", self.coord_decimals, sample.y),
                sample.value.to_string(),
            ])?;
        }
        writer.flush()?;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::raster::mock::{MockEngine, MockRaster};
    use crate::raster::RasterProfile;
    use approx::assert_relative_eq;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn grid(rows: usize, cols: usize) -> RasterProfile {
        RasterProfile {
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
            projection: "+proj=aea +datum=NAD83 +units=m +no_defs".to_string(),
        }
    }

    fn clipped(profile: &RasterProfile, path: &Path) -> ClippedRaster {
        ClippedRaster {
            date: DateKey::parse("2015121").unwrap(),
            path: path.to_path_buf(),
            projection: profile.projection.clone(),
            geo_transform: profile.geo_transform,
            cols: profile.cols,
            rows: profile.rows,
            nodata: -999.0,
        }
    }

    #[test]
    fn test_flatten_drops_nodata_and_numbers_row_major() {
        let engine = MockEngine::new(3, 4);
        let profile = grid(3, 4);
        let mut values: Vec<f32> = (0..12).map(|v| 270.0 + v as f32).collect();
        values[1] = -999.0;
        values[7] = -999.0;

        let path = PathBuf::from("/out/dates/2015121/clipped.tif");
        engine.add_raster(&path, MockRaster::new(profile.clone(), values));

        let table = flatten(&engine, &clipped(&profile, &path)).unwrap();

        assert_eq!(table.samples.len(), 10);
        let ids: Vec<u32> = table.samples.iter().map(|s| s.id).collect();
        assert_eq!(ids, (1..=10).collect::<Vec<u32>>());
        // Cell (0, 1) was nodata, so id 2 lands on (0, 2)
        assert_eq!((table.samples[1].row, table.samples[1].col), (0, 2));
        assert_eq!(table.samples[1].value, 272.0);
    }

    #[test]
    fn test_flatten_uses_pixel_center_coordinates() {
        let engine = MockEngine::new(2, 2);
        let profile = grid(2, 2);
        let path = PathBuf::from("/out/dates/2015121/clipped.tif");
        engine.add_raster(&path, MockRaster::new(profile.clone(), vec![1.0; 4]));

        let table = flatten(&engine, &clipped(&profile, &path)).unwrap();

        assert_relative_eq!(table.samples[0].x, 560_500.0, epsilon = 1e-6);
        assert_relative_eq!(table.samples[0].y, 5_199_500.0, epsilon = 1e-6);
        assert_relative_eq!(table.samples[3].x, 561_500.0, epsilon = 1e-6);
        assert_relative_eq!(table.samples[3].y, 5_198_500.0, epsilon = 1e-6);
    }

    #[test]
    fn test_flatten_rejects_short_bands() {
        let engine = MockEngine::new(3, 4);
        let profile = grid(3, 4);
        let path = PathBuf::from("/out/dates/2015121/clipped.tif");
        engine.add_raster(&path, MockRaster::new(profile.clone(), vec![1.0; 11]));

        let err = flatten(&engine, &clipped(&profile, &path)).unwrap_err();

        assert!(matches!(
            err,
            StageError::BandSize {
                expected: 12,
                actual: 11,
                ..
            }
        ));
    }

    #[test]
    fn test_coord_decimals_distinguish_projected_from_geographic() {
        let projected = grid(3, 4).geo_transform;
        assert_eq!(coord_decimals(&projected, 4, 3), 3);

        let geographic = GeoTransform {
            origin_x: -124.5,
            pixel_width: 0.01,
            x_rotation: 0.0,
            origin_y: 49.0,
            y_rotation: 0.0,
            pixel_height: -0.01,
        };
        assert_eq!(coord_decimals(&geographic, 100, 100), 6);
    }

    #[test]
    fn test_write_csv_golden() {
        let dir = tempdir().unwrap();
        let table = DateTable {
            date: DateKey::parse("2015121").unwrap(),
            samples: vec![
                CellSample {
                    id: 1,
                    row: 0,
                    col: 0,
                    x: 560_500.0,
                    y: 5_199_500.0,
                    value: 270.5,
                },
                CellSample {
                    id: 2,
                    row: 0,
                    col: 2,
                    x: 562_500.0,
                    y: 5_199_500.0,
                    value: 301.0,
                },
            ],
            coord_decimals: 3,
        };

        let path = dir.path().join("table.csv");
        table.write_csv(&path).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "cell_id,x,y,2015121\n\
             1,560500.000,5199500.000,270.5\n\
             2,562500.000,5199500.000,301\n"
        );
    }
}
