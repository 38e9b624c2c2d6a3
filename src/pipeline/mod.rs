pub mod layout;

use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use crate::config::RunConfig;
use crate::convert;
use crate::dates::{self, AcquisitionDate};
use crate::error::{DateExclusion, PipelineError, StageError};
use crate::inventory::{self, DateKey};
use crate::mosaic;
use crate::raster::{RasterEngine, VectorEngine, WarpParams};
use crate::samples::{self, DateTable};
use crate::series::{self, TimeSeries};
use crate::warp;

use layout::OutputLayout;

/// Shared switch that stops a run at the next stage boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> CancelFlag {
        CancelFlag::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// What a finished run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub table_path: PathBuf,
    pub dates: Vec<DateKey>,
    pub excluded: Vec<DateExclusion>,
    pub rows: usize,
    pub skipped_files: usize,
}

/// Drives the swath-to-table run: inventory, grouping, then the per-date
/// convert/mosaic/warp/flatten stages in parallel, and finally the
/// assembly of the wide table once every date has finished.
pub struct Pipeline<'a> {
    config: &'a RunConfig,
    raster: &'a dyn RasterEngine,
    vector: &'a dyn VectorEngine,
    cancel: CancelFlag,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a RunConfig,
        raster: &'a dyn RasterEngine,
        vector: &'a dyn VectorEngine,
    ) -> Pipeline<'a> {
        Pipeline {
            config,
            raster,
            vector,
            cancel: CancelFlag::new(),
        }
    }

    /// Handle for cancelling this run from another thread.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn run(&self) -> Result<RunSummary, PipelineError> {
        let (swaths, skipped_files) = inventory::scan(
            self.config.input_dirs(),
            self.config.raster_extension(),
        );
        log::info!(
            "inventoried {} swath files ({} skipped)",
            swaths.len(),
            skipped_files
        );

        let tiles: Vec<String> = self.config.tiles().iter().map(|t| t.to_string()).collect();
        log::debug!(
            "grouping by date token, {} tiles of interest ({})",
            tiles.len(),
            tiles.join(", ")
        );
        let grouped = dates::group(swaths, self.config.required_tile_count());

        let mut excluded: Vec<DateExclusion> = Vec::new();
        let mut qualifying: Vec<AcquisitionDate> = Vec::new();
        for date in grouped {
            if date.qualifies {
                qualifying.push(date);
            } else {
                log::debug!("{} excluded: date token seen only once", date.date);
                excluded.push(DateExclusion::incomplete(date.date));
            }
        }
        log::info!(
            "{} qualifying dates, {} excluded by the tile rule",
            qualifying.len(),
            excluded.len()
        );

        let Some(probe) = qualifying.first().and_then(|date| date.swaths.first()) else {
            return Err(PipelineError::NothingToAssemble);
        };

        let boundary = self.vector.open_boundary(self.config.boundary())?;
        log::debug!(
            "boundary {} in {}, extent {:?}",
            boundary.path.display(),
            boundary.srs,
            boundary.extent
        );

        let resolution = convert::probe_resolution(self.raster, probe).map_err(|source| {
            PipelineError::ResolutionProbe {
                path: probe.path.clone(),
                source,
            }
        })?;
        log::info!(
            "native {} resolution {} x {} from {}",
            probe.product,
            resolution.x,
            resolution.y,
            probe.path.display()
        );

        let layout = OutputLayout::new(self.config.output_dir());
        layout.ensure_root()?;
        serde_json::to_writer_pretty(File::create(layout.inputs_path())?, self.config)?;

        let params = WarpParams {
            target_srs: boundary.srs.clone(),
            resolution,
            nodata: self.config.nodata(),
            cutline: boundary.path.clone(),
            cutline_blend_px: self.config.cutline_blend_px(),
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers().unwrap_or(0))
            .build()?;

        let mut results: Vec<(DateKey, Result<DateTable, StageError>)> = pool.install(|| {
            qualifying
                .par_iter()
                .map(|date| (date.date.clone(), self.process_date(date, &layout, &params)))
                .collect()
        });

        // Assembly barrier: whatever order the workers finished in, tables
        // join in ascending date order.
        results.sort_by(|a, b| a.0.cmp(&b.0));

        if self.cancel.is_cancelled() {
            log::warn!("run cancelled, no table assembled");
            return Err(PipelineError::Cancelled);
        }

        let mut tables = Vec::new();
        for (date, result) in results {
            match result {
                Ok(table) => tables.push(table),
                Err(err) => {
                    log::warn!("{date} excluded: {err}");
                    excluded.push(DateExclusion::from_stage(date, err));
                }
            }
        }
        excluded.sort_by(|a, b| a.date.cmp(&b.date));

        let series = series::assemble(tables)?;
        let summary = self.write_series(&layout, series, excluded, skipped_files)?;

        Ok(summary)
    }

    fn write_series(
        &self,
        layout: &OutputLayout,
        series: TimeSeries,
        excluded: Vec<DateExclusion>,
        skipped_files: usize,
    ) -> Result<RunSummary, PipelineError> {
        let Some(first_date) = series.dates.first() else {
            return Err(PipelineError::NothingToAssemble);
        };
        let table_path = layout.series_path(first_date.year_str());

        series.write_csv(&table_path)?;
        log::info!(
            "assembled {} cells x {} dates -> {}",
            series.rows.len(),
            series.dates.len(),
            table_path.display()
        );

        Ok(RunSummary {
            table_path,
            rows: series.rows.len(),
            dates: series.dates,
            excluded,
            skipped_files,
        })
    }

    /// Runs the per-date stages inside a fresh date directory. On any
    /// failure or cancellation the directory is discarded so no partial
    /// outputs survive.
    fn process_date(
        &self,
        date: &AcquisitionDate,
        layout: &OutputLayout,
        params: &WarpParams,
    ) -> Result<DateTable, StageError> {
        let outcome = self.checkpoint().and_then(|()| {
            layout.reset_date_dir(&date.date)?;
            self.date_stages(date, layout, params)
        });

        if outcome.is_err() {
            if let Err(err) = layout.discard_date_dir(&date.date) {
                log::warn!("could not discard outputs of {}: {}", date.date, err);
            }
        }

        outcome
    }

    fn date_stages(
        &self,
        date: &AcquisitionDate,
        layout: &OutputLayout,
        params: &WarpParams,
    ) -> Result<DateTable, StageError> {
        match date.date.to_naive_date() {
            Some(day) => log::info!("processing {} ({})", date.date, day),
            None => log::info!("processing {}", date.date),
        }
        let tiles: Vec<String> = date.swaths.iter().map(|s| s.tile.to_string()).collect();
        log::debug!("{}: swaths from {}", date.date, tiles.join(", "));

        let converted =
            convert::convert_swaths(self.raster, &layout.converted_dir(&date.date), &date.swaths)?;
        self.checkpoint()?;

        let mosaic = mosaic::build(
            self.raster,
            &date.date,
            &converted,
            &layout.mosaic_path(&date.date),
        )?;
        self.checkpoint()?;

        let clipped = warp::reproject_clip(
            self.raster,
            &mosaic,
            &layout.clipped_path(&date.date),
            params,
        )?;
        self.checkpoint()?;

        let table = samples::flatten(self.raster, &clipped)?;
        table.write_csv(&layout.table_path(&date.date))?;

        Ok(table)
    }

    fn checkpoint(&self) -> Result<(), StageError> {
        if self.cancel.is_cancelled() {
            Err(StageError::Cancelled)
        } else {
            Ok(())
        }
    }
}
