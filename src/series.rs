use std::path::Path;

use crate::error::PipelineError;
use crate::inventory::DateKey;
use crate::samples::DateTable;

/// One cell across every assembled date.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesRow {
    pub cell_id: u32,
    pub row: u32,
    pub col: u32,
    pub x: f64,
    pub y: f64,
    /// One value per date, in the same order as `TimeSeries::dates`.
    pub values: Vec<f32>,
}

/// The run's product: every kept cell with one temperature column per
/// date.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    pub dates: Vec<DateKey>,
    pub rows: Vec<TimeSeriesRow>,
    coord_decimals: usize,
}

/// Joins per-date tables into one wide table, keyed on grid position.
///
/// The first table is canonical. Every later table must hold the same
/// number of cells, and cell by cell the same (row, col); any divergence
/// means the dates were clipped onto different grids and aborts the run
/// rather than risking values attributed to the wrong cell. Tables arrive
/// sorted by date, so the canonical table is the earliest date.
pub fn assemble(tables: Vec<DateTable>) -> Result<TimeSeries, PipelineError> {
    let mut iter = tables.into_iter();
    let first = iter.next().ok_or(PipelineError::NothingToAssemble)?;

    let mut dates = vec![first.date.clone()];
    let mut rows: Vec<TimeSeriesRow> = first
        .samples
        .iter()
        .map(|sample| TimeSeriesRow {
            cell_id: sample.id,
            row: sample.row,
            col: sample.col,
            x: sample.x,
            y: sample.y,
            values: vec![sample.value],
        })
        .collect();

    for table in iter {
        if table.samples.len() != rows.len() {
            return Err(PipelineError::SchemaMismatch {
                date: table.date.clone(),
                expected: rows.len(),
                actual: table.samples.len(),
            });
        }

        for (row, sample) in rows.iter_mut().zip(&table.samples) {
            if (sample.row, sample.col) != (row.row, row.col) {
                return Err(PipelineError::SchemaKeyMismatch {
                    date: table.date.clone(),
                    cell_id: row.cell_id,
                    row: sample.row,
                    col: sample.col,
                    canonical_row: row.row,
                    canonical_col: row.col,
                });
            }
            row.values.push(sample.value);
        }

        dates.push(table.date.clone());
    }

    Ok(TimeSeries {
        dates,
        rows,
        coord_decimals: first.coord_decimals,
    })
}

impl TimeSeries {
    /// Writes the wide table: `cell_id,x,y` then one column per date.
    pub fn write_csv(&self, path: &Path) -> Result<(), PipelineError> {
        let mut writer = csv::Writer::from_path(path)?;

        let mut header = vec![
            "cell_id".to_string(),
            "x".to_string(),
            "y".to_string(),
        ];
        header.extend(self.dates.iter().map(|d| d.to_string()));
        writer.write_record(&header)?;

        for row in &self.rows {
            let mut record = Vec::with_capacity(3 + row.values.len());
            record.push(row.cell_id.to_string());
            record.push(format!("{:.*}", self.coord_decimals, row.x));
            record.push(format!("{:.*}", self.coord_decimals, row.y));
            record.extend(row.values.iter().map(|v| v.to_string()));
            writer.write_record(&record)?;
        }
        writer.flush()?;

        Ok(())
    }
}
