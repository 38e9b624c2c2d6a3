use std::fs;
use std::io;
use std::path::PathBuf;

use crate::inventory::DateKey;

/// Output tree of one run, partitioned by date and stage:
///
/// ```text
/// <root>/
///   inputs.json
///   LST_<year>.csv
///   dates/<yyyyddd>/
///     converted/<swath>.tif
///     mosaic.vrt
///     clipped.tif
///     table.csv
/// ```
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> OutputLayout {
        OutputLayout { root: root.into() }
    }

    pub fn inputs_path(&self) -> PathBuf {
        self.root.join("inputs.json")
    }

    pub fn series_path(&self, year: &str) -> PathBuf {
        self.root.join(format!("LST_{year}.csv"))
    }

    pub fn dates_dir(&self) -> PathBuf {
        self.root.join("dates")
    }

    pub fn date_dir(&self, date: &DateKey) -> PathBuf {
        self.dates_dir().join(date.as_str())
    }

    pub fn converted_dir(&self, date: &DateKey) -> PathBuf {
        self.date_dir(date).join("converted")
    }

    pub fn mosaic_path(&self, date: &DateKey) -> PathBuf {
        self.date_dir(date).join("mosaic.vrt")
    }

    pub fn clipped_path(&self, date: &DateKey) -> PathBuf {
        self.date_dir(date).join("clipped.tif")
    }

    pub fn table_path(&self, date: &DateKey) -> PathBuf {
        self.date_dir(date).join("table.csv")
    }

    /// Creates the run skeleton; already existing directories are fine.
    pub fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(self.dates_dir())
    }

    /// Empties and recreates a date's directory so a rerun never reuses
    /// stale partial outputs.
    pub fn reset_date_dir(&self, date: &DateKey) -> io::Result<()> {
        let dir = self.date_dir(date);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }

        fs::create_dir_all(self.converted_dir(date))
    }

    /// Removes a date's directory after a failure or cancellation, so no
    /// partial outputs survive the run.
    pub fn discard_date_dir(&self, date: &DateKey) -> io::Result<()> {
        let dir = self.date_dir(date);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }

        Ok(())
    }
}
