use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Serialize, Serializer};
use walkdir::WalkDir;

/// Year plus day-of-year token as it appears in swath filenames, e.g. `2015121`.
///
/// Kept as the raw 7-digit string: grouping and ordering work on the token
/// itself, and fixed-width tokens sort chronologically as plain strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(String);

impl DateKey {
    pub fn parse(token: &str) -> Option<DateKey> {
        if token.len() == 7 && token.bytes().all(|b| b.is_ascii_digit()) {
            Some(DateKey(token.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn year_str(&self) -> &str {
        &self.0[..4]
    }

    /// Calendar date for the token, when the day-of-year is in range.
    pub fn to_naive_date(&self) -> Option<NaiveDate> {
        let year: i32 = self.0[..4].parse().ok()?;
        let ordinal: u32 = self.0[4..].parse().ok()?;
        NaiveDate::from_yo_opt(year, ordinal)
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sinusoidal grid tile, e.g. `h09v04`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId {
    pub h: u8,
    pub v: u8,
}

fn tile_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^h(\d{2})v(\d{2})$").unwrap())
}

impl TileId {
    pub fn parse(segment: &str) -> Option<TileId> {
        let captures = tile_pattern().captures(segment)?;
        let h = captures.get(1)?.as_str().parse().ok()?;
        let v = captures.get(2)?.as_str().parse().ok()?;
        Some(TileId { h, v })
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{:02}v{:02}", self.h, self.v)
    }
}

impl Serialize for TileId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("expected at least 6 dot-separated segments, found {0}")]
    TooFewSegments(usize),
    #[error("date token {0:?} is not a 7-digit year and day-of-year")]
    BadDateToken(String),
    #[error("no hHHvVV tile segment")]
    NoTileId,
    #[error("file name is not valid UTF-8")]
    NotUtf8,
}

/// One swath file on disk, with the fields recovered from its name.
#[derive(Debug, Clone)]
pub struct SwathFile {
    pub path: PathBuf,
    pub product: String,
    pub date: DateKey,
    pub tile: TileId,
    segments: Vec<String>,
}

impl SwathFile {
    /// Splits a filename of the form
    /// `<product>.A<yyyyddd>.hHHvVV.<version>.<timestamp>.<ext>` into its
    /// parts. The leading `A` on the date token is optional, and the tile
    /// segment is searched for rather than pinned to the third position.
    pub fn parse(path: &Path) -> Result<SwathFile, ParseError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or(ParseError::NotUtf8)?;

        let segments: Vec<String> = name.split('.').map(str::to_string).collect();
        if segments.len() < 6 {
            return Err(ParseError::TooFewSegments(segments.len()));
        }

        let token = segments[1].strip_prefix('A').unwrap_or(&segments[1]);
        let date =
            DateKey::parse(token).ok_or_else(|| ParseError::BadDateToken(segments[1].clone()))?;

        let tile = segments[2..]
            .iter()
            .find_map(|segment| TileId::parse(segment))
            .ok_or(ParseError::NoTileId)?;

        Ok(SwathFile {
            path: path.to_path_buf(),
            product: segments[0].clone(),
            date,
            tile,
            segments,
        })
    }

    /// Filename without its extension, used to name derived rasters.
    pub fn stem(&self) -> String {
        self.segments[..self.segments.len() - 1].join(".")
    }
}

/// Walks the input directories and parses every file with the expected
/// extension. Files whose names do not parse are logged and skipped; the
/// second element of the return value counts them.
pub fn scan(roots: &[PathBuf], extension: &str) -> (Vec<SwathFile>, usize) {
    let mut swaths = Vec::new();
    let mut skipped = 0;

    for root in roots {
        for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let wanted = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(extension));
            if !wanted {
                continue;
            }

            match SwathFile::parse(path) {
                Ok(swath) => swaths.push(swath),
                Err(err) => {
                    log::warn!("skipping {}: {}", path.display(), err);
                    skipped += 1;
                }
            }
        }
    }

    // Path order keeps reruns deterministic whatever the walk returned.
    swaths.sort_by(|a, b| a.path.cmp(&b.path));

    (swaths, skipped)
}
