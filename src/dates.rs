use std::collections::BTreeMap;

use crate::inventory::{DateKey, SwathFile};

/// All swaths sharing one date token, plus whether the date takes part in
/// the run.
#[derive(Debug, Clone)]
pub struct AcquisitionDate {
    pub date: DateKey,
    pub swaths: Vec<SwathFile>,
    pub qualifies: bool,
}

/// Buckets swaths by date token, ascending.
///
/// When more than one tile is required, a date qualifies as soon as its
/// token appears at least twice across the inventory. The rule counts date
/// tokens, not distinct tiles: two swaths of the same tile on the same day
/// qualify that date even though a tile is then genuinely missing. With a
/// single required tile every date qualifies.
///
/// Pure with respect to its inputs; callers decide how to report the dates
/// that do not qualify.
pub fn group(swaths: Vec<SwathFile>, required_tile_count: usize) -> Vec<AcquisitionDate> {
    let mut buckets: BTreeMap<DateKey, Vec<SwathFile>> = BTreeMap::new();
    for swath in swaths {
        buckets.entry(swath.date.clone()).or_default().push(swath);
    }

    buckets
        .into_iter()
        .map(|(date, swaths)| {
            let qualifies = required_tile_count <= 1 || swaths.len() >= 2;
            AcquisitionDate {
                date,
                swaths,
                qualifies,
            }
        })
        .collect()
}
