#![forbid(unsafe_code)]

use crate::chunk::ChunkSource;
use crate::error::{Error, Result};
use crate::stats::{ColumnStats, RangeTracker};
use crate::types::ColumnType;
use serde::Serialize;

/// Result of the profiling pass over the measurement column.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnProfile {
    /// Narrowest type that is lossless for every value in the file.
    pub measure_type: ColumnType,
    /// Candidate type of each profiled chunk, in file order.
    pub chunk_types: Vec<ColumnType>,
    pub stats: ColumnStats,
}

/// Stream the whole file once in chunks of `chunk_rows` records and pick the measure type.
///
/// Each chunk proposes the narrowest type for its own range; the proposals are folded with
/// [`ColumnType::promote`] so the result holds the global range. Only one chunk's range
/// tracker is alive at a time.
pub fn profile(source: &ChunkSource, chunk_rows: usize) -> Result<ColumnProfile> {
    if chunk_rows == 0 {
        return Err(Error::InvalidOptions(
            "chunk row bound must be positive".to_owned(),
        ));
    }

    let mut stats = ColumnStats::default();
    let mut chunk_types = Vec::new();
    let mut measure_type: Option<ColumnType> = None;
    let mut tracker = RangeTracker::default();

    let mut finish_chunk = |tracker: &mut RangeTracker| {
        let done = std::mem::take(tracker);
        if let Some(candidate) = done.candidate() {
            log::debug!(
                "profiled chunk {} ({} rows) as {candidate}",
                chunk_types.len() + 1,
                done.rows()
            );
            chunk_types.push(candidate);
            measure_type = Some(measure_type.map_or(candidate, |t| t.promote(candidate)));
            done.merge_into(&mut stats);
        }
    };

    for record in source.records()? {
        let record = record?;
        tracker.push(record.measure);
        if tracker.rows() as usize >= chunk_rows {
            finish_chunk(&mut tracker);
        }
    }
    finish_chunk(&mut tracker);

    let Some(measure_type) = measure_type else {
        return Err(Error::invalid_input(&source.path, "input contains no records"));
    };
    stats.column_type = Some(measure_type);

    log::info!(
        "profiled `{}`: {} rows in {} chunks, measure type {measure_type}, range {:?}..={:?}",
        source.path.display(),
        stats.row_count,
        chunk_types.len(),
        stats.min,
        stats.max
    );
    Ok(ColumnProfile {
        measure_type,
        chunk_types,
        stats,
    })
}
