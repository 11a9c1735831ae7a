#![forbid(unsafe_code)]

use crate::error::{Error, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// In-memory cost of a parsed row relative to its size on disk.
pub const OVERHEAD_FACTOR: f64 = 3.5;

/// Chunk bounds are rounded down to a multiple of this many rows.
pub const ROW_GRANULARITY: usize = 10_000;

/// Smallest chunk bound the estimator or the recalibration will produce.
pub const MIN_CHUNK_ROWS: usize = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SizeEstimate {
    pub file_size_bytes: u64,
    pub line_count: u64,
    pub chunk_rows: usize,
}

/// Count physical lines. A final line without a trailing `\n` still counts.
pub fn count_lines(path: &Path) -> Result<u64> {
    let file = File::open(path).map_err(|source| Error::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::with_capacity(1 << 20, file);
    let mut lines = 0u64;
    let mut last = b'\n';
    loop {
        let buf = reader.fill_buf().map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let Some(&tail) = buf.last() else {
            break;
        };
        lines += buf.iter().filter(|&&b| b == b'\n').count() as u64;
        last = tail;
        let len = buf.len();
        reader.consume(len);
    }
    if last != b'\n' {
        lines += 1;
    }
    Ok(lines)
}

/// Rows per chunk that fit `memory_budget_mb` given the file's average bytes per row.
///
/// Rounded down to [`ROW_GRANULARITY`] and never below [`MIN_CHUNK_ROWS`].
pub fn rows_for_budget(file_size_bytes: u64, line_count: u64, memory_budget_mb: u64) -> usize {
    if file_size_bytes == 0 || line_count == 0 {
        return MIN_CHUNK_ROWS;
    }
    let bytes_per_row = file_size_bytes as f64 / line_count as f64;
    let budget_bytes = memory_budget_mb.saturating_mul(BYTES_PER_MB) as f64;
    round_rows(budget_bytes / (bytes_per_row * OVERHEAD_FACTOR))
}

pub(crate) fn round_rows(rows: f64) -> usize {
    let granules = (rows / ROW_GRANULARITY as f64).floor();
    // `as` saturates, and maps NaN to 0.
    let rows = (granules as usize).saturating_mul(ROW_GRANULARITY);
    rows.max(MIN_CHUNK_ROWS)
}

/// First-pass chunk bound from file size and line count alone.
pub fn estimate_chunk_rows(path: &Path, memory_budget_mb: u64) -> Result<SizeEstimate> {
    if memory_budget_mb == 0 {
        return Err(Error::InvalidOptions(
            "memory budget must be a positive number of MiB".to_owned(),
        ));
    }
    let metadata = std::fs::metadata(path).map_err(|source| Error::Open {
        path: path.to_path_buf(),
        source,
    })?;
    if !metadata.is_file() {
        return Err(Error::invalid_input(path, "not a regular file"));
    }
    let file_size_bytes = metadata.len();
    if file_size_bytes == 0 {
        return Err(Error::invalid_input(path, "file is empty"));
    }

    let line_count = count_lines(path)?;
    let chunk_rows = rows_for_budget(file_size_bytes, line_count, memory_budget_mb);

    let row_cost = file_size_bytes as f64 / line_count as f64 * OVERHEAD_FACTOR;
    if memory_budget_mb.saturating_mul(BYTES_PER_MB) as f64 / row_cost < ROW_GRANULARITY as f64 {
        log::warn!(
            "{} MiB budget is below {} rows of `{}`; using the minimum chunk bound",
            memory_budget_mb,
            ROW_GRANULARITY,
            path.display()
        );
    }

    log::info!(
        "estimated {} rows per chunk for `{}` ({} bytes, {} lines, {} MiB budget)",
        chunk_rows,
        path.display(),
        file_size_bytes,
        line_count,
        memory_budget_mb
    );
    Ok(SizeEstimate {
        file_size_bytes,
        line_count,
        chunk_rows,
    })
}
