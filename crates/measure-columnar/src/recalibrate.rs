#![forbid(unsafe_code)]

use crate::chunk::ChunkSource;
use crate::error::{Error, Result};
use crate::estimate::{round_rows, BYTES_PER_MB};
use crate::types::ColumnType;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Recalibration {
    pub sampled_rows: usize,
    pub measured_bytes: usize,
    pub chunk_rows: usize,
}

/// Rescale a sampled chunk so one chunk costs `memory_budget_mb` of resident memory.
///
/// Rounded down to the row granularity, with the same floor as the size estimate.
pub fn rescale_chunk_rows(
    sampled_rows: usize,
    measured_bytes: usize,
    memory_budget_mb: u64,
) -> usize {
    if sampled_rows == 0 || measured_bytes == 0 {
        return round_rows(0.0);
    }
    let budget_bytes = memory_budget_mb.saturating_mul(BYTES_PER_MB) as f64;
    round_rows(sampled_rows as f64 * budget_bytes / measured_bytes as f64)
}

/// Materialize the first chunk at the profiled type and derive the final chunk bound from
/// its measured footprint.
///
/// The bound is rescaled from the rows the first chunk actually holds. That is `initial_rows`
/// whenever the file has at least one full chunk; a shorter file scales from its own row count.
pub fn recalibrate(
    source: &ChunkSource,
    measure_type: ColumnType,
    initial_rows: usize,
    memory_budget_mb: u64,
) -> Result<Recalibration> {
    let mut reader = source.reader(measure_type, initial_rows)?;
    let Some(chunk) = reader.next().transpose()? else {
        return Err(Error::invalid_input(&source.path, "input contains no records"));
    };

    let sampled_rows = chunk.num_rows();
    let measured_bytes = chunk.memory_size();
    let chunk_rows = rescale_chunk_rows(sampled_rows, measured_bytes, memory_budget_mb);
    log::info!(
        "recalibrated chunk bound {initial_rows} -> {chunk_rows} rows ({sampled_rows} sampled rows use {measured_bytes} bytes at {measure_type})"
    );
    Ok(Recalibration {
        sampled_rows,
        measured_bytes,
        chunk_rows,
    })
}
