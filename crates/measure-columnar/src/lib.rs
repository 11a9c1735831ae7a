//! Bounded-memory chunked ingestion for `(key, measurement)` text files.
//!
//! This crate focuses on:
//! - Sizing chunks from a memory budget (byte-size heuristic, then a measured recalibration).
//! - Profiling the measurement column once to pick the narrowest lossless numeric width.
//! - Streaming chunks as Arrow record batches (never more than one chunk resident).
//! - Two consumers: exact per-key min/mean/max aggregation, and a GZIP Parquet artifact
//!   with one row group per chunk.
//!
//! Peak memory is larger than the configured budget: the budget bounds the dominant term
//! (one materialized chunk), not I/O buffers, Arrow builder growth, Parquet encoder state or
//! the aggregation table.
//!
//! Output artifacts are not written atomically. If a run fails after the artifact was
//! created the file handle is released but the contents are incomplete; callers that need
//! all-or-nothing output should write to a temporary path and rename on success.

#![forbid(unsafe_code)]

mod aggregate;
mod artifact;
mod chunk;
mod error;
mod estimate;
mod lines;
mod options;
mod pipeline;
mod profile;
mod recalibrate;
mod stats;
mod types;
mod writer;

pub use crate::aggregate::{AggregateReport, Aggregator, KeySummary, RunningStat};
pub use crate::artifact::ArtifactReader;
pub use crate::chunk::{Chunk, ChunkReader, ChunkSource};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::estimate::{
    count_lines, estimate_chunk_rows, rows_for_budget, SizeEstimate, BYTES_PER_MB,
    MIN_CHUNK_ROWS, OVERHEAD_FACTOR, ROW_GRANULARITY,
};
pub use crate::options::{ColumnNames, InputFormat, PipelineOptions};
pub use crate::pipeline::{ChunkPlan, Pipeline};
pub use crate::profile::{profile, ColumnProfile};
pub use crate::recalibrate::{recalibrate, rescale_chunk_rows, Recalibration};
pub use crate::stats::ColumnStats;
pub use crate::types::{ColumnType, Number};
pub use crate::writer::{ArtifactSummary, ColumnSummary, ColumnWriter};
