#![forbid(unsafe_code)]

use crate::aggregate::{AggregateReport, Aggregator};
use crate::chunk::{ChunkReader, ChunkSource};
use crate::error::Result;
use crate::estimate::{estimate_chunk_rows, SizeEstimate};
use crate::options::PipelineOptions;
use crate::profile::{profile, ColumnProfile};
use crate::recalibrate::{recalibrate, Recalibration};
use crate::types::ColumnType;
use crate::writer::{ArtifactSummary, ColumnWriter};
use serde::Serialize;
use std::path::Path;

/// How the processing pass will read the input.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChunkPlan {
    /// Byte-size estimate; `None` when a fixed chunk bound was configured.
    pub estimate: Option<SizeEstimate>,
    pub profile: ColumnProfile,
    /// Measured correction; `None` when a fixed chunk bound was configured.
    pub recalibration: Option<Recalibration>,
    pub measure_type: ColumnType,
    pub chunk_rows: usize,
}

/// Runs estimate -> profile -> recalibrate, then one processing pass.
///
/// Every stage is sequential and reads the file front to back: a line count, the
/// profiling pass, one sampled chunk, and the processing pass.
#[derive(Clone, Debug, Default)]
pub struct Pipeline {
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn source(&self, input: &Path) -> ChunkSource {
        ChunkSource::new(input, self.options.format, self.options.columns.clone())
    }

    pub fn plan(&self, input: &Path) -> Result<ChunkPlan> {
        self.options.validate()?;
        let source = self.source(input);
        let budget = self.options.memory_budget_mb;

        let (estimate, initial_rows) = match self.options.chunk_rows {
            Some(rows) => (None, rows),
            None => {
                let estimate = estimate_chunk_rows(input, budget)?;
                (Some(estimate), estimate.chunk_rows)
            }
        };

        let profile = profile(&source, initial_rows)?;
        let measure_type = profile.measure_type;

        let (recalibration, chunk_rows) = match self.options.chunk_rows {
            Some(rows) => (None, rows),
            None => {
                let recalibration = recalibrate(&source, measure_type, initial_rows, budget)?;
                (Some(recalibration), recalibration.chunk_rows)
            }
        };

        Ok(ChunkPlan {
            estimate,
            profile,
            recalibration,
            measure_type,
            chunk_rows,
        })
    }

    pub fn reader(&self, input: &Path, plan: &ChunkPlan) -> Result<ChunkReader> {
        self.source(input).reader(plan.measure_type, plan.chunk_rows)
    }

    /// Exact per-key min/mean/max over `input`.
    ///
    /// Any error discards the partial table.
    pub fn aggregate(&self, input: &Path) -> Result<AggregateReport> {
        let plan = self.plan(input)?;
        let mut aggregator = Aggregator::new();
        aggregator.consume(self.reader(input, &plan)?)?;

        let report = aggregator.finish();
        log::info!(
            "aggregated {} rows into {} keys over {} chunks",
            report.rows,
            report.keys.len(),
            report.chunks
        );
        Ok(report)
    }

    /// Convert `input` into a Parquet artifact at `output`.
    ///
    /// Not atomic: on error the artifact handle is released but `output` may be left
    /// behind without a footer.
    pub fn convert(&self, input: &Path, output: &Path) -> Result<ArtifactSummary> {
        let plan = self.plan(input)?;
        let mut writer = ColumnWriter::new(output, plan.chunk_rows);
        writer.consume(self.reader(input, &plan)?)?;
        writer.finish()
    }
}
