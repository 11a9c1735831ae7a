#![forbid(unsafe_code)]

use crate::chunk::Chunk;
use crate::error::{Error, Result};
use crate::writer::{column_summaries, ColumnSummary};
use arrow_array::RecordBatch;
use arrow_schema::SchemaRef;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::errors::ParquetError;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Reads a finished artifact back block by block, using only its embedded schema.
pub struct ArtifactReader {
    path: PathBuf,
    schema: SchemaRef,
    block_rows: Vec<usize>,
    next_block: usize,
    rows_read: u64,
}

impl ArtifactReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let builder = ParquetRecordBatchReaderBuilder::try_new(open_file(&path)?)
            .map_err(|source| parquet_error(&path, "read", source))?;

        let schema = builder.schema().clone();
        let metadata = builder.metadata();
        let block_rows = (0..metadata.num_row_groups())
            .map(|idx| metadata.row_group(idx).num_rows().max(0) as usize)
            .collect();

        Ok(Self {
            path,
            schema,
            block_rows,
            next_block: 0,
            rows_read: 0,
        })
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn columns(&self) -> Vec<ColumnSummary> {
        column_summaries(&self.schema)
    }

    pub fn block_count(&self) -> usize {
        self.block_rows.len()
    }

    /// Row count of each block, in file order.
    pub fn block_rows(&self) -> &[usize] {
        &self.block_rows
    }

    pub fn row_count(&self) -> u64 {
        self.block_rows.iter().map(|&rows| rows as u64).sum()
    }

    fn read_block(&mut self, block: usize) -> Result<Chunk> {
        let rows = self.block_rows[block];
        let reader = ParquetRecordBatchReaderBuilder::try_new(open_file(&self.path)?)
            .and_then(|builder| {
                builder
                    .with_row_groups(vec![block])
                    .with_batch_size(rows.max(1))
                    .build()
            })
            .map_err(|source| parquet_error(&self.path, "read", source))?;

        let mut batches = reader
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|err| {
                parquet_error(&self.path, "decode", ParquetError::General(err.to_string()))
            })?;
        // `batch_size` covers the whole row group, so a block decodes to at most one batch.
        let batch = match (batches.pop(), batches.is_empty()) {
            (Some(batch), true) => batch,
            (None, _) => RecordBatch::new_empty(self.schema.clone()),
            (Some(_), false) => {
                return Err(Error::SchemaMismatch {
                    expected: "one record batch per block".to_owned(),
                    found: format!("{} record batches", batches.len() + 1),
                })
            }
        };

        let chunk = Chunk::new(batch, self.rows_read)?;
        self.rows_read += chunk.num_rows() as u64;
        Ok(chunk)
    }
}

impl Iterator for ArtifactReader {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_block >= self.block_rows.len() {
            return None;
        }
        let block = self.next_block;
        self.next_block += 1;
        let chunk = self.read_block(block);
        if chunk.is_err() {
            self.next_block = self.block_rows.len();
        }
        Some(chunk)
    }
}

fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| Error::Artifact {
        path: path.to_path_buf(),
        action: "open",
        source,
    })
}

fn parquet_error(path: &Path, action: &'static str, source: ParquetError) -> Error {
    Error::Parquet {
        path: path.to_path_buf(),
        action,
        source,
    }
}
