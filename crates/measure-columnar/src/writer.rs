#![forbid(unsafe_code)]

use crate::chunk::{describe_schema, Chunk};
use crate::error::{Error, Result};
use crate::types::ColumnType;
use arrow_schema::{Schema, SchemaRef};
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel};
use parquet::file::properties::WriterProperties;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub column_type: Option<ColumnType>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ArtifactSummary {
    pub path: PathBuf,
    pub rows: u64,
    /// One block (Parquet row group) per written chunk.
    pub blocks: usize,
    pub columns: Vec<ColumnSummary>,
}

pub(crate) fn column_summaries(schema: &Schema) -> Vec<ColumnSummary> {
    schema
        .fields()
        .iter()
        .map(|field| ColumnSummary {
            name: field.name().clone(),
            column_type: ColumnType::from_arrow(field.data_type()),
        })
        .collect()
}

struct OpenArtifact {
    schema: SchemaRef,
    writer: ArrowWriter<File>,
}

/// Appends chunks to a single GZIP-compressed Parquet file, one row group per chunk.
///
/// The file is created when the first chunk arrives and that chunk's schema becomes the
/// artifact schema. Dropping the writer without [`ColumnWriter::finish`] closes the file
/// without a footer; such a file is not readable.
pub struct ColumnWriter {
    path: PathBuf,
    block_rows: usize,
    artifact: Option<OpenArtifact>,
    rows: u64,
    blocks: usize,
}

impl ColumnWriter {
    /// `block_rows` is the largest chunk that will be written; it caps the row group size
    /// so a chunk is never split across row groups.
    pub fn new(path: impl AsRef<Path>, block_rows: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            block_rows: block_rows.max(1),
            artifact: None,
            rows: 0,
            blocks: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Schema captured from the first chunk, once one has been written.
    pub fn schema(&self) -> Option<SchemaRef> {
        self.artifact.as_ref().map(|a| a.schema.clone())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn blocks(&self) -> usize {
        self.blocks
    }

    fn writer_properties(&self, first_chunk_rows: usize) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(Compression::GZIP(GzipLevel::default()))
            .set_max_row_group_size(self.block_rows.max(first_chunk_rows))
            .build()
    }

    fn open(&mut self, chunk: &Chunk) -> Result<&mut OpenArtifact> {
        let artifact = match self.artifact.take() {
            Some(artifact) => artifact,
            None => {
                let file = File::create(&self.path).map_err(|source| Error::Artifact {
                    path: self.path.clone(),
                    action: "create",
                    source,
                })?;
                let schema = chunk.schema();
                let props = self.writer_properties(chunk.num_rows());
                let writer = ArrowWriter::try_new(file, schema.clone(), Some(props)).map_err(
                    |source| Error::Parquet {
                        path: self.path.clone(),
                        action: "open",
                        source,
                    },
                )?;
                log::info!(
                    "opened artifact `{}` with schema {}",
                    self.path.display(),
                    describe_schema(&schema)
                );
                OpenArtifact { schema, writer }
            }
        };
        Ok(self.artifact.insert(artifact))
    }

    /// Append one chunk as its own row group.
    pub fn write_chunk(&mut self, chunk: &Chunk) -> Result<()> {
        let path = self.path.clone();
        let artifact = self.open(chunk)?;

        let schema = chunk.schema();
        if schema.as_ref() != artifact.schema.as_ref() {
            return Err(Error::SchemaMismatch {
                expected: describe_schema(&artifact.schema),
                found: describe_schema(&schema),
            });
        }

        artifact
            .writer
            .write(chunk.batch())
            .map_err(|source| Error::Parquet {
                path: path.clone(),
                action: "append to",
                source,
            })?;
        artifact.writer.flush().map_err(|source| Error::Parquet {
            path,
            action: "flush",
            source,
        })?;

        self.rows += chunk.num_rows() as u64;
        self.blocks += 1;
        log::debug!(
            "wrote block {} ({} rows) to `{}`",
            self.blocks,
            chunk.num_rows(),
            self.path.display()
        );
        Ok(())
    }

    /// Drain `chunks` into the artifact, stopping at the first error.
    pub fn consume<I>(&mut self, chunks: I) -> Result<()>
    where
        I: IntoIterator<Item = Result<Chunk>>,
    {
        for chunk in chunks {
            self.write_chunk(&chunk?)?;
        }
        Ok(())
    }

    /// Write the footer and close the file.
    pub fn finish(mut self) -> Result<ArtifactSummary> {
        let Some(artifact) = self.artifact.take() else {
            return Err(Error::invalid_input(
                &self.path,
                "no chunks were written to the artifact",
            ));
        };
        artifact.writer.close().map_err(|source| Error::Parquet {
            path: self.path.clone(),
            action: "close",
            source,
        })?;

        log::info!(
            "closed artifact `{}`: {} rows in {} blocks",
            self.path.display(),
            self.rows,
            self.blocks
        );
        Ok(ArtifactSummary {
            columns: column_summaries(&artifact.schema),
            path: self.path,
            rows: self.rows,
            blocks: self.blocks,
        })
    }
}
