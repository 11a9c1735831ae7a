#![forbid(unsafe_code)]

use crate::error::{Error, Result};
use crate::lines::RecordLines;
use crate::options::{ColumnNames, InputFormat};
use crate::types::{widen_f32, ColumnType, Number};
use arrow_array::builder::{PrimitiveBuilder, StringBuilder};
use arrow_array::cast::AsArray;
use arrow_array::types::{
    ArrowPrimitiveType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type,
    UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow_array::{ArrayRef, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One materialized slice of the input: a `Utf8` key column and a numeric measure column.
#[derive(Clone, Debug)]
pub struct Chunk {
    batch: RecordBatch,
    measure_type: ColumnType,
    first_row: u64,
}

impl Chunk {
    /// Wrap a record batch, checking it has the `(Utf8, numeric)` shape.
    ///
    /// `first_row` is the 0-based index of the batch's first record in its stream.
    pub fn new(batch: RecordBatch, first_row: u64) -> Result<Self> {
        let schema = batch.schema();
        let fields = schema.fields();
        let measure_type = match fields.len() {
            2 if fields[0].data_type() == &DataType::Utf8 => {
                ColumnType::from_arrow(fields[1].data_type()).filter(|t| t.is_numeric())
            }
            _ => None,
        };
        let Some(measure_type) = measure_type else {
            return Err(Error::SchemaMismatch {
                expected: "(utf8, <numeric>)".to_owned(),
                found: describe_schema(&schema),
            });
        };
        Ok(Self {
            batch,
            measure_type,
            first_row,
        })
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn into_batch(self) -> RecordBatch {
        self.batch
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn first_row(&self) -> u64 {
        self.first_row
    }

    pub fn measure_type(&self) -> ColumnType {
        self.measure_type
    }

    /// Deep in-memory size of the chunk's Arrow buffers (capacity, not just length).
    pub fn memory_size(&self) -> usize {
        self.batch.get_array_memory_size()
    }

    pub fn keys(&self) -> &StringArray {
        self.batch.column(0).as_string::<i32>()
    }

    pub fn measures(&self) -> &ArrayRef {
        self.batch.column(1)
    }

    /// Visit every row in order as `(key, measurement)`.
    ///
    /// `Float32` measurements are widened through their shortest decimal form, so a value
    /// read as `12.3` is reported as `12.3_f64`.
    pub fn for_each_row<'a>(&'a self, mut f: impl FnMut(&'a str, f64)) {
        let keys = self.keys();
        let measures = self.measures();

        macro_rules! visit {
            ($t:ty, $widen:expr) => {{
                let values = measures.as_primitive::<$t>().values();
                for (idx, value) in values.iter().enumerate() {
                    f(keys.value(idx), ($widen)(*value));
                }
            }};
        }

        match self.measure_type {
            ColumnType::UInt8 => visit!(UInt8Type, f64::from),
            ColumnType::UInt16 => visit!(UInt16Type, f64::from),
            ColumnType::UInt32 => visit!(UInt32Type, f64::from),
            ColumnType::UInt64 => visit!(UInt64Type, |v: u64| v as f64),
            ColumnType::Int8 => visit!(Int8Type, f64::from),
            ColumnType::Int16 => visit!(Int16Type, f64::from),
            ColumnType::Int32 => visit!(Int32Type, f64::from),
            ColumnType::Int64 => visit!(Int64Type, |v: i64| v as f64),
            ColumnType::Float32 => visit!(Float32Type, widen_f32),
            ColumnType::Float64 => visit!(Float64Type, |v: f64| v),
            // Rejected by `Chunk::new`.
            ColumnType::Utf8 => {}
        }
    }
}

pub(crate) fn describe_schema(schema: &Schema) -> String {
    let columns = schema
        .fields()
        .iter()
        .map(|field| match ColumnType::from_arrow(field.data_type()) {
            Some(t) => format!("{}: {t}", field.name()),
            None => format!("{}: {}", field.name(), field.data_type()),
        })
        .collect::<Vec<_>>();
    format!("({})", columns.join(", "))
}

pub(crate) fn chunk_schema(names: &ColumnNames, measure_type: ColumnType) -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(&names.key, DataType::Utf8, false),
        Field::new(&names.measure, measure_type.to_arrow(), false),
    ]))
}

/// Where chunks come from: one input file, how to parse it, and what to call its columns.
#[derive(Clone, Debug)]
pub struct ChunkSource {
    pub path: PathBuf,
    pub format: InputFormat,
    pub columns: ColumnNames,
}

impl ChunkSource {
    pub fn new(path: impl AsRef<Path>, format: InputFormat, columns: ColumnNames) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            format,
            columns,
        }
    }

    pub(crate) fn records(&self) -> Result<RecordLines> {
        RecordLines::open(&self.path, self.format)
    }

    pub fn reader(&self, measure_type: ColumnType, chunk_rows: usize) -> Result<ChunkReader> {
        ChunkReader::open(self.clone(), measure_type, chunk_rows)
    }
}

/// Lazy, forward-only sequence of [`Chunk`]s parsed at a fixed measure type.
///
/// Only the chunk being built is resident. Iteration stops after the first error;
/// [`ChunkReader::rewind`] restarts from the beginning of the file.
#[derive(Debug)]
pub struct ChunkReader {
    source: ChunkSource,
    measure_type: ColumnType,
    chunk_rows: usize,
    schema: SchemaRef,
    lines: RecordLines,
    rows_read: u64,
    chunks_read: usize,
    done: bool,
}

impl ChunkReader {
    pub fn open(source: ChunkSource, measure_type: ColumnType, chunk_rows: usize) -> Result<Self> {
        if !measure_type.is_numeric() {
            return Err(Error::InvalidOptions(format!(
                "measure column must be numeric, got {measure_type}"
            )));
        }
        if chunk_rows == 0 {
            return Err(Error::InvalidOptions(
                "chunk row bound must be positive".to_owned(),
            ));
        }

        let lines = source.records()?;
        let names = lines.header().unwrap_or(&source.columns);
        let schema = chunk_schema(names, measure_type);
        Ok(Self {
            source,
            measure_type,
            chunk_rows,
            schema,
            lines,
            rows_read: 0,
            chunks_read: 0,
            done: false,
        })
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn measure_type(&self) -> ColumnType {
        self.measure_type
    }

    pub fn chunk_rows(&self) -> usize {
        self.chunk_rows
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    pub fn chunks_read(&self) -> usize {
        self.chunks_read
    }

    /// Restart from the first record of the file.
    pub fn rewind(&mut self) -> Result<()> {
        self.lines = self.source.records()?;
        self.rows_read = 0;
        self.chunks_read = 0;
        self.done = false;
        Ok(())
    }

    fn read_chunk(&mut self) -> Result<Option<Chunk>> {
        let mut keys = StringBuilder::new();
        let mut measures = MeasureBuilder::new(self.measure_type);
        let mut rows = 0usize;

        while rows < self.chunk_rows {
            let Some(record) = self.lines.next().transpose()? else {
                break;
            };
            if !measures.append(record.measure) {
                return Err(Error::malformed(
                    record.line,
                    format!(
                        "measurement `{}` does not fit profiled type {}",
                        record.measure, self.measure_type
                    ),
                ));
            }
            keys.append_value(&record.key);
            rows += 1;
        }

        if rows == 0 {
            return Ok(None);
        }

        let batch = RecordBatch::try_new(
            self.schema.clone(),
            vec![Arc::new(keys.finish()), measures.finish()],
        )?;
        let chunk = Chunk {
            batch,
            measure_type: self.measure_type,
            first_row: self.rows_read,
        };
        self.rows_read += rows as u64;
        self.chunks_read += 1;
        log::debug!(
            "read chunk {} ({} rows) from {}",
            self.chunks_read,
            rows,
            self.source.path.display()
        );
        Ok(Some(chunk))
    }
}

impl Iterator for ChunkReader {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

enum MeasureBuilder {
    UInt8(PrimitiveBuilder<UInt8Type>),
    UInt16(PrimitiveBuilder<UInt16Type>),
    UInt32(PrimitiveBuilder<UInt32Type>),
    UInt64(PrimitiveBuilder<UInt64Type>),
    Int8(PrimitiveBuilder<Int8Type>),
    Int16(PrimitiveBuilder<Int16Type>),
    Int32(PrimitiveBuilder<Int32Type>),
    Int64(PrimitiveBuilder<Int64Type>),
    Float32(PrimitiveBuilder<Float32Type>),
    Float64(PrimitiveBuilder<Float64Type>),
}

impl MeasureBuilder {
    fn new(measure_type: ColumnType) -> Self {
        match measure_type {
            ColumnType::UInt8 => Self::UInt8(PrimitiveBuilder::new()),
            ColumnType::UInt16 => Self::UInt16(PrimitiveBuilder::new()),
            ColumnType::UInt32 => Self::UInt32(PrimitiveBuilder::new()),
            ColumnType::UInt64 => Self::UInt64(PrimitiveBuilder::new()),
            ColumnType::Int8 => Self::Int8(PrimitiveBuilder::new()),
            ColumnType::Int16 => Self::Int16(PrimitiveBuilder::new()),
            ColumnType::Int32 => Self::Int32(PrimitiveBuilder::new()),
            ColumnType::Int64 => Self::Int64(PrimitiveBuilder::new()),
            ColumnType::Float32 => Self::Float32(PrimitiveBuilder::new()),
            // `ChunkReader::open` rejects `Utf8`.
            ColumnType::Float64 | ColumnType::Utf8 => Self::Float64(PrimitiveBuilder::new()),
        }
    }

    /// Append `value`, or return `false` if the builder's type cannot hold it exactly.
    fn append(&mut self, value: Number) -> bool {
        match self {
            Self::UInt8(b) => append_integer(b, value),
            Self::UInt16(b) => append_integer(b, value),
            Self::UInt32(b) => append_integer(b, value),
            Self::UInt64(b) => append_integer(b, value),
            Self::Int8(b) => append_integer(b, value),
            Self::Int16(b) => append_integer(b, value),
            Self::Int32(b) => append_integer(b, value),
            Self::Int64(b) => append_integer(b, value),
            Self::Float32(b) => match value.to_f32_lossless() {
                Some(v) => {
                    b.append_value(v);
                    true
                }
                None => false,
            },
            Self::Float64(b) => match value.to_f64_lossless() {
                Some(v) => {
                    b.append_value(v);
                    true
                }
                None => false,
            },
        }
    }

    fn finish(&mut self) -> ArrayRef {
        match self {
            Self::UInt8(b) => Arc::new(b.finish()),
            Self::UInt16(b) => Arc::new(b.finish()),
            Self::UInt32(b) => Arc::new(b.finish()),
            Self::UInt64(b) => Arc::new(b.finish()),
            Self::Int8(b) => Arc::new(b.finish()),
            Self::Int16(b) => Arc::new(b.finish()),
            Self::Int32(b) => Arc::new(b.finish()),
            Self::Int64(b) => Arc::new(b.finish()),
            Self::Float32(b) => Arc::new(b.finish()),
            Self::Float64(b) => Arc::new(b.finish()),
        }
    }
}

fn append_integer<T>(builder: &mut PrimitiveBuilder<T>, value: Number) -> bool
where
    T: ArrowPrimitiveType,
    T::Native: TryFrom<u64> + TryFrom<i64>,
{
    let native = match value {
        Number::UInt(v) => T::Native::try_from(v).ok(),
        Number::Int(v) => T::Native::try_from(v).ok(),
        Number::Float(_) => None,
    };
    match native {
        Some(v) => {
            builder.append_value(v);
            true
        }
        None => false,
    }
}
