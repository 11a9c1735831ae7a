mod common;

use arrow_array::{ArrayRef, Int32Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use common::{fixed_chunks, source, station_lines, write_input};
use measure_columnar::{
    Aggregator, ArtifactReader, Chunk, ColumnSummary, ColumnType, ColumnWriter, ErrorKind,
    Pipeline,
};
use parquet::basic::Compression;
use parquet::file::reader::{FileReader, SerializedFileReader};
use pretty_assertions::assert_eq;
use std::fs::File;
use std::sync::Arc;

#[test]
fn converted_artifact_reads_back_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "stations.txt", station_lines(1_000, 13));
    let output = dir.path().join("stations.parquet");

    let pipeline = Pipeline::new(fixed_chunks(400));
    let summary = pipeline.convert(&input, &output).unwrap();
    assert_eq!(summary.rows, 1_000);
    assert_eq!(summary.blocks, 3);
    assert_eq!(
        summary.columns,
        vec![
            ColumnSummary {
                name: "station".to_owned(),
                column_type: Some(ColumnType::Utf8),
            },
            ColumnSummary {
                name: "measure".to_owned(),
                column_type: Some(ColumnType::Float32),
            },
        ]
    );

    let artifact = ArtifactReader::open(&output).unwrap();
    assert_eq!(artifact.block_rows(), &[400, 400, 200]);
    assert_eq!(artifact.row_count(), 1_000);
    assert_eq!(artifact.columns(), summary.columns);

    let plan = pipeline.plan(&input).unwrap();
    let written: Vec<Chunk> = pipeline
        .reader(&input, &plan)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    let read: Vec<Chunk> = artifact.collect::<Result<_, _>>().unwrap();
    assert_eq!(written.len(), read.len());
    for (expected, actual) in written.iter().zip(&read) {
        assert_eq!(actual.first_row(), expected.first_row());
        assert_eq!(actual.measure_type(), expected.measure_type());
        assert_eq!(actual.batch().columns(), expected.batch().columns());
    }
}

#[test]
fn aggregating_the_artifact_matches_the_text_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "stations.txt", station_lines(2_500, 41));
    let output = dir.path().join("stations.parquet");

    let pipeline = Pipeline::new(fixed_chunks(700));
    pipeline.convert(&input, &output).unwrap();
    let from_text = pipeline.aggregate(&input).unwrap();

    let mut aggregator = Aggregator::new();
    aggregator.consume(ArtifactReader::open(&output).unwrap()).unwrap();
    let from_artifact = aggregator.finish();

    assert_eq!(from_artifact, from_text);
}

#[test]
fn blocks_are_gzip_compressed() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "stations.txt", station_lines(300, 5));
    let output = dir.path().join("stations.parquet");

    Pipeline::new(fixed_chunks(100)).convert(&input, &output).unwrap();

    let file = SerializedFileReader::new(File::open(&output).unwrap()).unwrap();
    let metadata = file.metadata();
    assert_eq!(metadata.num_row_groups(), 3);
    for group in metadata.row_groups() {
        for column in group.columns() {
            assert!(
                matches!(column.compression(), Compression::GZIP(_)),
                "{:?}",
                column.compression()
            );
        }
    }
}

#[test]
fn writer_rejects_a_different_schema() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "ints.txt", "a;1\nb;2\n");
    let output = dir.path().join("ints.parquet");

    let narrow = source(&input)
        .reader(ColumnType::UInt8, 10)
        .unwrap()
        .next()
        .unwrap()
        .unwrap();
    let wide = source(&input)
        .reader(ColumnType::Int64, 10)
        .unwrap()
        .next()
        .unwrap()
        .unwrap();

    let mut writer = ColumnWriter::new(&output, 10);
    writer.write_chunk(&narrow).unwrap();
    let err = writer.write_chunk(&wide).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    assert!(err.to_string().contains("measure: int64"), "{err}");

    // The rejected chunk leaves the artifact intact.
    let summary = writer.finish().unwrap();
    assert_eq!((summary.rows, summary.blocks), (2, 1));
    assert_eq!(ArtifactReader::open(&output).unwrap().row_count(), 2);
}

#[test]
fn finishing_without_chunks_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("empty.parquet");

    let writer = ColumnWriter::new(&output, 10);
    assert!(writer.schema().is_none());
    let err = writer.finish().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(!output.exists());
}

#[test]
fn unfinished_artifact_is_unreadable() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "ints.txt", "a;1\nb;2\n");
    let output = dir.path().join("partial.parquet");

    let chunk = source(&input)
        .reader(ColumnType::UInt8, 10)
        .unwrap()
        .next()
        .unwrap()
        .unwrap();
    let mut writer = ColumnWriter::new(&output, 10);
    writer.write_chunk(&chunk).unwrap();
    drop(writer);

    assert!(output.exists());
    let err = ArtifactReader::open(&output).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Resource);
}

#[test]
fn chunk_shape_is_checked() {
    let schema = Arc::new(Schema::new(vec![
        Field::new("measure", DataType::Int32, false),
        Field::new("station", DataType::Utf8, false),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int32Array::from(vec![1])) as ArrayRef,
            Arc::new(StringArray::from(vec!["a"])) as ArrayRef,
        ],
    )
    .unwrap();

    let err = Chunk::new(batch, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
}

#[test]
fn hand_built_chunks_can_be_written() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("manual.parquet");

    let schema = Arc::new(Schema::new(vec![
        Field::new("city", DataType::Utf8, false),
        Field::new("temp", DataType::Int32, false),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(vec!["Oslo", "Lima"])) as ArrayRef,
            Arc::new(Int32Array::from(vec![-4, 19])) as ArrayRef,
        ],
    )
    .unwrap();

    let mut writer = ColumnWriter::new(&output, 2);
    writer.consume([Chunk::new(batch, 0)]).unwrap();
    writer.finish().unwrap();

    let mut artifact = ArtifactReader::open(&output).unwrap();
    assert_eq!(artifact.schema().field(0).name(), "city");
    let chunk = artifact.next().unwrap().unwrap();
    assert_eq!(chunk.measure_type(), ColumnType::Int32);
    let mut rows = Vec::new();
    chunk.for_each_row(|key, value| rows.push((key.to_owned(), value)));
    assert_eq!(rows, vec![("Oslo".to_owned(), -4.0), ("Lima".to_owned(), 19.0)]);
}

#[test]
fn convert_reports_malformed_line_numbers() {
    let dir = tempfile::tempdir().unwrap();
    let mut contents = station_lines(50, 5);
    contents.push_str("Station 001;oops\n");
    let input = write_input(dir.path(), "bad.txt", contents);
    let output = dir.path().join("bad.parquet");

    let err = Pipeline::new(fixed_chunks(10))
        .convert(&input, &output)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedRecord);
    assert_eq!(err.line(), Some(51));
}
