use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use measure_columnar::{
    Aggregator, ArtifactReader, ArtifactSummary, ChunkPlan, ColumnNames, ColumnSummary,
    ErrorKind, InputFormat, Pipeline, PipelineOptions,
};
use serde::Serialize;

#[derive(Debug, Parser)]
#[command(name = "measure", version)]
#[command(about = "Bounded-memory ingestion of `key;measurement` files: aggregate or convert to Parquet.")]
struct Cli {
    /// Log stage progress to stderr. `RUST_LOG` takes precedence when set.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Estimate, profile and recalibrate, then print the chunk plan.
    Plan(PlanArgs),
    /// Per-key min/mean/max over a text input, sorted by key.
    Aggregate(AggregateArgs),
    /// Write a text input to a GZIP-compressed Parquet artifact, one row group per chunk.
    Convert(ConvertArgs),
    /// Print the schema and block layout of a Parquet artifact.
    Inspect(InspectArgs),
    /// Per-key min/mean/max over a Parquet artifact produced by `convert`.
    AggregateArtifact(InspectArgs),
}

#[derive(Debug, Args)]
struct InputArgs {
    /// Delimited text input, one `key<delimiter>measurement` record per line.
    input: PathBuf,

    /// Field delimiter (a single character).
    #[arg(long, default_value_t = ';')]
    delimiter: char,

    /// Input text encoding (any ASCII-compatible WHATWG label, e.g. `latin1`).
    #[arg(long, default_value = "utf-8")]
    encoding: String,

    /// Treat the first line as a header naming the two columns.
    #[arg(long)]
    header: bool,

    /// Key column name when the input has no header.
    #[arg(long = "key-column", default_value = "station")]
    key_column: String,

    /// Measurement column name when the input has no header.
    #[arg(long = "measure-column", default_value = "measure")]
    measure_column: String,

    /// Memory budget for one chunk, in MiB.
    #[arg(long = "memory-mb", default_value_t = 100)]
    memory_mb: u64,

    /// Fixed rows per chunk. Skips size estimation and recalibration.
    #[arg(long = "chunk-rows")]
    chunk_rows: Option<usize>,
}

impl InputArgs {
    fn pipeline(&self) -> Result<Pipeline> {
        let encoding = InputFormat::encoding_for_label(&self.encoding)?;
        Ok(Pipeline::new(PipelineOptions {
            format: InputFormat {
                delimiter: self.delimiter,
                encoding,
                has_header: self.header,
            },
            columns: ColumnNames {
                key: self.key_column.clone(),
                measure: self.measure_column.clone(),
            },
            memory_budget_mb: self.memory_mb,
            chunk_rows: self.chunk_rows,
        }))
    }
}

#[derive(Debug, Args)]
struct PlanArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Emit JSON instead of text.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct AggregateArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Emit JSON instead of `key: min/mean/max` lines.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct ConvertArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Parquet artifact to create (overwritten if it exists).
    #[arg(long, short)]
    output: PathBuf,

    /// Write to a temporary file next to `--output` and rename it into place on success.
    #[arg(long)]
    atomic: bool,

    /// Emit JSON instead of text.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct InspectArgs {
    /// Parquet artifact written by `measure convert`.
    artifact: PathBuf,

    /// Emit JSON instead of text.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct InspectReport {
    path: PathBuf,
    rows: u64,
    block_rows: Vec<usize>,
    columns: Vec<ColumnSummary>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let kind = err
                .chain()
                .find_map(|cause| cause.downcast_ref::<measure_columnar::Error>())
                .map(measure_columnar::Error::kind);
            match kind {
                Some(kind) => eprintln!("error [{kind}]: {err:#}"),
                None => eprintln!("error: {err:#}"),
            }
            ExitCode::from(exit_code(kind))
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp_millis()
        .init();
}

fn exit_code(kind: Option<ErrorKind>) -> u8 {
    match kind {
        None => 1,
        Some(ErrorKind::InvalidInput) => 2,
        Some(ErrorKind::MalformedRecord) => 3,
        Some(ErrorKind::SchemaMismatch) => 4,
        Some(ErrorKind::Resource) => 5,
    }
}

fn run(command: Command) -> Result<()> {
    let start = Instant::now();
    match command {
        Command::Plan(args) => {
            let input = &args.input.input;
            let plan = args
                .input
                .pipeline()?
                .plan(input)
                .with_context(|| format!("failed to plan `{}`", input.display()))?;
            if args.json {
                print_json(&plan)?;
            } else {
                print_plan(input, &plan)?;
            }
        }
        Command::Aggregate(args) => {
            let input = &args.input.input;
            let report = args
                .input
                .pipeline()?
                .aggregate(input)
                .with_context(|| format!("failed to aggregate `{}`", input.display()))?;
            if args.json {
                print_json(&report)?;
            } else {
                print_text(&report.to_string())?;
            }
        }
        Command::Convert(args) => {
            let summary = convert(&args)?;
            if args.json {
                print_json(&summary)?;
            } else {
                print_text(&format!(
                    "wrote {} rows in {} blocks to {}\n",
                    summary.rows,
                    summary.blocks,
                    summary.path.display()
                ))?;
            }
        }
        Command::Inspect(args) => {
            let reader = ArtifactReader::open(&args.artifact)
                .with_context(|| format!("failed to inspect `{}`", args.artifact.display()))?;
            let report = InspectReport {
                path: args.artifact.clone(),
                rows: reader.row_count(),
                block_rows: reader.block_rows().to_vec(),
                columns: reader.columns(),
            };
            if args.json {
                print_json(&report)?;
            } else {
                print_inspect(&report)?;
            }
        }
        Command::AggregateArtifact(args) => {
            let mut aggregator = Aggregator::new();
            ArtifactReader::open(&args.artifact)
                .and_then(|reader| aggregator.consume(reader))
                .with_context(|| format!("failed to aggregate `{}`", args.artifact.display()))?;
            let report = aggregator.finish();
            if args.json {
                print_json(&report)?;
            } else {
                print_text(&report.to_string())?;
            }
        }
    }
    log::info!("completed in {:.2} seconds", start.elapsed().as_secs_f64());
    Ok(())
}

fn convert(args: &ConvertArgs) -> Result<ArtifactSummary> {
    let pipeline = args.input.pipeline()?;
    let input = &args.input.input;
    let context = || {
        format!(
            "failed to convert `{}` to `{}`",
            input.display(),
            args.output.display()
        )
    };

    if !args.atomic {
        return pipeline.convert(input, &args.output).with_context(context);
    }

    let dir = parent_dir_or_dot(&args.output);
    let staging = tempfile::Builder::new()
        .prefix(".measure-")
        .suffix(".parquet.tmp")
        .tempfile_in(dir)
        .with_context(|| format!("failed to create a temporary file in `{}`", dir.display()))?;

    // Dropping `staging` on error removes the partial artifact.
    let mut summary = pipeline.convert(input, staging.path()).with_context(context)?;
    std::fs::File::open(staging.path())
        .and_then(|file| file.sync_all())
        .context("failed to sync the staged artifact")?;
    staging
        .persist(&args.output)
        .with_context(|| format!("failed to move artifact into `{}`", args.output.display()))?;
    summary.path = args.output.clone();
    Ok(summary)
}

fn parent_dir_or_dot(path: &Path) -> &Path {
    // `Path::parent` is `Some("")` for a bare file name.
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

fn print_plan(input: &Path, plan: &ChunkPlan) -> Result<()> {
    let stats = &plan.profile.stats;
    let mut out = format!("input: {}\n", input.display());
    match &plan.estimate {
        Some(estimate) => out.push_str(&format!(
            "estimate: {} rows per chunk ({} bytes, {} lines)\n",
            estimate.chunk_rows, estimate.file_size_bytes, estimate.line_count
        )),
        None => out.push_str("estimate: skipped (fixed chunk rows)\n"),
    }
    let chunk_types = plan
        .profile
        .chunk_types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    out.push_str(&format!(
        "measure type: {} (from {} chunks: {})\n",
        plan.measure_type,
        chunk_types.len(),
        chunk_types.join(", ")
    ));
    out.push_str(&format!("rows: {}\n", stats.row_count));
    if let (Some(min), Some(max), Some(mean)) = (stats.min, stats.max, stats.mean()) {
        out.push_str(&format!("range: {min} ..= {max} (mean {mean:.1})\n"));
    }
    if let Some(recalibration) = &plan.recalibration {
        out.push_str(&format!(
            "sampled chunk: {} rows in {} bytes\n",
            recalibration.sampled_rows, recalibration.measured_bytes
        ));
    }
    out.push_str(&format!("chunk rows: {}\n", plan.chunk_rows));
    print_text(&out)
}

fn print_inspect(report: &InspectReport) -> Result<()> {
    let mut out = format!("artifact: {}\n", report.path.display());
    out.push_str(&format!("rows: {}\n", report.rows));
    out.push_str(&format!("blocks: {}\n", report.block_rows.len()));
    for column in &report.columns {
        let column_type = column
            .column_type
            .map(|t| t.to_string())
            .unwrap_or_else(|| "unsupported".to_owned());
        out.push_str(&format!("column {}: {column_type}\n", column.name));
    }
    for (idx, rows) in report.block_rows.iter().enumerate() {
        out.push_str(&format!("block {idx}: {rows} rows\n"));
    }
    print_text(&out)
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize report")?;
    print_text(&format!("{json}\n"))
}

fn print_text(text: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(text.as_bytes()).and_then(|()| stdout.flush()) {
        Ok(()) => Ok(()),
        // A closed pipe (e.g. `| head`) is not an error.
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err).context("failed to write to stdout"),
    }
}
