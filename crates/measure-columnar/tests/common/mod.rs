#![allow(dead_code)]

use measure_columnar::{ChunkSource, ColumnNames, InputFormat, PipelineOptions};
use std::path::{Path, PathBuf};

pub fn write_input(dir: &Path, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write input");
    path
}

pub fn fixed_chunks(chunk_rows: usize) -> PipelineOptions {
    PipelineOptions {
        chunk_rows: Some(chunk_rows),
        ..PipelineOptions::default()
    }
}

pub fn source(path: &Path) -> ChunkSource {
    ChunkSource::new(path, InputFormat::default(), ColumnNames::default())
}

/// Deterministic station data: `rows` lines over `stations` keys, one decimal place.
pub fn station_lines(rows: usize, stations: usize) -> String {
    let mut out = String::new();
    let mut state: u64 = 0x2545F4914F6CDD1D;
    for i in 0..rows {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let tenths = (state % 1999) as i64 - 999;
        let sign = if tenths < 0 { "-" } else { "" };
        let abs = tenths.unsigned_abs();
        out.push_str(&format!(
            "Station {:03};{sign}{}.{}\n",
            i % stations,
            abs / 10,
            abs % 10
        ));
    }
    out
}
