#![forbid(unsafe_code)]

use crate::error::{Error, Result};
use encoding_rs::{Encoding, UTF_8};

/// Shape of the delimited input text.
#[derive(Debug, Clone, Copy)]
pub struct InputFormat {
    pub delimiter: char,
    pub encoding: &'static Encoding,
    /// Skip the first line and take the column names from it.
    pub has_header: bool,
}

impl Default for InputFormat {
    fn default() -> Self {
        Self {
            delimiter: ';',
            encoding: UTF_8,
            has_header: false,
        }
    }
}

impl InputFormat {
    /// Resolve a WHATWG encoding label such as `utf-8`, `latin1` or `windows-1252`.
    pub fn encoding_for_label(label: &str) -> Result<&'static Encoding> {
        let encoding = Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| Error::InvalidOptions(format!("unknown encoding label `{label}`")))?;
        if !encoding.is_ascii_compatible() {
            return Err(Error::InvalidOptions(format!(
                "encoding `{}` is not ASCII-compatible; lines cannot be split on `\\n`",
                encoding.name()
            )));
        }
        Ok(encoding)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if matches!(self.delimiter, '\n' | '\r') {
            return Err(Error::InvalidOptions(
                "delimiter must not be a line terminator".to_owned(),
            ));
        }
        if !self.encoding.is_ascii_compatible() {
            return Err(Error::InvalidOptions(format!(
                "encoding `{}` is not ASCII-compatible",
                self.encoding.name()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnNames {
    pub key: String,
    pub measure: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            key: "station".to_owned(),
            measure: "measure".to_owned(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub format: InputFormat,
    /// Column names used when the input has no header.
    pub columns: ColumnNames,
    /// Budget for one resident chunk, in MiB.
    pub memory_budget_mb: u64,
    /// Use this chunk bound as-is instead of estimating and recalibrating one.
    pub chunk_rows: Option<usize>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            format: InputFormat::default(),
            columns: ColumnNames::default(),
            memory_budget_mb: 100,
            chunk_rows: None,
        }
    }
}

impl PipelineOptions {
    pub(crate) fn validate(&self) -> Result<()> {
        self.format.validate()?;
        if self.memory_budget_mb == 0 {
            return Err(Error::InvalidOptions(
                "memory budget must be a positive number of MiB".to_owned(),
            ));
        }
        if self.chunk_rows == Some(0) {
            return Err(Error::InvalidOptions(
                "chunk row bound must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}
