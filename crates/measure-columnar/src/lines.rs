#![forbid(unsafe_code)]

use crate::error::{Error, Result};
use crate::options::{ColumnNames, InputFormat};
use crate::types::Number;
use encoding_rs::{Encoding, UTF_8};
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

const READ_BUFFER_BYTES: usize = 256 * 1024;
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawRecord {
    pub line: u64,
    pub key: String,
    pub measure: Number,
}

/// Sequential record parser over one input file.
///
/// Yields records in file order and stops for good after the first error.
#[derive(Debug)]
pub(crate) struct RecordLines {
    path: PathBuf,
    reader: BufReader<File>,
    format: InputFormat,
    buf: Vec<u8>,
    line: u64,
    header: Option<ColumnNames>,
    failed: bool,
}

impl RecordLines {
    pub fn open(path: &Path, format: InputFormat) -> Result<Self> {
        format.validate()?;
        let file = File::open(path).map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let mut lines = Self {
            path: path.to_path_buf(),
            reader: BufReader::with_capacity(READ_BUFFER_BYTES, file),
            format,
            buf: Vec::new(),
            line: 0,
            header: None,
            failed: false,
        };
        if format.has_header {
            lines.header = lines.read_header()?;
        }
        Ok(lines)
    }

    /// Column names from the header line, when the format has one.
    pub fn header(&self) -> Option<&ColumnNames> {
        self.header.as_ref()
    }

    fn read_header(&mut self) -> Result<Option<ColumnNames>> {
        if !self.fill_line()? {
            return Ok(None);
        }
        let line = self.line;
        let text = decode(self.format.encoding, trim_line(&self.buf, line))
            .ok_or_else(|| invalid_text(line, self.format.encoding))?;
        let mut fields = text.split(self.format.delimiter);
        match (fields.next(), fields.next(), fields.next()) {
            (Some(key), Some(measure), None) => Ok(Some(ColumnNames {
                key: key.trim().to_owned(),
                measure: measure.trim().to_owned(),
            })),
            _ => Err(field_count(line, &text, self.format.delimiter)),
        }
    }

    /// Read the next physical line into `buf`. Returns `false` at end of file.
    fn fill_line(&mut self) -> Result<bool> {
        self.buf.clear();
        let read = self
            .reader
            .read_until(b'\n', &mut self.buf)
            .map_err(|source| Error::Read {
                path: self.path.clone(),
                source,
            })?;
        if read == 0 {
            return Ok(false);
        }
        self.line += 1;
        Ok(true)
    }

    fn next_record(&mut self) -> Result<Option<RawRecord>> {
        loop {
            if !self.fill_line()? {
                return Ok(None);
            }
            let line = self.line;
            let bytes = trim_line(&self.buf, line);
            if bytes.is_empty() {
                continue;
            }
            let text = decode(self.format.encoding, bytes)
                .ok_or_else(|| invalid_text(line, self.format.encoding))?;
            return parse_record(&text, self.format.delimiter, line).map(Some);
        }
    }
}

impl Iterator for RecordLines {
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_record() {
            Ok(record) => record.map(Ok),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

fn trim_line(buf: &[u8], line: u64) -> &[u8] {
    let mut bytes = buf.strip_suffix(b"\n").unwrap_or(buf);
    bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    if line == 1 {
        bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    }
    bytes
}

fn decode<'a>(encoding: &'static Encoding, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
    if encoding == UTF_8 {
        return std::str::from_utf8(bytes).ok().map(Cow::Borrowed);
    }
    encoding.decode_without_bom_handling_and_without_replacement(bytes)
}

fn invalid_text(line: u64, encoding: &'static Encoding) -> Error {
    Error::malformed(line, format!("line is not valid {} text", encoding.name()))
}

fn field_count(line: u64, text: &str, delimiter: char) -> Error {
    let found = text.split(delimiter).count();
    Error::malformed(line, format!("expected 2 fields, found {found}"))
}

pub(crate) fn parse_record(text: &str, delimiter: char, line: u64) -> Result<RawRecord> {
    let mut fields = text.split(delimiter);
    let (Some(key), Some(measure), None) = (fields.next(), fields.next(), fields.next()) else {
        return Err(field_count(line, text, delimiter));
    };
    let value = Number::parse(measure)
        .map_err(|reason| Error::malformed(line, format!("measurement `{measure}` {reason}")))?;
    Ok(RawRecord {
        line,
        key: key.to_owned(),
        measure: value,
    })
}
