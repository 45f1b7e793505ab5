use anyhow::{anyhow, bail, Context, Result};
use csv::{ByteRecord, ReaderBuilder};
use std::io::Read;

/// Releases are published as `;`-separated ISO-8859-1 text.
pub const DELIMITER: u8 = b';';

/// ISO-8859-1 maps every byte to the code point of the same value.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    }
}

/// Empty fields read as null.
pub fn parse_text(raw: &str) -> Option<String> {
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

/// Nullable integer column value; anything non-numeric is an error.
pub fn parse_int(raw: &str, column: &str) -> Result<Option<i64>> {
    let cleaned = clean_str(raw);
    if cleaned.is_empty() {
        return Ok(None);
    }
    cleaned
        .parse::<i64>()
        .map(Some)
        .map_err(|_| anyhow!("column {} holds non-integer value {:?}", column, cleaned))
}

/// Streaming reader over one `;`-separated entry.
///
/// Fields stay as raw bytes until a caller asks for them, so rows that are skipped are
/// never decoded or retained. Delimiters and quotes are ASCII, which makes byte-level
/// splitting safe for ISO-8859-1 input.
pub struct CsvEntry<R: Read> {
    headers: Vec<String>,
    reader: csv::Reader<R>,
    record: ByteRecord,
    line: u64,
}

impl<R: Read> CsvEntry<R> {
    pub fn new(source: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .delimiter(DELIMITER)
            .has_headers(true)
            .flexible(true)
            .from_reader(source);
        let headers = reader
            .byte_headers()
            .context("reading CSV header")?
            .iter()
            .map(|h| clean_str(&decode_latin1(h)).to_string())
            .collect();
        Ok(Self {
            headers,
            reader,
            record: ByteRecord::new(),
            line: 0,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Locate `wanted` columns by name. Columns in `required` must be present;
    /// the others map to `None` and read as null.
    pub fn project(&self, wanted: &[&str], required: &[&str]) -> Result<Projection> {
        let mut indices = Vec::with_capacity(wanted.len());
        for name in wanted {
            let idx = self.headers.iter().position(|h| h == name);
            if idx.is_none() && required.contains(name) {
                bail!("required column {} is missing", name);
            }
            indices.push(idx);
        }
        Ok(Projection { indices })
    }

    /// Advance to the next record. The returned record is overwritten by the next call.
    pub fn next_record(&mut self) -> Result<Option<&ByteRecord>> {
        let more = self
            .reader
            .read_byte_record(&mut self.record)
            .with_context(|| format!("CSV parse error at record {}", self.line))?;
        if !more {
            return Ok(None);
        }
        self.line += 1;
        Ok(Some(&self.record))
    }

    /// Records read so far.
    pub fn records_read(&self) -> u64 {
        self.line
    }
}

/// Positions of projected columns in a header, in projection order.
pub struct Projection {
    indices: Vec<Option<usize>>,
}

impl Projection {
    /// Field `col` (projection order) of `record`, decoded; missing columns and short rows
    /// read as "".
    pub fn get(&self, record: &ByteRecord, col: usize) -> String {
        self.indices
            .get(col)
            .copied()
            .flatten()
            .and_then(|i| record.get(i))
            .map(decode_latin1)
            .unwrap_or_default()
    }
}
