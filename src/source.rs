//! CSV claim record source
//!
//! Reads a header-bearing CSV row by row and turns each data row into a
//! [`ClaimRow`]. Rows that fail to parse come back as
//! [`ScreenError::MalformedRecord`]; wrap the source in [`SkipMalformed`] to
//! count and drop them. CSV framing and I/O errors are passed through as fatal.

use crate::config::ColumnMap;
use crate::error::{Result, ScreenError};
use crate::record::{ClaimRecord, ClaimRow};
use csv::StringRecord;
use std::fs::File;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, Copy)]
struct ColumnIndices {
    billing_provider_id: usize,
    hcpcs_code: usize,
    claim_month: usize,
    total_unique_beneficiaries: usize,
    total_claims: usize,
    total_paid: usize,
}

fn header_index(headers: &StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| ScreenError::MissingColumn(name.to_string()))
}

impl ColumnIndices {
    fn resolve(headers: &StringRecord, columns: &ColumnMap) -> Result<Self> {
        Ok(Self {
            billing_provider_id: header_index(headers, &columns.billing_provider_id)?,
            hcpcs_code: header_index(headers, &columns.hcpcs_code)?,
            claim_month: header_index(headers, &columns.claim_month)?,
            total_unique_beneficiaries: header_index(headers, &columns.total_unique_beneficiaries)?,
            total_claims: header_index(headers, &columns.total_claims)?,
            total_paid: header_index(headers, &columns.total_paid)?,
        })
    }
}

/// Parse a non-negative count; integral decimals such as `"12.0"` are accepted
pub fn parse_count(raw: &str) -> Option<u64> {
    let s = raw.trim();
    if let Ok(n) = s.parse::<u64>() {
        return Some(n);
    }
    let f = s.parse::<f64>().ok()?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 {
        Some(f as u64)
    } else {
        None
    }
}

/// Parse a finite, non-negative currency amount
pub fn parse_amount(raw: &str) -> Option<f64> {
    let f = raw.trim().parse::<f64>().ok()?;
    if f.is_finite() && f >= 0.0 {
        Some(f)
    } else {
        None
    }
}

/// Streaming CSV reader producing [`ClaimRow`]s
pub struct CsvRecordSource<R> {
    reader: csv::Reader<R>,
    header: Vec<String>,
    columns: ColumnMap,
    indices: ColumnIndices,
    buf: StringRecord,
    position: u64,
}

impl CsvRecordSource<File> {
    pub fn from_path<P: AsRef<Path>>(path: P, columns: &ColumnMap) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(file, columns)
    }
}

impl<R: Read> CsvRecordSource<R> {
    /// Open a source over any reader; fails if a required column is missing
    pub fn from_reader(rdr: R, columns: &ColumnMap) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(rdr);
        let headers = reader.headers()?.clone();
        let indices = ColumnIndices::resolve(&headers, columns)?;

        Ok(Self {
            reader,
            header: headers.iter().map(str::to_string).collect(),
            columns: columns.clone(),
            indices,
            buf: StringRecord::new(),
            position: 0,
        })
    }

    /// Source header, as written in the file
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Data rows read so far (valid or not)
    pub fn rows_read(&self) -> u64 {
        self.position
    }

    fn malformed(&self, reason: String) -> ScreenError {
        ScreenError::MalformedRecord {
            position: self.position,
            reason,
        }
    }

    fn text_field(&self, idx: usize, name: &str) -> Result<String> {
        match self.buf.get(idx).map(str::trim) {
            Some(s) if !s.is_empty() => Ok(s.to_string()),
            _ => Err(self.malformed(format!("{} is empty", name))),
        }
    }

    fn count_field(&self, idx: usize, name: &str) -> Result<u64> {
        let raw = self.buf.get(idx).unwrap_or("");
        parse_count(raw)
            .ok_or_else(|| self.malformed(format!("{} '{}' is not a non-negative count", name, raw)))
    }

    fn parse_current(&self) -> Result<ClaimRow> {
        if self.buf.len() != self.header.len() {
            return Err(self.malformed(format!(
                "expected {} fields, found {}",
                self.header.len(),
                self.buf.len()
            )));
        }

        let ix = self.indices;
        let cols = &self.columns;
        let raw_paid = self.buf.get(ix.total_paid).unwrap_or("");
        let total_paid = parse_amount(raw_paid).ok_or_else(|| {
            self.malformed(format!(
                "{} '{}' is not a non-negative amount",
                cols.total_paid, raw_paid
            ))
        })?;

        let record = ClaimRecord {
            billing_provider_id: self.text_field(ix.billing_provider_id, &cols.billing_provider_id)?,
            hcpcs_code: self.text_field(ix.hcpcs_code, &cols.hcpcs_code)?,
            claim_month: self.text_field(ix.claim_month, &cols.claim_month)?,
            total_claims: self.count_field(ix.total_claims, &cols.total_claims)?,
            total_paid,
            total_unique_beneficiaries: self
                .count_field(ix.total_unique_beneficiaries, &cols.total_unique_beneficiaries)?,
        };

        let columns = self.buf.iter().map(str::to_string).collect();
        Ok(ClaimRow::new(record, columns, self.position))
    }
}

impl<R: Read> Iterator for CsvRecordSource<R> {
    type Item = Result<ClaimRow>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_record(&mut self.buf) {
            Ok(true) => {
                self.position += 1;
                Some(self.parse_current())
            }
            Ok(false) => None,
            // The reader has already moved past the offending record
            Err(e) if matches!(e.kind(), csv::ErrorKind::Utf8 { .. }) => {
                self.position += 1;
                Some(Err(self.malformed(format!("invalid UTF-8: {}", e))))
            }
            Err(e) => Some(Err(e.into())),
        }
    }
}

/// Drops recoverable row errors, counting them
pub struct SkipMalformed<I> {
    inner: I,
    seen: u64,
    skipped: u64,
}

impl<I> SkipMalformed<I> {
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            seen: 0,
            skipped: 0,
        }
    }

    /// Rows pulled from the inner source, including skipped ones
    pub fn rows_seen(&self) -> u64 {
        self.seen
    }

    /// Rows dropped so far
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn get_ref(&self) -> &I {
        &self.inner
    }
}

impl<I> Iterator for SkipMalformed<I>
where
    I: Iterator<Item = Result<ClaimRow>>,
{
    type Item = Result<ClaimRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Ok(row) => {
                    self.seen += 1;
                    return Some(Ok(row));
                }
                Err(e) if e.is_recoverable() => {
                    self.seen += 1;
                    self.skipped += 1;
                    tracing::debug!("skipping row: {}", e);
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
