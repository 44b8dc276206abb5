//! CSV output for flagged providers
//!
//! One row per flagged provider per peer group: the provider's original
//! columns, unchanged, followed by `OUTLIER_REASONS`.

use crate::classifier::GroupVerdict;
use crate::error::{Result, ScreenError};
use crate::flag::OutlierFlag;
use std::io::Write;

/// Name of the column appended to every output row
pub const OUTLIER_REASONS_COLUMN: &str = "OUTLIER_REASONS";

/// Writes flagged rows to a CSV sink
pub struct ResultEmitter<W: Write> {
    writer: csv::Writer<W>,
    rows_written: u64,
}

impl<W: Write> ResultEmitter<W> {
    /// Create an emitter and write the header row
    ///
    /// `header` is the input header; `OUTLIER_REASONS` is appended to it.
    pub fn new(inner: W, header: &[String]) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(false)
            .from_writer(inner);
        writer.write_record(
            header
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(OUTLIER_REASONS_COLUMN)),
        )?;

        Ok(Self {
            writer,
            rows_written: 0,
        })
    }

    /// Write one flagged provider
    pub fn emit_flag(&mut self, flag: &OutlierFlag) -> Result<()> {
        debug_assert!(!flag.reasons.is_empty());
        let reasons = flag.reasons.to_string();
        self.writer.write_record(
            flag.row
                .columns
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(reasons.as_str())),
        )?;
        self.rows_written += 1;
        Ok(())
    }

    /// Write every flag of a group, in the group's provider order
    pub fn emit_group(&mut self, verdict: &GroupVerdict) -> Result<()> {
        for flag in &verdict.flags {
            self.emit_flag(flag)?;
        }
        Ok(())
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flush and hand back the underlying writer
    pub fn into_inner(self) -> Result<W> {
        self.writer.into_inner().map_err(|e| {
            let err = e.error();
            ScreenError::Io(std::io::Error::new(err.kind(), err.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flag::ReasonSet;
    use crate::metrics::Metric;
    use crate::record::{ClaimRecord, ClaimRow, PeerGroupKey};

    fn flag(columns: &[&str], reasons: &[Metric]) -> OutlierFlag {
        let record = ClaimRecord::new("P1", "99213", "2025-01", 1, 1.0, 1);
        OutlierFlag {
            key: PeerGroupKey::new("99213", "2025-01"),
            reasons: reasons.iter().copied().collect::<ReasonSet>(),
            row: ClaimRow::new(record, columns.iter().map(|s| s.to_string()).collect(), 1),
        }
    }

    fn header(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_header_gets_reasons_column() {
        let emitter = ResultEmitter::new(Vec::new(), &header(&["A", "B"])).unwrap();
        let out = String::from_utf8(emitter.into_inner().unwrap()).unwrap();
        assert_eq!(out, "A,B,OUTLIER_REASONS\n");
    }

    #[test]
    fn test_multi_reason_field_is_quoted() {
        let mut emitter = ResultEmitter::new(Vec::new(), &header(&["A", "B"])).unwrap();
        emitter
            .emit_flag(&flag(
                &["1003000126", "00123.50"],
                &[Metric::PaidPerClaim, Metric::TotalPaid],
            ))
            .unwrap();
        emitter
            .emit_flag(&flag(&["2", "7"], &[Metric::UniqueBeneficiaries]))
            .unwrap();
        assert_eq!(emitter.rows_written(), 2);

        let out = String::from_utf8(emitter.into_inner().unwrap()).unwrap();
        assert_eq!(
            out,
            "A,B,OUTLIER_REASONS\n\
             1003000126,00123.50,\"high_total_paid,high_paid_per_claim\"\n\
             2,7,high_unique_beneficiaries\n"
        );
    }

    #[test]
    fn test_original_text_preserved() {
        let mut emitter = ResultEmitter::new(Vec::new(), &header(&["NAME", "PAID"])).unwrap();
        emitter
            .emit_flag(&flag(&["Smith, Jane", "1e3"], &[Metric::TotalPaid]))
            .unwrap();
        let out = String::from_utf8(emitter.into_inner().unwrap()).unwrap();
        assert!(out.contains("\"Smith, Jane\",1e3,high_total_paid\n"));
    }
}
