//! Typed claim records and peer-group keys

use serde::Serialize;
use std::fmt;

/// One input row: a billing provider's totals for a procedure in a month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClaimRecord {
    /// Opaque billing provider identifier (NPI in Medicaid extracts)
    pub billing_provider_id: String,
    /// HCPCS procedure code
    pub hcpcs_code: String,
    /// Calendar month the claims were filed in (e.g. "2025-01")
    pub claim_month: String,
    pub total_claims: u64,
    /// Amount paid, in currency units
    pub total_paid: f64,
    pub total_unique_beneficiaries: u64,
}

impl ClaimRecord {
    pub fn new(
        billing_provider_id: impl Into<String>,
        hcpcs_code: impl Into<String>,
        claim_month: impl Into<String>,
        total_claims: u64,
        total_paid: f64,
        total_unique_beneficiaries: u64,
    ) -> Self {
        Self {
            billing_provider_id: billing_provider_id.into(),
            hcpcs_code: hcpcs_code.into(),
            claim_month: claim_month.into(),
            total_claims,
            total_paid,
            total_unique_beneficiaries,
        }
    }

    /// Peer-group key this record belongs to
    pub fn key(&self) -> PeerGroupKey {
        PeerGroupKey::new(self.hcpcs_code.clone(), self.claim_month.clone())
    }

    fn matches_key(&self, key: &PeerGroupKey) -> bool {
        self.hcpcs_code == key.hcpcs_code && self.claim_month == key.claim_month
    }
}

/// Comparison scope: one procedure code in one calendar month
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PeerGroupKey {
    pub hcpcs_code: String,
    pub claim_month: String,
}

impl PeerGroupKey {
    pub fn new(hcpcs_code: impl Into<String>, claim_month: impl Into<String>) -> Self {
        Self {
            hcpcs_code: hcpcs_code.into(),
            claim_month: claim_month.into(),
        }
    }
}

impl fmt::Display for PeerGroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.hcpcs_code, self.claim_month)
    }
}

/// A parsed record plus the original column text it was read from
///
/// The raw columns are what the emitter writes back out, so flagged rows keep
/// the source's exact formatting (leading zeros, decimal places, extra columns).
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimRow {
    pub record: ClaimRecord,
    pub columns: Vec<String>,
    /// 1-based data-row position in the source (header excluded)
    pub position: u64,
}

impl ClaimRow {
    pub fn new(record: ClaimRecord, columns: Vec<String>, position: u64) -> Self {
        Self {
            record,
            columns,
            position,
        }
    }

    /// Build a row without a backing file, in the default column layout
    /// (see [`crate::config::ColumnMap::default_header`])
    pub fn from_record(record: ClaimRecord, position: u64) -> Self {
        let columns = vec![
            record.billing_provider_id.clone(),
            record.hcpcs_code.clone(),
            record.claim_month.clone(),
            record.total_unique_beneficiaries.to_string(),
            record.total_claims.to_string(),
            record.total_paid.to_string(),
        ];
        Self::new(record, columns, position)
    }

    pub fn belongs_to(&self, key: &PeerGroupKey) -> bool {
        self.record.matches_key(key)
    }
}
