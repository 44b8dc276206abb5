//! Per-provider metric derivation
//!
//! Turns a raw claim row into the four scored metrics. The two ratios are
//! partial: a zero denominator makes the ratio absent (`None`), which keeps the
//! provider out of that metric's quartiles and means it can never be flagged
//! on it.

use crate::record::ClaimRow;
use serde::Serialize;
use std::fmt;

/// A scored metric
///
/// Variant order is the canonical reason-tag order used in output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TotalPaid,
    PaidPerBeneficiary,
    PaidPerClaim,
    UniqueBeneficiaries,
}

impl Metric {
    /// All metrics in canonical order
    pub const ALL: [Metric; 4] = [
        Metric::TotalPaid,
        Metric::PaidPerBeneficiary,
        Metric::PaidPerClaim,
        Metric::UniqueBeneficiaries,
    ];

    /// Tag written to `OUTLIER_REASONS` when this metric triggers a flag
    pub fn reason_tag(self) -> &'static str {
        match self {
            Metric::TotalPaid => "high_total_paid",
            Metric::PaidPerBeneficiary => "high_paid_per_benef",
            Metric::PaidPerClaim => "high_paid_per_claim",
            Metric::UniqueBeneficiaries => "high_unique_beneficiaries",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Metric::TotalPaid => "total_paid",
            Metric::PaidPerBeneficiary => "paid_per_beneficiary",
            Metric::PaidPerClaim => "paid_per_claim",
            Metric::UniqueBeneficiaries => "total_unique_beneficiaries",
        };
        f.write_str(name)
    }
}

/// Divide, or `None` when the denominator is zero
pub fn safe_ratio(numerator: f64, denominator: u64) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator / denominator as f64)
    }
}

/// A provider's row within one peer group, with derived ratios
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderAggregate {
    pub row: ClaimRow,
    pub paid_per_beneficiary: Option<f64>,
    pub paid_per_claim: Option<f64>,
}

impl ProviderAggregate {
    /// Derive the ratio metrics for a row
    pub fn derive(row: ClaimRow) -> Self {
        let record = &row.record;
        let paid_per_beneficiary =
            safe_ratio(record.total_paid, record.total_unique_beneficiaries);
        let paid_per_claim = safe_ratio(record.total_paid, record.total_claims);
        Self {
            row,
            paid_per_beneficiary,
            paid_per_claim,
        }
    }

    pub fn provider_id(&self) -> &str {
        &self.row.record.billing_provider_id
    }

    /// Value of `metric` for this provider, `None` if undefined
    pub fn value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::TotalPaid => Some(self.row.record.total_paid),
            Metric::PaidPerBeneficiary => self.paid_per_beneficiary,
            Metric::PaidPerClaim => self.paid_per_claim,
            Metric::UniqueBeneficiaries => Some(self.row.record.total_unique_beneficiaries as f64),
        }
    }

    /// Metrics this provider has no value for
    pub fn undefined_metrics(&self) -> impl Iterator<Item = Metric> + '_ {
        Metric::ALL
            .into_iter()
            .filter(move |&metric| self.value(metric).is_none())
    }
}
