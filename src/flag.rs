//! Outlier flags and their canonical reason rendering

use crate::metrics::Metric;
use crate::record::{ClaimRow, PeerGroupKey};
use serde::{Serialize, Serializer};
use std::fmt;

/// Set of metrics that triggered a flag
///
/// Stored as a bitmask indexed by [`Metric`], so duplicates are impossible and
/// iteration always follows the canonical metric order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ReasonSet(u8);

impl ReasonSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, metric: Metric) {
        self.0 |= 1 << metric.index();
    }

    pub fn contains(&self, metric: Metric) -> bool {
        self.0 & (1 << metric.index()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Present metrics, in canonical order
    pub fn iter(&self) -> impl Iterator<Item = Metric> + '_ {
        Metric::ALL.into_iter().filter(|&m| self.contains(m))
    }
}

impl FromIterator<Metric> for ReasonSet {
    fn from_iter<I: IntoIterator<Item = Metric>>(iter: I) -> Self {
        let mut set = Self::new();
        for metric in iter {
            set.insert(metric);
        }
        set
    }
}

/// Comma-joined reason tags, e.g. `high_total_paid,high_paid_per_claim`
impl fmt::Display for ReasonSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, metric) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(metric.reason_tag())?;
        }
        Ok(())
    }
}

impl Serialize for ReasonSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(Metric::reason_tag))
    }
}

/// A provider flagged within one peer group
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierFlag {
    pub key: PeerGroupKey,
    pub reasons: ReasonSet,
    /// The flagged provider's row, carried through for output
    pub row: ClaimRow,
}

impl OutlierFlag {
    pub fn provider_id(&self) -> &str {
        &self.row.record.billing_provider_id
    }
}
