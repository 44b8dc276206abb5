//! IQR upper-fence classification of one peer group
//!
//! Each metric is scored on its own: collect the present values, compute
//! type-7 quartiles, and flag every provider strictly above
//! `Q3 + multiplier * IQR`. A provider's reasons are merged into one
//! [`OutlierFlag`] per group. Groups with too few distinct providers, and
//! metrics with too few present values, are skipped without flags.

use crate::config::ScreeningConfig;
use crate::flag::{OutlierFlag, ReasonSet};
use crate::metrics::Metric;
use crate::quantile::QuartileSummary;
use crate::record::PeerGroupKey;
use crate::segmenter::PeerGroup;
use serde::Serialize;

/// What happened to one metric in one group
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MetricOutcome {
    /// Group had too few distinct providers; no metric was looked at
    GroupTooSmall,
    /// Fewer than `min_group_size` providers had a value for this metric
    InsufficientPeers { present: usize },
    /// Quartiles computed and the fence applied
    Scored(QuartileSummary),
}

impl MetricOutcome {
    pub fn summary(&self) -> Option<&QuartileSummary> {
        match self {
            MetricOutcome::Scored(summary) => Some(summary),
            _ => None,
        }
    }
}

/// Classification result for one peer group
#[derive(Debug, Clone, PartialEq)]
pub struct GroupVerdict {
    pub seq: u64,
    pub key: PeerGroupKey,
    pub providers: usize,
    pub distinct_providers: usize,
    /// Indexed in canonical [`Metric::ALL`] order
    pub outcomes: [MetricOutcome; 4],
    /// Providers with an undefined value, per metric
    pub undefined: [u64; 4],
    /// Flagged providers, in the group's input order
    pub flags: Vec<OutlierFlag>,
}

impl GroupVerdict {
    pub fn outcome(&self, metric: Metric) -> &MetricOutcome {
        &self.outcomes[metric.index()]
    }

    pub fn is_scored(&self) -> bool {
        !matches!(self.outcomes[0], MetricOutcome::GroupTooSmall)
    }
}

/// Per-group IQR classifier
#[derive(Debug, Clone, Copy)]
pub struct IqrClassifier {
    min_group_size: usize,
    iqr_multiplier: f64,
}

impl IqrClassifier {
    pub fn new(min_group_size: usize, iqr_multiplier: f64) -> Self {
        Self {
            min_group_size,
            iqr_multiplier,
        }
    }

    pub fn from_config(config: &ScreeningConfig) -> Self {
        Self::new(config.min_group_size, config.iqr_multiplier)
    }

    /// Classify a closed group, consuming it
    ///
    /// Flagged rows are moved into the verdict; everything else is dropped here.
    ///
    /// Scoring is per input row. A billing provider with several rows in the
    /// group (one per servicing provider in Medicaid extracts) contributes one
    /// value per row and can receive one [`OutlierFlag`] per flagged row; its
    /// rows are not summed. The group-size gate counts it once.
    pub fn classify(&self, group: PeerGroup) -> GroupVerdict {
        let distinct_providers = group.distinct_providers();
        let mut undefined = [0u64; 4];
        for provider in &group.providers {
            for metric in provider.undefined_metrics() {
                undefined[metric.index()] += 1;
            }
        }

        let outcomes = if distinct_providers < self.min_group_size {
            [MetricOutcome::GroupTooSmall; 4]
        } else {
            Metric::ALL.map(|metric| self.score_metric(&group, metric))
        };

        let providers = group.len();
        let mut flags = Vec::new();
        for provider in group.providers {
            let reasons: ReasonSet = Metric::ALL
                .into_iter()
                .filter(|&metric| {
                    match (outcomes[metric.index()].summary(), provider.value(metric)) {
                        (Some(summary), Some(value)) => summary.is_upper_outlier(value),
                        _ => false,
                    }
                })
                .collect();

            if !reasons.is_empty() {
                flags.push(OutlierFlag {
                    key: group.key.clone(),
                    reasons,
                    row: provider.row,
                });
            }
        }

        tracing::debug!(
            group = %group.key,
            providers,
            distinct_providers,
            flagged = flags.len(),
            "classified peer group"
        );

        GroupVerdict {
            seq: group.seq,
            key: group.key,
            providers,
            distinct_providers,
            outcomes,
            undefined,
            flags,
        }
    }

    fn score_metric(&self, group: &PeerGroup, metric: Metric) -> MetricOutcome {
        let values: Vec<f64> = group
            .providers
            .iter()
            .filter_map(|p| p.value(metric))
            .collect();

        if values.len() < self.min_group_size {
            return MetricOutcome::InsufficientPeers {
                present: values.len(),
            };
        }

        match QuartileSummary::compute(&values, self.iqr_multiplier) {
            Some(summary) => MetricOutcome::Scored(summary),
            None => MetricOutcome::InsufficientPeers { present: 0 },
        }
    }
}

impl Default for IqrClassifier {
    fn default() -> Self {
        Self::from_config(&ScreeningConfig::default())
    }
}
