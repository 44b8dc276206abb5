//! End-of-run counters and report
//!
//! Every recoverable condition (skipped rows, undefined ratios, groups and
//! metrics without enough peers) is counted here rather than logged as an
//! error. The summary is printed to stderr at the end of a run and can also
//! be written as JSON.

use crate::classifier::{GroupVerdict, MetricOutcome};
use crate::metrics::Metric;
use crate::record::PeerGroupKey;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Peer groups kept in [`RunSummary::top_groups`]
pub const TOP_GROUPS_LIMIT: usize = 10;

/// Flagged-row count for one peer group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupFlagCount {
    #[serde(flatten)]
    pub key: PeerGroupKey,
    pub flagged: u64,
}

/// Counters for one screening run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    /// Data rows read from the source, valid or not
    pub rows_read: u64,
    /// Rows dropped as malformed
    pub rows_skipped: u64,
    pub groups_seen: u64,
    pub groups_scored: u64,
    /// Groups with fewer distinct providers than `min_group_size`
    pub groups_too_small: u64,
    /// (group, metric) pairs left unscored for lack of present values
    pub metrics_insufficient: BTreeMap<Metric, u64>,
    /// Provider rows with an undefined ratio, per metric
    pub undefined_values: BTreeMap<Metric, u64>,
    pub rows_flagged: u64,
    pub flags_by_reason: BTreeMap<Metric, u64>,
    /// Groups with at least one flag
    pub groups_flagged: u64,
    /// Most-flagged groups, highest first, ties broken by key
    ///
    /// Capped at [`TOP_GROUPS_LIMIT`] entries regardless of input size.
    pub top_groups: Vec<GroupFlagCount>,
    /// Run stopped early on a cancellation request
    pub cancelled: bool,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one group's verdict into the counters
    pub fn record_group(&mut self, verdict: &GroupVerdict) {
        self.groups_seen += 1;
        if verdict.is_scored() {
            self.groups_scored += 1;
        } else {
            self.groups_too_small += 1;
        }

        for metric in Metric::ALL {
            if let MetricOutcome::InsufficientPeers { .. } = verdict.outcome(metric) {
                *self.metrics_insufficient.entry(metric).or_default() += 1;
            }
            let undefined = verdict.undefined[metric.index()];
            if undefined > 0 {
                *self.undefined_values.entry(metric).or_default() += undefined;
            }
        }

        for flag in &verdict.flags {
            for metric in flag.reasons.iter() {
                *self.flags_by_reason.entry(metric).or_default() += 1;
            }
        }

        if !verdict.flags.is_empty() {
            self.rows_flagged += verdict.flags.len() as u64;
            self.groups_flagged += 1;
            self.rank_group(GroupFlagCount {
                key: verdict.key.clone(),
                flagged: verdict.flags.len() as u64,
            });
        }
    }

    fn rank_group(&mut self, group: GroupFlagCount) {
        let pos = self
            .top_groups
            .partition_point(|g| rank(g, &group) == Ordering::Less);
        if pos < TOP_GROUPS_LIMIT {
            self.top_groups.insert(pos, group);
            self.top_groups.truncate(TOP_GROUPS_LIMIT);
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable report
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Peer Group Outlier Screening Summary ===");
        let _ = writeln!(
            out,
            "Rows read: {} ({} skipped as malformed)",
            self.rows_read, self.rows_skipped
        );
        let _ = writeln!(
            out,
            "Peer groups: {} seen, {} scored, {} too small to score",
            self.groups_seen, self.groups_scored, self.groups_too_small
        );

        if !self.undefined_values.is_empty() {
            let _ = writeln!(out, "Undefined ratio values:");
            for (metric, count) in &self.undefined_values {
                let _ = writeln!(out, "  {:<28} {}", metric.to_string(), count);
            }
        }

        if !self.metrics_insufficient.is_empty() {
            let _ = writeln!(out, "Metrics skipped for insufficient peers:");
            for (metric, count) in &self.metrics_insufficient {
                let _ = writeln!(out, "  {:<28} {}", metric.to_string(), count);
            }
        }

        if self.rows_flagged == 0 {
            let _ = writeln!(out, "No outliers detected in any metric.");
        } else {
            let _ = writeln!(
                out,
                "Flagged rows: {} across {} peer groups",
                self.rows_flagged,
                self.groups_flagged
            );
            let _ = writeln!(out, "Flags by reason:");
            for (metric, count) in &self.flags_by_reason {
                let _ = writeln!(out, "  {:<28} {}", metric.reason_tag(), count);
            }
            let _ = writeln!(out, "Top peer groups by flagged rows:");
            for group in &self.top_groups {
                let _ = writeln!(out, "  {:<28} {}", group.key.to_string(), group.flagged);
            }
        }

        if self.cancelled {
            let _ = writeln!(out, "Run cancelled before the input was exhausted.");
        }

        out
    }
}

/// More flagged rows first, then by key
fn rank(a: &GroupFlagCount, b: &GroupFlagCount) -> Ordering {
    b.flagged
        .cmp(&a.flagged)
        .then_with(|| a.key.cmp(&b.key))
}
