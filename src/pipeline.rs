//! Screening pipeline: source -> segmenter -> classifier -> emitter
//!
//! # Design
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ CALLING THREAD               │  rows -> SkipMalformed -> PeerGroupSegmenter
//! └──────────────────────────────┘
//!                │ bounded channel (queue_capacity): blocks when full
//!                ▼
//! ┌──────────────────────────────┐
//! │ WORKERS (config.workers)     │  IqrClassifier::classify, one group each
//! └──────────────────────────────┘
//!                │ bounded channel
//!                ▼
//! ┌──────────────────────────────┐
//! │ WRITER THREAD                │  reorder by group seq (if ordered_output),
//! │                              │  ResultEmitter + RunSummary
//! └──────────────────────────────┘
//! ```
//!
//! With `workers == 1` everything runs on the calling thread instead.
//!
//! Cancellation is checked at group boundaries only. Once the token is set no
//! further group is handed to classification, classifications in flight finish,
//! and every verdict already produced is written before `run` returns.

use crate::classifier::{GroupVerdict, IqrClassifier};
use crate::config::ScreeningConfig;
use crate::emitter::ResultEmitter;
use crate::error::{Result, ScreenError};
use crate::record::ClaimRow;
use crate::segmenter::{PeerGroup, PeerGroupSegmenter};
use crate::source::SkipMalformed;
use crate::summary::RunSummary;
use crossbeam::channel::{self, Receiver, Sender};
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared with a running [`Screener`]
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs the full screening pipeline over a sorted row stream
///
/// # Example
///
/// ```
/// use claimscreen::config::ScreeningConfig;
/// use claimscreen::emitter::ResultEmitter;
/// use claimscreen::pipeline::Screener;
/// use claimscreen::record::{ClaimRecord, ClaimRow};
///
/// let config = ScreeningConfig::default();
/// let rows = [100.0, 120.0, 110.0, 130.0, 900.0]
///     .iter()
///     .enumerate()
///     .map(|(i, &paid)| {
///         let record = ClaimRecord::new(format!("P{}", i), "99213", "2025-01", 1, paid, 1);
///         Ok(ClaimRow::from_record(record, i as u64 + 1))
///     });
///
/// let header = config.columns.default_header();
/// let mut emitter = ResultEmitter::new(Vec::new(), &header)?;
/// let summary = Screener::new(config)?.run(rows, &mut emitter)?;
/// assert_eq!(summary.rows_flagged, 1);
/// # Ok::<(), claimscreen::error::ScreenError>(())
/// ```
#[derive(Debug)]
pub struct Screener {
    config: ScreeningConfig,
    classifier: IqrClassifier,
    cancel: CancelToken,
}

impl Screener {
    pub fn new(config: ScreeningConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            classifier: IqrClassifier::from_config(&config),
            config,
            cancel: CancelToken::new(),
        })
    }

    /// Token that stops this screener at the next group boundary
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &ScreeningConfig {
        &self.config
    }

    /// Screen `rows` and write flagged providers to `emitter`
    ///
    /// Malformed rows are skipped and counted. Out-of-order input aborts the
    /// run; groups completed before the violation have already been written.
    pub fn run<I, W>(&self, rows: I, emitter: &mut ResultEmitter<W>) -> Result<RunSummary>
    where
        I: Iterator<Item = Result<ClaimRow>>,
        W: Write + Send,
    {
        tracing::info!(
            min_group_size = self.config.min_group_size,
            iqr_multiplier = self.config.iqr_multiplier,
            workers = self.config.workers,
            ordered_output = self.config.ordered_output,
            "starting peer group screening"
        );

        let mut rows = SkipMalformed::new(rows);
        let mut summary = if self.config.workers > 1 {
            self.run_parallel(&mut rows, emitter)?
        } else {
            self.run_sequential(&mut rows, emitter)?
        };

        summary.rows_read = rows.rows_seen();
        summary.rows_skipped = rows.skipped();
        summary.cancelled = self.cancel.is_cancelled();

        tracing::info!(
            rows = summary.rows_read,
            skipped = summary.rows_skipped,
            groups = summary.groups_seen,
            flagged = summary.rows_flagged,
            "screening finished"
        );
        Ok(summary)
    }

    fn run_sequential<I, W>(
        &self,
        rows: &mut SkipMalformed<I>,
        emitter: &mut ResultEmitter<W>,
    ) -> Result<RunSummary>
    where
        I: Iterator<Item = Result<ClaimRow>>,
        W: Write,
    {
        let mut summary = RunSummary::new();
        let outcome = (|| -> Result<()> {
            for group in PeerGroupSegmenter::new(&mut *rows) {
                let group = group?;
                if self.stop_requested() {
                    break;
                }
                let verdict = self.classifier.classify(group);
                emitter.emit_group(&verdict)?;
                summary.record_group(&verdict);
            }
            Ok(())
        })();

        emitter.flush()?;
        outcome.map(|()| summary)
    }

    fn run_parallel<I, W>(
        &self,
        rows: &mut SkipMalformed<I>,
        emitter: &mut ResultEmitter<W>,
    ) -> Result<RunSummary>
    where
        I: Iterator<Item = Result<ClaimRow>>,
        W: Write + Send,
    {
        let (group_tx, group_rx) = channel::bounded::<PeerGroup>(self.config.queue_capacity);
        let (verdict_tx, verdict_rx) =
            channel::bounded::<GroupVerdict>(self.config.queue_capacity);
        let ordered = self.config.ordered_output;
        let classifier = self.classifier;
        let cancel = &self.cancel;

        let scoped = crossbeam::scope(|s| {
            for worker in 0..self.config.workers {
                let group_rx = group_rx.clone();
                let verdict_tx = verdict_tx.clone();
                s.spawn(move |_| {
                    classify_worker(worker, classifier, cancel, group_rx, verdict_tx)
                });
            }
            drop(group_rx);
            drop(verdict_tx);

            let writer = s.spawn(move |_| drain_verdicts(verdict_rx, emitter, ordered));

            let produced = self.produce(rows, group_tx);
            (produced, writer.join())
        });

        let (produced, written) = scoped.map_err(|_| ScreenError::WorkerPanicked)?;
        let written = written.map_err(|_| ScreenError::WorkerPanicked)?;
        produced?;
        written
    }

    /// Segment rows and hand closed groups to the workers
    fn produce<I>(&self, rows: &mut SkipMalformed<I>, tx: Sender<PeerGroup>) -> Result<()>
    where
        I: Iterator<Item = Result<ClaimRow>>,
    {
        for group in PeerGroupSegmenter::new(rows) {
            let group = group?;
            if self.stop_requested() {
                break;
            }
            // Blocks while the queue is full; fails only if every worker is gone
            if tx.send(group).is_err() {
                break;
            }
        }
        Ok(())
    }

    fn stop_requested(&self) -> bool {
        let cancelled = self.cancel.is_cancelled();
        if cancelled {
            tracing::warn!("cancellation requested; stopping at peer group boundary");
        }
        cancelled
    }
}

fn classify_worker(
    worker: usize,
    classifier: IqrClassifier,
    cancel: &CancelToken,
    groups: Receiver<PeerGroup>,
    verdicts: Sender<GroupVerdict>,
) {
    while !cancel.is_cancelled() {
        let Ok(group) = groups.recv() else {
            break;
        };
        if cancel.is_cancelled() {
            break;
        }
        if verdicts.send(classifier.classify(group)).is_err() {
            break;
        }
    }
    tracing::trace!(worker, "classification worker exiting");
}

/// Write verdicts as they arrive, restoring input group order when `ordered`
fn drain_verdicts<W: Write>(
    verdicts: Receiver<GroupVerdict>,
    emitter: &mut ResultEmitter<W>,
    ordered: bool,
) -> Result<RunSummary> {
    let mut summary = RunSummary::new();
    let mut write = |verdict: GroupVerdict| -> Result<()> {
        emitter.emit_group(&verdict)?;
        summary.record_group(&verdict);
        Ok(())
    };

    let mut pending: BTreeMap<u64, GroupVerdict> = BTreeMap::new();
    let mut next_seq = 0u64;
    for verdict in verdicts {
        if !ordered {
            write(verdict)?;
            continue;
        }
        pending.insert(verdict.seq, verdict);
        while let Some(ready) = pending.remove(&next_seq) {
            write(ready)?;
            next_seq += 1;
        }
    }

    // Gaps left by groups dropped on cancellation or an aborted run
    for (_, verdict) in pending {
        write(verdict)?;
    }

    emitter.flush()?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ClaimRecord;
    use std::collections::HashSet;

    fn rows(groups: &[(&str, &[f64])]) -> Vec<Result<ClaimRow>> {
        let mut out = Vec::new();
        for (code, paid) in groups {
            for (i, &p) in paid.iter().enumerate() {
                let record = ClaimRecord::new(format!("P{}", i), *code, "2025-01", 1, p, 1);
                out.push(Ok(ClaimRow::from_record(record, out.len() as u64 + 1)));
            }
        }
        out
    }

    fn screen(config: ScreeningConfig, input: Vec<Result<ClaimRow>>) -> (String, RunSummary) {
        let header = config.columns.default_header();
        let mut emitter = ResultEmitter::new(Vec::new(), &header).unwrap();
        let summary = Screener::new(config)
            .unwrap()
            .run(input.into_iter(), &mut emitter)
            .unwrap();
        let out = String::from_utf8(emitter.into_inner().unwrap()).unwrap();
        (out, summary)
    }

    fn many_groups() -> Vec<Result<ClaimRow>> {
        let spiky: &[f64] = &[100.0, 120.0, 110.0, 130.0, 900.0];
        let flat: &[f64] = &[5.0, 5.0, 5.0, 5.0];
        let codes: Vec<String> = (0..40).map(|i| format!("{:05}", 10000 + i)).collect();
        let groups: Vec<(&str, &[f64])> = codes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), if i % 3 == 0 { flat } else { spiky }))
            .collect();
        rows(&groups)
    }

    #[test]
    fn test_sequential_scenario() {
        let input = rows(&[
            ("99213", &[100.0, 120.0, 110.0, 130.0, 900.0]),
            ("99214", &[1.0, 2.0, 1000.0]),
        ]);
        let (out, summary) = screen(ScreeningConfig::default(), input);

        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(",OUTLIER_REASONS"));
        assert!(lines[1].starts_with("P4,99213,2025-01,"));
        assert_eq!(summary.rows_read, 8);
        assert_eq!(summary.groups_seen, 2);
        assert_eq!(summary.groups_too_small, 1);
        assert_eq!(summary.rows_flagged, 1);
        assert!(!summary.cancelled);
    }

    #[test]
    fn test_malformed_rows_counted_not_fatal() {
        let mut input = rows(&[("99213", &[100.0, 120.0, 110.0, 130.0, 900.0])]);
        input.insert(
            2,
            Err(ScreenError::MalformedRecord {
                position: 3,
                reason: "bad".to_string(),
            }),
        );
        let (_, summary) = screen(ScreeningConfig::default(), input);
        assert_eq!(summary.rows_read, 6);
        assert_eq!(summary.rows_skipped, 1);
        assert_eq!(summary.rows_flagged, 1);
    }

    #[test]
    fn test_out_of_order_aborts() {
        let input = || {
            let mut input = rows(&[
                ("99213", &[1.0, 2.0, 3.0, 4.0]),
                ("99214", &[1.0, 2.0, 3.0, 4.0]),
            ]);
            let stray = ClaimRecord::new("X", "99213", "2025-01", 1, 1.0, 1);
            input.push(Ok(ClaimRow::from_record(stray, 9)));
            input
        };

        for workers in [1, 4] {
            let config = ScreeningConfig {
                workers,
                ..ScreeningConfig::default()
            };
            let header = config.columns.default_header();
            let mut emitter = ResultEmitter::new(Vec::new(), &header).unwrap();
            let err = Screener::new(config)
                .unwrap()
                .run(input().into_iter(), &mut emitter)
                .unwrap_err();
            match err {
                ScreenError::OutOfOrderInput { key, position } => {
                    assert_eq!(key.hcpcs_code, "99213");
                    assert_eq!(position, 9);
                }
                other => panic!("expected OutOfOrderInput, got {}", other),
            }
        }
    }

    #[test]
    fn test_parallel_ordered_matches_sequential() {
        let (sequential, seq_summary) = screen(ScreeningConfig::default(), many_groups());
        let config = ScreeningConfig {
            workers: 4,
            queue_capacity: 2,
            ..ScreeningConfig::default()
        };
        let (parallel, par_summary) = screen(config, many_groups());

        assert_eq!(sequential, parallel);
        assert_eq!(seq_summary, par_summary);
        assert_eq!(seq_summary.groups_seen, 40);
    }

    #[test]
    fn test_parallel_unordered_same_rows() {
        let (sequential, _) = screen(ScreeningConfig::default(), many_groups());
        let config = ScreeningConfig {
            workers: 3,
            ordered_output: false,
            ..ScreeningConfig::default()
        };
        let (unordered, summary) = screen(config, many_groups());

        let mut a: Vec<_> = sequential.lines().collect();
        let mut b: Vec<_> = unordered.lines().collect();
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b);
        assert_eq!(summary.groups_seen, 40);
    }

    #[test]
    fn test_cancel_before_run_emits_nothing() {
        for workers in [1, 2] {
            let config = ScreeningConfig {
                workers,
                ..ScreeningConfig::default()
            };
            let header = config.columns.default_header();
            let screener = Screener::new(config).unwrap();
            screener.cancel_token().cancel();

            let mut emitter = ResultEmitter::new(Vec::new(), &header).unwrap();
            let summary = screener.run(many_groups().into_iter(), &mut emitter).unwrap();
            assert!(summary.cancelled);
            assert_eq!(summary.groups_seen, 0);
            assert_eq!(emitter.rows_written(), 0);
        }
    }

    #[test]
    fn test_cancel_mid_run_keeps_whole_groups() {
        let config = ScreeningConfig::default();
        let header = config.columns.default_header();
        let screener = Screener::new(config).unwrap();
        let token = screener.cancel_token();

        // Cancel once the third group's first row is pulled
        let input = many_groups().into_iter().inspect(move |row| {
            if let Ok(row) = row {
                if row.record.hcpcs_code == "10002" {
                    token.cancel();
                }
            }
        });

        let mut emitter = ResultEmitter::new(Vec::new(), &header).unwrap();
        let summary = screener.run(input, &mut emitter).unwrap();
        assert!(summary.cancelled);
        // Group 10001 closed when 10002 arrived, but the token was already set
        assert_eq!(summary.groups_seen, 1);
        assert_eq!(emitter.rows_written(), 0);
    }

    #[test]
    fn test_cancel_mid_run_with_workers_writes_classified_groups() {
        let (sequential, _) = screen(ScreeningConfig::default(), many_groups());
        let expected: Vec<_> = sequential.lines().skip(1).collect();

        let config = ScreeningConfig {
            workers: 3,
            queue_capacity: 2,
            ..ScreeningConfig::default()
        };
        let header = config.columns.default_header();
        let screener = Screener::new(config).unwrap();
        let token = screener.cancel_token();

        let input = many_groups().into_iter().inspect(move |row| {
            if let Ok(row) = row {
                if row.record.hcpcs_code == "10020" {
                    token.cancel();
                }
            }
        });

        let mut emitter = ResultEmitter::new(Vec::new(), &header).unwrap();
        let summary = screener.run(input, &mut emitter).unwrap();
        assert_eq!(emitter.rows_written(), summary.rows_flagged);
        let out = String::from_utf8(emitter.into_inner().unwrap()).unwrap();
        let written: Vec<_> = out.lines().skip(1).collect();

        assert!(summary.cancelled);
        // 10019 closes only once the token is set, so it never reaches a worker
        assert!(summary.groups_seen <= 19);
        assert!(written.iter().all(|line| *line < "P4,10019"));

        // Whatever was classified is written, unchanged and in input order
        let mut rest = expected.iter();
        for line in &written {
            assert!(rest.any(|e| e == line), "unexpected or reordered row {}", line);
        }
        let groups_in_output: HashSet<_> = written
            .iter()
            .filter_map(|line| line.split(',').nth(1))
            .collect();
        assert_eq!(groups_in_output.len() as u64, summary.groups_flagged);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ScreeningConfig {
            workers: 0,
            ..ScreeningConfig::default()
        };
        assert!(matches!(
            Screener::new(config),
            Err(ScreenError::InvalidConfig(_))
        ));
    }
}
