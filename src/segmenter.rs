//! Streaming peer-group segmentation
//!
//! Splits a key-sorted row stream into contiguous peer groups without ever
//! holding more than one open group. The ascending sort precondition is
//! enforced incrementally: every new key must sort strictly after the group it
//! closes. A key that shows up again after its group was closed necessarily
//! breaks that order, so it is caught without remembering past keys, and
//! memory stays bounded by the largest single group.

use crate::error::{Result, ScreenError};
use crate::metrics::ProviderAggregate;
use crate::record::{ClaimRow, PeerGroupKey};
use std::collections::HashSet;

/// All providers who billed one procedure code in one month
#[derive(Debug, Clone, PartialEq)]
pub struct PeerGroup {
    /// Arrival order of this group in the input (0-based)
    pub seq: u64,
    pub key: PeerGroupKey,
    pub providers: Vec<ProviderAggregate>,
}

impl PeerGroup {
    fn open(seq: u64, key: PeerGroupKey, first: ClaimRow) -> Self {
        Self {
            seq,
            key,
            providers: vec![ProviderAggregate::derive(first)],
        }
    }

    /// Build a closed group directly from rows; rows must share `key`
    pub fn from_rows(seq: u64, key: PeerGroupKey, rows: Vec<ClaimRow>) -> Self {
        debug_assert!(rows.iter().all(|r| r.belongs_to(&key)));
        Self {
            seq,
            key,
            providers: rows.into_iter().map(ProviderAggregate::derive).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Number of distinct billing providers in the group
    pub fn distinct_providers(&self) -> usize {
        self.providers
            .iter()
            .map(ProviderAggregate::provider_id)
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Iterator adapter turning sorted rows into closed [`PeerGroup`]s
///
/// Fused after the first error or the end of input.
pub struct PeerGroupSegmenter<I> {
    source: I,
    current: Option<PeerGroup>,
    closed: u64,
    next_seq: u64,
    finished: bool,
}

impl<I> PeerGroupSegmenter<I>
where
    I: Iterator<Item = Result<ClaimRow>>,
{
    pub fn new(source: I) -> Self {
        Self {
            source,
            current: None,
            closed: 0,
            next_seq: 0,
            finished: false,
        }
    }

    /// Groups closed so far
    pub fn groups_closed(&self) -> u64 {
        self.closed
    }

    fn close(&mut self, group: PeerGroup) -> PeerGroup {
        self.closed += 1;
        group
    }

    fn start(&mut self, key: PeerGroupKey, row: ClaimRow) -> Option<PeerGroup> {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.current.replace(PeerGroup::open(seq, key, row))
    }
}

impl<I> Iterator for PeerGroupSegmenter<I>
where
    I: Iterator<Item = Result<ClaimRow>>,
{
    type Item = Result<PeerGroup>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            match self.source.next() {
                Some(Ok(row)) => {
                    if let Some(group) = self.current.as_mut() {
                        if row.belongs_to(&group.key) {
                            group.providers.push(ProviderAggregate::derive(row));
                            continue;
                        }
                    }

                    let key = row.record.key();
                    let descending = self.current.as_ref().is_some_and(|g| key < g.key);
                    if descending {
                        self.finished = true;
                        self.current = None;
                        return Some(Err(ScreenError::OutOfOrderInput {
                            key,
                            position: row.position,
                        }));
                    }

                    if let Some(done) = self.start(key, row) {
                        return Some(Ok(self.close(done)));
                    }
                }
                Some(Err(e)) => {
                    self.finished = true;
                    self.current = None;
                    return Some(Err(e));
                }
                None => {
                    self.finished = true;
                    let last = self.current.take()?;
                    return Some(Ok(self.close(last)));
                }
            }
        }
    }
}
