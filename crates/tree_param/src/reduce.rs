//! Merging per-worker results
//!
//! The merge of [`SplitEntry`] records orders candidates by loss change,
//! then by lower feature index. As long as no two records share both their
//! loss change and their feature index, that order is total and every merge
//! shape below returns the same record. Equal `(loss_chg, index)` pairs can
//! only come from one feature's scan, which a single worker performs in
//! order.

use rayon::prelude::*;

use crate::split::SplitEntry;
use crate::stats::GradStats;

/// Merge records left to right
pub fn fold_splits(records: &[SplitEntry]) -> SplitEntry {
    let Some((first, rest)) = records.split_first() else {
        return SplitEntry::default();
    };
    let mut best = *first;
    for record in rest {
        SplitEntry::reduce(&mut best, record);
    }
    best
}

/// Merge records pairwise along a balanced binary tree
pub fn tree_reduce_splits(records: &[SplitEntry]) -> SplitEntry {
    match records.len() {
        0 => SplitEntry::default(),
        1 => records[0],
        n => {
            let (lhs, rhs) = records.split_at(n / 2);
            let mut best = tree_reduce_splits(lhs);
            SplitEntry::reduce(&mut best, &tree_reduce_splits(rhs));
            best
        }
    }
}

/// Merge records on the rayon pool
pub fn par_reduce_splits(records: &[SplitEntry]) -> SplitEntry {
    records
        .par_iter()
        .copied()
        .reduce_with(|mut best, record| {
            SplitEntry::reduce(&mut best, &record);
            best
        })
        .unwrap_or_default()
}

/// Sum accumulators on the rayon pool
pub fn par_sum_stats(stats: &[GradStats]) -> GradStats {
    stats
        .par_iter()
        .copied()
        .reduce(GradStats::default, |mut acc, s| {
            GradStats::reduce(&mut acc, &s);
            acc
        })
}
