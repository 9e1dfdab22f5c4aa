//! Exact-greedy split search for one node
//!
//! Each feature column holds the node's rows that have a value for that
//! feature, sorted ascending. Rows without a value are only present in the
//! node totals, so whichever child the scan does not accumulate receives
//! them:
//!
//! - forward scan (small to big): the left child accumulates, missing values
//!   go right
//! - backward scan (big to small): the right child accumulates, missing
//!   values go left
//!
//! Features are scanned in parallel and merged with [`SplitEntry::reduce`].

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, trace};

use crate::constraint::ValueConstraint;
use crate::param::TrainParam;
use crate::split::{SplitEntry, MAX_SPLIT_INDEX};
use crate::stats::GradStats;

/// Offset of the end-of-column threshold from the last present value
pub const RT_EPS: f32 = 1e-6;

/// One present value of a feature with its row's gradient pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnEntry {
    pub value: f32,
    pub grad: f64,
    pub hess: f64,
}

impl ColumnEntry {
    pub fn new(value: f32, grad: f64, hess: f64) -> Self {
        Self { value, grad, hess }
    }
}

/// Threshold separating `lo` (left) from `hi` (right), `lo < hi`.
///
/// The midpoint when it lies in `(lo, hi]`, otherwise `hi` itself.
#[inline]
fn split_threshold(lo: f32, hi: f32) -> f32 {
    let mid = (lo + hi) * 0.5;
    if mid > lo && mid <= hi {
        mid
    } else {
        hi
    }
}

/// Smallest `f32` greater than `x`; infinities and NaN map to themselves
#[inline]
fn next_up(x: f32) -> f32 {
    if x.is_nan() || x == f32::INFINITY {
        return x;
    }
    if x == 0.0 {
        return f32::from_bits(1);
    }
    let bits = x.to_bits();
    if x > 0.0 {
        f32::from_bits(bits + 1)
    } else {
        f32::from_bits(bits - 1)
    }
}

/// State shared by both scan directions of one feature
struct FeatureScan<'a> {
    param: &'a TrainParam,
    constraint: &'a ValueConstraint,
    fid: u32,
    direction: i32,
    node: GradStats,
    root_gain: f64,
}

impl FeatureScan<'_> {
    fn scan<'c, I>(&self, entries: I, backward: bool, best: &mut SplitEntry)
    where
        I: Iterator<Item = &'c ColumnEntry>,
    {
        let mut acc = GradStats::default();
        let mut last_value: Option<f32> = None;

        for entry in entries {
            if let Some(last) = last_value {
                if entry.value != last {
                    let (lo, hi) = if backward {
                        (entry.value, last)
                    } else {
                        (last, entry.value)
                    };
                    self.try_split(acc, split_threshold(lo, hi), backward, best);
                }
            }
            acc.add(entry.grad, entry.hess);
            last_value = Some(entry.value);
        }

        // separate every present value from the missing ones
        if let Some(last) = last_value {
            if backward {
                // any threshold <= last keeps every present value right
                self.try_split(acc, last - RT_EPS, backward, best);
            } else {
                let mut split_value = last + RT_EPS;
                if split_value <= last {
                    split_value = next_up(last);
                }
                if split_value > last {
                    self.try_split(acc, split_value, backward, best);
                }
            }
        }
    }

    #[inline]
    fn try_split(&self, acc: GradStats, split_value: f32, backward: bool, best: &mut SplitEntry) {
        let min_child_weight = self.param.min_child_weight;
        if acc.sum_hess < min_child_weight {
            return;
        }
        let mut other = GradStats::default();
        other.set_subtract(&self.node, &acc);
        if other.sum_hess < min_child_weight {
            return;
        }

        let (left, right) = if backward { (other, acc) } else { (acc, other) };
        let loss_chg = self
            .constraint
            .calc_split_gain(self.param, self.direction, left, right)
            - self.root_gain;
        best.update_with(loss_chg as f32, self.fid, split_value, backward, left, right);
    }
}

/// Best split of one feature.
///
/// `column` must be sorted by value. `col_density` is the fraction of the
/// node's rows present in the column.
pub fn enumerate_feature(
    param: &TrainParam,
    constraint: &ValueConstraint,
    fid: u32,
    column: &[ColumnEntry],
    node: GradStats,
    root_gain: f64,
    col_density: f64,
) -> SplitEntry {
    let mut best = SplitEntry::new();
    let (Some(first), Some(last)) = (column.first(), column.last()) else {
        return best;
    };
    debug_assert!(
        column.windows(2).all(|w| w[0].value <= w[1].value),
        "feature {fid} column is not sorted"
    );

    let scan = FeatureScan {
        param,
        constraint,
        fid,
        direction: param.monotone_constraints.direction(fid as usize),
        node,
        root_gain,
    };
    let indicator = first.value == last.value;

    if param.need_forward_search(col_density, indicator) {
        scan.scan(column.iter(), false, &mut best);
    }
    if param.need_backward_search(col_density, indicator) {
        scan.scan(column.iter().rev(), true, &mut best);
    }
    best
}

/// Best split over all features of a node.
///
/// `num_rows` is the node's row count, used for column density. Returns the
/// empty entry when the node is too light to split.
pub fn find_best_split(
    param: &TrainParam,
    constraint: &ValueConstraint,
    columns: &[Vec<ColumnEntry>],
    node: GradStats,
    num_rows: usize,
    depth: u32,
) -> SplitEntry {
    if param.cannot_split(node.sum_hess, depth) {
        debug!(sum_hess = node.sum_hess, "node too light to split");
        return SplitEntry::new();
    }
    assert!(
        columns.len() <= MAX_SPLIT_INDEX as usize + 1,
        "feature count {} does not fit the packed split index",
        columns.len()
    );

    let root_gain = constraint.calc_gain(param, node);
    columns
        .par_iter()
        .enumerate()
        .map(|(fid, column)| {
            let density = if num_rows == 0 {
                0.0
            } else {
                column.len() as f64 / num_rows as f64
            };
            let best = enumerate_feature(
                param,
                constraint,
                fid as u32,
                column,
                node,
                root_gain,
                density,
            );
            trace!(feature = fid, loss_chg = best.loss_chg, "feature scanned");
            best
        })
        .reduce_with(|mut best, candidate| {
            SplitEntry::reduce(&mut best, &candidate);
            best
        })
        .unwrap_or_default()
}

/// Children produced by an accepted split
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ChildNodes {
    pub left_weight: f64,
    pub right_weight: f64,
    pub left_constraint: ValueConstraint,
    pub right_constraint: ValueConstraint,
}

/// Outcome of searching one node
#[derive(Debug, Clone, Serialize)]
pub struct NodeSplit {
    pub entry: SplitEntry,
    pub feature: u32,
    pub default_left: bool,
    /// Gain of the node kept as a leaf
    pub root_gain: f64,
    /// Leaf weight if the node is not split (before learning rate)
    pub leaf_weight: f64,
    /// Whether the node stays a leaf
    pub pruned: bool,
    pub children: Option<ChildNodes>,
}

/// Search a node and, if the best split survives pruning, derive its
/// children's weights and constraints.
pub fn split_node(
    param: &TrainParam,
    constraint: &ValueConstraint,
    columns: &[Vec<ColumnEntry>],
    node: GradStats,
    num_rows: usize,
    depth: u32,
) -> NodeSplit {
    let entry = find_best_split(param, constraint, columns, node, num_rows, depth);
    let pruned = !entry.is_valid() || param.need_prune(entry.loss_chg as f64, depth);

    let children = (!pruned).then(|| {
        let (left_constraint, right_constraint) =
            constraint.set_child(param, entry.split_index(), entry.left_sum, entry.right_sum);
        ChildNodes {
            left_weight: left_constraint.calc_weight(param, entry.left_sum),
            right_weight: right_constraint.calc_weight(param, entry.right_sum),
            left_constraint,
            right_constraint,
        }
    });

    debug!(
        feature = entry.split_index(),
        loss_chg = entry.loss_chg,
        pruned,
        "node search finished"
    );

    NodeSplit {
        entry,
        feature: entry.split_index(),
        default_left: entry.default_left(),
        root_gain: constraint.calc_gain(param, node),
        leaf_weight: constraint.calc_weight(param, node),
        pruned,
        children,
    }
}
