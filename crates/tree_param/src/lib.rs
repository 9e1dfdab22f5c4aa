//! IPPAN Tree Param - Split evaluation core for gradient-boosted trees
//!
//! Provides the training hyperparameters, gradient accumulators, elastic-net
//! weight/gain formulas, monotone value constraints and the deterministic
//! best-split record that a tree builder needs to search one node.
//!
//! Split search is parallel across features, and the merge of per-feature
//! results is deterministic: ties on loss change always resolve to the lower
//! feature index, so any number of workers yields the same split.

pub mod constraint;
pub mod dataset;
pub mod errors;
pub mod gain;
pub mod monotone;
pub mod param;
pub mod reduce;
pub mod search;
pub mod split;
pub mod stats;

use serde::Serialize;
use std::path::Path;

pub use constraint::ValueConstraint;
pub use dataset::GradientDataset;
pub use errors::{Result, TreeParamError};
pub use gain::{
    calc_gain, calc_gain_given_weight, calc_gain_on_test, calc_weight, soft_threshold,
    ElasticNet, RegParams,
};
pub use monotone::MonotoneConstraints;
pub use param::{DefaultDirection, GrowPolicy, TrainParam};
pub use reduce::{fold_splits, par_reduce_splits, par_sum_stats, tree_reduce_splits};
pub use search::{enumerate_feature, find_best_split, split_node, ColumnEntry, NodeSplit};
pub use split::SplitEntry;
pub use stats::GradStats;

/// Root-node search result with its inputs summarized
#[derive(Debug, Clone, Serialize)]
pub struct SplitReport {
    pub rows: usize,
    pub features: usize,
    pub total: GradStats,
    pub split: NodeSplit,
    /// BLAKE3 digest of the winning [`SplitEntry`]
    pub digest: String,
}

/// Search the root node of a dataset.
///
/// Monotone constraints are padded to the dataset's feature count first.
pub fn search_dataset(dataset: &GradientDataset, param: &TrainParam) -> SplitReport {
    let mut param = param.clone();
    ValueConstraint::init(&mut param, dataset.feature_count);

    let columns = dataset.columns();
    let total = dataset.total();
    let split = split_node(
        &param,
        &ValueConstraint::default(),
        &columns,
        total,
        dataset.len(),
        0,
    );

    SplitReport {
        rows: dataset.len(),
        features: dataset.feature_count,
        total,
        digest: split.entry.digest(),
        split,
    }
}

/// Load a CSV gradient dataset and search its root node.
pub fn search_csv(path: &Path, param: &TrainParam) -> Result<SplitReport> {
    param.validate()?;
    let dataset =
        GradientDataset::from_csv(path).map_err(|err| TreeParamError::Dataset(format!("{err:#}")))?;
    if param.monotone_constraints.len() > dataset.feature_count {
        return Err(TreeParamError::invalid(
            "monotone_constraints",
            &param.monotone_constraints,
            format!("more entries than the dataset's {} features", dataset.feature_count),
        ));
    }
    Ok(search_dataset(&dataset, param))
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
