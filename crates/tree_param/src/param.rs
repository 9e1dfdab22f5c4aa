//! Tree training parameters
//!
//! Holds the regularization terms consumed by [`crate::gain`], the
//! monotone constraints consumed by [`crate::constraint`] and the search
//! policy knobs used by [`crate::search`]. Parameters load from TOML, can be
//! overridden per key from strings or `TREE_PARAM_*` environment variables,
//! and are bound-checked by [`TrainParam::validate`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::errors::{Result, TreeParamError};
use crate::gain::{ElasticNet, RegParams};
use crate::monotone::MonotoneConstraints;

/// Prefix of environment variables read by [`TrainParam::apply_env_overrides`]
pub const ENV_PREFIX: &str = "TREE_PARAM_";

/// Keys accepted by [`TrainParam::set_field`], in canonical spelling
pub const PARAM_KEYS: &[&str] = &[
    "learning_rate",
    "min_split_loss",
    "max_depth",
    "max_leaves",
    "max_bin",
    "grow_policy",
    "min_child_weight",
    "reg_lambda",
    "reg_alpha",
    "default_direction",
    "max_delta_step",
    "subsample",
    "opt_dense_col",
    "sketch_eps",
    "sketch_ratio",
    "monotone_constraints",
];

/// Order in which nodes are expanded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrowPolicy {
    /// Split nodes closest to the root first
    #[default]
    DepthWise,
    /// Split nodes with the highest loss change first
    LossGuide,
}

/// Where missing feature values are routed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultDirection {
    /// Try both directions and keep the better one
    #[default]
    Learn,
    Left,
    Right,
}

impl FromStr for GrowPolicy {
    type Err = TreeParamError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "depthwise" | "0" => Ok(Self::DepthWise),
            "lossguide" | "1" => Ok(Self::LossGuide),
            other => Err(TreeParamError::invalid(
                "grow_policy",
                other,
                "expected `depthwise` or `lossguide`",
            )),
        }
    }
}

impl FromStr for DefaultDirection {
    type Err = TreeParamError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "learn" | "0" => Ok(Self::Learn),
            "left" | "1" => Ok(Self::Left),
            "right" | "2" => Ok(Self::Right),
            other => Err(TreeParamError::invalid(
                "default_direction",
                other,
                "expected `learn`, `left` or `right`",
            )),
        }
    }
}

impl fmt::Display for GrowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DepthWise => write!(f, "depthwise"),
            Self::LossGuide => write!(f, "lossguide"),
        }
    }
}

impl fmt::Display for DefaultDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Learn => write!(f, "learn"),
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
        }
    }
}

/// Training parameters for a regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainParam {
    /// Step size shrinkage applied to leaf weights
    #[serde(alias = "eta")]
    pub learning_rate: f64,
    /// Minimum loss reduction required to make a split
    #[serde(alias = "gamma")]
    pub min_split_loss: f64,
    /// Maximum tree depth, 0 means no limit
    pub max_depth: u32,
    /// Maximum number of leaves, 0 means no limit
    pub max_leaves: u32,
    /// Maximum number of histogram bins per feature
    pub max_bin: u32,
    pub grow_policy: GrowPolicy,
    /// Minimum hessian sum needed in a child
    pub min_child_weight: f64,
    /// L2 regularization on leaf weight
    #[serde(alias = "lambda")]
    pub reg_lambda: f64,
    /// L1 regularization on leaf weight
    #[serde(alias = "alpha")]
    pub reg_alpha: f64,
    pub default_direction: DefaultDirection,
    /// Maximum absolute leaf weight, 0 means unbounded
    pub max_delta_step: f64,
    /// Row subsample ratio
    pub subsample: f64,
    /// Column density below which the forward scan is also tried
    pub opt_dense_col: f64,
    /// Sketch accuracy of the approximate algorithm
    pub sketch_eps: f64,
    pub sketch_ratio: f64,
    pub monotone_constraints: MonotoneConstraints,
}

impl Default for TrainParam {
    fn default() -> Self {
        Self {
            learning_rate: 0.3,
            min_split_loss: 0.0,
            max_depth: 6,
            max_leaves: 0,
            max_bin: 256,
            grow_policy: GrowPolicy::DepthWise,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            default_direction: DefaultDirection::Learn,
            max_delta_step: 0.0,
            subsample: 1.0,
            opt_dense_col: 1.0,
            sketch_eps: 0.03,
            sketch_ratio: 2.0,
            monotone_constraints: MonotoneConstraints::default(),
        }
    }
}

fn parse_value<T: FromStr>(name: &'static str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| TreeParamError::invalid(name, value, "not a valid number"))
}

fn check_lower(name: &'static str, value: f64, lower: f64) -> Result<()> {
    if value >= lower {
        Ok(())
    } else {
        Err(TreeParamError::invalid(
            name,
            value,
            format!("must be >= {lower}"),
        ))
    }
}

fn check_range(name: &'static str, value: f64, lower: f64, upper: f64) -> Result<()> {
    if (lower..=upper).contains(&value) {
        Ok(())
    } else {
        Err(TreeParamError::invalid(
            name,
            value,
            format!("must be within [{lower}, {upper}]"),
        ))
    }
}

impl TrainParam {
    /// Parse parameters from TOML text and validate them
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let param: TrainParam = toml::from_str(content)?;
        for warning in param.validate()? {
            warn!("{}", warning);
        }
        Ok(param)
    }

    /// Load parameters from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading tree parameters from: {}", path.display());
        let content = std::fs::read_to_string(path)?;
        let param = Self::from_toml_str(&content)?;
        debug!(?param, "tree parameters loaded");
        Ok(param)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Set one parameter from its string form.
    ///
    /// Accepts the canonical key or its alias (`eta`, `gamma`, `lambda`,
    /// `alpha`). Bounds are not checked here; call [`TrainParam::validate`].
    pub fn set_field(&mut self, key: &str, value: &str) -> Result<()> {
        match key.trim() {
            "learning_rate" | "eta" => self.learning_rate = parse_value("learning_rate", value)?,
            "min_split_loss" | "gamma" => {
                self.min_split_loss = parse_value("min_split_loss", value)?
            }
            "max_depth" => self.max_depth = parse_value("max_depth", value)?,
            "max_leaves" => self.max_leaves = parse_value("max_leaves", value)?,
            "max_bin" => self.max_bin = parse_value("max_bin", value)?,
            "grow_policy" => self.grow_policy = value.parse()?,
            "min_child_weight" => self.min_child_weight = parse_value("min_child_weight", value)?,
            "reg_lambda" | "lambda" => self.reg_lambda = parse_value("reg_lambda", value)?,
            "reg_alpha" | "alpha" => self.reg_alpha = parse_value("reg_alpha", value)?,
            "default_direction" => self.default_direction = value.parse()?,
            "max_delta_step" => self.max_delta_step = parse_value("max_delta_step", value)?,
            "subsample" => self.subsample = parse_value("subsample", value)?,
            "opt_dense_col" => self.opt_dense_col = parse_value("opt_dense_col", value)?,
            "sketch_eps" => self.sketch_eps = parse_value("sketch_eps", value)?,
            "sketch_ratio" => self.sketch_ratio = parse_value("sketch_ratio", value)?,
            "monotone_constraints" => self.monotone_constraints = value.parse()?,
            other => {
                return Err(TreeParamError::invalid(
                    "key",
                    other,
                    "unknown tree parameter",
                ))
            }
        }
        Ok(())
    }

    /// Apply `TREE_PARAM_<KEY>` environment variables, then validate.
    ///
    /// Returns the keys that were overridden.
    /// On error `self` is left unchanged.
    pub fn apply_env_overrides(&mut self) -> Result<Vec<&'static str>> {
        let mut updated = self.clone();
        let mut applied = Vec::new();
        for &key in PARAM_KEYS {
            let var = format!("{ENV_PREFIX}{}", key.to_ascii_uppercase());
            let Ok(value) = std::env::var(&var) else {
                continue;
            };
            updated.set_field(key, &value)?;
            debug!(%var, %value, "tree parameter overridden from environment");
            applied.push(key);
        }
        for warning in updated.validate()? {
            warn!("{}", warning);
        }
        if !applied.is_empty() {
            info!("Applied {} tree parameter override(s) from environment", applied.len());
        }
        *self = updated;
        Ok(applied)
    }

    /// Check every parameter against its declared bounds.
    ///
    /// Returns non-fatal warnings on success.
    pub fn validate(&self) -> Result<Vec<String>> {
        check_lower("learning_rate", self.learning_rate, 0.0)?;
        check_lower("min_split_loss", self.min_split_loss, 0.0)?;
        if self.max_bin < 2 {
            return Err(TreeParamError::invalid("max_bin", self.max_bin, "must be >= 2"));
        }
        check_lower("min_child_weight", self.min_child_weight, 0.0)?;
        check_lower("reg_lambda", self.reg_lambda, 0.0)?;
        check_lower("reg_alpha", self.reg_alpha, 0.0)?;
        check_lower("max_delta_step", self.max_delta_step, 0.0)?;
        check_range("subsample", self.subsample, 0.0, 1.0)?;
        check_range("opt_dense_col", self.opt_dense_col, 0.0, 1.0)?;
        check_range("sketch_eps", self.sketch_eps, 0.0, 1.0)?;
        if self.sketch_eps == 0.0 {
            return Err(TreeParamError::invalid("sketch_eps", self.sketch_eps, "must be > 0"));
        }
        check_lower("sketch_ratio", self.sketch_ratio, 0.0)?;
        // untrusted deserializers may bypass MonotoneConstraints::new
        if let Some(d) = self.monotone_constraints.iter().find(|d| !(-1..=1).contains(d)) {
            return Err(TreeParamError::invalid(
                "monotone_constraints",
                d,
                "directions must be -1, 0 or 1",
            ));
        }

        let mut warnings = Vec::new();
        if self.max_depth == 0 && self.grow_policy == GrowPolicy::DepthWise {
            warnings.push("max_depth = 0 with depthwise growth leaves tree depth unbounded".into());
        }
        if self.reg_lambda == 0.0 && self.min_child_weight == 0.0 {
            warnings.push(
                "reg_lambda = 0 and min_child_weight = 0: \
                 near-empty nodes may produce very large weights"
                    .into(),
            );
        }
        Ok(warnings)
    }

    /// Whether the small-to-big scan (missing values to the right) is needed
    pub fn need_forward_search(&self, col_density: f64, indicator: bool) -> bool {
        self.default_direction == DefaultDirection::Right
            || (self.default_direction == DefaultDirection::Learn
                && col_density < self.opt_dense_col
                && !indicator)
    }

    /// Whether the big-to-small scan (missing values to the left) is needed
    pub fn need_backward_search(&self, _col_density: f64, _indicator: bool) -> bool {
        self.default_direction != DefaultDirection::Right
    }

    /// Whether a split with this loss change should be pruned
    pub fn need_prune(&self, loss_chg: f64, _depth: u32) -> bool {
        loss_chg < self.min_split_loss
    }

    /// Whether a node is too light to have two admissible children
    pub fn cannot_split(&self, sum_hess: f64, _depth: u32) -> bool {
        sum_hess < self.min_child_weight * 2.0
    }

    /// Maximum number of entries kept in a quantile sketch
    pub fn max_sketch_size(&self) -> Result<u32> {
        let ratio = self.sketch_ratio / self.sketch_eps;
        if !ratio.is_finite() || ratio > u32::MAX as f64 {
            return Err(TreeParamError::invalid(
                "sketch_eps",
                self.sketch_eps,
                format!("sketch_ratio / sketch_eps ({ratio}) does not fit a sketch size"),
            ));
        }
        let size = ratio as u32;
        if size == 0 {
            return Err(TreeParamError::invalid(
                "sketch_ratio",
                self.sketch_ratio,
                format!("sketch_ratio / sketch_eps ({}) must be positive", self.sketch_eps),
            ));
        }
        Ok(size)
    }

    /// Copy of the regularization terms for hot loops
    pub fn elastic_net(&self) -> ElasticNet {
        ElasticNet {
            reg_lambda: self.reg_lambda,
            reg_alpha: self.reg_alpha,
            min_child_weight: self.min_child_weight,
            max_delta_step: self.max_delta_step,
        }
    }
}

impl RegParams for TrainParam {
    #[inline]
    fn reg_lambda(&self) -> f64 {
        self.reg_lambda
    }

    #[inline]
    fn reg_alpha(&self) -> f64 {
        self.reg_alpha
    }

    #[inline]
    fn min_child_weight(&self) -> f64 {
        self.min_child_weight
    }

    #[inline]
    fn max_delta_step(&self) -> f64 {
        self.max_delta_step
    }
}
