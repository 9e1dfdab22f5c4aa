//! Monotone value constraints
//!
//! Each node carries a `[lower_bound, upper_bound]` interval its leaf weight
//! must fall in. Splitting on a monotone feature cuts the interval at the
//! midpoint of the two children's weights, so no leaf below the left child
//! can outgrow a leaf below the right child (or the reverse for decreasing
//! features).

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::gain::{calc_gain_given_weight, calc_weight_stats, RegParams};
use crate::param::TrainParam;
use crate::stats::GradStats;

/// Admissible leaf weight interval of one node.
///
/// Infinite bounds serialize as `null` and read back as the matching
/// infinity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueConstraint {
    #[serde(serialize_with = "serialize_bound", deserialize_with = "deserialize_lower")]
    pub lower_bound: f64,
    #[serde(serialize_with = "serialize_bound", deserialize_with = "deserialize_upper")]
    pub upper_bound: f64,
}

fn serialize_bound<S: Serializer>(bound: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    bound.is_finite().then_some(*bound).serialize(serializer)
}

fn deserialize_lower<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NEG_INFINITY))
}

fn deserialize_upper<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
}

impl Default for ValueConstraint {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl ValueConstraint {
    pub const fn unbounded() -> Self {
        Self {
            lower_bound: f64::NEG_INFINITY,
            upper_bound: f64::INFINITY,
        }
    }

    /// Pad the parameter's monotone constraints to `num_feature` entries
    pub fn init(param: &mut TrainParam, num_feature: usize) {
        param.monotone_constraints.resize(num_feature);
    }

    #[inline]
    pub fn is_unbounded(&self) -> bool {
        self.lower_bound == f64::NEG_INFINITY && self.upper_bound == f64::INFINITY
    }

    #[inline]
    pub fn contains(&self, weight: f64) -> bool {
        weight >= self.lower_bound && weight <= self.upper_bound
    }

    /// Optimal weight projected into the interval
    #[inline]
    pub fn calc_weight<P: RegParams + ?Sized>(&self, param: &P, stats: GradStats) -> f64 {
        let w = calc_weight_stats(param, stats);
        if w < self.lower_bound {
            return self.lower_bound;
        }
        if w > self.upper_bound {
            return self.upper_bound;
        }
        w
    }

    /// Gain at the projected weight
    #[inline]
    pub fn calc_gain<P: RegParams + ?Sized>(&self, param: &P, stats: GradStats) -> f64 {
        calc_gain_given_weight(
            param,
            stats.sum_grad,
            stats.sum_hess,
            self.calc_weight(param, stats),
        )
    }

    /// Gain of splitting into `left` and `right`.
    ///
    /// `direction > 0` requires `wleft <= wright`, `direction < 0` requires
    /// `wleft >= wright`; a violating split scores negative infinity.
    #[inline]
    pub fn calc_split_gain<P: RegParams + ?Sized>(
        &self,
        param: &P,
        direction: i32,
        left: GradStats,
        right: GradStats,
    ) -> f64 {
        let wleft = self.calc_weight(param, left);
        let wright = self.calc_weight(param, right);
        let gain = calc_gain_given_weight(param, left.sum_grad, left.sum_hess, wleft)
            + calc_gain_given_weight(param, right.sum_grad, right.sum_hess, wright);

        if direction == 0 {
            gain
        } else if direction > 0 {
            if wleft <= wright {
                gain
            } else {
                f64::NEG_INFINITY
            }
        } else if wleft >= wright {
            gain
        } else {
            f64::NEG_INFINITY
        }
    }

    /// Derive the children's constraints after splitting on `split_index`.
    ///
    /// # Panics
    ///
    /// Panics if the midpoint of the children's weights is NaN.
    pub fn set_child(
        &self,
        param: &TrainParam,
        split_index: u32,
        left: GradStats,
        right: GradStats,
    ) -> (ValueConstraint, ValueConstraint) {
        let direction = param.monotone_constraints.direction(split_index as usize);
        let mut cleft = *self;
        let mut cright = *self;
        if direction == 0 {
            return (cleft, cright);
        }

        let wleft = self.calc_weight(param, left);
        let wright = self.calc_weight(param, right);
        let mid = (wleft + wright) / 2.0;
        assert!(
            !mid.is_nan(),
            "monotone midpoint is NaN (wleft = {wleft}, wright = {wright})"
        );

        if direction < 0 {
            cleft.lower_bound = mid;
            cright.upper_bound = mid;
        } else {
            cleft.upper_bound = mid;
            cright.lower_bound = mid;
        }
        (cleft, cright)
    }
}
