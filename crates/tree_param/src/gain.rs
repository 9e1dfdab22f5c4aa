//! Regularized leaf weight and gain
//!
//! Closed-form elastic-net solution of the second-order loss approximation:
//!
//! ```text
//! w*   = -T(G, α) / (H + λ)          T = L1 soft threshold
//! gain =  T(G, α)² / (H + λ)
//! ```
//!
//! When `max_delta_step` is set the weight is clipped and the gain is
//! evaluated at the clipped weight instead.
//!
//! All functions are pure and allocation-free.

use crate::stats::GradStats;

/// Regularization hyperparameters read by the weight/gain functions
pub trait RegParams {
    /// L2 penalty (λ)
    fn reg_lambda(&self) -> f64;
    /// L1 penalty (α)
    fn reg_alpha(&self) -> f64;
    /// Minimum hessian sum a node needs before its weight is trusted
    fn min_child_weight(&self) -> f64;
    /// Weight clip, 0 disables clipping
    fn max_delta_step(&self) -> f64;
}

/// Plain copy of the four regularization terms.
///
/// Hot loops take this instead of the full [`crate::TrainParam`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElasticNet {
    pub reg_lambda: f64,
    pub reg_alpha: f64,
    pub min_child_weight: f64,
    pub max_delta_step: f64,
}

impl Default for ElasticNet {
    fn default() -> Self {
        Self {
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            min_child_weight: 1.0,
            max_delta_step: 0.0,
        }
    }
}

impl RegParams for ElasticNet {
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

impl<P: RegParams + ?Sized> RegParams for &P {
    #[inline]
    fn reg_lambda(&self) -> f64 {
        (**self).reg_lambda()
    }

    #[inline]
    fn reg_alpha(&self) -> f64 {
        (**self).reg_alpha()
    }

    #[inline]
    fn min_child_weight(&self) -> f64 {
        (**self).min_child_weight()
    }

    #[inline]
    fn max_delta_step(&self) -> f64 {
        (**self).max_delta_step()
    }
}

/// L1 proximal operator.
///
/// Returns:
/// - `value - alpha` if `value > alpha`
/// - `value + alpha` if `value < -alpha`
/// - `0` otherwise
#[inline]
pub fn soft_threshold(value: f64, alpha: f64) -> f64 {
    if value > alpha {
        value - alpha
    } else if value < -alpha {
        value + alpha
    } else {
        0.0
    }
}

/// Optimal leaf weight for the given statistics.
///
/// Nodes lighter than `min_child_weight` (or with no hessian) get `0`.
#[inline]
pub fn calc_weight<P: RegParams + ?Sized>(p: &P, sum_grad: f64, sum_hess: f64) -> f64 {
    if sum_hess < p.min_child_weight() || sum_hess <= 0.0 {
        return 0.0;
    }
    let mut dw = -soft_threshold(sum_grad, p.reg_alpha()) / (sum_hess + p.reg_lambda());
    let max_delta = p.max_delta_step();
    if max_delta != 0.0 {
        if dw > max_delta {
            dw = max_delta;
        }
        if dw < -max_delta {
            dw = -max_delta;
        }
    }
    dw
}

/// Negative regularized quadratic loss at weight `w`
#[inline]
pub fn calc_gain_given_weight<P: RegParams + ?Sized>(
    p: &P,
    sum_grad: f64,
    sum_hess: f64,
    w: f64,
) -> f64 {
    -(2.0 * sum_grad * w + (sum_hess + p.reg_lambda()) * w * w)
}

/// Loss reduction of a single node at its optimal weight
#[inline]
pub fn calc_gain<P: RegParams + ?Sized>(p: &P, sum_grad: f64, sum_hess: f64) -> f64 {
    if sum_hess < p.min_child_weight() {
        return 0.0;
    }
    if p.max_delta_step() == 0.0 {
        let g = soft_threshold(sum_grad, p.reg_alpha());
        g * g / (sum_hess + p.reg_lambda())
    } else {
        let w = calc_weight(p, sum_grad, sum_hess);
        let gain = calc_gain_given_weight(p, sum_grad, sum_hess, w);
        if p.reg_alpha() != 0.0 {
            gain + p.reg_alpha() * w.abs()
        } else {
            gain
        }
    }
}

#[inline]
pub fn calc_weight_stats<P: RegParams + ?Sized>(p: &P, stats: GradStats) -> f64 {
    calc_weight(p, stats.sum_grad, stats.sum_hess)
}

#[inline]
pub fn calc_gain_stats<P: RegParams + ?Sized>(p: &P, stats: GradStats) -> f64 {
    calc_gain(p, stats.sum_grad, stats.sum_hess)
}

/// Gain of `test` statistics evaluated at the weight fitted on `train`.
///
/// The L1 term of the fitted weight is added back, matching [`calc_gain`]
/// on the clipped path.
#[inline]
pub fn calc_gain_on_test<P: RegParams + ?Sized>(p: &P, train: GradStats, test: GradStats) -> f64 {
    let w = calc_weight_stats(p, train);
    let gain = calc_gain_given_weight(p, test.sum_grad, test.sum_hess, w);
    if p.reg_alpha() != 0.0 {
        gain + p.reg_alpha() * w.abs()
    } else {
        gain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn params(reg_alpha: f64, max_delta_step: f64) -> ElasticNet {
        ElasticNet {
            reg_lambda: 1.0,
            reg_alpha,
            min_child_weight: 1.0,
            max_delta_step,
        }
    }

    #[test]
    fn test_soft_threshold() {
        assert_eq!(soft_threshold(5.0, 2.0), 3.0);
        assert_eq!(soft_threshold(-5.0, 2.0), -3.0);
        assert_eq!(soft_threshold(1.5, 2.0), 0.0);
        assert_eq!(soft_threshold(-2.0, 2.0), 0.0);
        assert_eq!(soft_threshold(-10.0, 0.0), -10.0);
    }

    #[test]
    fn test_ridge_weight_and_gain() {
        let p = params(0.0, 0.0);
        assert!((calc_weight(&p, -10.0, 5.0) - 10.0 / 6.0).abs() < EPS);
        assert!((calc_gain(&p, -10.0, 5.0) - 100.0 / 6.0).abs() < EPS);
    }

    #[test]
    fn test_elastic_net_weight_and_gain() {
        let p = params(3.0, 0.0);
        assert_eq!(soft_threshold(-10.0, 3.0), -7.0);
        assert!((calc_weight(&p, -10.0, 5.0) - 7.0 / 6.0).abs() < EPS);
        assert!((calc_gain(&p, -10.0, 5.0) - 49.0 / 6.0).abs() < EPS);
    }

    #[test]
    fn test_max_delta_step_clips_weight() {
        let p = params(0.0, 0.5);
        assert_eq!(calc_weight(&p, -10.0, 5.0), 0.5);
        assert_eq!(calc_weight(&p, 10.0, 5.0), -0.5);
        assert!((calc_gain_given_weight(&p, -10.0, 5.0, 0.5) - 8.5).abs() < EPS);
        assert!((calc_gain(&p, -10.0, 5.0) - 8.5).abs() < EPS);
    }

    #[test]
    fn test_clipped_gain_adds_back_l1_term() {
        let p = params(3.0, 0.5);
        // clipped weight 0.5; -(2*(-10)*0.5 + 6*0.25) + 3*0.5
        assert_eq!(calc_weight(&p, -10.0, 5.0), 0.5);
        assert!((calc_gain(&p, -10.0, 5.0) - 10.0).abs() < EPS);
    }

    #[test]
    fn test_light_nodes_are_ignored() {
        let p = ElasticNet {
            min_child_weight: 4.0,
            ..ElasticNet::default()
        };
        for g in [-100.0, -1.0, 0.0, 3.5, 1e6] {
            assert_eq!(calc_gain(&p, g, 3.9), 0.0);
            assert_eq!(calc_weight(&p, g, 3.9), 0.0);
        }
    }

    #[test]
    fn test_zero_hessian_weight_is_zero() {
        let p = ElasticNet {
            min_child_weight: 0.0,
            reg_lambda: 0.0,
            ..ElasticNet::default()
        };
        assert_eq!(calc_weight(&p, -4.0, 0.0), 0.0);
    }

    #[test]
    fn test_optimal_weight_maximizes_gain() {
        let p = params(0.0, 0.0);
        let w = calc_weight(&p, -10.0, 5.0);
        let best = calc_gain_given_weight(&p, -10.0, 5.0, w);
        assert!((best - calc_gain(&p, -10.0, 5.0)).abs() < EPS);
        for dw in [-0.1, 0.1, 0.5] {
            assert!(calc_gain_given_weight(&p, -10.0, 5.0, w + dw) < best);
        }
    }

    #[test]
    fn test_stats_wrappers_and_test_gain() {
        let p = params(0.0, 0.0);
        let stats = GradStats::new(-10.0, 5.0);
        assert_eq!(calc_weight_stats(&p, stats), calc_weight(&p, -10.0, 5.0));
        assert_eq!(calc_gain_stats(&p, stats), calc_gain(&p, -10.0, 5.0));

        // evaluating the training statistics on themselves is the node gain
        assert!((calc_gain_on_test(&p, stats, stats) - 100.0 / 6.0).abs() < EPS);

        let test = GradStats::new(-2.0, 5.0);
        let w = 10.0 / 6.0;
        let expected = -(2.0 * -2.0 * w + 6.0 * w * w);
        assert!((calc_gain_on_test(&p, stats, test) - expected).abs() < EPS);
    }
}
