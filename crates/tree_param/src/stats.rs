//! Gradient/hessian sufficient statistics
//!
//! A node's statistics are the plain sums of its instances' first- and
//! second-order loss derivatives. The record is 16 bytes so arrays of it can
//! be reduced or shipped to an accelerator without repacking.

use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{AddAssign, Sub};

/// Summed gradient and hessian of a set of instances
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[repr(C, align(16))]
pub struct GradStats {
    /// Sum of gradients
    pub sum_grad: f64,
    /// Sum of hessians
    pub sum_hess: f64,
}

const _: () = assert!(std::mem::size_of::<GradStats>() == 16);

impl GradStats {
    pub const fn new(sum_grad: f64, sum_hess: f64) -> Self {
        Self { sum_grad, sum_hess }
    }

    #[inline]
    pub fn grad(&self) -> f64 {
        self.sum_grad
    }

    #[inline]
    pub fn hess(&self) -> f64 {
        self.sum_hess
    }

    /// Accumulate one instance
    #[inline]
    pub fn add(&mut self, grad: f64, hess: f64) {
        self.sum_grad += grad;
        self.sum_hess += hess;
    }

    /// Accumulate another record's totals
    #[inline]
    pub fn add_stats(&mut self, other: &GradStats) {
        self.sum_grad += other.sum_grad;
        self.sum_hess += other.sum_hess;
    }

    /// Set `self` to `a - b`.
    ///
    /// Used to derive one child from its parent and sibling. No check that
    /// `a` dominates `b` is made.
    #[inline]
    pub fn set_subtract(&mut self, a: &GradStats, b: &GradStats) {
        self.sum_grad = a.sum_grad - b.sum_grad;
        self.sum_hess = a.sum_hess - b.sum_hess;
    }

    /// All-reduce step, same as [`GradStats::add_stats`]
    #[inline]
    pub fn reduce(a: &mut GradStats, b: &GradStats) {
        a.add_stats(b);
    }

    /// Whether nothing has been accumulated yet
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sum_hess == 0.0
    }
}

impl From<(f64, f64)> for GradStats {
    fn from((grad, hess): (f64, f64)) -> Self {
        Self::new(grad, hess)
    }
}

impl AddAssign for GradStats {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.add_stats(&rhs);
    }
}

impl Sub for GradStats {
    type Output = GradStats;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        let mut out = GradStats::default();
        out.set_subtract(&self, &rhs);
        out
    }
}

impl Sum for GradStats {
    fn sum<I: Iterator<Item = GradStats>>(iter: I) -> Self {
        iter.fold(GradStats::default(), |mut acc, s| {
            acc.add_stats(&s);
            acc
        })
    }
}

impl<'a> Sum<&'a GradStats> for GradStats {
    fn sum<I: Iterator<Item = &'a GradStats>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn approx(a: &GradStats, b: &GradStats) -> bool {
        (a.sum_grad - b.sum_grad).abs() < EPS && (a.sum_hess - b.sum_hess).abs() < EPS
    }

    #[test]
    fn test_layout_is_16_bytes() {
        assert_eq!(std::mem::size_of::<GradStats>(), 16);
        assert_eq!(std::mem::align_of::<GradStats>(), 16);
    }

    #[test]
    fn test_add_instances() {
        let mut stats = GradStats::default();
        assert!(stats.is_empty());

        stats.add(-1.5, 0.25);
        stats.add(0.5, 0.75);

        assert_eq!(stats.grad(), -1.0);
        assert_eq!(stats.hess(), 1.0);
        assert!(!stats.is_empty());
    }

    #[test]
    fn test_empty_only_on_zero_hessian() {
        // gradient alone does not make the record non-empty
        let stats = GradStats::new(3.0, 0.0);
        assert!(stats.is_empty());
    }

    #[test]
    fn test_reduce_commutative_and_associative() {
        let a = GradStats::new(0.1, 0.2);
        let b = GradStats::new(-7.3, 4.4);
        let c = GradStats::new(1e3, 1e-3);

        let mut left = a;
        GradStats::reduce(&mut left, &b);
        GradStats::reduce(&mut left, &c);

        let mut bc = b;
        GradStats::reduce(&mut bc, &c);
        let mut right = a;
        GradStats::reduce(&mut right, &bc);

        let mut swapped = c;
        GradStats::reduce(&mut swapped, &a);
        GradStats::reduce(&mut swapped, &b);

        assert!(approx(&left, &right));
        assert!(approx(&left, &swapped));
    }

    #[test]
    fn test_set_subtract_matches_complement() {
        let instances = [(-1.0, 0.5), (2.0, 1.0), (0.25, 0.25), (-3.0, 2.0), (0.5, 1.5)];

        let parent: GradStats = instances.iter().map(|&p| GradStats::from(p)).sum();
        let left: GradStats = instances[..2].iter().map(|&p| GradStats::from(p)).sum();
        let direct_right: GradStats = instances[2..].iter().map(|&p| GradStats::from(p)).sum();

        let mut right = GradStats::default();
        right.set_subtract(&parent, &left);

        assert!(approx(&right, &direct_right));
        assert!(approx(&(parent - left), &direct_right));
    }
}
