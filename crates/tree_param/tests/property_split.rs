use ippan_tree_param::{
    calc_gain, calc_weight, fold_splits, par_reduce_splits, par_sum_stats, tree_reduce_splits,
    ElasticNet, GradStats, MonotoneConstraints, SplitEntry, TrainParam, ValueConstraint,
};
use proptest::prelude::*;
use std::collections::HashSet;

/// Few distinct gains so ties on loss change are common
const GAINS: [f32; 5] = [-1.0, 0.0, 0.5, 2.0, 7.25];

fn record(gain: u8, index: u32, default_left: bool) -> SplitEntry {
    let mut e = SplitEntry::new();
    e.loss_chg = f32::NEG_INFINITY;
    e.update_with(
        GAINS[gain as usize],
        index,
        index as f32 + 0.5,
        default_left,
        GradStats::new(-(index as f64), 1.0 + gain as f64),
        GradStats::new(index as f64, 2.0),
    );
    e
}

/// Records with unique `(loss_chg, index)` pairs
fn unique_records() -> impl Strategy<Value = Vec<SplitEntry>> {
    prop::collection::hash_set((0u8..GAINS.len() as u8, 0u32..48, any::<bool>()), 1..40).prop_map(
        |set| {
            let mut seen = HashSet::new();
            set.into_iter()
                .filter(|&(gain, index, _)| seen.insert((gain, index)))
                .map(|(gain, index, default_left)| record(gain, index, default_left))
                .collect()
        },
    )
}

proptest! {
    #[test]
    fn merge_is_independent_of_order_and_shape(
        (records, shuffled) in unique_records()
            .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
    ) {
        let folded = fold_splits(&records);

        prop_assert_eq!(tree_reduce_splits(&records), folded);
        prop_assert_eq!(par_reduce_splits(&records), folded);
        prop_assert_eq!(fold_splits(&shuffled), folded);
        prop_assert_eq!(tree_reduce_splits(&shuffled), folded);
        prop_assert_eq!(par_reduce_splits(&shuffled), folded);

        for k in 0..records.len() {
            let mut rotated = records.clone();
            rotated.rotate_left(k);
            prop_assert_eq!(fold_splits(&rotated).digest(), folded.digest());
        }
    }

    #[test]
    fn merge_picks_highest_gain_then_lowest_index(records in unique_records()) {
        let best = fold_splits(&records);
        for r in &records {
            prop_assert!(
                r.loss_chg < best.loss_chg
                    || (r.loss_chg == best.loss_chg && r.split_index() >= best.split_index())
            );
        }
    }

    #[test]
    fn stats_sum_is_associative(
        pairs in prop::collection::vec((-1_000i32..1_000, 0i32..1_000), 0..200)
    ) {
        // integer-valued sums are exact, so any grouping must agree bit for bit
        let stats: Vec<GradStats> = pairs
            .iter()
            .map(|&(g, h)| GradStats::new(g as f64, h as f64))
            .collect();

        let sequential: GradStats = stats.iter().sum();
        let mut reversed = GradStats::default();
        for s in stats.iter().rev() {
            GradStats::reduce(&mut reversed, s);
        }

        prop_assert_eq!(par_sum_stats(&stats), sequential);
        prop_assert_eq!(reversed, sequential);
    }

    #[test]
    fn subtract_recovers_sibling(
        left in (-1e6f64..1e6, 0f64..1e6),
        right in (-1e6f64..1e6, 0f64..1e6),
    ) {
        let left = GradStats::from(left);
        let right = GradStats::from(right);
        let mut parent = left;
        parent.add_stats(&right);

        let mut sibling = GradStats::default();
        sibling.set_subtract(&parent, &left);

        let tolerance = |x: f64| 1e-6 * (1.0 + x.abs());
        prop_assert!((sibling.sum_grad - right.sum_grad).abs() <= tolerance(right.sum_grad));
        prop_assert!((sibling.sum_hess - right.sum_hess).abs() <= tolerance(right.sum_hess));
    }

    #[test]
    fn gain_is_non_negative_and_weight_is_clipped(
        sum_grad in -1e3f64..1e3,
        sum_hess in 0f64..1e3,
        reg_lambda in 0.01f64..10.0,
        reg_alpha in 0f64..5.0,
        max_delta_step in 0f64..2.0,
    ) {
        let p = ElasticNet {
            reg_lambda,
            reg_alpha,
            min_child_weight: 0.0,
            max_delta_step,
        };
        let unclipped = ElasticNet { max_delta_step: 0.0, ..p };

        prop_assert!(calc_gain(&unclipped, sum_grad, sum_hess) >= 0.0);

        let w = calc_weight(&p, sum_grad, sum_hess);
        if max_delta_step > 0.0 {
            prop_assert!(w.abs() <= max_delta_step);
        }
        // weight pulls against the gradient
        prop_assert!(w * sum_grad <= 0.0);
    }

    #[test]
    fn monotone_children_partition_parent(
        lower in -10f64..0.0,
        upper in 0f64..10.0,
        left in (-100f64..100.0, 1f64..50.0),
        right in (-100f64..100.0, 1f64..50.0),
        increasing in any::<bool>(),
    ) {
        let direction = if increasing { 1 } else { -1 };
        let param = TrainParam {
            monotone_constraints: MonotoneConstraints::new(vec![direction]).unwrap(),
            ..TrainParam::default()
        };
        let parent = ValueConstraint { lower_bound: lower, upper_bound: upper };

        let (cleft, cright) =
            parent.set_child(&param, 0, GradStats::from(left), GradStats::from(right));

        if increasing {
            prop_assert_eq!(cleft.upper_bound, cright.lower_bound);
            prop_assert_eq!(cleft.lower_bound, lower);
            prop_assert_eq!(cright.upper_bound, upper);
            prop_assert!(parent.contains(cleft.upper_bound));
        } else {
            prop_assert_eq!(cleft.lower_bound, cright.upper_bound);
            prop_assert_eq!(cleft.upper_bound, upper);
            prop_assert_eq!(cright.lower_bound, lower);
            prop_assert!(parent.contains(cleft.lower_bound));
        }
    }
}
