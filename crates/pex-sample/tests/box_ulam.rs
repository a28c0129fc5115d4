use pex_core::RngHandle;
use pex_sample::{BoxAxis, BoxPartition, BoxUlam, MarkovBoxModel, SamplingStrategy};
use proptest::prelude::*;

fn axis(address: &str, lower: f64, upper: f64, boxes: usize, test_functions: usize) -> BoxAxis {
    BoxAxis {
        address: address.into(),
        lower,
        upper,
        boxes,
        test_functions,
    }
}

#[test]
fn one_dimensional_points_are_interior_and_tagged() {
    let strategy = BoxUlam::new(vec![axis("x", 0.0, 1.0, 2, 3)]).unwrap();
    let points = strategy.points(&mut RngHandle::from_seed(0)).unwrap();
    let xs: Vec<f64> = points.iter().map(|p| p.values["x"].as_f64().unwrap()).collect();
    let expected = [0.125, 0.25, 0.375, 0.625, 0.75, 0.875];
    for (got, want) in xs.iter().zip(expected) {
        assert!((got - want).abs() < 1e-12, "{got} vs {want}");
    }
    let boxes: Vec<_> = points.iter().map(|p| p.box_id.unwrap()).collect();
    assert_eq!(boxes, vec![0, 0, 0, 1, 1, 1]);
}

#[test]
fn two_dimensional_ids_are_row_major() {
    let strategy = BoxUlam::new(vec![axis("x", 0.0, 2.0, 2, 1), axis("y", 0.0, 3.0, 3, 1)]).unwrap();
    let points = strategy.points(&mut RngHandle::from_seed(0)).unwrap();
    assert_eq!(points.len(), 6);
    let ids: Vec<_> = points.iter().map(|p| p.box_id.unwrap()).collect();
    assert_eq!(ids, vec![0, 1, 2, 3, 4, 5]);
    let partition = strategy.partition();
    assert_eq!(partition.box_indices(4), vec![1, 1]);
    assert_eq!(partition.bounds(5), vec![(1.0, 2.0), (2.0, 3.0)]);
}

#[test]
fn axis_validation() {
    assert!(BoxUlam::new(vec![]).is_err());
    assert!(BoxUlam::new(vec![axis("x", 1.0, 0.0, 2, 1)]).is_err());
    assert!(BoxUlam::new(vec![axis("x", 0.0, 1.0, 0, 1)]).is_err());
    let four = (0..4).map(|i| axis(&format!("a{i}"), 0.0, 1.0, 1, 1)).collect();
    assert!(BoxUlam::new(four).is_err());
}

#[test]
fn markov_rows_normalize_and_empty_rows_self_loop() {
    let partition = BoxPartition::new(vec![axis("x", 0.0, 3.0, 3, 1)]).unwrap();
    let mut model = MarkovBoxModel::new(partition);
    assert_eq!(model.record(0, &[0.5]).unwrap(), Some(0));
    assert_eq!(model.record(0, &[1.5]).unwrap(), Some(1));
    assert_eq!(model.record(0, &[1.7]).unwrap(), Some(1));
    assert_eq!(model.record(1, &[2.5]).unwrap(), Some(2));
    assert_eq!(model.record(1, &[9.0]).unwrap(), None);
    assert!(model.record(7, &[0.5]).is_err());

    let matrix = model.transition_matrix();
    assert!((matrix[(0, 0)] - 1.0 / 3.0).abs() < 1e-12);
    assert!((matrix[(0, 1)] - 2.0 / 3.0).abs() < 1e-12);
    assert_eq!(matrix[(1, 2)], 1.0);
    assert_eq!(matrix[(2, 2)], 1.0);

    let report = model.report(&[0, 1], 2, 3).unwrap();
    assert_eq!(report.out_of_domain, 1);
    assert_eq!(report.propagation.len(), 3);
    assert_eq!(report.propagation[0], vec![0.5, 0.5, 0.0]);
    for step in &report.propagation {
        assert!((step.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }
}

#[test]
fn absorbing_chain_has_unit_dominant_eigenvalue() {
    let partition = BoxPartition::new(vec![axis("x", 0.0, 2.0, 2, 1)]).unwrap();
    let mut model = MarkovBoxModel::new(partition);
    model.record(0, &[0.5]).unwrap();
    model.record(0, &[1.5]).unwrap();
    model.record(1, &[1.5]).unwrap();
    let pairs = model.dominant_eigenpairs(2);
    assert_eq!(pairs.len(), 2);
    assert!((pairs[0].modulus - 1.0).abs() < 1e-9);
    assert!((pairs[1].modulus - 0.5).abs() < 1e-9);
    // Stationary distribution concentrates on the absorbing box.
    assert!(pairs[0].vector_re[0].abs() < 1e-6);
    assert!((pairs[0].vector_re[1] - 1.0).abs() < 1e-6);
    let relaxation = MarkovBoxModel::relaxation_time(&pairs).unwrap();
    assert!((relaxation - 2.0).abs() < 1e-6);
}

#[test]
fn rotating_chain_has_complex_eigenvalues_on_the_unit_circle() {
    let partition = BoxPartition::new(vec![axis("x", 0.0, 3.0, 3, 1)]).unwrap();
    let mut model = MarkovBoxModel::new(partition);
    model.record(0, &[1.5]).unwrap();
    model.record(1, &[2.5]).unwrap();
    model.record(2, &[0.5]).unwrap();
    let pairs = model.dominant_eigenpairs(3);
    assert_eq!(pairs.len(), 3);
    for pair in &pairs {
        assert!((pair.modulus - 1.0).abs() < 1e-9);
    }
    assert!(pairs.iter().any(|pair| pair.im.abs() > 0.5));
    assert!(MarkovBoxModel::relaxation_time(&pairs).is_none());
}

proptest! {
    #[test]
    fn every_domain_point_has_exactly_one_box(
        boxes in 1usize..12,
        lower in -50.0f64..50.0,
        span in 0.1f64..100.0,
        frac in 0.0f64..=1.0,
    ) {
        let axis = axis("x", lower, lower + span, boxes, 1);
        let value = lower + frac * span;
        let index = axis.box_index(value);
        prop_assert!(index.is_some());
        let index = index.unwrap();
        prop_assert!(index < boxes);
        let containing = (0..boxes)
            .filter(|&i| {
                let lo = lower + i as f64 * axis.box_width();
                let hi = if i + 1 == boxes { lower + span } else { lo + axis.box_width() };
                value >= lo && (value < hi || (i + 1 == boxes && value <= hi))
            })
            .count();
        prop_assert!(containing <= 1);
    }

    #[test]
    fn sampled_points_map_back_to_their_box(
        bx in 1usize..5,
        by in 1usize..5,
        tf in 1usize..4,
    ) {
        let strategy = BoxUlam::new(vec![axis("x", -1.0, 1.0, bx, tf), axis("y", 0.0, 5.0, by, tf)]).unwrap();
        let points = strategy.points(&mut RngHandle::from_seed(0)).unwrap();
        prop_assert_eq!(points.len(), bx * tf * by * tf);
        for point in &points {
            let coords = [point.values["x"].as_f64().unwrap(), point.values["y"].as_f64().unwrap()];
            prop_assert_eq!(strategy.partition().locate(&coords), point.box_id);
        }
    }

    #[test]
    fn observed_rows_sum_to_one(transitions in prop::collection::vec((0usize..4, 0.0f64..4.0), 1..40)) {
        let partition = BoxPartition::new(vec![axis("x", 0.0, 4.0, 4, 1)]).unwrap();
        let mut model = MarkovBoxModel::new(partition);
        for (start, end) in &transitions {
            model.record(*start, &[*end]).unwrap();
        }
        let matrix = model.transition_matrix();
        for row in 0..4 {
            let sum: f64 = matrix.row(row).iter().sum();
            prop_assert!((sum - 1.0).abs() < 1e-9);
        }
    }
}
