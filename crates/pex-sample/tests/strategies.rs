use std::collections::BTreeSet;

use pex_core::RngHandle;
use pex_doc::Node;
use pex_sample::{
    DistributionSpec, FullGrid, GridParameter, ParameterDistribution, RandomParameter,
    RandomPerParameter, SamplingStrategy, StrategySpec, UserDefinedList,
};
use proptest::prelude::*;

fn grid(cardinalities: &[usize]) -> FullGrid {
    FullGrid {
        parameters: cardinalities
            .iter()
            .enumerate()
            .map(|(axis, &count)| GridParameter {
                address: format!("p{axis}"),
                values: (0..count).map(|v| Node::Int(v as i64)).collect(),
            })
            .collect(),
    }
}

#[test]
fn grid_ids_follow_product_order() {
    let points = grid(&[2, 3]).points(&mut RngHandle::from_seed(0)).unwrap();
    assert_eq!(points.len(), 6);
    assert_eq!(points[0].values["p0"], Node::Int(0));
    assert_eq!(points[0].values["p1"], Node::Int(0));
    assert_eq!(points[1].values["p1"], Node::Int(1));
    assert_eq!(points[3].values["p0"], Node::Int(1));
    for (idx, point) in points.iter().enumerate() {
        assert_eq!(point.parameter_id, idx);
        assert_eq!(point.run_id, 0);
    }
}

#[test]
fn grid_rejects_empty_candidate_list() {
    let err = grid(&[2, 0]).points(&mut RngHandle::from_seed(0)).unwrap_err();
    assert_eq!(err.info().code, "sampling.empty_candidates");
    assert_eq!(err.info().context.get("address").map(String::as_str), Some("p1"));
}

#[test]
fn user_defined_list_passes_through() {
    let yaml = "type: user-defined\npoints:\n  - {speed: 1.0}\n  - {speed: 2.0, count: 3}\n";
    let spec: StrategySpec = serde_yaml::from_str(yaml).unwrap();
    let points = spec.points(&mut RngHandle::from_seed(0)).unwrap();
    assert_eq!(points.len(), 2);
    assert_eq!(points[1].parameter_id, 1);
    assert_eq!(points[1].values["count"], Node::Int(3));

    let empty = UserDefinedList { points: Vec::new() };
    assert!(empty.points(&mut RngHandle::from_seed(0)).is_err());
}

#[test]
fn random_draws_are_reproducible_and_zipped_row_wise() {
    let spec = StrategySpec::Random {
        count: 5,
        parameters: vec![
            RandomParameter {
                address: "speed".into(),
                distribution: DistributionSpec::Uniform { low: 0.5, high: 1.5 },
            },
            RandomParameter {
                address: "agents".into(),
                distribution: DistributionSpec::Integer { low: 1, high: 4 },
            },
        ],
    };
    let a = spec.points(&mut RngHandle::from_seed(17)).unwrap();
    let b = spec.points(&mut RngHandle::from_seed(17)).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 5);
    for point in &a {
        let speed = point.values["speed"].as_f64().unwrap();
        assert!((0.5..1.5).contains(&speed));
        let Node::Int(agents) = point.values["agents"] else {
            panic!("integer expected")
        };
        assert!((1..=4).contains(&agents));
    }
}

#[test]
fn invalid_distribution_is_a_configuration_error() {
    let spec = StrategySpec::Random {
        count: 2,
        parameters: vec![RandomParameter {
            address: "speed".into(),
            distribution: DistributionSpec::Uniform { low: 2.0, high: 1.0 },
        }],
    };
    let err = spec.points(&mut RngHandle::from_seed(1)).unwrap_err();
    assert_eq!(err.info().code, "sampling.distribution");
}

#[test]
fn uniform_with_overflowing_span_is_a_configuration_error() {
    let dist = DistributionSpec::Uniform {
        low: -1e308,
        high: 1e308,
    };
    let err = dist.sample(3, &mut RngHandle::from_seed(1)).unwrap_err();
    assert_eq!(err.info().code, "sampling.distribution");
}

struct ShortDistribution;

impl ParameterDistribution for ShortDistribution {
    fn sample(&self, _count: usize, _rng: &mut RngHandle) -> Result<Vec<Node>, pex_core::PexError> {
        Ok(vec![Node::Int(1)])
    }
}

#[test]
fn distribution_ignoring_count_is_rejected() {
    let strategy = RandomPerParameter::new(3).with_parameter("x", ShortDistribution);
    let err = strategy.points(&mut RngHandle::from_seed(1)).unwrap_err();
    assert_eq!(err.info().code, "sampling.distribution");
}

proptest! {
    #[test]
    fn grid_size_is_product_of_cardinalities(cards in prop::collection::vec(1usize..5, 0..4)) {
        let points = grid(&cards).points(&mut RngHandle::from_seed(0)).unwrap();
        let expected: usize = cards.iter().product();
        prop_assert_eq!(points.len(), expected);
        let distinct: BTreeSet<String> = points
            .iter()
            .map(|p| serde_json::to_string(&p.values).unwrap())
            .collect();
        prop_assert_eq!(distinct.len(), expected);
    }
}
