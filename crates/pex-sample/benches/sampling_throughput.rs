use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pex_core::RngHandle;
use pex_doc::Node;
use pex_sample::{
    expand_runs, BoxAxis, BoxPartition, BoxUlam, FullGrid, GridParameter, MarkovBoxModel,
    SamplingStrategy,
};

fn sampling_bench(c: &mut Criterion) {
    let grid = FullGrid {
        parameters: (0..4)
            .map(|axis| GridParameter {
                address: format!("p{axis}"),
                values: (0..8).map(|v| Node::Float(v as f64 * 0.1)).collect(),
            })
            .collect(),
    };
    c.bench_function("full_grid_4x8", |b| {
        b.iter(|| {
            let points = grid.points(&mut RngHandle::from_seed(1)).unwrap();
            black_box(expand_runs(&points, 2).unwrap())
        });
    });

    let axes = vec![
        BoxAxis {
            address: "x".into(),
            lower: 0.0,
            upper: 1.0,
            boxes: 10,
            test_functions: 3,
        },
        BoxAxis {
            address: "y".into(),
            lower: 0.0,
            upper: 1.0,
            boxes: 10,
            test_functions: 3,
        },
    ];
    let ulam = BoxUlam::new(axes.clone()).unwrap();
    c.bench_function("box_ulam_10x10", |b| {
        b.iter(|| black_box(ulam.points(&mut RngHandle::from_seed(1)).unwrap()));
    });

    let partition = BoxPartition::new(axes).unwrap();
    let mut model = MarkovBoxModel::new(partition);
    for start in 0..100 {
        let x = ((start / 10) as f64 + 0.5) / 10.0;
        let y = (((start % 10) + 1) % 10) as f64 / 10.0 + 0.05;
        model.record(start, &[x, y]).unwrap();
    }
    c.bench_function("markov_eigenpairs_100", |b| {
        b.iter(|| black_box(model.dominant_eigenpairs(4)));
    });
}

criterion_group!(benches, sampling_bench);
criterion_main!(benches);
