use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use visage_forest::{ForestBuilder, ForestConfig, ForestIndex, VectorSet};

fn random_unit_vec(rng: &mut StdRng, dim: usize) -> Vec<f32> {
    let v: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
    let norm = v.iter().map(|&x| x * x).sum::<f32>().sqrt().max(f32::EPSILON);
    v.into_iter().map(|x| x / norm).collect()
}

fn make_set(dim: usize, n: usize) -> VectorSet {
    let mut rng = StdRng::seed_from_u64(dim as u64);
    let mut set = VectorSet::with_dim(dim);
    for i in 0..n {
        set.insert(&random_unit_vec(&mut rng, dim), format!("p{}={i}", i / 4))
            .unwrap();
    }
    set
}

fn bench_build(c: &mut Criterion) {
    let set = make_set(512, 2000);

    c.bench_function("forest_build_512d_2000items_10trees", |b| {
        b.iter_with_setup(
            || set.clone(),
            |set| {
                let forest = ForestBuilder::new(ForestConfig {
                    trees: 10,
                    ..Default::default()
                })
                .build(set)
                .unwrap();
                black_box(forest);
            },
        );
    });
}

fn bench_query(c: &mut Criterion) {
    let forest = ForestBuilder::new(ForestConfig {
        trees: 50,
        ..Default::default()
    })
    .build(make_set(512, 5000))
    .unwrap();
    let index = ForestIndex::new(forest);
    let query = random_unit_vec(&mut StdRng::seed_from_u64(999_999), 512);

    c.bench_function("forest_query_512d_5000items_budget1000", |b| {
        b.iter(|| {
            let _ = black_box(index.query(black_box(&query), 50, 1000));
        });
    });
}

criterion_group!(benches, bench_build, bench_query);
criterion_main!(benches);
