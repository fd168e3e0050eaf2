use std::collections::HashSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use visage_forest::{
    Forest, ForestBuilder, ForestConfig, ForestError, ForestIndex, VectorSet, euclidean_distance,
    identity_of,
};

fn clustered_set(identities: usize, per_identity: usize, dim: usize, seed: u64) -> VectorSet {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut triples = Vec::new();
    for id in 0..identities {
        let center: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
        for n in 0..per_identity {
            let v: Vec<f32> = center
                .iter()
                .map(|c| c + rng.gen_range(-0.05f32..0.05))
                .collect();
            triples.push((format!("performer-{id}"), format!("img{n}.jpg"), v));
        }
    }
    VectorSet::from_triples(triples).unwrap()
}

fn config(seed: u64) -> ForestConfig {
    ForestConfig {
        trees: 12,
        leaf_capacity: 8,
        seed,
        ..Default::default()
    }
}

fn encode(forest: &Forest) -> Vec<u8> {
    let mut fb = Vec::new();
    let mut lb = Vec::new();
    forest.save(&mut fb, &mut lb).unwrap();
    fb
}

#[test]
fn build_save_load_query() {
    let dir = tempfile::tempdir().unwrap();
    let set = clustered_set(30, 4, 16, 1);
    let probe = set.vector(17).unwrap().to_vec();

    ForestBuilder::new(config(5))
        .build(set)
        .unwrap()
        .save_files(dir.path())
        .unwrap();

    let index = ForestIndex::new(Forest::load_files(dir.path()).unwrap());
    let hits = index.query(&probe, 4, 0).unwrap();
    assert_eq!(hits[0].ordinal, 17);
    assert_eq!(hits[0].distance, 0.0);

    // The probe's identity owns the closest reference vectors.
    let items = index.forest().items();
    let want = identity_of(items.label(17).unwrap()).to_string();
    for hit in &hits {
        let label = items.label(hit.ordinal as usize).unwrap();
        assert_eq!(identity_of(label), want);
    }
}

#[test]
fn same_seed_serializes_identically_regardless_of_threads() {
    let single = rayon::ThreadPoolBuilder::new()
        .num_threads(1)
        .build()
        .unwrap()
        .install(|| ForestBuilder::new(config(77)).build(clustered_set(20, 3, 8, 2)).unwrap());
    let many = rayon::ThreadPoolBuilder::new()
        .num_threads(4)
        .build()
        .unwrap()
        .install(|| ForestBuilder::new(config(77)).build(clustered_set(20, 3, 8, 2)).unwrap());

    assert_eq!(encode(&single), encode(&many));

    let q = vec![0.1; 8];
    let a = ForestIndex::new(single).query(&q, 10, 30).unwrap();
    let b = ForestIndex::new(many).query(&q, 10, 30).unwrap();
    assert_eq!(a, b);
}

#[test]
fn different_seeds_give_different_forests() {
    let a = ForestBuilder::new(config(1)).build(clustered_set(20, 3, 8, 3)).unwrap();
    let b = ForestBuilder::new(config(2)).build(clustered_set(20, 3, 8, 3)).unwrap();
    assert_ne!(encode(&a), encode(&b));
}

#[test]
fn concurrent_queries_agree() {
    let set = clustered_set(40, 3, 12, 4);
    let probes: Vec<Vec<f32>> = (0..8).map(|i| set.vector(i * 13).unwrap().to_vec()).collect();
    let index = Arc::new(ForestIndex::new(ForestBuilder::new(config(9)).build(set).unwrap()));

    let expected: Vec<_> = probes
        .iter()
        .map(|p| index.query(p, 5, 50).unwrap())
        .collect();

    std::thread::scope(|s| {
        for _ in 0..4 {
            let index = Arc::clone(&index);
            let probes = &probes;
            let expected = &expected;
            s.spawn(move || {
                for (p, want) in probes.iter().zip(expected.iter()) {
                    assert_eq!(&index.query(p, 5, 50).unwrap(), want);
                }
            });
        }
    });
}

#[test]
fn recall_grows_with_budget() {
    let dim = 24;
    let mut rng = StdRng::seed_from_u64(10);
    let mut set = VectorSet::new();
    for i in 0..1500 {
        let v: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
        set.insert(&v, format!("x{i}")).unwrap();
    }
    let vecs: Vec<Vec<f32>> = (0..1500).map(|i| set.vector(i).unwrap().to_vec()).collect();
    let index = ForestIndex::new(ForestBuilder::new(config(6)).build(set).unwrap());

    let queries: Vec<Vec<f32>> = (0..30)
        .map(|_| (0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect())
        .collect();

    let recall = |budget: usize| -> f64 {
        let mut total = 0.0;
        for q in &queries {
            let mut truth: Vec<(u32, f32)> = vecs
                .iter()
                .enumerate()
                .map(|(i, v)| (i as u32, euclidean_distance(q, v)))
                .collect();
            truth.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
            let truth: HashSet<u32> = truth.iter().take(10).map(|t| t.0).collect();
            let hits = index.query(q, 10, budget).unwrap();
            total += hits.iter().filter(|h| truth.contains(&h.ordinal)).count() as f64 / 10.0;
        }
        total / queries.len() as f64
    };

    let low = recall(20);
    let full = recall(1500);
    assert!(full >= low);
    assert_eq!(full, 1.0);
}

#[test]
fn dimension_mismatch_after_load() {
    let dir = tempfile::tempdir().unwrap();
    ForestBuilder::new(config(0))
        .build(clustered_set(5, 2, 6, 5))
        .unwrap()
        .save_files(dir.path())
        .unwrap();
    let index = ForestIndex::new(Forest::load_files(dir.path()).unwrap());
    assert!(matches!(
        index.query(&[0.0; 5], 3, 0),
        Err(ForestError::DimensionMismatch { expected: 6, got: 5 })
    ));
}
