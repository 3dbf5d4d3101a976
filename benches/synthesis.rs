use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fairbalance::balance::{BalancerConfig, SubgroupBalancer};
use fairbalance::dataset::Dataset;
use fairbalance::synthetic::{majority_targets, SynthesisStrategy, SyntheticRecordSynthesizer};
use rand::prelude::*;

fn create_imbalanced_data(n_rows: usize, n_features: usize, groups: usize) -> Dataset {
    let mut rng = StdRng::seed_from_u64(0);
    let mut names: Vec<String> = vec!["group".to_string()];
    names.extend((0..n_features).map(|i| format!("feature_{}", i)));
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();

    let rows = (0..n_rows)
        .map(|_| {
            let group = rng.gen_range(0..groups) as f64;
            let mut values = vec![group];
            values.extend((0..n_features).map(|_| rng.gen::<f64>()));
            // positives get rarer with the group index
            let label = if rng.gen::<f64>() < 0.5 / (1.0 + group) { 1 } else { 0 };
            (values, label)
        })
        .collect();

    Dataset::from_numeric(&name_refs, "action_taken", rows).unwrap()
}

fn bench_synthesis(c: &mut Criterion) {
    let mut group = c.benchmark_group("synthesis");
    group.sample_size(10);

    for n_rows in [500, 2000].iter() {
        let ds = create_imbalanced_data(*n_rows, 8, 1);
        let targets = majority_targets(&ds, &[0, 1]);

        for strategy in [SynthesisStrategy::Smote, SynthesisStrategy::Crossover] {
            let synthesizer = SyntheticRecordSynthesizer::new(strategy);
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", strategy), n_rows),
                &ds,
                |b, ds| {
                    b.iter(|| {
                        let mut rng = StdRng::seed_from_u64(42);
                        synthesizer.synthesize(black_box(ds), &targets, &mut rng).unwrap()
                    })
                },
            );
        }
    }

    group.finish();
}

fn bench_balancing(c: &mut Criterion) {
    let mut group = c.benchmark_group("balancing");
    group.sample_size(10);

    let attributes = vec!["group".to_string()];
    for n_rows in [1000, 4000].iter() {
        let ds = create_imbalanced_data(*n_rows, 8, 4);
        let balancer = SubgroupBalancer::new(
            BalancerConfig::default()
                .with_seed(42)
                .with_skip_failed_subgroups(true),
        );

        group.bench_with_input(BenchmarkId::new("balance", n_rows), &ds, |b, ds| {
            b.iter(|| balancer.balance(black_box(ds), &attributes).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_synthesis, bench_balancing);
criterion_main!(benches);
