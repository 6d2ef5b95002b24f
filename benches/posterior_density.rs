use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use ndarray::array;
use pima::logit::features::FeatureSet;
use pima::logit::prior::{
    FlatPrior, LogPrior, NormalExponentialPrior, PriorHyperparameters, log_prior_density,
};
use pima::logit::sampler::{LogisticPosterior, PosteriorTarget};
use pima::logit::test_fixtures::SyntheticDataBuilder;
use std::hint::black_box;

fn benchmark_prior(c: &mut Criterion) {
    let hyper = PriorHyperparameters::default();
    let beta = array![-9.0, 0.035, 0.09, 0.9, 0.001];

    let mut group = c.benchmark_group("prior_density");
    group.bench_function("log_prior_density", |b| {
        b.iter(|| black_box(log_prior_density(black_box(beta.view()), &hyper)));
    });
    let prior = NormalExponentialPrior::new(hyper).unwrap();
    group.bench_function("prebuilt_prior", |b| {
        b.iter(|| black_box(prior.ln_density(black_box(beta.view()))));
    });
    group.finish();
}

fn benchmark_log_posterior(c: &mut Criterion) {
    let sizes = [200_usize, 500, 2_000];
    let beta = array![-9.0, 0.035, 0.09, 0.9, 0.001];
    let prior = NormalExponentialPrior::new(PriorHyperparameters::default()).unwrap();

    let mut group = c.benchmark_group("log_posterior");
    for &n in &sizes {
        let data = SyntheticDataBuilder::new(n).build();
        let (x, y) = FeatureSet::default().design_matrix(&data);
        group.throughput(Throughput::Elements(n as u64));

        let flat = LogisticPosterior::new(x.view(), y.view(), FlatPrior).unwrap();
        group.bench_with_input(BenchmarkId::new("flat", n), &flat, |b, target| {
            b.iter(|| black_box(target.log_posterior(black_box(beta.view()))));
        });

        let custom = LogisticPosterior::new(x.view(), y.view(), prior).unwrap();
        group.bench_with_input(BenchmarkId::new("normal_exponential", n), &custom, |b, target| {
            b.iter(|| black_box(target.log_posterior(black_box(beta.view()))));
        });
    }
    group.finish();
}

criterion_group!(posterior_density, benchmark_prior, benchmark_log_posterior);
criterion_main!(posterior_density);
