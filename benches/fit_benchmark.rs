use bayesridge::{BayesianRidgeConfig, PosteriorSolver, fit_posterior};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use ndarray::{Array1, Array2};
use rand::distributions::Standard;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_problem(num_features: usize, num_observations: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = StdRng::seed_from_u64(0x5EED_F64 + num_features as u64);
    let design: Array2<f64> =
        Array2::from_shape_fn((num_features, num_observations), |_| rng.sample(Standard));
    let weights: Array1<f64> = Array1::from_shape_fn(num_features, |_| rng.sample(Standard));
    let noise: Array1<f64> = Array1::from_shape_fn(num_observations, |_| rng.sample(Standard));
    let responses = design.t().dot(&weights) + &(noise * 0.1);
    (design, responses)
}

fn benchmark_fit(c: &mut Criterion) {
    let sizes = [10_usize, 50, 150];
    let problems: Vec<_> = sizes
        .iter()
        .map(|&p| (p, random_problem(p, 4 * p)))
        .collect();

    let mut group = c.benchmark_group("bayesian_ridge_fit");
    for (num_features, (design, responses)) in problems.iter() {
        let elements = (design.nrows() * design.ncols()) as u64;
        group.throughput(Throughput::Elements(elements));

        for solver in [PosteriorSolver::Eigen, PosteriorSolver::Cholesky] {
            let config = BayesianRidgeConfig {
                solver,
                ..BayesianRidgeConfig::with_flags(true, true)
            };
            let id = BenchmarkId::new(format!("{solver:?}"), num_features);
            group.bench_with_input(id, &config, |b, config| {
                b.iter(|| {
                    let model = fit_posterior(
                        black_box(design.view()),
                        black_box(responses.view()),
                        config,
                    );
                    black_box(model.map(|m| m.diagnostics.training_rmse).ok());
                });
            });
        }
    }
    group.finish();
}

criterion_group!(fit, benchmark_fit);
criterion_main!(fit);
