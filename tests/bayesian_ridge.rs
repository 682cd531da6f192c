use approx::assert_abs_diff_eq;
use bayesridge::{
    BayesianRidge, BayesianRidgeConfig, EstimationError, FitStatus, FittedModel, PosteriorSolver,
};
use ndarray::{Array1, Array2, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Draws a `(num_features, num_observations)` standard-normal design, a
/// standard-normal weight vector, and responses `w^T x + sigma * noise`.
fn generate_problem(
    num_observations: usize,
    num_features: usize,
    sigma: f64,
) -> (Array2<f64>, Array1<f64>) {
    let mut rng = StdRng::seed_from_u64(4);
    let normal = Normal::new(0.0, 1.0).unwrap();
    let design = Array2::from_shape_fn((num_features, num_observations), |_| {
        normal.sample(&mut rng)
    });
    let weights = Array1::from_shape_fn(num_features, |_| normal.sample(&mut rng));
    let noise = Array1::from_shape_fn(num_observations, |_| sigma * normal.sample(&mut rng));
    let responses = design.t().dot(&weights) + &noise;
    (design, responses)
}

#[test]
fn noise_free_data_is_reproduced() {
    init_logging();
    let (design, responses) = generate_problem(200, 10, 0.0);

    let mut estimator = BayesianRidge::with_flags(true, false);
    let rmse = estimator.fit(design.view(), responses.view()).unwrap();
    let predictions = estimator.predict(design.view()).unwrap();

    for (prediction, target) in predictions.iter().zip(responses.iter()) {
        let tolerance = 1e-6 * target.abs().max(1.0);
        assert!(
            (prediction - target).abs() <= tolerance,
            "prediction {prediction} vs target {target}"
        );
    }
    assert!(rmse < 1e-6, "training RMSE {rmse}");
    let variance = estimator.variance().unwrap();
    assert!(variance < 1e-6, "estimated noise variance {variance}");
}

#[test]
fn disabled_preprocessing_is_neutral() {
    init_logging();
    let (num_features, num_observations) = (30, 100);
    let (design, responses) = generate_problem(num_observations, num_features, 0.5);

    let mut estimator = BayesianRidge::with_flags(false, false);
    estimator.fit(design.view(), responses.view()).unwrap();

    let offset = estimator.data_offset().unwrap();
    let scale = estimator.data_scale().unwrap();
    assert_eq!(offset.len(), num_features);
    assert!(offset.iter().all(|&o| o == 0.0));
    assert!(scale.iter().all(|&s| s == 1.0));
    assert_eq!(estimator.response_offset(), Some(0.0));
}

#[test]
fn enabled_preprocessing_matches_direct_statistics() {
    init_logging();
    let (design, responses) = generate_problem(100, 30, 0.5);

    let mut estimator = BayesianRidge::with_flags(true, true);
    estimator.fit(design.view(), responses.view()).unwrap();

    let offset = estimator.data_offset().unwrap();
    let scale = estimator.data_scale().unwrap();
    let n = design.ncols() as f64;
    for (j, row) in design.axis_iter(Axis(0)).enumerate() {
        let mean = row.iter().sum::<f64>() / n;
        let variance = row.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        assert_abs_diff_eq!(offset[j], mean, epsilon = 1e-6);
        assert_abs_diff_eq!(scale[j], variance.sqrt(), epsilon = 1e-6);
    }
    let response_mean = responses.iter().sum::<f64>() / n;
    assert_abs_diff_eq!(
        estimator.response_offset().unwrap(),
        response_mean,
        epsilon = 1e-6
    );
}

#[test]
fn single_point_calls_match_batch_columns() {
    init_logging();
    let (design, responses) = generate_problem(100, 10, 2.0);

    let mut estimator = BayesianRidge::with_flags(false, false);
    estimator.fit(design.view(), responses.view()).unwrap();

    let predictions = estimator.predict(design.view()).unwrap();
    let (predictions_u, std_devs) = estimator.predict_with_uncertainty(design.view()).unwrap();
    assert_eq!(predictions, predictions_u);

    for (i, column) in design.columns().into_iter().enumerate() {
        let single = estimator.predict_point(column).unwrap();
        assert_eq!(single.to_bits(), predictions[i].to_bits());

        let (single_u, single_std) = estimator.predict_point_with_uncertainty(column).unwrap();
        assert_eq!(single_u.to_bits(), predictions[i].to_bits());
        assert_eq!(single_std.to_bits(), std_devs[i].to_bits());
    }

    let noise_sd = estimator.variance().unwrap().sqrt();
    assert!(std_devs.iter().all(|&s| s >= noise_sd));
}

#[test]
fn duplicate_rows_fail_with_singular_input() {
    init_logging();
    let (mut design, responses) = generate_problem(50, 5, 1.0);
    let duplicate = design.row(1).to_owned();
    design.row_mut(3).assign(&duplicate);

    let mut estimator = BayesianRidge::with_flags(false, false);
    let result = estimator.fit(design.view(), responses.view());
    assert!(
        matches!(result, Err(EstimationError::SingularInput { .. })),
        "unexpected result {result:?}"
    );
    assert!(!estimator.is_fitted());
}

#[test]
fn exact_zero_policy_rejects_a_zero_design() {
    init_logging();
    let design = Array2::<f64>::zeros((1, 40));
    let responses = Array1::from_shape_fn(40, |i| (i as f64).sin());

    let config = BayesianRidgeConfig {
        center: false,
        singular_tolerance: Some(0.0),
        ..Default::default()
    };
    let mut estimator = BayesianRidge::new(config);
    match estimator.fit(design.view(), responses.view()) {
        Err(EstimationError::SingularInput {
            min_eigenvalue,
            max_eigenvalue,
        }) => {
            assert_eq!(min_eigenvalue, 0.0);
            assert_eq!(max_eigenvalue, 0.0);
        }
        other => panic!("expected SingularInput, got {other:?}"),
    }
}

#[test]
fn repeated_fits_are_identical() {
    init_logging();
    let (design, responses) = generate_problem(120, 8, 0.3);

    let mut estimator = BayesianRidge::with_flags(true, true);
    let first_rmse = estimator.fit(design.view(), responses.view()).unwrap();
    let first = estimator.fitted().unwrap().clone();
    let second_rmse = estimator.fit(design.view(), responses.view()).unwrap();

    assert_eq!(first_rmse.to_bits(), second_rmse.to_bits());
    assert_eq!(estimator.fitted().unwrap(), &first);
}

#[test]
fn clone_is_independent_of_the_original() {
    init_logging();
    let (design, responses) = generate_problem(80, 4, 0.5);
    let mut original = BayesianRidge::with_flags(true, false);
    original.fit(design.view(), responses.view()).unwrap();

    let copy = original.clone();
    let (other_design, other_responses) = generate_problem(60, 2, 0.5);
    original
        .fit(other_design.view(), other_responses.view())
        .unwrap();

    assert_eq!(copy.weights().unwrap().len(), 4);
    assert_eq!(original.weights().unwrap().len(), 2);
    assert!(copy.predict(design.view()).is_ok());
}

#[test]
fn accessors_expose_consistent_state() {
    init_logging();
    let (design, responses) = generate_problem(150, 6, 0.8);
    let mut estimator = BayesianRidge::new(BayesianRidgeConfig {
        solver: PosteriorSolver::Cholesky,
        ..BayesianRidgeConfig::with_flags(true, true)
    });
    let rmse = estimator.fit(design.view(), responses.view()).unwrap();

    let hyper = estimator.hyperparameters().unwrap();
    assert_eq!(estimator.alpha(), Some(hyper.alpha));
    assert_eq!(estimator.beta(), Some(hyper.beta));
    assert_eq!(estimator.gamma(), Some(hyper.gamma));
    assert_eq!(estimator.variance(), Some(1.0 / hyper.beta));
    assert!(hyper.alpha > 0.0 && hyper.beta > 0.0);
    assert!(hyper.gamma > 0.0 && hyper.gamma <= 6.0);

    let covariance = estimator.covariance().unwrap();
    assert_eq!(covariance.dim(), (6, 6));
    assert!(covariance.diag().iter().all(|&v| v > 0.0));

    let diagnostics = estimator.diagnostics().unwrap();
    assert_eq!(diagnostics.status, FitStatus::Converged);
    assert_eq!(diagnostics.solver, PosteriorSolver::Cholesky);
    assert_eq!(diagnostics.training_rmse, rmse);
    assert!(diagnostics.min_eigenvalue > 0.0);
    assert!(diagnostics.min_eigenvalue <= diagnostics.max_eigenvalue);

    let recomputed = estimator.rmse(design.view(), responses.view()).unwrap();
    assert_eq!(recomputed.to_bits(), rmse.to_bits());
}

#[test]
fn fitted_model_survives_serde_round_trip() {
    init_logging();
    let (design, responses) = generate_problem(90, 5, 0.4);
    let mut estimator = BayesianRidge::with_flags(true, true);
    estimator.fit(design.view(), responses.view()).unwrap();

    let model = estimator.take_model().unwrap();
    let json = serde_json::to_string(&model).unwrap();
    let restored: FittedModel = serde_json::from_str(&json).unwrap();

    let reloaded = BayesianRidge::from_model(estimator.config().clone(), restored);
    let original = BayesianRidge::from_model(estimator.config().clone(), model);
    let a = original.predict_with_uncertainty(design.view()).unwrap();
    let b = reloaded.predict_with_uncertainty(design.view()).unwrap();
    for (x, y) in a.0.iter().zip(b.0.iter()) {
        assert_abs_diff_eq!(*x, *y, epsilon = 1e-12);
    }
    for (x, y) in a.1.iter().zip(b.1.iter()) {
        assert_abs_diff_eq!(*x, *y, epsilon = 1e-12);
    }
}
