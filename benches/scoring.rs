use criterion::{black_box, criterion_group, criterion_main, Criterion};
use forecastbot::ml_engine::{DecisionPolicy, FeatureVector, ScoringModel, TrainedModel};

fn closes() -> Vec<f64> {
    (0..60)
        .map(|i| 42_000.0 * (1.0 + 0.004 * (i as f64 / 7.0).sin()))
        .collect()
}

fn trained() -> TrainedModel {
    TrainedModel::from_json(
        r#"{
            "features": ["rsi", "ema5_slope", "ema15_slope", "momentum", "lastRet", "sigma"],
            "W": [0.21, 0.4, 0.18, 0.9, -0.3, -0.12],
            "b": 0.02,
            "scaler": {
                "mu": [50.0, 0.0, 0.0, 0.0, 0.0, 0.002],
                "sd": [12.0, 4.0, 2.0, 0.01, 0.002, 0.001]
            }
        }"#,
        "bench",
    )
    .unwrap()
}

fn bench_features(c: &mut Criterion) {
    let closes = closes();
    c.bench_function("features_from_60_closes", |b| {
        b.iter(|| FeatureVector::from_closes(black_box(&closes)))
    });
}

fn bench_scoring(c: &mut Criterion) {
    let features = FeatureVector::from_closes(&closes());
    let policy = DecisionPolicy::default();
    let heuristic = ScoringModel::Heuristic;
    let trained = ScoringModel::Trained(trained());

    c.bench_function("score_heuristic", |b| {
        b.iter(|| heuristic.score(black_box(&features)))
    });
    c.bench_function("score_trained_and_decide", |b| {
        b.iter(|| policy.decide(&trained.score(black_box(&features)), 42_000.0))
    });
}

criterion_group!(benches, bench_features, bench_scoring);
criterion_main!(benches);
