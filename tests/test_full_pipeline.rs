//! Integration test: Full pipeline (instances → out-of-time CV → optimize → predict)

use chrono::{Duration, TimeZone, Utc};
use timefold::crossval::{CrossValidator, OutOfTimeCrossValidator};
use timefold::data::{
    AttributeValue, AttributesMap, ComposedFieldExtractor, Instance, Label,
    StoredTimestampExtractor,
};
use timefold::loss::WeightedAucLoss;
use timefold::model::{
    DownsamplingFactory, ModelBuilderFactory, PavCalibratedFactory, PredictiveModel,
    RandomForestFactory,
};
use timefold::optimizer::{
    Configuration, OptimizerConfig, ParamValue, PredictiveModelOptimizer, SearchSpace,
};

static TRACING: std::sync::Once = std::sync::Once::new();

/// Route the crate's tracing output through the test harness so fold and
/// search telemetry shows up on failures.
fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

fn attrs(pairs: &[(&str, AttributeValue)]) -> AttributesMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// 1000 instances arriving over 100 days. The signal lives in `x` and a
/// categorical `channel`; arrival order is decorrelated from the signal so
/// every chronological holdout contains both classes.
fn arrival_stream(n: usize) -> Vec<Instance> {
    let start = Utc.with_ymd_and_hms(2015, 3, 1, 0, 0, 0).single().unwrap();
    (0..n)
        .map(|i| {
            let x = ((i * 37) % n) as f64 / n as f64;
            let channel = if (i * 13) % 3 == 0 { "mobile" } else { "web" };
            let positive = x + if channel == "mobile" { 0.1 } else { 0.0 } > 0.55;
            let timestamp = start + Duration::minutes((i as i64 * 100 * 24 * 60) / n as i64);
            Instance::new(
                attrs(&[("x", x.into()), ("channel", channel.into())]),
                Label::Boolean(positive),
            )
            .with_timestamp(timestamp)
        })
        .collect()
}

fn forest_factory(space: SearchSpace) -> RandomForestFactory {
    RandomForestFactory::new()
        .with_seed(17)
        .with_parameter_space(space)
}

fn validator() -> OutOfTimeCrossValidator {
    OutOfTimeCrossValidator::new(
        Box::new(WeightedAucLoss::new(1.0)),
        Box::new(StoredTimestampExtractor),
        0.25,
        5,
    )
}

/// A leaf weight of 1000 forces every tree down to a single root leaf, so
/// that arm of the search can only produce a constant model.
fn contrast_space() -> SearchSpace {
    SearchSpace::new()
        .fixed("n_trees", ParamValue::Int(8))
        .fixed("max_depth", ParamValue::Int(6))
        .discrete("min_leaf_weight", [1000.0.into(), 1.0.into()])
}

#[test]
fn test_optimizer_beats_degenerate_configuration() {
    init_tracing();
    let instances = arrival_stream(1000);
    let factory = forest_factory(contrast_space());
    let validator = validator();
    let optimizer = PredictiveModelOptimizer::new(OptimizerConfig::new().with_max_sweeps(2));

    let optimum = optimizer
        .optimize(&factory, &instances, &validator)
        .unwrap();

    // The constant-model arm scores AUC 0.5 on every fold
    let degenerate = Configuration::new()
        .with("n_trees", 8i64.into())
        .with("max_depth", 6i64.into())
        .with("min_leaf_weight", 1000.0.into());
    let degenerate_loss = optimizer
        .loss_of(&factory, &degenerate, &instances, &validator)
        .unwrap();

    assert_eq!(optimum.configuration.get_float("min_leaf_weight"), Some(1.0));
    assert!(
        optimum.loss < degenerate_loss,
        "best {} vs degenerate {}",
        optimum.loss,
        degenerate_loss
    );
    assert!(optimum.loss < 0.2, "separable data should score well: {}", optimum.loss);
    assert!((degenerate_loss - 0.5).abs() < 1e-9);
}

#[test]
fn test_reported_loss_matches_reevaluation() {
    init_tracing();
    let instances = arrival_stream(1000);
    let factory = forest_factory(contrast_space());
    let validator = validator();
    let optimizer = PredictiveModelOptimizer::default();

    let optimum = optimizer
        .optimize(&factory, &instances, &validator)
        .unwrap();
    let recomputed = optimizer
        .loss_of(&factory, &optimum.configuration, &instances, &validator)
        .unwrap();

    // The validator re-seeds per call, so the search result reproduces
    assert_eq!(optimum.loss, recomputed);
}

#[test]
fn test_whole_pipeline_is_deterministic() {
    init_tracing();
    let instances = arrival_stream(1000);
    let run = || {
        let factory = forest_factory(contrast_space());
        PredictiveModelOptimizer::default()
            .optimize(&factory, &instances, &validator())
            .unwrap()
    };

    let first = run();
    let second = run();
    assert_eq!(first.configuration, second.configuration);
    assert_eq!(first.loss, second.loss);
}

#[test]
fn test_composed_date_fields_drive_the_split() {
    init_tracing();
    // Same stream, but arrival time is spread across attribute fields the
    // way event logs ship them
    let n = 600;
    let instances: Vec<Instance> = (0..n)
        .map(|i| {
            let x = ((i * 37) % n) as f64 / n as f64;
            let day = 1 + (i * 100 / n) as i64 % 28;
            let month = 1 + (i * 100 / n) as i64 / 28;
            Instance::new(
                attrs(&[
                    ("x", x.into()),
                    ("arrival-year", 2015.0.into()),
                    ("arrival-monthOfYear", (month as f64).into()),
                    ("arrival-dayOfMonth", (day as f64).into()),
                ]),
                Label::Boolean(x > 0.5),
            )
        })
        .collect();

    let validator = OutOfTimeCrossValidator::new(
        Box::new(WeightedAucLoss::new(1.0)),
        Box::new(ComposedFieldExtractor::new("arrival")),
        0.25,
        3,
    );
    let factory = forest_factory(
        SearchSpace::new()
            .fixed("n_trees", ParamValue::Int(8))
            .fixed("max_depth", ParamValue::Int(6))
            .fixed("min_leaf_weight", ParamValue::Float(1.0)),
    );

    let loss = validator
        .evaluate(&factory, &Configuration::new(), &instances)
        .unwrap();
    assert!(loss < 0.2, "loss = {}", loss);
}

#[test]
fn test_decorated_factory_optimizes_end_to_end() {
    init_tracing();
    // Rare positives: 10% of the stream, still separable on `x`
    let n = 1000;
    let start = Utc.with_ymd_and_hms(2015, 3, 1, 0, 0, 0).single().unwrap();
    let instances: Vec<Instance> = (0..n)
        .map(|i| {
            let x = ((i * 37) % n) as f64 / n as f64;
            Instance::new(
                attrs(&[("x", x.into())]),
                Label::Boolean(x > 0.9),
            )
            .with_timestamp(start + Duration::hours(i as i64 * 2))
        })
        .collect();

    let forest = forest_factory(
        SearchSpace::new()
            .fixed("n_trees", ParamValue::Int(8))
            .fixed("max_depth", ParamValue::Int(6))
            .fixed("min_leaf_weight", ParamValue::Float(1.0)),
    );
    let factory = PavCalibratedFactory::new(Box::new(
        DownsamplingFactory::new(Box::new(forest)).with_seed(23),
    ));

    // The decorator chain exposes the downsampling target alongside the
    // forest's (pinned) parameters
    assert!(factory
        .parameter_space()
        .parameters()
        .iter()
        .any(|p| p.name == "target_minority_proportion"));

    let optimum = PredictiveModelOptimizer::new(OptimizerConfig::new().with_max_sweeps(2))
        .optimize(&factory, &instances, &validator())
        .unwrap();
    assert!(optimum.loss < 0.25, "loss = {}", optimum.loss);

    let model = factory
        .build(&optimum.configuration, &instances)
        .unwrap();
    let high = model.predict(&attrs(&[("x", 0.95.into())])).unwrap();
    let low = model.predict(&attrs(&[("x", 0.2.into())])).unwrap();
    assert!(high > low, "high = {}, low = {}", high, low);
    assert!((0.0..=1.0).contains(&high));
    assert!((0.0..=1.0).contains(&low));
}
