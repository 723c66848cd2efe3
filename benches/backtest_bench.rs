//! Performance benchmarks for the backtester.
//!
//! Run with: cargo bench

use chrono::{NaiveDate, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use quant_backtester::analytics::compute;
use quant_backtester::data::{macd, rolling_mean, rsi, InMemorySource};
use quant_backtester::engine::run;
use quant_backtester::frame::SignalFrame;
use quant_backtester::pipeline::{run_batch, OutputOptions, RunRequest};
use quant_backtester::strategies::{MacdCrossover, RandomForestSignals, RsiThreshold, SmaCrossover};
use quant_backtester::strategy::{SignalGenerator, StrategyKind};
use quant_backtester::types::Bar;

/// Generate synthetic bars for benchmarking.
fn generate_bars(count: usize) -> Vec<Bar> {
    let mut price = 100.0;
    (0..count)
        .map(|i| {
            let noise = ((i as f64 * 0.7).sin() * 2.0 + (i as f64 * 1.3).cos()) * 0.5;
            price += 0.001 * price + noise;
            price = price.max(50.0);

            Bar::from_close(
                Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
                    + chrono::Duration::days(i as i64),
                price,
            )
        })
        .collect()
}

/// Benchmark indicator series.
fn bench_indicators(c: &mut Criterion) {
    let closes: Vec<f64> = generate_bars(1000).iter().map(|b| b.close).collect();

    let mut group = c.benchmark_group("indicators");

    for window in [10, 50, 200].iter() {
        group.bench_with_input(
            BenchmarkId::new("rolling_mean", window),
            window,
            |b, &window| b.iter(|| rolling_mean(black_box(&closes), window)),
        );
    }

    group.bench_function("rsi_14", |b| b.iter(|| rsi(black_box(&closes), 14)));

    group.bench_function("macd_12_26_9", |b| {
        b.iter(|| macd(black_box(&closes), 12, 26, 9))
    });

    group.finish();
}

/// Benchmark signal generation plus the engine.
fn bench_backtest(c: &mut Criterion) {
    let mut group = c.benchmark_group("backtest");

    for size in [252, 1000, 5000].iter() {
        let frame = SignalFrame::new(generate_bars(*size));

        group.bench_with_input(BenchmarkId::new("sma_crossover", size), &frame, |b, frame| {
            let strategy = SmaCrossover::new(10, 30).unwrap();
            b.iter(|| {
                let signals = strategy.generate(black_box(frame)).unwrap();
                run(&signals)
            })
        });
    }

    let frame = SignalFrame::new(generate_bars(1000));
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2022, 9, 27).unwrap();

    group.bench_function("rsi_strategy_1000", |b| {
        let strategy = RsiThreshold::default_params();
        b.iter(|| run(&strategy.generate(black_box(&frame)).unwrap()))
    });

    group.bench_function("macd_strategy_1000", |b| {
        let strategy = MacdCrossover::default_params();
        b.iter(|| run(&strategy.generate(black_box(&frame)).unwrap()))
    });

    let signals = SmaCrossover::new(10, 30).unwrap().generate(&frame).unwrap();
    let (series, curves) = run(&signals).unwrap();
    group.bench_function("metrics_1000", |b| {
        b.iter(|| compute(black_box(&series), black_box(&curves), start, end))
    });

    group.finish();
}

/// Benchmark the random forest strategy.
fn bench_random_forest(c: &mut Criterion) {
    let mut group = c.benchmark_group("random_forest");
    group.sample_size(10); // Fewer samples for slow benchmarks

    for trees in [10, 100].iter() {
        let frame = SignalFrame::new(generate_bars(1000));
        group.bench_with_input(BenchmarkId::new("fit_predict_1000", trees), trees, |b, &trees| {
            let strategy = RandomForestSignals::new(trees, 0.2).unwrap();
            b.iter(|| strategy.generate(black_box(&frame)))
        });
    }

    group.finish();
}

/// Benchmark a multi-ticker batch, sequential vs parallel.
fn bench_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch");
    group.sample_size(20);

    let tickers: Vec<String> = (0..16).map(|i| format!("T{:02}", i)).collect();
    let mut source = InMemorySource::new();
    for ticker in &tickers {
        source.insert(ticker.clone(), generate_bars(1000));
    }
    let request = RunRequest::new(
        tickers,
        StrategyKind::Sma,
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
    )
    .with_output(OutputOptions::none());

    for parallel in [false, true] {
        let request = request.clone().with_parallel(parallel);
        let name = if parallel { "parallel_16" } else { "sequential_16" };
        group.bench_function(name, |b| b.iter(|| run_batch(&source, black_box(&request))));
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_indicators,
    bench_backtest,
    bench_random_forest,
    bench_batch,
);

criterion_main!(benches);
