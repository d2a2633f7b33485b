//! Benchmarks for the offset search, the hot loop of the pipeline.

use chrono::{Duration, TimeZone, Utc};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use coa_rust::config::PipelineConfig;
use coa_rust::pipeline::{align, NormalizedRow, NormalizedSeries};

fn synthetic_series(samples: usize) -> NormalizedSeries {
    let epoch = Utc.with_ymd_and_hms(2025, 6, 27, 10, 0, 0).unwrap();
    let dose_at = |t: f64| {
        let x = (t / (samples as f64 * 5.0)).clamp(0.0, 1.0);
        0.5 + 5.5 * (std::f64::consts::PI * x).sin().powi(2)
    };

    let rows = (0..samples)
        .map(|i| {
            let t = (i * 5) as f64;
            NormalizedRow {
                timestamp: epoch + Duration::seconds(i as i64 * 5),
                cnt_5s: (dose_at(t + 140.0) / 2.3106e-3).round() as u32,
                cnt_1min: None,
                latitude_deg: 0.0,
                longitude_deg: 0.0,
                altitude_m: 11000.0,
                sim_total: dose_at(t),
                sim_neutron: dose_at(t) * 0.4,
            }
        })
        .collect();

    NormalizedSeries { rows }
}

fn bench_offset_search(c: &mut Criterion) {
    let series = synthetic_series(720); // one hour at 5 s cadence
    let config = PipelineConfig {
        offset_window_s: 600,
        offset_step_s: 1,
        ..PipelineConfig::default()
    };

    c.bench_function("align_1h_±10min_1s", |b| {
        b.iter(|| align(black_box(&series), black_box(&config)).unwrap())
    });

    let coarse = PipelineConfig {
        offset_step_s: 5,
        ..config
    };
    c.bench_function("align_1h_±10min_5s", |b| {
        b.iter(|| align(black_box(&series), black_box(&coarse)).unwrap())
    });
}

criterion_group!(benches, bench_offset_search);
criterion_main!(benches);
