use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::Vec3;

use cumulus::config::CloudConfig;
use cumulus::density::{density_from_samples, DensityParams, DensitySample, WeatherSample};
use cumulus::raymarch::march;

fn bench_density_eval(c: &mut Criterion) {
    let params = DensityParams::from(&CloudConfig::new());
    let weather = WeatherSample::coverage(0.6, 0.4);

    c.bench_function("density_from_samples", |b| {
        b.iter(|| {
            let mut total = 0.0f32;
            for i in 0..256 {
                let ph = i as f32 / 255.0;
                total += density_from_samples(
                    black_box(ph),
                    black_box(weather),
                    black_box([0.7, 0.5, 0.4, 0.3]),
                    black_box([0.5, 0.6, 0.4, 0.5]),
                    params,
                );
            }
            total
        })
    });
}

fn bench_cpu_march(c: &mut Criterion) {
    let config = CloudConfig::new();
    let params = DensityParams::from(&config);
    let box_min = config.box_min();
    let box_max = config.box_max();

    // Procedural stand-in for the baked fields; cheap but position-varying.
    let sampler = move |p: Vec3| {
        let uvw = (p - box_min) / (box_max - box_min);
        let n = ((p.x * 0.13).sin() * (p.z * 0.17).cos() * 0.5 + 0.5).clamp(0.0, 1.0);
        DensitySample {
            density: density_from_samples(
                uvw.y.clamp(0.0, 1.0),
                WeatherSample::coverage(n, 0.5),
                [n, 0.5, 0.4, 0.3],
                [0.5, n, 0.4, 0.5],
                params,
            ),
            height: uvw.y.clamp(0.0, 1.0),
        }
    };

    c.bench_function("march_single_ray", |b| {
        b.iter(|| {
            march(
                black_box(Vec3::new(0.0, 0.0, 300.0)),
                black_box(Vec3::NEG_Z),
                black_box(Vec3::new(0.3, 1.0, 0.2)),
                &config,
                sampler,
            )
        })
    });
}

fn bench_shader_assembly(c: &mut Criterion) {
    c.bench_function("raymarch_source_assembly", |b| {
        b.iter(|| black_box(cumulus::gpu::program::raymarch_source()))
    });
}

criterion_group!(
    benches,
    bench_density_eval,
    bench_cpu_march,
    bench_shader_assembly
);
criterion_main!(benches);
