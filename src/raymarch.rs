//! Two-pass volume raymarch, CPU reference implementation.
//!
//! The fragment shader in `gpu::program` is the data-parallel port of this
//! module: a fixed 32-step primary march through the bounding box, with an
//! 8-step secondary march toward the light wherever density is found.
//! Fixed step counts keep the GPU cost predictable; do not switch this to
//! adaptive stepping without accepting the visual change.

use glam::{Vec3, Vec4};

use crate::config::CloudConfig;
use crate::density::DensitySample;
use crate::lighting::{ambient_attenuation, scatter_blend, ScatterLobes};

/// Primary march step count.
pub const PRIMARY_STEPS: u32 = 32;
/// Secondary (light) march step count.
pub const LIGHT_STEPS: u32 = 8;
/// Lower clamp on |cos| between light and view, avoiding the singular
/// forward-scatter spike of the phase function.
pub const COS_THRESHOLD: f32 = 0.9;

/// Result of the slab test against the bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxIntersection {
    /// Parametric entry distance (may be negative inside the box).
    pub dst_a: f32,
    /// Parametric exit distance.
    pub dst_b: f32,
    /// Distance from the origin to the box, floored at 0.
    pub dst_to_box: f32,
    /// Distance traveled inside the box, clamped to [0, 9999].
    pub dst_inside_box: f32,
}

impl BoxIntersection {
    /// True when the ray never enters the box.
    pub fn is_miss(&self) -> bool {
        self.dst_a >= self.dst_b
    }
}

/// Ray/AABB slab intersection.
///
/// Degenerate direction components produce infinities that fall out of the
/// min/max correctly; the clamp on `dst_inside_box` guards the arithmetic
/// downstream.
pub fn intersect_box(box_min: Vec3, box_max: Vec3, origin: Vec3, dir: Vec3) -> BoxIntersection {
    let inv_dir = Vec3::ONE / dir;
    let t0 = (box_min - origin) * inv_dir;
    let t1 = (box_max - origin) * inv_dir;
    let tmin = t0.min(t1);
    let tmax = t0.max(t1);
    let dst_a = tmin.x.max(tmin.y).max(tmin.z);
    let dst_b = tmax.x.min(tmax.y).min(tmax.z);
    let dst_to_box = dst_a.max(0.0);
    let dst_inside_box = (dst_b - dst_to_box).clamp(0.0, 9999.0);
    BoxIntersection {
        dst_a,
        dst_b,
        dst_to_box,
        dst_inside_box,
    }
}

/// March a single ray through the cloud volume.
///
/// `origin`, `dir` and `light_dir` are in box-local space. `sampler` is
/// the density field lookup (the baked textures on the GPU, a closure in
/// tests). Returns RGBA: inverted scatter accumulation in RGB, Beer-law
/// opacity in A. A ray that misses the box contributes nothing.
pub fn march(
    origin: Vec3,
    dir: Vec3,
    light_dir: Vec3,
    config: &CloudConfig,
    sampler: impl Fn(Vec3) -> DensitySample,
) -> Vec4 {
    let box_min = config.box_min();
    let box_max = config.box_max();
    let hit = intersect_box(box_min, box_max, origin, dir);
    if hit.is_miss() {
        return Vec4::ZERO;
    }

    let lobes = ScatterLobes::from(config);
    let light = light_dir.normalize();
    let view = dir.normalize();
    let cos_theta = light.dot(-view).abs().max(COS_THRESHOLD);

    let step_size = hit.dst_inside_box / PRIMARY_STEPS as f32;
    let mut traveled = 0.0f32;
    let mut total_density = 0.0f32;
    let mut accumulated = 0.0f32;

    for _ in 0..PRIMARY_STEPS {
        let p = origin + dir * (hit.dst_to_box + traveled);
        let sample = sampler(p);
        total_density += sample.density;
        traveled += step_size;

        if sample.density > 0.0 {
            // Secondary march from the sample point toward the light.
            let sun_hit = intersect_box(box_min, box_max, p, light);
            let sun_step = sun_hit.dst_inside_box / LIGHT_STEPS as f32;
            let mut sun_traveled = 0.0f32;
            let mut sun_density = 0.0f32;
            for _ in 0..LIGHT_STEPS {
                let p_sun = p + light * sun_traveled;
                sun_density += sampler(p_sun).density;
                sun_traveled += sun_step;
            }

            let e = (-config.b * sun_density).exp().max(0.8);
            let e_clamp = e.max((-config.b * config.ac).exp());
            let e_alter = (sample.density * config.amin).max(e_clamp);

            let iso = scatter_blend(cos_theta, lobes);
            let ambient = ambient_attenuation(sample.density, sample.height, config.osa);
            accumulated += e_alter * sample.density * iso * ambient;
        }
    }

    let opacity = 1.0 - (-total_density).exp();
    let rgb = Vec3::splat(1.0 - accumulated);
    Vec4::new(rgb.x, rgb.y, rgb.z, opacity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::density::{density_from_samples, DensityParams, WeatherSample};

    const EPS: f32 = 1e-4;

    fn unit_box() -> (Vec3, Vec3) {
        (Vec3::splat(-50.0), Vec3::splat(50.0))
    }

    #[test]
    fn test_origin_inside_box() {
        let (bmin, bmax) = unit_box();
        let hit = intersect_box(bmin, bmax, Vec3::ZERO, Vec3::NEG_Z);
        assert_eq!(hit.dst_to_box, 0.0);
        assert!(hit.dst_inside_box > 0.0);
        assert!((hit.dst_inside_box - 50.0).abs() < EPS);
    }

    #[test]
    fn test_ray_through_center() {
        let (bmin, bmax) = unit_box();
        let hit = intersect_box(bmin, bmax, Vec3::new(0.0, 0.0, 200.0), Vec3::NEG_Z);
        assert!((hit.dst_to_box - 150.0).abs() < EPS);
        assert!((hit.dst_inside_box - 100.0).abs() < EPS);
        assert!(!hit.is_miss());
    }

    #[test]
    fn test_ray_misses_box() {
        let (bmin, bmax) = unit_box();
        let hit = intersect_box(bmin, bmax, Vec3::new(200.0, 0.0, 200.0), Vec3::NEG_Z);
        assert!(hit.dst_a >= hit.dst_b);
        assert!(hit.is_miss());
        assert_eq!(hit.dst_inside_box, 0.0);
    }

    #[test]
    fn test_axis_aligned_ray_handles_zero_components() {
        let (bmin, bmax) = unit_box();
        // Direction has two zero components; inv_dir is infinite there.
        let hit = intersect_box(bmin, bmax, Vec3::new(0.0, -100.0, 0.0), Vec3::Y);
        assert!((hit.dst_to_box - 50.0).abs() < EPS);
        assert!((hit.dst_inside_box - 100.0).abs() < EPS);
    }

    #[test]
    fn test_miss_contributes_nothing() {
        let config = CloudConfig::new();
        let out = march(
            Vec3::new(500.0, 0.0, 500.0),
            Vec3::NEG_Z,
            Vec3::new(0.3, 1.0, 0.2),
            &config,
            |_| DensitySample {
                density: 1.0,
                height: 0.5,
            },
        );
        assert_eq!(out, Vec4::ZERO);
    }

    /// Golden scenario: box [-50,50]^3, gc=0.7, gd=0.9, ray through the box
    /// center along -Z at mid height, every noise channel pinned at 0.5.
    /// Each of the 32 steps sees the same density, so the total is 32 times
    /// the closed-form per-step value.
    #[test]
    fn test_golden_total_density() {
        let config = CloudConfig::new()
            .with_coverage(0.7)
            .with_density(0.9)
            .with_box_size(Vec3::splat(100.0));
        let params = DensityParams::from(&config);

        let constant_sampler = |p: Vec3| {
            let uvw = (p - config.box_min()) / (config.box_max() - config.box_min());
            DensitySample {
                density: density_from_samples(
                    uvw.y,
                    WeatherSample::coverage(0.5, 0.5),
                    [0.5; 4],
                    [0.5; 4],
                    params,
                ),
                height: uvw.y,
            }
        };

        let per_step = constant_sampler(Vec3::ZERO).density;
        let expected_total = 32.0 * per_step;
        let expected_opacity = 1.0 - (-expected_total).exp();

        let out = march(
            Vec3::new(0.0, 0.0, 300.0),
            Vec3::NEG_Z,
            Vec3::new(0.3, 1.0, 0.2),
            &config,
            constant_sampler,
        );
        assert!((out.w - expected_opacity).abs() < EPS);
    }

    #[test]
    fn test_denser_cloud_is_more_opaque() {
        let config = CloudConfig::new();
        let light = Vec3::new(0.3, 1.0, 0.2);
        let origin = Vec3::new(0.0, 0.0, 300.0);
        let thin = march(origin, Vec3::NEG_Z, light, &config, |_| DensitySample {
            density: 0.05,
            height: 0.5,
        });
        let thick = march(origin, Vec3::NEG_Z, light, &config, |_| DensitySample {
            density: 0.8,
            height: 0.5,
        });
        assert!(thick.w > thin.w);
        assert!(thin.w > 0.0);
    }
}
