//! Phase-function and ambient approximations for the light march.
//!
//! Pure math, mirrored in the raymarch shader.

use std::f32::consts::PI;

use crate::density::{mix, remap, saturate};

/// Henyey-Greenstein phase function.
///
/// `cos_theta` is the cosine of the angle between the view and light
/// directions; `g` in (-1, 1) shapes the lobe, positive values scatter
/// forward. Normalized so the integral over the sphere is 1.
pub fn henyey_greenstein(cos_theta: f32, g: f32) -> f32 {
    let g2 = g * g;
    (1.0 - g2) / (4.0 * PI * (1.0 + g2 - 2.0 * g * cos_theta).powf(1.5))
}

/// The scattering lobe parameters of the blend below.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScatterLobes {
    /// In-scatter boost intensity.
    pub csi: f32,
    /// In-scatter boost exponent.
    pub cse: f32,
    /// Forward lobe shape.
    pub ins: f32,
    /// Backward lobe shape.
    pub outs: f32,
    /// Blend factor toward the out-scatter lobe.
    pub ivo: f32,
}

impl From<&crate::CloudConfig> for ScatterLobes {
    fn from(config: &crate::CloudConfig) -> Self {
        Self {
            csi: config.csi,
            cse: config.cse,
            ins: config.ins,
            outs: config.outs,
            ivo: config.ivo,
        }
    }
}

/// Blend of an in-scatter boosted lobe with an out-scatter lobe.
///
/// The in-scatter side takes whichever is stronger of the forward HG lobe
/// and a `csi * cos^cse` silver-lining boost; the result is mixed toward
/// the backward HG lobe by `ivo`.
pub fn scatter_blend(cos_theta: f32, lobes: ScatterLobes) -> f32 {
    let boost = lobes.csi * saturate(cos_theta).powf(lobes.cse);
    let hg_in = henyey_greenstein(cos_theta, lobes.ins);
    let hg_out = henyey_greenstein(cos_theta, lobes.outs);
    mix(hg_in.max(boost), hg_out, lobes.ivo)
}

/// Cheap density/height-driven ambient darkening.
///
/// Not a true occlusion term: dense low samples darken, and the very
/// bottom of the box fades regardless of density.
pub fn ambient_attenuation(density: f32, height: f32, osa: f32) -> f32 {
    let depth_exp = remap(height, 0.3, 0.9, 0.5, 1.0);
    let base_fade = remap(height, 0.0, 0.3, 0.8, 1.0);
    (1.0 - saturate(osa * density.powf(depth_exp))) * saturate(base_fade.powf(0.8))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The phase function must integrate to 1 over the sphere for any g.
    /// Integrate 2*pi * hg(mu) over mu in [-1, 1] by midpoint quadrature.
    #[test]
    fn test_henyey_greenstein_normalization() {
        for g in [-0.8f32, -0.5, 0.0, 0.3, 0.5, 0.9] {
            let n = 20_000;
            let dmu = 2.0 / n as f32;
            let mut integral = 0.0f64;
            for i in 0..n {
                let mu = -1.0 + (i as f32 + 0.5) * dmu;
                integral += (2.0 * PI * henyey_greenstein(mu, g) * dmu) as f64;
            }
            assert!(
                (integral - 1.0).abs() < 1e-2,
                "integral {} for g={}",
                integral,
                g
            );
        }
    }

    #[test]
    fn test_forward_scatter_asymmetry() {
        // Positive g favors forward scattering (cos_theta near 1).
        let forward = henyey_greenstein(0.95, 0.5);
        let backward = henyey_greenstein(-0.95, 0.5);
        assert!(forward > backward * 10.0);

        // g = 0 is isotropic.
        let iso = henyey_greenstein(0.3, 0.0);
        assert!((iso - 1.0 / (4.0 * PI)).abs() < 1e-6);
    }

    #[test]
    fn test_scatter_blend_endpoints() {
        let lobes = ScatterLobes {
            csi: 0.5,
            cse: 10.0,
            ins: 0.5,
            outs: -0.5,
            ivo: 0.0,
        };
        // ivo = 0: pure in-scatter side.
        let cos_theta = 0.95;
        let expected = henyey_greenstein(cos_theta, 0.5)
            .max(0.5 * cos_theta.powf(10.0));
        assert!((scatter_blend(cos_theta, lobes) - expected).abs() < 1e-6);

        // ivo = 1: pure out-scatter lobe.
        let lobes = ScatterLobes { ivo: 1.0, ..lobes };
        let expected = henyey_greenstein(cos_theta, -0.5);
        assert!((scatter_blend(cos_theta, lobes) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_ambient_attenuation_bounds() {
        for density in [0.0f32, 0.2, 0.5, 1.0] {
            for height in [0.0f32, 0.15, 0.5, 0.9, 1.0] {
                let a = ambient_attenuation(density, height, 0.9);
                assert!(a >= 0.0 && a <= 1.0, "a={} at d={}, h={}", a, density, height);
            }
        }
        // Zero density leaves only the base fade.
        let a = ambient_attenuation(0.0, 1.0, 0.9);
        assert!((a - 1.0).abs() < 1e-5);
        // Dense low samples darken hard.
        assert!(ambient_attenuation(1.0, 0.3, 0.9) < 0.2);
    }
}
