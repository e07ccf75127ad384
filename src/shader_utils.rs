//! Shared WGSL building blocks for the bake and raymarch shaders.
//!
//! The snippets here are concatenated into full shader sources by
//! [`gpu::bake`](crate::gpu::bake) and [`gpu::program`](crate::gpu::program).
//! `CLOUD_MATH_WGSL` is a line-for-line port of the CPU reference in
//! [`density`](crate::density) and [`lighting`](crate::lighting); keep the
//! two in sync when touching either side.

/// WGSL noise functions: hashes, 3D simplex noise and worley cell noise.
///
/// `perlin01`/`worley01` return values in [0, 1], which is what the bake
/// kernels store into unorm textures.
pub const NOISE_WGSL: &str = r#"
// Gradient noise helpers
fn mod289_3(x: vec3<f32>) -> vec3<f32> {
    return x - floor(x * (1.0 / 289.0)) * 289.0;
}

fn mod289_4(x: vec4<f32>) -> vec4<f32> {
    return x - floor(x * (1.0 / 289.0)) * 289.0;
}

fn permute4(x: vec4<f32>) -> vec4<f32> {
    return mod289_4(((x * 34.0) + 1.0) * x);
}

fn taylor_inv_sqrt4(r: vec4<f32>) -> vec4<f32> {
    return 1.79284291400159 - 0.85373472095314 * r;
}

// 3D simplex noise in [-1, 1]
fn noise3(v: vec3<f32>) -> f32 {
    let C = vec2<f32>(1.0/6.0, 1.0/3.0);
    let D = vec4<f32>(0.0, 0.5, 1.0, 2.0);

    // First corner
    var i = floor(v + dot(v, vec3(C.y)));
    let x0 = v - i + dot(i, vec3(C.x));

    // Other corners
    let g = step(x0.yzx, x0.xyz);
    let l = 1.0 - g;
    let i1 = min(g.xyz, l.zxy);
    let i2 = max(g.xyz, l.zxy);

    let x1 = x0 - i1 + C.x;
    let x2 = x0 - i2 + C.y;
    let x3 = x0 - D.yyy;

    // Permutations
    i = mod289_3(i);
    let p = permute4(permute4(permute4(
        i.z + vec4<f32>(0.0, i1.z, i2.z, 1.0))
      + i.y + vec4<f32>(0.0, i1.y, i2.y, 1.0))
      + i.x + vec4<f32>(0.0, i1.x, i2.x, 1.0));

    // Gradients
    let n_ = 0.142857142857;
    let ns = n_ * D.wyz - D.xzx;

    let j = p - 49.0 * floor(p * ns.z * ns.z);

    let x_ = floor(j * ns.z);
    let y_ = floor(j - 7.0 * x_);

    let x = x_ * ns.x + ns.yyyy;
    let y = y_ * ns.x + ns.yyyy;
    let h = 1.0 - abs(x) - abs(y);

    let b0 = vec4<f32>(x.xy, y.xy);
    let b1 = vec4<f32>(x.zw, y.zw);

    let s0 = floor(b0) * 2.0 + 1.0;
    let s1 = floor(b1) * 2.0 + 1.0;
    let sh = -step(h, vec4<f32>(0.0));

    let a0 = b0.xzyw + s0.xzyw * sh.xxyy;
    let a1 = b1.xzyw + s1.xzyw * sh.zzww;

    var p0 = vec3<f32>(a0.xy, h.x);
    var p1 = vec3<f32>(a0.zw, h.y);
    var p2 = vec3<f32>(a1.xy, h.z);
    var p3 = vec3<f32>(a1.zw, h.w);

    // Normalize gradients
    let norm = taylor_inv_sqrt4(vec4<f32>(dot(p0,p0), dot(p1,p1), dot(p2,p2), dot(p3,p3)));
    p0 *= norm.x;
    p1 *= norm.y;
    p2 *= norm.z;
    p3 *= norm.w;

    // Mix final noise value
    var m = max(0.6 - vec4<f32>(dot(x0,x0), dot(x1,x1), dot(x2,x2), dot(x3,x3)), vec4<f32>(0.0));
    m = m * m;
    return 42.0 * dot(m*m, vec4<f32>(dot(p0,x0), dot(p1,x1), dot(p2,x2), dot(p3,x3)));
}

// Gradient noise remapped into [0, 1]
fn perlin01(p: vec3<f32>) -> f32 {
    return clamp(noise3(p) * 0.5 + 0.5, 0.0, 1.0);
}

fn hash33(p: vec3<f32>) -> vec3<f32> {
    var q = vec3<f32>(
        dot(p, vec3<f32>(127.1, 311.7, 74.7)),
        dot(p, vec3<f32>(269.5, 183.3, 246.1)),
        dot(p, vec3<f32>(113.5, 271.9, 124.6)));
    return fract(sin(q) * 43758.5453123);
}

// Worley cell noise (F1 distance) in [0, 1]
fn worley01(p: vec3<f32>) -> f32 {
    let cell = floor(p);
    let local = fract(p);
    var min_dist = 1.0e9;
    for (var x = -1; x <= 1; x++) {
        for (var y = -1; y <= 1; y++) {
            for (var z = -1; z <= 1; z++) {
                let offset = vec3<f32>(f32(x), f32(y), f32(z));
                let feature = offset + hash33(cell + offset);
                let d = length(feature - local);
                min_dist = min(min_dist, d);
            }
        }
    }
    return clamp(min_dist, 0.0, 1.0);
}
"#;

/// WGSL port of the density and lighting math.
///
/// Mirrors `density::density_from_samples`, `lighting::henyey_greenstein`,
/// `lighting::scatter_blend` and `lighting::ambient_attenuation`.
pub const CLOUD_MATH_WGSL: &str = r#"
const PI: f32 = 3.14159265358979;

fn remap(x: f32, a: f32, b: f32, c: f32, d: f32) -> f32 {
    return c + (x - a) / (b - a) * (d - c);
}

fn density_from_samples(
    ph: f32,
    weather: vec4<f32>,
    shape: vec4<f32>,
    detail: vec4<f32>,
    gc: f32,
    gd: f32,
    aa: f32,
) -> f32 {
    let wmc = max(weather.r, saturate((gc - 0.5) * weather.g * 2.0));

    let srb = saturate(remap(ph, 0.0, 0.2, 0.0, 1.0));
    let srt = saturate(remap(ph, weather.b * 0.2, weather.b, 1.0, 0.0));
    let sa = srb * srt;

    let drb = ph * saturate(remap(ph, 0.0, 0.15, 0.0, 1.0));
    let drt = saturate(remap(ph, 0.9, 1.0, 1.0, 0.0));
    let da = gd * drb * drt * weather.a * 2.0;

    let gba = 0.625 * shape.g + 0.25 * shape.b + 0.125 * shape.a;
    let sn = remap(shape.r, gba, 1.0, 0.0, 1.0);

    let dn_fbm = 0.625 * detail.g + 0.25 * detail.b + 0.125 * detail.a;
    let dn_mod = 0.35 * exp(-gc * 0.75) * mix(dn_fbm, 1.0 - dn_fbm, saturate(ph * 5.0));

    let sa_avail = pow(sa, saturate(remap(ph, 0.65, 0.95, 1.0, 1.0 - aa * gc)));

    let sn_nd = saturate(remap(sn * sa_avail, 1.0 - gc * wmc, 1.0, 0.0, 1.0));
    let da_avail = da * mix(1.0, saturate(remap(sqrt(ph), 0.4, 0.95, 1.0, 0.2)), aa);

    return saturate(remap(sn_nd, dn_mod, 1.0, 0.0, 1.0)) * da_avail;
}

fn henyey_greenstein(cos_theta: f32, g: f32) -> f32 {
    let g2 = g * g;
    return (1.0 - g2) / (4.0 * PI * pow(1.0 + g2 - 2.0 * g * cos_theta, 1.5));
}

fn scatter_blend(cos_theta: f32, csi: f32, cse: f32, ins: f32, outs: f32, ivo: f32) -> f32 {
    let boost = csi * pow(saturate(cos_theta), cse);
    let hg_in = henyey_greenstein(cos_theta, ins);
    let hg_out = henyey_greenstein(cos_theta, outs);
    return mix(max(hg_in, boost), hg_out, ivo);
}

fn ambient_attenuation(density: f32, height: f32, osa: f32) -> f32 {
    let depth_exp = remap(height, 0.3, 0.9, 0.5, 1.0);
    let base_fade = remap(height, 0.0, 0.3, 0.8, 1.0);
    return (1.0 - saturate(osa * pow(density, depth_exp))) * saturate(pow(base_fade, 0.8));
}

// Ray/AABB slab test: (dst_a, dst_b, dst_to_box, dst_inside_box)
fn intersect_box(box_min: vec3<f32>, box_max: vec3<f32>, origin: vec3<f32>, dir: vec3<f32>) -> vec4<f32> {
    let inv_dir = vec3<f32>(1.0) / dir;
    let t0 = (box_min - origin) * inv_dir;
    let t1 = (box_max - origin) * inv_dir;
    let tmin = min(t0, t1);
    let tmax = max(t0, t1);
    let dst_a = max(max(tmin.x, tmin.y), tmin.z);
    let dst_b = min(min(tmax.x, tmax.y), tmax.z);
    let dst_to_box = max(dst_a, 0.0);
    let dst_inside_box = clamp(dst_b - dst_to_box, 0.0, 9999.0);
    return vec4<f32>(dst_a, dst_b, dst_to_box, dst_inside_box);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippets_are_well_formed() {
        // The full sources are validated in tests/shader_validation.rs;
        // here just guard against the snippets losing their entry symbols.
        assert!(NOISE_WGSL.contains("fn perlin01"));
        assert!(NOISE_WGSL.contains("fn worley01"));
        assert!(CLOUD_MATH_WGSL.contains("fn density_from_samples"));
        assert!(CLOUD_MATH_WGSL.contains("fn henyey_greenstein"));
        assert!(CLOUD_MATH_WGSL.contains("fn intersect_box"));
    }
}
