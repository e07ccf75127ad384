//! Parse and validate every WGSL source the crate assembles.
//!
//! Catches shader syntax and type errors without needing a GPU.

use naga::front::wgsl;
use naga::valid::{Capabilities, ValidationFlags, Validator};

fn validate(label: &str, source: &str) {
    let module = wgsl::parse_str(source)
        .unwrap_or_else(|e| panic!("{} failed to parse:\n{}", label, e.emit_to_string(source)));
    Validator::new(ValidationFlags::all(), Capabilities::empty())
        .validate(&module)
        .unwrap_or_else(|e| panic!("{} failed validation: {:?}", label, e));
}

#[test]
fn weather_bake_shader_is_valid() {
    validate("weather bake", &cumulus::gpu::bake::weather_bake_source());
}

#[test]
fn atlas_bake_shader_is_valid() {
    validate("atlas bake", &cumulus::gpu::bake::atlas_bake_source());
}

#[test]
fn raymarch_shader_is_valid() {
    validate("raymarch", &cumulus::gpu::program::raymarch_source());
}

#[test]
fn environment_shader_is_valid() {
    validate("environment", cumulus::environment::ENVIRONMENT_WGSL);
}
