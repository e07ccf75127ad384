//! Orbit camera and the perspective/orthographic frustum transition.
//!
//! Looking straight down at the cloud layer with a perspective camera
//! degenerates into gimbal-locked spinning, so near the pole the camera
//! dolly-zooms toward a narrow field of view and finally switches to an
//! orthographic projection. [`update_frustum`] is the pure decision
//! function; [`OrbitCamera`] owns the state and applies the result.

use glam::{Mat4, Vec3};

/// Polar angle below which the projection switches to orthographic.
pub const SWITCH_ANGLE: f32 = 0.01;
/// Polar angle below which the dolly-zoom transition runs.
pub const TRANSITION_ANGLE: f32 = 0.2;
/// Narrowest field of view of the transition, in degrees.
pub const MIN_FOV: f32 = 7.0;
/// Field of view in the normal orbit zone, in degrees.
pub const DEFAULT_FOV: f32 = 45.0;

/// Projection mode of the orbit camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        /// Vertical field of view, in degrees.
        fov_deg: f32,
    },
    Orthographic {
        half_width: f32,
        half_height: f32,
    },
}

/// The camera state [`update_frustum`] decides on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrustumState {
    pub projection: Projection,
    /// Distance from the orbit target.
    pub distance: f32,
    /// Viewport width over height.
    pub aspect: f32,
}

/// What the caller must apply to its camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrustumUpdate {
    /// Stay as is.
    None,
    /// Switch to an orthographic frustum matching the current view extent.
    SwitchToOrthographic {
        half_width: f32,
        half_height: f32,
    },
    /// Switch back to perspective at [`MIN_FOV`], repositioned so the
    /// orthographic view extent is preserved.
    SwitchToPerspective {
        fov_deg: f32,
        distance: f32,
    },
    /// Adjust fov and distance together, keeping the frustum height at the
    /// target constant (a dolly zoom).
    DollyZoom {
        fov_deg: f32,
        distance: f32,
    },
}

fn half_fov_tan(fov_deg: f32) -> f32 {
    (fov_deg.to_radians() * 0.5).tan()
}

/// Frustum height at `distance` for a perspective fov.
fn frustum_height(fov_deg: f32, distance: f32) -> f32 {
    2.0 * distance * half_fov_tan(fov_deg)
}

/// Decide the frustum for the given orbit polar angle.
///
/// `polar_angle` is the angle from the +Y pole, in radians. Pure function
/// of its inputs; touches no camera state.
pub fn update_frustum(polar_angle: f32, state: FrustumState) -> FrustumUpdate {
    match state.projection {
        Projection::Perspective { fov_deg } => {
            if polar_angle < SWITCH_ANGLE {
                let half_height = frustum_height(fov_deg, state.distance) * 0.5;
                return FrustumUpdate::SwitchToOrthographic {
                    half_width: half_height * state.aspect,
                    half_height,
                };
            }
            if polar_angle < TRANSITION_ANGLE {
                let t = (polar_angle - SWITCH_ANGLE) / (TRANSITION_ANGLE - SWITCH_ANGLE);
                let target_fov = MIN_FOV + (DEFAULT_FOV - MIN_FOV) * t.clamp(0.0, 1.0);
                let target_tan = half_fov_tan(target_fov);
                if target_tan <= 0.0 {
                    return FrustumUpdate::None;
                }
                return FrustumUpdate::DollyZoom {
                    fov_deg: target_fov,
                    distance: state.distance * (half_fov_tan(fov_deg) / target_tan),
                };
            }
            if (fov_deg - DEFAULT_FOV).abs() > f32::EPSILON {
                // Back in the normal zone: restore the default fov with the
                // same height-preserving dolly.
                return FrustumUpdate::DollyZoom {
                    fov_deg: DEFAULT_FOV,
                    distance: state.distance
                        * (half_fov_tan(fov_deg) / half_fov_tan(DEFAULT_FOV)),
                };
            }
            FrustumUpdate::None
        }
        Projection::Orthographic { half_height, .. } => {
            if polar_angle >= SWITCH_ANGLE {
                let distance = half_height / half_fov_tan(MIN_FOV);
                return FrustumUpdate::SwitchToPerspective {
                    fov_deg: MIN_FOV,
                    distance,
                };
            }
            FrustumUpdate::None
        }
    }
}

/// Camera orbiting a fixed target.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub distance: f32,
    /// Angle from the +Y pole, in radians.
    pub polar: f32,
    /// Rotation around +Y, in radians.
    pub azimuth: f32,
    pub aspect: f32,
    pub projection: Projection,
    pub znear: f32,
    pub zfar: f32,
}

impl OrbitCamera {
    pub fn new(target: Vec3, distance: f32, aspect: f32) -> Self {
        Self {
            target,
            distance,
            polar: 1.0,
            azimuth: 0.0,
            aspect,
            projection: Projection::Perspective {
                fov_deg: DEFAULT_FOV,
            },
            znear: 0.1,
            zfar: 5000.0,
        }
    }

    /// World-space camera position.
    pub fn position(&self) -> Vec3 {
        let sin_p = self.polar.sin();
        self.target
            + self.distance
                * Vec3::new(
                    sin_p * self.azimuth.sin(),
                    self.polar.cos(),
                    sin_p * self.azimuth.cos(),
                )
    }

    /// Rotate around the target. `dx`/`dy` are in radians; the polar angle
    /// stays strictly inside (0, pi) so the view direction never crosses
    /// the pole.
    pub fn orbit(&mut self, dx: f32, dy: f32) {
        self.azimuth -= dx;
        self.polar = (self.polar - dy).clamp(1e-4, std::f32::consts::PI - 1e-4);
    }

    /// Scale the orbit distance (wheel zoom).
    pub fn zoom(&mut self, factor: f32) {
        self.distance = (self.distance * factor).clamp(1.0, 4000.0);
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    fn frustum_state(&self) -> FrustumState {
        FrustumState {
            projection: self.projection,
            distance: self.distance,
            aspect: self.aspect,
        }
    }

    /// Run the frustum transition for the current polar angle and apply it.
    pub fn update_projection(&mut self) {
        match update_frustum(self.polar, self.frustum_state()) {
            FrustumUpdate::None => {}
            FrustumUpdate::SwitchToOrthographic {
                half_width,
                half_height,
            } => {
                self.projection = Projection::Orthographic {
                    half_width,
                    half_height,
                };
            }
            FrustumUpdate::SwitchToPerspective { fov_deg, distance } => {
                self.projection = Projection::Perspective { fov_deg };
                self.distance = distance;
            }
            FrustumUpdate::DollyZoom { fov_deg, distance } => {
                self.projection = Projection::Perspective { fov_deg };
                self.distance = distance;
            }
        }
    }

    /// Up vector; near the pole the world up would be parallel to the view
    /// direction, so use the azimuthal tangent instead.
    fn up(&self) -> Vec3 {
        if self.polar < TRANSITION_ANGLE {
            Vec3::new(self.azimuth.sin(), 0.0, self.azimuth.cos()) * -1.0
        } else {
            Vec3::Y
        }
    }

    /// Combined view-projection matrix (right-handed, zero-to-one depth).
    pub fn view_proj(&self) -> Mat4 {
        let view = Mat4::look_at_rh(self.position(), self.target, self.up());
        let proj = match self.projection {
            Projection::Perspective { fov_deg } => {
                Mat4::perspective_rh(fov_deg.to_radians(), self.aspect, self.znear, self.zfar)
            }
            Projection::Orthographic {
                half_width,
                half_height,
            } => Mat4::orthographic_rh(
                -half_width,
                half_width,
                -half_height,
                half_height,
                self.znear,
                self.zfar,
            ),
        };
        proj * view
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    fn perspective(fov_deg: f32, distance: f32) -> FrustumState {
        FrustumState {
            projection: Projection::Perspective { fov_deg },
            distance,
            aspect: 16.0 / 9.0,
        }
    }

    #[test]
    fn test_normal_zone_is_stable() {
        let update = update_frustum(1.2, perspective(DEFAULT_FOV, 300.0));
        assert_eq!(update, FrustumUpdate::None);
    }

    #[test]
    fn test_normal_zone_restores_default_fov() {
        // Coming back up from the transition zone with a narrowed fov.
        let update = update_frustum(0.5, perspective(20.0, 300.0));
        match update {
            FrustumUpdate::DollyZoom { fov_deg, distance } => {
                assert!((fov_deg - DEFAULT_FOV).abs() < EPS);
                // The frustum height at the target is preserved.
                let before = frustum_height(20.0, 300.0);
                let after = frustum_height(fov_deg, distance);
                assert!((before - after).abs() / before < 1e-5);
            }
            other => panic!("expected DollyZoom, got {:?}", other),
        }
    }

    #[test]
    fn test_transition_zone_narrows_fov() {
        let mid = (SWITCH_ANGLE + TRANSITION_ANGLE) * 0.5;
        let update = update_frustum(mid, perspective(DEFAULT_FOV, 300.0));
        match update {
            FrustumUpdate::DollyZoom { fov_deg, distance } => {
                assert!(fov_deg > MIN_FOV && fov_deg < DEFAULT_FOV);
                // Narrower fov means the camera backs away.
                assert!(distance > 300.0);
                let before = frustum_height(DEFAULT_FOV, 300.0);
                let after = frustum_height(fov_deg, distance);
                assert!((before - after).abs() / before < 1e-5);
            }
            other => panic!("expected DollyZoom, got {:?}", other),
        }
    }

    #[test]
    fn test_switch_to_orthographic_at_pole() {
        let update = update_frustum(0.005, perspective(MIN_FOV, 500.0));
        match update {
            FrustumUpdate::SwitchToOrthographic {
                half_width,
                half_height,
            } => {
                let expected = frustum_height(MIN_FOV, 500.0) * 0.5;
                assert!((half_height - expected).abs() < EPS);
                assert!((half_width - expected * 16.0 / 9.0).abs() < 1e-3);
            }
            other => panic!("expected SwitchToOrthographic, got {:?}", other),
        }
    }

    #[test]
    fn test_switch_back_to_perspective() {
        let state = FrustumState {
            projection: Projection::Orthographic {
                half_width: 80.0,
                half_height: 45.0,
            },
            distance: 500.0,
            aspect: 16.0 / 9.0,
        };
        let update = update_frustum(0.02, state);
        match update {
            FrustumUpdate::SwitchToPerspective { fov_deg, distance } => {
                assert!((fov_deg - MIN_FOV).abs() < EPS);
                // The perspective frustum at the new distance matches the
                // orthographic extent.
                assert!((frustum_height(fov_deg, distance) * 0.5 - 45.0).abs() < 1e-2);
            }
            other => panic!("expected SwitchToPerspective, got {:?}", other),
        }
    }

    #[test]
    fn test_orthographic_stays_below_switch_angle() {
        let state = FrustumState {
            projection: Projection::Orthographic {
                half_width: 80.0,
                half_height: 45.0,
            },
            distance: 500.0,
            aspect: 16.0 / 9.0,
        };
        assert_eq!(update_frustum(0.005, state), FrustumUpdate::None);
    }

    #[test]
    fn test_orbit_clamps_polar() {
        let mut camera = OrbitCamera::new(Vec3::ZERO, 300.0, 1.0);
        camera.orbit(0.0, 10.0);
        assert!(camera.polar > 0.0);
        camera.orbit(0.0, -20.0);
        assert!(camera.polar < std::f32::consts::PI);
    }

    #[test]
    fn test_position_orbits_target() {
        let camera = OrbitCamera::new(Vec3::new(1.0, 2.0, 3.0), 100.0, 1.0);
        let d = (camera.position() - camera.target).length();
        assert!((d - 100.0).abs() < 1e-3);
    }
}
