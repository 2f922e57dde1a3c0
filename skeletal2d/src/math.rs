//! Angle helpers shared by the bone, constraint and attachment math.

pub(crate) const DEG_RAD: f32 = std::f32::consts::PI / 180.0;
pub(crate) const RAD_DEG: f32 = 180.0 / std::f32::consts::PI;

#[inline]
pub(crate) fn sin_deg(degrees: f32) -> f32 {
    (degrees * DEG_RAD).sin()
}

#[inline]
pub(crate) fn cos_deg(degrees: f32) -> f32 {
    (degrees * DEG_RAD).cos()
}

/// Wraps an angle in degrees into `(-180, 180]`.
pub(crate) fn shortest_rotation(mut degrees: f32) -> f32 {
    degrees = degrees.rem_euclid(360.0);
    if degrees > 180.0 {
        degrees -= 360.0;
    }
    degrees
}

/// Single-step wrap of an angle in radians into `[-PI, PI]`.
pub(crate) fn wrap_pi(mut radians: f32) -> f32 {
    const PI: f32 = std::f32::consts::PI;
    const PI2: f32 = 2.0 * std::f32::consts::PI;
    if radians > PI {
        radians -= PI2;
    } else if radians < -PI {
        radians += PI2;
    }
    radians
}
