use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Spherical coordinates of a point around the world origin, Z-up.
///
/// `polar` is measured from the +Z axis and `azimuthal` from +X towards +Y.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Spherical {
    pub radius: f32,
    pub polar: f32,
    pub azimuthal: f32,
}

impl Spherical {
    pub const fn new(radius: f32, polar: f32, azimuthal: f32) -> Self {
        Self {
            radius,
            polar,
            azimuthal,
        }
    }

    /// Converts a cartesian position into spherical coordinates.
    ///
    /// Degenerate inputs are folded into fixed values instead of producing NaN:
    /// the origin has polar angle 0, and any point on the Z axis has azimuthal
    /// angle 0. Points on the negative X half-axis report `PI` rather than the
    /// 0 a literal `sign(y) * acos(..)` gives, so the angle does not jump by
    /// `PI` when crossing that axis.
    pub fn from_cartesian(position: Vec3) -> Self {
        let radius = position.length();
        let polar = if radius > 0.0 {
            (position.z / radius).clamp(-1.0, 1.0).acos()
        } else {
            0.0
        };

        let planar = Vec2::new(position.x, position.y).length();
        let azimuthal = if planar > 0.0 {
            let sign = if position.y < 0.0 { -1.0 } else { 1.0 };
            sign * (position.x / planar).clamp(-1.0, 1.0).acos()
        } else {
            0.0
        };

        Self {
            radius,
            polar,
            azimuthal,
        }
    }

    pub fn to_cartesian(self) -> Vec3 {
        let (sin_polar, cos_polar) = self.polar.sin_cos();
        let (sin_azimuthal, cos_azimuthal) = self.azimuthal.sin_cos();
        Vec3::new(
            self.radius * sin_polar * cos_azimuthal,
            self.radius * sin_polar * sin_azimuthal,
            self.radius * cos_polar,
        )
    }
}
