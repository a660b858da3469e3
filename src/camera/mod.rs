//! Orbit camera in a Z-up world.
//!
//! The camera keeps a cartesian position/target pair and derives everything
//! else from it: the `{right, forward, up}` basis, the look-at view matrix and
//! the composed matrix uploaded to shaders. Spherical coordinates are a view
//! over `position` around the world origin; setters rebuild the position from
//! a freshly read [`Spherical`] triple, so they are read-modify-write and the
//! order of calls matters.

mod spherical;

pub use spherical::Spherical;

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::math::{aspect_correction, axis_swap, mat4_from_rows};

/// World vertical axis.
pub const VERTICAL: Vec3 = Vec3::Z;

/// Whether the roll angle participates in the up vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollMode {
    /// Up is the world vertical projected onto the view plane; `roll` is ignored.
    #[default]
    Fixed,
    /// The projected up vector is rotated by `roll` radians about forward.
    Rolled,
}

/// Orbit camera with caller-supplied projection.
///
/// A camera whose position equals its target has no forward direction. That
/// case is not an error: `forward`, `right` and the view matrix collapse to
/// zero vectors so the composed matrix stays finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    /// Roll angle in radians, used only with [`RollMode::Rolled`].
    pub roll: f32,
    pub roll_mode: RollMode,
    /// Width over height. `None` skips aspect correction, for projections
    /// that already account for it.
    pub aspect_ratio: Option<f32>,
    pub projection: Mat4,
}

impl Camera {
    pub fn new(position: Vec3, target: Vec3, aspect_ratio: Option<f32>, projection: Mat4) -> Self {
        Self {
            position,
            target,
            roll: 0.0,
            roll_mode: RollMode::Fixed,
            aspect_ratio,
            projection,
        }
    }

    /// Camera with identity projection and no aspect correction.
    pub fn orbiting(position: Vec3, target: Vec3) -> Self {
        Self::new(position, target, None, Mat4::IDENTITY)
    }

    /// Enables roll with the given angle in radians.
    pub fn with_roll(mut self, roll: f32) -> Self {
        self.roll = roll;
        self.roll_mode = RollMode::Rolled;
        self
    }

    /// Unit vector from position towards target, or zero when they coincide.
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }

    /// Up vector orthogonal to [`forward`](Self::forward).
    pub fn up(&self) -> Vec3 {
        let forward = self.forward();
        let up = level_up(forward);
        match self.roll_mode {
            RollMode::Fixed => up,
            RollMode::Rolled => {
                let right = forward.cross(up).normalize_or_zero();
                let (sin, cos) = self.roll.sin_cos();
                (up * cos + right * sin).normalize_or_zero()
            }
        }
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(self.up()).normalize_or_zero()
    }

    /// Look-at matrix whose rows are the basis vectors with their offsets.
    pub fn view_matrix(&self) -> Mat4 {
        let right = self.right();
        let forward = self.forward();
        let up = self.up();
        let position = self.position;
        mat4_from_rows(
            right.extend(-right.dot(position)),
            forward.extend(-forward.dot(position)),
            up.extend(-up.dot(position)),
            glam::Vec4::W,
        )
    }

    /// Swap between the camera's Z-up axes and clip-space Y-up axes.
    pub fn axis_convention_matrix(&self) -> Mat4 {
        axis_swap()
    }

    pub fn aspect_ratio_matrix(&self) -> Mat4 {
        self.aspect_ratio
            .map(aspect_correction)
            .unwrap_or(Mat4::IDENTITY)
    }

    /// `axis_swap * projection * aspect_correction * view`.
    pub fn camera_matrix(&self) -> Mat4 {
        self.axis_convention_matrix()
            * self.projection
            * self.aspect_ratio_matrix()
            * self.view_matrix()
    }

    /// The camera matrix as sixteen floats ready for a shader `mat4`.
    ///
    /// The floats are column-major, the layout shader matrices use. Read as a
    /// row-major array this is the transpose of [`camera_matrix`](Self::camera_matrix).
    pub fn camera_matrix_upload(&self) -> [f32; 16] {
        self.camera_matrix().to_cols_array()
    }

    pub fn spherical(&self) -> Spherical {
        Spherical::from_cartesian(self.position)
    }

    pub fn radius(&self) -> f32 {
        self.spherical().radius
    }

    pub fn polar(&self) -> f32 {
        self.spherical().polar
    }

    pub fn azimuthal(&self) -> f32 {
        self.spherical().azimuthal
    }

    /// Rescales the position along its current direction.
    ///
    /// The target is left alone, so zooming an off-origin target does not keep
    /// the orbit centred on it. A camera sitting at the origin stays there.
    pub fn set_radius(&mut self, radius: f32) {
        self.position = self.position.normalize_or_zero() * radius;
    }

    /// Rebuilds the position with a new polar angle, keeping radius and azimuthal.
    pub fn set_polar(&mut self, polar: f32) {
        let mut spherical = self.spherical();
        spherical.polar = polar;
        self.position = spherical.to_cartesian();
    }

    /// Rebuilds the position with a new azimuthal angle, keeping radius and polar.
    pub fn set_azimuthal(&mut self, azimuthal: f32) {
        let mut spherical = self.spherical();
        spherical.azimuthal = azimuthal;
        self.position = spherical.to_cartesian();
    }

    pub fn set_spherical(&mut self, spherical: Spherical) {
        self.position = spherical.to_cartesian();
    }

    /// Pans position and target together.
    pub fn move_by(&mut self, delta: Vec3) {
        self.position += delta;
        self.target += delta;
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }
}

/// World vertical projected onto the plane orthogonal to `forward`.
fn level_up(forward: Vec3) -> Vec3 {
    let d = VERTICAL.dot(forward);
    if d == 0.0 {
        return VERTICAL;
    }
    if d == 1.0 {
        return Vec3::NEG_Y;
    }
    if d == -1.0 {
        return Vec3::Y;
    }
    // `(forward x Z) x forward` equals `Z - d * forward` but stays orthogonal
    // to `forward` when `d` is within a few ULP of 1.
    match forward.cross(VERTICAL).try_normalize() {
        Some(right) => right.cross(forward).normalize(),
        None if d > 0.0 => Vec3::NEG_Y,
        None => Vec3::Y,
    }
}
