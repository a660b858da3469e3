use std::collections::HashSet;
use std::f32::consts::PI;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::camera::Camera;

/// Degrees of orbit per pixel of cursor travel.
pub const DRAG_DEGREES_PER_PIXEL: f32 = 0.5;

/// Distance kept between the polar angle and the poles while dragging.
const POLAR_MARGIN: f32 = 1.0e-3;

/// Identifier for a mouse button (left button is zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MouseButton(u8);

impl MouseButton {
    pub const LEFT: Self = Self(0);
    pub const RIGHT: Self = Self(1);
    pub const MIDDLE: Self = Self(2);

    pub fn new(index: u8) -> Self {
        Self(index)
    }

    pub fn index(self) -> u8 {
        self.0
    }
}

/// Turns window input into camera orbits.
///
/// Scrolling scales the orbit radius, dragging with the left button moves
/// the camera around its target.
#[derive(Debug, Default)]
pub struct OrbitControls {
    mouse_buttons: HashSet<MouseButton>,
    cursor: Option<Vec2>,
}

impl OrbitControls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mouse_button_down(&mut self, button: MouseButton) {
        self.mouse_buttons.insert(button);
    }

    pub fn set_mouse_button_up(&mut self, button: MouseButton) {
        self.mouse_buttons.remove(&button);
    }

    pub fn is_mouse_button_down(&self, button: MouseButton) -> bool {
        self.mouse_buttons.contains(&button)
    }

    /// Scales the radius by `1 + delta`. Factors that would flip or collapse
    /// the orbit are ignored.
    pub fn scroll(&self, camera: &mut Camera, delta: f32) {
        let factor = 1.0 + delta;
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        camera.set_radius(camera.radius() * factor);
    }

    /// Records a new cursor position and orbits by the movement since the
    /// previous one while the left button is held.
    pub fn cursor_moved(&mut self, camera: &mut Camera, position: Vec2) {
        if let Some(previous) = self.cursor.replace(position) {
            self.drag(camera, position - previous);
        }
    }

    /// Forgets the cursor, so the next movement does not jump.
    pub fn cursor_left(&mut self) {
        self.cursor = None;
    }

    /// Orbits by `delta` pixels if the left button is held. Returns whether
    /// the camera moved.
    pub fn drag(&self, camera: &mut Camera, delta: Vec2) -> bool {
        if !self.is_mouse_button_down(MouseButton::LEFT) || delta == Vec2::ZERO {
            return false;
        }
        let mut spherical = camera.spherical();
        spherical.azimuthal -= (delta.x * DRAG_DEGREES_PER_PIXEL).to_radians();
        spherical.polar = (spherical.polar - (delta.y * DRAG_DEGREES_PER_PIXEL).to_radians())
            .clamp(POLAR_MARGIN, PI - POLAR_MARGIN);
        camera.set_spherical(spherical);
        true
    }
}
