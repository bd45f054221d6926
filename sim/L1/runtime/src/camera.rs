//! Scene camera.
//!
//! Position comes from the `camera_x/y/z` control fields every frame. The
//! camera always looks at the origin with +Y up and a fixed field of view.

use glam::{Mat4, Vec3};

use crate::control::ControlState;

/// Perspective camera looking at a target.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Camera {
    /// Eye position.
    pub position: Vec3,
    /// Point looked at.
    pub target: Vec3,
    /// Up direction.
    pub up: Vec3,
    /// Vertical field of view (radians).
    pub fov_y: f32,
    /// Near clip distance.
    pub near: f32,
    /// Far clip distance.
    pub far: f32,
    /// Width over height.
    pub aspect: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(3.0, 10.0, 4.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: 75_f32.to_radians(),
            near: 0.1,
            far: 1000.0,
            aspect: 16.0 / 9.0,
        }
    }
}

impl Camera {
    /// Create a camera with the default lens for a viewport.
    #[must_use]
    pub fn for_viewport(width: u32, height: u32) -> Self {
        let mut camera = Self::default();
        camera.set_aspect(width, height);
        camera
    }

    /// Update the aspect ratio. A zero height is ignored.
    #[allow(clippy::cast_precision_loss)]
    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    /// Move the eye to the position held by `control`.
    pub fn update_from(&mut self, control: &ControlState) {
        self.position = control.camera_position();
    }

    /// World-to-view transform.
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// View-to-clip transform.
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    /// World-to-clip transform.
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}
