//! Conversions between physics (`nalgebra`, `f64`) and render (`glam`,
//! `f32`) types.
//!
//! This module is the only place that knows both sides. Physics and
//! rendering are both Y-up, so no axis is swapped.

#![allow(clippy::cast_possible_truncation)] // f64 -> f32 is intentional for rendering

use clatter_core::{CollisionShape, Pose};
use glam::{Quat, Vec3};
use nalgebra::{Point3, Quaternion, UnitQuaternion, Vector3};

use crate::sync::{ProxyShape, Transform};

/// Convert a nalgebra `Point3` to a glam `Vec3`.
#[inline]
#[must_use]
pub fn vec3_from_point(p: &Point3<f64>) -> Vec3 {
    Vec3::new(p.x as f32, p.y as f32, p.z as f32)
}

/// Convert a nalgebra `Vector3` to a glam `Vec3`.
#[inline]
#[must_use]
pub fn vec3_from_vector(v: &Vector3<f64>) -> Vec3 {
    Vec3::new(v.x as f32, v.y as f32, v.z as f32)
}

/// Convert a nalgebra `UnitQuaternion` to a glam `Quat`.
#[inline]
#[must_use]
pub fn quat_from_unit_quaternion(q: &UnitQuaternion<f64>) -> Quat {
    let q = q.quaternion();
    Quat::from_xyzw(q.i as f32, q.j as f32, q.k as f32, q.w as f32)
}

/// Convert a glam `Vec3` to a nalgebra `Point3`.
#[inline]
#[must_use]
pub fn point_from_vec3(v: Vec3) -> Point3<f64> {
    Point3::new(f64::from(v.x), f64::from(v.y), f64::from(v.z))
}

/// Convert a glam `Quat` to a nalgebra `UnitQuaternion`.
#[inline]
#[must_use]
pub fn unit_quaternion_from_quat(q: Quat) -> UnitQuaternion<f64> {
    UnitQuaternion::from_quaternion(Quaternion::new(
        f64::from(q.w),
        f64::from(q.x),
        f64::from(q.y),
        f64::from(q.z),
    ))
}

/// Proxy transform for a body pose.
#[must_use]
pub fn transform_from_pose(pose: &Pose) -> Transform {
    Transform {
        translation: vec3_from_point(&pose.position),
        rotation: quat_from_unit_quaternion(&pose.rotation),
    }
}

/// Render shape matching a collision shape.
#[must_use]
pub fn proxy_shape(shape: &CollisionShape) -> ProxyShape {
    match shape {
        CollisionShape::Sphere { radius } => ProxyShape::Sphere {
            radius: *radius as f32,
        },
        CollisionShape::Box { half_extents } => ProxyShape::Cuboid {
            half_extents: vec3_from_vector(half_extents),
        },
        CollisionShape::Plane { normal, offset } => ProxyShape::Plane {
            normal: vec3_from_vector(normal),
            offset: *offset as f32,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_4;

    #[test]
    fn point_roundtrip_keeps_axes() {
        let original = Point3::new(1.0, 2.0, 3.0);
        let render = vec3_from_point(&original);

        // Y-up on both sides
        assert_eq!(render, Vec3::new(1.0, 2.0, 3.0));

        let back = point_from_vec3(render);
        assert!((original - back).norm() < 1e-6);
    }

    #[test]
    fn quaternion_roundtrip() {
        let original = UnitQuaternion::from_euler_angles(FRAC_PI_4, 0.3, -0.2);
        let back = unit_quaternion_from_quat(quat_from_unit_quaternion(&original));

        let diff = original.rotation_to(&back).angle();
        assert!(diff < 1e-5, "quaternion roundtrip error: {diff}");
    }

    #[test]
    fn pose_to_transform() {
        let pose = Pose::from_position_rotation(
            Point3::new(0.5, 10.0, -1.0),
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), FRAC_PI_4),
        );
        let t = transform_from_pose(&pose);

        assert_eq!(t.translation, Vec3::new(0.5, 10.0, -1.0));
        let expected = Quat::from_rotation_y(std::f32::consts::FRAC_PI_4);
        assert!(t.rotation.angle_between(expected) < 1e-5);
    }

    #[test]
    fn shapes_map_one_to_one() {
        let cuboid = proxy_shape(&CollisionShape::cuboid(Vector3::new(0.5, 1.0, 2.0)));
        assert_eq!(
            cuboid,
            ProxyShape::Cuboid {
                half_extents: Vec3::new(0.5, 1.0, 2.0)
            }
        );
        assert_eq!(
            proxy_shape(&CollisionShape::ground_plane()),
            ProxyShape::Plane {
                normal: Vec3::Y,
                offset: 0.0
            }
        );
    }
}
