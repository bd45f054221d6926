//! Semi-implicit Euler integration, split around the contact solve.
//!
//! The world integrates in two halves so the solver sees post-force
//! velocities and positions move with post-solve velocities:
//!
//! ```text
//! v(t+dt) = v(t) + a(t) * dt        integrate_velocity  (before contacts)
//! x(t+dt) = x(t) + v(t+dt) * dt     integrate_position  (after contacts)
//! ```
//!
//! Inside the world the second half is [`integrate_pose`] with the penetration
//! push added to `v(t+dt)`.
//!
//! Taken together this is symplectic Euler, which keeps bouncing and
//! resting bodies stable at a 60 Hz step.
//!
//! # Example
//!
//! ```
//! use clatter_core::integrators::{integrate_position, integrate_velocity};
//! use clatter_types::{Pose, RigidBodyState};
//! use nalgebra::{Point3, Vector3};
//!
//! let mut state = RigidBodyState::at_rest(Pose::from_position(Point3::new(0.0, 10.0, 0.0)));
//! let gravity = Vector3::new(0.0, -9.82, 0.0);
//!
//! integrate_velocity(&mut state.twist, gravity, Vector3::zeros(), 0.01);
//! integrate_position(&mut state, 0.01);
//!
//! assert!(state.pose.position.y < 10.0);
//! assert!(state.twist.linear.y < 0.0);
//! ```

use clatter_types::{Pose, RigidBodyState, Twist};
use nalgebra::{UnitQuaternion, Vector3};

/// Angular speeds below this leave the orientation untouched.
const MIN_ANGULAR_SPEED: f64 = 1e-10;

/// Advance velocities by one step of acceleration.
pub fn integrate_velocity(
    twist: &mut Twist,
    linear_accel: Vector3<f64>,
    angular_accel: Vector3<f64>,
    dt: f64,
) {
    twist.linear += linear_accel * dt;
    twist.angular += angular_accel * dt;
}

/// Advance position and orientation using the current velocities.
pub fn integrate_position(state: &mut RigidBodyState, dt: f64) {
    integrate_pose(&mut state.pose, &state.twist, dt);
}

/// Move a pose by `motion` for `dt`.
///
/// The world passes velocity plus the solver's penetration push here, so a
/// body climbs out of an overlap without keeping the push as velocity.
pub fn integrate_pose(pose: &mut Pose, motion: &Twist, dt: f64) {
    pose.position += motion.linear * dt;
    integrate_rotation(&mut pose.rotation, &motion.angular, dt);
}

/// Integrate rotation using a world-frame angular velocity.
///
/// q(t+dt) = exp(0.5 * omega * dt) * q(t), renormalized so drift never
/// accumulates across thousands of steps.
fn integrate_rotation(rotation: &mut UnitQuaternion<f64>, omega: &Vector3<f64>, dt: f64) {
    if omega.norm() < MIN_ANGULAR_SPEED {
        return;
    }

    let delta_q = UnitQuaternion::from_scaled_axis(omega * dt);
    *rotation = delta_q * *rotation;
    rotation.renormalize();
}

/// Damping utility for applying velocity damping.
#[must_use]
pub fn apply_damping(twist: &Twist, linear_damping: f64, angular_damping: f64, dt: f64) -> Twist {
    // Exponential damping: v *= exp(-damping * dt) ≈ 1 - damping * dt for small dt
    let linear_factor = (-linear_damping * dt).exp();
    let angular_factor = (-angular_damping * dt).exp();

    Twist::new(twist.linear * linear_factor, twist.angular * angular_factor)
}

/// Clamp velocities to maximum values.
#[must_use]
pub fn clamp_velocities(twist: &Twist, max_linear: f64, max_angular: f64) -> Twist {
    let linear = if twist.linear.norm() > max_linear {
        twist.linear.normalize() * max_linear
    } else {
        twist.linear
    };

    let angular = if twist.angular.norm() > max_angular {
        twist.angular.normalize() * max_angular
    } else {
        twist.angular
    };

    Twist::new(linear, angular)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;
    use std::f64::consts::FRAC_PI_2;

    fn make_state_at_origin() -> RigidBodyState {
        RigidBodyState::at_rest(Pose::from_position(Point3::origin()))
    }

    #[test]
    fn test_semi_implicit_uses_new_velocity() {
        let mut state = make_state_at_origin();
        let dt = 0.1;

        integrate_velocity(&mut state.twist, Vector3::new(0.0, -10.0, 0.0), Vector3::zeros(), dt);
        integrate_position(&mut state, dt);

        assert_relative_eq!(state.twist.linear.y, -1.0, epsilon = 1e-12);
        // Position moved with the updated velocity, not the old one
        assert_relative_eq!(state.pose.position.y, -0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_pose_moves_with_given_motion_only() {
        let mut state = make_state_at_origin();
        state.twist = Twist::linear(Vector3::new(1.0, 0.0, 0.0));
        let push = Twist::linear(Vector3::new(0.0, 2.0, 0.0));

        integrate_pose(&mut state.pose, &push, 0.5);

        assert_relative_eq!(state.pose.position, Point3::new(0.0, 1.0, 0.0));
        assert_eq!(state.twist.linear, Vector3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_rotation_quarter_turn() {
        let mut state = make_state_at_origin();
        state.twist.angular = Vector3::new(0.0, FRAC_PI_2, 0.0);

        for _ in 0..100 {
            integrate_position(&mut state, 0.01);
        }

        let expected = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), FRAC_PI_2);
        assert_relative_eq!(state.pose.rotation.angle_to(&expected), 0.0, epsilon = 1e-9);
        assert_relative_eq!(state.pose.rotation.quaternion().norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_world_frame_rotation_order() {
        // Body already turned 90° about Y; spinning about world X must
        // rotate around world X, not the body's local X.
        let mut rotation = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), FRAC_PI_2);
        integrate_rotation(&mut rotation, &Vector3::new(FRAC_PI_2, 0.0, 0.0), 1.0);

        let up = rotation * Vector3::y();
        // World-X quarter turn takes +Y to +Z
        assert_relative_eq!(up, Vector3::z(), epsilon = 1e-9);
    }

    #[test]
    fn test_damping() {
        let twist = Twist::new(Vector3::new(10.0, 0.0, 0.0), Vector3::new(0.0, 5.0, 0.0));
        let damped = apply_damping(&twist, 1.0, 2.0, 0.1);

        assert!(damped.linear.x < 10.0);
        assert_relative_eq!(damped.linear.x, 10.0 * (-0.1_f64).exp(), epsilon = 1e-12);
        assert_relative_eq!(damped.angular.y, 5.0 * (-0.2_f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn test_velocity_clamping() {
        let twist = Twist::new(Vector3::new(100.0, 0.0, 0.0), Vector3::new(0.0, 50.0, 0.0));
        let clamped = clamp_velocities(&twist, 10.0, 5.0);

        assert_relative_eq!(clamped.linear.norm(), 10.0, epsilon = 1e-10);
        assert_relative_eq!(clamped.angular.norm(), 5.0, epsilon = 1e-10);

        let slow = Twist::linear(Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(clamp_velocities(&slow, 10.0, 5.0), slow);
    }
}
