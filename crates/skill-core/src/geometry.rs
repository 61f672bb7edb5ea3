//! Parameter denormalization and end-effector orientation helpers.
//!
//! Orientations follow the static-xyz Euler convention
//! (`R = Rz(yaw) * Ry(pitch) * Rx(roll)`). Skill targets keep the gripper
//! pointing down (roll = pi, pitch = 0) and only expose yaw.

use crate::config::{PositionBounds, YawBounds};
use nalgebra::{UnitQuaternion, Vector3};
use std::f64::consts::{PI, TAU};

/// Gripper commands with magnitude below this snap to zero.
pub const GRIPPER_DEADBAND: f64 = 0.10;

/// Map a normalized parameter in [-1, 1] onto `[low, high]`.
///
/// Out-of-range parameters are clipped first.
pub fn unnormalize_scalar(param: f64, low: f64, high: f64) -> f64 {
    let t = (param.clamp(-1.0, 1.0) + 1.0) / 2.0;
    low * (1.0 - t) + high * t
}

/// Map a normalized 3-vector onto the position box.
pub fn unnormalize_position(params: &Vector3<f64>, bounds: &PositionBounds) -> Vector3<f64> {
    Vector3::from_fn(|i, _| unnormalize_scalar(params[i], bounds.low[i], bounds.high[i]))
}

/// Map a normalized yaw parameter onto the yaw range.
pub fn unnormalize_yaw(param: f64, bounds: &YawBounds) -> f64 {
    unnormalize_scalar(param, bounds.low, bounds.high)
}

/// Clip a push delta to [-1, 1] and scale it by the delta range.
///
/// Unlike [`unnormalize_position`] this does not interpolate: zero stays zero.
pub fn scale_delta(delta: &Vector3<f64>, range: &Vector3<f64>) -> Vector3<f64> {
    delta.map(|d| d.clamp(-1.0, 1.0)).component_mul(range)
}

/// Minimal unsigned angular distance between two yaws, in [0, pi].
pub fn yaw_difference(current: f64, target: f64) -> f64 {
    let forward = (current - target).rem_euclid(TAU);
    let backward = (target - current).rem_euclid(TAU);
    forward.min(backward)
}

/// Yaw component of an orientation.
pub fn yaw_of(orientation: &UnitQuaternion<f64>) -> f64 {
    orientation.euler_angles().2
}

/// Gripper-down orientation with the given yaw.
pub fn target_orientation(yaw: f64) -> UnitQuaternion<f64> {
    UnitQuaternion::from_euler_angles(PI, 0.0, yaw)
}

/// Axis-angle rotation taking `current` onto the gripper-down target yaw.
///
/// Returns zero when no target yaw is defined.
pub fn orientation_delta(current: &UnitQuaternion<f64>, target_yaw: Option<f64>) -> Vector3<f64> {
    match target_yaw {
        Some(yaw) => (target_orientation(yaw) * current.inverse()).scaled_axis(),
        None => Vector3::zeros(),
    }
}

/// Snap a continuous gripper command to {-1, 0, +1}.
pub fn binary_gripper(value: f64) -> f64 {
    if value.abs() < GRIPPER_DEADBAND {
        0.0
    } else if value < 0.0 {
        -1.0
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const EPS: f64 = 1e-9;

    fn bounds() -> PositionBounds {
        PositionBounds::new([-0.30, -0.30, 0.80], [0.15, 0.30, 0.90])
    }

    #[test]
    fn unnormalize_hits_bounds_exactly_at_extremes() {
        let b = bounds();
        assert_eq!(unnormalize_position(&Vector3::repeat(-1.0), &b), b.low);
        assert_eq!(unnormalize_position(&Vector3::repeat(1.0), &b), b.high);
    }

    #[test]
    fn unnormalize_stays_inside_bounds() {
        let b = bounds();
        let samples = [-1.0, -0.75, -0.2, 0.0, 0.33, 0.9, 1.0];
        for &x in &samples {
            for &y in &samples {
                let p = unnormalize_position(&Vector3::new(x, y, -x), &b);
                for i in 0..3 {
                    assert!(p[i] >= b.low[i] - EPS && p[i] <= b.high[i] + EPS);
                }
            }
        }
    }

    #[test]
    fn unnormalize_clips_out_of_range_params() {
        assert_eq!(unnormalize_scalar(3.0, -2.0, 2.0), 2.0);
        assert_eq!(unnormalize_scalar(-7.5, -2.0, 2.0), -2.0);
        assert!((unnormalize_scalar(0.0, -2.0, 2.0)).abs() < EPS);
    }

    #[test]
    fn unnormalize_yaw_uses_yaw_range() {
        let b = YawBounds {
            low: -FRAC_PI_2,
            high: FRAC_PI_2,
        };
        assert_eq!(unnormalize_yaw(1.0, &b), FRAC_PI_2);
        assert!((unnormalize_yaw(0.5, &b) - FRAC_PI_2 / 2.0).abs() < EPS);
    }

    #[test]
    fn scale_delta_clips_before_scaling() {
        let range = Vector3::new(0.15, 0.15, 0.05);
        let scaled = scale_delta(&Vector3::new(2.0, -0.5, 0.0), &range);
        assert!((scaled - Vector3::new(0.15, -0.075, 0.0)).norm() < EPS);
    }

    #[test]
    fn yaw_difference_is_zero_for_equal_angles() {
        for a in [-7.0, -PI, -1.0, 0.0, 0.4, PI, 12.5] {
            assert!(yaw_difference(a, a).abs() < EPS);
        }
    }

    #[test]
    fn yaw_difference_is_symmetric_and_bounded() {
        let angles = [-6.0, -PI, -2.0, -0.3, 0.0, 0.1, 1.5, PI, 4.0, 9.0];
        for &a in &angles {
            for &b in &angles {
                let d = yaw_difference(a, b);
                assert!((d - yaw_difference(b, a)).abs() < EPS);
                assert!((-EPS..=PI + EPS).contains(&d), "{a} {b} -> {d}");
            }
        }
    }

    #[test]
    fn yaw_difference_wraps_around() {
        let d = yaw_difference(PI - 0.1, -PI + 0.1);
        assert!((d - 0.2).abs() < EPS);
    }

    #[test]
    fn target_orientation_round_trips_yaw() {
        for yaw in [-1.2, -0.5, 0.0, 0.7, 1.5] {
            assert!((yaw_of(&target_orientation(yaw)) - yaw).abs() < 1e-9);
        }
    }

    #[test]
    fn orientation_delta_is_zero_without_target() {
        let q = target_orientation(0.3);
        assert_eq!(orientation_delta(&q, None), Vector3::zeros());
    }

    #[test]
    fn orientation_delta_is_zero_at_target() {
        let q = target_orientation(0.3);
        assert!(orientation_delta(&q, Some(0.3)).norm() < 1e-9);
    }

    #[test]
    fn orientation_delta_rotates_onto_target() {
        let current = target_orientation(0.2);
        let delta = orientation_delta(&current, Some(0.7));
        assert!((delta.norm() - 0.5).abs() < 1e-9);

        let reached = UnitQuaternion::from_scaled_axis(delta) * current;
        assert!((yaw_of(&reached) - 0.7).abs() < 1e-9);
    }

    #[test]
    fn binary_gripper_boundaries() {
        assert_eq!(binary_gripper(0.0), 0.0);
        assert_eq!(binary_gripper(0.099), 0.0);
        assert_eq!(binary_gripper(-0.099), 0.0);
        assert_eq!(binary_gripper(0.10), 1.0);
        assert_eq!(binary_gripper(-0.10), -1.0);
        assert_eq!(binary_gripper(0.8), 1.0);
        assert_eq!(binary_gripper(-3.0), -1.0);
    }
}
