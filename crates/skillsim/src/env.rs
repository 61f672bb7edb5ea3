//! Kinematic point-mass environment.
//!
//! The end effector moves by the commanded delta each step, bounded per axis
//! by `max_pos_step`. A single cube rests on the table. Closing the gripper
//! near the cube attaches it; opening releases it back onto the table. An
//! open end effector moving into the cube at cube height drags it along in
//! the plane.

use nalgebra::{UnitQuaternion, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};
use skill_core::config::PositionBounds;
use skill_core::env::{EefPose, Environment, Observation, SkillInfo, Transition};
use skill_core::geometry::target_orientation;
use skill_core::ActionVector;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq)]
pub enum SimError {
    #[error("action contains non-finite values: {0:?}")]
    NonFiniteAction(Vec<f64>),
    #[error("episode ended after {0} steps; reset first")]
    EpisodeOver(u32),
}

/// Scene and dynamics parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// End-effector start position.
    pub start: Vector3<f64>,
    /// End-effector start yaw, gripper pointing down.
    pub start_yaw: f64,
    /// Cube start position (center).
    pub cube: Vector3<f64>,
    /// Where the cube should end up; drives the reward.
    pub goal: Vector3<f64>,
    pub table_height: f64,
    pub cube_half_size: f64,
    /// Largest per-axis position change for one step, in meters.
    pub max_pos_step: f64,
    /// Largest per-axis rotation change for one step, in radians.
    pub max_rot_step: f64,
    /// Closing within this distance of the cube center grasps it.
    pub grasp_tolerance: f64,
    /// Planar distance at which the end effector touches the cube.
    pub contact_radius: f64,
    /// Steps per episode.
    pub horizon: u32,
    /// Render a top-down frame into each observation.
    pub render: bool,
    /// Side length of the rendered frame, in pixels.
    pub image_size: usize,
    /// Region covered by the rendered frame.
    pub workspace: PositionBounds,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            start: Vector3::new(-0.10, 0.0, 0.90),
            start_yaw: 0.0,
            cube: Vector3::new(0.05, 0.10, 0.82),
            goal: Vector3::new(0.05, 0.25, 0.82),
            table_height: 0.80,
            cube_half_size: 0.02,
            max_pos_step: 0.08,
            max_rot_step: 0.5,
            grasp_tolerance: 0.03,
            contact_radius: 0.05,
            horizon: 500,
            render: false,
            image_size: 16,
            workspace: PositionBounds::new([-0.30, -0.30, 0.80], [0.15, 0.30, 0.90]),
        }
    }
}

/// Point-mass arm with a parallel gripper and one cube.
#[derive(Debug, Clone)]
pub struct PointMassEnv {
    config: SimConfig,
    eef: EefPose,
    /// +1 closed, -1 open.
    gripper: f64,
    cube: Vector3<f64>,
    grasped: bool,
    steps: u32,
}

impl PointMassEnv {
    pub fn new(config: SimConfig) -> Self {
        let mut env = Self {
            eef: EefPose {
                pos: config.start,
                quat: target_orientation(config.start_yaw),
            },
            gripper: -1.0,
            cube: config.cube,
            grasped: false,
            steps: 0,
            config,
        };
        env.restart();
        env
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn cube(&self) -> Vector3<f64> {
        self.cube
    }

    pub fn is_grasped(&self) -> bool {
        self.grasped
    }

    pub fn gripper(&self) -> f64 {
        self.gripper
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    fn restart(&mut self) {
        self.eef = EefPose {
            pos: self.config.start,
            quat: target_orientation(self.config.start_yaw),
        };
        self.gripper = -1.0;
        self.cube = self.config.cube;
        self.grasped = false;
        self.steps = 0;
    }

    fn reward(&self) -> f64 {
        1.0 - (10.0 * (self.cube - self.config.goal).norm()).tanh()
    }

    /// Push-source center: behind the cube along the cube-to-goal direction.
    fn push_center(&self) -> Vector3<f64> {
        let offset = (self.config.goal - self.cube).xy();
        let back = offset
            .try_normalize(f64::EPSILON)
            .unwrap_or_else(Vector2::zeros)
            * (self.config.cube_half_size * 2.0);
        Vector3::new(self.cube.x - back.x, self.cube.y - back.y, self.cube.z)
    }

    fn apply_gripper(&mut self, command: f64) {
        if command > 0.0 && self.gripper < 0.0 {
            self.gripper = 1.0;
            if (self.eef.pos - self.cube).norm() <= self.config.grasp_tolerance {
                self.grasped = true;
                debug!(cube = ?self.cube.as_slice(), "cube grasped");
            }
        } else if command < 0.0 && self.gripper > 0.0 {
            self.gripper = -1.0;
            if self.grasped {
                self.grasped = false;
                self.cube.z = self.config.table_height + self.config.cube_half_size;
                debug!(cube = ?self.cube.as_slice(), "cube released");
            }
        }
    }

    /// Drag the cube when the open end effector sweeps into it.
    fn push_cube(&mut self, before: &Vector3<f64>, delta: &Vector3<f64>) {
        if self.grasped || (before.z - self.cube.z).abs() > self.config.cube_half_size {
            return;
        }
        let offset = self.cube.xy() - before.xy();
        let motion = delta.xy();
        if offset.norm() > self.config.contact_radius || motion.dot(&offset) <= 0.0 {
            return;
        }
        self.cube.x += motion.x;
        self.cube.y += motion.y;
    }

    /// Top-down grayscale frame: cube 128, end effector 255.
    fn render(&self) -> Vec<u8> {
        let size = self.config.image_size;
        let mut frame = vec![0u8; size * size];
        let bounds = &self.config.workspace;
        let cell = |p: &Vector3<f64>| -> Option<usize> {
            let u = (p.x - bounds.low.x) / (bounds.high.x - bounds.low.x);
            let v = (p.y - bounds.low.y) / (bounds.high.y - bounds.low.y);
            if !(0.0..=1.0).contains(&u) || !(0.0..=1.0).contains(&v) {
                return None;
            }
            let col = ((u * size as f64) as usize).min(size - 1);
            let row = ((v * size as f64) as usize).min(size - 1);
            Some(row * size + col)
        };
        if let Some(i) = cell(&self.cube) {
            frame[i] = 128;
        }
        if let Some(i) = cell(&self.eef.pos) {
            frame[i] = 255;
        }
        frame
    }

    fn observation(&self) -> Observation {
        Observation {
            eef: self.eef,
            state: vec![
                self.cube.x,
                self.cube.y,
                self.cube.z,
                self.gripper,
                f64::from(u8::from(self.grasped)),
            ],
            image: (self.config.render && self.config.image_size > 0).then(|| self.render()),
        }
    }
}

impl Environment for PointMassEnv {
    type Error = SimError;

    fn reset(&mut self) -> Result<Observation, SimError> {
        self.restart();
        Ok(self.observation())
    }

    fn step(&mut self, action: &ActionVector) -> Result<Transition, SimError> {
        let flat = action.to_vec();
        if flat.iter().any(|v| !v.is_finite()) {
            return Err(SimError::NonFiniteAction(flat));
        }
        if self.steps >= self.config.horizon {
            return Err(SimError::EpisodeOver(self.steps));
        }

        let delta = action.pos.map(|d| d.clamp(-1.0, 1.0) * self.config.max_pos_step);
        let before = self.eef.pos;
        self.eef.pos += delta;
        self.eef.pos.z = self.eef.pos.z.max(self.config.table_height);
        if let Some(ori) = action.ori {
            let rot = ori.map(|r| r.clamp(-1.0, 1.0) * self.config.max_rot_step);
            self.eef.quat = UnitQuaternion::from_scaled_axis(rot) * self.eef.quat;
        }

        self.apply_gripper(action.gripper);
        if self.grasped {
            self.cube = self.eef.pos;
        } else {
            self.push_cube(&before, &delta);
        }
        self.steps += 1;

        let mut info = Map::new();
        info.insert("cube_pos".to_string(), json!(self.cube.as_slice()));
        info.insert("grasped".to_string(), json!(self.grasped));
        info.insert("gripper".to_string(), json!(self.gripper));

        Ok(Transition {
            observation: self.observation(),
            reward: self.reward(),
            done: self.steps >= self.config.horizon,
            info,
        })
    }

    fn eef_pose(&self) -> EefPose {
        self.eef
    }

    fn skill_info(&self) -> SkillInfo {
        SkillInfo {
            cur_ee_pos: self.eef.pos,
            reach_pos: Some(vec![self.cube]),
            grasp_pos: Some(vec![self.cube]),
            push_pos: Some(vec![self.push_center()]),
        }
    }

    /// Divide deltas by the per-step limits so they land in [-1, 1].
    fn unscale_action(&self, action: ActionVector) -> ActionVector {
        let pos = action.pos.map(|d| (d / self.config.max_pos_step).clamp(-1.0, 1.0));
        let ori = action
            .ori
            .map(|o| o.map(|r| (r / self.config.max_rot_step).clamp(-1.0, 1.0)));
        ActionVector::new(pos, ori, action.gripper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> PointMassEnv {
        PointMassEnv::new(SimConfig::default())
    }

    fn step(env: &mut PointMassEnv, pos: [f64; 3], gripper: f64) -> Transition {
        env.step(&ActionVector::new(Vector3::from(pos), None, gripper))
            .unwrap()
    }

    #[test]
    fn position_step_is_bounded() {
        let mut env = env();
        step(&mut env, [5.0, 0.0, -0.5], 0.0);
        let pos = env.eef_pose().pos;
        assert!((pos - Vector3::new(-0.02, 0.0, 0.86)).norm() < 1e-12);
    }

    #[test]
    fn unscale_maps_deltas_into_unit_range() {
        let env = env();
        let raw = ActionVector::new(
            Vector3::new(0.04, -0.2, 0.0),
            Some(Vector3::new(0.0, 0.0, 0.25)),
            1.0,
        );
        let scaled = env.unscale_action(raw);
        assert_eq!(scaled.to_vec(), vec![0.5, -1.0, 0.0, 0.0, 0.0, 0.5, 1.0]);
    }

    #[test]
    fn table_stops_descent() {
        let mut env = env();
        for _ in 0..5 {
            step(&mut env, [0.0, 0.0, -1.0], 0.0);
        }
        assert_eq!(env.eef_pose().pos.z, 0.80);
    }

    #[test]
    fn closing_near_cube_grasps_and_carries_it() {
        let mut env = PointMassEnv::new(SimConfig {
            start: Vector3::new(0.05, 0.10, 0.83),
            ..SimConfig::default()
        });
        step(&mut env, [0.0, 0.0, 0.0], 1.0);
        assert!(env.is_grasped());

        step(&mut env, [0.0, 0.0, 1.0], 0.0);
        assert!((env.cube().z - 0.91).abs() < 1e-12);

        step(&mut env, [0.0, 0.0, 0.0], -1.0);
        assert!(!env.is_grasped());
        assert!((env.cube().z - 0.82).abs() < 1e-12);
    }

    #[test]
    fn closing_far_from_cube_grasps_nothing() {
        let mut env = env();
        step(&mut env, [0.0, 0.0, 0.0], 1.0);
        assert_eq!(env.gripper(), 1.0);
        assert!(!env.is_grasped());
    }

    #[test]
    fn sweeping_into_cube_pushes_it() {
        let mut env = PointMassEnv::new(SimConfig {
            start: Vector3::new(0.05, 0.06, 0.82),
            ..SimConfig::default()
        });
        step(&mut env, [0.0, 0.5, 0.0], 0.0);
        assert!((env.cube() - Vector3::new(0.05, 0.14, 0.82)).norm() < 1e-12);

        // Moving away leaves it in place.
        step(&mut env, [0.0, -1.0, 0.0], 0.0);
        assert!((env.cube() - Vector3::new(0.05, 0.14, 0.82)).norm() < 1e-12);
    }

    #[test]
    fn reward_peaks_at_goal() {
        let mut env = PointMassEnv::new(SimConfig {
            cube: SimConfig::default().goal,
            ..SimConfig::default()
        });
        let t = step(&mut env, [0.0, 0.0, 0.0], 0.0);
        assert!((t.reward - 1.0).abs() < 1e-12);
        assert_eq!(t.info["grasped"], json!(false));
    }

    #[test]
    fn push_center_sits_behind_cube() {
        let info = env().skill_info();
        let push = info.push_pos.unwrap()[0];
        assert!((push - Vector3::new(0.05, 0.06, 0.82)).norm() < 1e-12);
        assert_eq!(info.grasp_pos.unwrap()[0], Vector3::new(0.05, 0.10, 0.82));
    }

    #[test]
    fn horizon_ends_episode() {
        let mut env = PointMassEnv::new(SimConfig {
            horizon: 2,
            ..SimConfig::default()
        });
        assert!(!step(&mut env, [0.0; 3], 0.0).done);
        assert!(step(&mut env, [0.0; 3], 0.0).done);
        let err = env
            .step(&ActionVector::new(Vector3::zeros(), None, 0.0))
            .unwrap_err();
        assert_eq!(err, SimError::EpisodeOver(2));

        env.reset().unwrap();
        assert_eq!(env.steps(), 0);
    }

    #[test]
    fn rejects_non_finite_action() {
        let mut env = env();
        let action = ActionVector::new(Vector3::new(f64::NAN, 0.0, 0.0), None, 0.0);
        assert!(matches!(env.step(&action), Err(SimError::NonFiniteAction(_))));
    }

    #[test]
    fn render_marks_cube_and_end_effector() {
        let mut env = PointMassEnv::new(SimConfig {
            render: true,
            ..SimConfig::default()
        });
        let obs = env.reset().unwrap();
        let frame = obs.image.unwrap();
        assert_eq!(frame.len(), 256);
        assert_eq!(frame.iter().filter(|&&p| p == 255).count(), 1);
        assert_eq!(frame.iter().filter(|&&p| p == 128).count(), 1);
    }
}
