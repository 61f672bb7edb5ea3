//! Collaborator contract the skills drive.
//!
//! The environment owns all simulation state. Skills only read the
//! end-effector pose and skill info, and the controller issues actions
//! through [`Environment::step`]. A single environment must not be driven by
//! more than one skill invocation at a time; `&mut` access enforces this.

use crate::types::ActionVector;
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// End-effector position and orientation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EefPose {
    pub pos: Vector3<f64>,
    pub quat: UnitQuaternion<f64>,
}

/// Observation returned by `reset` and `step`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub eef: EefPose,
    /// Flat task state (object poses, joint readings, ...).
    #[serde(default)]
    pub state: Vec<f64>,
    /// Rendered camera frame, when the environment renders one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Vec<u8>>,
}

/// Result of one low-level environment step.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub observation: Observation,
    pub reward: f64,
    pub done: bool,
    pub info: serde_json::Map<String, serde_json::Value>,
}

/// Affordance center sets an environment may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffordanceKey {
    Reach,
    Grasp,
    Push,
}

impl AffordanceKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reach => "reach_pos",
            Self::Grasp => "grasp_pos",
            Self::Push => "push_pos",
        }
    }
}

/// Task-level information the skills consult.
///
/// A `None` center set means the task does not define that affordance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillInfo {
    pub cur_ee_pos: Vector3<f64>,
    #[serde(default)]
    pub reach_pos: Option<Vec<Vector3<f64>>>,
    #[serde(default)]
    pub grasp_pos: Option<Vec<Vector3<f64>>>,
    #[serde(default)]
    pub push_pos: Option<Vec<Vector3<f64>>>,
}

impl SkillInfo {
    pub fn centers(&self, key: AffordanceKey) -> Option<&[Vector3<f64>]> {
        match key {
            AffordanceKey::Reach => self.reach_pos.as_deref(),
            AffordanceKey::Grasp => self.grasp_pos.as_deref(),
            AffordanceKey::Push => self.push_pos.as_deref(),
        }
    }
}

/// The environment a skill controller drives.
pub trait Environment {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reset the episode and return the initial observation.
    fn reset(&mut self) -> Result<Observation, Self::Error>;

    /// Apply one low-level action. Blocks until the simulation has advanced.
    fn step(&mut self, action: &ActionVector) -> Result<Transition, Self::Error>;

    /// Current end-effector pose, consistent with the latest observation.
    fn eef_pose(&self) -> EefPose;

    /// Current skill info, including affordance centers.
    fn skill_info(&self) -> SkillInfo;

    /// Map a raw skill action (position delta, axis-angle delta, gripper)
    /// into the environment's native action range.
    fn unscale_action(&self, action: ActionVector) -> ActionVector {
        action
    }
}
