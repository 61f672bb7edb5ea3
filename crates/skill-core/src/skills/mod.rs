//! Skill state machines.
//!
//! Each skill turns a short normalized parameter vector into one low-level
//! action per call to [`Primitive::step`] until it reports done. The set of
//! families is closed and dispatched through the [`Skill`] enum:
//!
//! - [`AtomicSkill`]: single-step pass-through of a direct pose target.
//! - [`ReachSkill`]: lift, travel at lift height, descend onto a target.
//! - [`GraspSkill`]: reach, then close the gripper and dwell.
//! - [`PushSkill`]: reach a source point, then drive to a displaced target.
//! - [`GripperSkill`]: open or close in place for a fixed dwell.

mod atomic;
mod grasp;
mod gripper;
mod push;
mod reach;

pub use atomic::AtomicSkill;
pub use grasp::GraspSkill;
pub use gripper::{GripperCommand, GripperSkill};
pub use push::PushSkill;
pub use reach::ReachSkill;

use crate::affordance::AffordanceOutcome;
use crate::config::SkillConfig;
use crate::env::{EefPose, Environment, SkillInfo};
use crate::error::{Result, SkillError};
use crate::geometry::{binary_gripper, orientation_delta, yaw_difference, yaw_of};
use crate::types::{ActionVector, SkillKind, SkillState};
use nalgebra::Vector3;
use tracing::debug;

/// Behavior shared by every skill family.
pub trait Primitive {
    fn core(&self) -> &SkillCore;

    fn core_mut(&mut self) -> &mut SkillCore;

    /// Required parameter vector length.
    fn param_dim(&self) -> usize;

    /// Start a new invocation with fresh parameters.
    fn reset(&mut self, params: &[f64]) -> Result<()> {
        let dim = self.param_dim();
        self.core_mut().reset(params, dim)
    }

    /// Advance the state machine from the current pose and return one action.
    fn step<E: Environment>(&mut self, env: &E) -> Result<ActionVector>;

    fn is_success(&self) -> bool;

    /// Done on success or once the call cap is reached.
    fn is_done(&self) -> bool {
        self.is_success() || self.core().is_capped()
    }

    /// Affordance reward and success for the current parameters.
    fn aff_reward_and_success(&self, info: &SkillInfo) -> Result<AffordanceOutcome>;
}

/// Parameters, counter and discrete state common to all skills.
#[derive(Debug, Clone)]
pub struct SkillCore {
    kind: SkillKind,
    config: SkillConfig,
    params: Vec<f64>,
    num_ac_calls: u32,
    state: Option<SkillState>,
    armed: bool,
}

impl SkillCore {
    /// Build a core after validating `config` for `kind`.
    pub fn new(kind: SkillKind, config: SkillConfig) -> Result<Self> {
        config.validate(kind)?;
        Ok(Self {
            kind,
            config,
            params: Vec::new(),
            num_ac_calls: 0,
            state: None,
            armed: false,
        })
    }

    pub fn kind(&self) -> SkillKind {
        self.kind
    }

    pub fn config(&self) -> &SkillConfig {
        &self.config
    }

    pub fn params(&self) -> &[f64] {
        &self.params
    }

    pub fn num_ac_calls(&self) -> u32 {
        self.num_ac_calls
    }

    pub fn max_ac_calls(&self) -> u32 {
        self.config.max_ac_calls
    }

    pub fn state(&self) -> Option<SkillState> {
        self.state
    }

    pub fn is_capped(&self) -> bool {
        self.num_ac_calls >= self.config.max_ac_calls
    }

    fn reset(&mut self, params: &[f64], param_dim: usize) -> Result<()> {
        if params.len() != param_dim {
            return Err(SkillError::ParamDim {
                skill: self.kind,
                expected: param_dim,
                got: params.len(),
            });
        }
        self.params = params.to_vec();
        self.num_ac_calls = 0;
        self.state = None;
        self.armed = true;
        debug!(skill = %self.kind, params = ?self.params, "skill reset");
        Ok(())
    }

    fn ensure_reset(&self) -> Result<()> {
        if self.armed {
            Ok(())
        } else {
            Err(SkillError::NotReset)
        }
    }

    /// Count one low-level action.
    fn begin_step(&mut self) -> Result<()> {
        self.ensure_reset()?;
        if self.is_capped() {
            return Err(SkillError::Exhausted {
                skill: self.kind,
                max_ac_calls: self.config.max_ac_calls,
            });
        }
        self.num_ac_calls += 1;
        Ok(())
    }

    fn set_state(&mut self, state: SkillState) -> Result<()> {
        if !self.kind.states().contains(&state) {
            return Err(SkillError::InvalidState {
                skill: self.kind,
                state,
            });
        }
        self.state = Some(state);
        Ok(())
    }

    fn log_step(&self) {
        debug!(
            skill = %self.kind,
            call = self.num_ac_calls,
            state = self.state.map_or("-", |s| s.as_str()),
            "skill step"
        );
    }

    /// Gripper command taken from the last parameter, snapped when binary.
    fn gripper_param(&self) -> f64 {
        let value = self.params.last().copied().unwrap_or(0.0);
        if self.config.binary_gripper {
            binary_gripper(value)
        } else {
            value
        }
    }

    fn unimplemented(&self, operation: &'static str) -> SkillError {
        SkillError::Unimplemented {
            skill: self.kind,
            operation,
        }
    }
}

/// Geometric predicates evaluated each step by reach-style skills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ReachChecks {
    lifted: bool,
    xy: bool,
    xyz: bool,
    yaw: bool,
}

impl ReachChecks {
    fn evaluate(
        config: &SkillConfig,
        pose: &EefPose,
        goal: &Vector3<f64>,
        target_yaw: Option<f64>,
    ) -> Self {
        let th = config.reach_threshold;
        let cur = &pose.pos;
        Self {
            lifted: cur.z >= config.lift_height - th,
            xy: (cur.xy() - goal.xy()).norm() < th,
            xyz: (cur - goal).norm() < th,
            yaw: target_yaw
                .is_none_or(|yaw| yaw_difference(yaw_of(&pose.quat), yaw) <= config.yaw_threshold),
        }
    }

    /// Memoryless reach classification.
    fn classify(&self) -> SkillState {
        if self.xyz && self.yaw {
            SkillState::Reached
        } else if self.xy && self.yaw {
            SkillState::Hovering
        } else if self.lifted {
            SkillState::Lifted
        } else {
            SkillState::Init
        }
    }
}

/// Position waypoint for the approach states.
///
/// INIT lifts straight up, LIFTED travels at lift height, and every later
/// state heads for `goal`.
fn approach_waypoint(
    state: SkillState,
    cur: &Vector3<f64>,
    goal: &Vector3<f64>,
    lift_height: f64,
) -> Vector3<f64> {
    match state {
        SkillState::Init => Vector3::new(cur.x, cur.y, lift_height),
        SkillState::Lifted => Vector3::new(goal.x, goal.y, lift_height),
        _ => *goal,
    }
}

/// Assemble a reach-style delta action and descale it for the environment.
fn reach_action<E: Environment>(
    env: &E,
    config: &SkillConfig,
    pose: &EefPose,
    state: SkillState,
    waypoint: &Vector3<f64>,
    target_yaw: Option<f64>,
    gripper: f64,
) -> ActionVector {
    let pos = waypoint - pose.pos;
    let ori = config.use_ori_params.then(|| {
        // No orientation target until the arm has lifted.
        let yaw = if state == SkillState::Init {
            None
        } else {
            target_yaw
        };
        orientation_delta(&pose.quat, yaw)
    });
    env.unscale_action(ActionVector::new(pos, ori, gripper))
}

/// A skill of any family.
#[derive(Debug, Clone)]
pub enum Skill {
    Atomic(AtomicSkill),
    Reach(ReachSkill),
    Grasp(GraspSkill),
    Push(PushSkill),
    Gripper(GripperSkill),
}

impl Skill {
    /// Build the skill for `kind` from a validated config.
    pub fn new(kind: SkillKind, config: SkillConfig) -> Result<Self> {
        Ok(match kind {
            SkillKind::Atomic => Self::Atomic(AtomicSkill::new(config)?),
            SkillKind::Reach => Self::Reach(ReachSkill::new(config)?),
            SkillKind::Grasp => Self::Grasp(GraspSkill::new(config)?),
            SkillKind::Push => Self::Push(PushSkill::new(config)?),
            SkillKind::Open | SkillKind::Close => {
                Self::Gripper(GripperSkill::new(kind.as_str(), config)?)
            }
        })
    }

    pub fn kind(&self) -> SkillKind {
        self.core().kind()
    }

    pub fn state(&self) -> Option<SkillState> {
        self.core().state()
    }

    pub fn num_ac_calls(&self) -> u32 {
        self.core().num_ac_calls()
    }

    pub fn max_ac_calls(&self) -> u32 {
        self.core().max_ac_calls()
    }

    /// Absolute reach target for the current parameters.
    pub fn reach_pos(&self) -> Result<Vector3<f64>> {
        self.core().ensure_reset()?;
        match self {
            Self::Reach(s) => Ok(s.reach_pos()),
            Self::Grasp(s) => Ok(s.reach_pos()),
            Self::Push(s) => Ok(s.reach_pos()),
            Self::Atomic(s) => Err(s.core().unimplemented("reach_pos")),
            Self::Gripper(s) => Err(s.core().unimplemented("reach_pos")),
        }
    }

    /// Commanded yaw for the current parameters.
    pub fn target_yaw(&self) -> Result<f64> {
        self.core().ensure_reset()?;
        let yaw = match self {
            Self::Atomic(s) => s.target_yaw(),
            Self::Reach(s) => s.target_yaw(),
            Self::Grasp(s) => s.target_yaw(),
            Self::Push(s) => s.target_yaw(),
            Self::Gripper(_) => None,
        };
        yaw.ok_or_else(|| self.core().unimplemented("target_yaw"))
    }
}

impl Primitive for Skill {
    fn core(&self) -> &SkillCore {
        match self {
            Self::Atomic(s) => s.core(),
            Self::Reach(s) => s.core(),
            Self::Grasp(s) => s.core(),
            Self::Push(s) => s.core(),
            Self::Gripper(s) => s.core(),
        }
    }

    fn core_mut(&mut self) -> &mut SkillCore {
        match self {
            Self::Atomic(s) => s.core_mut(),
            Self::Reach(s) => s.core_mut(),
            Self::Grasp(s) => s.core_mut(),
            Self::Push(s) => s.core_mut(),
            Self::Gripper(s) => s.core_mut(),
        }
    }

    fn param_dim(&self) -> usize {
        match self {
            Self::Atomic(s) => s.param_dim(),
            Self::Reach(s) => s.param_dim(),
            Self::Grasp(s) => s.param_dim(),
            Self::Push(s) => s.param_dim(),
            Self::Gripper(s) => s.param_dim(),
        }
    }

    fn reset(&mut self, params: &[f64]) -> Result<()> {
        match self {
            Self::Atomic(s) => s.reset(params),
            Self::Reach(s) => s.reset(params),
            Self::Grasp(s) => s.reset(params),
            Self::Push(s) => s.reset(params),
            Self::Gripper(s) => s.reset(params),
        }
    }

    fn step<E: Environment>(&mut self, env: &E) -> Result<ActionVector> {
        match self {
            Self::Atomic(s) => s.step(env),
            Self::Reach(s) => s.step(env),
            Self::Grasp(s) => s.step(env),
            Self::Push(s) => s.step(env),
            Self::Gripper(s) => s.step(env),
        }
    }

    fn is_success(&self) -> bool {
        match self {
            Self::Atomic(s) => s.is_success(),
            Self::Reach(s) => s.is_success(),
            Self::Grasp(s) => s.is_success(),
            Self::Push(s) => s.is_success(),
            Self::Gripper(s) => s.is_success(),
        }
    }

    fn aff_reward_and_success(&self, info: &SkillInfo) -> Result<AffordanceOutcome> {
        self.core().ensure_reset()?;
        match self {
            Self::Atomic(s) => s.aff_reward_and_success(info),
            Self::Reach(s) => s.aff_reward_and_success(info),
            Self::Grasp(s) => s.aff_reward_and_success(info),
            Self::Push(s) => s.aff_reward_and_success(info),
            Self::Gripper(s) => s.aff_reward_and_success(info),
        }
    }
}
