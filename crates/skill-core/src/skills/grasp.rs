use super::reach::params_xyz;
use super::{approach_waypoint, reach_action, Primitive, ReachChecks, SkillCore};
use crate::affordance::{aff_reward_and_success, AffordanceOutcome};
use crate::config::SkillConfig;
use crate::env::{AffordanceKey, EefPose, Environment, SkillInfo};
use crate::error::Result;
use crate::geometry::{unnormalize_position, unnormalize_yaw};
use crate::types::{ActionVector, SkillKind, SkillState};
use nalgebra::Vector3;

const GRIPPER_CLOSE: f64 = 1.0;
const GRIPPER_OPEN: f64 = -1.0;

/// Reach a grasp point with the gripper open, then close and hold.
///
/// Once REACHED is entered the state never regresses: the skill dwells for
/// `reach_dwell_steps`, moves to GRASPED, and succeeds after
/// `grasp_dwell_steps` more steps.
#[derive(Debug, Clone)]
pub struct GraspSkill {
    core: SkillCore,
    num_reach_steps: u32,
    num_grasp_steps: u32,
}

impl GraspSkill {
    pub fn new(config: SkillConfig) -> Result<Self> {
        Ok(Self {
            core: SkillCore::new(SkillKind::Grasp, config)?,
            num_reach_steps: 0,
            num_grasp_steps: 0,
        })
    }

    pub fn reach_pos(&self) -> Vector3<f64> {
        let config = self.core.config();
        unnormalize_position(&params_xyz(self.core.params()), &config.global_xyz_bounds)
    }

    pub fn target_yaw(&self) -> Option<f64> {
        let config = self.core.config();
        config
            .use_ori_params
            .then(|| unnormalize_yaw(self.core.params()[3], &config.yaw_bounds))
    }

    pub fn num_reach_steps(&self) -> u32 {
        self.num_reach_steps
    }

    pub fn num_grasp_steps(&self) -> u32 {
        self.num_grasp_steps
    }

    fn update_state(&mut self, pose: &EefPose) -> Result<()> {
        let checks = ReachChecks::evaluate(self.core.config(), pose, &self.reach_pos(), self.target_yaw());
        let dwell = self.core.config().reach_dwell_steps;

        let next = match self.core.state() {
            Some(SkillState::Grasped) => SkillState::Grasped,
            Some(SkillState::Reached) if self.num_reach_steps >= dwell => SkillState::Grasped,
            Some(SkillState::Reached) => SkillState::Reached,
            _ => checks.classify(),
        };
        match next {
            SkillState::Grasped => self.num_grasp_steps += 1,
            SkillState::Reached => self.num_reach_steps += 1,
            _ => {}
        }
        self.core.set_state(next)
    }

    fn gripper_action(&self) -> f64 {
        match self.core.state() {
            Some(SkillState::Reached | SkillState::Grasped) => GRIPPER_CLOSE,
            _ => GRIPPER_OPEN,
        }
    }
}

impl Primitive for GraspSkill {
    fn core(&self) -> &SkillCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SkillCore {
        &mut self.core
    }

    fn param_dim(&self) -> usize {
        3 + usize::from(self.core.config().use_ori_params)
    }

    fn reset(&mut self, params: &[f64]) -> Result<()> {
        let dim = self.param_dim();
        self.core.reset(params, dim)?;
        self.num_reach_steps = 0;
        self.num_grasp_steps = 0;
        Ok(())
    }

    fn step<E: Environment>(&mut self, env: &E) -> Result<ActionVector> {
        self.core.begin_step()?;
        let pose = env.eef_pose();
        self.update_state(&pose)?;
        self.core.log_step();

        let state = self.core.state().unwrap_or(SkillState::Init);
        let config = self.core.config();
        let waypoint = approach_waypoint(state, &pose.pos, &self.reach_pos(), config.lift_height);
        Ok(reach_action(
            env,
            config,
            &pose,
            state,
            &waypoint,
            self.target_yaw(),
            self.gripper_action(),
        ))
    }

    fn is_success(&self) -> bool {
        self.num_grasp_steps >= self.core.config().grasp_dwell_steps
    }

    fn aff_reward_and_success(&self, info: &SkillInfo) -> Result<AffordanceOutcome> {
        self.core.ensure_reset()?;
        let config = self.core.config();
        Ok(aff_reward_and_success(
            info.centers(AffordanceKey::Grasp),
            &self.reach_pos(),
            config.aff_threshold,
            config.aff_type,
            config.aff_tanh_scaling,
        ))
    }
}
