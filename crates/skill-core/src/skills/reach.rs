use super::{approach_waypoint, reach_action, Primitive, ReachChecks, SkillCore};
use crate::affordance::{aff_reward_and_success, AffordanceOutcome};
use crate::config::SkillConfig;
use crate::env::{AffordanceKey, EefPose, Environment, SkillInfo};
use crate::error::Result;
use crate::geometry::{unnormalize_position, unnormalize_yaw};
use crate::types::{ActionVector, SkillKind, SkillState};
use nalgebra::Vector3;

/// Move the end effector to a target pose: lift, travel, descend.
///
/// Params: position (3), then yaw (1) when `use_ori_params`, then a gripper
/// command (1) when `use_gripper_params`.
#[derive(Debug, Clone)]
pub struct ReachSkill {
    core: SkillCore,
}

impl ReachSkill {
    pub fn new(config: SkillConfig) -> Result<Self> {
        Ok(Self {
            core: SkillCore::new(SkillKind::Reach, config)?,
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

    fn update_state(&mut self, pose: &EefPose) -> Result<()> {
        let checks = ReachChecks::evaluate(self.core.config(), pose, &self.reach_pos(), self.target_yaw());
        self.core.set_state(checks.classify())
    }

    fn gripper_action(&self) -> f64 {
        if self.core.config().use_gripper_params {
            self.core.gripper_param()
        } else {
            0.0
        }
    }
}

/// First three params as a vector.
pub(super) fn params_xyz(params: &[f64]) -> Vector3<f64> {
    Vector3::new(params[0], params[1], params[2])
}

impl Primitive for ReachSkill {
    fn core(&self) -> &SkillCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SkillCore {
        &mut self.core
    }

    fn param_dim(&self) -> usize {
        let config = self.core.config();
        3 + usize::from(config.use_ori_params) + usize::from(config.use_gripper_params)
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
        self.core.state() == Some(SkillState::Reached)
    }

    fn aff_reward_and_success(&self, info: &SkillInfo) -> Result<AffordanceOutcome> {
        self.core.ensure_reset()?;
        let config = self.core.config();
        Ok(aff_reward_and_success(
            info.centers(AffordanceKey::Reach),
            &self.reach_pos(),
            config.aff_threshold,
            config.aff_type,
            config.aff_tanh_scaling,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::testing::FakeEnv;
    use crate::types::AffordanceMode;

    fn skill() -> ReachSkill {
        ReachSkill::new(SkillConfig::for_kind(SkillKind::Reach)).unwrap()
    }

    #[test]
    fn param_dim_counts_optional_slots() {
        let mut config = SkillConfig::for_kind(SkillKind::Reach);
        assert_eq!(ReachSkill::new(config.clone()).unwrap().param_dim(), 4);
        config.use_gripper_params = true;
        assert_eq!(ReachSkill::new(config.clone()).unwrap().param_dim(), 5);
        config.use_ori_params = false;
        assert_eq!(ReachSkill::new(config).unwrap().param_dim(), 4);
    }

    #[test]
    fn first_action_lifts_vertically() {
        let mut skill = skill();
        // Target at the far corner of the box, end effector low at the origin.
        skill.reset(&[1.0, 1.0, -1.0, 0.0]).unwrap();
        let env = FakeEnv::at(Vector3::new(0.0, 0.0, 0.82), 0.0);

        let action = skill.step(&env).unwrap();
        assert_eq!(skill.core().state(), Some(SkillState::Init));
        assert_eq!(action.pos.x, 0.0);
        assert_eq!(action.pos.y, 0.0);
        assert!(action.pos.z > 0.0);
        assert_eq!(action.ori, Some(Vector3::zeros()));
        assert_eq!(action.gripper, 0.0);
    }

    #[test]
    fn lifted_state_travels_at_lift_height() {
        let mut skill = skill();
        skill.reset(&[1.0, 1.0, -1.0, 0.0]).unwrap();
        let env = FakeEnv::at(Vector3::new(0.0, 0.0, 0.95), 0.0);

        let action = skill.step(&env).unwrap();
        assert_eq!(skill.core().state(), Some(SkillState::Lifted));
        assert!((action.pos - Vector3::new(0.15, 0.30, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn reaches_target_and_stays_successful() {
        let mut skill = skill();
        skill.reset(&[0.0, 0.0, 0.0, 0.4]).unwrap();
        let mut env = FakeEnv::at(Vector3::new(0.1, -0.2, 0.82), 0.0).following();

        let mut seen = Vec::new();
        while !skill.is_done() {
            let action = skill.step(&env).unwrap();
            seen.push(skill.core().state());
            env.step(&action).unwrap();
        }

        assert!(skill.is_success());
        assert_eq!(seen.first(), Some(&Some(SkillState::Init)));
        assert_eq!(seen.last(), Some(&Some(SkillState::Reached)));
        assert!(skill.core().num_ac_calls() <= skill.core().max_ac_calls());

        let goal = skill.reach_pos();
        assert!((goal - Vector3::new(-0.075, 0.0, 0.85)).norm() < 1e-9);
        assert!((env.pose.pos - goal).norm() < 1e-9);
    }

    #[test]
    fn yaw_mismatch_blocks_hovering() {
        let mut skill = skill();
        skill.reset(&[0.0, 0.0, 0.0, 1.0]).unwrap();
        let goal = skill.reach_pos();
        // Right above the target at lift height but rotated away.
        let env = FakeEnv::at(Vector3::new(goal.x, goal.y, 0.95), -1.0);

        let action = skill.step(&env).unwrap();
        assert_eq!(skill.core().state(), Some(SkillState::Lifted));
        let ori = action.ori.unwrap();
        assert!(ori.z > 0.0);
    }

    #[test]
    fn orientation_is_ignored_without_ori_params() {
        let mut config = SkillConfig::for_kind(SkillKind::Reach);
        config.use_ori_params = false;
        let mut skill = ReachSkill::new(config).unwrap();
        skill.reset(&[0.0, 0.0, 0.0]).unwrap();
        let goal = skill.reach_pos();
        let env = FakeEnv::at(goal, 2.5);

        let action = skill.step(&env).unwrap();
        assert!(skill.is_success());
        assert!(action.ori.is_none());
        assert_eq!(action.dim(), 4);
    }

    #[test]
    fn gripper_param_is_snapped() {
        let mut config = SkillConfig::for_kind(SkillKind::Reach);
        config.use_gripper_params = true;
        let mut skill = ReachSkill::new(config).unwrap();
        let env = FakeEnv::at(Vector3::new(0.0, 0.0, 0.9), 0.0);

        skill.reset(&[0.0, 0.0, 0.0, 0.0, 0.4]).unwrap();
        assert_eq!(skill.step(&env).unwrap().gripper, 1.0);
        skill.reset(&[0.0, 0.0, 0.0, 0.0, 0.05]).unwrap();
        assert_eq!(skill.step(&env).unwrap().gripper, 0.0);
    }

    #[test]
    fn affordance_uses_reach_centers() {
        let mut skill = skill();
        skill.reset(&[0.0, 0.0, 0.0, 0.0]).unwrap();
        let goal = skill.reach_pos();

        let mut info = FakeEnv::at(goal, 0.0).info;
        info.reach_pos = Some(vec![goal + Vector3::new(0.01, 0.0, 0.0)]);
        let out = skill.aff_reward_and_success(&info).unwrap();
        assert!(out.success);

        info.reach_pos = Some(vec![goal + Vector3::new(0.5, 0.0, 0.0)]);
        let out = skill.aff_reward_and_success(&info).unwrap();
        assert!(!out.success);
        assert!(out.reward < 1.0);
        assert_eq!(skill.core().config().aff_type, AffordanceMode::Dense);
    }
}
