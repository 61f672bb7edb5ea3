use super::reach::params_xyz;
use super::{approach_waypoint, reach_action, Primitive, ReachChecks, SkillCore};
use crate::affordance::{aff_reward_and_success, AffordanceOutcome};
use crate::config::SkillConfig;
use crate::env::{AffordanceKey, EefPose, Environment, SkillInfo};
use crate::error::Result;
use crate::geometry::{scale_delta, unnormalize_position, unnormalize_yaw};
use crate::types::{ActionVector, SkillKind, SkillState};
use nalgebra::Vector3;

/// Reach a source point, then push to `source + clip(delta) * delta_xyz_bounds`.
///
/// Params: source position (3), yaw (1) when `use_ori_params`, push delta
/// (3). There is no gripper parameter; the gripper is held neutral.
#[derive(Debug, Clone)]
pub struct PushSkill {
    core: SkillCore,
}

impl PushSkill {
    pub fn new(config: SkillConfig) -> Result<Self> {
        Ok(Self {
            core: SkillCore::new(SkillKind::Push, config)?,
        })
    }

    /// Source point the push starts from.
    pub fn reach_pos(&self) -> Vector3<f64> {
        let config = self.core.config();
        unnormalize_position(&params_xyz(self.core.params()), &config.global_xyz_bounds)
    }

    /// End point of the push.
    pub fn push_pos(&self) -> Vector3<f64> {
        let params = self.core.params();
        let delta = params_xyz(&params[params.len() - 3..]);
        self.reach_pos() + scale_delta(&delta, &self.core.config().delta_xyz_bounds)
    }

    pub fn target_yaw(&self) -> Option<f64> {
        let config = self.core.config();
        config
            .use_ori_params
            .then(|| unnormalize_yaw(self.core.params()[3], &config.yaw_bounds))
    }

    fn update_state(&mut self, pose: &EefPose) -> Result<()> {
        let config = self.core.config();
        let checks = ReachChecks::evaluate(config, pose, &self.reach_pos(), self.target_yaw());
        let at_target = (pose.pos - self.push_pos()).norm() < config.reach_threshold;

        let next = match self.core.state() {
            Some(SkillState::Pushed) => SkillState::Pushed,
            Some(SkillState::Reached) if at_target => SkillState::Pushed,
            Some(SkillState::Reached) => SkillState::Reached,
            _ => checks.classify(),
        };
        self.core.set_state(next)
    }
}

impl Primitive for PushSkill {
    fn core(&self) -> &SkillCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SkillCore {
        &mut self.core
    }

    fn param_dim(&self) -> usize {
        6 + usize::from(self.core.config().use_ori_params)
    }

    fn step<E: Environment>(&mut self, env: &E) -> Result<ActionVector> {
        self.core.begin_step()?;
        let pose = env.eef_pose();
        self.update_state(&pose)?;
        self.core.log_step();

        let state = self.core.state().unwrap_or(SkillState::Init);
        let config = self.core.config();
        let waypoint = match state {
            SkillState::Reached | SkillState::Pushed => self.push_pos(),
            _ => approach_waypoint(state, &pose.pos, &self.reach_pos(), config.lift_height),
        };
        Ok(reach_action(
            env,
            config,
            &pose,
            state,
            &waypoint,
            self.target_yaw(),
            0.0,
        ))
    }

    fn is_success(&self) -> bool {
        self.core.state() == Some(SkillState::Pushed)
    }

    fn aff_reward_and_success(&self, info: &SkillInfo) -> Result<AffordanceOutcome> {
        self.core.ensure_reset()?;
        let config = self.core.config();
        Ok(aff_reward_and_success(
            info.centers(AffordanceKey::Push),
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

    fn skill() -> PushSkill {
        PushSkill::new(SkillConfig::for_kind(SkillKind::Push)).unwrap()
    }

    #[test]
    fn param_dim_with_and_without_yaw() {
        assert_eq!(skill().param_dim(), 7);
        let mut config = SkillConfig::for_kind(SkillKind::Push);
        config.use_ori_params = false;
        assert_eq!(PushSkill::new(config).unwrap().param_dim(), 6);
    }

    #[test]
    fn push_target_clips_delta_before_scaling() {
        let mut skill = skill();
        skill.reset(&[0.0, 0.0, 0.0, 0.0, 2.0, -0.5, 0.0]).unwrap();
        let offset = skill.push_pos() - skill.reach_pos();
        assert!((offset - Vector3::new(0.15, -0.075, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn gripper_is_neutral() {
        let mut skill = skill();
        skill.reset(&[0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0]).unwrap();
        let env = FakeEnv::at(Vector3::new(0.0, 0.0, 0.82), 0.0);
        assert_eq!(skill.step(&env).unwrap().gripper, 0.0);
    }

    #[test]
    fn reaches_source_then_pushes_to_target() {
        let mut skill = skill();
        skill.reset(&[0.0, 0.0, -1.0, 0.0, 1.0, 0.0, 0.0]).unwrap();
        let source = skill.reach_pos();
        let target = skill.push_pos();
        let mut env = FakeEnv::at(source, 0.0).following();

        let action = skill.step(&env).unwrap();
        assert_eq!(skill.core().state(), Some(SkillState::Reached));
        assert!((action.pos - (target - source)).norm() < 1e-12);
        env.step(&action).unwrap();

        skill.step(&env).unwrap();
        assert_eq!(skill.core().state(), Some(SkillState::Pushed));
        assert!(skill.is_success());
        assert!(skill.is_done());
    }

    #[test]
    fn reached_is_sticky_while_pushing() {
        let mut skill = skill();
        skill.reset(&[0.0, 0.0, -1.0, 0.0, 1.0, 0.0, 0.0]).unwrap();
        let source = skill.reach_pos();
        let mut env = FakeEnv::at(source, 0.0);

        skill.step(&env).unwrap();
        // Halfway along the push, away from the source.
        env.move_to(source + Vector3::new(0.075, 0.0, 0.0));
        skill.step(&env).unwrap();
        assert_eq!(skill.core().state(), Some(SkillState::Reached));
        assert!(!skill.is_success());
    }

    #[test]
    fn pushed_requires_reaching_source_first() {
        let mut skill = skill();
        skill.reset(&[0.0, 0.0, -1.0, 0.0, 1.0, 0.0, 0.0]).unwrap();
        // Start at the push target without visiting the source.
        let env = FakeEnv::at(skill.push_pos(), 0.0);
        skill.step(&env).unwrap();
        assert_ne!(skill.core().state(), Some(SkillState::Pushed));
    }

    #[test]
    fn affordance_measures_source_against_push_centers() {
        let mut skill = skill();
        skill.reset(&[0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0]).unwrap();
        let mut info = FakeEnv::at(Vector3::zeros(), 0.0).info;
        info.push_pos = Some(vec![skill.reach_pos()]);
        assert!(skill.aff_reward_and_success(&info).unwrap().success);
        info.push_pos = Some(vec![skill.push_pos() + Vector3::new(0.0, 0.3, 0.0)]);
        assert!(!skill.aff_reward_and_success(&info).unwrap().success);
    }
}
