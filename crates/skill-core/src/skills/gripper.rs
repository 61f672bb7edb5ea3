use super::{Primitive, SkillCore};
use crate::affordance::{aff_reward_and_success, AffordanceOutcome};
use crate::config::SkillConfig;
use crate::env::{AffordanceKey, Environment, SkillInfo};
use crate::error::{Result, SkillError};
use crate::types::{ActionVector, SkillKind};
use nalgebra::Vector3;

/// Fixed gripper command issued by a gripper skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GripperCommand {
    Open,
    Close,
}

impl GripperCommand {
    /// Parse a skill-type token.
    pub fn from_token(token: &str) -> Result<Self> {
        match token {
            "open" => Ok(Self::Open),
            "close" => Ok(Self::Close),
            _ => Err(SkillError::UnsupportedGripperKind(token.to_string())),
        }
    }

    pub fn value(&self) -> f64 {
        match self {
            Self::Open => -1.0,
            Self::Close => 1.0,
        }
    }

    fn kind(&self) -> SkillKind {
        match self {
            Self::Open => SkillKind::Open,
            Self::Close => SkillKind::Close,
        }
    }
}

/// Hold position and open or close the gripper for `max_ac_calls` steps.
///
/// Grasp affordance centers are only consulted for the diagnostic reward,
/// measured at the current end-effector position.
#[derive(Debug, Clone)]
pub struct GripperSkill {
    core: SkillCore,
    command: GripperCommand,
}

impl GripperSkill {
    pub fn new(token: &str, config: SkillConfig) -> Result<Self> {
        let command = GripperCommand::from_token(token)?;
        Ok(Self {
            core: SkillCore::new(command.kind(), config)?,
            command,
        })
    }

    pub fn command(&self) -> GripperCommand {
        self.command
    }
}

impl Primitive for GripperSkill {
    fn core(&self) -> &SkillCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SkillCore {
        &mut self.core
    }

    fn param_dim(&self) -> usize {
        0
    }

    fn step<E: Environment>(&mut self, _env: &E) -> Result<ActionVector> {
        self.core.begin_step()?;
        self.core.log_step();

        let ori = self.core.config().use_ori_params.then(Vector3::zeros);
        Ok(ActionVector::new(Vector3::zeros(), ori, self.command.value()))
    }

    fn is_success(&self) -> bool {
        self.core.num_ac_calls() == self.core.max_ac_calls()
    }

    fn aff_reward_and_success(&self, info: &SkillInfo) -> Result<AffordanceOutcome> {
        let config = self.core.config();
        Ok(aff_reward_and_success(
            info.centers(AffordanceKey::Grasp),
            &info.cur_ee_pos,
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

    #[test]
    fn rejects_unknown_token() {
        let err = GripperSkill::new("squeeze", SkillConfig::for_kind(SkillKind::Close)).unwrap_err();
        assert!(matches!(err, SkillError::UnsupportedGripperKind(t) if t == "squeeze"));
    }

    #[test]
    fn close_dwells_for_max_calls() {
        let mut skill = GripperSkill::new("close", SkillConfig::for_kind(SkillKind::Close)).unwrap();
        assert_eq!(skill.core().kind(), SkillKind::Close);
        assert_eq!(skill.command(), GripperCommand::Close);
        skill.reset(&[]).unwrap();
        let env = FakeEnv::at(Vector3::new(0.0, 0.0, 0.9), 0.0);

        let mut calls = 0;
        while !skill.is_done() {
            let action = skill.step(&env).unwrap();
            assert_eq!(action.to_vec(), vec![0.0, 0.0, 0.0, 1.0]);
            calls += 1;
        }
        assert_eq!(calls, 4);
        assert!(skill.is_success());
    }

    #[test]
    fn open_with_orientation_pads_zeros() {
        let mut config = SkillConfig::for_kind(SkillKind::Open);
        config.use_ori_params = true;
        let mut skill = GripperSkill::new("open", config).unwrap();
        skill.reset(&[]).unwrap();
        let env = FakeEnv::at(Vector3::zeros(), 0.0);
        let action = skill.step(&env).unwrap();
        assert_eq!(action.to_vec(), vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, -1.0]);
    }

    #[test]
    fn rejects_params() {
        let mut skill = GripperSkill::new("open", SkillConfig::for_kind(SkillKind::Open)).unwrap();
        assert!(matches!(
            skill.reset(&[0.5]),
            Err(SkillError::ParamDim {
                expected: 0,
                got: 1,
                ..
            })
        ));
    }

    #[test]
    fn affordance_reads_grasp_centers_at_current_position() {
        let skill = GripperSkill::new("close", SkillConfig::for_kind(SkillKind::Close)).unwrap();
        let mut info = FakeEnv::at(Vector3::new(0.0, 0.0, 0.85), 0.0).info;
        assert_eq!(
            skill.aff_reward_and_success(&info).unwrap(),
            AffordanceOutcome::SATISFIED
        );
        info.grasp_pos = Some(vec![Vector3::new(0.02, 0.0, 0.84)]);
        assert!(skill.aff_reward_and_success(&info).unwrap().success);
        info.grasp_pos = Some(vec![Vector3::new(0.4, 0.0, 0.84)]);
        assert!(!skill.aff_reward_and_success(&info).unwrap().success);
    }
}
