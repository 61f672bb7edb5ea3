use super::reach::params_xyz;
use super::{Primitive, SkillCore};
use crate::affordance::AffordanceOutcome;
use crate::config::SkillConfig;
use crate::env::{Environment, SkillInfo};
use crate::error::Result;
use crate::types::{ActionVector, SkillKind};
use nalgebra::Vector3;

/// Single-step pass-through of a direct pose command.
///
/// Params: position (3), yaw (1) when `use_ori_params`, gripper (1). Values
/// are forwarded without unnormalization or descaling.
#[derive(Debug, Clone)]
pub struct AtomicSkill {
    core: SkillCore,
}

impl AtomicSkill {
    pub fn new(config: SkillConfig) -> Result<Self> {
        Ok(Self {
            core: SkillCore::new(SkillKind::Atomic, config)?,
        })
    }

    pub fn target_yaw(&self) -> Option<f64> {
        self.core
            .config()
            .use_ori_params
            .then(|| self.core.params()[3])
    }
}

impl Primitive for AtomicSkill {
    fn core(&self) -> &SkillCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SkillCore {
        &mut self.core
    }

    fn param_dim(&self) -> usize {
        4 + usize::from(self.core.config().use_ori_params)
    }

    fn step<E: Environment>(&mut self, _env: &E) -> Result<ActionVector> {
        self.core.begin_step()?;
        self.core.log_step();

        let pos = params_xyz(self.core.params());
        let ori = self.target_yaw().map(|yaw| Vector3::new(0.0, 0.0, yaw));
        Ok(ActionVector::new(pos, ori, self.core.gripper_param()))
    }

    fn is_success(&self) -> bool {
        true
    }

    fn aff_reward_and_success(&self, _info: &SkillInfo) -> Result<AffordanceOutcome> {
        Ok(AffordanceOutcome::SATISFIED)
    }
}
