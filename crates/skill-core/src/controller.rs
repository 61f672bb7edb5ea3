//! Skill controller: dispatch a named skill and drive it to completion.

use crate::affordance::AffordanceOutcome;
use crate::config::ControllerConfig;
use crate::env::{Environment, Observation};
use crate::error::{Result, SkillError};
use crate::skills::{Primitive, Skill};
use crate::types::SkillKind;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Tolerance for the skill-info and observation end-effector positions.
const POSE_CONSISTENCY_TOLERANCE: f64 = 1e-4;

/// Aggregated outcome of one skill execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    /// Observation from the last environment step.
    pub observation: Observation,
    /// Sum of the rewards of every low-level step.
    pub reward: f64,
    /// `done` flag of the last environment step.
    pub done: bool,
    /// Last step's info, annotated with the execution summary.
    pub info: Map<String, Value>,
    pub num_ac_calls: u32,
    pub skill_success: bool,
    pub aff_reward: f64,
    pub aff_success: bool,
    /// One frame per step when image capture was requested; empty when the
    /// environment rendered nothing for that step.
    pub image_obs: Vec<Vec<u8>>,
}

/// Owns one skill instance per kind and reuses it across executions.
#[derive(Debug, Clone)]
pub struct SkillController {
    skills: BTreeMap<SkillKind, Skill>,
    image_obs_in_info: bool,
}

impl SkillController {
    /// Build every skill from a validated controller config.
    pub fn new(config: ControllerConfig) -> Result<Self> {
        config.validate()?;
        let mut skills = BTreeMap::new();
        for kind in SkillKind::ALL {
            skills.insert(kind, Skill::new(kind, config.skills.get(kind).clone())?);
        }
        Ok(Self {
            skills,
            image_obs_in_info: config.image_obs_in_info,
        })
    }

    /// Image capture default taken from the config.
    pub fn image_obs_in_info(&self) -> bool {
        self.image_obs_in_info
    }

    pub fn skill(&self, name: &str) -> Result<&Skill> {
        let kind = parse_name(name)?;
        self.skills
            .get(&kind)
            .ok_or_else(|| SkillError::UnknownSkill(name.to_string()))
    }

    /// Parameter vector length for the named skill.
    pub fn param_dim(&self, name: &str) -> Result<usize> {
        Ok(self.skill(name)?.param_dim())
    }

    /// Reset the named skill with `params` and step `env` until it is done.
    ///
    /// Every call issues at least one and at most `max_ac_calls` actions.
    /// Contract violations and environment failures abort the execution.
    pub fn execute<E: Environment>(
        &mut self,
        env: &mut E,
        name: &str,
        params: &[f64],
        image_obs_in_info: bool,
    ) -> Result<ExecutionResult> {
        let kind = parse_name(name)?;
        let skill = self
            .skills
            .get_mut(&kind)
            .ok_or_else(|| SkillError::UnknownSkill(name.to_string()))?;
        skill.reset(params)?;

        let mut reward = 0.0;
        let mut image_obs = Vec::new();
        let last = loop {
            let action = skill.step(&*env)?;
            let transition = env.step(&action).map_err(SkillError::env)?;
            reward += transition.reward;
            if image_obs_in_info {
                // Keep one frame per step so indices line up with actions.
                match &transition.observation.image {
                    Some(image) => image_obs.push(image.clone()),
                    None => {
                        warn!(skill = %kind, step = image_obs.len(), "no image in observation");
                        image_obs.push(Vec::new());
                    }
                }
            }
            if skill.is_done() {
                break transition;
            }
        };

        let skill_info = env.skill_info();
        let drift = (skill_info.cur_ee_pos - last.observation.eef.pos).norm();
        if drift > POSE_CONSISTENCY_TOLERANCE {
            warn!(skill = %kind, drift, "skill info and observation disagree on end-effector position");
        }

        let AffordanceOutcome {
            reward: aff_reward,
            success: aff_success,
        } = skill.aff_reward_and_success(&skill_info)?;
        let num_ac_calls = skill.num_ac_calls();
        let skill_success = skill.is_success();

        let mut info = last.info;
        info.insert("num_ac_calls".to_string(), json!(num_ac_calls));
        info.insert("skill_success".to_string(), json!(skill_success));
        info.insert("aff_reward".to_string(), json!(aff_reward));
        info.insert("aff_success".to_string(), json!(aff_success));
        if image_obs_in_info {
            info.insert("image_obs".to_string(), json!(image_obs));
        }

        info!(
            skill = %kind,
            calls = num_ac_calls,
            success = skill_success,
            reward,
            "skill finished"
        );

        Ok(ExecutionResult {
            observation: last.observation,
            reward,
            done: last.done,
            info,
            num_ac_calls,
            skill_success,
            aff_reward,
            aff_success,
            image_obs,
        })
    }
}

fn parse_name(name: &str) -> Result<SkillKind> {
    SkillKind::from_name(name).ok_or_else(|| SkillError::UnknownSkill(name.to_string()))
}
