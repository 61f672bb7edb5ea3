//! Error taxonomy for skill execution.
//!
//! Contract violations and unimplemented capabilities abort the invocation.
//! An absent or disabled affordance check is not an error.

use crate::config::ConfigError;
use crate::types::{SkillKind, SkillState};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SkillError {
    #[error("{skill} expects {expected} params, got {got}")]
    ParamDim {
        skill: SkillKind,
        expected: usize,
        got: usize,
    },
    #[error("state {state} is not a {skill} state")]
    InvalidState { skill: SkillKind, state: SkillState },
    #[error("unsupported gripper skill type: {0}")]
    UnsupportedGripperKind(String),
    #[error("unknown skill: {0}")]
    UnknownSkill(String),
    #[error("{skill} does not implement {operation}")]
    Unimplemented {
        skill: SkillKind,
        operation: &'static str,
    },
    #[error("skill stepped before reset")]
    NotReset,
    #[error("{skill} already issued its {max_ac_calls} actions")]
    Exhausted { skill: SkillKind, max_ac_calls: u32 },
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("environment error: {0}")]
    Env(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl SkillError {
    pub(crate) fn env<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        Self::Env(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, SkillError>;
