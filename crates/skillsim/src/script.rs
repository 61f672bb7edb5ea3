//! Scripted skill sequences.
//!
//! A script is JSON: either a bare list of steps or an object with an
//! optional `sim` section and a `steps` list.
//!
//! ```json
//! { "sim": { "render": true },
//!   "steps": [ { "skill": "grasp", "params": [0.55, 0.33, -0.6, 0.0] } ] }
//! ```

use crate::env::{PointMassEnv, SimConfig};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use skill_core::env::Environment;
use skill_core::report::{ReportRow, ReportWriter};
use skill_core::{ExecutionResult, SkillController, SkillError};
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read script: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid script: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("step {index} ({skill}) failed: {source}")]
    Step {
        index: usize,
        skill: String,
        #[source]
        source: SkillError,
    },
    #[error("environment reset failed: {0}")]
    Reset(#[source] crate::env::SimError),
}

pub type Result<T> = std::result::Result<T, ScriptError>;

/// One skill invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptStep {
    pub skill: String,
    #[serde(default)]
    pub params: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub sim: SimConfig,
    pub steps: Vec<ScriptStep>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScriptFile {
    Steps(Vec<ScriptStep>),
    Full(Script),
}

impl Script {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(match serde_json::from_str(content)? {
            ScriptFile::Steps(steps) => Self {
                sim: SimConfig::default(),
                steps,
            },
            ScriptFile::Full(script) => script,
        })
    }

    /// Build the environment this script runs against.
    pub fn environment(&self) -> PointMassEnv {
        PointMassEnv::new(self.sim.clone())
    }
}

/// Run every step of `script` in order against a freshly reset `env`.
///
/// Each execution is appended to `report` when given. The first failing
/// step is reported and aborts the run.
pub fn run_script(
    controller: &mut SkillController,
    env: &mut PointMassEnv,
    script: &Script,
    mut report: Option<&mut ReportWriter>,
    image_obs_in_info: bool,
) -> Result<Vec<ExecutionResult>> {
    env.reset().map_err(ScriptError::Reset)?;

    let mut results = Vec::with_capacity(script.steps.len());
    for (index, step) in script.steps.iter().enumerate() {
        let outcome = controller.execute(env, &step.skill, &step.params, image_obs_in_info);
        let row = ReportRow::new(Utc::now().timestamp_millis(), step.skill.as_str());

        match outcome {
            Ok(result) => {
                info!(
                    index,
                    skill = %step.skill,
                    aff_success = result.aff_success,
                    cube = ?env.cube().as_slice(),
                    "script step done"
                );
                if let Some(writer) = report.as_deref_mut() {
                    writer.write_row(&row.with_result(&result))?;
                }
                results.push(result);
            }
            Err(source) => {
                error!(index, skill = %step.skill, error = %source, "script step failed");
                if let Some(writer) = report.as_deref_mut() {
                    writer.write_row(&row.with_message(source.to_string()))?;
                    writer.flush()?;
                }
                return Err(ScriptError::Step {
                    index,
                    skill: step.skill.clone(),
                    source,
                });
            }
        }
    }

    if let Some(writer) = report {
        writer.flush()?;
    }
    Ok(results)
}
