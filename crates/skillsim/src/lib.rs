//! Reference environment and script runner for the skill controller.

pub mod env;
pub mod script;

pub use env::{PointMassEnv, SimConfig, SimError};
pub use script::{run_script, Script, ScriptError, ScriptStep};
