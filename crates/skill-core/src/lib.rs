//! Parameterized manipulation skills and the controller that runs them.
//!
//! A skill turns a short normalized parameter vector into a bounded sequence
//! of low-level end-effector actions against an [`Environment`].

pub mod affordance;
pub mod config;
pub mod controller;
pub mod env;
pub mod error;
pub mod geometry;
pub mod report;
pub mod skills;
pub mod types;

pub use config::{ConfigError, ControllerConfig, SkillConfig};
pub use controller::{ExecutionResult, SkillController};
pub use env::{EefPose, Environment, Observation, SkillInfo, Transition};
pub use error::SkillError;
pub use report::{ReportRow, ReportWriter};
pub use skills::{Primitive, Skill};
pub use types::*;
