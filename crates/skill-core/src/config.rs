//! Configuration for skills and the skill controller.
//!
//! One canonical schema serves every skill family. Files use the `key=value`
//! line format: `#` starts a comment, values may be quoted, and list values
//! are whitespace-separated numbers. A key may be scoped to one skill kind by
//! prefixing it with the skill name (`grasp.max_ac_calls=25`); unscoped keys
//! apply to every kind.

use crate::types::{AffordanceMode, SkillKind};
use nalgebra::Vector3;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::f64::consts::FRAC_PI_2;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("invalid config line: {0}")]
    InvalidLine(String),
    #[error("invalid boolean value for {key}: {value}")]
    InvalidBool { key: String, value: String },
    #[error("invalid integer value for {key}: {value}")]
    InvalidInt { key: String, value: String },
    #[error("invalid number value for {key}: {value}")]
    InvalidFloat { key: String, value: String },
    #[error("{key} expects {expected} values, got {got}")]
    InvalidShape {
        key: String,
        expected: usize,
        got: usize,
    },
    #[error("unknown config key: {0}")]
    UnknownKey(String),
    #[error("invalid {field}: {reason}")]
    Invalid { field: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Atomic skills always issue exactly one low-level action.
pub const ATOMIC_MAX_AC_CALLS: u32 = 1;

/// Axis-aligned box for absolute end-effector targets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionBounds {
    pub low: Vector3<f64>,
    pub high: Vector3<f64>,
}

impl PositionBounds {
    pub fn new(low: [f64; 3], high: [f64; 3]) -> Self {
        Self {
            low: Vector3::from(low),
            high: Vector3::from(high),
        }
    }
}

/// Range for the yaw parameter, in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YawBounds {
    pub low: f64,
    pub high: f64,
}

/// Configuration for a single skill instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SkillConfig {
    // Geometry
    pub global_xyz_bounds: PositionBounds,
    /// Scale applied to clipped push deltas.
    pub delta_xyz_bounds: Vector3<f64>,
    pub yaw_bounds: YawBounds,
    pub lift_height: f64,

    // Thresholds
    pub reach_threshold: f64,
    pub yaw_threshold: f64,

    // Affordance
    pub aff_threshold: f64,
    pub aff_type: AffordanceMode,
    pub aff_tanh_scaling: f64,

    // Gripper and parameterization
    pub binary_gripper: bool,
    pub use_ori_params: bool,
    pub use_gripper_params: bool,

    // Termination
    pub max_ac_calls: u32,
    /// Steps spent in REACHED before a grasp closes in.
    pub reach_dwell_steps: u32,
    /// Steps spent in GRASPED before the grasp counts as a success.
    pub grasp_dwell_steps: u32,
}

impl Default for SkillConfig {
    fn default() -> Self {
        Self {
            global_xyz_bounds: PositionBounds::new([-0.30, -0.30, 0.80], [0.15, 0.30, 0.90]),
            delta_xyz_bounds: Vector3::new(0.15, 0.15, 0.05),
            yaw_bounds: YawBounds {
                low: -FRAC_PI_2,
                high: FRAC_PI_2,
            },
            lift_height: 0.95,
            reach_threshold: 0.02,
            yaw_threshold: 0.20,
            aff_threshold: 0.08,
            aff_type: AffordanceMode::Dense,
            aff_tanh_scaling: 10.0,
            binary_gripper: true,
            use_ori_params: true,
            use_gripper_params: false,
            max_ac_calls: 15,
            reach_dwell_steps: 2,
            grasp_dwell_steps: 1,
        }
    }
}

impl SkillConfig {
    /// Defaults for the given skill kind.
    pub fn for_kind(kind: SkillKind) -> Self {
        let base = Self::default();
        match kind {
            SkillKind::Atomic => Self {
                max_ac_calls: ATOMIC_MAX_AC_CALLS,
                use_ori_params: false,
                ..base
            },
            SkillKind::Reach => base,
            SkillKind::Grasp | SkillKind::Push => Self {
                max_ac_calls: 20,
                ..base
            },
            SkillKind::Open | SkillKind::Close => Self {
                max_ac_calls: 4,
                use_ori_params: false,
                ..base
            },
        }
    }

    /// Check invariants for a skill of the given kind.
    pub fn validate(&self, kind: SkillKind) -> Result<()> {
        let bounds = &self.global_xyz_bounds;
        if bounds.low.iter().chain(bounds.high.iter()).any(|v| !v.is_finite()) {
            return Err(invalid("global_xyz_bounds", "values must be finite"));
        }
        if bounds.low.iter().zip(bounds.high.iter()).any(|(lo, hi)| lo > hi) {
            return Err(invalid("global_xyz_bounds", "low must not exceed high"));
        }
        if self.delta_xyz_bounds.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(invalid("delta_xyz_bounds", "values must be finite and >= 0"));
        }
        if !self.yaw_bounds.low.is_finite() || !self.yaw_bounds.high.is_finite() {
            return Err(invalid("yaw_bounds", "values must be finite"));
        }
        if self.yaw_bounds.low > self.yaw_bounds.high {
            return Err(invalid("yaw_bounds", "low must not exceed high"));
        }
        if !self.lift_height.is_finite() {
            return Err(invalid("lift_height", "must be finite"));
        }
        for (field, value) in [
            ("reach_threshold", self.reach_threshold),
            ("yaw_threshold", self.yaw_threshold),
            ("aff_threshold", self.aff_threshold),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid(field, "must be finite and > 0"));
            }
        }
        if !self.aff_tanh_scaling.is_finite() || self.aff_tanh_scaling < 0.0 {
            return Err(invalid("aff_tanh_scaling", "must be finite and >= 0"));
        }
        if self.max_ac_calls == 0 {
            return Err(invalid("max_ac_calls", "must be at least 1"));
        }
        if kind == SkillKind::Atomic && self.max_ac_calls != ATOMIC_MAX_AC_CALLS {
            return Err(invalid("max_ac_calls", "atomic skills issue exactly one action"));
        }
        if self.reach_dwell_steps == 0 || self.grasp_dwell_steps == 0 {
            return Err(invalid("dwell steps", "must be at least 1"));
        }
        Ok(())
    }

    /// Apply a single unscoped key.
    fn apply_value(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "global_xyz_bounds" => {
                let v = parse_floats(key, value, 6)?;
                self.global_xyz_bounds = PositionBounds::new([v[0], v[1], v[2]], [v[3], v[4], v[5]]);
            }
            "delta_xyz_bounds" => {
                let v = parse_floats(key, value, 3)?;
                self.delta_xyz_bounds = Vector3::new(v[0], v[1], v[2]);
            }
            "yaw_bounds" => {
                let v = parse_floats(key, value, 2)?;
                self.yaw_bounds = YawBounds {
                    low: v[0],
                    high: v[1],
                };
            }
            "lift_height" => self.lift_height = parse_float(key, value)?,
            "reach_threshold" => self.reach_threshold = parse_float(key, value)?,
            "yaw_threshold" => self.yaw_threshold = parse_float(key, value)?,
            "aff_threshold" => self.aff_threshold = parse_float(key, value)?,
            "aff_type" => {
                self.aff_type = match value {
                    "none" => AffordanceMode::None,
                    "sparse" => AffordanceMode::Sparse,
                    "dense" => AffordanceMode::Dense,
                    _ => {
                        return Err(ConfigError::InvalidLine(format!(
                            "aff_type must be 'none', 'sparse', or 'dense', got '{value}'"
                        )))
                    }
                }
            }
            "aff_tanh_scaling" => self.aff_tanh_scaling = parse_float(key, value)?,
            "binary_gripper" => self.binary_gripper = parse_bool(key, value)?,
            "use_ori_params" => self.use_ori_params = parse_bool(key, value)?,
            "use_gripper_params" => self.use_gripper_params = parse_bool(key, value)?,
            "max_ac_calls" => self.max_ac_calls = parse_int(key, value)?,
            "reach_dwell_steps" => self.reach_dwell_steps = parse_int(key, value)?,
            "grasp_dwell_steps" => self.grasp_dwell_steps = parse_int(key, value)?,
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// One [`SkillConfig`] per skill kind.
///
/// A section given in serialized form is overlaid on that kind's defaults,
/// so omitted fields keep their per-kind values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SkillConfigs {
    #[serde(deserialize_with = "atomic_section")]
    pub atomic: SkillConfig,
    #[serde(deserialize_with = "reach_section")]
    pub reach: SkillConfig,
    #[serde(deserialize_with = "grasp_section")]
    pub grasp: SkillConfig,
    #[serde(deserialize_with = "push_section")]
    pub push: SkillConfig,
    #[serde(deserialize_with = "open_section")]
    pub open: SkillConfig,
    #[serde(deserialize_with = "close_section")]
    pub close: SkillConfig,
}

/// Deserialize a partial section on top of `SkillConfig::for_kind(kind)`.
fn overlay_section<'de, D: Deserializer<'de>>(
    kind: SkillKind,
    deserializer: D,
) -> std::result::Result<SkillConfig, D::Error> {
    let section = Map::<String, Value>::deserialize(deserializer)?;
    let mut merged = match serde_json::to_value(SkillConfig::for_kind(kind)) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) => return Err(D::Error::custom("skill config must serialize to an object")),
        Err(err) => return Err(D::Error::custom(err)),
    };
    merged.extend(section);
    serde_json::from_value(Value::Object(merged))
        .map_err(|err| D::Error::custom(format!("{kind}: {err}")))
}

fn atomic_section<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<SkillConfig, D::Error> {
    overlay_section(SkillKind::Atomic, d)
}

fn reach_section<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<SkillConfig, D::Error> {
    overlay_section(SkillKind::Reach, d)
}

fn grasp_section<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<SkillConfig, D::Error> {
    overlay_section(SkillKind::Grasp, d)
}

fn push_section<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<SkillConfig, D::Error> {
    overlay_section(SkillKind::Push, d)
}

fn open_section<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<SkillConfig, D::Error> {
    overlay_section(SkillKind::Open, d)
}

fn close_section<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<SkillConfig, D::Error> {
    overlay_section(SkillKind::Close, d)
}

impl Default for SkillConfigs {
    fn default() -> Self {
        Self {
            atomic: SkillConfig::for_kind(SkillKind::Atomic),
            reach: SkillConfig::for_kind(SkillKind::Reach),
            grasp: SkillConfig::for_kind(SkillKind::Grasp),
            push: SkillConfig::for_kind(SkillKind::Push),
            open: SkillConfig::for_kind(SkillKind::Open),
            close: SkillConfig::for_kind(SkillKind::Close),
        }
    }
}

impl SkillConfigs {
    pub fn get(&self, kind: SkillKind) -> &SkillConfig {
        match kind {
            SkillKind::Atomic => &self.atomic,
            SkillKind::Reach => &self.reach,
            SkillKind::Grasp => &self.grasp,
            SkillKind::Push => &self.push,
            SkillKind::Open => &self.open,
            SkillKind::Close => &self.close,
        }
    }

    pub fn get_mut(&mut self, kind: SkillKind) -> &mut SkillConfig {
        match kind {
            SkillKind::Atomic => &mut self.atomic,
            SkillKind::Reach => &mut self.reach,
            SkillKind::Grasp => &mut self.grasp,
            SkillKind::Push => &mut self.push,
            SkillKind::Open => &mut self.open,
            SkillKind::Close => &mut self.close,
        }
    }
}

/// Controller configuration: per-kind skill configs plus image capture.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerConfig {
    /// Collect one image observation per low-level step.
    pub image_obs_in_info: bool,
    pub skills: SkillConfigs,
}

impl ControllerConfig {
    /// Load config from a file, merging with defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut config = Self::default();
        config.load_file(path)?;
        Ok(config)
    }

    /// Load and merge values from a config file.
    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)?;
        self.parse_content(&content)
    }

    /// Parse config content (key=value format).
    pub fn parse_content(&mut self, content: &str) -> Result<()> {
        for line in content.lines() {
            let trimmed = line.trim();

            // Skip empty lines and comments
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(ConfigError::InvalidLine(line.to_string()));
            };

            let key = key.trim();
            let value = unquote(value.trim());

            self.apply_value(key, &value)?;
        }
        Ok(())
    }

    fn apply_value(&mut self, key: &str, value: &str) -> Result<()> {
        if key == "image_obs_in_info" {
            self.image_obs_in_info = parse_bool(key, value)?;
            return Ok(());
        }

        if let Some((scope, field)) = key.split_once('.') {
            let kind = SkillKind::from_name(scope)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
            return self.skills.get_mut(kind).apply_value(field, value);
        }

        for kind in SkillKind::ALL {
            // Atomic skills keep their single-call cap.
            if kind == SkillKind::Atomic && key == "max_ac_calls" {
                continue;
            }
            self.skills.get_mut(kind).apply_value(key, value)?;
        }
        Ok(())
    }

    /// Validate every per-kind config.
    pub fn validate(&self) -> Result<()> {
        for kind in SkillKind::ALL {
            self.skills.get(kind).validate(kind)?;
        }
        Ok(())
    }
}

/// Remove surrounding quotes from a value.
fn unquote(value: &str) -> String {
    if value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        return value[1..value.len() - 1].to_string();
    }
    value.to_string()
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "on" => Ok(true),
        "false" | "0" | "no" | "n" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_int(key: &str, value: &str) -> Result<u32> {
    value.parse().map_err(|_| ConfigError::InvalidInt {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_float(key: &str, value: &str) -> Result<f64> {
    value.parse().map_err(|_| ConfigError::InvalidFloat {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_floats(key: &str, value: &str, expected: usize) -> Result<Vec<f64>> {
    let values = value
        .split_whitespace()
        .map(|v| parse_float(key, v))
        .collect::<Result<Vec<_>>>()?;
    if values.len() != expected {
        return Err(ConfigError::InvalidShape {
            key: key.to_string(),
            expected,
            got: values.len(),
        });
    }
    Ok(values)
}
