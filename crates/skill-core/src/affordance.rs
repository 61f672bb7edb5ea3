//! Affordance-based reward and success.
//!
//! An affordance center is a task-relevant point (a grasp point, a push
//! contact). A skill succeeds on affordance when its reach point lies within
//! the threshold of any center on every axis.

use crate::types::AffordanceMode;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Reward and success flag from an affordance check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffordanceOutcome {
    pub reward: f64,
    pub success: bool,
}

impl AffordanceOutcome {
    /// The outcome when no check applies.
    pub const SATISFIED: Self = Self {
        reward: 1.0,
        success: true,
    };
}

/// Evaluate `point` against the affordance `centers`.
///
/// A disabled mode, undefined centers, or an empty center set all count as
/// satisfied.
pub fn aff_reward_and_success(
    centers: Option<&[Vector3<f64>]>,
    point: &Vector3<f64>,
    threshold: f64,
    mode: AffordanceMode,
    tanh_scaling: f64,
) -> AffordanceOutcome {
    let centers = match centers {
        Some(c) if !c.is_empty() && mode != AffordanceMode::None => c,
        _ => return AffordanceOutcome::SATISFIED,
    };

    let success = centers
        .iter()
        .any(|c| (point - c).iter().all(|d| d.abs() <= threshold));

    let reward = match mode {
        _ if success => 1.0,
        AffordanceMode::Dense => {
            let min_dist = centers
                .iter()
                .map(|c| (point - c).iter().map(|d| (d.abs() - threshold).max(0.0)).sum::<f64>())
                .fold(f64::INFINITY, f64::min);
            1.0 - (tanh_scaling * min_dist).tanh()
        }
        AffordanceMode::Sparse | AffordanceMode::None => 0.0,
    };

    AffordanceOutcome { reward, success }
}
