//! Core types shared by the skill families and the controller.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

// --- Enumerations ---

/// Skill selector accepted by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillKind {
    Atomic,
    Reach,
    Grasp,
    Push,
    Open,
    Close,
}

impl SkillKind {
    /// Every kind, in dispatch-table order.
    pub const ALL: [SkillKind; 6] = [
        Self::Atomic,
        Self::Reach,
        Self::Grasp,
        Self::Push,
        Self::Open,
        Self::Close,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Atomic => "atomic",
            Self::Reach => "reach",
            Self::Grasp => "grasp",
            Self::Push => "push",
            Self::Open => "open",
            Self::Close => "close",
        }
    }

    /// Parse a skill name token.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// States a skill of this kind may occupy.
    pub fn states(&self) -> &'static [SkillState] {
        match self {
            Self::Atomic | Self::Open | Self::Close => &[],
            Self::Reach => &[
                SkillState::Init,
                SkillState::Lifted,
                SkillState::Hovering,
                SkillState::Reached,
            ],
            Self::Grasp => &[
                SkillState::Init,
                SkillState::Lifted,
                SkillState::Hovering,
                SkillState::Reached,
                SkillState::Grasped,
            ],
            Self::Push => &[
                SkillState::Init,
                SkillState::Lifted,
                SkillState::Hovering,
                SkillState::Reached,
                SkillState::Pushed,
            ],
        }
    }
}

impl std::fmt::Display for SkillKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discrete state of a reach-style skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkillState {
    Init,
    Lifted,
    Hovering,
    Reached,
    Grasped,
    Pushed,
}

impl SkillState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Lifted => "LIFTED",
            Self::Hovering => "HOVERING",
            Self::Reached => "REACHED",
            Self::Grasped => "GRASPED",
            Self::Pushed => "PUSHED",
        }
    }
}

impl std::fmt::Display for SkillState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How affordance centers shape the diagnostic reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffordanceMode {
    /// Affordance check disabled; always `(1.0, true)`.
    None,
    /// Reward is 1.0 on success, 0.0 otherwise.
    Sparse,
    /// Reward saturates toward 1.0 as the point nears a center.
    #[default]
    Dense,
}

impl AffordanceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Sparse => "sparse",
            Self::Dense => "dense",
        }
    }
}

// --- Actions ---

/// One low-level command produced by a skill.
///
/// Position and orientation are deltas for reach-style skills; atomic skills
/// put direct targets in the same slots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionVector {
    pub pos: Vector3<f64>,
    /// Present when the skill is configured with orientation parameters.
    pub ori: Option<Vector3<f64>>,
    pub gripper: f64,
}

impl ActionVector {
    pub fn new(pos: Vector3<f64>, ori: Option<Vector3<f64>>, gripper: f64) -> Self {
        Self { pos, ori, gripper }
    }

    /// Number of scalar components in the flat layout.
    pub fn dim(&self) -> usize {
        if self.ori.is_some() {
            7
        } else {
            4
        }
    }

    /// Flatten as `[pos, ori?, gripper]`.
    pub fn to_vec(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.dim());
        out.extend_from_slice(self.pos.as_slice());
        if let Some(ori) = &self.ori {
            out.extend_from_slice(ori.as_slice());
        }
        out.push(self.gripper);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skill_kind_parses_every_name() {
        for kind in SkillKind::ALL {
            assert_eq!(SkillKind::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(SkillKind::from_name("lift"), None);
    }

    #[test]
    fn grasp_and_push_extend_reach_states() {
        let reach = SkillKind::Reach.states();
        assert!(reach.iter().all(|s| SkillKind::Grasp.states().contains(s)));
        assert!(reach.iter().all(|s| SkillKind::Push.states().contains(s)));
        assert!(SkillKind::Grasp.states().contains(&SkillState::Grasped));
        assert!(!SkillKind::Reach.states().contains(&SkillState::Pushed));
    }

    #[test]
    fn action_vector_flattens_in_fixed_order() {
        let action = ActionVector::new(
            Vector3::new(1.0, 2.0, 3.0),
            Some(Vector3::new(4.0, 5.0, 6.0)),
            -1.0,
        );
        assert_eq!(action.to_vec(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, -1.0]);

        let action = ActionVector::new(Vector3::new(1.0, 2.0, 3.0), None, 0.0);
        assert_eq!(action.dim(), 4);
        assert_eq!(action.to_vec(), vec![1.0, 2.0, 3.0, 0.0]);
    }

    #[test]
    fn state_serializes_screaming_case() {
        let json = serde_json::to_string(&SkillState::Hovering).unwrap();
        assert_eq!(json, "\"HOVERING\"");
    }
}
