use crate::arm_config::MaxRelativeTarget;
use crate::arm_driver::JointMap;
use crate::error::{DeviceError, Result};
use std::collections::BTreeMap;
use tracing::warn;

/// Limit `goal` to within `max_relative_target` of `present`.
///
/// The bound is symmetric around the present reading. All three values must be finite and
/// the bound non-negative, which [`ensure_safe_goal_position`] checks before calling this.
pub fn clamp_goal(goal: f32, present: f32, max_relative_target: f32) -> f32 {
    let delta = goal - present;
    if delta.abs() <= max_relative_target {
        return goal;
    }
    present + delta.max(-max_relative_target).min(max_relative_target)
}

/// Clamp every joint's goal against its present position.
///
/// `goal_present` maps joint to `(goal, present)`. The result has the same keys.
/// Fails without clamping anything if a bound is negative or a position is not finite.
pub fn ensure_safe_goal_position(
    goal_present: &BTreeMap<String, (f32, f32)>,
    max_relative_target: &MaxRelativeTarget,
) -> Result<JointMap> {
    let mut safe_goals = JointMap::new();
    for (joint, (goal, present)) in goal_present {
        let bound = max_relative_target
            .bound_for(joint)
            .ok_or_else(|| DeviceError::MissingClampBound(joint.clone()))?;
        if !(bound.is_finite() && bound >= 0.0) {
            return Err(DeviceError::InvalidClampBound {
                joint: joint.clone(),
                bound,
            });
        }
        if !(goal.is_finite() && present.is_finite()) {
            return Err(DeviceError::NonFinitePosition {
                joint: joint.clone(),
                goal: *goal,
                present: *present,
            });
        }
        let safe_goal = clamp_goal(*goal, *present, bound);
        #[allow(clippy::float_cmp)]
        if safe_goal != *goal {
            warn!(
                "Relative goal position of {} had to be clamped to be safe: requested {}, present {}, clamped to {}",
                joint, goal, present, safe_goal
            );
        }
        safe_goals.insert(joint.clone(), safe_goal);
    }
    Ok(safe_goals)
}
