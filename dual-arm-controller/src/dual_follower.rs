use crate::arm_config::{ArmConfig, ConfigFile, DualArmConfig};
use crate::arm_driver::{
    motor_name, position_key, ActionMap, ArmDevice, FeatureMap, JointMap, ObservationMap,
};
use crate::error::{combine_sides, DeviceError, Result};
use crate::namespace::{merge_sides, parse_composite_key, split_by_side, Side};
use crate::safety::ensure_safe_goal_position;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Two follower arms driven as one device
///
/// Every key is prefixed with `left.` or `right.`. Operations reach the left arm
/// first and the right arm second, as two separate calls; nothing is synchronized
/// between the arms and nothing is rolled back when one of them fails.
pub struct DualArmDevice {
    name: String,
    config: DualArmConfig,
    left: Box<dyn ArmDevice>,
    right: Box<dyn ArmDevice>,
    observation_features: FeatureMap,
    action_features: FeatureMap,
}

impl DualArmDevice {
    /// Wrap two already built arms
    ///
    /// The config is not validated here. Bounds that are negative or not finite are still
    /// refused when an action is clamped.
    pub fn new(
        config: DualArmConfig,
        left: Box<dyn ArmDevice>,
        right: Box<dyn ArmDevice>,
    ) -> DualArmDevice {
        let name = format!("dual_arm({}, {})", left.name(), right.name());
        let observation_features =
            merge_sides(left.observation_features(), right.observation_features());
        let action_features = merge_sides(left.action_features(), right.action_features());
        DualArmDevice {
            name,
            config,
            left,
            right,
            observation_features,
            action_features,
        }
    }

    /// Validate the config, then build one arm per side from its own config
    pub fn from_config<F>(config: DualArmConfig, mut build: F) -> Result<DualArmDevice>
    where
        F: FnMut(Side, &ArmConfig) -> Result<Box<dyn ArmDevice>>,
    {
        config.validate()?;
        let left = build(Side::Left, &config.left).map_err(|e| e.on_side(Side::Left, "build"))?;
        let right =
            build(Side::Right, &config.right).map_err(|e| e.on_side(Side::Right, "build"))?;
        Ok(DualArmDevice::new(config, left, right))
    }

    pub fn config(&self) -> &DualArmConfig {
        &self.config
    }

    pub fn arm(&self, side: Side) -> &dyn ArmDevice {
        match side {
            Side::Left => self.left.as_ref(),
            Side::Right => self.right.as_ref(),
        }
    }

    fn arm_mut(&mut self, side: Side) -> &mut dyn ArmDevice {
        match side {
            Side::Left => self.left.as_mut(),
            Side::Right => self.right.as_mut(),
        }
    }

    /// Local action of one side turned into position commands, clamped if the side has a bound
    async fn safe_action(&mut self, side: Side, action: ActionMap) -> Result<ActionMap> {
        let goals = goals_by_motor(action).map_err(|e| e.on_side(side, "send action"))?;

        let max_relative_target = self.config.side(side).max_relative_target.clone();
        let goals = match max_relative_target {
            Some(max_relative_target) if !goals.is_empty() => {
                let motors: Vec<String> = goals.keys().cloned().collect();
                debug!("Reading {} arm present position of {:?}", side, motors);
                let present = self
                    .arm_mut(side)
                    .read_present_position(&motors)
                    .await
                    .map_err(|e| e.on_side(side, "read present position"))?;
                let goal_present = pair_with_present(&goals, &present)
                    .map_err(|e| e.on_side(side, "clamp goal positions"))?;
                ensure_safe_goal_position(&goal_present, &max_relative_target)
                    .map_err(|e| e.on_side(side, "clamp goal positions"))?
            }
            _ => goals,
        };

        Ok(goals
            .into_iter()
            .map(|(motor, goal)| (position_key(&motor), goal))
            .collect())
    }
}

/// Goal per motor name, `j1` and `j1.pos` naming the same motor
fn goals_by_motor(action: ActionMap) -> Result<JointMap> {
    let mut goals = JointMap::new();
    for (key, goal) in action {
        let motor = motor_name(&key);
        if goals.insert(motor.to_owned(), goal).is_some() {
            return Err(DeviceError::DuplicateMotor(motor.to_owned()));
        }
    }
    Ok(goals)
}

/// `(goal, present)` for every joint of `goals`
fn pair_with_present(goals: &JointMap, present: &JointMap) -> Result<BTreeMap<String, (f32, f32)>> {
    goals
        .iter()
        .map(|(joint, goal)| match present.get(joint) {
            Some(present) => Ok((joint.clone(), (*goal, *present))),
            None => Err(DeviceError::MissingPresentPosition(joint.clone())),
        })
        .collect()
}

#[async_trait]
impl ArmDevice for DualArmDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn observation_features(&self) -> FeatureMap {
        self.observation_features.clone()
    }

    fn action_features(&self) -> FeatureMap {
        self.action_features.clone()
    }

    fn is_connected(&self) -> bool {
        self.left.is_connected() && self.right.is_connected()
    }

    fn is_calibrated(&self) -> bool {
        self.left.is_calibrated() && self.right.is_calibrated()
    }

    /// Both arms are attempted even if the left one fails
    async fn connect(&mut self, calibrate: bool) -> Result<()> {
        let left = self.left.connect(calibrate).await;
        let right = self.right.connect(calibrate).await;
        combine_sides("connect", left, right)?;
        info!("{} connected", self.name);
        Ok(())
    }

    async fn calibrate(&mut self) -> Result<()> {
        let left = self.left.calibrate().await;
        let right = self.right.calibrate().await;
        combine_sides("calibrate", left, right)
    }

    async fn configure(&mut self) -> Result<()> {
        let left = self.left.configure().await;
        let right = self.right.configure().await;
        combine_sides("configure", left, right)
    }

    async fn get_observation(&mut self) -> Result<ObservationMap> {
        let left = self
            .left
            .get_observation()
            .await
            .map_err(|e| e.on_side(Side::Left, "read observation"))?;
        let right = self
            .right
            .get_observation()
            .await
            .map_err(|e| e.on_side(Side::Right, "read observation"))?;
        Ok(merge_sides(left, right))
    }

    /// Both sides are clamped before either arm is commanded.
    ///
    /// Keys without a side prefix are dropped. Each arm receives exactly one call,
    /// with an empty map if the action had nothing for it.
    async fn send_action(&mut self, action: ActionMap) -> Result<ActionMap> {
        let (left_action, right_action) = split_by_side(action);
        let left_action = self.safe_action(Side::Left, left_action).await?;
        let right_action = self.safe_action(Side::Right, right_action).await?;

        let left_sent = self
            .left
            .send_action(left_action)
            .await
            .map_err(|e| e.on_side(Side::Left, "send action"))?;
        let right_sent = self
            .right
            .send_action(right_action)
            .await
            .map_err(|e| e.on_side(Side::Right, "send action"))?;
        Ok(merge_sides(left_sent, right_sent))
    }

    /// Composite keys (`left.<motor>`) are routed to their arm, other keys are ignored.
    ///
    /// An empty request reads every motor of both arms. Otherwise an arm with no
    /// requested motor is not read at all.
    async fn read_present_position(&mut self, motors: &[String]) -> Result<JointMap> {
        let mut left_motors = Vec::new();
        let mut right_motors = Vec::new();
        for key in motors {
            match parse_composite_key(key) {
                Some((Side::Left, local)) => left_motors.push(local.to_owned()),
                Some((Side::Right, local)) => right_motors.push(local.to_owned()),
                None => debug!("Ignoring present position request for {:?}", key),
            }
        }
        let read_all = motors.is_empty();
        let left = if read_all || !left_motors.is_empty() {
            self.left
                .read_present_position(&left_motors)
                .await
                .map_err(|e| e.on_side(Side::Left, "read present position"))?
        } else {
            JointMap::new()
        };
        let right = if read_all || !right_motors.is_empty() {
            self.right
                .read_present_position(&right_motors)
                .await
                .map_err(|e| e.on_side(Side::Right, "read present position"))?
        } else {
            JointMap::new()
        };
        Ok(merge_sides(left, right))
    }

    /// Both arms are attempted even if the left one fails
    async fn disconnect(&mut self) -> Result<()> {
        let left = self.left.disconnect().await;
        let right = self.right.disconnect().await;
        combine_sides("disconnect", left, right)?;
        info!("{} disconnected", self.name);
        Ok(())
    }
}
