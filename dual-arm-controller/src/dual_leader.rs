use crate::arm_config::{ConfigFile, DualLeaderConfig, LeaderArmConfig};
use crate::arm_driver::{ActionMap, FeatureMap, FeedbackMap, TeleopDevice};
use crate::error::{combine_sides, Result};
use crate::namespace::{merge_sides, Side};
use async_trait::async_trait;
use tracing::{debug, info};

/// Two leader arms read as one teleoperator
///
/// Mirrors [`crate::dual_follower::DualArmDevice`] on the input side. Feedback is not
/// supported, whatever the individual leaders can do.
pub struct DualArmTeleoperator {
    name: String,
    config: DualLeaderConfig,
    left: Box<dyn TeleopDevice>,
    right: Box<dyn TeleopDevice>,
    action_features: FeatureMap,
}

impl DualArmTeleoperator {
    pub fn new(
        config: DualLeaderConfig,
        left: Box<dyn TeleopDevice>,
        right: Box<dyn TeleopDevice>,
    ) -> DualArmTeleoperator {
        let name = format!("dual_leader({}, {})", left.name(), right.name());
        let action_features = merge_sides(left.action_features(), right.action_features());
        DualArmTeleoperator {
            name,
            config,
            left,
            right,
            action_features,
        }
    }

    /// Validate the config, then build one leader per side from its own config
    pub fn from_config<F>(config: DualLeaderConfig, mut build: F) -> Result<DualArmTeleoperator>
    where
        F: FnMut(Side, &LeaderArmConfig) -> Result<Box<dyn TeleopDevice>>,
    {
        config.validate()?;
        let left = build(Side::Left, &config.left).map_err(|e| e.on_side(Side::Left, "build"))?;
        let right =
            build(Side::Right, &config.right).map_err(|e| e.on_side(Side::Right, "build"))?;
        Ok(DualArmTeleoperator::new(config, left, right))
    }

    pub fn config(&self) -> &DualLeaderConfig {
        &self.config
    }

    pub fn leader(&self, side: Side) -> &dyn TeleopDevice {
        match side {
            Side::Left => self.left.as_ref(),
            Side::Right => self.right.as_ref(),
        }
    }
}

#[async_trait]
impl TeleopDevice for DualArmTeleoperator {
    fn name(&self) -> &str {
        &self.name
    }

    fn action_features(&self) -> FeatureMap {
        self.action_features.clone()
    }

    fn feedback_features(&self) -> FeatureMap {
        FeatureMap::new()
    }

    fn is_connected(&self) -> bool {
        self.left.is_connected() && self.right.is_connected()
    }

    fn is_calibrated(&self) -> bool {
        self.left.is_calibrated() && self.right.is_calibrated()
    }

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

    async fn get_action(&mut self) -> Result<ActionMap> {
        let left = self
            .left
            .get_action()
            .await
            .map_err(|e| e.on_side(Side::Left, "read action"))?;
        let right = self
            .right
            .get_action()
            .await
            .map_err(|e| e.on_side(Side::Right, "read action"))?;
        Ok(merge_sides(left, right))
    }

    async fn send_feedback(&mut self, feedback: FeedbackMap) -> Result<()> {
        debug!("{} ignoring {} feedback values", self.name, feedback.len());
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        let left = self.left.disconnect().await;
        let right = self.right.disconnect().await;
        combine_sides("disconnect", left, right)?;
        info!("{} disconnected", self.name);
        Ok(())
    }
}
