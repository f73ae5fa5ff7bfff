//! In-memory arms for running the composites without hardware.

use crate::arm_config::{ArmConfig, LeaderArmConfig, MotorConfig};
use crate::arm_driver::{
    motor_name, position_features, position_key, ActionMap, ArmDevice, FeatureMap, FeedbackMap,
    JointMap, ObservationMap, TeleopDevice, POSITION_SUFFIX,
};
use crate::error::{DeviceError, Result};
use async_trait::async_trait;
use std::f32::consts::TAU;
use std::time::{Duration, Instant};
use tracing::{debug, info};

fn home_positions(motors: &[MotorConfig]) -> JointMap {
    motors
        .iter()
        .map(|motor| (motor.name.clone(), motor.home))
        .collect()
}

/// Follower arm behaving like an ideal servo
///
/// Each motor reaches its commanded goal immediately. Configuring the arm enables torque,
/// disconnecting disables it unless `disable_torque_on_disconnect` is off.
pub struct SimulatedArm {
    config: ArmConfig,
    connected: bool,
    calibrated: bool,
    configured: bool,
    torque_enabled: bool,
    positions: JointMap,
}

impl SimulatedArm {
    pub fn new(config: ArmConfig) -> Box<Self> {
        let positions = home_positions(&config.motors);
        Box::new(SimulatedArm {
            config,
            connected: false,
            calibrated: false,
            configured: false,
            torque_enabled: false,
            positions,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn is_torque_enabled(&self) -> bool {
        self.torque_enabled
    }

    pub fn present_positions(&self) -> &JointMap {
        &self.positions
    }

    /// Move a motor by hand, as if the arm was pushed
    pub fn set_present_position(&mut self, motor: &str, position: f32) -> Result<()> {
        let slot = self
            .positions
            .get_mut(motor)
            .ok_or_else(|| DeviceError::UnknownMotor {
                device: self.config.id.clone(),
                motor: motor.to_owned(),
            })?;
        *slot = position;
        Ok(())
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(DeviceError::NotConnected(self.config.id.clone()))
        }
    }

    fn unknown_motor(&self, motor: &str) -> DeviceError {
        DeviceError::UnknownMotor {
            device: self.config.id.clone(),
            motor: motor.to_owned(),
        }
    }
}

#[async_trait]
impl ArmDevice for SimulatedArm {
    fn name(&self) -> &str {
        &self.config.id
    }

    fn observation_features(&self) -> FeatureMap {
        position_features(self.config.motor_names())
    }

    fn action_features(&self) -> FeatureMap {
        position_features(self.config.motor_names())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    async fn connect(&mut self, calibrate: bool) -> Result<()> {
        if self.connected {
            return Err(DeviceError::AlreadyConnected(self.config.id.clone()));
        }
        self.connected = true;
        if calibrate && !self.calibrated {
            self.calibrate().await?;
        }
        self.configure().await?;
        info!("{} connected on {}", self.config.id, self.config.port);
        Ok(())
    }

    async fn calibrate(&mut self) -> Result<()> {
        self.ensure_connected()?;
        self.calibrated = true;
        debug!("{} calibrated", self.config.id);
        Ok(())
    }

    async fn configure(&mut self) -> Result<()> {
        self.ensure_connected()?;
        self.configured = true;
        self.torque_enabled = true;
        Ok(())
    }

    async fn get_observation(&mut self) -> Result<ObservationMap> {
        self.ensure_connected()?;
        Ok(self
            .positions
            .iter()
            .map(|(motor, position)| (position_key(motor), *position))
            .collect())
    }

    /// Only `.pos` keys are commands, anything else is ignored
    async fn send_action(&mut self, action: ActionMap) -> Result<ActionMap> {
        self.ensure_connected()?;
        let goals: ActionMap = action
            .into_iter()
            .filter(|(key, _)| key.ends_with(POSITION_SUFFIX))
            .collect();
        if let Some(key) = goals
            .keys()
            .find(|key| !self.positions.contains_key(motor_name(key)))
        {
            return Err(self.unknown_motor(motor_name(key)));
        }
        for (key, goal) in &goals {
            self.positions.insert(motor_name(key).to_owned(), *goal);
        }
        Ok(goals)
    }

    /// Every motor when `motors` is empty
    async fn read_present_position(&mut self, motors: &[String]) -> Result<JointMap> {
        self.ensure_connected()?;
        if motors.is_empty() {
            return Ok(self.positions.clone());
        }
        motors
            .iter()
            .map(|motor| match self.positions.get(motor) {
                Some(position) => Ok((motor.clone(), *position)),
                None => Err(self.unknown_motor(motor)),
            })
            .collect()
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.ensure_connected()?;
        if self.config.disable_torque_on_disconnect {
            debug!("{} disabling torque", self.config.id);
            self.torque_enabled = false;
        }
        self.connected = false;
        info!("{} disconnected", self.config.id);
        Ok(())
    }
}

/// Leader arm tracing a sine wave around each motor's home position
///
/// Motors are phase shifted so they don't all move together. With zero amplitude the
/// leader holds its home pose.
pub struct SimulatedLeader {
    config: LeaderArmConfig,
    connected: bool,
    calibrated: bool,
    amplitude: f32,
    period: Duration,
    started: Instant,
}

impl SimulatedLeader {
    pub fn new(config: LeaderArmConfig) -> Box<Self> {
        Box::new(SimulatedLeader {
            config,
            connected: false,
            calibrated: false,
            amplitude: 0.0,
            period: Duration::from_secs(4),
            started: Instant::now(),
        })
    }

    pub fn with_motion(mut self: Box<Self>, amplitude: f32, period: Duration) -> Box<Self> {
        self.amplitude = amplitude;
        self.period = period;
        self
    }

    fn position_at(&self, index: usize, home: f32, elapsed: Duration) -> f32 {
        let period = self.period.as_secs_f32();
        if period <= 0.0 {
            return home;
        }
        let phase = elapsed.as_secs_f32() / period * TAU + index as f32 * 0.5;
        home + self.amplitude * phase.sin()
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(DeviceError::NotConnected(self.config.id.clone()))
        }
    }
}

#[async_trait]
impl TeleopDevice for SimulatedLeader {
    fn name(&self) -> &str {
        &self.config.id
    }

    fn action_features(&self) -> FeatureMap {
        position_features(self.config.motors.iter().map(|motor| motor.name.as_str()))
    }

    fn feedback_features(&self) -> FeatureMap {
        FeatureMap::new()
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    async fn connect(&mut self, calibrate: bool) -> Result<()> {
        if self.connected {
            return Err(DeviceError::AlreadyConnected(self.config.id.clone()));
        }
        self.connected = true;
        if calibrate && !self.calibrated {
            self.calibrate().await?;
        }
        self.configure().await?;
        self.started = Instant::now();
        info!("{} connected on {}", self.config.id, self.config.port);
        Ok(())
    }

    async fn calibrate(&mut self) -> Result<()> {
        self.ensure_connected()?;
        self.calibrated = true;
        Ok(())
    }

    async fn configure(&mut self) -> Result<()> {
        self.ensure_connected()
    }

    async fn get_action(&mut self) -> Result<ActionMap> {
        self.ensure_connected()?;
        let elapsed = self.started.elapsed();
        Ok(self
            .config
            .motors
            .iter()
            .enumerate()
            .map(|(index, motor)| {
                (
                    position_key(&motor.name),
                    self.position_at(index, motor.home, elapsed),
                )
            })
            .collect())
    }

    async fn send_feedback(&mut self, _feedback: FeedbackMap) -> Result<()> {
        self.ensure_connected()
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.ensure_connected()?;
        self.connected = false;
        info!("{} disconnected", self.config.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn arm_config() -> ArmConfig {
        ArmConfig::new(
            "sim_follower",
            "sim",
            vec![
                MotorConfig::new("j1", 1),
                MotorConfig {
                    home: 5.0,
                    ..MotorConfig::new("j2", 2)
                },
            ],
        )
    }

    fn leader_config() -> LeaderArmConfig {
        LeaderArmConfig::new("sim_leader", "sim", vec![MotorConfig::new("j1", 1)])
    }

    #[tokio::test]
    async fn arm_requires_connection() {
        let mut arm = SimulatedArm::new(arm_config());
        assert!(matches!(
            arm.get_observation().await,
            Err(DeviceError::NotConnected(_))
        ));
        assert!(matches!(arm.disconnect().await, Err(DeviceError::NotConnected(_))));
    }

    #[tokio::test]
    async fn arm_connect_calibrates_and_configures() {
        let mut arm = SimulatedArm::new(arm_config());
        arm.connect(true).await.unwrap();
        assert!(arm.is_connected());
        assert!(arm.is_calibrated());
        assert!(arm.is_configured());
        assert!(matches!(
            arm.connect(true).await,
            Err(DeviceError::AlreadyConnected(_))
        ));
    }

    #[tokio::test]
    async fn arm_connect_without_calibration() {
        let mut arm = SimulatedArm::new(arm_config());
        arm.connect(false).await.unwrap();
        assert!(arm.is_connected());
        assert!(!arm.is_calibrated());
    }

    #[tokio::test]
    async fn arm_starts_at_home() {
        let mut arm = SimulatedArm::new(arm_config());
        arm.connect(true).await.unwrap();
        let observation = arm.get_observation().await.unwrap();
        assert_relative_eq!(observation["j1.pos"], 0.0);
        assert_relative_eq!(observation["j2.pos"], 5.0);
    }

    #[tokio::test]
    async fn arm_follows_goal() {
        let mut arm = SimulatedArm::new(arm_config());
        arm.connect(true).await.unwrap();
        let action: ActionMap = [("j1.pos".to_owned(), 42.0), ("j1.vel".to_owned(), 1.0)]
            .into_iter()
            .collect();
        let sent = arm.send_action(action).await.unwrap();
        assert_eq!(sent.len(), 1);
        let present = arm.read_present_position(&["j1".to_owned()]).await.unwrap();
        assert_relative_eq!(present["j1"], 42.0);
    }

    #[tokio::test]
    async fn disconnect_disables_torque() {
        let mut arm = SimulatedArm::new(arm_config());
        assert!(!arm.is_torque_enabled());
        arm.connect(false).await.unwrap();
        assert!(arm.is_torque_enabled());
        arm.disconnect().await.unwrap();
        assert!(!arm.is_torque_enabled());
    }

    #[tokio::test]
    async fn torque_can_stay_on_after_disconnect() {
        let mut config = arm_config();
        config.disable_torque_on_disconnect = false;
        let mut arm = SimulatedArm::new(config);
        arm.connect(false).await.unwrap();
        arm.disconnect().await.unwrap();
        assert!(arm.is_torque_enabled());
    }

    #[tokio::test]
    async fn arm_rejects_unknown_motor() {
        let mut arm = SimulatedArm::new(arm_config());
        arm.connect(true).await.unwrap();
        let action: ActionMap = [("j9.pos".to_owned(), 1.0)].into_iter().collect();
        assert!(matches!(
            arm.send_action(action).await,
            Err(DeviceError::UnknownMotor { .. })
        ));
        assert!(arm.read_present_position(&["j9".to_owned()]).await.is_err());
    }

    #[tokio::test]
    async fn arm_reads_every_motor_by_default() {
        let mut arm = SimulatedArm::new(arm_config());
        arm.connect(true).await.unwrap();
        arm.set_present_position("j1", -3.0).unwrap();
        let present = arm.read_present_position(&[]).await.unwrap();
        assert_eq!(present.len(), 2);
        assert_relative_eq!(present["j1"], -3.0);
    }

    #[tokio::test]
    async fn still_leader_holds_home() {
        let mut leader = SimulatedLeader::new(leader_config());
        leader.connect(true).await.unwrap();
        let first = leader.get_action().await.unwrap();
        let second = leader.get_action().await.unwrap();
        assert_eq!(first, second);
        assert_relative_eq!(first["j1.pos"], 0.0);
        assert!(leader.feedback_features().is_empty());
    }

    #[test]
    fn moving_leader_stays_within_amplitude() {
        let leader = SimulatedLeader::new(leader_config()).with_motion(10.0, Duration::from_secs(2));
        for millis in (0..4000).step_by(125) {
            let position = leader.position_at(0, 20.0, Duration::from_millis(millis));
            assert!((10.0..=30.0).contains(&position));
        }
        assert_relative_eq!(
            leader.position_at(0, 20.0, Duration::from_millis(500)),
            30.0,
            epsilon = 1e-4
        );
    }
}
