#![allow(dead_code)]

use async_trait::async_trait;
use dual_arm_controller::arm_config::{
    ArmConfig, DualArmConfig, DualLeaderConfig, LeaderArmConfig, MaxRelativeTarget, MotorConfig,
};
use dual_arm_controller::arm_driver::{
    position_features, position_key, ActionMap, ArmDevice, FeatureMap, FeedbackMap, JointMap,
    ObservationMap, TeleopDevice,
};
use dual_arm_controller::{DeviceError, Result};
use std::sync::{Arc, Mutex};

/// Calls made to every mock, in order, as `"<name> <operation>"`
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[derive(Debug, Default)]
pub struct MockState {
    pub connected: bool,
    pub calibrated: bool,
    pub configured: bool,
    pub present: JointMap,
    pub sent: Vec<ActionMap>,
    pub feedback: Vec<FeedbackMap>,
    /// Operation that fails with a transport error
    pub fail_on: Option<&'static str>,
}

pub type SharedState = Arc<Mutex<MockState>>;

/// Arm or leader recording every call into a shared log
pub struct MockArm {
    name: String,
    motors: Vec<String>,
    state: SharedState,
    log: CallLog,
}

impl MockArm {
    pub fn new(name: &str, motors: &[&str], log: &CallLog) -> (Box<MockArm>, SharedState) {
        let state = SharedState::default();
        let arm = MockArm {
            name: name.to_owned(),
            motors: motors.iter().map(|motor| motor.to_string()).collect(),
            state: state.clone(),
            log: log.clone(),
        };
        (Box::new(arm), state)
    }

    fn record(&self, operation: &'static str) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("{} {}", self.name, operation));
        if self.state.lock().unwrap().fail_on == Some(operation) {
            return Err(DeviceError::Transport(format!(
                "{} failed on {}",
                operation, self.name
            )));
        }
        Ok(())
    }

    fn features(&self) -> FeatureMap {
        position_features(self.motors.iter().map(String::as_str))
    }
}

#[async_trait]
impl ArmDevice for MockArm {
    fn name(&self) -> &str {
        &self.name
    }

    fn observation_features(&self) -> FeatureMap {
        self.features()
    }

    fn action_features(&self) -> FeatureMap {
        self.features()
    }

    fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }

    fn is_calibrated(&self) -> bool {
        self.state.lock().unwrap().calibrated
    }

    async fn connect(&mut self, calibrate: bool) -> Result<()> {
        self.record("connect")?;
        let mut state = self.state.lock().unwrap();
        state.connected = true;
        state.calibrated |= calibrate;
        Ok(())
    }

    async fn calibrate(&mut self) -> Result<()> {
        self.record("calibrate")?;
        self.state.lock().unwrap().calibrated = true;
        Ok(())
    }

    async fn configure(&mut self) -> Result<()> {
        self.record("configure")?;
        self.state.lock().unwrap().configured = true;
        Ok(())
    }

    async fn get_observation(&mut self) -> Result<ObservationMap> {
        self.record("get_observation")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .present
            .iter()
            .map(|(motor, position)| (position_key(motor), *position))
            .collect())
    }

    async fn send_action(&mut self, action: ActionMap) -> Result<ActionMap> {
        self.record("send_action")?;
        self.state.lock().unwrap().sent.push(action.clone());
        Ok(action)
    }

    /// Motors without a present position are left out of the reply
    async fn read_present_position(&mut self, motors: &[String]) -> Result<JointMap> {
        self.record("read_present_position")?;
        let state = self.state.lock().unwrap();
        if motors.is_empty() {
            return Ok(state.present.clone());
        }
        Ok(motors
            .iter()
            .filter_map(|motor| state.present.get(motor).map(|p| (motor.clone(), *p)))
            .collect())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.record("disconnect")?;
        self.state.lock().unwrap().connected = false;
        Ok(())
    }
}

#[async_trait]
impl TeleopDevice for MockArm {
    fn name(&self) -> &str {
        &self.name
    }

    fn action_features(&self) -> FeatureMap {
        self.features()
    }

    fn feedback_features(&self) -> FeatureMap {
        self.features()
    }

    fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }

    fn is_calibrated(&self) -> bool {
        self.state.lock().unwrap().calibrated
    }

    async fn connect(&mut self, calibrate: bool) -> Result<()> {
        ArmDevice::connect(self, calibrate).await
    }

    async fn calibrate(&mut self) -> Result<()> {
        ArmDevice::calibrate(self).await
    }

    async fn configure(&mut self) -> Result<()> {
        ArmDevice::configure(self).await
    }

    async fn get_action(&mut self) -> Result<ActionMap> {
        self.record("get_action")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .present
            .iter()
            .map(|(motor, position)| (position_key(motor), *position))
            .collect())
    }

    async fn send_feedback(&mut self, feedback: FeedbackMap) -> Result<()> {
        self.record("send_feedback")?;
        self.state.lock().unwrap().feedback.push(feedback);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        ArmDevice::disconnect(self).await
    }
}

pub fn arm_config(id: &str, motors: &[&str]) -> ArmConfig {
    let motors = motors
        .iter()
        .enumerate()
        .map(|(index, name)| MotorConfig::new(name, index as u8 + 1))
        .collect();
    ArmConfig::new(id, "mock", motors)
}

pub fn dual_config(left_bound: Option<f32>, right_bound: Option<f32>) -> DualArmConfig {
    let mut left = arm_config("left_arm", &["j1", "j2"]);
    left.max_relative_target = left_bound.map(MaxRelativeTarget::Uniform);
    let mut right = arm_config("right_arm", &["j1", "j2"]);
    right.max_relative_target = right_bound.map(MaxRelativeTarget::Uniform);
    DualArmConfig { left, right }
}

pub fn dual_leader_config() -> DualLeaderConfig {
    let motors = vec![MotorConfig::new("shoulder", 1), MotorConfig::new("gripper", 2)];
    DualLeaderConfig {
        left: LeaderArmConfig::new("left_leader", "mock", motors.clone()),
        right: LeaderArmConfig::new("right_leader", "mock", motors),
    }
}

pub fn joints(entries: &[(&str, f32)]) -> JointMap {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), *value))
        .collect()
}
