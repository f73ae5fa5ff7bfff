use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Suffix of position channels, `"<motor>.pos"`
pub const POSITION_SUFFIX: &str = ".pos";

/// Value type carried by a feature channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum FeatureType {
    Float32,
}

pub type FeatureMap = BTreeMap<String, FeatureType>;
pub type ObservationMap = BTreeMap<String, f32>;
pub type ActionMap = BTreeMap<String, f32>;
pub type FeedbackMap = BTreeMap<String, f32>;
/// Joint positions keyed by motor name
pub type JointMap = BTreeMap<String, f32>;

/// Position command key of a motor.
///
/// Keys already carrying the suffix are returned unchanged.
pub fn position_key(motor: &str) -> String {
    if motor.ends_with(POSITION_SUFFIX) {
        motor.to_owned()
    } else {
        format!("{}{}", motor, POSITION_SUFFIX)
    }
}

/// Motor name behind a position key
pub fn motor_name(key: &str) -> &str {
    key.strip_suffix(POSITION_SUFFIX).unwrap_or(key)
}

/// One `"<motor>.pos"` float channel per motor
pub fn position_features<'a>(motors: impl IntoIterator<Item = &'a str>) -> FeatureMap {
    motors
        .into_iter()
        .map(|motor| (position_key(motor), FeatureType::Float32))
        .collect()
}

/// A single robot arm that can be observed and commanded
///
/// Implementations own their transport exclusively.
#[async_trait]
pub trait ArmDevice: Send + Sync {
    fn name(&self) -> &str;
    fn observation_features(&self) -> FeatureMap;
    fn action_features(&self) -> FeatureMap;
    fn is_connected(&self) -> bool;
    fn is_calibrated(&self) -> bool;
    /// Open the transport, calibrating first if requested and needed
    async fn connect(&mut self, calibrate: bool) -> Result<()>;
    async fn calibrate(&mut self) -> Result<()>;
    /// Write the motor settings used during operation
    async fn configure(&mut self) -> Result<()>;
    async fn get_observation(&mut self) -> Result<ObservationMap>;
    /// Command goal positions
    ///
    /// Returns the action that was actually sent.
    async fn send_action(&mut self, action: ActionMap) -> Result<ActionMap>;
    /// Live positions of the given motors read straight from the bus, every motor when
    /// `motors` is empty
    async fn read_present_position(&mut self, motors: &[String]) -> Result<JointMap>;
    async fn disconnect(&mut self) -> Result<()>;
}

/// Human input device producing actions for an [`ArmDevice`]
#[async_trait]
pub trait TeleopDevice: Send + Sync {
    fn name(&self) -> &str;
    fn action_features(&self) -> FeatureMap;
    fn feedback_features(&self) -> FeatureMap;
    fn is_connected(&self) -> bool;
    fn is_calibrated(&self) -> bool;
    async fn connect(&mut self, calibrate: bool) -> Result<()>;
    async fn calibrate(&mut self) -> Result<()>;
    async fn configure(&mut self) -> Result<()>;
    async fn get_action(&mut self) -> Result<ActionMap>;
    async fn send_feedback(&mut self, feedback: FeedbackMap) -> Result<()>;
    async fn disconnect(&mut self) -> Result<()>;
}
