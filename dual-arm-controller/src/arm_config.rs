use crate::namespace::Side;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("error while accessing configuration")]
    IoError(#[from] std::io::Error),
    #[error("error while parsing json")]
    DeserializationError(#[from] serde_json::Error),
    #[error("error while parsing yaml")]
    YamlError(#[from] serde_yaml::Error),
    #[error("invalid configuration for {arm}: {reason}")]
    Invalid { arm: String, reason: String },
}

type Result<T> = std::result::Result<T, ConfigError>;

/// Serialization helpers shared by every config type
pub trait ConfigFile: Serialize + DeserializeOwned {
    fn validate(&self) -> Result<()>;

    fn parse_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn parse_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn serialize_to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn serialize_to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    fn save_json(&self, path: &str) -> Result<()> {
        fs::write(path, self.serialize_to_json()?)?;
        Ok(())
    }

    fn save_yaml(&self, path: &str) -> Result<()> {
        fs::write(path, self.serialize_to_yaml()?)?;
        Ok(())
    }

    fn load_json(path: &str) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse_json(&text)
    }

    fn load_yaml(path: &str) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse_yaml(&text)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MotorConfig {
    pub name: String,
    /// Bus address
    pub id: u8,
    /// Resting position, also the start position of simulated arms
    #[serde(default)]
    pub home: f32,
}

impl MotorConfig {
    pub fn new(name: &str, id: u8) -> MotorConfig {
        MotorConfig {
            name: name.to_owned(),
            id,
            home: 0.0,
        }
    }
}

/// Largest step a single command may take away from the present position
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum MaxRelativeTarget {
    Uniform(f32),
    PerJoint(BTreeMap<String, f32>),
}

impl MaxRelativeTarget {
    pub fn bound_for(&self, joint: &str) -> Option<f32> {
        match self {
            MaxRelativeTarget::Uniform(bound) => Some(*bound),
            MaxRelativeTarget::PerJoint(bounds) => bounds.get(joint).copied(),
        }
    }

    fn check(&self, motors: &BTreeSet<&str>) -> std::result::Result<(), String> {
        let check_bound = |joint: &str, bound: f32| {
            if bound.is_finite() && bound >= 0.0 {
                Ok(())
            } else {
                Err(format!(
                    "max relative target for {} must be finite and non-negative, got {}",
                    joint, bound
                ))
            }
        };
        match self {
            MaxRelativeTarget::Uniform(bound) => check_bound("all joints", *bound),
            MaxRelativeTarget::PerJoint(bounds) => {
                for (joint, bound) in bounds {
                    if !motors.contains(joint.as_str()) {
                        return Err(format!("max relative target names unknown motor {:?}", joint));
                    }
                    check_bound(joint, *bound)?;
                }
                if let Some(missing) = motors.iter().find(|motor| !bounds.contains_key(**motor)) {
                    return Err(format!("max relative target missing for motor {:?}", missing));
                }
                Ok(())
            }
        }
    }
}

/// Configuration of one follower arm
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ArmConfig {
    pub id: String,
    pub port: String,
    pub motors: Vec<MotorConfig>,
    /// No clamping when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_relative_target: Option<MaxRelativeTarget>,
    #[serde(default = "default_disable_torque_on_disconnect")]
    pub disable_torque_on_disconnect: bool,
}

fn default_disable_torque_on_disconnect() -> bool {
    true
}

impl ArmConfig {
    pub fn new(id: &str, port: &str, motors: Vec<MotorConfig>) -> ArmConfig {
        ArmConfig {
            id: id.to_owned(),
            port: port.to_owned(),
            motors,
            max_relative_target: None,
            disable_torque_on_disconnect: true,
        }
    }

    pub fn with_max_relative_target(mut self, max_relative_target: MaxRelativeTarget) -> Self {
        self.max_relative_target = Some(max_relative_target);
        self
    }

    pub fn motor_names(&self) -> impl Iterator<Item = &str> {
        self.motors.iter().map(|motor| motor.name.as_str())
    }
}

impl ConfigFile for ArmConfig {
    fn validate(&self) -> Result<()> {
        let motors = check_motors(&self.id, &self.motors)?;
        if let Some(max_relative_target) = &self.max_relative_target {
            max_relative_target
                .check(&motors)
                .map_err(|reason| invalid(&self.id, reason))?;
        }
        Ok(())
    }
}

/// Configuration of one leader arm
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LeaderArmConfig {
    pub id: String,
    pub port: String,
    pub motors: Vec<MotorConfig>,
}

impl LeaderArmConfig {
    pub fn new(id: &str, port: &str, motors: Vec<MotorConfig>) -> LeaderArmConfig {
        LeaderArmConfig {
            id: id.to_owned(),
            port: port.to_owned(),
            motors,
        }
    }
}

impl ConfigFile for LeaderArmConfig {
    fn validate(&self) -> Result<()> {
        check_motors(&self.id, &self.motors)?;
        Ok(())
    }
}

/// Two follower arms, each configured on its own
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DualArmConfig {
    pub left: ArmConfig,
    pub right: ArmConfig,
}

impl DualArmConfig {
    pub fn side(&self, side: Side) -> &ArmConfig {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    /// Default config packaged with the binary
    pub fn included() -> Result<DualArmConfig> {
        DualArmConfig::parse_yaml(include_str!("../config/dual_arm.yaml"))
    }
}

impl ConfigFile for DualArmConfig {
    fn validate(&self) -> Result<()> {
        validate_side(Side::Left, &self.left)?;
        validate_side(Side::Right, &self.right)
    }
}

/// Two leader arms, each configured on its own
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DualLeaderConfig {
    pub left: LeaderArmConfig,
    pub right: LeaderArmConfig,
}

impl DualLeaderConfig {
    pub fn side(&self, side: Side) -> &LeaderArmConfig {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    /// Default config packaged with the binary
    pub fn included() -> Result<DualLeaderConfig> {
        DualLeaderConfig::parse_yaml(include_str!("../config/dual_leader.yaml"))
    }
}

impl ConfigFile for DualLeaderConfig {
    fn validate(&self) -> Result<()> {
        validate_side(Side::Left, &self.left)?;
        validate_side(Side::Right, &self.right)
    }
}

fn validate_side(side: Side, config: &impl ConfigFile) -> Result<()> {
    config.validate().map_err(|error| match error {
        ConfigError::Invalid { arm, reason } => invalid(&format!("{} arm {}", side, arm), reason),
        other => other,
    })
}

fn invalid(arm: &str, reason: String) -> ConfigError {
    ConfigError::Invalid {
        arm: arm.to_owned(),
        reason,
    }
}

fn check_motors<'a>(arm: &str, motors: &'a [MotorConfig]) -> Result<BTreeSet<&'a str>> {
    if arm.is_empty() {
        return Err(invalid("<unnamed>", "arm id is empty".to_owned()));
    }
    if motors.is_empty() {
        return Err(invalid(arm, "no motors configured".to_owned()));
    }
    let mut names = BTreeSet::new();
    let mut ids = BTreeSet::new();
    for motor in motors {
        if motor.name.is_empty() || motor.name.contains('.') {
            return Err(invalid(
                arm,
                format!("motor name {:?} must be non-empty and contain no '.'", motor.name),
            ));
        }
        if !names.insert(motor.name.as_str()) {
            return Err(invalid(arm, format!("duplicate motor name {:?}", motor.name)));
        }
        if !ids.insert(motor.id) {
            return Err(invalid(arm, format!("duplicate motor id {}", motor.id)));
        }
    }
    Ok(names)
}
