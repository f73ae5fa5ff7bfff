#![doc = include_str!("../../README.md")]

pub mod arm_config;
pub mod arm_driver;
pub mod dual_follower;
pub mod dual_leader;
pub mod error;
pub mod namespace;
pub mod safety;
pub mod simulated;

pub use error::{DeviceError, Result};
