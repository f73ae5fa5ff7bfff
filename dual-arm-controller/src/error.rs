use crate::arm_config::ConfigError;
use crate::namespace::Side;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("{0} is not connected")]
    NotConnected(String),
    #[error("{0} is already connected")]
    AlreadyConnected(String),
    #[error("{0} is not calibrated")]
    NotCalibrated(String),
    #[error("{device} has no motor named {motor:?}")]
    UnknownMotor { device: String, motor: String },
    #[error("failed when talking to arm")]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("present position of joint {0:?} missing from snapshot")]
    MissingPresentPosition(String),
    #[error("no max relative target configured for joint {0:?}")]
    MissingClampBound(String),
    #[error("max relative target of joint {joint:?} must be finite and non-negative, got {bound}")]
    InvalidClampBound { joint: String, bound: f32 },
    #[error("joint {joint:?} has a non-finite position (goal {goal}, present {present})")]
    NonFinitePosition {
        joint: String,
        goal: f32,
        present: f32,
    },
    #[error("motor {0:?} is commanded more than once")]
    DuplicateMotor(String),
    #[error("{side} arm failed to {operation}")]
    Side {
        side: Side,
        operation: &'static str,
        #[source]
        source: Box<DeviceError>,
    },
    #[error("both arms failed to {operation} (left: {left}, right: {right})")]
    BothSides {
        operation: &'static str,
        left: Box<DeviceError>,
        right: Box<DeviceError>,
    },
}

pub type Result<T> = std::result::Result<T, DeviceError>;

impl DeviceError {
    /// Attach the side and the operation that failed
    pub fn on_side(self, side: Side, operation: &'static str) -> DeviceError {
        DeviceError::Side {
            side,
            operation,
            source: Box::new(self),
        }
    }

    /// Sides this error originated from
    ///
    /// Empty for errors raised by a single arm that were never wrapped by a composite.
    pub fn failed_sides(&self) -> Vec<Side> {
        match self {
            DeviceError::Side { side, .. } => vec![*side],
            DeviceError::BothSides { .. } => vec![Side::Left, Side::Right],
            _ => Vec::new(),
        }
    }
}

/// Report the outcome of an operation that was attempted on both sides.
///
/// Neither side is rolled back when the other one fails.
pub(crate) fn combine_sides(
    operation: &'static str,
    left: Result<()>,
    right: Result<()>,
) -> Result<()> {
    match (left, right) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(left), Ok(())) => Err(left.on_side(Side::Left, operation)),
        (Ok(()), Err(right)) => Err(right.on_side(Side::Right, operation)),
        (Err(left), Err(right)) => Err(DeviceError::BothSides {
            operation,
            left: Box::new(left),
            right: Box::new(right),
        }),
    }
}
