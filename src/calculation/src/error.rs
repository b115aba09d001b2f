//! Error types.
//!
//! Two families: [`NumericFault`] is recoverable and is turned into a state
//! rollback by the per-frame driver; [`ConfigError`] is a programmer or
//! configuration mistake and stops initialization.

use std::fmt;

use thiserror::Error;

use crate::geometry::{KitePoint, Side};

/// Phase of a simulation step in which a fault was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Integration,
    Constraint,
    Orientation,
    Validation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Integration => "linear integration",
            Stage::Constraint => "constraint solve",
            Stage::Orientation => "orientation integration",
            Stage::Validation => "final validation",
        };
        f.write_str(name)
    }
}

/// State quantity that went non-finite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Position,
    Velocity,
    Orientation,
    AngularVelocity,
    ControlPoint(Side),
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantity::Position => f.write_str("kite position"),
            Quantity::Velocity => f.write_str("kite velocity"),
            Quantity::Orientation => f.write_str("kite orientation"),
            Quantity::AngularVelocity => f.write_str("kite angular velocity"),
            Quantity::ControlPoint(side) => write!(f, "{side} control point"),
        }
    }
}

/// NaN or infinity detected in the simulated state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("non-finite {quantity} during {stage}")]
pub struct NumericFault {
    pub stage: Stage,
    pub quantity: Quantity,
}

impl NumericFault {
    pub fn new(stage: Stage, quantity: Quantity) -> Self {
        Self { stage, quantity }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown kite anchor point `{0}`")]
    UnknownAnchor(String),

    #[error("kite geometry is missing required anchor {0}")]
    MissingAnchor(KitePoint),

    #[error("invalid {field}: {value}")]
    InvalidParameter { field: &'static str, value: f64 },

    #[error("surface {index} has zero area")]
    DegenerateSurface { index: usize },

    #[error("bridle lengths {lengths:?} cannot meet on the {side} side")]
    InfeasibleBridles { side: Side, lengths: [f64; 3] },

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Fails with [`ConfigError::InvalidParameter`] unless `value` is finite and > 0.
pub(crate) fn require_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter { field, value })
    }
}

/// Fails with [`ConfigError::InvalidParameter`] unless `value` is finite and
/// within `[min, max]`.
pub(crate) fn require_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), ConfigError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter { field, value })
    }
}
