//! Flight simulation core for a two-line delta kite.
//!
//! This library provides:
//! - 3D vector and quaternion math
//! - Analytic trilateration of the bridle control points
//! - Per-surface aerodynamic forces with a stall model
//! - A position-based constraint solver for bridles, lines and ground contact
//! - The rigid-body controller and the per-frame simulation driver
//! - Flight telemetry and summary statistics
//!
//! # Conventions
//!
//! World frame: +Y up, pilot at the origin, default wind towards -Z. Body
//! frame: +X towards the right wing tip, +Y along the spine towards the nose,
//! +Z out of the sail on the bridle side.

#![allow(clippy::new_without_default)]

pub mod aerodynamics;
pub mod config;
pub mod constants;
pub mod constraints;
pub mod control;
pub mod controller;
pub mod error;
pub mod flight_sphere;
pub mod geometry;
pub mod kite;
pub mod metrics;
pub mod simulation;
pub mod solver;
pub mod trilateration;
pub mod vector;
pub mod wind;

// Re-export key types and functions for easy use
pub use aerodynamics::{AeroForces, AerodynamicsCalculator, CoefficientModel, StallPolynomial};
pub use config::SimConfig;
pub use constants::Constants;
pub use control::{ControlBar, ControlInput, HandlePair};
pub use controller::{KiteController, StepReport};
pub use error::{ConfigError, NumericFault};
pub use flight_sphere::{FlightSphere, FlightZone};
pub use geometry::{BridleSet, KiteGeometry, KitePoint, Side};
pub use metrics::{FlightLog, FlightSummary};
pub use simulation::{KiteSnapshot, Simulation, UpdateStatus};
pub use solver::{ConstraintSolver, ControlPointModel};
pub use trilateration::trilaterate_3d;
pub use vector::{Quaternion, Vec3};
pub use wind::{SteadyWind, WindModel};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
