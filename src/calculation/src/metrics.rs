//! Flight telemetry recording and summary statistics.
//!
//! A [`FlightLog`] collects one row per simulated frame from the kite
//! snapshots and exposes them as an `ndarray` matrix, so that whole columns
//! (speed, altitude, tension) can be reduced at once for the summary.

use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::simulation::KiteSnapshot;

/// Column order of [`FlightLog::to_array`].
pub const COLUMNS: [&str; 9] = [
    "time",
    "x",
    "y",
    "z",
    "speed",
    "altitude",
    "tension_left",
    "tension_right",
    "max_error",
];

const TIME: usize = 0;
const SPEED: usize = 4;
const ALTITUDE: usize = 5;
const TENSION_LEFT: usize = 6;
const TENSION_RIGHT: usize = 7;
const MAX_ERROR: usize = 8;

/// Row-major per-frame telemetry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlightLog {
    data: Vec<f64>,
    /// Altitude reference (pilot height), m
    ground: f64,
}

impl FlightLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log measuring altitude above `ground` instead of y = 0.
    pub fn with_ground(ground: f64) -> Self {
        Self { data: Vec::new(), ground }
    }

    pub fn record(&mut self, snapshot: &KiteSnapshot) {
        let p = snapshot.position;
        self.data.extend_from_slice(&[
            snapshot.time,
            p.x,
            p.y,
            p.z,
            snapshot.velocity.magnitude(),
            p.y - self.ground,
            snapshot.tensions[0],
            snapshot.tensions[1],
            snapshot.diagnostics.max_error,
        ]);
    }

    pub fn len(&self) -> usize {
        self.data.len() / COLUMNS.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// `len() × COLUMNS.len()` matrix, columns as in [`COLUMNS`].
    pub fn to_array(&self) -> Array2<f64> {
        let width = COLUMNS.len();
        Array2::from_shape_fn((self.len(), width), |(row, col)| self.data[row * width + col])
    }

    /// One column by name, `None` for unknown names.
    pub fn column(&self, name: &str) -> Option<Array1<f64>> {
        let index = COLUMNS.iter().position(|&c| c == name)?;
        Some(self.to_array().column(index).to_owned())
    }

    /// Reduces the log to its summary. Fails on an empty log.
    pub fn summary(&self, faults: u64) -> Result<FlightSummary, &'static str> {
        if self.is_empty() {
            return Err("Need at least one recorded frame");
        }
        let table = self.to_array();
        let col = |index: usize| table.column(index);

        let time = col(TIME);
        let tensions = table.select(Axis(1), &[TENSION_LEFT, TENSION_RIGHT]);

        Ok(FlightSummary {
            frames: self.len(),
            duration: time[time.len() - 1] - time[0],
            max_speed: max(col(SPEED)),
            mean_speed: col(SPEED).mean().unwrap_or(0.0),
            min_altitude: min(col(ALTITUDE)),
            max_altitude: max(col(ALTITUDE)),
            mean_tension: tensions.mean().unwrap_or(0.0),
            max_tension: tensions.fold(0.0, |acc: f64, &t| acc.max(t)),
            worst_constraint_error: max(col(MAX_ERROR)),
            faults,
        })
    }
}

fn max(values: ArrayView1<f64>) -> f64 {
    values.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v))
}

fn min(values: ArrayView1<f64>) -> f64 {
    values.fold(f64::INFINITY, |acc, &v| acc.min(v))
}

/// Aggregate statistics of a recorded flight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightSummary {
    pub frames: usize,
    /// s
    pub duration: f64,
    /// m/s
    pub max_speed: f64,
    pub mean_speed: f64,
    /// m
    pub min_altitude: f64,
    pub max_altitude: f64,
    /// Mean over both lines (N).
    pub mean_tension: f64,
    pub max_tension: f64,
    /// Largest residual constraint excess seen (m).
    pub worst_constraint_error: f64,
    /// Rolled-back frames.
    pub faults: u64,
}
