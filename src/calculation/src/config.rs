//! Simulation configuration: one immutable aggregate of every parameter group,
//! loadable from YAML and validated once before a simulation is built.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::model_params::{
    AeroParams, BarParams, BridleLengths, BridleParams, ControllerParams, KiteParams, LineParams, SafetyLimits,
    SolverParams, WindParams,
};
use crate::constants::Constants;
use crate::error::{require_positive, require_range, ConfigError};
use crate::geometry::{BridleSet, KiteGeometry};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub physics: Constants,
    pub kite: KiteParams,
    pub bridles: BridleParams,
    pub lines: LineParams,
    pub wind: WindParams,
    pub aero: AeroParams,
    pub solver: SolverParams,
    pub controller: ControllerParams,
    pub limits: SafetyLimits,
    pub bar: BarParams,
}

impl SimConfig {
    /// Parses a YAML document. Missing groups and fields keep their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Checks every numeric parameter and builds the kite geometry and bridle
    /// layout once, so that bad anchor names or infeasible bridles surface
    /// here.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.physics;
        require_positive("physics.g", p.g)?;
        require_positive("physics.rho_air", p.rho_air)?;

        require_positive("kite.mass", self.kite.mass)?;
        if let Some(inertia) = self.kite.inertia {
            require_positive("kite.inertia", inertia)?;
        }

        validate_bridle_lengths(&self.bridles.lengths)?;
        require_positive("lines.length", self.lines.length)?;
        require_range("lines.stiffness", self.lines.stiffness, 0.0, f64::MAX)?;

        require_range("wind.speed_kmh", self.wind.speed_kmh, 0.0, f64::MAX)?;
        require_range("wind.direction_deg", self.wind.direction_deg, -360.0, 360.0)?;
        require_range("wind.turbulence", self.wind.turbulence, 0.0, 1.0)?;

        let a = &self.aero;
        require_range("aero.lift_scale", a.lift_scale, 0.0, f64::MAX)?;
        require_range("aero.drag_scale", a.drag_scale, 0.0, f64::MAX)?;
        require_positive("aero.min_wind_speed", a.min_wind_speed)?;
        require_positive("aero.cl_max", a.cl_max)?;
        require_range("aero.stall_angle_deg", a.stall_angle_deg, 1.0, 89.0)?;
        require_range("aero.post_stall_lift_decay", a.post_stall_lift_decay, 0.0, f64::MAX)?;
        require_range("aero.cd0", a.cd0, 0.0, f64::MAX)?;
        require_range("aero.cd_induced", a.cd_induced, 0.0, f64::MAX)?;
        require_range("aero.cd_max", a.cd_max, a.cd0, f64::MAX)?;

        let s = &self.solver;
        if s.iterations == 0 {
            return Err(ConfigError::InvalidParameter { field: "solver.iterations", value: 0.0 });
        }
        require_range("solver.max_correction_ratio", s.max_correction_ratio, f64::MIN_POSITIVE, 1.0)?;
        require_positive("solver.control_point_mass_ratio", s.control_point_mass_ratio)?;
        require_range("solver.ground_min_height", s.ground_min_height, f64::MIN, f64::MAX)?;
        require_range("solver.ground_friction", s.ground_friction, 0.0, 1.0)?;
        require_range("solver.velocity_snap", s.velocity_snap, 0.0, f64::MAX)?;

        let c = &self.controller;
        require_positive("controller.max_dt", c.max_dt)?;
        require_positive("controller.force_smoothing_rate", c.force_smoothing_rate)?;
        require_range("controller.linear_damping", c.linear_damping, 0.0, f64::MAX)?;
        require_range("controller.angular_damping", c.angular_damping, 0.0, f64::MAX)?;
        if !c.pilot_position.is_finite() {
            return Err(ConfigError::InvalidParameter { field: "controller.pilot_position", value: f64::NAN });
        }
        require_range("controller.initial_altitude", c.initial_altitude, 0.0, f64::MAX)?;
        require_range("controller.initial_distance_factor", c.initial_distance_factor, f64::MIN_POSITIVE, 1.0)?;

        let l = &self.limits;
        require_positive("limits.max_force", l.max_force)?;
        require_positive("limits.max_velocity", l.max_velocity)?;
        require_positive("limits.max_acceleration", l.max_acceleration)?;
        require_positive("limits.max_torque", l.max_torque)?;
        require_positive("limits.max_angular_velocity", l.max_angular_velocity)?;
        require_positive("limits.max_angular_acceleration", l.max_angular_acceleration)?;

        require_positive("bar.width", self.bar.width)?;
        require_range("bar.max_rotation_deg", self.bar.max_rotation_deg, 0.0, 90.0)?;

        self.build_kite().map(|_| ())
    }

    /// Kite geometry (custom point table or the standard delta) and the
    /// bridle layout on it.
    pub fn build_kite(&self) -> Result<(KiteGeometry, BridleSet), ConfigError> {
        let geometry = match &self.kite.points {
            Some(table) => KiteGeometry::from_table(table)?,
            None => KiteGeometry::delta(),
        };
        let bridles = BridleSet::from_params(&self.bridles)?;
        bridles.check_feasible(&geometry)?;
        Ok((geometry, bridles))
    }

    /// Configured inertia, or the thin-plate estimate for `geometry`.
    pub fn inertia(&self, geometry: &KiteGeometry) -> f64 {
        self.kite
            .inertia
            .unwrap_or_else(|| geometry.default_inertia(self.kite.mass))
    }
}

pub(crate) fn validate_bridle_lengths(lengths: &BridleLengths) -> Result<(), ConfigError> {
    require_positive("bridles.lengths.nose", lengths.nose)?;
    require_positive("bridles.lengths.inter", lengths.inter)?;
    require_positive("bridles.lengths.center", lengths.center)
}
