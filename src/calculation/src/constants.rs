//! Physical constants and model parameters for the kite simulation.
//!
//! Every tunable number of the simulation lives in one of the structs below.
//! They are plain immutable values gathered into [`crate::config::SimConfig`]
//! and handed to the solver, controller and aerodynamics constructors.

use serde::{Deserialize, Serialize};

/// Global physical constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constants {
    /// Gravitational acceleration (m/s²)
    pub g: f64,

    /// Air density (kg/m³)
    /// Standard value: 1.225 kg/m³ at 15°C, sea level
    pub rho_air: f64,
}

impl Constants {
    /// Sea-level standard atmosphere.
    pub const fn standard() -> Self {
        Self { g: 9.81, rho_air: 1.225 }
    }

    /// Mountain flying site, roughly 2000 m above sea level.
    pub const fn high_altitude() -> Self {
        Self { g: 9.80, rho_air: 1.007 }
    }

    /// Dynamic pressure ½ρv² for an airspeed `v` (Pa).
    #[inline(always)]
    pub fn dynamic_pressure(&self, v: f64) -> f64 {
        0.5 * self.rho_air * v * v
    }
}

impl Default for Constants {
    fn default() -> Self {
        Self::standard()
    }
}

/// Model-specific parameters and tuning constants.
pub mod model_params {
    use serde::{Deserialize, Serialize};

    use crate::solver::ControlPointModel;
    use crate::vector::Vec3;

    /// Physical properties of the kite body.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct KiteParams {
        /// Total mass (kg)
        pub mass: f64,
        /// Isotropic moment of inertia (kg·m²). Derived from mass and span when unset.
        pub inertia: Option<f64>,
        /// Optional custom anchor table, point name → body-local position (m).
        pub points: Option<std::collections::BTreeMap<String, Vec3>>,
    }

    impl Default for KiteParams {
        fn default() -> Self {
            Self { mass: 0.31, inertia: None, points: None }
        }
    }

    /// Rest lengths of the bridle segments (m), shared by both sides.
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct BridleLengths {
        pub nose: f64,
        pub inter: f64,
        pub center: f64,
    }

    impl BridleLengths {
        pub const fn uniform(length: f64) -> Self {
            Self { nose: length, inter: length, center: length }
        }

        pub fn mean(&self) -> f64 {
            (self.nose + self.inter + self.center) / 3.0
        }

        pub fn to_array(&self) -> [f64; 3] {
            [self.nose, self.inter, self.center]
        }
    }

    impl Default for BridleLengths {
        fn default() -> Self {
            Self::uniform(0.65)
        }
    }

    /// Names of the kite anchors each bridle is tied to.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct BridleAttachments {
        pub nose: String,
        pub inter_left: String,
        pub inter_right: String,
        pub center: String,
    }

    impl Default for BridleAttachments {
        fn default() -> Self {
            Self {
                nose: "NOSE".to_string(),
                inter_left: "LEFT_LEADING_INTER".to_string(),
                inter_right: "RIGHT_LEADING_INTER".to_string(),
                center: "CENTER".to_string(),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
    #[serde(default)]
    pub struct BridleParams {
        pub lengths: BridleLengths,
        pub attachments: BridleAttachments,
    }

    /// Control lines, identical on both sides.
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct LineParams {
        /// Rest length (m)
        pub length: f64,
        /// Axial stiffness (N/m), used for the tension readout only
        pub stiffness: f64,
    }

    impl Default for LineParams {
        fn default() -> Self {
            Self { length: 15.0, stiffness: 25_000.0 }
        }
    }

    /// Ambient wind.
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct WindParams {
        /// Mean wind speed (km/h)
        pub speed_kmh: f64,
        /// Azimuth of the wind vector (deg); 0 blows along -Z, away from the pilot
        pub direction_deg: f64,
        /// Turbulence intensity as a fraction of the mean speed (0-1)
        pub turbulence: f64,
    }

    impl Default for WindParams {
        fn default() -> Self {
            Self { speed_kmh: 18.0, direction_deg: 0.0, turbulence: 0.05 }
        }
    }

    /// Surface coefficient model and aerodynamic gains.
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct AeroParams {
        /// Gain applied to every lift vector
        pub lift_scale: f64,
        /// Gain applied to every drag vector
        pub drag_scale: f64,
        /// Apparent wind speed below which no aerodynamic force is produced (m/s)
        pub min_wind_speed: f64,
        /// Peak lift coefficient, reached at the stall angle
        pub cl_max: f64,
        /// Stall incidence (deg)
        pub stall_angle_deg: f64,
        /// Fraction of `cl_max` lost between stall and 90°
        pub post_stall_lift_decay: f64,
        /// Zero-incidence drag coefficient
        pub cd0: f64,
        /// Induced drag factor, CD = cd0 + k·CL² before stall
        pub cd_induced: f64,
        /// Flat-plate drag coefficient at 90°
        pub cd_max: f64,
    }

    impl Default for AeroParams {
        fn default() -> Self {
            Self {
                lift_scale: 1.0,
                drag_scale: 1.0,
                min_wind_speed: 0.1,
                cl_max: 1.2,
                stall_angle_deg: 25.0,
                post_stall_lift_decay: 1.0,
                cd0: 0.08,
                cd_induced: 0.25,
                cd_max: 1.28,
            }
        }
    }

    /// Position-based constraint solver settings.
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct SolverParams {
        /// Gauss-Seidel passes per step
        pub iterations: usize,
        /// Largest correction per pass, as a fraction of the constraint rest length
        pub max_correction_ratio: f64,
        pub control_point_model: ControlPointModel,
        /// Control point mass as a fraction of kite mass (weighted model only)
        pub control_point_mass_ratio: f64,
        /// Lowest allowed height for any kite point (m)
        pub ground_min_height: f64,
        /// Horizontal velocity factor applied on ground contact (0-1)
        pub ground_friction: f64,
        /// Velocities below this magnitude are snapped to zero on the ground (m/s)
        pub velocity_snap: f64,
    }

    impl Default for SolverParams {
        fn default() -> Self {
            Self {
                iterations: 6,
                max_correction_ratio: 0.3,
                control_point_model: ControlPointModel::Geometric,
                control_point_mass_ratio: 0.01,
                ground_min_height: 0.05,
                ground_friction: 0.85,
                velocity_snap: 1e-3,
            }
        }
    }

    /// Rigid-body integrator settings and the reset pose.
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct ControllerParams {
        /// Timestep ceiling (s)
        pub max_dt: f64,
        /// Rate of the exponential force/torque smoothing (1/s)
        pub force_smoothing_rate: f64,
        /// Exponential linear velocity damping (1/s)
        pub linear_damping: f64,
        /// Angular damping (1/s); damping torque is -c·I·ω
        pub angular_damping: f64,
        /// Pilot position (world, m)
        pub pilot_position: Vec3,
        /// Kite height above the pilot after a reset (m)
        pub initial_altitude: f64,
        /// Kite distance from the pilot after a reset, as a fraction of the
        /// distance at which the tighter line is just taut
        pub initial_distance_factor: f64,
    }

    impl Default for ControllerParams {
        fn default() -> Self {
            Self {
                max_dt: 1.0 / 60.0,
                force_smoothing_rate: 20.0,
                linear_damping: 0.1,
                angular_damping: 2.0,
                pilot_position: Vec3::zero(),
                initial_altitude: 7.0,
                initial_distance_factor: 1.0,
            }
        }
    }

    /// Numerical safety ceilings.
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct SafetyLimits {
        /// N
        pub max_force: f64,
        /// m/s
        pub max_velocity: f64,
        /// m/s²
        pub max_acceleration: f64,
        /// N·m
        pub max_torque: f64,
        /// rad/s
        pub max_angular_velocity: f64,
        /// rad/s²
        pub max_angular_acceleration: f64,
    }

    impl Default for SafetyLimits {
        fn default() -> Self {
            Self {
                max_force: 1000.0,
                max_velocity: 30.0,
                max_acceleration: 100.0,
                max_torque: 20.0,
                max_angular_velocity: 25.0,
                max_angular_acceleration: 200.0,
            }
        }
    }

    /// Control bar held by the pilot.
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct BarParams {
        /// Distance between the two handles (m)
        pub width: f64,
        /// Bar yaw at full rotation input (deg)
        pub max_rotation_deg: f64,
    }

    impl Default for BarParams {
        fn default() -> Self {
            Self { width: 0.6, max_rotation_deg: 30.0 }
        }
    }
}
