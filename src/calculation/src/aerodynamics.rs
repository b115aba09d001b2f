//! Per-surface aerodynamic force model for the kite sail.
//!
//! Each triangular panel is treated as a flat plate. Its incidence to the
//! apparent wind selects lift and drag coefficients from a polynomial model
//! with a stall region; forces act at the panel centroid. Weight is spread
//! over the panels by area so that pitch and roll moments from gravity come
//! out of the same torque sum as the aerodynamic ones. Turning is not
//! scripted: it follows from the asymmetric panel forces alone.

use std::f64::consts::FRAC_PI_2;

use crate::constants::model_params::{AeroParams, SafetyLimits};
use crate::constants::Constants;
use crate::geometry::{Side, Surface};
use crate::vector::{Quaternion, Vec3};

/// Lift/drag coefficients as a function of incidence.
pub trait CoefficientModel {
    /// `(cl, cd)` for an incidence `alpha` in radians, `0 ≤ alpha ≤ π/2`.
    fn coefficients(&self, alpha: f64) -> (f64, f64);
}

/// Quadratic rise to `cl_max` at the stall angle, quadratic decay after it.
/// Drag follows an induced-drag polar before stall and climbs towards the
/// flat-plate value past it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StallPolynomial {
    cl_max: f64,
    stall_angle: f64,
    post_stall_lift_decay: f64,
    cd0: f64,
    cd_induced: f64,
    cd_max: f64,
}

impl StallPolynomial {
    pub fn from_params(params: &AeroParams) -> Self {
        Self {
            cl_max: params.cl_max,
            stall_angle: params.stall_angle_deg.to_radians().clamp(1e-3, FRAC_PI_2 - 1e-3),
            post_stall_lift_decay: params.post_stall_lift_decay,
            cd0: params.cd0,
            cd_induced: params.cd_induced,
            cd_max: params.cd_max,
        }
    }

    pub fn stall_angle(&self) -> f64 {
        self.stall_angle
    }

    fn cd_at_stall(&self) -> f64 {
        self.cd0 + self.cd_induced * self.cl_max * self.cl_max
    }
}

impl CoefficientModel for StallPolynomial {
    fn coefficients(&self, alpha: f64) -> (f64, f64) {
        let alpha = alpha.clamp(0.0, FRAC_PI_2);
        if alpha < self.stall_angle {
            let u = alpha / self.stall_angle;
            let cl = self.cl_max * (2.0 * u - u * u);
            (cl, self.cd0 + self.cd_induced * cl * cl)
        } else {
            let s = (alpha - self.stall_angle) / (FRAC_PI_2 - self.stall_angle);
            let cl = (self.cl_max * (1.0 - self.post_stall_lift_decay * s * s)).max(0.0);
            let cd_stall = self.cd_at_stall();
            (cl, cd_stall + (self.cd_max - cd_stall) * (2.0 * s - s * s))
        }
    }
}

/// Forces on one panel, world frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceForces {
    pub side: Side,
    /// Centroid relative to the kite body origin (rotated, not translated).
    pub centroid: Vec3,
    pub normal: Vec3,
    /// rad
    pub incidence: f64,
    pub cl: f64,
    pub cd: f64,
    pub lift: Vec3,
    pub drag: Vec3,
    pub gravity: Vec3,
}

/// Result of one aerodynamic evaluation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AeroForces {
    pub lift: Vec3,
    pub drag: Vec3,
    pub gravity: Vec3,
    /// About the kite body origin, clamped to the torque limit.
    pub torque: Vec3,
    pub per_surface: Vec<SurfaceForces>,
    /// Apparent wind speed used (m/s)
    pub airspeed: f64,
}

impl AeroForces {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn total(&self) -> Vec3 {
        self.lift + self.drag + self.gravity
    }

    /// True when the wind was below threshold and no force was computed.
    pub fn is_calm(&self) -> bool {
        self.per_surface.is_empty()
    }

    /// Lift + drag on the panels of one side.
    pub fn side_force(&self, side: Side) -> Vec3 {
        self.per_surface
            .iter()
            .filter(|s| s.side == side)
            .map(|s| s.lift + s.drag)
            .sum()
    }
}

/// Stateless evaluator of the sail forces.
#[derive(Debug, Clone, PartialEq)]
pub struct AerodynamicsCalculator<M: CoefficientModel = StallPolynomial> {
    constants: Constants,
    params: AeroParams,
    max_torque: f64,
    mass: f64,
    model: M,
}

impl AerodynamicsCalculator<StallPolynomial> {
    pub fn new(constants: Constants, params: AeroParams, limits: &SafetyLimits, mass: f64) -> Self {
        Self::with_model(constants, params, limits, mass, StallPolynomial::from_params(&params))
    }
}

impl<M: CoefficientModel> AerodynamicsCalculator<M> {
    pub fn with_model(constants: Constants, params: AeroParams, limits: &SafetyLimits, mass: f64, model: M) -> Self {
        Self {
            constants,
            params,
            max_torque: limits.max_torque,
            mass,
            model,
        }
    }

    pub fn params(&self) -> &AeroParams {
        &self.params
    }

    /// Lift, drag, distributed weight and torque on the sail.
    ///
    /// Below `min_wind_speed` everything is zero and `per_surface` is empty.
    pub fn compute_forces(&self, apparent_wind: Vec3, orientation: Quaternion, surfaces: &[Surface]) -> AeroForces {
        let airspeed = apparent_wind.magnitude();
        if airspeed < self.params.min_wind_speed || !airspeed.is_finite() {
            return AeroForces::zero();
        }
        let wind_dir = apparent_wind / airspeed;
        let q = self.constants.dynamic_pressure(airspeed);

        let total_area: f64 = surfaces.iter().map(|s| s.area).sum();
        let weight = self.mass * self.constants.g;

        let mut result = AeroForces {
            airspeed,
            per_surface: Vec::with_capacity(surfaces.len()),
            ..AeroForces::default()
        };
        let mut aero_torque = Vec3::zero();
        let mut gravity_torque = Vec3::zero();

        // Fixed iteration order keeps the sums reproducible.
        for surface in surfaces {
            let normal = orientation.rotate(&surface.normal);
            let centroid = orientation.rotate(&surface.centroid);

            let sin_alpha = wind_dir.dot(&normal).abs().min(1.0);
            let alpha = sin_alpha.asin();
            let (cl, cd) = self.model.coefficients(alpha);

            // Normal on the downwind face: the side the pressure pushes towards.
            let facing = if normal.dot(&wind_dir) < 0.0 { -normal } else { normal };
            let lift_dir = (facing - wind_dir * facing.dot(&wind_dir)).normalized_or(facing);

            let lift = lift_dir * (q * surface.area * cl);
            let drag = wind_dir * (q * surface.area * cd);
            let share = if total_area > 0.0 { surface.area / total_area } else { 0.0 };
            let gravity = Vec3::new(0.0, -weight * share, 0.0);

            aero_torque += centroid.cross(&(lift + drag));
            gravity_torque += centroid.cross(&gravity);

            let lift = lift * self.params.lift_scale;
            let drag = drag * self.params.drag_scale;
            result.lift += lift;
            result.drag += drag;
            result.gravity += gravity;
            result.per_surface.push(SurfaceForces {
                side: surface.side,
                centroid,
                normal,
                incidence: alpha,
                cl,
                cd,
                lift,
                drag,
                gravity,
            });
        }

        let aero_gain = 0.5 * (self.params.lift_scale + self.params.drag_scale);
        result.torque = (aero_torque * aero_gain + gravity_torque).clamp_magnitude(self.max_torque);
        result
    }
}
