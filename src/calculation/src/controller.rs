//! Rigid-body integrator for the kite.
//!
//! One step: smooth the sail forces, integrate the tangential part of the
//! force, let the constraint solver fix bridles, lines and ground, then
//! integrate orientation from the torque.

use log::debug;

use crate::aerodynamics::{AeroForces, AerodynamicsCalculator};
use crate::config::SimConfig;
use crate::constants::model_params::{BridleLengths, ControllerParams, SafetyLimits};
use crate::control::HandlePair;
use crate::error::{ConfigError, NumericFault, Quantity, Stage};
use crate::geometry::Side;
use crate::kite::{KiteBody, KiteState};
use crate::solver::{ConstraintSolver, ControlPoints, SolveReport};
use crate::vector::{Quaternion, Vec3};

/// Outcome of one controller step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StepReport {
    /// Timestep actually integrated (s), after clamping.
    pub dt: f64,
    /// Freshly computed sail forces (not smoothed).
    pub forces: AeroForces,
    pub smoothed_force: Vec3,
    pub smoothed_torque: Vec3,
    pub solve: SolveReport,
}

pub struct KiteController {
    kite: KiteBody,
    points: ControlPoints,
    aero: AerodynamicsCalculator,
    solver: ConstraintSolver,
    params: ControllerParams,
    limits: SafetyLimits,
    gravity: f64,
    smoothed_force: Vec3,
    smoothed_torque: Vec3,
    last_valid: KiteState,
}

impl KiteController {
    /// Validates `config` and builds the kite, aerodynamics and solver from it.
    /// The kite starts at the origin; call [`KiteController::reset`] to place it.
    pub fn new(config: &SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let (geometry, bridles) = config.build_kite()?;
        let mass = config.kite.mass;
        let inertia = config.inertia(&geometry);

        let kite = KiteBody::new(geometry, mass, inertia);
        let solver = ConstraintSolver::new(config.solver, bridles, &config.lines, mass);
        let aero = AerodynamicsCalculator::new(config.physics, config.aero, &config.limits, mass);

        Ok(Self {
            last_valid: kite.state,
            kite,
            points: ControlPoints::default(),
            aero,
            solver,
            params: config.controller,
            limits: config.limits,
            gravity: config.physics.g,
            smoothed_force: Vec3::zero(),
            smoothed_torque: Vec3::zero(),
        })
    }

    pub fn kite(&self) -> &KiteBody {
        &self.kite
    }

    pub fn state(&self) -> &KiteState {
        &self.kite.state
    }

    /// Direct access to the kite state, e.g. to pose the kite by hand.
    pub fn state_mut(&mut self) -> &mut KiteState {
        &mut self.kite.state
    }

    pub fn control_points(&self) -> &ControlPoints {
        &self.points
    }

    pub fn solver(&self) -> &ConstraintSolver {
        &self.solver
    }

    pub fn aerodynamics(&self) -> &AerodynamicsCalculator {
        &self.aero
    }

    pub fn last_valid_state(&self) -> &KiteState {
        &self.last_valid
    }

    pub fn smoothed_force(&self) -> Vec3 {
        self.smoothed_force
    }

    pub fn smoothed_torque(&self) -> Vec3 {
        self.smoothed_torque
    }

    pub fn set_bridle_lengths(&mut self, lengths: BridleLengths, handles: &HandlePair) {
        self.solver.set_bridle_lengths(lengths);
        self.points = self.solver.initialize_control_points(&self.kite, handles);
    }

    pub fn set_line_length(&mut self, length: f64, handles: &HandlePair) {
        self.solver.set_line_length(length);
        self.points = self.solver.initialize_control_points(&self.kite, handles);
    }

    /// Puts the kite at rest downwind of the pilot, facing it, with both
    /// control points on or inside their line spheres and the tighter line
    /// exactly at length (for `initial_distance_factor = 1`). The kite sits
    /// on the ray from the pilot that rises `initial_altitude` over one line
    /// length.
    pub fn reset(&mut self, handles: &HandlePair, downwind: Vec3) {
        let pilot = self.params.pilot_position;
        let downwind = Vec3::new(downwind.x, 0.0, downwind.z).normalized_or(-Vec3::unit_z());

        let line_length = self.solver.line(Side::Left).rest_length;
        let altitude = self.params.initial_altitude.min(line_length);
        let horizontal = (line_length * line_length - altitude * altitude).max(0.0).sqrt();
        let direction = (Vec3::up() * altitude + downwind * horizontal).normalized_or(downwind);

        // Yaw so that the body -Z axis points downwind.
        let heading = downwind.x.atan2(-downwind.z);
        let orientation = Quaternion::from_axis_angle(&Vec3::up(), -heading).unwrap_or_default();

        self.kite.state = KiteState::at_rest(pilot + direction * line_length, orientation);
        let taut = self.taut_distance(pilot, direction, handles);
        let distance = if taut.is_finite() && taut > 0.0 { taut } else { line_length };
        let distance = distance * self.params.initial_distance_factor;
        let position = pilot + direction * distance;

        self.kite.state = KiteState::at_rest(position, orientation);
        self.last_valid = self.kite.state;
        self.smoothed_force = Vec3::zero();
        self.smoothed_torque = Vec3::zero();
        self.points = self.solver.initialize_control_points(&self.kite, handles);
        debug!(
            "kite reset to ({:.2}, {:.2}, {:.2}), {:.2} m from the pilot",
            position.x, position.y, position.z, distance
        );
    }

    /// Distance along `direction` from `pilot` at which the first control
    /// point reaches its line length, keeping the current orientation.
    ///
    /// Solves `|pilot + direction·s + offset - handle| = L` per side, where
    /// `offset` is the control point relative to the kite origin.
    fn taut_distance(&self, pilot: Vec3, direction: Vec3, handles: &HandlePair) -> f64 {
        Side::BOTH
            .into_iter()
            .map(|side| {
                let line_length = self.solver.line(side).rest_length;
                let offset = self.solver.trilaterate_control_point(&self.kite, side) - self.kite.position();
                let from_handle = pilot + offset - handles.get(side);
                let along = direction.dot(&from_handle);
                let discriminant = along * along - from_handle.magnitude_sq() + line_length * line_length;
                if discriminant >= 0.0 {
                    discriminant.sqrt() - along
                } else {
                    line_length
                }
            })
            .fold(f64::INFINITY, f64::min)
    }

    /// Restores the last valid state with zero velocities and re-derives the
    /// control points.
    pub fn rollback(&mut self, handles: &HandlePair) {
        self.kite.state = KiteState::at_rest(self.last_valid.position, self.last_valid.orientation);
        self.last_valid = self.kite.state;
        if !self.smoothed_force.is_finite() || !self.smoothed_torque.is_finite() {
            self.smoothed_force = Vec3::zero();
            self.smoothed_torque = Vec3::zero();
        }
        self.points = self.solver.initialize_control_points(&self.kite, handles);
    }

    /// Advances the kite by `dt` (clamped to `max_dt`).
    ///
    /// On error the kite is left in the faulty state; the caller decides
    /// whether to [`rollback`](KiteController::rollback).
    pub fn step(&mut self, dt: f64, apparent_wind: Vec3, handles: &HandlePair) -> Result<StepReport, NumericFault> {
        let dt = if dt.is_finite() { dt.clamp(0.0, self.params.max_dt) } else { 0.0 };
        let forces = self
            .aero
            .compute_forces(apparent_wind, self.kite.orientation(), self.kite.geometry().surfaces());
        if dt <= 0.0 {
            return Ok(StepReport {
                dt,
                forces,
                smoothed_force: self.smoothed_force,
                smoothed_torque: self.smoothed_torque,
                solve: SolveReport::default(),
            });
        }

        // 1. smoothing
        let (target_force, target_torque) = if forces.is_calm() {
            (Vec3::new(0.0, -self.kite.mass * self.gravity, 0.0), Vec3::zero())
        } else {
            (forces.total(), forces.torque)
        };
        let alpha = 1.0 - (-self.params.force_smoothing_rate * dt).exp();
        self.smoothed_force += (target_force.clamp_magnitude(self.limits.max_force) - self.smoothed_force) * alpha;
        self.smoothed_torque += (target_torque - self.smoothed_torque) * alpha;

        // 2-3. tangential integration
        self.integrate_linear(dt, handles.midpoint());
        self.kite.state.check_finite(Stage::Integration)?;

        // 4. constraints
        let solve = self.solver.solve(&mut self.kite, &mut self.points, handles, dt)?;
        self.clamp_velocities();

        // 5. orientation
        self.integrate_angular(dt)?;

        // 6. validation
        self.kite.state.check_finite(Stage::Validation)?;
        self.last_valid = self.kite.state;

        Ok(StepReport {
            dt,
            forces,
            smoothed_force: self.smoothed_force,
            smoothed_torque: self.smoothed_torque,
            solve,
        })
    }

    /// Radial force goes to the lines; only the tangential part accelerates.
    fn integrate_linear(&mut self, dt: f64, pilot: Vec3) {
        let force = self.smoothed_force;
        let tangential = match (self.kite.position() - pilot).normalized() {
            Some(radial) => force - radial * force.dot(&radial),
            None => force,
        };
        let acceleration = (tangential * self.kite.inv_mass()).clamp_magnitude(self.limits.max_acceleration);

        let state = &mut self.kite.state;
        state.velocity += acceleration * dt;
        state.velocity *= (-self.params.linear_damping * dt).exp();
        state.velocity = state.velocity.clamp_magnitude(self.limits.max_velocity);
        state.position += state.velocity * dt;
    }

    /// Constraint impulses can push the kite past the safety ceilings.
    fn clamp_velocities(&mut self) {
        let state = &mut self.kite.state;
        state.velocity = state.velocity.clamp_magnitude(self.limits.max_velocity);
        state.angular_velocity = state.angular_velocity.clamp_magnitude(self.limits.max_angular_velocity);
    }

    fn integrate_angular(&mut self, dt: f64) -> Result<(), NumericFault> {
        let inertia = self.kite.inertia;
        let state = &mut self.kite.state;

        let damping = state.angular_velocity * (-self.params.angular_damping * inertia);
        let angular_acceleration =
            ((self.smoothed_torque + damping) / inertia).clamp_magnitude(self.limits.max_angular_acceleration);
        state.angular_velocity += angular_acceleration * dt;
        state.angular_velocity = state.angular_velocity.clamp_magnitude(self.limits.max_angular_velocity);

        state.orientation = state
            .orientation
            .integrated(&state.angular_velocity, dt)
            .ok_or(NumericFault::new(Stage::Orientation, Quantity::Orientation))?;
        Ok(())
    }
}
