//! Per-frame driver: polls the wind and the control input, steps the
//! controller and owns the recovery policy for numeric faults.

use log::{info, trace, warn};

use crate::aerodynamics::SurfaceForces;
use crate::config::{validate_bridle_lengths, SimConfig};
use crate::constants::model_params::{BridleLengths, WindParams};
use crate::control::{ControlBar, ControlInput, HandlePair};
use crate::controller::{KiteController, StepReport};
use crate::error::{require_positive, require_range, ConfigError, NumericFault};
use crate::flight_sphere::{FlightSphere, FlightZone};
use crate::geometry::{BridleSet, Side};
use crate::solver::ConstraintDiagnostics;
use crate::vector::{Quaternion, Vec3};
use crate::wind::{SteadyWind, WindModel};

/// What [`Simulation::update`] did with the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    Stepped,
    /// The step produced a non-finite state and was undone.
    RolledBack(NumericFault),
}

/// Read-only view of one frame for rendering and telemetry.
#[derive(Debug, Clone, PartialEq)]
pub struct KiteSnapshot {
    /// Simulated time (s)
    pub time: f64,
    pub position: Vec3,
    pub orientation: Quaternion,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    /// Left, right
    pub control_points: [Vec3; 2],
    pub handles: HandlePair,
    pub apparent_wind: Vec3,
    /// Per-panel lift and drag with centroids, empty in calm air.
    pub surfaces: Vec<SurfaceForces>,
    /// Left, right (N)
    pub tensions: [f64; 2],
    pub zone: FlightZone,
    pub diagnostics: ConstraintDiagnostics,
}

pub struct Simulation<W: WindModel = SteadyWind, C: ControlInput = ControlBar> {
    config: SimConfig,
    controller: KiteController,
    wind: W,
    control: C,
    sphere: FlightSphere,
    handles: HandlePair,
    apparent_wind: Vec3,
    last_report: StepReport,
    time: f64,
    steps: u64,
    faults: u64,
}

impl Simulation {
    /// Simulation with the configured steady wind and a control bar held at
    /// the pilot position.
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        let wind = SteadyWind::from_params(&config.wind);
        let bar = ControlBar::new(config.controller.pilot_position, &config.bar);
        Self::with_collaborators(config, wind, bar)
    }
}

impl<C: ControlInput> Simulation<SteadyWind, C> {
    pub fn set_wind(&mut self, params: WindParams) -> Result<(), ConfigError> {
        require_range("wind.speed_kmh", params.speed_kmh, 0.0, f64::MAX)?;
        require_range("wind.direction_deg", params.direction_deg, -360.0, 360.0)?;
        require_range("wind.turbulence", params.turbulence, 0.0, 1.0)?;
        self.wind.set_params(&params);
        self.config.wind = params;
        self.sphere.set_downwind(self.wind.downwind());
        info!(
            "wind set to {:.1} km/h towards {:.0} deg, turbulence {:.2}",
            params.speed_kmh, params.direction_deg, params.turbulence
        );
        Ok(())
    }
}

impl<W: WindModel, C: ControlInput> Simulation<W, C> {
    /// Validates `config`, builds the controller and places the kite at its
    /// reset pose.
    pub fn with_collaborators(config: SimConfig, wind: W, control: C) -> Result<Self, ConfigError> {
        let mut controller = KiteController::new(&config)?;
        let handles = control.handle_positions();
        let downwind = wind.downwind();
        controller.reset(&handles, downwind);

        let sphere = FlightSphere::new(
            config.controller.pilot_position,
            config.lines.length,
            &config.bridles.lengths,
            downwind,
        );
        info!(
            "simulation ready: {:.2} kg kite, {:.1} m lines, {} solver passes ({:?} control points)",
            config.kite.mass, config.lines.length, config.solver.iterations, config.solver.control_point_model
        );

        Ok(Self {
            config,
            controller,
            wind,
            control,
            sphere,
            handles,
            apparent_wind: Vec3::zero(),
            last_report: StepReport::default(),
            time: 0.0,
            steps: 0,
            faults: 0,
        })
    }

    /// Advances one frame. Numeric faults are rolled back and counted, never
    /// propagated.
    pub fn update(&mut self, dt: f64) -> UpdateStatus {
        let max_dt = self.config.controller.max_dt;
        let dt = if dt.is_finite() { dt.clamp(0.0, max_dt) } else { 0.0 };

        self.handles = self.control.handle_positions();
        self.apparent_wind = self.wind.apparent_wind(self.controller.state().velocity, dt);
        self.sphere.set_downwind(self.wind.downwind());

        match self.controller.step(dt, self.apparent_wind, &self.handles) {
            Ok(report) => {
                self.time += report.dt;
                self.steps += 1;
                trace!(
                    "t = {:.3} s: pos ({:.2}, {:.2}, {:.2}), tensions {:.1}/{:.1} N",
                    self.time,
                    self.controller.state().position.x,
                    self.controller.state().position.y,
                    self.controller.state().position.z,
                    report.solve.tensions[0],
                    report.solve.tensions[1]
                );
                self.last_report = report;
                UpdateStatus::Stepped
            }
            Err(fault) => {
                self.faults += 1;
                warn!("{fault} at t = {:.3} s, rolling back to the last valid state", self.time);
                self.controller.rollback(&self.handles);
                UpdateStatus::RolledBack(fault)
            }
        }
    }

    /// Back to the reset pose; time and counters restart.
    pub fn reset(&mut self) {
        self.wind.reset();
        self.handles = self.control.handle_positions();
        let downwind = self.wind.downwind();
        self.controller.reset(&self.handles, downwind);
        self.sphere.set_downwind(downwind);
        self.apparent_wind = Vec3::zero();
        self.last_report = StepReport::default();
        self.time = 0.0;
        self.steps = 0;
        self.faults = 0;
    }

    pub fn snapshot(&self) -> KiteSnapshot {
        let state = self.controller.state();
        let points = self.controller.control_points();
        KiteSnapshot {
            time: self.time,
            position: state.position,
            orientation: state.orientation,
            velocity: state.velocity,
            angular_velocity: state.angular_velocity,
            control_points: points.positions(),
            handles: self.handles,
            apparent_wind: self.apparent_wind,
            surfaces: self.last_report.forces.per_surface.clone(),
            tensions: Side::BOTH.map(|side| self.controller.solver().line(side).tension),
            zone: self.sphere.classify(&state.position),
            diagnostics: self.last_report.solve.diagnostics,
        }
    }

    /// Applies new bridle lengths; rejected if not positive or if the bridles
    /// cannot meet on the current geometry.
    pub fn set_bridle_lengths(&mut self, lengths: BridleLengths) -> Result<(), ConfigError> {
        validate_bridle_lengths(&lengths)?;
        let mut params = self.config.bridles.clone();
        params.lengths = lengths;
        BridleSet::from_params(&params)?.check_feasible(self.controller.kite().geometry())?;

        self.controller.set_bridle_lengths(lengths, &self.handles);
        self.config.bridles = params;
        self.rebuild_sphere();
        info!("bridles set to {:.3}/{:.3}/{:.3} m", lengths.nose, lengths.inter, lengths.center);
        Ok(())
    }

    pub fn set_line_length(&mut self, length: f64) -> Result<(), ConfigError> {
        require_positive("lines.length", length)?;
        self.controller.set_line_length(length, &self.handles);
        self.config.lines.length = length;
        self.rebuild_sphere();
        info!("lines set to {length:.2} m");
        Ok(())
    }

    fn rebuild_sphere(&mut self) {
        self.sphere = FlightSphere::new(
            self.config.controller.pilot_position,
            self.config.lines.length,
            &self.config.bridles.lengths,
            self.wind.downwind(),
        );
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn controller(&self) -> &KiteController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut KiteController {
        &mut self.controller
    }

    pub fn wind(&self) -> &W {
        &self.wind
    }

    pub fn control(&self) -> &C {
        &self.control
    }

    pub fn control_mut(&mut self) -> &mut C {
        &mut self.control
    }

    pub fn flight_sphere(&self) -> &FlightSphere {
        &self.sphere
    }

    pub fn zone(&self) -> FlightZone {
        self.sphere.classify(&self.controller.state().position)
    }

    pub fn last_report(&self) -> &StepReport {
        &self.last_report
    }

    /// Simulated time (s).
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Rolled-back steps since the last reset.
    pub fn faults(&self) -> u64 {
        self.faults
    }
}
