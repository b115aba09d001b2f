//! Position-based constraint solver.
//!
//! Each pass places the control points from the bridle geometry, pulls the
//! kite back wherever a bridle is over-extended towards its line-feasible
//! control point, settles the control points on (or inside) the line spheres
//! and finally keeps the frame above the ground.

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::constants::model_params::{BridleLengths, LineParams, SolverParams};
use crate::constraints::{constraint_tension, project_onto_line_sphere, BodyWeights, MaxDistance};
use crate::control::HandlePair;
use crate::error::{NumericFault, Quantity, Stage};
use crate::geometry::{BridleSet, Side};
use crate::kite::KiteBody;
use crate::trilateration::trilaterate_3d;
use crate::vector::Vec3;

/// Clearance added on top of the penetration depth when pushing the kite up.
const GROUND_EPSILON: f64 = 1e-9;

/// Relative shortfall under which a line still counts as taut.
const TAUT_TOLERANCE: f64 = 1e-6;

/// How control points take part in bridle corrections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlPointModel {
    /// Massless points re-derived from the kite pose; every bridle correction
    /// is applied to the kite.
    #[default]
    Geometric,
    /// Points carry a small mass and take their share of each correction.
    Weighted,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlPoint {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Zero for the geometric model.
    pub inv_mass: f64,
}

impl ControlPoint {
    fn is_finite(&self) -> bool {
        self.position.is_finite() && self.velocity.is_finite()
    }
}

/// The left and right control points.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlPoints {
    points: [ControlPoint; 2],
}

impl ControlPoints {
    pub fn new(left: ControlPoint, right: ControlPoint) -> Self {
        Self { points: [left, right] }
    }

    #[inline(always)]
    pub fn get(&self, side: Side) -> &ControlPoint {
        &self.points[side.index()]
    }

    #[inline(always)]
    pub fn get_mut(&mut self, side: Side) -> &mut ControlPoint {
        &mut self.points[side.index()]
    }

    pub fn positions(&self) -> [Vec3; 2] {
        self.points.map(|p| p.position)
    }

    fn check_finite(&self, stage: Stage) -> Result<(), NumericFault> {
        match Side::BOTH.into_iter().find(|&side| !self.get(side).is_finite()) {
            Some(side) => Err(NumericFault::new(stage, Quantity::ControlPoint(side))),
            None => Ok(()),
        }
    }
}

/// One control line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub rest_length: f64,
    /// N/m, display only
    pub stiffness: f64,
    /// Tension at the last solve (N).
    pub tension: f64,
}

impl Line {
    pub fn from_params(params: &LineParams) -> Self {
        Self {
            rest_length: params.length,
            stiffness: params.stiffness,
            tension: 0.0,
        }
    }
}

/// Residual constraint violation after a solve.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConstraintDiagnostics {
    /// Largest excess length over all bridles and lines (m).
    pub max_error: f64,
    /// Mean excess length over all bridles and lines (m).
    pub avg_error: f64,
    pub iterations: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SolveReport {
    pub diagnostics: ConstraintDiagnostics,
    /// Left and right line tension (N).
    pub tensions: [f64; 2],
    /// Whether the ground pushed the kite during this solve.
    pub grounded: bool,
}

#[derive(Debug, Clone)]
pub struct ConstraintSolver {
    params: SolverParams,
    bridles: BridleSet,
    lines: [Line; 2],
    point_inv_mass: f64,
}

impl ConstraintSolver {
    pub fn new(params: SolverParams, bridles: BridleSet, lines: &LineParams, kite_mass: f64) -> Self {
        let point_inv_mass = match params.control_point_model {
            ControlPointModel::Geometric => 0.0,
            ControlPointModel::Weighted => 1.0 / (params.control_point_mass_ratio * kite_mass),
        };
        let line = Line::from_params(lines);
        Self {
            params,
            bridles,
            lines: [line, line],
            point_inv_mass,
        }
    }

    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    pub fn bridles(&self) -> &BridleSet {
        &self.bridles
    }

    pub fn line(&self, side: Side) -> &Line {
        &self.lines[side.index()]
    }

    pub fn model(&self) -> ControlPointModel {
        self.params.control_point_model
    }

    pub fn set_bridle_lengths(&mut self, lengths: BridleLengths) {
        self.bridles.lengths = lengths;
    }

    pub fn set_line_length(&mut self, length: f64) {
        for line in &mut self.lines {
            line.rest_length = length;
        }
    }

    /// Control point satisfying all three bridles of `side` for the current
    /// kite pose.
    pub fn trilaterate_control_point(&self, kite: &KiteBody, side: Side) -> Vec3 {
        let [(a, ra), (b, rb), (c, rc)] = self.bridles.bridles(side);
        trilaterate_3d(kite.world_point(a), ra, kite.world_point(b), rb, kite.world_point(c), rc)
    }

    /// Fresh control points for the current pose, at rest, inside the lines.
    pub fn initialize_control_points(&self, kite: &KiteBody, handles: &HandlePair) -> ControlPoints {
        let place = |side: Side| ControlPoint {
            position: project_onto_line_sphere(
                self.trilaterate_control_point(kite, side),
                handles.get(side),
                self.lines[side.index()].rest_length,
            ),
            velocity: Vec3::zero(),
            inv_mass: self.point_inv_mass,
        };
        ControlPoints::new(place(Side::Left), place(Side::Right))
    }

    /// Runs the configured number of passes on the tentative kite state.
    ///
    /// Line tensions are read from the tentative control points before any
    /// correction. Geometric control points move rigidly with the kite;
    /// weighted ones get the step displacement over `dt`. The kite loses
    /// its outward speed along every line left taut.
    pub fn solve(
        &mut self,
        kite: &mut KiteBody,
        points: &mut ControlPoints,
        handles: &HandlePair,
        dt: f64,
    ) -> Result<SolveReport, NumericFault> {
        let start = points.positions();

        for side in Side::BOTH {
            let candidate = self.trilaterate_control_point(kite, side);
            let line = &mut self.lines[side.index()];
            line.tension = constraint_tension(candidate.distance(&handles.get(side)), line.rest_length, line.stiffness);
        }

        let mut grounded = false;
        for iteration in 0..self.params.iterations {
            // 1. line-feasible targets from the current pose
            for side in Side::BOTH {
                let candidate = self.trilaterate_control_point(kite, side);
                points.get_mut(side).position =
                    project_onto_line_sphere(candidate, handles.get(side), self.lines[side.index()].rest_length);
            }
            points.check_finite(Stage::Constraint)?;

            // 2. bridle corrections, alternating sides between passes
            let order = if iteration % 2 == 0 { Side::BOTH } else { [Side::Right, Side::Left] };
            for side in order {
                self.correct_bridles(kite, points.get_mut(side), side, dt)?;
            }

            // 3. lines last
            for side in Side::BOTH {
                self.settle_control_point(kite, points, handles, side);
            }
            points.check_finite(Stage::Constraint)?;

            // 4. ground
            grounded |= self.follow_ground(kite, points, handles);
            kite.state.check_finite(Stage::Constraint)?;
        }

        if dt > 0.0 {
            self.stop_line_separation(kite, points, handles, dt);
            for side in Side::BOTH {
                let velocity = self.control_point_velocity(kite, points.get(side), start[side.index()], dt);
                points.get_mut(side).velocity = velocity;
            }
        }
        kite.state.check_finite(Stage::Constraint)?;
        points.check_finite(Stage::Constraint)?;

        if grounded {
            debug!("kite in ground contact at y = {:.3} m", kite.position().y);
        }
        let diagnostics = self.measure(kite, points, handles);
        trace!(
            "solve: max error {:.2e} m, avg error {:.2e} m, tensions {:.1}/{:.1} N",
            diagnostics.max_error,
            diagnostics.avg_error,
            self.lines[0].tension,
            self.lines[1].tension
        );
        Ok(SolveReport {
            diagnostics,
            tensions: [self.lines[0].tension, self.lines[1].tension],
            grounded,
        })
    }

    /// Applies every over-extended bridle of `side` to the kite (and, for
    /// weighted points, to the point).
    fn correct_bridles(
        &self,
        kite: &mut KiteBody,
        point: &mut ControlPoint,
        side: Side,
        dt: f64,
    ) -> Result<(), NumericFault> {
        let ratio = self.params.max_correction_ratio;
        let weights = BodyWeights {
            inv_mass: kite.inv_mass(),
            inv_inertia: kite.inv_inertia(),
        };

        for (anchor_point, rest_length) in self.bridles.bridles(side) {
            let anchor = kite.world_point(anchor_point);
            let constraint = MaxDistance {
                anchor,
                offset: anchor - kite.position(),
                rest_length,
            };
            let Some(correction) = constraint.correct(&point.position, &weights, point.inv_mass, ratio) else {
                continue;
            };

            kite.state.position += correction.translation;
            kite.state.orientation = kite
                .state
                .orientation
                .perturbed(&correction.rotation)
                .ok_or(NumericFault::new(Stage::Constraint, Quantity::Orientation))?;
            point.position += correction.point_shift;

            let anchor_velocity = kite.point_velocity(&constraint.offset);
            let point_velocity = match self.params.control_point_model {
                ControlPointModel::Geometric => kite.point_velocity(&(point.position - kite.position())),
                ControlPointModel::Weighted => point.velocity,
            };
            if let Some(impulse) = constraint.separation_impulse(
                &correction.normal,
                &anchor_velocity,
                &point_velocity,
                &weights,
                point.inv_mass,
                ratio,
                dt,
            ) {
                kite.state.velocity += impulse.linear;
                kite.state.angular_velocity += impulse.angular;
                point.velocity += impulse.point;
            }

            kite.state.check_finite(Stage::Constraint)?;
            if !point.is_finite() {
                return Err(NumericFault::new(Stage::Constraint, Quantity::ControlPoint(side)));
            }
        }
        Ok(())
    }

    fn control_point_velocity(&self, kite: &KiteBody, point: &ControlPoint, start: Vec3, dt: f64) -> Vec3 {
        match self.params.control_point_model {
            ControlPointModel::Geometric => kite.point_velocity(&(point.position - kite.position())),
            ControlPointModel::Weighted => (point.position - start) / dt,
        }
    }

    /// Cancels the speed with which the kite carries a taut line's control
    /// point away from its handle.
    fn stop_line_separation(&self, kite: &mut KiteBody, points: &ControlPoints, handles: &HandlePair, dt: f64) {
        let weights = BodyWeights {
            inv_mass: kite.inv_mass(),
            inv_inertia: kite.inv_inertia(),
        };
        for side in Side::BOTH {
            let point = points.get(side).position;
            let handle = handles.get(side);
            let rest_length = self.lines[side.index()].rest_length;
            if point.distance(&handle) < rest_length * (1.0 - TAUT_TOLERANCE) {
                continue;
            }
            let Some(towards_handle) = (handle - point).normalized() else {
                continue;
            };
            let line = MaxDistance {
                anchor: point,
                offset: point - kite.position(),
                rest_length,
            };
            let point_velocity = kite.point_velocity(&line.offset);
            if let Some(impulse) = line.separation_impulse(
                &towards_handle,
                &point_velocity,
                &Vec3::zero(),
                &weights,
                0.0,
                self.params.max_correction_ratio,
                dt,
            ) {
                kite.state.velocity += impulse.linear;
                kite.state.angular_velocity += impulse.angular;
            }
        }
    }

    fn settle_control_point(&self, kite: &KiteBody, points: &mut ControlPoints, handles: &HandlePair, side: Side) {
        let point = points.get_mut(side);
        let settled = match self.params.control_point_model {
            ControlPointModel::Geometric => self.trilaterate_control_point(kite, side),
            ControlPointModel::Weighted => point.position,
        };
        point.position = project_onto_line_sphere(settled, handles.get(side), self.lines[side.index()].rest_length);
    }

    /// Ground collision, carrying the control points along with any push.
    fn follow_ground(&self, kite: &mut KiteBody, points: &mut ControlPoints, handles: &HandlePair) -> bool {
        let before = kite.position();
        if !self.handle_ground_collision(kite) {
            return false;
        }
        let push = kite.position() - before;
        for side in Side::BOTH {
            let point = points.get_mut(side);
            point.position =
                project_onto_line_sphere(point.position + push, handles.get(side), self.lines[side.index()].rest_length);
        }
        true
    }

    /// Lifts the kite so that its lowest point sits at the minimum height,
    /// kills downward velocity, applies friction and snaps residual drift to
    /// zero. Returns whether there was contact.
    pub fn handle_ground_collision(&self, kite: &mut KiteBody) -> bool {
        let (point, lowest) = kite.lowest_point();
        let ground = self.params.ground_min_height;
        if lowest.y >= ground {
            return false;
        }

        let penetration = ground - lowest.y;
        kite.state.position.y += penetration + GROUND_EPSILON;

        let velocity = &mut kite.state.velocity;
        if velocity.y < 0.0 {
            velocity.y = 0.0;
        }
        velocity.x *= self.params.ground_friction;
        velocity.z *= self.params.ground_friction;
        if velocity.magnitude() < self.params.velocity_snap {
            *velocity = Vec3::zero();
        }
        trace!("ground contact at {point}, penetration {penetration:.4} m");
        true
    }

    /// Excess length of every bridle and line.
    pub fn measure(&self, kite: &KiteBody, points: &ControlPoints, handles: &HandlePair) -> ConstraintDiagnostics {
        let mut max_error: f64 = 0.0;
        let mut total = 0.0;
        let mut count = 0usize;
        let mut record = |excess: f64| {
            let error = excess.max(0.0);
            max_error = max_error.max(error);
            total += error;
            count += 1;
        };

        for side in Side::BOTH {
            let point = points.get(side).position;
            for (anchor, rest_length) in self.bridles.bridles(side) {
                record(kite.world_point(anchor).distance(&point) - rest_length);
            }
            record(point.distance(&handles.get(side)) - self.lines[side.index()].rest_length);
        }

        ConstraintDiagnostics {
            max_error,
            avg_error: if count > 0 { total / count as f64 } else { 0.0 },
            iterations: self.params.iterations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::model_params::BridleParams;
    use crate::geometry::KiteGeometry;
    use crate::vector::Quaternion;
    use approx::assert_relative_eq;

    const DT: f64 = 1.0 / 60.0;

    fn handles() -> HandlePair {
        HandlePair::new(Vec3::new(-0.3, 0.0, 0.0), Vec3::new(0.3, 0.0, 0.0))
    }

    fn kite_at(position: Vec3) -> KiteBody {
        let geometry = KiteGeometry::delta();
        let inertia = geometry.default_inertia(0.31);
        let mut kite = KiteBody::new(geometry, 0.31, inertia);
        kite.state.position = position;
        kite
    }

    fn solver(model: ControlPointModel, line_length: f64, iterations: usize) -> ConstraintSolver {
        let params = SolverParams {
            iterations,
            control_point_model: model,
            ..SolverParams::default()
        };
        let bridles = BridleSet::from_params(&BridleParams::default()).unwrap();
        let lines = LineParams { length: line_length, ..LineParams::default() };
        ConstraintSolver::new(params, bridles, &lines, 0.31)
    }

    #[test]
    fn test_satisfied_bridles_are_left_alone() {
        let mut solver = solver(ControlPointModel::Geometric, 15.0, 1);
        let mut kite = kite_at(Vec3::new(0.0, 7.0, -12.0));
        let handles = handles();
        let mut points = solver.initialize_control_points(&kite, &handles);

        let report = solver.solve(&mut kite, &mut points, &handles, DT).unwrap();

        assert_relative_eq!(kite.position(), Vec3::new(0.0, 7.0, -12.0), epsilon = 1e-9);
        for side in Side::BOTH {
            let point = points.get(side).position;
            for (anchor, rest) in solver.bridles().bridles(side) {
                assert_relative_eq!(kite.world_point(anchor).distance(&point), rest, epsilon = 1e-9);
            }
        }
        assert_eq!(report.tensions, [0.0, 0.0]);
        assert!(report.diagnostics.max_error < 1e-9);
    }

    #[test]
    fn test_satisfied_bridles_keep_kite_velocity() {
        for model in [ControlPointModel::Geometric, ControlPointModel::Weighted] {
            let mut solver = solver(model, 15.0, 6);
            let mut kite = kite_at(Vec3::new(0.0, 7.0, -12.0));
            kite.state.velocity = Vec3::new(1.5, 5.0, 0.0);
            kite.state.angular_velocity = Vec3::new(0.0, 0.0, 0.4);
            let handles = handles();
            let mut points = solver.initialize_control_points(&kite, &handles);

            solver.solve(&mut kite, &mut points, &handles, DT).unwrap();

            assert_eq!(kite.state.velocity, Vec3::new(1.5, 5.0, 0.0), "{model:?}");
            assert_eq!(kite.state.angular_velocity, Vec3::new(0.0, 0.0, 0.4), "{model:?}");
        }
    }

    #[test]
    fn test_geometric_points_move_with_the_kite() {
        let mut solver = solver(ControlPointModel::Geometric, 15.0, 6);
        let mut kite = kite_at(Vec3::new(0.0, 7.0, -12.0));
        let handles = handles();
        let mut points = solver.initialize_control_points(&kite, &handles);

        // Teleport half a metre: the points follow, but not at 30 m/s.
        kite.state.position.y += 0.5;
        kite.state.velocity = Vec3::new(1.5, 5.0, 0.0);
        kite.state.angular_velocity = Vec3::new(0.0, 0.0, 0.4);
        solver.solve(&mut kite, &mut points, &handles, DT).unwrap();

        for side in Side::BOTH {
            let point = points.get(side);
            let rigid = kite.point_velocity(&(point.position - kite.position()));
            assert_relative_eq!(point.velocity, rigid, epsilon = 1e-12);
            assert!(point.velocity.magnitude() < 6.0);
        }
    }

    #[test]
    fn test_taut_lines_stop_outward_motion() {
        let start = Vec3::new(0.0, 7.0, -12.0);
        let handles = handles();
        let length = solver(ControlPointModel::Geometric, 15.0, 1)
            .trilaterate_control_point(&kite_at(start), Side::Left)
            .distance(&handles.left);
        let mut solver = solver(ControlPointModel::Geometric, length, 6);
        let mut kite = kite_at(start);
        kite.state.velocity = start.normalized().unwrap() * 3.0;
        let mut points = solver.initialize_control_points(&kite, &handles);

        let outward = |kite: &KiteBody, points: &ControlPoints, side: Side| {
            let point = points.get(side).position;
            let along = (point - handles.get(side)).normalized().unwrap();
            kite.point_velocity(&(point - kite.position())).dot(&along)
        };
        for side in Side::BOTH {
            assert!(outward(&kite, &points, side) > 2.0);
        }

        solver.solve(&mut kite, &mut points, &handles, DT).unwrap();

        assert_relative_eq!(kite.position(), start, epsilon = 1e-9);
        assert!(kite.state.velocity.magnitude() < 3.0);
        for side in Side::BOTH {
            assert!(outward(&kite, &points, side) <= 1e-9, "{side} still separating");
        }
    }

    #[test]
    fn test_taut_lines_pull_kite_in() {
        let mut solver = solver(ControlPointModel::Geometric, 13.0, 6);
        let start = Vec3::new(0.0, 7.0, -12.0);
        let mut kite = kite_at(start);
        let handles = handles();
        let mut points = solver.initialize_control_points(&kite, &handles);
        let initial_excess = solver.trilaterate_control_point(&kite, Side::Left).distance(&handles.left) - 13.0;
        assert!(initial_excess > 0.0);

        let report = solver.solve(&mut kite, &mut points, &handles, DT).unwrap();

        assert!(kite.position().magnitude() < start.magnitude());
        for side in Side::BOTH {
            assert!(points.get(side).position.distance(&handles.get(side)) <= 13.0 + 1e-9);
        }
        assert!(report.diagnostics.max_error < initial_excess);
        assert!(report.tensions[0] > 0.0);
        assert_relative_eq!(report.tensions[0], report.tensions[1], max_relative = 1e-9);
        assert!(kite.state.orientation.is_finite());
    }

    #[test]
    fn test_tension_is_read_before_correction() {
        let mut solver = solver(ControlPointModel::Geometric, 13.0, 4);
        let mut kite = kite_at(Vec3::new(0.0, 7.0, -12.0));
        let handles = handles();
        let mut points = solver.initialize_control_points(&kite, &handles);
        let expected = 25_000.0 * (solver.trilaterate_control_point(&kite, Side::Right).distance(&handles.right) - 13.0);

        let report = solver.solve(&mut kite, &mut points, &handles, DT).unwrap();
        assert_relative_eq!(report.tensions[1], expected, max_relative = 1e-9);
        assert_relative_eq!(solver.line(Side::Right).tension, expected, max_relative = 1e-9);
    }

    #[test]
    fn test_weighted_points_absorb_most_correction() {
        let handles = handles();
        let start = Vec3::new(0.0, 7.0, -12.0);

        let mut geometric = solver(ControlPointModel::Geometric, 13.0, 6);
        let mut kite_g = kite_at(start);
        let mut points_g = geometric.initialize_control_points(&kite_g, &handles);
        geometric.solve(&mut kite_g, &mut points_g, &handles, DT).unwrap();

        let mut weighted = solver(ControlPointModel::Weighted, 13.0, 6);
        let mut kite_w = kite_at(start);
        let mut points_w = weighted.initialize_control_points(&kite_w, &handles);
        assert!(points_w.get(Side::Left).inv_mass > 0.0);
        weighted.solve(&mut kite_w, &mut points_w, &handles, DT).unwrap();

        assert!(kite_w.position().distance(&start) < kite_g.position().distance(&start));
        for side in Side::BOTH {
            assert!(points_w.get(side).position.distance(&handles.get(side)) <= 13.0 + 1e-9);
        }
    }

    #[test]
    fn test_ground_collision_is_non_penetrating() {
        let solver = solver(ControlPointModel::Geometric, 15.0, 6);
        let mut kite = kite_at(Vec3::new(0.0, 0.0, -5.0));
        kite.state.orientation = Quaternion::from_axis_angle(&Vec3::unit_z(), 0.3).unwrap();
        kite.state.velocity = Vec3::new(1.0, -2.0, 0.5);

        assert!(solver.handle_ground_collision(&mut kite));
        let (_, lowest) = kite.lowest_point();
        assert!(lowest.y >= solver.params().ground_min_height);
        assert_eq!(kite.state.velocity.y, 0.0);
        assert_relative_eq!(kite.state.velocity.x, 0.85);
        assert_relative_eq!(kite.state.velocity.z, 0.425);

        // Already clear: no-op.
        let snapshot = kite.state;
        assert!(!solver.handle_ground_collision(&mut kite));
        assert_eq!(kite.state, snapshot);
    }

    #[test]
    fn test_ground_snaps_residual_drift() {
        let solver = solver(ControlPointModel::Geometric, 15.0, 6);
        let mut kite = kite_at(Vec3::new(0.0, -0.2, -5.0));
        kite.state.velocity = Vec3::new(1e-4, -1.0, 0.0);

        assert!(solver.handle_ground_collision(&mut kite));
        assert_eq!(kite.state.velocity, Vec3::zero());
    }

    #[test]
    fn test_non_finite_pose_is_reported() {
        let mut solver = solver(ControlPointModel::Geometric, 15.0, 2);
        let mut kite = kite_at(Vec3::new(0.0, 7.0, -12.0));
        let handles = handles();
        let mut points = solver.initialize_control_points(&kite, &handles);
        kite.state.position.x = f64::NAN;

        let fault = solver.solve(&mut kite, &mut points, &handles, DT).unwrap_err();
        assert_eq!(fault.stage, Stage::Constraint);
    }

    #[test]
    fn test_model_names() {
        let model: ControlPointModel = serde_yaml::from_str("weighted").unwrap();
        assert_eq!(model, ControlPointModel::Weighted);
        assert_eq!(ControlPointModel::default(), ControlPointModel::Geometric);
    }
}
