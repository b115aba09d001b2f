//! Shared numeric pieces of the constraint solver: one-sided distance
//! corrections between the kite body and a point, line projection, tension
//! readout and correction clamping.

use crate::vector::Vec3;

/// Excess, relative to the rest length, below which a max-distance
/// constraint counts as satisfied.
pub const LENGTH_TOLERANCE: f64 = 1e-9;

/// Mass properties of the kite seen by a constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyWeights {
    pub inv_mass: f64,
    /// Inverse of the isotropic moment of inertia.
    pub inv_inertia: f64,
}

impl BodyWeights {
    /// Generalized inverse mass of the body at `offset` along `n`.
    #[inline(always)]
    pub fn generalized(&self, offset: &Vec3, n: &Vec3) -> f64 {
        self.inv_mass + self.inv_inertia * offset.cross(n).magnitude_sq()
    }
}

/// Maximum-distance constraint between a body anchor and a free point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaxDistance {
    /// Anchor, world position.
    pub anchor: Vec3,
    /// Anchor relative to the body origin, world orientation.
    pub offset: Vec3,
    pub rest_length: f64,
}

/// Position update produced by one violated [`MaxDistance`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionCorrection {
    /// Unit vector from anchor towards the point.
    pub normal: Vec3,
    /// Violation actually resolved (after clamping), m.
    pub resolved: f64,
    pub translation: Vec3,
    /// World rotation vector to apply to the body orientation.
    pub rotation: Vec3,
    /// Displacement of the free point (zero for a massless point).
    pub point_shift: Vec3,
}

/// Velocity update removing the separating speed along a constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityCorrection {
    pub linear: Vec3,
    pub angular: Vec3,
    pub point: Vec3,
}

impl MaxDistance {
    pub fn excess(&self, point: &Vec3) -> f64 {
        self.anchor.distance(point) - self.rest_length
    }

    /// PBD correction `λ = C / Σ wᵢ|∇Cᵢ|²` splitting the violation between
    /// the body and the point. `None` when slack or at length (within
    /// [`LENGTH_TOLERANCE`]): a max-distance constraint never pulls a point
    /// that is already within reach.
    ///
    /// The resolved violation is capped at `max_ratio · rest_length`.
    pub fn correct(
        &self,
        point: &Vec3,
        body: &BodyWeights,
        point_inv_mass: f64,
        max_ratio: f64,
    ) -> Option<PositionCorrection> {
        let delta = *point - self.anchor;
        let distance = delta.magnitude();
        let violation = distance - self.rest_length;
        if violation <= LENGTH_TOLERANCE * self.rest_length {
            return None;
        }
        let normal = delta.normalized()?;

        let w_body = body.generalized(&self.offset, &normal);
        let w_total = w_body + point_inv_mass;
        if w_total <= 0.0 || !w_total.is_finite() {
            return None;
        }

        let resolved = clamp_correction(violation, self.rest_length, max_ratio);
        let lambda = resolved / w_total;
        Some(PositionCorrection {
            normal,
            resolved,
            translation: normal * (lambda * body.inv_mass),
            rotation: self.offset.cross(&normal) * (lambda * body.inv_inertia),
            point_shift: normal * (-lambda * point_inv_mass),
        })
    }

    /// Impulse cancelling the relative speed with which the point is still
    /// moving away from the anchor along `normal`. `None` if approaching.
    ///
    /// The removed speed is capped at `max_ratio · rest_length / dt`.
    #[allow(clippy::too_many_arguments)]
    pub fn separation_impulse(
        &self,
        normal: &Vec3,
        anchor_velocity: &Vec3,
        point_velocity: &Vec3,
        body: &BodyWeights,
        point_inv_mass: f64,
        max_ratio: f64,
        dt: f64,
    ) -> Option<VelocityCorrection> {
        let separating = (*point_velocity - *anchor_velocity).dot(normal);
        if separating <= 0.0 || dt <= 0.0 {
            return None;
        }
        let w_total = body.generalized(&self.offset, normal) + point_inv_mass;
        if w_total <= 0.0 || !w_total.is_finite() {
            return None;
        }
        let speed = separating.min(max_ratio * self.rest_length / dt);
        let impulse = speed / w_total;
        Some(VelocityCorrection {
            linear: *normal * (impulse * body.inv_mass),
            angular: self.offset.cross(normal) * (impulse * body.inv_inertia),
            point: *normal * (-impulse * point_inv_mass),
        })
    }
}

/// Brings `point` back within `length` of `handle`; untouched if already
/// within (slack line). The result of a projection lies exactly on the sphere.
pub fn project_onto_line_sphere(point: Vec3, handle: Vec3, length: f64) -> Vec3 {
    let delta = point - handle;
    let distance_sq = delta.magnitude_sq();
    if distance_sq <= length * length {
        return point;
    }
    match delta.normalized() {
        Some(dir) => handle + dir * length,
        None => point,
    }
}

/// Display tension of a line or bridle: `k · max(0, d - L)` (N).
pub fn constraint_tension(distance: f64, rest_length: f64, stiffness: f64) -> f64 {
    stiffness * (distance - rest_length).max(0.0)
}

/// Caps a positional correction at `max_ratio · rest_length`.
pub fn clamp_correction(correction: f64, rest_length: f64, max_ratio: f64) -> f64 {
    let limit = (max_ratio * rest_length).abs();
    correction.clamp(-limit, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    const BODY: BodyWeights = BodyWeights { inv_mass: 1.0 / 0.31, inv_inertia: 1.0 / 0.08 };

    fn bridle(offset: Vec3) -> MaxDistance {
        MaxDistance { anchor: Vec3::new(0.0, 5.0, -10.0) + offset, offset, rest_length: 0.65 }
    }

    #[test]
    fn test_slack_constraint_is_ignored() {
        let c = bridle(Vec3::zero());
        let at_rest = c.anchor + Vec3::new(0.0, 0.0, 0.65);
        assert!(c.correct(&at_rest, &BODY, 0.0, 0.3).is_none());
        let inside = c.anchor + Vec3::new(0.0, 0.0, 0.3);
        assert!(c.correct(&inside, &BODY, 0.0, 0.3).is_none());
    }

    #[test]
    fn test_rounding_excess_counts_as_satisfied() {
        let c = bridle(Vec3::new(0.2, 0.1, 0.0));
        let direction = Vec3::new(0.3, -0.4, 0.5).normalized().unwrap();
        let at_rest = c.anchor + direction * (0.65 * (1.0 + 1e-12));
        assert!(c.excess(&at_rest) > 0.0);
        assert!(c.correct(&at_rest, &BODY, 0.0, 0.3).is_none());

        let stretched = c.anchor + direction * 0.66;
        assert!(c.correct(&stretched, &BODY, 0.0, 0.3).is_some());
    }

    #[test]
    fn test_translation_only_correction_closes_gap() {
        let c = bridle(Vec3::zero());
        let point = c.anchor + Vec3::new(0.0, 0.0, 0.7);
        let correction = c.correct(&point, &BODY, 0.0, 0.3).unwrap();
        assert_abs_diff_eq!(correction.rotation, Vec3::zero());
        assert_eq!(correction.point_shift, Vec3::new(0.0, 0.0, 0.0));

        let moved = MaxDistance { anchor: c.anchor + correction.translation, ..c };
        assert_relative_eq!(moved.excess(&point), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_weighted_point_shares_correction() {
        let c = bridle(Vec3::zero());
        let point = c.anchor + Vec3::new(0.0, 0.0, 0.75);
        let point_inv_mass = 1.0 / (0.01 * 0.31);
        let correction = c.correct(&point, &BODY, point_inv_mass, 0.3).unwrap();

        // The light point takes 100x the body's share.
        let body_move = correction.translation.magnitude();
        let point_move = correction.point_shift.magnitude();
        assert_relative_eq!(point_move / body_move, 100.0, max_relative = 1e-9);
        assert_relative_eq!(body_move + point_move, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_correction_is_clamped() {
        let c = bridle(Vec3::zero());
        let point = c.anchor + Vec3::new(0.0, 0.0, 2.0);
        let correction = c.correct(&point, &BODY, 0.0, 0.3).unwrap();
        assert_relative_eq!(correction.resolved, 0.3 * 0.65);
        assert_relative_eq!(correction.translation.magnitude(), 0.3 * 0.65, epsilon = 1e-12);
    }

    #[test]
    fn test_offset_anchor_rotates_body() {
        let offset = Vec3::new(0.5, 0.0, 0.0);
        let c = bridle(offset);
        let point = c.anchor + Vec3::new(0.0, 0.0, 0.8);
        let correction = c.correct(&point, &BODY, 0.0, 0.3).unwrap();
        assert!(correction.rotation.magnitude() > 0.0);

        // Linearized anchor displacement along the normal equals the violation.
        let anchor_shift = correction.translation + correction.rotation.cross(&offset);
        assert_relative_eq!(anchor_shift.dot(&correction.normal), correction.resolved, epsilon = 1e-12);
    }

    #[test]
    fn test_separation_impulse() {
        let c = bridle(Vec3::zero());
        let n = Vec3::unit_z();
        // Body moving away from the point (point is along +n).
        let impulse = c
            .separation_impulse(&n, &Vec3::new(0.0, 0.0, -2.0), &Vec3::zero(), &BODY, 0.0, 0.3, 1.0 / 60.0)
            .unwrap();
        let new_velocity = Vec3::new(0.0, 0.0, -2.0) + impulse.linear;
        assert_abs_diff_eq!(new_velocity.z, 0.0, epsilon = 1e-12);

        // Approaching: nothing to do.
        assert!(
            c.separation_impulse(&n, &Vec3::new(0.0, 0.0, 1.0), &Vec3::zero(), &BODY, 0.0, 0.3, 1.0 / 60.0)
                .is_none()
        );
    }

    #[test]
    fn test_line_projection_idempotent() {
        let handle = Vec3::new(0.3, 0.0, 0.0);
        let inside = Vec3::new(0.0, 7.0, -12.0);
        assert_eq!(project_onto_line_sphere(inside, handle, 15.0), inside);

        let outside = Vec3::new(0.0, 9.0, -14.0);
        let projected = project_onto_line_sphere(outside, handle, 15.0);
        assert_relative_eq!(projected.distance(&handle), 15.0, epsilon = 1e-6);
        let again = project_onto_line_sphere(projected, handle, 15.0);
        assert_relative_eq!(again, projected, epsilon = 1e-12);
    }

    #[test]
    fn test_tension() {
        assert_eq!(constraint_tension(14.0, 15.0, 25_000.0), 0.0);
        assert_relative_eq!(constraint_tension(15.01, 15.0, 25_000.0), 250.0, epsilon = 1e-6);
    }
}
