//! Analytic trilateration: the point at given distances from three anchors.
//!
//! Used every solver pass to place the control points from the kite pose and
//! the bridle lengths.

use crate::vector::{Vec3, NORMALIZE_EPSILON};

/// Direction used to offset the first anchor when the anchors give no frame.
pub const FALLBACK_AXIS: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 1.0 };

/// Relative slack on `z²` before radii are considered non-intersecting.
const DEPTH_TOLERANCE: f64 = 1e-12;

/// Smallest cross-axis offset of the third anchor, relative to the anchor
/// spread, for the three anchors to count as a frame.
const COLLINEAR_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Solution {
    /// Two mirror points `base ± offset`.
    Pair { base: Vec3, offset: Vec3 },
    /// The spheres miss each other; `base` is the best in-plane estimate.
    NoIntersection { base: Vec3 },
    /// Coincident or collinear anchors.
    Degenerate,
}

fn solve(p1: Vec3, r1: f64, p2: Vec3, r2: f64, p3: Vec3, r3: f64) -> Solution {
    let d_vec = p2 - p1;
    let d = d_vec.magnitude();
    if d < NORMALIZE_EPSILON || !d.is_finite() {
        return Solution::Degenerate;
    }
    let ex = d_vec / d;

    let p13 = p3 - p1;
    let i = ex.dot(&p13);
    let across = p13 - ex * i;
    let j = across.magnitude();
    if !j.is_finite() || j < COLLINEAR_TOLERANCE * d.max(p13.magnitude()) {
        return Solution::Degenerate;
    }
    let ey = across / j;
    let ez = ex.cross(&ey);

    let x = (r1 * r1 - r2 * r2 + d * d) / (2.0 * d);
    let y = (r1 * r1 - r3 * r3 + i * i + j * j) / (2.0 * j) - (i / j) * x;
    let base = p1 + ex * x + ey * y;

    let z_sq = r1 * r1 - x * x - y * y;
    let tolerance = DEPTH_TOLERANCE * (r1 * r1).max(1.0);
    if !z_sq.is_finite() || !base.is_finite() {
        Solution::Degenerate
    } else if z_sq < -tolerance {
        Solution::NoIntersection { base }
    } else {
        Solution::Pair { base, offset: ez * z_sq.max(0.0).sqrt() }
    }
}

/// Both intersection points of the three spheres, or `None` when the anchors
/// are degenerate or the radii cannot meet.
pub fn trilaterate_exact(p1: Vec3, r1: f64, p2: Vec3, r2: f64, p3: Vec3, r3: f64) -> Option<[Vec3; 2]> {
    match solve(p1, r1, p2, r2, p3, r3) {
        Solution::Pair { base, offset } => Some([base + offset, base - offset]),
        _ => None,
    }
}

/// Point at distance `r1`, `r2`, `r3` from `p1`, `p2`, `p3`.
///
/// Of the two mirror solutions the one closer to the world origin (the
/// pilot) is returned. Never produces NaN for finite input:
/// - coincident or (nearly) collinear anchors give `p1 - r1 · FALLBACK_AXIS`;
/// - radii without a common point give the in-plane estimate (z = 0).
pub fn trilaterate_3d(p1: Vec3, r1: f64, p2: Vec3, r2: f64, p3: Vec3, r3: f64) -> Vec3 {
    let fallback = || {
        let offset = p1 - FALLBACK_AXIS * r1;
        if offset.is_finite() { offset } else { Vec3::zero() }
    };

    match solve(p1, r1, p2, r2, p3, r3) {
        Solution::Pair { base, offset } => {
            let (plus, minus) = (base + offset, base - offset);
            if minus.magnitude_sq() < plus.magnitude_sq() { minus } else { plus }
        }
        Solution::NoIntersection { base } => base,
        Solution::Degenerate => fallback(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_distances(p: Vec3, anchors: [(Vec3, f64); 3]) {
        for (anchor, radius) in anchors {
            assert_relative_eq!(p.distance(&anchor), radius, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_round_trip_axis_aligned() {
        let p1 = Vec3::new(0.0, 0.0, 0.0);
        let p2 = Vec3::new(4.0, 0.0, 0.0);
        let p3 = Vec3::new(0.0, 4.0, 0.0);
        let target = Vec3::new(1.0, 1.5, 2.0);
        let (r1, r2, r3) = (target.distance(&p1), target.distance(&p2), target.distance(&p3));

        let p = trilaterate_3d(p1, r1, p2, r2, p3, r3);
        assert_distances(p, [(p1, r1), (p2, r2), (p3, r3)]);
    }

    #[test]
    fn test_round_trip_many_configurations() {
        // Anchors well off the origin so both roots are distinguishable.
        let frames = [
            [Vec3::new(1.0, 5.0, -10.0), Vec3::new(2.5, 5.2, -10.1), Vec3::new(1.6, 6.4, -9.8)],
            [Vec3::new(-3.0, 8.0, -12.0), Vec3::new(-2.2, 7.1, -12.3), Vec3::new(-3.4, 7.6, -11.2)],
            [Vec3::new(0.0, 0.65, 0.0), Vec3::new(-0.61875, 0.1625, 0.0), Vec3::new(0.0, 0.1625, 0.0)],
        ];
        let offsets = [
            Vec3::new(0.3, 0.2, 0.5),
            Vec3::new(-0.4, -0.1, 0.2),
            Vec3::new(0.1, 0.6, -0.3),
        ];

        for anchors in frames {
            for offset in offsets {
                let target = anchors[0] + offset;
                let radii = anchors.map(|a| target.distance(&a));
                let p = trilaterate_3d(anchors[0], radii[0], anchors[1], radii[1], anchors[2], radii[2]);
                assert_distances(
                    p,
                    [(anchors[0], radii[0]), (anchors[1], radii[1]), (anchors[2], radii[2])],
                );
                assert!(p.is_finite());
            }
        }
    }

    #[test]
    fn test_picks_root_nearer_origin() {
        // Anchors in the plane z = -10; mirror roots at z = -10 ± 1.
        let p1 = Vec3::new(0.0, 0.0, -10.0);
        let p2 = Vec3::new(1.0, 0.0, -10.0);
        let p3 = Vec3::new(0.0, 1.0, -10.0);
        let near = Vec3::new(0.0, 0.0, -9.0);
        let radii = [p1, p2, p3].map(|a| near.distance(&a));

        let p = trilaterate_3d(p1, radii[0], p2, radii[1], p3, radii[2]);
        assert_relative_eq!(p, near, epsilon = 1e-9);

        // Same anchors on the other side of the origin: the root flips.
        let q1 = Vec3::new(0.0, 0.0, 10.0);
        let q2 = Vec3::new(1.0, 0.0, 10.0);
        let q3 = Vec3::new(0.0, 1.0, 10.0);
        let p = trilaterate_3d(q1, radii[0], q2, radii[1], q3, radii[2]);
        assert_relative_eq!(p, Vec3::new(0.0, 0.0, 9.0), epsilon = 1e-9);
    }

    #[test]
    fn test_exact_returns_both_mirror_roots() {
        let p1 = Vec3::zero();
        let p2 = Vec3::unit_x();
        let p3 = Vec3::up();
        let target = Vec3::new(0.25, 0.25, 0.5);
        let radii = [p1, p2, p3].map(|a| target.distance(&a));
        let [a, b] = trilaterate_exact(p1, radii[0], p2, radii[1], p3, radii[2]).unwrap();
        assert_relative_eq!(a.z, -b.z, epsilon = 1e-12);
        assert_relative_eq!(a.z.abs(), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_coincident_anchors_fall_back() {
        let p = Vec3::new(1.0, 2.0, 3.0);
        let result = trilaterate_3d(p, 0.5, p, 0.5, p, 0.5);
        assert_eq!(result, p - FALLBACK_AXIS * 0.5);
        assert!(trilaterate_exact(p, 0.5, p, 0.5, p, 0.5).is_none());
    }

    #[test]
    fn test_collinear_anchors_fall_back() {
        let result = trilaterate_3d(
            Vec3::zero(),
            1.0,
            Vec3::unit_x(),
            1.0,
            Vec3::new(2.0, 0.0, 0.0),
            1.0,
        );
        assert_eq!(result, Vec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn test_nearly_collinear_anchors_fall_back() {
        // Third anchor 1e-11 m off the axis: passes normalization, but the
        // in-plane estimate would be ~1e10 m away.
        let p1 = Vec3::new(0.0, 7.0, -12.0);
        let p3 = Vec3::new(2.0, 7.0 + 1e-11, -12.0);
        let result = trilaterate_3d(p1, 0.65, Vec3::new(1.0, 7.0, -12.0), 0.7, p3, 0.6);
        assert_eq!(result, p1 - FALLBACK_AXIS * 0.65);
        assert!(trilaterate_exact(p1, 0.65, Vec3::new(1.0, 7.0, -12.0), 0.7, p3, 0.6).is_none());
    }

    #[test]
    fn test_zero_radii_are_finite() {
        let result = trilaterate_3d(
            Vec3::zero(),
            0.0,
            Vec3::unit_x(),
            0.0,
            Vec3::up(),
            0.0,
        );
        assert!(result.is_finite());
    }

    #[test]
    fn test_infeasible_radii_are_finite() {
        let p1 = Vec3::zero();
        let p2 = Vec3::new(10.0, 0.0, 0.0);
        let p3 = Vec3::new(0.0, 10.0, 0.0);
        let result = trilaterate_3d(p1, 1.0, p2, 1.0, p3, 1.0);
        assert!(result.is_finite());
        // In-plane estimate: stays in the anchor plane.
        assert_relative_eq!(result.z, 0.0, epsilon = 1e-12);
        assert!(trilaterate_exact(p1, 1.0, p2, 1.0, p3, 1.0).is_none());
    }
}
