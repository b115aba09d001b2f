//! Delta kite geometry: named anchor points, sail surfaces and bridle layout.
//!
//! All coordinates are body-local, in meters (see [`crate::vector`] for the
//! axis convention). The topology is fixed: two control points, six bridles
//! and four triangular sail panels.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::model_params::{BridleLengths, BridleParams};
use crate::error::ConfigError;
use crate::trilateration::trilaterate_exact;
use crate::vector::Vec3;

/// Kite side, seen from behind the kite (from downwind looking at the pilot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    pub fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }

    /// -1 for left, +1 for right (sign of the body X coordinate).
    pub fn sign(self) -> f64 {
        match self {
            Side::Left => -1.0,
            Side::Right => 1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
        }
    }
}

/// Named structural points of the kite frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KitePoint {
    Nose,
    SpineBottom,
    LeftLeading,
    RightLeading,
    LeftLeadingInter,
    RightLeadingInter,
    Center,
    LeftSpreader,
    RightSpreader,
    LeftWhisker,
    RightWhisker,
}

impl KitePoint {
    pub const COUNT: usize = 11;

    pub const ALL: [KitePoint; Self::COUNT] = [
        KitePoint::Nose,
        KitePoint::SpineBottom,
        KitePoint::LeftLeading,
        KitePoint::RightLeading,
        KitePoint::LeftLeadingInter,
        KitePoint::RightLeadingInter,
        KitePoint::Center,
        KitePoint::LeftSpreader,
        KitePoint::RightSpreader,
        KitePoint::LeftWhisker,
        KitePoint::RightWhisker,
    ];

    pub fn name(self) -> &'static str {
        match self {
            KitePoint::Nose => "NOSE",
            KitePoint::SpineBottom => "SPINE_BOTTOM",
            KitePoint::LeftLeading => "LEFT_LEADING",
            KitePoint::RightLeading => "RIGHT_LEADING",
            KitePoint::LeftLeadingInter => "LEFT_LEADING_INTER",
            KitePoint::RightLeadingInter => "RIGHT_LEADING_INTER",
            KitePoint::Center => "CENTER",
            KitePoint::LeftSpreader => "LEFT_SPREADER",
            KitePoint::RightSpreader => "RIGHT_SPREADER",
            KitePoint::LeftWhisker => "LEFT_WHISKER",
            KitePoint::RightWhisker => "RIGHT_WHISKER",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for KitePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KitePoint {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        KitePoint::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ConfigError::UnknownAnchor(s.to_string()))
    }
}

/// Triangular sail panel.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pub corners: [KitePoint; 3],
    pub vertices: [Vec3; 3],
    /// Unit normal, oriented towards the bridle side (+Z body).
    pub normal: Vec3,
    pub centroid: Vec3,
    /// m²
    pub area: f64,
    pub side: Side,
}

impl Surface {
    fn new(corners: [KitePoint; 3], vertices: [Vec3; 3], side: Side, index: usize) -> Result<Self, ConfigError> {
        let [a, b, c] = vertices;
        let cross = (b - a).cross(&(c - a));
        let area = 0.5 * cross.magnitude();
        let normal = cross
            .normalized()
            .ok_or(ConfigError::DegenerateSurface { index })?;
        let normal = if normal.z < 0.0 { -normal } else { normal };
        Ok(Self {
            corners,
            vertices,
            normal,
            centroid: (a + b + c) / 3.0,
            area,
            side,
        })
    }
}

/// Surface topology of the delta: (corners, side).
const PANELS: [([KitePoint; 3], Side); 4] = [
    ([KitePoint::Nose, KitePoint::LeftLeading, KitePoint::LeftWhisker], Side::Left),
    ([KitePoint::Nose, KitePoint::LeftWhisker, KitePoint::SpineBottom], Side::Left),
    ([KitePoint::Nose, KitePoint::RightWhisker, KitePoint::RightLeading], Side::Right),
    ([KitePoint::Nose, KitePoint::SpineBottom, KitePoint::RightWhisker], Side::Right),
];

/// Body-local point table plus the sail panels built on it.
#[derive(Debug, Clone, PartialEq)]
pub struct KiteGeometry {
    points: [Vec3; KitePoint::COUNT],
    surfaces: Vec<Surface>,
}

impl KiteGeometry {
    /// Standard delta: 1.65 m span, 0.65 m spine, whiskers 15 cm behind the sail.
    pub fn delta() -> Self {
        let width = 1.65;
        let height = 0.65;
        let depth = 0.15;

        let nose = Vec3::new(0.0, height, 0.0);
        let left = Vec3::new(-width / 2.0, 0.0, 0.0);
        let right = Vec3::new(width / 2.0, 0.0, 0.0);

        let mut points = [Vec3::zero(); KitePoint::COUNT];
        points[KitePoint::Nose.index()] = nose;
        points[KitePoint::SpineBottom.index()] = Vec3::zero();
        points[KitePoint::LeftLeading.index()] = left;
        points[KitePoint::RightLeading.index()] = right;
        points[KitePoint::LeftLeadingInter.index()] = nose.lerp(&left, 0.75);
        points[KitePoint::RightLeadingInter.index()] = nose.lerp(&right, 0.75);
        points[KitePoint::Center.index()] = Vec3::new(0.0, height / 4.0, 0.0);
        points[KitePoint::LeftSpreader.index()] = nose.lerp(&left, 0.5);
        points[KitePoint::RightSpreader.index()] = nose.lerp(&right, 0.5);
        points[KitePoint::LeftWhisker.index()] = Vec3::new(-width / 4.0, 0.1, -depth);
        points[KitePoint::RightWhisker.index()] = Vec3::new(width / 4.0, 0.1, -depth);

        // The built-in table always yields valid panels.
        Self::from_point_array(points).unwrap_or_else(|_| unreachable!("delta panels have area"))
    }

    /// Builds the geometry from a name → position table. Every [`KitePoint`]
    /// must be present; unknown names are rejected.
    pub fn from_table(table: &BTreeMap<String, Vec3>) -> Result<Self, ConfigError> {
        let mut slots: [Option<Vec3>; KitePoint::COUNT] = [None; KitePoint::COUNT];
        for (name, position) in table {
            let point: KitePoint = name.parse()?;
            slots[point.index()] = Some(*position);
        }

        let mut points = [Vec3::zero(); KitePoint::COUNT];
        for point in KitePoint::ALL {
            points[point.index()] = slots[point.index()].ok_or(ConfigError::MissingAnchor(point))?;
        }
        Self::from_point_array(points)
    }

    fn from_point_array(points: [Vec3; KitePoint::COUNT]) -> Result<Self, ConfigError> {
        let surfaces = PANELS
            .iter()
            .enumerate()
            .map(|(index, (corners, side))| {
                let vertices = corners.map(|c| points[c.index()]);
                Surface::new(*corners, vertices, *side, index)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { points, surfaces })
    }

    #[inline(always)]
    pub fn point(&self, point: KitePoint) -> Vec3 {
        self.points[point.index()]
    }

    pub fn points(&self) -> impl Iterator<Item = (KitePoint, Vec3)> + '_ {
        KitePoint::ALL.iter().map(move |&p| (p, self.points[p.index()]))
    }

    pub fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    pub fn total_area(&self) -> f64 {
        self.surfaces.iter().map(|s| s.area).sum()
    }

    /// Tip-to-tip distance (m).
    pub fn span(&self) -> f64 {
        self.point(KitePoint::LeftLeading).distance(&self.point(KitePoint::RightLeading))
    }

    /// Isotropic inertia approximation for a thin plate of the given mass:
    /// m·(span² + spine²)/12.
    pub fn default_inertia(&self, mass: f64) -> f64 {
        let spine = self.point(KitePoint::Nose).distance(&self.point(KitePoint::SpineBottom));
        mass * (self.span().powi(2) + spine.powi(2)) / 12.0
    }

    /// Area-weighted centroid of the sail, i.e. the centre of mass when the
    /// mass is spread evenly over the panels.
    pub fn center_of_mass(&self) -> Vec3 {
        let total = self.total_area();
        if total <= 0.0 {
            return Vec3::zero();
        }
        self.surfaces
            .iter()
            .map(|s| s.centroid * (s.area / total))
            .sum()
    }
}

impl Default for KiteGeometry {
    fn default() -> Self {
        Self::delta()
    }
}

/// Bridle layout: which anchors each side ties to and how long the bridles are.
/// The centre attachment is shared by both sides.
#[derive(Debug, Clone, PartialEq)]
pub struct BridleSet {
    pub lengths: BridleLengths,
    nose: KitePoint,
    inter: [KitePoint; 2],
    center: KitePoint,
}

impl BridleSet {
    pub fn from_params(params: &BridleParams) -> Result<Self, ConfigError> {
        let attachments = &params.attachments;
        Ok(Self {
            lengths: params.lengths,
            nose: attachments.nose.parse()?,
            inter: [attachments.inter_left.parse()?, attachments.inter_right.parse()?],
            center: attachments.center.parse()?,
        })
    }

    /// Anchors in trilateration order: nose, intermediate, centre.
    pub fn anchors(&self, side: Side) -> [KitePoint; 3] {
        [self.nose, self.inter[side.index()], self.center]
    }

    /// Rest lengths matching [`BridleSet::anchors`].
    pub fn rest_lengths(&self) -> [f64; 3] {
        self.lengths.to_array()
    }

    /// (anchor, rest length) pairs for one side.
    pub fn bridles(&self, side: Side) -> [(KitePoint, f64); 3] {
        let anchors = self.anchors(side);
        let lengths = self.rest_lengths();
        [(anchors[0], lengths[0]), (anchors[1], lengths[1]), (anchors[2], lengths[2])]
    }

    /// Body-local control point the bridles meet at, on the +Z side of the
    /// sail. `None` if the three lengths cannot meet.
    pub fn local_control_point(&self, geometry: &KiteGeometry, side: Side) -> Option<Vec3> {
        let [a, b, c] = self.anchors(side).map(|p| geometry.point(p));
        let [ra, rb, rc] = self.rest_lengths();
        let [p, q] = trilaterate_exact(a, ra, b, rb, c, rc)?;
        Some(if p.z >= q.z { p } else { q })
    }

    /// Fails if either side's bridles have no common meeting point.
    pub fn check_feasible(&self, geometry: &KiteGeometry) -> Result<(), ConfigError> {
        for side in Side::BOTH {
            if self.local_control_point(geometry, side).is_none() {
                return Err(ConfigError::InfeasibleBridles {
                    side,
                    lengths: self.rest_lengths(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_point_names_round_trip() {
        for point in KitePoint::ALL {
            assert_eq!(point.name().parse::<KitePoint>().unwrap(), point);
        }
        assert_eq!("center".parse::<KitePoint>().unwrap(), KitePoint::Center);
        assert!(matches!(
            "WINGTIP".parse::<KitePoint>(),
            Err(ConfigError::UnknownAnchor(name)) if name == "WINGTIP"
        ));
    }

    #[test]
    fn test_delta_is_mirror_symmetric() {
        let geometry = KiteGeometry::delta();
        let mirror = |v: Vec3| Vec3::new(-v.x, v.y, v.z);
        assert_eq!(
            geometry.point(KitePoint::RightLeadingInter),
            mirror(geometry.point(KitePoint::LeftLeadingInter))
        );

        let surfaces = geometry.surfaces();
        assert_eq!(surfaces.len(), 4);
        assert_relative_eq!(surfaces[0].area, surfaces[2].area, epsilon = 1e-15);
        assert_relative_eq!(surfaces[1].area, surfaces[3].area, epsilon = 1e-15);
        assert_relative_eq!(surfaces[2].normal, mirror(surfaces[0].normal), epsilon = 1e-15);
        assert!(surfaces.iter().all(|s| s.normal.z > 0.0));
    }

    #[test]
    fn test_delta_dimensions() {
        let geometry = KiteGeometry::delta();
        assert_relative_eq!(geometry.span(), 1.65);
        let area = geometry.total_area();
        assert!(area > 0.4 && area < 0.7, "area {area}");
        assert_relative_eq!(geometry.center_of_mass().x, 0.0, epsilon = 1e-12);
        assert!(geometry.default_inertia(0.31) > 0.0);
    }

    #[test]
    fn test_from_table_requires_every_point() {
        let delta = KiteGeometry::delta();
        let mut table: BTreeMap<String, Vec3> =
            delta.points().map(|(p, v)| (p.name().to_string(), v)).collect();
        assert_eq!(KiteGeometry::from_table(&table).unwrap(), delta);

        table.remove("CENTER");
        assert!(matches!(
            KiteGeometry::from_table(&table),
            Err(ConfigError::MissingAnchor(KitePoint::Center))
        ));
    }

    #[test]
    fn test_degenerate_panel_is_rejected() {
        let delta = KiteGeometry::delta();
        let mut table: BTreeMap<String, Vec3> =
            delta.points().map(|(p, v)| (p.name().to_string(), v)).collect();
        table.insert("LEFT_WHISKER".to_string(), Vec3::new(-0.4125, 0.325, 0.0));
        assert!(matches!(
            KiteGeometry::from_table(&table),
            Err(ConfigError::DegenerateSurface { index: 0 })
        ));
    }

    #[test]
    fn test_bridle_set_feasibility() {
        let geometry = KiteGeometry::delta();
        let mut bridles = BridleSet::from_params(&BridleParams::default()).unwrap();
        assert!(bridles.check_feasible(&geometry).is_ok());

        let left = bridles.local_control_point(&geometry, Side::Left).unwrap();
        let right = bridles.local_control_point(&geometry, Side::Right).unwrap();
        assert!(left.x < 0.0 && right.x > 0.0);
        assert!(left.z > 0.0);
        assert_relative_eq!(left.x, -right.x, epsilon = 1e-12);

        bridles.lengths = BridleLengths::uniform(0.1);
        assert!(matches!(
            bridles.check_feasible(&geometry),
            Err(ConfigError::InfeasibleBridles { side: Side::Left, .. })
        ));
    }

    #[test]
    fn test_bad_attachment_name_fails() {
        let mut params = BridleParams::default();
        params.attachments.center = "MIDDLE".to_string();
        assert!(matches!(
            BridleSet::from_params(&params),
            Err(ConfigError::UnknownAnchor(_))
        ));
    }
}
