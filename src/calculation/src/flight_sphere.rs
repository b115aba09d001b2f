//! Flight sphere (wind window) around the pilot, for zone readouts.

use std::fmt;

use crate::constants::model_params::BridleLengths;
use crate::vector::Vec3;

const ZENITH_ELEVATION_DEG: f64 = 70.0;
const EDGE_AZIMUTH_DEG: f64 = 60.0;
const POWER_ELEVATION_DEG: f64 = 35.0;
const POWER_AZIMUTH_DEG: f64 = 30.0;

/// Region of the wind window the kite is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightZone {
    /// Low and central, full pull.
    Power,
    Transition,
    /// Side of the window.
    Edge,
    /// Overhead.
    Zenith,
}

impl fmt::Display for FlightZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlightZone::Power => "power",
            FlightZone::Transition => "transition",
            FlightZone::Edge => "edge",
            FlightZone::Zenith => "zenith",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightSphere {
    center: Vec3,
    radius: f64,
    downwind: Vec3,
}

impl FlightSphere {
    /// Sphere of radius `line_length + mean(bridles)` around `center`.
    /// `downwind` only needs a horizontal component; a vertical or zero
    /// vector falls back to -Z.
    pub fn new(center: Vec3, line_length: f64, bridles: &BridleLengths, downwind: Vec3) -> Self {
        let mut sphere = Self {
            center,
            radius: line_length + bridles.mean(),
            downwind: -Vec3::unit_z(),
        };
        sphere.set_downwind(downwind);
        sphere
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn set_downwind(&mut self, downwind: Vec3) {
        self.downwind = Vec3::new(downwind.x, 0.0, downwind.z).normalized_or(-Vec3::unit_z());
    }

    /// Angle above the horizon seen from the centre (rad).
    pub fn elevation(&self, position: &Vec3) -> f64 {
        let rel = *position - self.center;
        let distance = rel.magnitude();
        if distance < f64::EPSILON {
            return 0.0;
        }
        (rel.y / distance).clamp(-1.0, 1.0).asin()
    }

    /// Horizontal angle from the downwind direction (rad), positive to the
    /// pilot's right when facing downwind.
    pub fn azimuth(&self, position: &Vec3) -> f64 {
        let rel = *position - self.center;
        let right = self.downwind.cross(&Vec3::up());
        let (across, along) = (rel.dot(&right), rel.dot(&self.downwind));
        if across == 0.0 && along == 0.0 { 0.0 } else { across.atan2(along) }
    }

    /// Distance from the centre as a fraction of the radius.
    pub fn normalized_distance(&self, position: &Vec3) -> f64 {
        position.distance(&self.center) / self.radius
    }

    pub fn classify(&self, position: &Vec3) -> FlightZone {
        let elevation = self.elevation(position).to_degrees();
        let azimuth = self.azimuth(position).to_degrees().abs();
        if elevation >= ZENITH_ELEVATION_DEG {
            FlightZone::Zenith
        } else if azimuth >= EDGE_AZIMUTH_DEG {
            FlightZone::Edge
        } else if elevation < POWER_ELEVATION_DEG && azimuth < POWER_AZIMUTH_DEG {
            FlightZone::Power
        } else {
            FlightZone::Transition
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sphere() -> FlightSphere {
        FlightSphere::new(Vec3::zero(), 15.0, &BridleLengths::uniform(0.65), -Vec3::unit_z())
    }

    fn at(elevation_deg: f64, azimuth_deg: f64) -> Vec3 {
        let (e, a) = (elevation_deg.to_radians(), azimuth_deg.to_radians());
        Vec3::new(e.cos() * a.sin(), e.sin(), -e.cos() * a.cos()) * 15.65
    }

    #[test]
    fn test_radius_and_distance() {
        let s = sphere();
        assert_relative_eq!(s.radius(), 15.65);
        assert_relative_eq!(s.normalized_distance(&at(40.0, 10.0)), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_angles() {
        let s = sphere();
        assert_relative_eq!(s.elevation(&at(40.0, 10.0)).to_degrees(), 40.0, epsilon = 1e-9);
        assert_relative_eq!(s.azimuth(&at(40.0, 10.0)).to_degrees(), 10.0, epsilon = 1e-9);
        // Right of the pilot facing downwind (-Z) is +X.
        assert!(s.azimuth(&Vec3::new(3.0, 5.0, -10.0)) > 0.0);
    }

    #[test]
    fn test_zones() {
        let s = sphere();
        assert_eq!(s.classify(&at(20.0, 0.0)), FlightZone::Power);
        assert_eq!(s.classify(&at(50.0, 10.0)), FlightZone::Transition);
        assert_eq!(s.classify(&at(20.0, 45.0)), FlightZone::Transition);
        assert_eq!(s.classify(&at(20.0, -75.0)), FlightZone::Edge);
        assert_eq!(s.classify(&at(80.0, 75.0)), FlightZone::Zenith);
        assert_eq!(s.classify(&Vec3::zero()), FlightZone::Power);
    }

    #[test]
    fn test_downwind_follows_wind() {
        let mut s = sphere();
        s.set_downwind(Vec3::new(5.0, 1.0, 0.0));
        assert_relative_eq!(s.azimuth(&Vec3::new(10.0, 2.0, 0.0)), 0.0, epsilon = 1e-12);
        assert_eq!(s.classify(&Vec3::new(0.0, 2.0, -10.0)), FlightZone::Edge);
    }
}
