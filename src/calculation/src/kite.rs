//! Rigid-body state of the kite.

use crate::error::{NumericFault, Quantity, Stage};
use crate::geometry::{KiteGeometry, KitePoint};
use crate::vector::{Quaternion, Vec3};

/// Kinematic state, small enough to copy for rollback.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KiteState {
    pub position: Vec3,
    pub orientation: Quaternion,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
}

impl KiteState {
    pub fn at_rest(position: Vec3, orientation: Quaternion) -> Self {
        Self {
            position,
            orientation,
            velocity: Vec3::zero(),
            angular_velocity: Vec3::zero(),
        }
    }

    /// First non-finite quantity, if any.
    pub fn check_finite(&self, stage: Stage) -> Result<(), NumericFault> {
        let fault = |quantity| Err(NumericFault::new(stage, quantity));
        if !self.position.is_finite() {
            fault(Quantity::Position)
        } else if !self.velocity.is_finite() {
            fault(Quantity::Velocity)
        } else if !self.orientation.is_finite() {
            fault(Quantity::Orientation)
        } else if !self.angular_velocity.is_finite() {
            fault(Quantity::AngularVelocity)
        } else {
            Ok(())
        }
    }
}

/// The kite: geometry, mass properties and current state.
#[derive(Debug, Clone, PartialEq)]
pub struct KiteBody {
    pub state: KiteState,
    pub mass: f64,
    /// Isotropic moment of inertia (kg·m²)
    pub inertia: f64,
    geometry: KiteGeometry,
}

impl KiteBody {
    pub fn new(geometry: KiteGeometry, mass: f64, inertia: f64) -> Self {
        Self {
            state: KiteState::default(),
            mass,
            inertia,
            geometry,
        }
    }

    pub fn geometry(&self) -> &KiteGeometry {
        &self.geometry
    }

    pub fn inv_mass(&self) -> f64 {
        1.0 / self.mass
    }

    pub fn inv_inertia(&self) -> f64 {
        1.0 / self.inertia
    }

    pub fn position(&self) -> Vec3 {
        self.state.position
    }

    pub fn orientation(&self) -> Quaternion {
        self.state.orientation
    }

    /// Body-local point to world.
    #[inline(always)]
    pub fn to_world(&self, local: &Vec3) -> Vec3 {
        self.state.position + self.state.orientation.rotate(local)
    }

    pub fn world_point(&self, point: KitePoint) -> Vec3 {
        self.to_world(&self.geometry.point(point))
    }

    /// World velocity of a material point given as a world-space offset from
    /// the body origin.
    pub fn point_velocity(&self, offset: &Vec3) -> Vec3 {
        self.state.velocity + self.state.angular_velocity.cross(offset)
    }

    /// Lowest world point of the frame, as (point, world position).
    pub fn lowest_point(&self) -> (KitePoint, Vec3) {
        self.geometry
            .points()
            .map(|(p, local)| (p, self.to_world(&local)))
            .fold((KitePoint::Nose, Vec3::new(0.0, f64::INFINITY, 0.0)), |low, candidate| {
                if candidate.1.y < low.1.y { candidate } else { low }
            })
    }
}
