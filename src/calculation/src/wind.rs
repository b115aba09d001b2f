//! Ambient wind and the apparent wind seen by the kite.

use std::f64::consts::TAU;

use crate::constants::model_params::WindParams;
use crate::vector::Vec3;

/// km/h → m/s
pub const KMH_TO_MS: f64 = 1.0 / 3.6;

/// Turbulence harmonics as (relative amplitude, angular frequency rad/s, phase).
/// Along-wind, cross-wind and vertical components each get their own set.
const GUST_HARMONICS: [(f64, f64, f64); 3] = [(0.6, 1.3, 0.0), (0.3, 2.9, 1.1), (0.1, 7.1, 2.3)];
const LATERAL_HARMONICS: [(f64, f64, f64); 2] = [(0.35, 0.7, 0.4), (0.15, 3.7, 1.9)];
const VERTICAL_HARMONICS: [(f64, f64, f64); 2] = [(0.2, 1.7, 2.0), (0.05, 5.3, 0.6)];

/// Supplies the wind the sail feels each step.
pub trait WindModel {
    /// Advances the model by `dt` and returns ambient wind minus
    /// `kite_velocity` (m/s, world frame).
    fn apparent_wind(&mut self, kite_velocity: Vec3, dt: f64) -> Vec3;

    /// Mean ambient wind, without turbulence.
    fn mean_wind(&self) -> Vec3;

    /// Unit vector the wind blows towards.
    fn downwind(&self) -> Vec3 {
        self.mean_wind().normalized_or(-Vec3::unit_z())
    }

    /// Restarts any time-dependent state.
    fn reset(&mut self) {}
}

fn harmonics(set: &[(f64, f64, f64)], t: f64) -> f64 {
    set.iter().map(|&(amplitude, omega, phase)| amplitude * (omega * t + phase).sin()).sum()
}

/// Horizontal wind of constant mean with reproducible sinusoidal turbulence.
///
/// Direction 0° blows towards -Z, 90° towards +X.
#[derive(Debug, Clone, PartialEq)]
pub struct SteadyWind {
    speed: f64,
    direction: f64,
    turbulence: f64,
    time: f64,
}

impl SteadyWind {
    pub fn from_params(params: &WindParams) -> Self {
        let mut wind = Self { speed: 0.0, direction: 0.0, turbulence: 0.0, time: 0.0 };
        wind.set_params(params);
        wind
    }

    pub fn calm() -> Self {
        Self { speed: 0.0, direction: 0.0, turbulence: 0.0, time: 0.0 }
    }

    pub fn set_params(&mut self, params: &WindParams) {
        self.set_speed_kmh(params.speed_kmh);
        self.set_direction_deg(params.direction_deg);
        self.set_turbulence(params.turbulence);
    }

    /// Mean speed (m/s).
    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn set_speed_kmh(&mut self, speed_kmh: f64) {
        self.speed = (speed_kmh * KMH_TO_MS).max(0.0);
    }

    pub fn set_direction_deg(&mut self, degrees: f64) {
        self.direction = degrees.to_radians().rem_euclid(TAU);
    }

    /// Turbulence fraction, clamped to [0, 1].
    pub fn set_turbulence(&mut self, turbulence: f64) {
        self.turbulence = turbulence.clamp(0.0, 1.0);
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    fn direction_vector(&self) -> Vec3 {
        let (sin, cos) = self.direction.sin_cos();
        Vec3::new(sin, 0.0, -cos)
    }

    /// Ambient wind, turbulence included, at time `t`.
    pub fn ambient_at(&self, t: f64) -> Vec3 {
        let along = self.direction_vector();
        let base = along * self.speed;
        if self.turbulence <= 0.0 {
            return base;
        }
        let across = along.cross(&Vec3::up());
        let scale = self.turbulence * self.speed;
        base + along * (scale * harmonics(&GUST_HARMONICS, t))
            + across * (scale * harmonics(&LATERAL_HARMONICS, t))
            + Vec3::up() * (scale * harmonics(&VERTICAL_HARMONICS, t))
    }
}

impl Default for SteadyWind {
    fn default() -> Self {
        Self::from_params(&WindParams::default())
    }
}

impl WindModel for SteadyWind {
    fn apparent_wind(&mut self, kite_velocity: Vec3, dt: f64) -> Vec3 {
        if dt.is_finite() && dt > 0.0 {
            self.time += dt;
        }
        self.ambient_at(self.time) - kite_velocity
    }

    fn mean_wind(&self) -> Vec3 {
        self.direction_vector() * self.speed
    }

    fn reset(&mut self) {
        self.time = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn wind(speed_kmh: f64, direction_deg: f64, turbulence: f64) -> SteadyWind {
        SteadyWind::from_params(&WindParams { speed_kmh, direction_deg, turbulence })
    }

    #[test]
    fn test_direction_convention() {
        assert_relative_eq!(wind(36.0, 0.0, 0.0).mean_wind(), Vec3::new(0.0, 0.0, -10.0), epsilon = 1e-12);
        assert_relative_eq!(wind(36.0, 90.0, 0.0).mean_wind(), Vec3::new(10.0, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(wind(36.0, 90.0, 0.0).downwind(), Vec3::unit_x(), epsilon = 1e-12);
    }

    #[test]
    fn test_apparent_wind_subtracts_kite_velocity() {
        let mut w = wind(18.0, 0.0, 0.0);
        let apparent = w.apparent_wind(Vec3::new(1.0, 0.0, -2.0), 0.1);
        assert_relative_eq!(apparent, Vec3::new(-1.0, 0.0, -3.0), epsilon = 1e-12);
        assert_relative_eq!(w.time(), 0.1);
        w.reset();
        assert_eq!(w.time(), 0.0);
    }

    #[test]
    fn test_turbulence_is_bounded_and_reproducible() {
        let mut a = wind(18.0, 30.0, 0.2);
        let mut b = wind(18.0, 30.0, 0.2);
        let mean = a.mean_wind();
        // Amplitudes per axis sum to 1.0, 0.5 and 0.25.
        let bound = 0.2 * 5.0 * (1.0f64 + 0.25 + 0.0625).sqrt();
        let mut varied = false;
        for _ in 0..600 {
            let wa = a.apparent_wind(Vec3::zero(), 1.0 / 60.0);
            let wb = b.apparent_wind(Vec3::zero(), 1.0 / 60.0);
            assert_eq!(wa, wb);
            assert!(wa.distance(&mean) <= bound + 1e-12);
            varied |= wa.distance(&mean) > 1e-3;
        }
        assert!(varied);
    }

    #[test]
    fn test_calm_and_negative_speed() {
        let mut w = SteadyWind::calm();
        assert_eq!(w.apparent_wind(Vec3::zero(), 0.1), Vec3::zero());
        w.set_speed_kmh(-5.0);
        assert_eq!(w.speed(), 0.0);
    }
}
