//! Pilot input: where the two line handles are.

use crate::constants::model_params::BarParams;
use crate::geometry::Side;
use crate::vector::Vec3;

/// World positions of the left and right handles (m).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HandlePair {
    pub left: Vec3,
    pub right: Vec3,
}

impl HandlePair {
    pub fn new(left: Vec3, right: Vec3) -> Self {
        Self { left, right }
    }

    #[inline(always)]
    pub fn get(&self, side: Side) -> Vec3 {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    /// Pilot reference point between the hands.
    pub fn midpoint(&self) -> Vec3 {
        (self.left + self.right) * 0.5
    }
}

/// Source of handle positions, polled once per step.
pub trait ControlInput {
    fn handle_positions(&self) -> HandlePair;

    /// Steering input in [-1, 1]. Informational; the physics only sees the
    /// handles.
    fn bar_rotation(&self) -> f64 {
        0.0
    }
}

impl ControlInput for HandlePair {
    fn handle_positions(&self) -> HandlePair {
        *self
    }
}

/// Rigid control bar yawed about the vertical axis through its centre.
///
/// Positive rotation draws the right handle back towards +Z (away from a kite
/// flying downwind at -Z) and pushes the left handle forward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlBar {
    center: Vec3,
    width: f64,
    /// rad at full input
    max_rotation: f64,
    rotation: f64,
}

impl ControlBar {
    pub fn new(center: Vec3, params: &BarParams) -> Self {
        Self {
            center,
            width: params.width,
            max_rotation: params.max_rotation_deg.to_radians(),
            rotation: 0.0,
        }
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn set_center(&mut self, center: Vec3) {
        self.center = center;
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    /// Sets the steering input, clamped to [-1, 1]. Non-finite input centres
    /// the bar.
    pub fn set_rotation(&mut self, input: f64) {
        self.rotation = if input.is_finite() { input.clamp(-1.0, 1.0) } else { 0.0 };
    }

    /// Current yaw of the bar (rad).
    pub fn yaw(&self) -> f64 {
        self.rotation * self.max_rotation
    }
}

impl ControlInput for ControlBar {
    fn handle_positions(&self) -> HandlePair {
        let (sin, cos) = self.yaw().sin_cos();
        let half = Vec3::new(cos, 0.0, sin) * (self.width / 2.0);
        HandlePair::new(self.center - half, self.center + half)
    }

    fn bar_rotation(&self) -> f64 {
        self.rotation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_centred_bar() {
        let bar = ControlBar::new(Vec3::zero(), &BarParams::default());
        let handles = bar.handle_positions();
        assert_relative_eq!(handles.left, Vec3::new(-0.3, 0.0, 0.0));
        assert_relative_eq!(handles.right, Vec3::new(0.3, 0.0, 0.0));
        assert_relative_eq!(handles.midpoint(), Vec3::zero());
    }

    #[test]
    fn test_full_rotation_pulls_right_handle_back() {
        let mut bar = ControlBar::new(Vec3::new(0.0, 1.0, 0.0), &BarParams::default());
        bar.set_rotation(1.0);
        let handles = bar.handle_positions();
        assert_relative_eq!(handles.right.z, 0.15, epsilon = 1e-12);
        assert_relative_eq!(handles.left.z, -0.15, epsilon = 1e-12);
        assert_relative_eq!(handles.left.distance(&handles.right), 0.6, epsilon = 1e-12);
        assert_relative_eq!(handles.midpoint(), bar.center(), epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_input_is_clamped() {
        let mut bar = ControlBar::new(Vec3::zero(), &BarParams::default());
        bar.set_rotation(4.0);
        assert_eq!(bar.bar_rotation(), 1.0);
        assert_relative_eq!(bar.yaw(), 30f64.to_radians());
        bar.set_rotation(f64::NAN);
        assert_eq!(bar.bar_rotation(), 0.0);
    }

    #[test]
    fn test_moving_the_bar_keeps_spacing() {
        let mut bar = ControlBar::new(Vec3::zero(), &BarParams::default());
        bar.set_rotation(-0.5);
        bar.set_center(Vec3::new(2.0, 1.2, 1.0));
        let handles = bar.handle_positions();
        assert_relative_eq!(handles.midpoint(), Vec3::new(2.0, 1.2, 1.0), epsilon = 1e-12);
        assert_relative_eq!(handles.left.distance(&handles.right), bar.width(), epsilon = 1e-12);
        assert!(handles.left.z > handles.right.z);
    }
}
