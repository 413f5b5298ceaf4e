//! Distance-driven ball growth
//!
//! A ball grows from how far it has rolled. Two values come out of this:
//! - the logical radius, which every gameplay decision reads
//! - the visual scale, a smoothed diameter for rendering only
//!
//! Combat and the follow motor must only ever read [`GrowthModel::radius`].

use glam::Vec3;

use crate::inverse_lerp;
use crate::tuning::GrowthTuning;

/// Monotonic piecewise-linear curve on [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct GrowthCurve {
    keys: Vec<(f32, f32)>,
}

impl Default for GrowthCurve {
    fn default() -> Self {
        Self::linear()
    }
}

impl GrowthCurve {
    pub fn linear() -> Self {
        Self {
            keys: vec![(0.0, 0.0), (1.0, 1.0)],
        }
    }

    /// Build a curve from `[t, value]` keys.
    ///
    /// Keys are sorted by `t` and clamped to [0, 1]. A key whose value drops
    /// below an earlier one is raised to keep the curve non-decreasing.
    pub fn from_keys(keys: &[[f32; 2]]) -> Self {
        let mut sorted: Vec<(f32, f32)> = keys
            .iter()
            .filter(|k| k[0].is_finite() && k[1].is_finite())
            .map(|k| (k[0].clamp(0.0, 1.0), k[1].clamp(0.0, 1.0)))
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        if sorted.is_empty() {
            log::warn!("Empty growth curve, falling back to linear");
            return Self::linear();
        }

        let mut floor = 0.0_f32;
        let mut repaired = false;
        for key in &mut sorted {
            if key.1 < floor {
                key.1 = floor;
                repaired = true;
            }
            floor = key.1;
        }
        if repaired {
            log::warn!("Growth curve was not monotonic; flattened the dips");
        }

        Self { keys: sorted }
    }

    /// Evaluate at `t`, result clamped to [0, 1]
    pub fn evaluate(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        let first = self.keys[0];
        if t <= first.0 {
            return first.1;
        }
        for pair in self.keys.windows(2) {
            let (t0, v0) = pair[0];
            let (t1, v1) = pair[1];
            if t <= t1 {
                let span = t1 - t0;
                if span <= f32::EPSILON {
                    return v1;
                }
                return v0 + (v1 - v0) * ((t - t0) / span);
            }
        }
        self.keys[self.keys.len() - 1].1
    }
}

/// Growth state of one ball
#[derive(Debug, Clone)]
pub struct GrowthModel {
    start_radius: f32,
    max_radius: f32,
    radius_per_unit: f32,
    min_move_delta: f32,
    scale_smooth: f32,
    curve: GrowthCurve,

    accumulated_distance: f32,
    radius: f32,
    visual_scale: f32,
    /// Last sampled world position (for `sample`)
    last_position: Option<Vec3>,
}

impl GrowthModel {
    pub fn new(tuning: &GrowthTuning) -> Self {
        let start_radius = tuning.start_radius.max(0.0001);
        let max_radius = tuning.max_radius.max(start_radius);
        Self {
            start_radius,
            max_radius,
            radius_per_unit: tuning.radius_per_unit.max(0.0),
            min_move_delta: tuning.min_move_delta.max(0.0),
            scale_smooth: tuning.scale_smooth,
            curve: GrowthCurve::from_keys(&tuning.curve),
            accumulated_distance: 0.0,
            radius: start_radius,
            visual_scale: start_radius * 2.0,
            last_position: None,
        }
    }

    /// Authoritative radius for gameplay
    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Smoothed diameter for rendering. Never use for gameplay.
    #[inline]
    pub fn visual_scale(&self) -> f32 {
        self.visual_scale
    }

    /// Growth progress in [0, 1] (camera / UI)
    pub fn normalized(&self) -> f32 {
        inverse_lerp(self.start_radius, self.max_radius, self.radius)
    }

    pub fn accumulated_distance(&self) -> f32 {
        self.accumulated_distance
    }

    pub fn start_radius(&self) -> f32 {
        self.start_radius
    }

    pub fn max_radius(&self) -> f32 {
        self.max_radius
    }

    /// Accumulate a movement delta. Returns true if it counted.
    pub fn update(&mut self, delta_position: Vec3) -> bool {
        let delta = delta_position.length();
        if !delta.is_finite() || delta < self.min_move_delta {
            return false;
        }
        self.accumulated_distance += delta;
        self.radius = self.radius_for_distance(self.accumulated_distance);
        true
    }

    /// Accumulate the distance from the previous sample to `position`
    pub fn sample(&mut self, position: Vec3) -> bool {
        let Some(last) = self.last_position else {
            self.last_position = Some(position);
            return false;
        };
        self.last_position = Some(position);
        self.update(position - last)
    }

    /// Move the sampling origin without counting the jump as travel
    pub fn rebase(&mut self, position: Vec3) {
        self.last_position = Some(position);
    }

    /// Ease the visual scale toward the logical diameter
    pub fn smooth_visual(&mut self, dt: f32) {
        let target = self.radius * 2.0;
        let k = 1.0 - (-self.scale_smooth * dt).exp();
        self.visual_scale += (target - self.visual_scale) * k;
    }

    /// Back to a fresh ball at `position`
    pub fn reset(&mut self, position: Vec3) {
        self.accumulated_distance = 0.0;
        self.radius = self.start_radius;
        self.visual_scale = self.start_radius * 2.0;
        self.last_position = Some(position);
    }

    /// Radius for a total travelled distance
    pub fn radius_for_distance(&self, distance: f32) -> f32 {
        let raw = (self.start_radius + distance * self.radius_per_unit)
            .clamp(self.start_radius, self.max_radius);
        let t = inverse_lerp(self.start_radius, self.max_radius, raw);
        let curved = self.curve.evaluate(t).clamp(0.0, 1.0);
        self.start_radius + (self.max_radius - self.start_radius) * curved
    }
}
