//! Follow motor: drives a ball toward its owner's anchor
//!
//! The target is the anchor pushed out to a minimum distance from the owner
//! that grows with the ball's radius, so a big ball never sits inside its
//! owner. Motion uses an arrive law: full speed far away, slowing inside
//! `arrive_radius`, braking without overshoot inside `stop_radius`.
//!
//! The motor works on the ground plane. Vertical motion is either locked to
//! a fixed height or (after a launch) free under gravity.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::state::{Body, EntityId, Transform};
use crate::consts::DEGENERATE_SQ;
use crate::flatten;
use crate::tuning::MotorTuning;

/// Vertical handling of the ball
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum VerticalMode {
    /// Pinned to the locked height
    Locked,
    /// Launched; integrates vertical velocity
    Free { gravity: bool },
}

/// What the motor did this step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorStatus {
    /// Accelerating toward the target
    Seeking,
    /// Inside the stop radius, bleeding off speed
    Braking,
    /// Not bound to an owner
    Idle,
}

#[derive(Debug, Clone)]
pub struct FollowMotor {
    max_speed: f32,
    accel: f32,
    decel: f32,
    arrive_radius: f32,
    stop_radius: f32,
    near_speed: f32,
    base_min_distance: f32,
    radius_to_distance: f32,
    extra_buffer: f32,
    locked_y: f32,
    gravity: f32,
    lock_by_default: bool,

    mode: VerticalMode,
    owner: Option<EntityId>,
    anchor_offset: Vec3,
}

impl FollowMotor {
    pub fn new(tuning: &MotorTuning) -> Self {
        Self {
            max_speed: tuning.max_speed.max(0.0),
            accel: tuning.accel.max(0.0),
            decel: tuning.decel.max(0.0),
            arrive_radius: tuning.arrive_radius.max(0.0),
            stop_radius: tuning.stop_radius.max(0.0),
            near_speed: tuning.near_speed.clamp(0.0, tuning.max_speed.max(0.0)),
            base_min_distance: tuning.base_min_distance.max(0.0),
            radius_to_distance: tuning.radius_to_distance.max(0.0),
            extra_buffer: tuning.extra_buffer.max(0.0),
            locked_y: tuning.locked_y,
            gravity: tuning.gravity,
            lock_by_default: tuning.lock_y,
            mode: if tuning.lock_y {
                VerticalMode::Locked
            } else {
                VerticalMode::Free { gravity: true }
            },
            owner: None,
            anchor_offset: Vec3::ZERO,
        }
    }

    /// Follow `owner`'s anchor at `anchor_offset` (owner-local)
    pub fn bind(&mut self, owner: EntityId, anchor_offset: Vec3) {
        self.owner = Some(owner);
        self.anchor_offset = anchor_offset;
    }

    pub fn unbind(&mut self) {
        self.owner = None;
    }

    pub fn owner(&self) -> Option<EntityId> {
        self.owner
    }

    pub fn mode(&self) -> VerticalMode {
        self.mode
    }

    pub fn is_locked(&self) -> bool {
        self.mode == VerticalMode::Locked
    }

    pub fn anchor(&self, owner: &Transform) -> Vec3 {
        owner.transform_point(self.anchor_offset)
    }

    /// Closest the ball may sit to its owner, for a given logical radius
    pub fn min_distance(&self, radius: f32) -> f32 {
        self.base_min_distance + radius.max(0.0) * self.radius_to_distance + self.extra_buffer
    }

    /// Anchor pushed out onto the ring around the owner when it lies inside it.
    /// Returned on the ground plane (y = 0).
    pub fn constrained_target(&self, owner: &Transform, anchor: Vec3, radius: f32) -> Vec3 {
        let origin = flatten(owner.position);
        let mut offset = flatten(anchor) - origin;
        if offset.length_squared() < DEGENERATE_SQ {
            offset = owner.forward() * self.min_distance(radius);
        }
        let min_distance = self.min_distance(radius);
        if offset.length() < min_distance {
            offset = offset.normalize_or(owner.forward()) * min_distance;
        }
        origin + offset
    }

    /// Set velocity for one physics step toward the owner's anchor
    pub fn step(&self, body: &mut Body, owner: &Transform, radius: f32, dt: f32) -> MotorStatus {
        if self.owner.is_none() {
            return MotorStatus::Idle;
        }
        if dt <= 0.0 {
            return MotorStatus::Seeking;
        }

        match self.mode {
            VerticalMode::Locked => body.velocity.y = 0.0,
            VerticalMode::Free { gravity: true } => body.velocity.y += self.gravity * dt,
            VerticalMode::Free { gravity: false } => {}
        }

        let target = self.constrained_target(owner, self.anchor(owner), radius);
        let to_target = target - flatten(body.position);
        let dist = to_target.length();

        if dist <= self.stop_radius {
            self.brake(body, dt);
            return MotorStatus::Braking;
        }

        let dir = to_target / dist;
        let t = if self.arrive_radius <= f32::EPSILON {
            1.0
        } else {
            (dist / self.arrive_radius).clamp(0.0, 1.0)
        };
        let speed_cap = self.near_speed + (self.max_speed - self.near_speed) * t;

        let planar = flatten(body.velocity);
        let desired = dir * speed_cap;
        let dv = (desired - planar).clamp_length_max(self.accel * dt);
        let planar = (planar + dv).clamp_length_max(speed_cap);
        body.velocity.x = planar.x;
        body.velocity.z = planar.z;
        MotorStatus::Seeking
    }

    /// Reduce planar speed toward zero without reversing
    fn brake(&self, body: &mut Body, dt: f32) {
        let planar = flatten(body.velocity);
        let speed = planar.length();
        if speed <= f32::EPSILON {
            body.velocity.x = 0.0;
            body.velocity.z = 0.0;
            return;
        }
        let new_speed = (speed - self.decel * dt).max(0.0);
        let planar = planar * (new_speed / speed);
        body.velocity.x = planar.x;
        body.velocity.z = planar.z;
    }

    /// Move the body by its velocity, then enforce the vertical lock
    pub fn integrate(&self, body: &mut Body, dt: f32) {
        body.position += body.velocity * dt;
        if self.is_locked() {
            body.position.y = self.locked_y;
            body.velocity.y = 0.0;
        }
    }

    /// Teleport onto `point` at rest
    pub fn snap(&self, body: &mut Body, point: Vec3) {
        body.position = point;
        body.velocity = Vec3::ZERO;
        if self.is_locked() {
            body.position.y = self.locked_y;
        }
    }

    /// Hand the ball over to free vertical motion with an impulse
    pub fn release_vertical_lock(&mut self, body: &mut Body, impulse: Vec3, enable_gravity: bool) {
        self.mode = VerticalMode::Free {
            gravity: enable_gravity,
        };
        body.velocity += impulse;
    }

    /// Back to the configured vertical mode
    pub fn relock(&mut self, body: &mut Body) {
        if !self.lock_by_default {
            self.mode = VerticalMode::Free { gravity: true };
            return;
        }
        self.mode = VerticalMode::Locked;
        body.position.y = self.locked_y;
        body.velocity.y = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 50.0;

    fn ring_motor() -> FollowMotor {
        let tuning = MotorTuning {
            base_min_distance: 1.0,
            radius_to_distance: 0.0,
            extra_buffer: 0.0,
            ..Default::default()
        };
        let mut m = FollowMotor::new(&tuning);
        m.bind(1, Vec3::new(0.0, 0.0, 0.3));
        m
    }

    #[test]
    fn test_arrive_band_caps_speed_and_acceleration() {
        let tuning = MotorTuning {
            base_min_distance: 0.0,
            radius_to_distance: 0.0,
            extra_buffer: 0.0,
            ..Default::default()
        };
        let mut m = FollowMotor::new(&tuning);
        m.bind(1, Vec3::new(0.0, 0.0, 5.0));
        let owner = Transform::default();
        let target = Vec3::new(0.0, 0.0, 5.0);
        let cap = |dist: f32| {
            let t = (dist / tuning.arrive_radius).clamp(0.0, 1.0);
            tuning.near_speed + (tuning.max_speed - tuning.near_speed) * t
        };

        let mut body = Body {
            position: Vec3::new(0.0, tuning.locked_y, 5.0 - tuning.arrive_radius / 2.0),
            velocity: Vec3::ZERO,
        };
        assert_eq!(m.step(&mut body, &owner, 0.0, DT), MotorStatus::Seeking);
        assert!(flatten(body.velocity).length() <= tuning.accel * DT + 1e-5);

        for _ in 0..100 {
            let dist = (flatten(body.position) - target).length();
            if m.step(&mut body, &owner, 0.0, DT) == MotorStatus::Seeking {
                let speed = flatten(body.velocity).length();
                assert!(speed <= cap(dist) + 1e-4, "speed {speed} over cap at {dist}");
            }
            m.integrate(&mut body, DT);
        }
        assert!((flatten(body.position) - target).length() <= tuning.arrive_radius);
    }

    #[test]
    fn test_anchor_inside_ring_is_pushed_out() {
        let m = ring_motor();
        let owner = Transform::default();
        let target = m.constrained_target(&owner, m.anchor(&owner), 0.5);
        assert!((target.length() - 1.0).abs() < 1e-5);
        assert!(target.z > 0.0);
    }

    #[test]
    fn test_anchor_outside_ring_is_kept() {
        let m = ring_motor();
        let owner = Transform::default();
        let anchor = Vec3::new(2.0, 0.0, 0.0);
        assert_eq!(m.constrained_target(&owner, anchor, 0.5), anchor);
    }

    #[test]
    fn test_degenerate_anchor_uses_forward() {
        let m = ring_motor();
        let owner = Transform::new(Vec3::new(5.0, 0.0, 5.0), std::f32::consts::FRAC_PI_2);
        let target = m.constrained_target(&owner, owner.position, 0.0);
        assert!((target - Vec3::new(6.0, 0.0, 5.0)).length() < 1e-5);
    }

    #[test]
    fn test_min_distance_grows_with_radius() {
        let m = FollowMotor::new(&MotorTuning::default());
        assert!(m.min_distance(2.0) > m.min_distance(0.5));
        // 0.7 + 1.0 * 1.1 + 0.05
        assert!((m.min_distance(1.0) - 1.85).abs() < 1e-5);
    }

    #[test]
    fn test_converges_without_overshoot() {
        let mut m = FollowMotor::new(&MotorTuning::default());
        m.bind(1, Vec3::new(0.0, 0.0, 3.0));
        let owner = Transform::default();
        let mut body = Body {
            position: Vec3::new(0.0, 0.5, -10.0),
            velocity: Vec3::ZERO,
        };
        for _ in 0..500 {
            m.step(&mut body, &owner, 0.2, DT);
            m.integrate(&mut body, DT);
            assert!(body.position.z < 3.2);
        }
        assert!((body.position.z - 3.0).abs() < 0.1);
        assert!(flatten(body.velocity).length() < 0.5);
        assert_eq!(body.position.y, 0.5);
    }

    #[test]
    fn test_speed_never_exceeds_max() {
        let mut m = FollowMotor::new(&MotorTuning::default());
        m.bind(1, Vec3::new(0.0, 0.0, 100.0));
        let owner = Transform::default();
        let mut body = Body::default();
        for _ in 0..200 {
            m.step(&mut body, &owner, 0.2, DT);
            m.integrate(&mut body, DT);
            assert!(flatten(body.velocity).length() <= 8.0 + 1e-4);
        }
    }

    #[test]
    fn test_brake_stops_without_reversing() {
        let mut m = FollowMotor::new(&MotorTuning::default());
        m.bind(1, Vec3::new(0.0, 0.0, 2.0));
        let owner = Transform::default();
        let mut body = Body {
            position: Vec3::new(0.0, 0.5, 2.0),
            velocity: Vec3::new(0.0, 0.0, 3.0),
        };
        for _ in 0..20 {
            assert_eq!(m.step(&mut body, &owner, 0.0, DT), MotorStatus::Braking);
            assert!(body.velocity.z >= 0.0);
        }
        assert_eq!(body.velocity, Vec3::ZERO);
    }

    #[test]
    fn test_unbound_motor_is_idle() {
        let m = FollowMotor::new(&MotorTuning::default());
        let mut body = Body::default();
        assert_eq!(m.step(&mut body, &Transform::default(), 0.2, DT), MotorStatus::Idle);
    }

    #[test]
    fn test_launch_then_relock() {
        let mut m = FollowMotor::new(&MotorTuning::default());
        m.bind(1, Vec3::Z);
        let owner = Transform::default();
        let mut body = Body {
            position: Vec3::new(0.0, 0.5, 1.0),
            velocity: Vec3::ZERO,
        };
        m.release_vertical_lock(&mut body, Vec3::new(0.0, 4.0, 0.0), true);
        m.step(&mut body, &owner, 0.2, DT);
        m.integrate(&mut body, DT);
        assert!(body.position.y > 0.5);
        assert!(body.velocity.y < 4.0);

        m.relock(&mut body);
        assert!(m.is_locked());
        assert_eq!(body.position.y, 0.5);
        assert_eq!(body.velocity.y, 0.0);
    }
}
