//! Snowball Clash - simulation core of a grow-and-consume arena game
//!
//! Core modules:
//! - `sim`: Deterministic simulation (growth, combat, lifecycle, spawning, follow motor)
//! - `tuning`: Data-driven game balance
//!
//! Rendering, input capture, camera framing, VFX and AI path planning are
//! collaborators outside this crate. They talk to the simulation through
//! [`sim::TickInput`], [`sim::GameEvent`] and the read-only accessors on
//! [`sim::MatchState`].

pub mod sim;
pub mod tuning;

pub use tuning::{Tuning, TuningError};

use glam::{Vec2, Vec3};

/// Game configuration constants
pub mod consts {
    /// Fixed physics timestep (50 Hz, the usual fixed-update rate)
    pub const SIM_DT: f32 = 1.0 / 50.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;
    /// Longest frame the stepper will try to catch up on (seconds)
    pub const MAX_FRAME_DT: f32 = 0.1;

    /// Squared length below which a planar direction is treated as degenerate
    pub const DEGENERATE_SQ: f32 = 0.000_001;
}

/// Drop the vertical component (gameplay happens on the XZ plane)
#[inline]
pub fn flatten(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

/// Project a world point onto the XZ plane as a 2D vector
#[inline]
pub fn planar(v: Vec3) -> Vec2 {
    Vec2::new(v.x, v.z)
}

/// Lift a planar XZ vector back into world space at the given height
#[inline]
pub fn unplanar(v: Vec2, y: f32) -> Vec3 {
    Vec3::new(v.x, y, v.y)
}

/// Forward direction on the XZ plane for a yaw angle (radians, 0 = +Z)
#[inline]
pub fn yaw_forward(yaw: f32) -> Vec3 {
    Vec3::new(yaw.sin(), 0.0, yaw.cos())
}

/// Rotate a local-space offset by a yaw angle around +Y
#[inline]
pub fn rotate_yaw(local: Vec3, yaw: f32) -> Vec3 {
    let (s, c) = yaw.sin_cos();
    Vec3::new(local.x * c + local.z * s, local.y, -local.x * s + local.z * c)
}

/// Inverse of lerp, clamped to [0, 1]. Returns 0 for an empty range.
#[inline]
pub fn inverse_lerp(a: f32, b: f32, value: f32) -> f32 {
    if (b - a).abs() <= f32::EPSILON {
        0.0
    } else {
        ((value - a) / (b - a)).clamp(0.0, 1.0)
    }
}
