//! Data-driven game balance
//!
//! Loaded from JSON. Every field has a default, so a tuning file only needs
//! to mention the values it changes.

use std::fmt;
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Errors produced while loading a tuning file
#[derive(Debug)]
pub enum TuningError {
    /// The file could not be read
    Io(std::io::Error),
    /// The contents were not valid tuning JSON
    Parse(serde_json::Error),
}

impl fmt::Display for TuningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TuningError::Io(err) => write!(f, "failed to read tuning file: {err}"),
            TuningError::Parse(err) => write!(f, "invalid tuning json: {err}"),
        }
    }
}

impl std::error::Error for TuningError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TuningError::Io(err) => Some(err),
            TuningError::Parse(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for TuningError {
    fn from(err: std::io::Error) -> Self {
        TuningError::Io(err)
    }
}

impl From<serde_json::Error> for TuningError {
    fn from(err: serde_json::Error) -> Self {
        TuningError::Parse(err)
    }
}

/// Distance-based ball growth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthTuning {
    /// World radius of a freshly spawned ball
    pub start_radius: f32,
    pub max_radius: f32,
    /// Radius gained per world unit travelled (before the curve)
    pub radius_per_unit: f32,
    /// Per-sample movement below this is treated as jitter
    pub min_move_delta: f32,
    /// Exponential rate of the visual scale smoothing
    pub scale_smooth: f32,
    /// Growth curve keys `[t, value]`, both in 0..1
    pub curve: Vec<[f32; 2]>,
}

impl Default for GrowthTuning {
    fn default() -> Self {
        Self {
            start_radius: 0.2,
            max_radius: 3.5,
            radius_per_unit: 0.02,
            min_move_delta: 0.002,
            scale_smooth: 12.0,
            curve: vec![[0.0, 0.0], [1.0, 1.0]],
        }
    }
}

/// Size comparison rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatTuning {
    /// The larger side must be at least this many times bigger to win
    pub kill_ratio: f32,
    /// Radii closer than this are a tie and nothing happens
    pub tie_epsilon: f32,
}

impl Default for CombatTuning {
    fn default() -> Self {
        Self {
            kill_ratio: 1.05,
            tie_epsilon: 0.005,
        }
    }
}

/// Ball follow motor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorTuning {
    pub max_speed: f32,
    pub accel: f32,
    pub decel: f32,
    /// Start slowing down inside this distance from the target
    pub arrive_radius: f32,
    /// Brake only inside this distance
    pub stop_radius: f32,
    /// Speed cap right at the edge of `stop_radius`
    pub near_speed: f32,
    /// Ring distance for a zero-radius ball
    pub base_min_distance: f32,
    /// Ring growth per unit of ball radius
    pub radius_to_distance: f32,
    pub extra_buffer: f32,
    pub lock_y: bool,
    /// Height the ball rides at while locked
    pub locked_y: f32,
    /// Vertical acceleration applied in free (launched) mode
    pub gravity: f32,
}

impl Default for MotorTuning {
    fn default() -> Self {
        Self {
            max_speed: 8.0,
            accel: 35.0,
            decel: 45.0,
            arrive_radius: 0.8,
            stop_radius: 0.05,
            near_speed: 2.0,
            base_min_distance: 0.7,
            radius_to_distance: 1.1,
            extra_buffer: 0.05,
            lock_y: true,
            locked_y: 0.5,
            gravity: -9.81,
        }
    }
}

/// Defeat / respawn timing (seconds)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleTuning {
    pub agent_respawn_delay: f32,
    pub invuln_duration: f32,
    /// Delay before an agent gets a new ball after losing one in a ball fight
    pub ball_respawn_delay: f32,
    pub debris_lifetime: f32,
}

impl Default for LifecycleTuning {
    fn default() -> Self {
        Self {
            agent_respawn_delay: 1.5,
            invuln_duration: 1.5,
            ball_respawn_delay: 1.0,
            debris_lifetime: 4.0,
        }
    }
}

/// Spawn point allocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnTuning {
    pub points: Vec<Vec3>,
    /// Random planar offset applied to each picked point
    pub jitter: f32,
    /// Search radius handed to the terrain sampler
    pub sample_radius: f32,
    pub ai_count: u32,
    pub spawn_player: bool,
    /// Snap a new ball to its anchor again on the following physics tick
    pub resnap_next_tick: bool,
}

impl Default for SpawnTuning {
    fn default() -> Self {
        let points = (0..8)
            .map(|i| {
                let theta = i as f32 * std::f32::consts::TAU / 8.0;
                Vec3::new(theta.cos() * 12.0, 0.0, theta.sin() * 12.0)
            })
            .collect();
        Self {
            points,
            jitter: 1.5,
            sample_radius: 2.0,
            ai_count: 7,
            spawn_player: true,
            resnap_next_tick: true,
        }
    }
}

/// Per-agent body and anchor layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentTuning {
    /// Contact sphere radius of the character body
    pub body_radius: f32,
    /// Size the character presents in combat against a foreign ball
    pub combat_size: f32,
    /// Ball anchor in the agent's local frame (+Z forward)
    pub anchor_offset: Vec3,
}

impl Default for AgentTuning {
    fn default() -> Self {
        Self {
            body_radius: 0.5,
            combat_size: 0.0,
            anchor_offset: Vec3::new(0.0, 0.0, 1.0),
        }
    }
}

/// Complete balance sheet for one match
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub growth: GrowthTuning,
    pub combat: CombatTuning,
    pub motor: MotorTuning,
    pub lifecycle: LifecycleTuning,
    pub spawn: SpawnTuning,
    pub agent: AgentTuning,
}

impl Tuning {
    /// Parse tuning from JSON and repair any out-of-range values
    pub fn from_json(json: &str) -> Result<Self, TuningError> {
        let mut tuning: Tuning = serde_json::from_str(json)?;
        tuning.sanitize();
        Ok(tuning)
    }

    /// Load tuning from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TuningError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let tuning = Self::from_json(&json)?;
        log::info!("Loaded tuning from {}", path.display());
        Ok(tuning)
    }

    /// Serialize to pretty JSON (for writing out a starting tuning file)
    pub fn to_json(&self) -> Result<String, TuningError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Repair values that would break the simulation.
    ///
    /// Never fails: each repair is logged and replaced with something usable,
    /// so a half-broken tuning file still yields a playable match.
    pub fn sanitize(&mut self) {
        let g = &mut self.growth;
        if g.start_radius <= 0.0 {
            log::warn!("growth.start_radius {} <= 0, using 0.0001", g.start_radius);
            g.start_radius = 0.0001;
        }
        if g.max_radius < g.start_radius {
            log::warn!(
                "growth.max_radius {} < start_radius {}, clamping",
                g.max_radius,
                g.start_radius
            );
            g.max_radius = g.start_radius;
        }
        if g.radius_per_unit < 0.0 {
            log::warn!("growth.radius_per_unit {} < 0, using 0", g.radius_per_unit);
            g.radius_per_unit = 0.0;
        }
        clamp_non_negative("growth.min_move_delta", &mut g.min_move_delta);

        let c = &mut self.combat;
        if c.kill_ratio.is_nan() || c.kill_ratio <= 1.0 {
            let fallback = CombatTuning::default().kill_ratio;
            log::warn!("combat.kill_ratio {} <= 1.0, using {fallback}", c.kill_ratio);
            c.kill_ratio = fallback;
        }
        if c.tie_epsilon < 0.0 {
            log::warn!("combat.tie_epsilon {} < 0, using 0", c.tie_epsilon);
            c.tie_epsilon = 0.0;
        }

        let m = &mut self.motor;
        if m.stop_radius > m.arrive_radius {
            log::warn!(
                "motor.stop_radius {} > arrive_radius {}, swapping",
                m.stop_radius,
                m.arrive_radius
            );
            std::mem::swap(&mut m.stop_radius, &mut m.arrive_radius);
        }
        if m.near_speed > m.max_speed {
            log::warn!("motor.near_speed {} > max_speed {}, clamping", m.near_speed, m.max_speed);
            m.near_speed = m.max_speed;
        }
        clamp_non_negative("motor.accel", &mut m.accel);
        clamp_non_negative("motor.decel", &mut m.decel);

        let l = &mut self.lifecycle;
        clamp_non_negative("lifecycle.agent_respawn_delay", &mut l.agent_respawn_delay);
        clamp_non_negative("lifecycle.invuln_duration", &mut l.invuln_duration);
        clamp_non_negative("lifecycle.ball_respawn_delay", &mut l.ball_respawn_delay);
        clamp_non_negative("lifecycle.debris_lifetime", &mut l.debris_lifetime);

        let s = &mut self.spawn;
        clamp_non_negative("spawn.jitter", &mut s.jitter);
        clamp_non_negative("spawn.sample_radius", &mut s.sample_radius);
        if s.points.is_empty() {
            log::warn!("spawn.points is empty; agent spawning will be skipped");
        }
    }
}

/// Negative or NaN values become 0
fn clamp_non_negative(name: &str, value: &mut f32) {
    if value.is_nan() || *value < 0.0 {
        log::warn!("{name} {value} < 0, using 0");
        *value = 0.0;
    }
}
