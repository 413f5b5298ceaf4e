//! Match state and core simulation types
//!
//! Everything a running match owns lives here. It exists only for the
//! duration of one match: created by [`MatchState::new`], discarded at
//! [`MatchState::end`].

use std::collections::BTreeSet;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::combat::{CombatResolver, Defeatable, OwnerIdentifiable, SizeProvider};
use super::growth::GrowthModel;
use super::lifecycle::{AgentLifecycle, BallLifecycle, DefeatCause};
use super::motor::FollowMotor;
use super::scheduler::TimerHandle;
use super::spawn::{SpawnCoordinator, TerrainSampler};
use crate::tuning::Tuning;
use crate::{rotate_yaw, yaw_forward};

/// Stable identity shared by agents, balls and debris
pub type EntityId = u32;

/// Who drives an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Controller {
    Player,
    Ai,
}

/// What an id refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    Agent,
    Ball,
    Debris,
}

/// Overall match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPhase {
    /// Created, agents not spawned yet
    Setup,
    Running,
    /// Torn down; ticks are ignored
    Ended,
}

/// Position and heading on the ground plane
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    /// Rotation around +Y in radians (0 faces +Z)
    pub yaw: f32,
}

impl Transform {
    pub fn new(position: Vec3, yaw: f32) -> Self {
        Self { position, yaw }
    }

    #[inline]
    pub fn forward(&self) -> Vec3 {
        yaw_forward(self.yaw)
    }

    /// Local offset to world point
    #[inline]
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.position + rotate_yaw(local, self.yaw)
    }
}

/// Physical state of a ball
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Body {
    pub position: Vec3,
    pub velocity: Vec3,
}

/// A player- or AI-controlled character
#[derive(Debug, Clone)]
pub struct Agent {
    pub id: EntityId,
    pub controller: Controller,
    pub transform: Transform,
    /// Ball anchor in the local frame
    pub anchor_offset: Vec3,
    /// Contact sphere radius
    pub body_radius: f32,
    /// Size presented against foreign balls
    pub combat_size: f32,
    /// Currently active ball, if any
    pub ball: Option<EntityId>,
    /// Physically present in the arena
    pub(crate) active: bool,
    pub(crate) lifecycle: AgentLifecycle,
    pub(crate) respawn_timer: Option<TimerHandle>,
    pub(crate) invuln_timer: Option<TimerHandle>,
    pub(crate) ball_respawn_timer: Option<TimerHandle>,
}

impl Agent {
    pub fn new(id: EntityId, controller: Controller, transform: Transform, tuning: &Tuning) -> Self {
        Self {
            id,
            controller,
            transform,
            anchor_offset: tuning.agent.anchor_offset,
            body_radius: tuning.agent.body_radius,
            combat_size: tuning.agent.combat_size,
            ball: None,
            active: true,
            lifecycle: AgentLifecycle::new(),
            respawn_timer: None,
            invuln_timer: None,
            ball_respawn_timer: None,
        }
    }

    /// Physically present in the arena
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn lifecycle(&self) -> &AgentLifecycle {
        &self.lifecycle
    }

    /// World-space ball anchor
    pub fn anchor_point(&self) -> Vec3 {
        self.transform.transform_point(self.anchor_offset)
    }

    /// Whether a ball may be spawned for this agent right now
    pub fn can_hold_ball(&self) -> bool {
        self.active && !self.lifecycle.is_defeated()
    }

    pub fn is_invulnerable(&self) -> bool {
        self.lifecycle.is_invulnerable()
    }

    pub fn has_pending_ball_respawn(&self) -> bool {
        self.ball_respawn_timer.is_some()
    }
}

impl OwnerIdentifiable for Agent {
    fn entity_id(&self) -> EntityId {
        self.id
    }

    fn owner_id(&self) -> EntityId {
        self.id
    }
}

impl SizeProvider for Agent {
    fn combat_radius(&self) -> Option<f32> {
        Some(self.combat_size)
    }
}

impl Defeatable for Agent {
    fn is_defeated(&self) -> bool {
        self.lifecycle.is_defeated()
    }

    fn can_be_defeated(&self) -> bool {
        self.active && self.lifecycle.can_be_defeated()
    }
}

/// The growing sphere an agent pushes around
#[derive(Debug, Clone)]
pub struct Ball {
    pub id: EntityId,
    /// Back-reference to the owning agent
    pub owner: EntityId,
    pub growth: GrowthModel,
    pub motor: FollowMotor,
    pub body: Body,
    pub(crate) active: bool,
    pub(crate) lifecycle: BallLifecycle,
}

impl Ball {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn lifecycle(&self) -> &BallLifecycle {
        &self.lifecycle
    }

    /// Logical radius (gameplay)
    pub fn radius(&self) -> f32 {
        self.growth.radius()
    }

    /// Smoothed diameter (rendering)
    pub fn visual_scale(&self) -> f32 {
        self.growth.visual_scale()
    }
}

impl OwnerIdentifiable for Ball {
    fn entity_id(&self) -> EntityId {
        self.id
    }

    fn owner_id(&self) -> EntityId {
        self.owner
    }
}

impl SizeProvider for Ball {
    fn combat_radius(&self) -> Option<f32> {
        Some(self.growth.radius())
    }
}

impl Defeatable for Ball {
    fn is_defeated(&self) -> bool {
        self.lifecycle.is_defeated()
    }

    fn can_be_defeated(&self) -> bool {
        self.active && !self.lifecycle.is_defeated()
    }
}

/// Remains left behind by a defeat (cosmetic, timed)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Debris {
    pub id: EntityId,
    pub position: Vec3,
    pub kind: EntityKind,
}

/// Contact report for the decal/VFX layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CollisionEvent {
    pub point: Vec3,
    /// Unit normal pointing from the first participant to the second
    pub normal: Vec3,
    /// Closing speed along the normal
    pub strength: f32,
}

/// Things that happened during a tick, for collaborators outside the core
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum GameEvent {
    AgentSpawned {
        agent: EntityId,
        controller: Controller,
        position: Vec3,
    },
    BallSpawned {
        ball: EntityId,
        owner: EntityId,
        position: Vec3,
    },
    AgentDefeated {
        agent: EntityId,
        instigator: Option<EntityId>,
    },
    BallDefeated {
        ball: EntityId,
        owner: EntityId,
        cause: DefeatCause,
        instigator: Option<EntityId>,
    },
    AgentRespawned {
        agent: EntityId,
        position: Vec3,
    },
    InvulnerabilityEnded {
        agent: EntityId,
    },
    DebrisSpawned {
        debris: EntityId,
        kind: EntityKind,
        position: Vec3,
    },
    DebrisExpired {
        debris: EntityId,
    },
    /// Qualifying contact (different owners) for decals
    Collision(CollisionEvent),
    /// Command for the AI director
    FleeFrom {
        agent: EntityId,
        threat: EntityId,
        threat_position: Vec3,
        duration: f32,
    },
    BallLaunched {
        ball: EntityId,
    },
    BallRelocked {
        ball: EntityId,
    },
}

/// Entity storage (stable iteration order by insertion)
#[derive(Debug, Clone, Default)]
pub struct World {
    pub agents: Vec<Agent>,
    /// Active balls plus deactivated ones kept for reuse
    pub balls: Vec<Ball>,
    pub debris: Vec<Debris>,
    next_id: EntityId,
}

impl World {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Default::default()
        }
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn agent(&self, id: EntityId) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn agent_mut(&mut self, id: EntityId) -> Option<&mut Agent> {
        self.agents.iter_mut().find(|a| a.id == id)
    }

    pub fn ball(&self, id: EntityId) -> Option<&Ball> {
        self.balls.iter().find(|b| b.id == id)
    }

    pub fn ball_mut(&mut self, id: EntityId) -> Option<&mut Ball> {
        self.balls.iter_mut().find(|b| b.id == id)
    }

    pub fn kind_of(&self, id: EntityId) -> Option<EntityKind> {
        if self.agent(id).is_some() {
            Some(EntityKind::Agent)
        } else if self.ball(id).is_some() {
            Some(EntityKind::Ball)
        } else if self.debris.iter().any(|d| d.id == id) {
            Some(EntityKind::Debris)
        } else {
            None
        }
    }

    /// Current world position of an agent or ball
    pub fn position_of(&self, id: EntityId) -> Option<Vec3> {
        self.agent(id)
            .map(|a| a.transform.position)
            .or_else(|| self.ball(id).map(|b| b.body.position))
    }

    pub fn active_balls(&self) -> impl Iterator<Item = &Ball> {
        self.balls.iter().filter(|b| b.active)
    }

    pub fn active_agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.iter().filter(|a| a.active)
    }
}

/// Complete state of one match session
#[derive(Debug)]
pub struct MatchState {
    /// Match seed for reproducibility
    pub seed: u64,
    pub tuning: Tuning,
    pub phase: MatchPhase,
    /// Physics tick counter
    pub time_ticks: u64,
    pub world: World,
    pub spawner: SpawnCoordinator,
    pub resolver: CombatResolver,
    /// The human player's agent, if one was spawned
    pub player: Option<EntityId>,
    /// Overlapping pairs as (lower id, higher id)
    pub(crate) contacts: BTreeSet<(EntityId, EntityId)>,
    pub(crate) events: Vec<GameEvent>,
}

impl MatchState {
    /// Create a match. Tuning is sanitized; nothing is spawned until [`start`](Self::start).
    pub fn new(mut tuning: Tuning, seed: u64, terrain: Box<dyn TerrainSampler>) -> Self {
        tuning.sanitize();
        let spawner = SpawnCoordinator::new(&tuning.spawn, seed, terrain);
        let resolver = CombatResolver::new(&tuning.combat);
        Self {
            seed,
            tuning,
            phase: MatchPhase::Setup,
            time_ticks: 0,
            world: World::new(),
            spawner,
            resolver,
            player: None,
            contacts: BTreeSet::new(),
            events: Vec::new(),
        }
    }

    /// Take every event produced since the last drain
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    /// Simulation clock in seconds
    pub fn now(&self) -> f64 {
        self.spawner.scheduler.now()
    }

    /// Logical radius of a ball (camera/UI read path)
    pub fn ball_radius(&self, ball: EntityId) -> Option<f32> {
        self.world.ball(ball).filter(|b| b.active).map(Ball::radius)
    }

    /// Logical radius of the player's current ball
    pub fn player_ball_radius(&self) -> Option<f32> {
        let player = self.world.agent(self.player?)?;
        self.ball_radius(player.ball?)
    }

    /// Number of agents currently alive or invulnerable
    pub fn alive_agents(&self) -> usize {
        self.world
            .agents
            .iter()
            .filter(|a| a.active && !a.lifecycle.is_defeated())
            .count()
    }

    /// Write an agent's transform (the external movement controller's output).
    /// Ignored for unknown or inactive agents.
    pub fn place_agent(&mut self, agent: EntityId, transform: Transform) -> bool {
        match self.world.agent_mut(agent) {
            Some(a) if a.active => {
                a.transform = transform;
                true
            }
            _ => false,
        }
    }

    /// Change where an agent's ball is anchored (local frame)
    pub fn set_anchor_offset(&mut self, agent: EntityId, offset: Vec3) -> bool {
        let Some(a) = self.world.agent_mut(agent) else {
            return false;
        };
        a.anchor_offset = offset;
        if let Some(ball_id) = a.ball {
            if let Some(ball) = self.world.ball_mut(ball_id) {
                ball.motor.bind(agent, offset);
            }
        }
        true
    }

    pub(crate) fn push_event(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Tear the match down: timers, entities and contacts are discarded
    pub fn end(&mut self) {
        self.spawner.scheduler.clear();
        self.world = World::new();
        self.contacts.clear();
        self.player = None;
        self.phase = MatchPhase::Ended;
        log::info!("Match {} ended after {} ticks", self.seed, self.time_ticks);
    }
}

impl Ball {
    /// Fresh ball bound to `owner`
    pub(crate) fn new(id: EntityId, owner: EntityId, anchor_offset: Vec3, tuning: &Tuning) -> Self {
        let mut motor = FollowMotor::new(&tuning.motor);
        motor.bind(owner, anchor_offset);
        Self {
            id,
            owner,
            growth: GrowthModel::new(&tuning.growth),
            motor,
            body: Body::default(),
            active: true,
            lifecycle: BallLifecycle::new(),
        }
    }

    /// Reuse a pooled (defeated) ball for a new owner under a fresh id
    pub(crate) fn recycle(&mut self, id: EntityId, owner: EntityId, anchor_offset: Vec3) {
        self.id = id;
        self.owner = owner;
        self.motor.bind(owner, anchor_offset);
        self.motor.relock(&mut self.body);
        self.lifecycle.respawn();
        self.active = true;
    }
}
