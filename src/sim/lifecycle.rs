//! Defeat and respawn state machines, and the defeat cascade
//!
//! Agent: Alive -> Defeated -> Respawning -> Invulnerable -> Alive
//! Ball:  Alive -> Defeated -> (pooled, respawned under a new id)
//!
//! Transitions that do not apply to the current phase are ignored, so a
//! double defeat or a late timer is harmless.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::state::{EntityId, EntityKind, GameEvent, MatchState};
use super::scheduler::TimerEvent;

/// Agent lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentPhase {
    Alive,
    Defeated,
    Respawning,
    /// Back in the arena but cannot be defeated yet
    Invulnerable,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentLifecycle {
    phase: AgentPhase,
    /// Invulnerability to grant once the pending respawn completes
    pending_invuln: f32,
    defeats: u32,
}

impl Default for AgentLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentLifecycle {
    pub fn new() -> Self {
        Self {
            phase: AgentPhase::Alive,
            pending_invuln: 0.0,
            defeats: 0,
        }
    }

    pub fn phase(&self) -> AgentPhase {
        self.phase
    }

    /// Out of play: defeated or waiting to respawn
    pub fn is_defeated(&self) -> bool {
        matches!(self.phase, AgentPhase::Defeated | AgentPhase::Respawning)
    }

    pub fn is_invulnerable(&self) -> bool {
        self.phase == AgentPhase::Invulnerable
    }

    pub fn can_be_defeated(&self) -> bool {
        self.phase == AgentPhase::Alive
    }

    /// Times this agent has been defeated this match
    pub fn defeats(&self) -> u32 {
        self.defeats
    }

    pub fn pending_invuln(&self) -> f32 {
        self.pending_invuln
    }

    /// Alive -> Defeated
    pub(crate) fn defeat(&mut self) -> bool {
        if self.phase != AgentPhase::Alive {
            return false;
        }
        self.phase = AgentPhase::Defeated;
        self.defeats += 1;
        true
    }

    /// Remember how long the next invulnerability window lasts
    pub(crate) fn set_pending_invuln(&mut self, duration: f32) {
        self.pending_invuln = duration.max(0.0);
    }

    /// Defeated -> Respawning
    pub(crate) fn begin_respawn(&mut self) -> bool {
        if self.phase != AgentPhase::Defeated {
            return false;
        }
        self.phase = AgentPhase::Respawning;
        true
    }

    /// Respawning -> Invulnerable
    pub(crate) fn reset_for_respawn(&mut self) -> bool {
        if self.phase != AgentPhase::Respawning {
            return false;
        }
        self.phase = AgentPhase::Invulnerable;
        true
    }

    /// Invulnerable -> Alive
    pub(crate) fn end_invulnerability(&mut self) -> bool {
        if self.phase != AgentPhase::Invulnerable {
            return false;
        }
        self.phase = AgentPhase::Alive;
        true
    }
}

/// Why a ball left play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefeatCause {
    /// Lost a size contest
    Combat,
    /// Its owner was defeated
    OwnerDefeated,
    /// Its owner left the match for good
    OwnerRemoved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BallPhase {
    Alive,
    Defeated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BallLifecycle {
    phase: BallPhase,
    cause: Option<DefeatCause>,
}

impl Default for BallLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl BallLifecycle {
    pub fn new() -> Self {
        Self {
            phase: BallPhase::Alive,
            cause: None,
        }
    }

    pub fn phase(&self) -> BallPhase {
        self.phase
    }

    pub fn is_defeated(&self) -> bool {
        self.phase == BallPhase::Defeated
    }

    /// Cause of the most recent defeat
    pub fn cause(&self) -> Option<DefeatCause> {
        self.cause
    }

    /// Alive -> Defeated
    pub(crate) fn defeat(&mut self, cause: DefeatCause) -> bool {
        if self.phase != BallPhase::Alive {
            return false;
        }
        self.phase = BallPhase::Defeated;
        self.cause = Some(cause);
        true
    }

    /// Defeated -> Alive (pool reuse)
    pub(crate) fn respawn(&mut self) -> bool {
        if self.phase != BallPhase::Defeated {
            return false;
        }
        self.phase = BallPhase::Alive;
        self.cause = None;
        true
    }
}

impl MatchState {
    /// Defeat an agent or ball. `instigator` is whoever won the contact.
    ///
    /// Returns false when the target is unknown or not in a defeatable phase.
    pub fn defeat(&mut self, target: EntityId, instigator: Option<EntityId>) -> bool {
        match self.world.kind_of(target) {
            Some(EntityKind::Agent) => self.defeat_agent(target, instigator),
            Some(EntityKind::Ball) => self.defeat_ball(target, DefeatCause::Combat, instigator),
            _ => {
                log::warn!("defeat: entity {target} is not an agent or ball");
                false
            }
        }
    }

    fn defeat_agent(&mut self, id: EntityId, instigator: Option<EntityId>) -> bool {
        let Some(agent) = self.world.agent_mut(id) else {
            return false;
        };
        if !agent.lifecycle.defeat() {
            return false;
        }
        agent.active = false;
        let position = agent.transform.position;
        let ball = agent.ball;

        self.notify_owner_defeated(id);
        if let Some(ball) = ball {
            self.defeat_ball(ball, DefeatCause::OwnerDefeated, instigator);
        }

        self.spawn_debris(position, EntityKind::Agent);
        self.push_event(GameEvent::AgentDefeated {
            agent: id,
            instigator,
        });
        log::info!("Agent {id} defeated by {instigator:?}");

        let delay = self.tuning.lifecycle.agent_respawn_delay;
        let invuln = self.tuning.lifecycle.invuln_duration;
        self.request_respawn(id, delay, invuln);
        true
    }

    pub(crate) fn defeat_ball(
        &mut self,
        id: EntityId,
        cause: DefeatCause,
        instigator: Option<EntityId>,
    ) -> bool {
        let Some(ball) = self.world.ball_mut(id) else {
            return false;
        };
        if !ball.lifecycle.defeat(cause) {
            return false;
        }
        ball.active = false;
        ball.body.velocity = Vec3::ZERO;
        ball.motor.unbind();
        let owner = ball.owner;
        let position = ball.body.position;

        self.spawner.scheduler.cancel_for(id);
        if let Some(agent) = self.world.agent_mut(owner) {
            if agent.ball == Some(id) {
                agent.ball = None;
            }
        }

        if cause != DefeatCause::OwnerRemoved {
            self.spawn_debris(position, EntityKind::Ball);
        }
        self.push_event(GameEvent::BallDefeated {
            ball: id,
            owner,
            cause,
            instigator,
        });
        log::debug!("Ball {id} of agent {owner} defeated ({cause:?})");

        if cause == DefeatCause::Combat {
            let delay = self.tuning.lifecycle.ball_respawn_delay;
            self.notify_ball_destroyed(owner, delay, instigator);
        }
        true
    }

    /// Leave cosmetic remains behind that clean themselves up
    pub(crate) fn spawn_debris(&mut self, position: Vec3, kind: EntityKind) -> EntityId {
        let id = self.world.next_entity_id();
        self.world.debris.push(super::state::Debris { id, position, kind });
        let lifetime = self.tuning.lifecycle.debris_lifetime;
        self.spawner
            .scheduler
            .schedule(lifetime, TimerEvent::DebrisExpire { debris: id });
        self.push_event(GameEvent::DebrisSpawned {
            debris: id,
            kind,
            position,
        });
        id
    }

    pub(crate) fn expire_debris(&mut self, id: EntityId) {
        let before = self.world.debris.len();
        self.world.debris.retain(|d| d.id != id);
        if self.world.debris.len() != before {
            self.push_event(GameEvent::DebrisExpired { debris: id });
        }
    }

    /// Remove an agent from the match for good.
    ///
    /// Pending timers for the agent and its ball are cancelled; the ball is
    /// deactivated without leaving debris.
    pub fn remove_agent(&mut self, id: EntityId) -> bool {
        let Some(agent) = self.world.agent_mut(id) else {
            return false;
        };
        agent.active = false;
        let ball = agent.ball;
        self.spawner.scheduler.cancel_for(id);
        if let Some(ball) = ball {
            self.defeat_ball(ball, DefeatCause::OwnerRemoved, None);
        }
        self.world.agents.retain(|a| a.id != id);
        self.contacts.retain(|&(a, b)| a != id && b != id);
        if self.player == Some(id) {
            self.player = None;
        }
        log::info!("Agent {id} removed from match");
        true
    }
}
