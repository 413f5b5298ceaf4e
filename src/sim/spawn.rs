//! Spawn coordination
//!
//! Owns spawn point allocation (a shuffled deck so points are not reused
//! until every point has been handed out), the match RNG, the terrain
//! sampler and the timer scheduler. Agent and ball spawning, respawn
//! requests and ball-loss notifications all go through here.

use std::fmt;

use glam::Vec3;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::lifecycle::AgentPhase;
use super::scheduler::{Scheduler, TimerEvent, TimerHandle};
use super::state::{Agent, Ball, Controller, EntityId, GameEvent, MatchPhase, MatchState, Transform};
use crate::tuning::SpawnTuning;

/// Finds a walkable point near a candidate position
pub trait TerrainSampler: fmt::Debug {
    /// Nearest valid point within `search_radius` of `candidate`, if any
    fn sample_point(&self, candidate: Vec3, search_radius: f32) -> Option<Vec3>;
}

/// Infinite flat floor at a fixed height
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatGround {
    pub height: f32,
}

impl TerrainSampler for FlatGround {
    fn sample_point(&self, candidate: Vec3, _search_radius: f32) -> Option<Vec3> {
        Some(Vec3::new(candidate.x, self.height, candidate.z))
    }
}

/// Round walkable arena; points outside are pulled back to the edge when close enough
#[derive(Debug, Clone, Copy)]
pub struct DiscArena {
    pub center: Vec3,
    pub radius: f32,
    pub height: f32,
}

impl TerrainSampler for DiscArena {
    fn sample_point(&self, candidate: Vec3, search_radius: f32) -> Option<Vec3> {
        let offset = crate::flatten(candidate - self.center);
        let dist = offset.length();
        let planar = if dist <= self.radius {
            offset
        } else if dist - self.radius <= search_radius {
            offset / dist * self.radius
        } else {
            return None;
        };
        Some(Vec3::new(
            self.center.x + planar.x,
            self.height,
            self.center.z + planar.z,
        ))
    }
}

/// Shuffled order over spawn point indices
#[derive(Debug, Clone, Default)]
pub struct SpawnDeck {
    order: Vec<usize>,
    cursor: usize,
}

impl SpawnDeck {
    pub fn new(len: usize, rng: &mut Pcg32) -> Self {
        let mut deck = Self {
            order: (0..len).collect(),
            cursor: 0,
        };
        deck.order.shuffle(rng);
        deck
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Draws left before the next reshuffle
    pub fn remaining(&self) -> usize {
        self.order.len() - self.cursor
    }

    /// Next point index. Reshuffles once exhausted, never dealing the same
    /// point twice in a row across the reshuffle.
    pub fn draw(&mut self, rng: &mut Pcg32) -> Option<usize> {
        if self.order.is_empty() {
            return None;
        }
        if self.cursor >= self.order.len() {
            let last = self.order[self.order.len() - 1];
            self.order.shuffle(rng);
            if self.order.len() > 1 && self.order[0] == last {
                let end = self.order.len() - 1;
                self.order.swap(0, end);
            }
            self.cursor = 0;
        }
        let index = self.order[self.cursor];
        self.cursor += 1;
        Some(index)
    }
}

/// Spawn points, RNG, terrain and timers for one match
#[derive(Debug)]
pub struct SpawnCoordinator {
    points: Vec<Vec3>,
    jitter: f32,
    sample_radius: f32,
    deck: SpawnDeck,
    rng: Pcg32,
    terrain: Box<dyn TerrainSampler>,
    pub scheduler: Scheduler,
}

impl SpawnCoordinator {
    pub fn new(tuning: &SpawnTuning, seed: u64, terrain: Box<dyn TerrainSampler>) -> Self {
        let mut rng = Pcg32::seed_from_u64(seed);
        let deck = SpawnDeck::new(tuning.points.len(), &mut rng);
        Self {
            points: tuning.points.clone(),
            jitter: tuning.jitter,
            sample_radius: tuning.sample_radius,
            deck,
            rng,
            terrain,
            scheduler: Scheduler::new(),
        }
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Draw a spawn point, jitter it and validate it against the terrain.
    ///
    /// Falls back to the jittered point when the terrain finds nothing.
    /// None only when there are no spawn points at all.
    pub fn next_position(&mut self) -> Option<Vec3> {
        let index = self.deck.draw(&mut self.rng)?;
        let base = self.points[index];
        let candidate = base + self.jitter_offset();
        match self.terrain.sample_point(candidate, self.sample_radius) {
            Some(point) => Some(point),
            None => {
                log::debug!("No walkable point near {candidate}, using it as-is");
                Some(candidate)
            }
        }
    }

    /// Uniform planar offset inside the jitter disc
    fn jitter_offset(&mut self) -> Vec3 {
        if self.jitter <= 0.0 {
            return Vec3::ZERO;
        }
        let angle = self.rng.random_range(0.0..std::f32::consts::TAU);
        let dist = self.jitter * self.rng.random::<f32>().sqrt();
        Vec3::new(angle.cos() * dist, 0.0, angle.sin() * dist)
    }
}

impl MatchState {
    /// Spawn the player (if enabled) and the AI roster, each with a ball.
    ///
    /// The number of agents is capped by the number of spawn points.
    pub fn start(&mut self) {
        if self.phase != MatchPhase::Setup {
            log::warn!("start called on a match in phase {:?}", self.phase);
            return;
        }
        let spawn = &self.tuning.spawn;
        let wanted = spawn.ai_count as usize + usize::from(spawn.spawn_player);
        let capacity = self.spawner.point_count();
        if wanted > capacity {
            log::warn!("{wanted} agents requested but only {capacity} spawn points; capping");
        }
        let mut budget = wanted.min(capacity);

        if self.tuning.spawn.spawn_player && budget > 0 {
            if let Some(id) = self.spawn_agent(Controller::Player) {
                self.player = Some(id);
                self.spawn_ball(id);
            }
            budget -= 1;
        }
        for _ in 0..budget {
            if let Some(id) = self.spawn_agent(Controller::Ai) {
                self.spawn_ball(id);
            }
        }

        self.phase = MatchPhase::Running;
        log::info!(
            "Match {} started with {} agents",
            self.seed,
            self.world.agents.len()
        );
    }

    /// Place a new agent at the next spawn point
    pub fn spawn_agent(&mut self, controller: Controller) -> Option<EntityId> {
        let Some(position) = self.spawner.next_position() else {
            log::warn!("No spawn points configured; cannot spawn {controller:?} agent");
            return None;
        };
        let id = self.world.next_entity_id();
        let agent = Agent::new(id, controller, Transform::new(position, 0.0), &self.tuning);
        self.world.agents.push(agent);
        self.push_event(GameEvent::AgentSpawned {
            agent: id,
            controller,
            position,
        });
        log::debug!("Spawned {controller:?} agent {id} at {position}");
        Some(id)
    }

    /// Give `owner` a ball at its anchor.
    ///
    /// Refused while the owner already has an active ball or is out of play.
    /// Reuses a pooled ball when one is available; every spawn gets a fresh id.
    pub fn spawn_ball(&mut self, owner: EntityId) -> Option<EntityId> {
        let Some(agent) = self.world.agent(owner) else {
            log::warn!("spawn_ball: unknown owner {owner}");
            return None;
        };
        if agent.ball.is_some() {
            log::debug!("Agent {owner} already has a ball");
            return None;
        }
        if !agent.can_hold_ball() {
            log::debug!("Agent {owner} cannot hold a ball right now");
            return None;
        }
        let anchor = agent.anchor_point();
        let anchor_offset = agent.anchor_offset;

        let id = self.world.next_entity_id();
        let slot = self
            .world
            .balls
            .iter()
            .position(|b| !b.active && b.lifecycle.is_defeated());
        let ball = match slot {
            Some(index) => {
                let ball = &mut self.world.balls[index];
                ball.recycle(id, owner, anchor_offset);
                ball
            }
            None => {
                self.world
                    .balls
                    .push(Ball::new(id, owner, anchor_offset, &self.tuning));
                let last = self.world.balls.len() - 1;
                &mut self.world.balls[last]
            }
        };
        ball.motor.snap(&mut ball.body, anchor);
        ball.growth.reset(ball.body.position);
        let position = ball.body.position;

        let stale = self.world.agent_mut(owner).and_then(|agent| {
            agent.ball = Some(id);
            agent.ball_respawn_timer.take()
        });
        if let Some(handle) = stale {
            self.spawner.scheduler.cancel(handle);
        }
        if self.tuning.spawn.resnap_next_tick {
            self.spawner
                .scheduler
                .schedule(0.0, TimerEvent::BallResnap { ball: id });
        }
        self.push_event(GameEvent::BallSpawned {
            ball: id,
            owner,
            position,
        });
        log::debug!("Spawned ball {id} for agent {owner}");
        Some(id)
    }

    /// Schedule a defeated agent's return. A newer request replaces a pending one.
    pub fn request_respawn(&mut self, agent: EntityId, delay: f32, invuln_duration: f32) -> bool {
        let Some(a) = self.world.agent_mut(agent) else {
            log::warn!("request_respawn: unknown agent {agent}");
            return false;
        };
        a.lifecycle.set_pending_invuln(invuln_duration);
        let previous = a.respawn_timer.take();
        if let Some(handle) = previous {
            self.spawner.scheduler.cancel(handle);
        }
        let handle = self
            .spawner
            .scheduler
            .schedule(delay, TimerEvent::AgentRespawn { agent });
        if let Some(a) = self.world.agent_mut(agent) {
            a.respawn_timer = Some(handle);
        }
        true
    }

    /// An owner lost its ball in a fight: schedule a replacement, and tell an
    /// AI owner to get away from whoever did it.
    pub fn notify_ball_destroyed(
        &mut self,
        owner: EntityId,
        delay: f32,
        instigator: Option<EntityId>,
    ) {
        let Some(agent) = self.world.agent(owner) else {
            return;
        };
        if !agent.can_hold_ball() {
            return;
        }
        let controller = agent.controller;
        let previous = agent.ball_respawn_timer;

        if controller == Controller::Ai {
            if let Some(threat) = instigator {
                if let Some(threat_position) = self.world.position_of(threat) {
                    self.push_event(GameEvent::FleeFrom {
                        agent: owner,
                        threat,
                        threat_position,
                        duration: delay,
                    });
                }
            }
        }

        if let Some(handle) = previous {
            self.spawner.scheduler.cancel(handle);
        }
        let handle = self
            .spawner
            .scheduler
            .schedule(delay, TimerEvent::BallRespawn { owner });
        if let Some(agent) = self.world.agent_mut(owner) {
            agent.ball_respawn_timer = Some(handle);
        }
    }

    /// Drop a pending ball respawn for an owner that just went down
    pub fn notify_owner_defeated(&mut self, owner: EntityId) {
        let handle = self
            .world
            .agent_mut(owner)
            .and_then(|a| a.ball_respawn_timer.take());
        if let Some(handle) = handle {
            self.spawner.scheduler.cancel(handle);
            log::debug!("Cancelled ball respawn for defeated agent {owner}");
        }
    }

    /// Owner is back: clear stale timers and optionally hand out a ball now
    pub fn notify_owner_respawned(&mut self, owner: EntityId, spawn_immediately: bool) {
        self.notify_owner_defeated(owner);
        if spawn_immediately {
            self.spawn_ball(owner);
        }
    }

    /// Advance the clock and run every timer that came due
    pub(crate) fn fire_due_timers(&mut self, dt: f32) {
        let fired = self.spawner.scheduler.advance(dt);
        for (handle, event) in fired {
            self.fire_timer(handle, event);
        }
    }

    fn fire_timer(&mut self, handle: TimerHandle, event: TimerEvent) {
        match event {
            TimerEvent::AgentRespawn { agent } => self.complete_respawn(agent, handle),
            TimerEvent::InvulnerabilityEnd { agent } => {
                let Some(a) = self.world.agent_mut(agent) else {
                    return;
                };
                if a.invuln_timer != Some(handle) {
                    return;
                }
                a.invuln_timer = None;
                if a.lifecycle.end_invulnerability() {
                    self.push_event(GameEvent::InvulnerabilityEnded { agent });
                }
            }
            TimerEvent::BallRespawn { owner } => {
                let Some(a) = self.world.agent_mut(owner) else {
                    return;
                };
                if a.ball_respawn_timer != Some(handle) {
                    return;
                }
                a.ball_respawn_timer = None;
                self.spawn_ball(owner);
            }
            TimerEvent::BallResnap { ball } => self.resnap_ball(ball),
            TimerEvent::DebrisExpire { debris } => self.expire_debris(debris),
            TimerEvent::Relock { ball } => {
                if let Some(b) = self.world.ball_mut(ball) {
                    if b.active {
                        b.motor.relock(&mut b.body);
                        self.push_event(GameEvent::BallRelocked { ball });
                    }
                }
            }
        }
    }

    fn complete_respawn(&mut self, agent: EntityId, handle: TimerHandle) {
        let Some(a) = self.world.agent_mut(agent) else {
            log::debug!("Respawn timer for removed agent {agent}");
            return;
        };
        if a.respawn_timer != Some(handle) {
            return;
        }
        a.respawn_timer = None;
        if !a.lifecycle.begin_respawn() {
            return;
        }
        let fallback = a.transform.position;

        let position = self.spawner.next_position().unwrap_or_else(|| {
            log::warn!("No spawn points; agent {agent} respawns where it fell");
            fallback
        });

        let Some(a) = self.world.agent_mut(agent) else {
            return;
        };
        a.transform = Transform::new(position, 0.0);
        a.active = true;
        a.lifecycle.reset_for_respawn();
        debug_assert_eq!(a.lifecycle.phase(), AgentPhase::Invulnerable);
        let invuln = a.lifecycle.pending_invuln();

        let handle = self
            .spawner
            .scheduler
            .schedule(invuln, TimerEvent::InvulnerabilityEnd { agent });
        if let Some(a) = self.world.agent_mut(agent) {
            a.invuln_timer = Some(handle);
        }

        self.push_event(GameEvent::AgentRespawned { agent, position });
        log::info!("Agent {agent} respawned at {position}");
        self.notify_owner_respawned(agent, true);
    }

    /// Snap a fresh ball onto its owner's anchor once more and restart its sampling there
    fn resnap_ball(&mut self, ball: EntityId) {
        let Some(owner) = self.world.ball(ball).filter(|b| b.active).map(|b| b.owner) else {
            return;
        };
        let Some(anchor) = self.world.agent(owner).map(Agent::anchor_point) else {
            return;
        };
        if let Some(b) = self.world.ball_mut(ball) {
            b.motor.snap(&mut b.body, anchor);
            b.growth.rebase(b.body.position);
        }
    }

    /// Release a ball from the ground plane with an impulse.
    ///
    /// With `relock_after` the vertical lock comes back after that many seconds.
    pub fn launch_ball(
        &mut self,
        ball: EntityId,
        impulse: Vec3,
        enable_gravity: bool,
        relock_after: Option<f32>,
    ) -> bool {
        let Some(b) = self.world.ball_mut(ball).filter(|b| b.active) else {
            return false;
        };
        b.motor.release_vertical_lock(&mut b.body, impulse, enable_gravity);
        self.spawner.scheduler.cancel_for(ball);
        if let Some(delay) = relock_after {
            self.spawner
                .scheduler
                .schedule(delay, TimerEvent::Relock { ball });
        }
        self.push_event(GameEvent::BallLaunched { ball });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::Tuning;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn state_with(tuning: Tuning) -> MatchState {
        MatchState::new(tuning, 42, Box::new(FlatGround::default()))
    }

    #[test]
    fn test_deck_deals_every_point_before_repeating() {
        let mut rng = Pcg32::seed_from_u64(7);
        let mut deck = SpawnDeck::new(6, &mut rng);
        for _round in 0..5 {
            let dealt: HashSet<usize> = (0..6).map(|_| deck.draw(&mut rng).unwrap()).collect();
            assert_eq!(dealt.len(), 6);
        }
    }

    #[test]
    fn test_deck_no_back_to_back_across_reshuffle() {
        let mut rng = Pcg32::seed_from_u64(3);
        let mut deck = SpawnDeck::new(3, &mut rng);
        let mut last = None;
        for _ in 0..300 {
            let index = deck.draw(&mut rng).unwrap();
            assert_ne!(Some(index), last);
            last = Some(index);
        }
    }

    proptest! {
        #[test]
        fn prop_deck_is_a_permutation_each_round(len in 1usize..32, seed in any::<u64>()) {
            let mut rng = Pcg32::seed_from_u64(seed);
            let mut deck = SpawnDeck::new(len, &mut rng);
            for _round in 0..3 {
                let mut dealt: Vec<usize> = (0..len).map(|_| deck.draw(&mut rng).unwrap()).collect();
                dealt.sort_unstable();
                prop_assert_eq!(dealt, (0..len).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn test_empty_deck() {
        let mut rng = Pcg32::seed_from_u64(1);
        let mut deck = SpawnDeck::new(0, &mut rng);
        assert!(deck.is_empty());
        assert_eq!(deck.draw(&mut rng), None);
    }

    #[test]
    fn test_same_seed_same_positions() {
        let mut a = SpawnCoordinator::new(&SpawnTuning::default(), 9, Box::new(FlatGround::default()));
        let mut b = SpawnCoordinator::new(&SpawnTuning::default(), 9, Box::new(FlatGround::default()));
        for _ in 0..20 {
            assert_eq!(a.next_position(), b.next_position());
        }
    }

    #[test]
    fn test_jitter_stays_inside_disc() {
        let tuning = SpawnTuning {
            points: vec![Vec3::ZERO],
            jitter: 2.0,
            ..Default::default()
        };
        let mut s = SpawnCoordinator::new(&tuning, 5, Box::new(FlatGround::default()));
        for _ in 0..100 {
            let p = s.next_position().unwrap();
            assert!(crate::planar(p).length() <= 2.0 + 1e-4);
            assert_eq!(p.y, 0.0);
        }
    }

    #[test]
    fn test_failed_sample_uses_jittered_point() {
        let tuning = SpawnTuning {
            points: vec![Vec3::new(100.0, 3.0, 0.0)],
            jitter: 0.0,
            ..Default::default()
        };
        let arena = DiscArena {
            center: Vec3::ZERO,
            radius: 10.0,
            height: 0.0,
        };
        let mut s = SpawnCoordinator::new(&tuning, 5, Box::new(arena));
        assert_eq!(s.next_position(), Some(Vec3::new(100.0, 3.0, 0.0)));
    }

    #[test]
    fn test_disc_arena_pulls_near_points_in() {
        let arena = DiscArena {
            center: Vec3::ZERO,
            radius: 10.0,
            height: 1.0,
        };
        let p = arena.sample_point(Vec3::new(11.0, 5.0, 0.0), 2.0).unwrap();
        assert!((p - Vec3::new(10.0, 1.0, 0.0)).length() < 1e-5);
        assert_eq!(arena.sample_point(Vec3::new(20.0, 0.0, 0.0), 2.0), None);
    }

    #[test]
    fn test_start_caps_agents_to_points() {
        let mut tuning = Tuning::default();
        tuning.spawn.points.truncate(3);
        tuning.spawn.ai_count = 10;
        let mut state = state_with(tuning);
        state.start();
        assert_eq!(state.world.agents.len(), 3);
        assert!(state.player.is_some());
        assert_eq!(state.world.active_balls().count(), 3);
        assert_eq!(state.phase, MatchPhase::Running);
    }

    #[test]
    fn test_start_without_points_spawns_nothing() {
        let mut tuning = Tuning::default();
        tuning.spawn.points.clear();
        let mut state = state_with(tuning);
        state.start();
        assert!(state.world.agents.is_empty());
    }

    #[test]
    fn test_one_ball_per_agent() {
        let mut state = state_with(Tuning::default());
        let a = state.spawn_agent(Controller::Ai).unwrap();
        assert!(state.spawn_ball(a).is_some());
        assert!(state.spawn_ball(a).is_none());
        assert_eq!(state.world.balls.len(), 1);
    }

    #[test]
    fn test_ball_spawns_at_anchor_with_start_radius() {
        let mut state = state_with(Tuning::default());
        let a = state.spawn_agent(Controller::Ai).unwrap();
        let ball = state.spawn_ball(a).unwrap();
        let anchor = state.world.agent(a).unwrap().anchor_point();
        let b = state.world.ball(ball).unwrap();
        assert_eq!(crate::planar(b.body.position), crate::planar(anchor));
        assert_eq!(b.body.velocity, Vec3::ZERO);
        assert_eq!(b.radius(), state.tuning.growth.start_radius);
    }

    #[test]
    fn test_pooled_ball_reused_with_fresh_id() {
        let mut state = state_with(Tuning::default());
        let a = state.spawn_agent(Controller::Ai).unwrap();
        let first = state.spawn_ball(a).unwrap();
        assert!(state.defeat(first, None));
        let second = state.spawn_ball(a).unwrap();
        assert_ne!(first, second);
        assert_eq!(state.world.balls.len(), 1);
        assert!(state.world.ball(first).is_none());
    }

    #[test]
    fn test_respawn_request_replaces_pending() {
        let mut state = state_with(Tuning::default());
        let a = state.spawn_agent(Controller::Ai).unwrap();
        state.defeat(a, None);
        let before = state.spawner.scheduler.pending_count();
        assert!(state.request_respawn(a, 5.0, 0.5));
        assert_eq!(state.spawner.scheduler.pending_count(), before);
        assert_eq!(state.world.agent(a).unwrap().lifecycle.pending_invuln(), 0.5);
    }

    #[test]
    fn test_ai_flees_from_instigator() {
        let mut state = state_with(Tuning::default());
        let a = state.spawn_agent(Controller::Ai).unwrap();
        let b = state.spawn_agent(Controller::Player).unwrap();
        state.drain_events();
        state.notify_ball_destroyed(a, 1.0, Some(b));
        state.notify_ball_destroyed(b, 1.0, Some(a));
        let flees: Vec<_> = state
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::FleeFrom { .. }))
            .collect();
        assert_eq!(flees.len(), 1);
        assert!(matches!(flees[0], GameEvent::FleeFrom { agent, threat, .. } if agent == a && threat == b));
    }

    #[test]
    fn test_owner_defeat_cancels_ball_respawn() {
        let mut state = state_with(Tuning::default());
        let a = state.spawn_agent(Controller::Ai).unwrap();
        state.notify_ball_destroyed(a, 1.0, None);
        assert!(state.world.agent(a).unwrap().has_pending_ball_respawn());
        state.notify_owner_defeated(a);
        assert!(!state.world.agent(a).unwrap().has_pending_ball_respawn());
        assert_eq!(state.spawner.scheduler.pending_count(), 0);
    }

    #[test]
    fn test_launch_and_relock() {
        let mut state = state_with(Tuning::default());
        let a = state.spawn_agent(Controller::Ai).unwrap();
        let ball = state.spawn_ball(a).unwrap();
        assert!(state.launch_ball(ball, Vec3::new(0.0, 5.0, 0.0), true, Some(0.1)));
        assert!(!state.world.ball(ball).unwrap().motor.is_locked());
        state.fire_due_timers(0.2);
        assert!(state.world.ball(ball).unwrap().motor.is_locked());
    }
}
