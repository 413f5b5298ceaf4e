//! End-to-end match flow through the public API

use std::collections::HashSet;
use std::f32::consts::FRAC_PI_2;

use glam::Vec3;
use snowball_clash::Tuning;
use snowball_clash::consts::SIM_DT;
use snowball_clash::sim::{
    AgentPhase, DefeatCause, EntityId, FlatGround, GameEvent, MatchState, TickInput, Transform,
    tick,
};

fn ai_match(ai_count: u32, seed: u64) -> MatchState {
    let mut tuning = Tuning::default();
    tuning.spawn.ai_count = ai_count;
    tuning.spawn.spawn_player = false;
    tuning.spawn.jitter = 0.0;
    let mut state = MatchState::new(tuning, seed, Box::new(FlatGround::default()));
    state.start();
    state
}

fn run(state: &mut MatchState, seconds: f32) -> Vec<GameEvent> {
    let ticks = (seconds / SIM_DT).ceil() as u32;
    let mut events = Vec::new();
    for _ in 0..ticks {
        tick(state, &TickInput::default(), SIM_DT);
        events.extend(state.drain_events());
    }
    events
}

fn ball_of(state: &MatchState, agent: EntityId) -> Option<EntityId> {
    state.world.agent(agent).and_then(|a| a.ball)
}

#[test]
fn test_spawn_points_not_reused_within_a_round() {
    let state = ai_match(8, 77);
    let points: HashSet<(i32, i32)> = state
        .world
        .agents
        .iter()
        .map(|a| {
            let p = a.transform.position;
            ((p.x * 100.0).round() as i32, (p.z * 100.0).round() as i32)
        })
        .collect();
    assert_eq!(points.len(), 8);
}

#[test]
fn test_lost_ball_comes_back_fresh() {
    let mut state = ai_match(2, 1);
    let (a, b) = (state.world.agents[0].id, state.world.agents[1].id);
    run(&mut state, 0.5);

    let old = ball_of(&state, a).unwrap();
    let winner = ball_of(&state, b).unwrap();
    assert!(state.defeat(old, Some(winner)));
    assert_eq!(ball_of(&state, a), None);

    let delay = state.tuning.lifecycle.ball_respawn_delay;
    let events = run(&mut state, delay + 0.1);

    let new = ball_of(&state, a).expect("ball respawned");
    assert_ne!(new, old);
    assert_eq!(state.ball_radius(new), Some(state.tuning.growth.start_radius));
    assert!(
        events
            .iter()
            .any(|e| matches!(e, GameEvent::BallSpawned { ball, owner, .. } if *ball == new && *owner == a))
    );
}

#[test]
fn test_owner_defeat_cancels_pending_ball_respawn() {
    let mut state = ai_match(2, 2);
    let (a, b) = (state.world.agents[0].id, state.world.agents[1].id);
    let old = ball_of(&state, a).unwrap();
    let winner = ball_of(&state, b).unwrap();
    // Spawn events from start() would otherwise match below
    state.drain_events();

    state.defeat(old, Some(winner));
    state.defeat(a, Some(winner));

    let lifecycle = state.tuning.lifecycle.clone();
    // Past the ball respawn delay but before the agent respawns
    let events = run(&mut state, lifecycle.ball_respawn_delay + 0.1);
    assert_eq!(ball_of(&state, a), None);
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, GameEvent::BallSpawned { owner, .. } if *owner == a))
    );

    run(&mut state, lifecycle.agent_respawn_delay);
    let agent = state.world.agent(a).unwrap();
    assert!(agent.is_active());
    let owned = state
        .world
        .balls
        .iter()
        .filter(|ball| ball.is_active() && ball.owner == a)
        .count();
    assert_eq!(owned, 1);
}

#[test]
fn test_invulnerable_agent_cannot_be_defeated() {
    let mut state = ai_match(2, 3);
    let a = state.world.agents[0].id;
    let lifecycle = state.tuning.lifecycle.clone();
    assert!(state.defeat(a, None));
    run(&mut state, lifecycle.agent_respawn_delay + 0.05);

    assert_eq!(state.world.agent(a).unwrap().lifecycle().phase(), AgentPhase::Invulnerable);
    assert!(!state.defeat(a, None));

    let events = run(&mut state, lifecycle.invuln_duration + 0.05);
    assert!(
        events
            .iter()
            .any(|e| matches!(e, GameEvent::InvulnerabilityEnded { agent } if *agent == a))
    );
    assert!(state.defeat(a, None));
    assert_eq!(state.world.agent(a).unwrap().lifecycle().defeats(), 2);
}

#[test]
fn test_bigger_ball_wins_contact_and_loser_flees() {
    let mut state = ai_match(2, 4);
    let (a, b) = (state.world.agents[0].id, state.world.agents[1].id);
    run(&mut state, SIM_DT);

    let ball_a = ball_of(&state, a).unwrap();
    let ball_b = ball_of(&state, b).unwrap();
    state
        .world
        .ball_mut(ball_a)
        .unwrap()
        .growth
        .update(Vec3::new(40.0, 0.0, 0.0));
    let at = state.world.ball(ball_a).unwrap().body.position;

    // b faces -X so its anchor lands just beside ball a
    let b_transform = Transform::new(Vec3::new(at.x + 2.0, 0.0, at.z), -FRAC_PI_2);
    state.place_agent(b, b_transform);
    let body = &mut state.world.ball_mut(ball_b).unwrap().body;
    body.position = at + Vec3::new(1.0, 0.0, 0.0);
    body.velocity = Vec3::ZERO;

    tick(&mut state, &TickInput::default().place(b, b_transform), SIM_DT);
    let events = state.drain_events();

    let defeats: Vec<&GameEvent> = events
        .iter()
        .filter(|e| matches!(e, GameEvent::BallDefeated { .. }))
        .collect();
    assert_eq!(defeats.len(), 1);
    assert!(matches!(
        defeats[0],
        GameEvent::BallDefeated { ball, cause: DefeatCause::Combat, instigator: Some(w), .. }
            if *ball == ball_b && *w == ball_a
    ));
    assert!(
        events
            .iter()
            .any(|e| matches!(e, GameEvent::FleeFrom { agent, threat, .. } if *agent == b && *threat == ball_a))
    );
    assert!(events.iter().any(|e| matches!(e, GameEvent::Collision(_))));
    assert!(state.world.agent(b).unwrap().is_active());
}

#[test]
fn test_removed_agent_never_respawns() {
    let mut state = ai_match(3, 5);
    let a = state.world.agents[0].id;
    state.defeat(a, None);
    assert!(state.remove_agent(a));

    let events = run(&mut state, 5.0);
    assert!(state.world.agent(a).is_none());
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, GameEvent::AgentRespawned { agent, .. } if *agent == a))
    );
}
