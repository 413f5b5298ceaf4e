//! Cancellable single-shot timers on the simulation clock
//!
//! Every delayed transition (respawn, end of invulnerability, ball respawn,
//! debris cleanup, next-tick re-snap) is a [`TimerEvent`] scheduled here.
//! Timers fire from [`Scheduler::advance`], on the same cooperative timeline
//! as the physics tick, in (due time, scheduling order).

use super::state::EntityId;

/// Tolerance for "due now" comparisons on the accumulated clock
const DUE_EPSILON: f64 = 1e-6;

/// Opaque handle to a pending timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

/// Deferred work, keyed by the entity it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// Defeated agent moves to Respawning and is re-placed
    AgentRespawn { agent: EntityId },
    /// Invulnerable agent becomes Alive
    InvulnerabilityEnd { agent: EntityId },
    /// Owner gets a fresh ball after losing one
    BallRespawn { owner: EntityId },
    /// Snap a freshly spawned ball onto its anchor once more
    BallResnap { ball: EntityId },
    DebrisExpire { debris: EntityId },
    /// Restore the vertical lock after a launch
    Relock { ball: EntityId },
}

impl TimerEvent {
    /// Entity this timer belongs to
    pub fn key(&self) -> EntityId {
        match *self {
            TimerEvent::AgentRespawn { agent } => agent,
            TimerEvent::InvulnerabilityEnd { agent } => agent,
            TimerEvent::BallRespawn { owner } => owner,
            TimerEvent::BallResnap { ball } => ball,
            TimerEvent::DebrisExpire { debris } => debris,
            TimerEvent::Relock { ball } => ball,
        }
    }
}

#[derive(Debug, Clone)]
struct Pending {
    handle: TimerHandle,
    due: f64,
    event: TimerEvent,
}

/// Single-threaded timer wheel
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    now: f64,
    next_handle: u64,
    pending: Vec<Pending>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current clock (seconds since match start)
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Fire `event` after `delay` seconds. A zero delay fires on the next advance.
    pub fn schedule(&mut self, delay: f32, event: TimerEvent) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        let delay = if delay.is_finite() { delay.max(0.0) } else { 0.0 };
        self.pending.push(Pending {
            handle,
            due: self.now + f64::from(delay),
            event,
        });
        handle
    }

    /// Cancel a timer. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.handle != handle);
        self.pending.len() != before
    }

    /// Cancel every timer keyed on `entity`. Returns how many were dropped.
    pub fn cancel_for(&mut self, entity: EntityId) -> usize {
        let before = self.pending.len();
        self.pending.retain(|p| p.event.key() != entity);
        before - self.pending.len()
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.pending.iter().any(|p| p.handle == handle)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Seconds until `handle` fires, if it is still pending
    pub fn remaining(&self, handle: TimerHandle) -> Option<f64> {
        self.pending
            .iter()
            .find(|p| p.handle == handle)
            .map(|p| (p.due - self.now).max(0.0))
    }

    /// Advance the clock and take every timer that is now due
    pub fn advance(&mut self, dt: f32) -> Vec<(TimerHandle, TimerEvent)> {
        self.now += f64::from(dt.max(0.0));
        let now = self.now + DUE_EPSILON;

        let mut due: Vec<Pending> = Vec::new();
        self.pending.retain(|p| {
            if p.due <= now {
                due.push(p.clone());
                false
            } else {
                true
            }
        });
        due.sort_by(|a, b| a.due.total_cmp(&b.due).then(a.handle.cmp(&b.handle)));
        due.into_iter().map(|p| (p.handle, p.event)).collect()
    }

    /// Drop everything (match teardown)
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
