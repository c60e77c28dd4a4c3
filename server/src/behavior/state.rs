//! Per-monster records that several branches of one behavior tree
//! coordinate through.
//!
//! Each monster gets exactly one of each record, created together with its
//! tree and never shared with another monster.

use parking_lot::Mutex;
use shared::AttackKind;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A mutually exclusive action a monster can be busy with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Chase,
    Rotate,
    Attack(AttackKind),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Chase => write!(f, "chase"),
            Action::Rotate => write!(f, "rotate"),
            Action::Attack(AttackKind::Melee) => write!(f, "attack_melee"),
            Action::Attack(AttackKind::Ranged) => write!(f, "attack_ranged"),
            Action::Attack(AttackKind::Meteor) => write!(f, "meteor_attack"),
        }
    }
}

#[derive(Debug, Default)]
struct ActionSlot {
    current: Option<Action>,
    reservation: Option<(Action, Instant)>,
}

/// Single-holder gate for a monster's action slot.
///
/// Acquisition fails while another action holds the slot; release is
/// unconditional. A timed reservation additionally keeps every other action
/// out until its deadline, which lets a node span several ticks without
/// holding the slot between them.
#[derive(Debug, Default)]
pub struct ActionState {
    slot: Mutex<ActionSlot>,
}

impl ActionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the slot. Returns false, leaving the holder untouched, when
    /// the slot is already held.
    pub fn set_action(&self, action: Action) -> bool {
        let mut slot = self.slot.lock();
        if slot.current.is_some() {
            return false;
        }
        slot.current = Some(action);
        true
    }

    pub fn clear_action(&self) {
        self.slot.lock().current = None;
    }

    pub fn current(&self) -> Option<Action> {
        self.slot.lock().current
    }

    /// Claims the slot for the lifetime of the returned guard.
    pub fn acquire(self: &Arc<Self>, action: Action, now: Instant) -> Option<ActionGuard> {
        let mut slot = self.slot.lock();
        if let Some((reserved, until)) = slot.reservation {
            if reserved != action && now < until {
                return None;
            }
        }
        if slot.current.is_some() {
            return None;
        }
        slot.current = Some(action);

        Some(ActionGuard {
            state: Arc::clone(self),
            action,
        })
    }

    /// Keeps every action other than `action` out until `until`.
    pub fn reserve(&self, action: Action, until: Instant) {
        self.slot.lock().reservation = Some((action, until));
    }

    /// Drops the reservation if `action` owns it.
    pub fn release_reservation(&self, action: Action) {
        let mut slot = self.slot.lock();
        if matches!(slot.reservation, Some((reserved, _)) if reserved == action) {
            slot.reservation = None;
        }
    }

    pub fn reservation(&self, now: Instant) -> Option<Action> {
        match self.slot.lock().reservation {
            Some((action, until)) if now < until => Some(action),
            _ => None,
        }
    }
}

/// Holds the action slot; releases it when dropped.
#[derive(Debug)]
pub struct ActionGuard {
    state: Arc<ActionState>,
    action: Action,
}

impl ActionGuard {
    pub fn action(&self) -> Action {
        self.action
    }
}

impl Drop for ActionGuard {
    fn drop(&mut self) {
        self.state.clear_action();
    }
}

/// Shared record of a monster's attack cycle.
///
/// An attack latches `current_attack` until the recovery wait that follows
/// it completes. While `is_waiting` holds, no attack may fire.
#[derive(Debug, Default)]
pub struct AttackState {
    pub current_attack: Option<AttackKind>,
    pub last_attack_time: Option<Instant>,
    pub is_waiting: bool,
    pub wait_until: Option<Instant>,
}

impl AttackState {
    pub fn begin_wait(&mut self, until: Instant) {
        self.is_waiting = true;
        self.wait_until = Some(until);
    }

    /// Completes the recovery wait and frees the attack latch.
    pub fn finish_wait(&mut self) {
        self.is_waiting = false;
        self.current_attack = None;
    }

    /// Applies the completion of a wait whose deadline has passed, even if
    /// the wait node that started it has not been revisited.
    pub fn expire_wait(&mut self, now: Instant) {
        if self.is_waiting && self.wait_until.map_or(true, |until| now > until) {
            self.finish_wait();
        }
    }

    pub fn is_waiting_at(&self, now: Instant) -> bool {
        self.is_waiting && self.wait_until.map_or(false, |until| now <= until)
    }

    /// True if an attack of another kind still holds the latch.
    pub fn blocked_by_other(&self, kind: AttackKind) -> bool {
        matches!(self.current_attack, Some(current) if current != kind)
    }

    pub fn cooldown_elapsed(&self, cooldown: Duration, now: Instant) -> bool {
        match self.last_attack_time {
            Some(last) => now.saturating_duration_since(last) >= cooldown,
            None => true,
        }
    }

    pub fn record_attack(&mut self, kind: AttackKind, now: Instant) {
        self.current_attack = Some(kind);
        self.last_attack_time = Some(now);
        // A new attack opens a new cycle; the next wait starts fresh.
        self.wait_until = None;
    }
}

/// Macro-behavior arbitrated at the root of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Combat,
    Chase,
}

impl Pattern {
    pub fn other(self) -> Pattern {
        match self {
            Pattern::Combat => Pattern::Chase,
            Pattern::Chase => Pattern::Combat,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Combat => write!(f, "combat"),
            Pattern::Chase => write!(f, "chase"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PatternState {
    pub last_pattern: Option<Pattern>,
    pub pattern_count: u32,
    pub max_repeat: u32,
}

impl PatternState {
    pub fn new(max_repeat: u32) -> Self {
        Self {
            last_pattern: None,
            pattern_count: 0,
            max_repeat,
        }
    }

    /// The pattern that must run next because the last one has repeated
    /// `max_repeat` times.
    pub fn forced_switch(&self) -> Option<Pattern> {
        if self.pattern_count < self.max_repeat {
            return None;
        }
        Some(match self.last_pattern {
            Some(Pattern::Chase) => Pattern::Combat,
            _ => Pattern::Chase,
        })
    }

    pub fn record(&mut self, pattern: Pattern) {
        if self.last_pattern == Some(pattern) {
            self.pattern_count += 1;
        } else {
            self.last_pattern = Some(pattern);
            self.pattern_count = 1;
        }
    }
}

/// An animated turn announced to clients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Turn {
    /// Heading when the turn started
    pub from: f32,
    pub heading: f32,
    pub done_at: Instant,
}

/// The animated turn a monster is playing out, if any.
#[derive(Debug, Default)]
pub struct TurnState {
    pending: Option<Turn>,
}

impl TurnState {
    pub fn begin(&mut self, turn: Turn) {
        self.pending = Some(turn);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn in_progress(&self, now: Instant) -> bool {
        matches!(self.pending, Some(turn) if now < turn.done_at)
    }

    /// Removes and returns the turn once its animation is over.
    pub fn take_finished(&mut self, now: Instant) -> Option<Turn> {
        match self.pending {
            Some(turn) if now >= turn.done_at => self.pending.take(),
            _ => None,
        }
    }
}

/// The shared records owned by one monster.
#[derive(Debug, Clone)]
pub struct MonsterStates {
    pub actions: Arc<ActionState>,
    pub attack: Arc<Mutex<AttackState>>,
    pub pattern: Arc<Mutex<PatternState>>,
    pub turn: Arc<Mutex<TurnState>>,
}

impl MonsterStates {
    pub fn new(max_repeat: u32) -> Self {
        Self {
            actions: Arc::new(ActionState::new()),
            attack: Arc::new(Mutex::new(AttackState::default())),
            pattern: Arc::new(Mutex::new(PatternState::new(max_repeat))),
            turn: Arc::new(Mutex::new(TurnState::default())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_action_refuses_second_holder() {
        let state = ActionState::new();
        assert!(state.set_action(Action::Chase));
        assert!(!state.set_action(Action::Rotate));
        assert!(!state.set_action(Action::Chase));
        assert_eq!(state.current(), Some(Action::Chase));
    }

    #[test]
    fn test_clear_action_is_unconditional() {
        let state = ActionState::new();
        state.clear_action();
        assert_eq!(state.current(), None);

        state.set_action(Action::Attack(AttackKind::Meteor));
        state.clear_action();
        assert_eq!(state.current(), None);
        assert!(state.set_action(Action::Rotate));
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let state = Arc::new(ActionState::new());
        let now = Instant::now();
        {
            let guard = state.acquire(Action::Chase, now).unwrap();
            assert_eq!(guard.action(), Action::Chase);
            assert!(state.acquire(Action::Rotate, now).is_none());
        }
        assert_eq!(state.current(), None);
        assert!(state.acquire(Action::Rotate, now).is_some());
    }

    #[test]
    fn test_reservation_blocks_other_actions_until_deadline() {
        let state = Arc::new(ActionState::new());
        let now = Instant::now();
        let until = now + Duration::from_secs(3);
        state.reserve(Action::Rotate, until);

        assert!(state.acquire(Action::Chase, now).is_none());
        assert!(state.acquire(Action::Rotate, now).is_some());
        assert_eq!(state.reservation(now), Some(Action::Rotate));

        // Expires on its own.
        assert!(state.acquire(Action::Chase, until).is_some());
        assert_eq!(state.reservation(until), None);

        state.reserve(Action::Rotate, until);
        state.release_reservation(Action::Chase);
        assert_eq!(state.reservation(now), Some(Action::Rotate));
        state.release_reservation(Action::Rotate);
        assert_eq!(state.reservation(now), None);
    }

    #[test]
    fn test_action_names() {
        assert_eq!(Action::Chase.to_string(), "chase");
        assert_eq!(Action::Rotate.to_string(), "rotate");
        assert_eq!(Action::Attack(AttackKind::Melee).to_string(), "attack_melee");
        assert_eq!(
            Action::Attack(AttackKind::Meteor).to_string(),
            "meteor_attack"
        );
    }

    #[test]
    fn test_attack_state_wait_cycle() {
        let now = Instant::now();
        let mut state = AttackState::default();
        assert!(state.cooldown_elapsed(Duration::from_secs(10), now));

        state.record_attack(AttackKind::Melee, now);
        assert!(state.blocked_by_other(AttackKind::Ranged));
        assert!(!state.blocked_by_other(AttackKind::Melee));
        assert!(!state.cooldown_elapsed(Duration::from_secs(4), now + Duration::from_secs(2)));

        let until = now + Duration::from_secs(5);
        state.begin_wait(until);
        assert!(state.is_waiting_at(now));
        assert!(state.is_waiting_at(until));

        state.expire_wait(until);
        assert!(state.is_waiting);

        state.expire_wait(until + Duration::from_millis(1));
        assert!(!state.is_waiting);
        assert_eq!(state.current_attack, None);
    }

    #[test]
    fn test_turn_finishes_at_deadline() {
        let now = Instant::now();
        let done_at = now + Duration::from_secs(4);
        let mut state = TurnState::default();
        state.begin(Turn {
            from: 0.0,
            heading: 1.0,
            done_at,
        });

        assert!(state.in_progress(now));
        assert_eq!(state.take_finished(now), None);
        assert!(state.is_pending());

        assert!(!state.in_progress(done_at));
        let turn = state.take_finished(done_at).unwrap();
        assert_eq!(turn.heading, 1.0);
        assert!(!state.is_pending());
        assert_eq!(state.take_finished(done_at), None);
    }

    #[test]
    fn test_pattern_state_forces_switch() {
        let mut state = PatternState::new(2);
        assert_eq!(state.forced_switch(), None);

        state.record(Pattern::Combat);
        assert_eq!(state.forced_switch(), None);
        state.record(Pattern::Combat);
        assert_eq!(state.pattern_count, 2);
        assert_eq!(state.forced_switch(), Some(Pattern::Chase));

        state.record(Pattern::Chase);
        assert_eq!(state.pattern_count, 1);
        assert_eq!(state.last_pattern, Some(Pattern::Chase));
        assert_eq!(Pattern::Chase.other(), Pattern::Combat);
    }
}
