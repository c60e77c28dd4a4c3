use super::attack::{Attack, MeteorAttack};
use super::composite::{MutuallyExclusiveSelector, Selector, Sequence};
use super::movement::{Chase, HoldDuringTurn, RotateToTarget, RotateWithoutAnimation};
use super::pattern::PatternTracker;
use super::perception::{DetectPlayer, RotationCheckBeforeChase};
use super::state::MonsterStates;
use super::wait::Wait;
use super::Node;
use crate::config::AiConfig;
use std::sync::Arc;

/// Builds the behavior tree of a standard monster.
///
/// Nothing runs until a player is within detection range. From then on the
/// pattern tracker alternates between the combat and chase subtrees. While
/// an animated turn plays out the whole tree is held.
pub fn build_monster_tree(config: &AiConfig, states: &MonsterStates) -> Box<dyn Node> {
    let combat = combat_subtree(config, states);
    let chase = chase_subtree(config, states);

    let root = Selector::new(vec![Box::new(Sequence::new(vec![
        detect(config, config.detection_range),
        Box::new(PatternTracker::new(
            Arc::clone(&states.pattern),
            combat,
            chase,
            config.chase_probability,
        )),
    ]))]);

    Box::new(HoldDuringTurn::new(
        Arc::clone(&states.actions),
        Arc::clone(&states.turn),
        Box::new(root),
    ))
}

fn detect(config: &AiConfig, range: f32) -> Box<dyn Node> {
    Box::new(DetectPlayer::new(range, config.detection_interval()))
}

fn face_target(config: &AiConfig) -> Box<dyn Node> {
    Box::new(RotateWithoutAnimation::new(config.rotate.instant_marker))
}

/// Melee when the target is close, otherwise alternate ranged and meteor.
/// Every attack is followed by its recovery wait.
fn combat_subtree(config: &AiConfig, states: &MonsterStates) -> Box<dyn Node> {
    let melee = Sequence::new(vec![
        detect(config, config.melee.range),
        face_target(config),
        Box::new(Attack::melee(
            config.melee.params(),
            Arc::clone(&states.actions),
            Arc::clone(&states.attack),
        )),
        Box::new(Wait::new(config.melee.wait(), Arc::clone(&states.attack))),
    ]);

    let ranged = Sequence::new(vec![
        detect(config, config.ranged.range),
        face_target(config),
        Box::new(Attack::ranged(
            config.ranged.params(),
            Arc::clone(&states.actions),
            Arc::clone(&states.attack),
        )),
        Box::new(Wait::new(config.ranged.wait(), Arc::clone(&states.attack))),
    ]);

    let meteor = Sequence::new(vec![
        detect(config, config.meteor.attack.range),
        face_target(config),
        Box::new(MeteorAttack::new(
            config.meteor.attack.params(),
            config.meteor.strike_radius,
            Arc::clone(&states.actions),
            Arc::clone(&states.attack),
        )),
        Box::new(Wait::new(
            config.meteor.attack.wait(),
            Arc::clone(&states.attack),
        )),
    ]);

    Box::new(Selector::new(vec![
        Box::new(melee),
        Box::new(MutuallyExclusiveSelector::new(
            vec![Box::new(ranged), Box::new(meteor)],
            config.selector_cooldown(),
        )),
    ]))
}

/// One chase pulse, turning first with an animation when the target is far
/// off-axis, followed by a pause.
fn chase_subtree(config: &AiConfig, states: &MonsterStates) -> Box<dyn Node> {
    let chase = || -> Box<dyn Node> {
        Box::new(Chase::new(
            Arc::clone(&states.actions),
            config.chase.params(),
        ))
    };

    let turn_then_chase = Sequence::new(vec![
        Box::new(RotationCheckBeforeChase::new(
            config.rotate.large_angle_threshold,
        )),
        Box::new(Sequence::new(vec![
            detect(config, config.detection_range),
            Box::new(RotateToTarget::new(
                Arc::clone(&states.actions),
                Arc::clone(&states.turn),
                config.rotate.base_duration_secs,
                config.rotate.min_angle,
                config.rotate.view_angle,
            )),
            chase(),
        ])),
    ]);

    let face_then_chase = Sequence::new(vec![
        detect(config, config.detection_range),
        face_target(config),
        chase(),
    ]);

    Box::new(Sequence::new(vec![
        detect(config, config.detection_range),
        Box::new(Selector::new(vec![
            Box::new(turn_then_chase),
            Box::new(face_then_chase),
        ])),
        Box::new(Wait::new(config.chase.wait(), Arc::clone(&states.attack))),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::testing::Harness;
    use crate::behavior::{Pattern, Status};
    use crate::geometry::Point;
    use crate::monster_manager::MonsterBody;
    use shared::{AttackKind, GameMessage};
    use std::time::Duration;

    fn harness_with_player(x: f32, z: f32) -> Harness {
        Harness::new(
            MonsterBody::new(1, 0.0, 0.0, 100),
            vec![Point::owned_by(x, z, "player-1")],
        )
    }

    #[test]
    fn test_idle_without_players() {
        let config = AiConfig::default();
        let states = MonsterStates::new(config.pattern_max_repeat);
        let mut tree = build_monster_tree(&config, &states);
        let mut h = Harness::at_origin();

        assert_eq!(h.run(&mut tree), Status::Failure);
        assert!(h.events.messages().is_empty());
    }

    #[test]
    fn test_combat_melee_on_close_player() {
        let config = AiConfig {
            chase_probability: 0.0,
            ..AiConfig::default()
        };
        let states = MonsterStates::new(config.pattern_max_repeat);
        let mut tree = build_monster_tree(&config, &states);
        let mut h = harness_with_player(2.0, 0.0);

        // Attack fires, then the recovery wait holds the sequence.
        assert_eq!(h.run(&mut tree), Status::Running);
        let messages = h.events.messages();
        assert!(matches!(messages[0], GameMessage::MonsterRotate { .. }));
        assert_eq!(
            messages[1],
            GameMessage::MonsterAttack {
                monster_id: 1,
                target_player_id: "player-1".to_string(),
                attack_type: AttackKind::Melee,
                damage: 10.0,
            }
        );
        assert!(states.attack.lock().is_waiting);
        assert_eq!(states.actions.current(), None);
    }

    #[test]
    fn test_chase_moves_towards_distant_player() {
        let config = AiConfig {
            chase_probability: 1.0,
            pattern_max_repeat: 100,
            ..AiConfig::default()
        };
        let states = MonsterStates::new(config.pattern_max_repeat);
        let mut tree = build_monster_tree(&config, &states);
        let mut h = harness_with_player(30.0, 0.0);

        assert_eq!(h.run(&mut tree), Status::Running);
        for _ in 0..5 {
            h.advance(Duration::from_millis(100));
            h.run(&mut tree);
        }

        assert!(h.monster.x > 0.0);
        assert!(h.monster.x < 30.0);
        assert!(h
            .events
            .messages()
            .iter()
            .any(|m| matches!(m, GameMessage::MoveMonster { monster_id: 1, .. })));
    }

    #[test]
    fn test_out_of_detection_range_does_nothing() {
        let config = AiConfig::default();
        let states = MonsterStates::new(config.pattern_max_repeat);
        let mut tree = build_monster_tree(&config, &states);
        let mut h = harness_with_player(200.0, 0.0);

        assert_eq!(h.run(&mut tree), Status::Failure);
        assert_eq!(h.monster.target, None);
        assert!(h.events.messages().is_empty());
    }

    fn rotate_messages(h: &Harness) -> Vec<f32> {
        h.events
            .messages()
            .iter()
            .filter_map(|m| match m {
                GameMessage::MonsterRotate { duration, .. } => Some(*duration),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_animated_turn_holds_tree_across_forced_switch() {
        // Chase is drawn first; after one chase the switch to combat is forced.
        let config = AiConfig {
            chase_probability: 1.0,
            pattern_max_repeat: 1,
            ..AiConfig::default()
        };
        let states = MonsterStates::new(config.pattern_max_repeat);
        let mut tree = build_monster_tree(&config, &states);
        let mut h = harness_with_player(-10.0, 0.0);

        assert_eq!(h.run(&mut tree), Status::Running);
        assert_eq!(rotate_messages(&h), vec![5.0]);

        for _ in 0..49 {
            h.advance(Duration::from_millis(100));
            assert_eq!(h.run(&mut tree), Status::Running);
        }
        assert_eq!(h.events.messages().len(), 1);
        assert_eq!(h.monster.rotation, 0.0);
        assert!(h.monster.target.is_some());
        assert_eq!(states.pattern.lock().pattern_count, 1);

        // The turn completes, then combat runs from the new heading.
        h.advance(Duration::from_millis(100));
        h.run(&mut tree);
        assert!((h.monster.rotation.abs() - std::f32::consts::PI).abs() < 0.0001);
        assert_eq!(states.pattern.lock().last_pattern, Some(Pattern::Combat));
        assert!(h.events.messages().iter().any(|m| matches!(
            m,
            GameMessage::MonsterAttack {
                attack_type: AttackKind::Ranged | AttackKind::Meteor,
                ..
            }
        )));
    }

    #[test]
    fn test_melee_attack_wait_attack_cycle() {
        let config = AiConfig {
            chase_probability: 0.0,
            pattern_max_repeat: 100,
            ..AiConfig::default()
        };
        let states = MonsterStates::new(config.pattern_max_repeat);
        let mut tree = build_monster_tree(&config, &states);
        let mut h = harness_with_player(2.0, 0.0);
        let start = h.now;

        let mut attacks = Vec::new();
        for _ in 0..=60 {
            let before = h.events.messages().len();
            h.run(&mut tree);
            for message in &h.events.messages()[before..] {
                if let GameMessage::MonsterAttack { attack_type, .. } = message {
                    attacks.push((h.now - start, *attack_type));
                }
            }
            h.advance(Duration::from_millis(100));
        }

        // The wait opened by the first attack expires at 5s even though its
        // node is never revisited; the next detection pass fires again.
        assert_eq!(
            attacks,
            vec![
                (Duration::ZERO, AttackKind::Melee),
                (Duration::from_millis(5_500), AttackKind::Melee),
            ]
        );
        let attack = states.attack.lock();
        assert_eq!(attack.current_attack, Some(AttackKind::Melee));
        assert!(attack.is_waiting);
    }
}
