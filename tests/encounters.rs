//! Whole-encounter tests driven through `tick`

use boss_engine::consts::SIM_DT;
use boss_engine::sim::boss::quasar::QuasarPhase;
use boss_engine::sim::boss::swarm::{self, SwarmPhase};
use boss_engine::sim::components::HeaderKind;
use boss_engine::sim::walls::mask;
use boss_engine::sim::{
    BossKind, DespawnReason, Entity, Fixed, GameEvent, GameState, Request, SoundCue, TickInput, TickMetrics,
    WallGrid, World, tick,
};
use boss_engine::tuning::Tuning;

fn at(x: i32, y: i32) -> TickInput {
    TickInput {
        cursor: Some((x, y)),
        shield: None,
    }
}

fn created(events: &[GameEvent], kind: BossKind) -> Option<Entity> {
    events.iter().find_map(|e| match e {
        GameEvent::EnemyCreated { entity, kind: k, .. } if *k == kind => Some(*entity),
        _ => None,
    })
}

/// Every non-container member sits at its header cell plus its offset
fn assert_members_follow(world: &World) {
    for (header, h) in world.headers.iter() {
        if h.kind == HeaderKind::Container {
            continue;
        }
        let anchor = world.position(header).expect("header position");
        for m in &h.members {
            if let Some(p) = world.position(m.entity) {
                assert_eq!((p.x, p.y), (anchor.x + m.offset_x, anchor.y + m.offset_y));
            }
        }
    }
}

#[test]
fn test_quasar_holds_fire_while_cursor_in_range() {
    let mut tuning = Tuning::default();
    tuning.quasar.zap_radius_x = 5;
    tuning.quasar.zap_radius_y = 5;
    let mut state = GameState::new(1, WallGrid::open(60, 30), tuning);
    state.push_request(Request::Spawn {
        kind: BossKind::Quasar,
        x: 10,
        y: 10,
    });
    tick(&mut state, &at(14, 10), SIM_DT);
    let boss = created(&state.drain_events(), BossKind::Quasar).expect("quasar spawned");

    for _ in 0..300 {
        tick(&mut state, &at(14, 10), SIM_DT);
        let q = state.world.quasars.get(boss).expect("quasar");
        assert_eq!(q.phase, QuasarPhase::InRange);
    }
    let events = state.drain_events();
    assert!(!events.iter().any(|e| matches!(e, GameEvent::Sound(SoundCue::Zap))));
    assert!(!events.iter().any(|e| matches!(e, GameEvent::Lightning { .. })));

    tick(&mut state, &at(50, 25), SIM_DT);
    let q = state.world.quasars.get(boss).expect("quasar");
    assert_eq!(q.phase, QuasarPhase::Charging);
}

#[test]
fn test_quasar_zaps_once_per_charge_cycle() {
    let mut state = GameState::with_defaults(2);
    state.push_request(Request::Spawn {
        kind: BossKind::Quasar,
        x: 10,
        y: 10,
    });
    let far = at(110, 35);
    let mut metrics = TickMetrics::default();
    for _ in 0..60 {
        metrics.merge(&tick(&mut state, &far, SIM_DT));
    }
    assert_eq!(metrics.zaps, 0);
    let mut phases = Vec::new();
    for _ in 0..120 {
        tick(&mut state, &far, SIM_DT);
        for e in state.drain_events() {
            if let GameEvent::BossPhaseChanged { phase, .. } = e {
                phases.push(phase);
            }
        }
    }
    assert_eq!(phases.iter().filter(|p| **p == "zapping").count(), 1);
}

#[test]
fn test_swarm_never_enters_walls() {
    let mut walls = WallGrid::open(60, 21);
    walls.fill_rect(30, 0, 30, 20, mask::ALL);
    let mut tuning = Tuning::default();
    tuning.swarm.charge_interval = Fixed::from_ratio(1, 10);
    tuning.swarm.lock_duration = Fixed::from_ratio(1, 10);
    let mut state = GameState::new(3, walls, tuning);
    state.push_request(Request::Spawn {
        kind: BossKind::Swarm,
        x: 20,
        y: 10,
    });
    let mut teleported = false;
    let mut charged = false;
    for _ in 0..240 {
        let m = tick(&mut state, &at(45, 10), SIM_DT);
        teleported |= m.teleports > 0;
        let Some((boss, s)) = state.world.swarms.iter().next() else {
            continue;
        };
        charged |= s.phase == SwarmPhase::Charge;
        let anchor = state.world.position(boss).expect("anchor");
        assert!(state.world.walls.footprint_fits(anchor.x, anchor.y, &swarm::shape(), mask::ENEMY));
        if s.charges > 0 {
            break;
        }
    }
    assert!(teleported);
    assert!(!charged);
}

#[test]
fn test_composites_stay_rigid_through_encounter() {
    let mut state = GameState::with_defaults(4);
    for (kind, x) in [(BossKind::Quasar, 20), (BossKind::Swarm, 60), (BossKind::Storm, 95)] {
        state.push_request(Request::Spawn { kind, x, y: 20 });
    }
    for i in 0..900 {
        let input = TickInput {
            cursor: Some((10 + (i % 100), 5 + (i / 30) % 30)),
            shield: Some(i % 200 > 150),
        };
        tick(&mut state, &input, SIM_DT);
        assert_members_follow(&state.world);
    }
}

#[test]
fn test_storm_circle_dies_only_when_every_cell_is_gone() {
    let mut state = GameState::with_defaults(5);
    state.push_request(Request::Spawn {
        kind: BossKind::Storm,
        x: 60,
        y: 20,
    });
    tick(&mut state, &TickInput::default(), SIM_DT);
    let storm = created(&state.drain_events(), BossKind::Storm).expect("storm spawned");
    let circles = state.world.storms.get(storm).expect("storm").circles;

    let members = |state: &GameState, circle: Entity| -> Vec<Entity> {
        state.world.headers.get(circle).map(|h| h.members.iter().map(|m| m.entity).collect()).unwrap_or_default()
    };
    let hit_all = |state: &mut GameState, targets: &[Entity]| {
        for &m in targets {
            if let Some(p) = state.world.protections.get_mut(m) {
                p.damage_immune = false;
            }
            state.push_request(Request::Damage {
                occupant: m,
                amount: 1_000,
                stun: Fixed::ZERO,
            });
        }
        tick(state, &TickInput::default(), SIM_DT);
    };

    // all but one cell of the first circle
    let first = members(&state, circles[0]);
    hit_all(&mut state, &first[1..]);
    assert!(state.world.is_alive(circles[0]));

    hit_all(&mut state, &first[..1]);
    assert!(!state.world.is_alive(circles[0]));
    assert!(state.world.is_alive(storm));
    let events = state.drain_events();
    assert!(events.iter().any(|e| matches!(e, GameEvent::StormCircleDestroyed { circle, .. } if *circle == circles[0])));
    assert!(!events.iter().any(|e| matches!(e, GameEvent::BossDespawned { .. })));

    for &circle in &circles[1..] {
        let cells = members(&state, circle);
        hit_all(&mut state, &cells);
    }
    assert!(!state.world.is_alive(storm));
    assert!(state.drain_events().iter().any(|e| matches!(
        e,
        GameEvent::BossDespawned {
            reason: DespawnReason::Killed,
            ..
        }
    )));
}

#[test]
fn test_storm_nudges_are_counted() {
    let mut tuning = Tuning::default();
    tuning.storm.attack_cooldown = Fixed::from_int(1_000);
    tuning.storm.max_convex_duration = Fixed::ONE;
    let mut state = GameState::new(6, WallGrid::open(120, 40), tuning);
    state.push_request(Request::Spawn {
        kind: BossKind::Storm,
        x: 60,
        y: 20,
    });
    let mut metrics = TickMetrics::default();
    for _ in 0..1200 {
        metrics.merge(&tick(&mut state, &at(0, 0), SIM_DT));
    }
    let nudges = state
        .drain_events()
        .iter()
        .filter(|e| matches!(e, GameEvent::DepthNudge { .. }))
        .count();
    assert!(nudges > 0);
    assert_eq!(nudges as u32, metrics.depth_nudges);
    // three circles, one nudge per second at most
    assert!(metrics.depth_nudges <= 3 * 20);
}

#[test]
fn test_save_restore_resumes_identically() {
    let mut state = GameState::with_defaults(7);
    for (kind, x) in [(BossKind::Quasar, 20), (BossKind::Swarm, 60), (BossKind::Storm, 95)] {
        state.push_request(Request::Spawn { kind, x, y: 20 });
    }
    let input = |i: i32| TickInput {
        cursor: Some((30 + (i % 60), 10 + (i / 20) % 20)),
        shield: Some(i % 90 < 20),
    };
    for i in 0..400 {
        tick(&mut state, &input(i), SIM_DT);
    }
    state.drain_events();

    let json = state.to_json().expect("serialize");
    let mut restored = GameState::from_json(&json).expect("deserialize");
    assert_eq!(restored.to_json().expect("reserialize"), json);
    for (e, q) in state.world.quasars.iter() {
        assert_eq!(restored.world.quasars.get(e), Some(q));
    }

    for i in 400..800 {
        let a = tick(&mut state, &input(i), SIM_DT);
        let b = tick(&mut restored, &input(i), SIM_DT);
        assert_eq!(a, b);
    }
    assert_eq!(state.drain_events(), restored.drain_events());
    assert_eq!(state.boss_snapshots(), restored.boss_snapshots());
}

/// Spawn one boss, let it run, then remove `pick(state, header)` behind its back
fn remove_from_outside(kind: BossKind, pick: impl Fn(&GameState, Entity) -> Entity) -> (GameState, Entity, Vec<GameEvent>) {
    let mut state = GameState::with_defaults(8);
    state.push_request(Request::Spawn { kind, x: 60, y: 20 });
    for _ in 0..10 {
        tick(&mut state, &at(10, 5), SIM_DT);
    }
    let header = created(&state.drain_events(), kind).expect("boss spawned");
    let victim = pick(&state, header);
    assert!(state.world.despawn(victim));
    for _ in 0..5 {
        tick(&mut state, &at(10, 5), SIM_DT);
    }
    let events = state.drain_events();
    (state, header, events)
}

fn despawn_reasons(events: &[GameEvent]) -> Vec<DespawnReason> {
    events
        .iter()
        .filter_map(|e| match e {
            GameEvent::BossDespawned { reason, .. } => Some(*reason),
            _ => None,
        })
        .collect()
}

#[test]
fn test_quasar_header_removed_from_outside() {
    let (state, _, events) = remove_from_outside(BossKind::Quasar, |_, header| header);
    assert_eq!(state.world.live_count(), 0);
    assert!(state.boss_snapshots().is_empty());
    assert_eq!(despawn_reasons(&events), vec![DespawnReason::External]);
}

#[test]
fn test_swarm_header_removed_from_outside() {
    let (state, _, events) = remove_from_outside(BossKind::Swarm, |_, header| header);
    assert_eq!(state.world.live_count(), 0);
    assert_eq!(despawn_reasons(&events), vec![DespawnReason::External]);
}

#[test]
fn test_storm_root_removed_from_outside() {
    let (state, _, events) = remove_from_outside(BossKind::Storm, |_, header| header);
    assert_eq!(state.world.live_count(), 0);
    assert!(state.world.circles.is_empty());
    assert_eq!(despawn_reasons(&events), vec![DespawnReason::External]);
}

#[test]
fn test_storm_circle_removed_from_outside() {
    let (state, root, events) = remove_from_outside(BossKind::Storm, |state, root| {
        state.world.storms.get(root).expect("storm").circles[0]
    });
    assert!(state.world.is_alive(root));
    let storm = state.world.storms.get(root).expect("storm");
    assert!(storm.circles[0].is_none());
    assert_eq!(storm.live_circles(&state.world).len(), 2);
    // only the two remaining circles still own member cells
    let owners: std::collections::BTreeSet<Entity> = state.world.members.iter().map(|(_, m)| m.header).collect();
    assert_eq!(owners.into_iter().collect::<Vec<_>>(), storm.live_circles(&state.world));
    let lost = events
        .iter()
        .filter(|e| matches!(e, GameEvent::StormCircleDestroyed { .. }))
        .count();
    assert_eq!(lost, 1);
    assert!(despawn_reasons(&events).is_empty());
}

#[test]
fn test_assign_targets_prefers_bosses() {
    let mut state = GameState::with_defaults(9);
    state.push_request(Request::Spawn {
        kind: BossKind::Quasar,
        x: 40,
        y: 20,
    });
    state.push_request(Request::SpawnDrain { x: 2, y: 2, hp: 5 });
    state.push_request(Request::AssignTargets { x: 0, y: 0, count: 4 });
    tick(&mut state, &at(100, 30), SIM_DT);
    let quasar = created(&state.drain_events(), BossKind::Quasar).expect("quasar spawned");

    let first = state.target_groups.get(0).copied().expect("group 0");
    assert_eq!(first.entity, quasar);
    assert_eq!(state.target_groups.get(2).map(|g| g.entity), Some(quasar));
    assert_eq!(state.target_groups.valid_count(), 4);

    // the cache follows the boss as it moves
    for _ in 0..60 {
        tick(&mut state, &at(100, 30), SIM_DT);
    }
    let anchor = state.world.position(quasar).expect("anchor");
    let group = state.target_groups.get(0).copied().expect("group 0");
    assert_eq!((group.x, group.y), (anchor.x, anchor.y));
}
