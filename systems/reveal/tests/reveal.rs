use std::time::Duration;

use glam::Vec3;
use tilehop_core::{CellCategory, Command, Event, GridMarker, Reveal, SizeState, WorldConfig};
use tilehop_system_reveal::Reveal as RevealSystem;
use tilehop_world::{self as world, query, World};

fn pump(world: &mut World, reveal: &mut RevealSystem, command: Command) -> Vec<Event> {
    let mut log = Vec::new();
    let mut events = Vec::new();
    world::apply(world, command, &mut events);

    loop {
        log.extend(events.iter().cloned());
        let mut commands = Vec::new();
        reveal.handle(&events, &mut commands);
        if commands.is_empty() {
            break;
        }
        events.clear();
        for command in commands {
            world::apply(world, command, &mut events);
        }
    }

    log
}

#[test]
fn only_big_transitions_request_a_reindex() {
    let mut reveal = RevealSystem;
    let mut commands = Vec::new();

    reveal.handle(
        &[Event::MutationChanged {
            from: SizeState::Normal,
            to: SizeState::Small,
        }],
        &mut commands,
    );
    assert!(commands.is_empty());

    reveal.handle(
        &[
            Event::MutationChanged {
                from: SizeState::Normal,
                to: SizeState::Big,
            },
            Event::MutationChanged {
                from: SizeState::Big,
                to: SizeState::Normal,
            },
        ],
        &mut commands,
    );
    assert_eq!(commands, vec![Command::Reindex]);
}

#[test]
fn big_only_cells_follow_the_mutation() {
    let mut world = World::new(WorldConfig::default());
    let mut reveal = RevealSystem;
    let markers = vec![
        GridMarker::new(Vec3::ZERO, CellCategory::Normal),
        GridMarker::new(Vec3::X, CellCategory::Normal).with_reveal(Reveal::WhileBig),
    ];
    let _ = pump(
        &mut world,
        &mut reveal,
        Command::LoadLevel {
            markers,
            teleporters: Vec::new(),
            spawn: Vec3::ZERO,
        },
    );
    assert_eq!(query::grid(&world).len(), 1);

    let grown = pump(
        &mut world,
        &mut reveal,
        Command::SetMutation {
            size: SizeState::Big,
        },
    );
    assert!(grown
        .iter()
        .any(|event| matches!(event, Event::GridReindexed { cells: 2, .. })));

    let _ = pump(
        &mut world,
        &mut reveal,
        Command::ChangeScale {
            target: 1.0,
            duration: tilehop_core::EffectDuration::Permanent,
        },
    );
    let _ = pump(
        &mut world,
        &mut reveal,
        Command::Tick {
            dt: Duration::from_secs(1),
        },
    );
    assert_eq!(query::grid(&world).len(), 1);
    assert_eq!(query::agent(&world).size, SizeState::Normal);
}
