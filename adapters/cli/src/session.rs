//! Headless game loop that pumps the world and its systems.

use std::time::Duration;

use tilehop_core::{Command, Event, GridKey, MoveRejection};
use tilehop_system_navigation::Navigation;
use tilehop_system_reveal::Reveal;
use tilehop_system_tile_effects::TileEffects;
use tilehop_world::{self as world, query, World};
use tracing::debug;

use crate::level::Level;

/// How a requested move ended.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Outcome {
    /// The agent came to rest, possibly after being sent back.
    Settled(Option<GridKey>),
    /// The move was refused.
    Rejected(MoveRejection),
    /// The agent was still moving when the time limit ran out.
    TimedOut,
}

/// World plus the systems that react to it, advanced in fixed frames.
#[derive(Debug)]
pub(crate) struct Session {
    world: World,
    navigation: Navigation,
    tile_effects: TileEffects,
    reveal: Reveal,
    frame: Duration,
}

impl Session {
    pub(crate) fn new(level: Level, frame: Duration) -> Self {
        let (config, load) = level.into_parts();
        let mut session = Self {
            navigation: Navigation::new(&config.movement),
            tile_effects: TileEffects::new(config.effects.clone()),
            reveal: Reveal,
            world: World::new(config),
            frame,
        };
        let _ = session.submit(load);
        session
    }

    pub(crate) fn world(&self) -> &World {
        &self.world
    }

    /// Applies a command and feeds the resulting events through every system
    /// until no further commands are produced.
    pub(crate) fn submit(&mut self, command: Command) -> Vec<Event> {
        let mut log = Vec::new();
        let mut events = Vec::new();
        world::apply(&mut self.world, command, &mut events);

        while !events.is_empty() {
            for event in &events {
                debug!(?event, "event");
            }
            log.extend(events.iter().cloned());

            let grid = query::grid(&self.world);
            let agent = query::agent(&self.world);
            let mut commands = Vec::new();
            self.navigation
                .handle(&events, &grid, &agent, &mut commands);
            self.tile_effects.handle(&events, agent.size, &mut commands);
            self.reveal.handle(&events, &mut commands);

            events.clear();
            for command in commands {
                world::apply(&mut self.world, command, &mut events);
            }
        }

        log
    }

    /// Runs one fixed step followed by one variable step of the same length.
    pub(crate) fn frame(&mut self) -> Vec<Event> {
        let dt = self.frame;
        let mut events = self.submit(Command::FixedTick { dt });
        events.extend(self.submit(Command::Tick { dt }));
        events
    }

    /// Keeps simulating for roughly `duration`.
    pub(crate) fn run_for(&mut self, duration: Duration) {
        let mut elapsed = Duration::ZERO;
        while elapsed < duration {
            let _ = self.frame();
            elapsed += self.frame;
        }
    }

    /// Requests a move and simulates until the agent rests or `timeout` passes.
    pub(crate) fn travel(&mut self, target: GridKey, timeout: Duration) -> Outcome {
        let requested = self.submit(Command::RequestMove { target });
        if let Some(reason) = rejection(&requested) {
            return Outcome::Rejected(reason);
        }

        let mut elapsed = Duration::ZERO;
        while elapsed < timeout {
            let events = self.frame();
            elapsed += self.frame;
            if let Some(reason) = rejection(&events) {
                self.run_until_idle(timeout.saturating_sub(elapsed));
                return Outcome::Rejected(reason);
            }
            let agent = query::agent(&self.world);
            if agent.is_idle() {
                return Outcome::Settled(agent.cell);
            }
        }

        Outcome::TimedOut
    }

    fn run_until_idle(&mut self, limit: Duration) {
        let mut elapsed = Duration::ZERO;
        while elapsed < limit && !query::agent(&self.world).is_idle() {
            let _ = self.frame();
            elapsed += self.frame;
        }
    }
}

fn rejection(events: &[Event]) -> Option<MoveRejection> {
    events.iter().find_map(|event| match event {
        Event::MoveRejected { reason, .. } => Some(*reason),
        _ => None,
    })
}
