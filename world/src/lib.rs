#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state for Tilehop.
//!
//! The world owns the level markers, the current grid snapshot, the agent and
//! every timer that acts on them. It only changes in response to [`Command`]
//! values passed to [`apply`] and reports each change as an [`Event`].

mod effects;
mod grid;
mod hop;

use std::{collections::HashSet, sync::Arc, time::Duration};

use glam::Vec3;
use tilehop_core::{
    CellCategory, Collaborator, Command, EffectDuration, Event, GridKey, GridMarker,
    InvalidTarget, MarkerId, MoveRejection, PathStep, Reveal, SizeState, TeleporterId,
    TeleporterSpec, TileEffect, WorldConfig,
};
use tracing::{debug, error, info, warn};

pub use grid::{planar_distance, Blocker, GridCell, GridIndex};

use effects::{PlatformFall, PlatformProgress, ScaleTransition, Sticky};
use hop::{Hop, HopProgress};

/// Represents the authoritative Tilehop world state.
#[derive(Debug)]
pub struct World {
    config: WorldConfig,
    markers: Vec<GridMarker>,
    teleporters: Vec<Teleporter>,
    grid: Arc<GridIndex>,
    agent: Agent,
    path: Option<ActivePath>,
    hop: Option<Hop>,
    scale: Option<ScaleTransition>,
    rollback: Option<PendingRollback>,
    sticky: Option<Sticky>,
    platforms: Vec<PlatformFall>,
    touched_platforms: HashSet<GridKey>,
}

impl World {
    /// Creates an empty world that waits for a level to be loaded.
    #[must_use]
    pub fn new(config: WorldConfig) -> Self {
        let agent = Agent::new(config.scale.default_scale);
        Self {
            config,
            markers: Vec::new(),
            teleporters: Vec::new(),
            grid: Arc::new(GridIndex::default()),
            agent,
            path: None,
            hop: None,
            scale: None,
            rollback: None,
            sticky: None,
            platforms: Vec::new(),
            touched_platforms: HashSet::new(),
        }
    }

    fn is_busy(&self) -> bool {
        self.hop.is_some() || self.path.is_some() || self.rollback.is_some()
    }

    fn load_level(
        &mut self,
        markers: Vec<GridMarker>,
        teleporters: Vec<TeleporterSpec>,
        spawn: Vec3,
        out_events: &mut Vec<Event>,
    ) {
        self.markers = markers;
        self.teleporters = teleporters
            .into_iter()
            .map(|spec| Teleporter { spec, used: false })
            .collect();
        self.agent = Agent::new(self.config.scale.default_scale);
        self.path = None;
        self.hop = None;
        self.scale = None;
        self.rollback = None;
        self.sticky = None;
        self.platforms.clear();
        self.touched_platforms.clear();

        self.rebuild(out_events);

        let Some(cell) = self.grid.find_nearest(spawn).copied() else {
            error!(
                missing = %Collaborator::Grid,
                "level has no cells; movement is disabled"
            );
            return;
        };

        self.agent.cell = Some(cell.key());
        self.agent.position = cell.position();
        self.agent.last_safe_position = cell.position();
        info!(cell = %cell.key(), "agent placed");
        out_events.push(Event::AgentPlaced {
            cell: cell.key(),
            position: cell.position(),
        });
    }

    fn rebuild(&mut self, out_events: &mut Vec<Event>) {
        let generation = self.grid.generation().saturating_add(1);
        let big = self.agent.size == SizeState::Big;
        let revealed = self
            .markers
            .iter()
            .enumerate()
            .filter(|(_, marker)| marker.reveal == Reveal::Always || big)
            .filter_map(|(index, marker)| {
                u32::try_from(index)
                    .ok()
                    .map(|raw| (MarkerId::new(raw), marker))
            });
        self.grid = Arc::new(GridIndex::build(
            generation,
            revealed,
            &self.config.obstacle_mask,
        ));

        if let Some(key) = self.agent.cell {
            if self.grid.cell_at(key).is_none() {
                let nearest = self.grid.find_nearest(self.agent.position).map(GridCell::key);
                warn!(previous = %key, "agent cell left the grid");
                self.agent.cell = nearest;
            }
        }

        info!(generation, cells = self.grid.len(), "grid reindexed");
        out_events.push(Event::GridReindexed {
            generation,
            cells: self.grid.len(),
        });
    }

    fn request_move(&mut self, target: GridKey, out_events: &mut Vec<Event>) {
        if self.grid.is_empty() {
            self.reject(
                Some(target),
                MoveRejection::MissingCollaborator(Collaborator::Grid),
                out_events,
            );
            return;
        }
        if self.agent.cell.is_none() {
            self.reject(
                Some(target),
                MoveRejection::MissingCollaborator(Collaborator::AgentPlacement),
                out_events,
            );
            return;
        }
        if self.is_busy() {
            self.reject(Some(target), MoveRejection::AgentBusy, out_events);
            return;
        }
        out_events.push(Event::MoveRequested { target });
    }

    fn reject(&self, target: Option<GridKey>, reason: MoveRejection, out_events: &mut Vec<Event>) {
        match reason {
            MoveRejection::MissingCollaborator(_) => error!(%reason, "move rejected"),
            _ => warn!(%reason, "move rejected"),
        }
        out_events.push(Event::MoveRejected { target, reason });
    }

    fn assign_path(
        &mut self,
        generation: u64,
        target: GridKey,
        steps: Vec<PathStep>,
        out_events: &mut Vec<Event>,
    ) {
        if self.is_busy() {
            self.reject(Some(target), MoveRejection::AgentBusy, out_events);
            return;
        }
        if generation != self.grid.generation() {
            self.reject(Some(target), MoveRejection::StaleGrid, out_events);
            return;
        }
        if steps.is_empty() {
            self.reject(
                Some(target),
                MoveRejection::InvalidTarget(InvalidTarget::CurrentCell),
                out_events,
            );
            return;
        }

        debug!(%target, hops = steps.len(), "path assigned");
        out_events.push(Event::PathChanged {
            target,
            steps: steps.iter().map(|step| step.key).collect(),
        });
        self.path = Some(ActivePath { steps, next: 0 });
    }

    fn clear_path(&mut self, out_events: &mut Vec<Event>) {
        let had_path = self.path.take().is_some();
        let had_hop = self.hop.take().is_some();
        if had_path || had_hop {
            out_events.push(Event::PathCleared);
        }
    }

    fn fixed_tick(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        let duration = self.config.movement.jump_duration();
        let jump_height = self.config.movement.jump_height;

        if let Some(hop) = self.hop.as_mut() {
            match hop.advance(dt, duration, jump_height) {
                HopProgress::InFlight(position) => {
                    self.agent.position = position;
                    out_events.push(Event::AgentMoved { position });
                }
                HopProgress::Arrived(step) => {
                    self.hop = None;
                    self.land(step, out_events);
                }
            }
            return;
        }

        let Some(step) = self
            .path
            .as_ref()
            .and_then(|path| path.steps.get(path.next).copied())
        else {
            return;
        };

        let from = self
            .agent
            .cell
            .unwrap_or_else(|| GridKey::from_position(self.agent.position));
        debug!(%from, to = %step.key, "hop started");
        self.hop = Some(Hop::new(self.agent.position, step));
        out_events.push(Event::HopStarted { from, to: step.key });
    }

    fn land(&mut self, step: PathStep, out_events: &mut Vec<Event>) {
        self.agent.position = step.position;

        let exhausted = match self.path.as_mut() {
            Some(path) => {
                path.next += 1;
                path.next >= path.steps.len()
            }
            None => true,
        };

        match self.grid.cell_at(step.key).copied() {
            Some(cell) => {
                self.agent.previous_cell = self.agent.cell;
                self.agent.cell = Some(cell.key());
                if cell.category().records_safe_position() {
                    self.agent.last_safe_position = cell.position();
                }
                info!(cell = %cell.key(), category = ?cell.category(), "agent landed");
                out_events.push(Event::AgentLanded {
                    cell: cell.key(),
                    category: cell.category(),
                    position: step.position,
                });
            }
            None => {
                error!(cell = %step.key, "agent landed on a cell that left the grid");
                self.agent.previous_cell = self.agent.cell;
                self.agent.cell = self.grid.find_nearest(step.position).map(GridCell::key);
            }
        }

        if exhausted && self.path.take().is_some() {
            out_events.push(Event::PathCleared);
        }
    }

    fn tick(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        out_events.push(Event::TimeAdvanced { dt });
        self.advance_scale(dt, out_events);
        self.advance_sticky(dt, out_events);
        self.advance_rollback(dt, out_events);
        self.advance_platforms(dt, out_events);
    }

    fn change_scale(&mut self, target: f32, duration: EffectDuration, out_events: &mut Vec<Event>) {
        debug!(from = self.agent.scale, to = target, ?duration, "scale change started");
        self.scale = Some(ScaleTransition::new(self.agent.scale, target, duration));
        let size = SizeState::from_scale(target, self.config.scale.default_scale);
        self.set_size(size, out_events);
    }

    fn set_size(&mut self, size: SizeState, out_events: &mut Vec<Event>) {
        if self.agent.size == size {
            return;
        }
        let from = self.agent.size;
        self.agent.size = size;
        info!(?from, to = ?size, "mutation changed");
        out_events.push(Event::MutationChanged { from, to: size });
    }

    fn advance_scale(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        let transition = self.config.scale.transition();
        let default_scale = self.config.scale.default_scale;
        let Some(scale) = self.scale.as_mut() else {
            return;
        };

        let progress = scale.advance(dt, transition, default_scale);
        if progress.settled {
            self.scale = None;
        }
        if (progress.scale - self.agent.scale).abs() > f32::EPSILON {
            self.agent.scale = progress.scale;
            out_events.push(Event::ScaleChanged {
                scale: progress.scale,
            });
        }
        if progress.reverting {
            self.set_size(SizeState::Normal, out_events);
        }
    }

    fn set_sticky(&mut self, sticky: Sticky, out_events: &mut Vec<Event>) {
        out_events.push(Event::StickyChanged {
            active: true,
            fall_delay_multiplier: sticky.multiplier(),
        });
        self.sticky = Some(sticky);
    }

    fn clear_sticky(&mut self, out_events: &mut Vec<Event>) {
        if self.sticky.take().is_some() {
            debug!("sticky cleared");
            out_events.push(Event::StickyChanged {
                active: false,
                fall_delay_multiplier: 1.0,
            });
        }
    }

    fn advance_sticky(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        let expired = self
            .sticky
            .as_mut()
            .map_or(false, |sticky| sticky.advance(dt));
        if expired {
            self.clear_sticky(out_events);
        }
    }

    /// Where a rollback decided now would send the agent. Mid-hop that is the
    /// cell being left, otherwise the cell before the current one.
    fn rollback_destination(&self) -> RollbackDestination {
        let cell = if self.hop.is_some() {
            self.agent.cell
        } else {
            self.agent.previous_cell
        };
        RollbackDestination {
            cell,
            fallback: self.agent.last_safe_position,
        }
    }

    fn schedule_rollback(&mut self, delay: Duration, out_events: &mut Vec<Event>) {
        let destination = self.rollback_destination();
        debug!(?delay, cell = ?destination.cell, "rollback scheduled");
        self.rollback = Some(PendingRollback {
            remaining: delay,
            destination,
        });
        if let Some(path) = self.path.as_mut() {
            path.steps.truncate(path.next);
            if self.hop.is_none() {
                self.path = None;
                out_events.push(Event::PathCleared);
            }
        }
    }

    fn advance_rollback(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        let Some(pending) = self.rollback.as_mut() else {
            return;
        };
        if dt < pending.remaining {
            pending.remaining -= dt;
            return;
        }
        let destination = pending.destination;
        self.rollback = None;
        self.roll_back(destination, out_events);
    }

    fn roll_back(&mut self, destination: RollbackDestination, out_events: &mut Vec<Event>) {
        self.clear_path(out_events);

        let previous = destination
            .cell
            .and_then(|key| self.grid.cell_at(key).copied());
        let (cell, position) = match previous {
            Some(cell) => (Some(cell.key()), cell.position()),
            None => {
                let position = destination.fallback;
                (
                    self.grid.find_nearest(position).map(GridCell::key),
                    position,
                )
            }
        };

        self.agent.position = position;
        self.agent.cell = cell;
        self.agent.previous_cell = None;
        info!(cell = ?cell, "agent rolled back");
        out_events.push(Event::AgentRolledBack { cell, position });
    }

    fn apply_tile_effect(&mut self, cell: GridKey, effect: TileEffect, out_events: &mut Vec<Event>) {
        match effect {
            TileEffect::Mutate {
                scale,
                duration,
                rollback_after,
            } => {
                self.change_scale(scale, duration, out_events);
                if let Some(delay) = rollback_after {
                    self.schedule_rollback(delay, out_events);
                }
            }
            TileEffect::Sticky {
                duration,
                fall_delay_multiplier,
            } => self.set_sticky(Sticky::new(duration, fall_delay_multiplier), out_events),
            TileEffect::PlatformFall => {
                if !self.arm_platform(cell, out_events) {
                    return;
                }
            }
            TileEffect::Blocked => {
                self.reject(Some(cell), MoveRejection::TooLarge, out_events);
                let destination = self.rollback_destination();
                self.rollback = None;
                self.roll_back(destination, out_events);
            }
        }

        info!(%cell, ?effect, "tile effect applied");
        out_events.push(Event::EffectTriggered { cell, effect });
    }

    fn arm_platform(&mut self, cell: GridKey, out_events: &mut Vec<Event>) -> bool {
        let Some(platform) = self.grid.cell_at(cell).copied() else {
            return false;
        };
        if platform.category() != CellCategory::FallingPlatform
            || !self.touched_platforms.insert(cell)
        {
            return false;
        }

        let multiplier = self.sticky.map_or(1.0, |sticky| sticky.multiplier());
        let delay = self
            .config
            .effects
            .platform
            .fall_delay()
            .mul_f32(multiplier.max(0.0));
        debug!(%cell, ?delay, "platform armed");
        self.platforms.push(PlatformFall::new(
            cell,
            platform.marker(),
            platform.position(),
            delay,
        ));
        out_events.push(Event::PlatformArmed { cell, delay });
        true
    }

    fn advance_platforms(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        let fall_duration = self.config.effects.platform.fall_duration();
        let mut fell = Vec::new();

        for platform in &mut self.platforms {
            match platform.advance(dt, fall_duration) {
                PlatformProgress::Waiting | PlatformProgress::Descending => {}
                PlatformProgress::Started => {
                    out_events.push(Event::PlatformFalling {
                        cell: platform.cell(),
                    });
                }
                PlatformProgress::Fell => fell.push((platform.cell(), platform.marker())),
            }
        }

        if fell.is_empty() {
            return;
        }

        self.platforms
            .retain(|platform| !fell.iter().any(|(cell, _)| *cell == platform.cell()));
        for (cell, marker) in &fell {
            if let Some(marker) = self.markers.get_mut(marker.get() as usize) {
                marker.active = false;
            }
            info!(%cell, "platform fell");
            out_events.push(Event::PlatformFell { cell: *cell });
        }
        self.rebuild(out_events);
    }

    fn set_marker_active(&mut self, marker: MarkerId, active: bool) {
        match self.markers.get_mut(marker.get() as usize) {
            Some(entry) => entry.active = active,
            None => warn!(marker = marker.get(), "unknown marker"),
        }
    }

    fn activate_teleporter(&mut self, teleporter: TeleporterId, out_events: &mut Vec<Event>) {
        let Some(index) = self
            .teleporters
            .iter()
            .position(|entry| entry.spec.id == teleporter)
        else {
            self.reject(None, MoveRejection::UnknownTeleporter, out_events);
            return;
        };

        if self.teleporters[index].used {
            self.reject(None, MoveRejection::TeleporterSpent, out_events);
            return;
        }
        if self.agent.size != SizeState::Small {
            self.reject(None, MoveRejection::TooLarge, out_events);
            return;
        }

        self.teleporters[index].used = true;
        let position =
            self.teleporters[index].spec.destination + Vec3::Y * self.config.ground_offset;
        self.clear_path(out_events);
        self.rollback = None;
        self.agent.position = position;
        let arrival = self.grid.find_nearest(position).copied();
        self.agent.previous_cell = self.agent.cell;
        self.agent.cell = arrival.map(|cell| cell.key());
        if arrival.is_some_and(|cell| cell.category().records_safe_position()) {
            self.agent.last_safe_position = position;
        }
        info!(teleporter = teleporter.get(), "agent teleported");
        out_events.push(Event::Teleported {
            teleporter,
            position,
        });
    }

    fn mutation_scale(&self, size: SizeState) -> f32 {
        match size {
            SizeState::Small => self.config.scale.small_scale,
            SizeState::Normal => self.config.scale.default_scale,
            SizeState::Big => self.config.scale.big_scale,
        }
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::LoadLevel {
            markers,
            teleporters,
            spawn,
        } => world.load_level(markers, teleporters, spawn, out_events),
        Command::Tick { dt } => world.tick(dt, out_events),
        Command::FixedTick { dt } => world.fixed_tick(dt, out_events),
        Command::RequestMove { target } => world.request_move(target, out_events),
        Command::AssignPath {
            generation,
            target,
            steps,
        } => world.assign_path(generation, target, steps, out_events),
        Command::RejectMove { target, reason } => world.reject(Some(target), reason, out_events),
        Command::Reindex => world.rebuild(out_events),
        Command::SetMarkerActive { marker, active } => world.set_marker_active(marker, active),
        Command::ApplyTileEffect { cell, effect } => {
            world.apply_tile_effect(cell, effect, out_events);
        }
        Command::ChangeScale { target, duration } => {
            world.change_scale(target, duration, out_events);
        }
        Command::ScheduleRollback { delay } => world.schedule_rollback(delay, out_events),
        Command::ClearSticky => world.clear_sticky(out_events),
        Command::SetMutation { size } => {
            let target = world.mutation_scale(size);
            world.change_scale(target, EffectDuration::Permanent, out_events);
        }
        Command::ActivateTeleporter { teleporter } => {
            world.activate_teleporter(teleporter, out_events);
        }
        Command::PickUpTorch => {
            if !world.agent.has_torch {
                world.agent.has_torch = true;
                info!("torch picked up");
                out_events.push(Event::TorchPickedUp);
            }
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::{sync::Arc, time::Duration};

    use glam::Vec3;
    use tilehop_core::{GridKey, GridMarker, PathStep, SizeState, WorldConfig};

    use super::{GridIndex, World};

    /// Shares the current grid snapshot.
    #[must_use]
    pub fn grid(world: &World) -> Arc<GridIndex> {
        Arc::clone(&world.grid)
    }

    /// Configuration the world was created with.
    #[must_use]
    pub fn config(world: &World) -> &WorldConfig {
        &world.config
    }

    /// Markers of the loaded level, indexed by `MarkerId`.
    #[must_use]
    pub fn markers(world: &World) -> &[GridMarker] {
        &world.markers
    }

    /// Captures a read-only snapshot of the agent.
    #[must_use]
    pub fn agent(world: &World) -> AgentSnapshot {
        let agent = &world.agent;
        AgentSnapshot {
            cell: agent.cell,
            previous_cell: agent.previous_cell,
            position: agent.position,
            last_safe_position: agent.last_safe_position,
            scale: agent.scale,
            size: agent.size,
            sticky: world.sticky.is_some(),
            fall_delay_multiplier: world.sticky.map_or(1.0, |sticky| sticky.multiplier()),
            has_torch: agent.has_torch,
            jumping: world.hop.is_some(),
            following_path: world.path.is_some(),
            scale_changing: world.scale.is_some(),
            rollback_pending: world.rollback.is_some(),
        }
    }

    /// Remaining steps of the path the agent is following, if any.
    #[must_use]
    pub fn path(world: &World) -> Option<PathView<'_>> {
        world.path.as_ref().map(|path| PathView {
            steps: &path.steps,
            next: path.next,
        })
    }

    /// Captures the state of every platform that is counting down or falling.
    #[must_use]
    pub fn platforms(world: &World) -> Vec<PlatformSnapshot> {
        let platform = &world.config.effects.platform;
        world
            .platforms
            .iter()
            .map(|entry| PlatformSnapshot {
                cell: entry.cell(),
                falling: entry.is_falling(),
                remaining_delay: entry.remaining_delay(),
                position: entry.position(platform.fall_duration(), platform.fall_distance),
            })
            .collect()
    }

    /// Read-only snapshot of the agent.
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub struct AgentSnapshot {
        /// Cell the agent occupies, if it is placed.
        pub cell: Option<GridKey>,
        /// Cell the agent occupied before its last landing.
        pub previous_cell: Option<GridKey>,
        /// Current world position.
        pub position: Vec3,
        /// Position of the last Normal cell the agent landed on.
        pub last_safe_position: Vec3,
        /// Current scale.
        pub scale: f32,
        /// Current mutation size.
        pub size: SizeState,
        /// Whether the agent is sticky.
        pub sticky: bool,
        /// Multiplier applied to platform fall delays.
        pub fall_delay_multiplier: f32,
        /// Whether the agent carries the torch.
        pub has_torch: bool,
        /// Whether a hop is in the air.
        pub jumping: bool,
        /// Whether the agent still follows a path.
        pub following_path: bool,
        /// Whether a scale transition is in flight.
        pub scale_changing: bool,
        /// Whether a rollback is scheduled.
        pub rollback_pending: bool,
    }

    impl AgentSnapshot {
        /// Whether the agent neither moves nor waits on a timer that moves it.
        #[must_use]
        pub fn is_idle(&self) -> bool {
            !self.jumping && !self.following_path && !self.rollback_pending
        }
    }

    /// Borrowed view of the active path.
    #[derive(Clone, Copy, Debug)]
    pub struct PathView<'a> {
        steps: &'a [PathStep],
        next: usize,
    }

    impl<'a> PathView<'a> {
        /// Every step of the path, including the ones already taken.
        #[must_use]
        pub fn steps(&self) -> &'a [PathStep] {
            self.steps
        }

        /// Steps the agent has not reached yet.
        #[must_use]
        pub fn remaining(&self) -> &'a [PathStep] {
            self.steps.get(self.next..).unwrap_or_default()
        }
    }

    /// Read-only snapshot of a touched platform.
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub struct PlatformSnapshot {
        /// Cell of the platform.
        pub cell: GridKey,
        /// Whether the descent has started.
        pub falling: bool,
        /// Time left before the descent starts.
        pub remaining_delay: Duration,
        /// Current position of the platform.
        pub position: Vec3,
    }
}

#[derive(Clone, Copy, Debug)]
struct Agent {
    cell: Option<GridKey>,
    previous_cell: Option<GridKey>,
    position: Vec3,
    last_safe_position: Vec3,
    scale: f32,
    size: SizeState,
    has_torch: bool,
}

impl Agent {
    fn new(default_scale: f32) -> Self {
        Self {
            cell: None,
            previous_cell: None,
            position: Vec3::ZERO,
            last_safe_position: Vec3::ZERO,
            scale: default_scale,
            size: SizeState::Normal,
            has_torch: false,
        }
    }
}

#[derive(Clone, Debug)]
struct ActivePath {
    steps: Vec<PathStep>,
    next: usize,
}

#[derive(Clone, Copy, Debug)]
struct PendingRollback {
    remaining: Duration,
    destination: RollbackDestination,
}

#[derive(Clone, Copy, Debug)]
struct RollbackDestination {
    cell: Option<GridKey>,
    fallback: Vec3,
}

#[derive(Clone, Copy, Debug)]
struct Teleporter {
    spec: TeleporterSpec,
    used: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(world: &mut World, command: Command) -> Vec<Event> {
        let mut events = Vec::new();
        apply(world, command, &mut events);
        events
    }

    fn loaded(markers: Vec<GridMarker>, teleporters: Vec<TeleporterSpec>) -> World {
        let mut world = World::new(WorldConfig::default());
        let _ = run(
            &mut world,
            Command::LoadLevel {
                markers,
                teleporters,
                spawn: Vec3::ZERO,
            },
        );
        world
    }

    fn row(categories: &[CellCategory]) -> Vec<GridMarker> {
        categories
            .iter()
            .enumerate()
            .map(|(index, category)| GridMarker::new(Vec3::new(index as f32, 0.0, 0.0), *category))
            .collect()
    }

    fn step(x: f32) -> PathStep {
        let position = Vec3::new(x, 0.0, 0.0);
        PathStep {
            key: GridKey::from_position(position),
            position,
        }
    }

    fn advance(world: &mut World, command: Command, times: usize) -> Vec<Event> {
        (0..times)
            .flat_map(|_| run(world, command.clone()))
            .collect()
    }

    #[test]
    fn load_level_places_agent_on_nearest_cell() {
        let mut world = World::new(WorldConfig::default());
        let events = run(
            &mut world,
            Command::LoadLevel {
                markers: row(&[CellCategory::Normal, CellCategory::Normal]),
                teleporters: Vec::new(),
                spawn: Vec3::new(0.9, 4.0, 0.1),
            },
        );

        assert_eq!(
            events,
            vec![
                Event::GridReindexed {
                    generation: 1,
                    cells: 2,
                },
                Event::AgentPlaced {
                    cell: GridKey::new(1000, 0),
                    position: Vec3::X,
                },
            ]
        );
        assert_eq!(query::agent(&world).last_safe_position, Vec3::X);
    }

    #[test]
    fn empty_level_disables_movement() {
        let mut world = loaded(Vec::new(), Vec::new());
        let events = run(
            &mut world,
            Command::RequestMove {
                target: GridKey::new(0, 0),
            },
        );

        assert_eq!(
            events,
            vec![Event::MoveRejected {
                target: Some(GridKey::new(0, 0)),
                reason: MoveRejection::MissingCollaborator(Collaborator::Grid),
            }]
        );
    }

    #[test]
    fn stale_paths_are_rejected() {
        let mut world = loaded(row(&[CellCategory::Normal, CellCategory::Normal]), Vec::new());
        let _ = run(&mut world, Command::Reindex);

        let events = run(
            &mut world,
            Command::AssignPath {
                generation: 1,
                target: step(1.0).key,
                steps: vec![step(1.0)],
            },
        );

        assert_eq!(
            events,
            vec![Event::MoveRejected {
                target: Some(step(1.0).key),
                reason: MoveRejection::StaleGrid,
            }]
        );
        assert!(query::path(&world).is_none());
    }

    #[test]
    fn hops_land_and_only_normal_cells_refresh_the_safe_position() {
        let mut world = loaded(
            row(&[CellCategory::Normal, CellCategory::Normal, CellCategory::Sticky]),
            Vec::new(),
        );
        let generation = query::grid(&world).generation();
        let _ = run(
            &mut world,
            Command::AssignPath {
                generation,
                target: step(2.0).key,
                steps: vec![step(1.0), step(2.0)],
            },
        );

        let busy = run(
            &mut world,
            Command::RequestMove {
                target: step(0.0).key,
            },
        );
        assert!(matches!(
            busy.as_slice(),
            [Event::MoveRejected {
                reason: MoveRejection::AgentBusy,
                ..
            }]
        ));

        let fixed = Command::FixedTick {
            dt: Duration::from_millis(100),
        };
        let first = advance(&mut world, fixed.clone(), 6);
        assert!(matches!(first.first(), Some(Event::HopStarted { .. })));
        assert!(first.contains(&Event::AgentLanded {
            cell: step(1.0).key,
            category: CellCategory::Normal,
            position: Vec3::X,
        }));
        assert_eq!(query::agent(&world).last_safe_position, Vec3::X);
        let path = query::path(&world).expect("path still active");
        assert_eq!(path.steps().len(), 2);
        assert_eq!(path.remaining(), &[step(2.0)]);

        let second = advance(&mut world, fixed, 6);
        assert_eq!(second.last(), Some(&Event::PathCleared));
        let agent = query::agent(&world);
        assert_eq!(agent.cell, Some(step(2.0).key));
        assert_eq!(agent.previous_cell, Some(step(1.0).key));
        assert_eq!(agent.position, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(agent.last_safe_position, Vec3::X);
        assert!(agent.is_idle());
    }

    #[test]
    fn teleporters_require_a_small_agent_and_work_once() {
        let teleporter = TeleporterSpec {
            id: TeleporterId::new(7),
            destination: Vec3::new(3.0, 0.0, 0.0),
        };
        let mut world = loaded(
            row(&[
                CellCategory::Normal,
                CellCategory::Normal,
                CellCategory::Normal,
                CellCategory::Normal,
            ]),
            vec![teleporter],
        );
        let activate = Command::ActivateTeleporter {
            teleporter: teleporter.id,
        };

        let refused = run(&mut world, activate.clone());
        assert_eq!(
            refused,
            vec![Event::MoveRejected {
                target: None,
                reason: MoveRejection::TooLarge,
            }]
        );

        let _ = run(
            &mut world,
            Command::SetMutation {
                size: SizeState::Small,
            },
        );
        let teleported = run(&mut world, activate.clone());
        assert_eq!(
            teleported,
            vec![Event::Teleported {
                teleporter: teleporter.id,
                position: Vec3::new(3.0, 0.0, 0.0),
            }]
        );
        assert_eq!(query::agent(&world).cell, Some(step(3.0).key));

        let spent = run(&mut world, activate);
        assert!(matches!(
            spent.as_slice(),
            [Event::MoveRejected {
                reason: MoveRejection::TeleporterSpent,
                ..
            }]
        ));

        let unknown = run(
            &mut world,
            Command::ActivateTeleporter {
                teleporter: TeleporterId::new(1),
            },
        );
        assert!(matches!(
            unknown.as_slice(),
            [Event::MoveRejected {
                reason: MoveRejection::UnknownTeleporter,
                ..
            }]
        ));
    }

    #[test]
    fn teleporting_onto_a_special_cell_keeps_the_safe_position() {
        let teleporter = TeleporterSpec {
            id: TeleporterId::new(2),
            destination: Vec3::new(1.0, 0.0, 0.0),
        };
        let mut world = loaded(
            row(&[CellCategory::Normal, CellCategory::Sticky]),
            vec![teleporter],
        );
        let _ = run(
            &mut world,
            Command::SetMutation {
                size: SizeState::Small,
            },
        );

        let teleported = run(
            &mut world,
            Command::ActivateTeleporter {
                teleporter: teleporter.id,
            },
        );
        assert!(matches!(teleported.as_slice(), [Event::Teleported { .. }]));

        let agent = query::agent(&world);
        assert_eq!(agent.cell, Some(step(1.0).key));
        assert_eq!(agent.previous_cell, Some(step(0.0).key));
        assert_eq!(agent.position, Vec3::X);
        assert_eq!(agent.last_safe_position, Vec3::ZERO);
    }

    #[test]
    fn rollback_falls_back_to_the_safe_position_when_the_cell_is_gone() {
        let mut world = loaded(
            row(&[
                CellCategory::Normal,
                CellCategory::Sticky,
                CellCategory::PoisonPit,
            ]),
            Vec::new(),
        );
        let generation = query::grid(&world).generation();
        let _ = run(
            &mut world,
            Command::AssignPath {
                generation,
                target: step(2.0).key,
                steps: vec![step(1.0), step(2.0)],
            },
        );
        let travelled = advance(
            &mut world,
            Command::FixedTick {
                dt: Duration::from_millis(100),
            },
            12,
        );
        assert_eq!(travelled.last(), Some(&Event::PathCleared));
        assert!(query::path(&world).is_none());
        let agent = query::agent(&world);
        assert_eq!(agent.previous_cell, Some(step(1.0).key));
        assert_eq!(agent.last_safe_position, Vec3::ZERO);

        let _ = run(
            &mut world,
            Command::ApplyTileEffect {
                cell: step(2.0).key,
                effect: TileEffect::Mutate {
                    scale: 1.5,
                    duration: EffectDuration::Permanent,
                    rollback_after: Some(Duration::from_secs(1)),
                },
            },
        );
        let _ = run(
            &mut world,
            Command::SetMarkerActive {
                marker: MarkerId::new(1),
                active: false,
            },
        );
        let _ = run(&mut world, Command::Reindex);
        assert!(query::grid(&world).cell_at(step(1.0).key).is_none());

        let rolled = run(
            &mut world,
            Command::Tick {
                dt: Duration::from_secs(1),
            },
        );
        assert!(rolled.contains(&Event::AgentRolledBack {
            cell: Some(step(0.0).key),
            position: Vec3::ZERO,
        }));
        let agent = query::agent(&world);
        assert_eq!(agent.cell, Some(step(0.0).key));
        assert_eq!(agent.position, Vec3::ZERO);
        assert!(agent.is_idle());
    }

    #[test]
    fn platform_leaves_the_grid_after_delay_and_descent() {
        let mut world = loaded(
            row(&[CellCategory::Normal, CellCategory::FallingPlatform]),
            Vec::new(),
        );
        let cell = step(1.0).key;
        let armed = run(
            &mut world,
            Command::ApplyTileEffect {
                cell,
                effect: TileEffect::PlatformFall,
            },
        );
        assert_eq!(armed.len(), 2);
        assert_eq!(
            armed[0],
            Event::PlatformArmed {
                cell,
                delay: Duration::from_secs(1),
            }
        );

        let again = run(
            &mut world,
            Command::ApplyTileEffect {
                cell,
                effect: TileEffect::PlatformFall,
            },
        );
        assert!(again.is_empty());

        let tick = Command::Tick {
            dt: Duration::from_millis(500),
        };
        let waiting = advance(&mut world, tick.clone(), 2);
        assert!(waiting.contains(&Event::PlatformFalling { cell }));
        assert!(query::grid(&world).cell_at(cell).is_some());

        let fell = advance(&mut world, tick, 2);
        assert!(fell.contains(&Event::PlatformFell { cell }));
        assert!(query::grid(&world).cell_at(cell).is_none());
        assert!(query::platforms(&world).is_empty());
        assert!(!query::markers(&world)[1].active);
    }

    #[test]
    fn sticky_agent_slows_platforms() {
        let mut world = loaded(
            row(&[CellCategory::Sticky, CellCategory::FallingPlatform]),
            Vec::new(),
        );
        let _ = run(
            &mut world,
            Command::ApplyTileEffect {
                cell: step(0.0).key,
                effect: TileEffect::Sticky {
                    duration: EffectDuration::Permanent,
                    fall_delay_multiplier: 2.0,
                },
            },
        );
        let armed = run(
            &mut world,
            Command::ApplyTileEffect {
                cell: step(1.0).key,
                effect: TileEffect::PlatformFall,
            },
        );

        assert_eq!(
            armed[0],
            Event::PlatformArmed {
                cell: step(1.0).key,
                delay: Duration::from_secs(2),
            }
        );
        let platforms = query::platforms(&world);
        assert_eq!(platforms.len(), 1);
        assert!(!platforms[0].falling);
    }

    #[test]
    fn big_only_markers_join_the_grid_after_reindex() {
        let mut markers = row(&[CellCategory::Normal, CellCategory::Normal]);
        markers[1] = markers[1].with_reveal(Reveal::WhileBig);
        let mut world = loaded(markers, Vec::new());
        assert_eq!(query::grid(&world).len(), 1);

        let grown = run(
            &mut world,
            Command::SetMutation {
                size: SizeState::Big,
            },
        );
        assert_eq!(
            grown,
            vec![Event::MutationChanged {
                from: SizeState::Normal,
                to: SizeState::Big,
            }]
        );

        let _ = run(&mut world, Command::Reindex);
        let grid = query::grid(&world);
        assert_eq!(grid.len(), 2);
        assert_eq!(grid.generation(), 2);
    }

    #[test]
    fn torch_is_picked_up_once() {
        let mut world = loaded(row(&[CellCategory::Normal]), Vec::new());
        assert_eq!(run(&mut world, Command::PickUpTorch), vec![Event::TorchPickedUp]);
        assert!(run(&mut world, Command::PickUpTorch).is_empty());
        assert!(query::agent(&world).has_torch);
    }
}
