#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Navigation system that turns move requests into hop sequences.
//!
//! The system never mutates the world. It answers `MoveRequested` events with
//! either an `AssignPath` command stamped with the snapshot generation it
//! planned against, or a `RejectMove` command carrying the reason.

mod adjacency;
mod planner;

use tilehop_core::{
    Collaborator, Command, Event, GridKey, InvalidTarget, MoveRejection, MovementConfig, PathStep,
};
use tilehop_world::{query::AgentSnapshot, GridIndex};
use tracing::debug;

pub use adjacency::AdjacencyRule;
pub use planner::PathPlanner;

/// Pure system that plans paths for the agent.
#[derive(Clone, Copy, Debug)]
pub struct Navigation {
    planner: PathPlanner,
}

impl Navigation {
    /// Creates the system from the movement configuration.
    #[must_use]
    pub fn new(config: &MovementConfig) -> Self {
        Self {
            planner: PathPlanner::from_config(config),
        }
    }

    /// Planner used by the system.
    #[must_use]
    pub const fn planner(&self) -> &PathPlanner {
        &self.planner
    }

    /// Consumes world events and emits path assignments or rejections.
    pub fn handle(
        &self,
        events: &[Event],
        grid: &GridIndex,
        agent: &AgentSnapshot,
        out: &mut Vec<Command>,
    ) {
        for event in events {
            let Event::MoveRequested { target } = event else {
                continue;
            };

            match self.plan(grid, agent, *target, false) {
                Ok(steps) => {
                    debug!(target = %target, hops = steps.len(), "path planned");
                    out.push(Command::AssignPath {
                        generation: grid.generation(),
                        target: *target,
                        steps,
                    });
                }
                Err(reason) => out.push(Command::RejectMove {
                    target: *target,
                    reason,
                }),
            }
        }
    }

    /// Plans a path for hover highlighting without requesting a move.
    ///
    /// Hazards, shrink tiles and obstacle-layer cells are refused even when a
    /// path to them exists.
    pub fn preview(
        &self,
        grid: &GridIndex,
        agent: &AgentSnapshot,
        target: GridKey,
    ) -> Result<Vec<PathStep>, MoveRejection> {
        self.plan(grid, agent, target, true)
    }

    fn plan(
        &self,
        grid: &GridIndex,
        agent: &AgentSnapshot,
        target: GridKey,
        preview: bool,
    ) -> Result<Vec<PathStep>, MoveRejection> {
        if grid.is_empty() {
            return Err(MoveRejection::MissingCollaborator(Collaborator::Grid));
        }
        let Some(start) = agent.cell.and_then(|key| grid.cell_at(key)) else {
            return Err(MoveRejection::MissingCollaborator(
                Collaborator::AgentPlacement,
            ));
        };
        let Some(goal) = grid.cell_at(target) else {
            return Err(MoveRejection::InvalidTarget(InvalidTarget::Unknown));
        };

        let cells = if preview {
            self.planner
                .find_path_for_preview(grid, start.id(), goal.id(), agent.size)?
        } else {
            self.planner
                .find_path(grid, start.id(), goal.id(), agent.size)?
        };

        Ok(cells
            .into_iter()
            .filter_map(|id| grid.cell(id))
            .map(|cell| PathStep {
                key: cell.key(),
                position: cell.position(),
            })
            .collect())
    }
}
