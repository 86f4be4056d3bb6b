//! Breadth-first search over the hop graph with a hop budget.

use std::collections::VecDeque;

use tilehop_core::{
    CellCategory, CellId, Collaborator, InvalidTarget, MoveRejection, MovementConfig, SizeState,
};
use tilehop_world::GridIndex;

use crate::AdjacencyRule;

/// Plans hop sequences between two cells of a grid snapshot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PathPlanner {
    rule: AdjacencyRule,
    max_path_length: usize,
}

impl PathPlanner {
    /// Creates a planner from an adjacency rule and a hop budget.
    #[must_use]
    pub const fn new(rule: AdjacencyRule, max_path_length: usize) -> Self {
        Self {
            rule,
            max_path_length,
        }
    }

    /// Creates a planner from the movement configuration.
    #[must_use]
    pub fn from_config(config: &MovementConfig) -> Self {
        Self::new(AdjacencyRule::from_config(config), config.max_path_length)
    }

    /// Adjacency rule used to expand the search.
    #[must_use]
    pub const fn rule(&self) -> &AdjacencyRule {
        &self.rule
    }

    /// Maximum number of hops for non-exempt targets.
    #[must_use]
    pub const fn max_path_length(&self) -> usize {
        self.max_path_length
    }

    /// Finds the shortest hop sequence from `start` to `target`.
    ///
    /// The returned cells exclude `start` and end with `target`. Targets whose
    /// category is exempt ignore the hop budget; every other target must be
    /// reachable within `max_path_length` hops.
    pub fn find_path(
        &self,
        grid: &GridIndex,
        start: CellId,
        target: CellId,
        size: SizeState,
    ) -> Result<Vec<CellId>, MoveRejection> {
        if grid.cell(start).is_none() {
            return Err(MoveRejection::MissingCollaborator(
                Collaborator::AgentPlacement,
            ));
        }
        let Some(target_cell) = grid.cell(target) else {
            return Err(MoveRejection::InvalidTarget(InvalidTarget::Unknown));
        };
        if start == target {
            return Err(MoveRejection::InvalidTarget(InvalidTarget::CurrentCell));
        }

        let exempt = target_cell.category().is_path_length_exempt();
        let path = self.search(grid, start, target, size, exempt)?;

        if !exempt && path.len() > self.max_path_length {
            return Err(MoveRejection::NoPathFound);
        }

        Ok(path)
    }

    /// Same search as [`PathPlanner::find_path`], but refuses targets a player
    /// may not pick directly.
    pub fn find_path_for_preview(
        &self,
        grid: &GridIndex,
        start: CellId,
        target: CellId,
        size: SizeState,
    ) -> Result<Vec<CellId>, MoveRejection> {
        let Some(target_cell) = grid.cell(target) else {
            return Err(MoveRejection::InvalidTarget(InvalidTarget::Unknown));
        };
        preview_gate(target_cell.category())?;
        self.find_path(grid, start, target, size)
    }

    fn search(
        &self,
        grid: &GridIndex,
        start: CellId,
        target: CellId,
        size: SizeState,
        exempt: bool,
    ) -> Result<Vec<CellId>, MoveRejection> {
        let count = grid.len();
        let mut visited = vec![false; count];
        let mut predecessor: Vec<Option<CellId>> = vec![None; count];
        let mut distance = vec![0_usize; count];
        let mut queue = VecDeque::new();

        visited[start.index()] = true;
        queue.push_back(start);

        let mut found = false;
        while let Some(current) = queue.pop_front() {
            if current == target {
                found = true;
                break;
            }

            let next_distance = distance[current.index()] + 1;
            if !exempt && next_distance > self.max_path_length {
                continue;
            }

            for neighbor in self.rule.neighbors(grid, current, size) {
                let index = neighbor.index();
                if visited[index] {
                    continue;
                }
                visited[index] = true;
                predecessor[index] = Some(current);
                distance[index] = next_distance;
                queue.push_back(neighbor);
            }
        }

        if !found {
            return Err(MoveRejection::NoPathFound);
        }

        let mut path = Vec::with_capacity(distance[target.index()]);
        let mut cursor = target;
        while cursor != start {
            path.push(cursor);
            let Some(previous) = predecessor[cursor.index()] else {
                return Err(MoveRejection::NoPathFound);
            };
            cursor = previous;
        }
        path.reverse();
        Ok(path)
    }
}

fn preview_gate(category: CellCategory) -> Result<(), MoveRejection> {
    if category.is_path_length_exempt() {
        return Err(MoveRejection::InvalidTarget(InvalidTarget::Barred(category)));
    }
    if category.is_obstacle_layer() {
        return Err(MoveRejection::InvalidTarget(InvalidTarget::ObstacleLayer));
    }
    Ok(())
}
