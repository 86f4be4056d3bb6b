//! Jump-reachability between grid cells.

use tilehop_core::{CellCategory, CellId, MovementConfig, SizeState};
use tilehop_world::{planar_distance, GridCell, GridIndex};

/// Decides which cells the agent can reach with a single hop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdjacencyRule {
    max_jump_distance: f32,
    max_vertical_jump_difference: f32,
}

impl AdjacencyRule {
    /// Creates a rule from explicit jump limits.
    #[must_use]
    pub const fn new(max_jump_distance: f32, max_vertical_jump_difference: f32) -> Self {
        Self {
            max_jump_distance,
            max_vertical_jump_difference,
        }
    }

    /// Creates a rule from the movement configuration.
    #[must_use]
    pub fn from_config(config: &MovementConfig) -> Self {
        Self::new(config.max_jump_distance, config.max_vertical_jump_difference)
    }

    /// Cells reachable from `cell` in one hop, in grid insertion order.
    pub fn neighbors<'g>(
        &self,
        grid: &'g GridIndex,
        cell: CellId,
        size: SizeState,
    ) -> impl Iterator<Item = CellId> + 'g {
        let rule = *self;
        let origin = grid.cell(cell).copied();
        grid.cells()
            .iter()
            .filter(move |candidate| {
                origin.map_or(false, |origin| rule.admits(grid, &origin, candidate, size))
            })
            .map(GridCell::id)
    }

    /// Whether `to` is reachable from `from` in one hop.
    #[must_use]
    pub fn is_adjacent(&self, grid: &GridIndex, from: CellId, to: CellId, size: SizeState) -> bool {
        match (grid.cell(from), grid.cell(to)) {
            (Some(from), Some(to)) => self.admits(grid, from, to, size),
            _ => false,
        }
    }

    fn admits(&self, grid: &GridIndex, from: &GridCell, to: &GridCell, size: SizeState) -> bool {
        if from.id() == to.id() {
            return false;
        }

        if planar_distance(from.position(), to.position()) > self.max_jump_distance {
            return false;
        }

        if (to.position().y - from.position().y).abs() > self.max_vertical_jump_difference {
            return false;
        }

        match to.category() {
            CellCategory::Obstacle => return false,
            CellCategory::MutationWall if size != SizeState::Small => return false,
            _ => {}
        }

        // Small agents slip past obstacles.
        size == SizeState::Small || !line_of_sight_blocked(grid, from, to)
    }
}

fn line_of_sight_blocked(grid: &GridIndex, from: &GridCell, to: &GridCell) -> bool {
    grid.blockers()
        .iter()
        .filter(|blocker| blocker.key() != from.key() && blocker.key() != to.key())
        .any(|blocker| blocker.intersects_segment(from.position(), to.position()))
}
