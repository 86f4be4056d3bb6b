#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Tile effect system that reacts to landings on special cells.
//!
//! The system decides which effect a landing produces and hands it to the
//! world as an `ApplyTileEffect` command. Timers for the effects live in the
//! world so they advance with the same clock as everything else.

use std::collections::HashSet;

use tilehop_core::{
    CellCategory, Command, EffectConfig, EffectDuration, Event, GridKey, SizeState, TileEffect,
};
use tracing::debug;

/// Pure system that maps landed cell categories to tile effects.
#[derive(Debug)]
pub struct TileEffects {
    config: EffectConfig,
    sticky_cell: Option<GridKey>,
    spent_reactives: HashSet<GridKey>,
}

impl TileEffects {
    /// Creates the system from the effect configuration.
    #[must_use]
    pub fn new(config: EffectConfig) -> Self {
        Self {
            config,
            sticky_cell: None,
            spent_reactives: HashSet::new(),
        }
    }

    /// Effect configuration used by the system.
    #[must_use]
    pub fn config(&self) -> &EffectConfig {
        &self.config
    }

    /// Consumes world events and emits tile effect commands.
    ///
    /// `size` is the agent's mutation size after the batch was applied.
    pub fn handle(&mut self, events: &[Event], size: SizeState, out: &mut Vec<Command>) {
        for event in events {
            match event {
                Event::AgentLanded { cell, category, .. } => {
                    if *category == CellCategory::Reactive
                        && self.config.reactive.deactivate_on_use
                        && !self.spent_reactives.insert(*cell)
                    {
                        debug!(%cell, "reactive tile already used");
                        continue;
                    }
                    let Some(effect) = self.resolve(*category, size) else {
                        continue;
                    };
                    if let TileEffect::Sticky {
                        duration: EffectDuration::Temporary(_),
                        ..
                    } = effect
                    {
                        if self.config.sticky.clear_on_exit {
                            self.sticky_cell = Some(*cell);
                        }
                    }
                    debug!(%cell, ?category, "tile effect resolved");
                    out.push(Command::ApplyTileEffect {
                        cell: *cell,
                        effect,
                    });
                }
                Event::HopStarted { from, .. } if self.sticky_cell == Some(*from) => {
                    self.sticky_cell = None;
                    out.push(Command::ClearSticky);
                }
                Event::AgentPlaced { .. } => {
                    self.sticky_cell = None;
                    self.spent_reactives.clear();
                }
                Event::AgentRolledBack { .. } => self.sticky_cell = None,
                _ => {}
            }
        }
    }

    /// Effect produced by landing on a cell of `category` at the given size.
    #[must_use]
    pub fn resolve(&self, category: CellCategory, size: SizeState) -> Option<TileEffect> {
        let effects = &self.config;
        match category {
            CellCategory::PoisonPit => Some(TileEffect::Mutate {
                scale: effects.hazard.scale,
                duration: effects.hazard.duration(),
                rollback_after: Some(effects.hazard.grace_delay()),
            }),
            CellCategory::Shrink => Some(TileEffect::Mutate {
                scale: effects.shrink.scale,
                duration: effects.shrink.duration(),
                rollback_after: Some(effects.shrink.grace_delay()),
            }),
            CellCategory::Sticky => Some(TileEffect::Sticky {
                duration: effects.sticky.duration(),
                fall_delay_multiplier: effects.sticky.fall_delay_multiplier,
            }),
            CellCategory::Reactive => Some(TileEffect::Mutate {
                scale: effects.reactive.scale,
                duration: effects.reactive.duration(),
                rollback_after: None,
            }),
            CellCategory::FallingPlatform => Some(TileEffect::PlatformFall),
            CellCategory::MutationWall if size != SizeState::Small => Some(TileEffect::Blocked),
            CellCategory::MutationWall | CellCategory::Normal | CellCategory::Obstacle => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn hazards_mutate_and_send_the_agent_back() {
        let system = TileEffects::new(EffectConfig::default());
        assert_eq!(
            system.resolve(CellCategory::PoisonPit, SizeState::Normal),
            Some(TileEffect::Mutate {
                scale: 1.5,
                duration: EffectDuration::Temporary(Duration::from_secs(5)),
                rollback_after: Some(Duration::from_millis(500)),
            })
        );
    }

    #[test]
    fn walls_block_everything_but_small_agents() {
        let system = TileEffects::new(EffectConfig::default());
        assert_eq!(
            system.resolve(CellCategory::MutationWall, SizeState::Big),
            Some(TileEffect::Blocked)
        );
        assert_eq!(
            system.resolve(CellCategory::MutationWall, SizeState::Small),
            None
        );
        assert_eq!(system.resolve(CellCategory::Normal, SizeState::Small), None);
    }

    #[test]
    fn leaving_a_sticky_tile_clears_it_when_configured() {
        let mut config = EffectConfig::default();
        config.sticky.clear_on_exit = true;
        let mut system = TileEffects::new(config);
        let sticky = GridKey::new(0, 0);
        let mut out = Vec::new();

        system.handle(
            &[
                Event::AgentLanded {
                    cell: sticky,
                    category: CellCategory::Sticky,
                    position: glam::Vec3::ZERO,
                },
                Event::HopStarted {
                    from: sticky,
                    to: GridKey::new(1000, 0),
                },
            ],
            SizeState::Normal,
            &mut out,
        );

        assert_eq!(out.len(), 2);
        assert_eq!(out[1], Command::ClearSticky);
    }

    fn land_on(system: &mut TileEffects, cell: GridKey) -> Vec<Command> {
        let mut out = Vec::new();
        system.handle(
            &[Event::AgentLanded {
                cell,
                category: CellCategory::Reactive,
                position: glam::Vec3::ZERO,
            }],
            SizeState::Normal,
            &mut out,
        );
        out
    }

    #[test]
    fn reactive_tiles_boost_once_per_level() {
        let mut system = TileEffects::new(EffectConfig::default());
        assert!(system.config().reactive.deactivate_on_use);
        let reactive = GridKey::new(2000, 0);

        assert_eq!(land_on(&mut system, reactive).len(), 1);
        assert!(land_on(&mut system, reactive).is_empty());
        assert_eq!(land_on(&mut system, GridKey::new(3000, 0)).len(), 1);

        let mut out = Vec::new();
        system.handle(
            &[Event::AgentPlaced {
                cell: GridKey::new(0, 0),
                position: glam::Vec3::ZERO,
            }],
            SizeState::Normal,
            &mut out,
        );
        assert!(out.is_empty());
        assert_eq!(land_on(&mut system, reactive).len(), 1);
    }

    #[test]
    fn reusable_reactive_tiles_boost_every_landing() {
        let mut config = EffectConfig::default();
        config.reactive.deactivate_on_use = false;
        let mut system = TileEffects::new(config);
        let reactive = GridKey::new(2000, 0);

        assert_eq!(land_on(&mut system, reactive).len(), 1);
        assert_eq!(land_on(&mut system, reactive).len(), 1);
    }
}
