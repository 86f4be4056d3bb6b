//! Tunable parameters shared by the world and systems.
//!
//! Every structure deserializes with `#[serde(default)]`, so a level file only
//! needs to mention the values it overrides. Durations are stored as seconds
//! to keep level files readable and converted on access.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{CellCategory, EffectDuration};

/// Aggregated configuration consumed by the world.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Hop and path planning parameters.
    pub movement: MovementConfig,
    /// Agent scale parameters.
    pub scale: ScaleConfig,
    /// Per-category tile effect parameters.
    pub effects: EffectConfig,
    /// Categories that never become grid cells.
    pub obstacle_mask: ObstacleMask,
    /// Height added to teleport destinations so the agent rests on the ground.
    pub ground_offset: f32,
}

/// Hop and path planning parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    /// Peak height of the parabolic hop above the straight line.
    pub jump_height: f32,
    /// Duration of a single hop in seconds.
    pub jump_duration_secs: f32,
    /// Maximum horizontal distance between two neighbouring cell centres.
    pub max_jump_distance: f32,
    /// Maximum height difference between two neighbouring cell centres.
    pub max_vertical_jump_difference: f32,
    /// Maximum number of hops a non-exempt path may contain.
    pub max_path_length: usize,
}

impl MovementConfig {
    /// Duration of a single hop.
    #[must_use]
    pub fn jump_duration(&self) -> Duration {
        seconds(self.jump_duration_secs)
    }
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            jump_height: 2.0,
            jump_duration_secs: 0.5,
            max_jump_distance: 2.0,
            max_vertical_jump_difference: 1.0,
            max_path_length: 4,
        }
    }
}

/// Agent scale parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleConfig {
    /// Scale the agent reverts to.
    pub default_scale: f32,
    /// Scale adopted by the small mutation.
    pub small_scale: f32,
    /// Scale adopted by the big mutation.
    pub big_scale: f32,
    /// Duration of one scale interpolation in seconds.
    pub transition_secs: f32,
}

impl ScaleConfig {
    /// Duration of one scale interpolation.
    #[must_use]
    pub fn transition(&self) -> Duration {
        seconds(self.transition_secs)
    }
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            default_scale: 1.0,
            small_scale: 0.5,
            big_scale: 1.5,
            transition_secs: 0.3,
        }
    }
}

/// Whether an effect reverts on its own.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DurationKind {
    /// The effect reverts after its configured duration.
    #[default]
    Temporary,
    /// The effect lasts until superseded.
    Permanent,
}

/// Parameters of the poison pit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HazardConfig {
    /// Boosted scale the agent is forced to.
    pub scale: f32,
    /// Whether the boost reverts on its own.
    pub duration_kind: DurationKind,
    /// How long a temporary boost is held, in seconds.
    pub duration_secs: f32,
    /// Delay before the agent is sent back, in seconds.
    pub grace_delay_secs: f32,
}

impl HazardConfig {
    /// Resolved duration of the boost.
    #[must_use]
    pub fn duration(&self) -> EffectDuration {
        resolve(self.duration_kind, self.duration_secs)
    }

    /// Delay before the agent is sent back.
    #[must_use]
    pub fn grace_delay(&self) -> Duration {
        seconds(self.grace_delay_secs)
    }
}

impl Default for HazardConfig {
    fn default() -> Self {
        Self {
            scale: 1.5,
            duration_kind: DurationKind::Temporary,
            duration_secs: 5.0,
            grace_delay_secs: 0.5,
        }
    }
}

/// Parameters of the shrink tile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShrinkConfig {
    /// Reduced scale the agent is forced to.
    pub scale: f32,
    /// Whether the reduction reverts on its own.
    pub duration_kind: DurationKind,
    /// How long a temporary reduction is held, in seconds.
    pub duration_secs: f32,
    /// Delay before the agent is sent back, in seconds.
    pub grace_delay_secs: f32,
}

impl ShrinkConfig {
    /// Resolved duration of the reduction.
    #[must_use]
    pub fn duration(&self) -> EffectDuration {
        resolve(self.duration_kind, self.duration_secs)
    }

    /// Delay before the agent is sent back.
    #[must_use]
    pub fn grace_delay(&self) -> Duration {
        seconds(self.grace_delay_secs)
    }
}

impl Default for ShrinkConfig {
    fn default() -> Self {
        Self {
            scale: 0.5,
            duration_kind: DurationKind::Temporary,
            duration_secs: 5.0,
            grace_delay_secs: 0.2,
        }
    }
}

/// Parameters of the sticky tile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StickyConfig {
    /// Whether the sticky state lasts until explicitly cleared.
    pub permanent: bool,
    /// How long a temporary sticky state lasts, in seconds.
    pub duration_secs: f32,
    /// Multiplier applied to platform fall delays while sticky.
    pub fall_delay_multiplier: f32,
    /// Whether leaving the tile ends a temporary sticky state early.
    pub clear_on_exit: bool,
}

impl StickyConfig {
    /// Resolved duration of the sticky state.
    #[must_use]
    pub fn duration(&self) -> EffectDuration {
        if self.permanent {
            EffectDuration::Permanent
        } else {
            EffectDuration::Temporary(seconds(self.duration_secs))
        }
    }
}

impl Default for StickyConfig {
    fn default() -> Self {
        Self {
            permanent: false,
            duration_secs: 5.0,
            fall_delay_multiplier: 2.0,
            clear_on_exit: false,
        }
    }
}

/// Parameters of the reactive grow tile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactiveConfig {
    /// Scale the agent grows to.
    pub scale: f32,
    /// How long the boost lasts, in seconds.
    pub duration_secs: f32,
    /// Whether each reactive tile only boosts once per level.
    pub deactivate_on_use: bool,
}

impl ReactiveConfig {
    /// Duration of the boost. Reactive boosts always revert.
    #[must_use]
    pub fn duration(&self) -> EffectDuration {
        EffectDuration::Temporary(seconds(self.duration_secs))
    }
}

impl Default for ReactiveConfig {
    fn default() -> Self {
        Self {
            scale: 1.3,
            duration_secs: 5.0,
            deactivate_on_use: true,
        }
    }
}

/// Parameters of falling platforms.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Delay between contact and the start of the fall, in seconds.
    pub fall_delay_secs: f32,
    /// Duration of the descent, in seconds.
    pub fall_duration_secs: f32,
    /// Distance the platform descends before it is removed.
    pub fall_distance: f32,
}

impl PlatformConfig {
    /// Delay between contact and the start of the fall.
    #[must_use]
    pub fn fall_delay(&self) -> Duration {
        seconds(self.fall_delay_secs)
    }

    /// Duration of the descent.
    #[must_use]
    pub fn fall_duration(&self) -> Duration {
        seconds(self.fall_duration_secs)
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            fall_delay_secs: 1.0,
            fall_duration_secs: 1.0,
            fall_distance: 5.0,
        }
    }
}

/// Per-category tile effect parameters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectConfig {
    /// Poison pit parameters.
    pub hazard: HazardConfig,
    /// Shrink tile parameters.
    pub shrink: ShrinkConfig,
    /// Sticky tile parameters.
    pub sticky: StickyConfig,
    /// Reactive tile parameters.
    pub reactive: ReactiveConfig,
    /// Falling platform parameters.
    pub platform: PlatformConfig,
}

/// Categories excluded from the grid index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObstacleMask {
    categories: Vec<CellCategory>,
}

impl ObstacleMask {
    /// Creates a mask covering the provided categories.
    #[must_use]
    pub fn new(categories: Vec<CellCategory>) -> Self {
        Self { categories }
    }

    /// Creates a mask that excludes nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Whether markers of the category are kept out of the index.
    #[must_use]
    pub fn contains(&self, category: CellCategory) -> bool {
        self.categories.contains(&category)
    }
}

impl Default for ObstacleMask {
    fn default() -> Self {
        Self::new(vec![CellCategory::Obstacle])
    }
}

fn resolve(kind: DurationKind, duration_secs: f32) -> EffectDuration {
    match kind {
        DurationKind::Temporary => EffectDuration::Temporary(seconds(duration_secs)),
        DurationKind::Permanent => EffectDuration::Permanent,
    }
}

fn seconds(value: f32) -> Duration {
    Duration::try_from_secs_f32(value).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_tables_keep_remaining_defaults() {
        let config: WorldConfig = toml::from_str(
            r#"
            [movement]
            max_path_length = 6

            [effects.shrink]
            duration_kind = "Permanent"
            "#,
        )
        .expect("parse");

        assert_eq!(config.movement.max_path_length, 6);
        assert!((config.movement.max_jump_distance - 2.0).abs() < f32::EPSILON);
        assert_eq!(config.effects.shrink.duration(), EffectDuration::Permanent);
        assert!((config.effects.shrink.scale - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.obstacle_mask, ObstacleMask::default());
    }

    #[test]
    fn negative_seconds_clamp_to_zero() {
        let platform = PlatformConfig {
            fall_delay_secs: -1.0,
            ..PlatformConfig::default()
        };
        assert_eq!(platform.fall_delay(), Duration::ZERO);
    }

    #[test]
    fn permanent_sticky_ignores_duration() {
        let sticky = StickyConfig {
            permanent: true,
            ..StickyConfig::default()
        };
        assert_eq!(sticky.duration(), EffectDuration::Permanent);
    }
}
