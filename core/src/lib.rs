#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Tilehop engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing desired mutations, the world executes those commands via its
//! `apply` entry point, and then broadcasts [`Event`] values for systems and
//! presentation layers to react to. Systems consume event streams, query
//! immutable snapshots, and respond exclusively with new command batches.

use std::{fmt, time::Duration};

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod config;

pub use config::{
    DurationKind, EffectConfig, HazardConfig, MovementConfig, ObstacleMask, PlatformConfig,
    ReactiveConfig, ScaleConfig, ShrinkConfig, StickyConfig, WorldConfig,
};

/// Number of quantization steps per world unit used by [`GridKey`].
pub const GRID_KEY_PRECISION: f64 = 1000.0;

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Replaces the level geometry, rebuilds the grid and places the agent.
    LoadLevel {
        /// Cell markers supplied by the level geometry.
        markers: Vec<GridMarker>,
        /// Teleporters available within the level.
        teleporters: Vec<TeleporterSpec>,
        /// World position the agent spawns at; it snaps to the nearest cell.
        spawn: Vec3,
    },
    /// Advances variable-step timers (scale transitions, rollbacks, sticky
    /// windows and falling platforms).
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Advances the fixed-step hop animation.
    FixedTick {
        /// Duration of the fixed step.
        dt: Duration,
    },
    /// Requests that the agent travel to the provided cell.
    RequestMove {
        /// Cell the agent should travel to.
        target: GridKey,
    },
    /// Hands a planned path to the world for animation.
    AssignPath {
        /// Grid generation the path was planned against.
        generation: u64,
        /// Cell the path terminates at.
        target: GridKey,
        /// Ordered steps, excluding the cell the agent starts from.
        steps: Vec<PathStep>,
    },
    /// Reports that a requested move was refused.
    RejectMove {
        /// Cell that was requested.
        target: GridKey,
        /// Reason the move was refused.
        reason: MoveRejection,
    },
    /// Rebuilds the grid index from the current marker set.
    Reindex,
    /// Toggles whether a marker participates in the next reindex.
    SetMarkerActive {
        /// Marker to update.
        marker: MarkerId,
        /// Whether the marker should be active.
        active: bool,
    },
    /// Applies the effect chosen for the cell the agent landed on.
    ApplyTileEffect {
        /// Cell that produced the effect.
        cell: GridKey,
        /// Effect to apply.
        effect: TileEffect,
    },
    /// Smoothly changes the agent's scale, replacing any in-flight change.
    ChangeScale {
        /// Scale the agent transitions to.
        target: f32,
        /// How long the new scale is held before reverting to the default.
        duration: EffectDuration,
    },
    /// Returns the agent to its previous cell after the provided delay.
    ScheduleRollback {
        /// Delay before the rollback happens.
        delay: Duration,
    },
    /// Cancels the sticky state and its timer.
    ClearSticky,
    /// Switches the agent to the provided mutation size permanently.
    SetMutation {
        /// Size the agent should adopt.
        size: SizeState,
    },
    /// Attempts to use a teleporter.
    ActivateTeleporter {
        /// Teleporter the player selected.
        teleporter: TeleporterId,
    },
    /// Gives the agent the torch.
    PickUpTorch,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the variable-step clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Announces that a new grid snapshot replaced the previous one.
    GridReindexed {
        /// Generation of the new snapshot.
        generation: u64,
        /// Number of cells contained in the snapshot.
        cells: usize,
    },
    /// Confirms that the agent was placed onto a cell without hopping.
    AgentPlaced {
        /// Cell the agent now occupies.
        cell: GridKey,
        /// Exact world position of the agent.
        position: Vec3,
    },
    /// Asks the navigation system to plan a path.
    MoveRequested {
        /// Cell the agent should travel to.
        target: GridKey,
    },
    /// Reports a refused move, teleport or wall contact.
    MoveRejected {
        /// Cell involved in the refusal, if any.
        target: Option<GridKey>,
        /// Reason the move was refused.
        reason: MoveRejection,
    },
    /// Announces that the agent accepted a new path.
    PathChanged {
        /// Cell the path terminates at.
        target: GridKey,
        /// Keys of the cells the agent will visit in order.
        steps: Vec<GridKey>,
    },
    /// Announces that the agent no longer follows a path.
    PathCleared,
    /// Announces that the agent took off toward the next cell.
    HopStarted {
        /// Cell the agent left.
        from: GridKey,
        /// Cell the agent is heading to.
        to: GridKey,
    },
    /// Reports the agent's in-flight position.
    AgentMoved {
        /// Current world position of the agent.
        position: Vec3,
    },
    /// Reports that the agent completed a hop.
    AgentLanded {
        /// Cell the agent landed on.
        cell: GridKey,
        /// Category of the landed cell.
        category: CellCategory,
        /// Exact world position of the landing.
        position: Vec3,
    },
    /// Reports the agent's scale while a transition is in flight.
    ScaleChanged {
        /// Current agent scale.
        scale: f32,
    },
    /// Announces that the agent's mutation size changed.
    MutationChanged {
        /// Previous size.
        from: SizeState,
        /// New size.
        to: SizeState,
    },
    /// Confirms that a tile effect was applied.
    EffectTriggered {
        /// Cell that produced the effect.
        cell: GridKey,
        /// Effect that was applied.
        effect: TileEffect,
    },
    /// Reports that the agent was returned to a safe location.
    AgentRolledBack {
        /// Cell the agent returned to, if it resolves in the current grid.
        cell: Option<GridKey>,
        /// World position the agent returned to.
        position: Vec3,
    },
    /// Announces a change of the sticky state.
    StickyChanged {
        /// Whether the agent is sticky.
        active: bool,
        /// Multiplier applied to platform fall delays while sticky.
        fall_delay_multiplier: f32,
    },
    /// Announces that a platform was touched and will fall.
    PlatformArmed {
        /// Cell of the platform.
        cell: GridKey,
        /// Delay before the platform starts to descend.
        delay: Duration,
    },
    /// Announces that a platform started to descend.
    PlatformFalling {
        /// Cell of the platform.
        cell: GridKey,
    },
    /// Announces that a platform finished falling and left the grid.
    PlatformFell {
        /// Cell of the platform.
        cell: GridKey,
    },
    /// Confirms a successful teleport.
    Teleported {
        /// Teleporter that was used.
        teleporter: TeleporterId,
        /// World position the agent arrived at.
        position: Vec3,
    },
    /// Confirms that the agent picked up the torch.
    TorchPickedUp,
}

/// Stable grid location: world X/Z quantized to thousandths of a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridKey {
    x: i64,
    z: i64,
}

impl GridKey {
    /// Creates a key from already quantized coordinates.
    #[must_use]
    pub const fn new(x: i64, z: i64) -> Self {
        Self { x, z }
    }

    /// Quantizes a world position. The Y component is ignored.
    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            x: quantize(position.x),
            z: quantize(position.z),
        }
    }

    /// Quantized X coordinate.
    #[must_use]
    pub const fn x(&self) -> i64 {
        self.x
    }

    /// Quantized Z coordinate.
    #[must_use]
    pub const fn z(&self) -> i64 {
        self.z
    }
}

impl fmt::Display for GridKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.3}, {:.3})",
            self.x as f64 / GRID_KEY_PRECISION,
            self.z as f64 / GRID_KEY_PRECISION
        )
    }
}

fn quantize(value: f32) -> i64 {
    (f64::from(value) * GRID_KEY_PRECISION).round() as i64
}

/// Index of a cell within a single grid snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u32);

impl CellId {
    /// Creates a new cell identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Position of the cell within its snapshot's cell list.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Index of a marker within the loaded level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarkerId(u32);

impl MarkerId {
    /// Creates a new marker identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Identifier of a teleporter within the loaded level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TeleporterId(u32);

impl TeleporterId {
    /// Creates a new teleporter identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Gameplay category of a grid cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellCategory {
    /// Plain walkable tile.
    #[default]
    Normal,
    /// Solid obstacle that is never a destination.
    Obstacle,
    /// Hazard that grows the agent and sends it back.
    PoisonPit,
    /// Tile that shrinks the agent and sends it back.
    Shrink,
    /// Tile that makes the agent sticky.
    Sticky,
    /// Tile that temporarily grows the agent in place.
    Reactive,
    /// Wall that only a small agent may pass.
    MutationWall,
    /// Platform that falls shortly after contact.
    FallingPlatform,
}

impl CellCategory {
    /// Whether a path to a cell of this category ignores the hop budget.
    #[must_use]
    pub const fn is_path_length_exempt(self) -> bool {
        matches!(self, Self::PoisonPit | Self::Shrink | Self::MutationWall)
    }

    /// Whether the category lives on the obstacle layer.
    #[must_use]
    pub const fn is_obstacle_layer(self) -> bool {
        matches!(self, Self::Obstacle | Self::MutationWall)
    }

    /// Whether landing on the category refreshes the last-safe position.
    #[must_use]
    pub const fn records_safe_position(self) -> bool {
        matches!(self, Self::Normal)
    }
}

/// Mutation size of the agent. Exactly one holds at a time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SizeState {
    /// Shrunk below the default scale.
    Small,
    /// Default scale.
    #[default]
    Normal,
    /// Grown above the default scale.
    Big,
}

impl SizeState {
    /// Classifies a scale relative to the default scale.
    #[must_use]
    pub fn from_scale(scale: f32, default_scale: f32) -> Self {
        const TOLERANCE: f32 = 1e-3;
        if scale < default_scale - TOLERANCE {
            Self::Small
        } else if scale > default_scale + TOLERANCE {
            Self::Big
        } else {
            Self::Normal
        }
    }
}

/// When a marker takes part in the grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reveal {
    /// The marker is part of the grid whenever it is active.
    #[default]
    Always,
    /// The marker is part of the grid only while the agent is big.
    WhileBig,
}

/// Physical cell marker supplied by the level geometry.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridMarker {
    /// Centre of the marker in world space.
    pub position: Vec3,
    /// Gameplay category of the marker.
    #[serde(default)]
    pub category: CellCategory,
    /// Whether the marker is currently present in the scene.
    #[serde(default = "default_active")]
    pub active: bool,
    /// Half size of the marker's box, used for line-of-sight blocking.
    #[serde(default = "default_half_extents")]
    pub half_extents: Vec3,
    /// When the marker takes part in the grid.
    #[serde(default)]
    pub reveal: Reveal,
}

impl GridMarker {
    /// Creates an active unit-sized marker that is always revealed.
    #[must_use]
    pub fn new(position: Vec3, category: CellCategory) -> Self {
        Self {
            position,
            category,
            active: true,
            half_extents: default_half_extents(),
            reveal: Reveal::Always,
        }
    }

    /// Replaces the marker's half extents.
    #[must_use]
    pub fn with_half_extents(mut self, half_extents: Vec3) -> Self {
        self.half_extents = half_extents;
        self
    }

    /// Replaces the marker's reveal rule.
    #[must_use]
    pub fn with_reveal(mut self, reveal: Reveal) -> Self {
        self.reveal = reveal;
        self
    }

    /// Marks the marker as absent from the scene.
    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

const fn default_active() -> bool {
    true
}

fn default_half_extents() -> Vec3 {
    Vec3::splat(0.5)
}

/// Size-gated teleporter placed in the level.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TeleporterSpec {
    /// Identifier used to activate the teleporter.
    pub id: TeleporterId,
    /// Ground position the agent arrives at.
    pub destination: Vec3,
}

/// One step of a planned path.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathStep {
    /// Cell visited by the step.
    pub key: GridKey,
    /// World position the agent lands at.
    pub position: Vec3,
}

/// How long an effect lasts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectDuration {
    /// The effect reverts after the provided duration.
    Temporary(Duration),
    /// The effect lasts until superseded.
    Permanent,
}

/// Effect produced by landing on a special cell.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum TileEffect {
    /// Rescales the agent, optionally sending it back afterwards.
    Mutate {
        /// Scale the agent transitions to.
        scale: f32,
        /// How long the scale is held.
        duration: EffectDuration,
        /// Grace delay before the agent is sent back, if it is.
        rollback_after: Option<Duration>,
    },
    /// Makes the agent sticky.
    Sticky {
        /// How long the agent stays sticky.
        duration: EffectDuration,
        /// Multiplier applied to platform fall delays while sticky.
        fall_delay_multiplier: f32,
    },
    /// Starts the platform's fall countdown.
    PlatformFall,
    /// The agent is too large for the cell and is sent back at once.
    Blocked,
}

/// Reasons a move, teleport or landing may be refused.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveRejection {
    /// No path within the hop budget reaches the target.
    #[error("no path reaches the requested cell")]
    NoPathFound,
    /// The target cannot be selected.
    #[error("requested cell is not a valid destination: {0}")]
    InvalidTarget(InvalidTarget),
    /// The agent is still travelling along a path.
    #[error("agent is still travelling along a path")]
    AgentBusy,
    /// The path was planned against a grid that has since been rebuilt.
    #[error("path was planned against a superseded grid")]
    StaleGrid,
    /// The agent is too large for the wall or teleporter.
    #[error("agent is too large to pass")]
    TooLarge,
    /// The teleporter was already used.
    #[error("teleporter has already been used")]
    TeleporterSpent,
    /// No teleporter with the requested identifier exists.
    #[error("no teleporter with that identifier")]
    UnknownTeleporter,
    /// A collaborator the move depends on is missing.
    #[error("movement is disabled: {0}")]
    MissingCollaborator(Collaborator),
}

/// Reasons a cell cannot be chosen as a destination.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvalidTarget {
    /// The key does not resolve to an indexed cell.
    #[error("cell is not part of the grid")]
    Unknown,
    /// The agent already occupies the cell.
    #[error("agent already occupies the cell")]
    CurrentCell,
    /// The cell lies on the obstacle layer.
    #[error("cell lies on the obstacle layer")]
    ObstacleLayer,
    /// The cell's category cannot be selected directly.
    #[error("cells of category {0:?} cannot be selected directly")]
    Barred(CellCategory),
}

/// Collaborators the movement core depends on.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collaborator {
    /// The grid has no indexed cells.
    #[error("the grid has no cells")]
    Grid,
    /// The agent does not stand on any cell.
    #[error("the agent is not placed on a cell")]
    AgentPlacement,
}
