//! TOML level files.

use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use glam::Vec3;
use serde::Deserialize;
use tilehop_core::{Command, GridMarker, TeleporterSpec, WorldConfig};

/// Level geometry together with the tuning it is played with.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub(crate) struct Level {
    /// Tuning tables such as `[movement]` or `[effects.sticky]`.
    #[serde(flatten)]
    pub(crate) config: WorldConfig,
    /// Where the agent spawns; it snaps to the nearest cell.
    #[serde(default)]
    pub(crate) spawn: Vec3,
    /// Cell markers of the level.
    #[serde(default)]
    pub(crate) markers: Vec<GridMarker>,
    /// Teleporters of the level.
    #[serde(default)]
    pub(crate) teleporters: Vec<TeleporterSpec>,
}

impl Level {
    /// Reads and validates a level file.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("failed to read level file {}", path.display()))?;
        Self::parse(&source).with_context(|| format!("invalid level file {}", path.display()))
    }

    /// Parses and validates level source text.
    pub(crate) fn parse(source: &str) -> Result<Self> {
        let level: Self = toml::from_str(source).context("failed to parse level TOML")?;
        level.validate()?;
        Ok(level)
    }

    fn validate(&self) -> Result<()> {
        if self.markers.is_empty() {
            bail!("level defines no markers");
        }

        let movement = &self.config.movement;
        if !(movement.max_jump_distance.is_finite() && movement.max_jump_distance > 0.0) {
            bail!(
                "max_jump_distance must be a positive number, got {}",
                movement.max_jump_distance
            );
        }

        for (index, teleporter) in self.teleporters.iter().enumerate() {
            if self.teleporters[..index]
                .iter()
                .any(|other| other.id == teleporter.id)
            {
                bail!("teleporter id {} is defined twice", teleporter.id.get());
            }
        }

        Ok(())
    }

    /// Splits the level into the world configuration and its load command.
    pub(crate) fn into_parts(self) -> (WorldConfig, Command) {
        let command = Command::LoadLevel {
            markers: self.markers,
            teleporters: self.teleporters,
            spawn: self.spawn,
        };
        (self.config, command)
    }
}
