//! Parabolic hop between two cell centres.

use std::time::Duration;

use glam::Vec3;
use tilehop_core::PathStep;

/// Result of advancing a hop by one fixed step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum HopProgress {
    InFlight(Vec3),
    Arrived(PathStep),
}

/// A single hop that is currently in the air.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Hop {
    start: Vec3,
    destination: PathStep,
    elapsed: Duration,
}

impl Hop {
    pub(crate) fn new(start: Vec3, destination: PathStep) -> Self {
        Self {
            start,
            destination,
            elapsed: Duration::ZERO,
        }
    }

    pub(crate) fn advance(
        &mut self,
        dt: Duration,
        duration: Duration,
        jump_height: f32,
    ) -> HopProgress {
        self.elapsed = self.elapsed.saturating_add(dt);
        if self.elapsed >= duration {
            return HopProgress::Arrived(self.destination);
        }

        let t = self.elapsed.as_secs_f32() / duration.as_secs_f32();
        HopProgress::InFlight(arc_position(
            self.start,
            self.destination.position,
            t,
            jump_height,
        ))
    }
}

/// Position along the hop arc at normalized time `t`.
///
/// Horizontal motion and the baseline height are linear; the arc adds
/// `jump_height * 4t(1 - t)`, which peaks at `t = 0.5`.
pub(crate) fn arc_position(start: Vec3, target: Vec3, t: f32, jump_height: f32) -> Vec3 {
    let t = t.clamp(0.0, 1.0);
    let baseline = start.lerp(target, t);
    let lift = jump_height * 4.0 * t * (1.0 - t);
    Vec3::new(baseline.x, baseline.y + lift, baseline.z)
}
