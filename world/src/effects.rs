//! Timer state machines for agent scale, stickiness and falling platforms.
//!
//! Each machine owns its elapsed time and is advanced by the world on every
//! variable-step tick. Time left over after a stage completes carries into the
//! next stage, so results do not depend on how the clock is sliced.

use std::time::Duration;

use glam::Vec3;
use tilehop_core::{EffectDuration, GridKey, MarkerId};

#[derive(Clone, Copy, Debug, PartialEq)]
enum ScaleStage {
    Approach { hold: EffectDuration },
    Hold { remaining: Duration },
    Revert,
    Settled,
}

/// Outcome of advancing a [`ScaleTransition`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ScaleProgress {
    pub(crate) scale: f32,
    pub(crate) reverting: bool,
    pub(crate) settled: bool,
}

/// Interpolates the agent's scale towards a target, holds it, then reverts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ScaleTransition {
    from: f32,
    to: f32,
    elapsed: Duration,
    stage: ScaleStage,
}

impl ScaleTransition {
    pub(crate) fn new(from: f32, to: f32, hold: EffectDuration) -> Self {
        Self {
            from,
            to,
            elapsed: Duration::ZERO,
            stage: ScaleStage::Approach { hold },
        }
    }

    pub(crate) fn advance(
        &mut self,
        dt: Duration,
        transition: Duration,
        default_scale: f32,
    ) -> ScaleProgress {
        let mut budget = dt;
        let mut reverting = false;

        loop {
            match self.stage {
                ScaleStage::Approach { hold } => {
                    let remaining = transition.saturating_sub(self.elapsed);
                    if budget < remaining {
                        self.elapsed += budget;
                        break;
                    }
                    budget -= remaining;
                    self.elapsed = transition;
                    self.stage = match hold {
                        EffectDuration::Temporary(remaining) => ScaleStage::Hold { remaining },
                        EffectDuration::Permanent => ScaleStage::Settled,
                    };
                }
                ScaleStage::Hold { remaining } => {
                    if budget < remaining {
                        self.stage = ScaleStage::Hold {
                            remaining: remaining - budget,
                        };
                        break;
                    }
                    budget -= remaining;
                    self.from = self.to;
                    self.to = default_scale;
                    self.elapsed = Duration::ZERO;
                    self.stage = ScaleStage::Revert;
                    reverting = true;
                }
                ScaleStage::Revert => {
                    let remaining = transition.saturating_sub(self.elapsed);
                    if budget < remaining {
                        self.elapsed += budget;
                        break;
                    }
                    self.elapsed = transition;
                    self.stage = ScaleStage::Settled;
                }
                ScaleStage::Settled => break,
            }
        }

        ScaleProgress {
            scale: self.scale(transition),
            reverting,
            settled: self.stage == ScaleStage::Settled,
        }
    }

    fn scale(&self, transition: Duration) -> f32 {
        match self.stage {
            ScaleStage::Approach { .. } | ScaleStage::Revert => {
                let t = if transition.is_zero() {
                    1.0
                } else {
                    (self.elapsed.as_secs_f32() / transition.as_secs_f32()).clamp(0.0, 1.0)
                };
                self.from + (self.to - self.from) * t
            }
            ScaleStage::Hold { .. } | ScaleStage::Settled => self.to,
        }
    }
}

/// Sticky state of the agent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Sticky {
    multiplier: f32,
    remaining: Option<Duration>,
}

impl Sticky {
    pub(crate) fn new(duration: EffectDuration, multiplier: f32) -> Self {
        let remaining = match duration {
            EffectDuration::Temporary(remaining) => Some(remaining),
            EffectDuration::Permanent => None,
        };
        Self {
            multiplier,
            remaining,
        }
    }

    pub(crate) fn multiplier(&self) -> f32 {
        self.multiplier
    }

    /// Advances the timer and reports whether the state expired.
    pub(crate) fn advance(&mut self, dt: Duration) -> bool {
        match self.remaining {
            Some(remaining) if dt >= remaining => true,
            Some(remaining) => {
                self.remaining = Some(remaining - dt);
                false
            }
            None => false,
        }
    }
}

/// Outcome of advancing a [`PlatformFall`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum PlatformProgress {
    Waiting,
    Started,
    Descending,
    Fell,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum PlatformStage {
    Armed { remaining: Duration },
    Falling { elapsed: Duration },
}

/// Countdown and descent of a touched platform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct PlatformFall {
    cell: GridKey,
    marker: MarkerId,
    origin: Vec3,
    stage: PlatformStage,
}

impl PlatformFall {
    pub(crate) fn new(cell: GridKey, marker: MarkerId, origin: Vec3, delay: Duration) -> Self {
        Self {
            cell,
            marker,
            origin,
            stage: PlatformStage::Armed { remaining: delay },
        }
    }

    pub(crate) fn cell(&self) -> GridKey {
        self.cell
    }

    pub(crate) fn marker(&self) -> MarkerId {
        self.marker
    }

    pub(crate) fn is_falling(&self) -> bool {
        matches!(self.stage, PlatformStage::Falling { .. })
    }

    pub(crate) fn remaining_delay(&self) -> Duration {
        match self.stage {
            PlatformStage::Armed { remaining } => remaining,
            PlatformStage::Falling { .. } => Duration::ZERO,
        }
    }

    /// Current position of the platform given the configured descent.
    pub(crate) fn position(&self, fall_duration: Duration, fall_distance: f32) -> Vec3 {
        let progress = match self.stage {
            PlatformStage::Armed { .. } => 0.0,
            PlatformStage::Falling { .. } if fall_duration.is_zero() => 1.0,
            PlatformStage::Falling { elapsed } => {
                (elapsed.as_secs_f32() / fall_duration.as_secs_f32()).clamp(0.0, 1.0)
            }
        };
        self.origin - Vec3::Y * fall_distance * progress
    }

    pub(crate) fn advance(&mut self, dt: Duration, fall_duration: Duration) -> PlatformProgress {
        match self.stage {
            PlatformStage::Armed { remaining } if dt < remaining => {
                self.stage = PlatformStage::Armed {
                    remaining: remaining - dt,
                };
                PlatformProgress::Waiting
            }
            PlatformStage::Armed { remaining } => {
                let elapsed = dt - remaining;
                self.stage = PlatformStage::Falling { elapsed };
                if elapsed >= fall_duration {
                    PlatformProgress::Fell
                } else {
                    PlatformProgress::Started
                }
            }
            PlatformStage::Falling { elapsed } => {
                let elapsed = elapsed.saturating_add(dt);
                self.stage = PlatformStage::Falling { elapsed };
                if elapsed >= fall_duration {
                    PlatformProgress::Fell
                } else {
                    PlatformProgress::Descending
                }
            }
        }
    }
}
