#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Keeps big-only markers in sync with the agent's mutation size.

use tilehop_core::{Command, Event, SizeState};
use tracing::debug;

/// Pure system that requests a reindex whenever the agent grows big or stops
/// being big.
#[derive(Debug, Default)]
pub struct Reveal;

impl Reveal {
    /// Consumes world events and emits at most one reindex per batch.
    pub fn handle(&mut self, events: &[Event], out: &mut Vec<Command>) {
        let toggled = events.iter().any(|event| {
            matches!(
                event,
                Event::MutationChanged { from, to }
                    if (*from == SizeState::Big) != (*to == SizeState::Big)
            )
        });

        if toggled {
            debug!("big-only markers changed visibility");
            out.push(Command::Reindex);
        }
    }
}
