//! Final gate: hand the dispatch to the current source.

use tracing::debug;

use crate::core::chain::{DispatchContext, Gate};

/// Hands the outcome sink to the current source's listener.
///
/// Fails when the source withdrew between scheduling and dispatch. Returns as
/// soon as the listener has been called; the outcome arrives later through
/// the sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct SendGate;

impl Gate for SendGate {
    fn name(&self) -> &'static str {
        "send"
    }

    fn execute(&mut self, ctx: &mut DispatchContext<'_>) -> bool {
        let Some(listener) = ctx.current_listener() else {
            debug!("No listener for current source");
            return false;
        };
        let Some(sink) = ctx.take_sink() else {
            debug!("Outcome sink already taken by an earlier gate");
            return false;
        };
        listener.dispatch(sink);
        true
    }
}
