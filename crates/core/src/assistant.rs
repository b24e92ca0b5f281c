mod builder;
mod state;

use tokio::sync::mpsc;
use tracing::Instrument;

pub use builder::AssistantBuilder;
use state::Command;

/// Handle to a running assistant engine.
///
/// The engine task exclusively owns the transcript and all per-turn
/// state; this handle only enqueues commands, so no locking is
/// involved anywhere. Exactly one turn is in flight at a time:
/// submissions arriving while the engine is busy are queued and served
/// in order (shells should additionally disable their input while a
/// turn runs). Dropping the last handle shuts the engine down and
/// cancels any in-flight turn.
pub struct Assistant {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl Assistant {
    /// Enqueues a user submission for processing.
    pub fn submit<S: Into<String>>(&self, input: S) {
        self.cmd_tx
            .send(Command::Submit(input.into()))
            .expect("assistant engine has been dropped too early");
    }

    /// Cancels the in-flight turn, if any.
    ///
    /// The reply placeholder keeps whatever text has streamed so far
    /// and becomes immutable; the engine returns to idle and serves
    /// the next queued submission.
    pub fn stop(&self) {
        self.cmd_tx
            .send(Command::Stop)
            .expect("assistant engine has been dropped too early");
    }
}

impl Assistant {
    fn spawn_from_builder(builder: AssistantBuilder) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state, turn_rx) = state::AssistantState::from_builder(builder);
        tokio::spawn(
            state::run(state, cmd_rx, turn_rx)
                .instrument(trace_span!("assistant")),
        );
        Self { cmd_tx }
    }
}
