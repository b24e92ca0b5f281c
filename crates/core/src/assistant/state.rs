use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use maitre_model::{ChatMessage, CompletionRequest};
use tokio::select;
use tokio::sync::{mpsc, watch};
use tracing::Instrument;

use super::AssistantBuilder;
use crate::completion_client::{CompletionClient, TurnError};
use crate::lookup::ProductLookup;
use crate::prompt;
use crate::transcript::{Message, Role, Transcript};

pub type UpdateFn = Box<dyn Fn(Vec<Message>) + Send + Sync>;
pub type IdleFn = Box<dyn Fn() + Send + Sync>;

#[derive(Debug)]
pub enum Command {
    Submit(String),
    Stop,
}

/// The stage of the turn currently in flight.
enum TurnStage {
    Idle,
    /// The side-channel lookup is running; the streaming call is not
    /// issued until it resolves.
    AwaitingProducts { turn_id: u64 },
    /// The reply is streaming into the placeholder, which always
    /// renders as `intro` followed by the accumulated text.
    Streaming { turn_id: u64, intro: String },
}

impl TurnStage {
    #[inline]
    fn turn_id(&self) -> Option<u64> {
        match self {
            TurnStage::Idle => None,
            TurnStage::AwaitingProducts { turn_id }
            | TurnStage::Streaming { turn_id, .. } => Some(*turn_id),
        }
    }
}

/// Progress reports from a spawned turn task back to the engine.
///
/// Events carry the id of the turn that produced them; events from a
/// turn that is no longer current are discarded.
#[derive(Debug)]
pub(crate) enum TurnEvent {
    ProductsResolved {
        turn_id: u64,
        intro: String,
    },
    /// The full accumulated reply text so far, not a delta.
    StreamText {
        turn_id: u64,
        text: String,
    },
    Finished {
        turn_id: u64,
        result: Result<(), TurnError>,
    },
}

/// The engine state, exclusively owned by the engine task.
pub struct AssistantState {
    completion_client: CompletionClient,
    lookup: Arc<dyn ProductLookup>,
    knowledge_base: Option<String>,
    stream_timeout: Duration,
    transcript: Transcript,
    stage: TurnStage,
    pending_inputs: VecDeque<String>,
    next_turn_id: u64,
    // Stop signal for the in-flight turn. Replaced on every new turn
    // and cleared when a turn ends; dropping it cancels the task.
    stop_tx: Option<watch::Sender<bool>>,
    turn_tx: mpsc::UnboundedSender<TurnEvent>,
    on_update: Option<UpdateFn>,
    on_idle: Option<IdleFn>,
}

pub async fn run(
    mut state: AssistantState,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    mut turn_rx: mpsc::UnboundedReceiver<TurnEvent>,
) {
    debug!("engine started");
    // Let the shell render the seeded greeting.
    state.notify_update();
    loop {
        select! {
            biased;

            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    // All handles are gone, the view has unmounted.
                    break;
                };
                trace!("received command: {cmd:?}");
                match cmd {
                    Command::Submit(input) => state.submit(input),
                    Command::Stop => state.stop_turn(),
                }
            }
            Some(event) = turn_rx.recv() => {
                state.handle_turn_event(event);
            }
        }
    }
    debug!("engine will terminate");
}

impl AssistantState {
    pub fn from_builder(
        builder: AssistantBuilder,
    ) -> (Self, mpsc::UnboundedReceiver<TurnEvent>) {
        let AssistantBuilder {
            completion_client,
            lookup,
            knowledge_base,
            greeting,
            stream_timeout,
            on_update,
            on_idle,
        } = builder;

        let (turn_tx, turn_rx) = mpsc::unbounded_channel();
        let state = Self {
            completion_client,
            lookup,
            knowledge_base,
            stream_timeout,
            transcript: Transcript::with_greeting(greeting),
            stage: TurnStage::Idle,
            pending_inputs: VecDeque::new(),
            next_turn_id: 1,
            stop_tx: None,
            turn_tx,
            on_update,
            on_idle,
        };
        (state, turn_rx)
    }

    #[inline]
    fn submit(&mut self, input: String) {
        if !matches!(self.stage, TurnStage::Idle) {
            // The shell disables input while a turn is in flight;
            // anything arriving anyway is queued and served in order.
            self.pending_inputs.push_back(input);
            return;
        }
        self.begin_turn(input);
    }

    fn begin_turn(&mut self, input: String) {
        let turn_id = self.next_turn_id;
        self.next_turn_id += 1;
        self.stage = TurnStage::AwaitingProducts { turn_id };

        // Context for the upstream call is captured before this turn's
        // messages land in the transcript: the final user turn may
        // differ from the raw input once the lookup resolves.
        let prior = self.prior_messages();

        self.transcript.append(Message::user(input.clone()));
        // The reply placeholder, mutated in place while the turn runs.
        self.transcript.append(Message::assistant(""));
        self.notify_update();

        let (stop_tx, stop_rx) = watch::channel(false);
        // Replacing the previous sender also releases any stale task.
        self.stop_tx = Some(stop_tx);

        let turn = Turn {
            turn_id,
            input,
            prior,
            lookup: Arc::clone(&self.lookup),
            completion_client: self.completion_client.clone(),
            stream_timeout: self.stream_timeout,
            events: self.turn_tx.clone(),
        };
        tokio::spawn(
            turn.run(stop_rx)
                .instrument(trace_span!("turn", id = turn_id)),
        );
    }

    fn prior_messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.transcript.len() + 1);
        if let Some(knowledge) = &self.knowledge_base {
            messages.push(ChatMessage::System(knowledge.clone()));
        }
        for msg in self.transcript.iter() {
            messages.push(match msg.role {
                Role::User => ChatMessage::User(msg.text.clone()),
                Role::Assistant => ChatMessage::Assistant(msg.text.clone()),
            });
        }
        messages
    }

    fn stop_turn(&mut self) {
        if matches!(self.stage, TurnStage::Idle) {
            return;
        }
        debug!("turn stopped");
        if let Some(stop_tx) = self.stop_tx.take() {
            stop_tx.send(true).ok();
        }
        // The placeholder keeps whatever text has arrived and is
        // immutable from here on.
        self.stage = TurnStage::Idle;
        self.process_next_input();
    }

    fn handle_turn_event(&mut self, event: TurnEvent) {
        trace!("received turn event: {event:?}");
        match event {
            TurnEvent::ProductsResolved { turn_id, intro } => {
                if self.stage.turn_id() != Some(turn_id) {
                    return;
                }
                if !intro.is_empty() {
                    let last = self.transcript.len() - 1;
                    self.transcript.update_text_at(last, intro.clone());
                    self.notify_update();
                }
                self.stage = TurnStage::Streaming { turn_id, intro };
            }
            TurnEvent::StreamText { turn_id, text } => {
                let TurnStage::Streaming {
                    turn_id: current,
                    intro,
                } = &self.stage
                else {
                    return;
                };
                if *current != turn_id {
                    return;
                }
                let last = self.transcript.len() - 1;
                self.transcript.update_text_at(last, format!("{intro}{text}"));
                self.notify_update();
            }
            TurnEvent::Finished { turn_id, result } => {
                if self.stage.turn_id() != Some(turn_id) {
                    return;
                }
                self.stop_tx = None;
                self.stage = TurnStage::Idle;
                if let Err(err) = result {
                    warn!("turn failed: {err}");
                    // Fixed apology, wholesale: no partial text and no
                    // product intro survive a failed turn.
                    let last = self.transcript.len() - 1;
                    self.transcript
                        .update_text_at(last, prompt::APOLOGY.to_owned());
                    self.notify_update();
                }
                self.process_next_input();
            }
        }
    }

    fn process_next_input(&mut self) {
        if let Some(input) = self.pending_inputs.pop_front() {
            self.begin_turn(input);
        } else if let Some(on_idle) = &self.on_idle {
            on_idle();
        }
    }

    #[inline]
    fn notify_update(&self) {
        if let Some(on_update) = &self.on_update {
            on_update(self.transcript.snapshot());
        }
    }
}

/// One conversational turn, run as its own task so the engine stays
/// responsive to commands while the turn awaits the network.
struct Turn {
    turn_id: u64,
    input: String,
    prior: Vec<ChatMessage>,
    lookup: Arc<dyn ProductLookup>,
    completion_client: CompletionClient,
    stream_timeout: Duration,
    events: mpsc::UnboundedSender<TurnEvent>,
}

impl Turn {
    async fn run(self, mut stop_rx: watch::Receiver<bool>) {
        select! {
            _ = self.drive() => {}
            _ = wait_stopped(&mut stop_rx) => {
                trace!("turn cancelled");
            }
        }
    }

    async fn drive(self) {
        let Turn {
            turn_id,
            input,
            mut prior,
            lookup,
            completion_client,
            stream_timeout,
            events,
        } = self;

        // The side channel goes first: the final user turn depends on
        // what it finds. Failures inside the lookup degrade to zero
        // hits, never to a failed turn.
        let hits = lookup.search(&input).await;
        trace!("lookup resolved with {} hit(s)", hits.len());

        let intro = prompt::product_intro(&hits);
        let final_turn = prompt::augmented_prompt(&input, &hits);
        if events
            .send(TurnEvent::ProductsResolved { turn_id, intro })
            .is_err()
        {
            return;
        }

        prior.push(ChatMessage::User(final_turn));
        let req = CompletionRequest { messages: prior };

        let result = completion_client
            .send_request(req, stream_timeout, {
                let events = events.clone();
                move |text| {
                    events.send(TurnEvent::StreamText { turn_id, text }).ok();
                }
            })
            .await;
        events
            .send(TurnEvent::Finished {
                turn_id,
                result: result.map(drop),
            })
            .ok();
    }
}

async fn wait_stopped(stop_rx: &mut watch::Receiver<bool>) {
    loop {
        if *stop_rx.borrow_and_update() {
            return;
        }
        if stop_rx.changed().await.is_err() {
            // The engine dropped the sender: stopped either way.
            return;
        }
    }
}
