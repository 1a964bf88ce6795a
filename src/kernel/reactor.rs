use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::event::{CaptureSignal, Event, InputEvent, ServerEvent};
use super::pending::PendingRequests;
use super::scheduler::{Scheduler, SideEffect, SuggestionRequest};
use super::state::{SessionState, StateDelta, DEFAULT_ROOT};
use super::view::SessionView;
use crate::error::SessionError;
use crate::history::{estimate_tokens, EntryKind, NewEntry};
use crate::services::backend::SuggestionBatch;
use crate::services::delivery::{Delivery, ReliableSender};
use crate::transcript::{Speaker, TranscriptPayload};
use crate::tree::{NodeId, Suggestion};

/// Owns the session state and runs every event to completion.
///
/// `step` never awaits. Anything that needs I/O comes back as a
/// `SideEffect` for the driver (`run`) to execute.
pub struct SessionController {
    state: SessionState,
    scheduler: Scheduler,
    pending: PendingRequests,
}

impl SessionController {
    pub fn new(client_id: Uuid) -> Self {
        Self {
            state: SessionState::new(client_id),
            scheduler: Scheduler,
            pending: PendingRequests::new(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn pending(&self) -> &PendingRequests {
        &self.pending
    }

    pub fn view(&self) -> SessionView {
        SessionView::project(&self.state, self.pending.len())
    }

    /// Pure Step: Event -> Reduced State + SideEffects.
    /// MUST NOT await I/O or timers.
    pub fn step(&mut self, event: Event) -> Vec<SideEffect> {
        let mut effects = Vec::new();

        match event {
            Event::Server(server) => self.on_server(server),
            Event::Input(input) => self.on_input(input, &mut effects),
            Event::SuggestionsResolved { node_id, epoch, outcome } => self.on_resolved(node_id, epoch, outcome),
            Event::Capture(signal) => self.on_capture(signal),
            Event::Connection(status) => {
                if status != self.state.connection {
                    self.state.reduce(StateDelta::Connection(status));
                    self.state
                        .reduce(StateDelta::History(NewEntry::system(format!("Live channel {}", status.as_str()))));
                }
            }
            Event::Failure(err) => {
                if matches!(err, SessionError::DeviceUnavailable(_)) {
                    self.state.reduce(StateDelta::Capturing(false));
                }
                self.state.reduce(StateDelta::History(NewEntry::error(err.to_string())));
            }
        }

        effects
    }

    fn on_server(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::StreamingText(text) => self.state.reduce(StateDelta::Streaming(text)),
            ServerEvent::Transcript(payload) => self.settle(payload),
            ServerEvent::Suggestions(list) => {
                if !list.is_empty() {
                    let tokens = estimate_tokens(list.iter().map(|s| s.content.as_str()));
                    let entry = NewEntry::new(EntryKind::Generate, format!("Live suggestions: {}", summarize(&list)))
                        .with_tokens(tokens);
                    self.state.reduce(StateDelta::History(entry));
                }
                self.state.reduce(StateDelta::LiveSuggestions(list));
            }
        }
    }

    fn settle(&mut self, payload: TranscriptPayload) {
        let speaker = payload
            .speaker
            .as_deref()
            .and_then(Speaker::parse)
            .unwrap_or(Speaker::User);
        let kind = match speaker {
            Speaker::User => EntryKind::User,
            Speaker::Other => EntryKind::Other,
        };
        let message = payload.text.clone();

        self.state.reduce(StateDelta::TranscriptSettled(payload));
        if !message.trim().is_empty() {
            self.state.reduce(StateDelta::History(NewEntry::new(kind, message)));
        }
    }

    fn on_input(&mut self, input: InputEvent, effects: &mut Vec<SideEffect>) {
        match input {
            InputEvent::Say { text, speaker } => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    self.reject(SessionError::InvalidInput("empty utterance".to_string()));
                    return;
                }
                let kind = match speaker {
                    Speaker::User => EntryKind::User,
                    Speaker::Other => EntryKind::Other,
                };
                self.state.reduce(StateDelta::ManualUtterance { text: text.clone(), speaker });
                self.state.reduce(StateDelta::History(NewEntry::new(kind, text.clone())));
                effects.push(SideEffect::DeliverText { text, speaker });
            }
            InputEvent::Activate(id) => self.activate(id, effects),
            InputEvent::Branch { parent, content } => {
                let content = content.trim().to_string();
                if content.is_empty() {
                    self.reject(SessionError::InvalidInput("empty branch".to_string()));
                    return;
                }
                match self.state.tree.get(parent).map(|n| n.can_expand()) {
                    None => self.reject(SessionError::UnknownNode(parent)),
                    Some(false) => self.reject(SessionError::InvalidInput(format!(
                        "commit {} before branching from it",
                        parent
                    ))),
                    Some(true) => {
                        self.state.reduce(StateDelta::ManualBranch { parent, content: content.clone() });
                        self.state.reduce(StateDelta::History(NewEntry::new(
                            EntryKind::Commit,
                            format!("Manual branch: {}", content),
                        )));
                    }
                }
            }
            InputEvent::SeedFromTranscript => {
                let seed = self
                    .state
                    .transcript
                    .last_from(Speaker::Other)
                    .map(|u| u.text.clone());
                match seed {
                    Some(text) => {
                        self.reset_tree(&text);
                        let root = self.state.tree.root_id();
                        self.activate(root, effects);
                    }
                    None => self.reject(SessionError::InvalidInput(
                        "nothing from the other side to branch from yet".to_string(),
                    )),
                }
            }
            InputEvent::ResetTree(root) => {
                let root = root.trim();
                self.reset_tree(if root.is_empty() { DEFAULT_ROOT } else { root });
            }
            InputEvent::ClearHistory => self.state.reduce(StateDelta::HistoryCleared),
            InputEvent::ClearTranscript => {
                self.state.reduce(StateDelta::TranscriptCleared);
                self.state
                    .reduce(StateDelta::History(NewEntry::system("Transcript cleared")));
            }
        }
    }

    fn activate(&mut self, id: NodeId, effects: &mut Vec<SideEffect>) {
        let (deltas, effect) = self.scheduler.plan_activation(&self.state.tree, &self.pending, id);
        for delta in deltas {
            self.state.reduce(delta);
        }

        match effect {
            Some(SideEffect::RequestSuggestions(req)) => {
                // Only the first activation of a node gets a request out.
                if self.pending.try_begin(req.node_id, req.epoch) {
                    debug!("Requesting suggestions for {} (epoch {})", req.node_id, req.epoch);
                    effects.push(SideEffect::RequestSuggestions(req));
                }
            }
            Some(other) => effects.push(other),
            None => {}
        }
    }

    fn reset_tree(&mut self, root: &str) {
        if !self.pending.is_empty() {
            info!("Tree reset abandons {} in-flight generation(s)", self.pending.len());
        }
        self.pending.clear();
        self.state.reduce(StateDelta::TreeReset(root.to_string()));
        self.state
            .reduce(StateDelta::History(NewEntry::system(format!("Mind map reset: {}", root))));
    }

    fn on_resolved(&mut self, node_id: NodeId, epoch: u64, outcome: Result<SuggestionBatch, SessionError>) {
        // STALE REJECTION: the tree this request was issued for is gone.
        if epoch != self.state.tree.epoch() {
            info!(
                "Discarded Stale Suggestions: {} epoch {} vs tree {}",
                node_id,
                epoch,
                self.state.tree.epoch()
            );
            return;
        }
        self.pending.finish(node_id, epoch);

        let Some(node) = self.state.tree.get(node_id) else {
            warn!("Suggestions for vanished node {}", node_id);
            return;
        };
        let content = node.content.clone();

        match outcome {
            Ok(batch) if batch.suggestions.is_empty() => {
                self.state.reduce(StateDelta::History(NewEntry::error(format!(
                    "No suggestions returned for \"{}\"",
                    content
                ))));
            }
            Ok(batch) => {
                if self.state.tree.has_children(node_id) {
                    // A manual branch landed while the request was out.
                    info!("Dropped suggestions for {}: already expanded", node_id);
                    return;
                }
                let tokens = estimate_tokens(batch.suggestions.iter().map(|s| s.content.as_str()));
                let message = format!("Branches for \"{}\": {}", content, summarize(&batch.suggestions));
                self.state.reduce(StateDelta::CandidatesAdded { parent: node_id, suggestions: batch.suggestions });
                self.state.reduce(StateDelta::RelatedQuotes(batch.related_quotes));
                self.state
                    .reduce(StateDelta::History(NewEntry::new(EntryKind::Generate, message).with_tokens(tokens)));
            }
            Err(e) => {
                // Node stays childless, so activating it again retries.
                warn!("Suggestion request for {} failed: {}", node_id, e);
                self.state.reduce(StateDelta::History(NewEntry::error(format!(
                    "Suggestions for \"{}\" failed: {}",
                    content, e
                ))));
            }
        }
    }

    fn on_capture(&mut self, signal: CaptureSignal) {
        match signal {
            CaptureSignal::Started => {
                self.state.reduce(StateDelta::Capturing(true));
                self.state.reduce(StateDelta::History(NewEntry::system("Recording started")));
            }
            CaptureSignal::Stopped { .. } if !self.state.capturing => {
                debug!("Stop without a recording, ignored");
            }
            CaptureSignal::Stopped { submitted } => {
                self.state.reduce(StateDelta::Capturing(false));
                let message = match submitted {
                    Some(bytes) => format!("Recording stopped, {} bytes sent for transcription", bytes),
                    None => "Recording too short, discarded".to_string(),
                };
                self.state.reduce(StateDelta::History(NewEntry::system(message)));
            }
        }
    }

    fn reject(&mut self, err: SessionError) {
        debug!("Rejected input: {}", err);
        self.state.reduce(StateDelta::History(NewEntry::error(err.to_string())));
    }

    /// Async Driver Loop
    ///
    /// Runs until every sender of `receiver` is dropped. `tx` is handed to
    /// spawned requests so their results come back through the same queue.
    pub async fn run(
        &mut self,
        mut receiver: mpsc::Receiver<Event>,
        tx: mpsc::Sender<Event>,
        sender: Arc<ReliableSender>,
        views: watch::Sender<SessionView>,
    ) {
        info!("Session controller started: {}", self.state.client_id());
        views.send_replace(self.view());

        while let Some(event) = receiver.recv().await {
            let effects = self.step(event);

            for effect in effects {
                match effect {
                    SideEffect::Log(msg) => info!("[LOG] {}", msg),
                    SideEffect::RequestSuggestions(req) => spawn_suggestion(req, sender.clone(), tx.clone()),
                    SideEffect::DeliverText { text, speaker } => spawn_delivery(text, speaker, sender.clone(), tx.clone()),
                }
            }

            views.send_replace(self.view());
        }

        info!("Session controller stopped");
    }
}

fn spawn_suggestion(req: SuggestionRequest, sender: Arc<ReliableSender>, tx: mpsc::Sender<Event>) {
    let unary = sender.unary();
    tokio::spawn(async move {
        let outcome = unary.suggest(&req.text, req.parent_content.as_deref()).await;
        if tx.send(Event::resolved(req.node_id, req.epoch, outcome)).await.is_err() {
            debug!("Controller gone before suggestions for {} resolved", req.node_id);
        }
    });
}

fn spawn_delivery(text: String, speaker: Speaker, sender: Arc<ReliableSender>, tx: mpsc::Sender<Event>) {
    tokio::spawn(async move {
        match sender.send_text(&text, speaker).await {
            Ok(Delivery::Live) => debug!("Typed text sent over live channel"),
            // Already settled locally; the backend's echo is not re-applied.
            Ok(Delivery::Unary(_)) => debug!("Typed text sent over unary path"),
            Err(e) => {
                let _ = tx.send(Event::Failure(e)).await;
            }
        }
    });
}

fn summarize(list: &[Suggestion]) -> String {
    list.iter().map(|s| s.content.as_str()).collect::<Vec<_>>().join(" | ")
}
