//! Turns driver snapshots into the event stream a chat client consumes.
//!
//! The relay owns the read side of a turn: it diffs each conversation
//! snapshot against a cursor, classifies the new messages, and emits
//! `status`, `ui`, and `final` events. It holds no reference to the driver
//! and never mutates tasks; a client can disconnect at any point without
//! rolling anything back.

use crate::markup::{message_bubble, task_form_fragment};
use mate_agent::{
    is_routing_name, ConversationSnapshot, MessageRole, TurnMessage, TurnUpdate, TASK_FORM_MARKER,
    TASK_FORM_TOOL,
};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    Status(String),
    Ui(String),
    Final(String),
}

impl RelayEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RelayEvent::Status(_) => "status",
            RelayEvent::Ui(_) => "ui",
            RelayEvent::Final(_) => "final",
        }
    }

    pub fn payload(&self) -> &str {
        match self {
            RelayEvent::Status(text) | RelayEvent::Ui(text) | RelayEvent::Final(text) => text,
        }
    }
}

/// Best-effort sniff for "the reasoning process is presenting a form" in
/// assistant prose. False positives are possible on text that merely talks
/// about forms, and it misses any wording it does not anticipate. The
/// reliable signal is the form tool message or its marker token; this
/// predicate only covers drivers that never surface tool messages.
pub fn looks_like_form_prompt(text: &str) -> bool {
    let lowered = text.to_lowercase();
    (lowered.contains("form") && (lowered.contains("fill") || lowered.contains("below")))
        || (lowered.contains("title:") && lowered.contains("priority") && lowered.contains("due"))
}

/// Per-turn relay state.
#[derive(Debug)]
pub struct TurnRelay {
    thread_id: String,
    /// Number of messages already processed. `None` until the first
    /// snapshot arrives.
    cursor: Option<usize>,
    step: usize,
    form_injected: bool,
    last_any_answer: Option<String>,
    last_non_routing_answer: Option<String>,
}

impl TurnRelay {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            cursor: None,
            step: 0,
            form_injected: false,
            last_any_answer: None,
            last_non_routing_answer: None,
        }
    }

    /// Processes one snapshot and returns the events it produced, in order.
    pub fn observe(&mut self, snapshot: &ConversationSnapshot) -> Vec<RelayEvent> {
        self.step += 1;
        let start = match self.cursor {
            // The first snapshot already contains prior turns; only the
            // newest message belongs to this one.
            None if snapshot.is_empty() => {
                self.cursor = Some(0);
                return vec![self.degraded_status()];
            }
            None => snapshot.len() - 1,
            // A shrinking history means the driver misbehaved. Resync the
            // cursor and show generic progress instead of dying mid-turn.
            Some(cursor) if cursor > snapshot.len() => {
                self.cursor = Some(snapshot.len());
                return vec![self.degraded_status()];
            }
            Some(cursor) => cursor,
        };
        self.cursor = Some(snapshot.len());

        let mut events = Vec::new();
        for message in &snapshot.messages[start..] {
            self.observe_message(message, &mut events);
        }
        events
    }

    fn observe_message(&mut self, message: &TurnMessage, events: &mut Vec<RelayEvent>) {
        let name = message.name.as_deref().unwrap_or("");
        let routing = is_routing_name(name);

        if message.role == MessageRole::Assistant {
            self.last_any_answer = Some(message.content.clone());
            if !routing {
                self.last_non_routing_answer = Some(message.content.clone());
            }
            if looks_like_form_prompt(&message.content) {
                self.inject_form(events);
            }
        }

        // Reliable form path, any role: the tool name or the marker itself.
        if (message.role == MessageRole::Tool && name == TASK_FORM_TOOL)
            || message.content.contains(TASK_FORM_MARKER)
        {
            self.inject_form(events);
        }

        // User text and answers render as bubbles, not progress lines, and
        // routing chatter is noise either way.
        if message.role == MessageRole::User || message.role == MessageRole::Assistant || routing {
            return;
        }

        let status = if message.role == MessageRole::Tool && !name.is_empty() {
            format!("Tool: {name}")
        } else if !name.is_empty() {
            format!("Step: {name}")
        } else {
            message.role.label().to_string()
        };
        events.push(RelayEvent::Status(status));
    }

    fn inject_form(&mut self, events: &mut Vec<RelayEvent>) {
        if self.form_injected {
            return;
        }
        self.form_injected = true;
        events.push(RelayEvent::Ui(task_form_fragment(&self.thread_id)));
    }

    fn degraded_status(&self) -> RelayEvent {
        RelayEvent::Status(format!("Processing… step {}", self.step))
    }

    /// Marks the turn as failed. The error text becomes the fallback answer
    /// but never displaces a worker answer that already arrived.
    pub fn record_fault(&mut self, error: &str) {
        self.last_any_answer = Some(format!("Error: {error}"));
    }

    /// The turn's answer: the last non-routing assistant text, else the last
    /// assistant text of any name, else nothing.
    pub fn final_text(&self) -> &str {
        self.last_non_routing_answer
            .as_deref()
            .or(self.last_any_answer.as_deref())
            .unwrap_or("")
    }

    pub fn final_event(&self) -> RelayEvent {
        let text = self.final_text();
        if text.is_empty() {
            RelayEvent::Final(String::new())
        } else {
            RelayEvent::Final(message_bubble("assistant", text))
        }
    }
}

/// Drives one whole turn: consumes driver updates, pushes relay events.
/// Emits `Queued…` before the first snapshot and closes with exactly one
/// `final` event. A failed event send means the client is gone; consumption
/// stops immediately and nothing is rolled back.
pub async fn run_relay(
    mut updates: mpsc::Receiver<TurnUpdate>,
    events: mpsc::Sender<RelayEvent>,
    thread_id: &str,
) {
    let mut relay = TurnRelay::new(thread_id);
    if events
        .send(RelayEvent::Status("Queued…".to_string()))
        .await
        .is_err()
    {
        return;
    }
    while let Some(update) = updates.recv().await {
        match update {
            TurnUpdate::Snapshot(snapshot) => {
                for event in relay.observe(&snapshot) {
                    if events.send(event).await.is_err() {
                        return;
                    }
                }
            }
            TurnUpdate::Failed(reason) => {
                relay.record_fault(&reason);
                break;
            }
        }
    }
    let _ = events.send(relay.final_event()).await;
}
