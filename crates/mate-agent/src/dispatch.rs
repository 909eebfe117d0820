//! Supervisory dispatch: the deterministic reference turn driver.
//!
//! The supervisor owns a turn end to end. It appends the user message, hands
//! the text to exactly one worker agent (planner or task manager), appends
//! that agent's answer, and closes with its own routing message. A snapshot
//! goes out after every appended message, so the relay sees the history grow
//! one message at a time.

use crate::checkpoint::Checkpointer;
use crate::driver::{TurnDriver, TurnUpdate};
use crate::message::{ConversationSnapshot, TurnMessage};
use crate::roles::AgentRole;
use crate::tools::{ToolRegistry, TASK_FORM_TOOL, THINK_TOOL};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Closing message the supervisor appends to every turn. Routing text like
/// this is suppressed by the relay and must never win over a worker answer.
pub const SUPERVISOR_CLOSING: &str = "Task completed.";

/// Planner answer for a form request. Worded so the relay's content
/// heuristic also matches it; the dedup flag keeps the form single.
pub const PLANNER_FORM_PROMPT: &str = "Here is the task form. Fill it out below.";

/// Splits `text` into a registry command. The first token must name a tool;
/// the remainder is a JSON argument object, a bare task id, or nothing.
/// Anything else (including malformed JSON) is not a command and routes to
/// the planner.
pub fn parse_tool_command(text: &str) -> Option<(String, Value)> {
    let trimmed = text.trim();
    let mut split = trimmed.splitn(2, char::is_whitespace);
    let name = split.next()?;
    if !ToolRegistry::is_tool(name) {
        return None;
    }
    let rest = split.next().map(str::trim).unwrap_or("");
    let args = if rest.is_empty() {
        json!({})
    } else if rest.starts_with('{') {
        serde_json::from_str(rest).ok()?
    } else {
        json!({ "task_id": rest })
    };
    Some((name.to_string(), args))
}

/// Routing contract: direct tool commands go to the task manager, everything
/// else to the planner.
pub fn route_message(text: &str) -> AgentRole {
    if parse_tool_command(text).is_some() {
        AgentRole::TaskManager
    } else {
        AgentRole::Planner
    }
}

pub fn wants_form(text: &str) -> bool {
    text.to_lowercase().contains("form")
}

pub struct SupervisorDriver {
    registry: ToolRegistry,
    checkpointer: Arc<dyn Checkpointer>,
}

impl SupervisorDriver {
    pub fn new(registry: ToolRegistry, checkpointer: Arc<dyn Checkpointer>) -> Self {
        Self {
            registry,
            checkpointer,
        }
    }
}

async fn send_snapshot(updates: &mpsc::Sender<TurnUpdate>, history: &[TurnMessage]) -> bool {
    updates
        .send(TurnUpdate::Snapshot(ConversationSnapshot::new(
            history.to_vec(),
        )))
        .await
        .is_ok()
}

#[async_trait]
impl TurnDriver for SupervisorDriver {
    async fn run_turn(
        &self,
        thread_id: &str,
        user_text: &str,
        updates: mpsc::Sender<TurnUpdate>,
    ) {
        let mut history = match self.checkpointer.load(thread_id) {
            Ok(history) => history,
            Err(error) => {
                eprintln!("[dispatch] failed to load checkpoint for {thread_id}: {error}");
                Vec::new()
            }
        };

        history.push(TurnMessage::user(user_text));
        if !send_snapshot(&updates, &history).await {
            return;
        }

        let (role, answer) = match parse_tool_command(user_text) {
            Some((name, args)) => {
                let reply = self.registry.invoke(&name, &args).await;
                history.push(TurnMessage::tool(name, reply.clone()));
                (AgentRole::TaskManager, reply)
            }
            None if wants_form(user_text) => {
                let marker = self.registry.invoke(TASK_FORM_TOOL, &json!({})).await;
                history.push(TurnMessage::tool(TASK_FORM_TOOL, marker));
                (AgentRole::Planner, PLANNER_FORM_PROMPT.to_string())
            }
            None => {
                let echo = self
                    .registry
                    .invoke(THINK_TOOL, &json!({ "thought": user_text }))
                    .await;
                history.push(TurnMessage::tool(THINK_TOOL, echo.clone()));
                (AgentRole::Planner, echo)
            }
        };
        if !send_snapshot(&updates, &history).await {
            return;
        }

        history.push(TurnMessage::assistant(role.as_str(), answer));
        if !send_snapshot(&updates, &history).await {
            return;
        }

        history.push(TurnMessage::assistant(
            AgentRole::Supervisor.as_str(),
            SUPERVISOR_CLOSING,
        ));
        if !send_snapshot(&updates, &history).await {
            return;
        }

        // A cancelled turn is never checkpointed; the client resends it.
        if let Err(error) = self.checkpointer.save(thread_id, &history) {
            eprintln!("[dispatch] failed to save checkpoint for {thread_id}: {error}");
        }
    }
}
