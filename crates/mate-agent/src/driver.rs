//! Boundary between the web layer and whatever runs the conversation turn.
//!
//! A driver receives the user's text and pushes conversation snapshots into
//! a channel as the turn progresses. The relay on the other end diffs the
//! snapshots into stream events; it never calls back into the driver.

use crate::message::ConversationSnapshot;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// One progress report from a running turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnUpdate {
    /// Full conversation history as of this point in the turn. Snapshots are
    /// cumulative; each one should contain every message of the previous.
    Snapshot(ConversationSnapshot),
    /// The turn died. No further updates follow.
    Failed(String),
}

/// Something that can run one conversation turn for a thread.
///
/// Implementations stop early when `updates` is closed; a dropped receiver
/// means the client went away and nobody will read further snapshots.
#[async_trait]
pub trait TurnDriver: Send + Sync {
    async fn run_turn(
        &self,
        thread_id: &str,
        user_text: &str,
        updates: mpsc::Sender<TurnUpdate>,
    );
}

/// Replays a fixed sequence of updates, ignoring the input. Lets relay and
/// route tests script exact snapshot progressions.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDriver {
    updates: Vec<TurnUpdate>,
}

impl ScriptedDriver {
    pub fn new(updates: Vec<TurnUpdate>) -> Self {
        Self { updates }
    }
}

#[async_trait]
impl TurnDriver for ScriptedDriver {
    async fn run_turn(
        &self,
        _thread_id: &str,
        _user_text: &str,
        updates: mpsc::Sender<TurnUpdate>,
    ) {
        for update in &self.updates {
            if updates.send(update.clone()).await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::TurnMessage;

    #[tokio::test]
    async fn scripted_driver_replays_updates_in_order() {
        let snapshot = ConversationSnapshot::new(vec![TurnMessage::user("hi")]);
        let driver = ScriptedDriver::new(vec![
            TurnUpdate::Snapshot(snapshot.clone()),
            TurnUpdate::Failed("boom".to_string()),
        ]);

        let (tx, mut rx) = mpsc::channel(8);
        driver.run_turn("thread-1", "hi", tx).await;

        assert_eq!(rx.recv().await, Some(TurnUpdate::Snapshot(snapshot)));
        assert_eq!(rx.recv().await, Some(TurnUpdate::Failed("boom".to_string())));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn scripted_driver_stops_when_receiver_drops() {
        let snapshot = ConversationSnapshot::new(vec![TurnMessage::user("hi")]);
        let driver = ScriptedDriver::new(vec![
            TurnUpdate::Snapshot(snapshot.clone()),
            TurnUpdate::Snapshot(snapshot),
        ]);

        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        // Must return promptly instead of waiting on a dead channel.
        driver.run_turn("thread-1", "hi", tx).await;
    }
}
