use super::message::MessageId;
use super::store::{MessageStore, StoreView};
use super::turn::{
    settle_abandoned, TurnController, TurnHandle, TurnId, TurnOutcome, TurnSettings, TurnState,
};
use crate::api::ApiClient;
use crate::config::Config;
use crate::error::{StreamError, TurnError};
use anyhow::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;

struct ActiveTurn {
    handle: TurnHandle,
    assistant_message: MessageId,
    task: JoinHandle<TurnOutcome>,
}

/// Conversation-level owner of the message log and of the single turn that
/// may be in flight at any time.
pub struct Session {
    store: MessageStore,
    client: Arc<ApiClient>,
    settings: TurnSettings,
    next_turn_id: TurnId,
    active: Option<ActiveTurn>,
    last_finished: Option<(TurnId, TurnState)>,
}

impl Session {
    pub fn new(client: ApiClient, settings: TurnSettings) -> Self {
        Self {
            store: MessageStore::new(),
            client: Arc::new(client),
            settings,
            next_turn_id: 1,
            active: None,
            last_finished: None,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = ApiClient::new(config)?;
        Ok(Self::new(
            client,
            TurnSettings {
                response_mode: config.response_mode,
                decode_mode: config.decode_mode,
            },
        ))
    }

    /// Read-only view of the conversation for renderers.
    pub fn store(&self) -> StoreView {
        self.store.view()
    }

    /// Start a new turn for `question`.
    ///
    /// An in-flight turn is cancelled and awaited first, so its terminal
    /// state is reached before the new user message is appended. A blank
    /// question is rejected without touching the log or the active turn.
    pub async fn start_turn(&mut self, question: &str) -> Result<TurnId, TurnError> {
        if question.trim().is_empty() {
            return Err(TurnError::Validation);
        }

        if let Some(previous) = self.active.take() {
            previous.handle.cancel();
            self.settle(previous).await;
        }

        let turn_id = self.next_turn_id;
        let controller = TurnController::begin(
            turn_id,
            question,
            self.store.clone(),
            Arc::clone(&self.client),
            self.settings,
        )?;
        self.next_turn_id += 1;
        tracing::info!(turn = turn_id, mode = ?self.settings.response_mode, "turn started");

        self.active = Some(ActiveTurn {
            handle: controller.handle(),
            assistant_message: controller.assistant_message(),
            task: tokio::spawn(controller.run()),
        });
        Ok(turn_id)
    }

    /// Signal the in-flight turn to stop. Returns false when nothing was
    /// running or the turn is already stopping.
    pub fn cancel_active(&mut self) -> bool {
        match self.live_turn() {
            Some(active) if !active.handle.is_cancel_requested() => {
                tracing::info!(turn = active.handle.id(), "cancelling turn");
                active.handle.cancel();
                true
            }
            _ => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.live_turn().is_some()
    }

    pub fn active_state(&self) -> Option<TurnState> {
        self.live_turn().map(|active| active.handle.state())
    }

    pub fn active_turn(&self) -> Option<TurnId> {
        self.live_turn().map(|active| active.handle.id())
    }

    /// The held turn, unless it reached a terminal state or its task exited.
    fn live_turn(&self) -> Option<&ActiveTurn> {
        self.active
            .as_ref()
            .filter(|active| !active.task.is_finished() && !active.handle.state().is_terminal())
    }

    pub fn last_finished(&self) -> Option<(TurnId, TurnState)> {
        self.last_finished
    }

    /// Wait for the current turn to reach a terminal state and release it.
    pub async fn wait_active(&mut self) -> Option<TurnOutcome> {
        let active = self.active.take()?;
        self.settle(active).await
    }

    /// Drop the turn reference once it has finished on its own.
    pub async fn reap(&mut self) -> Option<TurnOutcome> {
        let finished = self
            .active
            .as_ref()
            .is_some_and(|active| active.task.is_finished());
        if !finished {
            return None;
        }
        self.wait_active().await
    }

    pub async fn shutdown(&mut self) {
        self.cancel_active();
        self.wait_active().await;
    }

    async fn settle(&mut self, active: ActiveTurn) -> Option<TurnOutcome> {
        let turn_id = active.handle.id();
        match active.task.await {
            Ok(outcome) => {
                tracing::info!(turn = turn_id, state = %outcome.state, "turn finished");
                self.last_finished = Some((turn_id, outcome.state));
                Some(outcome)
            }
            Err(join_error) => {
                // The turn task died without reaching a terminal state itself.
                tracing::error!(turn = turn_id, %join_error, "turn task failed");
                let error = TurnError::Stream(StreamError::Read(join_error.to_string()));
                settle_abandoned(&self.store, active.assistant_message, &error);
                self.last_finished = Some((turn_id, TurnState::Errored));
                None
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            active.handle.cancel();
        }
    }
}
