use super::message::{Message, MessageId};
use super::store::MessageStore;
use crate::api::{ApiClient, DecodeMode, Utf8StreamDecoder};
use crate::config::ResponseMode;
use crate::error::{StreamError, TurnError};
use futures::StreamExt;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Appended to whatever was streamed when the user stops a turn.
pub const CANCELLED_NOTICE: &str = "\n\n[response stopped]";
/// Shown when a whole-response reply carries no `answer`.
pub const EMPTY_ANSWER_PLACEHOLDER: &str = "(the answer was empty)";

pub type TurnId = u64;

pub fn error_notice(error: &TurnError) -> String {
    format!("An error occurred: {error}")
}

/// Close out a reply whose turn task exited without reaching a terminal state.
pub(crate) fn settle_abandoned(
    store: &MessageStore,
    assistant_message: MessageId,
    error: &TurnError,
) {
    let notice = error_notice(error);
    store.update_content(assistant_message, |_| notice);
    store.settle(assistant_message);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Created,
    Requesting,
    Streaming,
    Completed,
    Cancelled,
    Errored,
}

impl TurnState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TurnState::Completed | TurnState::Cancelled | TurnState::Errored
        )
    }

    fn can_advance_to(self, next: TurnState) -> bool {
        use TurnState::*;
        matches!(
            (self, next),
            (Created, Requesting)
                | (Requesting, Streaming)
                | (Streaming, Completed)
                | (Requesting | Streaming, Cancelled | Errored)
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            TurnState::Created => "created",
            TurnState::Requesting => "requesting",
            TurnState::Streaming => "streaming",
            TurnState::Completed => "completed",
            TurnState::Cancelled => "cancelled",
            TurnState::Errored => "errored",
        }
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TurnSettings {
    pub response_mode: ResponseMode,
    pub decode_mode: DecodeMode,
}

/// The part of a running turn that other tasks may hold on to.
#[derive(Clone)]
pub struct TurnHandle {
    id: TurnId,
    cancel: CancellationToken,
    state: watch::Receiver<TurnState>,
}

impl TurnHandle {
    pub fn id(&self) -> TurnId {
        self.id
    }

    /// Request cancellation. Safe to call any number of times, including
    /// after the turn has finished.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn state(&self) -> TurnState {
        *self.state.borrow()
    }

    pub async fn wait_terminal(&mut self) -> TurnState {
        let reached = self
            .state
            .wait_for(|state| state.is_terminal())
            .await
            .map(|state| *state);
        match reached {
            Ok(state) => state,
            Err(_) => *self.state.borrow(),
        }
    }
}

#[derive(Debug)]
pub struct TurnOutcome {
    pub turn_id: TurnId,
    pub state: TurnState,
    pub user_message: MessageId,
    pub assistant_message: MessageId,
    pub error: Option<TurnError>,
}

enum Ending {
    Completed,
    Cancelled,
}

/// Drives one question/answer exchange from submission to a terminal state.
pub struct TurnController {
    id: TurnId,
    question: String,
    store: MessageStore,
    client: Arc<ApiClient>,
    settings: TurnSettings,
    user_message: MessageId,
    assistant_message: MessageId,
    cancel: CancellationToken,
    state: watch::Sender<TurnState>,
}

impl TurnController {
    /// Validate the question and append the user message plus an empty
    /// assistant placeholder. Nothing touches the network until [`run`].
    ///
    /// [`run`]: TurnController::run
    pub fn begin(
        id: TurnId,
        question: &str,
        store: MessageStore,
        client: Arc<ApiClient>,
        settings: TurnSettings,
    ) -> Result<Self, TurnError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(TurnError::Validation);
        }

        let (state, _) = watch::channel(TurnState::Created);
        let user_message = store.append(Message::user(question));
        let assistant_message = store.append(Message::assistant_placeholder());

        let controller = Self {
            id,
            question: question.to_string(),
            store,
            client,
            settings,
            user_message,
            assistant_message,
            cancel: CancellationToken::new(),
            state,
        };
        controller.transition(TurnState::Requesting);
        Ok(controller)
    }

    pub fn id(&self) -> TurnId {
        self.id
    }

    pub fn user_message(&self) -> MessageId {
        self.user_message
    }

    pub fn assistant_message(&self) -> MessageId {
        self.assistant_message
    }

    pub fn state(&self) -> TurnState {
        *self.state.borrow()
    }

    pub fn handle(&self) -> TurnHandle {
        TurnHandle {
            id: self.id,
            cancel: self.cancel.clone(),
            state: self.state.subscribe(),
        }
    }

    pub async fn run(self) -> TurnOutcome {
        let result = match self.settings.response_mode {
            ResponseMode::Streaming => self.stream_reply().await,
            ResponseMode::Whole => self.whole_reply().await,
        };
        self.finish(result)
    }

    async fn stream_reply(&self) -> Result<Ending, TurnError> {
        let mut stream = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(Ending::Cancelled),
            opened = self.client.open_stream(&self.question) => opened?,
        };
        self.transition(TurnState::Streaming);

        let mut decoder = Utf8StreamDecoder::with_mode(self.settings.decode_mode);
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.apply_fragment(&decoder.flush());
                    return Ok(Ending::Cancelled);
                }
                next = stream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    let fragment = decoder.push(&chunk).map_err(StreamError::from)?;
                    self.apply_fragment(&fragment);
                }
                Some(Err(error)) => return Err(error.into()),
                None => {
                    self.apply_fragment(&decoder.flush());
                    return Ok(Ending::Completed);
                }
            }
        }
    }

    async fn whole_reply(&self) -> Result<Ending, TurnError> {
        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(Ending::Cancelled),
            response = self.client.ask(&self.question) => response?,
        };
        self.transition(TurnState::Streaming);

        let answer = response
            .answer
            .unwrap_or_else(|| EMPTY_ANSWER_PLACEHOLDER.to_string());
        self.apply_fragment(&answer);
        Ok(Ending::Completed)
    }

    fn apply_fragment(&self, fragment: &str) {
        if fragment.is_empty() {
            return;
        }
        self.store.update_content(self.assistant_message, |content| {
            let mut next = String::with_capacity(content.len() + fragment.len());
            next.push_str(content);
            next.push_str(fragment);
            next
        });
    }

    fn finish(self, result: Result<Ending, TurnError>) -> TurnOutcome {
        let (state, error) = match result {
            Ok(Ending::Completed) => (TurnState::Completed, None),
            Ok(Ending::Cancelled) => {
                self.apply_fragment(CANCELLED_NOTICE);
                (TurnState::Cancelled, None)
            }
            Err(error) => {
                // Partial output is replaced by the notice.
                let notice = error_notice(&error);
                self.store.update_content(self.assistant_message, |_| notice);
                tracing::warn!(turn = self.id, %error, "turn failed");
                (TurnState::Errored, Some(error))
            }
        };

        self.store.settle(self.assistant_message);
        self.transition(state);

        TurnOutcome {
            turn_id: self.id,
            state,
            user_message: self.user_message,
            assistant_message: self.assistant_message,
            error,
        }
    }

    fn transition(&self, next: TurnState) {
        let previous = self.state();
        debug_assert!(
            previous.can_advance_to(next),
            "invalid turn transition {previous} -> {next}"
        );
        self.state.send_replace(next);
        tracing::debug!(turn = self.id, from = %previous, to = %next, "turn state");
    }
}
