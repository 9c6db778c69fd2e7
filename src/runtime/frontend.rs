use crate::state::{Message, TurnState};

pub enum UserInputEvent {
    Question(String),
    Interrupt,
    /// Input source is exhausted; leave once queued questions are answered.
    EndOfInput,
    Quit,
}

/// What a frontend needs to draw one frame.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub messages: Vec<Message>,
    pub active: bool,
    pub turn_state: Option<TurnState>,
    pub queued: usize,
    pub notice: Option<String>,
}

pub trait FrontendAdapter {
    fn poll_user_input(&mut self) -> Option<UserInputEvent>;
    fn render(&mut self, view: &SessionView);
    fn should_quit(&self) -> bool;
}
