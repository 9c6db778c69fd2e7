use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::watch;

use super::frontend::{FrontendAdapter, SessionView, UserInputEvent};
use crate::state::Session;

const FRAME_INTERVAL: Duration = Duration::from_millis(16);
const QUIT_HINT: &str = "[press Ctrl+C again to exit]";

/// Drives a [`Session`] from frontend input and redraws on every store change.
///
/// Questions submitted while a turn is streaming wait in a queue so that
/// piped input is answered one question at a time.
pub struct Runtime {
    session: Session,
    revisions: watch::Receiver<u64>,
    queued: VecDeque<String>,
    notice: Option<String>,
    pending_quit: bool,
    quit_requested: bool,
    input_closed: bool,
    last_active: bool,
}

impl Runtime {
    pub fn new(session: Session) -> Self {
        let revisions = session.store().subscribe();
        Self {
            session,
            revisions,
            queued: VecDeque::new(),
            notice: None,
            pending_quit: false,
            quit_requested: false,
            input_closed: false,
            last_active: false,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            messages: self.session.store().snapshot(),
            active: self.session.is_active(),
            turn_state: self.session.active_state(),
            queued: self.queued.len(),
            notice: self.notice.clone(),
        }
    }

    pub async fn handle_input(&mut self, event: UserInputEvent) {
        match event {
            UserInputEvent::Question(text) => {
                self.pending_quit = false;
                self.notice = None;
                if text.trim().is_empty() {
                    return;
                }
                self.queued.push_back(text);
                self.dispatch_queued().await;
            }
            UserInputEvent::Interrupt => self.on_interrupt(),
            UserInputEvent::EndOfInput => self.input_closed = true,
            UserInputEvent::Quit => self.quit_requested = true,
        }
    }

    fn on_interrupt(&mut self) {
        if self.session.cancel_active() {
            self.pending_quit = false;
            self.notice = None;
            return;
        }
        if self.pending_quit {
            self.quit_requested = true;
        } else {
            self.pending_quit = true;
            self.notice = Some(QUIT_HINT.to_string());
        }
    }

    async fn dispatch_queued(&mut self) {
        self.session.reap().await;
        if self.session.is_active() {
            return;
        }
        while let Some(question) = self.queued.pop_front() {
            match self.session.start_turn(&question).await {
                Ok(_) => return,
                Err(error) => tracing::debug!(%error, "question rejected"),
            }
        }
    }

    fn is_idle(&self) -> bool {
        !self.session.is_active() && self.queued.is_empty()
    }

    pub async fn run<F: FrontendAdapter>(&mut self, frontend: &mut F) {
        let mut ticker = tokio::time::interval(FRAME_INTERVAL);
        frontend.render(&self.view());

        loop {
            ticker.tick().await;

            let mut dirty = false;
            while let Some(event) = frontend.poll_user_input() {
                self.handle_input(event).await;
                dirty = true;
            }
            self.dispatch_queued().await;

            let active = self.session.is_active();
            if active != self.last_active {
                self.last_active = active;
                dirty = true;
            }
            if self.revisions.has_changed().unwrap_or(false) {
                self.revisions.borrow_and_update();
                dirty = true;
            }
            if dirty {
                frontend.render(&self.view());
            }

            let drained = self.input_closed && self.is_idle();
            if self.quit_requested || frontend.should_quit() || drained {
                break;
            }
        }

        self.queued.clear();
        self.session.shutdown().await;
        frontend.render(&self.view());
    }
}
