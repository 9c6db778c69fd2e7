use anyhow::Result;
use askchat::api::logging::init_logging;
use askchat::config::Config;
use askchat::runtime::{FrontendAdapter, Runtime, SessionView, UserInputEvent};
use askchat::state::{Message, Role, Session};
use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

const QUIT_COMMANDS: [&str; 4] = ["/q", "/quit", "/exit", "quit"];

/// Turns successive snapshots of the conversation into append-only terminal
/// output.
#[derive(Default)]
struct TranscriptPrinter {
    next_index: usize,
    printed: String,
    header_printed: bool,
}

impl TranscriptPrinter {
    fn render_into(&mut self, messages: &[Message], out: &mut String) {
        while let Some(message) = messages.get(self.next_index) {
            if !self.header_printed {
                out.push_str(match message.role {
                    Role::User => "> ",
                    Role::Assistant => "",
                });
                self.header_printed = true;
            }

            match message.content.strip_prefix(self.printed.as_str()) {
                Some(suffix) => out.push_str(suffix),
                None => {
                    // Content was replaced (error notice); reprint it whole.
                    out.push('\n');
                    out.push_str(&message.content);
                }
            }
            self.printed.clone_from(&message.content);

            if message.is_pending() {
                break;
            }
            out.push_str(match message.role {
                Role::User => "\n",
                Role::Assistant => "\n\n",
            });
            self.next_index += 1;
            self.printed.clear();
            self.header_printed = false;
        }
    }
}

struct LineFrontend {
    input_rx: mpsc::UnboundedReceiver<UserInputEvent>,
    printer: TranscriptPrinter,
    last_notice: Option<String>,
    quit: bool,
    stdout_closed: bool,
}

impl LineFrontend {
    fn new() -> Self {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        spawn_stdin_reader(input_tx.clone());
        spawn_interrupt_listener(input_tx);
        Self {
            input_rx,
            printer: TranscriptPrinter::default(),
            last_notice: None,
            quit: false,
            stdout_closed: false,
        }
    }

    fn emit<W: Write>(&mut self, out: &str, writer: &mut W) {
        if out.is_empty() || self.stdout_closed {
            return;
        }
        let written = writer
            .write_all(out.as_bytes())
            .and_then(|()| writer.flush());
        if let Err(error) = written {
            tracing::warn!(%error, "stdout closed, stopping");
            self.stdout_closed = true;
            self.quit = true;
        }
    }
}

fn spawn_stdin_reader(input_tx: mpsc::UnboundedSender<UserInputEvent>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let event = match lines.next_line().await {
                Ok(Some(line)) if QUIT_COMMANDS.contains(&line.trim()) => UserInputEvent::Quit,
                Ok(Some(line)) => UserInputEvent::Question(line),
                Ok(None) => UserInputEvent::EndOfInput,
                Err(error) => {
                    tracing::warn!(%error, "stdin read failed");
                    UserInputEvent::EndOfInput
                }
            };
            let done = matches!(event, UserInputEvent::EndOfInput | UserInputEvent::Quit);
            if input_tx.send(event).is_err() || done {
                break;
            }
        }
    });
}

fn spawn_interrupt_listener(input_tx: mpsc::UnboundedSender<UserInputEvent>) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if input_tx.send(UserInputEvent::Interrupt).is_err() {
                break;
            }
        }
    });
}

impl FrontendAdapter for LineFrontend {
    fn poll_user_input(&mut self) -> Option<UserInputEvent> {
        match self.input_rx.try_recv() {
            Ok(event) => Some(event),
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                self.quit = true;
                None
            }
        }
    }

    fn render(&mut self, view: &SessionView) {
        let mut out = String::new();
        self.printer.render_into(&view.messages, &mut out);
        if view.notice != self.last_notice {
            if let Some(notice) = &view.notice {
                eprintln!("{notice}");
            }
            self.last_notice = view.notice.clone();
        }
        self.emit(&out, &mut io::stdout().lock());
    }

    fn should_quit(&self) -> bool {
        self.quit
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    config.validate()?;
    init_logging(config.log_path.as_ref())?;
    tracing::info!(api_url = %config.api_url, mode = ?config.response_mode, "starting");

    let session = Session::from_config(&config)?;
    let mut runtime = Runtime::new(session);
    let mut frontend = LineFrontend::new();
    runtime.run(&mut frontend).await;
    Ok(())
}
