pub mod api;
pub mod config;
pub mod error;
pub mod runtime;
pub mod state;
pub mod util;

#[cfg(test)]
mod test_support;

pub use config::{Config, ResponseMode};
pub use error::{RequestError, StreamError, TurnError};
pub use state::{Message, MessageStore, Session, TurnState};
