pub mod client;
pub mod decoder;
pub mod logging;
#[cfg(test)]
pub mod mock_client;

pub use client::{AskRequest, AskResponse, ApiClient, ByteStream};
pub use decoder::{DecodeError, DecodeMode, Utf8StreamDecoder};
