pub mod message;
pub mod session;
pub mod store;
pub mod turn;

pub use message::{Message, MessageId, MessageStatus, Role};
pub use session::Session;
pub use store::{MessageStore, StoreView};
pub use turn::{
    TurnController, TurnHandle, TurnId, TurnOutcome, TurnSettings, TurnState, CANCELLED_NOTICE,
    EMPTY_ANSWER_PLACEHOLDER,
};
