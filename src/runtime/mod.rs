pub mod frontend;
pub mod r#loop;

pub use frontend::{FrontendAdapter, SessionView, UserInputEvent};
pub use r#loop::Runtime;
