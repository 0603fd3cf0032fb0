pub mod error;
pub mod interrupt;
pub mod message;
pub mod state;
pub mod thread;

pub use error::Error;
pub use interrupt::PendingInterrupt;
pub use message::{Message, MessageKind, Role, ToolCallRequest, ToolCallResponse};
pub use state::ConversationState;
pub use thread::ThreadId;
