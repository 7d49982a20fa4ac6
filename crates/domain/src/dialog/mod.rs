//! Dialog domain types: messages, appeals and pagination

mod appeal;
mod message;
mod page;

pub use appeal::{Appeal, AppealPatch, Chat};
pub use message::{DeliveryStatus, DialogMessage, SendMessage, Sender, SenderKind, ServerMessage};
pub use page::{DEFAULT_PAGE_LIMIT, Page, PageRequest};
