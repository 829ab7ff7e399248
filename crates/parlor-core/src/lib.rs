// ABOUTME: Core library for parlor, containing the message entity and change events.
// ABOUTME: This crate defines the shared data model used by the store and the server.

pub mod event;
pub mod message;

pub use event::ChangeEvent;
pub use message::{Message, MessageId, NewMessage};
