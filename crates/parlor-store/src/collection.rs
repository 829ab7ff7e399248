// ABOUTME: The capability contract the synchronization layer uses to reach stored messages.
// ABOUTME: Exactly five blocking operations: read all, read one, create, update, delete.

use parlor_core::{Message, MessageId, NewMessage};

use crate::error::StoreError;

/// CRUD access to the message collection. Implementations must be safe to
/// call from several threads at once; every call blocks until storage
/// has finished and affects at most one message.
pub trait MessageCollection: Send + Sync {
    /// Every stored message, in ascending id order.
    fn read_all(&self) -> Result<Vec<Message>, StoreError>;

    /// The message with `id`, or `StoreError::NotFound`.
    fn read_one(&self, id: MessageId) -> Result<Message, StoreError>;

    /// Persist `new` and return it with its freshly assigned id. The id is
    /// addressable by the time this returns.
    fn create(&self, new: NewMessage) -> Result<Message, StoreError>;

    /// Overwrite the text of `message.id`. Other fields are ignored.
    /// An id that does not exist is a successful no-op.
    fn update(&self, message: &Message) -> Result<(), StoreError>;

    /// Remove `id`. An id that does not exist is a successful no-op.
    fn delete(&self, id: MessageId) -> Result<(), StoreError>;
}
