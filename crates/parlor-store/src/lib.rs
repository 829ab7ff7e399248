// ABOUTME: Persistence layer for parlor: the SQLite-backed message collection.
// ABOUTME: Provides schema migrations, the CRUD store, and the collection capability trait.

pub mod collection;
pub mod error;
pub mod messages;
pub mod schema;

pub use collection::MessageCollection;
pub use error::{StoreError, UnavailableCause};
pub use messages::MessageStore;
pub use schema::{ensure_schema, latest_version};
