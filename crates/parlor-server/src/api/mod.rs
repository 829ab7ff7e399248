// ABOUTME: API module containing all HTTP handler functions for the parlor REST API.
// ABOUTME: Organized into sub-modules for message CRUD and the change stream.

pub mod messages;
pub mod stream;
