//! Data models shared by the session server and the client hook.

/// Access code registry rows and redeem results
pub mod access_code;
/// Access session rows and their public view
pub mod access_session;
/// Endpoint request/response contract
pub mod wire;
