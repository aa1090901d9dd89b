//! Client side of partner sessions.
//!
//! UI code (code-entry forms, module pages) talks to [`AccessSessionHook`]
//! and never sees the address binding or the server's invariants:
//! - [`SessionTransport`]: how the hook reaches the session endpoint
//! - [`SessionStorage`]: the local mirror used for instant reads and as a
//!   fallback when the endpoint is unreachable
//! - [`AccessSessionHook`]: cached session, countdown and public API

pub mod error;
pub mod hook;
pub mod storage;
pub mod transport;

pub use error::ClientError;
pub use hook::AccessSessionHook;
pub use storage::{FileStorage, MemoryStorage, SESSION_STORAGE_KEY, SessionStorage};
pub use transport::{HttpTransport, SessionTransport};
