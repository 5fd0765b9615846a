//! Session authentication state.
//!
//! - [`session`]: [`SessionStore`] holding the signed-in user and bearer token
//! - [`storage`]: [`KeyValueStore`] persistence backends

pub mod session;
pub mod storage;

pub use session::{AuthState, Credential, Role, SessionStore, User};
pub use storage::{KeyValueStore, MemoryStorage};
