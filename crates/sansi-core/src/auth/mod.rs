//! Authentication module for managing the signed-in session.
//!
//! This module provides:
//! - `CredentialStore`: the token, user profile and expiry of the current session
//! - `SessionStorage`: durable backends for the session (file, OS keychain, memory)
//! - `token`: read-only decoding of the token's `exp` claim
//!
//! Tokens without a decodable expiry are assumed to live for 2 hours.

pub mod credentials;
pub mod session;
pub mod storage;
pub mod store;
pub mod token;

pub use credentials::KeyringStorage;
pub use session::{Role, SessionData, UserProfile};
pub use storage::{FileStorage, MemoryStorage, SessionStorage, StoredSession};
pub use store::{CredentialStore, DEFAULT_LEEWAY_SECS, DEFAULT_TOKEN_LIFETIME_SECS};
