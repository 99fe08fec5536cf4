//! Core library for the Oh! SanSi olympiad platform client.
//!
//! - [`auth`]: credential store, session storage backends, token decoding
//! - [`api`]: the authenticated request gateway and auth endpoints
//! - [`config`]: client configuration

pub mod api;
pub mod auth;
pub mod config;

pub use api::{ApiClient, ApiError, ErrorKind, RequestOptions};
pub use auth::{CredentialStore, Role, SessionData, UserProfile};
pub use config::Config;
