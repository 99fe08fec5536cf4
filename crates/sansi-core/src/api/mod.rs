//! REST API module for the Oh! SanSi backend.
//!
//! This module provides the `ApiClient` gateway used for every backend
//! call, plus the sign-in endpoints that create and destroy sessions.
//!
//! The API uses bearer token authentication; the token comes from
//! `POST /api/auth/login` and is kept in the `CredentialStore`.

pub mod auth;
pub mod client;
pub mod error;

pub use client::{ApiClient, RequestOptions, DEFAULT_TIMEOUT_MS};
pub use error::{ApiError, ErrorKind};
pub use reqwest::Method;
