use std::sync::{RwLock, RwLockReadGuard};

use anyhow::Result;
use chrono::{DateTime, Duration, TimeZone, Utc};
use reqwest::header::{self, HeaderMap, HeaderValue};
use tracing::{debug, warn};

use super::session::{is_past, SessionData, UserProfile};
use super::storage::{SessionStorage, StoredSession};
use super::token;

/// Margin applied to the expiry instant when checking for expiry.
pub const DEFAULT_LEEWAY_SECS: i64 = 30;

/// Lifetime assumed for tokens whose expiry cannot be decoded (2 hours).
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 7200;

/// Single source of truth for who the caller is signed in as.
///
/// Holds an in-memory copy of the stored triple; writes go to the backing
/// storage first and only then replace the copy, under one lock, so the
/// token, profile and expiry always change together. All reads are total:
/// anything that fails to decode reads as absent.
pub struct CredentialStore {
    storage: Box<dyn SessionStorage>,
    current: RwLock<StoredSession>,
    leeway_secs: i64,
    token_lifetime_secs: i64,
}

impl CredentialStore {
    /// Open a store, loading whatever session the storage already holds.
    pub fn new(storage: impl SessionStorage + 'static) -> Self {
        let current = match storage.load() {
            Ok(record) => record.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable stored session");
                StoredSession::default()
            }
        };
        debug!(has_token = current.token.is_some(), "Credential store opened");

        Self {
            storage: Box::new(storage),
            current: RwLock::new(current),
            leeway_secs: DEFAULT_LEEWAY_SECS,
            token_lifetime_secs: DEFAULT_TOKEN_LIFETIME_SECS,
        }
    }

    pub fn with_leeway(mut self, leeway_secs: i64) -> Self {
        self.leeway_secs = leeway_secs;
        self
    }

    pub fn with_token_lifetime(mut self, lifetime_secs: i64) -> Self {
        self.token_lifetime_secs = lifetime_secs;
        self
    }

    pub fn leeway_secs(&self) -> i64 {
        self.leeway_secs
    }

    /// Save a new session. The expiry comes from the token's `exp` claim,
    /// or `now + fallback_lifetime_secs` (store default when `None`) if the
    /// token cannot be decoded.
    pub fn save(
        &self,
        token: &str,
        user: &UserProfile,
        fallback_lifetime_secs: Option<i64>,
    ) -> Result<()> {
        let expires_at = token::decode_expiry(token).unwrap_or_else(|| {
            let lifetime = fallback_lifetime_secs.unwrap_or(self.token_lifetime_secs);
            debug!(lifetime_secs = lifetime, "Token expiry not decodable, using fallback lifetime");
            self.expiry_after(lifetime, Utc::now())
        });
        self.save_with_expiry(token, user, expires_at)
    }

    /// `now + lifetime_secs`. A lifetime outside chrono's range falls back
    /// to the store default, which saturates at the representable bounds.
    fn expiry_after(&self, lifetime_secs: i64, now: DateTime<Utc>) -> DateTime<Utc> {
        if let Some(at) = offset_by(now, lifetime_secs) {
            return at;
        }
        warn!(
            lifetime_secs,
            default_secs = self.token_lifetime_secs,
            "Token lifetime out of range, using the default lifetime"
        );
        offset_by(now, self.token_lifetime_secs).unwrap_or(if self.token_lifetime_secs > 0 {
            DateTime::<Utc>::MAX_UTC
        } else {
            DateTime::<Utc>::MIN_UTC
        })
    }

    /// Save a new session with an explicit expiry instant.
    pub fn save_with_expiry(
        &self,
        token: &str,
        user: &UserProfile,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let record = StoredSession {
            token: Some(token.to_string()),
            user: Some(serde_json::to_string(user)?),
            expires_at: Some(expires_at.timestamp_millis().to_string()),
        };

        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        self.storage.store(&record)?;
        *current = record;

        debug!(user_id = user.id, expires_at = %expires_at, "Session saved");
        Ok(())
    }

    pub fn token(&self) -> Option<String> {
        self.read().token.clone()
    }

    pub fn user_profile(&self) -> Option<UserProfile> {
        let raw = self.read().user.clone()?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "Stored user profile is unreadable");
                None
            }
        }
    }

    /// Expiry in epoch milliseconds.
    pub fn expiry(&self) -> Option<i64> {
        self.read().expires_at.as_deref()?.trim().parse().ok()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.expiry()?).single()
    }

    /// Whether the recorded expiry lies `leeway_secs` or more in the past.
    ///
    /// A store with no recorded expiry is never expired.
    pub fn is_expired(&self, leeway_secs: i64) -> bool {
        match self.expires_at() {
            Some(expires_at) => is_past(expires_at, leeway_secs, Utc::now()),
            None => false,
        }
    }

    /// Remove token, profile and expiry together.
    ///
    /// The in-memory session is dropped even when the storage cannot be
    /// cleaned up; the storage error is still returned.
    pub fn clear(&self) -> Result<()> {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = StoredSession::default();
        debug!("Session cleared");
        self.storage.remove()
    }

    pub fn is_logged_in(&self) -> bool {
        let has_token = self.read().token.is_some();
        has_token && !self.is_expired(self.leeway_secs)
    }

    /// `Authorization: Bearer <token>` when logged in, otherwise empty.
    pub fn auth_header(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if !self.is_logged_in() {
            return headers;
        }
        if let Some(token) = self.token() {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => {
                    headers.insert(header::AUTHORIZATION, value);
                }
                Err(_) => warn!("Stored token is not a valid header value"),
            }
        }
        headers
    }

    /// The whole session, if every part of it decodes.
    pub fn session(&self) -> Option<SessionData> {
        Some(SessionData {
            token: self.token()?,
            user: self.user_profile()?,
            expires_at: self.expires_at()?,
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, StoredSession> {
        self.current.read().unwrap_or_else(|e| e.into_inner())
    }
}

fn offset_by(now: DateTime<Utc>, secs: i64) -> Option<DateTime<Utc>> {
    now.checked_add_signed(Duration::try_seconds(secs)?)
}
