use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Role granted to an account by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Evaluator,
    Responsible,
}

impl Role {
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Admin => "Administrator",
            Role::Evaluator => "Evaluator",
            Role::Responsible => "Area responsible",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub full_name: String,
    pub role: Role,
}

impl UserProfile {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// A fully decoded session: token, profile and expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionData {
    pub token: String,
    pub user: UserProfile,
    pub expires_at: DateTime<Utc>,
}

impl SessionData {
    /// Expired once the expiry instant lies `leeway_secs` or more in the past.
    pub fn is_expired(&self, leeway_secs: i64) -> bool {
        is_past(self.expires_at, leeway_secs, Utc::now())
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.expires_at - Utc::now()
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        self.time_until_expiry().num_minutes().max(0)
    }
}

pub(crate) fn is_past(expires_at: DateTime<Utc>, leeway_secs: i64, now: DateTime<Utc>) -> bool {
    match Duration::try_seconds(leeway_secs).and_then(|leeway| now.checked_sub_signed(leeway)) {
        Some(cutoff) => expires_at <= cutoff,
        // Cutoff beyond the representable range: before every instant when
        // the leeway is positive, after every instant when it is negative
        None => leeway_secs < 0,
    }
}
