//! Sign-in endpoints. These are the only calls that create or destroy the
//! stored session on purpose.

use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::auth::UserProfile;

use super::{ApiClient, ApiError, Method, RequestOptions};

const LOGIN_PATH: &str = "/auth/login";
const RESET_PASSWORD_PATH: &str = "/auth/reset-password";
const LOGOUT_PATH: &str = "/auth/logout";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    #[serde(default, alias = "accessToken", alias = "access_token")]
    token: Option<String>,
    #[serde(default)]
    user: Option<UserProfile>,
    /// Token lifetime in seconds, used when the token carries no `exp`
    #[serde(default, alias = "expires_in")]
    expires_in: Option<i64>,
}

impl ApiClient {
    /// Sign in and store the new session.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, ApiError> {
        let options = RequestOptions::new()
            .method(Method::POST)
            .json(json!({ "email": email, "password": password }))
            .without_session();

        let response: AuthResponse = self
            .request_as(LOGIN_PATH, options)
            .await?
            .unwrap_or_default();

        match self.store_session(response)? {
            Some(user) => {
                info!(user_id = user.id, role = ?user.role, "Signed in");
                Ok(user)
            }
            None => Err(ApiError::InvalidResponse(
                "Login response is missing the token or user".to_string(),
            )),
        }
    }

    /// Complete a password reset. When the server signs the user straight
    /// in, the new session is stored and its profile returned.
    pub async fn reset_password(
        &self,
        reset_token: &str,
        new_password: &str,
    ) -> Result<Option<UserProfile>, ApiError> {
        let options = RequestOptions::new()
            .method(Method::POST)
            .json(json!({ "token": reset_token, "password": new_password }))
            .without_session();

        let response: AuthResponse = self
            .request_as(RESET_PASSWORD_PATH, options)
            .await?
            .unwrap_or_default();

        let user = self.store_session(response)?;
        if let Some(ref user) = user {
            info!(user_id = user.id, "Password reset, signed in");
        }
        Ok(user)
    }

    /// Tell the server we are leaving, then drop the session regardless of
    /// how that went.
    pub async fn logout(&self) {
        if self.store().is_logged_in() {
            let options = RequestOptions::new().method(Method::POST);
            if let Err(e) = self.request(LOGOUT_PATH, options).await {
                warn!(error = %e, "Logout request failed, clearing session anyway");
            }
        }

        if let Err(e) = self.store().clear() {
            warn!(error = %e, "Failed to remove stored session");
        }
        info!("Signed out");
    }

    /// Save the session carried by an auth response. `Ok(None)` when the
    /// response has no complete session in it.
    fn store_session(&self, response: AuthResponse) -> Result<Option<UserProfile>, ApiError> {
        let (token, user) = match (response.token, response.user) {
            (Some(token), Some(user)) if !token.is_empty() => (token, user),
            _ => return Ok(None),
        };

        self.store()
            .save(&token, &user, response.expires_in)
            .map_err(|e| ApiError::Storage(format!("{:#}", e)))?;
        Ok(Some(user))
    }
}
