use reqwest::Method;
use serde_json::Value;
use shared::{
    domain::UserRole,
    protocol::{AuthMeResponse, AuthUser},
};
use tracing::{debug, info};

use crate::{error::ClientResult, pagination::unwrap_envelope, ApiClient};

/// Outcome of a session lookup. A missing session is a state, not an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurrentUser {
    pub user: Option<AuthUser>,
    pub unauthorized: bool,
}

impl CurrentUser {
    pub fn role(&self) -> Option<UserRole> {
        self.user.as_ref().map(|user| user.role)
    }
}

impl ApiClient {
    /// `GET /auth/me`. Never fails: 401 marks the result unauthorized and any
    /// other failure yields an anonymous result.
    pub async fn fetch_current_user(&self) -> CurrentUser {
        match self.try_fetch_current_user().await {
            Ok(user) => CurrentUser {
                user,
                unauthorized: false,
            },
            Err(err) if err.is_unauthorized() => CurrentUser {
                user: None,
                unauthorized: true,
            },
            Err(err) => {
                debug!(error = %err, "current user lookup failed");
                CurrentUser::default()
            }
        }
    }

    async fn try_fetch_current_user(&self) -> ClientResult<Option<AuthUser>> {
        let payload: Value = self
            .get_json(&["auth", "me"], &[] as &[(&str, &str)])
            .await?;
        let body: AuthMeResponse = serde_json::from_value(unwrap_envelope(payload)?)?;
        Ok(body.user)
    }

    pub async fn logout(&self) -> ClientResult<()> {
        self.send_empty(Method::POST, &["auth", "logout"]).await?;
        info!("session closed");
        Ok(())
    }
}
