/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Session gate checked once before the shell starts.

use std::fmt;

use log::{info, warn};
use serde::Deserialize;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl UserInfo {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or("User")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Authenticated(UserInfo),
    LoginRequired { redirect: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    InvalidEndpoint(String),
    Transport(String),
    Decode(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEndpoint(message) => write!(f, "invalid auth endpoint: {message}"),
            Self::Transport(message) => write!(f, "session check failed: {message}"),
            Self::Decode(message) => write!(f, "session response is not valid JSON: {message}"),
        }
    }
}

impl std::error::Error for AuthError {}

/// Classify a `/api/auth/user` response.
pub(crate) fn session_from_response(
    status: u16,
    body: &str,
    login_page: &str,
) -> Result<SessionState, AuthError> {
    if !(200..300).contains(&status) {
        return Ok(SessionState::LoginRequired {
            redirect: login_page.to_owned(),
        });
    }
    serde_json::from_str::<UserInfo>(body)
        .map(SessionState::Authenticated)
        .map_err(|err| AuthError::Decode(err.to_string()))
}

pub async fn check_session(
    client: &reqwest::Client,
    base: &Url,
    endpoint: &str,
    login_page: &str,
) -> Result<SessionState, AuthError> {
    let url = base
        .join(endpoint)
        .map_err(|err| AuthError::InvalidEndpoint(err.to_string()))?;
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|err| AuthError::Transport(err.to_string()))?;
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|err| AuthError::Transport(err.to_string()))?;

    let session = session_from_response(status, &body, login_page)?;
    match &session {
        SessionState::Authenticated(user) => info!("session active for {}", user.display_name()),
        SessionState::LoginRequired { redirect } => {
            warn!("no active session (HTTP {status}); login at {redirect}")
        },
    }
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_parses_user() {
        let session =
            session_from_response(200, r#"{"username":"kim","name":"Kim","role":"ADMIN"}"#, "/login")
                .unwrap();
        let SessionState::Authenticated(user) = session else {
            panic!("expected an authenticated session");
        };
        assert_eq!(user.display_name(), "Kim");
        assert_eq!(user.role.as_deref(), Some("ADMIN"));
    }

    #[test]
    fn test_unauthorized_redirects_to_login() {
        assert_eq!(
            session_from_response(401, "", "/login.html").unwrap(),
            SessionState::LoginRequired {
                redirect: "/login.html".into()
            }
        );
    }

    #[test]
    fn test_garbage_body_is_a_decode_error() {
        assert!(matches!(
            session_from_response(200, "<html>", "/login"),
            Err(AuthError::Decode(_))
        ));
    }
}
