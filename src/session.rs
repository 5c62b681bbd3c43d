use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use time::Duration;
use tower_cookies::{Cookie, Cookies, cookie::SameSite};
use utoipa::ToSchema;

use crate::error::ApiError;

pub const AUTH_COOKIE: &str = "auth";

const SESSION_TTL: Duration = Duration::days(7);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Employee => "employee",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrgSession {
    pub id: i64,
    pub role: Role,
    #[serde(default)]
    pub ai_enabled: bool,
}

/// Client-held session snapshot, serialized as JSON into the `auth`
/// cookie. Reconstructed per request and never mutated in place; actions
/// that change identity, role or organisation reissue the cookie.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub user_id: i64,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub is_logged_in: bool,
    #[serde(default)]
    pub has_completed_onboarding: bool,
    #[serde(default)]
    pub organisation: Option<OrgSession>,
}

impl SessionUser {
    pub fn from_cookies(cookies: &Cookies) -> Result<Self, ApiError> {
        let cookie = cookies.get(AUTH_COOKIE).ok_or(ApiError::Unauthorized)?;
        let session: SessionUser =
            serde_json::from_str(cookie.value()).map_err(|_| ApiError::Unauthorized)?;
        if !session.is_logged_in {
            return Err(ApiError::Unauthorized);
        }
        Ok(session)
    }

    /// Write this snapshot back into the auth cookie.
    pub fn issue(&self, cookies: &Cookies) {
        let value = serde_json::to_string(self).expect("session serializes");
        let mut cookie = Cookie::new(AUTH_COOKIE, value);
        cookie.set_http_only(true);
        cookie.set_same_site(SameSite::Lax);
        cookie.set_path("/");
        cookie.set_max_age(SESSION_TTL);
        cookies.add(cookie);
    }

    pub fn clear(cookies: &Cookies) {
        let mut cookie = Cookie::new(AUTH_COOKIE, "");
        cookie.set_path("/");
        cookies.remove(cookie);
    }

    pub fn org(&self) -> Result<&OrgSession, ApiError> {
        self.organisation.as_ref().ok_or(ApiError::Forbidden)
    }

    pub fn require_admin(&self) -> Result<&OrgSession, ApiError> {
        let org = self.org()?;
        if org.role != Role::Admin {
            return Err(ApiError::Forbidden);
        }
        Ok(org)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for SessionUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let cookies = Cookies::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::Unauthorized)?;
        Self::from_cookies(&cookies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_round_trips_through_json() {
        let session = SessionUser {
            user_id: 7,
            email: "amy@example.com".to_string(),
            firstname: "Amy".to_string(),
            lastname: "Ng".to_string(),
            is_logged_in: true,
            has_completed_onboarding: false,
            organisation: Some(OrgSession {
                id: 3,
                role: Role::Admin,
                ai_enabled: true,
            }),
        };
        let raw = serde_json::to_string(&session).unwrap();
        assert!(raw.contains("\"userId\":7"));
        assert!(raw.contains("\"role\":\"admin\""));
        let back: SessionUser = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.user_id, 7);
        assert_eq!(back.organisation.unwrap().role, Role::Admin);
    }

    #[test]
    fn missing_org_fields_default() {
        let raw = r#"{"userId":1,"email":"a@b.c","firstname":"","lastname":"","isLoggedIn":true}"#;
        let session: SessionUser = serde_json::from_str(raw).unwrap();
        assert!(session.organisation.is_none());
        assert!(!session.has_completed_onboarding);
    }
}
