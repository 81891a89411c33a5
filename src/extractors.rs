use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Redirect, Response};

use crate::auth::session;
use crate::blog::UserId;
use crate::error::AppError;
use crate::state::AppState;

/// Represents the currently authenticated user.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
}

impl CurrentUser {
    pub fn user_id(&self) -> UserId {
        UserId::new(&self.id)
    }
}

/// Rejection for pages that need a signed-in user.
#[derive(Debug)]
pub enum AuthRejection {
    /// Send the browser to the login page, then back to `next`.
    Login { next: String },
    Error(AppError),
}

impl AuthRejection {
    pub fn login_url(next: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
        format!("/auth/login/?next={}", encoded)
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            AuthRejection::Login { next } => Redirect::to(&Self::login_url(&next)).into_response(),
            AuthRejection::Error(e) => e.into_response(),
        }
    }
}

/// Extractor that requires authentication.
/// Without a valid session the request is redirected to the login page.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let next = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());

        match lookup_user(parts, state).map_err(AuthRejection::Error)? {
            Some(user) => Ok(user),
            None => {
                tracing::debug!("Anonymous request to {}, redirecting to login", next);
                Err(AuthRejection::Login { next })
            }
        }
    }
}

/// Optional user extractor. Anonymous requests get `None` instead of a redirect.
pub struct MaybeUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match lookup_user(parts, state) {
            Ok(user) => Ok(MaybeUser(user)),
            Err(e) => {
                tracing::warn!("Session lookup failed, treating as anonymous: {}", e);
                Ok(MaybeUser(None))
            }
        }
    }
}

fn lookup_user(parts: &Parts, state: &AppState) -> Result<Option<CurrentUser>, AppError> {
    let Some(token) = cookie_value(&parts.headers, &state.config.auth.cookie_name) else {
        return Ok(None);
    };

    let user = session::find_session_user(&state.db, token)?;
    Ok(user.map(|u| CurrentUser {
        id: u.id,
        username: u.username,
    }))
}

/// Read one cookie from the request headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name {
                Some(val)
            } else {
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_value_finds_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            "theme=dark; yatube_session=abc123; other=1".parse().unwrap(),
        );
        assert_eq!(cookie_value(&headers, "yatube_session"), Some("abc123"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn login_url_encodes_next() {
        assert_eq!(
            AuthRejection::login_url("/create/"),
            "/auth/login/?next=%2Fcreate%2F"
        );
        assert_eq!(
            AuthRejection::login_url("/follow/?page=2"),
            "/auth/login/?next=%2Ffollow%2F%3Fpage%3D2"
        );
    }
}
