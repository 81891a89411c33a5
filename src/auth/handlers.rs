use askama::Template;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;

use crate::auth::session;
use crate::blog::{FieldErrors, RepositoryError};
use crate::error::{AppError, AppResult};
use crate::extractors::{cookie_value, CurrentUser, MaybeUser};
use crate::routes::home::Html;
use crate::state::AppState;

const USERNAME_MAX: usize = 150;
const PASSWORD_MIN: usize = 8;

// -- Templates --

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub user: Option<CurrentUser>,
    pub username: String,
    pub next: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "pages/signup.html")]
pub struct SignupTemplate {
    pub user: Option<CurrentUser>,
    pub username: String,
    pub errors: FieldErrors,
}

// -- Request types --

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

// -- Cookie helpers --

fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        name, token, max_age_secs
    )
}

fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", name)
}

/// Only same-site absolute paths are accepted as a post-login target.
pub fn safe_next(next: Option<&str>) -> String {
    match next {
        Some(n) if n.starts_with('/') && !n.starts_with("//") && !n.contains('\\') => {
            n.to_string()
        }
        _ => "/".to_string(),
    }
}

/// Start a session and redirect, setting the session cookie.
fn login_response(state: &AppState, user_id: &str, target: &str) -> AppResult<Response> {
    let token = session::create_session(&state.db, user_id, state.config.auth.session_hours)?;
    let cookie = session_cookie(
        &state.config.auth.cookie_name,
        &token,
        state.config.auth.session_hours,
    );

    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Redirect::to(target),
    )
        .into_response())
}

fn validate_signup(form: &SignupForm) -> FieldErrors {
    let mut errors = FieldErrors::new();

    let username = form.username.trim();
    if username.is_empty() {
        errors.add("username", "This field is required.");
    } else if username.chars().count() > USERNAME_MAX {
        errors.add(
            "username",
            format!("Ensure this value has at most {USERNAME_MAX} characters."),
        );
    } else if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }

    if form.password1.chars().count() < PASSWORD_MIN {
        errors.add(
            "password1",
            format!("This password is too short. It must contain at least {PASSWORD_MIN} characters."),
        );
    }
    if form.password1 != form.password2 {
        errors.add("password2", "The two password fields didn't match.");
    }

    errors
}

// -- Login --

/// GET /auth/login/
pub async fn login_page(
    maybe_user: MaybeUser,
    Query(query): Query<NextQuery>,
) -> impl IntoResponse {
    Html(LoginTemplate {
        user: maybe_user.0,
        username: String::new(),
        next: safe_next(query.next.as_deref()),
        error: None,
    })
}

/// POST /auth/login/
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let next = safe_next(form.next.as_deref());
    let username = form.username.trim().to_string();

    let credentials = state.repo.find_credentials(&username).await?;
    let verified = match credentials.as_ref().and_then(|c| c.password_hash.as_deref()) {
        Some(hash) => bcrypt::verify(&form.password, hash).unwrap_or(false),
        None => false,
    };

    match credentials {
        Some(c) if verified => {
            tracing::info!("User {} logged in", c.user.username);
            login_response(&state, &c.user.id, &next)
        }
        _ => {
            tracing::debug!("Failed login for {}", username);
            Ok(Html(LoginTemplate {
                user: None,
                username,
                next,
                error: Some(
                    "Please enter a correct username and password. Note that both fields may be case-sensitive."
                        .to_string(),
                ),
            })
            .into_response())
        }
    }
}

// -- Signup --

/// GET /auth/signup/
pub async fn signup_page(maybe_user: MaybeUser) -> impl IntoResponse {
    Html(SignupTemplate {
        user: maybe_user.0,
        username: String::new(),
        errors: FieldErrors::new(),
    })
}

/// POST /auth/signup/
pub async fn signup(
    State(state): State<AppState>,
    Form(form): Form<SignupForm>,
) -> AppResult<Response> {
    let username = form.username.trim().to_string();
    let mut errors = validate_signup(&form);

    if errors.is_empty() {
        let hash = bcrypt::hash(&form.password1, state.config.auth.bcrypt_cost)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {e}")))?;

        match state.repo.create_user(&username, Some(&hash)).await {
            Ok(user) => {
                tracing::info!("New user signed up: {}", user.username);
                return login_response(&state, &user.id, "/");
            }
            Err(RepositoryError::Conflict(_)) => {
                errors.add("username", "A user with that username already exists.");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(Html(SignupTemplate {
        user: None,
        username,
        errors,
    })
    .into_response())
}

// -- Logout --

/// POST /auth/logout/
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let cookie_name = &state.config.auth.cookie_name;
    if let Some(token) = cookie_value(&headers, cookie_name) {
        session::delete_session(&state.db, token)?;
    }

    Ok((
        AppendHeaders([(header::SET_COOKIE, clear_session_cookie(cookie_name))]),
        Redirect::to("/"),
    )
        .into_response())
}
