use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;

use crate::blog::{BlogError, FeedContext, Page, UserId};
use crate::db::models::PostView;
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::routes::home::Html;
use crate::routes::PageQuery;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/follow.html")]
pub struct FollowFeedTemplate {
    pub user: Option<CurrentUser>,
    pub page: Page<PostView>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/follow/", get(follow_index))
        .route("/profile/{username}/follow/", get(profile_follow))
        .route("/profile/{username}/unfollow/", get(profile_unfollow))
}

/// GET /follow/ - posts from authors the viewer follows.
async fn follow_index(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let viewer = user.user_id();
    let feed = state
        .feeds
        .assemble(FeedContext::Following { viewer: &viewer }, query.page.as_deref())
        .await?;

    Ok(Html(FollowFeedTemplate {
        user: Some(user),
        page: feed.page,
    })
    .into_response())
}

async fn resolve_author(state: &AppState, username: &str) -> AppResult<UserId> {
    let author = state
        .repo
        .find_user_by_username(username)
        .await?
        .ok_or_else(|| BlogError::NotFound(format!("user {username}")))?;
    Ok(UserId::new(author.id))
}

async fn profile_follow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let author = resolve_author(&state, &username).await?;
    let change = state.follows.follow(&user.user_id(), &author).await?;
    tracing::debug!("{} -> {}: {:?}", user.username, username, change);

    Ok(Redirect::to(&format!("/profile/{}/", username)).into_response())
}

async fn profile_unfollow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let author = resolve_author(&state, &username).await?;
    let change = state.follows.unfollow(&user.user_id(), &author).await?;
    tracing::debug!("{} -x {}: {:?}", user.username, username, change);

    Ok(Redirect::to(&format!("/profile/{}/", username)).into_response())
}
