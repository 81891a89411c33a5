use askama::Template;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::blog::{FeedContext, Page};
use crate::cache::CacheKey;
use crate::db::models::PostView;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::routes::PageQuery;
use crate::state::AppState;

pub const INDEX_ROUTE: &str = "/";

#[derive(Template)]
#[template(path = "pages/index.html")]
pub struct IndexTemplate {
    pub user: Option<CurrentUser>,
    pub page: Page<PostView>,
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => html_body(body),
            Err(e) => AppError::Template(e).into_response(),
        }
    }
}

/// An already rendered page as a 200 response.
pub fn html_body(body: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        body,
    )
        .into_response()
}

/// GET / - global feed, served from the page cache while fresh.
pub async fn index(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let key = CacheKey::new(
        INDEX_ROUTE,
        query.page.as_deref(),
        user.as_ref().map(|u| u.id.as_str()),
    );

    let generation = {
        let mut cache = state.page_cache.lock().await;
        if let Some(body) = cache.get(&key) {
            tracing::debug!("Page cache hit for {:?}", key);
            return Ok(html_body(body));
        }
        cache.generation()
    };

    let feed = state
        .feeds
        .assemble(FeedContext::Global, query.page.as_deref())
        .await?;
    let body = IndexTemplate {
        user,
        page: feed.page,
    }
    .render()?;

    state
        .page_cache
        .lock()
        .await
        .insert(key, body.clone(), generation);
    Ok(html_body(body))
}

/// Drop cached global feed pages after a post changed.
pub async fn invalidate_index(state: &AppState) {
    let dropped = state.page_cache.lock().await.invalidate_route(INDEX_ROUTE);
    if dropped > 0 {
        tracing::debug!("Invalidated {} cached index pages", dropped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    struct Unprintable;

    impl fmt::Display for Unprintable {
        fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
            Err(fmt::Error)
        }
    }

    #[derive(Template)]
    #[template(source = "<p>{{ value }}</p>", ext = "html")]
    struct BrokenTemplate {
        value: Unprintable,
    }

    #[tokio::test]
    async fn render_failure_uses_server_error_page() {
        let response = Html(BrokenTemplate { value: Unprintable }).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(body.contains("Something went wrong"));
    }
}
