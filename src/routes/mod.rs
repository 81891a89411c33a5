pub mod assets;
pub mod auth;
pub mod follow;
pub mod home;
pub mod posts;

use axum::extract::Request;
use axum::http::Uri;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::error::{not_found_page, MissingPage};
use crate::state::AppState;

/// `?page=` as sent by the paginator. Kept raw so the feed can apply its own
/// fallback rules to junk values.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// The full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home::index))
        .route("/assets/{*path}", get(assets::serve))
        .route("/media/{*path}", get(assets::serve_media))
        .merge(posts::router())
        .merge(follow::router())
        .merge(auth::router())
        .fallback(fallback)
        .layer(middleware::from_fn(fill_missing_path))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn fallback(uri: Uri) -> Response {
    tracing::debug!("No route for {}", uri.path());
    not_found_page(uri.path())
}

/// Handler 404s don't know the request path; re-render them with it.
async fn fill_missing_path(req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let response = next.run(req).await;

    if response.extensions().get::<MissingPage>().is_some() {
        return not_found_page(path);
    }
    response
}
