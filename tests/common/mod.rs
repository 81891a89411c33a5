#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use chrono::{Duration, Utc};
use tempfile::TempDir;
use tower::ServiceExt;

use yatube::auth::session;
use yatube::blog::{NewPost, PostDraft, UserId};
use yatube::config::Config;
use yatube::db;
use yatube::routes;
use yatube::state::AppState;

/// A full application over a throwaway database.
pub struct TestApp {
    pub state: AppState,
    _tmp: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("test.db");
        let pool = db::create_pool(&db_path).expect("Failed to create test database");
        db::run_migrations(&pool).expect("Failed to run migrations");

        let mut config = Config::default();
        config.database.path = Some(db_path);
        config.storage.path = Some(tmp.path().join("media"));
        config.auth.bcrypt_cost = 4;

        Self {
            state: AppState::new(pool, config),
            _tmp: tmp,
        }
    }

    pub fn router(&self) -> Router {
        routes::router(self.state.clone())
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().uri(uri).method("GET");
        if let Some(c) = cookie {
            builder = builder.header(header::COOKIE, c);
        }
        self.router()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    pub async fn post_form(&self, uri: &str, form: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder()
            .uri(uri)
            .method("POST")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(c) = cookie {
            builder = builder.header(header::COOKIE, c);
        }
        self.router()
            .oneshot(builder.body(Body::from(form.to_string())).unwrap())
            .await
            .unwrap()
    }

    /// Create a user with a live session; returns the id and a Cookie header value.
    pub async fn signed_in_user(&self, username: &str) -> (UserId, String) {
        let user = self.state.repo.create_user(username, None).await.unwrap();
        let token = session::create_session(&self.state.db, &user.id, 1).unwrap();
        let cookie = format!("{}={}", self.state.config.auth.cookie_name, token);
        (UserId::new(user.id), cookie)
    }

    pub async fn create_group(&self, slug: &str, title: &str) -> i64 {
        self.state
            .repo
            .create_group(slug, title, "")
            .await
            .unwrap()
            .id
    }

    /// Insert `n` posts, one millisecond apart so their order is fixed.
    pub async fn seed_posts(&self, author: &UserId, group_id: Option<i64>, n: usize) -> Vec<i64> {
        let base = Utc::now() - Duration::minutes(1);
        let mut ids = Vec::new();
        for i in 0..n {
            let draft = PostDraft {
                text: format!("Seeded post number {i}"),
                group_id,
            };
            let record = NewPost::new(author.clone(), draft, base + Duration::milliseconds(i as i64));
            ids.push(self.state.repo.insert_post(&record).await.unwrap().get());
        }
        ids
    }

    pub async fn post_text(&self, id: i64) -> String {
        let conn = self.state.db.get().unwrap();
        conn.query_row("SELECT text FROM posts WHERE id = ?1", [id], |r| r.get(0))
            .unwrap()
    }

    pub fn count(&self, table: &str) -> i64 {
        let conn = self.state.db.get().unwrap();
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
            .unwrap()
    }
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("response should redirect")
        .to_str()
        .unwrap()
        .to_string()
}

pub fn post_cards(body: &str) -> usize {
    body.matches("class=\"post-card\"").count()
}
