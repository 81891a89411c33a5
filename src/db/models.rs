use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub created_at: String,
}

impl User {
    /// Name shown in page headers; falls back to the username.
    pub fn shown_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

/// A user row including the stored password hash. Only the login flow sees this.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

/// A post joined with its author and group, as every page displays it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostView {
    pub id: i64,
    pub text: String,
    pub created_at: String,
    pub image: Option<String>,
    pub author_id: String,
    pub author_username: String,
    pub group_id: Option<i64>,
    pub group_title: Option<String>,
    pub group_slug: Option<String>,
}

impl PostView {
    /// First 15 characters of the text, used in page titles.
    pub fn headline(&self) -> String {
        self.text.chars().take(15).collect()
    }

    /// `YYYY-MM-DD HH:MM` portion of the stored timestamp.
    pub fn created_display(&self) -> String {
        display_timestamp(&self.created_at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentView {
    pub id: i64,
    pub post_id: i64,
    pub author_id: String,
    pub author_username: String,
    pub text: String,
    pub created_at: String,
}

impl CommentView {
    pub fn created_display(&self) -> String {
        display_timestamp(&self.created_at)
    }
}

fn display_timestamp(raw: &str) -> String {
    match chrono::DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => ts.format("%Y-%m-%d %H:%M").to_string(),
        Err(_) => raw.to_string(),
    }
}
