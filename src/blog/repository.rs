// Repository pattern - isolates all database side effects
use crate::blog::domain::*;
use crate::db::models::{CommentView, Group, PostView, User, UserCredentials};
use crate::state::DbPool;
use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, ErrorCode, OptionalExtension, Row};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Repository trait - all database operations
#[async_trait]
pub trait BlogRepository: Send + Sync {
    /// Create a user; `Conflict` if the username is taken
    async fn create_user(
        &self,
        username: &str,
        password_hash: Option<&str>,
    ) -> Result<User, RepositoryError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError>;

    /// Load a user with their password hash, for login only
    async fn find_credentials(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, RepositoryError>;

    /// Create a group; `Conflict` if the slug is taken
    async fn create_group(
        &self,
        slug: &str,
        title: &str,
        description: &str,
    ) -> Result<Group, RepositoryError>;

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<Group>, RepositoryError>;

    async fn group_exists(&self, id: i64) -> Result<bool, RepositoryError>;

    /// All groups ordered by title, for the post form's group choice
    async fn list_groups(&self) -> Result<Vec<Group>, RepositoryError>;

    async fn insert_post(&self, post: &NewPost) -> Result<PostId, RepositoryError>;

    async fn find_post(&self, id: PostId) -> Result<Option<PostView>, RepositoryError>;

    /// Replace text and group of an existing post. Returns false if it does not exist.
    async fn update_post(&self, id: PostId, draft: &PostDraft) -> Result<bool, RepositoryError>;

    async fn count_posts(&self, filter: &PostFilter) -> Result<u64, RepositoryError>;

    /// Posts matching `filter`, newest first
    async fn list_posts(
        &self,
        filter: &PostFilter,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<PostView>, RepositoryError>;

    async fn insert_comment(&self, comment: &NewComment) -> Result<i64, RepositoryError>;

    /// Comments of a post, newest first
    async fn list_comments(&self, post_id: PostId) -> Result<Vec<CommentView>, RepositoryError>;

    /// Insert the edge unless present. Returns true if a row was created.
    async fn insert_follow(&self, user: &UserId, author: &UserId) -> Result<bool, RepositoryError>;

    /// Returns true if an edge was removed
    async fn delete_follow(&self, user: &UserId, author: &UserId) -> Result<bool, RepositoryError>;

    async fn follow_exists(&self, user: &UserId, author: &UserId) -> Result<bool, RepositoryError>;

    async fn count_following(&self, user: &UserId) -> Result<u64, RepositoryError>;

    async fn count_followers(&self, author: &UserId) -> Result<u64, RepositoryError>;
}

const POST_COLUMNS: &str = "p.id, p.text, p.created_at, p.image, p.author_id, u.username, \
     p.group_id, g.title, g.slug \
     FROM posts p \
     JOIN users u ON u.id = p.author_id \
     LEFT JOIN topic_groups g ON g.id = p.group_id";

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostView> {
    Ok(PostView {
        id: row.get(0)?,
        text: row.get(1)?,
        created_at: row.get(2)?,
        image: row.get(3)?,
        author_id: row.get(4)?,
        author_username: row.get(5)?,
        group_id: row.get(6)?,
        group_title: row.get(7)?,
        group_slug: row.get(8)?,
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        display_name: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
    })
}

/// WHERE clause and its single parameter for a feed filter
fn filter_clause(filter: &PostFilter) -> (&'static str, Vec<Value>) {
    match filter {
        PostFilter::All => ("", Vec::new()),
        PostFilter::Group(id) => ("WHERE p.group_id = ?1", vec![Value::Integer(*id)]),
        PostFilter::Author(user) => (
            "WHERE p.author_id = ?1",
            vec![Value::Text(user.as_str().to_string())],
        ),
        PostFilter::FollowedBy(user) => (
            "WHERE p.author_id IN (SELECT author_id FROM follows WHERE user_id = ?1)",
            vec![Value::Text(user.as_str().to_string())],
        ),
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

/// SQLite implementation
pub struct SqliteBlogRepository {
    pool: DbPool,
}

impl SqliteBlogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BlogRepository for SqliteBlogRepository {
    async fn create_user(
        &self,
        username: &str,
        password_hash: Option<&str>,
    ) -> Result<User, RepositoryError> {
        let conn = self.pool.get()?;
        let id = UserId::generate();

        let inserted = conn.execute(
            "INSERT INTO users (id, username, password_hash) VALUES (?1, ?2, ?3)",
            params![id.as_str(), username, password_hash],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => {
                return Err(RepositoryError::Conflict(format!(
                    "username {username} is taken"
                )))
            }
            Err(e) => return Err(e.into()),
        }

        let user = conn.query_row(
            "SELECT id, username, display_name, created_at FROM users WHERE id = ?1",
            params![id.as_str()],
            user_from_row,
        )?;
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let conn = self.pool.get()?;
        let user = conn
            .query_row(
                "SELECT id, username, display_name, created_at FROM users WHERE username = ?1",
                params![username],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    async fn find_credentials(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, RepositoryError> {
        let conn = self.pool.get()?;
        let creds = conn
            .query_row(
                "SELECT id, username, display_name, created_at, password_hash
                 FROM users WHERE username = ?1",
                params![username],
                |row| {
                    Ok(UserCredentials {
                        user: user_from_row(row)?,
                        password_hash: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(creds)
    }

    async fn create_group(
        &self,
        slug: &str,
        title: &str,
        description: &str,
    ) -> Result<Group, RepositoryError> {
        let conn = self.pool.get()?;

        let inserted = conn.execute(
            "INSERT INTO topic_groups (title, slug, description) VALUES (?1, ?2, ?3)",
            params![title, slug, description],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => {
                return Err(RepositoryError::Conflict(format!(
                    "group slug {slug} is taken or too long"
                )))
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Group {
            id: conn.last_insert_rowid(),
            title: title.to_string(),
            slug: slug.to_string(),
            description: description.to_string(),
        })
    }

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<Group>, RepositoryError> {
        let conn = self.pool.get()?;
        let group = conn
            .query_row(
                "SELECT id, title, slug, description FROM topic_groups WHERE slug = ?1",
                params![slug],
                group_from_row,
            )
            .optional()?;
        Ok(group)
    }

    async fn group_exists(&self, id: i64) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM topic_groups WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    async fn list_groups(&self) -> Result<Vec<Group>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt =
            conn.prepare("SELECT id, title, slug, description FROM topic_groups ORDER BY title")?;
        let groups = stmt
            .query_map([], group_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(groups)
    }

    async fn insert_post(&self, post: &NewPost) -> Result<PostId, RepositoryError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO posts (text, created_at, image, author_id, group_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                post.text(),
                format_timestamp(post.created_at()),
                post.image(),
                post.author_id().as_str(),
                post.group_id(),
            ],
        )?;
        Ok(PostId(conn.last_insert_rowid()))
    }

    async fn find_post(&self, id: PostId) -> Result<Option<PostView>, RepositoryError> {
        let conn = self.pool.get()?;
        let post = conn
            .query_row(
                &format!("SELECT {POST_COLUMNS} WHERE p.id = ?1"),
                params![id.get()],
                post_from_row,
            )
            .optional()?;
        Ok(post)
    }

    async fn update_post(&self, id: PostId, draft: &PostDraft) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "UPDATE posts SET text = ?1, group_id = ?2 WHERE id = ?3",
            params![draft.text, draft.group_id, id.get()],
        )?;
        Ok(rows > 0)
    }

    async fn count_posts(&self, filter: &PostFilter) -> Result<u64, RepositoryError> {
        let conn = self.pool.get()?;
        let (clause, values) = filter_clause(filter);
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM posts p {clause}"),
            params_from_iter(values),
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    async fn list_posts(
        &self,
        filter: &PostFilter,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<PostView>, RepositoryError> {
        let conn = self.pool.get()?;
        let (clause, mut values) = filter_clause(filter);
        let limit_idx = values.len() + 1;
        let offset_idx = values.len() + 2;
        values.push(Value::Integer(i64::from(limit)));
        values.push(Value::Integer(i64::try_from(offset).unwrap_or(i64::MAX)));

        let sql = format!(
            "SELECT {POST_COLUMNS} {clause} \
             ORDER BY p.created_at DESC, p.id DESC \
             LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
        );
        let mut stmt = conn.prepare(&sql)?;
        let posts = stmt
            .query_map(params_from_iter(values), post_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    async fn insert_comment(&self, comment: &NewComment) -> Result<i64, RepositoryError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO comments (post_id, author_id, text, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                comment.post_id().get(),
                comment.author_id().as_str(),
                comment.text(),
                format_timestamp(comment.created_at()),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn list_comments(&self, post_id: PostId) -> Result<Vec<CommentView>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT c.id, c.post_id, c.author_id, u.username, c.text, c.created_at
             FROM comments c JOIN users u ON u.id = c.author_id
             WHERE c.post_id = ?1
             ORDER BY c.created_at DESC, c.id DESC",
        )?;
        let comments = stmt
            .query_map(params![post_id.get()], |row| {
                Ok(CommentView {
                    id: row.get(0)?,
                    post_id: row.get(1)?,
                    author_id: row.get(2)?,
                    author_username: row.get(3)?,
                    text: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    async fn insert_follow(&self, user: &UserId, author: &UserId) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "INSERT INTO follows (user_id, author_id) VALUES (?1, ?2)
             ON CONFLICT(user_id, author_id) DO NOTHING",
            params![user.as_str(), author.as_str()],
        )?;
        Ok(rows > 0)
    }

    async fn delete_follow(&self, user: &UserId, author: &UserId) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "DELETE FROM follows WHERE user_id = ?1 AND author_id = ?2",
            params![user.as_str(), author.as_str()],
        )?;
        Ok(rows > 0)
    }

    async fn follow_exists(&self, user: &UserId, author: &UserId) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM follows WHERE user_id = ?1 AND author_id = ?2",
            params![user.as_str(), author.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    async fn count_following(&self, user: &UserId) -> Result<u64, RepositoryError> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM follows WHERE user_id = ?1",
            params![user.as_str()],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    async fn count_followers(&self, author: &UserId) -> Result<u64, RepositoryError> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM follows WHERE author_id = ?1",
            params![author.as_str()],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}

/// Type alias for Arc-wrapped repository (for AppState)
pub type DynBlogRepository = Arc<dyn BlogRepository>;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    pub(crate) fn create_test_repo() -> (SqliteBlogRepository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let pool = db::create_pool(&db_path).unwrap();
        db::run_migrations(&pool).unwrap();

        (SqliteBlogRepository::new(pool), temp_dir)
    }

    fn draft(text: &str, group_id: Option<i64>) -> PostDraft {
        PostDraft {
            text: text.to_string(),
            group_id,
        }
    }

    #[tokio::test]
    async fn test_create_user_rejects_duplicate_username() {
        let (repo, _temp) = create_test_repo();

        let alice = repo.create_user("alice", Some("hash")).await.unwrap();
        assert_eq!(alice.username, "alice");

        let again = repo.create_user("alice", None).await;
        assert!(matches!(again, Err(RepositoryError::Conflict(_))));

        let creds = repo.find_credentials("alice").await.unwrap().unwrap();
        assert_eq!(creds.password_hash.as_deref(), Some("hash"));
        assert_eq!(creds.user, alice);
    }

    #[tokio::test]
    async fn test_groups() {
        let (repo, _temp) = create_test_repo();

        let b = repo.create_group("b-slug", "Beta", "").await.unwrap();
        let a = repo.create_group("a-slug", "Alpha", "first").await.unwrap();
        assert!(matches!(
            repo.create_group("a-slug", "Again", "").await,
            Err(RepositoryError::Conflict(_))
        ));

        assert_eq!(repo.find_group_by_slug("a-slug").await.unwrap(), Some(a.clone()));
        assert_eq!(repo.find_group_by_slug("missing").await.unwrap(), None);
        assert!(repo.group_exists(b.id).await.unwrap());
        assert!(!repo.group_exists(9999).await.unwrap());

        let titles: Vec<String> = repo
            .list_groups()
            .await
            .unwrap()
            .into_iter()
            .map(|g| g.title)
            .collect();
        assert_eq!(titles, vec!["Alpha", "Beta"]);
    }

    #[tokio::test]
    async fn test_insert_and_find_post() {
        let (repo, _temp) = create_test_repo();
        let author = repo.create_user("author", None).await.unwrap();
        let group = repo.create_group("rust", "Rust", "").await.unwrap();

        let new_post = NewPost::new(
            UserId::new(&author.id),
            draft("hello", Some(group.id)),
            Utc::now(),
        )
        .with_image("posts/small.gif");
        let id = repo.insert_post(&new_post).await.unwrap();

        let post = repo.find_post(id).await.unwrap().unwrap();
        assert_eq!(post.text, "hello");
        assert_eq!(post.author_username, "author");
        assert_eq!(post.group_slug.as_deref(), Some("rust"));
        assert_eq!(post.image.as_deref(), Some("posts/small.gif"));

        assert!(repo.find_post(PostId(id.get() + 1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_post_keeps_identity_and_timestamp() {
        let (repo, _temp) = create_test_repo();
        let author = repo.create_user("author", None).await.unwrap();
        let group = repo.create_group("rust", "Rust", "").await.unwrap();

        let id = repo
            .insert_post(&NewPost::new(
                UserId::new(&author.id),
                draft("before", None),
                Utc::now(),
            ))
            .await
            .unwrap();
        let before = repo.find_post(id).await.unwrap().unwrap();

        assert!(repo
            .update_post(id, &draft("after", Some(group.id)))
            .await
            .unwrap());
        let after = repo.find_post(id).await.unwrap().unwrap();

        assert_eq!(after.id, before.id);
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.author_id, before.author_id);
        assert_eq!(after.text, "after");
        assert_eq!(after.group_id, Some(group.id));

        assert!(!repo.update_post(PostId(999), &draft("x", None)).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_posts_newest_first_with_filters() {
        let (repo, _temp) = create_test_repo();
        let alice = repo.create_user("alice", None).await.unwrap();
        let bob = repo.create_user("bob", None).await.unwrap();
        let group = repo.create_group("rust", "Rust", "").await.unwrap();
        let base = Utc::now();

        let oldest = repo
            .insert_post(&NewPost::new(
                UserId::new(&alice.id),
                draft("oldest", Some(group.id)),
                base,
            ))
            .await
            .unwrap();
        let middle = repo
            .insert_post(&NewPost::new(
                UserId::new(&bob.id),
                draft("middle", None),
                base + Duration::seconds(1),
            ))
            .await
            .unwrap();
        let newest = repo
            .insert_post(&NewPost::new(
                UserId::new(&alice.id),
                draft("newest", None),
                base + Duration::seconds(2),
            ))
            .await
            .unwrap();

        let all: Vec<i64> = repo
            .list_posts(&PostFilter::All, 10, 0)
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(all, vec![newest.get(), middle.get(), oldest.get()]);

        let by_alice = PostFilter::Author(UserId::new(&alice.id));
        assert_eq!(repo.count_posts(&by_alice).await.unwrap(), 2);

        let in_group = PostFilter::Group(group.id);
        let grouped = repo.list_posts(&in_group, 10, 0).await.unwrap();
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].id, oldest.get());

        let second_page = repo.list_posts(&PostFilter::All, 2, 2).await.unwrap();
        assert_eq!(second_page.len(), 1);
        assert_eq!(second_page[0].id, oldest.get());
    }

    #[tokio::test]
    async fn test_followed_by_filter() {
        let (repo, _temp) = create_test_repo();
        let reader = repo.create_user("reader", None).await.unwrap();
        let alice = repo.create_user("alice", None).await.unwrap();
        let bob = repo.create_user("bob", None).await.unwrap();
        let reader_id = UserId::new(&reader.id);

        for author in [&alice, &bob] {
            repo.insert_post(&NewPost::new(
                UserId::new(&author.id),
                draft(&format!("by {}", author.username), None),
                Utc::now(),
            ))
            .await
            .unwrap();
        }

        let filter = PostFilter::FollowedBy(reader_id.clone());
        assert_eq!(repo.count_posts(&filter).await.unwrap(), 0);

        repo.insert_follow(&reader_id, &UserId::new(&alice.id))
            .await
            .unwrap();
        let posts = repo.list_posts(&filter, 10, 0).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].author_username, "alice");
    }

    #[tokio::test]
    async fn test_follow_edges_are_idempotent() {
        let (repo, _temp) = create_test_repo();
        let a = UserId::new(repo.create_user("a", None).await.unwrap().id);
        let b = UserId::new(repo.create_user("b", None).await.unwrap().id);

        assert!(repo.insert_follow(&a, &b).await.unwrap());
        assert!(!repo.insert_follow(&a, &b).await.unwrap());
        assert!(repo.follow_exists(&a, &b).await.unwrap());
        assert!(!repo.follow_exists(&b, &a).await.unwrap());
        assert_eq!(repo.count_following(&a).await.unwrap(), 1);
        assert_eq!(repo.count_followers(&b).await.unwrap(), 1);

        assert!(repo.delete_follow(&a, &b).await.unwrap());
        assert!(!repo.delete_follow(&a, &b).await.unwrap());
        assert_eq!(repo.count_following(&a).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_comments_newest_first() {
        let (repo, _temp) = create_test_repo();
        let author = UserId::new(repo.create_user("author", None).await.unwrap().id);
        let now = Utc::now();
        let post = repo
            .insert_post(&NewPost::new(author.clone(), draft("p", None), now))
            .await
            .unwrap();

        repo.insert_comment(&NewComment::new(post, author.clone(), "first".into(), now))
            .await
            .unwrap();
        repo.insert_comment(&NewComment::new(
            post,
            author.clone(),
            "second".into(),
            now + Duration::seconds(1),
        ))
        .await
        .unwrap();

        let texts: Vec<String> = repo
            .list_comments(post)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.text)
            .collect();
        assert_eq!(texts, vec!["second", "first"]);
    }
}
