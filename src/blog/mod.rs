pub mod domain;
pub mod feed;
pub mod follow;
pub mod posts;
pub mod repository;

pub use domain::{
    CommentInput, FieldErrors, NewComment, NewPost, Page, PageWindow, PostDraft, PostFilter,
    PostId, PostInput, UserId,
};
pub use feed::{Feed, FeedAssembler, FeedContext, FeedSubject};
pub use follow::{FollowChange, FollowGraph};
pub use posts::{CommentOutcome, CreateOutcome, EditOutcome, PostService};
pub use repository::{BlogRepository, DynBlogRepository, RepositoryError, SqliteBlogRepository};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlogError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub type BlogResult<T> = Result<T, BlogError>;
