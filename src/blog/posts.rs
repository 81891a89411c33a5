use chrono::Utc;

use crate::blog::domain::{
    is_owner, CommentInput, FieldErrors, NewComment, NewPost, PostDraft, PostId, PostInput, UserId,
};
use crate::blog::repository::DynBlogRepository;
use crate::blog::{BlogError, BlogResult};
use crate::db::models::PostView;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(PostId),
    Invalid(FieldErrors),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Updated,
    /// The actor is not the author; nothing was changed.
    Forbidden,
    Invalid(FieldErrors),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentOutcome {
    Added(i64),
    Invalid(FieldErrors),
}

/// Post and comment mutations. Authorship is always taken from the caller.
#[derive(Clone)]
pub struct PostService {
    repo: DynBlogRepository,
}

impl PostService {
    pub fn new(repo: DynBlogRepository) -> Self {
        Self { repo }
    }

    pub async fn get(&self, id: PostId) -> BlogResult<PostView> {
        self.repo
            .find_post(id)
            .await?
            .ok_or_else(|| BlogError::NotFound(format!("post {id}")))
    }

    pub async fn create_post(&self, author: &UserId, input: &PostInput) -> BlogResult<CreateOutcome> {
        let draft = match self.validate(input).await? {
            Ok(draft) => draft,
            Err(errors) => return Ok(CreateOutcome::Invalid(errors)),
        };

        let record = NewPost::new(author.clone(), draft, Utc::now());
        let id = self.repo.insert_post(&record).await?;
        tracing::info!("Post {} created by {}", id, author);

        Ok(CreateOutcome::Created(id))
    }

    pub async fn edit_post(
        &self,
        actor: &UserId,
        post_id: PostId,
        input: &PostInput,
    ) -> BlogResult<EditOutcome> {
        let post = self.get(post_id).await?;

        if !is_owner(actor, &post.author_id) {
            tracing::warn!("{} tried to edit post {} owned by {}", actor, post_id, post.author_id);
            return Ok(EditOutcome::Forbidden);
        }

        let draft = match self.validate(input).await? {
            Ok(draft) => draft,
            Err(errors) => return Ok(EditOutcome::Invalid(errors)),
        };

        if !self.repo.update_post(post_id, &draft).await? {
            return Err(BlogError::NotFound(format!("post {post_id}")));
        }
        tracing::info!("Post {} edited by {}", post_id, actor);

        Ok(EditOutcome::Updated)
    }

    pub async fn add_comment(
        &self,
        author: &UserId,
        post_id: PostId,
        input: &CommentInput,
    ) -> BlogResult<CommentOutcome> {
        // Resolve the post first so a bad id is NotFound even with an empty form
        self.get(post_id).await?;

        let text = match input.validate() {
            Ok(text) => text,
            Err(errors) => return Ok(CommentOutcome::Invalid(errors)),
        };

        let record = NewComment::new(post_id, author.clone(), text, Utc::now());
        let id = self.repo.insert_comment(&record).await?;
        tracing::debug!("Comment {} added to post {} by {}", id, post_id, author);

        Ok(CommentOutcome::Added(id))
    }

    /// Field validation plus the store-backed check that the group exists.
    async fn validate(&self, input: &PostInput) -> BlogResult<Result<PostDraft, FieldErrors>> {
        let draft = match input.validate() {
            Ok(draft) => draft,
            Err(errors) => return Ok(Err(errors)),
        };

        if let Some(group_id) = draft.group_id {
            if !self.repo.group_exists(group_id).await? {
                return Ok(Err(PostInput::unknown_group_error()));
            }
        }

        Ok(Ok(draft))
    }
}
