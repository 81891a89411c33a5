use crate::blog::domain::{Page, PageWindow, PostFilter, UserId};
use crate::blog::repository::DynBlogRepository;
use crate::blog::{BlogError, BlogResult};
use crate::db::models::{Group, PostView, User};

/// Who is looking at which feed.
#[derive(Debug, Clone, Copy)]
pub enum FeedContext<'a> {
    Global,
    Group { slug: &'a str },
    Profile { username: &'a str },
    Following { viewer: &'a UserId },
}

/// The entity a feed is about, resolved while assembling it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSubject {
    Everyone,
    Group(Group),
    Author(User),
    FollowedBy(UserId),
}

#[derive(Debug, Clone)]
pub struct Feed {
    pub subject: FeedSubject,
    pub page: Page<PostView>,
}

/// Builds paginated, newest-first post listings.
#[derive(Clone)]
pub struct FeedAssembler {
    repo: DynBlogRepository,
    per_page: u32,
}

impl FeedAssembler {
    pub fn new(repo: DynBlogRepository, per_page: u32) -> Self {
        Self {
            repo,
            per_page: per_page.max(1),
        }
    }

    /// Resolve the context and return the requested page.
    ///
    /// Unknown group slugs and usernames are `NotFound`. Out-of-range pages
    /// resolve to the last page.
    pub async fn assemble(&self, ctx: FeedContext<'_>, page: Option<&str>) -> BlogResult<Feed> {
        let (subject, filter) = self.resolve(ctx).await?;

        let count = self.repo.count_posts(&filter).await?;
        let window = PageWindow::resolve(page, count, self.per_page);
        let items = self
            .repo
            .list_posts(&filter, window.limit, window.offset)
            .await?;

        tracing::debug!(
            "Assembled feed {:?}: page {}/{} with {} of {} posts",
            filter,
            window.number,
            window.num_pages,
            items.len(),
            count
        );

        Ok(Feed {
            subject,
            page: window.into_page(items, count),
        })
    }

    async fn resolve(&self, ctx: FeedContext<'_>) -> BlogResult<(FeedSubject, PostFilter)> {
        match ctx {
            FeedContext::Global => Ok((FeedSubject::Everyone, PostFilter::All)),
            FeedContext::Group { slug } => {
                let group = self
                    .repo
                    .find_group_by_slug(slug)
                    .await?
                    .ok_or_else(|| BlogError::NotFound(format!("group {slug}")))?;
                let filter = PostFilter::Group(group.id);
                Ok((FeedSubject::Group(group), filter))
            }
            FeedContext::Profile { username } => {
                let author = self
                    .repo
                    .find_user_by_username(username)
                    .await?
                    .ok_or_else(|| BlogError::NotFound(format!("user {username}")))?;
                let filter = PostFilter::Author(UserId::new(&author.id));
                Ok((FeedSubject::Author(author), filter))
            }
            FeedContext::Following { viewer } => Ok((
                FeedSubject::FollowedBy(viewer.clone()),
                PostFilter::FollowedBy(viewer.clone()),
            )),
        }
    }
}
