use crate::blog::domain::UserId;
use crate::blog::repository::DynBlogRepository;
use crate::blog::BlogResult;

/// What a follow or unfollow call actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowChange {
    Created,
    AlreadyFollowing,
    SelfFollow,
    Removed,
    NotFollowing,
}

/// Directed "user follows author" relation.
///
/// Both mutations are idempotent: repeating them changes nothing and is not
/// an error.
#[derive(Clone)]
pub struct FollowGraph {
    repo: DynBlogRepository,
}

impl FollowGraph {
    pub fn new(repo: DynBlogRepository) -> Self {
        Self { repo }
    }

    pub async fn follow(&self, viewer: &UserId, target: &UserId) -> BlogResult<FollowChange> {
        // Can't follow yourself
        if viewer == target {
            return Ok(FollowChange::SelfFollow);
        }

        let change = if self.repo.insert_follow(viewer, target).await? {
            tracing::info!("{} now follows {}", viewer, target);
            FollowChange::Created
        } else {
            FollowChange::AlreadyFollowing
        };
        Ok(change)
    }

    pub async fn unfollow(&self, viewer: &UserId, target: &UserId) -> BlogResult<FollowChange> {
        let change = if self.repo.delete_follow(viewer, target).await? {
            tracing::info!("{} unfollowed {}", viewer, target);
            FollowChange::Removed
        } else {
            FollowChange::NotFollowing
        };
        Ok(change)
    }

    pub async fn is_following(&self, viewer: &UserId, target: &UserId) -> BlogResult<bool> {
        Ok(self.repo.follow_exists(viewer, target).await?)
    }

    pub async fn follower_count(&self, author: &UserId) -> BlogResult<u64> {
        Ok(self.repo.count_followers(author).await?)
    }

    pub async fn following_count(&self, user: &UserId) -> BlogResult<u64> {
        Ok(self.repo.count_following(user).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blog::repository::tests::create_test_repo;
    use crate::blog::repository::BlogRepository;
    use std::sync::Arc;

    async fn graph_with_users() -> (FollowGraph, UserId, UserId, tempfile::TempDir) {
        let (repo, tmp) = create_test_repo();
        let follower = UserId::new(repo.create_user("follower", None).await.unwrap().id);
        let author = UserId::new(repo.create_user("author", None).await.unwrap().id);
        (FollowGraph::new(Arc::new(repo)), follower, author, tmp)
    }

    #[tokio::test]
    async fn follow_then_unfollow_restores_count() {
        let (graph, follower, author, _tmp) = graph_with_users().await;
        let before = graph.following_count(&follower).await.unwrap();

        assert_eq!(
            graph.follow(&follower, &author).await.unwrap(),
            FollowChange::Created
        );
        assert!(graph.is_following(&follower, &author).await.unwrap());
        assert_eq!(graph.following_count(&follower).await.unwrap(), before + 1);
        assert_eq!(graph.follower_count(&author).await.unwrap(), 1);

        assert_eq!(
            graph.unfollow(&follower, &author).await.unwrap(),
            FollowChange::Removed
        );
        assert_eq!(graph.following_count(&follower).await.unwrap(), before);
        assert!(!graph.is_following(&follower, &author).await.unwrap());
    }

    #[tokio::test]
    async fn redundant_follow_does_not_duplicate() {
        let (graph, follower, author, _tmp) = graph_with_users().await;

        graph.follow(&follower, &author).await.unwrap();
        assert_eq!(
            graph.follow(&follower, &author).await.unwrap(),
            FollowChange::AlreadyFollowing
        );
        assert_eq!(graph.following_count(&follower).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn self_follow_is_a_noop() {
        let (graph, follower, _author, _tmp) = graph_with_users().await;

        assert_eq!(
            graph.follow(&follower, &follower).await.unwrap(),
            FollowChange::SelfFollow
        );
        assert_eq!(graph.following_count(&follower).await.unwrap(), 0);
        assert!(!graph.is_following(&follower, &follower).await.unwrap());
    }

    #[tokio::test]
    async fn unfollow_without_edge_is_a_noop() {
        let (graph, follower, author, _tmp) = graph_with_users().await;

        assert_eq!(
            graph.unfollow(&follower, &author).await.unwrap(),
            FollowChange::NotFollowing
        );
    }
}
