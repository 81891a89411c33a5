use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tokio::sync::Mutex;

use crate::blog::{DynBlogRepository, FeedAssembler, FollowGraph, PostService, SqliteBlogRepository};
use crate::cache::PageCache;
use crate::config::Config;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub repo: DynBlogRepository,
    pub feeds: FeedAssembler,
    pub follows: FollowGraph,
    pub posts: PostService,
    pub page_cache: Arc<Mutex<PageCache>>,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Self {
        let repo: DynBlogRepository = Arc::new(SqliteBlogRepository::new(db.clone()));
        let page_cache = PageCache::new(config.feed.cache_ttl());

        Self {
            feeds: FeedAssembler::new(repo.clone(), config.feed.posts_per_page),
            follows: FollowGraph::new(repo.clone()),
            posts: PostService::new(repo.clone()),
            page_cache: Arc::new(Mutex::new(page_cache)),
            repo,
            db,
            config,
        }
    }
}
