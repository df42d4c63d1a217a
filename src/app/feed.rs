use anyhow::Result;

use crate::app::paginator::Page;
use crate::app::posts::PostService;
use crate::domain::post::{Post, PostFilter};
use crate::infra::db::Db;

#[derive(Clone)]
pub struct FeedService {
    posts: PostService,
    per_page: i64,
}

impl FeedService {
    pub fn new(db: Db, per_page: i64) -> Self {
        Self {
            posts: PostService::new(db),
            per_page,
        }
    }

    /// Posts by the authors `user_id` follows, newest first. Fan-out on read:
    /// there is no materialised timeline, the follow table is joined per request.
    pub async fn follow_feed(&self, user_id: i64, raw_page: Option<&str>) -> Result<Page<Post>> {
        self.posts
            .page(PostFilter::FollowedBy(user_id), raw_page, self.per_page)
            .await
    }
}
