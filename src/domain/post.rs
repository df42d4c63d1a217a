use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::group::GroupRef;
use crate::domain::user::AuthorRef;

/// Characters of the post text used as the detail page title.
pub const TITLE_CHARS: usize = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub pub_date: OffsetDateTime,
    pub author: AuthorRef,
    pub group: Option<GroupRef>,
    /// Storage path relative to the media root, e.g. `posts/small.gif`.
    pub image: Option<String>,
}

impl Post {
    pub fn title(&self) -> String {
        self.text.chars().take(TITLE_CHARS).collect()
    }
}

/// Which posts a listing page shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(i64),
    Author(i64),
    FollowedBy(i64),
}
