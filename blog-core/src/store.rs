use anyhow::Result;
use async_trait::async_trait;

use crate::ids::{PostId, UserId};
use crate::models::{BlogPost, Comment, NewComment, NewPost, User};

/// Storage adapter for the blog's document collections.
///
/// The store owns identifiers and timestamps: `create_*` assigns the id and
/// `createdAt`, `save_post` refreshes `updatedAt`. Every call is atomic for
/// the single document it touches; nothing spans documents.
#[async_trait]
pub trait BlogStore: Send + Sync {
    /// Fetch one post; `Ok(None)` when it does not exist.
    async fn get_post(&self, id: &PostId) -> Result<Option<BlogPost>>;

    /// All posts in creation order.
    async fn find_posts(&self) -> Result<Vec<BlogPost>>;

    async fn create_post(&self, new: NewPost) -> Result<BlogPost>;

    /// Persist a mutated post, replacing the stored document.
    async fn save_post(&self, post: &BlogPost) -> Result<BlogPost>;

    async fn create_comment(&self, new: NewComment) -> Result<Comment>;

    /// Comments of one post in creation order.
    async fn find_comments(&self, blog_id: &PostId) -> Result<Vec<Comment>>;

    async fn upsert_user(&self, user: User) -> Result<User>;

    async fn get_user(&self, id: &UserId) -> Result<Option<User>>;
}
