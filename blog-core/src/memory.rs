use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::errors::BlogError;
use crate::ids::{CommentId, PostId, UserId};
use crate::models::{BlogPost, Comment, NewComment, NewPost, User};
use crate::store::BlogStore;

#[derive(Default)]
struct Collections {
    posts: HashMap<PostId, BlogPost>,
    post_order: Vec<PostId>,
    comments: Vec<Comment>,
    users: HashMap<UserId, User>,
}

/// In-process document store.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn not_found(id: &PostId) -> anyhow::Error {
        BlogError::not_found(format!("Blog not found: {id}")).into_anyhow()
    }
}

#[async_trait]
impl BlogStore for MemoryStore {
    async fn get_post(&self, id: &PostId) -> Result<Option<BlogPost>> {
        let state = self.state.read().await;
        Ok(state.posts.get(id).cloned())
    }

    async fn find_posts(&self) -> Result<Vec<BlogPost>> {
        let state = self.state.read().await;
        Ok(state
            .post_order
            .iter()
            .filter_map(|id| state.posts.get(id))
            .cloned()
            .collect())
    }

    async fn create_post(&self, new: NewPost) -> Result<BlogPost> {
        let now = Utc::now();
        let post = BlogPost {
            id: PostId::new(),
            title: new.title,
            body: new.body,
            cover_image_url: new.cover_image_url,
            created_by: new.created_by,
            created_at: now,
            updated_at: now,
        };

        let mut state = self.state.write().await;
        state.post_order.push(post.id);
        state.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn save_post(&self, post: &BlogPost) -> Result<BlogPost> {
        let mut state = self.state.write().await;
        let stored = state
            .posts
            .get_mut(&post.id)
            .ok_or_else(|| Self::not_found(&post.id))?;

        let mut next = post.clone();
        next.created_at = stored.created_at;
        next.created_by = stored.created_by.clone();
        next.updated_at = Utc::now();
        *stored = next.clone();
        Ok(next)
    }

    async fn create_comment(&self, new: NewComment) -> Result<Comment> {
        let comment = Comment {
            id: CommentId::new(),
            content: new.content,
            blog_id: new.blog_id,
            created_by: new.created_by,
            created_at: Utc::now(),
        };

        let mut state = self.state.write().await;
        state.comments.push(comment.clone());
        Ok(comment)
    }

    async fn find_comments(&self, blog_id: &PostId) -> Result<Vec<Comment>> {
        let state = self.state.read().await;
        Ok(state
            .comments
            .iter()
            .filter(|c| &c.blog_id == blog_id)
            .cloned()
            .collect())
    }

    async fn upsert_user(&self, user: User) -> Result<User> {
        let mut state = self.state.write().await;
        state.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.get(id).cloned())
    }
}
