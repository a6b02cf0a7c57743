use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::bail_blog;
use crate::errors::BlogError;
use crate::ids::{PostId, UserId};
use crate::models::{
    validate_or_unprocessable, BlogPost, Comment, CommentView, NewComment, NewPost, PostInput,
    PostPage, PostPatch, PostView, User,
};
use crate::store::BlogStore;
use crate::uploads::{DiskUploads, StoredFile};

pub const DEFAULT_COVER: &str = "/images/default.png";

/// The blog's operations, independent of any transport.
///
/// Every mutating call takes the acting user explicitly; nothing is read
/// from ambient request state.
pub struct BlogService {
    store: Arc<dyn BlogStore>,
    uploads: DiskUploads,
    default_cover: String,
}

impl BlogService {
    pub fn new(store: Arc<dyn BlogStore>, uploads: DiskUploads) -> Self {
        Self {
            store,
            uploads,
            default_cover: DEFAULT_COVER.to_string(),
        }
    }

    pub fn with_default_cover(mut self, url: impl Into<String>) -> Self {
        self.default_cover = url.into();
        self
    }

    pub fn default_cover(&self) -> &str {
        &self.default_cover
    }

    pub fn store(&self) -> &Arc<dyn BlogStore> {
        &self.store
    }

    pub fn uploads(&self) -> &DiskUploads {
        &self.uploads
    }

    /// Record the profile upstream authentication handed us.
    pub async fn identify(&self, user: User) -> Result<User> {
        self.store.upsert_user(user).await
    }

    pub async fn list_posts(&self) -> Result<Vec<PostView>> {
        let posts = self.store.find_posts().await?;
        let mut authors = AuthorCache::default();

        let mut out = Vec::with_capacity(posts.len());
        for post in posts {
            let author = authors.resolve(self.store.as_ref(), &post.created_by).await?;
            out.push(PostView { post, author });
        }
        Ok(out)
    }

    /// A post with its creator and its comments (oldest first), each with
    /// their creator resolved.
    pub async fn show_post(&self, id: &PostId) -> Result<PostPage> {
        let post = self.require_post(id).await?;
        let comments = self.store.find_comments(id).await?;

        let mut authors = AuthorCache::default();
        let author = authors.resolve(self.store.as_ref(), &post.created_by).await?;

        let mut views = Vec::with_capacity(comments.len());
        for comment in comments {
            let author = authors.resolve(self.store.as_ref(), &comment.created_by).await?;
            views.push(CommentView { comment, author });
        }

        Ok(PostPage {
            blog: PostView { post, author },
            comments: views,
        })
    }

    /// Comments may only target posts that exist.
    pub async fn add_comment(
        &self,
        identity: &User,
        blog_id: &PostId,
        content: &str,
    ) -> Result<Comment> {
        let new = NewComment {
            content: content.trim().to_string(),
            blog_id: *blog_id,
            created_by: identity.id.clone(),
        };
        validate_or_unprocessable(&new, "Comment validation failed")?;

        self.require_post(blog_id).await?;

        let comment = self
            .store
            .create_comment(new)
            .await
            .map_err(|e| storage_failure("creating comment", e))?;

        info!(post_id = %blog_id, user_id = %identity.id, "comment added");
        Ok(comment)
    }

    /// Create a post. Without an uploaded cover the default asset is used.
    ///
    /// `cover` is removed from disk again if the post cannot be created.
    pub async fn create_post(
        &self,
        identity: &User,
        input: PostInput,
        cover: Option<StoredFile>,
    ) -> Result<BlogPost> {
        let new = NewPost {
            title: input.title().unwrap_or_default(),
            body: input.body().unwrap_or_default(),
            cover_image_url: cover
                .as_ref()
                .map(|f| f.url().to_string())
                .unwrap_or_else(|| self.default_cover.clone()),
            created_by: identity.id.clone(),
        };

        let res = match validate_or_unprocessable(&new, "Blog validation failed") {
            Ok(()) => self
                .store
                .create_post(new)
                .await
                .map_err(|e| storage_failure("creating blog", e)),
            Err(e) => Err(e.into_anyhow()),
        };

        match res {
            Ok(post) => {
                info!(post_id = %post.id, user_id = %identity.id, "blog created");
                Ok(post)
            }
            Err(e) => {
                self.discard_cover(cover).await;
                Err(e)
            }
        }
    }

    /// The post, if `identity` may edit it.
    pub async fn edit_post(&self, identity: &User, id: &PostId) -> Result<BlogPost> {
        self.require_owned_post(identity, id, "Unauthorized").await
    }

    /// Merge update: blank fields keep their stored value and the cover is
    /// only replaced when a new file was uploaded.
    ///
    /// `cover` is removed from disk again if the update is rejected or fails.
    pub async fn update_post(
        &self,
        identity: &User,
        id: &PostId,
        input: PostInput,
        cover: Option<StoredFile>,
    ) -> Result<BlogPost> {
        let patch = PostPatch::from_input(&input, cover.as_ref().map(|f| f.url().to_string()));

        match self.apply_patch(identity, id, patch).await {
            Ok(post) => {
                info!(post_id = %post.id, user_id = %identity.id, "blog updated");
                Ok(post)
            }
            Err(e) => {
                self.discard_cover(cover).await;
                Err(e)
            }
        }
    }

    async fn apply_patch(&self, identity: &User, id: &PostId, patch: PostPatch) -> Result<BlogPost> {
        let mut post = self
            .require_owned_post(identity, id, "Unauthorized to update this blog")
            .await?;

        if patch.is_empty() {
            return Ok(post);
        }

        patch.apply(&mut post);
        self.store
            .save_post(&post)
            .await
            .map_err(|e| storage_failure("updating blog", e))
    }

    async fn require_post(&self, id: &PostId) -> Result<BlogPost> {
        match self.store.get_post(id).await? {
            Some(post) => Ok(post),
            None => bail_blog!(not_found, "Blog not found"),
        }
    }

    async fn require_owned_post(
        &self,
        identity: &User,
        id: &PostId,
        forbidden: &str,
    ) -> Result<BlogPost> {
        let post = self.require_post(id).await?;
        if !post.is_owned_by(&identity.id) {
            warn!(post_id = %id, user_id = %identity.id, "rejected edit by non-owner");
            bail_blog!(forbidden, forbidden);
        }
        Ok(post)
    }

    async fn discard_cover(&self, cover: Option<StoredFile>) {
        if let Some(file) = cover {
            self.uploads.discard(&file).await;
        }
    }
}

/// Client errors from the store pass through; anything else is logged and
/// reported as a general error.
fn storage_failure(action: &str, err: anyhow::Error) -> anyhow::Error {
    if let Some(blog) = BlogError::from_anyhow(&err) {
        if !blog.kind.is_server_error() {
            return err;
        }
    }

    error!(error = ?err, "error {action}");
    BlogError::general_error(format!("Error {action}"))
        .with_source(err)
        .into_anyhow()
}

/// Resolves `createdBy` references, fetching each user once per call.
#[derive(Default)]
struct AuthorCache {
    users: HashMap<UserId, Option<User>>,
}

impl AuthorCache {
    async fn resolve(&mut self, store: &dyn BlogStore, id: &UserId) -> Result<Option<User>> {
        if let Some(user) = self.users.get(id) {
            return Ok(user.clone());
        }
        let user = store.get_user(id).await?;
        self.users.insert(id.clone(), user.clone());
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::memory::MemoryStore;
    use crate::uploads::UploadConfig;
    use tempfile::TempDir;

    struct Fixture {
        service: BlogService,
        owner: User,
        stranger: User,
        _tmp: TempDir,
    }

    async fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let uploads = DiskUploads::new(UploadConfig::new(tmp.path()));
        let service = BlogService::new(Arc::new(MemoryStore::new()), uploads);

        let owner = service
            .identify(User::new(UserId::new("owner").unwrap(), "Olive Owner"))
            .await
            .unwrap();
        let stranger = service
            .identify(User::new(UserId::new("stranger").unwrap(), "Sam Stranger"))
            .await
            .unwrap();

        Fixture {
            service,
            owner,
            stranger,
            _tmp: tmp,
        }
    }

    fn kind(err: &anyhow::Error) -> ErrorKind {
        BlogError::from_anyhow(err).expect("blog error").kind
    }

    #[tokio::test]
    async fn create_without_file_uses_default_cover() {
        let f = fixture().await;
        let post = f
            .service
            .create_post(&f.owner, PostInput::new("A", "B"), None)
            .await
            .unwrap();

        assert_eq!(post.cover_image_url, DEFAULT_COVER);
        assert_eq!(post.created_by, f.owner.id);
    }

    #[tokio::test]
    async fn create_with_file_uses_upload_url() {
        let f = fixture().await;
        let file = f
            .service
            .uploads()
            .store_bytes("cover.png", Some("image/png"), b"png")
            .await
            .unwrap();

        let post = f
            .service
            .create_post(&f.owner, PostInput::new("A", "B"), Some(file.clone()))
            .await
            .unwrap();

        assert_eq!(post.cover_image_url, file.url());
        assert!(post.cover_image_url.starts_with("/uploads/"));
        assert!(post.cover_image_url.ends_with("-cover.png"));
    }

    #[tokio::test]
    async fn create_with_blank_title_is_unprocessable_and_drops_the_upload() {
        let f = fixture().await;
        let file = f
            .service
            .uploads()
            .store_bytes("cover.png", None, b"png")
            .await
            .unwrap();

        let err = f
            .service
            .create_post(&f.owner, PostInput::new("  ", "B"), Some(file.clone()))
            .await
            .unwrap_err();

        assert_eq!(kind(&err), ErrorKind::Unprocessable);
        assert!(!file.path.exists());
    }

    #[tokio::test]
    async fn show_missing_post_is_not_found() {
        let f = fixture().await;
        let err = f.service.show_post(&PostId::new()).await.unwrap_err();
        assert_eq!(kind(&err), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn show_post_resolves_authors_and_keeps_comment_order() {
        let f = fixture().await;
        let post = f
            .service
            .create_post(&f.owner, PostInput::new("A", "B"), None)
            .await
            .unwrap();

        for (who, text) in [(&f.stranger, "one"), (&f.owner, "two"), (&f.stranger, "three")] {
            f.service.add_comment(who, &post.id, text).await.unwrap();
        }

        let page = f.service.show_post(&post.id).await.unwrap();
        assert_eq!(page.blog.author.as_ref().unwrap().full_name, "Olive Owner");

        let seen: Vec<_> = page
            .comments
            .iter()
            .map(|c| {
                (
                    c.comment.content.as_str(),
                    c.author.as_ref().unwrap().full_name.as_str(),
                )
            })
            .collect();
        assert_eq!(
            seen,
            vec![
                ("one", "Sam Stranger"),
                ("two", "Olive Owner"),
                ("three", "Sam Stranger")
            ]
        );
    }

    #[tokio::test]
    async fn comment_on_missing_post_is_rejected() {
        let f = fixture().await;
        let ghost = PostId::new();
        let err = f
            .service
            .add_comment(&f.owner, &ghost, "hello")
            .await
            .unwrap_err();

        assert_eq!(kind(&err), ErrorKind::NotFound);
        assert!(f.service.store().find_comments(&ghost).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_comment_is_unprocessable() {
        let f = fixture().await;
        let post = f
            .service
            .create_post(&f.owner, PostInput::new("A", "B"), None)
            .await
            .unwrap();

        let err = f
            .service
            .add_comment(&f.owner, &post.id, "   ")
            .await
            .unwrap_err();
        assert_eq!(kind(&err), ErrorKind::Unprocessable);
    }

    #[tokio::test]
    async fn non_owner_cannot_edit_or_update_and_post_is_unchanged() {
        let f = fixture().await;
        let post = f
            .service
            .create_post(&f.owner, PostInput::new("A", "B"), None)
            .await
            .unwrap();

        let err = f.service.edit_post(&f.stranger, &post.id).await.unwrap_err();
        assert_eq!(kind(&err), ErrorKind::Forbidden);

        for _ in 0..2 {
            let err = f
                .service
                .update_post(&f.stranger, &post.id, PostInput::new("Hacked", "Hacked"), None)
                .await
                .unwrap_err();
            assert_eq!(kind(&err), ErrorKind::Forbidden);
        }

        let stored = f.service.store().get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(stored, post);
    }

    #[tokio::test]
    async fn rejected_update_drops_the_upload() {
        let f = fixture().await;
        let post = f
            .service
            .create_post(&f.owner, PostInput::new("A", "B"), None)
            .await
            .unwrap();
        let file = f
            .service
            .uploads()
            .store_bytes("new.png", None, b"png")
            .await
            .unwrap();

        f.service
            .update_post(&f.stranger, &post.id, PostInput::default(), Some(file.clone()))
            .await
            .unwrap_err();
        assert!(!file.path.exists());
    }

    #[tokio::test]
    async fn edit_and_update_of_missing_post_are_not_found() {
        let f = fixture().await;
        let ghost = PostId::new();

        let err = f.service.edit_post(&f.owner, &ghost).await.unwrap_err();
        assert_eq!(kind(&err), ErrorKind::NotFound);

        let err = f
            .service
            .update_post(&f.owner, &ghost, PostInput::new("x", "y"), None)
            .await
            .unwrap_err();
        assert_eq!(kind(&err), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn sequential_owner_updates_merge_field_by_field() {
        let f = fixture().await;
        let post = f
            .service
            .create_post(&f.owner, PostInput::new("A", "B"), None)
            .await
            .unwrap();

        f.service
            .update_post(&f.owner, &post.id, PostInput::new("A2", "B2"), None)
            .await
            .unwrap();
        let second = PostInput {
            title: None,
            body: Some("B3".into()),
        };
        let updated = f
            .service
            .update_post(&f.owner, &post.id, second, None)
            .await
            .unwrap();

        assert_eq!(updated.title, "A2");
        assert_eq!(updated.body, "B3");
        assert_eq!(updated.cover_image_url, DEFAULT_COVER);
    }

    #[tokio::test]
    async fn update_replaces_cover_only_when_a_file_is_given() {
        let f = fixture().await;
        let post = f
            .service
            .create_post(&f.owner, PostInput::new("A", "B"), None)
            .await
            .unwrap();
        let file = f
            .service
            .uploads()
            .store_bytes("new.png", None, b"png")
            .await
            .unwrap();

        let updated = f
            .service
            .update_post(&f.owner, &post.id, PostInput::default(), Some(file.clone()))
            .await
            .unwrap();
        assert_eq!(updated.cover_image_url, file.url());

        let again = f
            .service
            .update_post(&f.owner, &post.id, PostInput::new("T", ""), None)
            .await
            .unwrap();
        assert_eq!(again.cover_image_url, file.url());
        assert_eq!(again.title, "T");
        assert_eq!(again.body, "B");
    }
}
