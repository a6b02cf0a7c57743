//! blog-core: framework-agnostic core for the DogRS blog.
//!
//! Holds the document model (posts, comments, users), the storage adapter
//! trait with an in-memory store, the cover-image upload handler and
//! [`BlogService`], which implements every blog operation without any
//! knowledge of HTTP. The acting user is always passed in explicitly.

pub mod config;
pub mod errors;
pub mod ids;
pub mod memory;
pub mod models;
pub mod service;
pub mod store;
pub mod uploads;

pub use config::{BlogConfig, BlogConfigSnapshot};
pub use errors::{BlogError, ErrorKind};
pub use ids::{CommentId, PostId, UserId};
pub use memory::MemoryStore;
pub use models::{
    BlogPost, Comment, CommentView, NewComment, NewPost, PostInput, PostPage, PostPatch, PostView,
    User,
};
pub use service::BlogService;
pub use store::BlogStore;
pub use uploads::{
    DiskUploads, FilenameStrategy, PendingUpload, StoredFile, TimestampFilename, UploadConfig,
    UploadError,
};
