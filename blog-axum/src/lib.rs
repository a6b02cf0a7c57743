//! blog-axum: the DogRS blog served over axum.
//!
//! Routes live under `blog.mount` (default `/blog`), identity comes from
//! trusted upstream headers, cover images are streamed to disk and pages
//! are rendered with MiniJinja.

use std::sync::Arc;

use blog_core::{BlogConfig, BlogStore, MemoryStore};

pub mod app;
pub mod error;
pub mod identity;
pub mod multipart;
pub mod routes;
pub mod state;
pub mod views;

pub use app::BlogApp;
pub use error::BlogAxumError;
pub use identity::{CurrentUser, IdentityHeaders};
pub use multipart::PostForm;
pub use state::AppState;
pub use views::Views;

/// Build the app over an in-memory store.
pub fn build(config: BlogConfig) -> anyhow::Result<BlogApp> {
    build_with_store(config, Arc::new(MemoryStore::new()))
}

pub fn build_with_store(config: BlogConfig, store: Arc<dyn BlogStore>) -> anyhow::Result<BlogApp> {
    BlogApp::new(config, store)
}
