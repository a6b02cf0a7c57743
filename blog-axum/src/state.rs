use std::sync::Arc;

use blog_core::{BlogConfigSnapshot, BlogService, PostId};

use crate::identity::IdentityHeaders;
use crate::views::Views;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub blog: Arc<BlogService>,
    pub views: Arc<Views>,
    pub identity: Arc<IdentityHeaders>,
    pub config: Arc<BlogConfigSnapshot>,
    /// Normalized mount point, e.g. `/blog`
    pub mount: Arc<str>,
}

impl AppState {
    /// Public URL of a post's page.
    pub fn post_url(&self, id: &PostId) -> String {
        format!("{}/{}", self.mount, id)
    }
}
