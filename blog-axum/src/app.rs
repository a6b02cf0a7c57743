use std::sync::Arc;

use axum::handler::Handler;
use axum::routing::get;
use axum::Router;
use blog_core::config::{BLOG_DEFAULT_COVER, BLOG_MOUNT, STATIC_IMAGES_DIR};
use blog_core::service::DEFAULT_COVER;
use blog_core::{BlogConfig, BlogService, BlogStore, DiskUploads, UploadConfig};
use tokio::net::{TcpListener, ToSocketAddrs};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::identity::IdentityHeaders;
use crate::routes;
use crate::views::Views;
use crate::AppState;

#[derive(Clone)]
pub struct BlogApp {
    pub state: AppState,
    pub router: Router<()>,
}

impl BlogApp {
    /// Wire service, views, identity and static files from `config`.
    pub fn new(config: BlogConfig, store: Arc<dyn BlogStore>) -> anyhow::Result<Self> {
        let snapshot = config.snapshot();

        let uploads_config = UploadConfig::from_snapshot(&snapshot);
        let uploads_dir = uploads_config.dir.clone();
        let uploads_prefix = mount_path(&uploads_config.url_prefix)?;
        let uploads = DiskUploads::new(uploads_config);

        let blog = BlogService::new(store, uploads)
            .with_default_cover(snapshot.get_or(BLOG_DEFAULT_COVER, DEFAULT_COVER));

        let state = AppState {
            blog: Arc::new(blog),
            views: Arc::new(Views::new()?),
            identity: Arc::new(IdentityHeaders::from_snapshot(&snapshot)?),
            mount: mount_path(&snapshot.get_or(BLOG_MOUNT, "/blog"))?.into(),
            config: Arc::new(snapshot.clone()),
        };

        tracing::info!(
            mount = %state.mount,
            uploads = %uploads_dir.display(),
            "blog configured"
        );

        let images_dir = snapshot.get_or(STATIC_IMAGES_DIR, "./public/images");

        let router = routes::router(state.clone())
            .nest_service(&uploads_prefix, ServeDir::new(uploads_dir))
            .nest_service("/images", ServeDir::new(images_dir));

        Ok(Self { state, router }
            .service("/health", routes::health)
            .with_tracing())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.state.config.get_string(key)
    }

    pub fn use_router(mut self, path: &str, router: Router<()>) -> Self {
        self.router = self.router.nest(path, router);
        self
    }

    pub fn service<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()> + Clone + Send + Sync + 'static,
        T: 'static,
    {
        let router = Router::new().route("/", get(handler));
        self.use_router(path, router)
    }

    /// Request ids (generated unless supplied) and per-request spans.
    fn with_tracing(mut self) -> Self {
        self.router = self.router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        );
        self
    }

    pub async fn listen<A>(self, addr: A) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
    {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "blog listening");
        axum::serve(listener, self.router).await?;
        Ok(())
    }
}

/// `/blog/` and `blog` both become `/blog`. The root is not a valid mount.
fn mount_path(raw: &str) -> anyhow::Result<String> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        anyhow::bail!("mount path must not be the root: {raw:?}");
    }
    Ok(format!("/{trimmed}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mount_paths_are_normalized() {
        assert_eq!(mount_path("/blog/").unwrap(), "/blog");
        assert_eq!(mount_path("blog").unwrap(), "/blog");
        assert_eq!(mount_path("/a/b").unwrap(), "/a/b");
        assert!(mount_path("/").is_err());
        assert!(mount_path("").is_err());
    }
}
