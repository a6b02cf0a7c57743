//! Server-side pages rendered with MiniJinja.
//!
//! Templates are compiled into the binary. `.html` templates are
//! auto-escaped.

use axum::response::Html;
use blog_core::BlogError;
use minijinja::Environment;
use serde::Serialize;

use crate::BlogAxumError;

const TEMPLATES: &[(&str, &str)] = &[
    ("layout.html", include_str!("../templates/layout.html")),
    ("home.html", include_str!("../templates/home.html")),
    ("add_blog.html", include_str!("../templates/add_blog.html")),
    ("blog.html", include_str!("../templates/blog.html")),
    ("edit_blog.html", include_str!("../templates/edit_blog.html")),
];

pub struct Views {
    env: Environment<'static>,
}

impl Views {
    /// Parse every bundled template. Syntax errors surface here, at startup.
    pub fn new() -> anyhow::Result<Self> {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            env.add_template(*name, *source)?;
        }
        Ok(Self { env })
    }

    pub fn render<C: Serialize>(&self, name: &str, ctx: C) -> Result<Html<String>, BlogAxumError> {
        let html = self
            .env
            .get_template(name)
            .and_then(|tmpl| tmpl.render(ctx))
            .map_err(|e| {
                BlogError::general_error(format!("Failed to render {name}"))
                    .with_source(e.into())
            })?;
        Ok(Html(html))
    }
}
