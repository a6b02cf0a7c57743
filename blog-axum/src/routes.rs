use axum::{
    extract::{rejection::FormRejection, Path, State},
    http::{header::LOCATION, StatusCode},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Router,
};
use blog_core::PostId;
use minijinja::context;
use serde::Deserialize;

use crate::identity::{attach_identity, CurrentUser};
use crate::multipart::{map_form_rejection, PostForm};
use crate::{AppState, BlogAxumError};

type HtmlResult = Result<Html<String>, BlogAxumError>;

/// Every page route, with identity attached. Static files are added by
/// [`crate::BlogApp`].
pub fn router(state: AppState) -> Router<()> {
    let blog = Router::new()
        .route("/", post(create_post))
        .route("/add-new", get(add_new))
        .route("/{id}", get(show_post))
        .route("/comment/{blog_id}", post(add_comment))
        .route("/edit/{id}", get(edit_post))
        .route("/update/{id}", post(update_post));

    Router::new()
        .route("/", get(home))
        .nest(&state.mount, blog)
        .layer(middleware::from_fn_with_state(state.clone(), attach_identity))
        .with_state(state)
}

pub async fn health() -> &'static str {
    "ok"
}

fn redirect(location: String) -> Response {
    (StatusCode::FOUND, [(LOCATION, location)]).into_response()
}

async fn home(State(state): State<AppState>, user: Option<CurrentUser>) -> HtmlResult {
    let posts = state.blog.list_posts().await?;
    state.views.render(
        "home.html",
        context! {
            mount => &*state.mount,
            user => user.map(|CurrentUser(u)| u),
            posts => posts,
        },
    )
}

async fn add_new(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> HtmlResult {
    state.views.render(
        "add_blog.html",
        context! { mount => &*state.mount, user => user },
    )
}

async fn show_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> HtmlResult {
    let id: PostId = id.parse()?;
    let page = state.blog.show_post(&id).await?;

    state.views.render(
        "blog.html",
        context! {
            mount => &*state.mount,
            user => user,
            blog => page.blog,
            comments => page.comments,
        },
    )
}

#[derive(Debug, Deserialize)]
struct CommentForm {
    content: Option<String>,
}

async fn add_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(blog_id): Path<String>,
    form: Result<Form<CommentForm>, FormRejection>,
) -> Result<Response, BlogAxumError> {
    let blog_id: PostId = blog_id.parse()?;
    let Form(form) = form.map_err(map_form_rejection)?;

    state
        .blog
        .add_comment(&user, &blog_id, form.content.as_deref().unwrap_or_default())
        .await?;

    Ok(redirect(state.post_url(&blog_id)))
}

async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    form: PostForm,
) -> Result<Response, BlogAxumError> {
    let post = state.blog.create_post(&user, form.input, form.cover).await?;
    Ok(redirect(state.post_url(&post.id)))
}

async fn edit_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> HtmlResult {
    let id: PostId = id.parse()?;
    let post = state.blog.edit_post(&user, &id).await?;

    state.views.render(
        "edit_blog.html",
        context! { mount => &*state.mount, user => user, blog => post },
    )
}

async fn update_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    form: PostForm,
) -> Result<Response, BlogAxumError> {
    let id: PostId = match id.parse() {
        Ok(id) => id,
        Err(e) => {
            if let Some(file) = &form.cover {
                state.blog.uploads().discard(file).await;
            }
            return Err(BlogAxumError::from(e));
        }
    };

    let post = state.blog.update_post(&user, &id, form.input, form.cover).await?;
    Ok(redirect(state.post_url(&post.id)))
}
