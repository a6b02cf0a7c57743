use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::{Validate, ValidationErrors};

use crate::errors::BlogError;
use crate::ids::{CommentId, PostId, UserId};

/// A user as seen by the blog: whatever upstream authentication told us.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub full_name: String,
    pub email: Option<String>,
}

impl User {
    pub fn new(id: UserId, full_name: impl Into<String>) -> Self {
        Self {
            id,
            full_name: full_name.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub id: PostId,
    pub title: String,
    pub body: String,
    #[serde(rename = "coverImageURL")]
    pub cover_image_url: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BlogPost {
    /// Only the creator may edit or update a post.
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.created_by == user
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub content: String,
    pub blog_id: PostId,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// Raw `title` / `body` form fields, as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostInput {
    pub title: Option<String>,
    pub body: Option<String>,
}

impl PostInput {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            body: Some(body.into()),
        }
    }

    /// Trimmed title, `None` when absent or blank.
    pub fn title(&self) -> Option<String> {
        non_blank(self.title.as_deref())
    }

    /// Trimmed body, `None` when absent or blank.
    pub fn body(&self) -> Option<String> {
        non_blank(self.body.as_deref())
    }
}

fn non_blank(v: Option<&str>) -> Option<String> {
    v.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Everything the store needs to create a post.
#[derive(Debug, Clone, Validate)]
pub struct NewPost {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub title: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub body: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub cover_image_url: String,
    pub created_by: UserId,
}

#[derive(Debug, Clone, Validate)]
pub struct NewComment {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub content: String,
    pub blog_id: PostId,
    pub created_by: UserId,
}

/// Merge update: only the fields that are `Some` replace stored values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostPatch {
    pub title: Option<String>,
    pub body: Option<String>,
    pub cover_image_url: Option<String>,
}

impl PostPatch {
    pub fn from_input(input: &PostInput, cover_image_url: Option<String>) -> Self {
        Self {
            title: input.title(),
            body: input.body(),
            cover_image_url,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_none() && self.cover_image_url.is_none()
    }

    pub fn apply(self, post: &mut BlogPost) {
        if let Some(title) = self.title {
            post.title = title;
        }
        if let Some(body) = self.body {
            post.body = body;
        }
        if let Some(url) = self.cover_image_url {
            post.cover_image_url = url;
        }
    }
}

/// A post with its creator resolved.
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: BlogPost,
    pub author: Option<User>,
}

/// A comment with its creator resolved.
#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: Option<User>,
}

/// Everything the single-post page shows.
#[derive(Debug, Clone, Serialize)]
pub struct PostPage {
    pub blog: PostView,
    pub comments: Vec<CommentView>,
}

/// Run `validator` rules and turn failures into an Unprocessable error
/// carrying `{field: [messages]}`.
pub fn validate_or_unprocessable<T: Validate>(value: &T, message: &str) -> Result<(), BlogError> {
    value
        .validate()
        .map_err(|errs| BlogError::unprocessable(message).with_errors(field_errors_json(&errs)))
}

fn field_errors_json(errs: &ValidationErrors) -> Value {
    let mut out = Map::new();
    for (field, problems) in errs.field_errors() {
        let messages = problems
            .iter()
            .map(|p| {
                p.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| p.code.to_string())
            })
            .map(Value::String)
            .collect();
        out.insert(field.to_string(), Value::Array(messages));
    }
    Value::Object(out)
}
