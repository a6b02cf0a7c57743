//! Post form extraction.
//!
//! `multipart/form-data` bodies are parsed with multer and the cover image
//! field is streamed straight into [`DiskUploads`]; plain urlencoded forms
//! are accepted too and never carry a file.

use axum::{
    extract::{rejection::FormRejection, FromRequest, Request},
    http::{header::CONTENT_TYPE, StatusCode},
    Form,
};
use blog_core::{BlogError, DiskUploads, PostInput, StoredFile, UploadConfig};
use bytes::Bytes;
use futures::Stream;

use crate::{AppState, BlogAxumError};

/// `title`, `body` and the optional cover image of a create/update request.
#[derive(Debug, Default)]
pub struct PostForm {
    pub input: PostInput,
    pub cover: Option<StoredFile>,
}

impl FromRequest<AppState> for PostForm {
    type Rejection = BlogAxumError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if content_type.starts_with("multipart/form-data") {
            let boundary = multer::parse_boundary(&content_type).map_err(bad_multipart)?;
            let stream = req.into_body().into_data_stream();
            return read_multipart(stream, boundary, state.blog.uploads()).await;
        }

        let Form(input) = Form::<PostInput>::from_request(req, state)
            .await
            .map_err(map_form_rejection)?;
        Ok(PostForm { input, cover: None })
    }
}

/// Keep the status axum picked for the rejection; only the body is ours.
pub fn map_form_rejection(rejection: FormRejection) -> BlogAxumError {
    let err = match rejection.status() {
        StatusCode::PAYLOAD_TOO_LARGE => BlogError::payload_too_large("Form body is too large"),
        StatusCode::UNSUPPORTED_MEDIA_TYPE => {
            BlogError::unsupported_media_type("Expected a form body")
        }
        StatusCode::UNPROCESSABLE_ENTITY => BlogError::unprocessable(format!(
            "Failed to deserialize the form body: {}",
            rejection.body_text()
        )),
        _ => BlogError::bad_request(format!(
            "Failed to parse the form body: {}",
            rejection.body_text()
        )),
    };
    err.into()
}

fn bad_multipart(err: multer::Error) -> BlogAxumError {
    let err = match err {
        multer::Error::FieldSizeExceeded { limit, field_name } => {
            BlogError::payload_too_large(format!(
                "Field '{}' exceeds maximum size of {limit} bytes",
                field_name.unwrap_or_default()
            ))
        }
        multer::Error::StreamSizeExceeded { limit } => BlogError::payload_too_large(format!(
            "Request body exceeds maximum size of {limit} bytes"
        )),
        other => BlogError::bad_request(format!("Failed to parse multipart data: {other}")),
    };
    err.into()
}

/// Text fields get `max_field_bytes` each. The file field is capped by the
/// whole-body limit here and by `max_file_bytes` while it is written.
fn constraints(config: &UploadConfig) -> multer::Constraints {
    let whole = config
        .max_file_bytes
        .map_or(u64::MAX, |file| {
            file.saturating_add(config.max_field_bytes.saturating_mul(4))
        });
    multer::Constraints::new().size_limit(
        multer::SizeLimit::new()
            .whole_stream(whole)
            .per_field(config.max_field_bytes)
            .for_field(config.field.clone(), whole),
    )
}

async fn read_multipart<S, E>(
    stream: S,
    boundary: String,
    uploads: &DiskUploads,
) -> Result<PostForm, BlogAxumError>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    let mut multipart =
        multer::Multipart::with_constraints(stream, boundary, constraints(uploads.config()));
    let mut form = PostForm::default();

    let res = async {
        while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
            let name = field.name().unwrap_or_default().to_string();

            if name == uploads.config().field {
                if form.cover.is_some() {
                    tracing::debug!(field = %name, "ignoring extra file part");
                    continue;
                }
                form.cover = store_file(field, uploads).await?;
                continue;
            }

            match name.as_str() {
                "title" => form.input.title = Some(field.text().await.map_err(bad_multipart)?),
                "body" => form.input.body = Some(field.text().await.map_err(bad_multipart)?),
                _ => {}
            }
        }
        Ok::<(), BlogAxumError>(())
    }
    .await;

    if let Err(e) = res {
        if let Some(file) = form.cover.take() {
            uploads.discard(&file).await;
        }
        return Err(e);
    }
    Ok(form)
}

/// Stream one file part to disk. An empty part without a filename is the
/// browser's "no file chosen" and yields `None`.
async fn store_file(
    mut field: multer::Field<'_>,
    uploads: &DiskUploads,
) -> Result<Option<StoredFile>, BlogAxumError> {
    let original = field.file_name().unwrap_or_default().trim().to_string();
    let content_type = field.content_type().map(|m| m.essence_str().to_string());

    let mut next = field.chunk().await.map_err(bad_multipart)?;
    if original.is_empty() && next.as_ref().map_or(true, |c| c.is_empty()) {
        return Ok(None);
    }

    let mut pending = uploads
        .begin(&original, content_type.as_deref())
        .await
        .map_err(BlogError::from)?;

    while let Some(chunk) = next {
        if let Err(e) = pending.write_chunk(&chunk).await {
            pending.abort().await;
            return Err(BlogError::from(e).into());
        }
        next = match field.chunk().await {
            Ok(chunk) => chunk,
            Err(e) => {
                pending.abort().await;
                return Err(bad_multipart(e));
            }
        };
    }

    let stored = pending.finish().await.map_err(BlogError::from)?;
    Ok(Some(stored))
}
