use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use blog_core::BlogError;

#[derive(Debug)]
pub struct BlogAxumError(pub anyhow::Error);

impl From<anyhow::Error> for BlogAxumError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl From<BlogError> for BlogAxumError {
    fn from(e: BlogError) -> Self {
        Self(e.into_anyhow())
    }
}

impl IntoResponse for BlogAxumError {
    fn into_response(self) -> Response {
        // A BlogError anywhere in the chain decides the status; anything else is a 500.
        let safe = match BlogError::from_anyhow(&self.0) {
            Some(blog) => blog.sanitize_for_client(),
            None => BlogError::general_error(self.0.to_string()).sanitize_for_client(),
        };

        if safe.kind.is_server_error() {
            tracing::error!(error = ?self.0, "request failed");
        } else {
            tracing::debug!(status = safe.code(), error = %self.0, "request rejected");
        }

        let status =
            StatusCode::from_u16(safe.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, safe.to_plain_text()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use serde_json::json;

    async fn text(res: Response) -> String {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn client_errors_keep_their_message() {
        let res = BlogAxumError::from(BlogError::forbidden("Unauthorized")).into_response();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            res.headers()["content-type"],
            "text/plain; charset=utf-8"
        );
        assert_eq!(text(res).await, "Unauthorized");
    }

    #[tokio::test]
    async fn foreign_errors_are_hidden_behind_500() {
        let res = BlogAxumError::from(anyhow::anyhow!("db password is hunter2")).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(text(res).await, "Internal Server Error");
    }

    #[tokio::test]
    async fn validation_errors_list_fields() {
        let err = BlogError::unprocessable("Comment validation failed")
            .with_errors(json!({"content": ["must not be empty"]}));
        let res = BlogAxumError::from(err).into_response();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            text(res).await,
            "Comment validation failed\ncontent: must not be empty"
        );
    }
}
