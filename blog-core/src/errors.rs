//! # Errors
//!
//! Blog operations return `anyhow::Result`. Failures that the HTTP edge
//! must translate into a specific status travel inside the `anyhow::Error`
//! as a [`BlogError`], which the transport recovers by walking the error
//! chain. Anything that is not a `BlogError` is treated as a general
//! (500) error.

use std::fmt;

use anyhow::Error as AnyError;
use serde_json::Value;

/// A convenience result type for blog core APIs.
pub type BlogResult<T> = std::result::Result<T, AnyError>;

/// Error classes with their HTTP status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,           // 400
    NotAuthenticated,     // 401
    Forbidden,            // 403
    NotFound,             // 404
    PayloadTooLarge,      // 413
    UnsupportedMediaType, // 415
    Unprocessable,        // 422
    GeneralError,         // 500
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::NotAuthenticated => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::PayloadTooLarge => 413,
            ErrorKind::UnsupportedMediaType => 415,
            ErrorKind::Unprocessable => 422,
            ErrorKind::GeneralError => 500,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::NotAuthenticated => "NotAuthenticated",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::PayloadTooLarge => "PayloadTooLarge",
            ErrorKind::UnsupportedMediaType => "UnsupportedMediaType",
            ErrorKind::Unprocessable => "Unprocessable",
            ErrorKind::GeneralError => "GeneralError",
        }
    }

    /// Server-side failures whose message must not reach the client.
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

/// A structured blog error that can live inside `anyhow::Error`.
///
/// - kind (status code + name)
/// - message
/// - errors (optional per-field detail, e.g. validation)
/// - source (never sent to clients)
#[derive(Debug)]
pub struct BlogError {
    pub kind: ErrorKind,
    pub message: String,
    pub errors: Option<Value>,
    pub source: Option<AnyError>,
}

impl BlogError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            errors: None,
            source: None,
        }
    }

    pub fn with_errors(mut self, errors: Value) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn with_source(mut self, source: AnyError) -> Self {
        self.source = Some(source);
        self
    }

    pub fn code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Convert into `anyhow::Error` so it flows through `?`.
    pub fn into_anyhow(self) -> AnyError {
        AnyError::new(self)
    }

    /// Find a `BlogError` anywhere in the chain (context layers included).
    pub fn from_anyhow(err: &AnyError) -> Option<&BlogError> {
        err.chain().find_map(|e| e.downcast_ref::<BlogError>())
    }

    /// A copy suitable for returning to clients: server errors lose their
    /// message, every error loses its source.
    pub fn sanitize_for_client(&self) -> BlogError {
        if self.kind.is_server_error() {
            return BlogError::new(self.kind, "Internal Server Error");
        }

        BlogError {
            kind: self.kind,
            message: self.message.clone(),
            errors: self.errors.clone(),
            source: None,
        }
    }

    /// Plain-text body: the message, then one line per field error.
    pub fn to_plain_text(&self) -> String {
        let mut out = self.message.clone();

        if let Some(Value::Object(fields)) = &self.errors {
            for (field, problems) in fields {
                let problems = match problems {
                    Value::Array(items) => items
                        .iter()
                        .map(|p| p.as_str().map(str::to_string).unwrap_or_else(|| p.to_string()))
                        .collect::<Vec<_>>()
                        .join(", "),
                    other => other.to_string(),
                };
                out.push_str(&format!("\n{field}: {problems}"));
            }
        }

        out
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, msg)
    }
    pub fn not_authenticated(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotAuthenticated, msg)
    }
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, msg)
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }
    pub fn payload_too_large(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::PayloadTooLarge, msg)
    }
    pub fn unsupported_media_type(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedMediaType, msg)
    }
    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unprocessable, msg)
    }
    pub fn general_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::GeneralError, msg)
    }
}

impl fmt::Display for BlogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.code(), self.message)
    }
}

impl std::error::Error for BlogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| {
            let inner: &(dyn std::error::Error + 'static) = e.as_ref();
            inner
        })
    }
}

/// Bail out of an `anyhow::Result` function with a `BlogError`.
#[macro_export]
macro_rules! bail_blog {
    ($ctor:ident, $msg:expr) => {
        return Err($crate::errors::BlogError::$ctor($msg).into_anyhow())
    };
    ($ctor:ident, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::errors::BlogError::$ctor(format!($fmt, $($arg)*)).into_anyhow())
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blog_error_survives_context_layers() {
        let err = BlogError::forbidden("Unauthorized")
            .into_anyhow()
            .context("while editing");

        let found = BlogError::from_anyhow(&err).expect("blog error in chain");
        assert_eq!(found.kind, ErrorKind::Forbidden);
        assert_eq!(found.code(), 403);
    }

    #[test]
    fn server_errors_are_scrubbed_for_clients() {
        let err = BlogError::general_error("connection string postgres://secret")
            .with_source(anyhow::anyhow!("boom"));
        let safe = err.sanitize_for_client();
        assert_eq!(safe.message, "Internal Server Error");
        assert!(safe.source.is_none());
    }

    #[test]
    fn plain_text_lists_field_errors() {
        let err = BlogError::unprocessable("Blog validation failed")
            .with_errors(json!({"title": ["must not be empty"]}));
        assert_eq!(
            err.to_plain_text(),
            "Blog validation failed\ntitle: must not be empty"
        );
    }
}
