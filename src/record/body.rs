//! JSON request bodies that are rejected with the crate's own errors.

use axum::extract::{FromRequest, rejection::JsonRejection};

use crate::Error;

/// Like [axum::Json], but a body that cannot be parsed is rejected with
/// [Error::InvalidBody], so the client gets the same `{"detail": ...}`
/// response as for any other validation error.
#[derive(Debug, Clone, FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
pub struct JsonBody<T>(pub T);

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::InvalidBody(rejection.body_text())
    }
}
