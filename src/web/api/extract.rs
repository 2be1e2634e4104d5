use crate::error::AppError;
use axum::extract::FromRequest;

/// `axum::Json` with rejections mapped to [`AppError::Validation`], so a
/// malformed or incomplete body gets the same 400 `{"message"}` shape as
/// every other input error.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);
