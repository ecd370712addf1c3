use axum::extract::FromRequest;

use crate::error::{ApiError, Result};

/// JSON body whose rejections (bad syntax, wrong content type) become 400s.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Urlencoded form body with the same rejection mapping as [`ApiJson`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Form), rejection(ApiError))]
pub struct ApiForm<T>(pub T);

/// A field that must be present and not blank.
pub fn required(value: Option<String>, message: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ApiError::Validation(message.to_string())),
    }
}

/// A field that may be absent, but must not be blank when supplied.
pub fn non_blank(value: Option<String>, message: &str) -> Result<Option<String>> {
    match value {
        Some(v) if v.trim().is_empty() => Err(ApiError::Validation(message.to_string())),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_rejects_missing_and_blank() {
        assert!(required(None, "m").is_err());
        assert!(required(Some(String::new()), "m").is_err());
        assert!(required(Some("  \t".into()), "m").is_err());
        assert_eq!(required(Some("ok".into()), "m").unwrap(), "ok");
    }

    #[test]
    fn non_blank_allows_absent() {
        assert_eq!(non_blank(None, "m").unwrap(), None);
        assert_eq!(non_blank(Some("x".into()), "m").unwrap().as_deref(), Some("x"));
        assert!(matches!(non_blank(Some(" ".into()), "m"), Err(ApiError::Validation(_))));
    }
}
