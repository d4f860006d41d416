use axum::http::{header, HeaderMap};

use crate::error::{ApiError, Result};

/// Bearer token carried by `headers`, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Mutating routes need a bearer token. With `expected` configured it must
/// match exactly; without one any non-empty token is accepted.
pub fn authorize(headers: &HeaderMap, expected: Option<&str>) -> Result<()> {
    let token = bearer_token(headers).ok_or(ApiError::Unauthorized)?;
    match expected {
        Some(expected) if expected != token => Err(ApiError::Unauthorized),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_authorize() {
        assert!(authorize(&headers("Bearer abc"), Some("abc")).is_ok());
        assert!(authorize(&headers("Bearer abc"), None).is_ok());
        assert!(matches!(
            authorize(&headers("Bearer xyz"), Some("abc")),
            Err(ApiError::Unauthorized)
        ));
        assert!(matches!(authorize(&HeaderMap::new(), None), Err(ApiError::Unauthorized)));
    }
}
