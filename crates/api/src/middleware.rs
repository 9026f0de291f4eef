use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::context::{PRINCIPAL_HEADER, PrincipalContext};

/// Identity middleware: lift the gateway-supplied subject into a
/// [`PrincipalContext`]. Requests without one are rejected with 401.
pub async fn identity_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let subject = extract_subject(req.headers())?.to_string();
    req.extensions_mut().insert(PrincipalContext::new(subject));
    Ok(next.run(req).await)
}

fn extract_subject(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(PRINCIPAL_HEADER)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let subject = header
        .to_str()
        .map_err(|_| StatusCode::UNAUTHORIZED)?
        .trim();
    if subject.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(subject)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn subject_comes_from_principal_header() {
        let mut headers = HeaderMap::new();
        headers.insert(PRINCIPAL_HEADER, HeaderValue::from_static(" alice "));
        assert_eq!(extract_subject(&headers), Ok("alice"));
    }

    #[test]
    fn missing_or_blank_subject_is_unauthorized() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_subject(&headers), Err(StatusCode::UNAUTHORIZED));
        headers.insert(PRINCIPAL_HEADER, HeaderValue::from_static("   "));
        assert_eq!(extract_subject(&headers), Err(StatusCode::UNAUTHORIZED));
    }
}
