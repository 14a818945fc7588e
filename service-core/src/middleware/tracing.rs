//! Request correlation ids.

use axum::http::HeaderValue;
use axum::{extract::Request, middleware::Next, response::Response};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Caller-supplied ids longer than this are replaced.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Correlation id of the current request, also stored in request extensions.
#[derive(Debug, Clone)]
pub struct RequestId(pub HeaderValue);

/// Keep the caller's `x-request-id` when it is short printable ASCII,
/// otherwise mint a UUID. The id is set on both the request and the response.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .filter(|value| is_acceptable(value))
        .cloned()
        .unwrap_or_else(new_request_id);

    req.headers_mut()
        .insert(REQUEST_ID_HEADER, request_id.clone());
    req.extensions_mut().insert(RequestId(request_id.clone()));

    let mut response = next.run(req).await;
    response.headers_mut().insert(REQUEST_ID_HEADER, request_id);

    response
}

fn is_acceptable(value: &HeaderValue) -> bool {
    let bytes = value.as_bytes();
    !bytes.is_empty()
        && bytes.len() <= MAX_REQUEST_ID_LEN
        && bytes.iter().all(|b| b.is_ascii_graphic())
}

fn new_request_id() -> HeaderValue {
    HeaderValue::from_str(&Uuid::new_v4().to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("unknown"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_and_oversized_ids() {
        assert!(!is_acceptable(&HeaderValue::from_static("")));
        assert!(!is_acceptable(&HeaderValue::from_static("has space")));
        let long = "a".repeat(MAX_REQUEST_ID_LEN + 1);
        assert!(!is_acceptable(&HeaderValue::from_str(&long).unwrap()));
        assert!(is_acceptable(&HeaderValue::from_static("req-42")));
    }

    #[test]
    fn minted_ids_are_uuids() {
        let id = new_request_id();
        assert!(Uuid::parse_str(id.to_str().unwrap()).is_ok());
    }
}
