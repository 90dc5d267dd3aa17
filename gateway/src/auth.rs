//! Static-token authorization stub.
//!
//! Only applied when a token is configured; the default deployment runs
//! without it. Unauthorized requests get 404 rather than 401 so the
//! gated deployment does not advertise itself.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

pub async fn static_auth(
    State(token): State<String>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let authorized = request
        .headers()
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == token);

    if !authorized {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(next.run(request).await)
}
