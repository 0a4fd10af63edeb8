use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::Response,
    Json,
};
use tracing::{error, info};

use crate::auth::identity::{get_auth_token, validate_jwt};
use crate::config;
use crate::models::ErrorResponse;

fn reject(status: StatusCode, error: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            code: status.as_u16(),
            status: status.canonical_reason().unwrap_or("Error").to_string(),
            error: error.to_string(),
        }),
    )
}

/// Admin-surface guard: requests must carry a token signed with the
/// configured secret. The websocket endpoint stays open to anonymous
/// connections; this middleware only fronts the REST routes it is layered on.
pub async fn auth_middleware(
    mut req: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    // 1. Get the auth token from the request
    let token = match get_auth_token(req.headers()) {
        Ok(token) => token,
        Err(e) => return Err(reject(StatusCode::UNAUTHORIZED, &e)),
    };

    // 2. Validate the token
    let config = config::get_config();
    let secret = match &config.auth_jwt_secret {
        Some(secret) => secret,
        None => {
            error!("Auth JWT secret not configured");
            return Err(reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Auth JWT secret not configured",
            ));
        }
    };
    let token_data = match validate_jwt(&token, secret) {
        Ok(token_data) => token_data,
        Err(e) => {
            error!("JWT validation failed: {}", e);
            return Err(reject(StatusCode::UNAUTHORIZED, "Invalid token"));
        }
    };

    // 3. Extract the subject and expose it to downstream handlers
    let user_id = match token_data.claims.get("sub").and_then(|v| v.as_str()) {
        Some(sub) => sub.to_string(),
        None => {
            error!("JWT token does not contain 'sub' claim");
            return Err(reject(StatusCode::UNAUTHORIZED, "Token missing subject"));
        }
    };
    info!("Token validated successfully for user: {}", user_id);
    req.extensions_mut().insert(user_id);

    Ok(next.run(req).await)
}
