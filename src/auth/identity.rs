use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, Algorithm, DecodingKey, TokenData, Validation};
use tracing::{debug, info};

/// Authenticated user attached to a websocket connection. Absent for
/// anonymous participants.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub username: Option<String>,
}

// Get the auth token from request headers
pub fn get_auth_token(headers: &HeaderMap) -> Result<String, String> {
    // 1. Try to get token from Authorization header
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| "Invalid Authorization header".to_string())?;
        Ok(auth_str
            .strip_prefix("Bearer ")
            .unwrap_or(auth_str)
            .to_string())
    }
    // 2. Try to get token from cookies
    else {
        let cookie_header = headers
            .get(header::COOKIE)
            .ok_or_else(|| "Missing Authorization header or Cookie".to_string())?
            .to_str()
            .map_err(|_| "Invalid Cookie header".to_string())?;

        for cookie in cookie::Cookie::split_parse(cookie_header).flatten() {
            if cookie.name() == "auth_token" {
                return Ok(cookie.value().to_string());
            }
        }
        Err("auth_token cookie not found".to_string())
    }
}

// Validate a JWT token and return the token data
pub fn validate_jwt(
    token: &str,
    secret: &str,
) -> Result<TokenData<serde_json::Value>, jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    decode::<serde_json::Value>(token, &decoding_key, &validation)
}

/// Resolve the identity carried by a request, if any. A missing or invalid
/// token degrades to an anonymous connection rather than a rejection.
pub fn identity_from_headers(headers: &HeaderMap) -> Option<Identity> {
    let secret = crate::config::get_config().auth_jwt_secret.as_ref()?;
    let token = match get_auth_token(headers) {
        Ok(token) => token,
        Err(e) => {
            debug!("No auth token on connection: {}", e);
            return None;
        }
    };
    match validate_jwt(&token, secret) {
        Ok(token_data) => {
            let user_id = token_data.claims.get("sub").and_then(|v| v.as_str())?;
            info!("JWT token validated successfully for user: {}", user_id);
            let username = token_data
                .claims
                .get("username")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            Some(Identity {
                user_id: user_id.to_string(),
                username,
            })
        }
        Err(e) => {
            debug!("JWT validation failed, treating connection as anonymous: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn make_token(secret: &str, claims: serde_json::Value) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer header-token"),
        );
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("auth_token=cookie-token"),
        );
        assert_eq!(get_auth_token(&headers).unwrap(), "header-token");
    }

    #[test]
    fn cookie_is_used_when_header_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; auth_token=cookie-token"),
        );
        assert_eq!(get_auth_token(&headers).unwrap(), "cookie-token");
    }

    #[test]
    fn missing_token_is_an_error() {
        let headers = HeaderMap::new();
        assert!(get_auth_token(&headers).is_err());
    }

    #[test]
    fn valid_jwt_round_trips_claims() {
        let secret = "test-secret";
        let exp = chrono::Utc::now().timestamp() + 3600;
        let token = make_token(
            secret,
            serde_json::json!({ "sub": "u-42", "username": "ada", "exp": exp }),
        );
        let data = validate_jwt(&token, secret).unwrap();
        assert_eq!(data.claims.get("sub").and_then(|v| v.as_str()), Some("u-42"));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let exp = chrono::Utc::now().timestamp() + 3600;
        let token = make_token("one-secret", serde_json::json!({ "sub": "u", "exp": exp }));
        assert!(validate_jwt(&token, "another-secret").is_err());
    }
}
