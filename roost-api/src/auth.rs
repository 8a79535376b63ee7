use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use roost_core::identity::{Caller, Role};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Account id.
    pub sub: String,
    /// "CUSTOMER" or "ADMIN".
    pub role: String,
    pub exp: usize,
}

/// Verifies the bearer token and injects the resolved [`Caller`] into the
/// request extensions. Session issuance lives in the identity service; this
/// side only consumes tokens.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let claims = token_data.claims;
    let caller = match claims.role.as_str() {
        "CUSTOMER" => Caller::customer(claims.sub),
        "ADMIN" => Caller::admin(claims.sub),
        _ => return Err(StatusCode::FORBIDDEN),
    };

    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}

/// Mints a token for local runs and tests.
pub fn issue_token(
    secret: &str,
    account_id: &str,
    role: Role,
    ttl_seconds: u64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: account_id.to_string(),
        role: match role {
            Role::Admin => "ADMIN".to_string(),
            _ => "CUSTOMER".to_string(),
        },
        exp: (chrono::Utc::now().timestamp() as usize) + ttl_seconds as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}
