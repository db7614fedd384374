// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{config::Config, error::AppError};

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Claims {
    /// Subject - the caller's user id (as string).
    pub sub: String,
    /// Display name, recorded on participations.
    #[serde(default)]
    pub name: Option<String>,
    /// User's role (e.g., 'user', 'admin').
    pub role: String,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

impl Claims {
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.sub.clone())
    }

    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// Caller identity on routes where signing in is optional.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<Claims>);

/// Signs a new JWT.
///
/// Identity is issued elsewhere; this exists for tooling and tests.
pub fn sign_jwt(
    sub: &str,
    name: Option<&str>,
    role: &str,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize
        + expiration_seconds as usize;

    let claims = Claims {
        sub: sub.to_owned(),
        name: name.map(str::to_owned),
        role: role.to_owned(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a JWT string.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

fn bearer_token(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// Axum Middleware: Authentication.
///
/// Validates the 'Authorization: Bearer <token>' header and injects `Claims`
/// into the request extensions. Missing or invalid tokens get a 401.
pub async fn auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&req)
        .ok_or_else(|| AppError::AuthError("Missing bearer token".to_string()))?;

    let claims = verify_jwt(token, &config.jwt_secret)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Axum Middleware: Admin Authorization.
///
/// Must be used AFTER `auth_middleware`. Survey authoring and reports are
/// restricted to the 'admin' role.
pub async fn admin_middleware(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .ok_or_else(|| AppError::AuthError("Missing bearer token".to_string()))?;

    if !claims.is_admin() {
        return Err(AppError::Forbidden("Admin role required".to_string()));
    }

    Ok(next.run(req).await)
}

/// Axum Middleware: optional identity for participant routes.
///
/// Always inserts a `Viewer`. A present but invalid token is still rejected so
/// callers don't silently become anonymous.
pub async fn identify_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let viewer = match bearer_token(&req) {
        Some(token) => Viewer(Some(verify_jwt(token, &config.jwt_secret)?)),
        None => Viewer(None),
    };
    req.extensions_mut().insert(viewer);
    Ok(next.run(req).await)
}
