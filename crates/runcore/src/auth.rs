//! Minimal bearer-token authentication. Registration, login, and refresh
//! flows live outside this crate (see DESIGN.md); this module only provides
//! the `AuthUser` extractor handlers need to identify the caller from an
//! already-issued PASETO token.

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
};
use pasetors::claims::{Claims as PasetoClaims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::version4::V4;
use pasetors::{Local, local};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::errors::AppError;

fn get_paseto_key() -> Result<SymmetricKey<V4>, AppError> {
    let key_str = std::env::var("PASETO_KEY")
        .unwrap_or_else(|_| "run-ledger-dev-secret-change-in-production".to_string());

    let key_bytes: [u8; 32] = if key_str.len() == 64 && key_str.chars().all(|c| c.is_ascii_hexdigit())
    {
        let decoded: Vec<u8> = (0..64)
            .step_by(2)
            .map(|i| u8::from_str_radix(&key_str[i..i + 2], 16))
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|_| AppError::Internal("invalid PASETO_KEY hex".into()))?;
        decoded
            .try_into()
            .map_err(|_| AppError::Internal("invalid PASETO_KEY length".into()))?
    } else {
        let mut bytes = [0u8; 32];
        let input = key_str.as_bytes();
        let len = input.len().min(32);
        bytes[..len].copy_from_slice(&input[..len]);
        bytes
    };

    SymmetricKey::<V4>::from(&key_bytes)
        .map_err(|_| AppError::Internal("could not derive PASETO key".into()))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: i64,
    pub iat: i64,
}

pub fn create_token(user_id: Uuid) -> Result<String, AppError> {
    let key = get_paseto_key()?;
    let now = OffsetDateTime::now_utc();
    let exp = now + Duration::minutes(30);

    let mut claims =
        PasetoClaims::new().map_err(|_| AppError::Internal("claims init failed".into()))?;
    claims
        .subject(&user_id.to_string())
        .map_err(|_| AppError::Internal("claims subject failed".into()))?;
    claims
        .expiration(
            &exp.format(&time::format_description::well_known::Iso8601::DEFAULT)
                .map_err(|_| AppError::Internal("exp format failed".into()))?,
        )
        .map_err(|_| AppError::Internal("claims exp failed".into()))?;
    claims
        .issued_at(
            &now.format(&time::format_description::well_known::Iso8601::DEFAULT)
                .map_err(|_| AppError::Internal("iat format failed".into()))?,
        )
        .map_err(|_| AppError::Internal("claims iat failed".into()))?;

    local::encrypt(&key, &claims, None, None)
        .map_err(|_| AppError::Internal("token encryption failed".into()))
}

pub fn verify_token(token: &str) -> Result<Claims, AppError> {
    let key = get_paseto_key()?;
    let validation = ClaimsValidationRules::new();

    let untrusted =
        UntrustedToken::<Local, V4>::try_from(token).map_err(|_| AppError::AuthExpired)?;
    let trusted = local::decrypt(&key, &untrusted, &validation, None, None)
        .map_err(|_| AppError::AuthExpired)?;

    let payload = trusted.payload_claims().ok_or(AppError::AuthExpired)?;

    let sub = payload
        .get_claim("sub")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or(AppError::AuthExpired)?;
    let exp = payload
        .get_claim("exp")
        .and_then(|v| v.as_str())
        .and_then(|s| {
            OffsetDateTime::parse(s, &time::format_description::well_known::Iso8601::DEFAULT).ok()
        })
        .map(|t| t.unix_timestamp())
        .ok_or(AppError::AuthExpired)?;
    let iat = payload
        .get_claim("iat")
        .and_then(|v| v.as_str())
        .and_then(|s| {
            OffsetDateTime::parse(s, &time::format_description::well_known::Iso8601::DEFAULT).ok()
        })
        .map(|t| t.unix_timestamp())
        .ok_or(AppError::AuthExpired)?;

    if exp < OffsetDateTime::now_utc().unix_timestamp() {
        return Err(AppError::AuthExpired);
    }

    Ok(Claims { sub, exp, iat })
}

/// Extracts the caller's user id from a `Bearer` token. Rejects with
/// `AUTH_EXPIRED` on anything missing, malformed, or expired.
pub struct AuthUser(pub Uuid);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .ok_or(AppError::AuthExpired)?;

        let token = auth_header.strip_prefix("Bearer ").ok_or(AppError::AuthExpired)?;

        let claims = verify_token(token)?;
        Ok(AuthUser(claims.sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_roundtrip() {
        unsafe {
            std::env::remove_var("PASETO_KEY");
        }
        let user_id = Uuid::new_v4();
        let token = create_token(user_id).expect("should create token");
        assert!(token.starts_with("v4.local."));

        let claims = verify_token(&token).expect("should verify token");
        assert_eq!(claims.sub, user_id);
    }

    #[test]
    fn invalid_token_is_rejected() {
        assert!(verify_token("not-a-valid-token").is_err());
        assert!(verify_token("v4.local.invalidpayload").is_err());
    }

    #[test]
    fn tampered_token_is_rejected() {
        unsafe {
            std::env::remove_var("PASETO_KEY");
        }
        let token = create_token(Uuid::new_v4()).expect("should create token");
        let mut tampered = token.clone();
        if let Some(last) = tampered.pop() {
            tampered.push(if last == 'A' { 'B' } else { 'A' });
        }
        assert!(verify_token(&tampered).is_err());
    }
}
