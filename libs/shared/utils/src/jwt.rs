use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use chrono::{Utc, TimeZone};
use tracing::debug;
use shared_models::auth::{JwtClaims, JwtHeader, User};

type HmacSha256 = Hmac<Sha256>;

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str, what: &str) -> Result<T, String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| format!("Invalid {} encoding", what))?;
    serde_json::from_slice(&bytes).map_err(|e| {
        debug!("Failed to parse {}: {}", what, e);
        format!("Invalid {} format", what)
    })
}

/// Validates an HS256 Supabase access token and returns the user it was issued for.
/// The role claim is lowercased so that access checks can compare it directly.
pub fn validate_token(token: &str, jwt_secret: &str) -> Result<User, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let parts: Vec<&str> = token.split('.').collect();
    let [header_b64, claims_b64, signature_b64] = parts.as_slice() else {
        return Err("Invalid token format".to_string());
    };

    let header: JwtHeader = decode_segment(header_b64, "header")?;
    if header.alg != "HS256" {
        debug!("Rejecting token signed with {}", header.alg);
        return Err("Unsupported token algorithm".to_string());
    }

    let signature = URL_SAFE_NO_PAD.decode(signature_b64).map_err(|e| {
        debug!("Failed to decode signature: {}", e);
        "Invalid signature encoding".to_string()
    })?;

    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes())
        .map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(format!("{}.{}", header_b64, claims_b64).as_bytes());

    if mac.verify_slice(&signature).is_err() {
        debug!("Token signature verification failed");
        return Err("Invalid token signature".to_string());
    }

    let claims: JwtClaims = decode_segment(claims_b64, "claims")?;

    if let Some(exp) = claims.exp {
        let now = Utc::now().timestamp() as u64;
        if exp < now {
            debug!("Token expired at {} (now: {})", exp, now);
            return Err("Token expired".to_string());
        }
    }

    let created_at = claims.iat
        .and_then(|timestamp| Utc.timestamp_opt(timestamp as i64, 0).single());

    let user = User {
        id: claims.sub,
        email: claims.email,
        role: claims.role.map(|role| role.to_lowercase()),
        metadata: claims.user_metadata,
        created_at,
    };

    debug!("Token validated successfully for user: {}", user.id);
    Ok(user)
}
