use actix_web::{
    cookie::{time::Duration as CookieDuration, Cookie, SameSite},
    dev::Payload,
    web, FromRequest, HttpRequest,
};
use chrono::{DateTime, Duration, Utc};
use futures_util::future::{ready, Ready};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::AppError;

pub const SESSION_COOKIE: &str = "token";
/// Token expiry and cookie max-age both derive from this.
pub const SESSION_TTL_DAYS: i64 = 7;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
    pub username: String,
}

/// Caller identity when a valid session cookie is present; never an error.
#[derive(Clone, Debug)]
pub struct OptionalAuthUser(pub Option<AuthUser>);

pub fn issue_token(secret: &str, user_id: &str, username: &str) -> Result<String, AppError> {
    issue_token_at(secret, user_id, username, Utc::now())
}

pub fn issue_token_at(
    secret: &str,
    user_id: &str,
    username: &str,
    now: DateTime<Utc>,
) -> Result<String, AppError> {
    let claims = Claims {
        id: user_id.to_string(),
        username: username.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::days(SESSION_TTL_DAYS)).timestamp(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        error!("jwt encode failed: {}", e);
        AppError::system_exception()
    })
}

pub fn verify_token(secret: &str, token: &str) -> Result<AuthUser, AppError> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    decode::<Claims>(token, &key, &validation)
        .map(|data| AuthUser {
            user_id: data.claims.id,
            username: data.claims.username,
        })
        .map_err(|e| {
            debug!("session token rejected: {}", e);
            AppError::login_expired()
        })
}

pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::days(SESSION_TTL_DAYS))
        .finish()
}

pub fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build(SESSION_COOKIE, "")
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish();
    cookie.make_removal();
    cookie
}

fn authenticate_request(req: &HttpRequest) -> Result<AuthUser, AppError> {
    let config = req
        .app_data::<web::Data<AppConfig>>()
        .ok_or_else(AppError::system_exception)?;
    let token = extract_token(req).ok_or_else(AppError::need_login)?;
    verify_token(&config.jwt_secret, &token)
}

fn extract_token(req: &HttpRequest) -> Option<String> {
    req.cookie(SESSION_COOKIE)
        .map(|c| c.value().trim().to_string())
        .filter(|v| !v.is_empty())
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate_request(req))
    }
}

impl FromRequest for OptionalAuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(OptionalAuthUser(authenticate_request(req).ok())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn issued_token_verifies() {
        let token = issue_token(SECRET, "u-1", "alice").unwrap();
        let who = verify_token(SECRET, &token).unwrap();
        assert_eq!(
            who,
            AuthUser {
                user_id: "u-1".to_string(),
                username: "alice".to_string()
            }
        );
    }

    #[test]
    fn token_is_valid_until_expiry_and_not_after() {
        let almost = Utc::now() - Duration::days(SESSION_TTL_DAYS) + Duration::minutes(1);
        let token = issue_token_at(SECRET, "u-1", "alice", almost).unwrap();
        assert!(verify_token(SECRET, &token).is_ok());

        let expired = Utc::now() - Duration::days(SESSION_TTL_DAYS) - Duration::seconds(5);
        let token = issue_token_at(SECRET, "u-1", "alice", expired).unwrap();
        let err = verify_token(SECRET, &token).unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let token = issue_token(SECRET, "u-1", "alice").unwrap();
        let mut bytes = token.into_bytes();
        let idx = bytes.len() - 3;
        bytes[idx] = if bytes[idx] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();
        assert!(verify_token(SECRET, &tampered).is_err());
    }

    #[test]
    fn wrong_secret_and_expired_look_the_same() {
        let token = issue_token(SECRET, "u-1", "alice").unwrap();
        let forged = verify_token("other", &token).unwrap_err();
        let expired = issue_token_at(SECRET, "u-1", "alice", Utc::now() - Duration::days(30)).unwrap();
        let expired = verify_token(SECRET, &expired).unwrap_err();
        assert_eq!(forged.msg(), expired.msg());
    }

    #[test]
    fn cookie_lifetime_matches_token_lifetime() {
        let cookie = session_cookie("abc".to_string());
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.max_age(), Some(CookieDuration::days(SESSION_TTL_DAYS)));
    }

    #[test]
    fn removal_cookie_expires_immediately() {
        let cookie = removal_cookie();
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(CookieDuration::ZERO));
    }
}
