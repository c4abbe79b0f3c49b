use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rocket::{
    http::{Cookie, SameSite, Status},
    request::{FromRequest, Outcome},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{db::user::User, mongodb::Id};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

const BEARER_PREFIX: &str = "Bearer ";

/// Why authentication failed, kept in the request's local cache for the 401 catcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthFailure(pub &'static str);

impl AuthFailure {
    pub const MISSING: Self = Self("Token Not Found");
    pub const INVALID: Self = Self("Invalid token");
}

/// An authentication token identifying a specific user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthToken {
    pub id: Id,
}

impl AuthToken {
    /// Create a new [`AuthToken`] for the given user.
    pub fn new(user: &User) -> Self {
        Self { id: user.id }
    }

    /// Sign this token as a JWT that expires after the configured time-to-live.
    pub fn encode(&self, config: &Config) -> Result<String> {
        let claims = Claims {
            user_id: self.id.to_string(),
            expire_at: Utc::now() + config.auth_ttl(),
        };
        Ok(jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?)
    }

    /// Verify and decode a JWT.
    pub fn decode(token: &str, config: &Config) -> Result<Self> {
        let claims = jsonwebtoken::decode(
            token,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|data: TokenData<Claims>| data.claims)?;
        let id = claims
            .user_id
            .parse::<Id>()
            .map_err(|_| Error::Unauthorized(AuthFailure::INVALID.0.to_string()))?;
        Ok(Self { id })
    }

    /// Wrap an encoded token in a cookie, for browser clients.
    pub fn cookie(encoded: String, config: &Config) -> Cookie<'static> {
        Cookie::build(AUTH_TOKEN_COOKIE, encoded)
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish()
    }
}

/// JWT claims: the user ID plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(rename = "sub")]
    user_id: String,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

/// Find the raw token: an `Authorization: Bearer` header takes precedence over the cookie.
fn raw_token(req: &Request<'_>) -> Option<String> {
    req.headers()
        .get_one("Authorization")
        .and_then(|header| header.strip_prefix(BEARER_PREFIX))
        .map(|token| token.trim().to_string())
        .or_else(|| {
            req.cookies()
                .get(AUTH_TOKEN_COOKIE)
                .map(|cookie| cookie.value().to_string())
        })
}

fn unauthorized(req: &Request<'_>, failure: AuthFailure) -> Outcome<AuthToken, Error> {
    req.local_cache(|| failure);
    Outcome::Failure((
        Status::Unauthorized,
        Error::Unauthorized(failure.0.to_string()),
    ))
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthToken {
    type Error = Error;

    /// Get an [`AuthToken`] from the request, rejecting the request if it is missing or invalid.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(config) = req.guard::<&State<Config>>().await.succeeded() else {
            return Outcome::Failure((
                Status::InternalServerError,
                Error::Status(
                    Status::InternalServerError,
                    "Config is not managed".to_string(),
                ),
            ));
        };

        let Some(token) = raw_token(req) else {
            return unauthorized(req, AuthFailure::MISSING);
        };

        match Self::decode(&token, config) {
            Ok(token) => Outcome::Success(token),
            Err(err) => {
                debug!("Rejected token: {err}");
                unauthorized(req, AuthFailure::INVALID)
            }
        }
    }
}
