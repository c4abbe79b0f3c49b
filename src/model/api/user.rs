use argon2::Config;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::db::user::{NewUser, Role, User};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a plaintext password for storage, enforcing the minimum length.
pub fn hash_password(password: &str) -> Result<String> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(Error::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    // 16 bytes is recommended for password hashing:
    //  https://en.wikipedia.org/wiki/Argon2
    let mut salt = [0_u8; 16];
    rand::thread_rng().fill(&mut salt);
    Ok(argon2::hash_encoded(
        password.as_bytes(),
        &salt,
        &Config::default(),
    )?)
}

/// A sign-up request. The password is in plaintext, so this is never stored directly.
#[derive(Clone, Deserialize, Serialize)]
pub struct UserSpec {
    pub name: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

impl TryFrom<UserSpec> for NewUser {
    type Error = Error;

    /// Convert a [`UserSpec`] to a new [`User`] by hashing the password.
    /// This enforces that the name and username are non-empty, and the password meets minimum length.
    fn try_from(spec: UserSpec) -> Result<Self> {
        if spec.name.trim().is_empty() || spec.username.trim().is_empty() {
            return Err(Error::BadRequest(
                "Name and username are required".to_string(),
            ));
        }
        let password_hash = hash_password(&spec.password)?;
        Ok(Self {
            name: spec.name,
            username: spec.username,
            password_hash,
            role: spec.role,
            is_voted: false,
        })
    }
}

/// Raw login credentials.
#[derive(Clone, Deserialize, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// A password change request for the logged-in user.
#[derive(Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

/// API-friendly representation of a user. The password hash is never exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDescription {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub username: String,
    pub role: Role,
    pub is_voted: bool,
}

impl From<User> for UserDescription {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            name: user.user.name,
            username: user.user.username,
            role: user.user.role,
            is_voted: user.user.is_voted,
        }
    }
}

/// Response to a successful sign-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUp {
    pub response: UserDescription,
    pub token: String,
}

/// Response to a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedIn {
    pub token: String,
}
