use std::fmt::Display;
use std::ops::{Deref, DerefMut};

use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::mongodb::Id;

pub const ALREADY_VOTED: &str = "you have already Voted";
pub const ADMIN_CANNOT_VOTE: &str = "Admin is not allowed to Vote";

/// What a user is allowed to do.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// May cast a single vote.
    #[default]
    Voter,
    /// May manage candidates, but never vote.
    Admin,
}

impl Display for Role {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Voter => "voter",
                Self::Admin => "admin",
            }
        )
    }
}

impl From<Role> for Bson {
    fn from(role: Role) -> Self {
        Bson::String(role.to_string())
    }
}

/// Core user data, as stored in the database.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCore {
    pub name: String,
    pub username: String,
    pub password_hash: String,
    #[serde(default)]
    pub role: Role,
    /// Set once the user's single vote has been recorded; never reset.
    #[serde(default)]
    pub is_voted: bool,
}

impl UserCore {
    /// Check whether the given password is correct.
    ///
    /// A malformed stored hash never verifies.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap_or(false)
    }

    /// Check this user may cast a vote: they must not have voted already, and must not be an admin.
    pub fn check_can_vote(&self) -> Result<()> {
        if self.is_voted {
            return Err(Error::Conflict(ALREADY_VOTED.to_string()));
        }
        if self.role == Role::Admin {
            return Err(Error::Forbidden(ADMIN_CANNOT_VOTE.to_string()));
        }
        Ok(())
    }
}

/// A user without an ID.
pub type NewUser = UserCore;

/// A user from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub user: UserCore,
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl DerefMut for User {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.user
    }
}
