use mongodb::error::Error as DbError;
use rocket::{
    outcome::try_outcome,
    request::{FromRequest, Outcome},
    Request,
};

use crate::error::{Error, Result};
use crate::model::{
    db::user::{Role, User},
    mongodb::{Coll, Id},
};

use super::AuthToken;

pub const NOT_ADMIN: &str = "user does not have admin role";

/// The outcome of checking whether the authenticated caller is an admin.
///
/// Only [`AdminCheck::Admin`] grants anything; a failed lookup is treated as "not an admin".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCheck {
    Admin(Id),
    NotAdmin(Id),
    LookupFailed,
}

impl AdminCheck {
    /// Classify the result of looking up the caller's user record.
    pub fn from_lookup(id: Id, lookup: std::result::Result<Option<User>, DbError>) -> Self {
        match lookup {
            Ok(Some(user)) if user.role == Role::Admin => Self::Admin(user.id),
            Ok(Some(user)) => Self::NotAdmin(user.id),
            Ok(None) => {
                warn!("Authenticated user {id} does not exist");
                Self::LookupFailed
            }
            Err(err) => {
                error!("Failed to look up role of user {id}: {err}");
                Self::LookupFailed
            }
        }
    }

    /// Require the caller to be an admin, returning their ID.
    pub fn require_admin(self) -> Result<Id> {
        match self {
            Self::Admin(id) => Ok(id),
            Self::NotAdmin(_) | Self::LookupFailed => Err(Error::Forbidden(NOT_ADMIN.to_string())),
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminCheck {
    type Error = Error;

    /// Authenticate the caller, then look up their role.
    ///
    /// Succeeds for any authenticated caller, so the handler decides how to deny, before it
    /// inspects the request body.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let token = try_outcome!(req.guard::<AuthToken>().await);
        let users = try_outcome!(req.guard::<Coll<User>>().await);
        let lookup = users.find_one(token.id.as_doc(), None).await;
        Outcome::Success(Self::from_lookup(token.id, lookup))
    }
}
