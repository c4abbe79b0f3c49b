use argon2::Error as Argon2Error;
use jsonwebtoken::errors::Error as JwtError;
use mongodb::error::Error as DbError;
use rocket::{
    figment::Error as ConfigError,
    http::Status,
    response::{self, status, Responder},
    serde::json::{self, json, Json, Value},
    Request,
};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while handling a request.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// The caller is authenticated but not allowed to do this.
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    /// The request conflicts with state already recorded, e.g. a second vote.
    #[error("Conflict: {0}")]
    Conflict(String),
    /// Any other status, reported with the given message.
    #[error("{0}: {1}")]
    Status(Status, String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::Db(_) | Self::Jwt(_) | Self::Argon2(_) => Status::InternalServerError,
            Self::BadRequest(_) | Self::Conflict(_) => Status::BadRequest,
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::Forbidden(_) => Status::Forbidden,
            Self::NotFound(_) => Status::NotFound,
            Self::Status(status, _) => *status,
        }
    }

    /// The JSON body this error is reported with. Internal details are never exposed.
    fn body(self) -> Value {
        match self {
            Self::Db(_) | Self::Jwt(_) | Self::Argon2(_) => {
                json!({ "error": "Internal Server Error" })
            }
            Self::Status(status, _) if status.code >= 500 => {
                json!({ "error": "Internal Server Error" })
            }
            Self::Forbidden(msg) | Self::Conflict(msg) => json!({ "message": msg }),
            Self::BadRequest(msg)
            | Self::Unauthorized(msg)
            | Self::NotFound(msg)
            | Self::Status(_, msg) => json!({ "error": msg }),
        }
    }
}

impl From<json::Error<'_>> for Error {
    fn from(err: json::Error<'_>) -> Self {
        match err {
            json::Error::Io(err) => Self::BadRequest(format!("Could not read body: {err}")),
            json::Error::Parse(_, err) => Self::BadRequest(format!("Malformed body: {err}")),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        if status.code >= 500 {
            error!("{self}");
        } else {
            debug!("{self}");
        }
        status::Custom(status, Json(self.body())).respond_to(req)
    }
}

/// Errors that prevent the server from being built.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to contact database during launch: {0}")]
    Db(#[from] DbError),
}
