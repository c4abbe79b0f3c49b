mod admin_check;
mod token;

pub use admin_check::{AdminCheck, NOT_ADMIN};
pub use token::{AuthFailure, AuthToken, AUTH_TOKEN_COOKIE};
