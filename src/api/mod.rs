use rocket::{
    http::Status,
    response::status,
    serde::json::{json, Json, Value},
    Catcher, Request,
};

use crate::model::api::auth::AuthFailure;

pub mod candidate;
pub mod user;

/// JSON error bodies for requests that never reach a handler.
pub fn catchers() -> Vec<Catcher> {
    catchers![unauthorized, default_catcher]
}

#[catch(401)]
fn unauthorized(req: &Request<'_>) -> Json<Value> {
    let failure = req.local_cache(|| AuthFailure::MISSING);
    Json(json!({ "error": failure.0 }))
}

#[catch(default)]
fn default_catcher(status: Status, _req: &Request<'_>) -> status::Custom<Json<Value>> {
    let reason = status.reason().unwrap_or("Unknown Error");
    status::Custom(status, Json(json!({ "error": reason })))
}
