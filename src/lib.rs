#[macro_use]
extern crate log;
#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use mongodb::{error::Error as DbError, Client};
use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;

pub use config::Config;

use config::ConfigFairing;
use error::LaunchError;
use logging::LoggerFairing;
use model::mongodb::ensure_indexes_exist;

/// Database used when `db_name` is not configured.
const DEFAULT_DATABASE: &str = "voting";

/// Build the server, connecting to the database named by the configuration.
pub async fn build() -> Result<Rocket<Build>, LaunchError> {
    let rocket = rocket::build();
    let figment = rocket.figment();

    let db_uri = figment.extract_inner::<String>("db_uri")?;
    let db_name = figment
        .extract_inner::<String>("db_name")
        .unwrap_or_else(|_| DEFAULT_DATABASE.to_string());

    debug!("Connecting to database `{db_name}`");
    let db_client = Client::with_uri_str(&db_uri).await?;

    Ok(rocket_for_db(rocket, db_client, &db_name).await?)
}

/// Mount the routes and attach the managed state and fairings for the given database.
pub async fn rocket_for_db(
    rocket: Rocket<Build>,
    db_client: Client,
    db_name: &str,
) -> Result<Rocket<Build>, DbError> {
    let db = db_client.database(db_name);
    ensure_indexes_exist(&db).await?;

    Ok(rocket
        .mount("/candidate", api::candidate::routes())
        .mount("/user", api::user::routes())
        .register("/", api::catchers())
        .attach(ConfigFairing)
        .attach(LoggerFairing)
        .manage(db_client)
        .manage(db))
}

/// A client for the database configured in `Rocket.toml` or the environment.
#[cfg(test)]
pub(crate) async fn db_client() -> Client {
    let db_uri = rocket::Config::figment()
        .extract_inner::<String>("db_uri")
        .expect("`db_uri` not set");
    Client::with_uri_str(&db_uri)
        .await
        .unwrap_or_else(|_| panic!("Could not connect to database with `db_uri` \"{db_uri}\""))
}

/// A fresh database name, so concurrently running tests never share state.
#[cfg(test)]
pub(crate) fn database() -> String {
    format!("test_{}", mongodb::bson::oid::ObjectId::new())
}
