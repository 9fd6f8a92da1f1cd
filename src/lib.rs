#[macro_use]
extern crate rocket;

use std::sync::Arc;

use rocket::{figment::Figment, Build, Rocket};

use crate::clock::{SharedClock, SystemClock};
use crate::config::{ConfigFairing, StoreFairing};
use crate::logging::LoggerFairing;
use crate::store::SharedStore;

pub mod api;
pub mod clock;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod logging;
pub mod model;
pub mod store;
pub mod tally;
pub mod voting;

pub use config::Config;

/// The server as configured by `Rocket.toml` and `ROCKET_*` variables,
/// running on wall-clock time.
pub fn build() -> Rocket<Build> {
    let clock: SharedClock = Arc::new(SystemClock);
    rocket::build()
        .attach(ConfigFairing)
        .attach(StoreFairing)
        .attach(LoggerFairing)
        .manage(clock)
        .mount("/", api::routes())
        .register("/", api::catchers())
}

/// The server over an already constructed store and clock.
pub fn rocket_for_store(figment: Figment, store: SharedStore, clock: SharedClock) -> Rocket<Build> {
    rocket::custom(figment)
        .attach(ConfigFairing)
        .attach(LoggerFairing)
        .manage(store)
        .manage(clock)
        .mount("/", api::routes())
        .register("/", api::catchers())
}

/// Rocket's usual configuration sources plus a throwaway JWT secret.
#[cfg(test)]
pub(crate) fn test_figment() -> Figment {
    rocket::Config::figment().merge(("jwt_secret", "test jwt secret"))
}

/// A client for the test database server, `ANONVOTE_TEST_DB_URI` or a local
/// replica set.
#[cfg(test)]
pub(crate) async fn test_db_client() -> mongodb::Client {
    let uri = std::env::var("ANONVOTE_TEST_DB_URI")
        .unwrap_or_else(|_| "mongodb://localhost:27017/?replicaSet=rs0".to_string());
    mongodb::Client::with_uri_str(uri).await.unwrap()
}

/// Get the name of the database to use for a test.
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
pub(crate) fn test_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}
