#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, DatabaseFairing};
use crate::logging::LoggerFairing;

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;

/// The server as deployed: config, database and token service are all loaded
/// from `Rocket.toml` and the environment during ignition.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount(api::BASE, api::routes())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
}

/// A server over an already constructed store and token service, bypassing
/// the config and database fairings.
pub fn rocket_for_store(
    store: model::store::Store,
    tokens: model::auth::CapabilityTokens,
) -> Rocket<Build> {
    rocket::build()
        .mount(api::BASE, api::routes())
        .attach(LoggerFairing)
        .manage(store)
        .manage(tokens)
}
