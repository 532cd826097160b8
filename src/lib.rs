#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use std::sync::Arc;

use rocket::{figment::Figment, Build, Rocket};

use crate::config::{ConfigFairing, FileStorageFairing, StoreFairing};
use crate::engine::EngineFairing;
use crate::logging::LoggerFairing;
use crate::store::Store;
use crate::uploads::FileStorage;

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod model;
pub mod scheduled_task;
pub mod store;
pub mod uploads;

#[cfg(test)]
mod testing;

/// Build the server from `Rocket.toml` and the environment.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(StoreFairing)
        .attach(FileStorageFairing)
        .attach(EngineFairing)
        .mount("/", api::routes())
}

/// Build the server around an already-constructed store and file storage.
pub fn rocket_for(
    figment: Figment,
    store: Arc<dyn Store>,
    files: Arc<dyn FileStorage>,
) -> Rocket<Build> {
    rocket::custom(figment)
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .manage(store)
        .manage(files)
        .attach(EngineFairing)
        .mount("/", api::routes())
}
