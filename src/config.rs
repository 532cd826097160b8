use std::sync::Arc;

use chrono::Duration;
use log::{error, info, warn};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::store::{memory::MemoryStore, mongo::MongoStore, Store};
use crate::uploads::{FileStorage, HttpFileStorage, MemoryFileStorage};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    #[serde(default = "default_auth_ttl")]
    pub(crate) auth_ttl: u32,
    #[serde(default = "default_phase_retry_secs")]
    pub(crate) phase_retry_secs: u32,
    // secrets
    pub(crate) jwt_secret: String,
}

fn default_auth_ttl() -> u32 {
    3600
}

fn default_phase_retry_secs() -> u32 {
    300
}

impl Config {
    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// How long to wait before retrying a failed scheduled phase change.
    pub fn phase_retry(&self) -> Duration {
        Duration::seconds(self.phase_retry_secs.into())
    }

    /// Secret key used to sign and verify JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }
}

#[cfg(test)]
impl Config {
    pub fn example() -> Self {
        Self {
            auth_ttl: default_auth_ttl(),
            phase_retry_secs: 1,
            jwt_secret: "test-only-secret".to_string(),
        }
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the data store.
#[derive(Deserialize)]
struct StoreConfig {
    // secrets
    db_uri: Option<String>,
    // non-secrets
    #[serde(default = "default_db_name")]
    db_name: String,
}

fn default_db_name() -> String {
    "cohort_elections".to_string()
}

/// A fairing that loads the store config, connects to MongoDB if one is
/// configured, and places an `Arc<dyn Store>` into managed state.
///
/// Without a `db_uri` the in-memory store is used instead, which loses
/// everything on shutdown.
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<StoreConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load store config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let store: Arc<dyn Store> = match config.db_uri {
            Some(uri) => {
                info!("Loaded database config, connecting...");
                match MongoStore::connect(&uri, &config.db_name).await {
                    Ok(store) => {
                        info!("...database connection online!");
                        Arc::new(store)
                    }
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                }
            }
            None => {
                warn!("No `db_uri` configured, using the in-memory store");
                Arc::new(MemoryStore::new())
            }
        };

        // Manage the state.
        rocket = rocket.manage(store);
        Ok(rocket)
    }
}

/// Configuration for the file upload service.
#[derive(Deserialize)]
struct UploadConfig {
    upload_url: Option<String>,
    upload_preset: Option<String>,
}

/// A fairing that loads the upload config and places an
/// `Arc<dyn FileStorage>` into managed state.
pub struct FileStorageFairing;

#[rocket::async_trait]
impl Fairing for FileStorageFairing {
    fn info(&self) -> Info {
        Info {
            name: "File storage",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<UploadConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load upload config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let files: Arc<dyn FileStorage> = match config.upload_url {
            Some(url) => {
                info!("Uploading files to {url}");
                Arc::new(HttpFileStorage::new(url, config.upload_preset))
            }
            None => {
                warn!("No `upload_url` configured, keeping uploads in memory");
                Arc::new(MemoryFileStorage::new())
            }
        };

        // Manage the state.
        rocket = rocket.manage(files);
        Ok(rocket)
    }
}
