use std::sync::Arc;

use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::events::EventBus;
use crate::store::{MemoryStore, MongoStore, SharedStore};
use crate::voting::DEFAULT_MAX_TOKEN_ATTEMPTS;

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    #[serde(default = "default_max_token_attempts")]
    max_token_attempts: u32,
    #[serde(default = "default_event_capacity")]
    event_capacity: usize,
    // secrets
    jwt_secret: String,
}

fn default_max_token_attempts() -> u32 {
    DEFAULT_MAX_TOKEN_ATTEMPTS
}

fn default_event_capacity() -> usize {
    64
}

impl Config {
    /// Secret key used to sign identity JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// How many fresh tokens a vote may try before giving up.
    pub fn max_token_attempts(&self) -> u32 {
        self.max_token_attempts
    }

    /// Events buffered per subscriber before the oldest are dropped.
    pub fn event_capacity(&self) -> usize {
        self.event_capacity
    }
}


/// A fairing that loads the application config and puts it, along with the
/// election event bus it sizes, in managed state.
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
        let events = EventBus::new(config.event_capacity());
        rocket = rocket.manage(config).manage(events);
        Ok(rocket)
    }
}

/// Which backend holds elections and votes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Mongodb,
    /// Everything is lost on shutdown. Single instance only.
    Memory,
}

/// Configuration for the store.
#[derive(Deserialize)]
struct StoreConfig {
    // non-secrets
    #[serde(default)]
    storage: StorageKind,
    #[serde(default = "default_db_name")]
    db_name: String,
    // secrets
    db_uri: Option<String>,
}

fn default_db_name() -> String {
    "anonvote".to_string()
}

/// A fairing that loads the store config, connects to the chosen backend,
/// performs any setup necessary, and places a [`SharedStore`] into managed
/// state.
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

        let store: SharedStore = match config.storage {
            StorageKind::Memory => {
                warn!("Using the in-memory store, nothing will survive a restart");
                Arc::new(MemoryStore::new())
            }
            StorageKind::Mongodb => {
                let Some(db_uri) = config.db_uri else {
                    error!("`db_uri` must be set when storage is `mongodb`");
                    return Err(rocket);
                };
                info!("Loaded database config, connecting...");
                match MongoStore::connect(&db_uri, &config.db_name).await {
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
        };

        // Manage the state.
        rocket = rocket.manage(store);
        Ok(rocket)
    }
}
