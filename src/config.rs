use std::sync::Arc;
use std::time::Duration;

use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    auth::{CapabilityTokens, TokenCost},
    mongodb::ensure_indexes_exist,
    store::{MongoStore, Store},
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    #[serde(default = "default_token_mem_cost")]
    token_mem_cost: u32,
    #[serde(default = "default_token_time_cost")]
    token_time_cost: u32,
    #[serde(default = "default_token_verify_timeout_ms")]
    token_verify_timeout_ms: u64,
    // secrets
    token_secret: String,
}

fn default_token_mem_cost() -> u32 {
    TokenCost::default().mem_cost
}

fn default_token_time_cost() -> u32 {
    TokenCost::default().time_cost
}

fn default_token_verify_timeout_ms() -> u64 {
    5000
}

impl Config {
    /// Argon2 cost parameters for capability tokens.
    pub fn token_cost(&self) -> TokenCost {
        TokenCost {
            mem_cost: self.token_mem_cost,
            time_cost: self.token_time_cost,
        }
    }

    /// How long a single token verification may take before it is abandoned.
    pub fn token_verify_timeout(&self) -> Duration {
        Duration::from_millis(self.token_verify_timeout_ms)
    }

    /// Build the token service. The secret is moved in once and never read
    /// from anywhere else.
    pub fn capability_tokens(&self) -> CapabilityTokens {
        CapabilityTokens::new(
            self.token_secret.clone(),
            self.token_cost(),
            self.token_verify_timeout(),
        )
    }
}

/// A fairing that loads the application config and puts the capability token
/// service in managed state.
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
        if config.token_secret.is_empty() {
            error!("`token_secret` must not be empty");
            return Err(rocket);
        }

        // Manage the state.
        let tokens = config.capability_tokens();
        info!("Loaded capability token config: {tokens:?}");
        rocket = rocket.manage(tokens);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // non-secrets
    #[serde(default = "default_db_name")]
    db_name: String,
    // secrets
    db_uri: String,
}

fn default_db_name() -> String {
    "survey".to_string()
}

/// A fairing that loads the MongoDB config, connects to the database,
/// ensures the required indexes, and places the [`Store`] into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&config.db_name);

        // Ensure the required indexes exist.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to create database indexes: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        let store: Store = Arc::new(MongoStore::new(client, &db));
        rocket = rocket.manage(store);
        Ok(rocket)
    }
}

#[cfg(test)]
mod tests {
    use rocket::figment::{providers::Serialized, Figment};
    use rocket::serde::json::serde_json::json;

    use super::*;

    #[test]
    fn token_settings_have_defaults() {
        let figment = Figment::from(Serialized::defaults(json!({ "token_secret": "s3cret" })));
        let config = figment.extract::<Config>().unwrap();

        assert_eq!(config.token_cost(), TokenCost::default());
        assert_eq!(config.token_verify_timeout(), Duration::from_secs(5));
        assert!(!format!("{:?}", config.capability_tokens()).contains("s3cret"));
    }

    #[test]
    fn secret_is_required() {
        let figment = Figment::from(Serialized::defaults(json!({ "token_mem_cost": 8192 })));
        assert!(figment.extract::<Config>().is_err());
    }

    #[test]
    fn database_name_defaults() {
        let figment = Figment::from(Serialized::defaults(json!({ "db_uri": "mongodb://localhost" })));
        let config = figment.extract::<DbConfig>().unwrap();
        assert_eq!(config.db_name, "survey");
    }
}
