use std::env;

use ap_common::{helpers::parse_boolean_flag, Secret};
use log::*;
use payvault_tools::PayVaultConfig;
use rand::Rng;

use crate::errors::ServerError;

const DEFAULT_AP_HOST: &str = "127.0.0.1";
const DEFAULT_AP_PORT: u16 = 4144;
const DEFAULT_AP_CATALOG_FILE: &str = "./data/catalog.json";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Path to the JSON catalog of items for sale. Loaded once at startup.
    pub catalog_file: String,
    pub auth: AuthConfig,
    /// Client configuration for the PayVault provider API.
    pub payvault: PayVaultConfig,
    /// If false, webhook HMAC signatures are not checked. Never disable this in production.
    pub payvault_hmac_checks: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_AP_HOST.to_string(),
            port: DEFAULT_AP_PORT,
            database_url: String::default(),
            catalog_file: DEFAULT_AP_CATALOG_FILE.to_string(),
            auth: AuthConfig::default(),
            payvault: PayVaultConfig::default(),
            payvault_hmac_checks: true,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("AP_HOST").ok().unwrap_or_else(|| DEFAULT_AP_HOST.into());
        let port = env::var("AP_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for AP_PORT. {e} Using the default, {DEFAULT_AP_PORT}, instead."
                    );
                    DEFAULT_AP_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_AP_PORT);
        let database_url = env::var("AP_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ AP_DATABASE_URL is not set. Please set it to the URL for the store database.");
            String::default()
        });
        let catalog_file = env::var("AP_CATALOG_FILE").ok().unwrap_or_else(|| {
            info!("🪛️ AP_CATALOG_FILE is not set. Using the default, {DEFAULT_AP_CATALOG_FILE}.");
            DEFAULT_AP_CATALOG_FILE.to_string()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to \
                 the default configuration."
            );
            AuthConfig::default()
        });
        let payvault = PayVaultConfig::new_from_env_or_default();
        let payvault_hmac_checks = parse_boolean_flag(env::var("AP_PAYVAULT_HMAC_CHECKS").ok(), true);
        if !payvault_hmac_checks {
            warn!(
                "🚨️ PayVault webhook HMAC checks are DISABLED. Anyone can forge payment notifications. Do not run \
                 like this in production. 🚨️"
            );
        }
        Self { host, port, database_url, catalog_file, auth, payvault, payvault_hmac_checks }
    }
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The secret used to sign and verify access tokens (HS256). At least 32 characters.
    pub jwt_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The JWT signing secret has not been set. I'm using a random value for this session. Every \
             access token dies with this process, and a multi-instance deployment will not accept each other's \
             tokens. Set AP_JWT_SECRET instead. 🚨️🚨️🚨️"
        );
        let bytes = rand::thread_rng().gen::<[u8; 32]>();
        let secret = bytes.iter().map(|b| format!("{b:02x}")).collect::<String>();
        Self { jwt_secret: Secret::new(secret) }
    }
}

impl AuthConfig {
    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret =
            env::var("AP_JWT_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [AP_JWT_SECRET]")))?;
        if secret.len() < 32 {
            return Err(ServerError::ConfigurationError(
                "AP_JWT_SECRET must be at least 32 characters long.".to_string(),
            ));
        }
        Ok(Self { jwt_secret: Secret::new(secret) })
    }
}
