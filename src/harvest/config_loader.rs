//! Configuration loading for the harvester.
//!
//! Two TOML files live in the config directory: `harvest.toml` holds the
//! application knobs (paths, paging limits, worker pool, rate behavior,
//! logging) and `search.toml` holds the search API credentials plus the
//! category/keyword lists. Missing files are created with defaults on first
//! run; a corrupt `harvest.toml` is backed up and rewritten, a corrupt
//! `search.toml` falls back to defaults for the run. Credentials can be
//! supplied through `GOOGLE_API_KEY` / `GOOGLE_CX`, which take precedence
//! over the file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

/// Error types for config loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(String),
}

/// Result type alias for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Value the API key ships with before the operator fills it in.
pub const API_KEY_PLACEHOLDER: &str = "YOUR_API_KEY";
/// Value the search engine id ships with before the operator fills it in.
pub const ENGINE_ID_PLACEHOLDER: &str = "YOUR_ENGINE_ID";

// Config structs for harvest.toml
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Paths {
    pub root_dir: String,
    pub log_directory: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Limits {
    pub page_size: u32,
    pub per_query_cap: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Pools {
    pub download_workers: usize,
    pub write_buffer_bytes: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Rate {
    pub retry_attempts: u32,
    pub request_timeout_secs: u64,
    pub page_sleep_ms: u64,
    pub retry_base_secs: u64,
    pub retry_increment_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Logging {
    pub log_level: String,
    pub log_to_file: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub paths: Paths,
    pub limits: Limits,
    pub pools: Pools,
    pub rate: Rate,
    pub logging: Logging,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            paths: Paths {
                root_dir: "./CatDataset".to_string(),
                log_directory: "./logs".to_string(),
            },
            limits: Limits {
                page_size: 10,
                per_query_cap: 100,
            },
            pools: Pools {
                download_workers: 24,
                write_buffer_bytes: 64 * 1024,
            },
            rate: Rate {
                retry_attempts: 3,
                request_timeout_secs: 15,
                page_sleep_ms: 200,
                retry_base_secs: 1,
                retry_increment_secs: 2,
            },
            logging: Logging {
                log_level: "info".to_string(),
                log_to_file: true,
            },
        }
    }
}

// Config structs for search.toml
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Auth {
    pub api_key: String,
    pub engine_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Query {
    pub categories: Vec<String>,
    pub keywords: Vec<String>,
    pub quota: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SearchConfig {
    pub auth: Auth,
    pub query: Query,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            auth: Auth {
                api_key: API_KEY_PLACEHOLDER.to_string(),
                engine_id: ENGINE_ID_PLACEHOLDER.to_string(),
            },
            query: Query {
                categories: DEFAULT_CATEGORIES.iter().map(|s| s.to_string()).collect(),
                keywords: vec!["cat".to_string()],
                quota: 200,
            },
        }
    }
}

/// Breed list shipped as the default category set.
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "Abyssinian",
    "Aegean",
    "American Bobtail",
    "American Curl",
    "American Shorthair",
    "American Wirehair",
    "Aphrodite Giant",
    "Arabian Mau",
    "Asian Semi-longhair",
    "Asian Semi-shorthair",
    "Balinese",
    "Bambino",
    "Bengal",
    "Birman",
    "Bombay cat",
    "Brazilian Shorthair",
    "British Longhair",
    "British Shorthair",
    "Burmese",
    "Burmilla",
    "California Spangled",
    "Chantilly-Tiffany",
    "Chartreux",
    "Chausie",
    "Colorpoint Shorthair",
    "Cornish Rex",
    "Long-haired Manx",
    "Cyprus",
    "Devon Rex",
    "Donskoy",
    "Chinese Li Hua",
    "Dwelf",
    "Egyptian Mau",
    "European Shorthair",
    "Exotic Shorthair",
    "Foldex",
    "German Rex",
    "Havana Brown",
    "Highlander",
    "Himalayan cat",
    "Japanese Bobtail",
    "Colorpoint Longhair",
    "Kanaani",
    "Karelian Bobtail",
    "Kinkalow",
    "Korat",
    "Korean Bobtail",
    "Korn Ja",
    "Kurilian Bobtail",
    "Lambkin",
    "LaPerm",
    "Lykoi",
    "Maine Coon",
    "Manx cat",
    "Mekong Bobtail",
    "Minskin",
    "Minuet",
    "Munchkin",
    "Nebelung",
    "Neva Masquerade",
    "Ocicat",
    "Ojos Azules",
    "Oriental Bicolor",
    "Oriental Longhair",
    "Oriental Shorthair",
    "Persian",
    "Peterbald",
    "Pixie-bob",
    "Ragamuffin",
    "Ragdoll",
    "Raas cat",
    "Russian Blue",
    "Sam Sawet",
    "Savannah",
    "Scottish Fold",
    "Selkirk Rex",
    "Serengeti",
    "Siamese",
    "Siberian Forest Cat",
    "Singapura",
    "Snowshoe",
    "Sokoke",
    "Somali",
    "Sphynx",
    "Suphalak",
    "Thai",
    "Tonkinese",
    "Toybob",
    "Toyger",
    "Turkish Angora",
    "Turkish Van",
    "Turkish Vankedisi",
    "Ukrainian Levkoy",
    "York Chocolate",
];

/// Loads and owns both configuration files.
pub struct ConfigManager {
    app_config: AppConfig,
    search_config: SearchConfig,
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Creates a new ConfigManager, writing default config files on first run
    /// and applying credential overrides from the environment.
    pub fn new(config_dir: impl AsRef<Path>) -> ConfigResult<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            info!("Creating config directory: {}", config_dir.display());
            fs::create_dir_all(&config_dir)?;
        }

        let app_config = Self::load_app_config(&config_dir)?;
        let mut search_config = Self::load_search_config(&config_dir)?;

        apply_env_overrides(
            &mut search_config,
            std::env::var("GOOGLE_API_KEY").ok(),
            std::env::var("GOOGLE_CX").ok(),
        );

        let manager = Self {
            app_config,
            search_config,
            config_dir,
        };
        manager.create_default_configs()?;

        Ok(manager)
    }

    // Load app config from harvest.toml
    fn load_app_config(config_dir: &Path) -> ConfigResult<AppConfig> {
        let config_path = config_dir.join("harvest.toml");

        if !config_path.exists() {
            warn!("Config file not found: {}", config_path.display());
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&config_path)?;
        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                error!("Failed to parse harvest.toml: {}", e);
                info!("Backing up old config and creating a new one with default values");

                if let Err(backup_err) =
                    fs::rename(&config_path, config_path.with_extension("toml.backup"))
                {
                    warn!("Failed to backup old config: {}", backup_err);
                }

                let default_config = AppConfig::default();
                if let Ok(toml_string) = toml::to_string_pretty(&default_config) {
                    if let Err(write_err) = fs::write(&config_path, toml_string) {
                        error!("Failed to write new config file: {}", write_err);
                    } else {
                        info!("Created new harvest.toml with default values");
                    }
                }

                Ok(default_config)
            }
        }
    }

    // Load search config from search.toml
    fn load_search_config(config_dir: &Path) -> ConfigResult<SearchConfig> {
        let config_path = config_dir.join("search.toml");

        if !config_path.exists() {
            warn!("Search config file not found: {}", config_path.display());
            return Ok(SearchConfig::default());
        }

        let content = fs::read_to_string(&config_path)?;
        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                error!("Failed to parse search.toml: {}", e);
                info!("Using default search configuration");
                Ok(SearchConfig::default())
            }
        }
    }

    /// Writes default config files for any that are missing, so the operator
    /// has something to edit before the next run.
    pub fn create_default_configs(&self) -> ConfigResult<()> {
        let config_path = self.config_dir.join("harvest.toml");
        if !config_path.exists() {
            let toml_string = toml::to_string_pretty(&AppConfig::default())
                .map_err(|e| ConfigError::TomlSer(e.to_string()))?;
            fs::write(&config_path, toml_string)?;
            info!("Created default harvest.toml");
        }

        let search_path = self.config_dir.join("search.toml");
        if !search_path.exists() {
            let toml_string = toml::to_string_pretty(&SearchConfig::default())
                .map_err(|e| ConfigError::TomlSer(e.to_string()))?;
            fs::write(&search_path, toml_string)?;
            info!("Created default search.toml");
        }

        Ok(())
    }

    pub fn app_config(&self) -> &AppConfig {
        &self.app_config
    }

    pub fn search_config(&self) -> &SearchConfig {
        &self.search_config
    }

    /// Whether the credentials have been moved off their placeholder values.
    /// The harvest must not issue a single request until this holds.
    pub fn has_valid_credentials(&self) -> bool {
        let auth = &self.search_config.auth;
        !auth.api_key.is_empty()
            && !auth.engine_id.is_empty()
            && auth.api_key != API_KEY_PLACEHOLDER
            && auth.engine_id != ENGINE_ID_PLACEHOLDER
    }
}

/// Environment credentials win over whatever the file said.
fn apply_env_overrides(config: &mut SearchConfig, api_key: Option<String>, engine_id: Option<String>) {
    if let Some(key) = api_key {
        config.auth.api_key = key;
    }
    if let Some(id) = engine_id {
        config.auth.engine_id = id;
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn manager_in(dir: &Path) -> ConfigManager {
        ConfigManager {
            app_config: AppConfig::default(),
            search_config: SearchConfig::default(),
            config_dir: dir.to_path_buf(),
        }
    }

    #[test]
    fn first_run_writes_both_default_files() {
        let dir = tempdir().unwrap();
        manager_in(dir.path()).create_default_configs().unwrap();

        assert!(dir.path().join("harvest.toml").exists());
        assert!(dir.path().join("search.toml").exists());

        // The written defaults parse back to the same shape.
        let reloaded = ConfigManager::load_app_config(dir.path()).unwrap();
        assert_eq!(reloaded.limits.page_size, 10);
        assert_eq!(reloaded.limits.per_query_cap, 100);
        assert_eq!(reloaded.pools.download_workers, 24);
    }

    #[test]
    fn corrupt_app_config_is_backed_up_and_replaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("harvest.toml");
        fs::write(&path, "this is not toml [[[").unwrap();

        let config = ConfigManager::load_app_config(dir.path()).unwrap();
        assert_eq!(config.rate.retry_attempts, 3);
        assert!(dir.path().join("harvest.toml.backup").exists());
    }

    #[test]
    fn corrupt_search_config_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("search.toml"), "auth = 5").unwrap();

        let config = ConfigManager::load_search_config(dir.path()).unwrap();
        assert_eq!(config.auth.api_key, API_KEY_PLACEHOLDER);
        assert_eq!(config.query.keywords, vec!["cat".to_string()]);
    }

    #[test]
    fn placeholder_credentials_are_rejected() {
        let dir = tempdir().unwrap();
        let mut manager = manager_in(dir.path());
        assert!(!manager.has_valid_credentials());

        manager.search_config.auth.api_key = "AIzaSyReal".to_string();
        assert!(!manager.has_valid_credentials());

        manager.search_config.auth.engine_id = "0123456789:abcdef".to_string();
        assert!(manager.has_valid_credentials());

        manager.search_config.auth.api_key = String::new();
        assert!(!manager.has_valid_credentials());
    }

    #[test]
    fn env_overrides_beat_file_values() {
        let mut config = SearchConfig::default();
        apply_env_overrides(
            &mut config,
            Some("env-key".to_string()),
            Some("env-engine".to_string()),
        );
        assert_eq!(config.auth.api_key, "env-key");
        assert_eq!(config.auth.engine_id, "env-engine");

        apply_env_overrides(&mut config, None, None);
        assert_eq!(config.auth.api_key, "env-key");
    }

    #[test]
    fn default_query_carries_the_breed_list() {
        let config = SearchConfig::default();
        assert_eq!(config.query.categories.len(), DEFAULT_CATEGORIES.len());
        assert!(config.query.categories.iter().any(|c| c == "Sphynx"));
        assert_eq!(config.query.quota, 200);
    }
}
