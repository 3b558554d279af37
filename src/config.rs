use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::database::DB_FILENAME;
use crate::query::DEFAULT_MAX_LIMIT;

pub const CONFIG_FILENAME: &str = "config.toml";
pub const ENV_PREFIX: &str = "SOCIETYDB_";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub societydb: String,
}

impl LoggingConfig {
    const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
    const SOCIETYDB_LEVEL: &str = "info";

    fn default() -> Self {
        LoggingConfig {
            societydb: Self::SOCIETYDB_LEVEL.to_string(),
        }
    }

    fn ensure_valid(&mut self) {
        let str_original = self.societydb.clone();
        self.societydb = self.societydb.trim().to_ascii_lowercase();
        if !Self::LOG_LEVELS.contains(&self.societydb.as_str()) {
            eprintln!(
                "Config error: societydb log level of '{}' is invalid - using default of '{}'",
                str_original,
                Self::SOCIETYDB_LEVEL
            );
            self.societydb = Self::SOCIETYDB_LEVEL.to_owned();
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    const HOST: &str = "127.0.0.1";
    const PORT: u16 = 8080;

    fn default() -> Self {
        ServerConfig {
            host: Self::HOST.to_owned(),
            port: Self::PORT,
        }
    }

    fn ensure_valid(&mut self) {
        self.host = self.host.trim().to_owned();
        if self.host.is_empty() {
            eprintln!(
                "Config error: server host is empty - using default of '{}'",
                Self::HOST
            );
            self.host = Self::HOST.to_owned();
        }
        if self.port == 0 {
            eprintln!(
                "Config error: server port of 0 is invalid - using default of {}",
                Self::PORT
            );
            self.port = Self::PORT;
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    /// Database file. Empty means `societydb.db` in the data directory.
    pub path: String,
    pub pool_size: u32,
}

impl DatabaseConfig {
    const POOL_SIZE: u32 = 8;

    fn default() -> Self {
        DatabaseConfig {
            path: String::new(),
            pool_size: Self::POOL_SIZE,
        }
    }

    fn ensure_valid(&mut self) {
        // count and page each hold a connection
        if self.pool_size < 2 {
            eprintln!(
                "Config error: database pool_size of {} is invalid - using default of {}",
                self.pool_size,
                Self::POOL_SIZE
            );
            self.pool_size = Self::POOL_SIZE;
        }
    }

    pub fn resolve_path(&self, data_dir: &Path) -> PathBuf {
        match self.path.trim() {
            "" => data_dir.join(DB_FILENAME),
            path => PathBuf::from(path),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PaginationConfig {
    pub max_limit: i64,
}

impl PaginationConfig {
    fn default() -> Self {
        PaginationConfig {
            max_limit: DEFAULT_MAX_LIMIT,
        }
    }

    fn ensure_valid(&mut self) {
        if self.max_limit < 1 {
            eprintln!(
                "Config error: pagination max_limit of {} is invalid - using default of {}",
                self.max_limit, DEFAULT_MAX_LIMIT
            );
            self.max_limit = DEFAULT_MAX_LIMIT;
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub pagination: PaginationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            logging: LoggingConfig::default(),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            pagination: PaginationConfig::default(),
        }
    }
}

impl Config {
    /// Loads the configuration from the app's data directory, writing the
    /// defaults there first if no file exists.
    pub fn load_config(project_dirs: &ProjectDirs) -> Self {
        let config_path = project_dirs.data_local_dir().join(CONFIG_FILENAME);
        let default_config = Config::default();

        if !config_path.exists() {
            write_default_config(&config_path, &default_config);
        }

        Self::load_from(&config_path)
    }

    /// Defaults, then the TOML file at `config_path` (if present), then
    /// `SOCIETYDB_` environment variables. Nested keys use `__`, as in
    /// `SOCIETYDB_SERVER__PORT`.
    pub fn load_from(config_path: &Path) -> Self {
        let default_config = Config::default();

        let figment = Figment::from(Serialized::defaults(default_config.clone()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let mut config = figment.extract().unwrap_or_else(|err| {
            eprintln!(
                "Could not load config file {}: {}. Using default configuration.",
                config_path.display(),
                err
            );
            default_config
        });

        config.ensure_valid();

        config
    }

    fn ensure_valid(&mut self) {
        self.logging.ensure_valid();
        self.server.ensure_valid();
        self.database.ensure_valid();
        self.pagination.ensure_valid();
    }
}

fn write_default_config(config_path: &Path, default_config: &Config) {
    if let Some(parent) = config_path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            eprintln!(
                "Failed to create configuration directory {}: {}",
                parent.display(),
                e
            );
        }
    }
    match toml::to_string_pretty(default_config) {
        Ok(toml_string) => {
            if let Err(e) = fs::write(config_path, toml_string) {
                eprintln!(
                    "Failed to write default config to {}: {}",
                    config_path.display(),
                    e
                );
            }
        }
        Err(e) => eprintln!("Failed to serialize default config: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_file_uses_defaults() {
        Jail::expect_with(|jail| {
            let config = Config::load_from(&jail.directory().join(CONFIG_FILENAME));
            assert_eq!(config, Config::default());
            assert_eq!(config.pagination.max_limit, 200);
            Ok(())
        });
    }

    #[test]
    fn test_file_and_env_layers() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILENAME,
                r#"
                [server]
                port = 9000

                [pagination]
                max_limit = 50
                "#,
            )?;
            jail.set_env("SOCIETYDB_SERVER__HOST", "0.0.0.0");
            jail.set_env("SOCIETYDB_DATABASE__POOL_SIZE", "4");

            let config = Config::load_from(&jail.directory().join(CONFIG_FILENAME));
            assert_eq!(config.server.port, 9000);
            assert_eq!(config.server.host, "0.0.0.0");
            assert_eq!(config.database.pool_size, 4);
            assert_eq!(config.pagination.max_limit, 50);
            assert_eq!(config.logging.societydb, "info");
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILENAME,
                r#"
                [logging]
                societydb = " LOUD "

                [database]
                path = ""
                pool_size = 1

                [pagination]
                max_limit = 0
                "#,
            )?;

            let config = Config::load_from(&jail.directory().join(CONFIG_FILENAME));
            assert_eq!(config.logging.societydb, "info");
            assert_eq!(config.database.pool_size, 8);
            assert_eq!(config.pagination.max_limit, 200);
            Ok(())
        });
    }

    #[test]
    fn test_log_level_is_normalized() {
        Jail::expect_with(|jail| {
            jail.set_env("SOCIETYDB_LOGGING__SOCIETYDB", " DEBUG ");
            let config = Config::load_from(&jail.directory().join(CONFIG_FILENAME));
            assert_eq!(config.logging.societydb, "debug");
            Ok(())
        });
    }

    #[test]
    fn test_unparseable_file_uses_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(CONFIG_FILENAME, "[server]\nport = \"eighty\"\n")?;
            let config = Config::load_from(&jail.directory().join(CONFIG_FILENAME));
            assert_eq!(config, Config::default());
            Ok(())
        });
    }

    #[test]
    fn test_database_path_resolution() {
        let data_dir = Path::new("/var/lib/societydb");
        let mut db = DatabaseConfig::default();
        assert_eq!(db.resolve_path(data_dir), data_dir.join(DB_FILENAME));

        db.path = "/tmp/other.db".into();
        assert_eq!(db.resolve_path(data_dir), PathBuf::from("/tmp/other.db"));
    }

    #[test]
    fn test_default_config_round_trips_through_file() {
        Jail::expect_with(|jail| {
            let path = jail.directory().join("nested").join(CONFIG_FILENAME);
            write_default_config(&path, &Config::default());
            assert!(path.exists());
            assert_eq!(Config::load_from(&path), Config::default());
            Ok(())
        });
    }
}
