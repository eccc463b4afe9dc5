//! Configuration file handling for roster.
//!
//! The configuration file is stored at `$ROSTER_HOME/config.json` and holds the upload password,
//! the address the server listens on and, optionally, the header markers used to recognise session
//! and exam columns.

use crate::db::Db;
use crate::error::{ErrorType, IntoResult, Res};
use crate::ingest::header::Markers;
use crate::store::StudentStore;
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

const APP_NAME: &str = "roster";
const CONFIG_VERSION: u8 = 1;
const CONFIG_JSON: &str = "config.json";
const ROSTER_SQLITE: &str = "roster.sqlite";
pub(crate) const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$ROSTER_HOME` and from there it loads `$ROSTER_HOME/config.json` and opens the
/// SQLite database next to it.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    db: Db,
    sqlite_path: PathBuf,
}

impl Config {
    /// Creates the data directory and:
    /// - Creates an initial `config.json` file with the given settings
    /// - Creates the SQLite database with the current schema
    ///
    /// # Arguments
    /// - `dir` - The directory that will be the root of data directory, e.g. `$HOME/roster`
    /// - `upload_password` - The password required to upload a spreadsheet. When `None` a random
    ///   password is generated; read it back with `upload_password()`.
    /// - `listen_addr` - The address `roster serve` binds to. Defaults to `127.0.0.1:8080`.
    ///
    /// # Errors
    /// - `ErrorType::Config` if the directory already holds a config file or any file operation
    ///   fails.
    pub async fn create(
        dir: impl Into<PathBuf>,
        upload_password: Option<&str>,
        listen_addr: Option<SocketAddr>,
    ) -> Result<Self> {
        Self::create_inner(dir.into(), upload_password, listen_addr)
            .await
            .pub_result(ErrorType::Config)
    }

    async fn create_inner(
        maybe_relative: PathBuf,
        upload_password: Option<&str>,
        listen_addr: Option<SocketAddr>,
    ) -> Res<Self> {
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the roster home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let config_path = root.join(CONFIG_JSON);
        if config_path.exists() {
            bail!("A config file already exists at '{}'", config_path.display());
        }

        let upload_password = match upload_password {
            Some(p) if p.is_empty() => bail!("The upload password must not be empty"),
            Some(p) => p.to_string(),
            None => Uuid::new_v4().simple().to_string(),
        };

        let config_file = ConfigFile {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            upload_password,
            listen_addr: match listen_addr {
                Some(addr) => addr,
                None => default_listen_addr()?,
            },
            markers: None,
        };
        config_file.save(&config_path).await?;

        let sqlite_path = root.join(ROSTER_SQLITE);
        let db = Db::init(&sqlite_path)
            .await
            .context("Unable to create SQLite DB")?;

        Ok(Self {
            root,
            config_path,
            config_file,
            db,
            sqlite_path,
        })
    }

    /// This will
    /// - validate that `roster_home` exists and that the config file exists
    /// - load and validate the config file
    /// - open the SQLite database, running any pending migrations
    /// - return the loaded configuration object
    pub async fn load(roster_home: impl Into<PathBuf>) -> Result<Self> {
        Self::load_inner(roster_home.into())
            .await
            .pub_result(ErrorType::Config)
    }

    async fn load_inner(maybe_relative: PathBuf) -> Res<Self> {
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("Roster Home is missing")?;
        if !root.is_dir() {
            bail!("Roster Home is not a directory '{}'", root.display());
        }

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let sqlite_path = root.join(ROSTER_SQLITE);
        let db = Db::load(&sqlite_path)
            .await
            .context("Unable to load SQLite DB")?;

        Ok(Self {
            root,
            config_path,
            config_file,
            db,
            sqlite_path,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn sqlite_path(&self) -> &Path {
        &self.sqlite_path
    }

    pub(crate) fn db(&self) -> &Db {
        &self.db
    }

    /// The database as a shareable `StudentStore`.
    pub fn store(&self) -> Arc<dyn StudentStore> {
        Arc::new(self.db.clone())
    }

    pub fn upload_password(&self) -> &str {
        &self.config_file.upload_password
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.config_file.listen_addr
    }

    /// The configured header markers, or the built-in ones when the config file has none.
    pub fn markers(&self) -> Markers {
        self.config_file.markers.clone().unwrap_or_default()
    }
}

fn default_listen_addr() -> Res<SocketAddr> {
    DEFAULT_LISTEN_ADDR
        .parse()
        .with_context(|| format!("Invalid default listen address '{DEFAULT_LISTEN_ADDR}'"))
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "roster",
///   "config_version": 1,
///   "upload_password": "8d1f0c4e2b7a4f5e9c3d6a1b0e2f4c7d",
///   "listen_addr": "127.0.0.1:8080"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "roster"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// The password that must accompany every upload
    upload_password: String,

    /// The address the HTTP server binds to
    listen_addr: SocketAddr,

    /// Overrides the built-in header markers when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    markers: Option<Markers>,
}

impl ConfigFile {
    /// Loads a ConfigFile from the specified path and validates it.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if `app_name` is not "roster"
    async fn load(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path)
            .await
            .context("Failed to load config file")?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        anyhow::ensure!(
            !config.upload_password.is_empty(),
            "The upload_password in the config file is empty"
        );

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    async fn save(&self, path: impl AsRef<Path>) -> Res<()> {
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(path, data)
            .await
            .context("Unable to write config file")
    }
}
