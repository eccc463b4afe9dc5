//! Shared test utilities for creating test environments.
//!
//! This module is only compiled when running tests (`#[cfg(test)]`).

use crate::{utils, Config};
use std::path::PathBuf;
use tempfile::TempDir;

/// Test environment that sets up a roster home directory with Config and database.
/// Holds TempDir to keep the directory alive for the duration of the test.
pub struct TestEnv {
    temp_dir: TempDir,
    config: Config,
}

impl TestEnv {
    /// The upload password of every test environment.
    pub const PASSWORD: &'static str = "test-password";

    /// Creates a test environment with Config and initialized database. The server address uses
    /// port 0 so nothing collides if a test binds it.
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("roster");
        let config = Config::create(
            &root,
            Some(Self::PASSWORD),
            Some("127.0.0.1:0".parse().unwrap()),
        )
        .await
        .unwrap();

        Self { temp_dir, config }
    }

    /// Returns a clone of the Config.
    pub fn config(&self) -> Config {
        self.config.clone()
    }

    /// Writes `contents` to a file named `name` outside the roster home and returns its path.
    pub async fn write_file(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        utils::write(&path, contents).await.unwrap();
        path
    }
}
