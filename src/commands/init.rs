use crate::commands::Out;
use crate::{Config, Result};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// What `roster init` created.
#[derive(Debug, Clone, Serialize)]
pub struct InitOutput {
    pub roster_home: PathBuf,
    pub listen_addr: SocketAddr,
    /// Only present when the password was generated, so it is shown exactly once.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_password: Option<String>,
}

/// Creates the data directory along with:
/// - an initial `config.json` holding the upload password and listen address
/// - the SQLite database
///
/// # Arguments
/// - `roster_home` - The directory that will be the root of data directory, e.g. `$HOME/roster`
/// - `upload_password` - The password required for uploads. A random one is generated when `None`.
/// - `listen_addr` - The address `roster serve` binds to. Defaults to `127.0.0.1:8080`.
///
/// # Errors
/// - `ErrorType::Config` if the directory is already initialized or any file operation fails.
pub async fn init(
    roster_home: &Path,
    upload_password: Option<&str>,
    listen_addr: Option<SocketAddr>,
) -> Result<Out<InitOutput>> {
    let config = Config::create(roster_home, upload_password, listen_addr).await?;

    let generated_password = match upload_password {
        Some(_) => None,
        None => Some(config.upload_password().to_string()),
    };
    let mut message = format!(
        "Successfully created the roster directory and config at {}",
        config.root().display()
    );
    if let Some(password) = &generated_password {
        message.push_str(&format!(
            "\nThe generated upload password is: {password}\nIt is stored in {}",
            config.config_path().display()
        ));
    }

    Ok(Out::new(
        message,
        InitOutput {
            roster_home: config.root().to_path_buf(),
            listen_addr: config.listen_addr(),
            generated_password,
        },
    ))
}
