//! These structs provide the CLI interface for the roster CLI.

use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// roster: Import student grade spreadsheets and look students up by their code.
///
/// An administrator uploads a spreadsheet whose first row labels the columns: an ID, a name, a
/// series of session grade and attendance columns, named exams, and finally the student's unique
/// code. Every upload replaces the stored students. A student can then retrieve their own record
/// by presenting their unique code.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory, the configuration file and the database.
    ///
    /// This is the first command you should run. Decide what directory you want to store data in
    /// and pass this as --roster-home. By default, it will be $HOME/roster. If you do not pass
    /// --upload-password a random one is generated and printed.
    Init(InitArgs),
    /// Import a spreadsheet, replacing every stored student.
    Upload(UploadArgs),
    /// Print the record of the student with the given unique code.
    Lookup(LookupArgs),
    /// Run the HTTP server for uploads and lookups.
    Serve(ServeArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where roster data and configuration is held. Defaults to ~/roster
    #[arg(long, env = "ROSTER_HOME", default_value_t = default_roster_home())]
    roster_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, roster_home: PathBuf) -> Self {
        Self {
            log_level,
            roster_home: roster_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn roster_home(&self) -> &DisplayPath {
        &self.roster_home
    }
}

/// (Not shown): Args for the `roster init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The password that must accompany every upload. Generated when omitted.
    #[arg(long)]
    upload_password: Option<String>,

    /// The address `roster serve` listens on. Defaults to 127.0.0.1:8080
    #[arg(long)]
    listen_addr: Option<SocketAddr>,
}

impl InitArgs {
    pub fn new(upload_password: Option<String>, listen_addr: Option<SocketAddr>) -> Self {
        Self {
            upload_password,
            listen_addr,
        }
    }

    pub fn upload_password(&self) -> Option<&str> {
        self.upload_password.as_deref()
    }

    pub fn listen_addr(&self) -> Option<SocketAddr> {
        self.listen_addr
    }
}

/// (Not shown): Args for the `roster upload` command.
#[derive(Debug, Parser, Clone)]
pub struct UploadArgs {
    /// The spreadsheet to import: .xlsx, .xlsm, .xlsb, .xls, .ods or .csv
    file: PathBuf,

    /// The upload password from config.json
    #[arg(long, env = "ROSTER_UPLOAD_PASSWORD", hide_env_values = true)]
    password: String,
}

impl UploadArgs {
    pub fn new(file: impl Into<PathBuf>, password: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            password: password.into(),
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

/// (Not shown): Args for the `roster lookup` command.
#[derive(Debug, Parser, Clone)]
pub struct LookupArgs {
    /// The student's unique code, matched exactly
    code: String,

    /// Print the record as JSON to stdout
    #[arg(long)]
    json: bool,
}

impl LookupArgs {
    pub fn new(code: impl Into<String>, json: bool) -> Self {
        Self {
            code: code.into(),
            json,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn json(&self) -> bool {
        self.json
    }
}

/// (Not shown): Args for the `roster serve` command.
#[derive(Debug, Parser, Clone)]
pub struct ServeArgs {
    /// Overrides the listen_addr from config.json
    #[arg(long)]
    listen_addr: Option<SocketAddr>,
}

impl ServeArgs {
    pub fn new(listen_addr: Option<SocketAddr>) -> Self {
        Self { listen_addr }
    }

    pub fn listen_addr(&self) -> Option<SocketAddr> {
        self.listen_addr
    }
}

fn default_roster_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("roster"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --roster-home or ROSTER_HOME instead of relying on the default \
                roster home directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("roster")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}
