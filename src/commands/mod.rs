//! Command handlers for the roster CLI.
//!
//! This module contains implementations for all CLI subcommands.

mod init;
mod lookup;
mod serve;
mod upload;

use crate::error::{ErrorType, IntoResult};
use crate::Result;
use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, info};

pub use init::{init, InitOutput};
pub use lookup::lookup;
pub(crate) use lookup::{found_message, NOT_FOUND_MESSAGE};
pub use serve::serve;
pub use upload::upload;
pub(crate) use upload::imported;

/// The output type for a command. This allows the command to return a consistent message and,
/// optionally, structured data to both the command line and the HTTP server.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the command execution.
    message: String,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    /// Get the `message`.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the structured data stored in `structure`.
    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Print the message to `info!` and the structured data (if it exists) as JSON to `debug!`.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }

    /// Print the structured data as pretty JSON to stdout, or the message if there is none.
    pub fn print_json(&self) -> Result<()> {
        match self.structure() {
            Some(structure) => {
                let json = serde_json::to_string_pretty(structure)
                    .pub_result(ErrorType::Service)?;
                println!("{json}");
            }
            None => println!("{}", self.message),
        }
        Ok(())
    }
}
