pub mod args;
pub mod commands;
mod config;
mod db;
mod error;
pub mod ingest;
mod lookup;
pub mod model;
pub mod server;
pub mod sheet;
mod store;
mod upload;
mod utils;

#[cfg(test)]
mod test;

pub use config::Config;
pub use error::{Error, ErrorType, Result};
pub use ingest::{ImportSummary, IngestionPipeline};
pub use lookup::LookupService;
pub use store::{MemoryStore, StudentStore};
pub use upload::{Upload, UploadService};
