use clap::Parser;
use roster::args::{Args, Command};
use roster::{commands, Config, Result};
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().roster_home().path();

    let _: () = match args.command() {
        Command::Init(init_args) => commands::init(
            home,
            init_args.upload_password(),
            init_args.listen_addr(),
        )
        .await?
        .print(),

        Command::Upload(upload_args) => {
            let config = Config::load(home).await?;
            commands::upload(&config, upload_args.file(), upload_args.password())
                .await?
                .print()
        }

        Command::Lookup(lookup_args) => {
            let config = Config::load(home).await?;
            let out = commands::lookup(&config, lookup_args.code()).await?;
            if lookup_args.json() {
                out.print_json()?
            } else {
                out.print()
            }
        }

        Command::Serve(serve_args) => {
            let config = Config::load(home).await?;
            commands::serve(&config, serve_args.listen_addr())
                .await?
                .print()
        }
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_CRATE_NAME"),
                level,
                env!("CARGO_BIN_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
