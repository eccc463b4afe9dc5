//! The HTTP front end: an HTTP/1 server on `hyper` that accepts uploads and answers lookups.

mod routes;

use crate::error::Res;
use crate::ingest::IngestionPipeline;
use crate::lookup::LookupService;
use crate::upload::UploadService;
use crate::Config;
use anyhow::Context;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use tokio::net::TcpListener;
use tracing::{debug, info, trace};

pub use routes::{handle, UploadInstructions, FILE_NAME_HEADER, PASSWORD_HEADER};

/// The services a request can reach.
#[derive(Clone)]
pub struct App {
    uploads: UploadService,
    lookup: LookupService,
}

impl App {
    pub fn new(uploads: UploadService, lookup: LookupService) -> Self {
        Self { uploads, lookup }
    }

    /// Wires the services to the database and settings in `config`.
    pub fn from_config(config: &Config) -> Self {
        let store = config.store();
        let pipeline = IngestionPipeline::new(store.clone(), config.markers());
        Self {
            uploads: UploadService::new(config.upload_password(), pipeline),
            lookup: LookupService::new(store),
        }
    }

    pub(crate) fn uploads(&self) -> &UploadService {
        &self.uploads
    }

    pub(crate) fn lookup(&self) -> &LookupService {
        &self.lookup
    }
}

/// Accepts connections on `listener` until `shutdown` completes. Each connection is served on its
/// own task; connections still open at shutdown are left to finish on their own.
pub(crate) async fn serve(
    listener: TcpListener,
    app: App,
    shutdown: impl Future<Output = ()>,
) -> Res<()> {
    let local = listener
        .local_addr()
        .context("Unable to read the listener address")?;
    info!("Listening on http://{local}");
    tokio::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => accepted.context("Failed to accept a connection")?,
            _ = &mut shutdown => {
                info!("Shutting down the server");
                return Ok(());
            }
        };
        trace!("Accepted a connection from {peer}");

        let app = app.clone();
        tokio::spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| {
                let app = app.clone();
                async move { Ok::<_, Infallible>(handle(&app, req).await) }
            });
            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                debug!("Connection from {peer} ended with an error: {e}");
            }
        });
    }
}
