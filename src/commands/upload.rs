use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::ingest::{ImportSummary, IngestionPipeline};
use crate::sheet::SheetFormat;
use crate::upload::{Upload, UploadService};
use crate::{utils, Config, Result};
use std::path::Path;
use tracing::debug;

/// Imports the spreadsheet at `file` into the database, replacing every stored student.
///
/// The format is taken from the file extension. `password` must match the configured upload
/// password.
pub async fn upload(config: &Config, file: &Path, password: &str) -> Result<Out<ImportSummary>> {
    let service = UploadService::new(
        config.upload_password(),
        IngestionPipeline::new(config.store(), config.markers()),
    );

    let bytes = if file.is_file() {
        Some(utils::read_bytes(file).await.pub_result(ErrorType::UserInput)?)
    } else {
        debug!("No file at {}", file.display());
        None
    };
    let format = SheetFormat::from_file_name(file).ok();

    let summary = service
        .upload(Upload {
            password,
            bytes: bytes.as_deref(),
            format,
        })
        .await?;
    Ok(imported(summary))
}

/// The output of a successful import, shared by the CLI and the HTTP server.
pub(crate) fn imported(summary: ImportSummary) -> Out<ImportSummary> {
    Out::new(
        format!("{} students inserted successfully.", summary.count),
        summary,
    )
}
