//! The upload boundary: checks the credential and the file, decodes the spreadsheet and hands it to
//! the `IngestionPipeline`. Both the CLI and the HTTP server go through here.

use crate::error::{Error, ErrorType, IntoResult};
use crate::ingest::{ImportSummary, IngestionPipeline};
use crate::sheet::{self, SheetFormat};
use crate::Result;
use tracing::{debug, warn};

pub(crate) const WRONG_PASSWORD: &str = "The password is incorrect.";
pub(crate) const MISSING_FILE: &str = "Please upload a spreadsheet file.";

/// One uploaded file as it arrived.
#[derive(Debug, Clone, Copy)]
pub struct Upload<'a> {
    /// The credential presented with the upload.
    pub password: &'a str,
    /// The file contents. `None` when no file was attached.
    pub bytes: Option<&'a [u8]>,
    /// The file format. `None` when it could not be determined.
    pub format: Option<SheetFormat>,
}

/// Guards the `IngestionPipeline` with the upload password.
#[derive(Clone)]
pub struct UploadService {
    password: String,
    pipeline: IngestionPipeline,
}

impl UploadService {
    pub fn new(password: impl Into<String>, pipeline: IngestionPipeline) -> Self {
        Self {
            password: password.into(),
            pipeline,
        }
    }

    /// Fails with `ErrorType::Unauthorized` unless `candidate` is exactly the upload password.
    pub fn check_password(&self, candidate: &str) -> Result<()> {
        if candidate != self.password {
            warn!("Rejected an upload with an incorrect password");
            return Err(Error::message(ErrorType::Unauthorized, WRONG_PASSWORD));
        }
        Ok(())
    }

    /// Imports `upload`, replacing every stored student.
    ///
    /// The checks run in this order and the first failure wins:
    /// - the password must match exactly, or `ErrorType::Unauthorized`
    /// - a non-empty file must be attached, or `ErrorType::UserInput`
    /// - the format must be known, or `ErrorType::UserInput`
    /// - the bytes must decode, or `ErrorType::Decoding`
    /// - the pipeline errors are passed through
    pub async fn upload(&self, upload: Upload<'_>) -> Result<ImportSummary> {
        self.check_password(upload.password)?;

        let bytes = match upload.bytes {
            Some(b) if !b.is_empty() => b,
            _ => return Err(Error::message(ErrorType::UserInput, MISSING_FILE)),
        };

        let format = upload.format.ok_or_else(|| {
            Error::message(
                ErrorType::UserInput,
                "Unsupported file type. Please upload an .xlsx, .xlsm, .xlsb, .xls, .ods or .csv \
                file.",
            )
        })?;

        debug!("Decoding a {} byte {format} upload", bytes.len());
        let raw = sheet::decode(bytes, format).pub_result(ErrorType::Decoding)?;
        self.pipeline.run(&raw).await
    }
}
