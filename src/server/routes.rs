//! Request routing. `handle` is generic over the request body so tests can drive it with in-memory
//! bodies.

use super::App;
use crate::commands::{found_message, imported, Out, NOT_FOUND_MESSAGE};
use crate::error::{Error, ErrorType, IntoResult};
use crate::sheet::SheetFormat;
use crate::upload::Upload;
use crate::Result;
use anyhow::{anyhow, Context};
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, CONTENT_TYPE, LOCATION};
use hyper::{Method, Request, Response, StatusCode, Uri};
use percent_encoding::percent_decode_str;
use serde::Serialize;
use std::error::Error as StdError;
use tracing::{debug, error, info, warn};

/// The request header that carries the upload password.
pub const PASSWORD_HEADER: &str = "x-upload-password";

/// The request header that carries the uploaded file's name. Its extension selects the format.
pub const FILE_NAME_HEADER: &str = "x-file-name";

const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// The body of `GET /upload`: how to send a spreadsheet.
#[derive(Debug, Clone, Serialize)]
pub struct UploadInstructions {
    pub method: &'static str,
    pub path: &'static str,
    pub password_header: &'static str,
    pub file_name_header: &'static str,
    pub format_query_parameter: &'static str,
    pub formats: Vec<String>,
}

impl Default for UploadInstructions {
    fn default() -> Self {
        Self {
            method: "POST",
            path: "/upload",
            password_header: PASSWORD_HEADER,
            file_name_header: FILE_NAME_HEADER,
            format_query_parameter: "format",
            formats: [
                SheetFormat::Xlsx,
                SheetFormat::Xlsm,
                SheetFormat::Xlsb,
                SheetFormat::Xls,
                SheetFormat::Ods,
                SheetFormat::Csv,
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Routes one request and turns the outcome into a response. Never fails: errors become JSON error
/// bodies with the status of their `ErrorType`.
pub async fn handle<B>(app: &App, req: Request<B>) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!("{method} {path}");

    let outcome = match (&method, path.as_str()) {
        (&Method::GET, "/") => return redirect("/upload"),
        (&Method::GET, "/upload") => Ok(json(
            StatusCode::OK,
            &Out::new(
                "Send the spreadsheet as the body of a POST to /upload.",
                UploadInstructions::default(),
            ),
        )),
        (&Method::POST, "/upload") => upload(app, req).await,
        (&Method::GET, p) if p.starts_with("/info/") => {
            student_info(app, &p["/info/".len()..]).await
        }
        _ => Err(Error::message(ErrorType::NotFound, "Not found.")),
    };

    outcome.unwrap_or_else(|e| error_response(&method, &path, e))
}

async fn upload<B>(app: &App, req: Request<B>) -> Result<Response<Full<Bytes>>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let (parts, body) = req.into_parts();
    let password = parts
        .headers
        .get(PASSWORD_HEADER)
        .and_then(|v| std::str::from_utf8(v.as_bytes()).ok())
        .unwrap_or_default();
    let format = upload_format(&parts.uri, parts.headers.get(FILE_NAME_HEADER));

    // The body is only read once the credential is accepted
    app.uploads().check_password(password)?;

    let bytes = Limited::new(body, MAX_UPLOAD_BYTES)
        .collect()
        .await
        .map_err(|e| anyhow!(e))
        .context("The file is too large or could not be read.")
        .pub_result(ErrorType::UserInput)?
        .to_bytes();

    let summary = app
        .uploads()
        .upload(Upload {
            password,
            bytes: Some(&bytes[..]),
            format,
        })
        .await?;

    Ok(json(StatusCode::OK, &imported(summary)))
}

async fn student_info(app: &App, raw_code: &str) -> Result<Response<Full<Bytes>>> {
    let code = percent_decode_str(raw_code)
        .decode_utf8()
        .map_err(|_| Error::message(ErrorType::NotFound, NOT_FOUND_MESSAGE))?;
    if code.is_empty() {
        return Err(Error::message(ErrorType::NotFound, NOT_FOUND_MESSAGE));
    }

    match app.lookup().find_by_code(&code).await? {
        Some(student) => Ok(json(
            StatusCode::OK,
            &Out::new(found_message(&student), student),
        )),
        None => Err(Error::message(ErrorType::NotFound, NOT_FOUND_MESSAGE)),
    }
}

/// The `format` query parameter wins over the extension of the `x-file-name` header.
fn upload_format(uri: &Uri, file_name: Option<&HeaderValue>) -> Option<SheetFormat> {
    let from_query = uri.query().and_then(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .find(|(k, _)| k == "format")
            .map(|(_, v)| v.to_ascii_lowercase())
    });
    if let Some(format) = from_query {
        return format.parse().ok();
    }
    let name = std::str::from_utf8(file_name?.as_bytes()).ok()?;
    SheetFormat::from_file_name(name).ok()
}

fn error_response(method: &Method, path: &str, e: Error) -> Response<Full<Bytes>> {
    let error_type = e.error_type();
    match error_type {
        ErrorType::Unauthorized => warn!("{method} {path}: {e}"),
        ErrorType::UserInput | ErrorType::NotFound => info!("{method} {path}: {e}"),
        _ => error!("{method} {path} failed: {e:?}"),
    }
    let status =
        StatusCode::from_u16(error_type.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    json(
        status,
        &ErrorBody {
            error: e.user_message(),
        },
    )
}

fn json<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => {
            let mut response = Response::new(Full::new(Bytes::from(body)));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            error!("Unable to serialize a response body: {e}");
            let mut response = Response::new(Full::new(Bytes::new()));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}

fn redirect(location: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::SEE_OTHER;
    response
        .headers_mut()
        .insert(LOCATION, HeaderValue::from_static(location));
    response
}
